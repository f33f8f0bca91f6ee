//! Error types for the MJPEG stream demuxer.

use std::fmt;

/// Errors that can end an MJPEG stream session.
///
/// Variants map to specific failure modes across the stack:
///
/// - **Transport**: [`Connection`](Self::Connection): DNS/TCP/HTTP failure
///   while opening the stream.
/// - **Protocol**: [`Protocol`](Self::Protocol): the response cannot be
///   demuxed (no usable multipart boundary, malformed status line).
/// - **Assembly**: [`BufferOverflow`](Self::BufferOverflow): a single
///   frame outgrew the assembly buffer.
/// - **Streaming**: [`Read`](Self::Read): I/O failure after the stream
///   was established.
/// - **Worker**: [`WorkerPanicked`](Self::WorkerPanicked): a stream
///   handler or the read loop panicked.
/// - **Processor**: [`AlreadyRunning`](Self::AlreadyRunning).
///
/// Every variant except `AlreadyRunning` is terminal for its session and is
/// delivered exactly once through the [`Mailbox`](crate::dispatch::Mailbox).
#[derive(Debug, thiserror::Error)]
pub enum StreamError {
    /// The stream could not be opened. `status` is set when the server
    /// answered with a non-success HTTP status.
    #[error("connection error: {message}")]
    Connection {
        message: String,
        status: Option<u16>,
    },

    /// The response does not describe a demuxable MJPEG stream.
    #[error("protocol error: {kind}")]
    Protocol { kind: ProtocolErrorKind },

    /// A frame exceeded the configured assembly capacity. No partial frame
    /// is delivered.
    #[error("frame exceeds buffer capacity of {capacity} bytes ({attempted} bytes accumulated)")]
    BufferOverflow { capacity: usize, attempted: usize },

    /// Mid-stream I/O error. Not retried.
    #[error("read error: {0}")]
    Read(#[from] std::io::Error),

    /// The worker thread panicked, usually inside a
    /// [`StreamHandler`](crate::StreamHandler) callback. The session is over.
    #[error("stream worker panicked: {message}")]
    WorkerPanicked { message: String },

    /// [`StreamProcessor::parse_stream`](crate::StreamProcessor::parse_stream)
    /// was called while a session was still live.
    #[error("stream already running")]
    AlreadyRunning,
}

/// Specific kind of protocol failure.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProtocolErrorKind {
    /// The response carried no `Content-Type` header.
    MissingContentType,
    /// `Content-Type` has no `boundary` parameter.
    MissingBoundary,
    /// The `boundary` parameter is present but empty.
    EmptyBoundary,
    /// The stream URI could not be understood by the transport.
    InvalidUri,
    /// The server's response head could not be parsed.
    InvalidResponse,
}

impl fmt::Display for ProtocolErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MissingContentType => write!(f, "missing Content-Type header"),
            Self::MissingBoundary => write!(
                f,
                "invalid Content-Type header, the camera is likely not returning a proper MJPEG stream"
            ),
            Self::EmptyBoundary => write!(f, "empty multipart boundary"),
            Self::InvalidUri => write!(f, "invalid stream URI"),
            Self::InvalidResponse => write!(f, "malformed response head"),
        }
    }
}

/// Coarse classification of a [`StreamError`], for consumers that only
/// need to branch on the failure family.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Connection,
    Protocol,
    BufferOverflow,
    Read,
    WorkerPanicked,
    AlreadyRunning,
}

impl StreamError {
    pub(crate) fn protocol(kind: ProtocolErrorKind) -> Self {
        Self::Protocol { kind }
    }

    pub(crate) fn connection(message: impl Into<String>) -> Self {
        Self::Connection {
            message: message.into(),
            status: None,
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Connection { .. } => ErrorKind::Connection,
            Self::Protocol { .. } => ErrorKind::Protocol,
            Self::BufferOverflow { .. } => ErrorKind::BufferOverflow,
            Self::Read(_) => ErrorKind::Read,
            Self::WorkerPanicked { .. } => ErrorKind::WorkerPanicked,
            Self::AlreadyRunning => ErrorKind::AlreadyRunning,
        }
    }

    /// Optional numeric code accompanying the message. Currently the HTTP
    /// status of a rejected connection.
    pub fn code(&self) -> Option<u16> {
        match self {
            Self::Connection { status, .. } => *status,
            _ => None,
        }
    }
}

/// Convenience alias for `Result<T, StreamError>`.
pub type Result<T> = std::result::Result<T, StreamError>;
