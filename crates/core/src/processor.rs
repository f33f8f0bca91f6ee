use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use parking_lot::{Mutex, RwLock};

use crate::assembler::DEFAULT_BUFFER_CAPACITY;
use crate::dispatch::{EventDispatcher, Mailbox, SharedHandler, StreamHandler};
use crate::error::{Result, StreamError};
use crate::frame::Frame;
use crate::session::{self, StreamSession, StreamState};
use crate::transport::http::DEFAULT_USER_AGENT;
use crate::transport::{Credentials, HttpTransport, Transport};

/// Bytes requested per read (50 KiB).
pub const DEFAULT_CHUNK_SIZE: usize = 1024 * 50;

/// Stream-level configuration.
#[derive(Debug, Clone)]
pub struct StreamConfig {
    /// Bytes requested per read. Smaller values lower per-read latency,
    /// larger values lower read-call overhead.
    pub chunk_size: usize,
    /// Largest frame the assembler accepts before failing with
    /// [`StreamError::BufferOverflow`].
    pub buffer_capacity: usize,
    /// Connect timeout for the default HTTP transport. `None` waits
    /// indefinitely.
    pub connect_timeout: Option<Duration>,
    /// Per-read timeout for the default HTTP transport. `None` waits
    /// indefinitely.
    pub read_timeout: Option<Duration>,
    /// `User-Agent` sent by the default HTTP transport.
    pub user_agent: String,
}

impl Default for StreamConfig {
    fn default() -> Self {
        Self {
            chunk_size: DEFAULT_CHUNK_SIZE,
            buffer_capacity: DEFAULT_BUFFER_CAPACITY,
            connect_timeout: None,
            read_timeout: None,
            user_agent: DEFAULT_USER_AGENT.to_string(),
        }
    }
}

impl StreamConfig {
    pub fn with_chunk_size(chunk_size: usize) -> Self {
        Self {
            chunk_size: chunk_size.max(1),
            ..Self::default()
        }
    }
}

/// MJPEG stream processor.
///
/// Owns the configuration, the transport and the consumer-facing
/// [`Mailbox`]. Each [`parse_stream`](Self::parse_stream) call starts one
/// session on a dedicated worker thread; the call itself never blocks.
///
/// ```no_run
/// use std::time::Duration;
/// use mjpeg::{StreamConfig, StreamProcessor};
///
/// let mut processor = StreamProcessor::new(StreamConfig::default());
/// processor.parse_stream("http://camera.local/mjpg/video.mjpg", None)?;
///
/// if let Some(frame) = processor.mailbox().wait_for_frame(0, Duration::from_secs(5)) {
///     println!("got {} bytes", frame.len());
/// }
/// processor.stop_stream();
/// # Ok::<(), mjpeg::StreamError>(())
/// ```
pub struct StreamProcessor {
    config: Arc<StreamConfig>,
    transport: Arc<dyn Transport>,
    state: Arc<RwLock<StreamState>>,
    mailbox: Mailbox,
    handler: Option<SharedHandler>,
    /// Active flag of the current session. Cleared by `stop_stream`.
    active: Arc<AtomicBool>,
    worker: Option<JoinHandle<()>>,
}

impl StreamProcessor {
    /// Create a processor using the built-in HTTP transport.
    pub fn new(config: StreamConfig) -> Self {
        let transport = HttpTransport::new()
            .with_connect_timeout(config.connect_timeout)
            .with_read_timeout(config.read_timeout)
            .with_user_agent(&config.user_agent);
        Self::with_transport(config, transport)
    }

    /// Create a processor with a caller-supplied transport.
    pub fn with_transport(config: StreamConfig, transport: impl Transport + 'static) -> Self {
        Self {
            config: Arc::new(config),
            transport: Arc::new(transport),
            state: Arc::new(RwLock::new(StreamState::Idle)),
            mailbox: Mailbox::new(),
            handler: None,
            active: Arc::new(AtomicBool::new(false)),
            worker: None,
        }
    }

    /// Register a handler invoked for every frame and for the terminal
    /// error. Takes effect from the next session.
    pub fn set_handler(&mut self, handler: impl StreamHandler + 'static) {
        self.handler = Some(Arc::new(Mutex::new(Box::new(handler))));
    }

    /// Begin a session on `uri`. Returns as soon as the worker is spawned;
    /// connection errors arrive through the mailbox and handler.
    ///
    /// Fails with [`StreamError::AlreadyRunning`] while a previous session
    /// is still live. After [`stop_stream`](Self::stop_stream), call
    /// [`join`](Self::join) before starting again.
    pub fn parse_stream(&mut self, uri: &str, credentials: Option<Credentials>) -> Result<()> {
        if self.is_running() {
            return Err(StreamError::AlreadyRunning);
        }
        self.join();

        let active = Arc::new(AtomicBool::new(true));
        self.active = active.clone();
        self.mailbox.reset();
        *self.state.write() = StreamState::Connecting;

        tracing::info!(uri, chunk_size = self.config.chunk_size, "parsing stream");

        let session = StreamSession {
            uri: uri.to_string(),
            credentials,
            config: self.config.clone(),
            transport: self.transport.clone(),
            state: self.state.clone(),
            active,
            dispatcher: EventDispatcher::new(self.mailbox.clone(), self.handler.clone()),
        };

        let spawned = thread::Builder::new()
            .name("mjpeg-stream".to_string())
            .spawn(move || session.run());

        match spawned {
            Ok(handle) => {
                self.worker = Some(handle);
                Ok(())
            }
            Err(e) => {
                *self.state.write() = StreamState::Failed;
                Err(StreamError::connection(format!("spawn stream worker: {e}")))
            }
        }
    }

    /// Request cooperative shutdown of the current session.
    ///
    /// Idempotent and safe from any thread. The worker notices before its
    /// next read; a read already blocked is not interrupted.
    pub fn stop_stream(&self) {
        let was_active = self.active.swap(false, Ordering::SeqCst);
        let requested = session::transition(&self.state, StreamState::Streaming, StreamState::Stopping)
            || session::transition(&self.state, StreamState::Connecting, StreamState::Stopping);

        if was_active && requested {
            tracing::info!("stream stopping");
        }
    }

    /// Wait for the current worker, if any, to exit.
    pub fn join(&mut self) {
        if let Some(handle) = self.worker.take() {
            if handle.join().is_err() {
                tracing::error!("stream worker panicked");
                *self.state.write() = StreamState::Failed;
            }
        }
    }

    pub fn state(&self) -> StreamState {
        *self.state.read()
    }

    pub fn is_running(&self) -> bool {
        self.state().is_live()
    }

    /// Latest complete frame of the current session.
    pub fn current_frame(&self) -> Option<Frame> {
        self.mailbox.current_frame()
    }

    pub fn mailbox(&self) -> &Mailbox {
        &self.mailbox
    }

    pub fn config(&self) -> &StreamConfig {
        &self.config
    }
}

impl Drop for StreamProcessor {
    /// Stops the session without waiting; a worker blocked in a read exits
    /// once the read returns.
    fn drop(&mut self) {
        self.stop_stream();
    }
}
