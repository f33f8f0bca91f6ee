//! One MJPEG stream session and its worker loop.
//!
//! ## Session lifecycle
//!
//! ```text
//! parse_stream            -> Connecting
//! response head accepted  -> Streaming
//! stop_stream             -> Stopping  (observed before the next read)
//! worker exits cleanly    -> Stopped   (stop request or end of body)
//! any failure             -> Failed    (one error published)
//! ```
//!
//! The worker is the only thread that touches the transport response and
//! the assembly buffer. The consumer shares two things with it: the
//! `active` flag and the [`Mailbox`](crate::dispatch::Mailbox).

use std::any::Any;
use std::io::ErrorKind as IoErrorKind;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use parking_lot::RwLock;

use crate::assembler::FrameAssembler;
use crate::boundary::BoundaryToken;
use crate::dispatch::EventDispatcher;
use crate::error::{ErrorKind, ProtocolErrorKind, Result, StreamError};
use crate::processor::StreamConfig;
use crate::transport::{Credentials, Transport};

/// Processor state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamState {
    /// No session has been started.
    Idle,
    /// Request issued, waiting for response headers.
    Connecting,
    /// Reading chunks and cutting frames.
    Streaming,
    /// Stop requested; the worker has not yet observed it.
    Stopping,
    /// The last session ended without error.
    Stopped,
    /// The last session ended with an error.
    Failed,
}

impl StreamState {
    /// Whether a worker may still be running in this state.
    pub fn is_live(self) -> bool {
        matches!(self, Self::Connecting | Self::Streaming | Self::Stopping)
    }
}

/// Move `state` to `to` only if it is currently `from`.
pub(crate) fn transition(state: &RwLock<StreamState>, from: StreamState, to: StreamState) -> bool {
    let mut current = state.write();
    if *current != from {
        return false;
    }
    tracing::debug!(old_state = ?from, new_state = ?to, "state transition");
    *current = to;
    true
}

fn set_state(state: &RwLock<StreamState>, to: StreamState) {
    let mut current = state.write();
    tracing::debug!(old_state = ?*current, new_state = ?to, "state transition");
    *current = to;
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(msg) = payload.downcast_ref::<&str>() {
        msg.to_string()
    } else if let Some(msg) = payload.downcast_ref::<String>() {
        msg.clone()
    } else {
        "unknown panic".to_string()
    }
}

/// Live state of one `parse_stream` call, moved onto its worker thread.
pub(crate) struct StreamSession {
    pub uri: String,
    pub credentials: Option<Credentials>,
    pub config: Arc<StreamConfig>,
    pub transport: Arc<dyn Transport>,
    pub state: Arc<RwLock<StreamState>>,
    pub active: Arc<AtomicBool>,
    pub dispatcher: EventDispatcher,
}

impl StreamSession {
    /// Worker entry point: run the session to completion and publish its
    /// outcome.
    pub fn run(self) {
        tracing::info!(uri = %self.uri, "stream session started");

        // A panicking handler must still end the session.
        let outcome = panic::catch_unwind(AssertUnwindSafe(|| self.stream()))
            .unwrap_or_else(|payload| {
                Err(StreamError::WorkerPanicked {
                    message: panic_message(payload.as_ref()),
                })
            });

        match outcome {
            Ok(reason) => {
                set_state(&self.state, StreamState::Stopped);
                tracing::info!(uri = %self.uri, reason, "stream session ended");
            }
            Err(e) if !self.active.load(Ordering::SeqCst) && e.kind() != ErrorKind::WorkerPanicked => {
                set_state(&self.state, StreamState::Stopped);
                tracing::debug!(uri = %self.uri, error = %e, "error after stop request ignored");
            }
            Err(e) => {
                tracing::warn!(uri = %self.uri, error = %e, "stream session failed");
                // Error slot first: a consumer seeing Failed must find it.
                self.dispatcher.error(e);
                set_state(&self.state, StreamState::Failed);
            }
        }

        self.dispatcher.finished();
    }

    /// Connect, validate the response, then pump chunks until stopped.
    /// Returns the reason for a clean exit.
    fn stream(&self) -> Result<&'static str> {
        let mut response = self.transport.open(&self.uri, self.credentials.as_ref())?;

        if !response.is_success() {
            return Err(StreamError::Connection {
                message: format!("HTTP {} {}", response.status, response.reason),
                status: Some(response.status),
            });
        }

        let content_type = response
            .content_type()
            .ok_or(StreamError::protocol(ProtocolErrorKind::MissingContentType))?;
        let boundary = BoundaryToken::from_content_type(content_type)?;

        tracing::debug!(%boundary, content_type, "multipart boundary derived");

        transition(&self.state, StreamState::Connecting, StreamState::Streaming);

        let mut assembler = FrameAssembler::with_capacity(boundary, self.config.buffer_capacity);
        let mut chunk = vec![0u8; self.config.chunk_size.max(1)];
        let mut frames = 0u64;

        let reason = loop {
            if !self.active.load(Ordering::SeqCst) {
                break "stop requested";
            }

            let n = match response.body_mut().read(&mut chunk) {
                Ok(0) => break "end of stream",
                Ok(n) => n,
                Err(e) if e.kind() == IoErrorKind::Interrupted => continue,
                Err(e) => return Err(StreamError::Read(e)),
            };

            tracing::trace!(bytes = n, in_progress = assembler.is_in_progress(), "chunk read");

            assembler.feed(&chunk[..n], |frame| {
                frames += 1;
                self.dispatcher.frame_ready(frame);
            })?;
        };

        if assembler.is_in_progress() {
            tracing::debug!(discarded = assembler.len(), "partial frame dropped");
        }
        tracing::debug!(frames, "stream loop exited");

        response.close();
        Ok(reason)
    }
}
