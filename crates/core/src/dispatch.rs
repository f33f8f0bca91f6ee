//! Delivery of stream outcomes to the consumer.
//!
//! The worker thread hands every completed [`Frame`] and the terminal
//! [`StreamError`] (if any) to an [`EventDispatcher`], which fans them out
//! to two places:
//!
//! - the [`Mailbox`]: a single "latest frame" slot plus a separate error
//!   slot that the consumer polls or blocks on. A slow consumer simply
//!   skips frames; nothing queues up.
//! - an optional [`StreamHandler`], called on the worker thread, one call
//!   at a time, in stream order.

use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::{Condvar, Mutex};

use crate::error::StreamError;
use crate::frame::Frame;

/// Callback interface for consumers that want every frame as it completes.
///
/// Calls never overlap: a handler is only ever invoked from the single
/// worker that owns the session.
pub trait StreamHandler: Send {
    fn on_frame(&mut self, frame: &Frame);

    /// Called at most once per session, when it fails.
    fn on_error(&mut self, error: &StreamError) {
        let _ = error;
    }
}

/// Handler shared between the processor and its current worker.
pub type SharedHandler = Arc<Mutex<Box<dyn StreamHandler>>>;

#[derive(Debug, Default)]
struct Slots {
    frame: Option<Frame>,
    frames_received: u64,
    error: Option<StreamError>,
    finished: bool,
}

/// Latest-frame mailbox shared between the worker and the consumer.
///
/// Cloning yields another handle to the same mailbox.
#[derive(Clone, Default)]
pub struct Mailbox {
    inner: Arc<(Mutex<Slots>, Condvar)>,
}

impl Mailbox {
    pub fn new() -> Self {
        Self::default()
    }

    /// Most recent complete frame of the current session, if any arrived.
    pub fn current_frame(&self) -> Option<Frame> {
        self.inner.0.lock().frame.clone()
    }

    /// Total frames published through this mailbox, across sessions.
    pub fn frames_received(&self) -> u64 {
        self.inner.0.lock().frames_received
    }

    /// Take the terminal error of the current session, leaving the slot
    /// empty.
    pub fn take_error(&self) -> Option<StreamError> {
        self.inner.0.lock().error.take()
    }

    pub fn has_error(&self) -> bool {
        self.inner.0.lock().error.is_some()
    }

    /// `true` once the current session's worker has stopped publishing.
    pub fn is_finished(&self) -> bool {
        self.inner.0.lock().finished
    }

    /// Block until more than `after` frames have been received, then return
    /// the latest one.
    ///
    /// Returns `None` on timeout, or once the session has finished without
    /// producing such a frame.
    pub fn wait_for_frame(&self, after: u64, timeout: Duration) -> Option<Frame> {
        let deadline = Instant::now() + timeout;
        let (lock, cvar) = &*self.inner;
        let mut slots = lock.lock();

        loop {
            if slots.frames_received > after {
                return slots.frame.clone();
            }
            if slots.finished {
                return None;
            }
            if cvar.wait_until(&mut slots, deadline).timed_out() {
                return (slots.frames_received > after)
                    .then(|| slots.frame.clone())
                    .flatten();
            }
        }
    }

    /// Block until the current session finishes. Returns `false` on timeout.
    pub fn wait_until_finished(&self, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        let (lock, cvar) = &*self.inner;
        let mut slots = lock.lock();

        while !slots.finished {
            if cvar.wait_until(&mut slots, deadline).timed_out() {
                return slots.finished;
            }
        }
        true
    }

    /// Clear per-session slots before a new session starts.
    pub(crate) fn reset(&self) {
        let mut slots = self.inner.0.lock();
        slots.frame = None;
        slots.error = None;
        slots.finished = false;
    }

    fn publish_frame(&self, frame: Frame) {
        let (lock, cvar) = &*self.inner;
        let mut slots = lock.lock();
        slots.frame = Some(frame);
        slots.frames_received += 1;
        cvar.notify_all();
    }

    fn publish_error(&self, error: StreamError) {
        let (lock, cvar) = &*self.inner;
        lock.lock().error = Some(error);
        cvar.notify_all();
    }

    fn finish(&self) {
        let (lock, cvar) = &*self.inner;
        lock.lock().finished = true;
        cvar.notify_all();
    }
}

/// Worker-side publisher for one session.
pub struct EventDispatcher {
    mailbox: Mailbox,
    handler: Option<SharedHandler>,
}

impl EventDispatcher {
    pub fn new(mailbox: Mailbox, handler: Option<SharedHandler>) -> Self {
        Self { mailbox, handler }
    }

    /// Publish a completed frame. Exactly once per frame.
    pub fn frame_ready(&self, frame: Frame) {
        if let Some(handler) = &self.handler {
            handler.lock().on_frame(&frame);
        }
        self.mailbox.publish_frame(frame);
    }

    /// Publish the session's terminal error. Exactly once per session.
    ///
    /// A panic in `on_error` is logged and swallowed; the error still
    /// reaches the mailbox.
    pub fn error(&self, error: StreamError) {
        if let Some(handler) = &self.handler {
            let notified = panic::catch_unwind(AssertUnwindSafe(|| handler.lock().on_error(&error)));
            if notified.is_err() {
                tracing::error!("stream handler panicked in on_error");
            }
        }
        self.mailbox.publish_error(error);
    }

    /// Mark the session as finished and wake any waiters.
    pub fn finished(&self) {
        self.mailbox.finish();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    fn frame(seq: u64) -> Frame {
        Frame::new(seq, &[0xFF, 0xD8, seq as u8])
    }

    #[derive(Default)]
    struct Recorder {
        frames: Arc<Mutex<Vec<u64>>>,
        errors: Arc<Mutex<Vec<String>>>,
    }

    impl StreamHandler for Recorder {
        fn on_frame(&mut self, frame: &Frame) {
            self.frames.lock().push(frame.sequence());
        }

        fn on_error(&mut self, error: &StreamError) {
            self.errors.lock().push(error.to_string());
        }
    }

    #[test]
    fn mailbox_keeps_only_latest_frame() {
        let mailbox = Mailbox::new();
        let dispatcher = EventDispatcher::new(mailbox.clone(), None);
        assert!(mailbox.current_frame().is_none());

        for seq in 1..=3 {
            dispatcher.frame_ready(frame(seq));
        }

        assert_eq!(mailbox.current_frame().unwrap().sequence(), 3);
        assert_eq!(mailbox.frames_received(), 3);
    }

    #[test]
    fn handler_sees_every_frame_and_error_once() {
        let recorder = Recorder::default();
        let frames = recorder.frames.clone();
        let errors = recorder.errors.clone();
        let handler: SharedHandler = Arc::new(Mutex::new(Box::new(recorder)));

        let mailbox = Mailbox::new();
        let dispatcher = EventDispatcher::new(mailbox.clone(), Some(handler));
        dispatcher.frame_ready(frame(1));
        dispatcher.frame_ready(frame(2));
        dispatcher.error(StreamError::AlreadyRunning);
        dispatcher.finished();

        assert_eq!(*frames.lock(), vec![1, 2]);
        assert_eq!(errors.lock().len(), 1);
        assert!(mailbox.take_error().is_some());
        assert!(mailbox.take_error().is_none());
        assert!(mailbox.is_finished());
    }

    struct PanicsOnError;

    impl StreamHandler for PanicsOnError {
        fn on_frame(&mut self, _frame: &Frame) {}

        fn on_error(&mut self, _error: &StreamError) {
            panic!("handler bug");
        }
    }

    #[test]
    fn error_reaches_mailbox_when_handler_panics() {
        let handler: SharedHandler = Arc::new(Mutex::new(Box::new(PanicsOnError)));
        let mailbox = Mailbox::new();
        let dispatcher = EventDispatcher::new(mailbox.clone(), Some(handler));

        dispatcher.error(StreamError::AlreadyRunning);
        dispatcher.finished();

        assert!(matches!(mailbox.take_error(), Some(StreamError::AlreadyRunning)));
        assert!(mailbox.is_finished());
    }

    #[test]
    fn wait_for_frame_wakes_on_publish() {
        let mailbox = Mailbox::new();
        let dispatcher = EventDispatcher::new(mailbox.clone(), None);

        let producer = thread::spawn(move || {
            thread::sleep(Duration::from_millis(20));
            dispatcher.frame_ready(frame(1));
        });

        let got = mailbox.wait_for_frame(0, Duration::from_secs(5));
        assert_eq!(got.map(|f| f.sequence()), Some(1));
        producer.join().unwrap();
    }

    #[test]
    fn wait_for_frame_returns_none_when_finished_or_timed_out() {
        let mailbox = Mailbox::new();
        assert!(mailbox.wait_for_frame(0, Duration::from_millis(10)).is_none());

        let dispatcher = EventDispatcher::new(mailbox.clone(), None);
        dispatcher.finished();
        assert!(mailbox.wait_for_frame(0, Duration::from_secs(5)).is_none());
        assert!(mailbox.wait_until_finished(Duration::from_millis(1)));
    }

    #[test]
    fn reset_clears_session_slots_but_not_count() {
        let mailbox = Mailbox::new();
        let dispatcher = EventDispatcher::new(mailbox.clone(), None);
        dispatcher.frame_ready(frame(1));
        dispatcher.error(StreamError::AlreadyRunning);
        dispatcher.finished();

        mailbox.reset();
        assert!(mailbox.current_frame().is_none());
        assert!(!mailbox.has_error());
        assert!(!mailbox.is_finished());
        assert_eq!(mailbox.frames_received(), 1);
    }
}
