//! MJPEG (`multipart/x-mixed-replace`) stream demuxer.
//!
//! Pulls a camera's MJPEG body in fixed-size reads and cuts it into
//! complete JPEG frames for a rendering layer. JPEG decoding, HTTP beyond
//! a minimal GET, and reconnect policy are left to the caller.
//!
//! ## Layers
//!
//! | Module | Role |
//! |--------|------|
//! | [`search`] | forward/backward byte subsequence search |
//! | [`boundary`] | multipart delimiter from `Content-Type` |
//! | [`assembler`] | frame reassembly across read boundaries |
//! | [`session`] | state machine and worker read loop |
//! | [`dispatch`] | latest-frame mailbox and handler callbacks |
//! | [`transport`] | source of the response head and body |

pub mod assembler;
pub mod boundary;
pub mod dispatch;
pub mod error;
pub mod frame;
pub mod processor;
pub mod search;
pub mod session;
pub mod transport;

pub use assembler::FrameAssembler;
pub use boundary::BoundaryToken;
pub use dispatch::{Mailbox, StreamHandler};
pub use error::{ErrorKind, Result, StreamError};
pub use frame::Frame;
pub use processor::{StreamConfig, StreamProcessor};
pub use session::StreamState;
pub use transport::{Credentials, HttpTransport, Response, Transport};
