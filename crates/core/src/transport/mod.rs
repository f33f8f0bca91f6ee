//! Transport layer supplying the MJPEG body.
//!
//! The demuxer does not speak HTTP. It needs three things from the layer
//! below it, captured by [`Transport`]:
//!
//! - a status code, to reject error pages before reading them as video;
//! - the response headers, for the `Content-Type` boundary parameter;
//! - a blocking byte stream for the body, closed by dropping it.
//!
//! [`http::HttpTransport`] is a small default implementation over
//! `std::net::TcpStream` for plain `http://` cameras. Anything fancier
//! (TLS, proxies, digest auth) plugs in through the trait.

pub mod http;

use std::fmt;
use std::io::Read;

use crate::error::Result;

pub use http::HttpTransport;

/// Username/password pair for the stream endpoint.
#[derive(Clone, Default, PartialEq, Eq)]
pub struct Credentials {
    pub username: String,
    pub password: String,
}

impl Credentials {
    pub fn new(username: &str, password: &str) -> Self {
        Self {
            username: username.to_string(),
            password: password.to_string(),
        }
    }

    /// Both fields empty. Such credentials are not sent.
    pub fn is_empty(&self) -> bool {
        self.username.is_empty() && self.password.is_empty()
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// Opens a stream URI and returns its response.
///
/// Called once per session, on the session's worker thread. Must block
/// until response headers are available.
pub trait Transport: Send + Sync {
    fn open(&self, uri: &str, credentials: Option<&Credentials>) -> Result<Response>;
}

/// A response whose head has been read and whose body is ready to stream.
pub struct Response {
    pub status: u16,
    pub reason: String,
    /// Headers as ordered (name, value) pairs. Lookups via
    /// [`header`](Self::header) are case-insensitive.
    pub headers: Vec<(String, String)>,
    body: Box<dyn Read + Send>,
}

impl Response {
    pub fn new(
        status: u16,
        reason: &str,
        headers: Vec<(String, String)>,
        body: Box<dyn Read + Send>,
    ) -> Self {
        Self {
            status,
            reason: reason.to_string(),
            headers,
            body,
        }
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }

    pub fn content_type(&self) -> Option<&str> {
        self.header("Content-Type")
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    pub fn body_mut(&mut self) -> &mut (dyn Read + Send) {
        self.body.as_mut()
    }

    /// Release the underlying connection.
    pub fn close(self) {
        tracing::debug!(status = self.status, "response closed");
    }
}

impl fmt::Debug for Response {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Response")
            .field("status", &self.status)
            .field("reason", &self.reason)
            .field("headers", &self.headers)
            .finish_non_exhaustive()
    }
}
