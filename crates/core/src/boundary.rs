//! Multipart delimiter derivation.
//!
//! An MJPEG server announces its part delimiter in the response header:
//!
//! ```text
//! Content-Type: multipart/x-mixed-replace; boundary=myboundary
//! ```
//!
//! and separates body parts with `--myboundary`. Some cameras already put
//! the leading dashes into the parameter (`boundary=--myboundary`); they
//! are not doubled.

use std::fmt;

use crate::error::{ProtocolErrorKind, Result, StreamError};

const DELIMITER_PREFIX: &str = "--";

/// Delimiter bytes separating multipart body parts.
///
/// Derived once per session and never mutated. Always non-empty and
/// always starts with `--`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BoundaryToken {
    bytes: Vec<u8>,
}

impl BoundaryToken {
    /// Derive the delimiter from a `Content-Type` header value.
    ///
    /// The header is split into `;`-separated parameters and the
    /// `boundary` parameter (case-insensitive name) is taken. Its value
    /// is everything after the first `=`, with quotes removed, prefixed
    /// with `--` unless already present.
    ///
    /// ## Examples
    ///
    /// ```
    /// use mjpeg::BoundaryToken;
    ///
    /// let token = BoundaryToken::from_content_type(
    ///     "multipart/x-mixed-replace; boundary=\"frame\"; charset=utf-8",
    /// ).unwrap();
    /// assert_eq!(token.as_bytes(), b"--frame");
    ///
    /// assert!(BoundaryToken::from_content_type("image/jpeg").is_err());
    /// ```
    pub fn from_content_type(content_type: &str) -> Result<Self> {
        let value = content_type
            .split(';')
            .filter_map(|param| param.split_once('='))
            .find(|(name, _)| name.trim().eq_ignore_ascii_case("boundary"))
            .map(|(_, value)| value)
            .ok_or(StreamError::protocol(ProtocolErrorKind::MissingBoundary))?;

        Self::new(&value.trim().replace('"', ""))
    }

    /// Build a token from a bare boundary value (`frame` or `--frame`).
    pub fn new(boundary: &str) -> Result<Self> {
        let boundary = boundary.trim();
        let bare = boundary.strip_prefix(DELIMITER_PREFIX).unwrap_or(boundary);
        if bare.is_empty() {
            return Err(StreamError::protocol(ProtocolErrorKind::EmptyBoundary));
        }

        let bytes = format!("{DELIMITER_PREFIX}{bare}").into_bytes();
        tracing::trace!(len = bytes.len(), "boundary token derived");
        Ok(Self { bytes })
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    /// Always `false`; present for API symmetry with `len`.
    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}

impl fmt::Display for BoundaryToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", String::from_utf8_lossy(&self.bytes))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn token(content_type: &str) -> Result<BoundaryToken> {
        BoundaryToken::from_content_type(content_type)
    }

    #[test]
    fn bare_boundary_gets_prefix() {
        let t = token("multipart/x-mixed-replace; boundary=myboundary").unwrap();
        assert_eq!(t.as_bytes(), b"--myboundary");
        assert_eq!(t.to_string(), "--myboundary");
    }

    #[test]
    fn prefixed_boundary_kept() {
        let t = token("multipart/x-mixed-replace;boundary=--ipcamera").unwrap();
        assert_eq!(t.as_bytes(), b"--ipcamera");
    }

    #[test]
    fn quoted_boundary_unquoted() {
        let t = token("multipart/x-mixed-replace; boundary=\"BoundaryString\"").unwrap();
        assert_eq!(t.as_bytes(), b"--BoundaryString");
    }

    #[test]
    fn parameter_name_case_insensitive() {
        let t = token("multipart/x-mixed-replace; Boundary=abc").unwrap();
        assert_eq!(t.as_bytes(), b"--abc");
    }

    #[test]
    fn trailing_parameter_not_part_of_token() {
        let t = token("multipart/x-mixed-replace; boundary=abc; charset=utf-8").unwrap();
        assert_eq!(t.as_bytes(), b"--abc");
    }

    #[test]
    fn value_split_on_first_equals() {
        let t = token("multipart/x-mixed-replace; boundary=a=b").unwrap();
        assert_eq!(t.as_bytes(), b"--a=b");
    }

    #[test]
    fn plain_jpeg_is_protocol_error() {
        let err = token("image/jpeg").unwrap_err();
        assert!(matches!(
            err,
            StreamError::Protocol {
                kind: ProtocolErrorKind::MissingBoundary
            }
        ));
    }

    #[test]
    fn other_parameter_without_boundary_is_protocol_error() {
        assert!(token("text/html; charset=utf-8").is_err());
    }

    #[test]
    fn empty_boundary_rejected() {
        for ct in [
            "multipart/x-mixed-replace; boundary=",
            "multipart/x-mixed-replace; boundary=\"\"",
            "multipart/x-mixed-replace; boundary=--",
        ] {
            let err = token(ct).unwrap_err();
            assert!(
                matches!(
                    err,
                    StreamError::Protocol {
                        kind: ProtocolErrorKind::EmptyBoundary
                    }
                ),
                "{ct}"
            );
        }
    }
}
