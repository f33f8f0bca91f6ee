use std::fmt;
use std::ops::Deref;
use std::sync::Arc;

/// JPEG start-of-image marker. Every multipart body part begins with it.
pub const JPEG_SOI: [u8; 2] = [0xFF, 0xD8];

/// One complete JPEG image cut out of the stream.
///
/// The bytes run from the SOI marker up to (not including) the next
/// multipart delimiter, so a trailing `\r\n` sent by the server is kept.
/// Frames are immutable and clone in O(1); the mailbox and a handler can
/// hold the same frame without copying.
#[derive(Clone, PartialEq, Eq)]
pub struct Frame {
    sequence: u64,
    data: Arc<[u8]>,
}

impl Frame {
    pub(crate) fn new(sequence: u64, data: &[u8]) -> Self {
        Self {
            sequence,
            data: Arc::from(data),
        }
    }

    /// Position of this frame in its session, starting at 1.
    pub fn sequence(&self) -> u64 {
        self.sequence
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.data
    }

    pub fn to_vec(&self) -> Vec<u8> {
        self.data.to_vec()
    }
}

impl Deref for Frame {
    type Target = [u8];

    fn deref(&self) -> &[u8] {
        &self.data
    }
}

impl AsRef<[u8]> for Frame {
    fn as_ref(&self) -> &[u8] {
        &self.data
    }
}

impl fmt::Debug for Frame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Frame")
            .field("sequence", &self.sequence)
            .field("len", &self.data.len())
            .finish()
    }
}
