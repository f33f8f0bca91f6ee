//! Frame reassembly across read boundaries.
//!
//! Reads from the transport arrive in fixed-size chunks that have nothing
//! to do with frame boundaries. A delimiter, or even the two-byte SOI
//! marker, may straddle two reads, and one read may hold the tail of one
//! frame, several whole frames and the head of the next. The assembler
//! copes with all of these without losing or duplicating a byte:
//!
//! ```text
//!   read 1              read 2                read 3
//! |..hdr FFD8 jpeg...|...jpeg \r\n --bou|ndary\r\nhdr FFD8 ...|
//!        ^ begin_frame                ^ token straddles reads
//!                                          ^ leftover seeds next search
//! ```

use crate::boundary::BoundaryToken;
use crate::error::{Result, StreamError};
use crate::frame::{Frame, JPEG_SOI};
use crate::search::find_forward;

/// Default assembly capacity (1 MiB).
pub const DEFAULT_BUFFER_CAPACITY: usize = 1024 * 1024;

/// Outcome of pushing bytes into an in-progress frame.
#[derive(Debug)]
pub enum Assembled {
    /// No delimiter yet; all bytes were absorbed.
    Pending,
    /// The delimiter was found. `consumed` is the offset in the pushed
    /// chunk just past the delimiter; the bytes after it belong to whatever
    /// follows and must be searched again.
    Complete { frame: Frame, consumed: usize },
}

/// Accumulates one JPEG frame at a time out of an MJPEG body.
///
/// The working buffer is owned exclusively by the stream worker. Its frame
/// content never exceeds `capacity`; a frame that would is aborted with
/// [`StreamError::BufferOverflow`] and nothing of it is delivered.
#[derive(Debug)]
pub struct FrameAssembler {
    boundary: BoundaryToken,
    buffer: Vec<u8>,
    capacity: usize,
    in_progress: bool,
    /// The previous chunk ended in `0xFF` while seeking an SOI marker.
    pending_soi: bool,
    next_sequence: u64,
}

impl FrameAssembler {
    pub fn new(boundary: BoundaryToken) -> Self {
        Self::with_capacity(boundary, DEFAULT_BUFFER_CAPACITY)
    }

    /// Create an assembler whose frames may be at most `capacity` bytes.
    pub fn with_capacity(boundary: BoundaryToken, capacity: usize) -> Self {
        let capacity = capacity.max(1);
        // Up to `len - 1` bytes of a possibly split delimiter sit behind the
        // frame content while waiting for the next read.
        let buffer = Vec::with_capacity(capacity + boundary.len());
        Self {
            boundary,
            buffer,
            capacity,
            in_progress: false,
            pending_soi: false,
            next_sequence: 1,
        }
    }

    pub fn boundary(&self) -> &BoundaryToken {
        &self.boundary
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Bytes accumulated for the in-progress frame.
    pub fn len(&self) -> usize {
        self.buffer.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }

    pub fn is_in_progress(&self) -> bool {
        self.in_progress
    }

    /// Drop any partially accumulated frame and go back to seeking an SOI
    /// marker.
    pub fn reset(&mut self) {
        if self.in_progress {
            tracing::trace!(discarded = self.buffer.len(), "partial frame discarded");
        }
        self.buffer.clear();
        self.in_progress = false;
        self.pending_soi = false;
    }

    /// Start a new frame with `chunk[start..]`, where `start` is the index
    /// of the SOI marker.
    ///
    /// The same chunk may already contain the end delimiter, so the copied
    /// bytes are scanned exactly as [`append_chunk`](Self::append_chunk)
    /// would. A returned `consumed` offset is relative to `chunk`, not to
    /// `start`.
    pub fn begin_frame(&mut self, chunk: &[u8], start: usize) -> Result<Assembled> {
        self.buffer.clear();
        self.in_progress = true;
        self.pending_soi = false;

        tracing::trace!(start, "frame start marker found");

        Ok(match self.append_chunk(&chunk[start..])? {
            Assembled::Complete { frame, consumed } => Assembled::Complete {
                frame,
                consumed: start + consumed,
            },
            Assembled::Pending => Assembled::Pending,
        })
    }

    /// Push the next read into the in-progress frame.
    ///
    /// A delimiter that began in an earlier read and ends in this one is
    /// found too. Bytes pushed while no frame is in progress are ignored.
    pub fn append_chunk(&mut self, chunk: &[u8]) -> Result<Assembled> {
        if !self.in_progress {
            return Ok(Assembled::Pending);
        }

        let token_len = self.boundary.len();

        // A delimiter split across reads can only start within the last
        // `token_len - 1` buffered bytes.
        let overlap = self.buffer.len().min(token_len - 1);
        if overlap > 0 && !chunk.is_empty() {
            let seam_start = self.buffer.len() - overlap;
            let head = chunk.len().min(token_len - 1);

            let mut seam = Vec::with_capacity(overlap + head);
            seam.extend_from_slice(&self.buffer[seam_start..]);
            seam.extend_from_slice(&chunk[..head]);

            if let Some(at) = find_forward(&seam, self.boundary.as_bytes()) {
                self.buffer.truncate(seam_start + at);
                return self.finish(at + token_len - overlap);
            }
        }

        if let Some(at) = find_forward(chunk, self.boundary.as_bytes()) {
            let frame_len = self.buffer.len() + at;
            if frame_len > self.capacity {
                return Err(self.overflow(frame_len));
            }
            self.buffer.extend_from_slice(&chunk[..at]);
            return self.finish(at + token_len);
        }

        let buffered = self.buffer.len() + chunk.len();
        if buffered.saturating_sub(token_len - 1) > self.capacity {
            return Err(self.overflow(buffered));
        }
        self.buffer.extend_from_slice(chunk);

        Ok(Assembled::Pending)
    }

    /// Push one read through the assembler, invoking `on_frame` for every
    /// frame it completes, in stream order.
    ///
    /// Leftover bytes after a delimiter are searched immediately for the
    /// next SOI marker, so a single read may yield any number of frames.
    /// Frames completed before an overflow in the same read are still
    /// delivered.
    pub fn feed(&mut self, chunk: &[u8], mut on_frame: impl FnMut(Frame)) -> Result<()> {
        let mut rest = chunk;

        while !rest.is_empty() {
            let outcome = if self.in_progress {
                self.append_chunk(rest)?
            } else if self.pending_soi && rest[0] == JPEG_SOI[1] {
                // SOI split across reads: 0xFF ended the previous chunk.
                self.buffer.clear();
                self.buffer.push(JPEG_SOI[0]);
                self.in_progress = true;
                self.pending_soi = false;
                self.append_chunk(rest)?
            } else {
                match find_forward(rest, &JPEG_SOI) {
                    Some(start) => self.begin_frame(rest, start)?,
                    None => {
                        self.pending_soi = rest.last() == Some(&JPEG_SOI[0]);
                        break;
                    }
                }
            };

            match outcome {
                Assembled::Complete { frame, consumed } => {
                    on_frame(frame);
                    rest = &rest[consumed..];
                }
                Assembled::Pending => break,
            }
        }

        Ok(())
    }

    fn finish(&mut self, consumed: usize) -> Result<Assembled> {
        if self.buffer.len() > self.capacity {
            let attempted = self.buffer.len();
            return Err(self.overflow(attempted));
        }

        let frame = Frame::new(self.next_sequence, &self.buffer);
        self.next_sequence += 1;
        self.buffer.clear();
        self.in_progress = false;

        tracing::trace!(sequence = frame.sequence(), len = frame.len(), "frame complete");

        Ok(Assembled::Complete { frame, consumed })
    }

    fn overflow(&mut self, attempted: usize) -> StreamError {
        tracing::warn!(
            capacity = self.capacity,
            attempted,
            "frame exceeds assembly buffer, aborting"
        );
        self.reset();
        StreamError::BufferOverflow {
            capacity: self.capacity,
            attempted,
        }
    }
}
