//! Duplicates the source stream into the verifier and the handoff.

use std::io::{self, Read};

use bytes::Bytes;

use crate::error::AbortReason;
use crate::handoff::{HandoffBuffer, HandoffReader};

/// Split `source` into two copies: the returned [`TeeReader`] (driven by the
/// verifier) and a [`HandoffReader`] seeing the same bytes in the same order.
pub fn tee<R: Read>(source: R, handoff: &HandoffBuffer) -> (TeeReader<'_, R>, HandoffReader<'_>) {
    (TeeReader::new(source, handoff), handoff.reader())
}

/// Reader that copies every byte it yields into a [`HandoffBuffer`] first.
///
/// Reads are capped at the handoff capacity, so the source is never read
/// further ahead than the slower side can hold. A source error aborts the
/// handoff before being returned; an abort from the other side turns into a
/// `ConnectionAborted` error here.
pub struct TeeReader<'a, R> {
    source:     R,
    handoff:    &'a HandoffBuffer,
    bytes_read: u64,
}

impl<'a, R> TeeReader<'a, R> {
    pub fn new(source: R, handoff: &'a HandoffBuffer) -> Self {
        Self {
            source,
            handoff,
            bytes_read: 0,
        }
    }

    pub fn bytes_read(&self) -> u64 { self.bytes_read }
}

impl<R: Read> Read for TeeReader<'_, R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        if buf.is_empty() {
            return Ok(0);
        }

        let limit = buf.len().min(self.handoff.capacity());
        let n = match self.source.read(&mut buf[..limit]) {
            Ok(n) => n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => return Err(e),
            Err(e) => {
                self.handoff.abort(AbortReason::Source(e.to_string()));
                return Err(e);
            }
        };
        if n == 0 {
            return Ok(0);
        }

        self.handoff.put(Bytes::copy_from_slice(&buf[..n]))?;
        self.bytes_read += n as u64;
        Ok(n)
    }
}
