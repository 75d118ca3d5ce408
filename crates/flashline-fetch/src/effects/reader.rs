use std::io::{self, Read};

use bytes::Bytes;
use futures_util::StreamExt;
use tokio::runtime::Handle;

use super::http::BoxStream;

/// Blocking [`Read`] over an async byte stream.
///
/// Each refill drives the stream with [`Handle::block_on`], so the reader
/// must be used from a thread outside the runtime's workers (a
/// `spawn_blocking` task or a plain OS thread); calling it from async
/// context panics.
pub struct StreamReader {
    stream:   BoxStream<'static, io::Result<Bytes>>,
    handle:   Handle,
    current:  Bytes,
    finished: bool,
}

impl StreamReader {
    pub fn new(stream: BoxStream<'static, io::Result<Bytes>>, handle: Handle) -> Self {
        Self {
            stream,
            handle,
            current: Bytes::new(),
            finished: false,
        }
    }
}

impl Read for StreamReader {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        if buf.is_empty() {
            return Ok(0);
        }

        while self.current.is_empty() {
            if self.finished {
                return Ok(0);
            }
            match self.handle.block_on(self.stream.next()) {
                Some(Ok(chunk)) => self.current = chunk,
                Some(Err(e)) => return Err(e),
                None => self.finished = true,
            }
        }

        let n = buf.len().min(self.current.len());
        let chunk = self.current.split_to(n);
        buf[..n].copy_from_slice(&chunk);
        Ok(n)
    }
}

impl std::fmt::Debug for StreamReader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StreamReader")
            .field("buffered", &self.current.len())
            .field("finished", &self.finished)
            .finish_non_exhaustive()
    }
}
