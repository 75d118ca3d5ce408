//! Sequential writes of the decompressed image to its destination.

use std::fs::File;
use std::io::{self, Cursor, Read, Write};

use crate::data::DEFAULT_WRITE_CHUNK_SIZE;
use crate::error::ChainError;

/// A sequential-write sink for the decompressed image.
///
/// `sync` runs once after the last byte; the default only flushes.
pub trait Destination: Write {
    fn sync(&mut self) -> io::Result<()> { self.flush() }
}

impl Destination for File {
    fn sync(&mut self) -> io::Result<()> {
        self.flush()?;
        self.sync_all()
    }
}

impl Destination for Vec<u8> {}

impl Destination for Cursor<Vec<u8>> {}

impl Destination for Cursor<&mut [u8]> {}

impl Destination for io::Sink {}

impl<D: Destination + ?Sized> Destination for &mut D {
    fn sync(&mut self) -> io::Result<()> { (**self).sync() }
}

impl<D: Destination + ?Sized> Destination for Box<D> {
    fn sync(&mut self) -> io::Result<()> { (**self).sync() }
}

/// Copy `input` to `destination` in order, `chunk_size` bytes at a time,
/// then sync. `written` counts every byte the destination accepted, including
/// those of a chunk that failed partway; `on_chunk` sees the running total
/// after every chunk.
pub(crate) fn copy_sequential<R, D>(
    mut input: R,
    destination: &mut D,
    chunk_size: usize,
    written: &mut u64,
    mut on_chunk: impl FnMut(u64),
) -> Result<(), ChainError>
where
    R: Read,
    D: Destination + ?Sized,
{
    let mut buf = vec![0u8; chunk_size.max(1)];
    loop {
        let n = match input.read(&mut buf) {
            Ok(0) => break,
            Ok(n) => n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(ChainError::Decode(e)),
        };
        write_counted(destination, &buf[..n], written).map_err(ChainError::Write)?;
        on_chunk(*written);
    }
    destination.sync().map_err(ChainError::Write)
}

/// `write_all` that adds each accepted piece to `written` as it lands.
fn write_counted<D: Destination + ?Sized>(destination: &mut D, mut chunk: &[u8], written: &mut u64) -> io::Result<()> {
    while !chunk.is_empty() {
        match destination.write(chunk) {
            Ok(0) => {
                return Err(io::Error::new(
                    io::ErrorKind::WriteZero,
                    "destination accepted no more bytes",
                ));
            }
            Ok(n) => {
                *written += n as u64;
                chunk = &chunk[n..];
            }
            Err(e) if e.kind() == io::ErrorKind::Interrupted => {}
            Err(e) => return Err(e),
        }
    }
    Ok(())
}

/// Write every byte of `decoded` to `destination`, returning the count.
///
/// Read failures are reported as [`ChainError::Decode`], short writes and
/// device errors as [`ChainError::Write`].
pub fn write_sequential<R, D>(decoded: R, destination: &mut D) -> Result<u64, ChainError>
where
    R: Read,
    D: Destination + ?Sized,
{
    let mut written = 0;
    copy_sequential(decoded, destination, DEFAULT_WRITE_CHUNK_SIZE, &mut written, |_| {})?;
    Ok(written)
}
