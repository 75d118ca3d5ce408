use std::io::{self, Read};

use crate::{Hasher, Result, SignatureVerifier, VerifyError};

/// Streaming reader that hashes data as it passes through.
/// Wraps any `Read` source so the bytes are touched once for both hashing and
/// whatever the caller does with them.
pub struct VerifiedReader<R, H> {
    reader:     R,
    hasher:     H,
    bytes_read: u64,
}

impl<R, H> VerifiedReader<R, H> {
    pub fn new(reader: R, hasher: H) -> Self {
        Self {
            reader,
            hasher,
            bytes_read: 0,
        }
    }

    /// Bytes yielded so far.
    pub fn bytes_read(&self) -> u64 { self.bytes_read }

    pub fn into_hasher(self) -> H { self.hasher }
}

impl<R: Read, H: Hasher> Read for VerifiedReader<R, H> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let n = self.reader.read(buf)?;
        if n > 0 {
            self.hasher.update(&buf[..n]);
            self.bytes_read += n as u64;
        }
        Ok(n)
    }
}

impl<R, H: Hasher> VerifiedReader<R, H> {
    /// Finalize against an expected digest.
    pub fn finish(self, expected: &[u8]) -> Result<()> {
        let actual = self.hasher.finalize();
        if actual == expected {
            Ok(())
        } else {
            Err(VerifyError::Mismatch {
                expected: expected.to_vec(),
                actual,
            })
        }
    }
}

impl<R, V: SignatureVerifier> VerifiedReader<R, V> {
    /// Finalize against a detached signature over everything read.
    pub fn finish_signature(self, signature: &V::Signature) -> Result<()> {
        self.hasher.verify(signature)
    }
}
