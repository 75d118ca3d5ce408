use sha2::Digest;

/// Incremental digest state fed by a streaming reader.
pub trait Hasher: Send {
    fn update(&mut self, data: &[u8]);
    fn finalize(self) -> Vec<u8>;
}

/// SHA-512 state. Ed25519ph pre-hashes with it, so the same value doubles as
/// the prehash handed to the signature check.
#[derive(Clone, Default)]
pub struct Sha512Hasher(sha2::Sha512);

impl Hasher for Sha512Hasher {
    fn update(&mut self, data: &[u8]) { self.0.update(data); }
    fn finalize(self) -> Vec<u8> { self.0.finalize().to_vec() }
}

impl Sha512Hasher {
    pub fn new() -> Self { Self(sha2::Sha512::new()) }

    pub fn digest(data: &[u8]) -> Vec<u8> { sha2::Sha512::digest(data).to_vec() }

    pub(crate) fn into_inner(self) -> sha2::Sha512 { self.0 }
}
