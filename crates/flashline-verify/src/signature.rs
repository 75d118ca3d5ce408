//! Detached Ed25519ph signatures over streamed artifacts.
//!
//! The publisher signs the SHA-512 prehash of the exact distributed bytes
//! (RFC 8032 Ed25519ph), so a consumer can verify while streaming and only
//! needs the digest state once the stream ends.

use std::fmt;

use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use ed25519_dalek::pkcs8::DecodePublicKey;
use ed25519_dalek::{Signature, SigningKey, VerifyingKey};
use sha2::Digest;

use crate::{Hasher, Result, Sha512Hasher, VerifyError};

/// Largest context string Ed25519ph accepts.
pub const MAX_CONTEXT_LEN: usize = 255;

/// A hasher that can also judge a detached signature over what it hashed.
pub trait SignatureVerifier: Hasher {
    type Signature: Send + Sync;

    /// Decode a signature blob. Called once, before any data is consumed.
    fn parse_signature(&self, blob: &[u8]) -> Result<Self::Signature>;

    /// Check the signature against everything fed through `update`.
    fn verify(self, signature: &Self::Signature) -> Result<()>;
}

/// Decode a fixed-size value given as raw bytes, hex or base64.
fn decode_fixed<const N: usize>(blob: &[u8]) -> std::result::Result<[u8; N], String> {
    if let Ok(raw) = <[u8; N]>::try_from(blob) {
        return Ok(raw);
    }

    let text = std::str::from_utf8(blob)
        .map_err(|_| format!("expected {N} raw bytes, hex or base64, got {} binary bytes", blob.len()))?;
    let compact: String = text.split_ascii_whitespace().collect();
    if compact.is_empty() {
        return Err("empty input".to_string());
    }

    let decoded = if compact.len() == N * 2 && compact.bytes().all(|b| b.is_ascii_hexdigit()) {
        hex::decode(&compact).map_err(|e| format!("invalid hex: {e}"))?
    } else {
        BASE64
            .decode(&compact)
            .map_err(|e| format!("neither hex nor base64: {e}"))?
    };

    <[u8; N]>::try_from(decoded.as_slice())
        .map_err(|_| format!("decoded {} bytes, expected {N}", decoded.len()))
}

fn check_context(context: &[u8]) -> Result<()> {
    if context.len() > MAX_CONTEXT_LEN {
        return Err(VerifyError::ContextTooLong(context.len()));
    }
    Ok(())
}

/// A 64-byte detached signature.
#[derive(Clone, Copy, PartialEq, Eq)]
pub struct DetachedSignature(Signature);

impl DetachedSignature {
    /// Accepts raw bytes, hex or base64, surrounding whitespace ignored.
    pub fn parse(blob: &[u8]) -> Result<Self> {
        let bytes = decode_fixed::<{ Signature::BYTE_SIZE }>(blob).map_err(VerifyError::SignatureMalformed)?;
        Ok(Self(Signature::from_bytes(&bytes)))
    }

    pub fn to_bytes(&self) -> [u8; 64] { self.0.to_bytes() }

    pub fn to_hex(&self) -> String { hex::encode(self.to_bytes()) }
}

impl fmt::Debug for DetachedSignature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "DetachedSignature({}..)", &self.to_hex()[..16])
    }
}

/// Ed25519 public key of the image publisher.
#[derive(Clone, Copy, PartialEq, Eq)]
pub struct PublicKey(VerifyingKey);

impl PublicKey {
    /// Accepts raw bytes, hex, base64 or an SPKI PEM document.
    pub fn parse(blob: &[u8]) -> Result<Self> {
        if let Ok(text) = std::str::from_utf8(blob)
            && text.trim_start().starts_with("-----BEGIN")
        {
            return VerifyingKey::from_public_key_pem(text.trim())
                .map(Self)
                .map_err(|e| VerifyError::KeyMalformed(format!("invalid PEM: {e}")));
        }

        let bytes = decode_fixed::<32>(blob).map_err(VerifyError::KeyMalformed)?;
        VerifyingKey::from_bytes(&bytes)
            .map(Self)
            .map_err(|_| VerifyError::KeyMalformed("not a valid curve point".to_string()))
    }

    pub fn to_bytes(&self) -> [u8; 32] { self.0.to_bytes() }

    /// Short identifier for logs: the first 8 bytes of the key's SHA-256.
    pub fn fingerprint(&self) -> String {
        hex::encode(&sha2::Sha256::digest(self.0.as_bytes())[..8])
    }
}

impl fmt::Debug for PublicKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "PublicKey({})", self.fingerprint())
    }
}

/// Ed25519 secret seed used by publishers to sign images.
#[derive(Clone)]
pub struct SecretKey(SigningKey);

impl SecretKey {
    /// Accepts a 32-byte seed as raw bytes, hex or base64.
    pub fn parse(blob: &[u8]) -> Result<Self> {
        let seed = decode_fixed::<32>(blob).map_err(VerifyError::KeyMalformed)?;
        Ok(Self(SigningKey::from_bytes(&seed)))
    }

    pub fn from_seed(seed: [u8; 32]) -> Self { Self(SigningKey::from_bytes(&seed)) }

    pub fn public_key(&self) -> PublicKey { PublicKey(self.0.verifying_key()) }
}

impl fmt::Debug for SecretKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SecretKey(for {})", self.public_key().fingerprint())
    }
}

/// Streaming Ed25519ph verifier.
pub struct Ed25519Verifier {
    key:     PublicKey,
    context: Option<Vec<u8>>,
    hasher:  Sha512Hasher,
}

impl Ed25519Verifier {
    pub fn new(key: PublicKey) -> Self {
        Self {
            key,
            context: None,
            hasher: Sha512Hasher::new(),
        }
    }

    /// Bind verification to a context string the publisher signed with.
    pub fn with_context(mut self, context: impl Into<Vec<u8>>) -> Result<Self> {
        let context = context.into();
        check_context(&context)?;
        self.context = Some(context);
        Ok(self)
    }

    pub fn key(&self) -> &PublicKey { &self.key }
}

impl Hasher for Ed25519Verifier {
    fn update(&mut self, data: &[u8]) { self.hasher.update(data); }
    fn finalize(self) -> Vec<u8> { self.hasher.finalize() }
}

impl SignatureVerifier for Ed25519Verifier {
    type Signature = DetachedSignature;

    fn parse_signature(&self, blob: &[u8]) -> Result<DetachedSignature> { DetachedSignature::parse(blob) }

    fn verify(self, signature: &DetachedSignature) -> Result<()> {
        self.key
            .0
            .verify_prehashed(self.hasher.into_inner(), self.context.as_deref(), &signature.0)
            .map_err(|_| VerifyError::BadSignature)
    }
}

/// Streaming Ed25519ph signer, the publisher-side counterpart of [`Ed25519Verifier`].
pub struct Ed25519Signer {
    key:     SecretKey,
    context: Option<Vec<u8>>,
    hasher:  Sha512Hasher,
}

impl Ed25519Signer {
    pub fn new(key: SecretKey) -> Self {
        Self {
            key,
            context: None,
            hasher: Sha512Hasher::new(),
        }
    }

    pub fn with_context(mut self, context: impl Into<Vec<u8>>) -> Result<Self> {
        let context = context.into();
        check_context(&context)?;
        self.context = Some(context);
        Ok(self)
    }

    pub fn sign(self) -> Result<DetachedSignature> {
        self.key
            .0
            .sign_prehashed(self.hasher.into_inner(), self.context.as_deref())
            .map(DetachedSignature)
            .map_err(|_| VerifyError::ContextTooLong(self.context.as_ref().map_or(0, Vec::len)))
    }
}

impl Hasher for Ed25519Signer {
    fn update(&mut self, data: &[u8]) { self.hasher.update(data); }
    fn finalize(self) -> Vec<u8> { self.hasher.finalize() }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::RngCore;
    use rand::rngs::OsRng;

    fn keypair() -> (SecretKey, PublicKey) {
        let mut seed = [0u8; 32];
        OsRng.fill_bytes(&mut seed);
        let secret = SecretKey::from_seed(seed);
        let public = secret.public_key();
        (secret, public)
    }

    fn sign(secret: &SecretKey, data: &[u8], context: Option<&[u8]>) -> DetachedSignature {
        let mut signer = Ed25519Signer::new(secret.clone());
        if let Some(ctx) = context {
            signer = signer.with_context(ctx).unwrap();
        }
        for chunk in data.chunks(7) {
            signer.update(chunk);
        }
        signer.sign().unwrap()
    }

    fn verify(public: PublicKey, data: &[u8], context: Option<&[u8]>, sig: &DetachedSignature) -> Result<()> {
        let mut verifier = Ed25519Verifier::new(public);
        if let Some(ctx) = context {
            verifier = verifier.with_context(ctx).unwrap();
        }
        verifier.update(data);
        verifier.verify(sig)
    }

    #[test]
    fn test_sign_then_verify_across_chunk_boundaries() {
        let (secret, public) = keypair();
        let data = b"coreos production image, pretend it is compressed";
        let sig = sign(&secret, data, None);
        verify(public, data, None, &sig).unwrap();
    }

    #[test]
    fn test_tampered_data_is_rejected() {
        let (secret, public) = keypair();
        let sig = sign(&secret, b"original bytes", None);
        assert!(matches!(
            verify(public, b"original bytez", None, &sig),
            Err(VerifyError::BadSignature)
        ));
    }

    #[test]
    fn test_wrong_key_is_rejected() {
        let (secret, _) = keypair();
        let (_, other) = keypair();
        let sig = sign(&secret, b"data", None);
        assert!(matches!(verify(other, b"data", None, &sig), Err(VerifyError::BadSignature)));
    }

    #[test]
    fn test_context_must_match() {
        let (secret, public) = keypair();
        let sig = sign(&secret, b"data", Some(b"stable"));
        verify(public, b"data", Some(b"stable"), &sig).unwrap();
        assert!(verify(public, b"data", Some(b"beta"), &sig).is_err());
        assert!(verify(public, b"data", None, &sig).is_err());
    }

    #[test]
    fn test_context_too_long() {
        let (_, public) = keypair();
        let err = Ed25519Verifier::new(public).with_context(vec![0u8; 256]).err().unwrap();
        assert!(matches!(err, VerifyError::ContextTooLong(256)));
    }

    #[test]
    fn test_signature_encodings() {
        let (secret, _) = keypair();
        let sig = sign(&secret, b"data", None);
        let raw = sig.to_bytes();

        assert_eq!(DetachedSignature::parse(&raw).unwrap(), sig);
        assert_eq!(DetachedSignature::parse(format!("{}\n", sig.to_hex()).as_bytes()).unwrap(), sig);
        assert_eq!(DetachedSignature::parse(BASE64.encode(raw).as_bytes()).unwrap(), sig);
    }

    #[test]
    fn test_malformed_signatures() {
        let blobs: [&[u8]; 6] = [b"", b"   \n", b"short", &[0xff; 63], &[0xff; 65], b"zz"];
        for blob in blobs {
            assert!(
                matches!(DetachedSignature::parse(blob), Err(VerifyError::SignatureMalformed(_))),
                "blob {blob:?} should be malformed"
            );
        }
    }

    #[test]
    fn test_public_key_encodings() {
        let (_, public) = keypair();
        let raw = public.to_bytes();

        assert_eq!(PublicKey::parse(&raw).unwrap(), public);
        assert_eq!(PublicKey::parse(hex::encode(raw).as_bytes()).unwrap(), public);
        assert_eq!(PublicKey::parse(BASE64.encode(raw).as_bytes()).unwrap(), public);
        assert_eq!(public.fingerprint().len(), 16);
    }

    #[test]
    fn test_public_key_pem() {
        // RFC 8410 example key.
        let pem = "-----BEGIN PUBLIC KEY-----\n\
                   MCowBQYDK2VwAyEAGb9ECWmEzf6FQbrBZ9w7lshQhqowtrbLDFw4rXAxZuE=\n\
                   -----END PUBLIC KEY-----\n";
        let key = PublicKey::parse(pem.as_bytes()).unwrap();
        assert_eq!(
            hex::encode(key.to_bytes()),
            "19bf44096984cdfe8541bac167dc3b96c85086aa30b6b6cb0c5c38ad703166e1"
        );
    }

    #[test]
    fn test_malformed_public_key() {
        assert!(matches!(PublicKey::parse(b"nope"), Err(VerifyError::KeyMalformed(_))));
        assert!(matches!(
            PublicKey::parse(b"-----BEGIN PUBLIC KEY-----\ngarbage\n-----END PUBLIC KEY-----"),
            Err(VerifyError::KeyMalformed(_))
        ));
    }
}
