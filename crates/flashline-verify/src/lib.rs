//! Detached signature verification for streamed disk images.
//!
//! Provides incremental hashing and Ed25519ph verification so an artifact can
//! be checked in the same pass that moves it, without buffering it anywhere.
//!
//! # Key Features
//!
//! - **Single pass**: every byte is hashed as it streams through a [`VerifiedReader`]
//! - **Pre-hashed signatures**: Ed25519ph needs only the SHA-512 state at EOF
//! - **Extensible**: the [`Hasher`] / [`SignatureVerifier`] seams allow other schemes
//!
//! # Example
//!
//! ```
//! use flashline_verify::{Ed25519Signer, Ed25519Verifier, Hasher, SecretKey, VerifiedReader};
//!
//! let secret = SecretKey::from_seed([7u8; 32]);
//! let mut signer = Ed25519Signer::new(secret.clone());
//! signer.update(b"image bytes");
//! let signature = signer.sign().unwrap();
//!
//! let mut reader = VerifiedReader::new(&b"image bytes"[..], Ed25519Verifier::new(secret.public_key()));
//! std::io::copy(&mut reader, &mut std::io::sink()).unwrap();
//! reader.finish_signature(&signature).unwrap();
//! ```

pub use self::error::{Result, VerifyError};
pub use self::hasher::{Hasher, Sha512Hasher};
pub use self::reader::VerifiedReader;
pub use self::signature::{
    DetachedSignature, Ed25519Signer, Ed25519Verifier, MAX_CONTEXT_LEN, PublicKey, SecretKey, SignatureVerifier,
};

mod error;
mod hasher;
mod reader;
mod signature;
