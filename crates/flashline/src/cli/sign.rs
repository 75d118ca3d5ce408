use std::fs::{self, File};
use std::io::{self, Read};
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Args;
use flashline_verify::{Ed25519Signer, Hasher, SecretKey};
use tracing::info;

use super::install::signature_path;

const CHUNK_SIZE: usize = 1 << 20;

#[derive(Clone, Debug, Args)]
pub struct SignArg {
    /// File holding the 32-byte Ed25519 seed (raw, hex or base64).
    #[arg(short = 'k', long)]
    pub key: PathBuf,

    /// Context string to bind the signature to.
    #[arg(long)]
    pub context: Option<String>,

    /// Compressed image to sign.
    pub image: PathBuf,

    /// Where to write the signature (default: the image path plus ".sig").
    #[arg(short = 'O', long)]
    pub output: Option<PathBuf>,
}

/// Sign the image exactly as it will be served and write the raw 64-byte
/// signature. Returns the signature path.
pub fn run(args: &SignArg) -> Result<PathBuf> {
    let seed = fs::read(&args.key).with_context(|| format!("reading secret key {}", args.key.display()))?;
    let key = SecretKey::parse(&seed).context("parsing secret key")?;
    info!(fingerprint = %key.public_key().fingerprint(), image = %args.image.display(), "signing");

    let signer = match &args.context {
        Some(context) => Ed25519Signer::new(key).with_context(context.as_bytes())?,
        None => Ed25519Signer::new(key),
    };
    let image = File::open(&args.image).with_context(|| format!("opening image {}", args.image.display()))?;
    let signature = feed(image, signer)
        .with_context(|| format!("reading image {}", args.image.display()))?
        .sign()?;

    let out = match &args.output {
        Some(path) => path.clone(),
        None => signature_path(&args.image),
    };
    fs::write(&out, signature.to_bytes()).with_context(|| format!("writing {}", out.display()))?;
    Ok(out)
}

fn feed<H: Hasher>(mut input: impl Read, mut hasher: H) -> io::Result<H> {
    let mut buf = vec![0u8; CHUNK_SIZE];
    loop {
        match input.read(&mut buf) {
            Ok(0) => return Ok(hasher),
            Ok(n) => hasher.update(&buf[..n]),
            Err(e) if e.kind() == io::ErrorKind::Interrupted => {}
            Err(e) => return Err(e),
        }
    }
}
