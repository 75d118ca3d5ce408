use std::fs::{self, File};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use clap::Args;
use flashline_fetch::{ReqwestClient, SourceFetcher};
use flashline_pipeline::{Pipeline, TransferResult};
use flashline_verify::{Ed25519Verifier, PublicKey};
use tracing::info;

use crate::config::{Config, Overrides};
use crate::device;
use crate::progress::TransferBar;

#[derive(Clone, Debug, Args)]
pub struct InstallArg {
    /// Device to write the image to, e.g. /dev/sda.
    #[arg(short = 'd', long)]
    pub device: PathBuf,

    /// Release version to install (e.g. current).
    #[arg(short = 'V', long = "release")]
    pub release: Option<String>,

    /// Release channel (e.g. beta).
    #[arg(short = 'C', long)]
    pub channel: Option<String>,

    /// OEM flavour of the image (e.g. ami).
    #[arg(short = 'o', long)]
    pub oem: Option<String>,

    /// Image mirror URL, replacing the channel's public mirror.
    #[arg(short = 'b', long = "base-url")]
    pub base_url: Option<String>,

    /// Board name in the public mirror path.
    #[arg(long)]
    pub board: Option<String>,

    /// Release public key: a file, or the key itself.
    #[arg(short = 'k', long = "public-key")]
    pub public_key: Option<String>,

    /// Signature context string the release was signed with.
    #[arg(long)]
    pub context: Option<String>,

    /// Spool the image and write the device only after the signature checks out.
    #[arg(long)]
    pub verify_first: bool,

    /// Directory for the spool file used by --verify-first.
    #[arg(short = 't', long = "spool-dir")]
    pub spool_dir: Option<PathBuf>,

    /// Bytes buffered between the verifier and the decompressor.
    #[arg(long)]
    pub handoff_capacity: Option<usize>,

    /// Install a local compressed image instead of downloading one.
    #[arg(long, conflicts_with_all = ["release", "channel", "oem", "base_url", "board"])]
    pub image: Option<PathBuf>,

    /// Detached signature of --image (default: the image path plus ".sig").
    #[arg(long, requires = "image")]
    pub signature: Option<PathBuf>,
}

impl From<&InstallArg> for Overrides {
    fn from(args: &InstallArg) -> Self {
        Self {
            channel:          args.channel.clone(),
            version:          args.release.clone(),
            board:            args.board.clone(),
            oem:              args.oem.clone(),
            base_url:         args.base_url.clone(),
            public_key:       args.public_key.clone(),
            context:          args.context.clone(),
            verify_first:     args.verify_first.then_some(true),
            spool_dir:        args.spool_dir.clone(),
            handoff_capacity: args.handoff_capacity,
        }
    }
}

pub fn run(args: &InstallArg, config: &Config) -> Result<TransferResult> {
    let key = load_public_key(config.public_key.as_deref())?;
    info!(fingerprint = %key.fingerprint(), "using release key");

    let verifier = match &config.context {
        Some(context) => Ed25519Verifier::new(key).with_context(context.as_bytes())?,
        None => Ed25519Verifier::new(key),
    };

    let mut destination = device::open(&args.device)?;
    let bar = TransferBar::new("Installing");
    let pipeline = Pipeline::new(config.pipeline_options().on_progress(bar.callback()));

    let result = match &args.image {
        Some(image) => {
            let signature_path = match &args.signature {
                Some(path) => path.clone(),
                None => signature_path(image),
            };
            let signature = fs::read(&signature_path)
                .with_context(|| format!("reading signature {}", signature_path.display()))?;
            let source = File::open(image).with_context(|| format!("opening image {}", image.display()))?;

            info!(image = %image.display(), device = %args.device.display(), "installing local image");
            pipeline.run(source, &signature, verifier, &mut destination)
        }
        None => {
            let runtime = tokio::runtime::Builder::new_multi_thread()
                .enable_all()
                .build()
                .context("starting async runtime")?;
            let client = ReqwestClient::new(config.timeouts()).context("building HTTP client")?;
            let fetcher = SourceFetcher::new(client, config.fetch_options());

            let release = runtime
                .block_on(fetcher.fetch_release(&config.locator()))
                .context("retrieving release")?;
            info!(image = %release.image.url, device = %args.device.display(), "installing release");

            // The pipeline's threads pull the body through the runtime handle.
            let source = release.image.into_reader(runtime.handle().clone());
            pipeline.run(source, &release.signature, verifier, &mut destination)
        }
    };

    bar.finish(&result);
    Ok(result)
}

/// `<image>.sig` next to the image.
pub fn signature_path(image: &Path) -> PathBuf {
    let mut name = image.as_os_str().to_owned();
    name.push(".sig");
    PathBuf::from(name)
}

/// A key given as a path is read from disk; anything else is parsed as the
/// key itself.
fn load_public_key(value: Option<&str>) -> Result<PublicKey> {
    let Some(value) = value else {
        bail!("no release public key configured; pass --public-key or set public_key");
    };

    let path = Path::new(value);
    if path.is_file() {
        let bytes = fs::read(path).with_context(|| format!("reading public key {}", path.display()))?;
        return PublicKey::parse(&bytes).with_context(|| format!("parsing public key {}", path.display()));
    }
    PublicKey::parse(value.as_bytes()).context("parsing public key")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cli::sign::{SignArg, run as sign};
    use bzip2::Compression;
    use bzip2::write::BzEncoder;
    use flashline_pipeline::{FailureReason, Outcome, Verdict};
    use flashline_verify::SecretKey;
    use std::io::Write;

    const SEED: [u8; 32] = [3; 32];

    struct Release {
        _dir:    tempfile::TempDir,
        image:   Vec<u8>,
        path:    PathBuf,
        seed:    PathBuf,
        device:  PathBuf,
        key_hex: String,
    }

    fn release(context: Option<&str>) -> Release {
        let dir = tempfile::tempdir().unwrap();
        let image: Vec<u8> = (0..300_000u32).map(|i| (i * 7 % 253) as u8).collect();

        let path = dir.path().join("coreos_production_image.bin.bz2");
        let mut encoder = BzEncoder::new(File::create(&path).unwrap(), Compression::default());
        encoder.write_all(&image).unwrap();
        encoder.finish().unwrap();

        let seed = dir.path().join("release.seed");
        fs::write(&seed, hex::encode(SEED)).unwrap();
        sign(&SignArg {
            key:     seed.clone(),
            context: context.map(str::to_string),
            image:   path.clone(),
            output:  None,
        })
        .unwrap();

        let device = dir.path().join("disk.img");
        fs::write(&device, b"").unwrap();

        let key_hex = hex::encode(SecretKey::from_seed(SEED).public_key().to_bytes());
        Release {
            _dir: dir,
            image,
            path,
            seed,
            device,
            key_hex,
        }
    }

    fn args(release: &Release) -> InstallArg {
        InstallArg {
            device:           release.device.clone(),
            release:          None,
            channel:          None,
            oem:              None,
            base_url:         None,
            board:            None,
            public_key:       None,
            context:          None,
            verify_first:     false,
            spool_dir:        None,
            handoff_capacity: None,
            image:            Some(release.path.clone()),
            signature:        None,
        }
    }

    fn config(release: &Release) -> Config {
        Config {
            public_key: Some(release.key_hex.clone()),
            ..Config::default()
        }
    }

    #[test]
    fn test_local_install_round_trip() {
        let release = release(None);
        let result = run(&args(&release), &config(&release)).unwrap();

        assert!(result.is_success(), "{result:?}");
        assert_eq!(result.verdict, Verdict::Valid);
        assert!(fs::read(&release.device).unwrap() == release.image);
    }

    #[test]
    fn test_context_must_match() {
        let release = release(Some("flashline-test"));

        let result = run(&args(&release), &config(&release)).unwrap();
        assert_eq!(result.outcome, Outcome::Aborted(FailureReason::VerificationFailed));

        let config = Config {
            context: Some("flashline-test".into()),
            ..config(&release)
        };
        assert!(run(&args(&release), &config).unwrap().is_success());
    }

    #[test]
    fn test_verify_first_leaves_device_alone_on_bad_signature() {
        let release = release(None);
        let mut signature = fs::read(signature_path(&release.path)).unwrap();
        signature[40] ^= 0x10;
        let forged = release.path.with_extension("forged");
        fs::write(&forged, signature).unwrap();

        let args = InstallArg {
            signature: Some(forged),
            ..args(&release)
        };
        let config = Config {
            verify_first: true,
            ..config(&release)
        };
        let result = run(&args, &config).unwrap();

        assert_eq!(result.outcome, Outcome::Aborted(FailureReason::VerificationFailed));
        assert_eq!(result.bytes_written, 0);
        assert!(fs::read(&release.device).unwrap().is_empty());
    }

    #[test]
    fn test_key_from_file_and_missing_key() {
        let release = release(None);
        let key_file = release.seed.with_file_name("release.pub");
        fs::write(&key_file, format!("{}\n", release.key_hex)).unwrap();

        let config = Config {
            public_key: Some(key_file.display().to_string()),
            ..Config::default()
        };
        assert!(run(&args(&release), &config).unwrap().is_success());

        let err = run(&args(&release), &Config::default()).unwrap_err();
        assert!(err.to_string().contains("no release public key"), "{err:#}");
    }

    #[test]
    fn test_signature_path() {
        assert_eq!(
            signature_path(Path::new("/srv/coreos_production_image.bin.bz2")),
            PathBuf::from("/srv/coreos_production_image.bin.bz2.sig")
        );
    }
}
