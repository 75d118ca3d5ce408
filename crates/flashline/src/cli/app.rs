use std::path::PathBuf;

use anyhow::{Context, Result, ensure};
use clap::{Parser, Subcommand};
use console::style;
use flashline_pipeline::Outcome;

use super::install::{self, InstallArg};
use super::sign::{self, SignArg};
use crate::config::{Config, Overrides};
use crate::exit_codes;

#[derive(Clone, Debug, Parser)]
#[command(name = "flashline", version = env!("CARGO_PKG_VERSION"), about, long_about = None)]
pub struct App {
    /// Log at debug level (RUST_LOG takes precedence).
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// TOML file with default settings.
    #[arg(long, global = true, env = "FLASHLINE_CONFIG")]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub cmd: Commands,
}

#[derive(Clone, Debug, Subcommand)]
pub enum Commands {
    #[command(alias = "i", name = "install", about = "Verify a release image while writing it to a device")]
    Install(InstallArg),
    #[command(alias = "s", name = "sign", about = "Create a detached signature for an image")]
    Sign(SignArg),
}

impl App {
    /// Run the selected command and return the process exit code.
    pub fn run(self) -> Result<u8> {
        match self.cmd {
            Commands::Install(args) => {
                let config = load_config(self.config.as_deref(), &Overrides::from(&args))?;
                let result = install::run(&args, &config)?;
                match &result.outcome {
                    Outcome::Success => eprintln!(
                        "{} {} bytes verified and written to {}",
                        style("success:").green().bold(),
                        result.bytes_written,
                        args.device.display()
                    ),
                    Outcome::Aborted(reason) => eprintln!(
                        "{} {reason} ({} bytes written to {})",
                        style("failed:").red().bold(),
                        result.bytes_written,
                        args.device.display()
                    ),
                }
                Ok(exit_codes::for_result(&result))
            }
            Commands::Sign(args) => {
                let out = sign::run(&args)?;
                eprintln!("{} signature written to {}", style("success:").green().bold(), out.display());
                Ok(exit_codes::SUCCESS)
            }
        }
    }
}

fn load_config(file: Option<&std::path::Path>, overrides: &Overrides) -> Result<Config> {
    if let Some(file) = file {
        ensure!(file.is_file(), "config file {} not found", file.display());
    }
    Config::load(file, overrides).context("loading configuration")
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition() { App::command().debug_assert(); }

    #[test]
    fn test_install_flags() {
        let app = App::try_parse_from([
            "flashline", "-v", "install", "-d", "/dev/sdz", "-V", "2345.3.0", "-C", "beta", "-o", "ami", "-k",
            "release.pub", "--verify-first", "-t", "/var/tmp",
        ])
        .unwrap();
        assert!(app.verbose);

        let Commands::Install(args) = app.cmd else {
            panic!("expected install");
        };
        let overrides = Overrides::from(&args);
        assert_eq!(args.device, PathBuf::from("/dev/sdz"));
        assert_eq!(overrides.version.as_deref(), Some("2345.3.0"));
        assert_eq!(overrides.channel.as_deref(), Some("beta"));
        assert_eq!(overrides.oem.as_deref(), Some("ami"));
        assert_eq!(overrides.verify_first, Some(true));
        assert_eq!(overrides.spool_dir, Some(PathBuf::from("/var/tmp")));
        assert_eq!(overrides.base_url, None);
    }

    #[test]
    fn test_device_is_required() {
        assert!(App::try_parse_from(["flashline", "install", "-k", "release.pub"]).is_err());
    }

    #[test]
    fn test_local_image_excludes_mirror_flags() {
        assert!(
            App::try_parse_from(["flashline", "install", "-d", "/dev/sdz", "--image", "a.bin.bz2", "-C", "beta"])
                .is_err()
        );
        assert!(App::try_parse_from(["flashline", "install", "-d", "/dev/sdz", "--signature", "a.sig"]).is_err());
    }

    #[test]
    fn test_sign_flags() {
        let app = App::try_parse_from(["flashline", "sign", "-k", "seed", "--context", "release", "image.bin.bz2"])
            .unwrap();
        let Commands::Sign(args) = app.cmd else {
            panic!("expected sign");
        };
        assert_eq!(args.image, PathBuf::from("image.bin.bz2"));
        assert_eq!(args.context.as_deref(), Some("release"));
        assert_eq!(args.output, None);
    }
}
