//! Layered settings: built-in defaults, then the TOML file given with
//! `--config`, then `FLASHLINE_*` environment variables, then command-line
//! flags.

use std::path::{Path, PathBuf};
use std::time::Duration;

use figment::Figment;
use figment::providers::{Env, Format, Serialized, Toml};
use flashline_fetch::{DEFAULT_MAX_SIGNATURE_SIZE, FetchOptions, ReleaseLocator, Timeouts};
use flashline_pipeline::{DEFAULT_HANDOFF_CAPACITY, PipelineOptions, WritePolicy};
use serde::{Deserialize, Serialize};

pub const ENV_PREFIX: &str = "FLASHLINE_";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub channel:              String,
    pub version:              String,
    pub board:                String,
    pub oem:                  Option<String>,
    pub base_url:             Option<String>,
    /// Path to a key file, or the key itself (hex, base64 or PEM).
    pub public_key:           Option<String>,
    pub context:              Option<String>,
    pub verify_first:         bool,
    pub spool_dir:            Option<PathBuf>,
    pub handoff_capacity:     usize,
    pub max_retries:          u32,
    pub retry_backoff_ms:     u64,
    pub max_signature_size:   usize,
    /// Zero disables the timeout.
    pub connect_timeout_secs: u64,
    /// Zero disables the timeout.
    pub read_timeout_secs:    u64,
}

impl Default for Config {
    fn default() -> Self {
        let locator = ReleaseLocator::default();
        let fetch = FetchOptions::default();
        let secs = |d: Option<Duration>| d.map_or(0, |d| d.as_secs());
        Self {
            channel:              locator.channel,
            version:              locator.version,
            board:                locator.board,
            oem:                  None,
            base_url:             None,
            public_key:           None,
            context:              None,
            verify_first:         false,
            spool_dir:            None,
            handoff_capacity:     DEFAULT_HANDOFF_CAPACITY,
            max_retries:          fetch.max_retries,
            retry_backoff_ms:     fetch.retry_backoff.as_millis() as u64,
            max_signature_size:   DEFAULT_MAX_SIGNATURE_SIZE,
            connect_timeout_secs: secs(fetch.timeouts.connect),
            read_timeout_secs:    secs(fetch.timeouts.read),
        }
    }
}

/// Values given on the command line; unset ones leave lower layers alone.
#[derive(Debug, Clone, Default, Serialize)]
pub struct Overrides {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub channel:          Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub version:          Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub board:            Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub oem:              Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub base_url:         Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub public_key:       Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub context:          Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub verify_first:     Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub spool_dir:        Option<PathBuf>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub handoff_capacity: Option<usize>,
}

impl Config {
    /// Every layer below the command line.
    pub fn figment(file: Option<&Path>) -> Figment {
        let figment = Figment::from(Serialized::defaults(Config::default()));
        let figment = match file {
            Some(file) => figment.merge(Toml::file(file)),
            None => figment,
        };
        figment.merge(Env::prefixed(ENV_PREFIX))
    }

    pub fn load(file: Option<&Path>, overrides: &Overrides) -> Result<Self, figment::Error> {
        Self::figment(file).merge(Serialized::defaults(overrides)).extract()
    }

    pub fn locator(&self) -> ReleaseLocator {
        let locator = ReleaseLocator::default()
            .channel(&self.channel)
            .version(&self.version)
            .board(&self.board)
            .oem(self.oem.clone().unwrap_or_default());
        match &self.base_url {
            Some(base) => locator.base_url(base),
            None => locator,
        }
    }

    pub fn timeouts(&self) -> Timeouts {
        let secs = |s: u64| (s > 0).then(|| Duration::from_secs(s));
        Timeouts {
            connect: secs(self.connect_timeout_secs),
            read:    secs(self.read_timeout_secs),
        }
    }

    pub fn fetch_options(&self) -> FetchOptions {
        FetchOptions::default()
            .max_retries(self.max_retries)
            .retry_backoff(Duration::from_millis(self.retry_backoff_ms))
            .max_signature_size(self.max_signature_size)
            .timeouts(self.timeouts())
    }

    pub fn pipeline_options(&self) -> PipelineOptions {
        let write_policy = if self.verify_first {
            WritePolicy::VerifyFirst {
                spool_dir: self.spool_dir.clone(),
            }
        } else {
            WritePolicy::Eager
        };
        PipelineOptions::default()
            .handoff_capacity(self.handoff_capacity)
            .write_policy(write_policy)
    }
}
