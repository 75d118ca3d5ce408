use std::sync::Arc;
use std::time::Duration;

use flashline_pipeline::{Progress, TransferPhase, TransferResult};
use indicatif::{HumanBytes, ProgressBar, ProgressStyle};
use once_cell::sync::Lazy;

const PB_STYLE: &str = "{spinner:.blue} {prefix:>12.cyan.bold} [{elapsed_precise}] {bytes} ({bytes_per_sec}) {wide_msg}";

const TICK: &str = "⠁⠂⠄⡀⢀⠠⠐⠈ ";

static PB_TEMPLATE: Lazy<Option<ProgressStyle>> =
    Lazy::new(|| ProgressStyle::with_template(PB_STYLE).ok().map(|style| style.tick_chars(TICK)));

/// Byte counter for one transfer, fed from pipeline progress callbacks.
///
/// The decompressed size is unknown up front, so this is a spinner with a
/// running byte count rather than a bar.
pub struct TransferBar {
    pb: ProgressBar,
}

impl TransferBar {
    pub fn new(prefix: &str) -> Self {
        let pb = ProgressBar::new_spinner();
        let pb = match PB_TEMPLATE.as_ref() {
            Some(style) => pb.with_style(style.clone()),
            None => pb,
        };
        pb.set_prefix(prefix.to_string());
        pb.enable_steady_tick(Duration::from_millis(120));
        Self { pb }
    }

    #[cfg(test)]
    fn hidden() -> Self { Self { pb: ProgressBar::hidden() } }

    pub fn callback(&self) -> Arc<dyn Fn(&Progress) + Send + Sync> {
        let pb = self.pb.clone();
        Arc::new(move |progress: &Progress| update(&pb, progress))
    }

    pub fn finish(self, result: &TransferResult) {
        let msg = match result.failure() {
            None => format!("done, {} written", HumanBytes(result.bytes_written)),
            Some(reason) => format!("failed: {reason}"),
        };
        self.pb.finish_with_message(msg);
    }
}

fn update(pb: &ProgressBar, progress: &Progress) {
    match progress.phase {
        TransferPhase::Streaming => pb.set_position(progress.bytes_decompressed),
        TransferPhase::Verifying => pb.set_message("checking signature"),
        TransferPhase::Committing => {
            pb.set_prefix("Committing");
            pb.set_position(progress.bytes_written);
        }
        TransferPhase::Completed => pb.set_position(progress.bytes_written),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_positions_follow_phases() {
        let bar = TransferBar::hidden();
        let report = bar.callback();

        report(&Progress {
            phase:              TransferPhase::Streaming,
            bytes_decompressed: 4096,
            bytes_written:      0,
        });
        assert_eq!(bar.pb.position(), 4096);

        report(&Progress {
            phase:              TransferPhase::Verifying,
            bytes_decompressed: 8192,
            bytes_written:      0,
        });
        assert_eq!(bar.pb.message(), "checking signature");

        report(&Progress {
            phase:              TransferPhase::Committing,
            bytes_decompressed: 8192,
            bytes_written:      1024,
        });
        assert_eq!(bar.pb.position(), 1024);
        assert_eq!(bar.pb.prefix(), "Committing");
    }
}
