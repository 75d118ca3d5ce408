use std::fs::{File, OpenOptions};
use std::path::Path;

use anyhow::{Context, Result};
use tracing::{debug, warn};

/// Open the install target write-only. It is never created or truncated:
/// a missing device is an error, not a new file.
pub fn open(path: &Path) -> Result<File> {
    let file = OpenOptions::new()
        .write(true)
        .open(path)
        .with_context(|| format!("opening {} for writing", path.display()))?;

    #[cfg(unix)]
    {
        use std::os::unix::fs::FileTypeExt;

        let file_type = file
            .metadata()
            .with_context(|| format!("inspecting {}", path.display()))?
            .file_type();
        if !file_type.is_block_device() {
            warn!(device = %path.display(), "target is not a block device");
        }
    }

    debug!(device = %path.display(), "device open");
    Ok(file)
}
