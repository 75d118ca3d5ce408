use crate::error::{FetchError, Result};

/// Accept only absolute `http://` or `https://` URLs with a host part.
///
/// ```
/// use flashline_fetch::validate_url;
///
/// assert!(validate_url("http://stable.release.core-os.net/amd64-usr").is_ok());
/// assert!(validate_url("ftp://mirror/image.bin.bz2").is_err());
/// ```
pub fn validate_url(url: &str) -> Result<()> {
    let rest = url
        .strip_prefix("https://")
        .or_else(|| url.strip_prefix("http://"))
        .ok_or_else(|| FetchError::InvalidUrl(url.to_string()))?;

    let host = rest.split(['/', '?', '#']).next().unwrap_or_default();
    if host.is_empty() || rest.chars().any(char::is_whitespace) {
        return Err(FetchError::InvalidUrl(url.to_string()));
    }
    Ok(())
}

/// The only status a release mirror may answer with.
pub fn is_ok(status: u16) -> bool { status == 200 }
