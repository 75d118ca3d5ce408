//! Release image naming on a mirror.

/// Locates one release image and its detached signature on a mirror.
///
/// Images live at `{base}/{version}/coreos_production[_{oem}]_image.bin.bz2`
/// with the signature next to it under the same name plus `.sig`. Without an
/// explicit base URL the public mirror for `channel` and `board` is used.
///
/// ```
/// use flashline_fetch::ReleaseLocator;
///
/// let locator = ReleaseLocator::default().version("1967.6.0").oem("ami");
/// assert_eq!(
///     locator.image_url(),
///     "http://stable.release.core-os.net/amd64-usr/1967.6.0/coreos_production_ami_image.bin.bz2"
/// );
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReleaseLocator {
    pub base_url: Option<String>,
    pub channel:  String,
    pub version:  String,
    pub oem:      Option<String>,
    pub board:    String,
}

impl Default for ReleaseLocator {
    fn default() -> Self {
        Self {
            base_url: None,
            channel:  "stable".to_string(),
            version:  "current".to_string(),
            oem:      None,
            board:    "amd64-usr".to_string(),
        }
    }
}

impl ReleaseLocator {
    #[must_use]
    pub fn base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = Some(base_url.into());
        self
    }

    #[must_use]
    pub fn channel(mut self, channel: impl Into<String>) -> Self {
        self.channel = channel.into();
        self
    }

    #[must_use]
    pub fn version(mut self, version: impl Into<String>) -> Self {
        self.version = version.into();
        self
    }

    /// Select an OEM flavour; an empty name means the generic image.
    #[must_use]
    pub fn oem(mut self, oem: impl Into<String>) -> Self {
        let oem = oem.into();
        self.oem = (!oem.is_empty()).then_some(oem);
        self
    }

    #[must_use]
    pub fn board(mut self, board: impl Into<String>) -> Self {
        self.board = board.into();
        self
    }

    /// The mirror directory holding all versions.
    pub fn resolved_base_url(&self) -> String {
        match &self.base_url {
            Some(base) => base.trim_end_matches('/').to_string(),
            None => format!("http://{}.release.core-os.net/{}", self.channel, self.board),
        }
    }

    pub fn image_name(&self) -> String {
        match &self.oem {
            Some(oem) => format!("coreos_production_{oem}_image.bin.bz2"),
            None => "coreos_production_image.bin.bz2".to_string(),
        }
    }

    pub fn image_url(&self) -> String {
        format!("{}/{}/{}", self.resolved_base_url(), self.version, self.image_name())
    }

    pub fn signature_url(&self) -> String { format!("{}.sig", self.image_url()) }
}
