//! Configuration types for file conversion.
//!
//! All dispatcher behaviour is controlled through [`ConverterConfig`], built
//! via its [`ConverterConfigBuilder`]. The remote credential lives here as a
//! plain `Option`: no credential means the remote strategy is simply absent
//! from every chain.

use crate::error::FileShiftError;
use crate::progress::ProgressObserver;
use std::fmt;
use std::path::PathBuf;

/// Default CloudConvert API endpoint.
pub const DEFAULT_REMOTE_BASE_URL: &str = "https://api.cloudconvert.com";

/// Configuration shared by every job a [`crate::dispatch::Dispatcher`] runs.
///
/// Built via [`ConverterConfig::builder()`] or using
/// [`ConverterConfig::default()`].
///
/// # Example
/// ```rust
/// use fileshift::ConverterConfig;
///
/// let config = ConverterConfig::builder()
///     .output_dir("/tmp/converted")
///     .image_quality(85)
///     .build()
///     .unwrap();
/// assert!(config.remote_api_key.is_none());
/// ```
#[derive(Clone)]
pub struct ConverterConfig {
    /// Directory converted files are written to. Default: the system temp dir.
    pub output_dir: PathBuf,

    /// CloudConvert API key. `None` removes the remote strategy from every chain.
    pub remote_api_key: Option<String>,

    /// Base URL of the remote conversion API. Default: [`DEFAULT_REMOTE_BASE_URL`].
    pub remote_base_url: String,

    /// Delay before the first job-status poll, doubled after each poll
    /// up to 8× the initial value. Default: 500.
    pub remote_poll_interval_ms: u64,

    /// HTTP timeout for every remote request, and the overall bound on
    /// waiting for a remote job. Default: 120.
    pub remote_timeout_secs: u64,

    /// Path to a pdfium shared library. `None` binds the system library.
    pub pdfium_lib_path: Option<PathBuf>,

    /// Quality used for lossy image encodings. Range: 1–100. Default: 90.
    pub image_quality: u8,

    /// DPI for single-page PDF rasterisation. Default: 150.
    pub raster_dpi: u32,

    /// DPI for the PDF→Word page snapshot strategy. Default: 180.
    pub snapshot_dpi: u32,

    /// Maximum rendered width in pixels. Default: 1200.
    pub raster_max_width: u32,

    /// Maximum rendered height in pixels. Default: 1600.
    pub raster_max_height: u32,

    /// Optional observer notified as jobs and strategies progress.
    pub progress: Option<ProgressObserver>,
}

impl Default for ConverterConfig {
    fn default() -> Self {
        Self {
            output_dir: std::env::temp_dir(),
            remote_api_key: None,
            remote_base_url: DEFAULT_REMOTE_BASE_URL.to_string(),
            remote_poll_interval_ms: 500,
            remote_timeout_secs: 120,
            pdfium_lib_path: None,
            image_quality: 90,
            raster_dpi: 150,
            snapshot_dpi: 180,
            raster_max_width: 1200,
            raster_max_height: 1600,
            progress: None,
        }
    }
}

impl fmt::Debug for ConverterConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConverterConfig")
            .field("output_dir", &self.output_dir)
            .field(
                "remote_api_key",
                &self.remote_api_key.as_ref().map(|_| "<redacted>"),
            )
            .field("remote_base_url", &self.remote_base_url)
            .field("remote_poll_interval_ms", &self.remote_poll_interval_ms)
            .field("remote_timeout_secs", &self.remote_timeout_secs)
            .field("pdfium_lib_path", &self.pdfium_lib_path)
            .field("image_quality", &self.image_quality)
            .field("raster_dpi", &self.raster_dpi)
            .field("snapshot_dpi", &self.snapshot_dpi)
            .field("raster_max_width", &self.raster_max_width)
            .field("raster_max_height", &self.raster_max_height)
            .field("progress", &self.progress.as_ref().map(|_| "<dyn ConversionObserver>"))
            .finish()
    }
}

impl ConverterConfig {
    /// Create a new builder for `ConverterConfig`.
    pub fn builder() -> ConverterConfigBuilder {
        ConverterConfigBuilder {
            config: Self::default(),
        }
    }

    /// True when a non-empty remote credential is present.
    pub fn remote_configured(&self) -> bool {
        self.remote_api_key
            .as_deref()
            .is_some_and(|k| !k.trim().is_empty())
    }
}

/// Builder for [`ConverterConfig`].
#[derive(Debug)]
pub struct ConverterConfigBuilder {
    config: ConverterConfig,
}

impl ConverterConfigBuilder {
    pub fn output_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.config.output_dir = dir.into();
        self
    }

    /// Set the remote credential. Empty strings are treated as absent.
    pub fn remote_api_key(mut self, key: impl Into<String>) -> Self {
        let key = key.into();
        self.config.remote_api_key = if key.trim().is_empty() { None } else { Some(key) };
        self
    }

    pub fn remote_base_url(mut self, url: impl Into<String>) -> Self {
        self.config.remote_base_url = url.into();
        self
    }

    pub fn remote_poll_interval_ms(mut self, ms: u64) -> Self {
        self.config.remote_poll_interval_ms = ms.max(10);
        self
    }

    pub fn remote_timeout_secs(mut self, secs: u64) -> Self {
        self.config.remote_timeout_secs = secs;
        self
    }

    pub fn pdfium_lib_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.pdfium_lib_path = Some(path.into());
        self
    }

    pub fn image_quality(mut self, quality: u8) -> Self {
        self.config.image_quality = quality.clamp(1, 100);
        self
    }

    pub fn raster_dpi(mut self, dpi: u32) -> Self {
        self.config.raster_dpi = dpi;
        self
    }

    pub fn snapshot_dpi(mut self, dpi: u32) -> Self {
        self.config.snapshot_dpi = dpi;
        self
    }

    pub fn raster_bounds(mut self, max_width: u32, max_height: u32) -> Self {
        self.config.raster_max_width = max_width;
        self.config.raster_max_height = max_height;
        self
    }

    pub fn progress(mut self, observer: ProgressObserver) -> Self {
        self.config.progress = Some(observer);
        self
    }

    /// Build the configuration, validating constraints.
    pub fn build(self) -> Result<ConverterConfig, FileShiftError> {
        let c = &self.config;
        if c.output_dir.as_os_str().is_empty() {
            return Err(FileShiftError::InvalidConfig(
                "output directory must not be empty".into(),
            ));
        }
        for (name, dpi) in [("raster", c.raster_dpi), ("snapshot", c.snapshot_dpi)] {
            if !(72..=600).contains(&dpi) {
                return Err(FileShiftError::InvalidConfig(format!(
                    "{name} DPI must be 72–600, got {dpi}"
                )));
            }
        }
        if c.raster_max_width < 16 || c.raster_max_height < 16 {
            return Err(FileShiftError::InvalidConfig(format!(
                "raster bounds too small: {}x{}",
                c.raster_max_width, c.raster_max_height
            )));
        }
        if !c.remote_base_url.starts_with("http://") && !c.remote_base_url.starts_with("https://")
        {
            return Err(FileShiftError::InvalidConfig(format!(
                "remote base URL must be http(s), got '{}'",
                c.remote_base_url
            )));
        }
        Ok(self.config)
    }
}
