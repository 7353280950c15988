//! Configuration types for table finding and the Airtable client.
//!
//! Both flows are configured through a plain struct with a builder:
//! [`TableFinderConfig`] for PDF scanning and image persistence,
//! [`AirtableConfig`] for the record-store client. Builders clamp obvious
//! out-of-range values and `build()` rejects the rest, so a config that
//! made it through `build()` is always usable.

use crate::error::CrawlError;
use crate::pipeline::detect::TableSettings;
use crate::progress::ProgressCallback;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

/// Default directory images are stored under.
pub const DEFAULT_STORAGE_ROOT: &str = "tables";

/// Default Airtable REST endpoint.
pub const DEFAULT_API_ROOT: &str = "https://api.airtable.com/v0";

// ── Image format ─────────────────────────────────────────────────────────

/// Encoding used for persisted table images.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ImageFormat {
    /// Lossless; the default.
    #[default]
    Png,
    Jpeg,
}

impl ImageFormat {
    /// File extension without the leading dot.
    pub fn extension(&self) -> &'static str {
        match self {
            ImageFormat::Png => "png",
            ImageFormat::Jpeg => "jpg",
        }
    }
}

impl fmt::Display for ImageFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ImageFormat::Png => f.write_str("png"),
            ImageFormat::Jpeg => f.write_str("jpeg"),
        }
    }
}

impl FromStr for ImageFormat {
    type Err = CrawlError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "png" => Ok(ImageFormat::Png),
            "jpeg" | "jpg" => Ok(ImageFormat::Jpeg),
            other => Err(CrawlError::InvalidConfig(format!(
                "Unknown image format '{other}' (expected png or jpeg)"
            ))),
        }
    }
}

// ── TableFinderConfig ────────────────────────────────────────────────────

/// Configuration for a [`crate::TableFinder`].
///
/// # Example
/// ```rust
/// use esd_crawl::{ImageFormat, TableFinderConfig};
///
/// let config = TableFinderConfig::builder()
///     .storage_root("out/tables")
///     .dpi(144)
///     .image_format(ImageFormat::Jpeg)
///     .build()
///     .unwrap();
/// assert_eq!(config.dpi, 144);
/// ```
#[derive(Clone)]
pub struct TableFinderConfig {
    /// Directory the default file store writes under. Default: `tables`.
    pub storage_root: PathBuf,

    /// Render resolution of the debug image. Range: 36–400. Default: 72.
    ///
    /// 72 DPI maps one PDF point to one pixel, which keeps annotation
    /// coordinates and image pixels aligned one-to-one.
    pub dpi: u32,

    /// Cap on the rendered image's width and height in pixels. Default: 4000.
    pub max_rendered_pixels: u32,

    /// Encoding of persisted images. Default: PNG.
    pub image_format: ImageFormat,

    /// PDF user password for encrypted documents.
    pub password: Option<String>,

    /// Download timeout for URL inputs in seconds. Default: 120.
    pub download_timeout_secs: u64,

    /// Tolerances for the lattice detector.
    pub table_settings: TableSettings,

    /// Receives per-page scan events. Default: none.
    pub progress_callback: Option<ProgressCallback>,
}

impl Default for TableFinderConfig {
    fn default() -> Self {
        Self {
            storage_root: PathBuf::from(DEFAULT_STORAGE_ROOT),
            dpi: 72,
            max_rendered_pixels: 4000,
            image_format: ImageFormat::default(),
            password: None,
            download_timeout_secs: 120,
            table_settings: TableSettings::default(),
            progress_callback: None,
        }
    }
}

impl fmt::Debug for TableFinderConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TableFinderConfig")
            .field("storage_root", &self.storage_root)
            .field("dpi", &self.dpi)
            .field("max_rendered_pixels", &self.max_rendered_pixels)
            .field("image_format", &self.image_format)
            .field("password", &self.password.as_ref().map(|_| "<redacted>"))
            .field("download_timeout_secs", &self.download_timeout_secs)
            .field("table_settings", &self.table_settings)
            .field(
                "progress_callback",
                &self.progress_callback.as_ref().map(|_| "<dyn ScanProgressCallback>"),
            )
            .finish()
    }
}

impl TableFinderConfig {
    /// Create a new builder for `TableFinderConfig`.
    pub fn builder() -> TableFinderConfigBuilder {
        TableFinderConfigBuilder {
            config: Self::default(),
        }
    }

    /// Render scale relative to 72 DPI (one pixel per point).
    pub fn render_scale(&self) -> f32 {
        self.dpi as f32 / 72.0
    }
}

/// Builder for [`TableFinderConfig`].
#[derive(Debug)]
pub struct TableFinderConfigBuilder {
    config: TableFinderConfig,
}

impl TableFinderConfigBuilder {
    pub fn storage_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.config.storage_root = root.into();
        self
    }

    pub fn dpi(mut self, dpi: u32) -> Self {
        self.config.dpi = dpi.clamp(36, 400);
        self
    }

    pub fn max_rendered_pixels(mut self, px: u32) -> Self {
        self.config.max_rendered_pixels = px.max(100);
        self
    }

    pub fn image_format(mut self, format: ImageFormat) -> Self {
        self.config.image_format = format;
        self
    }

    pub fn password(mut self, pwd: impl Into<String>) -> Self {
        self.config.password = Some(pwd.into());
        self
    }

    pub fn download_timeout_secs(mut self, secs: u64) -> Self {
        self.config.download_timeout_secs = secs;
        self
    }

    pub fn table_settings(mut self, settings: TableSettings) -> Self {
        self.config.table_settings = settings;
        self
    }

    pub fn progress_callback(mut self, cb: ProgressCallback) -> Self {
        self.config.progress_callback = Some(cb);
        self
    }

    /// Build the configuration, validating constraints.
    pub fn build(self) -> Result<TableFinderConfig, CrawlError> {
        let c = &self.config;
        if c.dpi < 36 || c.dpi > 400 {
            return Err(CrawlError::InvalidConfig(format!(
                "DPI must be 36–400, got {}",
                c.dpi
            )));
        }
        if c.download_timeout_secs == 0 {
            return Err(CrawlError::InvalidConfig(
                "Download timeout must be ≥ 1 second".into(),
            ));
        }
        if c.storage_root.as_os_str().is_empty() {
            return Err(CrawlError::InvalidConfig(
                "Storage root must not be empty".into(),
            ));
        }
        let s = &c.table_settings;
        let tolerances = [
            s.snap_x_tolerance,
            s.snap_y_tolerance,
            s.join_x_tolerance,
            s.join_y_tolerance,
            s.edge_min_length,
            s.intersection_x_tolerance,
            s.intersection_y_tolerance,
        ];
        if tolerances.iter().any(|t| !t.is_finite() || *t < 0.0) {
            return Err(CrawlError::InvalidConfig(
                "Table tolerances must be finite and non-negative".into(),
            ));
        }
        if s.min_cells == 0 {
            return Err(CrawlError::InvalidConfig(
                "A table needs at least one cell".into(),
            ));
        }
        Ok(self.config)
    }
}

// ── AirtableConfig ───────────────────────────────────────────────────────

/// Connection settings for [`crate::AirtableClient`].
#[derive(Clone)]
pub struct AirtableConfig {
    /// REST root, e.g. `https://api.airtable.com/v0`.
    pub api_root: String,
    /// Sent as `Authorization: Bearer <key>` when present.
    pub api_key: Option<String>,
    /// Per-request timeout in seconds. Default: 30.
    pub timeout_secs: u64,
}

impl Default for AirtableConfig {
    fn default() -> Self {
        Self {
            api_root: DEFAULT_API_ROOT.to_string(),
            api_key: None,
            timeout_secs: 30,
        }
    }
}

impl fmt::Debug for AirtableConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AirtableConfig")
            .field("api_root", &self.api_root)
            .field("api_key", &self.api_key.as_ref().map(|_| "<redacted>"))
            .field("timeout_secs", &self.timeout_secs)
            .finish()
    }
}

impl AirtableConfig {
    /// Create a new builder for `AirtableConfig`.
    pub fn builder() -> AirtableConfigBuilder {
        AirtableConfigBuilder {
            config: Self::default(),
        }
    }

    /// Defaults overlaid with `AIRTABLE_API_KEY` and `AIRTABLE_API_ROOT`.
    pub fn from_env() -> Result<Self, CrawlError> {
        let mut builder = Self::builder();
        if let Ok(key) = std::env::var("AIRTABLE_API_KEY") {
            if !key.is_empty() {
                builder = builder.api_key(key);
            }
        }
        if let Ok(root) = std::env::var("AIRTABLE_API_ROOT") {
            if !root.is_empty() {
                builder = builder.api_root(root);
            }
        }
        builder.build()
    }
}

/// Builder for [`AirtableConfig`].
#[derive(Debug)]
pub struct AirtableConfigBuilder {
    config: AirtableConfig,
}

impl AirtableConfigBuilder {
    pub fn api_root(mut self, root: impl Into<String>) -> Self {
        self.config.api_root = root.into();
        self
    }

    pub fn api_key(mut self, key: impl Into<String>) -> Self {
        self.config.api_key = Some(key.into());
        self
    }

    pub fn timeout_secs(mut self, secs: u64) -> Self {
        self.config.timeout_secs = secs;
        self
    }

    /// Build the configuration, validating constraints.
    pub fn build(self) -> Result<AirtableConfig, CrawlError> {
        let c = &self.config;
        let url = reqwest::Url::parse(&c.api_root).map_err(|e| {
            CrawlError::InvalidConfig(format!("API root '{}' is not a URL: {}", c.api_root, e))
        })?;
        if !matches!(url.scheme(), "http" | "https") || url.cannot_be_a_base() {
            return Err(CrawlError::InvalidConfig(format!(
                "API root '{}' must be an http(s) URL",
                c.api_root
            )));
        }
        if c.timeout_secs == 0 {
            return Err(CrawlError::InvalidConfig(
                "Request timeout must be ≥ 1 second".into(),
            ));
        }
        Ok(self.config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn finder_defaults() {
        let c = TableFinderConfig::default();
        assert_eq!(c.storage_root, PathBuf::from("tables"));
        assert_eq!(c.dpi, 72);
        assert_eq!(c.image_format, ImageFormat::Png);
        assert_eq!(c.download_timeout_secs, 120);
        assert!((c.render_scale() - 1.0).abs() < f32::EPSILON);
    }

    #[test]
    fn builder_clamps_dpi() {
        let c = TableFinderConfig::builder().dpi(10).build().unwrap();
        assert_eq!(c.dpi, 36);
        let c = TableFinderConfig::builder().dpi(9000).build().unwrap();
        assert_eq!(c.dpi, 400);
    }

    #[test]
    fn builder_rejects_bad_tolerances() {
        let settings = TableSettings {
            snap_x_tolerance: -1.0,
            ..TableSettings::default()
        };
        let err = TableFinderConfig::builder()
            .table_settings(settings)
            .build()
            .unwrap_err();
        assert!(matches!(err, CrawlError::InvalidConfig(_)));
    }

    #[test]
    fn builder_rejects_zero_timeout() {
        assert!(TableFinderConfig::builder()
            .download_timeout_secs(0)
            .build()
            .is_err());
    }

    #[test]
    fn debug_redacts_password() {
        let c = TableFinderConfig::builder().password("hunter2").build().unwrap();
        let dbg = format!("{c:?}");
        assert!(!dbg.contains("hunter2"));
        assert!(dbg.contains("redacted"));
    }

    #[test]
    fn image_format_parsing_and_extension() {
        assert_eq!("PNG".parse::<ImageFormat>().unwrap(), ImageFormat::Png);
        assert_eq!("jpg".parse::<ImageFormat>().unwrap(), ImageFormat::Jpeg);
        assert!("gif".parse::<ImageFormat>().is_err());
        assert_eq!(ImageFormat::Jpeg.extension(), "jpg");
        assert_eq!(ImageFormat::Jpeg.to_string(), "jpeg");
    }

    #[test]
    fn airtable_defaults_and_validation() {
        let c = AirtableConfig::default();
        assert_eq!(c.api_root, "https://api.airtable.com/v0");
        assert_eq!(c.timeout_secs, 30);

        assert!(AirtableConfig::builder().api_root("not a url").build().is_err());
        assert!(AirtableConfig::builder()
            .api_root("ftp://example.com")
            .build()
            .is_err());
        assert!(AirtableConfig::builder().timeout_secs(0).build().is_err());

        let c = AirtableConfig::builder()
            .api_root("http://localhost:8080/v0")
            .api_key("key123")
            .build()
            .unwrap();
        assert!(!format!("{c:?}").contains("key123"));
    }
}
