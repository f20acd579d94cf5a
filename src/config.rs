//! Configuration types for a magazine download.
//!
//! All behaviour is controlled through [`DownloadConfig`], built via its
//! [`DownloadConfigBuilder`]. Keeping every knob in one struct means each
//! pipeline stage receives the same value object instead of reading ambient
//! state, and a config can be logged or diffed to understand why two runs
//! produced different artifacts.
//!
//! # Design choice: builder over constructor
//! The option surface keeps growing (watermark treatments, timestamp rewrite,
//! probe delay). A builder lets callers set only what they care about and
//! rely on documented defaults for the rest, and gives one place to validate
//! cross-field constraints before any network activity.

use crate::error::MagdownError;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

/// Progress hook for the image-compositing path: `(completed, total)` pages.
/// The PDF path issues one bulk request and has nothing per-page to report.
pub type PageProgress = Arc<dyn Fn(u32, u32) + Send + Sync>;

/// Canonical lowercase UUID form: 8-4-4-4-12 hex groups.
static UUID_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[0-9a-f]{8}-[0-9a-f]{4}-[0-9a-f]{4}-[0-9a-f]{4}-[0-9a-f]{12}$")
        .expect("UUID regex is valid")
});

/// Returns true when `s` is a canonical lowercase UUID.
pub(crate) fn is_canonical_uuid(s: &str) -> bool {
    UUID_RE.is_match(s)
}

/// Visual quality tier of the page store.
///
/// The four raster tiers select the image-compositing path; [`Quality::Original`]
/// requests a pre-rendered PDF from the render endpoint and post-processes it
/// instead of drawing pages locally.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Quality {
    /// Thumbnail-grade raster; also what the prober fetches (cheapest).
    ExtraLow,
    /// Low-resolution raster.
    Low,
    /// Mid-resolution raster (default).
    #[default]
    Mid,
    /// Highest raster tier the store serves.
    High,
    /// Server-side PDF render of the original pages.
    Original,
}

impl Quality {
    /// The URL path segment for this tier, or `None` for [`Quality::Original`],
    /// which has no per-page raster representation.
    pub fn segment(self) -> Option<&'static str> {
        match self {
            Quality::ExtraLow => Some("extralow"),
            Quality::Low => Some("low"),
            Quality::Mid => Some("mid"),
            Quality::High => Some("high"),
            Quality::Original => None,
        }
    }

    /// True when this tier selects the remote-render + post-process path.
    pub fn is_pdf(self) -> bool {
        matches!(self, Quality::Original)
    }
}

impl fmt::Display for Quality {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Quality::ExtraLow => "extralow",
            Quality::Low => "low",
            Quality::Mid => "mid",
            Quality::High => "high",
            Quality::Original => "original",
        })
    }
}

impl FromStr for Quality {
    type Err = MagdownError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "extralow" => Ok(Quality::ExtraLow),
            "low" => Ok(Quality::Low),
            "mid" => Ok(Quality::Mid),
            "high" => Ok(Quality::High),
            "original" => Ok(Quality::Original),
            other => Err(MagdownError::InvalidConfig(format!(
                "Unknown quality '{other}' (expected extralow, low, mid, high or original)"
            ))),
        }
    }
}

/// One-based inclusive page range as the user states it on the command line.
///
/// Everything past the config boundary works in zero-based page indices;
/// the conversion happens exactly once, in [`PageRange::zero_based`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageRange {
    /// First page, one-based. Minimum 1.
    pub from: u32,
    /// Last page, one-based, inclusive.
    pub to: u32,
}

impl Default for PageRange {
    fn default() -> Self {
        // "everything" — discovery caps the upper bound to what exists.
        Self { from: 1, to: 9999 }
    }
}

impl PageRange {
    /// Zero-based inclusive index range `(from - 1, to - 1)`.
    pub fn zero_based(self) -> (u32, u32) {
        (self.from - 1, self.to - 1)
    }

    /// Cross-check count used against the number of per-page regions the
    /// locator discovers. Inherited formula; feeds a warning only.
    pub fn expected_page_count(self) -> u32 {
        self.to - self.from
    }

    /// Number of pages actually requested.
    pub fn len(self) -> u32 {
        self.to - self.from + 1
    }

    /// Always false once validated (`from <= to`), kept for completeness.
    pub fn is_empty(self) -> bool {
        self.to < self.from
    }
}

/// Configuration for one magazine download.
///
/// Built via [`DownloadConfig::builder()`] or [`DownloadConfig::default()`].
///
/// # Example
/// ```rust
/// use magdown::{DownloadConfig, PageRange, Quality};
///
/// let config = DownloadConfig::builder()
///     .quality(Quality::Original)
///     .range(PageRange { from: 1, to: 10 })
///     .hide_watermark(true)
///     .uuid("ba9c5bcb-cf96-4215-a2f5-841ddb4a119c")
///     .build()
///     .unwrap();
/// ```
#[derive(Clone, Serialize, Deserialize)]
pub struct DownloadConfig {
    /// Quality tier. Raster tiers composite images; `original` fetches and
    /// post-processes a server-rendered PDF. Default: [`Quality::Mid`].
    pub quality: Quality,

    /// Dots per inch used to size composited pages. Range: 72–400. Default: 150.
    ///
    /// Only meaningful on the raster path: a 1500 px wide scan at 150 DPI
    /// becomes a 10 in page. The remote-render path keeps the server's page
    /// geometry untouched.
    pub dpi: u32,

    /// One-based inclusive page range. The upper bound is capped by last-page
    /// discovery when it exceeds what actually exists server-side.
    pub range: PageRange,

    /// Delay between successive probes, in milliseconds. Default: 0.
    ///
    /// Rate-limiting courtesy to the remote host. Applies to probes only,
    /// never to buffer edits.
    pub delay_ms: u64,

    /// Overwrite every watermark opacity directive with a fully transparent
    /// one, leaving geometry intact. Default: false.
    pub hide_watermark: bool,

    /// Zero the opacity directives outright and blank each watermark
    /// placement/text stream payload. Overrides `hide_watermark` when both
    /// are set. Default: false.
    pub destroy_watermark: bool,

    /// Rewrite the document's CreationDate/ModDate values to the current
    /// local time. Default: false.
    pub rewrite_timestamp: bool,

    /// User/session identifier sent with the bulk render request. Required
    /// when `quality` is [`Quality::Original`]; unused otherwise.
    pub uuid: Option<String>,

    /// Bulk render endpoint. Overridable for testing against a local stub.
    pub render_endpoint: String,

    /// Called after each composited page download with `(completed, total)`.
    #[serde(skip)]
    pub progress: Option<PageProgress>,
}

impl fmt::Debug for DownloadConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DownloadConfig")
            .field("quality", &self.quality)
            .field("dpi", &self.dpi)
            .field("range", &self.range)
            .field("delay_ms", &self.delay_ms)
            .field("hide_watermark", &self.hide_watermark)
            .field("destroy_watermark", &self.destroy_watermark)
            .field("rewrite_timestamp", &self.rewrite_timestamp)
            .field("uuid", &self.uuid)
            .field("render_endpoint", &self.render_endpoint)
            .field("progress", &self.progress.as_ref().map(|_| "<callback>"))
            .finish()
    }
}

/// Where bulk render requests go unless the config overrides it.
pub const DEFAULT_RENDER_ENDPOINT: &str = "https://pocketmags.com/functions/print_pages.php";

impl Default for DownloadConfig {
    fn default() -> Self {
        Self {
            quality: Quality::default(),
            dpi: 150,
            range: PageRange::default(),
            delay_ms: 0,
            hide_watermark: false,
            destroy_watermark: false,
            rewrite_timestamp: false,
            uuid: None,
            render_endpoint: DEFAULT_RENDER_ENDPOINT.to_string(),
            progress: None,
        }
    }
}

impl DownloadConfig {
    /// Create a new builder for `DownloadConfig`.
    pub fn builder() -> DownloadConfigBuilder {
        DownloadConfigBuilder {
            config: Self::default(),
        }
    }
}

/// Builder for [`DownloadConfig`].
#[derive(Debug)]
pub struct DownloadConfigBuilder {
    config: DownloadConfig,
}

impl DownloadConfigBuilder {
    pub fn quality(mut self, q: Quality) -> Self {
        self.config.quality = q;
        self
    }

    pub fn dpi(mut self, dpi: u32) -> Self {
        self.config.dpi = dpi.clamp(72, 400);
        self
    }

    pub fn range(mut self, range: PageRange) -> Self {
        self.config.range = range;
        self
    }

    pub fn delay_ms(mut self, ms: u64) -> Self {
        self.config.delay_ms = ms;
        self
    }

    pub fn hide_watermark(mut self, v: bool) -> Self {
        self.config.hide_watermark = v;
        self
    }

    pub fn destroy_watermark(mut self, v: bool) -> Self {
        self.config.destroy_watermark = v;
        self
    }

    pub fn rewrite_timestamp(mut self, v: bool) -> Self {
        self.config.rewrite_timestamp = v;
        self
    }

    pub fn uuid(mut self, uuid: impl Into<String>) -> Self {
        self.config.uuid = Some(uuid.into());
        self
    }

    pub fn render_endpoint(mut self, url: impl Into<String>) -> Self {
        self.config.render_endpoint = url.into();
        self
    }

    pub fn progress(mut self, cb: PageProgress) -> Self {
        self.config.progress = Some(cb);
        self
    }

    /// Build the configuration, validating cross-field constraints.
    pub fn build(self) -> Result<DownloadConfig, MagdownError> {
        let c = &self.config;
        if c.range.from < 1 {
            return Err(MagdownError::InvalidConfig(
                "Pages are 1-indexed; --range-from must be >= 1".into(),
            ));
        }
        if c.range.from > c.range.to {
            return Err(MagdownError::InvalidConfig(format!(
                "Invalid page range {}-{}: start must be <= end",
                c.range.from, c.range.to
            )));
        }
        if let Some(ref uuid) = c.uuid {
            if !is_canonical_uuid(uuid) {
                return Err(MagdownError::InvalidConfig(format!(
                    "User UUID '{uuid}' is not in canonical 8-4-4-4-12 lowercase form"
                )));
            }
        }
        if c.quality.is_pdf() && c.uuid.is_none() {
            return Err(MagdownError::InvalidConfig(
                "Quality 'original' requires --uuid (the reader session identifier)".into(),
            ));
        }
        Ok(self.config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_builds() {
        let c = DownloadConfig::builder().build().unwrap();
        assert_eq!(c.quality, Quality::Mid);
        assert_eq!(c.dpi, 150);
        assert_eq!(c.range.from, 1);
    }

    #[test]
    fn dpi_is_clamped() {
        let c = DownloadConfig::builder().dpi(10).build().unwrap();
        assert_eq!(c.dpi, 72);
        let c = DownloadConfig::builder().dpi(1200).build().unwrap();
        assert_eq!(c.dpi, 400);
    }

    #[test]
    fn inverted_range_is_rejected() {
        let err = DownloadConfig::builder()
            .range(PageRange { from: 9, to: 3 })
            .build()
            .unwrap_err();
        assert!(err.to_string().contains("9-3"));
    }

    #[test]
    fn zero_from_is_rejected() {
        let err = DownloadConfig::builder()
            .range(PageRange { from: 0, to: 3 })
            .build()
            .unwrap_err();
        assert!(err.to_string().contains("1-indexed"));
    }

    #[test]
    fn pdf_quality_requires_uuid() {
        let err = DownloadConfig::builder()
            .quality(Quality::Original)
            .build()
            .unwrap_err();
        assert!(err.to_string().contains("--uuid"));

        DownloadConfig::builder()
            .quality(Quality::Original)
            .uuid("ba9c5bcb-cf96-4215-a2f5-841ddb4a119c")
            .build()
            .unwrap();
    }

    #[test]
    fn malformed_uuid_is_rejected() {
        let err = DownloadConfig::builder()
            .uuid("BA9C5BCB-cf96-4215-a2f5-841ddb4a119c")
            .build()
            .unwrap_err();
        assert!(err.to_string().contains("canonical"));
    }

    #[test]
    fn quality_round_trips_through_fromstr() {
        for s in ["extralow", "low", "mid", "high", "original"] {
            assert_eq!(s.parse::<Quality>().unwrap().to_string(), s);
        }
        assert!("ultra".parse::<Quality>().is_err());
    }

    #[test]
    fn expected_page_count_uses_inherited_formula() {
        let r = PageRange { from: 1, to: 10 };
        assert_eq!(r.expected_page_count(), 9);
        assert_eq!(r.len(), 10);
    }
}
