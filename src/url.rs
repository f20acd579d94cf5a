//! Inbound URL template: parse and validate a single page-image URL.
//!
//! Users hand us one URL copied out of the HTML5 reader ("inspect element"
//! on any page), of the form:
//!
//! ```text
//! https://<host>/mcmags/<bucket-uuid>/<magazine-uuid>/<tier>/<dddd>.jpg
//! ```
//!
//! Everything the pipeline needs is recoverable from that one sample: the
//! storage bucket, the magazine identity, and the host to fetch from. The
//! path is validated *before* any network activity so a mistyped UUID fails
//! with a parse error rather than a confusing chain of 404s.

use crate::config::{is_canonical_uuid, Quality};
use crate::error::MagdownError;
use once_cell::sync::Lazy;
use regex::Regex;

/// Full path shape, anchored. The tier in the sample URL is irrelevant to
/// later fetches (we substitute our own) but must still be a known segment.
static URL_PATH_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"^/mcmags/([0-9a-f]{8}-[0-9a-f]{4}-[0-9a-f]{4}-[0-9a-f]{4}-[0-9a-f]{12})/([0-9a-f]{8}-[0-9a-f]{4}-[0-9a-f]{4}-[0-9a-f]{4}-[0-9a-f]{12})/(extralow|low|mid|high)/([0-9]{4})\.jpg$",
    )
    .expect("URL path regex is valid")
});

/// A validated per-page resource URL template.
///
/// Renders concrete page URLs by substituting a quality segment and a
/// four-digit zero-padded page number into the sample the user supplied.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageUrl {
    /// Scheme + host of the page store, no trailing slash.
    origin: String,
    /// Storage-bucket identifier (first UUID segment).
    bucket: String,
    /// Magazine/document identifier (second UUID segment).
    magazine: String,
}

impl PageUrl {
    /// Parse and validate a sample page URL.
    ///
    /// Rejects anything that is not an HTTP(S) URL whose path matches the
    /// store's template, with a reason naming the first offending segment.
    pub fn parse(input: &str) -> Result<Self, MagdownError> {
        let url = reqwest::Url::parse(input).map_err(|_| MagdownError::InvalidUrl {
            input: input.to_string(),
        })?;
        if !matches!(url.scheme(), "http" | "https") || url.host_str().is_none() {
            return Err(MagdownError::InvalidUrl {
                input: input.to_string(),
            });
        }

        let path = url.path();
        let caps = URL_PATH_PATTERN.captures(path).ok_or_else(|| {
            MagdownError::UrlPatternMismatch {
                path: path.to_string(),
                reason: diagnose_path(path),
            }
        })?;

        let origin = format!(
            "{}://{}",
            url.scheme(),
            url.host_str().expect("host checked above")
        );

        Ok(Self {
            origin,
            bucket: caps[1].to_string(),
            magazine: caps[2].to_string(),
        })
    }

    /// Magazine/document identifier, sent with the bulk render request.
    pub fn magazine_id(&self) -> &str {
        &self.magazine
    }

    /// Render the URL of one page at one raster tier.
    ///
    /// # Panics
    /// Panics if `quality` is [`Quality::Original`], which has no per-page
    /// raster URL; callers on the PDF path never build page URLs.
    pub fn page_url(&self, quality: Quality, index: u32) -> String {
        let segment = quality
            .segment()
            .expect("raster tiers only; 'original' has no page URL");
        format!(
            "{}/mcmags/{}/{}/{}/{:04}.jpg",
            self.origin, self.bucket, self.magazine, segment, index
        )
    }

    /// The cheapest URL for an existence probe of one page.
    pub fn probe_url(&self, index: u32) -> String {
        self.page_url(Quality::ExtraLow, index)
    }
}

/// Name the first offending segment of a non-matching path. Best effort;
/// the overall regex remains the source of truth.
fn diagnose_path(path: &str) -> String {
    let segments: Vec<&str> = path.trim_start_matches('/').split('/').collect();
    if segments.first() != Some(&"mcmags") {
        return "path must start with /mcmags/".into();
    }
    if segments.len() != 5 {
        return format!("expected 5 path segments, found {}", segments.len());
    }
    if !is_canonical_uuid(segments[1]) {
        return format!("'{}' is not a canonical lowercase UUID", segments[1]);
    }
    if !is_canonical_uuid(segments[2]) {
        return format!("'{}' is not a canonical lowercase UUID", segments[2]);
    }
    if !matches!(segments[3], "extralow" | "low" | "mid" | "high") {
        return format!("'{}' is not a known quality tier", segments[3]);
    }
    format!("'{}' is not a 4-digit .jpg page name", segments[4])
}
