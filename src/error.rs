//! Error types for the magdown library.
//!
//! One fatal error type covers the whole pipeline. Per-region problems inside
//! a fetched document (a producer object that cannot be found, a stream span
//! that fails to inflate, a page-count drift against the anchor heuristic)
//! are deliberately *not* errors: the locator and neutralizer log a warning
//! and skip the affected edit, because the remaining edits are still valid
//! and the caller still wants the document. Every variant below aborts the
//! run before anything is written to disk.

use std::path::PathBuf;
use thiserror::Error;

/// All fatal errors returned by the magdown library.
///
/// Non-fatal conditions (anchor misses, region-count drift) are reported via
/// `tracing::warn!` and never surface here.
#[derive(Debug, Error)]
pub enum MagdownError {
    // ── Input validation ──────────────────────────────────────────────────
    /// The page URL does not match the expected CDN path template.
    #[error(
        "URL path does not match the expected pattern: '{path}'\n{reason}\n\
         Expected: /mcmags/<uuid>/<uuid>/<extralow|low|mid|high>/<dddd>.jpg"
    )]
    UrlPatternMismatch { path: String, reason: String },

    /// The input string is not a parseable HTTP/HTTPS URL at all.
    #[error("Invalid input '{input}': not a valid HTTP/HTTPS URL")]
    InvalidUrl { input: String },

    /// Builder validation failed.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    // ── Probing / discovery ───────────────────────────────────────────────
    /// A probe returned a status other than 200 or 404. Never retried:
    /// anything else means an authentication or availability problem the
    /// pipeline cannot resolve on its own.
    #[error(
        "Unexpected HTTP {status} while probing page {page}\n\
         Only 200 and 404 are expected from the page store."
    )]
    UnexpectedProbeStatus { page: u32, status: u16 },

    /// The discovery loop spent its whole miss budget without ever finding
    /// an existing page.
    #[error(
        "No pages found: {misses} consecutive probes starting at page {start} all returned 404\n\
         Check the magazine UUIDs and --range-from."
    )]
    DiscoveryExhausted { start: u32, misses: u32 },

    // ── Transport ─────────────────────────────────────────────────────────
    /// A request could not be completed at the transport level.
    #[error("Request to '{url}' failed: {reason}\nCheck your internet connection.")]
    Transport { url: String, reason: String },

    /// The bulk render endpoint refused to produce the document.
    #[error("Render request failed with HTTP {status}\nThe document could not be rendered.")]
    RenderFailed { status: u16 },

    /// The render endpoint answered 200 but the body is not a PDF —
    /// usually an HTML error page (expired session, unknown magazine).
    #[error("Render endpoint did not return a PDF (first bytes: {magic:?})\nCheck --uuid.")]
    RenderNotPdf { magic: [u8; 4] },

    /// A per-page image fetch returned a non-200 status. Discovery already
    /// capped the range to pages that exist, so this is a contract violation.
    #[error("Page image {page} fetch failed with HTTP {status}")]
    PageFetchFailed { page: u32, status: u16 },

    // ── Compositing ───────────────────────────────────────────────────────
    /// A downloaded page image could not be decoded.
    #[error("Page {page}: image decode failed: {detail}")]
    ImageDecode { page: u32, detail: String },

    /// The output PDF could not be assembled.
    #[error("PDF assembly failed: {detail}")]
    PdfAssembly { detail: String },

    // ── I/O ───────────────────────────────────────────────────────────────
    /// Could not write the finished artifact.
    #[error("Failed to write output file '{path}': {source}")]
    OutputWriteFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    // ── Catch-all ─────────────────────────────────────────────────────────
    /// Unexpected internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn probe_status_display() {
        let e = MagdownError::UnexpectedProbeStatus {
            page: 12,
            status: 503,
        };
        let msg = e.to_string();
        assert!(msg.contains("503"), "got: {msg}");
        assert!(msg.contains("page 12"), "got: {msg}");
    }

    #[test]
    fn exhaustion_display_is_distinct_from_transport() {
        let e = MagdownError::DiscoveryExhausted {
            start: 0,
            misses: 20,
        };
        assert!(e.to_string().contains("20 consecutive probes"));
        assert!(!e.to_string().contains("internet connection"));
    }

    #[test]
    fn url_mismatch_shows_expected_shape() {
        let e = MagdownError::UrlPatternMismatch {
            path: "/mcmags/nope/low/0001.jpg".into(),
            reason: "wrong number of path segments".into(),
        };
        assert!(e.to_string().contains("/mcmags/<uuid>/<uuid>/"));
    }
}
