//! Output types returned by the download entry points.

use serde::{Deserialize, Serialize};

/// Which pipeline produced the artifact.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Strategy {
    /// Per-page JPEGs composited into a new PDF.
    Composite,
    /// Server-rendered PDF, post-processed in place.
    RemoteRender,
}

/// Statistics for one completed download.
///
/// Serialisable so the CLI can emit it with `--json` and runs can be diffed.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DownloadStats {
    pub strategy: Strategy,
    /// One-based first page actually fetched.
    pub range_from: u32,
    /// One-based last page actually fetched, after discovery capping.
    pub range_to: u32,
    /// Highest one-based page confirmed to exist server-side.
    pub last_available_page: u32,
    /// Probes spent on discovery.
    pub probes: u32,
    /// Final artifact size in bytes.
    pub document_bytes: usize,
    /// Per-page watermark regions the locator found (remote-render only).
    pub watermark_regions: usize,
    /// Opacity directives rewritten.
    pub opacity_edits: usize,
    /// Compressed stream payloads blanked.
    pub streams_blanked: usize,
    /// Timestamp values rewritten.
    pub timestamps_rewritten: usize,
    /// Wall-clock time for the whole run.
    pub total_duration_ms: u64,
}

/// The finished document plus everything worth reporting about the run.
///
/// The buffer is handed to the caller by value: after the neutralizer is
/// done nothing in the library holds on to it.
#[derive(Debug)]
pub struct DownloadOutput {
    /// Final document bytes, ready to persist.
    pub pdf: Vec<u8>,
    pub stats: DownloadStats,
}
