//! Download entry points: the whole pipeline behind one call.
//!
//! ## Ordering guarantees
//!
//! Input validation happens before the HTTP client is even constructed, so a
//! malformed URL or range can never cause network traffic. Every fatal error
//! propagates before [`write_artifact`] runs, so no partially edited or
//! partially downloaded file is ever persisted; non-fatal conditions inside
//! the document post-processor are warnings that still reach the writer.

use crate::config::{DownloadConfig, PageRange};
use crate::error::MagdownError;
use crate::output::{DownloadOutput, DownloadStats, Strategy};
use crate::pipeline::neutralize::NeutralizeOptions;
use crate::pipeline::{compose, locate, neutralize, probe, render};
use crate::url::PageUrl;
use std::path::Path;
use std::time::Instant;
use tracing::{debug, info};

/// Download a magazine and return the finished document in memory.
///
/// This is the primary entry point for the library. The sample `url` is one
/// page-image URL copied out of the HTML5 reader; `config` selects the
/// strategy and treatments.
///
/// # Errors
/// Fatal only — see [`MagdownError`]. Anchor misses and region-count drift
/// inside a rendered document are logged as warnings instead, and the
/// affected edits are skipped.
pub async fn download(
    url: &str,
    config: &DownloadConfig,
) -> Result<DownloadOutput, MagdownError> {
    let total_start = Instant::now();
    info!(%url, quality = %config.quality, "starting download");

    // ── Step 1: Validate the URL template (no network yet) ───────────────
    let template = PageUrl::parse(url)?;

    // ── Step 2: Build the HTTP client ────────────────────────────────────
    let client = reqwest::Client::builder()
        .build()
        .map_err(|e| MagdownError::Internal(format!("HTTP client construction failed: {e}")))?;

    // ── Step 3: Discover the last existing page ──────────────────────────
    let (start_zero, _) = config.range.zero_based();
    let prober = probe::HttpProber::new(client.clone(), template.clone());
    let discovery = probe::discover_last_page(&prober, start_zero, config.delay_ms).await?;
    let last_available = discovery.last_page + 1; // back to one-based
    info!(
        last_page = last_available,
        probes = discovery.probes,
        "discovery complete"
    );

    // ── Step 4: Cap the requested range to what exists ───────────────────
    let effective = PageRange {
        from: config.range.from,
        to: config.range.to.min(last_available),
    };
    if effective.to < config.range.from {
        return Err(MagdownError::InvalidConfig(format!(
            "Requested pages {}-{}, but the magazine ends at page {last_available}",
            config.range.from, config.range.to
        )));
    }
    if effective.to < config.range.to {
        info!(
            requested = config.range.to,
            capped = effective.to,
            "requested range exceeds the magazine; capping"
        );
    }
    let (from_zero, to_zero) = effective.zero_based();

    // ── Step 5: Fetch and assemble, per strategy ─────────────────────────
    let (pdf, watermark_regions, report, strategy) = if config.quality.is_pdf() {
        let user_id = config.uuid.as_deref().ok_or_else(|| {
            MagdownError::InvalidConfig(
                "Quality 'original' requires --uuid (the reader session identifier)".into(),
            )
        })?;
        let indices: Vec<u32> = (from_zero..=to_zero).collect();
        let mut doc = render::fetch_document(
            &client,
            &config.render_endpoint,
            template.magazine_id(),
            user_id,
            &indices,
        )
        .await?;

        // Locate once, then edit in place; all edits are width-preserving
        // so the offsets stay valid for the whole sequence.
        let regions = locate::locate_regions(&doc, effective.expected_page_count());
        let report = neutralize::neutralize(
            &mut doc,
            &regions,
            NeutralizeOptions {
                hide: config.hide_watermark,
                destroy: config.destroy_watermark,
                rewrite_timestamp: config.rewrite_timestamp,
            },
        );
        let found = regions.page_regions();
        (doc, found, report, Strategy::RemoteRender)
    } else {
        let pages = compose::fetch_pages(&client, &template, config, from_zero, to_zero).await?;
        let doc = compose::assemble_pdf(&pages, config.dpi)?;
        (
            doc,
            0,
            neutralize::EditReport::default(),
            Strategy::Composite,
        )
    };

    let stats = DownloadStats {
        strategy,
        range_from: effective.from,
        range_to: effective.to,
        last_available_page: last_available,
        probes: discovery.probes,
        document_bytes: pdf.len(),
        watermark_regions,
        opacity_edits: report.opacity_edits,
        streams_blanked: report.streams_blanked,
        timestamps_rewritten: report.timestamps_rewritten,
        total_duration_ms: total_start.elapsed().as_millis() as u64,
    };
    debug!(?stats, "download finished");
    Ok(DownloadOutput { pdf, stats })
}

/// Download a magazine and persist it at `path`.
///
/// Returns the run statistics; the buffer itself is consumed by the writer.
pub async fn download_to_file(
    url: &str,
    path: impl AsRef<Path>,
    config: &DownloadConfig,
) -> Result<DownloadStats, MagdownError> {
    let output = download(url, config).await?;
    write_artifact(path.as_ref(), &output.pdf).await?;
    info!(path = %path.as_ref().display(), bytes = output.pdf.len(), "artifact written");
    Ok(output.stats)
}

/// Persist a finished document in one operation.
///
/// No partial-write recovery: a failure here is fatal and the caller sees
/// the underlying I/O error. Nothing is written until the buffer is final.
pub async fn write_artifact(path: &Path, bytes: &[u8]) -> Result<(), MagdownError> {
    tokio::fs::write(path, bytes)
        .await
        .map_err(|source| MagdownError::OutputWriteFailed {
            path: path.to_path_buf(),
            source,
        })
}
