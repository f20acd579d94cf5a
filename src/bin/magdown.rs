//! CLI binary for magdown.
//!
//! A thin shim over the library crate that maps CLI flags to
//! `DownloadConfig` and prints results.

use anyhow::{Context, Result};
use clap::Parser;
use indicatif::{ProgressBar, ProgressStyle};
use magdown::{download_to_file, DownloadConfig, PageRange, Quality, Strategy};
use std::io;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

// ── ANSI colour helpers (no extra deps) ──────────────────────────────────────

fn green(s: &str) -> String {
    format!("\x1b[32m{s}\x1b[0m")
}
fn cyan(s: &str) -> String {
    format!("\x1b[36m{s}\x1b[0m")
}
fn dim(s: &str) -> String {
    format!("\x1b[2m{s}\x1b[0m")
}
fn bold(s: &str) -> String {
    format!("\x1b[1m{s}\x1b[0m")
}

const AFTER_HELP: &str = r#"EXAMPLES:
  # Composite the mid-quality page images into a PDF
  magdown magazine.pdf "https://mcdatastore.blob.core.windows.net/mcmags/<uuid>/<uuid>/mid/0046.jpg"

  # High quality, pages 10-30 only, half a second between probes
  magdown --quality high --range-from 10 --range-to 30 --delay-ms 500 magazine.pdf <url>

  # Server-rendered original PDF with the watermark hidden
  magdown --quality original --uuid <session-uuid> --hide-watermark magazine.pdf <url>

  # Stronger: blank the watermark streams and refresh the timestamps
  magdown --quality original --uuid <session-uuid> --destroy-watermark --rewrite-timestamp out.pdf <url>

FINDING THE URL:
  Open the magazine in the HTML5 reader, right-click any page and choose
  "inspect element". Look for an image URL of the form

      https://<host>/mcmags/<uuid>/<uuid>/<tier>/<dddd>.jpg

  Any page at any tier works; the tier and page number in the sample are
  replaced during the download.

PLEASE USE THIS TOOL RESPONSIBLY. THE MAGAZINE PUBLISHING INDUSTRY RELIES
HEAVILY ON INCOME FROM SALES WITH VERY SLIM PROFIT MARGINS. Download only
magazines you have bought.
"#;

/// Download a Pocketmags magazine as a single PDF.
#[derive(Parser, Debug)]
#[command(
    name = "magdown",
    version,
    about = "Download a Pocketmags magazine as a single PDF",
    long_about = "Download a paginated magazine from the Pocketmags HTML5 reader. Raster \
quality tiers composite the page images into a new PDF; quality 'original' fetches a \
server-rendered PDF and edits its per-page watermarks in place.",
    arg_required_else_help = true,
    color = clap::ColorChoice::Auto,
    after_long_help = AFTER_HELP
)]
struct Cli {
    /// Save the output PDF to this file.
    pdf: PathBuf,

    /// URL of one page image from the magazine (see --help for how to find it).
    url: String,

    /// Quality tier: extralow, low, mid, high, or original (server-rendered PDF).
    #[arg(long, env = "MAGDOWN_QUALITY", value_enum, default_value = "mid")]
    quality: QualityArg,

    /// Image resolution in dots per inch (72–400); sizes composited pages.
    #[arg(long, env = "MAGDOWN_DPI", default_value_t = 150,
          value_parser = clap::value_parser!(u32).range(72..=400))]
    dpi: u32,

    /// First page to download (1-indexed).
    #[arg(long, env = "MAGDOWN_RANGE_FROM", default_value_t = 1)]
    range_from: u32,

    /// Last page to download (1-indexed, inclusive); capped to what exists.
    #[arg(long, env = "MAGDOWN_RANGE_TO", default_value_t = 9999)]
    range_to: u32,

    /// Delay between successive page probes, in milliseconds.
    #[arg(long, env = "MAGDOWN_DELAY_MS", default_value_t = 0)]
    delay_ms: u64,

    /// Make the per-page watermark fully transparent (geometry kept).
    #[arg(long, env = "MAGDOWN_HIDE_WATERMARK")]
    hide_watermark: bool,

    /// Blank the watermark's opacity, placement and text data outright.
    /// Overrides --hide-watermark.
    #[arg(long, env = "MAGDOWN_DESTROY_WATERMARK")]
    destroy_watermark: bool,

    /// Rewrite the document's creation/modification timestamps to now.
    #[arg(long, env = "MAGDOWN_REWRITE_TIMESTAMP")]
    rewrite_timestamp: bool,

    /// Reader session identifier; required with --quality original.
    #[arg(long, env = "MAGDOWN_UUID")]
    uuid: Option<String>,

    /// Print run statistics as JSON to stdout.
    #[arg(long, env = "MAGDOWN_JSON")]
    json: bool,

    /// Disable the progress bar.
    #[arg(long, env = "MAGDOWN_NO_PROGRESS")]
    no_progress: bool,

    /// Enable DEBUG-level tracing logs.
    #[arg(short, long, env = "MAGDOWN_VERBOSE")]
    verbose: bool,

    /// Suppress all output except errors.
    #[arg(short, long, env = "MAGDOWN_QUIET")]
    quiet: bool,
}

#[derive(clap::ValueEnum, Clone, Debug)]
enum QualityArg {
    Extralow,
    Low,
    Mid,
    High,
    Original,
}

impl From<QualityArg> for Quality {
    fn from(v: QualityArg) -> Self {
        match v {
            QualityArg::Extralow => Quality::ExtraLow,
            QualityArg::Low => Quality::Low,
            QualityArg::Mid => Quality::Mid,
            QualityArg::High => Quality::High,
            QualityArg::Original => Quality::Original,
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // ── Logging setup ────────────────────────────────────────────────────
    // Suppress INFO-level library logs when the progress bar is active;
    // the bar provides all the feedback that matters to the user.
    let show_progress = !cli.quiet && !cli.no_progress && !cli.json;
    let filter = if cli.verbose {
        "debug"
    } else if cli.quiet || show_progress {
        "error"
    } else {
        "info"
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)),
        )
        .with_writer(io::stderr)
        .init();

    // ── Build config ─────────────────────────────────────────────────────
    let quality: Quality = cli.quality.clone().into();

    let bar = if show_progress {
        let bar = ProgressBar::new(0);
        bar.set_style(
            ProgressStyle::with_template(
                "{spinner:.cyan} {prefix:.bold}  [{bar:42.green/238}] {pos:>3}/{len} pages  ⏱ {elapsed_precise}",
            )
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("█▉▊▋▌▍▎▏  "),
        );
        bar.set_prefix(if quality.is_pdf() {
            "Rendering"
        } else {
            "Downloading"
        });
        bar.enable_steady_tick(Duration::from_millis(80));
        Some(bar)
    } else {
        None
    };

    let mut builder = DownloadConfig::builder()
        .quality(quality)
        .dpi(cli.dpi)
        .range(PageRange {
            from: cli.range_from,
            to: cli.range_to,
        })
        .delay_ms(cli.delay_ms)
        .hide_watermark(cli.hide_watermark)
        .destroy_watermark(cli.destroy_watermark)
        .rewrite_timestamp(cli.rewrite_timestamp);

    if let Some(ref uuid) = cli.uuid {
        builder = builder.uuid(uuid.clone());
    }
    if let Some(ref bar) = bar {
        let bar = bar.clone();
        builder = builder.progress(Arc::new(move |done, total| {
            if bar.length() != Some(total as u64) {
                bar.set_length(total as u64);
            }
            bar.set_position(done as u64);
        }));
    }

    let config = builder.build().context("Invalid configuration")?;

    // ── Run download ─────────────────────────────────────────────────────
    let result = download_to_file(&cli.url, &cli.pdf, &config).await;
    if let Some(ref bar) = bar {
        bar.finish_and_clear();
    }
    let stats = result.context("Download failed")?;

    if cli.json {
        println!(
            "{}",
            serde_json::to_string_pretty(&stats).context("Failed to serialise stats")?
        );
        return Ok(());
    }

    if !cli.quiet {
        let pages = stats.range_to - stats.range_from + 1;
        eprintln!(
            "{} {} pages  {}  {}ms  →  {}",
            green("✔"),
            bold(&pages.to_string()),
            dim(&format!("{} bytes", stats.document_bytes)),
            stats.total_duration_ms,
            bold(&cli.pdf.display().to_string()),
        );
        if stats.strategy == Strategy::RemoteRender {
            eprintln!(
                "   {} watermark regions  {} opacity edits  {} streams blanked  {} timestamps",
                dim(&stats.watermark_regions.to_string()),
                dim(&stats.opacity_edits.to_string()),
                dim(&stats.streams_blanked.to_string()),
                dim(&stats.timestamps_rewritten.to_string()),
            );
        }
        if stats.range_to < cli.range_to && cli.range_to != 9999 {
            eprintln!(
                "   {} requested up to page {}, magazine ends at {}",
                cyan("⚠"),
                cli.range_to,
                stats.last_available_page
            );
        }
    }

    Ok(())
}
