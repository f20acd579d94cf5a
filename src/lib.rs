//! # magdown
//!
//! Download a paginated magazine from the Pocketmags HTML5-reader CDN and
//! reassemble it as a single PDF.
//!
//! ## Why this crate?
//!
//! The HTML5 reader serves each page as an image behind a predictable URL —
//! but nothing tells you how many pages a magazine has, and the "print"
//! endpoint stamps a faint per-page ownership watermark into everything it
//! renders. This crate measures the magazine's true extent with an adaptive
//! probing search, then either composites the page images into a clean PDF
//! or fetches the server-rendered PDF and neutralizes its watermarks with
//! byte-exact in-place edits that leave the container structure untouched.
//!
//! ## Pipeline Overview
//!
//! ```text
//! page URL
//!  │
//!  ├─ 1. Validate  UUIDs / tier / page number, before any network
//!  ├─ 2. Probe     adaptive search for the last existing page
//!  ├─ 3a. Compose  fetch per-page JPEGs, build a PDF around them
//!  ├─ 3b. Render   one bulk request → server-rendered PDF bytes
//!  ├─ 4.  Locate   anchor-literal scan of the watermark preamble   (3b only)
//!  ├─ 5.  Edit     width-preserving opacity/stream/timestamp edits (3b only)
//!  └─ 6.  Write    single atomic write of the finished artifact
//! ```
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use magdown::{download_to_file, DownloadConfig, PageRange, Quality};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = DownloadConfig::builder()
//!         .quality(Quality::Original)
//!         .range(PageRange { from: 1, to: 10 })
//!         .hide_watermark(true)
//!         .uuid("ba9c5bcb-cf96-4215-a2f5-841ddb4a119c")
//!         .build()?;
//!     let stats = download_to_file(
//!         "https://mcdatastore.blob.core.windows.net/mcmags/f3786b15-4b19-456e-9b58-2af137a35bcd/ba9c5bcb-cf96-4215-a2f5-841ddb4a119c/mid/0046.jpg",
//!         "magazine.pdf",
//!         &config,
//!     )
//!     .await?;
//!     eprintln!("{} pages, {} bytes", stats.range_to - stats.range_from + 1, stats.document_bytes);
//!     Ok(())
//! }
//! ```
//!
//! ## Feature Flags
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `cli`   | on      | Enables the `magdown` binary (clap + anyhow + tracing-subscriber + indicatif) |
//!
//! Disable `cli` when using only the library:
//! ```toml
//! magdown = { version = "0.4", default-features = false }
//! ```

// ── Modules ──────────────────────────────────────────────────────────────

pub mod config;
pub mod download;
pub mod error;
pub mod output;
pub mod pipeline;
pub mod url;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use config::{
    DownloadConfig, DownloadConfigBuilder, PageProgress, PageRange, Quality,
    DEFAULT_RENDER_ENDPOINT,
};
pub use download::{download, download_to_file, write_artifact};
pub use error::MagdownError;
pub use output::{DownloadOutput, DownloadStats, Strategy};
pub use url::PageUrl;
