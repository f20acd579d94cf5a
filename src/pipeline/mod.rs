//! Pipeline stages for magazine download and reassembly.
//!
//! Each submodule implements exactly one transformation step. Keeping the
//! stages separate makes each independently testable — the discovery loop
//! runs against a synthetic page oracle, the locator and neutralizer against
//! synthetic documents — without a network in sight.
//!
//! ## Data Flow
//!
//! ```text
//! url ──▶ probe ──▶ render ───▶ locate ──▶ neutralize ──▶ write
//!         (HTTP)   (bulk POST)  (anchors)  (in-place)
//!            │
//!            └────▶ compose ──────────────────────────▶ write
//!                   (per-page JPEG → PDF)
//! ```
//!
//! 1. [`probe`]      — adaptive last-page discovery over HTTP status probes
//! 2. [`render`]     — one bulk request returning server-rendered PDF bytes
//! 3. [`locate`]     — anchor-literal scan recording every editable offset
//! 4. [`neutralize`] — width-preserving watermark and timestamp edits
//! 5. [`compose`]    — the raster-tier alternative: fetch JPEGs, build a PDF
//!
//! The buffer hand-off follows ownership: the locator borrows the document
//! read-only, the neutralizer borrows it mutably, the artifact writer in
//! [`crate::download`] consumes it. No stage runs concurrently with another.

pub mod compose;
pub mod locate;
pub mod neutralize;
pub mod probe;
pub mod render;
