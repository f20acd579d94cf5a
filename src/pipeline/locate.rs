//! Document region locator: find every byte range the neutralizer may edit.
//!
//! The rendered document is not parsed as a PDF object graph. The generator
//! behind the render endpoint emits its objects in a fixed order, so plain
//! forward substring search over known anchor literals is both sufficient
//! and far more robust than a structural parser against the one container
//! family we target. All scanning is forward-only; offsets are discovered
//! once and stay valid because every later edit is width-preserving.
//!
//! Layout assumption baked into the anchors: everything before the first
//! page object (`/Type /Page /MediaBox`) is *preamble* holding only the
//! per-page ownership metadata — the producer object, one 20-byte opacity
//! directive per page, and one pair of compressed streams per page
//! (placement geometry, then watermark text). Bytes at or after the
//! boundary are real content and are never scanned or edited.

use std::ops::Range;
use tracing::{debug, warn};

// ── Anchor literals ──────────────────────────────────────────────────────
// Exact byte sequences emitted by the render generator. Must match verbatim.

/// First page object with a visible area; start of real content.
pub const PAGE_OBJECT_MARKER: &[u8] = b"/Type /Page /MediaBox";
/// Generator-metadata object.
pub const PRODUCER_MARKER: &[u8] = b"/Producer";
/// Generic end-of-object keyword.
pub const END_OBJECT_MARKER: &[u8] = b"endobj";
/// Length entry opening a compressed stream dictionary.
pub const STREAM_LENGTH_MARKER: &[u8] = b"<</Length ";
/// Semi-transparent fill+stroke directive the watermark is painted with.
pub const OPACITY_DIRECTIVE: &[u8; 20] = b"/ca 0.125 /CA 0.125 ";
/// Width of the `YYYYMMDDHHMMSS` timestamp values.
pub const TIMESTAMP_WIDTH: usize = 14;

/// A fixed-width scalar anchor: a literal tag whose value sits at a constant
/// distance past the match. Declaring these as data documents the container
/// dependency in one place and lets the scanner be tested in isolation.
#[derive(Debug, Clone, Copy)]
pub struct Anchor {
    pub literal: &'static [u8],
    /// Distance from the start of the literal match to the value.
    pub value_offset: usize,
    pub value_len: usize,
}

/// `CreationDate(D:` — value begins 15 bytes past the tag start.
pub const CREATION_STAMP: Anchor = Anchor {
    literal: b"CreationDate",
    value_offset: 15,
    value_len: TIMESTAMP_WIDTH,
};

/// `ModDate(D:` — value begins 10 bytes past the tag start.
pub const MOD_STAMP: Anchor = Anchor {
    literal: b"ModDate",
    value_offset: 10,
    value_len: TIMESTAMP_WIDTH,
};

// ── Region table ─────────────────────────────────────────────────────────

/// One compressed watermark stream inside the preamble.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StreamRegion {
    /// Offset of the `<</Length ` marker.
    pub marker: usize,
    /// Declared stream length in bytes, as written in the dictionary.
    pub declared_len: usize,
    /// Offset of the first payload byte (past the `stream` keyword and EOL).
    pub data: usize,
}

/// Byte offsets of every editable region, discovered in one pass.
///
/// Offsets index into the buffer they were discovered on and remain valid
/// only while the buffer length is unchanged — which the neutralizer
/// guarantees by performing fixed-width edits exclusively.
#[derive(Debug, Default)]
pub struct RegionMap {
    /// Start of real content; `None` when the boundary marker is absent,
    /// in which case nothing is editable.
    pub content_boundary: Option<usize>,
    /// Span of the producer-metadata object within the preamble.
    pub producer: Option<Range<usize>>,
    /// Offset of the 14-byte creation timestamp value.
    pub creation_stamp: Option<usize>,
    /// Offset of the 14-byte modification timestamp value.
    pub mod_stamp: Option<usize>,
    /// Offsets of every 20-byte opacity directive, in document order.
    pub opacity: Vec<usize>,
    /// Even-indexed compressed streams: watermark placement geometry.
    pub placement_streams: Vec<StreamRegion>,
    /// Odd-indexed compressed streams: watermark text.
    pub text_streams: Vec<StreamRegion>,
}

impl RegionMap {
    /// Number of per-page watermark instances the scan believes it found.
    pub fn page_regions(&self) -> usize {
        self.opacity.len()
    }
}

/// Forward substring search from `start`. Returns the match offset.
fn find_subslice(haystack: &[u8], needle: &[u8], start: usize) -> Option<usize> {
    if needle.is_empty() || start >= haystack.len() {
        return None;
    }
    haystack[start..]
        .windows(needle.len())
        .position(|w| w == needle)
        .map(|pos| start + pos)
}

/// Every non-overlapping occurrence of `needle` in `haystack[..end]`.
fn find_all(haystack: &[u8], needle: &[u8], end: usize) -> Vec<usize> {
    let window = &haystack[..end.min(haystack.len())];
    let mut found = Vec::new();
    let mut cursor = 0;
    while let Some(at) = find_subslice(window, needle, cursor) {
        found.push(at);
        cursor = at + needle.len();
    }
    found
}

/// Scan the document once and record every editable region.
///
/// `expected_pages` is the cross-check count derived from the resolved page
/// range; a drift against the discovered per-page regions is logged as a
/// warning and never aborts — the anchors themselves may still be valid.
pub fn locate_regions(buf: &[u8], expected_pages: u32) -> RegionMap {
    let mut map = RegionMap::default();

    // Content boundary first: it bounds every other search window. Without
    // it there is no safe notion of "preamble", so nothing gets edited.
    let Some(boundary) = find_subslice(buf, PAGE_OBJECT_MARKER, 0) else {
        warn!("page-object marker not found; skipping all watermark edits");
        return map;
    };
    map.content_boundary = Some(boundary);
    debug!(boundary, "preamble ends");

    // Producer object and its two timestamp values.
    match find_subslice(&buf[..boundary], PRODUCER_MARKER, 0) {
        Some(producer_at) => match find_subslice(buf, END_OBJECT_MARKER, producer_at) {
            Some(end) => {
                let span = producer_at..end;
                map.creation_stamp = locate_value(buf, &span, CREATION_STAMP);
                map.mod_stamp = locate_value(buf, &span, MOD_STAMP);
                map.producer = Some(span);
            }
            None => warn!("producer object has no endobj; skipping timestamp regions"),
        },
        None => warn!("producer object not found; skipping timestamp regions"),
    }

    // One opacity directive per watermark instance.
    map.opacity = find_all(buf, OPACITY_DIRECTIVE, boundary);

    // Compressed streams alternate placement/text in generator order. The
    // parity assignment is a heuristic inherited from the generator's fixed
    // interleaving; nothing here verifies which stream is which.
    for (n, marker) in find_all(buf, STREAM_LENGTH_MARKER, boundary)
        .into_iter()
        .enumerate()
    {
        match parse_stream_region(buf, marker) {
            Some(region) => {
                if n % 2 == 0 {
                    map.placement_streams.push(region);
                } else {
                    map.text_streams.push(region);
                }
            }
            None => warn!(marker, "malformed stream header; skipping stream region"),
        }
    }

    let found = map.page_regions();
    if found as u32 != expected_pages {
        warn!(
            found,
            expected = expected_pages,
            "per-page region count differs from the resolved range; continuing best-effort"
        );
    }
    debug!(
        opacity = map.opacity.len(),
        placement = map.placement_streams.len(),
        text = map.text_streams.len(),
        "regions located"
    );
    map
}

/// Find a fixed-width anchored value inside `span`, bounds-checked against
/// both the span and the buffer so the neutralizer can edit blindly.
fn locate_value(buf: &[u8], span: &Range<usize>, anchor: Anchor) -> Option<usize> {
    let at = find_subslice(&buf[..span.end], anchor.literal, span.start)?;
    let value = at + anchor.value_offset;
    if value + anchor.value_len > span.end {
        warn!(at, "anchored value runs past its object; skipping");
        return None;
    }
    Some(value)
}

/// Parse `<</Length N…stream\n` starting at the marker offset.
fn parse_stream_region(buf: &[u8], marker: usize) -> Option<StreamRegion> {
    let digits_at = marker + STREAM_LENGTH_MARKER.len();
    let mut cursor = digits_at;
    while cursor < buf.len() && buf[cursor].is_ascii_digit() {
        cursor += 1;
    }
    if cursor == digits_at {
        return None;
    }
    let declared_len: usize = std::str::from_utf8(&buf[digits_at..cursor])
        .ok()?
        .parse()
        .ok()?;

    // `stream` keyword follows within the same dictionary header.
    let kw = find_subslice(buf, b"stream", cursor)?;
    let mut data = kw + b"stream".len();
    if buf.get(data) == Some(&b'\r') {
        data += 1;
    }
    if buf.get(data) == Some(&b'\n') {
        data += 1;
    }
    if data + declared_len > buf.len() {
        return None;
    }
    Some(StreamRegion {
        marker,
        declared_len,
        data,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Minimal preamble + one page object, two watermark instances.
    fn synthetic_doc() -> Vec<u8> {
        let mut doc = Vec::new();
        doc.extend_from_slice(b"%PDF-1.5\n");
        doc.extend_from_slice(
            b"1 0 obj<</Producer(MagCloner 9.2)/CreationDate(D:20240301101500+00'00')/ModDate(D:20240301101501+00'00')>>endobj\n",
        );
        for n in 0..2u8 {
            doc.extend_from_slice(b"2 0 obj<<");
            doc.extend_from_slice(OPACITY_DIRECTIVE);
            doc.extend_from_slice(b">>endobj\n");
            let payload = vec![b'a' + n; 11];
            doc.extend_from_slice(format!("<</Length {}>>stream\n", payload.len()).as_bytes());
            doc.extend_from_slice(&payload);
            doc.extend_from_slice(b"\nendstream endobj\n");
            let payload = vec![b'x' + n; 7];
            doc.extend_from_slice(format!("<</Length {}>>stream\n", payload.len()).as_bytes());
            doc.extend_from_slice(&payload);
            doc.extend_from_slice(b"\nendstream endobj\n");
        }
        doc.extend_from_slice(b"9 0 obj<</Type /Page /MediaBox [0 0 612 792]>>endobj\n");
        // Post-boundary decoys that must never be picked up.
        doc.extend_from_slice(OPACITY_DIRECTIVE);
        doc.extend_from_slice(b"<</Length 3>>stream\nxyz\nendstream\n");
        doc
    }

    #[test]
    fn finds_all_regions_in_document_order() {
        let doc = synthetic_doc();
        let map = locate_regions(&doc, 2);

        assert!(map.content_boundary.is_some());
        assert!(map.producer.is_some());
        assert_eq!(map.opacity.len(), 2);
        assert_eq!(map.placement_streams.len(), 2);
        assert_eq!(map.text_streams.len(), 2);
        assert!(map.opacity.windows(2).all(|w| w[0] < w[1]));
    }

    #[test]
    fn timestamp_values_point_at_digits() {
        let doc = synthetic_doc();
        let map = locate_regions(&doc, 2);
        let c = map.creation_stamp.unwrap();
        assert_eq!(&doc[c..c + TIMESTAMP_WIDTH], b"20240301101500");
        let m = map.mod_stamp.unwrap();
        assert_eq!(&doc[m..m + TIMESTAMP_WIDTH], b"20240301101501");
    }

    #[test]
    fn streams_alternate_placement_then_text() {
        let doc = synthetic_doc();
        let map = locate_regions(&doc, 2);
        assert_eq!(map.placement_streams[0].declared_len, 11);
        assert_eq!(map.text_streams[0].declared_len, 7);
        let p = &map.placement_streams[0];
        assert_eq!(&doc[p.data..p.data + p.declared_len], b"aaaaaaaaaaa");
    }

    #[test]
    fn nothing_past_the_boundary_is_recorded() {
        let doc = synthetic_doc();
        let map = locate_regions(&doc, 2);
        let boundary = map.content_boundary.unwrap();
        assert!(map.opacity.iter().all(|&o| o < boundary));
        assert!(map
            .placement_streams
            .iter()
            .chain(&map.text_streams)
            .all(|s| s.marker < boundary));
    }

    #[test]
    fn missing_boundary_disables_everything() {
        let map = locate_regions(b"no markers here at all", 1);
        assert!(map.content_boundary.is_none());
        assert_eq!(map.page_regions(), 0);
        assert!(map.placement_streams.is_empty());
    }

    #[test]
    fn missing_producer_skips_timestamps_only() {
        let mut doc = Vec::new();
        doc.extend_from_slice(OPACITY_DIRECTIVE);
        doc.extend_from_slice(b"9 0 obj<</Type /Page /MediaBox [0 0 1 1]>>endobj");
        let map = locate_regions(&doc, 1);
        assert!(map.producer.is_none());
        assert!(map.creation_stamp.is_none());
        assert_eq!(map.opacity.len(), 1);
    }

    #[test]
    fn count_drift_is_tolerated() {
        let doc = synthetic_doc();
        // Expected 5, found 2 — must still return the full map.
        let map = locate_regions(&doc, 5);
        assert_eq!(map.opacity.len(), 2);
    }

    #[test]
    fn truncated_stream_header_is_skipped() {
        let mut doc = Vec::new();
        doc.extend_from_slice(b"<</Length 999>>stream\nshort");
        doc.extend_from_slice(b"/Type /Page /MediaBox");
        // Declared length exceeds the buffer: the region must be dropped,
        // not recorded with an out-of-bounds span.
        let map = locate_regions(&doc, 0);
        assert!(map.placement_streams.is_empty());
        assert!(map.text_streams.is_empty());
    }
}
