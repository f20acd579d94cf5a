//! Watermark neutralizer: width-preserving in-place edits.
//!
//! Every edit in this module replaces exactly as many bytes as it removes.
//! That single invariant is what keeps the [`RegionMap`] valid across the
//! whole edit sequence and spares us from recomputing any `/Length` entry
//! or cross-reference offset elsewhere in the container. An edit that could
//! change the buffer length has no place here.
//!
//! Two treatments exist, selected by config:
//!
//! * **hide** — rewrite each opacity directive to fully transparent,
//!   leaving the watermark geometry in the document but invisible.
//! * **destroy** — zero the opacity directives outright and blank each
//!   placement/text stream payload. The zlib framing tells us how many
//!   compressed bytes a stream actually occupies; exactly those bytes are
//!   overwritten with ASCII `'0'`, so the declared length stays truthful
//!   about the span it covers.
//!
//! `destroy` overrides `hide` when both are requested.

use crate::pipeline::locate::{RegionMap, StreamRegion, OPACITY_DIRECTIVE, TIMESTAMP_WIDTH};
use chrono::Local;
use flate2::read::ZlibDecoder;
use std::io::Read;
use tracing::{debug, warn};

/// Same-width replacement: fill and stroke opacity forced to 0.0.
pub const OPACITY_HIDDEN: &[u8; 20] = b"/ca 0.000 /CA 0.000 ";
/// Same-width replacement: directive obliterated entirely.
pub const OPACITY_ZEROED: &[u8; 20] = b"00000000000000000000";

/// Which treatments to apply. Derived from the user config by the
/// orchestrator; kept separate so the neutralizer can be driven directly
/// in tests.
#[derive(Debug, Clone, Copy, Default)]
pub struct NeutralizeOptions {
    pub hide: bool,
    pub destroy: bool,
    pub rewrite_timestamp: bool,
}

/// Counts of edits actually performed, for stats and logging.
#[derive(Debug, Default, PartialEq, Eq)]
pub struct EditReport {
    pub opacity_edits: usize,
    pub streams_blanked: usize,
    pub streams_skipped: usize,
    pub timestamps_rewritten: usize,
}

/// Apply the selected treatments to `buf` in place.
///
/// `regions` must have been located on this exact buffer. The buffer length
/// is never changed; callers may assert `buf.len()` before and after.
pub fn neutralize(buf: &mut [u8], regions: &RegionMap, opts: NeutralizeOptions) -> EditReport {
    let mut report = EditReport::default();

    if opts.hide && opts.destroy {
        warn!("--hide-watermark and --destroy-watermark both set; destroy takes precedence");
    }

    let opacity_replacement: Option<&[u8; 20]> = if opts.destroy {
        Some(OPACITY_ZEROED)
    } else if opts.hide {
        Some(OPACITY_HIDDEN)
    } else {
        None
    };

    if let Some(replacement) = opacity_replacement {
        for &at in &regions.opacity {
            buf[at..at + OPACITY_DIRECTIVE.len()].copy_from_slice(replacement);
            report.opacity_edits += 1;
        }
        debug!(edits = report.opacity_edits, "opacity directives rewritten");
    }

    if opts.destroy {
        for region in regions
            .placement_streams
            .iter()
            .chain(&regions.text_streams)
        {
            match blank_stream(buf, region) {
                Some(zeroed) => {
                    debug!(at = region.data, zeroed, "stream payload blanked");
                    report.streams_blanked += 1;
                }
                None => {
                    warn!(at = region.data, "stream payload did not inflate; left intact");
                    report.streams_skipped += 1;
                }
            }
        }
    }

    if opts.rewrite_timestamp {
        let now = Local::now().format("%Y%m%d%H%M%S").to_string();
        let stamp = now.as_bytes();
        debug_assert_eq!(stamp.len(), TIMESTAMP_WIDTH);
        for at in [regions.creation_stamp, regions.mod_stamp]
            .into_iter()
            .flatten()
        {
            buf[at..at + TIMESTAMP_WIDTH].copy_from_slice(stamp);
            report.timestamps_rewritten += 1;
        }
    }

    report
}

/// Overwrite one stream's compressed payload with ASCII zeros.
///
/// The zlib stream inside the declared span can be shorter than the span
/// (generators pad); inflating tells us where it really ends (`total_in`).
/// Exactly that many bytes are replaced, so the bytes after the zlib
/// trailer — and the declared length — are untouched. Returns the number of
/// bytes zeroed, or `None` when the span is not a decodable zlib stream.
fn blank_stream(buf: &mut [u8], region: &StreamRegion) -> Option<usize> {
    let consumed = {
        let span = &buf[region.data..region.data + region.declared_len];
        let mut decoder = ZlibDecoder::new(span);
        let mut inflated = Vec::new();
        decoder.read_to_end(&mut inflated).ok()?;
        decoder.total_in() as usize
    };
    if consumed == 0 || consumed > region.declared_len {
        return None;
    }
    buf[region.data..region.data + consumed].fill(b'0');
    Some(consumed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::locate::{locate_regions, STREAM_LENGTH_MARKER};
    use flate2::write::ZlibEncoder;
    use flate2::Compression;
    use std::io::Write;

    /// Preamble with `pages` watermark instances backed by real zlib
    /// payloads, then a page object.
    fn synthetic_doc(pages: usize) -> Vec<u8> {
        let mut doc = Vec::new();
        doc.extend_from_slice(b"%PDF-1.5\n");
        doc.extend_from_slice(
            b"1 0 obj<</Producer(MagCloner 9.2)/CreationDate(D:20240301101500+00'00')/ModDate(D:20240301101501+00'00')>>endobj\n",
        );
        for n in 0..pages {
            doc.extend_from_slice(b"<<");
            doc.extend_from_slice(OPACITY_DIRECTIVE);
            doc.extend_from_slice(b">>\n");
            for payload in [format!("1 0 0 1 {} 700 cm", n * 40), format!("(watermark {n}) Tj")] {
                let mut enc = ZlibEncoder::new(Vec::new(), Compression::default());
                enc.write_all(payload.as_bytes()).unwrap();
                let compressed = enc.finish().unwrap();
                doc.extend_from_slice(
                    format!("<</Length {}>>stream\n", compressed.len()).as_bytes(),
                );
                doc.extend_from_slice(&compressed);
                doc.extend_from_slice(b"\nendstream\n");
            }
        }
        doc.extend_from_slice(b"9 0 obj<</Type /Page /MediaBox [0 0 612 792]>>endobj\n");
        doc
    }

    fn count(haystack: &[u8], needle: &[u8]) -> usize {
        haystack
            .windows(needle.len())
            .filter(|w| *w == needle)
            .count()
    }

    #[test]
    fn hide_swaps_every_directive_and_nothing_else() {
        let original = synthetic_doc(3);
        let mut doc = original.clone();
        let regions = locate_regions(&doc, 3);

        let report = neutralize(
            &mut doc,
            &regions,
            NeutralizeOptions {
                hide: true,
                ..Default::default()
            },
        );

        assert_eq!(report.opacity_edits, 3);
        assert_eq!(doc.len(), original.len());
        assert_eq!(count(&doc, OPACITY_DIRECTIVE), 0);
        assert_eq!(count(&doc, OPACITY_HIDDEN), 3);

        // Bit-identical outside the three 20-byte spans.
        let mut edited: Vec<(usize, usize)> = regions
            .opacity
            .iter()
            .map(|&o| (o, o + OPACITY_DIRECTIVE.len()))
            .collect();
        edited.sort_unstable();
        for (i, (a, b)) in original.iter().zip(doc.iter()).enumerate() {
            let inside = edited.iter().any(|&(s, e)| i >= s && i < e);
            if !inside {
                assert_eq!(a, b, "byte {i} changed outside an edit span");
            }
        }
    }

    #[test]
    fn no_options_means_no_edits() {
        let original = synthetic_doc(2);
        let mut doc = original.clone();
        let regions = locate_regions(&doc, 2);
        let report = neutralize(&mut doc, &regions, NeutralizeOptions::default());
        assert_eq!(report, EditReport::default());
        assert_eq!(doc, original);
    }

    #[test]
    fn destroy_blanks_exactly_the_compressed_span() {
        let original = synthetic_doc(2);
        let mut doc = original.clone();
        let regions = locate_regions(&doc, 2);

        let report = neutralize(
            &mut doc,
            &regions,
            NeutralizeOptions {
                destroy: true,
                ..Default::default()
            },
        );

        assert_eq!(report.streams_blanked, 4);
        assert_eq!(report.streams_skipped, 0);
        assert_eq!(doc.len(), original.len());
        assert_eq!(count(&doc, OPACITY_ZEROED), 2);

        for region in regions
            .placement_streams
            .iter()
            .chain(&regions.text_streams)
        {
            let span = &doc[region.data..region.data + region.declared_len];
            assert!(
                span.iter().all(|&b| b == b'0'),
                "payload not fully zeroed at {}",
                region.data
            );
            // The declared length digits ahead of the payload are untouched.
            let header = &doc[region.marker..region.data];
            let orig_header = &original[region.marker..region.data];
            assert_eq!(header, orig_header);
        }
        assert_eq!(
            count(&doc, STREAM_LENGTH_MARKER),
            count(&original, STREAM_LENGTH_MARKER)
        );
    }

    #[test]
    fn destroy_overrides_hide() {
        let mut doc = synthetic_doc(1);
        let regions = locate_regions(&doc, 1);
        neutralize(
            &mut doc,
            &regions,
            NeutralizeOptions {
                hide: true,
                destroy: true,
                ..Default::default()
            },
        );
        assert_eq!(count(&doc, OPACITY_HIDDEN), 0);
        assert_eq!(count(&doc, OPACITY_ZEROED), 1);
    }

    #[test]
    fn undecodable_stream_is_left_intact() {
        let mut doc = Vec::new();
        doc.extend_from_slice(b"<</Length 9>>stream\nnot-zlib!\nendstream\n");
        doc.extend_from_slice(b"/Type /Page /MediaBox");
        let original = doc.clone();
        let regions = locate_regions(&doc, 0);
        assert_eq!(regions.placement_streams.len(), 1);

        let report = neutralize(
            &mut doc,
            &regions,
            NeutralizeOptions {
                destroy: true,
                ..Default::default()
            },
        );
        assert_eq!(report.streams_skipped, 1);
        assert_eq!(doc, original);
    }

    #[test]
    fn timestamp_rewrite_is_fourteen_ascii_digits() {
        let mut doc = synthetic_doc(1);
        let regions = locate_regions(&doc, 1);
        let report = neutralize(
            &mut doc,
            &regions,
            NeutralizeOptions {
                rewrite_timestamp: true,
                ..Default::default()
            },
        );
        assert_eq!(report.timestamps_rewritten, 2);
        for at in [regions.creation_stamp.unwrap(), regions.mod_stamp.unwrap()] {
            let value = &doc[at..at + TIMESTAMP_WIDTH];
            assert_eq!(value.len(), 14);
            assert!(value.iter().all(u8::is_ascii_digit));
            assert_ne!(value, b"20240301101500");
        }
    }

    #[test]
    fn timestamps_untouched_when_disabled() {
        let mut doc = synthetic_doc(1);
        let regions = locate_regions(&doc, 1);
        neutralize(
            &mut doc,
            &regions,
            NeutralizeOptions {
                hide: true,
                ..Default::default()
            },
        );
        let c = regions.creation_stamp.unwrap();
        assert_eq!(&doc[c..c + TIMESTAMP_WIDTH], b"20240301101500");
    }
}
