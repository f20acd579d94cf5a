//! Image compositing: fetch per-page JPEGs and build a fresh PDF around them.
//!
//! The raster tiers serve each page as a plain JPEG. Rather than transcode,
//! each file is embedded verbatim as a `DCTDecode` image XObject and drawn
//! full-bleed on its own page; the page's physical size comes from the pixel
//! dimensions at the configured DPI, exactly how the original reader lays
//! pages out. Fetches are strictly sequential — the store is a shared host
//! and discovery has already told us every page in the range exists.

use crate::config::DownloadConfig;
use crate::error::MagdownError;
use crate::url::PageUrl;
use lopdf::content::{Content, Operation};
use lopdf::{dictionary, Document, Object, Stream};
use tracing::{debug, info};

/// One downloaded page, still in its wire encoding.
pub struct ComposedPage {
    /// Zero-based page index in the magazine.
    pub index: u32,
    /// Raw JPEG bytes as served.
    pub jpeg: Vec<u8>,
    /// Pixel dimensions decoded from the JPEG header.
    pub width: u32,
    pub height: u32,
    /// Single-channel scan; selects DeviceGray over DeviceRGB.
    pub grayscale: bool,
}

/// Fetch every page in `from..=to` (zero-based) at the configured tier.
///
/// Reports progress through `config.progress` after each page. Any non-200
/// status is fatal: discovery already capped the range to existing pages,
/// so a miss here means the store contradicted itself.
pub async fn fetch_pages(
    client: &reqwest::Client,
    template: &PageUrl,
    config: &DownloadConfig,
    from: u32,
    to: u32,
) -> Result<Vec<ComposedPage>, MagdownError> {
    let total = to - from + 1;
    let mut pages = Vec::with_capacity(total as usize);

    for index in from..=to {
        let url = template.page_url(config.quality, index);
        debug!(%url, "fetching page image");
        let response = client
            .get(&url)
            .send()
            .await
            .map_err(|e| MagdownError::Transport {
                url: url.clone(),
                reason: e.to_string(),
            })?;

        let status = response.status().as_u16();
        if status != 200 {
            return Err(MagdownError::PageFetchFailed {
                page: index,
                status,
            });
        }

        let jpeg = response
            .bytes()
            .await
            .map_err(|e| MagdownError::Transport {
                url: url.clone(),
                reason: e.to_string(),
            })?
            .to_vec();

        let decoded =
            image::load_from_memory(&jpeg).map_err(|e| MagdownError::ImageDecode {
                page: index,
                detail: e.to_string(),
            })?;
        let grayscale = matches!(
            decoded.color(),
            image::ColorType::L8 | image::ColorType::L16
        );

        info!(
            page = index,
            width = decoded.width(),
            height = decoded.height(),
            bytes = jpeg.len(),
            "page downloaded"
        );
        pages.push(ComposedPage {
            index,
            width: decoded.width(),
            height: decoded.height(),
            grayscale,
            jpeg,
        });

        if let Some(ref progress) = config.progress {
            progress(pages.len() as u32, total);
        }
    }

    Ok(pages)
}

/// Assemble downloaded pages into a single PDF, one page per image.
///
/// Pure function of its inputs so tests can drive it with synthetic JPEGs.
pub fn assemble_pdf(pages: &[ComposedPage], dpi: u32) -> Result<Vec<u8>, MagdownError> {
    let mut doc = Document::with_version("1.5");
    let pages_id = doc.new_object_id();
    let mut kids: Vec<Object> = Vec::with_capacity(pages.len());

    for page in pages {
        // Physical size: pixels at `dpi` dots per inch, in 72-pt units.
        let width_pt = page.width as f64 / dpi as f64 * 72.0;
        let height_pt = page.height as f64 / dpi as f64 * 72.0;

        let image_id = doc.add_object(Stream::new(
            dictionary! {
                "Type" => "XObject",
                "Subtype" => "Image",
                "Width" => page.width as i64,
                "Height" => page.height as i64,
                "ColorSpace" => if page.grayscale { "DeviceGray" } else { "DeviceRGB" },
                "BitsPerComponent" => 8,
                "Filter" => "DCTDecode",
            },
            page.jpeg.clone(),
        ));

        let content = Content {
            operations: vec![
                Operation::new("q", vec![]),
                Operation::new(
                    "cm",
                    vec![
                        Object::Real(width_pt as f32),
                        Object::Real(0.0),
                        Object::Real(0.0),
                        Object::Real(height_pt as f32),
                        Object::Real(0.0),
                        Object::Real(0.0),
                    ],
                ),
                Operation::new("Do", vec![Object::Name(b"Im0".to_vec())]),
                Operation::new("Q", vec![]),
            ],
        };
        let content_id = doc.add_object(Stream::new(
            lopdf::Dictionary::new(),
            content.encode().map_err(|e| MagdownError::PdfAssembly {
                detail: e.to_string(),
            })?,
        ));

        let page_id = doc.add_object(dictionary! {
            "Type" => "Page",
            "Parent" => Object::Reference(pages_id),
            "MediaBox" => vec![
                0.into(),
                0.into(),
                Object::Real(width_pt as f32),
                Object::Real(height_pt as f32),
            ],
            "Contents" => Object::Reference(content_id),
            "Resources" => dictionary! {
                "XObject" => dictionary! { "Im0" => Object::Reference(image_id) },
            },
        });
        kids.push(Object::Reference(page_id));
        debug!(page = page.index, width_pt, height_pt, "page composed");
    }

    let count = kids.len() as i64;
    doc.objects.insert(
        pages_id,
        Object::Dictionary(dictionary! {
            "Type" => "Pages",
            "Kids" => kids,
            "Count" => count,
        }),
    );

    let catalog_id = doc.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => Object::Reference(pages_id),
    });
    doc.trailer.set("Root", catalog_id);

    let mut out = Vec::new();
    doc.save_to(&mut out)
        .map_err(|e| MagdownError::PdfAssembly {
            detail: e.to_string(),
        })?;
    info!(pages = pages.len(), bytes = out.len(), "document assembled");
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::codecs::jpeg::JpegEncoder;
    use image::RgbImage;

    fn synthetic_jpeg(width: u32, height: u32) -> Vec<u8> {
        let img = RgbImage::from_pixel(width, height, image::Rgb([200, 30, 30]));
        let mut out = Vec::new();
        JpegEncoder::new(&mut out).encode_image(&img).unwrap();
        out
    }

    fn page(index: u32, width: u32, height: u32) -> ComposedPage {
        ComposedPage {
            index,
            jpeg: synthetic_jpeg(width, height),
            width,
            height,
            grayscale: false,
        }
    }

    #[test]
    fn assembles_a_loadable_two_page_document() {
        let pages = vec![page(0, 30, 40), page(1, 30, 40)];
        let pdf = assemble_pdf(&pages, 150).unwrap();

        assert_eq!(&pdf[..4], b"%PDF");
        let doc = Document::load_mem(&pdf).unwrap();
        assert_eq!(doc.get_pages().len(), 2);
    }

    #[test]
    fn embeds_jpeg_verbatim_as_dctdecode() {
        let pages = vec![page(0, 16, 16)];
        let jpeg = pages[0].jpeg.clone();
        let pdf = assemble_pdf(&pages, 150).unwrap();

        assert!(pdf
            .windows(b"DCTDecode".len())
            .any(|w| w == b"DCTDecode"));
        // The wire bytes appear unmodified inside the document.
        assert!(pdf.windows(jpeg.len()).any(|w| w == jpeg.as_slice()));
    }

    #[test]
    fn page_size_scales_with_dpi() {
        let pdf_150 = assemble_pdf(&[page(0, 300, 300)], 150).unwrap();
        let doc = Document::load_mem(&pdf_150).unwrap();
        let page_id = *doc.get_pages().get(&1).unwrap();
        let media_box = doc
            .get_object(page_id)
            .and_then(Object::as_dict)
            .and_then(|d| d.get(b"MediaBox"))
            .and_then(Object::as_array)
            .unwrap()
            .clone();
        // 300 px at 150 DPI = 2 in = 144 pt.
        match media_box[2] {
            Object::Real(w) => assert!((w - 144.0).abs() < 0.01),
            ref other => panic!("expected Real width, got {other:?}"),
        }
    }
}
