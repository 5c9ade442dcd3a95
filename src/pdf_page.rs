use anyhow::{anyhow, Result};
use lopdf::content::{Content, Operation};
use lopdf::{dictionary, Document, Object, Stream};
use tracing::debug;

use crate::exporter::ExportOptions;

/// Composes a one-page PDF that embeds a JPEG capture of the timetable.
///
/// The capture is placed inside the page's content box (page size minus
/// margins) scaled to fit while preserving its aspect ratio.
pub struct PageBuilder<'a> {
    options: &'a ExportOptions,
}

impl<'a> PageBuilder<'a> {
    pub fn new(options: &'a ExportOptions) -> Self {
        Self { options }
    }

    /// Build the document and serialize it to bytes.
    pub fn compose(&self, jpeg: &[u8], width_px: u32, height_px: u32) -> Result<Vec<u8>> {
        let mut doc = self.build(jpeg, width_px, height_px)?;

        let mut data = Vec::new();
        doc.save_to(&mut data)
            .map_err(|e| anyhow!("Failed to serialize PDF: {}", e))?;

        Ok(data)
    }

    pub fn build(&self, jpeg: &[u8], width_px: u32, height_px: u32) -> Result<Document> {
        if jpeg.is_empty() {
            return Err(anyhow!("No image data to embed"));
        }
        if width_px == 0 || height_px == 0 {
            return Err(anyhow!("Image has no visible area"));
        }

        let (page_w, page_h) = self.options.page.size_pt();
        let margin = self.options.margin_pt();

        let box_w = page_w - 2.0 * margin;
        let box_h = page_h - 2.0 * margin;
        if box_w <= 0.0 || box_h <= 0.0 {
            return Err(anyhow!("Margins leave no room on the page"));
        }

        let (draw_w, draw_h) = fit_rect(width_px as f64, height_px as f64, box_w, box_h);
        // Center the image inside the content box.
        let x = margin + (box_w - draw_w) / 2.0;
        let y = page_h - margin - draw_h - (box_h - draw_h) / 2.0;

        debug!(
            "Placing {}x{}px capture at ({:.1}, {:.1}) scaled to {:.1}x{:.1}pt",
            width_px, height_px, x, y, draw_w, draw_h
        );

        let mut doc = Document::with_version("1.5");
        let pages_id = doc.new_object_id();

        // JPEG data goes in as-is, the DCTDecode filter handles decoding
        let image_stream = Stream::new(
            dictionary! {
                "Type" => "XObject",
                "Subtype" => "Image",
                "Width" => width_px as i64,
                "Height" => height_px as i64,
                "ColorSpace" => "DeviceRGB",
                "BitsPerComponent" => 8,
                "Filter" => "DCTDecode",
            },
            jpeg.to_vec(),
        )
        .with_compression(false);
        let image_id = doc.add_object(image_stream);

        let content = Content {
            operations: vec![
                Operation::new("q", vec![]),
                Operation::new(
                    "cm",
                    vec![
                        (draw_w as f32).into(),
                        0.into(),
                        0.into(),
                        (draw_h as f32).into(),
                        (x as f32).into(),
                        (y as f32).into(),
                    ],
                ),
                Operation::new("Do", vec!["Im0".into()]),
                Operation::new("Q", vec![]),
            ],
        };
        let content_id = doc.add_object(Stream::new(
            dictionary! {},
            content
                .encode()
                .map_err(|e| anyhow!("Failed to encode page content: {}", e))?,
        ));

        let page_id = doc.add_object(dictionary! {
            "Type" => "Page",
            "Parent" => pages_id,
            "Contents" => content_id,
            "Resources" => dictionary! {
                "XObject" => dictionary! { "Im0" => image_id },
            },
        });

        doc.objects.insert(
            pages_id,
            Object::Dictionary(dictionary! {
                "Type" => "Pages",
                "Kids" => vec![page_id.into()],
                "Count" => 1,
                "MediaBox" => vec![
                    0.into(),
                    0.into(),
                    (page_w as f32).into(),
                    (page_h as f32).into(),
                ],
            }),
        );

        let catalog_id = doc.add_object(dictionary! {
            "Type" => "Catalog",
            "Pages" => pages_id,
        });
        doc.trailer.set("Root", catalog_id);

        Ok(doc)
    }
}

/// Scale `(img_w, img_h)` to fit inside `(box_w, box_h)` preserving aspect.
fn fit_rect(img_w: f64, img_h: f64, box_w: f64, box_h: f64) -> (f64, f64) {
    let scale = (box_w / img_w).min(box_h / img_h);
    (img_w * scale, img_h * scale)
}

#[cfg(test)]
mod tests {
    use super::*;
    use lopdf::Object;

    // Not a decodable JPEG, but composition never looks inside the data.
    fn fake_jpeg() -> Vec<u8> {
        let mut data = vec![0xFF, 0xD8, 0xFF, 0xE0];
        data.extend(std::iter::repeat(0xAB).take(64));
        data.extend([0xFF, 0xD9]);
        data
    }

    #[test]
    fn fit_rect_preserves_aspect_ratio() {
        // Wide image limited by width
        let (w, h) = fit_rect(2000.0, 1000.0, 720.0, 540.0);
        assert_eq!(w, 720.0);
        assert_eq!(h, 360.0);

        // Tall image limited by height
        let (w, h) = fit_rect(500.0, 2000.0, 720.0, 540.0);
        assert_eq!(h, 540.0);
        assert_eq!(w, 135.0);
    }

    #[test]
    fn composed_document_has_one_letter_landscape_page() {
        let options = ExportOptions::default();
        let data = PageBuilder::new(&options)
            .compose(&fake_jpeg(), 1600, 800)
            .unwrap();

        let doc = Document::load_mem(&data).unwrap();
        assert_eq!(doc.get_pages().len(), 1);

        let catalog = doc.catalog().unwrap();
        let pages_id = match catalog.get(b"Pages").unwrap() {
            Object::Reference(id) => *id,
            other => panic!("Pages is not a reference: {:?}", other),
        };
        let pages = doc
            .get_object(pages_id)
            .unwrap()
            .as_dict()
            .expect("Pages dictionary");
        let media_box = pages.get(b"MediaBox").unwrap().as_array().unwrap();
        let dims: Vec<f32> = media_box
            .iter()
            .map(|o| match o {
                Object::Integer(i) => *i as f32,
                Object::Real(r) => *r,
                other => panic!("Unexpected MediaBox entry: {:?}", other),
            })
            .collect();
        assert_eq!(dims, vec![0.0, 0.0, 792.0, 612.0]);
    }

    #[test]
    fn embedded_image_keeps_jpeg_bytes() {
        let options = ExportOptions::default();
        let jpeg = fake_jpeg();
        let doc = PageBuilder::new(&options).build(&jpeg, 1600, 800).unwrap();

        let stream = doc
            .objects
            .values()
            .find_map(|obj| match obj {
                Object::Stream(s)
                    if s.dict.get(b"Subtype").and_then(|o| o.as_name()).ok()
                        == Some(b"Image".as_slice()) =>
                {
                    Some(s)
                }
                _ => None,
            })
            .expect("image XObject present");

        assert_eq!(stream.content, jpeg);
        assert_eq!(
            stream.dict.get(b"Filter").unwrap().as_name().unwrap(),
            b"DCTDecode".as_slice()
        );
    }

    #[test]
    fn consecutive_compositions_are_independent() {
        let options = ExportOptions::default();
        let builder = PageBuilder::new(&options);
        let first = builder.compose(&fake_jpeg(), 1200, 600).unwrap();
        let second = builder.compose(&fake_jpeg(), 1200, 600).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn rejects_empty_captures() {
        let options = ExportOptions::default();
        let builder = PageBuilder::new(&options);
        assert!(builder.compose(&[], 100, 100).is_err());
        assert!(builder.compose(&fake_jpeg(), 0, 100).is_err());
    }
}
