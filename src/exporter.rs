use anyhow::{anyhow, Result};
use chromiumoxide::cdp::browser_protocol::page::{CaptureScreenshotFormat, Viewport};
use chromiumoxide::page::ScreenshotParams;
use colored::*;
use scraper::{Html, Selector};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;
use tokio::fs;
use tracing::{debug, info, warn};

use crate::pdf_page::PageBuilder;
use crate::BrowserSession;

/// Default id of the page region holding the rendered timetable.
pub const TIMETABLE_ELEMENT_ID: &str = "timetable-card";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ImageFormat {
    Jpeg,
}

impl ImageFormat {
    pub fn as_str(&self) -> &'static str {
        match self {
            ImageFormat::Jpeg => "jpeg",
        }
    }

    fn cdp(&self) -> CaptureScreenshotFormat {
        match self {
            ImageFormat::Jpeg => CaptureScreenshotFormat::Jpeg,
        }
    }
}

/// Encoding used when rasterizing the page region.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImageOptions {
    pub format: ImageFormat,
    /// Quality as a 0.0..=1.0 fraction.
    pub quality: f64,
}

impl ImageOptions {
    /// Quality on the 0..=100 scale the Chrome DevTools protocol expects.
    pub fn cdp_quality(&self) -> i64 {
        (self.quality * 100.0).round() as i64
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PageUnit {
    In,
}

impl PageUnit {
    pub fn as_str(&self) -> &'static str {
        match self {
            PageUnit::In => "in",
        }
    }

    pub fn points_per_unit(&self) -> f64 {
        match self {
            PageUnit::In => 72.0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PaperFormat {
    Letter,
}

impl PaperFormat {
    pub fn as_str(&self) -> &'static str {
        match self {
            PaperFormat::Letter => "letter",
        }
    }

    /// Portrait size in inches.
    pub fn size_in(&self) -> (f64, f64) {
        match self {
            PaperFormat::Letter => (8.5, 11.0),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PageOrientation {
    Portrait,
    Landscape,
}

impl PageOrientation {
    pub fn as_str(&self) -> &'static str {
        match self {
            PageOrientation::Portrait => "portrait",
            PageOrientation::Landscape => "landscape",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PageSetup {
    pub unit: PageUnit,
    pub format: PaperFormat,
    pub orientation: PageOrientation,
}

impl PageSetup {
    /// Page size in points, orientation applied.
    pub fn size_pt(&self) -> (f64, f64) {
        let (w_in, h_in) = self.format.size_in();
        let (w, h) = match self.orientation {
            PageOrientation::Portrait => (w_in, h_in),
            PageOrientation::Landscape => (h_in, w_in),
        };
        (w * 72.0, h * 72.0)
    }
}

/// One export's worth of configuration, built fresh per call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExportOptions {
    /// Margin on every side, in page units.
    pub margin: f64,
    pub filename: String,
    pub image: ImageOptions,
    /// Device scale factor applied when rasterizing the region.
    pub scale: f64,
    pub page: PageSetup,
}

impl Default for ExportOptions {
    fn default() -> Self {
        Self {
            margin: 0.5,
            filename: "timetable.pdf".to_string(),
            image: ImageOptions {
                format: ImageFormat::Jpeg,
                quality: 0.98,
            },
            scale: 2.0,
            page: PageSetup {
                unit: PageUnit::In,
                format: PaperFormat::Letter,
                orientation: PageOrientation::Landscape,
            },
        }
    }
}

impl ExportOptions {
    pub fn margin_pt(&self) -> f64 {
        self.margin * self.page.unit.points_per_unit()
    }
}

/// Bounding rect of the target element, in CSS pixels of the document.
#[derive(Debug, Clone, Copy, Deserialize)]
struct ElementRect {
    x: f64,
    y: f64,
    width: f64,
    height: f64,
}

pub struct Exporter {
    out_dir: String,
    element_id: String,
    timeout: Duration,
    options: ExportOptions,
}

impl Exporter {
    pub fn new(out_dir: String, element_id: String, timeout_seconds: f64) -> Self {
        Self {
            out_dir,
            element_id,
            timeout: Duration::from_secs_f64(timeout_seconds),
            options: ExportOptions::default(),
        }
    }

    pub async fn run(&self, target_url: &str) -> Result<()> {
        info!("Visiting \"{}\"", target_url.green());

        let session = BrowserSession::launch().await?;
        let result = self.run_internal(&session, target_url).await;
        session.close().await;

        result
    }

    async fn run_internal(&self, session: &BrowserSession, target_url: &str) -> Result<()> {
        let page = tokio::time::timeout(self.timeout, session.open(target_url))
            .await
            .map_err(|_| anyhow!("Timed out loading {}", target_url))??;

        let content = page
            .content()
            .await
            .map_err(|e| anyhow!("Failed to get page content: {}", e))?;

        if !self.page_has_element(&content) {
            warn!(
                "No element with id \"{}\" found on the page, export will likely fail",
                self.element_id
            );
        }

        let rect = self.measure_element(&page).await?;
        debug!("Element rect: {:?}", rect);

        let jpeg = self.capture_region(&page, &rect).await?;
        info!("Captured {} bytes of {} data", jpeg.len(), self.options.image.format.as_str());

        let width_px = (rect.width * self.options.scale).round() as u32;
        let height_px = (rect.height * self.options.scale).round() as u32;

        let pdf_data = PageBuilder::new(&self.options).compose(&jpeg, width_px, height_px)?;

        let out_path = PathBuf::from(&self.out_dir).join(&self.options.filename);
        if let Some(parent) = out_path.parent() {
            fs::create_dir_all(parent)
                .await
                .map_err(|e| anyhow!("Failed to create directory: {}", e))?;
        }

        fs::write(&out_path, pdf_data)
            .await
            .map_err(|e| anyhow!("Failed to write PDF to {}: {}", out_path.display(), e))?;

        info!("Timetable exported to: {}", out_path.display().to_string().blue());

        Ok(())
    }

    fn page_has_element(&self, content: &str) -> bool {
        let document = Html::parse_document(content);
        match Selector::parse(&format!("#{}", self.element_id)) {
            Ok(selector) => document.select(&selector).next().is_some(),
            Err(_) => false,
        }
    }

    async fn measure_element(&self, page: &chromiumoxide::Page) -> Result<ElementRect> {
        let js_code = format!(
            r#"
            (() => {{
                const el = document.getElementById('{}');
                if (!el) return null;
                el.scrollIntoView({{ block: 'start' }});
                const r = el.getBoundingClientRect();
                return {{
                    x: r.x + window.scrollX,
                    y: r.y + window.scrollY,
                    width: r.width,
                    height: r.height
                }};
            }})()
            "#,
            self.element_id
        );

        let result = page
            .evaluate(js_code)
            .await
            .map_err(|e| anyhow!("Failed to measure element: {}", e))?;

        let value: serde_json::Value = result
            .into_value()
            .map_err(|e| anyhow!("Failed to parse element rect: {}", e))?;

        if value.is_null() {
            return Err(anyhow!(
                "Element with id \"{}\" not found on the page",
                self.element_id
            ));
        }

        let rect: ElementRect = serde_json::from_value(value)
            .map_err(|e| anyhow!("Unexpected element rect shape: {}", e))?;

        if rect.width <= 0.0 || rect.height <= 0.0 {
            return Err(anyhow!(
                "Element with id \"{}\" has no visible area",
                self.element_id
            ));
        }

        Ok(rect)
    }

    async fn capture_region(
        &self,
        page: &chromiumoxide::Page,
        rect: &ElementRect,
    ) -> Result<Vec<u8>> {
        let clip = Viewport {
            x: rect.x,
            y: rect.y,
            width: rect.width,
            height: rect.height,
            scale: self.options.scale,
        };

        let params = ScreenshotParams::builder()
            .format(self.options.image.format.cdp())
            .quality(self.options.image.cdp_quality())
            .clip(clip)
            .build();

        page.screenshot(params)
            .await
            .map_err(|e| anyhow!("Failed to capture timetable region: {}", e))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_options_match_export_configuration() {
        let opts = ExportOptions::default();
        assert_eq!(opts.margin, 0.5);
        assert_eq!(opts.filename, "timetable.pdf");
        assert_eq!(opts.image.format.as_str(), "jpeg");
        assert_eq!(opts.image.quality, 0.98);
        assert_eq!(opts.scale, 2.0);
        assert_eq!(opts.page.unit.as_str(), "in");
        assert_eq!(opts.page.format.as_str(), "letter");
        assert_eq!(opts.page.orientation.as_str(), "landscape");
    }

    #[test]
    fn quality_maps_to_cdp_scale() {
        let opts = ExportOptions::default();
        assert_eq!(opts.image.cdp_quality(), 98);
    }

    #[test]
    fn letter_landscape_size_in_points() {
        let opts = ExportOptions::default();
        assert_eq!(opts.page.size_pt(), (792.0, 612.0));
        assert_eq!(opts.margin_pt(), 36.0);
    }

    #[test]
    fn options_are_built_fresh_per_call() {
        // Two exporters never share configuration state.
        let a = Exporter::new("out".into(), TIMETABLE_ELEMENT_ID.into(), 30.0);
        let b = Exporter::new("out".into(), TIMETABLE_ELEMENT_ID.into(), 30.0);
        assert_eq!(a.options, b.options);
        assert_eq!(a.options, ExportOptions::default());
        assert_eq!(b.options, ExportOptions::default());
    }

    #[test]
    fn detects_element_presence_in_markup() {
        let exporter = Exporter::new("out".into(), TIMETABLE_ELEMENT_ID.into(), 30.0);
        let with = r#"<html><body><div id="timetable-card"></div></body></html>"#;
        let without = r#"<html><body><div id="something-else"></div></body></html>"#;
        assert!(exporter.page_has_element(with));
        assert!(!exporter.page_has_element(without));
    }
}
