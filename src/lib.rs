//! # timetable2pdf
//!
//! A CLI utility for rendered college timetable pages: export the timetable
//! region into a single-page PDF, or share the page link.
//!
//! ## Current Features
//!
//! - Timetable region capture through headless Chrome
//! - Letter/landscape PDF composition with the capture embedded
//! - Link sharing through the platform handler, with clipboard fallback
//!
//! ## Usage
//!
//! ```bash
//! timetable2pdf export http://localhost:8000/timetable/3/
//! timetable2pdf share http://localhost:8000/timetable/3/
//! ```

mod browser;
mod exporter;
mod pdf_page;
mod share;

pub use browser::BrowserSession;
pub use exporter::{
    ExportOptions, Exporter, ImageFormat, ImageOptions, PageOrientation, PageSetup, PageUnit,
    PaperFormat, TIMETABLE_ELEMENT_ID,
};
pub use pdf_page::PageBuilder;
pub use share::{
    fetch_page_title, share_link, Alert, ClipboardSink, ModalAlert, ShareData, ShareTarget,
    SystemClipboard, SystemShare, COPIED_MESSAGE, SHARE_TEXT,
};
