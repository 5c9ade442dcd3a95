use anyhow::{anyhow, Result};
use colored::*;
use tracing::{error, info, warn};

use crate::BrowserSession;

/// Fixed description sent along with the shared link.
pub const SHARE_TEXT: &str = "Check out this college timetable:";

/// Confirmation shown after the clipboard fallback.
pub const COPIED_MESSAGE: &str = "Link copied to clipboard!";

/// What gets handed to a share target, built fresh per call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShareData {
    pub title: String,
    pub text: String,
    pub url: String,
}

impl ShareData {
    pub fn new(title: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            text: SHARE_TEXT.to_string(),
            url: url.into(),
        }
    }
}

/// A platform mechanism that can present the link to other applications.
pub trait ShareTarget {
    fn share(&self, data: &ShareData) -> Result<()>;
}

/// Write access to the system clipboard.
pub trait ClipboardSink {
    fn set_text(&mut self, text: &str) -> Result<()>;
}

/// A blocking, user-visible confirmation.
pub trait Alert {
    fn show(&self, message: &str);
}

/// Share the link through `target` when one is present, otherwise copy the
/// URL to the clipboard and confirm.
///
/// Share failures are logged and never surfaced to the user; no fallback
/// runs after a failed share. The clipboard fallback confirms optimistically:
/// the dialog appears whether or not the write succeeded, with the failure
/// only visible in the logs.
pub fn share_link(
    data: &ShareData,
    target: Option<&dyn ShareTarget>,
    clipboard: &mut dyn ClipboardSink,
    alert: &dyn Alert,
) {
    match target {
        Some(target) => match target.share(data) {
            Ok(()) => info!("Successful share"),
            Err(e) => error!("Error sharing: {}", e),
        },
        None => {
            if let Err(e) = clipboard.set_text(&data.url) {
                warn!("Clipboard write failed: {}", e);
            }
            alert.show(COPIED_MESSAGE);
        }
    }
}

/// Shares through the operating system's URL handler as a pre-filled email.
pub struct SystemShare;

impl SystemShare {
    /// Returns a target only when the platform can present one.
    ///
    /// On Linux this requires a graphical session; headless machines fall
    /// back to the clipboard path.
    pub fn detect() -> Option<Self> {
        #[cfg(target_os = "linux")]
        {
            let graphical = std::env::var_os("DISPLAY").is_some()
                || std::env::var_os("WAYLAND_DISPLAY").is_some();
            if !graphical {
                return None;
            }
        }
        Some(Self)
    }

    fn mailto_uri(data: &ShareData) -> String {
        format!(
            "mailto:?subject={}&body={}%0A{}",
            urlencoding::encode(&data.title),
            urlencoding::encode(&data.text),
            urlencoding::encode(&data.url),
        )
    }
}

impl ShareTarget for SystemShare {
    fn share(&self, data: &ShareData) -> Result<()> {
        let uri = Self::mailto_uri(data);
        info!("Opening system share handler for \"{}\"", data.url.green());
        open::that_detached(&uri).map_err(|e| anyhow!("Failed to open share handler: {}", e))
    }
}

/// The real system clipboard, via arboard.
pub struct SystemClipboard;

impl ClipboardSink for SystemClipboard {
    fn set_text(&mut self, text: &str) -> Result<()> {
        let mut clipboard =
            arboard::Clipboard::new().map_err(|e| anyhow!("Failed to access clipboard: {}", e))?;
        clipboard
            .set_text(text)
            .map_err(|e| anyhow!("Failed to write clipboard: {}", e))?;
        Ok(())
    }
}

/// Blocking modal dialog shown to the user.
pub struct ModalAlert;

impl Alert for ModalAlert {
    fn show(&self, message: &str) {
        let _ = rfd::MessageDialog::new()
            .set_level(rfd::MessageLevel::Info)
            .set_title("timetable2pdf")
            .set_description(message)
            .set_buttons(rfd::MessageButtons::Ok)
            .show();
    }
}

/// Document title of the live page, for the share payload.
///
/// Falls back to the URL itself when the page carries no title.
pub async fn fetch_page_title(url: &str) -> Result<String> {
    let session = BrowserSession::launch().await?;
    let result = async {
        let page = session.open(url).await?;
        page.get_title()
            .await
            .map_err(|e| anyhow!("Failed to read page title: {}", e))
    }
    .await;
    session.close().await;

    let title = result?.filter(|t| !t.is_empty()).unwrap_or_else(|| url.to_string());
    Ok(title)
}
