pub mod chrome;
pub mod scripts;
#[cfg(test)]
pub(crate) mod fake;

use crate::{PilotError, Result};
use std::path::{Path, PathBuf};
use std::time::Duration;

pub use chrome::{ChromeDriver, ChromeElement, ChromeLauncher};

/// What a readiness wait requires of the matches for a selector.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Readiness {
    /// At least one match is attached to the document.
    #[default]
    Present,
    /// The first match is visible and enabled.
    Interactable,
    /// At least one match; every match is returned.
    All,
}

/// Black-box browser automation capability consumed by the proxy.
///
/// Every fault must be a [`PilotError`]; implementations map timing and
/// readiness problems onto the transient variants so the retry layer can
/// recover from them.
#[async_trait::async_trait]
pub trait RemoteDriver: Send + Sync {
    type Element: Send + Sync;

    async fn navigate(&self, url: &str) -> Result<()>;

    /// Immediate lookup in the current frame. No waiting.
    async fn query_all(&self, selector: &str) -> Result<Vec<Self::Element>>;

    async fn is_interactable(&self, element: &Self::Element) -> Result<bool>;

    async fn execute_script(
        &self,
        script: &str,
        element: Option<&Self::Element>,
    ) -> Result<serde_json::Value>;

    /// `None` returns to the top-level document.
    async fn switch_frame(&self, frame: Option<&Self::Element>) -> Result<()>;

    async fn inner_text(&self, element: &Self::Element) -> Result<String>;

    async fn attribute(&self, element: &Self::Element, name: &str) -> Result<Option<String>>;

    async fn scroll_into_view(&self, element: &Self::Element) -> Result<()>;

    async fn click(&self, element: &Self::Element) -> Result<()>;

    async fn clear(&self, element: &Self::Element) -> Result<()>;

    async fn send_keys(&self, element: &Self::Element, text: &str) -> Result<()>;

    async fn press_enter(&self, element: &Self::Element) -> Result<()>;

    async fn set_file_input(&self, element: &Self::Element, path: &Path) -> Result<()>;

    async fn quit(&self) -> Result<()>;

    /// Waits until `selector` satisfies `readiness`, polling every `poll`.
    async fn wait_for(
        &self,
        selector: &str,
        readiness: Readiness,
        timeout: Duration,
        poll: Duration,
    ) -> Result<Vec<Self::Element>> {
        let deadline = tokio::time::Instant::now() + timeout;

        loop {
            let mut matches = self.query_all(selector).await.unwrap_or_default();

            let ready = match readiness {
                Readiness::Present | Readiness::All => !matches.is_empty(),
                Readiness::Interactable => match matches.first() {
                    Some(first) => self.is_interactable(first).await.unwrap_or(false),
                    None => false,
                },
            };

            if ready {
                if readiness != Readiness::All {
                    matches.truncate(1);
                }
                return Ok(matches);
            }

            if tokio::time::Instant::now() >= deadline {
                return Err(PilotError::ElementNotFound {
                    selector: selector.to_string(),
                });
            }

            tokio::time::sleep(poll).await;
        }
    }
}

#[derive(Debug, Clone)]
pub struct LaunchOptions {
    pub headless: bool,
    pub user_data_dir: PathBuf,
    pub chrome_path: Option<PathBuf>,
    pub window_size: (u32, u32),
    pub page_load_timeout: Duration,
}

/// Starts a driver bound to one profile directory.
#[async_trait::async_trait]
pub trait DriverLauncher: Send + Sync {
    type Driver: RemoteDriver;

    async fn launch(&self, options: &LaunchOptions) -> Result<Self::Driver>;
}
