//! Retry-wrapped element primitives over a [`RemoteDriver`].

use crate::config::TimingConfig;
use crate::driver::{Readiness, RemoteDriver};
use crate::retry::{RetrySpec, retrying};
use crate::{PilotError, Result};
use serde_json::Value;
use std::path::Path;
use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WriteOptions {
    pub press_enter: bool,
    pub require_interactable: bool,
    pub clear_first: bool,
}

impl Default for WriteOptions {
    fn default() -> Self {
        Self {
            press_enter: false,
            require_interactable: true,
            clear_first: true,
        }
    }
}

impl WriteOptions {
    pub fn submit(mut self) -> Self {
        self.press_enter = true;
        self
    }

    pub fn keep_existing(mut self) -> Self {
        self.clear_first = false;
        self
    }
}

pub struct ElementProxy<D: RemoteDriver> {
    driver: D,
    retry: RetrySpec,
    element_timeout: Duration,
    readiness_poll: Duration,
    click_settle: Duration,
}

impl<D: RemoteDriver> ElementProxy<D> {
    pub fn new(driver: D, timing: &TimingConfig) -> Self {
        Self {
            driver,
            retry: RetrySpec::from_timing(timing),
            element_timeout: timing.element_timeout(),
            readiness_poll: timing.readiness_poll(),
            click_settle: timing.click_settle(),
        }
    }

    pub fn with_retry(mut self, retry: RetrySpec) -> Self {
        self.retry = retry;
        self
    }

    pub fn with_element_timeout(mut self, timeout: Duration) -> Self {
        self.element_timeout = timeout;
        self
    }

    pub fn driver(&self) -> &D {
        &self.driver
    }

    pub fn retry_spec(&self) -> &RetrySpec {
        &self.retry
    }

    /// Waits for `selector` to satisfy `readiness`. With [`Readiness::All`]
    /// every match is returned, otherwise only the first.
    pub async fn locate(&self, selector: &str, readiness: Readiness) -> Result<Vec<D::Element>> {
        self.driver
            .wait_for(selector, readiness, self.element_timeout, self.readiness_poll)
            .await
    }

    pub async fn locate_one(&self, selector: &str, readiness: Readiness) -> Result<D::Element> {
        self.locate(selector, readiness)
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| PilotError::ElementNotFound {
                selector: selector.to_string(),
            })
    }

    pub async fn query(&self, selector: &str) -> Result<Vec<D::Element>> {
        self.driver.query_all(selector).await
    }

    pub async fn count(&self, selector: &str) -> Result<usize> {
        Ok(self.driver.query_all(selector).await?.len())
    }

    /// Immediate presence check; a failed lookup reads as absent.
    pub async fn exists(&self, selector: &str) -> bool {
        self.count(selector).await.map(|n| n > 0).unwrap_or(false)
    }

    /// Immediate absence check; a failed lookup reads as still present.
    pub async fn absent(&self, selector: &str) -> bool {
        self.count(selector).await.map(|n| n == 0).unwrap_or(false)
    }

    pub async fn navigate(&self, url: &str) -> Result<()> {
        retrying(&self.retry, "navigate", || self.driver.navigate(url)).await
    }

    pub async fn write(&self, selector: &str, text: &str, options: WriteOptions) -> Result<()> {
        retrying(&self.retry, "write", || self.write_once(selector, text, options)).await
    }

    async fn write_once(&self, selector: &str, text: &str, options: WriteOptions) -> Result<()> {
        let readiness = if options.require_interactable {
            Readiness::Interactable
        } else {
            Readiness::Present
        };
        let input = self.locate_one(selector, readiness).await?;

        if options.clear_first {
            self.driver.clear(&input).await?;
        }
        self.driver.send_keys(&input, text).await?;
        if options.press_enter {
            self.driver.press_enter(&input).await?;
        }

        tracing::debug!(selector, chars = text.chars().count(), "Wrote text");
        Ok(())
    }

    /// Hands a local file to a native file input.
    pub async fn attach_file(&self, selector: &str, path: &Path) -> Result<()> {
        retrying(&self.retry, "attach_file", || async {
            let input = self.locate_one(selector, Readiness::Present).await?;
            self.driver.set_file_input(&input, path).await
        })
        .await?;

        tracing::debug!(selector, path = %path.display(), "Attached file");
        Ok(())
    }

    pub async fn click(&self, selector: &str) -> Result<()> {
        retrying(&self.retry, "click", || async {
            let element = self.locate_one(selector, Readiness::Interactable).await?;
            self.click_target(&element).await
        })
        .await?;

        tracing::debug!(selector, "Clicked");
        Ok(())
    }

    pub async fn click_element(&self, element: &D::Element) -> Result<()> {
        retrying(&self.retry, "click", || self.click_target(element)).await
    }

    async fn click_target(&self, element: &D::Element) -> Result<()> {
        self.driver.scroll_into_view(element).await?;
        // let entrance animations and layout shifts finish before hit-testing
        tokio::time::sleep(self.click_settle).await;
        self.driver.click(element).await
    }

    pub async fn read_text(&self, selector: &str) -> Result<String> {
        retrying(&self.retry, "read_text", || async {
            let element = self.locate_one(selector, Readiness::Present).await?;
            self.driver.inner_text(&element).await
        })
        .await
    }

    pub async fn read_texts(&self, selector: &str) -> Result<Vec<String>> {
        retrying(&self.retry, "read_text", || async {
            let elements = self.locate(selector, Readiness::All).await?;
            let mut texts = Vec::with_capacity(elements.len());
            for element in &elements {
                texts.push(self.driver.inner_text(element).await?);
            }
            Ok(texts)
        })
        .await
    }

    pub async fn text_of(&self, element: &D::Element) -> Result<String> {
        retrying(&self.retry, "read_text", || self.driver.inner_text(element)).await
    }

    pub async fn read_attribute(&self, selector: &str, name: &str) -> Result<Option<String>> {
        retrying(&self.retry, "read_attribute", || async {
            let element = self.locate_one(selector, Readiness::Present).await?;
            self.driver.attribute(&element, name).await
        })
        .await
    }

    pub async fn read_attributes(&self, selector: &str, name: &str) -> Result<Vec<Option<String>>> {
        retrying(&self.retry, "read_attribute", || async {
            let elements = self.locate(selector, Readiness::All).await?;
            let mut values = Vec::with_capacity(elements.len());
            for element in &elements {
                values.push(self.driver.attribute(element, name).await?);
            }
            Ok(values)
        })
        .await
    }

    pub async fn attribute_of(&self, element: &D::Element, name: &str) -> Result<Option<String>> {
        retrying(&self.retry, "read_attribute", || {
            self.driver.attribute(element, name)
        })
        .await
    }

    /// Clicks the first element under `candidates` whose visible text is
    /// exactly `label`. Returns `false` when no candidate carries the label.
    ///
    /// The target UI exposes no stable identifiers for its dialog buttons,
    /// so the scan is by rendered text.
    pub async fn click_labeled(&self, candidates: &str, label: &str) -> Result<bool> {
        let elements = retrying(&self.retry, "click_labeled", || self.query(candidates)).await?;
        for element in elements {
            let text = self.text_of(&element).await?;
            if text.trim() == label {
                self.click_element(&element).await?;
                tracing::debug!(candidates, label, "Clicked labeled element");
                return Ok(true);
            }
        }
        Ok(false)
    }

    /// Evaluates `script` in the current document and returns its JSON value.
    pub async fn execute_script(&self, script: &str) -> Result<Value> {
        retrying(&self.retry, "execute_script", || {
            self.driver.execute_script(script, None)
        })
        .await
    }

    /// Calls the function declaration `script` with the first match of
    /// `selector` bound to `this`.
    pub async fn execute_script_on(&self, selector: &str, script: &str) -> Result<Value> {
        retrying(&self.retry, "execute_script", || async {
            let element = self.locate_one(selector, Readiness::Present).await?;
            self.driver.execute_script(script, Some(&element)).await
        })
        .await
    }

    pub async fn enter_frame(&self, selector: &str) -> Result<()> {
        retrying(&self.retry, "enter_frame", || async {
            let frame = self.locate_one(selector, Readiness::Present).await?;
            self.driver.switch_frame(Some(&frame)).await
        })
        .await
    }

    pub async fn exit_frame(&self) -> Result<()> {
        self.driver.switch_frame(None).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::driver::fake::FakeDriver;

    fn proxy(driver: &FakeDriver) -> ElementProxy<FakeDriver> {
        ElementProxy::new(driver.clone(), &TimingConfig::instant())
            .with_element_timeout(Duration::ZERO)
    }

    #[tokio::test]
    async fn test_write_clears_then_types() {
        let driver = FakeDriver::new();
        driver.add("#user", "");
        proxy(&driver)
            .write("#user", "alice", WriteOptions::default())
            .await
            .unwrap();

        assert_eq!(driver.actions(), vec!["clear:#user", "type:#user:alice"]);
    }

    #[tokio::test]
    async fn test_write_with_enter_without_clear() {
        let driver = FakeDriver::new();
        driver.add("#q", "");
        proxy(&driver)
            .write("#q", "rust", WriteOptions::default().keep_existing().submit())
            .await
            .unwrap();

        assert_eq!(driver.actions(), vec!["type:#q:rust", "enter:#q"]);
    }

    #[tokio::test]
    async fn test_write_requires_interactable_unless_disabled() {
        let driver = FakeDriver::new();
        let hidden = driver.add("input[type=file]", "");
        driver.hide(&hidden);
        let proxy = proxy(&driver);

        let result = proxy
            .write("input[type=file]", "/tmp/a.png", WriteOptions::default())
            .await;
        assert!(matches!(result, Err(PilotError::RetriesExhausted { .. })));

        let options = WriteOptions {
            require_interactable: false,
            clear_first: false,
            press_enter: false,
        };
        proxy
            .write("input[type=file]", "/tmp/a.png", options)
            .await
            .unwrap();
        assert_eq!(driver.count_calls("type:"), 1);
    }

    #[tokio::test]
    async fn test_click_scrolls_before_clicking() {
        let driver = FakeDriver::new();
        driver.add("button[type=submit]", "Log in");
        proxy(&driver).click("button[type=submit]").await.unwrap();

        assert_eq!(
            driver.actions(),
            vec![
                "scroll:button[type=submit]",
                "click:button[type=submit]:Log in"
            ]
        );
    }

    #[tokio::test]
    async fn test_click_retries_intercepted() {
        let driver = FakeDriver::new();
        driver.add("#go", "Go");
        driver.fail_next(
            "click",
            PilotError::ClickIntercepted {
                selector: "#go".into(),
            },
        );

        proxy(&driver).click("#go").await.unwrap();
        assert_eq!(driver.count_calls("click:"), 2);
    }

    #[tokio::test]
    async fn test_missing_element_exhausts_retries() {
        let driver = FakeDriver::new();
        let result = proxy(&driver).click("#nowhere").await;

        match result {
            Err(PilotError::RetriesExhausted {
                attempts, source, ..
            }) => {
                assert_eq!(attempts, 2);
                assert!(matches!(
                    source.as_deref(),
                    Some(PilotError::ElementNotFound { .. })
                ));
            }
            other => panic!("expected RetriesExhausted, got {:?}", other),
        }
        assert_eq!(driver.count_calls("click:"), 0);
    }

    #[tokio::test]
    async fn test_read_texts_batches_all_matches() {
        let driver = FakeDriver::new();
        driver.add("li", "one");
        driver.add("li", "two");
        let proxy = proxy(&driver);

        assert_eq!(proxy.read_text("li").await.unwrap(), "one");
        assert_eq!(proxy.read_texts("li").await.unwrap(), vec!["one", "two"]);
    }

    #[tokio::test]
    async fn test_read_attributes() {
        let driver = FakeDriver::new();
        let first = driver.add("img", "");
        driver.add("img", "");
        driver.set_attribute(&first, "alt", "cover");
        let proxy = proxy(&driver);

        assert_eq!(
            proxy.read_attribute("img", "alt").await.unwrap().as_deref(),
            Some("cover")
        );
        assert_eq!(
            proxy.read_attributes("img", "alt").await.unwrap(),
            vec![Some("cover".to_string()), None]
        );
    }

    #[tokio::test]
    async fn test_click_labeled_matches_exact_text() {
        let driver = FakeDriver::new();
        driver.add("div[role=button]", "Back");
        driver.add("div[role=button]", "Next step");
        driver.add("div[role=button]", "Next");
        let proxy = proxy(&driver);

        assert!(proxy.click_labeled("div[role=button]", "Next").await.unwrap());
        assert_eq!(driver.count_calls("click:"), 1);
        assert_eq!(driver.count_calls("click:div[role=button]:Next"), 1);
        assert_eq!(driver.count_calls("click:div[role=button]:Next step"), 0);

        assert!(!proxy.click_labeled("div[role=button]", "Share").await.unwrap());
        assert_eq!(driver.count_calls("click:"), 1);
    }

    #[tokio::test]
    async fn test_click_labeled_retries_candidate_lookup() {
        let driver = FakeDriver::new();
        driver.add("div[role=button]", "Share");
        driver.fail_next("query", PilotError::Driver("context lost".into()));

        assert!(proxy(&driver).click_labeled("div[role=button]", "Share").await.unwrap());
        assert_eq!(driver.count_calls("query:div[role=button]"), 2);
        assert_eq!(driver.count_calls("click:div[role=button]:Share"), 1);
    }

    #[tokio::test]
    async fn test_click_labeled_lookup_exhausts_retries() {
        let driver = FakeDriver::new();
        driver.add("div[role=button]", "Share");
        driver.fail_next("query", PilotError::StaleElement("gone".into()));
        driver.fail_next("query", PilotError::StaleElement("gone".into()));

        let result = proxy(&driver).click_labeled("div[role=button]", "Share").await;
        assert!(matches!(result, Err(PilotError::RetriesExhausted { .. })));
        assert_eq!(driver.count_calls("click:"), 0);
    }

    #[tokio::test]
    async fn test_stale_element_surfaces_after_retries() {
        let driver = FakeDriver::new();
        let button = driver.add("#btn", "Go");
        driver.remove("#btn");

        let result = proxy(&driver).click_element(&button).await;
        assert!(matches!(result, Err(PilotError::RetriesExhausted { .. })));
    }

    #[tokio::test]
    async fn test_frames() {
        let driver = FakeDriver::new();
        driver.add("iframe#editor", "");
        let proxy = proxy(&driver);

        proxy.enter_frame("iframe#editor").await.unwrap();
        proxy.exit_frame().await.unwrap();
        assert_eq!(driver.actions(), vec!["frame:iframe#editor", "frame:default"]);
    }

    #[tokio::test]
    async fn test_attach_file_uses_presence_only() {
        let driver = FakeDriver::new();
        let input = driver.add("input[type=file]", "");
        driver.hide(&input);

        proxy(&driver)
            .attach_file("input[type=file]", Path::new("/tmp/photo.jpg"))
            .await
            .unwrap();
        assert_eq!(driver.actions(), vec!["upload:input[type=file]:/tmp/photo.jpg"]);
    }

    #[tokio::test]
    async fn test_execute_script_returns_value_and_retries() {
        let driver = FakeDriver::new();
        driver.set_script_result("document.readyState", Value::from("complete"));
        driver.fail_next("script", PilotError::Timeout("busy".into()));

        let value = proxy(&driver)
            .execute_script("document.readyState")
            .await
            .unwrap();
        assert_eq!(value, "complete");
        assert_eq!(driver.count_calls("script:document:document.readyState"), 2);
    }

    #[tokio::test]
    async fn test_execute_script_on_element() {
        let driver = FakeDriver::new();
        driver.add("div[role=textbox]", "");
        let script = "function(){return this.isContentEditable}";
        driver.set_script_result(script, Value::Bool(true));
        let proxy = proxy(&driver);

        let value = proxy.execute_script_on("div[role=textbox]", script).await.unwrap();
        assert_eq!(value, true);
        assert_eq!(driver.actions(), vec![format!("script:div[role=textbox]:{}", script)]);

        let missing = proxy.execute_script_on("#nowhere", script).await;
        assert!(matches!(missing, Err(PilotError::RetriesExhausted { .. })));
    }

    #[tokio::test]
    async fn test_exists_and_absent() {
        let driver = FakeDriver::new();
        driver.add("div[role=dialog]", "");
        let proxy = proxy(&driver);

        assert!(proxy.exists("div[role=dialog]").await);
        assert!(!proxy.absent("div[role=dialog]").await);

        driver.fail_next("query", PilotError::Driver("lost".into()));
        assert!(!proxy.absent("div[role=dialog]").await);

        driver.remove("div[role=dialog]");
        assert!(proxy.absent("div[role=dialog]").await);
    }
}
