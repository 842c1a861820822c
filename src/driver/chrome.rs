use super::{DriverLauncher, LaunchOptions, RemoteDriver, scripts};
use crate::{PilotError, Result, timeouts::secs};
use chromiumoxide::cdp::browser_protocol::dom::SetFileInputFilesParams;
use chromiumoxide::cdp::browser_protocol::input::{
    DispatchKeyEventParams, DispatchKeyEventType, DispatchMouseEventParams,
    DispatchMouseEventType, InsertTextParams, MouseButton,
};
use chromiumoxide::cdp::js_protocol::runtime::{
    CallFunctionOnParams, EvaluateParams, ExceptionDetails, GetPropertiesParams, RemoteObject,
    RemoteObjectId,
};
use chromiumoxide::error::CdpError;
use chromiumoxide::{Browser, BrowserConfig, Page};
use futures::StreamExt;
use serde_json::Value;
use std::path::Path;
use std::time::Duration;
use tokio::sync::{Mutex, RwLock};
use tokio::task::JoinHandle;

/// Handle to a DOM node held by the remote runtime.
#[derive(Debug, Clone)]
pub struct ChromeElement {
    object_id: RemoteObjectId,
    selector: String,
}

impl ChromeElement {
    pub fn selector(&self) -> &str {
        &self.selector
    }
}

pub struct ChromeDriver {
    browser: Mutex<Option<Browser>>,
    handler: JoinHandle<()>,
    page: Page,
    frame: RwLock<Option<ChromeElement>>,
    page_load_timeout: Duration,
}

fn classify(err: CdpError) -> PilotError {
    let message = err.to_string();
    if matches!(err, CdpError::Timeout) {
        return PilotError::Timeout(message);
    }
    if message.contains("Could not find object")
        || message.contains("No node with given id")
        || message.contains("Cannot find context")
    {
        return PilotError::StaleElement(message);
    }
    PilotError::Driver(message)
}

fn exception_text(details: &ExceptionDetails) -> String {
    details
        .exception
        .as_ref()
        .and_then(|e| e.description.clone())
        .unwrap_or_else(|| details.text.clone())
}

impl ChromeDriver {
    async fn call_on(&self, element: &ChromeElement, declaration: &str) -> Result<Value> {
        let params = CallFunctionOnParams::builder()
            .function_declaration(declaration)
            .object_id(element.object_id.clone())
            .return_by_value(true)
            .await_promise(true)
            .build()
            .map_err(PilotError::Driver)?;

        let response = self.page.execute(params).await.map_err(classify)?;
        if let Some(details) = response.result.exception_details.as_ref() {
            return Err(PilotError::Driver(format!(
                "script failed on {}: {}",
                element.selector,
                exception_text(details)
            )));
        }

        Ok(response.result.result.value.clone().unwrap_or(Value::Null))
    }

    async fn call_on_bool(&self, element: &ChromeElement, declaration: &str) -> Result<bool> {
        Ok(self
            .call_on(element, declaration)
            .await?
            .as_bool()
            .unwrap_or(false))
    }

    /// Expands a remote array into element handles, in index order.
    async fn collect_elements(&self, array: RemoteObject, selector: &str) -> Result<Vec<ChromeElement>> {
        let Some(array_id) = array.object_id else {
            return Ok(Vec::new());
        };

        let params = GetPropertiesParams::builder()
            .object_id(array_id)
            .own_properties(true)
            .build()
            .map_err(PilotError::Driver)?;
        let response = self.page.execute(params).await.map_err(classify)?;

        let mut indexed: Vec<(usize, RemoteObjectId)> = response
            .result
            .result
            .iter()
            .filter_map(|prop| {
                let index = prop.name.parse::<usize>().ok()?;
                let object_id = prop.value.as_ref()?.object_id.clone()?;
                Some((index, object_id))
            })
            .collect();
        indexed.sort_by_key(|(index, _)| *index);

        Ok(indexed
            .into_iter()
            .map(|(_, object_id)| ChromeElement {
                object_id,
                selector: selector.to_string(),
            })
            .collect())
    }

    async fn dispatch_mouse(&self, kind: DispatchMouseEventType, x: f64, y: f64) -> Result<()> {
        let mut builder = DispatchMouseEventParams::builder().r#type(kind.clone()).x(x).y(y);
        if kind != DispatchMouseEventType::MouseMoved {
            builder = builder.button(MouseButton::Left).click_count(1);
        }
        let params = builder.build().map_err(PilotError::Driver)?;
        self.page.execute(params).await.map_err(classify)?;
        Ok(())
    }

    async fn dispatch_key(&self, kind: DispatchKeyEventType) -> Result<()> {
        let mut builder = DispatchKeyEventParams::builder()
            .r#type(kind.clone())
            .key("Enter")
            .code("Enter")
            .windows_virtual_key_code(13);
        if kind == DispatchKeyEventType::KeyDown {
            builder = builder.text("\r");
        }
        let params = builder.build().map_err(PilotError::Driver)?;
        self.page.execute(params).await.map_err(classify)?;
        Ok(())
    }
}

#[async_trait::async_trait]
impl RemoteDriver for ChromeDriver {
    type Element = ChromeElement;

    async fn navigate(&self, url: &str) -> Result<()> {
        self.frame.write().await.take();
        tracing::debug!(url, "Navigating");

        tokio::time::timeout(self.page_load_timeout, self.page.goto(url))
            .await
            .map_err(|_| {
                PilotError::Timeout(format!(
                    "navigation to {} exceeded {}s",
                    url,
                    self.page_load_timeout.as_secs()
                ))
            })?
            .map_err(classify)?;
        Ok(())
    }

    async fn query_all(&self, selector: &str) -> Result<Vec<ChromeElement>> {
        let frame = self.frame.read().await.clone();

        let array = match frame {
            Some(frame) => {
                let params = CallFunctionOnParams::builder()
                    .function_declaration(scripts::query_frame(selector))
                    .object_id(frame.object_id.clone())
                    .return_by_value(false)
                    .build()
                    .map_err(PilotError::Driver)?;
                let response = self.page.execute(params).await.map_err(classify)?;
                if let Some(details) = response.result.exception_details.as_ref() {
                    return Err(PilotError::StaleElement(exception_text(details)));
                }
                response.result.result.clone()
            }
            None => {
                let params = EvaluateParams::builder()
                    .expression(scripts::query_document(selector))
                    .return_by_value(false)
                    .build()
                    .map_err(PilotError::Driver)?;
                let response = self.page.execute(params).await.map_err(classify)?;
                if let Some(details) = response.result.exception_details.as_ref() {
                    return Err(PilotError::Driver(exception_text(details)));
                }
                response.result.result.clone()
            }
        };

        self.collect_elements(array, selector).await
    }

    async fn is_interactable(&self, element: &ChromeElement) -> Result<bool> {
        self.call_on_bool(element, scripts::IS_INTERACTABLE).await
    }

    async fn execute_script(&self, script: &str, element: Option<&ChromeElement>) -> Result<Value> {
        match element {
            Some(element) => self.call_on(element, script).await,
            None => {
                let result = self.page.evaluate(script).await.map_err(classify)?;
                Ok(result.into_value::<Value>().unwrap_or(Value::Null))
            }
        }
    }

    async fn switch_frame(&self, frame: Option<&ChromeElement>) -> Result<()> {
        match frame {
            Some(frame) => {
                if !self.call_on_bool(frame, scripts::IS_FRAME).await? {
                    return Err(PilotError::Driver(format!(
                        "{} is not an accessible frame",
                        frame.selector
                    )));
                }
                *self.frame.write().await = Some(frame.clone());
            }
            None => {
                self.frame.write().await.take();
            }
        }
        Ok(())
    }

    async fn inner_text(&self, element: &ChromeElement) -> Result<String> {
        let value = self.call_on(element, scripts::INNER_TEXT).await?;
        Ok(value.as_str().unwrap_or_default().to_string())
    }

    async fn attribute(&self, element: &ChromeElement, name: &str) -> Result<Option<String>> {
        let value = self.call_on(element, &scripts::get_attribute(name)).await?;
        Ok(value.as_str().map(str::to_string))
    }

    async fn scroll_into_view(&self, element: &ChromeElement) -> Result<()> {
        self.call_on(element, scripts::SCROLL_INTO_VIEW).await?;
        Ok(())
    }

    async fn click(&self, element: &ChromeElement) -> Result<()> {
        let point = self.call_on(element, scripts::CLICK_POINT).await?;
        let selector = element.selector.clone();

        match point.get("state").and_then(Value::as_str) {
            Some("ok") => {}
            Some("detached") => return Err(PilotError::StaleElement(selector)),
            Some("hidden") => return Err(PilotError::NotInteractable { selector }),
            Some("covered") => return Err(PilotError::ClickIntercepted { selector }),
            _ => {
                return Err(PilotError::Driver(format!(
                    "could not resolve click point for {}",
                    selector
                )));
            }
        }

        let x = point.get("x").and_then(Value::as_f64).unwrap_or_default();
        let y = point.get("y").and_then(Value::as_f64).unwrap_or_default();

        self.dispatch_mouse(DispatchMouseEventType::MouseMoved, x, y)
            .await?;
        self.dispatch_mouse(DispatchMouseEventType::MousePressed, x, y)
            .await?;
        self.dispatch_mouse(DispatchMouseEventType::MouseReleased, x, y)
            .await?;
        Ok(())
    }

    async fn clear(&self, element: &ChromeElement) -> Result<()> {
        self.call_on(element, scripts::CLEAR).await?;
        Ok(())
    }

    async fn send_keys(&self, element: &ChromeElement, text: &str) -> Result<()> {
        self.call_on(element, scripts::FOCUS).await?;
        self.page
            .execute(InsertTextParams::new(text))
            .await
            .map_err(classify)?;
        Ok(())
    }

    async fn press_enter(&self, element: &ChromeElement) -> Result<()> {
        self.call_on(element, scripts::FOCUS).await?;
        self.dispatch_key(DispatchKeyEventType::KeyDown).await?;
        self.dispatch_key(DispatchKeyEventType::KeyUp).await
    }

    async fn set_file_input(&self, element: &ChromeElement, path: &Path) -> Result<()> {
        let mut params = SetFileInputFilesParams::new(vec![path.to_string_lossy().to_string()]);
        params.object_id = Some(element.object_id.clone());
        self.page.execute(params).await.map_err(classify)?;
        Ok(())
    }

    async fn quit(&self) -> Result<()> {
        if let Some(mut browser) = self.browser.lock().await.take() {
            browser
                .close()
                .await
                .map_err(|e| PilotError::Session(format!("Failed to close browser: {}", e)))?;
            let _ = browser.wait().await;
        }
        self.handler.abort();
        Ok(())
    }
}

#[derive(Debug, Default, Clone)]
pub struct ChromeLauncher;

#[async_trait::async_trait]
impl DriverLauncher for ChromeLauncher {
    type Driver = ChromeDriver;

    async fn launch(&self, options: &LaunchOptions) -> Result<ChromeDriver> {
        let chrome_path = match options.chrome_path.clone() {
            Some(path) => path,
            None => crate::utils::find_chrome_executable()?,
        };

        let (width, height) = options.window_size;
        let mut builder = BrowserConfig::builder()
            .chrome_executable(&chrome_path)
            .user_data_dir(&options.user_data_dir)
            .request_timeout(Duration::from_secs(secs::REQUEST))
            .window_size(width, height)
            .viewport(None)
            .arg("--no-first-run")
            .arg("--no-default-browser-check");

        if !options.headless {
            builder = builder.with_head();
        }

        let config = builder.build().map_err(PilotError::LaunchFailed)?;

        let (browser, mut handler) = Browser::launch(config)
            .await
            .map_err(|e| PilotError::LaunchFailed(e.to_string()))?;

        let handler = tokio::spawn(async move { while handler.next().await.is_some() {} });

        let page = browser
            .new_page("about:blank")
            .await
            .map_err(|e| PilotError::LaunchFailed(e.to_string()))?;

        tracing::info!(
            chrome = %chrome_path.display(),
            profile = %options.user_data_dir.display(),
            headless = options.headless,
            "Browser launched"
        );

        Ok(ChromeDriver {
            browser: Mutex::new(Some(browser)),
            handler,
            page,
            frame: RwLock::new(None),
            page_load_timeout: options.page_load_timeout,
        })
    }
}
