//! Scripted in-memory driver for unit tests.

use super::{DriverLauncher, LaunchOptions, RemoteDriver};
use crate::{PilotError, Result};
use std::collections::{HashMap, HashSet, VecDeque};
use std::path::Path;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

#[derive(Debug, Clone, PartialEq)]
pub struct FakeElement {
    pub id: usize,
    pub selector: String,
    pub text: String,
}

type Reaction = Arc<dyn Fn(&mut FakeState) + Send + Sync>;

#[derive(Default)]
pub struct FakeState {
    dom: HashMap<String, Vec<FakeElement>>,
    attributes: HashMap<(usize, String), String>,
    hidden: HashSet<usize>,
    calls: Vec<String>,
    failures: HashMap<String, VecDeque<PilotError>>,
    reactions: HashMap<String, Reaction>,
    script_results: HashMap<String, serde_json::Value>,
    next_id: usize,
}

impl FakeState {
    pub fn add(&mut self, selector: &str, text: &str) -> FakeElement {
        self.next_id += 1;
        let element = FakeElement {
            id: self.next_id,
            selector: selector.to_string(),
            text: text.to_string(),
        };
        self.dom
            .entry(selector.to_string())
            .or_default()
            .push(element.clone());
        element
    }

    pub fn remove(&mut self, selector: &str) {
        self.dom.remove(selector);
    }

    fn is_attached(&self, element: &FakeElement) -> bool {
        self.dom
            .get(&element.selector)
            .is_some_and(|els| els.iter().any(|e| e.id == element.id))
    }

    fn take_failure(&mut self, op: &str) -> Option<PilotError> {
        self.failures.get_mut(op).and_then(|q| q.pop_front())
    }
}

#[derive(Clone, Default)]
pub struct FakeDriver {
    state: Arc<Mutex<FakeState>>,
}

impl FakeDriver {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, FakeState> {
        self.state.lock().unwrap()
    }

    pub fn add(&self, selector: &str, text: &str) -> FakeElement {
        self.lock().add(selector, text)
    }

    pub fn remove(&self, selector: &str) {
        self.lock().remove(selector);
    }

    pub fn hide(&self, element: &FakeElement) {
        self.lock().hidden.insert(element.id);
    }

    pub fn set_attribute(&self, element: &FakeElement, name: &str, value: &str) {
        self.lock()
            .attributes
            .insert((element.id, name.to_string()), value.to_string());
    }

    /// Value returned by `execute_script` for exactly `script`.
    pub fn set_script_result(&self, script: &str, value: serde_json::Value) {
        self.lock()
            .script_results
            .insert(script.to_string(), value);
    }

    /// Queues a fault returned by the next call of `op` (e.g. "click").
    pub fn fail_next(&self, op: &str, error: PilotError) {
        self.lock()
            .failures
            .entry(op.to_string())
            .or_default()
            .push_back(error);
    }

    /// Runs `reaction` whenever an element whose text or selector equals `key` is clicked.
    pub fn on_click(&self, key: &str, reaction: impl Fn(&mut FakeState) + Send + Sync + 'static) {
        self.lock()
            .reactions
            .insert(key.to_string(), Arc::new(reaction));
    }

    pub fn calls(&self) -> Vec<String> {
        self.lock().calls.clone()
    }

    /// Recorded calls other than lookups.
    pub fn actions(&self) -> Vec<String> {
        self.lock()
            .calls
            .iter()
            .filter(|c| !c.starts_with("query:"))
            .cloned()
            .collect()
    }

    pub fn count_calls(&self, prefix: &str) -> usize {
        self.lock()
            .calls
            .iter()
            .filter(|c| c.starts_with(prefix))
            .count()
    }

    fn begin(&self, op: &str, call: String) -> Result<MutexGuard<'_, FakeState>> {
        let mut state = self.lock();
        state.calls.push(call);
        match state.take_failure(op) {
            Some(err) => Err(err),
            None => Ok(state),
        }
    }

    fn ensure_attached(state: &FakeState, element: &FakeElement) -> Result<()> {
        if state.is_attached(element) {
            Ok(())
        } else {
            Err(PilotError::StaleElement(element.selector.clone()))
        }
    }
}

#[async_trait::async_trait]
impl RemoteDriver for FakeDriver {
    type Element = FakeElement;

    async fn navigate(&self, url: &str) -> Result<()> {
        self.begin("navigate", format!("navigate:{}", url))?;
        Ok(())
    }

    async fn query_all(&self, selector: &str) -> Result<Vec<FakeElement>> {
        let state = self.begin("query", format!("query:{}", selector))?;
        Ok(state.dom.get(selector).cloned().unwrap_or_default())
    }

    async fn is_interactable(&self, element: &FakeElement) -> Result<bool> {
        let state = self.lock();
        Ok(state.is_attached(element) && !state.hidden.contains(&element.id))
    }

    async fn execute_script(
        &self,
        script: &str,
        element: Option<&FakeElement>,
    ) -> Result<serde_json::Value> {
        let target = element.map_or("document", |e| e.selector.as_str());
        let state = self.begin("script", format!("script:{}:{}", target, script))?;
        if let Some(element) = element {
            Self::ensure_attached(&state, element)?;
        }
        Ok(state
            .script_results
            .get(script)
            .cloned()
            .unwrap_or(serde_json::Value::Null))
    }

    async fn switch_frame(&self, frame: Option<&FakeElement>) -> Result<()> {
        let target = frame
            .map(|f| f.selector.clone())
            .unwrap_or_else(|| "default".into());
        self.begin("frame", format!("frame:{}", target))?;
        Ok(())
    }

    async fn inner_text(&self, element: &FakeElement) -> Result<String> {
        let state = self.begin("text", format!("text:{}", element.selector))?;
        Self::ensure_attached(&state, element)?;
        Ok(element.text.clone())
    }

    async fn attribute(&self, element: &FakeElement, name: &str) -> Result<Option<String>> {
        let state = self.begin("attribute", format!("attribute:{}:{}", element.selector, name))?;
        Self::ensure_attached(&state, element)?;
        Ok(state.attributes.get(&(element.id, name.to_string())).cloned())
    }

    async fn scroll_into_view(&self, element: &FakeElement) -> Result<()> {
        let state = self.begin("scroll", format!("scroll:{}", element.selector))?;
        Self::ensure_attached(&state, element)
    }

    async fn click(&self, element: &FakeElement) -> Result<()> {
        let mut state = self.begin(
            "click",
            format!("click:{}:{}", element.selector, element.text),
        )?;
        Self::ensure_attached(&state, element)?;

        for key in [&element.text, &element.selector] {
            if let Some(reaction) = state.reactions.get(key.as_str()).cloned() {
                reaction(&mut *state);
            }
        }
        Ok(())
    }

    async fn clear(&self, element: &FakeElement) -> Result<()> {
        let state = self.begin("clear", format!("clear:{}", element.selector))?;
        Self::ensure_attached(&state, element)
    }

    async fn send_keys(&self, element: &FakeElement, text: &str) -> Result<()> {
        let state = self.begin("type", format!("type:{}:{}", element.selector, text))?;
        Self::ensure_attached(&state, element)
    }

    async fn press_enter(&self, element: &FakeElement) -> Result<()> {
        let state = self.begin("enter", format!("enter:{}", element.selector))?;
        Self::ensure_attached(&state, element)
    }

    async fn set_file_input(&self, element: &FakeElement, path: &Path) -> Result<()> {
        let state = self.begin(
            "upload",
            format!("upload:{}:{}", element.selector, path.display()),
        )?;
        Self::ensure_attached(&state, element)
    }

    async fn quit(&self) -> Result<()> {
        self.begin("quit", "quit".into())?;
        Ok(())
    }
}

/// Hands out clones of one shared [`FakeDriver`].
#[derive(Clone, Default)]
pub struct FakeLauncher {
    pub driver: FakeDriver,
    pub launches: Arc<AtomicU32>,
    pub fail_with: Option<String>,
}

impl FakeLauncher {
    pub fn new(driver: FakeDriver) -> Self {
        Self {
            driver,
            ..Default::default()
        }
    }

    pub fn launch_count(&self) -> u32 {
        self.launches.load(Ordering::SeqCst)
    }
}

#[async_trait::async_trait]
impl DriverLauncher for FakeLauncher {
    type Driver = FakeDriver;

    async fn launch(&self, _options: &LaunchOptions) -> Result<FakeDriver> {
        self.launches.fetch_add(1, Ordering::SeqCst);
        match &self.fail_with {
            Some(reason) => Err(PilotError::LaunchFailed(reason.clone())),
            None => Ok(self.driver.clone()),
        }
    }
}
