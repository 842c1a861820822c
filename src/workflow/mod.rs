//! Ordered, named steps over an [`ElementProxy`].

pub mod auth;
pub mod content;

use crate::config::TimingConfig;
use crate::driver::RemoteDriver;
use crate::poll::{WaitSpec, wait_for};
use crate::proxy::{ElementProxy, WriteOptions};
use crate::{PilotError, Result};
use std::path::PathBuf;
use std::time::Duration;

pub use auth::{AuthOutcome, Credentials, authenticate};
pub use content::{MEDIA_EXTENSIONS, post_content, post_workflow, validate_media};

/// A gate: poll until the selector is present (or absent) within `attempts`.
#[derive(Debug, Clone, PartialEq)]
pub struct Gate {
    pub selector: String,
    pub attempts: u32,
    /// Progress line shown while waiting.
    pub message: String,
    /// Reason reported when the budget runs out.
    pub failure: String,
}

impl Gate {
    pub fn new(
        selector: impl Into<String>,
        attempts: u32,
        message: impl Into<String>,
        failure: impl Into<String>,
    ) -> Self {
        Self {
            selector: selector.into(),
            attempts,
            message: message.into(),
            failure: failure.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Action {
    Navigate(String),
    AwaitPresent(Gate),
    AwaitAbsent(Gate),
    Click(String),
    /// Click the candidate whose visible text equals `label`.
    ClickLabeled {
        candidates: String,
        label: String,
    },
    Write {
        selector: String,
        text: String,
        options: WriteOptions,
    },
    AttachFile {
        selector: String,
        path: PathBuf,
    },
    Pause(Duration),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Step {
    pub name: String,
    pub action: Action,
}

#[derive(Debug, Clone)]
pub struct Workflow {
    name: String,
    steps: Vec<Step>,
}

impl Workflow {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            steps: Vec::new(),
        }
    }

    pub fn step(mut self, name: impl Into<String>, action: Action) -> Self {
        self.steps.push(Step {
            name: name.into(),
            action,
        });
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn steps(&self) -> &[Step] {
        &self.steps
    }

    pub fn step_names(&self) -> Vec<&str> {
        self.steps.iter().map(|s| s.name.as_str()).collect()
    }

    /// Runs every step in order and stops at the first failure.
    ///
    /// Gate timeouts and missing label targets become [`PilotError::StepFailed`];
    /// any other fault from the proxy propagates unchanged.
    pub async fn run<D: RemoteDriver>(
        &self,
        proxy: &ElementProxy<D>,
        timing: &TimingConfig,
    ) -> Result<()> {
        tracing::info!(workflow = %self.name, steps = self.steps.len(), "Workflow started");

        for (index, step) in self.steps.iter().enumerate() {
            tracing::info!(
                workflow = %self.name,
                step = %step.name,
                "Step {}/{}",
                index + 1,
                self.steps.len()
            );

            if let Err(e) = execute(proxy, timing, step).await {
                tracing::warn!(workflow = %self.name, step = %step.name, "Step failed: {}", e);
                return Err(e);
            }
        }

        tracing::info!(workflow = %self.name, "Workflow completed");
        Ok(())
    }
}

async fn execute<D: RemoteDriver>(
    proxy: &ElementProxy<D>,
    timing: &TimingConfig,
    step: &Step,
) -> Result<()> {
    match &step.action {
        Action::Navigate(url) => proxy.navigate(url).await,
        Action::AwaitPresent(gate) => {
            let spec = gate_spec(gate, timing);
            if wait_for(&spec, || proxy.exists(&gate.selector)).await {
                Ok(())
            } else {
                Err(PilotError::step(&step.name, &gate.failure))
            }
        }
        Action::AwaitAbsent(gate) => {
            let spec = gate_spec(gate, timing);
            if wait_for(&spec, || proxy.absent(&gate.selector)).await {
                Ok(())
            } else {
                Err(PilotError::step(&step.name, &gate.failure))
            }
        }
        Action::Click(selector) => proxy.click(selector).await,
        Action::ClickLabeled { candidates, label } => {
            if proxy.click_labeled(candidates, label).await? {
                Ok(())
            } else {
                Err(PilotError::step(
                    &step.name,
                    format!("{} button not found", label),
                ))
            }
        }
        Action::Write {
            selector,
            text,
            options,
        } => proxy.write(selector, text, *options).await,
        Action::AttachFile { selector, path } => proxy.attach_file(selector, path).await,
        Action::Pause(duration) => {
            tokio::time::sleep(*duration).await;
            Ok(())
        }
    }
}

fn gate_spec(gate: &Gate, timing: &TimingConfig) -> WaitSpec {
    WaitSpec::new(&gate.message)
        .attempts(gate.attempts)
        .with_timing(timing)
}
