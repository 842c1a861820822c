//! Binary result of a workflow run.

use crate::PilotError;
use crate::error::FailureKind;
use serde_json::{Map, Value};
use std::error::Error;

#[derive(Debug, Clone, PartialEq)]
pub enum Outcome {
    Success {
        message: String,
        data: Map<String, Value>,
    },
    Failure {
        kind: FailureKind,
        step: Option<String>,
        message: String,
        details: String,
        cause: Option<String>,
        suggestions: Vec<String>,
        exit_code: i32,
        data: Map<String, Value>,
    },
}

impl Outcome {
    pub fn success(message: impl Into<String>) -> Self {
        Self::Success {
            message: message.into(),
            data: Map::new(),
        }
    }

    /// Classifies `err`. The headline defaults to the error's own message.
    pub fn from_error(err: &PilotError) -> Self {
        let details = err.to_string();
        Self::Failure {
            kind: err.kind(),
            step: err.failed_step().map(str::to_string),
            message: details.clone(),
            details,
            cause: cause_chain(err),
            suggestions: err.suggestions(),
            exit_code: err.exit_code(),
            data: Map::new(),
        }
    }

    /// Prefixes a failure headline, e.g. "Posting failed: <details>".
    pub fn headline(mut self, prefix: &str) -> Self {
        if let Self::Failure {
            message, details, ..
        } = &mut self
        {
            *message = format!("{}: {}", prefix, details);
        }
        self
    }

    pub fn with_data(mut self, key: &str, value: impl Into<Value>) -> Self {
        let data = match &mut self {
            Self::Success { data, .. } | Self::Failure { data, .. } => data,
        };
        data.insert(key.to_string(), value.into());
        self
    }

    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success { .. })
    }

    pub fn message(&self) -> &str {
        match self {
            Self::Success { message, .. } | Self::Failure { message, .. } => message,
        }
    }

    pub fn data(&self) -> &Map<String, Value> {
        match self {
            Self::Success { data, .. } | Self::Failure { data, .. } => data,
        }
    }

    pub fn exit_code(&self) -> i32 {
        match self {
            Self::Success { .. } => 0,
            Self::Failure { exit_code, .. } => *exit_code,
        }
    }
}

/// Messages of the sources below `err`, outermost first.
fn cause_chain(err: &PilotError) -> Option<String> {
    let mut causes = Vec::new();
    let mut current = err.source();
    while let Some(source) = current {
        causes.push(source.to_string());
        current = source.source();
    }

    if causes.is_empty() {
        None
    } else {
        Some(causes.join(": "))
    }
}
