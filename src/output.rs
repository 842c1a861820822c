use crate::error::FailureKind;
use crate::outcome::Outcome;
use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::{Map, Value};

pub trait OutputFormatter {
    fn format_text(&self) -> String;
    fn format_json(&self, pretty: bool) -> crate::Result<String>;
}

pub fn print_output<T: OutputFormatter>(
    data: &T,
    as_json: bool,
    json_pretty: bool,
) -> crate::Result<()> {
    let output = if as_json {
        data.format_json(json_pretty)?
    } else {
        data.format_text()
    };

    println!("{}", output);
    Ok(())
}

pub fn to_json<T: Serialize>(data: &T, pretty: bool) -> crate::Result<String> {
    if pretty {
        Ok(serde_json::to_string_pretty(data)?)
    } else {
        Ok(serde_json::to_string(data)?)
    }
}

/// Serialized form of an [`Outcome`].
#[derive(Debug, Clone, Serialize)]
pub struct Report {
    pub success: bool,
    pub message: String,
    pub timestamp: DateTime<Utc>,
    pub data: Map<String, Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<ErrorReport>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ErrorReport {
    pub details: String,
    pub kind: FailureKind,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub step: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cause: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub suggestions: Vec<String>,
}

impl Report {
    pub fn new(outcome: &Outcome) -> Self {
        let timestamp = Utc::now();
        match outcome {
            Outcome::Success { message, data } => Self {
                success: true,
                message: message.clone(),
                timestamp,
                data: data.clone(),
                error: None,
            },
            Outcome::Failure {
                kind,
                step,
                message,
                details,
                cause,
                suggestions,
                data,
                ..
            } => Self {
                success: false,
                message: message.clone(),
                timestamp,
                data: data.clone(),
                error: Some(ErrorReport {
                    details: details.clone(),
                    kind: *kind,
                    step: step.clone(),
                    cause: cause.clone(),
                    suggestions: suggestions.clone(),
                }),
            },
        }
    }
}

impl From<&Outcome> for Report {
    fn from(outcome: &Outcome) -> Self {
        Self::new(outcome)
    }
}

fn display_value(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => "-".into(),
        other => other.to_string(),
    }
}

impl OutputFormatter for Report {
    fn format_text(&self) -> String {
        let mut lines = Vec::new();

        if self.success {
            lines.push(text::success(&self.message));
        } else {
            lines.push(text::error(&self.message));
        }

        for (key, value) in &self.data {
            lines.push(text::key_value(key, &display_value(value)));
        }

        if let Some(error) = &self.error {
            if let Some(step) = &error.step {
                lines.push(text::key_value("step", step));
            }
            if let Some(cause) = &error.cause {
                lines.push(text::key_value("cause", cause));
            }
            if !error.suggestions.is_empty() {
                lines.push(text::subsection("Suggestions"));
                lines.extend(error.suggestions.iter().map(|s| text::bullet(s)));
            }
        }

        lines.join("\n")
    }

    fn format_json(&self, pretty: bool) -> crate::Result<String> {
        to_json(self, pretty)
    }
}

pub mod text {
    use colored::Colorize;

    pub fn success(msg: &str) -> String {
        format!("{} {}", "✓".green().bold(), msg)
    }

    pub fn error(msg: &str) -> String {
        format!("{} {}", "✗".red().bold(), msg)
    }

    pub fn bullet(msg: &str) -> String {
        format!("  • {}", msg)
    }

    pub fn subsection(title: &str) -> String {
        format!("\n{}", title.bold())
    }

    pub fn key_value(key: &str, value: &str) -> String {
        format!("  {}: {}", key.bold(), value)
    }
}
