use serde::Serialize;
use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum PilotError {
    #[error("Element not found: {selector}")]
    ElementNotFound { selector: String },

    #[error("Driver timeout: {0}")]
    Timeout(String),

    #[error("Stale element reference: {0}")]
    StaleElement(String),

    #[error("Click intercepted on {selector}")]
    ClickIntercepted { selector: String },

    #[error("Driver error: {0}")]
    Driver(String),

    #[error("Element not interactable: {selector}")]
    NotInteractable { selector: String },

    #[error("No such attribute: {name}")]
    NoSuchAttribute { name: String },

    #[error("Maximum retries reached for {operation} after {attempts} attempts")]
    RetriesExhausted {
        operation: String,
        attempts: u32,
        #[source]
        source: Option<Box<PilotError>>,
    },

    #[error("Validation failed: {0}")]
    Validation(String),

    #[error("Media file not found: {}", .0.display())]
    MediaNotFound(PathBuf),

    #[error("Unsupported file type: {extension}")]
    UnsupportedMedia { extension: String },

    #[error("Missing required parameters: {}", .0.join(", "))]
    MissingParameters(Vec<String>),

    #[error("{reason}")]
    StepFailed { step: String, reason: String },

    #[error("Login failed: {0}")]
    AuthenticationFailed(String),

    #[error("Failed to launch browser: {0}")]
    LaunchFailed(String),

    #[error("Session error: {0}")]
    Session(String),

    #[error("Download failed: {message}")]
    Transfer {
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("File I/O error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("TOML deserialization error: {0}")]
    TomlDeError(#[from] toml::de::Error),

    #[error("TOML serialization error: {0}")]
    TomlSerError(#[from] toml::ser::Error),
}

/// Coarse classification of a terminal failure, carried by `Outcome`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    Validation,
    Step,
    Retries,
    Authentication,
    Session,
    Transfer,
    Config,
    Internal,
}

impl PilotError {
    pub fn step(step: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::StepFailed {
            step: step.into(),
            reason: reason.into(),
        }
    }

    pub fn transfer(
        message: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Self::Transfer {
            message: message.into(),
            source: Some(Box::new(source)),
        }
    }

    /// Faults caused by timing or readiness of the remote UI. Only these are retried.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            Self::ElementNotFound { .. }
                | Self::Timeout(_)
                | Self::StaleElement(_)
                | Self::ClickIntercepted { .. }
                | Self::Driver(_)
                | Self::NotInteractable { .. }
                | Self::NoSuchAttribute { .. }
        )
    }

    pub fn kind(&self) -> FailureKind {
        match self {
            Self::Validation(_)
            | Self::MediaNotFound(_)
            | Self::UnsupportedMedia { .. }
            | Self::MissingParameters(_) => FailureKind::Validation,
            Self::StepFailed { .. } => FailureKind::Step,
            Self::RetriesExhausted { .. } => FailureKind::Retries,
            Self::AuthenticationFailed(_) => FailureKind::Authentication,
            Self::LaunchFailed(_) | Self::Session(_) => FailureKind::Session,
            Self::Transfer { .. } => FailureKind::Transfer,
            Self::ConfigError(_) | Self::TomlDeError(_) | Self::TomlSerError(_) => {
                FailureKind::Config
            }
            _ => FailureKind::Internal,
        }
    }

    /// Name of the workflow step that failed, when the failure is step-qualified.
    pub fn failed_step(&self) -> Option<&str> {
        match self {
            Self::StepFailed { step, .. } => Some(step),
            _ => None,
        }
    }

    pub fn suggestions(&self) -> Vec<String> {
        match self {
            Self::LaunchFailed(_) => vec![
                "Ensure Chrome/Chromium is installed".into(),
                "Try specifying Chrome path with CHROME_PATH or browser.chrome_path".into(),
                "Check that the profile directory is not locked by another browser".into(),
            ],
            Self::ElementNotFound { selector } => vec![
                format!("Check if element '{}' exists on the page", selector),
                "Selectors in the [site] config section may need updating".into(),
            ],
            Self::RetriesExhausted { .. } => vec![
                "Increase the retry ceiling with --max-retries".into(),
                "Run with --headless false to watch the session".into(),
            ],
            Self::StepFailed { .. } => vec![
                "The target UI may have changed; review the [site] selectors".into(),
                "Raise timing.dialog_attempts if the UI is slow to respond".into(),
            ],
            Self::AuthenticationFailed(_) => vec![
                "Verify the username and password".into(),
                "The account may require a verification challenge".into(),
            ],
            Self::MissingParameters(_) => vec![
                "Pass --username, --password and --media".into(),
                "Or set POSTPILOT_USERNAME, POSTPILOT_PASSWORD and POSTPILOT_MEDIA".into(),
            ],
            Self::UnsupportedMedia { .. } => {
                vec!["Supported types: .jpg .jpeg .png .gif .mp4 .mov".into()]
            }
            Self::Transfer { .. } => vec![
                "Ensure the link is shared publicly".into(),
                "Check network connectivity".into(),
            ],
            Self::ConfigError(_) => vec![
                "Check configuration file syntax".into(),
                "Run with --verbose to see detailed error".into(),
            ],
            _ => vec!["Run with --verbose for more details".into()],
        }
    }

    pub fn exit_code(&self) -> i32 {
        match self.kind() {
            FailureKind::Validation => 2,
            FailureKind::Session => 3,
            FailureKind::Step | FailureKind::Retries => 4,
            FailureKind::Authentication => 5,
            FailureKind::Transfer => 6,
            FailureKind::Config => 7,
            FailureKind::Internal => 1,
        }
    }
}
