use crate::timeouts::{attempts, ms, secs};
use crate::{PilotError, Result};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

#[derive(Debug, Clone, Deserialize, Serialize, Default)]
pub struct Config {
    #[serde(default)]
    pub browser: BrowserConfig,
    #[serde(default)]
    pub timing: TimingConfig,
    #[serde(default)]
    pub site: SiteConfig,
    #[serde(default)]
    pub output: OutputConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct BrowserConfig {
    pub chrome_path: Option<PathBuf>,
    #[serde(default = "default_headless")]
    pub headless: bool,
    /// Session storage override. When unset every run gets a fresh directory.
    pub user_data_dir: Option<PathBuf>,
    #[serde(default)]
    pub keep_profile: bool,
    #[serde(default = "default_window_width")]
    pub window_width: u32,
    #[serde(default = "default_window_height")]
    pub window_height: u32,
}

/// Every wait and retry knob the workflows use.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct TimingConfig {
    #[serde(default = "default_poll_interval")]
    pub poll_interval_ms: u64,
    #[serde(default = "default_element_timeout")]
    pub element_timeout_secs: u64,
    #[serde(default = "default_readiness_poll")]
    pub readiness_poll_ms: u64,
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    #[serde(default = "default_retry_backoff")]
    pub retry_backoff_ms: u64,
    #[serde(default = "default_click_settle")]
    pub click_settle_ms: u64,
    #[serde(default = "default_teardown_settle")]
    pub teardown_settle_ms: u64,
    #[serde(default = "default_page_settle")]
    pub page_settle_ms: u64,
    #[serde(default = "default_submit_settle")]
    pub submit_settle_ms: u64,
    #[serde(default = "default_between_flows")]
    pub between_flows_ms: u64,
    #[serde(default = "default_page_load_timeout")]
    pub page_load_timeout_secs: u64,
    #[serde(default = "default_login_attempts")]
    pub login_attempts: u32,
    #[serde(default = "default_dialog_attempts")]
    pub dialog_attempts: u32,
    #[serde(default = "default_publish_attempts")]
    pub publish_attempts: u32,
    #[serde(default = "default_show_progress")]
    pub show_progress: bool,
}

/// Selectors and labels of the target application.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct SiteConfig {
    pub base_url: String,
    pub home_landmark: String,
    pub username_field: String,
    pub password_field: String,
    pub submit_button: String,
    pub new_post_button: String,
    pub new_post_menu_entry: String,
    pub file_input: String,
    pub crop_dialog: String,
    pub edit_dialog: String,
    pub compose_dialog: String,
    pub caption_box: String,
    pub any_dialog: String,
    pub dialog_button: String,
    pub next_label: String,
    pub share_label: String,
}

impl Default for SiteConfig {
    fn default() -> Self {
        Self {
            base_url: "https://www.instagram.com/".into(),
            home_landmark: "svg[aria-label=Home]".into(),
            username_field: "[name='username']".into(),
            password_field: "[name='password']".into(),
            submit_button: "button[type=submit]".into(),
            new_post_button: "svg[aria-label='New post']".into(),
            new_post_menu_entry: "div[aria-hidden='false'] a:first-child".into(),
            file_input: "input[type=file]".into(),
            crop_dialog: "div[aria-label='Crop']".into(),
            edit_dialog: "div[aria-label='Edit']".into(),
            compose_dialog: "div[aria-label='Create new post']".into(),
            caption_box: "div[role=textbox]".into(),
            any_dialog: "div[role=dialog]".into(),
            dialog_button: "div[role=button]".into(),
            next_label: "Next".into(),
            share_label: "Share".into(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct OutputConfig {
    #[serde(default = "default_json_pretty")]
    pub json_pretty: bool,
}

fn default_headless() -> bool {
    true
}
fn default_window_width() -> u32 {
    1280
}
fn default_window_height() -> u32 {
    900
}
fn default_poll_interval() -> u64 {
    ms::POLL_INTERVAL
}
fn default_element_timeout() -> u64 {
    secs::ELEMENT_WAIT
}
fn default_readiness_poll() -> u64 {
    ms::READINESS_POLL
}
fn default_max_retries() -> u32 {
    attempts::MAX_RETRIES
}
fn default_retry_backoff() -> u64 {
    ms::RETRY_BACKOFF
}
fn default_click_settle() -> u64 {
    ms::CLICK_SETTLE
}
fn default_teardown_settle() -> u64 {
    ms::TEARDOWN_SETTLE
}
fn default_page_settle() -> u64 {
    ms::PAGE_SETTLE
}
fn default_submit_settle() -> u64 {
    ms::SUBMIT_SETTLE
}
fn default_between_flows() -> u64 {
    ms::BETWEEN_FLOWS
}
fn default_page_load_timeout() -> u64 {
    secs::PAGE_LOAD
}
fn default_login_attempts() -> u32 {
    attempts::LOGIN
}
fn default_dialog_attempts() -> u32 {
    attempts::DIALOG
}
fn default_publish_attempts() -> u32 {
    attempts::PUBLISH
}
fn default_show_progress() -> bool {
    true
}
fn default_json_pretty() -> bool {
    true
}

impl Default for BrowserConfig {
    fn default() -> Self {
        Self {
            chrome_path: None,
            headless: default_headless(),
            user_data_dir: None,
            keep_profile: false,
            window_width: default_window_width(),
            window_height: default_window_height(),
        }
    }
}

impl Default for TimingConfig {
    fn default() -> Self {
        Self {
            poll_interval_ms: default_poll_interval(),
            element_timeout_secs: default_element_timeout(),
            readiness_poll_ms: default_readiness_poll(),
            max_retries: default_max_retries(),
            retry_backoff_ms: default_retry_backoff(),
            click_settle_ms: default_click_settle(),
            teardown_settle_ms: default_teardown_settle(),
            page_settle_ms: default_page_settle(),
            submit_settle_ms: default_submit_settle(),
            between_flows_ms: default_between_flows(),
            page_load_timeout_secs: default_page_load_timeout(),
            login_attempts: default_login_attempts(),
            dialog_attempts: default_dialog_attempts(),
            publish_attempts: default_publish_attempts(),
            show_progress: default_show_progress(),
        }
    }
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            json_pretty: default_json_pretty(),
        }
    }
}

impl TimingConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn element_timeout(&self) -> Duration {
        Duration::from_secs(self.element_timeout_secs)
    }

    pub fn readiness_poll(&self) -> Duration {
        Duration::from_millis(self.readiness_poll_ms)
    }

    pub fn retry_backoff(&self) -> Duration {
        Duration::from_millis(self.retry_backoff_ms)
    }

    pub fn click_settle(&self) -> Duration {
        Duration::from_millis(self.click_settle_ms)
    }

    pub fn teardown_settle(&self) -> Duration {
        Duration::from_millis(self.teardown_settle_ms)
    }

    pub fn page_settle(&self) -> Duration {
        Duration::from_millis(self.page_settle_ms)
    }

    pub fn submit_settle(&self) -> Duration {
        Duration::from_millis(self.submit_settle_ms)
    }

    pub fn between_flows(&self) -> Duration {
        Duration::from_millis(self.between_flows_ms)
    }

    pub fn page_load_timeout(&self) -> Duration {
        Duration::from_secs(self.page_load_timeout_secs)
    }

    /// All delays zeroed and progress output off. Budgets are left untouched.
    pub fn instant() -> Self {
        Self {
            poll_interval_ms: 0,
            readiness_poll_ms: 0,
            retry_backoff_ms: 0,
            click_settle_ms: 0,
            teardown_settle_ms: 0,
            page_settle_ms: 0,
            submit_settle_ms: 0,
            between_flows_ms: 0,
            show_progress: false,
            ..Self::default()
        }
    }
}

pub fn default_config_path() -> Result<PathBuf> {
    default_config_dir().map(|p| p.join("config.toml"))
}

pub fn default_config_dir() -> Result<PathBuf> {
    std::env::var("XDG_CONFIG_HOME")
        .ok()
        .map(PathBuf::from)
        .or_else(dirs::config_dir)
        .map(|p| p.join("postpilot"))
        .ok_or_else(|| PilotError::ConfigError("Could not determine config directory".into()))
}

impl Config {
    pub fn load() -> Result<Self> {
        let global_path = default_config_path()?;
        let global = if global_path.exists() {
            Some(std::fs::read_to_string(&global_path)?)
        } else {
            None
        };

        let project_path = PathBuf::from(".postpilot.toml");
        let project = if project_path.exists() {
            Some(std::fs::read_to_string(&project_path)?)
        } else {
            None
        };

        let mut config = Self::from_layers(global.as_deref(), project.as_deref())?;
        config.load_from_env();

        Ok(config)
    }

    /// Builds a config from the global and project file contents. Keys set in
    /// the project file override the same keys of the global file; every
    /// other key keeps its global (or default) value.
    pub fn from_layers(global: Option<&str>, project: Option<&str>) -> Result<Self> {
        let mut table = match global {
            Some(content) => toml::from_str::<toml::Table>(content)?,
            None => toml::Table::new(),
        };
        if let Some(content) = project {
            merge_tables(&mut table, toml::from_str::<toml::Table>(content)?);
        }

        Ok(toml::Value::Table(table).try_into::<Config>()?)
    }

    pub fn load_with_overrides(&self, cli_overrides: ConfigOverrides) -> Self {
        let mut config = self.clone();

        if let Some(headless) = cli_overrides.headless {
            config.browser.headless = headless;
        }
        if let Some(dir) = cli_overrides.profile_dir {
            config.browser.user_data_dir = Some(dir);
        }
        if cli_overrides.keep_profile {
            config.browser.keep_profile = true;
        }
        if let Some(max_retries) = cli_overrides.max_retries {
            config.timing.max_retries = max_retries;
        }
        if let Some(interval) = cli_overrides.poll_interval_ms {
            config.timing.poll_interval_ms = interval;
        }

        config
    }

    fn load_from_env(&mut self) {
        if let Ok(headless) = std::env::var("POSTPILOT_HEADLESS") {
            self.browser.headless = headless == "true" || headless == "1";
        }
        if let Ok(dir) = std::env::var("POSTPILOT_PROFILE_DIR") {
            self.browser.user_data_dir = Some(PathBuf::from(dir));
        }
        if let Ok(path) = std::env::var("CHROME_PATH") {
            self.browser.chrome_path = Some(PathBuf::from(path));
        }
        if let Ok(retries) = std::env::var("POSTPILOT_MAX_RETRIES")
            && let Ok(retries) = retries.parse()
        {
            self.timing.max_retries = retries;
        }
        if let Ok(interval) = std::env::var("POSTPILOT_POLL_INTERVAL_MS")
            && let Ok(interval) = interval.parse()
        {
            self.timing.poll_interval_ms = interval;
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.timing.max_retries == 0 {
            return Err(PilotError::ConfigError(
                "max_retries must be greater than 0".into(),
            ));
        }

        if self.timing.dialog_attempts == 0
            || self.timing.login_attempts == 0
            || self.timing.publish_attempts == 0
        {
            return Err(PilotError::ConfigError(
                "wait attempt budgets must be greater than 0".into(),
            ));
        }

        if url::Url::parse(&self.site.base_url).is_err() {
            return Err(PilotError::ConfigError(format!(
                "site.base_url is not a valid URL: {}",
                self.site.base_url
            )));
        }

        if let Some(ref path) = self.browser.chrome_path
            && !path.exists()
        {
            return Err(PilotError::ConfigError(format!(
                "Chrome path does not exist: {}",
                path.display()
            )));
        }

        Ok(())
    }

    pub fn summary(&self) -> String {
        format!(
            r#"Browser:
  Chrome Path: {}
  Headless: {}
  Profile Dir: {}
  Keep Profile: {}

Timing:
  Poll Interval: {}ms
  Element Timeout: {}s
  Max Retries: {}
  Retry Backoff: {}ms
  Dialog Attempts: {}
  Publish Attempts: {}

Site:
  Base URL: {}
"#,
            self.browser
                .chrome_path
                .as_ref()
                .map(|p| p.display().to_string())
                .unwrap_or_else(|| "auto-detect".into()),
            self.browser.headless,
            self.browser
                .user_data_dir
                .as_ref()
                .map(|p| p.display().to_string())
                .unwrap_or_else(|| "per-run temp".into()),
            self.browser.keep_profile,
            self.timing.poll_interval_ms,
            self.timing.element_timeout_secs,
            self.timing.max_retries,
            self.timing.retry_backoff_ms,
            self.timing.dialog_attempts,
            self.timing.publish_attempts,
            self.site.base_url,
        )
    }
}

fn merge_tables(base: &mut toml::Table, overlay: toml::Table) {
    for (key, value) in overlay {
        match value {
            toml::Value::Table(nested) => {
                if let Some(toml::Value::Table(existing)) = base.get_mut(&key) {
                    merge_tables(existing, nested);
                } else {
                    base.insert(key, toml::Value::Table(nested));
                }
            }
            value => {
                base.insert(key, value);
            }
        }
    }
}

#[derive(Debug, Default)]
pub struct ConfigOverrides {
    pub headless: Option<bool>,
    pub profile_dir: Option<PathBuf>,
    pub keep_profile: bool,
    pub max_retries: Option<u32>,
    pub poll_interval_ms: Option<u64>,
}
