//! Acquisition and teardown of one remote browser session.

use crate::config::{Config, TimingConfig};
use crate::driver::{DriverLauncher, LaunchOptions, RemoteDriver};
use crate::proxy::ElementProxy;
use crate::{PilotError, Result};
use chrono::{DateTime, Utc};
use std::path::{Path, PathBuf};
use tokio::task::JoinHandle;

const PROFILE_ROOT: &str = "postpilot-profiles";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Uninitialized,
    Active,
    Terminated,
}

/// Owns the driver of one session and the profile directory it writes to.
///
/// `teardown` must be awaited explicitly; dropping an active session only
/// logs a warning because the browser cannot be quit from `Drop`.
pub struct SessionLifecycle<D: RemoteDriver> {
    state: SessionState,
    proxy: Option<ElementProxy<D>>,
    profile_dir: Option<PathBuf>,
    created_at: Option<DateTime<Utc>>,
    remove_profile: bool,
    launch: LaunchSettings,
    timing: TimingConfig,
    cleanup: Option<JoinHandle<()>>,
}

struct LaunchSettings {
    headless: bool,
    profile_override: Option<PathBuf>,
    keep_profile: bool,
    chrome_path: Option<PathBuf>,
    window_size: (u32, u32),
}

impl<D: RemoteDriver> SessionLifecycle<D> {
    pub fn new(config: &Config) -> Self {
        Self {
            state: SessionState::Uninitialized,
            proxy: None,
            profile_dir: None,
            created_at: None,
            remove_profile: false,
            launch: LaunchSettings {
                headless: config.browser.headless,
                profile_override: config.browser.user_data_dir.clone(),
                keep_profile: config.browser.keep_profile,
                chrome_path: config.browser.chrome_path.clone(),
                window_size: (config.browser.window_width, config.browser.window_height),
            },
            timing: config.timing.clone(),
            cleanup: None,
        }
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn profile_dir(&self) -> Option<&Path> {
        self.profile_dir.as_deref()
    }

    pub fn created_at(&self) -> Option<DateTime<Utc>> {
        self.created_at
    }

    /// Launches the driver and moves the session to `Active`.
    pub async fn acquire<L>(&mut self, launcher: &L) -> Result<&ElementProxy<D>>
    where
        L: DriverLauncher<Driver = D>,
    {
        if self.state != SessionState::Uninitialized {
            return Err(PilotError::Session(format!(
                "session cannot be acquired from state {:?}",
                self.state
            )));
        }

        let (profile_dir, ephemeral) = match &self.launch.profile_override {
            Some(dir) => (dir.clone(), false),
            None => (
                std::env::temp_dir()
                    .join(PROFILE_ROOT)
                    .join(uuid::Uuid::new_v4().to_string()),
                true,
            ),
        };
        tokio::fs::create_dir_all(&profile_dir).await?;

        let options = LaunchOptions {
            headless: self.launch.headless,
            user_data_dir: profile_dir.clone(),
            chrome_path: self.launch.chrome_path.clone(),
            window_size: self.launch.window_size,
            page_load_timeout: self.timing.page_load_timeout(),
        };

        let driver = match launcher.launch(&options).await {
            Ok(driver) => driver,
            Err(e) => {
                if ephemeral && !self.launch.keep_profile {
                    let _ = tokio::fs::remove_dir_all(&profile_dir).await;
                }
                return Err(e);
            }
        };

        let created_at = Utc::now();
        tracing::info!(
            profile = %profile_dir.display(),
            created_at = %created_at.to_rfc3339(),
            "Session acquired"
        );

        self.remove_profile = ephemeral && !self.launch.keep_profile;
        self.profile_dir = Some(profile_dir);
        self.created_at = Some(created_at);
        self.state = SessionState::Active;

        let proxy = self.proxy.insert(ElementProxy::new(driver, &self.timing));
        Ok(&*proxy)
    }

    pub fn proxy(&self) -> Result<&ElementProxy<D>> {
        match (&self.state, &self.proxy) {
            (SessionState::Active, Some(proxy)) => Ok(proxy),
            (state, _) => Err(PilotError::Session(format!(
                "no active session (state: {:?})",
                state
            ))),
        }
    }

    /// Quits the driver and schedules profile removal. A no-op unless the
    /// session is `Active`.
    pub async fn teardown(&mut self) {
        if self.state != SessionState::Active {
            tracing::debug!(state = ?self.state, "Teardown skipped");
            return;
        }
        self.state = SessionState::Terminated;

        if let Some(proxy) = self.proxy.take()
            && let Err(e) = proxy.driver().quit().await
        {
            tracing::warn!("Driver did not quit cleanly: {}", e);
        }

        tokio::time::sleep(self.timing.teardown_settle()).await;

        if let Some(dir) = self.profile_dir.clone() {
            if self.remove_profile {
                self.cleanup = Some(spawn_profile_cleanup(dir));
            } else {
                tracing::info!(profile = %dir.display(), "Keeping profile directory");
            }
        }

        tracing::info!("Session terminated");
    }

    pub fn take_cleanup(&mut self) -> Option<JoinHandle<()>> {
        self.cleanup.take()
    }

    /// Awaits the detached profile removal, if any was scheduled.
    pub async fn wait_for_cleanup(&mut self) {
        if let Some(handle) = self.cleanup.take()
            && let Err(e) = handle.await
        {
            tracing::warn!("Profile cleanup task failed: {}", e);
        }
    }
}

impl<D: RemoteDriver> Drop for SessionLifecycle<D> {
    fn drop(&mut self) {
        if self.state == SessionState::Active {
            tracing::warn!(
                profile = ?self.profile_dir,
                "Session dropped while active; browser was not quit"
            );
        }
    }
}

fn spawn_profile_cleanup(dir: PathBuf) -> JoinHandle<()> {
    tokio::task::spawn_blocking(move || match std::fs::remove_dir_all(&dir) {
        Ok(()) => tracing::debug!(profile = %dir.display(), "Profile directory removed"),
        Err(e) => tracing::warn!(
            profile = %dir.display(),
            "Could not remove profile directory: {}",
            e
        ),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::driver::fake::{FakeDriver, FakeLauncher};

    fn config() -> Config {
        Config {
            timing: TimingConfig::instant(),
            ..Config::default()
        }
    }

    #[tokio::test]
    async fn test_acquire_and_teardown_removes_ephemeral_profile() {
        let launcher = FakeLauncher::new(FakeDriver::new());
        let mut session = SessionLifecycle::new(&config());
        assert_eq!(session.state(), SessionState::Uninitialized);

        session.acquire(&launcher).await.unwrap();
        assert_eq!(session.state(), SessionState::Active);
        assert!(session.created_at().is_some());

        let dir = session.profile_dir().unwrap().to_path_buf();
        assert!(dir.exists());
        assert!(dir.starts_with(std::env::temp_dir().join(PROFILE_ROOT)));

        session.teardown().await;
        session.wait_for_cleanup().await;

        assert_eq!(session.state(), SessionState::Terminated);
        assert!(!dir.exists());
        assert_eq!(launcher.driver.count_calls("quit"), 1);
    }

    #[tokio::test]
    async fn test_profiles_are_unique_per_session() {
        let launcher = FakeLauncher::new(FakeDriver::new());
        let mut first = SessionLifecycle::new(&config());
        let mut second = SessionLifecycle::new(&config());
        first.acquire(&launcher).await.unwrap();
        second.acquire(&launcher).await.unwrap();

        assert_ne!(first.profile_dir(), second.profile_dir());

        first.teardown().await;
        second.teardown().await;
        first.wait_for_cleanup().await;
        second.wait_for_cleanup().await;
    }

    #[tokio::test]
    async fn test_second_teardown_is_noop() {
        let launcher = FakeLauncher::new(FakeDriver::new());
        let mut session = SessionLifecycle::new(&config());
        session.acquire(&launcher).await.unwrap();

        session.teardown().await;
        session.teardown().await;
        session.wait_for_cleanup().await;

        assert_eq!(launcher.driver.count_calls("quit"), 1);
        assert!(session.proxy().is_err());
    }

    #[tokio::test]
    async fn test_teardown_before_acquire_is_noop() {
        let mut session: SessionLifecycle<FakeDriver> = SessionLifecycle::new(&config());
        session.teardown().await;
        assert_eq!(session.state(), SessionState::Uninitialized);
    }

    #[tokio::test]
    async fn test_keep_profile_leaves_directory() {
        let launcher = FakeLauncher::new(FakeDriver::new());
        let mut config = config();
        config.browser.keep_profile = true;

        let mut session = SessionLifecycle::new(&config);
        session.acquire(&launcher).await.unwrap();
        let dir = session.profile_dir().unwrap().to_path_buf();

        session.teardown().await;
        assert!(session.take_cleanup().is_none());
        assert!(dir.exists());

        std::fs::remove_dir_all(&dir).unwrap();
    }

    #[tokio::test]
    async fn test_profile_override_is_used_and_kept() {
        let tmp = tempfile::tempdir().unwrap();
        let profile = tmp.path().join("profile");
        let mut config = config();
        config.browser.user_data_dir = Some(profile.clone());

        let launcher = FakeLauncher::new(FakeDriver::new());
        let mut session = SessionLifecycle::new(&config);
        session.acquire(&launcher).await.unwrap();
        assert_eq!(session.profile_dir(), Some(profile.as_path()));

        session.teardown().await;
        session.wait_for_cleanup().await;
        assert!(profile.exists());
    }

    #[tokio::test]
    async fn test_launch_failure_keeps_uninitialized() {
        let launcher = FakeLauncher {
            fail_with: Some("no chrome".into()),
            ..FakeLauncher::default()
        };
        let mut session = SessionLifecycle::new(&config());

        let result = session.acquire(&launcher).await;
        assert!(matches!(result, Err(PilotError::LaunchFailed(_))));
        assert_eq!(session.state(), SessionState::Uninitialized);
        assert!(session.proxy().is_err());
    }

    #[tokio::test]
    async fn test_acquire_twice_is_rejected() {
        let launcher = FakeLauncher::new(FakeDriver::new());
        let mut session = SessionLifecycle::new(&config());
        session.acquire(&launcher).await.unwrap();

        let again = session.acquire(&launcher).await;
        assert!(matches!(again, Err(PilotError::Session(_))));
        assert_eq!(launcher.launch_count(), 1);

        session.teardown().await;
        session.wait_for_cleanup().await;
    }

    #[tokio::test]
    async fn test_quit_failure_still_terminates() {
        let driver = FakeDriver::new();
        driver.fail_next("quit", PilotError::Driver("already gone".into()));
        let launcher = FakeLauncher::new(driver);

        let mut session = SessionLifecycle::new(&config());
        session.acquire(&launcher).await.unwrap();
        let dir = session.profile_dir().unwrap().to_path_buf();

        session.teardown().await;
        session.wait_for_cleanup().await;
        assert_eq!(session.state(), SessionState::Terminated);
        assert!(!dir.exists());
    }
}
