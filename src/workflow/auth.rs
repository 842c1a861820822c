use super::{Action, Gate, Workflow};
use crate::config::{SiteConfig, TimingConfig};
use crate::driver::RemoteDriver;
use crate::proxy::{ElementProxy, WriteOptions};
use crate::{PilotError, Result};
use std::fmt;

const AWAIT_LOGIN: &str = "await-login";

#[derive(Clone)]
pub struct Credentials {
    pub username: String,
    pub password: String,
}

impl Credentials {
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
        }
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &"********")
            .finish()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthOutcome {
    /// The landmark was already present; nothing was submitted.
    AlreadyAuthenticated,
    Authenticated,
}

/// Steps that submit the login form and wait for the landmark.
pub fn login_workflow(site: &SiteConfig, timing: &TimingConfig, creds: &Credentials) -> Workflow {
    Workflow::new("login")
        .step(
            "write-username",
            Action::Write {
                selector: site.username_field.clone(),
                text: creds.username.clone(),
                options: WriteOptions::default(),
            },
        )
        .step(
            "write-password",
            Action::Write {
                selector: site.password_field.clone(),
                text: creds.password.clone(),
                options: WriteOptions::default(),
            },
        )
        .step("submit", Action::Click(site.submit_button.clone()))
        .step("submit-settle", Action::Pause(timing.submit_settle()))
        .step(
            AWAIT_LOGIN,
            Action::AwaitPresent(Gate::new(
                &site.home_landmark,
                timing.login_attempts,
                "Waiting until login",
                "No login confirmation",
            )),
        )
}

/// Signs in unless the session already shows the authenticated landmark.
pub async fn authenticate<D: RemoteDriver>(
    proxy: &ElementProxy<D>,
    site: &SiteConfig,
    timing: &TimingConfig,
    creds: &Credentials,
) -> Result<AuthOutcome> {
    proxy.navigate(&site.base_url).await?;
    tokio::time::sleep(timing.page_settle()).await;

    if proxy.exists(&site.home_landmark).await {
        tracing::info!(username = %creds.username, "Already authenticated");
        return Ok(AuthOutcome::AlreadyAuthenticated);
    }

    tracing::info!(username = %creds.username, "Authenticating");
    match login_workflow(site, timing, creds).run(proxy, timing).await {
        Ok(()) => {
            tracing::info!(username = %creds.username, "Authenticated");
            Ok(AuthOutcome::Authenticated)
        }
        Err(PilotError::StepFailed { step, reason }) if step == AWAIT_LOGIN => {
            Err(PilotError::AuthenticationFailed(reason))
        }
        Err(e) => Err(e),
    }
}
