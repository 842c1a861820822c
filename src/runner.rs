//! Entry workflows: validate inputs, drive one session, always tear it down.

use crate::config::Config;
use crate::driver::DriverLauncher;
use crate::outcome::Outcome;
use crate::session::SessionLifecycle;
use crate::transfer::{MediaSource, is_remote};
use crate::workflow::{self, AuthOutcome, Credentials};
use crate::{PilotError, Result};
use std::path::{Path, PathBuf};
use std::time::Instant;

/// Raw inputs of the `post` command; any of them may be missing.
#[derive(Debug, Clone, Default)]
pub struct PostRequest {
    pub username: Option<String>,
    pub password: Option<String>,
    pub media: Option<String>,
    pub caption: Option<String>,
}

#[derive(Debug, Clone, Default)]
pub struct LoginRequest {
    pub username: Option<String>,
    pub password: Option<String>,
}

#[derive(Debug, Clone)]
pub struct ValidPost {
    pub credentials: Credentials,
    pub media: String,
    pub caption: String,
}

fn present(value: &Option<String>) -> Option<&str> {
    value.as_deref().filter(|v| !v.trim().is_empty())
}

fn check_required(fields: &[(&str, &Option<String>)]) -> Result<()> {
    let missing: Vec<String> = fields
        .iter()
        .filter(|(_, value)| present(value).is_none())
        .map(|(name, _)| name.to_string())
        .collect();

    if missing.is_empty() {
        Ok(())
    } else {
        Err(PilotError::MissingParameters(missing))
    }
}

impl PostRequest {
    pub fn validate(&self) -> Result<ValidPost> {
        check_required(&[
            ("username", &self.username),
            ("password", &self.password),
            ("media", &self.media),
        ])?;

        Ok(ValidPost {
            credentials: Credentials::new(
                self.username.clone().unwrap_or_default(),
                self.password.clone().unwrap_or_default(),
            ),
            media: self.media.clone().unwrap_or_default(),
            caption: self.caption.clone().unwrap_or_default(),
        })
    }
}

impl LoginRequest {
    pub fn validate(&self) -> Result<Credentials> {
        check_required(&[("username", &self.username), ("password", &self.password)])?;
        Ok(Credentials::new(
            self.username.clone().unwrap_or_default(),
            self.password.clone().unwrap_or_default(),
        ))
    }
}

pub struct Runner<'a, L, M> {
    config: &'a Config,
    launcher: &'a L,
    media_source: &'a M,
}

impl<'a, L, M> Runner<'a, L, M>
where
    L: DriverLauncher,
    M: MediaSource,
{
    pub fn new(config: &'a Config, launcher: &'a L, media_source: &'a M) -> Self {
        Self {
            config,
            launcher,
            media_source,
        }
    }

    /// Signs in and publishes one media file.
    pub async fn post(&self, request: PostRequest) -> Outcome {
        let started = Instant::now();

        let valid = match request.validate() {
            Ok(valid) => valid,
            Err(e) => {
                return Outcome::from_error(&e)
                    .with_data("execution_time_seconds", elapsed(started))
                    .with_data("username", present(&request.username))
                    .with_data("media_path", present(&request.media));
            }
        };

        let username = valid.credentials.username.clone();
        let fail = |e: PilotError, media: &str| {
            Outcome::from_error(&e)
                .headline("Posting failed")
                .with_data("execution_time_seconds", elapsed(started))
                .with_data("username", username.as_str())
                .with_data("media_path", media)
        };

        let remote = is_remote(&valid.media);
        let media = match self.resolve_media(&valid.media).await {
            Ok(path) => path,
            Err(e) => return fail(e, &valid.media),
        };
        let media_display = media.display().to_string();

        let result = match workflow::validate_media(&media) {
            Ok(()) => {
                let mut session = SessionLifecycle::new(self.config);
                let result = self.publish(&mut session, &valid, &media).await;
                session.teardown().await;
                session.wait_for_cleanup().await;
                result
            }
            Err(e) => Err(e),
        };

        if remote {
            self.media_source.discard(&media).await;
        }

        match result {
            Ok(()) => Outcome::success("Post published successfully")
                .with_data("username", username.as_str())
                .with_data("media_path", media_display)
                .with_data("caption_length", valid.caption.chars().count())
                .with_data("execution_time_seconds", elapsed(started)),
            Err(e) => fail(e, &media_display),
        }
    }

    /// Signs in only; reports whether credentials were submitted.
    pub async fn login(&self, request: LoginRequest) -> Outcome {
        let started = Instant::now();

        let credentials = match request.validate() {
            Ok(credentials) => credentials,
            Err(e) => {
                return Outcome::from_error(&e)
                    .with_data("execution_time_seconds", elapsed(started))
                    .with_data("username", present(&request.username));
            }
        };

        let mut session = SessionLifecycle::new(self.config);
        let result = self.sign_in(&mut session, &credentials).await;
        session.teardown().await;
        session.wait_for_cleanup().await;

        match result {
            Ok(state) => {
                let message = match state {
                    AuthOutcome::AlreadyAuthenticated => "Session already authenticated",
                    AuthOutcome::Authenticated => "Login succeeded",
                };
                Outcome::success(message)
                    .with_data("username", credentials.username.as_str())
                    .with_data(
                        "already_authenticated",
                        state == AuthOutcome::AlreadyAuthenticated,
                    )
                    .with_data("execution_time_seconds", elapsed(started))
            }
            Err(e) => Outcome::from_error(&e)
                .headline("Login attempt failed")
                .with_data("username", credentials.username.as_str())
                .with_data("execution_time_seconds", elapsed(started)),
        }
    }

    async fn resolve_media(&self, media: &str) -> Result<PathBuf> {
        if is_remote(media) {
            self.media_source.fetch(media).await
        } else {
            Ok(PathBuf::from(media))
        }
    }

    async fn sign_in(
        &self,
        session: &mut SessionLifecycle<L::Driver>,
        credentials: &Credentials,
    ) -> Result<AuthOutcome> {
        let proxy = session.acquire(self.launcher).await?;
        workflow::authenticate(proxy, &self.config.site, &self.config.timing, credentials).await
    }

    async fn publish(
        &self,
        session: &mut SessionLifecycle<L::Driver>,
        valid: &ValidPost,
        media: &Path,
    ) -> Result<()> {
        let site = &self.config.site;
        let timing = &self.config.timing;

        let proxy = session.acquire(self.launcher).await?;
        workflow::authenticate(proxy, site, timing, &valid.credentials).await?;
        tokio::time::sleep(timing.between_flows()).await;
        workflow::post_content(proxy, site, timing, media, &valid.caption).await
    }
}

fn elapsed(started: Instant) -> f64 {
    started.elapsed().as_secs_f64()
}

/// Media source for runs that only accept local files.
pub struct LocalOnly;

#[async_trait::async_trait]
impl MediaSource for LocalOnly {
    async fn fetch(&self, location: &str) -> Result<PathBuf> {
        Err(PilotError::Transfer {
            message: format!("Remote media is not supported here: {}", location),
            source: None,
        })
    }
}
