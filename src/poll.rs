//! Attempt-bounded polling of a predicate against live remote state.
//!
//! The waits this crate needs are compound ("no dialog of any kind is
//! present"), so they are expressed as closures evaluated by [`wait_until`]
//! instead of single driver-side conditions.

use crate::config::TimingConfig;
use colored::Colorize;
use std::future::Future;
use std::io::Write;
use std::time::Duration;

#[derive(Debug, Clone)]
pub struct WaitSpec {
    /// `None` polls until the predicate holds.
    pub max_attempts: Option<u32>,
    pub interval: Duration,
    pub message: String,
    pub show_progress: bool,
}

impl WaitSpec {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            max_attempts: None,
            interval: Duration::from_millis(crate::timeouts::ms::POLL_INTERVAL),
            message: message.into(),
            show_progress: true,
        }
    }

    pub fn attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = Some(max_attempts);
        self
    }

    pub fn unbounded(mut self) -> Self {
        self.max_attempts = None;
        self
    }

    pub fn interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    pub fn quiet(mut self) -> Self {
        self.show_progress = false;
        self
    }

    pub fn with_timing(mut self, timing: &TimingConfig) -> Self {
        self.interval = timing.poll_interval();
        self.show_progress = timing.show_progress;
        self
    }
}

type Hook<'a> = Box<dyn FnMut() + Send + 'a>;

/// Optional callbacks around the polling loop. All default to no-ops.
#[derive(Default)]
pub struct WaitHooks<'a> {
    pub before_loop: Option<Hook<'a>>,
    pub before_attempt: Option<Hook<'a>>,
    pub after_attempt: Option<Hook<'a>>,
    pub after_loop: Option<Hook<'a>>,
}

impl<'a> WaitHooks<'a> {
    pub fn before_loop(mut self, hook: impl FnMut() + Send + 'a) -> Self {
        self.before_loop = Some(Box::new(hook));
        self
    }

    pub fn before_attempt(mut self, hook: impl FnMut() + Send + 'a) -> Self {
        self.before_attempt = Some(Box::new(hook));
        self
    }

    pub fn after_attempt(mut self, hook: impl FnMut() + Send + 'a) -> Self {
        self.after_attempt = Some(Box::new(hook));
        self
    }

    pub fn after_loop(mut self, hook: impl FnMut() + Send + 'a) -> Self {
        self.after_loop = Some(Box::new(hook));
        self
    }
}

fn fire(hook: &mut Option<Hook<'_>>) {
    if let Some(hook) = hook.as_mut() {
        hook();
    }
}

/// Overwritable stderr line showing `message` with a cycling ellipsis.
struct ProgressLine<'a> {
    message: &'a str,
    dots: usize,
    enabled: bool,
}

impl<'a> ProgressLine<'a> {
    fn new(message: &'a str, enabled: bool) -> Self {
        Self {
            message,
            dots: 1,
            enabled,
        }
    }

    fn tick(&mut self) {
        if self.enabled {
            let mut stderr = std::io::stderr();
            let _ = write!(
                stderr,
                "\r{}{}",
                self.message.dimmed(),
                ".".repeat(self.dots)
            );
            let _ = stderr.flush();
        }
        self.dots = next_dots(self.dots);
    }

    fn clear(&self) {
        if self.enabled {
            let mut stderr = std::io::stderr();
            let _ = write!(stderr, "\r{}\r", " ".repeat(self.message.len() + 3));
            let _ = stderr.flush();
        }
    }
}

fn next_dots(dots: usize) -> usize {
    if dots >= 3 { 1 } else { dots + 1 }
}

/// Polls `condition` until it returns `true` or the attempt budget runs out.
///
/// With `max_attempts = Some(m)` the predicate is evaluated at most `m` times;
/// a budget of zero never evaluates it.
/// Returns `false` on exhaustion; running out of attempts is an ordinary
/// outcome here and callers decide whether it is fatal. `after_loop` fires
/// exactly once on both paths.
pub async fn wait_until<F, Fut>(spec: &WaitSpec, hooks: &mut WaitHooks<'_>, mut condition: F) -> bool
where
    F: FnMut() -> Fut,
    Fut: Future<Output = bool>,
{
    fire(&mut hooks.before_loop);

    let mut progress = ProgressLine::new(&spec.message, spec.show_progress);
    let mut failed: u32 = 0;
    let completed = loop {
        if spec.max_attempts == Some(0) {
            break false;
        }

        fire(&mut hooks.before_attempt);
        if condition().await {
            break true;
        }

        failed += 1;
        if spec.max_attempts.is_some_and(|max| failed >= max) {
            break false;
        }

        tracing::debug!(message = %spec.message, attempt = failed, "Condition not met yet");
        progress.tick();
        fire(&mut hooks.after_attempt);
        tokio::time::sleep(spec.interval).await;
        progress.clear();
    };

    fire(&mut hooks.after_loop);

    if !completed {
        tracing::debug!(message = %spec.message, attempts = failed, "Wait budget exhausted");
    }
    completed
}

/// [`wait_until`] without hooks.
pub async fn wait_for<F, Fut>(spec: &WaitSpec, condition: F) -> bool
where
    F: FnMut() -> Fut,
    Fut: Future<Output = bool>,
{
    wait_until(spec, &mut WaitHooks::default(), condition).await
}
