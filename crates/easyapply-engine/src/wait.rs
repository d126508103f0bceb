//! Waiting primitives.
//!
//! Page updates are asynchronous and the site offers no events we can hook,
//! so everything is polling. `Poller` bounds a polling loop by a deadline and
//! a cancellation token; `Pacer` owns every fixed pause so configuration (and
//! tests) control all timing in one place.

use crate::backend::{Backend, BackendError};
use crate::config::schema::TimingConfig;
use easyapply_common::protocol::{Element, Locator};
use rand::Rng;
use std::future::Future;
use std::pin::Pin;
use std::time::Duration;
use thiserror::Error;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

#[derive(Debug, Error)]
pub enum WaitError {
    #[error("Timed out after {after:?} waiting for {what}")]
    Timeout { what: String, after: Duration },
    #[error("Cancelled")]
    Cancelled,
    #[error("Backend error: {0}")]
    Backend(#[from] BackendError),
}

impl WaitError {
    pub fn is_timeout(&self) -> bool {
        matches!(self, WaitError::Timeout { .. })
    }
}

/// Deadline-bounded polling loop.
///
/// ```ignore
/// let mut poll = pacer.poller("login form", timing.login_form_timeout_ms);
/// loop {
///     if ready(backend).await { break; }
///     poll.tick().await?;
/// }
/// ```
pub struct Poller {
    what: String,
    started: Instant,
    timeout: Duration,
    interval: Duration,
    cancel: CancellationToken,
}

impl Poller {
    pub fn new(
        what: impl Into<String>,
        timeout: Duration,
        interval: Duration,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            what: what.into(),
            started: Instant::now(),
            timeout,
            interval,
            cancel,
        }
    }

    /// Sleep one interval, or fail if the deadline passed or the run was cancelled.
    pub async fn tick(&mut self) -> Result<(), WaitError> {
        if self.cancel.is_cancelled() {
            return Err(WaitError::Cancelled);
        }
        if self.started.elapsed() >= self.timeout {
            return Err(WaitError::Timeout {
                what: self.what.clone(),
                after: self.timeout,
            });
        }
        tokio::select! {
            _ = self.cancel.cancelled() => Err(WaitError::Cancelled),
            _ = tokio::time::sleep(self.interval) => Ok(()),
        }
    }
}

/// Named pauses, all driven by `TimingConfig`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Pause {
    TwoFactor,
    LoginBackoff,
    JobPageSettle,
    BeforeApply,
    Step,
    Upload,
    QuestionRound,
    ManualAnswer,
    Refresh,
}

#[derive(Debug, Clone)]
pub struct Pacer {
    timing: TimingConfig,
    cancel: CancellationToken,
}

impl Pacer {
    pub fn new(timing: TimingConfig, cancel: CancellationToken) -> Self {
        Self { timing, cancel }
    }

    pub fn timing(&self) -> &TimingConfig {
        &self.timing
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    pub fn poller(&self, what: impl Into<String>, timeout_ms: u64) -> Poller {
        Poller::new(
            what,
            Duration::from_millis(timeout_ms),
            Duration::from_millis(self.timing.poll_interval_ms),
            self.cancel.clone(),
        )
    }

    pub fn duration_of(&self, pause: Pause) -> Duration {
        let t = &self.timing;
        let ms = match pause {
            Pause::TwoFactor => t.two_factor_pause_ms,
            Pause::LoginBackoff => t.login_backoff_ms,
            Pause::JobPageSettle => t.job_page_settle_ms,
            Pause::BeforeApply => t.before_apply_ms,
            Pause::Step => t.step_pause_ms,
            Pause::Upload => t.upload_pause_ms,
            Pause::QuestionRound => t.question_round_pause_ms,
            Pause::ManualAnswer => t.manual_answer_pause_ms,
            Pause::Refresh => t.refresh_pause_ms,
        };
        Duration::from_millis(ms)
    }

    pub async fn pause(&self, pause: Pause) -> Result<(), WaitError> {
        self.sleep(self.duration_of(pause)).await
    }

    /// Random delay between the configured human-delay bounds.
    pub async fn human_delay(&self) -> Result<(), WaitError> {
        let d = random_between(self.timing.human_delay_min_ms, self.timing.human_delay_max_ms);
        self.sleep(d).await
    }

    /// Delay between two keystrokes.
    pub async fn keystroke(&self) -> Result<(), WaitError> {
        let d = random_between(
            self.timing.typing_delay_min_ms,
            self.timing.typing_delay_max_ms,
        );
        self.sleep(d).await
    }

    pub async fn sleep(&self, duration: Duration) -> Result<(), WaitError> {
        if self.cancel.is_cancelled() {
            return Err(WaitError::Cancelled);
        }
        if duration.is_zero() {
            return Ok(());
        }
        tokio::select! {
            _ = self.cancel.cancelled() => Err(WaitError::Cancelled),
            _ = tokio::time::sleep(duration) => Ok(()),
        }
    }
}

fn random_between(min_ms: u64, max_ms: u64) -> Duration {
    if max_ms <= min_ms {
        return Duration::from_millis(min_ms);
    }
    Duration::from_millis(rand::thread_rng().gen_range(min_ms..=max_ms))
}

// ============================================================
// Backend waits
// ============================================================

/// Future returned by a `wait_until` check, borrowing the backend.
pub type CheckFuture<'a, T> = Pin<Box<dyn Future<Output = Option<T>> + Send + 'a>>;

/// Poll `check` until it yields `Some`, the timeout elapses or the run is
/// cancelled.
///
/// The check gets the backend for the duration of one poll; captured data
/// must be owned.
pub async fn wait_until<B, T, F>(
    backend: &mut B,
    pacer: &Pacer,
    what: impl Into<String>,
    timeout_ms: u64,
    mut check: F,
) -> Result<T, WaitError>
where
    B: Backend + ?Sized,
    F: for<'a> FnMut(&'a mut B) -> CheckFuture<'a, T>,
{
    let mut poll = pacer.poller(what, timeout_ms);
    loop {
        if let Some(value) = check(&mut *backend).await {
            return Ok(value);
        }
        poll.tick().await?;
    }
}

/// Wait for the first element matching `locator`.
pub async fn wait_for_element<B: Backend + ?Sized>(
    backend: &mut B,
    pacer: &Pacer,
    locator: &Locator,
    timeout_ms: u64,
) -> Result<Element, WaitError> {
    let mut found = wait_for_elements(backend, pacer, locator, timeout_ms).await?;
    Ok(found.swap_remove(0))
}

/// Wait until any element matches `locator`, then return all matches.
pub async fn wait_for_elements<B: Backend + ?Sized>(
    backend: &mut B,
    pacer: &Pacer,
    locator: &Locator,
    timeout_ms: u64,
) -> Result<Vec<Element>, WaitError> {
    let target = locator.clone();
    wait_until(backend, pacer, locator.to_string(), timeout_ms, |b| {
        let target = target.clone();
        Box::pin(async move {
            b.find_elements(&target)
                .await
                .ok()
                .filter(|found| !found.is_empty())
        })
    })
    .await
}

/// Wait until the current URL contains one of `fragments`; returns the URL.
pub async fn wait_for_url<B: Backend + ?Sized>(
    backend: &mut B,
    pacer: &Pacer,
    fragments: &[&str],
    timeout_ms: u64,
) -> Result<String, WaitError> {
    let wanted: Vec<String> = fragments.iter().map(|f| f.to_string()).collect();
    let what = format!("url containing {:?}", fragments);
    wait_until(backend, pacer, what, timeout_ms, |b| {
        let wanted = wanted.clone();
        Box::pin(async move {
            b.current_url()
                .await
                .ok()
                .filter(|url| wanted.iter().any(|f| url.contains(f.as_str())))
        })
    })
    .await
}

/// Wait for `document.readyState == "complete"`.
///
/// Backends without script support are treated as always loaded.
pub async fn wait_for_ready_state<B: Backend + ?Sized>(
    backend: &mut B,
    pacer: &Pacer,
    timeout_ms: u64,
) -> Result<(), WaitError> {
    let mut poll = pacer.poller("document ready", timeout_ms);
    loop {
        match backend.execute_script("return document.readyState").await {
            Ok(state) if state.as_str() == Some("complete") => return Ok(()),
            Err(BackendError::NotSupported(_)) => return Ok(()),
            _ => {}
        }
        poll.tick().await?;
    }
}
