//! Authentication against the site's login page.

use crate::backend::{Backend, BackendError};
use crate::screenshots::ScreenshotStore;
use crate::selectors::{
    FEED_FRAGMENT, LOGIN_URL, POST_LOGIN_FRAGMENTS, SiteSelectors, TWO_FACTOR_FRAGMENT,
};
use crate::wait::{Pacer, Pause, WaitError, wait_for_element, wait_for_url};
use easyapply_common::protocol::Element;
use std::fmt;
use thiserror::Error;
use tracing::{debug, error, info, warn};

const CLEAR_STORAGE_SCRIPT: &str = "window.localStorage.clear(); window.sessionStorage.clear();";

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("Login failed after {attempts} attempts")]
    LoginFailed { attempts: u32 },
    #[error("Cancelled")]
    Cancelled,
    #[error("Backend error: {0}")]
    Backend(#[from] BackendError),
}

impl From<WaitError> for SessionError {
    fn from(err: WaitError) -> Self {
        match err {
            WaitError::Cancelled => SessionError::Cancelled,
            WaitError::Timeout { what, .. } => {
                SessionError::Backend(BackendError::TimeoutWithContext { operation: what })
            }
            WaitError::Backend(e) => SessionError::Backend(e),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoginState {
    Unauthenticated,
    Authenticated,
    TwoFactorPending,
}

impl LoginState {
    pub fn is_logged_in(self) -> bool {
        !matches!(self, LoginState::Unauthenticated)
    }
}

#[derive(Clone)]
pub struct Credentials {
    pub username: String,
    pub password: String,
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &"***")
            .finish()
    }
}

/// Drives the login page until the session is authenticated or the attempt
/// budget is spent.
pub struct LoginManager {
    credentials: Credentials,
    pacer: Pacer,
    selectors: SiteSelectors,
    screenshots: ScreenshotStore,
    max_attempts: u32,
    state: LoginState,
    attempts: u32,
}

impl LoginManager {
    pub fn new(
        credentials: Credentials,
        pacer: Pacer,
        selectors: SiteSelectors,
        screenshots: ScreenshotStore,
        max_attempts: u32,
    ) -> Self {
        Self {
            credentials,
            pacer,
            selectors,
            screenshots,
            max_attempts: max_attempts.max(1),
            state: LoginState::Unauthenticated,
            attempts: 0,
        }
    }

    pub fn state(&self) -> LoginState {
        self.state
    }

    pub fn attempts(&self) -> u32 {
        self.attempts
    }

    pub async fn login<B: Backend + ?Sized>(&mut self, backend: &mut B) -> Result<LoginState, SessionError> {
        info!("Logging in.....");
        while self.attempts < self.max_attempts {
            self.attempts += 1;
            match self.attempt(backend).await {
                Ok(state) if state.is_logged_in() => {
                    self.state = state;
                    info!("Login successful (attempt {})", self.attempts);
                    return Ok(state);
                }
                Ok(_) => {
                    error!("Login attempt {} failed: not authenticated", self.attempts);
                }
                Err(SessionError::Cancelled) => return Err(SessionError::Cancelled),
                Err(e) => {
                    error!("Login attempt {} failed: {}", self.attempts, e);
                }
            }
            self.state = LoginState::Unauthenticated;

            if self.attempts < self.max_attempts {
                self.reset(backend).await?;
            } else {
                self.screenshots.capture(backend, "login_failure").await;
            }
        }
        error!("All {} login attempts failed", self.max_attempts);
        Err(SessionError::LoginFailed {
            attempts: self.attempts,
        })
    }

    async fn attempt<B: Backend + ?Sized>(&mut self, backend: &mut B) -> Result<LoginState, SessionError> {
        let timing = self.pacer.timing().clone();
        backend.navigate(LOGIN_URL).await?;

        match wait_for_element(
            backend,
            &self.pacer,
            &self.selectors.welcome_back_account,
            timing.account_chooser_timeout_ms,
        )
        .await
        {
            Ok(account) => {
                info!("Found 'Welcome back' screen, selecting account");
                backend.click(&account).await?;
            }
            Err(WaitError::Cancelled) => return Err(SessionError::Cancelled),
            Err(_) => debug!("No account chooser"),
        }

        let username_field = match wait_for_element(
            backend,
            &self.pacer,
            &self.selectors.login_username,
            timing.login_form_timeout_ms,
        )
        .await
        {
            Ok(field) => field,
            Err(WaitError::Cancelled) => return Err(SessionError::Cancelled),
            Err(e) => {
                let url = backend.current_url().await.unwrap_or_default();
                if url.contains(FEED_FRAGMENT) {
                    info!("Already logged in");
                    return Ok(LoginState::Authenticated);
                }
                return Err(e.into());
            }
        };
        let password_field = backend.find_element(&self.selectors.login_password).await?;

        self.type_slowly(backend, &username_field, &self.credentials.username)
            .await?;
        self.pacer.human_delay().await?;
        self.type_slowly(backend, &password_field, &self.credentials.password)
            .await?;
        self.pacer.human_delay().await?;

        let sign_in = backend.find_element(&self.selectors.login_button).await?;
        backend.click(&sign_in).await?;

        match wait_for_url(
            backend,
            &self.pacer,
            &[TWO_FACTOR_FRAGMENT],
            timing.two_factor_detect_timeout_ms,
        )
        .await
        {
            Ok(_) => {
                self.state = LoginState::TwoFactorPending;
                warn!("Two-factor verification required; complete it in the browser");
                self.pacer.pause(Pause::TwoFactor).await?;
            }
            Err(WaitError::Cancelled) => return Err(SessionError::Cancelled),
            Err(_) => {}
        }

        let url = wait_for_url(
            backend,
            &self.pacer,
            POST_LOGIN_FRAGMENTS,
            timing.login_verify_timeout_ms,
        )
        .await?;
        if url.contains(TWO_FACTOR_FRAGMENT) {
            warn!("Still on the verification page: {}", url);
            return Ok(LoginState::TwoFactorPending);
        }
        Ok(LoginState::Authenticated)
    }

    async fn type_slowly<B: Backend + ?Sized>(
        &self,
        backend: &mut B,
        field: &Element,
        text: &str,
    ) -> Result<(), SessionError> {
        backend.clear(field).await?;
        let mut buf = [0u8; 4];
        for ch in text.chars() {
            backend.type_text(field, ch.encode_utf8(&mut buf)).await?;
            self.pacer.keystroke().await?;
        }
        Ok(())
    }

    /// Screenshot, drop cookies and storage, back off.
    async fn reset<B: Backend + ?Sized>(&self, backend: &mut B) -> Result<(), SessionError> {
        self.screenshots
            .capture(backend, &format!("login_failure_{}", self.attempts))
            .await;
        if let Err(e) = backend.delete_all_cookies().await {
            debug!("Could not clear cookies: {}", e);
        }
        if let Err(e) = backend.execute_script(CLEAR_STORAGE_SCRIPT).await {
            debug!("Could not clear storage: {}", e);
        }
        info!("Retrying login in {:?}", self.pacer.duration_of(Pause::LoginBackoff));
        self.pacer.pause(Pause::LoginBackoff).await?;
        Ok(())
    }
}
