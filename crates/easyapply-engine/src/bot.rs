//! Top-level run: login, then every search combination in turn.

use crate::answers::{AnswerBook, AnswerError};
use crate::apply::{ApplyError, JobApplier};
use crate::backend::{Backend, BackendError};
use crate::blacklist::Blacklist;
use crate::config::loader::{ConfigError, validate};
use crate::config::schema::{BotConfig, experience_level_name};
use crate::form::FormDriver;
use crate::records::{ApplicationLog, RecordError};
use crate::screenshots::ScreenshotStore;
use crate::search::{JobSearch, SearchFilters, search_combos};
use crate::selectors::SiteSelectors;
use crate::session::{Credentials, LoginManager, SessionError};
use crate::wait::Pacer;
use easyapply_common::protocol::WindowRect;
use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// Off-screen placement used once the session is authenticated.
const HIDDEN_WINDOW: WindowRect = WindowRect {
    x: 2000,
    y: 2000,
    width: 1,
    height: 1,
};

#[derive(Debug, Error)]
pub enum BotError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("Invalid blacklist pattern: {0}")]
    Blacklist(#[from] regex::Error),
    #[error(transparent)]
    Session(#[from] SessionError),
    #[error(transparent)]
    Answers(#[from] AnswerError),
    #[error(transparent)]
    Record(#[from] RecordError),
    #[error("Backend error: {0}")]
    Backend(#[from] BackendError),
    #[error("Cancelled")]
    Cancelled,
}

impl From<ApplyError> for BotError {
    fn from(err: ApplyError) -> Self {
        match err {
            ApplyError::Cancelled => BotError::Cancelled,
            ApplyError::Record(e) => BotError::Record(e),
            ApplyError::Answers(e) => BotError::Answers(e),
        }
    }
}

impl BotError {
    pub fn is_cancelled(&self) -> bool {
        matches!(
            self,
            BotError::Cancelled | BotError::Session(SessionError::Cancelled)
        )
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunSummary {
    pub combos: usize,
    pub processed: u32,
    pub submitted: u32,
}

pub struct EasyApplyBot<B: Backend> {
    backend: B,
    config: BotConfig,
    pacer: Pacer,
    selectors: SiteSelectors,
    screenshots: ScreenshotStore,
}

impl<B: Backend> EasyApplyBot<B> {
    pub fn new(backend: B, config: BotConfig, cancel: CancellationToken) -> Result<Self, BotError> {
        validate(&config)?;
        let pacer = Pacer::new(config.timing.clone(), cancel);
        let screenshots = ScreenshotStore::new(config.screenshot_dir.clone());
        Ok(Self {
            backend,
            config,
            pacer,
            selectors: SiteSelectors::default(),
            screenshots,
        })
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    pub fn backend_mut(&mut self) -> &mut B {
        &mut self.backend
    }

    pub fn into_backend(self) -> B {
        self.backend
    }

    /// Launch the browser, run every search, close the browser.
    ///
    /// The browser is closed on every exit path, including a failed login.
    pub async fn run(&mut self) -> Result<RunSummary, BotError> {
        info!("current directory is : {}", std::env::current_dir().unwrap_or_default().display());
        info!("Please wait while we prepare the bot for you");
        log_experience_levels(&self.config.experience_level);

        self.backend.launch().await?;
        let result = self.run_session().await;
        if let Err(e) = self.backend.close().await {
            warn!("Error closing browser: {}", e);
        }
        match &result {
            Ok(summary) => info!(
                "Run finished: {} combinations, {} jobs processed, {} submitted",
                summary.combos, summary.processed, summary.submitted
            ),
            Err(e) if e.is_cancelled() => info!("Run cancelled"),
            Err(e) => error!("Run failed: {}", e),
        }
        result
    }

    async fn run_session(&mut self) -> Result<RunSummary, BotError> {
        let blacklist = Blacklist::from_config(&self.config)?;
        debug!("{} blacklist patterns", blacklist.len());

        let mut login = LoginManager::new(
            Credentials {
                username: self.config.username().to_string(),
                password: self.config.password().to_string(),
            },
            self.pacer.clone(),
            self.selectors.clone(),
            self.screenshots.clone(),
            self.config.limits.login_attempts,
        );
        login.login(&mut self.backend).await?;
        self.hide_window().await;

        let log = ApplicationLog::new(self.config.output_path());
        let mut seen = log.recent_job_ids();

        let answers = AnswerBook::load(
            &self.config.qa_filename,
            self.config.salary.clone(),
            self.config.rate.clone(),
        )?;
        let form = FormDriver::new(
            self.pacer.clone(),
            self.selectors.clone(),
            self.config.limits.clone(),
            self.config.phone_number(),
            self.config.uploads.all_resumes(),
            self.config.uploads.cover_letter.clone(),
            answers,
            self.screenshots.clone(),
        );
        let mut applier = JobApplier::new(
            self.pacer.clone(),
            self.selectors.clone(),
            blacklist.clone(),
            form,
            log,
        );
        let filters = SearchFilters::from_config(&self.config);
        let search = JobSearch::new(
            self.pacer.clone(),
            self.selectors.clone(),
            blacklist,
            filters.clone(),
            &self.config,
        );

        let combos = search_combos(
            &self.config.positions,
            &self.config.locations,
            self.config.limits.max_combos,
            &mut rand::thread_rng(),
        );
        let mut summary = RunSummary::default();
        for (position, location) in combos {
            info!(
                "Applying to {}: {} (Posted in last {} days, within {} miles)",
                position, location, filters.days_old, filters.distance
            );
            let result = search
                .run(&mut self.backend, &mut applier, &position, &location, &mut seen)
                .await?;
            summary.combos += 1;
            summary.processed += result.processed;
            summary.submitted += result.submitted;
        }
        Ok(summary)
    }

    async fn hide_window(&mut self) {
        if !self.config.browser.hide_window || self.config.browser.headless {
            return;
        }
        match self.backend.set_window_rect(HIDDEN_WINDOW).await {
            Ok(()) => debug!("Browser window moved off-screen"),
            Err(BackendError::NotSupported(_)) => {}
            Err(e) => warn!("Could not hide browser window: {}", e),
        }
    }
}

fn log_experience_levels(codes: &[u8]) {
    if codes.is_empty() {
        info!("Applying for all experience levels");
        return;
    }
    let names: Vec<String> = codes
        .iter()
        .map(|c| {
            experience_level_name(*c)
                .map(str::to_string)
                .unwrap_or_else(|| format!("unknown level {}", c))
        })
        .collect();
    info!("Applying for experience level roles: {}", names.join(", "));
}

/// Search URLs a run would start from, one per (position, location) pair in
/// configuration order. Used by dry runs.
pub fn plan(config: &BotConfig) -> Vec<String> {
    let filters = SearchFilters::from_config(config);
    let mut urls = Vec::new();
    for position in &config.positions {
        for location in &config.locations {
            match filters.url(position, location, 0) {
                Ok(url) => urls.push(url.to_string()),
                Err(e) => warn!("Could not build search URL for {}: {}: {}", position, location, e),
            }
        }
    }
    urls.truncate(config.limits.max_combos);
    urls
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plan_lists_every_pair() {
        let config = BotConfig {
            positions: vec!["Developer".into(), "SRE".into()],
            locations: vec!["Remote".into()],
            ..Default::default()
        };
        let urls = plan(&config);
        assert_eq!(urls.len(), 2);
        assert!(urls[0].contains("keywords=Developer"));
        assert!(urls[1].contains("keywords=SRE"));
        assert!(urls.iter().all(|u| u.contains("f_AL=true")));
    }

    #[test]
    fn test_cancelled_errors() {
        assert!(BotError::from(ApplyError::Cancelled).is_cancelled());
        assert!(BotError::Session(SessionError::Cancelled).is_cancelled());
        assert!(!BotError::Session(SessionError::LoginFailed { attempts: 3 }).is_cancelled());
    }
}
