//! One posting, from job page to application record.

use crate::answers::AnswerError;
use crate::backend::{Backend, source_or_empty};
use crate::blacklist::{Blacklist, UNKNOWN_TITLE};
use crate::form::{FormDriver, FormError, FormOutcome};
use crate::records::{ApplicationLog, ApplicationRecord, RecordError, parse_browser_title};
use crate::selectors::{ALREADY_APPLIED_TEXT, EASY_APPLY_TEXT, SiteSelectors, job_url};
use crate::wait::{Pacer, Pause, WaitError, wait_for_element, wait_for_ready_state};
use easyapply_common::protocol::Element;
use std::fmt;
use thiserror::Error;
use tracing::{error, info, warn};

#[derive(Debug, Error)]
pub enum ApplyError {
    #[error("Cancelled")]
    Cancelled,
    #[error("Failed to record application: {0}")]
    Record(#[from] RecordError),
    #[error("Answer table error: {0}")]
    Answers(#[from] AnswerError),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ApplyStatus {
    Blacklisted,
    AlreadyApplied,
    NoEasyApply,
    Submitted,
    NotSubmitted { reason: String },
}

impl fmt::Display for ApplyStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ApplyStatus::Blacklisted => write!(f, "* Contains blacklisted keyword"),
            ApplyStatus::AlreadyApplied => write!(f, "* Already Applied"),
            ApplyStatus::NoEasyApply => write!(f, "* Doesn't have Easy Apply Button"),
            ApplyStatus::Submitted => write!(f, "*Applied: Sent Resume"),
            ApplyStatus::NotSubmitted { reason } => {
                write!(f, "*Did not apply: Failed to send Resume ({})", reason)
            }
        }
    }
}

#[derive(Debug, Clone)]
pub struct ApplyOutcome {
    pub job_id: String,
    pub title: String,
    pub browser_title: String,
    pub status: ApplyStatus,
    pub attempted: bool,
    pub result: bool,
}

pub struct JobApplier {
    pacer: Pacer,
    selectors: SiteSelectors,
    blacklist: Blacklist,
    form: FormDriver,
    log: ApplicationLog,
}

impl JobApplier {
    pub fn new(
        pacer: Pacer,
        selectors: SiteSelectors,
        blacklist: Blacklist,
        form: FormDriver,
        log: ApplicationLog,
    ) -> Self {
        Self {
            pacer,
            selectors,
            blacklist,
            form,
            log,
        }
    }

    pub fn blacklist(&self) -> &Blacklist {
        &self.blacklist
    }

    pub async fn apply<B: Backend + ?Sized>(
        &mut self,
        backend: &mut B,
        job_id: &str,
    ) -> Result<ApplyOutcome, ApplyError> {
        self.open_job_page(backend, job_id).await?;

        let title = self.job_title(backend).await;
        let outcome = if self.blacklist.is_blacklisted(&title) {
            info!(
                "Skipping blacklisted job: {} (matched {})",
                title,
                self.blacklist.matching_pattern(&title).unwrap_or_default()
            );
            self.outcome(backend, job_id, title, ApplyStatus::Blacklisted, false)
                .await
        } else {
            match self.easy_apply_button(backend).await {
                Some(button) => self.apply_with(backend, job_id, title, button).await?,
                None => {
                    let status = if source_or_empty(backend).await.contains(ALREADY_APPLIED_TEXT) {
                        info!("You have already applied to this position.");
                        ApplyStatus::AlreadyApplied
                    } else {
                        info!("The Easy apply button does not exist.");
                        ApplyStatus::NoEasyApply
                    };
                    self.outcome(backend, job_id, title, status, false).await
                }
            }
        };

        info!(
            "\nPosition {}:\n {} \n {} \n",
            outcome.job_id, outcome.browser_title, outcome.status
        );
        self.log.append(&ApplicationRecord::now(
            outcome.job_id.clone(),
            &outcome.browser_title,
            outcome.attempted,
            outcome.result,
        ))?;
        Ok(outcome)
    }

    async fn apply_with<B: Backend + ?Sized>(
        &mut self,
        backend: &mut B,
        job_id: &str,
        title: String,
        button: Element,
    ) -> Result<ApplyOutcome, ApplyError> {
        let browser_title = backend.title().await.unwrap_or_default();
        let (page_job, _) = parse_browser_title(&browser_title);
        if self.blacklist.is_blacklisted(&page_job) {
            info!("Skipping this application, a blacklisted keyword was found in the job position");
            return Ok(self
                .outcome(backend, job_id, title, ApplyStatus::Blacklisted, true)
                .await);
        }

        info!("Clicking the EASY apply button");
        self.pacer.pause(Pause::BeforeApply).await.map_err(cancelled)?;
        self.pacer.human_delay().await.map_err(cancelled)?;
        if let Err(e) = backend.click(&button).await {
            warn!("Could not click Easy Apply: {}", e);
            let status = ApplyStatus::NotSubmitted {
                reason: e.to_string(),
            };
            return Ok(self.outcome(backend, job_id, title, status, true).await);
        }
        self.pacer.pause(Pause::Step).await.map_err(cancelled)?;

        let status = match self.form.run(backend, &title).await {
            Ok(FormOutcome::Submitted) => ApplyStatus::Submitted,
            Ok(FormOutcome::Abandoned { reason }) => ApplyStatus::NotSubmitted { reason },
            Err(FormError::Cancelled) => return Err(ApplyError::Cancelled),
            Err(FormError::Answers(e)) => return Err(e.into()),
            Err(e) => {
                error!("{}", e);
                ApplyStatus::NotSubmitted {
                    reason: e.to_string(),
                }
            }
        };
        Ok(self.outcome(backend, job_id, title, status, true).await)
    }

    async fn outcome<B: Backend + ?Sized>(
        &self,
        backend: &mut B,
        job_id: &str,
        title: String,
        status: ApplyStatus,
        attempted: bool,
    ) -> ApplyOutcome {
        let browser_title = backend.title().await.unwrap_or_default();
        let result = status == ApplyStatus::Submitted;
        ApplyOutcome {
            job_id: job_id.to_string(),
            title,
            browser_title,
            status,
            attempted,
            result,
        }
    }

    /// Load failures are logged; the job continues with whatever loaded.
    async fn open_job_page<B: Backend + ?Sized>(
        &self,
        backend: &mut B,
        job_id: &str,
    ) -> Result<(), ApplyError> {
        let timeout = self.pacer.timing().page_load_timeout_ms;
        if let Err(e) = backend.navigate(&job_url(job_id)).await {
            error!("Job page {} failed to load: {}", job_id, e);
            return Ok(());
        }
        let loaded = match wait_for_ready_state(backend, &self.pacer, timeout).await {
            Ok(()) => wait_for_element(backend, &self.pacer, &self.selectors.top_card, timeout)
                .await
                .map(|_| ()),
            Err(e) => Err(e),
        };
        match loaded {
            Ok(()) => {}
            Err(WaitError::Cancelled) => return Err(ApplyError::Cancelled),
            Err(e) => error!("Job page failed to load properly: {}", e),
        }
        self.pacer.pause(Pause::JobPageSettle).await.map_err(cancelled)
    }

    /// Title from the first candidate selector with text, else the browser
    /// title before `|`, else `Unknown Position`.
    pub async fn job_title<B: Backend + ?Sized>(&self, backend: &mut B) -> String {
        for locator in &self.selectors.title_candidates {
            if let Ok(found) = backend.find_elements(locator).await
                && let Some(text) = found
                    .iter()
                    .map(|e| e.text.trim())
                    .find(|t| !t.is_empty())
            {
                return text.to_string();
            }
        }
        if let Ok(title) = backend.title().await
            && let Some(head) = title.split('|').next().map(str::trim)
            && !head.is_empty()
        {
            return head.to_string();
        }
        UNKNOWN_TITLE.to_string()
    }

    async fn easy_apply_button<B: Backend + ?Sized>(&self, backend: &mut B) -> Option<Element> {
        match backend.find_elements(&self.selectors.easy_apply_button).await {
            Ok(buttons) => buttons
                .into_iter()
                .find(|b| b.text.contains(EASY_APPLY_TEXT)),
            Err(e) => {
                warn!("Easy Apply button lookup failed: {}", e);
                None
            }
        }
    }
}

fn cancelled(_: WaitError) -> ApplyError {
    ApplyError::Cancelled
}
