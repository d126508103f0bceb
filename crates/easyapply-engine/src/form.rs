//! The Easy Apply modal as an explicit state machine.
//!
//! Every step inspects the page, picks the first state whose marker is
//! present (see [`PageMarkers::state`]) and performs that state's action.
//! Element failures never abort the loop: the step is logged and the next
//! iteration re-inspects the page.

use crate::answers::{AnswerBook, AnswerError, question_text};
use crate::backend::{Backend, BackendError, marker_visible, source_or_empty};
use crate::config::schema::{LimitsConfig, ResumeConfig};
use crate::screenshots::ScreenshotStore;
use crate::selectors::{APPLICATION_SENT_TEXT, PHONE_FIELD_TEXT, SiteSelectors};
use crate::wait::{Pacer, Pause, WaitError};
use easyapply_common::protocol::{Element, Locator};
use std::path::PathBuf;
use thiserror::Error;
use tracing::{debug, error, info, warn};

#[derive(Debug, Error)]
pub enum FormError {
    #[error("No resumes configured in uploads")]
    NoResume,
    #[error("Resume file not found: {0}")]
    ResumeNotFound(PathBuf),
    #[error("Cancelled")]
    Cancelled,
    #[error("Answer table error: {0}")]
    Answers(#[from] AnswerError),
    #[error("Backend error: {0}")]
    Backend(#[from] BackendError),
}

impl From<WaitError> for FormError {
    fn from(err: WaitError) -> Self {
        match err {
            WaitError::Cancelled => FormError::Cancelled,
            WaitError::Timeout { what, .. } => {
                FormError::Backend(BackendError::TimeoutWithContext { operation: what })
            }
            WaitError::Backend(e) => FormError::Backend(e),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FormState {
    Upload,
    QuestionAnswer,
    Submit,
    Continue,
    Review,
    FollowPrompt,
    Submitted,
    Abandoned,
}

impl FormState {
    pub fn is_terminal(self) -> bool {
        matches!(self, FormState::Submitted | FormState::Abandoned)
    }
}

/// Which markers are visible on the current page.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PageMarkers {
    pub application_sent: bool,
    pub upload: bool,
    pub submit: bool,
    pub error: bool,
    pub next: bool,
    pub review: bool,
    pub follow: bool,
}

impl PageMarkers {
    /// State for this page. The first matching marker wins.
    pub fn state(&self, upload_handled: bool) -> FormState {
        if self.application_sent {
            FormState::Submitted
        } else if self.upload && !upload_handled {
            FormState::Upload
        } else if self.submit {
            FormState::Submit
        } else if self.error {
            FormState::QuestionAnswer
        } else if self.next {
            FormState::Continue
        } else if self.review {
            FormState::Review
        } else if self.follow {
            FormState::FollowPrompt
        } else {
            FormState::Abandoned
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FormOutcome {
    Submitted,
    Abandoned { reason: String },
}

impl FormOutcome {
    pub fn is_submitted(&self) -> bool {
        matches!(self, FormOutcome::Submitted)
    }
}

/// First resume whose keywords appear in `job_title`, else the first one.
pub fn select_resume<'a>(resumes: &'a [ResumeConfig], job_title: &str) -> Option<&'a ResumeConfig> {
    let title = job_title.to_lowercase();
    resumes
        .iter()
        .find(|r| {
            r.keywords
                .iter()
                .any(|k| !k.trim().is_empty() && title.contains(&k.trim().to_lowercase()))
        })
        .or_else(|| resumes.first())
}

pub struct FormDriver {
    pacer: Pacer,
    selectors: SiteSelectors,
    limits: LimitsConfig,
    phone_number: String,
    resumes: Vec<ResumeConfig>,
    cover_letter: Option<PathBuf>,
    answers: AnswerBook,
    screenshots: ScreenshotStore,
}

impl FormDriver {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        pacer: Pacer,
        selectors: SiteSelectors,
        limits: LimitsConfig,
        phone_number: impl Into<String>,
        resumes: Vec<ResumeConfig>,
        cover_letter: Option<PathBuf>,
        answers: AnswerBook,
        screenshots: ScreenshotStore,
    ) -> Self {
        Self {
            pacer,
            selectors,
            limits,
            phone_number: phone_number.into(),
            resumes,
            cover_letter,
            answers,
            screenshots,
        }
    }

    pub fn answers(&self) -> &AnswerBook {
        &self.answers
    }

    /// Drive the open modal to submission or abandonment.
    pub async fn run<B: Backend + ?Sized>(
        &mut self,
        backend: &mut B,
        job_title: &str,
    ) -> Result<FormOutcome, FormError> {
        let resume = select_resume(&self.resumes, job_title)
            .cloned()
            .ok_or(FormError::NoResume)?;
        if !tokio::fs::try_exists(&resume.path).await.unwrap_or(false) {
            return Err(FormError::ResumeNotFound(resume.path));
        }
        info!("Selected resume: {} ({})", resume.name, resume.path.display());

        match self.fill_phone(backend).await {
            Ok(true) => debug!("Filled phone number"),
            Ok(false) => debug!("No phone field on this step"),
            Err(e) => step_failed("phone fill", &e),
        }

        let mut upload_handled = false;
        let mut question_rounds = 0;

        for step in 1..=self.limits.max_form_steps {
            self.pacer.pause(Pause::Step).await?;
            let markers = self.inspect(backend).await;
            let state = markers.state(upload_handled);
            debug!("Form step {}: {:?} ({:?})", step, state, markers);

            match state {
                FormState::Submitted => {
                    info!("Application Submitted");
                    return Ok(FormOutcome::Submitted);
                }
                FormState::Upload => {
                    upload_handled = true;
                    match self.upload(backend, &resume).await {
                        Ok(true) => {}
                        Ok(false) => return self.abandon(backend, "resume upload failed").await,
                        Err(FormError::Cancelled) => return Err(FormError::Cancelled),
                        Err(e) => warn!("Upload step failed: {}", e),
                    }
                }
                FormState::Submit => match self.click_first(backend, &self.selectors.submit).await {
                    Ok(()) => {
                        info!("Application Submitted");
                        return Ok(FormOutcome::Submitted);
                    }
                    Err(e) => step_failed("submit", &e),
                },
                FormState::QuestionAnswer => {
                    question_rounds += 1;
                    if question_rounds > self.limits.max_question_rounds {
                        return self.abandon(backend, "validation errors persist").await;
                    }
                    info!(
                        "Please answer the questions, waiting {:?}...",
                        self.pacer.duration_of(Pause::QuestionRound)
                    );
                    self.pacer.pause(Pause::QuestionRound).await?;
                    self.answer_questions(backend).await?;
                    if marker_visible(backend, &self.selectors.easy_apply_button).await {
                        info!("Skipping application");
                        return self.abandon(backend, "application modal closed").await;
                    }
                }
                FormState::Continue => {
                    match self.click_first(backend, &self.selectors.next).await {
                        Ok(()) => upload_handled = false,
                        Err(e) => step_failed("continue", &e),
                    }
                }
                FormState::Review => {
                    match self.click_first(backend, &self.selectors.review).await {
                        Ok(()) => upload_handled = false,
                        Err(e) => step_failed("review", &e),
                    }
                }
                FormState::FollowPrompt => {
                    if let Err(e) = self.click_first(backend, &self.selectors.follow).await {
                        step_failed("follow toggle", &e);
                    }
                }
                FormState::Abandoned => {
                    return self.abandon(backend, "no known form step on page").await;
                }
            }
        }

        self.abandon(backend, "step limit reached").await
    }

    async fn inspect<B: Backend + ?Sized>(&self, backend: &mut B) -> PageMarkers {
        let s = &self.selectors;
        let source = source_or_empty(backend).await;
        PageMarkers {
            application_sent: source.contains(APPLICATION_SENT_TEXT),
            upload: marker_visible(backend, &s.upload_resume_marker).await
                || marker_visible(backend, &s.upload_cover_letter_marker).await,
            submit: marker_visible(backend, &s.submit).await,
            error: marker_visible(backend, &s.error).await,
            next: marker_visible(backend, &s.next).await,
            review: marker_visible(backend, &s.review).await,
            follow: marker_visible(backend, &s.follow).await,
        }
    }

    /// Fill the "Mobile phone number" grouping, if the step has one.
    pub async fn fill_phone<B: Backend + ?Sized>(&self, backend: &mut B) -> Result<bool, BackendError> {
        let fields = backend.find_elements(&self.selectors.fields).await?;
        for field in fields.iter().filter(|f| f.text.contains(PHONE_FIELD_TEXT)) {
            if let Some(input) = first_within(backend, field, &self.selectors.any_input).await? {
                backend.clear(&input).await?;
                backend.type_text(&input, &self.phone_number).await?;
                return Ok(true);
            }
        }
        Ok(false)
    }

    /// Returns `false` if the upload section shows an error banner.
    async fn upload<B: Backend + ?Sized>(
        &self,
        backend: &mut B,
        resume: &ResumeConfig,
    ) -> Result<bool, FormError> {
        let s = &self.selectors;
        if marker_visible(backend, &s.upload_resume_marker).await {
            let input = backend.find_element(&s.resume_input).await?;
            backend.upload_file(&input, &resume.path).await?;
            self.pacer.pause(Pause::Upload).await?;
            if marker_visible(backend, &s.upload_error).await {
                error!("Resume upload failed");
                return Ok(false);
            }
            info!("Uploaded resume {}", resume.path.display());
        }

        if let Some(cover_letter) = &self.cover_letter
            && marker_visible(backend, &s.upload_cover_letter_marker).await
        {
            match backend.find_element(&s.cover_letter_input).await {
                Ok(input) => {
                    backend.upload_file(&input, cover_letter).await?;
                    self.pacer.pause(Pause::Upload).await?;
                    info!("Uploaded cover letter {}", cover_letter.display());
                }
                Err(e) => error!("Cover letter upload failed: {}", e),
            }
        }
        Ok(true)
    }

    async fn answer_questions<B: Backend + ?Sized>(&mut self, backend: &mut B) -> Result<(), FormError> {
        let fields = match backend.find_elements(&self.selectors.fields).await {
            Ok(fields) => fields,
            Err(e) => {
                warn!("Could not read form fields: {}", e);
                return Ok(());
            }
        };

        for field in &fields {
            if field.text.contains(PHONE_FIELD_TEXT) {
                continue;
            }
            let Some(question) = question_text(&field.text) else {
                continue;
            };
            let answer = self.answers.answer(question)?;
            if answer.needs_manual_review() {
                self.pacer.pause(Pause::ManualAnswer).await?;
            }
            if let Err(e) = self.fill_field(backend, field, &answer.text).await {
                step_failed(&format!("answer to '{}'", question), &e);
            }
        }
        Ok(())
    }

    async fn fill_field<B: Backend + ?Sized>(
        &self,
        backend: &mut B,
        field: &Element,
        answer: &str,
    ) -> Result<(), BackendError> {
        let s = &self.selectors;

        if first_within(backend, field, &s.radio).await?.is_some() {
            let option = self.selectors.radio_with_value(answer);
            let target = first_within(backend, field, &option)
                .await?
                .ok_or_else(|| BackendError::NoMatch {
                    locator: option.to_string(),
                })?;
            return backend.js_click(&target).await;
        }
        if let Some(input) = first_within(backend, field, &s.multi_select).await? {
            return backend.type_text(&input, answer).await;
        }
        if let Some(input) = first_within(backend, field, &s.text_input).await? {
            backend.clear(&input).await?;
            return backend.type_text(&input, answer).await;
        }
        if let Some(select) = first_within(backend, field, &s.select).await? {
            return backend.type_text(&select, answer).await;
        }
        Err(BackendError::NoMatch {
            locator: format!("answerable input in '{}'", field.text.lines().next().unwrap_or_default()),
        })
    }

    async fn click_first<B: Backend + ?Sized>(
        &self,
        backend: &mut B,
        locator: &Locator,
    ) -> Result<(), BackendError> {
        let element = backend.find_element(locator).await?;
        backend.click(&element).await
    }

    /// Close the modal and discard the draft. Failures are only logged.
    async fn abandon<B: Backend + ?Sized>(
        &self,
        backend: &mut B,
        reason: &str,
    ) -> Result<FormOutcome, FormError> {
        warn!("Abandoning application: {}", reason);
        self.screenshots.capture(backend, "abandoned_application").await;

        if let Err(e) = self.click_first(backend, &self.selectors.dismiss).await {
            debug!("Dismiss failed: {}", e);
        }
        self.pacer.pause(Pause::Step).await?;
        if let Err(e) = self.click_first(backend, &self.selectors.discard).await {
            debug!("Discard failed: {}", e);
        }

        Ok(FormOutcome::Abandoned {
            reason: reason.to_string(),
        })
    }
}

/// Missing elements mean the step did not apply; anything else is worth a warning.
fn step_failed(what: &str, err: &BackendError) {
    if err.is_missing_element() {
        debug!("Skipped {}: {}", what, err);
    } else {
        warn!("{} failed [{}]: {}", what, err.code(), err);
    }
}

async fn first_within<B: Backend + ?Sized>(
    backend: &mut B,
    parent: &Element,
    locator: &Locator,
) -> Result<Option<Element>, BackendError> {
    Ok(backend.find_within(parent, locator).await?.into_iter().next())
}
