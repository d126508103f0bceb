#![allow(dead_code)]

use async_trait::async_trait;
use easyapply_engine::answers::AnswerBook;
use easyapply_engine::apply::JobApplier;
use easyapply_engine::backend::{Backend, BackendError};
use easyapply_engine::blacklist::Blacklist;
use easyapply_engine::config::schema::{BotConfig, OutputFilename, ResumeConfig, TimingConfig};
use easyapply_engine::form::FormDriver;
use easyapply_engine::records::ApplicationLog;
use easyapply_engine::screenshots::ScreenshotStore;
use easyapply_engine::search::{JobSearch, SearchFilters};
use easyapply_engine::wait::Pacer;
use easyapply_engine::protocol::{Element, Locator, NavigationResult};
use easyapply_engine::selectors::{LOGIN_URL, SEARCH_URL, SiteSelectors};
use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use tokio_util::sync::CancellationToken;

pub const FEED_URL: &str = "https://www.linkedin.com/feed/";
pub const TWO_FACTOR_URL: &str = "https://www.linkedin.com/checkpoint/challenge/two-step-verification";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoginBehavior {
    Succeeds,
    Fails,
    TwoFactor,
    AlreadyLoggedIn,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StepAction {
    Next,
    Review,
    Submit,
    /// Only the "follow company" toggle is shown; clicking it moves on.
    Follow,
}

#[derive(Debug, Clone)]
pub struct FakeQuestion {
    pub text: String,
    /// Radio options; empty means a free-text input.
    pub options: Vec<String>,
}

#[derive(Debug, Clone)]
pub struct FakeStep {
    pub phone: bool,
    pub upload: bool,
    pub cover_letter: bool,
    /// Show the upload error banner once a resume was uploaded.
    pub upload_error: bool,
    pub question: Option<FakeQuestion>,
    /// Answering the question closes the modal.
    pub closes_on_answer: bool,
    pub action: StepAction,
}

impl FakeStep {
    pub fn submit() -> Self {
        Self {
            phone: false,
            upload: false,
            cover_letter: false,
            upload_error: false,
            question: None,
            closes_on_answer: false,
            action: StepAction::Submit,
        }
    }

    pub fn next() -> Self {
        Self {
            action: StepAction::Next,
            ..Self::submit()
        }
    }
}

#[derive(Debug, Clone)]
pub struct FakeJob {
    pub id: String,
    pub title: String,
    pub company: String,
    pub easy_apply: bool,
    pub already_applied: bool,
    pub steps: Vec<FakeStep>,
}

impl FakeJob {
    pub fn new(id: &str, title: &str) -> Self {
        Self {
            id: id.to_string(),
            title: title.to_string(),
            company: "Acme".to_string(),
            easy_apply: true,
            already_applied: false,
            steps: vec![FakeStep::submit()],
        }
    }
}

#[derive(Debug, Clone, Default)]
struct Modal {
    job: String,
    step: usize,
    answered: bool,
    uploaded: bool,
    error: bool,
    sent: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Node {
    Username,
    Password,
    SignIn,
    Card(usize),
    TopCard,
    Heading,
    EasyApply,
    Next,
    Review,
    Submit,
    ErrorMessage,
    UploadMarker,
    ResumeInput,
    UploadError,
    CoverLetterMarker,
    CoverLetterInput,
    FollowLabel,
    Field { phone: bool },
    FieldInput { phone: bool },
    Radio(String),
    Dismiss,
    Discard,
}

/// Scripted model of the site: login page, one results page of cards, job
/// pages and an Easy Apply modal walking through `FakeJob::steps`.
pub struct FakeSite {
    pub login: LoginBehavior,
    pub cards: Vec<(String, String)>,
    /// Card IDs whose attribute read fails as if the card went stale.
    pub broken_cards: HashSet<String>,
    pub jobs: HashMap<String, FakeJob>,

    pub url: String,
    pub launched: bool,
    pub closed: bool,
    pub search_loads: Vec<String>,
    pub refreshes: usize,
    pub opened_jobs: Vec<String>,
    pub clicks: Vec<String>,
    pub typed: Vec<(String, String)>,
    pub uploads: Vec<PathBuf>,
    pub cover_letters: Vec<PathBuf>,
    pub submitted: Vec<String>,
    pub cookie_clears: usize,
    pub scripts: Vec<String>,
    pub login_attempts: usize,

    selectors: SiteSelectors,
    modal: Option<Modal>,
    nodes: HashMap<u32, Node>,
    next_id: u32,
}

impl FakeSite {
    pub fn new() -> Self {
        Self {
            login: LoginBehavior::Succeeds,
            cards: Vec::new(),
            broken_cards: HashSet::new(),
            jobs: HashMap::new(),
            url: "about:blank".to_string(),
            launched: false,
            closed: false,
            search_loads: Vec::new(),
            refreshes: 0,
            opened_jobs: Vec::new(),
            clicks: Vec::new(),
            typed: Vec::new(),
            uploads: Vec::new(),
            cover_letters: Vec::new(),
            submitted: Vec::new(),
            cookie_clears: 0,
            scripts: Vec::new(),
            login_attempts: 0,
            selectors: SiteSelectors::default(),
            modal: None,
            nodes: HashMap::new(),
            next_id: 1,
        }
    }

    /// Add a posting that appears as a card on the first results page.
    pub fn with_job(mut self, job: FakeJob) -> Self {
        self.cards
            .push((job.id.clone(), format!("{}\n{}\nEasy Apply", job.title, job.company)));
        self.jobs.insert(job.id.clone(), job);
        self
    }

    /// Open the modal for `job_id` directly, as if Easy Apply had been clicked.
    pub fn open_modal(&mut self, job_id: &str) {
        self.url = format!("https://www.linkedin.com/jobs/view/{}", job_id);
        self.modal = Some(Modal {
            job: job_id.to_string(),
            ..Default::default()
        });
    }

    fn current_job(&self) -> Option<&FakeJob> {
        let id = self.url.strip_prefix("https://www.linkedin.com/jobs/view/")?;
        self.jobs.get(id.trim_end_matches('/'))
    }

    fn current_step(&self) -> Option<&FakeStep> {
        let modal = self.modal.as_ref()?;
        if modal.sent {
            return None;
        }
        self.jobs.get(&modal.job)?.steps.get(modal.step)
    }

    fn on_results_page(&self) -> bool {
        self.url.starts_with(SEARCH_URL)
    }

    fn results_offset(&self) -> u32 {
        url::Url::parse(&self.url)
            .ok()
            .and_then(|u| {
                u.query_pairs()
                    .find(|(k, _)| k == "start")
                    .and_then(|(_, v)| v.parse().ok())
            })
            .unwrap_or(0)
    }

    fn register(&mut self, node: Node, text: impl Into<String>) -> Element {
        let id = self.next_id;
        self.next_id += 1;
        self.nodes.insert(id, node);
        Element {
            id,
            text: text.into(),
        }
    }

    fn node(&self, element: &Element) -> Result<Node, BackendError> {
        self.nodes
            .get(&element.id)
            .cloned()
            .ok_or(BackendError::ElementNotFound { id: element.id })
    }

    fn lookup(&self, locator: &Locator) -> Vec<(Node, String)> {
        let s = &self.selectors;
        let mut found = Vec::new();

        if self.url.starts_with(LOGIN_URL) {
            if *locator == s.login_username {
                found.push((Node::Username, String::new()));
            } else if *locator == s.login_password {
                found.push((Node::Password, String::new()));
            } else if *locator == s.login_button {
                found.push((Node::SignIn, "Sign in".to_string()));
            }
            return found;
        }

        if self.on_results_page() {
            if *locator == s.job_cards && self.results_offset() == 0 {
                for (i, (_, text)) in self.cards.iter().enumerate() {
                    found.push((Node::Card(i), text.clone()));
                }
            }
            return found;
        }

        let Some(job) = self.current_job() else {
            return found;
        };
        if *locator == s.top_card {
            found.push((Node::TopCard, String::new()));
        } else if *locator == s.title_candidates[2] {
            found.push((Node::Heading, job.title.clone()));
        } else if *locator == s.easy_apply_button && job.easy_apply && self.modal.is_none() {
            found.push((Node::EasyApply, "Easy Apply".to_string()));
        } else if *locator == s.dismiss && self.modal.is_some() {
            found.push((Node::Dismiss, String::new()));
        } else if *locator == s.discard {
            found.push((Node::Discard, "Discard".to_string()));
        }

        let Some(step) = self.current_step() else {
            return found;
        };
        let modal = self.modal.as_ref();
        let error = modal.is_some_and(|m| m.error);
        let uploaded = modal.is_some_and(|m| m.uploaded);
        match step.action {
            StepAction::Next if *locator == s.next => found.push((Node::Next, "Next".into())),
            StepAction::Review if *locator == s.review => {
                found.push((Node::Review, "Review".into()))
            }
            StepAction::Submit if *locator == s.submit => {
                found.push((Node::Submit, "Submit application".into()))
            }
            StepAction::Follow if *locator == s.follow => {
                found.push((Node::FollowLabel, "Follow Acme".into()))
            }
            _ => {}
        }
        if *locator == s.error && error {
            found.push((Node::ErrorMessage, "Please enter a valid answer".into()));
        }
        if step.upload {
            if *locator == s.upload_resume_marker {
                found.push((Node::UploadMarker, "Upload resume".into()));
            } else if *locator == s.resume_input {
                found.push((Node::ResumeInput, String::new()));
            } else if *locator == s.upload_error && step.upload_error && uploaded {
                found.push((Node::UploadError, "Please upload a valid file".into()));
            }
        }
        if step.cover_letter {
            if *locator == s.upload_cover_letter_marker {
                found.push((Node::CoverLetterMarker, "Upload cover letter".into()));
            } else if *locator == s.cover_letter_input {
                found.push((Node::CoverLetterInput, String::new()));
            }
        }
        if *locator == s.fields {
            if step.phone {
                found.push((Node::Field { phone: true }, "Mobile phone number".into()));
            }
            if let Some(q) = &step.question {
                let mut text = q.text.clone();
                for option in &q.options {
                    text.push('\n');
                    text.push_str(option);
                }
                found.push((Node::Field { phone: false }, text));
            }
        }
        found
    }

    fn lookup_within(&self, parent: &Node, locator: &Locator) -> Vec<(Node, String)> {
        let s = &self.selectors;
        let Node::Field { phone } = parent else {
            return Vec::new();
        };
        if *phone {
            if *locator == s.any_input || *locator == s.text_input {
                return vec![(Node::FieldInput { phone: true }, String::new())];
            }
            return Vec::new();
        }
        let Some(question) = self.current_step().and_then(|st| st.question.clone()) else {
            return Vec::new();
        };
        if question.options.is_empty() {
            if *locator == s.any_input || *locator == s.text_input {
                return vec![(Node::FieldInput { phone: false }, String::new())];
            }
            return Vec::new();
        }
        if *locator == s.radio {
            return question
                .options
                .iter()
                .map(|o| (Node::Radio(o.clone()), String::new()))
                .collect();
        }
        question
            .options
            .iter()
            .filter(|o| *locator == s.radio_with_value(o))
            .map(|o| (Node::Radio(o.clone()), String::new()))
            .collect()
    }

    fn press(&mut self, node: Node) -> Result<(), BackendError> {
        self.clicks.push(format!("{:?}", node));
        match node {
            Node::SignIn => {
                self.login_attempts += 1;
                self.url = match self.login {
                    LoginBehavior::Succeeds | LoginBehavior::AlreadyLoggedIn => FEED_URL.to_string(),
                    LoginBehavior::TwoFactor => TWO_FACTOR_URL.to_string(),
                    LoginBehavior::Fails => LOGIN_URL.to_string(),
                };
            }
            Node::EasyApply => {
                let job = self
                    .current_job()
                    .map(|j| j.id.clone())
                    .ok_or(BackendError::ElementStale { id: 0 })?;
                self.open_modal(&job);
            }
            Node::Next | Node::Review | Node::FollowLabel => {
                let unanswered = self
                    .current_step()
                    .is_some_and(|st| st.question.is_some())
                    && !self.modal.as_ref().is_some_and(|m| m.answered);
                if let Some(modal) = self.modal.as_mut() {
                    if unanswered {
                        modal.error = true;
                    } else {
                        modal.step += 1;
                        modal.answered = false;
                        modal.uploaded = false;
                        modal.error = false;
                    }
                }
            }
            Node::Submit => {
                if let Some(modal) = self.modal.as_mut() {
                    modal.sent = true;
                    self.submitted.push(modal.job.clone());
                }
            }
            Node::Radio(_) => self.mark_answered(),
            Node::Dismiss => self.modal = None,
            _ => {}
        }
        self.nodes.clear();
        Ok(())
    }

    fn mark_answered(&mut self) {
        if self.current_step().is_some_and(|st| st.closes_on_answer) {
            self.modal = None;
            return;
        }
        if let Some(modal) = self.modal.as_mut() {
            modal.answered = true;
            modal.error = false;
        }
    }
}

impl Default for FakeSite {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Backend for FakeSite {
    async fn launch(&mut self) -> Result<(), BackendError> {
        self.launched = true;
        Ok(())
    }

    async fn close(&mut self) -> Result<(), BackendError> {
        self.closed = true;
        Ok(())
    }

    async fn is_ready(&self) -> bool {
        self.launched && !self.closed
    }

    async fn navigate(&mut self, url: &str) -> Result<NavigationResult, BackendError> {
        self.nodes.clear();
        self.modal = None;
        self.url = if url == LOGIN_URL && self.login == LoginBehavior::AlreadyLoggedIn {
            FEED_URL.to_string()
        } else {
            url.to_string()
        };
        if self.on_results_page() {
            self.search_loads.push(url.to_string());
        }
        if let Some(job) = self.current_job() {
            let id = job.id.clone();
            self.opened_jobs.push(id);
        }
        Ok(NavigationResult {
            url: self.url.clone(),
            title: String::new(),
            status: 200,
        })
    }

    async fn refresh(&mut self) -> Result<NavigationResult, BackendError> {
        self.refreshes += 1;
        self.nodes.clear();
        Ok(NavigationResult {
            url: self.url.clone(),
            title: String::new(),
            status: 200,
        })
    }

    async fn current_url(&mut self) -> Result<String, BackendError> {
        Ok(self.url.clone())
    }

    async fn title(&mut self) -> Result<String, BackendError> {
        Ok(match self.current_job() {
            Some(job) => format!("(2) {} | {} | LinkedIn", job.title, job.company),
            None => "LinkedIn".to_string(),
        })
    }

    async fn page_source(&mut self) -> Result<String, BackendError> {
        let mut source = String::from(
            "<html><head><script>window.onerror = function (e) { return e instanceof TypeError; };</script></head><body>",
        );
        if let Some(job) = self.current_job() {
            source.push_str(&format!("<h1>{}</h1>", job.title));
            if job.already_applied {
                source.push_str("<span>You applied on 1 May</span>");
            }
        }
        if self.modal.as_ref().is_some_and(|m| m.sent) {
            source.push_str("<h2>Your application was sent to Acme!</h2>");
        }
        source.push_str("</body></html>");
        Ok(source)
    }

    async fn find_elements(&mut self, locator: &Locator) -> Result<Vec<Element>, BackendError> {
        let found = self.lookup(locator);
        Ok(found
            .into_iter()
            .map(|(node, text)| self.register(node, text))
            .collect())
    }

    async fn find_within(
        &mut self,
        parent: &Element,
        locator: &Locator,
    ) -> Result<Vec<Element>, BackendError> {
        let parent = self.node(parent)?;
        let found = self.lookup_within(&parent, locator);
        Ok(found
            .into_iter()
            .map(|(node, text)| self.register(node, text))
            .collect())
    }

    async fn attribute(
        &mut self,
        element: &Element,
        name: &str,
    ) -> Result<Option<String>, BackendError> {
        match self.node(element)? {
            Node::Card(i) if name == self.selectors.job_id_attribute => {
                match self.cards.get(i) {
                    Some((id, _)) if self.broken_cards.contains(id) => {
                        Err(BackendError::ElementStale { id: element.id })
                    }
                    card => Ok(card.map(|(id, _)| id.clone())),
                }
            }
            _ => Ok(None),
        }
    }

    async fn click(&mut self, element: &Element) -> Result<(), BackendError> {
        let node = self.node(element)?;
        self.press(node)
    }

    async fn clear(&mut self, element: &Element) -> Result<(), BackendError> {
        self.node(element).map(|_| ())
    }

    async fn type_text(&mut self, element: &Element, text: &str) -> Result<(), BackendError> {
        let node = self.node(element)?;
        if node == (Node::FieldInput { phone: false }) {
            self.mark_answered();
        }
        self.typed.push((format!("{:?}", node), text.to_string()));
        Ok(())
    }

    async fn upload_file(&mut self, element: &Element, path: &Path) -> Result<(), BackendError> {
        match self.node(element)? {
            Node::ResumeInput => {
                self.uploads.push(path.to_path_buf());
                if let Some(modal) = self.modal.as_mut() {
                    modal.uploaded = true;
                }
                Ok(())
            }
            Node::CoverLetterInput => {
                self.cover_letters.push(path.to_path_buf());
                Ok(())
            }
            other => Err(BackendError::ElementNotInteractable {
                id: element.id,
                reason: format!("{:?} is not a file input", other),
            }),
        }
    }

    async fn execute_script(&mut self, script: &str) -> Result<serde_json::Value, BackendError> {
        self.scripts.push(script.to_string());
        if script.contains("document.readyState") {
            return Ok(serde_json::json!("complete"));
        }
        Ok(serde_json::Value::Null)
    }

    async fn screenshot(&mut self) -> Result<Vec<u8>, BackendError> {
        Ok(vec![0x89, b'P', b'N', b'G'])
    }

    async fn delete_all_cookies(&mut self) -> Result<(), BackendError> {
        self.cookie_clears += 1;
        Ok(())
    }
}

/// Typed username and password, concatenated per field.
pub fn typed_into(site: &FakeSite, node: &str) -> String {
    site.typed
        .iter()
        .filter(|(n, _)| n == node)
        .map(|(_, t)| t.as_str())
        .collect()
}

/// Valid configuration writing all files under `dir`, with one real resume.
pub fn test_config(dir: &Path) -> BotConfig {
    let resume = dir.join("resume.pdf");
    std::fs::write(&resume, b"%PDF-1.4").unwrap();
    let mut config = BotConfig {
        username: Some("me@example.com".into()),
        password: Some("hunter2".into()),
        phone_number: Some("5550100".into()),
        salary: Some("100000".into()),
        positions: vec!["Developer".into()],
        locations: vec!["Remote".into()],
        qa_filename: dir.join("qa.csv"),
        screenshot_dir: dir.join("screenshots"),
        timing: TimingConfig::immediate(),
        ..Default::default()
    };
    config.uploads.resumes.push(ResumeConfig {
        name: "main".into(),
        path: resume,
        keywords: Vec::new(),
    });
    config.output_filename = OutputFilename::One(dir.join("output.csv").display().to_string());
    config.browser.hide_window = false;
    config
}

pub fn pacer(config: &BotConfig) -> Pacer {
    Pacer::new(config.timing.clone(), CancellationToken::new())
}

pub fn form_driver(config: &BotConfig) -> FormDriver {
    let answers = AnswerBook::load(&config.qa_filename, config.salary.clone(), config.rate.clone())
        .unwrap();
    FormDriver::new(
        pacer(config),
        SiteSelectors::default(),
        config.limits.clone(),
        config.phone_number(),
        config.uploads.all_resumes(),
        config.uploads.cover_letter.clone(),
        answers,
        ScreenshotStore::new(config.screenshot_dir.clone()),
    )
}

pub fn applier(config: &BotConfig) -> JobApplier {
    JobApplier::new(
        pacer(config),
        SiteSelectors::default(),
        Blacklist::from_config(config).unwrap(),
        form_driver(config),
        ApplicationLog::new(config.output_path()),
    )
}

pub fn job_search(config: &BotConfig) -> JobSearch {
    JobSearch::new(
        pacer(config),
        SiteSelectors::default(),
        Blacklist::from_config(config).unwrap(),
        SearchFilters::from_config(config),
        config,
    )
}
