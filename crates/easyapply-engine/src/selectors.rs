//! DOM markers and URLs of the target site.
//!
//! Everything site-specific lives here so the state machines above only talk
//! about roles ("the submit button"), never about class names.

use easyapply_common::protocol::Locator;

pub const BASE_URL: &str = "https://www.linkedin.com";
pub const LOGIN_URL: &str = "https://www.linkedin.com/login";
pub const SEARCH_URL: &str = "https://www.linkedin.com/jobs/search/";

pub fn job_url(job_id: &str) -> String {
    format!("{}/jobs/view/{}", BASE_URL, job_id)
}

/// URL fragments that only appear once a session is authenticated (or one
/// step away from it).
pub const POST_LOGIN_FRAGMENTS: &[&str] = &["feed", "in/", "two-step-verification"];
pub const TWO_FACTOR_FRAGMENT: &str = "two-step-verification";
pub const FEED_FRAGMENT: &str = "feed";

/// Page-source phrases the bot reacts to.
pub const APPLICATION_SENT_TEXT: &str = "application was sent";
pub const ALREADY_APPLIED_TEXT: &str = "You applied on";
pub const APPLIED_CARD_TEXT: &str = "Applied";
pub const EASY_APPLY_TEXT: &str = "Easy Apply";
pub const PHONE_FIELD_TEXT: &str = "Mobile phone number";

#[derive(Debug, Clone)]
pub struct SiteSelectors {
    // login
    pub login_username: Locator,
    pub login_password: Locator,
    pub login_button: Locator,
    pub welcome_back_account: Locator,

    // search results
    pub job_cards: Locator,
    pub job_id_attribute: &'static str,

    // job page
    pub top_card: Locator,
    pub title_candidates: Vec<Locator>,
    pub easy_apply_button: Locator,

    // application form
    pub next: Locator,
    pub review: Locator,
    pub submit: Locator,
    pub error: Locator,
    pub upload_resume_marker: Locator,
    pub upload_cover_letter_marker: Locator,
    pub resume_input: Locator,
    pub cover_letter_input: Locator,
    pub upload_error: Locator,
    pub follow: Locator,
    pub fields: Locator,
    pub radio: Locator,
    pub multi_select: Locator,
    pub text_input: Locator,
    pub select: Locator,
    pub any_input: Locator,
    pub dismiss: Locator,
    pub discard: Locator,
}

impl Default for SiteSelectors {
    fn default() -> Self {
        Self {
            login_username: Locator::id("username"),
            login_password: Locator::id("password"),
            login_button: Locator::xpath("//button[@type='submit' and contains(., 'Sign in')]"),
            welcome_back_account: Locator::xpath("//button[contains(@class, 'active-account')]"),

            job_cards: Locator::css("div.job-card-container"),
            job_id_attribute: "data-job-id",

            top_card: Locator::css(".jobs-unified-top-card"),
            title_candidates: vec![
                Locator::css(".jobs-unified-top-card__job-title"),
                Locator::css(".job-details-jobs-unified-top-card__job-title"),
                Locator::css("h1"),
                Locator::css(".t-24"),
            ],
            easy_apply_button: Locator::xpath("//button[contains(@class, 'jobs-apply-button')]"),

            next: Locator::css("button[aria-label='Continue to next step']"),
            review: Locator::css("button[aria-label='Review your application']"),
            submit: Locator::css("button[aria-label='Submit application']"),
            error: Locator::class_name("artdeco-inline-feedback__message"),
            upload_resume_marker: Locator::xpath("//span[text()='Upload resume']"),
            upload_cover_letter_marker: Locator::xpath("//span[text()='Upload cover letter']"),
            resume_input: Locator::xpath("//input[@type='file' and contains(@id, 'resume')]"),
            cover_letter_input: Locator::xpath(
                "//*[contains(@id, 'jobs-document-upload-file-input-upload-cover-letter')]",
            ),
            upload_error: Locator::xpath(
                "//*[contains(@class, 'jobs-document-upload')]//*[contains(@class, 'artdeco-inline-feedback--error')]",
            ),
            follow: Locator::css("label[for='follow-company-checkbox']"),
            fields: Locator::class_name("jobs-easy-apply-form-section__grouping"),
            radio: Locator::css("input[type='radio']"),
            multi_select: Locator::xpath(".//*[contains(@id, 'text-entity-list-form-component')]"),
            text_input: Locator::class_name("artdeco-text-input--input"),
            select: Locator::tag_name("select"),
            any_input: Locator::tag_name("input"),
            dismiss: Locator::css("button[aria-label='Dismiss']"),
            discard: Locator::css("button[data-control-name='discard_application_confirm_btn']"),
        }
    }
}

impl SiteSelectors {
    /// Radio input within a field whose value equals `answer`.
    pub fn radio_with_value(&self, answer: &str) -> Locator {
        Locator::css(format!(
            "input[type='radio'][value='{}']",
            answer.replace('\'', "\\'")
        ))
    }
}
