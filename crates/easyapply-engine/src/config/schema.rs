use serde::{Deserialize, Deserializer, Serialize};
use std::path::PathBuf;

/// Experience level codes understood by the search endpoint's `f_E` filter.
pub const EXPERIENCE_LEVELS: &[(u8, &str)] = &[
    (1, "Entry level"),
    (2, "Associate"),
    (3, "Mid-Senior level"),
    (4, "Director"),
    (5, "Executive"),
    (6, "Internship"),
];

pub fn experience_level_name(code: u8) -> Option<&'static str> {
    EXPERIENCE_LEVELS
        .iter()
        .find(|(c, _)| *c == code)
        .map(|(_, name)| *name)
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BotConfig {
    #[serde(default, deserialize_with = "scalar_string")]
    pub username: Option<String>,
    #[serde(default, deserialize_with = "scalar_string")]
    pub password: Option<String>,
    #[serde(default, deserialize_with = "scalar_string")]
    pub phone_number: Option<String>,
    #[serde(default, deserialize_with = "scalar_string")]
    pub salary: Option<String>,
    #[serde(default, deserialize_with = "scalar_string")]
    pub rate: Option<String>,
    #[serde(default, deserialize_with = "non_null_strings")]
    pub positions: Vec<String>,
    #[serde(default, deserialize_with = "non_null_strings")]
    pub locations: Vec<String>,
    #[serde(default, deserialize_with = "nullable_default")]
    pub uploads: UploadsConfig,
    #[serde(default)]
    pub output_filename: OutputFilename,
    #[serde(default = "default_qa_filename")]
    pub qa_filename: PathBuf,
    /// Plain keywords; each becomes a case-insensitive whole-word pattern.
    #[serde(default, deserialize_with = "non_null_strings")]
    pub blacklist: Vec<String>,
    /// Regular expressions matched case-insensitively against titles.
    #[serde(
        default,
        alias = "blackListTitles",
        deserialize_with = "non_null_strings"
    )]
    pub blacklist_titles: Vec<String>,
    #[serde(default)]
    pub experience_level: Vec<u8>,
    #[serde(default = "default_days_old")]
    pub days_old: u32,
    #[serde(default = "default_distance")]
    pub distance: u32,
    #[serde(default = "default_screenshot_dir")]
    pub screenshot_dir: PathBuf,
    #[serde(default)]
    pub browser: BrowserConfig,
    #[serde(default)]
    pub timing: TimingConfig,
    #[serde(default)]
    pub limits: LimitsConfig,
}

impl Default for BotConfig {
    fn default() -> Self {
        Self {
            username: None,
            password: None,
            phone_number: None,
            salary: None,
            rate: None,
            positions: Vec::new(),
            locations: Vec::new(),
            uploads: UploadsConfig::default(),
            output_filename: OutputFilename::default(),
            qa_filename: default_qa_filename(),
            blacklist: Vec::new(),
            blacklist_titles: Vec::new(),
            experience_level: Vec::new(),
            days_old: default_days_old(),
            distance: default_distance(),
            screenshot_dir: default_screenshot_dir(),
            browser: BrowserConfig::default(),
            timing: TimingConfig::default(),
            limits: LimitsConfig::default(),
        }
    }
}

impl BotConfig {
    pub fn username(&self) -> &str {
        self.username.as_deref().unwrap_or_default()
    }

    pub fn password(&self) -> &str {
        self.password.as_deref().unwrap_or_default()
    }

    pub fn phone_number(&self) -> &str {
        self.phone_number.as_deref().unwrap_or_default()
    }

    pub fn output_path(&self) -> PathBuf {
        PathBuf::from(self.output_filename.resolve())
    }

    /// Copy safe to log: credentials are masked.
    pub fn redacted(&self) -> BotConfig {
        let mut copy = self.clone();
        copy.username = copy.username.map(|_| "***".to_string());
        copy.password = copy.password.map(|_| "***".to_string());
        copy
    }
}

fn default_qa_filename() -> PathBuf {
    PathBuf::from("qa.csv")
}

fn default_days_old() -> u32 {
    3
}

fn default_distance() -> u32 {
    8
}

fn default_screenshot_dir() -> PathBuf {
    PathBuf::from("screenshots")
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UploadsConfig {
    #[serde(default, deserialize_with = "nullable_default")]
    pub resumes: Vec<ResumeConfig>,
    /// Single untagged resume, kept for older config files.
    #[serde(default, alias = "Resume")]
    pub resume: Option<PathBuf>,
    #[serde(default, alias = "Cover Letter")]
    pub cover_letter: Option<PathBuf>,
}

impl UploadsConfig {
    /// Tagged resumes in file order, followed by the untagged one if present.
    pub fn all_resumes(&self) -> Vec<ResumeConfig> {
        let mut all = self.resumes.clone();
        if let Some(path) = &self.resume {
            all.push(ResumeConfig {
                name: "default".to_string(),
                path: path.clone(),
                keywords: Vec::new(),
            });
        }
        all
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResumeConfig {
    #[serde(default)]
    pub name: String,
    pub path: PathBuf,
    #[serde(default, deserialize_with = "non_null_strings")]
    pub keywords: Vec<String>,
}

/// `output_filename` may be a single name or a list whose first non-null entry wins.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum OutputFilename {
    One(String),
    Many(Vec<Option<String>>),
}

impl Default for OutputFilename {
    fn default() -> Self {
        OutputFilename::One(DEFAULT_OUTPUT.to_string())
    }
}

const DEFAULT_OUTPUT: &str = "output.csv";

impl OutputFilename {
    pub fn resolve(&self) -> &str {
        match self {
            OutputFilename::One(name) => name.as_str(),
            OutputFilename::Many(names) => names
                .iter()
                .flatten()
                .next()
                .map(String::as_str)
                .unwrap_or(DEFAULT_OUTPUT),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BrowserConfig {
    #[serde(default = "default_webdriver_url")]
    pub webdriver_url: String,
    /// Persistent profile directory; avoids "new device" challenges between runs.
    #[serde(default = "default_profile_dir")]
    pub profile_dir: Option<PathBuf>,
    #[serde(default)]
    pub headless: bool,
    /// Shrink and move the window off-screen once logged in.
    #[serde(default = "default_hide_window")]
    pub hide_window: bool,
}

impl Default for BrowserConfig {
    fn default() -> Self {
        Self {
            webdriver_url: default_webdriver_url(),
            profile_dir: default_profile_dir(),
            headless: false,
            hide_window: default_hide_window(),
        }
    }
}

fn default_webdriver_url() -> String {
    "http://localhost:9515".to_string()
}

fn default_profile_dir() -> Option<PathBuf> {
    Some(PathBuf::from("linkedin_profile"))
}

fn default_hide_window() -> bool {
    true
}

/// Every pause and timeout the bot uses, in milliseconds.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TimingConfig {
    pub poll_interval_ms: u64,
    pub page_load_timeout_ms: u64,
    pub login_form_timeout_ms: u64,
    pub account_chooser_timeout_ms: u64,
    pub login_verify_timeout_ms: u64,
    pub two_factor_detect_timeout_ms: u64,
    pub two_factor_pause_ms: u64,
    pub login_backoff_ms: u64,
    pub typing_delay_min_ms: u64,
    pub typing_delay_max_ms: u64,
    pub human_delay_min_ms: u64,
    pub human_delay_max_ms: u64,
    pub job_page_settle_ms: u64,
    pub before_apply_ms: u64,
    pub step_pause_ms: u64,
    pub upload_pause_ms: u64,
    pub question_round_pause_ms: u64,
    pub manual_answer_pause_ms: u64,
    pub refresh_pause_ms: u64,
}

impl Default for TimingConfig {
    fn default() -> Self {
        Self {
            poll_interval_ms: 500,
            page_load_timeout_ms: 30_000,
            login_form_timeout_ms: 10_000,
            account_chooser_timeout_ms: 5_000,
            login_verify_timeout_ms: 15_000,
            two_factor_detect_timeout_ms: 5_000,
            two_factor_pause_ms: 20_000,
            login_backoff_ms: 5_000,
            typing_delay_min_ms: 50,
            typing_delay_max_ms: 200,
            human_delay_min_ms: 500,
            human_delay_max_ms: 2_000,
            job_page_settle_ms: 1_000,
            before_apply_ms: 10_000,
            step_pause_ms: 1_000,
            upload_pause_ms: 2_000,
            question_round_pause_ms: 5_000,
            manual_answer_pause_ms: 15_000,
            refresh_pause_ms: 2_000,
        }
    }
}

impl TimingConfig {
    /// No pauses and short timeouts. Used by tests and dry runs.
    pub fn immediate() -> Self {
        Self {
            poll_interval_ms: 1,
            page_load_timeout_ms: 20,
            login_form_timeout_ms: 20,
            account_chooser_timeout_ms: 5,
            login_verify_timeout_ms: 20,
            two_factor_detect_timeout_ms: 5,
            two_factor_pause_ms: 0,
            login_backoff_ms: 0,
            typing_delay_min_ms: 0,
            typing_delay_max_ms: 0,
            human_delay_min_ms: 0,
            human_delay_max_ms: 0,
            job_page_settle_ms: 0,
            before_apply_ms: 0,
            step_pause_ms: 0,
            upload_pause_ms: 0,
            question_round_pause_ms: 0,
            manual_answer_pause_ms: 0,
            refresh_pause_ms: 0,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LimitsConfig {
    pub login_attempts: u32,
    pub max_form_steps: u32,
    pub max_question_rounds: u32,
    /// Time budget for a single (position, location) search.
    pub max_search_secs: u64,
    pub max_combos: usize,
    pub empty_page_limit: u32,
    pub page_size: u32,
}

impl Default for LimitsConfig {
    fn default() -> Self {
        Self {
            login_attempts: 3,
            max_form_steps: 8,
            max_question_rounds: 3,
            max_search_secs: 60 * 60,
            max_combos: 500,
            empty_page_limit: 3,
            page_size: 25,
        }
    }
}

// ============================================================
// Lenient deserializers for hand-written YAML
// ============================================================

/// Accepts strings, numbers and booleans; phone numbers and salaries are
/// often written unquoted.
fn scalar_string<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value: Option<serde_yaml::Value> = Option::deserialize(deserializer)?;
    Ok(match value {
        None | Some(serde_yaml::Value::Null) => None,
        Some(serde_yaml::Value::String(s)) => Some(s),
        Some(serde_yaml::Value::Number(n)) => Some(n.to_string()),
        Some(serde_yaml::Value::Bool(b)) => Some(b.to_string()),
        Some(other) => {
            return Err(serde::de::Error::custom(format!(
                "expected a scalar, found {:?}",
                other
            )));
        }
    })
}

/// List of strings where `null` entries (a bare `-`) are dropped.
fn non_null_strings<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let items: Option<Vec<Option<String>>> = Option::deserialize(deserializer)?;
    Ok(items.unwrap_or_default().into_iter().flatten().collect())
}

fn nullable_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de> + Default,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}
