//! Canned answers for application-form questions.
//!
//! Lookup order: the persisted question/answer table, then a fixed ordered
//! rule list over the lower-cased question, then a placeholder. Every new
//! answer is appended to the table so the same question is answered the same
//! way next time.

use std::collections::HashMap;
use std::fs::OpenOptions;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, info};

pub const PLACEHOLDER_ANSWER: &str = "user provided";
const QUESTION_HEADER: &str = "Question";
const ANSWER_HEADER: &str = "Answer";

#[derive(Debug, Error)]
pub enum AnswerError {
    #[error("IO error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("CSV error on {path}: {source}")]
    Csv {
        path: PathBuf,
        #[source]
        source: csv::Error,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RuleAnswer {
    Fixed(&'static str),
    Salary,
    Rate,
}

#[derive(Debug, Clone, Copy)]
pub struct AnswerRule {
    pub needle: &'static str,
    pub answer: RuleAnswer,
}

const fn rule(needle: &'static str, answer: RuleAnswer) -> AnswerRule {
    AnswerRule { needle, answer }
}

/// First match wins. Needles are matched against the lower-cased question and
/// only where a word starts, so `rate` never fires inside "operate".
pub const RULES: &[AnswerRule] = &[
    rule("how many", RuleAnswer::Fixed("1")),
    rule("experience", RuleAnswer::Fixed("1")),
    rule("sponsor", RuleAnswer::Fixed("No")),
    rule("visa", RuleAnswer::Fixed("No")),
    rule("do you ", RuleAnswer::Fixed("Yes")),
    rule("have you ", RuleAnswer::Fixed("Yes")),
    rule("us citizen", RuleAnswer::Fixed("Yes")),
    rule("are you legally", RuleAnswer::Fixed("Yes")),
    rule("are you ", RuleAnswer::Fixed("Yes")),
    rule("salary", RuleAnswer::Salary),
    rule("rate", RuleAnswer::Rate),
    rule("can you", RuleAnswer::Fixed("Yes")),
    rule("gender", RuleAnswer::Fixed("Wish not to answer")),
    rule("race", RuleAnswer::Fixed("Wish not to answer")),
    rule("lgbtq", RuleAnswer::Fixed("Wish not to answer")),
    rule("ethnicity", RuleAnswer::Fixed("Wish not to answer")),
    rule("nationality", RuleAnswer::Fixed("Wish not to answer")),
    rule("government", RuleAnswer::Fixed("I do not wish to self-identify")),
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AnswerSource {
    Cached,
    Rule,
    Placeholder,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Answer {
    pub text: String,
    pub source: AnswerSource,
}

impl Answer {
    pub fn needs_manual_review(&self) -> bool {
        self.source == AnswerSource::Placeholder
    }
}

pub struct AnswerBook {
    path: PathBuf,
    answers: HashMap<String, String>,
    salary: Option<String>,
    rate: Option<String>,
}

impl AnswerBook {
    /// Load the table at `path`, creating it with a header if it does not exist.
    pub fn load(
        path: impl Into<PathBuf>,
        salary: Option<String>,
        rate: Option<String>,
    ) -> Result<Self, AnswerError> {
        let path = path.into();
        let mut answers = HashMap::new();

        if path.is_file() {
            let mut reader = csv::ReaderBuilder::new()
                .flexible(true)
                .from_path(&path)
                .map_err(|source| csv_err(&path, source))?;
            for row in reader.records() {
                let row = row.map_err(|source| csv_err(&path, source))?;
                if let (Some(q), Some(a)) = (row.get(0), row.get(1)) {
                    answers.insert(key(q), a.to_string());
                }
            }
            info!("Loaded {} answers from {}", answers.len(), path.display());
        } else {
            let mut writer = csv::Writer::from_path(&path).map_err(|source| csv_err(&path, source))?;
            writer
                .write_record([QUESTION_HEADER, ANSWER_HEADER])
                .map_err(|source| csv_err(&path, source))?;
            writer.flush().map_err(|source| io_err(&path, source))?;
            info!("Created answer table at {}", path.display());
        }

        Ok(Self {
            path,
            answers,
            salary,
            rate,
        })
    }

    /// Table that is never persisted. Used for dry runs.
    pub fn in_memory(salary: Option<String>, rate: Option<String>) -> Self {
        Self {
            path: PathBuf::new(),
            answers: HashMap::new(),
            salary,
            rate,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn len(&self) -> usize {
        self.answers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.answers.is_empty()
    }

    pub fn lookup(&self, question: &str) -> Option<&str> {
        self.answers.get(&key(question)).map(String::as_str)
    }

    /// Rule-table answer for `question`, ignoring the persisted table.
    pub fn heuristic(&self, question: &str) -> Option<String> {
        let lowered = question.to_lowercase();
        RULES
            .iter()
            .filter(|r| contains_at_word_start(&lowered, r.needle))
            .find_map(|r| match r.answer {
                RuleAnswer::Fixed(text) => Some(text.to_string()),
                RuleAnswer::Salary => self.salary.clone(),
                RuleAnswer::Rate => self.rate.clone(),
            })
    }

    /// Answer `question`, recording it if it has not been seen before.
    pub fn answer(&mut self, question: &str) -> Result<Answer, AnswerError> {
        if let Some(text) = self.lookup(question) {
            debug!("Reusing recorded answer for '{}'", question);
            return Ok(Answer {
                text: text.to_string(),
                source: AnswerSource::Cached,
            });
        }

        let answer = match self.heuristic(question) {
            Some(text) => Answer {
                text,
                source: AnswerSource::Rule,
            },
            None => {
                info!("Not able to answer question automatically. Please provide answer");
                Answer {
                    text: PLACEHOLDER_ANSWER.to_string(),
                    source: AnswerSource::Placeholder,
                }
            }
        };
        info!("Answering question: {} with answer: {}", question, answer.text);

        self.record(question, &answer.text)?;
        Ok(answer)
    }

    fn record(&mut self, question: &str, answer: &str) -> Result<(), AnswerError> {
        self.answers.insert(key(question), answer.to_string());
        if self.path.as_os_str().is_empty() {
            return Ok(());
        }

        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .map_err(|source| io_err(&self.path, source))?;
        let mut writer = csv::WriterBuilder::new()
            .has_headers(false)
            .from_writer(file);
        writer
            .write_record([question.trim(), answer])
            .map_err(|source| csv_err(&self.path, source))?;
        writer.flush().map_err(|source| io_err(&self.path, source))?;
        info!("Appended to QA file: '{}' with answer: '{}'.", question, answer);
        Ok(())
    }
}

fn contains_at_word_start(haystack: &str, needle: &str) -> bool {
    haystack.match_indices(needle).any(|(at, _)| {
        haystack[..at]
            .chars()
            .next_back()
            .is_none_or(|c| !c.is_alphanumeric())
    })
}

/// The question part of a form grouping's rendered text.
///
/// Groupings render the label first and then option labels; only the first
/// non-empty line is the question.
pub fn question_text(field_text: &str) -> Option<&str> {
    field_text.lines().map(str::trim).find(|l| !l.is_empty())
}

fn key(question: &str) -> String {
    question.trim().to_lowercase()
}

fn csv_err(path: &Path, source: csv::Error) -> AnswerError {
    AnswerError::Csv {
        path: path.to_path_buf(),
        source,
    }
}

fn io_err(path: &Path, source: std::io::Error) -> AnswerError {
    AnswerError::Io {
        path: path.to_path_buf(),
        source,
    }
}
