use crate::config::schema::BotConfig;
use regex::{Regex, RegexBuilder};

/// Title patterns used when the configuration names none.
pub const DEFAULT_TITLE_PATTERNS: &[&str] = &[
    r"\bsenior\b",
    r"\bjava\b",
    r"\boracle\b",
    r"\bscientist\b",
    r"\bpromoted\b",
    r"hiring\s*(immediately|urgently)",
    r"urgently\s*hiring",
    r"0?\s*experience\s*required",
];

pub const UNKNOWN_TITLE: &str = "Unknown Position";

/// Case-insensitive title filter.
#[derive(Debug, Clone)]
pub struct Blacklist {
    patterns: Vec<Regex>,
}

impl Blacklist {
    /// `keywords` match as whole words; `patterns` are raw regular expressions.
    pub fn new(keywords: &[String], patterns: &[String]) -> Result<Self, regex::Error> {
        let mut compiled = Vec::with_capacity(keywords.len() + patterns.len());
        for keyword in keywords.iter().filter(|k| !k.trim().is_empty()) {
            compiled.push(build(&keyword_pattern(keyword.trim()))?);
        }
        for pattern in patterns {
            compiled.push(build(pattern)?);
        }
        Ok(Self { patterns: compiled })
    }

    pub fn from_config(config: &BotConfig) -> Result<Self, regex::Error> {
        if config.blacklist.is_empty() && config.blacklist_titles.is_empty() {
            let defaults: Vec<String> = DEFAULT_TITLE_PATTERNS
                .iter()
                .map(|p| p.to_string())
                .collect();
            return Self::new(&[], &defaults);
        }
        Self::new(&config.blacklist, &config.blacklist_titles)
    }

    pub fn is_blacklisted(&self, title: &str) -> bool {
        let title = title.trim();
        if title.is_empty() || title == UNKNOWN_TITLE {
            return false;
        }
        self.patterns.iter().any(|p| p.is_match(title))
    }

    /// The first pattern that matches, for log lines.
    pub fn matching_pattern(&self, title: &str) -> Option<&str> {
        self.patterns
            .iter()
            .find(|p| p.is_match(title))
            .map(|p| p.as_str())
    }

    pub fn len(&self) -> usize {
        self.patterns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.patterns.is_empty()
    }
}

/// Whole-word pattern; `\b` is only added next to word characters so
/// keywords like "C++" still match.
fn keyword_pattern(keyword: &str) -> String {
    let is_word = |c: char| c.is_alphanumeric() || c == '_';
    let start = if keyword.starts_with(is_word) { r"\b" } else { "" };
    let end = if keyword.ends_with(is_word) { r"\b" } else { "" };
    format!("{}{}{}", start, regex::escape(keyword), end)
}

fn build(pattern: &str) -> Result<Regex, regex::Error> {
    RegexBuilder::new(pattern).case_insensitive(true).build()
}
