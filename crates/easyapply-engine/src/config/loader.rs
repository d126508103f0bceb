use super::schema::BotConfig;
use regex::Regex;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),
    #[error("Failed to parse config file: {0}")]
    Parse(#[from] serde_yaml::Error),
    #[error("Invalid configuration: {0}")]
    Invalid(String),
    #[error("No config file found (looked in {0})")]
    NotFound(String),
}

pub struct ConfigLoader;

impl ConfigLoader {
    /// Candidate locations, in lookup order:
    /// 1. ./config.yaml
    /// 2. ~/.easyapply/config.yaml
    pub fn default_paths() -> Vec<PathBuf> {
        let mut paths = vec![PathBuf::from("./config.yaml")];
        if let Some(home) = dirs::home_dir() {
            paths.push(home.join(".easyapply").join("config.yaml"));
        }
        paths
    }

    pub async fn load_default() -> Result<BotConfig, ConfigError> {
        let paths = Self::default_paths();
        for path in &paths {
            if path.exists() {
                return Self::load_from(path).await;
            }
        }
        Err(ConfigError::NotFound(
            paths
                .iter()
                .map(|p| p.display().to_string())
                .collect::<Vec<_>>()
                .join(", "),
        ))
    }

    pub async fn load_from(path: &Path) -> Result<BotConfig, ConfigError> {
        let content = tokio::fs::read_to_string(path).await?;
        Self::parse(&content)
    }

    /// Parse and validate a YAML document.
    pub fn parse(content: &str) -> Result<BotConfig, ConfigError> {
        let raw: serde_yaml::Value = serde_yaml::from_str(content)?;
        if raw.get("uploads").is_some_and(|u| u.is_sequence()) {
            return Err(ConfigError::Invalid(
                "uploads read from the config file appear to be in list format while they \
                 should be a mapping. Try removing '-' from the lines containing file names \
                 and paths"
                    .to_string(),
            ));
        }
        let config: BotConfig = serde_yaml::from_value(raw)?;
        validate(&config)?;
        Ok(config)
    }
}

/// Startup checks. Any failure here is fatal.
pub fn validate(config: &BotConfig) -> Result<(), ConfigError> {
    if config.positions.is_empty() {
        return Err(ConfigError::Invalid("at least one position is required".into()));
    }
    if config.locations.is_empty() {
        return Err(ConfigError::Invalid("at least one location is required".into()));
    }
    for (field, value) in [
        ("username", &config.username),
        ("password", &config.password),
        ("phone_number", &config.phone_number),
    ] {
        if value.as_deref().is_none_or(str::is_empty) {
            return Err(ConfigError::Invalid(format!("{} is required", field)));
        }
    }
    for resume in &config.uploads.resumes {
        if resume.path.as_os_str().is_empty() {
            return Err(ConfigError::Invalid(format!(
                "resume '{}' has an empty path",
                resume.name
            )));
        }
    }
    for pattern in &config.blacklist_titles {
        Regex::new(pattern).map_err(|e| {
            ConfigError::Invalid(format!("blacklist pattern '{}' is invalid: {}", pattern, e))
        })?;
    }
    if config.limits.max_form_steps == 0 {
        return Err(ConfigError::Invalid("limits.max_form_steps must be > 0".into()));
    }
    if config.limits.page_size == 0 {
        return Err(ConfigError::Invalid("limits.page_size must be > 0".into()));
    }
    Ok(())
}
