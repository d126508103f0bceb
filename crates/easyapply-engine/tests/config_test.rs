use easyapply_engine::config::loader::{ConfigError, ConfigLoader};
use std::path::PathBuf;
use tempfile::TempDir;

const FULL: &str = r#"
username: me@example.com
password: hunter2
phone_number: 5550100
salary: 95000
rate: 50
positions:
  - Rust Developer
  - Platform Engineer
  -
locations:
  - Remote
  - Berlin
uploads:
  resumes:
    - name: backend
      path: /tmp/backend.pdf
      keywords: [rust, go]
    - name: general
      path: /tmp/general.pdf
  cover_letter: /tmp/cover.pdf
output_filename:
  - applied.csv
blacklist: [Manager]
blacklist_titles: ['\bstaff\b']
experience_level: [2, 3]
days_old: 7
distance: 25
browser:
  webdriver_url: http://127.0.0.1:4444
  headless: true
timing:
  before_apply_ms: 0
limits:
  max_form_steps: 10
"#;

#[tokio::test]
async fn test_load_full_config_from_file() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("config.yaml");
    std::fs::write(&path, FULL).unwrap();

    let config = ConfigLoader::load_from(&path).await.unwrap();
    assert_eq!(config.positions.len(), 2);
    assert_eq!(config.locations, vec!["Remote", "Berlin"]);
    assert_eq!(config.phone_number(), "5550100");
    assert_eq!(config.rate.as_deref(), Some("50"));
    assert_eq!(config.uploads.resumes[0].keywords, vec!["rust", "go"]);
    assert_eq!(config.uploads.cover_letter, Some(PathBuf::from("/tmp/cover.pdf")));
    assert_eq!(config.output_path(), PathBuf::from("applied.csv"));
    assert_eq!(config.experience_level, vec![2, 3]);
    assert_eq!(config.days_old, 7);
    assert!(config.browser.headless);
    assert_eq!(config.browser.webdriver_url, "http://127.0.0.1:4444");
    assert_eq!(config.timing.before_apply_ms, 0);
    assert_eq!(config.timing.login_backoff_ms, 5_000);
    assert_eq!(config.limits.max_form_steps, 10);
    assert_eq!(config.limits.max_question_rounds, 3);
}

#[tokio::test]
async fn test_missing_file_is_io_error() {
    let dir = TempDir::new().unwrap();
    let err = ConfigLoader::load_from(&dir.path().join("absent.yaml"))
        .await
        .unwrap_err();
    assert!(matches!(err, ConfigError::Io(_)));
}

#[test]
fn test_redacted_config_serializes_without_secrets() {
    let config = ConfigLoader::parse(FULL).unwrap();
    let shown = serde_yaml::to_string(&config.redacted()).unwrap();
    assert!(!shown.contains("hunter2"));
    assert!(!shown.contains("me@example.com"));
    assert!(shown.contains("Rust Developer"));
}
