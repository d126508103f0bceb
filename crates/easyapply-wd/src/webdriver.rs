use easyapply_engine::config::schema::BrowserConfig;
use fantoccini::{Client, ClientBuilder};
use serde_json::{Map, Value, json};
use std::time::Duration;
use tokio::time::sleep;
use tracing::{info, warn};

type BoxError = Box<dyn std::error::Error + Send + Sync>;

const STATUS_ATTEMPTS: u32 = 30;
const STATUS_INTERVAL: Duration = Duration::from_millis(200);

pub struct WebDriverClient {
    pub client: Client,
}

impl WebDriverClient {
    pub async fn connect(url: &str, capabilities: Map<String, Value>) -> Result<Self, BoxError> {
        let client = ClientBuilder::native()
            .capabilities(capabilities)
            .connect(url)
            .await
            .map_err(|e| format!("Failed to connect to WebDriver at {}: {}", url, e))?;

        Ok(Self { client })
    }

    pub async fn close(self) -> Result<(), BoxError> {
        self.client
            .close()
            .await
            .map_err(|e| format!("Failed to close session: {}", e))?;
        Ok(())
    }
}

/// Chrome options for an automation session that looks like a regular browser.
///
/// The profile directory keeps cookies between runs so the site does not
/// treat every launch as a new device.
pub fn chrome_capabilities(browser: &BrowserConfig) -> Map<String, Value> {
    let mut args = vec![
        "--disable-blink-features=AutomationControlled".to_string(),
        "--disable-extensions".to_string(),
        "--ignore-certificate-errors".to_string(),
        "--no-sandbox".to_string(),
        "--start-maximized".to_string(),
    ];
    if let Some(profile) = &browser.profile_dir {
        // Chrome resolves relative profile paths against its own cwd.
        let profile = std::path::absolute(profile).unwrap_or_else(|_| profile.clone());
        args.push(format!("--user-data-dir={}", profile.display()));
    }
    if browser.headless {
        args.push("--headless=new".to_string());
        args.push("--window-size=1920,1080".to_string());
    }

    let mut caps = Map::new();
    caps.insert("browserName".into(), json!("chrome"));
    caps.insert(
        "goog:chromeOptions".into(),
        json!({
            "args": args,
            "excludeSwitches": ["enable-automation"],
            "useAutomationExtension": false,
        }),
    );
    caps
}

/// Poll the driver's `/status` endpoint until it reports ready.
pub async fn wait_for_driver(url: &str) -> Result<(), BoxError> {
    let status_url = format!("{}/status", url.trim_end_matches('/'));
    let client = reqwest::Client::new();

    for attempt in 1..=STATUS_ATTEMPTS {
        match client.get(&status_url).send().await {
            Ok(resp) if resp.status().is_success() => {
                info!("WebDriver ready after {} attempts", attempt);
                return Ok(());
            }
            Ok(resp) => {
                warn!(
                    "WebDriver responded with {} (attempt {})",
                    resp.status(),
                    attempt
                );
            }
            Err(_) => {
                if attempt % 5 == 0 {
                    info!("Waiting for WebDriver at {}... (attempt {})", url, attempt);
                }
            }
        }
        sleep(STATUS_INTERVAL).await;
    }

    Err(format!("WebDriver at {} did not become ready", url).into())
}
