use crate::webdriver::{self, WebDriverClient};
use async_trait::async_trait;
use easyapply_common::protocol::{Element, Locator, NavigationResult, WindowRect};
use easyapply_engine::backend::{Backend, BackendError};
use easyapply_engine::config::schema::BrowserConfig;
use fantoccini::Locator as WdLocator;
use fantoccini::elements::Element as WdElement;
use fantoccini::error::CmdError;
use std::collections::HashMap;
use std::path::Path;
use tracing::{debug, info};

/// Drives Chrome through a chromedriver-compatible WebDriver endpoint.
///
/// Element handles given to the engine are small integer ids into a
/// registry that is cleared whenever the page navigates.
pub struct WebDriverBackend {
    client: Option<WebDriverClient>,
    browser: BrowserConfig,
    elements: HashMap<u32, WdElement>,
    next_id: u32,
}

impl WebDriverBackend {
    pub fn new(browser: BrowserConfig) -> Self {
        Self {
            client: None,
            browser,
            elements: HashMap::new(),
            next_id: 1,
        }
    }

    pub fn with_url(webdriver_url: impl Into<String>) -> Self {
        Self::new(BrowserConfig {
            webdriver_url: webdriver_url.into(),
            ..BrowserConfig::default()
        })
    }

    pub fn browser(&self) -> &BrowserConfig {
        &self.browser
    }

    fn client(&self) -> Result<&WebDriverClient, BackendError> {
        self.client.as_ref().ok_or(BackendError::NotReady)
    }

    fn element(&self, element: &Element) -> Result<&WdElement, BackendError> {
        self.elements
            .get(&element.id)
            .ok_or(BackendError::ElementNotFound { id: element.id })
    }

    fn forget_elements(&mut self) {
        self.elements.clear();
    }

    async fn register(&mut self, found: Vec<WdElement>) -> Vec<Element> {
        let mut handles = Vec::with_capacity(found.len());
        for el in found {
            let text = el.text().await.unwrap_or_default();
            let id = self.next_id;
            self.next_id = self.next_id.wrapping_add(1);
            self.elements.insert(id, el);
            handles.push(Element { id, text });
        }
        handles
    }

    async fn navigation_result(&self) -> Result<NavigationResult, BackendError> {
        let client = self.client()?;
        let title = client.client.title().await.unwrap_or_default();
        let url = client
            .client
            .current_url()
            .await
            .map(|u| u.to_string())
            .unwrap_or_default();

        Ok(NavigationResult {
            url,
            title,
            status: 200,
        })
    }
}

/// Translate a locator into the strategies WebDriver understands natively.
fn native_locator(locator: &Locator) -> Result<(bool, String), BackendError> {
    match locator {
        Locator::XPath(expr) => Ok((true, expr.clone())),
        other => other
            .as_css()
            .map(|css| (false, css))
            .ok_or_else(|| BackendError::SelectorInvalid {
                selector: other.to_string(),
            }),
    }
}

fn wd_locator(xpath: bool, selector: &str) -> WdLocator<'_> {
    if xpath {
        WdLocator::XPath(selector)
    } else {
        WdLocator::Css(selector)
    }
}

fn element_error(id: u32, err: CmdError) -> BackendError {
    let msg = err.to_string();
    if msg.contains("stale element") {
        BackendError::ElementStale { id }
    } else if msg.contains("not interactable") || msg.contains("click intercepted") {
        BackendError::ElementNotInteractable { id, reason: msg }
    } else {
        BackendError::Other(msg)
    }
}

fn lookup_error(locator: &Locator, err: CmdError) -> BackendError {
    let msg = err.to_string();
    if msg.contains("invalid selector") {
        BackendError::SelectorInvalid {
            selector: locator.to_string(),
        }
    } else {
        BackendError::Other(msg)
    }
}

#[async_trait]
impl Backend for WebDriverBackend {
    async fn launch(&mut self) -> Result<(), BackendError> {
        let url = self.browser.webdriver_url.clone();
        info!("Connecting to WebDriver at {}...", url);
        webdriver::wait_for_driver(&url)
            .await
            .map_err(|e| BackendError::Other(e.to_string()))?;

        let client = WebDriverClient::connect(&url, webdriver::chrome_capabilities(&self.browser))
            .await
            .map_err(|e| BackendError::Other(e.to_string()))?;
        self.client = Some(client);
        Ok(())
    }

    async fn close(&mut self) -> Result<(), BackendError> {
        self.forget_elements();
        if let Some(client) = self.client.take() {
            client
                .close()
                .await
                .map_err(|e| BackendError::Other(e.to_string()))?;
        }
        Ok(())
    }

    async fn is_ready(&self) -> bool {
        self.client.is_some()
    }

    async fn navigate(&mut self, url: &str) -> Result<NavigationResult, BackendError> {
        self.forget_elements();
        info!("Navigating to: {}", url);
        self.client()?
            .client
            .goto(url)
            .await
            .map_err(|e| BackendError::Navigation(e.to_string()))?;

        self.navigation_result().await
    }

    async fn refresh(&mut self) -> Result<NavigationResult, BackendError> {
        self.forget_elements();
        self.client()?
            .client
            .refresh()
            .await
            .map_err(|e| BackendError::Navigation(format!("refresh failed: {}", e)))?;

        self.navigation_result().await
    }

    async fn current_url(&mut self) -> Result<String, BackendError> {
        self.client()?
            .client
            .current_url()
            .await
            .map(|u| u.to_string())
            .map_err(|e| BackendError::Other(e.to_string()))
    }

    async fn title(&mut self) -> Result<String, BackendError> {
        self.client()?
            .client
            .title()
            .await
            .map_err(|e| BackendError::Other(e.to_string()))
    }

    async fn page_source(&mut self) -> Result<String, BackendError> {
        self.client()?
            .client
            .source()
            .await
            .map_err(|e| BackendError::Other(e.to_string()))
    }

    async fn find_elements(&mut self, locator: &Locator) -> Result<Vec<Element>, BackendError> {
        let (xpath, selector) = native_locator(locator)?;
        let found = self
            .client()?
            .client
            .find_all(wd_locator(xpath, &selector))
            .await
            .map_err(|e| lookup_error(locator, e))?;
        debug!("{} matched {} elements", locator, found.len());
        Ok(self.register(found).await)
    }

    async fn find_within(
        &mut self,
        parent: &Element,
        locator: &Locator,
    ) -> Result<Vec<Element>, BackendError> {
        let (xpath, selector) = native_locator(locator)?;
        let found = self
            .element(parent)?
            .find_all(wd_locator(xpath, &selector))
            .await
            .map_err(|e| element_error(parent.id, e))?;
        Ok(self.register(found).await)
    }

    async fn attribute(
        &mut self,
        element: &Element,
        name: &str,
    ) -> Result<Option<String>, BackendError> {
        self.element(element)?
            .attr(name)
            .await
            .map_err(|e| element_error(element.id, e))
    }

    async fn click(&mut self, element: &Element) -> Result<(), BackendError> {
        self.element(element)?
            .click()
            .await
            .map_err(|e| element_error(element.id, e))
    }

    async fn js_click(&mut self, element: &Element) -> Result<(), BackendError> {
        let arg = serde_json::to_value(self.element(element)?)?;
        self.client()?
            .client
            .execute("arguments[0].click();", vec![arg])
            .await
            .map_err(|e| BackendError::ScriptError(e.to_string()))?;
        Ok(())
    }

    async fn clear(&mut self, element: &Element) -> Result<(), BackendError> {
        self.element(element)?
            .clear()
            .await
            .map_err(|e| element_error(element.id, e))
    }

    async fn type_text(&mut self, element: &Element, text: &str) -> Result<(), BackendError> {
        self.element(element)?
            .send_keys(text)
            .await
            .map_err(|e| element_error(element.id, e))
    }

    async fn upload_file(&mut self, element: &Element, path: &Path) -> Result<(), BackendError> {
        let absolute = std::path::absolute(path)?;
        self.element(element)?
            .send_keys(&absolute.to_string_lossy())
            .await
            .map_err(|e| element_error(element.id, e))
    }

    async fn execute_script(&mut self, script: &str) -> Result<serde_json::Value, BackendError> {
        self.client()?
            .client
            .execute(script, vec![])
            .await
            .map_err(|e| BackendError::ScriptError(e.to_string()))
    }

    async fn screenshot(&mut self) -> Result<Vec<u8>, BackendError> {
        self.client()?
            .client
            .screenshot()
            .await
            .map_err(|e| BackendError::Other(format!("Screenshot failed: {}", e)))
    }

    async fn delete_all_cookies(&mut self) -> Result<(), BackendError> {
        self.client()?
            .client
            .delete_all_cookies()
            .await
            .map_err(|e| BackendError::Other(format!("Delete cookies failed: {}", e)))
    }

    async fn set_window_rect(&mut self, rect: WindowRect) -> Result<(), BackendError> {
        let x = u32::try_from(rect.x.max(0)).unwrap_or(u32::MAX);
        let y = u32::try_from(rect.y.max(0)).unwrap_or(u32::MAX);
        self.client()?
            .client
            .set_window_rect(x, y, rect.width, rect.height)
            .await
            .map_err(|e| BackendError::Other(format!("set_window_rect failed: {}", e)))
    }
}
