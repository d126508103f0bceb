use async_trait::async_trait;
pub use easyapply_common::error::backend_error::BackendError;
use easyapply_common::protocol::{Element, Locator, NavigationResult, WindowRect};
use std::path::Path;

/// The capability set the automation logic needs from a browser driver.
///
/// Everything above this trait (login, search, the form driver) is written
/// against it, so tests can substitute a scripted page model.
#[async_trait]
pub trait Backend: Send {
    /// Launch the backend (connect to the driver, open a session).
    async fn launch(&mut self) -> Result<(), BackendError>;

    /// Close the backend and cleanup resources.
    async fn close(&mut self) -> Result<(), BackendError>;

    /// Check if the backend is ready to accept commands.
    async fn is_ready(&self) -> bool;

    /// Navigate to a specific URL.
    async fn navigate(&mut self, url: &str) -> Result<NavigationResult, BackendError>;

    /// Refresh the current page.
    async fn refresh(&mut self) -> Result<NavigationResult, BackendError>;

    async fn current_url(&mut self) -> Result<String, BackendError>;

    async fn title(&mut self) -> Result<String, BackendError>;

    /// Serialized DOM of the current page.
    async fn page_source(&mut self) -> Result<String, BackendError>;

    /// All elements on the page matching `locator`. An empty vector is not an error.
    async fn find_elements(&mut self, locator: &Locator) -> Result<Vec<Element>, BackendError>;

    /// All descendants of `parent` matching `locator`.
    async fn find_within(
        &mut self,
        parent: &Element,
        locator: &Locator,
    ) -> Result<Vec<Element>, BackendError>;

    async fn attribute(
        &mut self,
        element: &Element,
        name: &str,
    ) -> Result<Option<String>, BackendError>;

    async fn click(&mut self, element: &Element) -> Result<(), BackendError>;

    /// Click through `element.click()` in page script, bypassing overlay checks.
    async fn js_click(&mut self, element: &Element) -> Result<(), BackendError> {
        self.click(element).await
    }

    async fn clear(&mut self, element: &Element) -> Result<(), BackendError>;

    async fn type_text(&mut self, element: &Element, text: &str) -> Result<(), BackendError>;

    /// Set a file input's value to a local path.
    async fn upload_file(&mut self, element: &Element, path: &Path) -> Result<(), BackendError>;

    /// Execute a script in the browser context.
    async fn execute_script(&mut self, _script: &str) -> Result<serde_json::Value, BackendError> {
        Err(BackendError::NotSupported("execute_script".into()))
    }

    /// Capture a screenshot of the current viewport as PNG bytes.
    async fn screenshot(&mut self) -> Result<Vec<u8>, BackendError>;

    async fn delete_all_cookies(&mut self) -> Result<(), BackendError> {
        Err(BackendError::NotSupported("delete_all_cookies".into()))
    }

    async fn set_window_rect(&mut self, _rect: WindowRect) -> Result<(), BackendError> {
        Err(BackendError::NotSupported("set_window_rect".into()))
    }

    /// First element matching `locator`, or `NoMatch`.
    async fn find_element(&mut self, locator: &Locator) -> Result<Element, BackendError> {
        self.find_elements(locator)
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| BackendError::NoMatch {
                locator: locator.to_string(),
            })
    }

    async fn is_present(&mut self, locator: &Locator) -> Result<bool, BackendError> {
        Ok(!self.find_elements(locator).await?.is_empty())
    }
}

/// Presence check that treats driver failures as absence.
///
/// The form driver only cares whether a marker is visible right now; a lookup
/// that fails is the same as a marker that is not there.
pub async fn marker_visible<B: Backend + ?Sized>(backend: &mut B, locator: &Locator) -> bool {
    match backend.is_present(locator).await {
        Ok(present) => present,
        Err(e) => {
            tracing::debug!("Presence check for {} failed: {}", locator, e);
            false
        }
    }
}

/// Page source, or an empty string if the driver cannot produce it.
pub async fn source_or_empty<B: Backend + ?Sized>(backend: &mut B) -> String {
    backend.page_source().await.unwrap_or_default()
}
