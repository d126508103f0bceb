/// Errors raised by a DOM driver while talking to the browser.
#[derive(thiserror::Error, Debug, Clone)]
pub enum BackendError {
    // ============================================================
    // Navigation Errors
    // ============================================================
    #[error("Navigation failed: {0}")]
    Navigation(String),

    // ============================================================
    // Element Errors
    // ============================================================
    #[error("No element matches {locator}")]
    NoMatch { locator: String },

    #[error("Element {id} not found")]
    ElementNotFound { id: u32 },

    #[error("Element {id} is stale (removed from DOM)")]
    ElementStale { id: u32 },

    #[error("Element {id} is not interactable: {reason}")]
    ElementNotInteractable { id: u32, reason: String },

    #[error("Invalid selector: {selector}")]
    SelectorInvalid { selector: String },

    // ============================================================
    // Execution Errors
    // ============================================================
    #[error("Script execution error: {0}")]
    ScriptError(String),

    #[error("Timeout: {operation}")]
    TimeoutWithContext { operation: String },

    // ============================================================
    // System Errors
    // ============================================================
    #[error("Not ready")]
    NotReady,

    #[error("IO error: {0}")]
    Io(String),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Other: {0}")]
    Other(String),

    #[error("Not supported: {0}")]
    NotSupported(String),
}

impl From<std::io::Error> for BackendError {
    fn from(err: std::io::Error) -> Self {
        BackendError::Io(err.to_string())
    }
}

impl From<serde_json::Error> for BackendError {
    fn from(err: serde_json::Error) -> Self {
        BackendError::Serialization(err.to_string())
    }
}

impl BackendError {
    /// Short machine-readable code, used in log lines and screenshot names.
    pub fn code(&self) -> &'static str {
        match self {
            BackendError::Navigation(_) => "NAVIGATION_ERROR",
            BackendError::NoMatch { .. } | BackendError::ElementNotFound { .. } => {
                "ELEMENT_NOT_FOUND"
            }
            BackendError::ElementStale { .. } => "ELEMENT_STALE",
            BackendError::ElementNotInteractable { .. } => "ELEMENT_NOT_INTERACTABLE",
            BackendError::SelectorInvalid { .. } => "SELECTOR_INVALID",
            BackendError::ScriptError(_) => "SCRIPT_ERROR",
            BackendError::TimeoutWithContext { .. } => "TIMEOUT",
            BackendError::NotReady => "NOT_READY",
            BackendError::Io(_) => "IO_ERROR",
            BackendError::Serialization(_) => "SERIALIZATION_ERROR",
            BackendError::Other(_) => "INTERNAL_ERROR",
            BackendError::NotSupported(_) => "NOT_SUPPORTED",
        }
    }

    /// Whether the error means the element simply was not there.
    ///
    /// The form driver treats these as "this step did not apply" and moves on.
    pub fn is_missing_element(&self) -> bool {
        matches!(
            self,
            BackendError::NoMatch { .. }
                | BackendError::ElementNotFound { .. }
                | BackendError::ElementStale { .. }
        )
    }
}
