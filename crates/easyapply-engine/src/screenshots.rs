use crate::backend::Backend;
use chrono::Local;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// Writes diagnostic screenshots. Failures are logged, never propagated.
#[derive(Debug, Clone)]
pub struct ScreenshotStore {
    dir: PathBuf,
}

impl ScreenshotStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Capture the current page as `<dir>/<label>_<timestamp>.png`.
    pub async fn capture<B: Backend + ?Sized>(&self, backend: &mut B, label: &str) -> Option<PathBuf> {
        let bytes = match backend.screenshot().await {
            Ok(bytes) => bytes,
            Err(e) => {
                warn!("Could not take screenshot '{}': {}", label, e);
                return None;
            }
        };
        if let Err(e) = tokio::fs::create_dir_all(&self.dir).await {
            warn!("Could not create {}: {}", self.dir.display(), e);
            return None;
        }
        let path = self.dir.join(file_name(label));
        match tokio::fs::write(&path, bytes).await {
            Ok(()) => {
                info!("Saved screenshot to {}", path.display());
                Some(path)
            }
            Err(e) => {
                warn!("Could not write {}: {}", path.display(), e);
                None
            }
        }
    }
}

fn file_name(label: &str) -> String {
    let label: String = label
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '-' { c } else { '_' })
        .collect();
    format!("{}_{}.png", label, Local::now().format("%Y%m%d_%H%M%S_%3f"))
}
