//! Persistence for the last-known-good bulletin and the output document.
//!
//! ## Directory Structure
//!
//! ```text
//! radars/
//! ├── config.toml                    # Optional configuration
//! ├── last_radar_pdf.txt             # Last bulletin URL that worked
//! └── radares_moviles_hoy.geojson    # Today's feature collection
//! ```

pub mod local;

use std::sync::Mutex;

use async_trait::async_trait;

use crate::error::Result;

// Re-export for convenience
pub use local::LocalStorage;

/// Read/write access to the last successfully used bulletin URL.
///
/// Read once when live discovery fails, overwritten after each
/// successful discovery.
#[async_trait]
pub trait BulletinStore: Send + Sync {
    /// The cached URL, if any.
    async fn load_last_known(&self) -> Result<Option<String>>;

    /// Replace the cached URL.
    async fn save_last_known(&self, url: &str) -> Result<()>;
}

/// Process-local store for tests and dry runs.
#[derive(Debug, Default)]
pub struct MemoryStore {
    url: Mutex<Option<String>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_url(url: impl Into<String>) -> Self {
        Self {
            url: Mutex::new(Some(url.into())),
        }
    }

    pub fn current(&self) -> Option<String> {
        self.url.lock().map(|guard| guard.clone()).unwrap_or_default()
    }
}

#[async_trait]
impl BulletinStore for MemoryStore {
    async fn load_last_known(&self) -> Result<Option<String>> {
        Ok(self.current())
    }

    async fn save_last_known(&self, url: &str) -> Result<()> {
        if let Ok(mut guard) = self.url.lock() {
            *guard = Some(url.to_string());
        }
        Ok(())
    }
}
