//! Local filesystem storage implementation.
//!
//! ## Storage Layout
//!
//! ```text
//! {root}/
//! ├── last_radar_pdf.txt             # Cache: last bulletin URL (plain text)
//! └── radares_moviles_hoy.geojson    # Output: today's FeatureCollection
//! ```
//!
//! Both files are replaced atomically (write to temp, then rename), so a
//! reader never sees a half-written document.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tokio::io::AsyncWriteExt;

use crate::error::{AppError, Result};
use crate::models::{FeatureCollection, OutputConfig};
use crate::storage::BulletinStore;

/// Local filesystem storage backend.
#[derive(Debug, Clone)]
pub struct LocalStorage {
    root_dir: PathBuf,
    cache_key: String,
    features_key: String,
}

impl LocalStorage {
    /// Create a new LocalStorage rooted at the given directory with default file names.
    pub fn new(root_dir: impl Into<PathBuf>) -> Self {
        let defaults = OutputConfig::default();
        Self {
            root_dir: root_dir.into(),
            cache_key: defaults.cache_file,
            features_key: defaults.features_file,
        }
    }

    /// Create a LocalStorage from output settings.
    pub fn from_config(output: &OutputConfig) -> Self {
        Self {
            root_dir: output.output_dir(),
            cache_key: output.cache_file.clone(),
            features_key: output.features_file.clone(),
        }
    }

    pub fn root_dir(&self) -> &Path {
        &self.root_dir
    }

    /// Full path of the output document.
    pub fn features_path(&self) -> PathBuf {
        self.path(&self.features_key)
    }

    /// Get the full path for a relative key.
    fn path(&self, key: &str) -> PathBuf {
        self.root_dir.join(key)
    }

    /// Ensure parent directory exists.
    async fn ensure_dir(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        Ok(())
    }

    /// Write bytes atomically (write to temp, then rename).
    async fn write_bytes(&self, key: &str, bytes: &[u8]) -> Result<()> {
        let path = self.path(key);
        self.ensure_dir(&path).await?;

        let tmp = path.with_extension("tmp");
        let mut file = tokio::fs::File::create(&tmp).await?;
        file.write_all(bytes).await?;
        file.flush().await?;
        drop(file);

        tokio::fs::rename(&tmp, &path).await?;
        Ok(())
    }

    /// Read bytes, returning None if file doesn't exist.
    async fn read_bytes(&self, key: &str) -> Result<Option<Vec<u8>>> {
        let path = self.path(key);
        match tokio::fs::read(&path).await {
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(AppError::Io(e)),
        }
    }

    /// Write the feature collection, returning where it landed.
    pub async fn write_features(&self, collection: &FeatureCollection) -> Result<PathBuf> {
        let bytes = serde_json::to_vec_pretty(collection)?;
        self.write_bytes(&self.features_key, &bytes).await?;
        Ok(self.features_path())
    }

    /// Read back the last written feature collection.
    pub async fn read_features(&self) -> Result<Option<FeatureCollection>> {
        match self.read_bytes(&self.features_key).await? {
            Some(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            None => Ok(None),
        }
    }
}

#[async_trait]
impl BulletinStore for LocalStorage {
    async fn load_last_known(&self) -> Result<Option<String>> {
        let Some(bytes) = self.read_bytes(&self.cache_key).await? else {
            return Ok(None);
        };
        let text = String::from_utf8_lossy(&bytes).trim().to_string();
        Ok((!text.is_empty()).then_some(text))
    }

    async fn save_last_known(&self, url: &str) -> Result<()> {
        self.write_bytes(&self.cache_key, format!("{}\n", url.trim()).as_bytes())
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Geometry, RadarFeature, RadarProperties};
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_write_and_read() {
        let tmp = TempDir::new().unwrap();
        let storage = LocalStorage::new(tmp.path());

        storage.write_bytes("test.txt", b"hello").await.unwrap();
        let data = storage.read_bytes("test.txt").await.unwrap();
        assert_eq!(data, Some(b"hello".to_vec()));
    }

    #[tokio::test]
    async fn test_read_nonexistent() {
        let tmp = TempDir::new().unwrap();
        let storage = LocalStorage::new(tmp.path());

        assert!(storage.read_bytes("nope.txt").await.unwrap().is_none());
        assert!(storage.load_last_known().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_last_known_round_trip_overwrites() {
        let tmp = TempDir::new().unwrap();
        let storage = LocalStorage::new(tmp.path().join("radars"));

        storage
            .save_last_known("https://example.org/radares-enero-2025.pdf")
            .await
            .unwrap();
        storage
            .save_last_known("https://example.org/radares-febrero-2025.pdf")
            .await
            .unwrap();

        assert_eq!(
            storage.load_last_known().await.unwrap().as_deref(),
            Some("https://example.org/radares-febrero-2025.pdf")
        );
    }

    #[tokio::test]
    async fn test_blank_cache_file_is_empty() {
        let tmp = TempDir::new().unwrap();
        let storage = LocalStorage::new(tmp.path());
        storage.write_bytes("last_radar_pdf.txt", b"  \n").await.unwrap();
        assert!(storage.load_last_known().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_features_written_atomically() {
        let tmp = TempDir::new().unwrap();
        let output = OutputConfig {
            output_dir: tmp.path().join("out").to_string_lossy().into_owned(),
            ..OutputConfig::default()
        };
        let storage = LocalStorage::from_config(&output);

        let collection = FeatureCollection {
            features: vec![RadarFeature {
                properties: RadarProperties {
                    name: "Calle Ancha".to_string(),
                    source: "test".to_string(),
                    bulletin: None,
                    date: None,
                },
                geometry: Geometry::LineString(vec![[-5.57, 42.6], [-5.56, 42.6]]),
            }],
        };

        let path = storage.write_features(&collection).await.unwrap();
        assert!(path.ends_with("radares_moviles_hoy.geojson"));
        assert!(!path.with_extension("tmp").exists());
        assert_eq!(storage.read_features().await.unwrap(), Some(collection));
    }
}
