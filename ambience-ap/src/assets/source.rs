//! Asset sources
//!
//! An [`AssetSource`] resolves a bare asset name (`main`, `main-kicks`,
//! `ahh`) to the raw bytes of `{name}.{extension}`. Failures are reported as
//! [`FetchError`] so the loader can tell a missing asset from a broken one.

use async_trait::async_trait;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::path::PathBuf;
use std::time::Duration;
use tracing::debug;

/// Why an asset could not be fetched
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FetchError {
    /// Non-success response (404 for a missing file)
    #[error("HTTP {0}")]
    Status(u16),

    /// Transport or filesystem failure
    #[error("network error: {0}")]
    Network(String),
}

impl FetchError {
    pub fn status(&self) -> Option<u16> {
        match self {
            FetchError::Status(code) => Some(*code),
            FetchError::Network(_) => None,
        }
    }
}

/// Named audio asset delivery
#[async_trait]
pub trait AssetSource: Send + Sync {
    async fn fetch(&self, name: &str) -> Result<Vec<u8>, FetchError>;

    /// Human-readable origin for logs
    fn describe(&self) -> String;
}

/// Assets from a local directory
#[derive(Debug, Clone)]
pub struct DirAssets {
    root: PathBuf,
    extension: String,
}

impl DirAssets {
    pub fn new(root: impl Into<PathBuf>, extension: impl Into<String>) -> Self {
        Self {
            root: root.into(),
            extension: extension.into(),
        }
    }

    fn path_for(&self, name: &str) -> PathBuf {
        self.root.join(format!("{}.{}", name, self.extension))
    }
}

#[async_trait]
impl AssetSource for DirAssets {
    async fn fetch(&self, name: &str) -> Result<Vec<u8>, FetchError> {
        let path = self.path_for(name);
        debug!("Reading asset {}", path.display());

        tokio::fs::read(&path).await.map_err(|e| match e.kind() {
            std::io::ErrorKind::NotFound => FetchError::Status(404),
            std::io::ErrorKind::PermissionDenied => FetchError::Status(403),
            _ => FetchError::Network(format!("{}: {}", path.display(), e)),
        })
    }

    fn describe(&self) -> String {
        format!("directory {}", self.root.display())
    }
}

/// Assets served over HTTP (`{base_url}/{name}.{extension}`)
#[derive(Debug, Clone)]
pub struct HttpAssets {
    client: reqwest::Client,
    base_url: String,
    extension: String,
}

impl HttpAssets {
    pub fn new(base_url: impl Into<String>, extension: impl Into<String>) -> Result<Self, FetchError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(|e| FetchError::Network(e.to_string()))?;

        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            extension: extension.into(),
        })
    }

    fn url_for(&self, name: &str) -> String {
        format!("{}/{}.{}", self.base_url, name, self.extension)
    }
}

#[async_trait]
impl AssetSource for HttpAssets {
    async fn fetch(&self, name: &str) -> Result<Vec<u8>, FetchError> {
        let url = self.url_for(name);
        debug!(url = %url, "Fetching asset");

        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| FetchError::Network(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Status(status.as_u16()));
        }

        let bytes = response
            .bytes()
            .await
            .map_err(|e| FetchError::Network(e.to_string()))?;
        Ok(bytes.to_vec())
    }

    fn describe(&self) -> String {
        format!("http {}", self.base_url)
    }
}

/// In-memory assets with optional artificial latency
#[derive(Debug, Default)]
pub struct MemoryAssets {
    files: RwLock<HashMap<String, Vec<u8>>>,
    latency: RwLock<HashMap<String, Duration>>,
}

impl MemoryAssets {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, name: impl Into<String>, bytes: Vec<u8>) {
        self.files.write().insert(name.into(), bytes);
    }

    pub fn remove(&self, name: &str) {
        self.files.write().remove(name);
    }

    /// Delay every fetch of `name` by `delay`
    pub fn set_latency(&self, name: impl Into<String>, delay: Duration) {
        self.latency.write().insert(name.into(), delay);
    }
}

#[async_trait]
impl AssetSource for MemoryAssets {
    async fn fetch(&self, name: &str) -> Result<Vec<u8>, FetchError> {
        let delay = self.latency.read().get(name).copied();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        self.files.read().get(name).cloned().ok_or(FetchError::Status(404))
    }

    fn describe(&self) -> String {
        format!("memory ({} assets)", self.files.read().len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_dir_assets_missing_file_is_404() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("main.wav"), b"RIFF").unwrap();

        let source = DirAssets::new(dir.path(), "wav");
        assert_eq!(source.fetch("main").await.unwrap(), b"RIFF");
        assert_eq!(source.fetch("main-kicks").await, Err(FetchError::Status(404)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_memory_assets_latency() {
        let source = MemoryAssets::new();
        source.insert("login", vec![1, 2, 3]);
        source.set_latency("login", Duration::from_millis(300));

        let started = tokio::time::Instant::now();
        assert_eq!(source.fetch("login").await.unwrap(), vec![1, 2, 3]);
        assert!(started.elapsed() >= Duration::from_millis(300));
        assert_eq!(source.fetch("create").await, Err(FetchError::Status(404)));
    }

    #[test]
    fn test_http_url_layout() {
        let source = HttpAssets::new("http://localhost:8000/static/sounds/music/", "wav").unwrap();
        assert_eq!(
            source.url_for("main-kicks"),
            "http://localhost:8000/static/sounds/music/main-kicks.wav"
        );
    }

    #[test]
    fn test_fetch_error_status() {
        assert_eq!(FetchError::Status(404).status(), Some(404));
        assert_eq!(FetchError::Network("reset".into()).status(), None);
    }
}
