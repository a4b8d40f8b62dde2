//! Document sources
//!
//! A document's `file_path` is resolved to bytes by a [`DocumentSource`]:
//! plain and `file://` paths are read from disk, `http(s)://` URLs are fetched.

use std::path::{Path, PathBuf};
use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;
use tracing::debug;
use url::Url;

#[derive(Debug, Error)]
pub enum SourceError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("failed to fetch {url}: {message}")]
    Http { url: String, message: String },
    #[error("unsupported document location '{0}'")]
    Unsupported(String),
}

/// Fetches the raw bytes of a recording.
#[async_trait]
pub trait DocumentSource: Send + Sync {
    async fn fetch(&self, location: &str) -> Result<Vec<u8>, SourceError>;
}

/// Reads recordings from the local filesystem, resolving relative paths against `root`.
#[derive(Debug, Clone, Default)]
pub struct LocalFileSource {
    root: Option<PathBuf>,
}

impl LocalFileSource {
    pub fn new(root: Option<PathBuf>) -> Self {
        Self { root }
    }

    fn resolve(&self, path: &Path) -> PathBuf {
        match &self.root {
            Some(root) if path.is_relative() => root.join(path),
            _ => path.to_path_buf(),
        }
    }

    async fn read(&self, path: &Path) -> Result<Vec<u8>, SourceError> {
        let path = self.resolve(path);
        debug!(path = %path.display(), "Reading local recording");
        tokio::fs::read(&path)
            .await
            .map_err(|source| SourceError::Io { path, source })
    }
}

#[async_trait]
impl DocumentSource for LocalFileSource {
    async fn fetch(&self, location: &str) -> Result<Vec<u8>, SourceError> {
        self.read(Path::new(location)).await
    }
}

/// Downloads recordings over HTTP(S).
#[derive(Debug, Clone)]
pub struct HttpDocumentSource {
    client: reqwest::Client,
}

impl HttpDocumentSource {
    pub fn new(timeout: Duration) -> Result<Self, SourceError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| SourceError::Http {
                url: String::new(),
                message: e.to_string(),
            })?;
        Ok(Self { client })
    }
}

#[async_trait]
impl DocumentSource for HttpDocumentSource {
    async fn fetch(&self, location: &str) -> Result<Vec<u8>, SourceError> {
        let http_error = |message: String| SourceError::Http {
            url: location.to_string(),
            message,
        };

        let response = self
            .client
            .get(location)
            .send()
            .await
            .map_err(|e| http_error(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(http_error(format!("status {}", status.as_u16())));
        }

        let bytes = response
            .bytes()
            .await
            .map_err(|e| http_error(e.to_string()))?;
        Ok(bytes.to_vec())
    }
}

/// Routes a location to the local or HTTP source by URL scheme.
#[derive(Debug, Clone)]
pub struct DispatchingSource {
    local: LocalFileSource,
    http: HttpDocumentSource,
}

impl DispatchingSource {
    pub fn new(local: LocalFileSource, http: HttpDocumentSource) -> Self {
        Self { local, http }
    }
}

enum Location {
    Local(PathBuf),
    Remote,
}

fn classify(location: &str) -> Result<Location, SourceError> {
    match Url::parse(location) {
        Ok(url) => match url.scheme() {
            "http" | "https" => Ok(Location::Remote),
            "file" => url
                .to_file_path()
                .map(Location::Local)
                .map_err(|_| SourceError::Unsupported(location.to_string())),
            // Single-letter schemes are Windows drive letters.
            scheme if scheme.len() == 1 => Ok(Location::Local(PathBuf::from(location))),
            _ => Err(SourceError::Unsupported(location.to_string())),
        },
        Err(_) => Ok(Location::Local(PathBuf::from(location))),
    }
}

#[async_trait]
impl DocumentSource for DispatchingSource {
    async fn fetch(&self, location: &str) -> Result<Vec<u8>, SourceError> {
        match classify(location)? {
            Location::Local(path) => self.local.read(&path).await,
            Location::Remote => self.http.fetch(location).await,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classifies_locations_by_scheme() {
        assert!(matches!(
            classify("https://files.example.com/a.csv"),
            Ok(Location::Remote)
        ));
        assert!(matches!(classify("data/run.csv"), Ok(Location::Local(_))));
        assert!(matches!(classify("/tmp/run.csv"), Ok(Location::Local(_))));
        assert!(matches!(
            classify("file:///tmp/run.csv"),
            Ok(Location::Local(path)) if path == Path::new("/tmp/run.csv")
        ));
        assert!(matches!(
            classify("s3://bucket/run.csv"),
            Err(SourceError::Unsupported(_))
        ));
    }

    #[tokio::test]
    async fn local_source_resolves_relative_paths() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("run.csv"), "0,1\n").unwrap();

        let source = LocalFileSource::new(Some(dir.path().to_path_buf()));
        assert_eq!(source.fetch("run.csv").await.unwrap(), b"0,1\n");
    }

    #[tokio::test]
    async fn missing_file_is_an_io_error() {
        let source = LocalFileSource::default();
        assert!(matches!(
            source.fetch("/definitely/not/here.csv").await,
            Err(SourceError::Io { .. })
        ));
    }
}
