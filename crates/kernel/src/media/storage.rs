//! File storage backends.
//!
//! Media files are addressed by URI (`local://original_images/...`). The
//! local backend maps URIs under a base directory; the memory backend keeps
//! bytes in a map for tests and database-less runs.

use std::path::{Component, Path, PathBuf};

use anyhow::{Context, Result};
use async_trait::async_trait;
use dashmap::DashMap;
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tracing::{debug, warn};

/// File storage backend trait.
#[async_trait]
pub trait FileStorage: Send + Sync {
    /// Write data to storage at the given URI.
    async fn write(&self, uri: &str, data: &[u8]) -> Result<()>;

    /// Read data from storage at the given URI.
    async fn read(&self, uri: &str) -> Result<Vec<u8>>;

    /// Delete a file from storage. Missing files are not an error.
    async fn delete(&self, uri: &str) -> Result<()>;

    async fn exists(&self, uri: &str) -> Result<bool>;

    /// Get the public URL for a file.
    fn public_url(&self, uri: &str) -> String;

    /// URI scheme handled by this backend.
    fn scheme(&self) -> &'static str;

    /// Build a fresh URI under `folder` for an uploaded `filename`.
    fn generate_uri(&self, folder: &str, filename: &str) -> String {
        // The leading v7 digits are the timestamp; take random bits.
        let unique_id = uuid::Uuid::now_v7().simple().to_string();
        format!(
            "{}://{}/{}_{}",
            self.scheme(),
            folder.trim_matches('/'),
            &unique_id[20..],
            sanitize_filename(filename)
        )
    }
}

/// Strip a `scheme://` prefix and reject traversal components.
fn relative_path<'a>(scheme: &str, uri: &'a str) -> Result<&'a str> {
    let path = uri
        .strip_prefix(scheme)
        .and_then(|rest| rest.strip_prefix("://"))
        .with_context(|| format!("invalid storage URI, must start with {scheme}://"))?;
    for component in Path::new(path).components() {
        if !matches!(component, Component::Normal(_)) {
            anyhow::bail!("directory traversal not allowed in storage URI");
        }
    }
    Ok(path)
}

/// Reduce an uploaded filename to a safe single path segment.
pub fn sanitize_filename(filename: &str) -> String {
    let name = Path::new(filename)
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or(filename);

    let safe: String = name
        .chars()
        .map(|c| match c {
            'a'..='z' | 'A'..='Z' | '0'..='9' | '.' | '-' | '_' => c,
            _ => '_',
        })
        .take(200)
        .collect();
    let safe = safe.trim_start_matches('.').to_string();
    if safe.is_empty() { "file".to_string() } else { safe }
}

/// Local filesystem storage.
pub struct LocalFileStorage {
    base_path: PathBuf,
    base_url: String,
}

impl LocalFileStorage {
    pub fn new(base_path: impl Into<PathBuf>, base_url: impl Into<String>) -> Self {
        Self {
            base_path: base_path.into(),
            base_url: base_url.into(),
        }
    }

    fn resolve(&self, uri: &str) -> Result<PathBuf> {
        Ok(self.base_path.join(relative_path("local", uri)?))
    }
}

#[async_trait]
impl FileStorage for LocalFileStorage {
    async fn write(&self, uri: &str, data: &[u8]) -> Result<()> {
        let path = self.resolve(uri)?;

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .await
                .context("failed to create directories")?;
        }

        let mut file = fs::File::create(&path)
            .await
            .context("failed to create file")?;
        file.write_all(data).await.context("failed to write file")?;
        file.flush().await.context("failed to flush file")?;

        debug!(uri = %uri, path = ?path, size = data.len(), "file written");
        Ok(())
    }

    async fn read(&self, uri: &str) -> Result<Vec<u8>> {
        let path = self.resolve(uri)?;
        let data = fs::read(&path).await.context("failed to read file")?;
        debug!(uri = %uri, size = data.len(), "file read");
        Ok(data)
    }

    async fn delete(&self, uri: &str) -> Result<()> {
        let path = self.resolve(uri)?;
        match fs::remove_file(&path).await {
            Ok(()) => debug!(uri = %uri, "file deleted"),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                warn!(uri = %uri, "file not found for deletion");
            }
            Err(e) => return Err(e).context("failed to delete file"),
        }
        Ok(())
    }

    async fn exists(&self, uri: &str) -> Result<bool> {
        let path = self.resolve(uri)?;
        Ok(fs::try_exists(&path).await.unwrap_or(false))
    }

    fn public_url(&self, uri: &str) -> String {
        let path = uri.strip_prefix("local://").unwrap_or(uri);
        format!("{}/{}", self.base_url.trim_end_matches('/'), path)
    }

    fn scheme(&self) -> &'static str {
        "local"
    }
}

impl std::fmt::Debug for LocalFileStorage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LocalFileStorage")
            .field("base_path", &self.base_path)
            .field("base_url", &self.base_url)
            .finish()
    }
}

/// In-memory storage.
#[derive(Debug, Default)]
pub struct MemoryFileStorage {
    files: DashMap<String, Vec<u8>>,
    base_url: String,
}

impl MemoryFileStorage {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            files: DashMap::new(),
            base_url: base_url.into(),
        }
    }

    pub fn len(&self) -> usize {
        self.files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }
}

#[async_trait]
impl FileStorage for MemoryFileStorage {
    async fn write(&self, uri: &str, data: &[u8]) -> Result<()> {
        let path = relative_path("memory", uri)?;
        self.files.insert(path.to_string(), data.to_vec());
        Ok(())
    }

    async fn read(&self, uri: &str) -> Result<Vec<u8>> {
        let path = relative_path("memory", uri)?;
        self.files
            .get(path)
            .map(|data| data.value().clone())
            .with_context(|| format!("file not found: {uri}"))
    }

    async fn delete(&self, uri: &str) -> Result<()> {
        let path = relative_path("memory", uri)?;
        self.files.remove(path);
        Ok(())
    }

    async fn exists(&self, uri: &str) -> Result<bool> {
        let path = relative_path("memory", uri)?;
        Ok(self.files.contains_key(path))
    }

    fn public_url(&self, uri: &str) -> String {
        let path = uri.strip_prefix("memory://").unwrap_or(uri);
        format!("{}/{}", self.base_url.trim_end_matches('/'), path)
    }

    fn scheme(&self) -> &'static str {
        "memory"
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn sanitize_strips_paths_and_unsafe_chars() {
        assert_eq!(sanitize_filename("../../etc/passwd"), "passwd");
        assert_eq!(sanitize_filename("Fachada principal.JPG"), "Fachada_principal.JPG");
        assert_eq!(sanitize_filename(".htaccess"), "htaccess");
        assert_eq!(sanitize_filename(""), "file");
    }

    #[test]
    fn traversal_rejected() {
        let storage = LocalFileStorage::new("/tmp/media", "/media");
        assert!(storage.resolve("local://../secret").is_err());
        assert!(storage.resolve("local:///etc/passwd").is_err());
        assert!(storage.resolve("s3://bucket/key").is_err());
        assert_eq!(
            storage.resolve("local://documents/a.pdf").unwrap(),
            PathBuf::from("/tmp/media/documents/a.pdf")
        );
    }

    #[test]
    fn generated_uris_use_backend_scheme() {
        let storage = MemoryFileStorage::new("/media");
        let uri = storage.generate_uri("original_images", "foto 1.png");
        assert!(uri.starts_with("memory://original_images/"));
        assert!(uri.ends_with("_foto_1.png"));
        assert_eq!(
            storage.public_url("memory://images/a.png"),
            "/media/images/a.png"
        );
    }

    #[tokio::test]
    async fn memory_storage_round_trip() {
        let storage = MemoryFileStorage::new("/media");
        storage.write("memory://documents/a.txt", b"hola").await.unwrap();
        assert!(storage.exists("memory://documents/a.txt").await.unwrap());
        assert_eq!(storage.read("memory://documents/a.txt").await.unwrap(), b"hola");
        storage.delete("memory://documents/a.txt").await.unwrap();
        assert!(storage.is_empty());
    }

    #[tokio::test]
    async fn local_storage_writes_under_base() {
        let dir = std::env::temp_dir().join(format!("arquitectos-test-{}", uuid::Uuid::now_v7()));
        let storage = LocalFileStorage::new(&dir, "/media");
        storage.write("local://images/x.bin", &[1, 2, 3]).await.unwrap();
        assert!(dir.join("images/x.bin").exists());
        storage.delete("local://images/x.bin").await.unwrap();
        storage.delete("local://images/x.bin").await.unwrap();
        assert!(!storage.exists("local://images/x.bin").await.unwrap());
        let _ = std::fs::remove_dir_all(&dir);
    }
}
