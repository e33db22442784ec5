use std::fmt::Write as _;
use std::io;
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tempfile::NamedTempFile;
use tokio::fs::{self, File};
use tokio::io::AsyncWriteExt;

use super::{CacheStore, StoreError};

/// The on-disk representation of one store entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
struct StoredEntry {
    /// The full store key, kept to detect hash collisions and for debugging.
    key: String,
    time_created: SystemTime,
    expires_at: Option<SystemTime>,
    value: String,
}

impl StoredEntry {
    fn is_expired(&self, now: SystemTime) -> bool {
        self.expires_at.is_some_and(|expires_at| expires_at <= now)
    }
}

/// A store persisting every entry as a file below a root directory.
///
/// File names are derived from the SHA-256 hash of the key, laid out like
/// `aa/bbccdd/eeff...`. Each file holds a small JSON document with the key, the
/// value and its expiration time. Writes go through a temporary file that is atomically renamed
/// into place, so concurrent readers never see partial entries.
#[derive(Debug, Clone)]
pub struct FilesystemStore {
    path: PathBuf,
}

impl FilesystemStore {
    /// Creates a store rooted at `path`, creating the directory if needed.
    pub fn new(path: impl AsRef<Path>) -> io::Result<Self> {
        let path = path.as_ref().to_path_buf();
        std::fs::create_dir_all(&path)?;
        Ok(Self { path })
    }

    /// The root directory of this store.
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn entry_path(&self, key: &str) -> PathBuf {
        self.path.join(hashed_path(key))
    }

    async fn read_entry(&self, path: &Path) -> Result<Option<StoredEntry>, StoreError> {
        let contents = match fs::read(path).await {
            Ok(contents) => contents,
            Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(err) => return Err(err.into()),
        };

        match serde_json::from_slice(&contents) {
            Ok(entry) => Ok(Some(entry)),
            Err(err) => {
                tracing::error!(
                    error = &err as &dyn std::error::Error,
                    path = %path.display(),
                    "Failed to parse store entry, discarding",
                );
                remove_file(path).await?;
                Ok(None)
            }
        }
    }

    async fn write_entry(&self, path: &Path, entry: &StoredEntry) -> Result<(), StoreError> {
        let parent = path
            .parent()
            .ok_or_else(|| io::Error::other("no parent directory to persist entry"))?;
        fs::create_dir_all(parent).await?;

        let temp_dir = self.path.join(".tmp");
        fs::create_dir_all(&temp_dir).await?;
        let temp_file = NamedTempFile::new_in(&temp_dir)?;
        let mut dest = File::from_std(temp_file.reopen()?);

        let contents = serde_json::to_vec(entry).map_err(io::Error::other)?;
        dest.write_all(&contents).await?;
        dest.flush().await?;

        temp_file.persist(path).map_err(|err| err.error)?;
        Ok(())
    }
}

#[async_trait]
impl CacheStore for FilesystemStore {
    async fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        let path = self.entry_path(key);
        tracing::trace!("Trying store entry at path {}", path.display());

        let Some(entry) = self.read_entry(&path).await? else {
            return Ok(None);
        };
        if entry.key != key {
            tracing::warn!(key, stored = %entry.key, "Hash collision in filesystem store");
            return Ok(None);
        }
        if entry.is_expired(SystemTime::now()) {
            tracing::trace!("Removing expired store entry at path {}", path.display());
            remove_file(&path).await?;
            return Ok(None);
        }

        Ok(Some(entry.value))
    }

    async fn set(&self, key: &str, value: &str, ttl: Option<Duration>) -> Result<(), StoreError> {
        let path = self.entry_path(key);
        let time_created = SystemTime::now();
        let entry = StoredEntry {
            key: key.to_owned(),
            time_created,
            expires_at: ttl.map(|ttl| time_created + ttl),
            value: value.to_owned(),
        };

        tracing::trace!("Creating store entry at path {}", path.display());
        self.write_entry(&path, &entry).await
    }

    async fn delete(&self, key: &str) -> Result<(), StoreError> {
        remove_file(&self.entry_path(key)).await?;
        Ok(())
    }
}

/// Returns the relative path for a store key.
///
/// The relative path is a sha-256 hash hex-formatted like so: `aa/bbccdd/eeff...`
fn hashed_path(key: &str) -> String {
    let hash = Sha256::digest(key.as_bytes());

    let mut path = format!("{:02x}/", hash[0]);
    for b in &hash[1..4] {
        let _ = write!(path, "{b:02x}");
    }
    path.push('/');
    for b in &hash[4..] {
        let _ = write!(path, "{b:02x}");
    }
    path
}

async fn remove_file(path: &Path) -> io::Result<()> {
    match fs::remove_file(path).await {
        Err(err) if err.kind() != io::ErrorKind::NotFound => Err(err),
        _ => Ok(()),
    }
}
