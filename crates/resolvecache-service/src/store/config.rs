use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MemoryStoreConfig {}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FilesystemStoreConfig {
    /// Directory holding one file per cache entry.
    pub path: PathBuf,
}

/// The backend to use for the persistent store.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StoreBackendConfig {
    Memory(MemoryStoreConfig),
    Filesystem(FilesystemStoreConfig),
}

/// The persistent store that is shared between requests.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreConfig {
    /// An upper bound for every single store operation.
    ///
    /// A store operation running longer than this fails with a timeout, which is propagated to
    /// every caller waiting on the affected computation. Defaults to no timeout.
    #[serde(default, with = "humantime_serde")]
    pub timeout: Option<Duration>,

    /// The backend to use for the store.
    #[serde(flatten)]
    pub backend: StoreBackendConfig,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            timeout: None,
            backend: StoreBackendConfig::Memory(MemoryStoreConfig::default()),
        }
    }
}
