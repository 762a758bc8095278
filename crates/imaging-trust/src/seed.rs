//! Trust seed loading
//!
//! The seed is a pre-provisioned credential blob plus its signature, stored as
//! JSON on the provisioning media:
//!
//! ```json
//! {"Seed": {"Seed": "<secret>"}, "Signature": "<signature>"}
//! ```
//!
//! The outer `Seed` object is forwarded to the signing service unchanged; the
//! inner `Seed` value is the actual secret payload.

use crate::fs::FileSystem;
use serde::{Deserialize, Serialize};
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use thiserror::Error;
use tracing::debug;

/// Errors raised while loading a seed file
#[derive(Error, Debug)]
pub enum SeedError {
    /// No seed path was supplied
    #[error("seed path is not set")]
    MissingPath,

    /// The seed file does not exist
    #[error("seed file not found: {}", path.display())]
    NotFound {
        /// Configured seed path
        path: PathBuf,
    },

    /// The seed file exists but could not be read
    #[error("failed to read seed file {}: {source}", path.display())]
    Io {
        /// Configured seed path
        path: PathBuf,
        /// Underlying I/O error
        #[source]
        source: io::Error,
    },

    /// The seed file is not a valid seed document
    #[error("failed to parse seed file {}: {source}", path.display())]
    Parse {
        /// Configured seed path
        path: PathBuf,
        /// Underlying JSON error
        #[source]
        source: serde_json::Error,
    },

    /// The `Seed` field is present but null
    #[error("seed file {} has an empty Seed field", path.display())]
    EmptySeed {
        /// Configured seed path
        path: PathBuf,
    },
}

impl SeedError {
    /// Whether the failure came from the file system rather than the content
    pub fn is_io(&self) -> bool {
        matches!(self, Self::NotFound { .. } | Self::Io { .. })
    }
}

/// A loaded trust seed
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Seed {
    /// Seed object as stored on disk
    #[serde(rename = "Seed")]
    pub seed: serde_json::Value,
    /// Signature over the seed
    #[serde(rename = "Signature")]
    pub signature: String,
}

impl Seed {
    /// The secret payload: the inner `Seed` value, or the whole seed object
    /// when it carries no inner field
    pub fn payload(&self) -> &serde_json::Value {
        self.seed.get("Seed").unwrap_or(&self.seed)
    }
}

/// Loads seeds through a [`FileSystem`]
#[derive(Clone)]
pub struct SeedStore {
    fs: Arc<dyn FileSystem>,
}

impl std::fmt::Debug for SeedStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SeedStore").finish_non_exhaustive()
    }
}

impl SeedStore {
    /// Create a store reading through `fs`
    pub fn new(fs: Arc<dyn FileSystem>) -> Self {
        Self { fs }
    }

    /// Load and parse the seed at `path`
    ///
    /// # Errors
    ///
    /// Fails closed on an empty path, a missing or unreadable file, malformed
    /// JSON, or a document without both `Seed` and `Signature`.
    pub fn load(&self, path: &Path) -> Result<Seed, SeedError> {
        if path.as_os_str().is_empty() {
            return Err(SeedError::MissingPath);
        }

        let content = self.fs.read_to_string(path).map_err(|source| {
            if source.kind() == io::ErrorKind::NotFound {
                SeedError::NotFound {
                    path: path.to_path_buf(),
                }
            } else {
                SeedError::Io {
                    path: path.to_path_buf(),
                    source,
                }
            }
        })?;

        let seed: Seed = serde_json::from_str(&content).map_err(|source| SeedError::Parse {
            path: path.to_path_buf(),
            source,
        })?;

        if seed.seed.is_null() {
            return Err(SeedError::EmptySeed {
                path: path.to_path_buf(),
            });
        }

        debug!(path = %path.display(), "Loaded seed");
        Ok(seed)
    }
}
