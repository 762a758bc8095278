//! Signed-URL configuration
//!
//! Passed explicitly into [`crate::TrustGate`]; nothing here is process-global.
//! Files are JSON and every field has a default, so a partial file is valid.

use crate::device::{DEFAULT_MEDIA_RELATIVE_PATH, DEFAULT_VOLUME_LABEL};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;
use tracing::debug;

/// Configuration load/validation failures
#[derive(Error, Debug)]
pub enum ConfigError {
    /// The file could not be read or written
    #[error("config file {}: {source}", path.display())]
    Io {
        /// Config path
        path: PathBuf,
        /// Underlying I/O error
        #[source]
        source: std::io::Error,
    },

    /// The file is not valid configuration JSON
    #[error("failed to parse config file {}: {source}", path.display())]
    Parse {
        /// Config path
        path: PathBuf,
        /// Underlying JSON error
        #[source]
        source: serde_json::Error,
    },

    /// A field holds an unusable value
    #[error("invalid configuration: {field}: {reason}")]
    Invalid {
        /// Offending field
        field: &'static str,
        /// Why it was rejected
        reason: String,
    },
}

/// Configuration consumed by the trust gate
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SignedUrlConfig {
    /// Whether signed URLs are required for resource fetches
    pub use_signed_url: bool,
    /// Signing service URL
    pub sign_endpoint: Option<String>,
    /// Path of the seed file
    pub seed_path: Option<PathBuf>,
    /// Label of the provisioning volume
    pub volume_label: String,
    /// Boot image location relative to the volume root
    pub media_relative_path: String,
    /// HTTP request timeout in seconds
    pub request_timeout_secs: u64,
}

impl Default for SignedUrlConfig {
    fn default() -> Self {
        Self {
            use_signed_url: false,
            sign_endpoint: None,
            seed_path: None,
            volume_label: DEFAULT_VOLUME_LABEL.to_string(),
            media_relative_path: DEFAULT_MEDIA_RELATIVE_PATH.to_string(),
            request_timeout_secs: 30,
        }
    }
}

impl SignedUrlConfig {
    /// Configuration with signed URLs enabled against `endpoint`
    pub fn enabled(endpoint: impl Into<String>, seed_path: impl Into<PathBuf>) -> Self {
        Self {
            use_signed_url: true,
            sign_endpoint: Some(endpoint.into()),
            seed_path: Some(seed_path.into()),
            ..Default::default()
        }
    }

    /// Set whether signed URLs are used
    pub fn with_use_signed_url(mut self, enabled: bool) -> Self {
        self.use_signed_url = enabled;
        self
    }

    /// Set the signing endpoint
    pub fn with_sign_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.sign_endpoint = Some(endpoint.into());
        self
    }

    /// Set the seed path
    pub fn with_seed_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.seed_path = Some(path.into());
        self
    }

    /// Set the provisioning volume label
    pub fn with_volume_label(mut self, label: impl Into<String>) -> Self {
        self.volume_label = label.into();
        self
    }

    /// Set the boot image location relative to the volume root
    pub fn with_media_relative_path(mut self, relative: impl Into<String>) -> Self {
        self.media_relative_path = relative.into();
        self
    }

    /// Signing endpoint, `None` when unset or blank
    pub fn endpoint(&self) -> Option<&str> {
        self.sign_endpoint
            .as_deref()
            .map(str::trim)
            .filter(|e| !e.is_empty())
    }

    /// Seed path, `None` when unset or empty
    pub fn seed(&self) -> Option<&Path> {
        self.seed_path
            .as_deref()
            .filter(|p| !p.as_os_str().is_empty())
    }

    /// HTTP request timeout
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    /// Load configuration from a JSON file
    ///
    /// # Errors
    ///
    /// Fails if the file cannot be read or parsed.
    pub fn load_from_path(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let config: Self = serde_json::from_str(&content).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;

        debug!(path = %path.display(), use_signed_url = config.use_signed_url, "Loaded config");
        Ok(config)
    }

    /// Save configuration as pretty JSON, atomically
    ///
    /// # Errors
    ///
    /// Fails if the file or its directory cannot be written.
    pub fn save_to_path(&self, path: impl AsRef<Path>) -> Result<(), ConfigError> {
        let path = path.as_ref();
        let io_err = |source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        };

        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent).map_err(io_err)?;
            }
        }

        let content = serde_json::to_string_pretty(self).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        let temp_path = path.with_extension("tmp");
        std::fs::write(&temp_path, content).map_err(io_err)?;
        std::fs::rename(&temp_path, path).map_err(io_err)?;
        Ok(())
    }

    /// Check field values that would make every verification fail
    ///
    /// Missing endpoint or seed path are not rejected here: the gate reports
    /// them as typed failures when verification is attempted.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] naming the first bad field.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if let Some(endpoint) = self.endpoint() {
            if !(endpoint.starts_with("https://") || endpoint.starts_with("http://")) {
                return Err(ConfigError::Invalid {
                    field: "sign_endpoint",
                    reason: format!("{endpoint:?} is not an http(s) URL"),
                });
            }
        }

        if self.volume_label.trim().is_empty() {
            return Err(ConfigError::Invalid {
                field: "volume_label",
                reason: "must not be empty".to_string(),
            });
        }

        if self.media_relative_path.trim().is_empty() {
            return Err(ConfigError::Invalid {
                field: "media_relative_path",
                reason: "must not be empty".to_string(),
            });
        }

        if self.request_timeout_secs == 0 {
            return Err(ConfigError::Invalid {
                field: "request_timeout_secs",
                reason: "must be greater than zero".to_string(),
            });
        }

        Ok(())
    }
}
