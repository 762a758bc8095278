//! Error types for trustctl

use imaging_trust::prelude::*;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum CliError {
    #[error("Invalid configuration: {0}")]
    Config(#[from] ConfigError),

    #[error("Signed URL request failed ({reason}): {0}", reason = .0.reason())]
    Verification(#[from] BeyondCorpError),

    #[error("State store error: {0}")]
    StateStore(#[from] StateStoreError),

    #[error("Hash error: {0}")]
    Hash(#[from] HashError),

    #[error("Device error: {0}")]
    Device(#[from] DeviceError),

    #[error("HTTP client error: {0}")]
    Transport(#[from] TransportError),
}

impl CliError {
    /// Process exit code for this failure
    pub fn exit_code(&self) -> u8 {
        match self {
            Self::Config(_) => 2,
            Self::Verification(e) => match e.kind() {
                ErrorKind::Configuration => 2,
                ErrorKind::VolumeNotFound => 3,
                ErrorKind::Io | ErrorKind::SeedLoad => 4,
                ErrorKind::Transport | ErrorKind::RemoteProtocol => 5,
                ErrorKind::StateStore => 6,
                ErrorKind::Device => 1,
            },
            Self::StateStore(_) => 6,
            Self::Hash(_) => 4,
            Self::Device(DeviceError::MacQuery(_)) => 1,
            Self::Device(_) => 3,
            Self::Transport(_) => 1,
        }
    }

    /// Failing verification step, for gate failures only
    pub fn reason(&self) -> Option<FailureReason> {
        match self {
            Self::Verification(e) => Some(e.reason()),
            _ => None,
        }
    }

    /// Short machine-readable name used in JSON output
    pub fn type_name(&self) -> &'static str {
        match self {
            Self::Config(_) => "configuration",
            Self::Verification(_) => "verification",
            Self::StateStore(_) => "state_store",
            Self::Hash(_) => "hash",
            Self::Device(_) => "device",
            Self::Transport(_) => "transport",
        }
    }
}
