//! Umbrella error for signed-URL verification
//!
//! Every failure inside [`crate::TrustGate::get_signed_url`] is reported as a
//! [`BeyondCorpError`] whose variant is the failing step and whose source is
//! the component error. Callers must treat any error as "no signed URL".

use crate::device::DeviceError;
use crate::hasher::HashError;
use crate::seed::SeedError;
use crate::sign::SignError;
use thiserror::Error;

/// Signed-URL verification failure
#[derive(Error, Debug)]
pub enum BeyondCorpError {
    /// `use_signed_url` is off
    #[error("signed URLs are disabled (use_signed_url is false)")]
    Disabled,

    /// `sign_endpoint` is unset or blank
    #[error("sign_endpoint must be set when using signed URLs")]
    MissingEndpoint,

    /// `seed_path` is unset or empty
    #[error("seed_path must be set when using signed URLs")]
    MissingSeedPath,

    /// The provisioning volume could not be located
    #[error("failed to resolve provisioning volume: {0}")]
    VolumeResolution(#[source] DeviceError),

    /// The install media could not be hashed
    #[error("failed to hash install media: {0}")]
    HashFailure(#[source] HashError),

    /// The seed could not be loaded
    #[error("failed to load seed: {0}")]
    SeedLoad(#[source] SeedError),

    /// MAC addresses could not be enumerated
    #[error("failed to enumerate MAC addresses: {0}")]
    MacAddresses(#[source] DeviceError),

    /// The signing round trip failed
    #[error("failed to obtain signed URL: {0}")]
    SignFailure(#[source] SignError),
}

/// Which step of verification failed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FailureReason {
    /// Signed URLs disabled
    Disabled,
    /// Endpoint missing
    MissingEndpoint,
    /// Seed path missing
    MissingSeedPath,
    /// Volume resolution failed
    VolumeResolution,
    /// Hashing failed
    HashFailure,
    /// Seed load failed
    SeedLoad,
    /// MAC enumeration failed
    MacAddresses,
    /// Signing failed
    SignFailure,
}

/// Error taxonomy across components
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// Missing or disabled configuration
    Configuration,
    /// The provisioning volume is absent or could not be queried
    VolumeNotFound,
    /// Local file read failed
    Io,
    /// Seed content is invalid
    SeedLoad,
    /// No response from the signing service
    Transport,
    /// The signing service answered but the answer is unacceptable
    RemoteProtocol,
    /// The state store failed
    StateStore,
    /// Host device query failed
    Device,
}

impl BeyondCorpError {
    /// The failing step
    pub fn reason(&self) -> FailureReason {
        match self {
            Self::Disabled => FailureReason::Disabled,
            Self::MissingEndpoint => FailureReason::MissingEndpoint,
            Self::MissingSeedPath => FailureReason::MissingSeedPath,
            Self::VolumeResolution(_) => FailureReason::VolumeResolution,
            Self::HashFailure(_) => FailureReason::HashFailure,
            Self::SeedLoad(_) => FailureReason::SeedLoad,
            Self::MacAddresses(_) => FailureReason::MacAddresses,
            Self::SignFailure(_) => FailureReason::SignFailure,
        }
    }

    /// The taxonomy kind of the underlying cause
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Disabled | Self::MissingEndpoint | Self::MissingSeedPath => {
                ErrorKind::Configuration
            }
            Self::VolumeResolution(_) => ErrorKind::VolumeNotFound,
            Self::HashFailure(_) => ErrorKind::Io,
            Self::SeedLoad(e) if e.is_io() => ErrorKind::Io,
            Self::SeedLoad(_) => ErrorKind::SeedLoad,
            Self::MacAddresses(_) => ErrorKind::Device,
            Self::SignFailure(e) if e.is_transport() => ErrorKind::Transport,
            Self::SignFailure(SignError::Encode(_)) => ErrorKind::SeedLoad,
            Self::SignFailure(_) => ErrorKind::RemoteProtocol,
        }
    }

    /// The signing failure, if this error wraps one
    pub fn sign_error(&self) -> Option<&SignError> {
        match self {
            Self::SignFailure(e) => Some(e),
            _ => None,
        }
    }
}

impl std::fmt::Display for FailureReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::Disabled => "disabled",
            Self::MissingEndpoint => "missingEndpoint",
            Self::MissingSeedPath => "missingSeedPath",
            Self::VolumeResolution => "volumeResolution",
            Self::HashFailure => "hashFailure",
            Self::SeedLoad => "seedLoad",
            Self::MacAddresses => "macAddresses",
            Self::SignFailure => "signFailure",
        };
        f.write_str(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sign::TransportError;
    use std::error::Error as _;

    #[test]
    fn test_reason_and_kind() {
        let err = BeyondCorpError::MissingEndpoint;
        assert_eq!(err.reason(), FailureReason::MissingEndpoint);
        assert_eq!(err.kind(), ErrorKind::Configuration);

        let err = BeyondCorpError::SignFailure(SignError::Transport(TransportError::new(
            "https://sign",
            "refused",
        )));
        assert_eq!(err.reason(), FailureReason::SignFailure);
        assert_eq!(err.kind(), ErrorKind::Transport);

        let err = BeyondCorpError::SignFailure(SignError::BadStatus { status: 500 });
        assert_eq!(err.kind(), ErrorKind::RemoteProtocol);

        let err = BeyondCorpError::SeedLoad(SeedError::NotFound {
            path: "seed.json".into(),
        });
        assert_eq!(err.kind(), ErrorKind::Io);

        let err = BeyondCorpError::SeedLoad(SeedError::MissingPath);
        assert_eq!(err.kind(), ErrorKind::SeedLoad);
    }

    #[test]
    fn test_source_chain() {
        let err = BeyondCorpError::VolumeResolution(DeviceError::VolumeNotFound {
            label: "BEYONDCORP".to_string(),
        });
        assert_eq!(err.kind(), ErrorKind::VolumeNotFound);
        assert!(err.to_string().contains("BEYONDCORP"));
        assert!(err.source().is_some());
        assert!(BeyondCorpError::Disabled.source().is_none());
    }

    #[test]
    fn test_reason_display() {
        assert_eq!(FailureReason::MissingSeedPath.to_string(), "missingSeedPath");
        assert_eq!(FailureReason::SignFailure.to_string(), "signFailure");
    }
}
