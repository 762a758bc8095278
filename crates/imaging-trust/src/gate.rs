//! Trust gate: decides whether signed URLs are required and obtains them
//!
//! The gate keeps no state of its own. The trust decision goes to the
//! [`StateStore`]; everything else is recomputed per call.
//!
//! # Decision precedence
//!
//! - `use_signed_url = true` always wins and `"True"` is persisted.
//! - Otherwise a decision already in the store (`true`/`false`, any case) is
//!   authoritative and returned as-is, without rewriting it.
//! - Otherwise `"False"` is persisted.
//!
//! Write failures propagate unmodified; a failed read is logged and treated
//! as "no stored decision".

use crate::config::SignedUrlConfig;
use crate::device::{DeviceIdentity, DeviceProbe};
use crate::error::BeyondCorpError;
use crate::fs::FileSystem;
use crate::hasher::ContentHasher;
use crate::seed::SeedStore;
use crate::sign::{HttpTransport, ReqwestTransport, SignRequest, SignRequestClient, TransportError};
use crate::state::{BEYOND_CORP_KEY, StateStore, StateStoreError};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Top-level signed-URL policy object
pub struct TrustGate {
    config: SignedUrlConfig,
    state: Arc<dyn StateStore>,
    hasher: ContentHasher,
    seeds: SeedStore,
    device: DeviceIdentity,
    client: SignRequestClient,
}

impl std::fmt::Debug for TrustGate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TrustGate")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl TrustGate {
    /// Assemble a gate from its configuration and collaborators
    pub fn new(
        config: SignedUrlConfig,
        state: Arc<dyn StateStore>,
        fs: Arc<dyn FileSystem>,
        probe: Arc<dyn DeviceProbe>,
        transport: Arc<dyn HttpTransport>,
    ) -> Self {
        let device =
            DeviceIdentity::new(probe).with_media_relative_path(config.media_relative_path.clone());
        Self {
            hasher: ContentHasher::new(fs.clone()),
            seeds: SeedStore::new(fs),
            device,
            client: SignRequestClient::new(transport),
            state,
            config,
        }
    }

    /// Gate over the host file system, `sysinfo` device probe and `reqwest`
    ///
    /// # Errors
    ///
    /// Fails if the HTTP client cannot be built.
    pub fn with_system_defaults(
        config: SignedUrlConfig,
        state: Arc<dyn StateStore>,
    ) -> Result<Self, TransportError> {
        let transport = ReqwestTransport::new(config.request_timeout())?;
        Ok(Self::new(
            config,
            state,
            Arc::new(crate::fs::OsFileSystem),
            Arc::new(crate::device::SystemDeviceProbe),
            Arc::new(transport),
        ))
    }

    /// The configuration this gate was built with
    pub fn config(&self) -> &SignedUrlConfig {
        &self.config
    }

    /// Device identity resolver used by this gate
    pub fn device(&self) -> &DeviceIdentity {
        &self.device
    }

    /// Decide whether signed URLs are required and persist the decision
    ///
    /// # Errors
    ///
    /// Returns the state store's error unchanged if persisting fails.
    pub fn is_required(&self) -> Result<bool, StateStoreError> {
        if self.config.use_signed_url {
            self.state.set_value(BEYOND_CORP_KEY, "True")?;
            info!(required = true, "Signed URLs enabled by configuration");
            return Ok(true);
        }

        match self.state.get_value(BEYOND_CORP_KEY) {
            Ok(Some(stored)) => {
                if let Some(decision) = parse_decision(&stored) {
                    debug!(required = decision, "Using stored trust decision");
                    return Ok(decision);
                }
                warn!(value = %stored, "Ignoring unrecognised stored trust decision");
            }
            Ok(None) => {}
            Err(e) => warn!(error = %e, "Failed to read stored trust decision"),
        }

        self.state.set_value(BEYOND_CORP_KEY, "False")?;
        info!(required = false, "Signed URLs not required");
        Ok(false)
    }

    /// Obtain the verified hash that authorises fetching `resource_path`
    ///
    /// Steps run strictly in order and the first failure aborts the call.
    /// Nothing is returned unless the signing service confirmed the exact
    /// content hash of the local install media.
    ///
    /// # Errors
    ///
    /// Returns a [`BeyondCorpError`] naming the failing step.
    pub fn get_signed_url(&self, resource_path: &str) -> Result<String, BeyondCorpError> {
        if !self.config.use_signed_url {
            return Err(BeyondCorpError::Disabled);
        }
        let endpoint = self
            .config
            .endpoint()
            .ok_or(BeyondCorpError::MissingEndpoint)?;
        let seed_path = self.config.seed().ok_or(BeyondCorpError::MissingSeedPath)?;

        let drive = self
            .device
            .resolve_volume(&self.config.volume_label)
            .map_err(BeyondCorpError::VolumeResolution)?;
        let media_path = self.device.media_path(&drive);

        let hash = self
            .hasher
            .hash(&media_path)
            .map_err(BeyondCorpError::HashFailure)?;
        let seed = self
            .seeds
            .load(seed_path)
            .map_err(BeyondCorpError::SeedLoad)?;
        let macs = self
            .device
            .mac_addresses()
            .map_err(BeyondCorpError::MacAddresses)?;

        let request = SignRequest::new(hash, macs, resource_path, seed);
        let verified = self.client.sign(&request, endpoint).map_err(|e| {
            warn!(resource = resource_path, error = %e, "Signed URL request failed");
            BeyondCorpError::SignFailure(e)
        })?;

        info!(resource = resource_path, media = %media_path.display(), "Obtained signed URL");
        Ok(verified)
    }
}

fn parse_decision(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "true" => Some(true),
        "false" => Some(false),
        _ => None,
    }
}
