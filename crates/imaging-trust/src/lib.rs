//! Device-trust verification and signed-URL access for OS provisioning
//!
//! Before a provisioning client fetches a remote resource (typically the boot
//! image), it proves its identity to a remote signing service and receives a
//! signed confirmation that ties the content hash of the local install media
//! to this device. Every failure is fail-closed: no verified hash, no signed
//! URL.
//!
//! # Architecture
//!
//! - [`hasher`]: SHA-256 content hash of the install media
//! - [`seed`]: pre-provisioned trust seed loading
//! - [`device`]: MAC addresses and removable volume resolution
//! - [`sign`]: signing request round trip and response validation
//! - [`gate`]: the [`TrustGate`] policy object tying everything together
//! - [`state`]: key/value state store that receives the trust decision
//! - [`fs`]: file system capability used by the hasher and seed store
//! - [`config`]: [`SignedUrlConfig`] loading and validation
//! - [`error`]: umbrella [`BeyondCorpError`] and its taxonomy
//!
//! Every collaborator that touches the host (files, volumes, network, state)
//! sits behind a trait with an in-memory implementation, so the whole flow
//! can run without touching process-global state.
//!
//! # Example
//!
//! ```
//! use std::sync::Arc;
//! use imaging_trust::prelude::*;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let state = Arc::new(MemoryStateStore::new());
//! let gate = TrustGate::new(
//!     SignedUrlConfig::default(),
//!     state.clone(),
//!     Arc::new(MemoryFileSystem::new()),
//!     Arc::new(StaticDeviceProbe::default()),
//!     Arc::new(ReqwestTransport::new(std::time::Duration::from_secs(5))?),
//! );
//!
//! assert!(!gate.is_required()?);
//! assert_eq!(state.get_value(BEYOND_CORP_KEY)?.as_deref(), Some("False"));
//! # Ok(())
//! # }
//! ```

#![deny(unsafe_op_in_unsafe_fn, clippy::unwrap_used)]
#![warn(missing_docs, rust_2018_idioms)]
#![cfg_attr(docsrs, feature(doc_cfg))]

pub mod config;
pub mod device;
pub mod error;
pub mod fs;
pub mod gate;
pub mod hasher;
pub mod prelude;
pub mod seed;
pub mod sign;
pub mod state;

pub use config::{ConfigError, SignedUrlConfig};
pub use device::{
    DeviceError, DeviceIdentity, DeviceProbe, StaticDeviceProbe, SystemDeviceProbe, VolumeInfo,
};
pub use error::{BeyondCorpError, ErrorKind, FailureReason};
pub use fs::{FileSystem, MemoryFileSystem, OsFileSystem};
pub use gate::TrustGate;
pub use hasher::{ContentHasher, HashError};
pub use seed::{Seed, SeedError, SeedStore};
pub use sign::{
    HttpResponse, HttpTransport, ReqwestTransport, SignError, SignRequest, SignRequestClient,
    SignResponse, SignStatus, TransportError,
};
pub use state::{BEYOND_CORP_KEY, FileStateStore, MemoryStateStore, StateStore, StateStoreError};
