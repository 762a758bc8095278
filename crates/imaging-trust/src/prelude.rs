//! Prelude for imaging-trust
//!
//! Re-exports the gate, its configuration, the collaborator traits and their
//! bundled implementations.

pub use crate::config::{ConfigError, SignedUrlConfig};
pub use crate::device::{
    DEFAULT_MEDIA_RELATIVE_PATH, DEFAULT_VOLUME_LABEL, DeviceError, DeviceIdentity, DeviceProbe,
    StaticDeviceProbe, SystemDeviceProbe, VolumeInfo,
};
pub use crate::error::{BeyondCorpError, ErrorKind, FailureReason};
pub use crate::fs::{FileSystem, MemoryFileSystem, OsFileSystem};
pub use crate::gate::TrustGate;
pub use crate::hasher::{ContentHasher, HashError};
pub use crate::seed::{Seed, SeedError, SeedStore};
pub use crate::sign::{
    HttpResponse, HttpTransport, ReqwestTransport, SignError, SignRequest, SignRequestClient,
    SignResponse, SignStatus, TransportError,
};
pub use crate::state::{
    BEYOND_CORP_KEY, FileStateStore, MemoryStateStore, StateStore, StateStoreError,
};
