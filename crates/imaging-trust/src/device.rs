//! Device identity: MAC addresses and the provisioning volume
//!
//! The provisioning media is a removable volume with a well-known label. It is
//! not guaranteed to be mounted on a fixed drive letter, so the letter is
//! resolved at run time and used to locate the boot image whose hash is
//! submitted for signing.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use thiserror::Error;
use tracing::debug;

/// Default label of the provisioning volume
pub const DEFAULT_VOLUME_LABEL: &str = "BEYONDCORP";

/// Default location of the boot image relative to the volume root
pub const DEFAULT_MEDIA_RELATIVE_PATH: &str = r"sources\boot.wim";

/// Errors raised by device queries
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DeviceError {
    /// No volume carries the requested label
    #[error("no volume labelled {label:?} was found")]
    VolumeNotFound {
        /// Requested label
        label: String,
    },

    /// A volume matched but reported no drive letter
    #[error("volume labelled {label:?} has an empty drive letter")]
    EmptyDriveLetter {
        /// Requested label
        label: String,
    },

    /// The volume enumeration itself failed
    #[error("volume query failed: {0}")]
    VolumeQuery(String),

    /// MAC address enumeration failed
    #[error("MAC address query failed: {0}")]
    MacQuery(String),
}

/// A mounted volume as reported by a [`DeviceProbe`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VolumeInfo {
    /// File system label
    pub label: String,
    /// Drive letter (`D`, `D:`) or mount root on hosts without letters
    pub drive: String,
}

impl VolumeInfo {
    /// Create a volume description
    pub fn new(label: impl Into<String>, drive: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            drive: drive.into(),
        }
    }
}

/// Host queries behind [`DeviceIdentity`]
pub trait DeviceProbe: Send + Sync {
    /// Enumerate mounted volumes
    fn volumes(&self) -> Result<Vec<VolumeInfo>, DeviceError>;

    /// Enumerate MAC addresses of the network adapters, in adapter order
    fn mac_addresses(&self) -> Result<Vec<String>, DeviceError>;
}

/// Fixed answers, for tests and dry runs
#[derive(Debug, Clone, Default)]
pub struct StaticDeviceProbe {
    volumes: Vec<VolumeInfo>,
    macs: Vec<String>,
    volume_error: Option<String>,
    mac_error: Option<String>,
}

impl StaticDeviceProbe {
    /// Create a probe with no volumes and no adapters
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a volume
    pub fn with_volume(mut self, label: impl Into<String>, drive: impl Into<String>) -> Self {
        self.volumes.push(VolumeInfo::new(label, drive));
        self
    }

    /// Add a MAC address
    pub fn with_mac(mut self, mac: impl Into<String>) -> Self {
        self.macs.push(mac.into());
        self
    }

    /// Make volume enumeration fail
    pub fn with_volume_error(mut self, reason: impl Into<String>) -> Self {
        self.volume_error = Some(reason.into());
        self
    }

    /// Make MAC enumeration fail
    pub fn with_mac_error(mut self, reason: impl Into<String>) -> Self {
        self.mac_error = Some(reason.into());
        self
    }
}

impl DeviceProbe for StaticDeviceProbe {
    fn volumes(&self) -> Result<Vec<VolumeInfo>, DeviceError> {
        match &self.volume_error {
            Some(reason) => Err(DeviceError::VolumeQuery(reason.clone())),
            None => Ok(self.volumes.clone()),
        }
    }

    fn mac_addresses(&self) -> Result<Vec<String>, DeviceError> {
        match &self.mac_error {
            Some(reason) => Err(DeviceError::MacQuery(reason.clone())),
            None => Ok(self.macs.clone()),
        }
    }
}

/// Probe backed by `sysinfo`
///
/// Volumes are the removable disks, labelled by their reported name. On
/// Windows the mount point is `D:\` and is reduced to the drive letter.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemDeviceProbe;

impl DeviceProbe for SystemDeviceProbe {
    fn volumes(&self) -> Result<Vec<VolumeInfo>, DeviceError> {
        let disks = sysinfo::Disks::new_with_refreshed_list();
        let volumes = disks
            .list()
            .iter()
            .filter(|disk| disk.is_removable())
            .map(|disk| {
                VolumeInfo::new(
                    disk.name().to_string_lossy(),
                    disk.mount_point().to_string_lossy(),
                )
            })
            .collect();
        Ok(volumes)
    }

    fn mac_addresses(&self) -> Result<Vec<String>, DeviceError> {
        let networks = sysinfo::Networks::new_with_refreshed_list();
        let mut interfaces: Vec<_> = networks.list().iter().collect();
        interfaces.sort_by(|a, b| a.0.cmp(b.0));

        let mut macs = Vec::new();
        for (_, data) in interfaces {
            let mac = data.mac_address();
            if mac.is_unspecified() {
                continue;
            }
            let mac = mac.to_string().to_uppercase();
            if !macs.contains(&mac) {
                macs.push(mac);
            }
        }
        Ok(macs)
    }
}

/// Resolves the identifiers submitted with a signing request
#[derive(Clone)]
pub struct DeviceIdentity {
    probe: Arc<dyn DeviceProbe>,
    media_relative_path: String,
}

impl std::fmt::Debug for DeviceIdentity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DeviceIdentity")
            .field("media_relative_path", &self.media_relative_path)
            .finish_non_exhaustive()
    }
}

impl DeviceIdentity {
    /// Create an identity resolver over `probe`
    pub fn new(probe: Arc<dyn DeviceProbe>) -> Self {
        Self {
            probe,
            media_relative_path: DEFAULT_MEDIA_RELATIVE_PATH.to_string(),
        }
    }

    /// Override the boot image location relative to the volume root
    pub fn with_media_relative_path(mut self, relative: impl Into<String>) -> Self {
        self.media_relative_path = relative.into();
        self
    }

    /// MAC addresses of this device
    ///
    /// # Errors
    ///
    /// Propagates [`DeviceError::MacQuery`] from the probe.
    pub fn mac_addresses(&self) -> Result<Vec<String>, DeviceError> {
        let macs = self.probe.mac_addresses()?;
        debug!(count = macs.len(), "Resolved MAC addresses");
        Ok(macs)
    }

    /// Drive letter of the volume labelled `label`, without the trailing `:`
    ///
    /// # Errors
    ///
    /// Fails if the query fails, no volume matches, or the match has no drive.
    pub fn resolve_volume(&self, label: &str) -> Result<String, DeviceError> {
        let volumes = self.probe.volumes()?;
        let volume = volumes
            .iter()
            .find(|v| v.label == label)
            .ok_or_else(|| DeviceError::VolumeNotFound {
                label: label.to_string(),
            })?;

        let drive = normalize_drive(&volume.drive);
        if drive.is_empty() {
            return Err(DeviceError::EmptyDriveLetter {
                label: label.to_string(),
            });
        }

        debug!(label, drive = %drive, "Resolved provisioning volume");
        Ok(drive)
    }

    /// Path of the boot image on the volume at `drive`
    ///
    /// A single drive letter yields a Windows path (`D:\sources\boot.wim`);
    /// anything else is treated as a mount root.
    pub fn media_path(&self, drive: &str) -> PathBuf {
        let drive = normalize_drive(drive);
        let mut letters = drive.chars();
        match (letters.next(), letters.next()) {
            (Some(letter), None) if letter.is_ascii_alphabetic() => PathBuf::from(format!(
                "{letter}:\\{}",
                self.media_relative_path.replace('/', "\\")
            )),
            _ => self
                .media_relative_path
                .split(['\\', '/'])
                .filter(|part| !part.is_empty())
                .fold(Path::new(&drive).to_path_buf(), |path, part| path.join(part)),
        }
    }
}

/// Strip the `:` and `\` that Windows appends to drive letters
fn normalize_drive(drive: &str) -> String {
    let trimmed = drive.trim();
    let letter = trimmed.trim_end_matches(['\\', '/']);
    match letter.strip_suffix(':') {
        Some(bare) if bare.len() == 1 => bare.to_string(),
        _ if letter.is_empty() && !trimmed.is_empty() => trimmed.to_string(),
        _ => letter.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn identity(probe: StaticDeviceProbe) -> DeviceIdentity {
        DeviceIdentity::new(Arc::new(probe))
    }

    #[test]
    fn test_resolve_volume() -> Result<(), Box<dyn std::error::Error>> {
        let probe = StaticDeviceProbe::new()
            .with_volume("DATA", "C:")
            .with_volume(DEFAULT_VOLUME_LABEL, "D:");
        assert_eq!(identity(probe).resolve_volume(DEFAULT_VOLUME_LABEL)?, "D");
        Ok(())
    }

    #[test]
    fn test_resolve_volume_bare_letter() -> Result<(), Box<dyn std::error::Error>> {
        let probe = StaticDeviceProbe::new().with_volume(DEFAULT_VOLUME_LABEL, "D");
        assert_eq!(identity(probe).resolve_volume(DEFAULT_VOLUME_LABEL)?, "D");
        Ok(())
    }

    #[test]
    fn test_resolve_volume_not_found() {
        let probe = StaticDeviceProbe::new().with_volume("DATA", "C:");
        let result = identity(probe).resolve_volume(DEFAULT_VOLUME_LABEL);
        assert!(matches!(result, Err(DeviceError::VolumeNotFound { .. })));
    }

    #[test]
    fn test_resolve_volume_empty_letter() {
        let probe = StaticDeviceProbe::new().with_volume(DEFAULT_VOLUME_LABEL, "");
        let result = identity(probe).resolve_volume(DEFAULT_VOLUME_LABEL);
        assert!(matches!(result, Err(DeviceError::EmptyDriveLetter { .. })));
    }

    #[test]
    fn test_resolve_volume_query_error() {
        let probe = StaticDeviceProbe::new().with_volume_error("WMI unavailable");
        let result = identity(probe).resolve_volume(DEFAULT_VOLUME_LABEL);
        assert_eq!(result, Err(DeviceError::VolumeQuery("WMI unavailable".to_string())));
    }

    #[test]
    fn test_mac_addresses_keep_order() -> Result<(), Box<dyn std::error::Error>> {
        let probe = StaticDeviceProbe::new()
            .with_mac("00:00:00:00:00:02")
            .with_mac("00:00:00:00:00:01");
        assert_eq!(
            identity(probe).mac_addresses()?,
            vec!["00:00:00:00:00:02", "00:00:00:00:00:01"]
        );
        Ok(())
    }

    #[test]
    fn test_media_path_drive_letter() {
        let identity = identity(StaticDeviceProbe::new());
        assert_eq!(identity.media_path("D"), PathBuf::from(r"D:\sources\boot.wim"));
        assert_eq!(identity.media_path(r"D:\"), PathBuf::from(r"D:\sources\boot.wim"));
    }

    #[test]
    fn test_media_path_mount_root() {
        let identity = identity(StaticDeviceProbe::new());
        assert_eq!(
            identity.media_path("/media/usb"),
            Path::new("/media/usb").join("sources").join("boot.wim")
        );
    }

    #[test]
    fn test_media_path_custom_relative() {
        let identity =
            identity(StaticDeviceProbe::new()).with_media_relative_path("images/install.wim");
        assert_eq!(identity.media_path("E"), PathBuf::from(r"E:\images\install.wim"));
    }

    #[test]
    fn test_normalize_drive() {
        assert_eq!(normalize_drive("D:"), "D");
        assert_eq!(normalize_drive(r"D:\"), "D");
        assert_eq!(normalize_drive("  D  "), "D");
        assert_eq!(normalize_drive("/media/usb/"), "/media/usb");
        assert_eq!(normalize_drive("/"), "/");
        assert_eq!(normalize_drive(""), "");
    }
}
