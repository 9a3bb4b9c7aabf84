//! Access to the live mount table and per-device removability.

use crate::device::MountedPartition;
use crate::platform::linux;
use anyhow::Result;
use std::path::{Path, PathBuf};
use sysinfo::Disks;

/// A source of currently mounted partitions.
///
/// Implementations read live state on every call; the classifier never
/// caches what they return.
pub trait MountSource: Send + Sync {
    fn partitions(&self) -> Result<Vec<MountedPartition>>;
}

/// Reads the mount table through `sysinfo`.
///
/// Used on Windows, where volumes are identified by drive letter and the
/// partition identifier is derived from the mount point.
#[derive(Clone, Copy, Debug, Default)]
pub struct SysinfoMounts;

impl MountSource for SysinfoMounts {
    fn partitions(&self) -> Result<Vec<MountedPartition>> {
        let disks = Disks::new_with_refreshed_list();
        let partitions = disks
            .iter()
            .map(|disk| {
                MountedPartition::new(
                    drive_id(disk.mount_point()),
                    disk.mount_point().to_string_lossy(),
                    disk.file_system().to_string_lossy(),
                )
            })
            .collect();
        Ok(partitions)
    }
}

/// `D:\` -> `D:`.
fn drive_id(mount_point: &Path) -> String {
    mount_point
        .to_string_lossy()
        .trim_end_matches('\\')
        .to_string()
}

/// How to decide whether a device is removable media.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum RemovableProbe {
    /// Read `<root>/<disk>/removable`, normally under `/sys/block`.
    SysBlock(PathBuf),
    /// Ask `sysinfo` about the volume mounted at the drive letter.
    Sysinfo,
    /// No removability information on this platform.
    Unavailable,
}

impl RemovableProbe {
    /// Returns `false` whenever the flag cannot be read.
    pub fn is_removable(&self, device: &str) -> bool {
        match self {
            Self::SysBlock(root) => linux::read_removable_flag(root, device),
            Self::Sysinfo => Disks::new_with_refreshed_list()
                .iter()
                .any(|disk| disk.is_removable() && drive_id(disk.mount_point()) == device),
            Self::Unavailable => false,
        }
    }
}
