use serde::Serialize;
use std::fmt;

/// Disk names whose whole-device node already ends in a digit. Partitions on
/// these carry a `p<N>` suffix instead of a bare number.
const DIGIT_TERMINATED_DISKS: &[&str] = &["nvme", "mmcblk", "loop", "nbd", "md", "zram", "dm-"];

/// A partition currently attached to the directory tree.
///
/// Entries are read fresh from the live mount table on every safety query and
/// are never persisted.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct MountedPartition {
    /// The platform-native identifier of the partition (e.g. `/dev/sda1` or `D:`).
    pub device: String,
    /// Where the partition's contents are attached (e.g. `/home`).
    pub mountpoint: String,
    /// The filesystem type reported by the OS (e.g. `ext4`, `NTFS`).
    pub fs_type: String,
}

impl MountedPartition {
    pub fn new(
        device: impl Into<String>,
        mountpoint: impl Into<String>,
        fs_type: impl Into<String>,
    ) -> Self {
        Self {
            device: device.into(),
            mountpoint: mountpoint.into(),
            fs_type: fs_type.into(),
        }
    }
}

impl fmt::Display for MountedPartition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.fs_type.is_empty() {
            write!(f, "{} -> {}", self.device, self.mountpoint)
        } else {
            write!(f, "{} -> {} ({})", self.device, self.mountpoint, self.fs_type)
        }
    }
}

/// How a platform names partitions relative to their parent disk.
///
/// Mapping a partition back to its whole-disk identifier is a per-platform
/// rule; a single "strip the trailing digits" heuristic gets NVMe and macOS
/// slice names wrong.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PartitionNaming {
    /// `/dev/sda1` -> `/dev/sda`, `/dev/nvme0n1p2` -> `/dev/nvme0n1`.
    Linux,
    /// `/dev/disk2s1` -> `/dev/disk2`, `/dev/rdisk3s1s1` -> `/dev/rdisk3`.
    Darwin,
    /// Drive letters have no parent; `D:` stays `D:`.
    DriveLetter,
}

impl PartitionNaming {
    /// Returns the whole-disk identifier for `id`, or `id` itself if it does
    /// not look like a partition.
    pub fn base_device<'a>(self, id: &'a str) -> &'a str {
        match self {
            Self::Linux => linux_base(id),
            Self::Darwin => darwin_base(id),
            Self::DriveLetter => id.trim_end_matches('\\'),
        }
    }
}

/// Splits a device path into the directory prefix length and the node name.
fn split_name(id: &str) -> (usize, &str) {
    let start = id.rfind('/').map_or(0, |i| i + 1);
    (start, &id[start..])
}

fn linux_base(id: &str) -> &str {
    let (start, name) = split_name(id);
    let without_digits = name.trim_end_matches(|c: char| c.is_ascii_digit());
    if without_digits.len() == name.len() || without_digits.is_empty() {
        return id;
    }

    // nvme0n1p2, mmcblk0p1, loop0p1
    if let Some(disk) = without_digits.strip_suffix('p') {
        if disk.ends_with(|c: char| c.is_ascii_digit()) {
            return &id[..start + disk.len()];
        }
    }

    // nvme0n1, mmcblk0, loop3 are whole disks already.
    if DIGIT_TERMINATED_DISKS.iter().any(|prefix| name.starts_with(prefix)) {
        return id;
    }

    &id[..start + without_digits.len()]
}

fn darwin_base(id: &str) -> &str {
    let (start, name) = split_name(id);
    let prefix = if name.starts_with("rdisk") {
        "rdisk"
    } else if name.starts_with("disk") {
        "disk"
    } else {
        return id;
    };

    let rest = &name[prefix.len()..];
    let unit = rest
        .find(|c: char| !c.is_ascii_digit())
        .unwrap_or(rest.len());
    if unit == 0 {
        return id;
    }
    &id[..start + prefix.len() + unit]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn linux_strips_plain_partition_numbers() {
        assert_eq!(PartitionNaming::Linux.base_device("/dev/sda1"), "/dev/sda");
        assert_eq!(PartitionNaming::Linux.base_device("/dev/sdb12"), "/dev/sdb");
        assert_eq!(PartitionNaming::Linux.base_device("/dev/vda"), "/dev/vda");
    }

    #[test]
    fn linux_handles_p_suffixed_partitions() {
        assert_eq!(
            PartitionNaming::Linux.base_device("/dev/nvme0n1p2"),
            "/dev/nvme0n1"
        );
        assert_eq!(
            PartitionNaming::Linux.base_device("/dev/mmcblk0p1"),
            "/dev/mmcblk0"
        );
        assert_eq!(PartitionNaming::Linux.base_device("/dev/loop0p3"), "/dev/loop0");
    }

    #[test]
    fn linux_keeps_digit_terminated_whole_disks() {
        assert_eq!(
            PartitionNaming::Linux.base_device("/dev/nvme0n1"),
            "/dev/nvme0n1"
        );
        assert_eq!(
            PartitionNaming::Linux.base_device("/dev/mmcblk0"),
            "/dev/mmcblk0"
        );
        assert_eq!(PartitionNaming::Linux.base_device("/dev/dm-0"), "/dev/dm-0");
    }

    #[test]
    fn darwin_strips_slices() {
        assert_eq!(PartitionNaming::Darwin.base_device("/dev/disk2s1"), "/dev/disk2");
        assert_eq!(
            PartitionNaming::Darwin.base_device("/dev/disk3s1s1"),
            "/dev/disk3"
        );
        assert_eq!(
            PartitionNaming::Darwin.base_device("/dev/rdisk10s2"),
            "/dev/rdisk10"
        );
        assert_eq!(PartitionNaming::Darwin.base_device("/dev/disk4"), "/dev/disk4");
        assert_eq!(PartitionNaming::Darwin.base_device("/dev/null"), "/dev/null");
    }

    #[test]
    fn drive_letters_are_their_own_base() {
        assert_eq!(PartitionNaming::DriveLetter.base_device("D:"), "D:");
        assert_eq!(PartitionNaming::DriveLetter.base_device("D:\\"), "D:");
    }

    #[test]
    fn display_lists_device_and_mountpoint() {
        let partition = MountedPartition::new("/dev/sdc1", "/home", "ext4");
        assert_eq!(partition.to_string(), "/dev/sdc1 -> /home (ext4)");
    }
}
