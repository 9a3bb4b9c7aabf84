use crate::detect::{DetectionOutcome, SystemDriveDetector};
use crate::device::{MountedPartition, PartitionNaming};
use crate::mounts::MountSource;
use anyhow::{Context, Result};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use tracing::debug;

pub const SYS_BLOCK: &str = "/sys/block";
const PROC_MOUNTS: &str = "/proc/mounts";
const PROC_CMDLINE: &str = "/proc/cmdline";
const DEV_DISK: &str = "/dev/disk";

/// Helper to read a specific file from a `/sys/block`-style directory.
fn read_sys_file(root: &Path, device_name: &str, file: &str) -> io::Result<String> {
    let path = root.join(device_name).join(file);
    fs::read_to_string(path).map(|s| s.trim().to_string())
}

/// Reads `<root>/<disk>/removable` for the disk that holds `device`.
///
/// `/sys/block` only lists whole disks, so a partition is looked up through
/// its parent. Any read failure counts as "not removable".
pub fn read_removable_flag(root: &Path, device: &str) -> bool {
    let base = PartitionNaming::Linux.base_device(device);
    let name = base.rsplit('/').next().unwrap_or(base);
    read_sys_file(root, name, "removable")
        .map(|s| s == "1")
        .unwrap_or(false)
}

/// Decodes the octal escapes (`\040` for space, etc.) used in `/proc/mounts`.
fn unescape_mount(value: &str) -> String {
    let bytes = value.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'\\' && i + 3 < bytes.len() {
            let digits = &bytes[i + 1..i + 4];
            if digits.iter().all(|b| (b'0'..=b'7').contains(b)) {
                let code = digits
                    .iter()
                    .fold(0u32, |acc, b| acc * 8 + u32::from(b - b'0'));
                if let Ok(code) = u8::try_from(code) {
                    out.push(code);
                    i += 4;
                    continue;
                }
            }
        }
        out.push(bytes[i]);
        i += 1;
    }
    String::from_utf8_lossy(&out).into_owned()
}

/// Parses `/proc/mounts` text into the partitions backed by real block devices.
pub fn parse_mounts(text: &str) -> Vec<MountedPartition> {
    let mut partitions = Vec::new();
    for line in text.lines() {
        let mut fields = line.split_whitespace();
        let (Some(source), Some(target), Some(fs_type)) =
            (fields.next(), fields.next(), fields.next())
        else {
            continue;
        };
        if !source.starts_with("/dev/") {
            continue;
        }
        partitions.push(MountedPartition::new(
            unescape_mount(source),
            unescape_mount(target),
            fs_type,
        ));
    }
    partitions
}

fn is_boot_mountpoint(mountpoint: &str) -> bool {
    matches!(mountpoint, "/" | "/boot" | "/efi")
        || mountpoint.starts_with("/boot/")
        || mountpoint.starts_with("/efi/")
}

/// Where the kernel was told to find the root filesystem.
#[derive(Debug, PartialEq, Eq)]
enum RootParam<'a> {
    Device(&'a str),
    /// A `UUID=`, `PARTUUID=` or `LABEL=` reference, resolved through the
    /// matching `/dev/disk/by-*` directory.
    Tagged { dir: &'static str, value: &'a str },
}

/// Extracts the last `root=` parameter from a kernel command line.
fn parse_root_param(cmdline: &str) -> Option<RootParam<'_>> {
    let value = cmdline
        .split_whitespace()
        .filter_map(|token| token.strip_prefix("root="))
        .last()?;

    if value.starts_with("/dev/") {
        return Some(RootParam::Device(value));
    }
    [
        ("UUID=", "by-uuid"),
        ("PARTUUID=", "by-partuuid"),
        ("LABEL=", "by-label"),
    ]
    .into_iter()
    .find_map(|(tag, dir)| {
        value
            .strip_prefix(tag)
            .filter(|v| !v.is_empty())
            .map(|v| RootParam::Tagged { dir, value: v })
    })
}

/// Finds system drives from the mount table and the kernel command line.
///
/// Partitions mounted at `/`, under `/boot` or under `/efi` from a real block
/// device are system partitions; both the partition and its parent disk are
/// recorded. A `root=` kernel parameter adds the root device too.
#[derive(Clone, Debug)]
pub struct MountTableDetector {
    mounts_path: PathBuf,
    cmdline_path: PathBuf,
    dev_disk_dir: PathBuf,
}

impl Default for MountTableDetector {
    fn default() -> Self {
        Self::new(PROC_MOUNTS, PROC_CMDLINE, DEV_DISK)
    }
}

impl MountTableDetector {
    pub fn new(
        mounts_path: impl Into<PathBuf>,
        cmdline_path: impl Into<PathBuf>,
        dev_disk_dir: impl Into<PathBuf>,
    ) -> Self {
        Self {
            mounts_path: mounts_path.into(),
            cmdline_path: cmdline_path.into(),
            dev_disk_dir: dev_disk_dir.into(),
        }
    }

    fn boot_devices(&self) -> Result<Vec<String>> {
        let text = fs::read_to_string(&self.mounts_path)
            .with_context(|| format!("read {}", self.mounts_path.display()))?;
        Ok(parse_mounts(&text)
            .into_iter()
            .filter(|p| is_boot_mountpoint(&p.mountpoint))
            .map(|p| p.device)
            .collect())
    }

    fn root_device(&self) -> Result<Option<String>> {
        let cmdline = fs::read_to_string(&self.cmdline_path)
            .with_context(|| format!("read {}", self.cmdline_path.display()))?;

        match parse_root_param(&cmdline) {
            None => Ok(None),
            Some(RootParam::Device(device)) => Ok(Some(device.to_string())),
            Some(RootParam::Tagged { dir, value }) => {
                let link = self.dev_disk_dir.join(dir).join(value);
                let target = fs::canonicalize(&link)
                    .with_context(|| format!("resolve root={} via {}", value, link.display()))?;
                Ok(Some(target.to_string_lossy().into_owned()))
            }
        }
    }
}

impl SystemDriveDetector for MountTableDetector {
    fn name(&self) -> &'static str {
        "mount-table"
    }

    fn detect(&self) -> DetectionOutcome {
        let mut outcome = DetectionOutcome::default();

        if let Some(devices) = outcome.record("mounts", self.boot_devices()) {
            for device in devices {
                debug!(%device, "boot mountpoint backed by device");
                outcome.insert_with_base(&device, PartitionNaming::Linux);
            }
        }

        if let Some(Some(root)) = outcome.record("cmdline", self.root_device()) {
            debug!(device = %root, "root device from kernel command line");
            outcome.insert_with_base(&root, PartitionNaming::Linux);
        }

        outcome
    }
}

/// The live mount table read from `/proc/mounts`.
#[derive(Clone, Debug)]
pub struct ProcMounts {
    path: PathBuf,
}

impl Default for ProcMounts {
    fn default() -> Self {
        Self::new(PROC_MOUNTS)
    }
}

impl ProcMounts {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl MountSource for ProcMounts {
    fn partitions(&self) -> Result<Vec<MountedPartition>> {
        let text = fs::read_to_string(&self.path)
            .with_context(|| format!("read {}", self.path.display()))?;
        Ok(parse_mounts(&text))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    const MOUNTS: &str = "\
sysfs /sys sysfs rw,nosuid,nodev,noexec,relatime 0 0
proc /proc proc rw,nosuid,nodev,noexec,relatime 0 0
/dev/nvme0n1p2 / ext4 rw,relatime 0 0
/dev/nvme0n1p1 /boot/efi vfat rw,relatime 0 0
/dev/sdc1 /home ext4 rw,relatime 0 0
/dev/sdb1 /media/my\\040stick vfat rw,nosuid,nodev 0 0
tmpfs /run tmpfs rw,nosuid,nodev 0 0
";

    #[test]
    fn parse_mounts_keeps_block_devices_only() {
        let partitions = parse_mounts(MOUNTS);
        let devices: Vec<_> = partitions.iter().map(|p| p.device.as_str()).collect();
        assert_eq!(
            devices,
            ["/dev/nvme0n1p2", "/dev/nvme0n1p1", "/dev/sdc1", "/dev/sdb1"]
        );
        assert_eq!(partitions[0].fs_type, "ext4");
    }

    #[test]
    fn parse_mounts_decodes_octal_escapes() {
        let partitions = parse_mounts(MOUNTS);
        assert_eq!(partitions[3].mountpoint, "/media/my stick");
    }

    #[test]
    fn root_param_forms() {
        assert_eq!(
            parse_root_param("BOOT_IMAGE=/vmlinuz root=/dev/sda2 ro quiet"),
            Some(RootParam::Device("/dev/sda2"))
        );
        assert_eq!(
            parse_root_param("root=UUID=1234-abcd ro"),
            Some(RootParam::Tagged {
                dir: "by-uuid",
                value: "1234-abcd"
            })
        );
        assert_eq!(
            parse_root_param("root=PARTUUID=beef-02"),
            Some(RootParam::Tagged {
                dir: "by-partuuid",
                value: "beef-02"
            })
        );
        assert_eq!(parse_root_param("ro quiet splash"), None);
        assert_eq!(parse_root_param("root=ZFS=rpool/ROOT"), None);
    }

    #[test]
    fn last_root_param_wins() {
        assert_eq!(
            parse_root_param("root=/dev/sda1 root=/dev/sdb3"),
            Some(RootParam::Device("/dev/sdb3"))
        );
    }

    fn write_proc(dir: &TempDir, mounts: &str, cmdline: &str) -> MountTableDetector {
        fs::write(dir.path().join("mounts"), mounts).unwrap();
        fs::write(dir.path().join("cmdline"), cmdline).unwrap();
        MountTableDetector::new(
            dir.path().join("mounts"),
            dir.path().join("cmdline"),
            dir.path().join("disk"),
        )
    }

    #[test]
    fn detects_boot_and_root_devices() {
        let dir = TempDir::new().unwrap();
        let detector = write_proc(&dir, MOUNTS, "root=/dev/sda2 ro\n");
        let outcome = detector.detect();

        assert!(!outcome.degraded);
        for device in [
            "/dev/nvme0n1",
            "/dev/nvme0n1p2",
            "/dev/nvme0n1p1",
            "/dev/sda",
            "/dev/sda2",
        ] {
            assert!(outcome.contains(device), "missing {device}");
        }
        assert!(!outcome.contains("/dev/sdc"));
        assert!(!outcome.contains("/dev/sdb"));
    }

    #[test]
    fn resolves_uuid_root_through_dev_disk() {
        let dir = TempDir::new().unwrap();
        let by_uuid = dir.path().join("disk/by-uuid");
        fs::create_dir_all(&by_uuid).unwrap();
        let node = dir.path().join("sdd3");
        fs::write(&node, "").unwrap();
        #[cfg(unix)]
        std::os::unix::fs::symlink(&node, by_uuid.join("1234-abcd")).unwrap();
        #[cfg(not(unix))]
        fs::write(by_uuid.join("1234-abcd"), "").unwrap();

        let detector = write_proc(&dir, "", "root=UUID=1234-abcd");
        let outcome = detector.detect();
        assert!(!outcome.degraded);

        #[cfg(unix)]
        {
            let resolved = fs::canonicalize(&node).unwrap();
            assert!(outcome.contains(&resolved.to_string_lossy()));
        }
    }

    #[test]
    fn unresolvable_root_tag_degrades_detection() {
        let dir = TempDir::new().unwrap();
        let detector = write_proc(&dir, MOUNTS, "root=UUID=missing");
        let outcome = detector.detect();

        assert!(outcome.degraded);
        assert_eq!(outcome.failures.len(), 1);
        assert_eq!(outcome.failures[0].probe, "cmdline");
        // The mount-table step still contributed.
        assert!(outcome.contains("/dev/nvme0n1"));
    }

    #[test]
    fn missing_proc_files_degrade_to_empty() {
        let dir = TempDir::new().unwrap();
        let detector = MountTableDetector::new(
            dir.path().join("nope-mounts"),
            dir.path().join("nope-cmdline"),
            dir.path().join("disk"),
        );
        let outcome = detector.detect();
        assert!(outcome.found.is_empty());
        assert!(outcome.degraded);
        assert_eq!(outcome.failures.len(), 2);
    }

    #[test]
    fn proc_mounts_source_reports_read_errors() {
        let dir = TempDir::new().unwrap();
        let source = ProcMounts::new(dir.path().join("missing"));
        assert!(source.partitions().is_err());
    }
}
