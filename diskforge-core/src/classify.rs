//! Per-device risk classification.
//!
//! A [`Classifier`] combines the system drive detection outcome, the protected
//! mountpoint registry and the live mount table into a [`SafetyAssessment`].
//! Nothing is cached between calls: device and mount state can change at any
//! time, and a stale answer here is a safety hazard.

use crate::detect::DetectionOutcome;
use crate::device::{MountedPartition, PartitionNaming};
use crate::mounts::{MountSource, RemovableProbe};
use crate::registry::ProtectedMountpoints;
use serde::Serialize;
use std::fmt;
use tracing::{debug, warn};

/// How much a destructive operation on a device could hurt.
///
/// Levels are ordered by the strength of confirmation they require.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum WarningLevel {
    Low,
    High,
    Critical,
}

impl fmt::Display for WarningLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Low => "low",
            Self::High => "high",
            Self::Critical => "critical",
        };
        f.pad(name)
    }
}

/// The risk picture of one device at one instant.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct SafetyAssessment {
    /// The device exactly as the caller named it.
    pub device: String,
    /// The identifier is a member of the detected system drive set.
    pub is_system_device: bool,
    /// The OS reports the device as removable media.
    pub is_removable: bool,
    /// Every mounted partition that belongs to the device, in mount-table order.
    pub mounted_partitions: Vec<MountedPartition>,
    pub warning_level: WarningLevel,
    /// The mount table could not be read. An empty `mounted_partitions`
    /// proves nothing when set.
    pub mount_table_failed: bool,
    /// System drive detection was incomplete, so `is_system_device` may be a
    /// false negative.
    pub detection_degraded: bool,
    /// `warning_level` was lifted to at least `high` because detection was
    /// incomplete.
    pub escalated: bool,
}

impl SafetyAssessment {
    /// Some part of the system state behind this assessment is unknown.
    pub fn degraded(&self) -> bool {
        self.mount_table_failed || self.detection_degraded
    }
}

/// Scans `partitions` for those belonging to `device` and derives the level
/// they imply.
fn collect_partitions(
    device: &str,
    partitions: Vec<MountedPartition>,
    registry: &ProtectedMountpoints,
    naming: PartitionNaming,
) -> (Vec<MountedPartition>, WarningLevel) {
    let mut level = WarningLevel::Low;
    let mut matched = Vec::new();

    for partition in partitions {
        let belongs =
            partition.device == device || naming.base_device(&partition.device) == device;
        if !belongs {
            continue;
        }

        if registry.is_protected(&partition.mountpoint) {
            level = WarningLevel::Critical;
        } else if registry.is_important(&partition.mountpoint) {
            level = level.max(WarningLevel::High);
        }
        matched.push(partition);
    }

    (matched, level)
}

/// Builds [`SafetyAssessment`]s from injected state.
pub struct Classifier<'a> {
    registry: &'a ProtectedMountpoints,
    system_drives: &'a DetectionOutcome,
    mounts: &'a dyn MountSource,
    removable: &'a RemovableProbe,
    naming: PartitionNaming,
    escalate_degraded: bool,
}

impl<'a> Classifier<'a> {
    pub fn new(
        registry: &'a ProtectedMountpoints,
        system_drives: &'a DetectionOutcome,
        mounts: &'a dyn MountSource,
        removable: &'a RemovableProbe,
        naming: PartitionNaming,
    ) -> Self {
        Self {
            registry,
            system_drives,
            mounts,
            removable,
            naming,
            escalate_degraded: true,
        }
    }

    /// Whether incomplete system drive detection lifts `low` to `high`.
    pub fn escalate_degraded(mut self, escalate: bool) -> Self {
        self.escalate_degraded = escalate;
        self
    }

    /// Classifies `device` against the current mount table.
    ///
    /// Never fails. If the mount table cannot be read the assessment has no
    /// partitions and `mount_table_failed` is set; `is_system_device` is computed
    /// regardless.
    pub fn classify(&self, device: &str) -> SafetyAssessment {
        let is_system_device = self.system_drives.contains(device);

        let (mounted_partitions, mut warning_level, mount_table_failed) =
            match self.mounts.partitions() {
                Ok(partitions) => {
                    let (matched, level) =
                        collect_partitions(device, partitions, self.registry, self.naming);
                    (matched, level, false)
                }
                Err(e) => {
                    warn!(%device, error = %format!("{e:#}"), "mount table unavailable, assessing without partitions");
                    (Vec::new(), WarningLevel::Low, true)
                }
            };

        let escalated = self.escalate_degraded && self.system_drives.degraded;
        if escalated {
            warning_level = warning_level.max(WarningLevel::High);
        }

        let assessment = SafetyAssessment {
            device: device.to_string(),
            is_system_device,
            is_removable: self.removable.is_removable(device),
            mounted_partitions,
            warning_level,
            mount_table_failed,
            detection_degraded: self.system_drives.degraded,
            escalated,
        };
        debug!(
            device = %assessment.device,
            level = %assessment.warning_level,
            system = assessment.is_system_device,
            partitions = assessment.mounted_partitions.len(),
            "classified device"
        );
        assessment
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::platform::Platform;
    use anyhow::{Result, anyhow};

    struct Fixed(Vec<MountedPartition>);

    impl MountSource for Fixed {
        fn partitions(&self) -> Result<Vec<MountedPartition>> {
            Ok(self.0.clone())
        }
    }

    struct Broken;

    impl MountSource for Broken {
        fn partitions(&self) -> Result<Vec<MountedPartition>> {
            Err(anyhow!("permission denied"))
        }
    }

    fn table() -> Fixed {
        Fixed(vec![
            MountedPartition::new("/dev/sda2", "/", "ext4"),
            MountedPartition::new("/dev/sda1", "/boot/efi", "vfat"),
            MountedPartition::new("/dev/sdc1", "/home", "ext4"),
            MountedPartition::new("/dev/sdc2", "/media/scratch", "xfs"),
            MountedPartition::new("/dev/nvme0n1p1", "/srv", "ext4"),
        ])
    }

    fn classify_with(
        mounts: &dyn MountSource,
        drives: &DetectionOutcome,
        device: &str,
    ) -> SafetyAssessment {
        let registry = ProtectedMountpoints::for_platform(Platform::Linux);
        let removable = RemovableProbe::Unavailable;
        Classifier::new(&registry, drives, mounts, &removable, PartitionNaming::Linux)
            .classify(device)
    }

    #[test]
    fn system_disk_with_root_is_critical() {
        let drives = DetectionOutcome::from_devices(["/dev/sda", "/dev/sda2"]);
        let assessment = classify_with(&table(), &drives, "/dev/sda");

        assert!(assessment.is_system_device);
        assert_eq!(assessment.warning_level, WarningLevel::Critical);
        assert_eq!(assessment.mounted_partitions.len(), 2);
        assert_eq!(assessment.mounted_partitions[0].mountpoint, "/");
    }

    #[test]
    fn protected_mountpoint_is_critical_even_off_the_system_set() {
        let drives = DetectionOutcome::default();
        let assessment = classify_with(&table(), &drives, "/dev/sda");
        assert!(!assessment.is_system_device);
        assert_eq!(assessment.warning_level, WarningLevel::Critical);
    }

    #[test]
    fn important_mountpoint_is_high() {
        let drives = DetectionOutcome::default();
        let disk = classify_with(&table(), &drives, "/dev/sdc");
        assert_eq!(disk.warning_level, WarningLevel::High);
        assert_eq!(disk.mounted_partitions.len(), 2);

        let partition = classify_with(&table(), &drives, "/dev/sdc1");
        assert_eq!(partition.warning_level, WarningLevel::High);
        assert_eq!(partition.mounted_partitions.len(), 1);
    }

    #[test]
    fn nvme_partitions_match_their_disk() {
        let drives = DetectionOutcome::default();
        let assessment = classify_with(&table(), &drives, "/dev/nvme0n1");
        assert_eq!(assessment.mounted_partitions.len(), 1);
        assert_eq!(assessment.warning_level, WarningLevel::High);
    }

    #[test]
    fn unknown_device_is_low_and_empty() {
        let drives = DetectionOutcome::default();
        let assessment = classify_with(&table(), &drives, "/dev/sdz");
        assert!(!assessment.is_system_device);
        assert!(assessment.mounted_partitions.is_empty());
        assert_eq!(assessment.warning_level, WarningLevel::Low);
        assert!(!assessment.degraded());
    }

    #[test]
    fn mount_table_failure_keeps_system_flag() {
        let drives = DetectionOutcome::from_devices(["/dev/sda"]);
        let assessment = classify_with(&Broken, &drives, "/dev/sda");
        assert!(assessment.is_system_device);
        assert!(assessment.mounted_partitions.is_empty());
        assert!(assessment.mount_table_failed);
        assert!(!assessment.detection_degraded);
    }

    #[test]
    fn degraded_detection_escalates_low_to_high() {
        let mut drives = DetectionOutcome::default();
        let _ = drives.record::<()>("cmdline", Err(anyhow!("unreadable")));

        let escalated = classify_with(&table(), &drives, "/dev/sdz");
        assert_eq!(escalated.warning_level, WarningLevel::High);
        assert!(escalated.detection_degraded);
        assert!(escalated.escalated);
        assert!(!escalated.mount_table_failed);

        let registry = ProtectedMountpoints::for_platform(Platform::Linux);
        let removable = RemovableProbe::Unavailable;
        let mounts = table();
        let plain = Classifier::new(&registry, &drives, &mounts, &removable, PartitionNaming::Linux)
            .escalate_degraded(false)
            .classify("/dev/sdz");
        assert_eq!(plain.warning_level, WarningLevel::Low);
        assert!(plain.detection_degraded);
        assert!(!plain.escalated);
    }

    #[test]
    fn protected_mountpoint_outranks_important_in_either_order() {
        let drives = DetectionOutcome::default();
        let root_first = Fixed(vec![
            MountedPartition::new("/dev/sdd1", "/", "ext4"),
            MountedPartition::new("/dev/sdd2", "/home", "ext4"),
        ]);
        let home_first = Fixed(vec![
            MountedPartition::new("/dev/sdd2", "/home", "ext4"),
            MountedPartition::new("/dev/sdd1", "/", "ext4"),
        ]);

        for mounts in [&root_first, &home_first] {
            let assessment = classify_with(mounts, &drives, "/dev/sdd");
            assert_eq!(assessment.mounted_partitions.len(), 2);
            assert_eq!(assessment.warning_level, WarningLevel::Critical);
        }
    }

    #[test]
    fn classification_is_repeatable() {
        let drives = DetectionOutcome::from_devices(["/dev/sda"]);
        let first = classify_with(&table(), &drives, "/dev/sda");
        let second = classify_with(&table(), &drives, "/dev/sda");
        assert_eq!(first, second);
    }

    #[test]
    fn levels_are_ordered() {
        assert!(WarningLevel::Low < WarningLevel::High);
        assert!(WarningLevel::High < WarningLevel::Critical);
        assert_eq!(WarningLevel::Critical.to_string(), "critical");
    }
}
