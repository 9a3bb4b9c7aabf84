use crate::classify::{Classifier, SafetyAssessment};
use crate::config::GuardConfig;
use crate::confirm::{self, ConfirmationChallenge};
use crate::detect::DetectionOutcome;
use crate::mounts::{MountSource, RemovableProbe};
use crate::platform::Platform;
use crate::registry::ProtectedMountpoints;
use crate::validate::{self, GateDecision, Validation};
use std::collections::BTreeSet;
use tracing::{info, warn};

/// The process-wide safety state and the operations built on it.
///
/// The registry and the system drive set are computed once, when the guard is
/// built, and never change afterwards. Every query re-reads the mount table,
/// so a guard can be shared freely between threads.
pub struct SafetyGuard {
    platform: Platform,
    registry: ProtectedMountpoints,
    system_drives: DetectionOutcome,
    mounts: Box<dyn MountSource>,
    removable: RemovableProbe,
    escalate_degraded: bool,
}

impl SafetyGuard {
    /// Probes the running system and builds a guard for it.
    pub fn initialize(config: &GuardConfig) -> Self {
        let platform = Platform::current();
        let detector = platform.detector();
        let system_drives = detector.detect();

        info!(
            %platform,
            detector = detector.name(),
            system_drives = ?system_drives.found,
            "safety guard initialized"
        );
        if system_drives.degraded {
            warn!(
                failures = system_drives.failures.len(),
                "system drive detection incomplete, the system drive set may be missing devices"
            );
        }

        let registry = ProtectedMountpoints::for_platform(platform).with_extra(
            &config.extra_protected_mountpoints,
            &config.extra_important_mountpoints,
        );

        Self::new(platform, registry, system_drives, platform.mount_source())
            .with_removable_probe(platform.removable_probe())
            .with_degraded_escalation(config.escalate_degraded_detection)
    }

    /// Builds a guard from explicit parts.
    pub fn new(
        platform: Platform,
        registry: ProtectedMountpoints,
        system_drives: DetectionOutcome,
        mounts: Box<dyn MountSource>,
    ) -> Self {
        Self {
            platform,
            registry,
            system_drives,
            mounts,
            removable: RemovableProbe::Unavailable,
            escalate_degraded: true,
        }
    }

    pub fn with_removable_probe(mut self, probe: RemovableProbe) -> Self {
        self.removable = probe;
        self
    }

    pub fn with_degraded_escalation(mut self, escalate: bool) -> Self {
        self.escalate_degraded = escalate;
        self
    }

    pub fn platform(&self) -> Platform {
        self.platform
    }

    pub fn protected_mountpoints(&self) -> &BTreeSet<String> {
        self.registry.protected_mountpoints()
    }

    pub fn registry(&self) -> &ProtectedMountpoints {
        &self.registry
    }

    pub fn system_drives(&self) -> &DetectionOutcome {
        &self.system_drives
    }

    fn classifier(&self) -> Classifier<'_> {
        Classifier::new(
            &self.registry,
            &self.system_drives,
            self.mounts.as_ref(),
            &self.removable,
            self.platform.partition_naming(),
        )
        .escalate_degraded(self.escalate_degraded)
    }

    /// Assesses `device` against live state.
    pub fn classify(&self, device: &str) -> SafetyAssessment {
        self.classifier().classify(device)
    }

    /// Decides whether `operation` may run on `device`.
    ///
    /// The operation name does not change the verdict; it is accepted so the
    /// call reads the same as [`SafetyGuard::begin`].
    pub fn validate(&self, device: &str, _operation: &str) -> Validation {
        validate::validate(&self.classify(device))
    }

    /// Builds the confirmation challenge for `operation` on `device`.
    pub fn challenge_for(&self, device: &str, operation: &str) -> ConfirmationChallenge {
        confirm::challenge_for(&self.classify(device), operation)
    }

    /// Starts one safety-gated operation from a fresh assessment.
    pub fn begin(&self, device: &str, operation: &str) -> GateDecision {
        validate::begin(self.classify(device), operation)
    }

    /// Whole-disk identifiers worth listing: the parents of every mounted
    /// block device plus every detected system drive.
    pub fn known_devices(&self) -> Vec<String> {
        let naming = self.platform.partition_naming();
        let mut devices: BTreeSet<String> = self
            .system_drives
            .found
            .iter()
            .map(|d| naming.base_device(d).to_string())
            .collect();

        match self.mounts.partitions() {
            Ok(partitions) => devices.extend(
                partitions
                    .iter()
                    .map(|p| naming.base_device(&p.device).to_string()),
            ),
            Err(e) => warn!(error = %format!("{e:#}"), "mount table unavailable while listing devices"),
        }

        devices.into_iter().collect()
    }
}
