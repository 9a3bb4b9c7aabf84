//! Discovery of the block devices that host the running operating system.
//!
//! Each platform family has its own [`SystemDriveDetector`]. Detection is
//! best-effort: a probe step that fails contributes nothing and detection
//! carries on with whatever it has. Unlike a silent fail-open, every failure
//! is kept in the [`DetectionOutcome`] so callers can treat an incomplete set
//! as a risk in its own right.

use crate::device::PartitionNaming;
use serde::Serialize;
use std::collections::BTreeSet;
use tracing::warn;

/// A platform-specific probe for system drives.
pub trait SystemDriveDetector: Send + Sync {
    /// A short name used in logs and failure records.
    fn name(&self) -> &'static str;

    /// Runs every probe step. Never fails; see [`DetectionOutcome::degraded`].
    fn detect(&self) -> DetectionOutcome;
}

/// One probe step that failed during detection.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct ProbeFailure {
    pub probe: &'static str,
    pub message: String,
}

/// The set of system drives found, and whether the search was complete.
///
/// `found` may miss drives when `degraded` is set, but never contains a
/// device that does not host part of the running OS.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct DetectionOutcome {
    pub found: BTreeSet<String>,
    pub degraded: bool,
    pub failures: Vec<ProbeFailure>,
}

impl DetectionOutcome {
    /// An outcome with a fixed set of devices and no failures.
    pub fn from_devices<I>(devices: I) -> Self
    where
        I: IntoIterator,
        I::Item: Into<String>,
    {
        Self {
            found: devices.into_iter().map(Into::into).collect(),
            ..Self::default()
        }
    }

    /// Exact-match membership.
    pub fn contains(&self, device: &str) -> bool {
        self.found.contains(device)
    }

    /// Adds a system partition and the whole disk it lives on.
    pub fn insert_with_base(&mut self, device: &str, naming: PartitionNaming) {
        self.found.insert(naming.base_device(device).to_string());
        self.found.insert(device.to_string());
    }

    /// Unwraps the result of one probe step, or records it as a failure.
    pub fn record<T>(&mut self, probe: &'static str, result: anyhow::Result<T>) -> Option<T> {
        match result {
            Ok(value) => Some(value),
            Err(e) => {
                let message = format!("{e:#}");
                warn!(probe, error = %message, "system drive probe failed, continuing without it");
                self.degraded = true;
                self.failures.push(ProbeFailure { probe, message });
                None
            }
        }
    }
}
