//! Provides platform-specific functionality.
//!
//! This module contains the logic for interacting with the operating system to
//! perform tasks that are not cross-platform: finding the drives that host the
//! running OS, reading the live mount table, and checking removability.
//!
//! Each submodule exposes the same kind of building blocks (a
//! [`SystemDriveDetector`] and, where needed, a [`MountSource`]). It uses
//! conditional compilation (`#[cfg]`) so that only the probes for the target
//! OS are built. The Linux probes are the fallback for every other Unix and
//! are always present; test builds include all three so their parsers can be
//! exercised on any host.

pub mod linux;
#[cfg(any(target_os = "macos", test))]
pub mod macos;
#[cfg(any(target_os = "windows", test))]
pub mod windows;

use crate::detect::SystemDriveDetector;
use crate::device::PartitionNaming;
use crate::mounts::{MountSource, RemovableProbe, SysinfoMounts};
use serde::Serialize;
use std::fmt;
use std::path::PathBuf;

/// The OS families the safety guard knows how to probe.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Platform {
    /// Linux and other systems with a `/proc/mounts`-style mount table.
    Linux,
    MacOs,
    Windows,
}

impl Platform {
    /// The family of the running OS.
    pub fn current() -> Self {
        if cfg!(target_os = "windows") {
            Self::Windows
        } else if cfg!(target_os = "macos") {
            Self::MacOs
        } else {
            Self::Linux
        }
    }

    pub fn partition_naming(self) -> PartitionNaming {
        match self {
            Self::Linux => PartitionNaming::Linux,
            Self::MacOs => PartitionNaming::Darwin,
            Self::Windows => PartitionNaming::DriveLetter,
        }
    }

    /// The system drive detector for this family, with its default probe paths.
    ///
    /// A family whose probes are not built for this target gets the Linux
    /// mount-table detector.
    pub fn detector(self) -> Box<dyn SystemDriveDetector> {
        match self {
            Self::Linux => Box::new(linux::MountTableDetector::default()),
            #[cfg(any(target_os = "macos", test))]
            Self::MacOs => Box::new(macos::DiskUtilDetector::default()),
            #[cfg(any(target_os = "windows", test))]
            Self::Windows => Box::new(windows::DriveLetterDetector::new()),
            #[cfg(not(test))]
            _ => Box::new(linux::MountTableDetector::default()),
        }
    }

    /// The live mount table for this family.
    pub fn mount_source(self) -> Box<dyn MountSource> {
        match self {
            Self::Linux => Box::new(linux::ProcMounts::default()),
            #[cfg(any(target_os = "macos", test))]
            Self::MacOs => Box::new(macos::MountCommand::default()),
            #[cfg(not(any(target_os = "macos", test)))]
            Self::MacOs => Box::new(linux::ProcMounts::default()),
            Self::Windows => Box::new(SysinfoMounts),
        }
    }

    pub fn removable_probe(self) -> RemovableProbe {
        match self {
            Self::Linux => RemovableProbe::SysBlock(PathBuf::from(linux::SYS_BLOCK)),
            Self::MacOs => RemovableProbe::Unavailable,
            Self::Windows => RemovableProbe::Sysinfo,
        }
    }
}

impl fmt::Display for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Linux => "linux",
            Self::MacOs => "macos",
            Self::Windows => "windows",
        };
        f.pad(name)
    }
}
