//! The set of mountpoints a destructive operation must never touch.
//!
//! The registry is built once during initialization from the platform's
//! baseline plus any extra entries from [`crate::config::GuardConfig`], and is
//! read-only afterwards. Configuration can add entries but never remove
//! baseline ones.

use crate::platform::Platform;
use std::collections::BTreeSet;

/// OS-critical paths shared by every platform family.
const BASELINE_PROTECTED: &[&str] = &[
    "/", "/boot", "/efi", "/bin", "/sbin", "/lib", "/lib64", "/usr", "/etc", "/var",
];

const LINUX_PROTECTED: &[&str] = &["/boot/efi"];

const MACOS_PROTECTED: &[&str] = &[
    "/System",
    "/System/Volumes/Data",
    "/System/Volumes/Preboot",
    "/System/Volumes/VM",
    "/System/Volumes/Update",
];

const WINDOWS_PROTECTED: &[&str] = &[
    "C:\\",
    "C:\\Windows",
    "C:\\Program Files",
    "C:\\Program Files (x86)",
];

/// Locations that hold valuable data but do not keep the OS running.
const BASELINE_IMPORTANT: &[&str] = &["/home", "/opt", "/srv", "/root"];

const MACOS_IMPORTANT: &[&str] = &["/Users"];

/// Protected and important mountpoints for one platform.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ProtectedMountpoints {
    protected: BTreeSet<String>,
    important: BTreeSet<String>,
}

impl ProtectedMountpoints {
    /// Builds the registry for `platform`.
    pub fn for_platform(platform: Platform) -> Self {
        let extra_protected = match platform {
            Platform::Linux => LINUX_PROTECTED,
            Platform::MacOs => MACOS_PROTECTED,
            Platform::Windows => WINDOWS_PROTECTED,
        };
        let extra_important: &[&str] = match platform {
            Platform::MacOs => MACOS_IMPORTANT,
            _ => &[],
        };

        Self {
            protected: BASELINE_PROTECTED
                .iter()
                .chain(extra_protected)
                .map(|p| normalize(p))
                .collect(),
            important: BASELINE_IMPORTANT
                .iter()
                .chain(extra_important)
                .map(|p| normalize(p))
                .collect(),
        }
    }

    /// Appends extra protected and important mountpoints.
    ///
    /// A path listed in both sets is treated as protected.
    pub fn with_extra<P, I>(mut self, protected: P, important: I) -> Self
    where
        P: IntoIterator,
        P::Item: AsRef<str>,
        I: IntoIterator,
        I::Item: AsRef<str>,
    {
        self.protected
            .extend(protected.into_iter().map(|p| normalize(p.as_ref())));
        self.important
            .extend(important.into_iter().map(|p| normalize(p.as_ref())));
        self
    }

    pub fn protected_mountpoints(&self) -> &BTreeSet<String> {
        &self.protected
    }

    pub fn important_mountpoints(&self) -> &BTreeSet<String> {
        &self.important
    }

    pub fn is_protected(&self, mountpoint: &str) -> bool {
        self.protected.contains(&normalize(mountpoint))
    }

    pub fn is_important(&self, mountpoint: &str) -> bool {
        self.important.contains(&normalize(mountpoint))
    }
}

/// Canonical form used for lookups: no trailing separator (except for a bare
/// root) and upper-case drive letters.
fn normalize(path: &str) -> String {
    let is_drive_path = path.as_bytes().get(1) == Some(&b':');
    if is_drive_path {
        let upper = path.to_ascii_uppercase();
        // Keep `C:\` as is; it is the volume root, not `C:`.
        if upper.len() > 3 {
            return upper.trim_end_matches('\\').to_string();
        }
        return upper;
    }

    if path.len() > 1 {
        path.trim_end_matches('/').to_string()
    } else {
        path.to_string()
    }
}
