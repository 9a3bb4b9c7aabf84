use crate::detect::{DetectionOutcome, SystemDriveDetector};
use anyhow::Context;
use std::env;
use std::path::{Path, PathBuf};
use tracing::debug;

type RootResolver = Box<dyn Fn(char) -> PathBuf + Send + Sync>;

/// Finds system volumes by walking the drive letters `A:` to `Z:`.
///
/// A letter that exists is a system drive when it is the primary system
/// volume (`%SystemDrive%`, normally `C:`) or holds a `Windows` directory.
pub struct DriveLetterDetector {
    primary: char,
    resolve_root: RootResolver,
}

impl DriveLetterDetector {
    /// Probes the real drive roots (`C:\`, `D:\`, ...).
    pub fn new() -> Self {
        let primary = env::var("SystemDrive")
            .ok()
            .and_then(|value| value.chars().next())
            .map(|c| c.to_ascii_uppercase())
            .unwrap_or('C');
        Self::with_root_resolver(primary, |letter| PathBuf::from(format!("{letter}:\\")))
    }

    /// Probes the directories returned by `resolve_root` instead of real drive
    /// roots.
    pub fn with_root_resolver<F>(primary: char, resolve_root: F) -> Self
    where
        F: Fn(char) -> PathBuf + Send + Sync + 'static,
    {
        Self {
            primary: primary.to_ascii_uppercase(),
            resolve_root: Box::new(resolve_root),
        }
    }
}

impl Default for DriveLetterDetector {
    fn default() -> Self {
        Self::new()
    }
}

fn exists(path: &Path) -> anyhow::Result<bool> {
    path.try_exists()
        .with_context(|| format!("stat {}", path.display()))
}

impl SystemDriveDetector for DriveLetterDetector {
    fn name(&self) -> &'static str {
        "drive-letter"
    }

    fn detect(&self) -> DetectionOutcome {
        let mut outcome = DetectionOutcome::default();

        for letter in 'A'..='Z' {
            let root = (self.resolve_root)(letter);
            // Empty card readers and optical drives fail to stat; they hold no OS.
            match exists(&root) {
                Ok(true) => {}
                Ok(false) => continue,
                Err(e) => {
                    debug!(%letter, error = %format!("{e:#}"), "drive root not ready, skipping");
                    continue;
                }
            }

            let is_system = letter == self.primary
                || outcome.record("windows-dir", exists(&root.join("Windows"))) == Some(true);
            if is_system {
                debug!(%letter, "system volume");
                outcome.found.insert(format!("{letter}:"));
            }
        }

        outcome
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn fake_drives(letters: &[&str]) -> TempDir {
        let dir = TempDir::new().unwrap();
        for letter in letters {
            fs::create_dir_all(dir.path().join(letter)).unwrap();
        }
        dir
    }

    #[test]
    fn primary_volume_and_windows_directory_mark_system_drives() {
        let dir = fake_drives(&["C", "D/Windows", "E", "F/Data"]);
        let base = dir.path().to_path_buf();
        let detector =
            DriveLetterDetector::with_root_resolver('c', move |l| base.join(l.to_string()));

        let outcome = detector.detect();
        assert!(!outcome.degraded);
        assert_eq!(
            outcome.found.iter().map(String::as_str).collect::<Vec<_>>(),
            ["C:", "D:"]
        );
    }

    #[test]
    fn missing_primary_volume_is_not_reported() {
        let dir = fake_drives(&["E"]);
        let base = dir.path().to_path_buf();
        let detector =
            DriveLetterDetector::with_root_resolver('C', move |l| base.join(l.to_string()));
        assert!(detector.detect().found.is_empty());
    }

    #[test]
    fn unreadable_drive_root_is_skipped_without_degrading() {
        let dir = fake_drives(&["C"]);
        fs::write(dir.path().join("blocker"), "").unwrap();
        let base = dir.path().to_path_buf();
        let detector = DriveLetterDetector::with_root_resolver('C', move |l| {
            if l == 'E' {
                base.join("blocker").join("E")
            } else {
                base.join(l.to_string())
            }
        });

        let outcome = detector.detect();
        assert!(!outcome.degraded);
        assert!(outcome.failures.is_empty());
        assert_eq!(
            outcome.found.iter().map(String::as_str).collect::<Vec<_>>(),
            ["C:"]
        );
    }
}
