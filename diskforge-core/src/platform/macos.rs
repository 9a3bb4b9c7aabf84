use crate::detect::{DetectionOutcome, SystemDriveDetector};
use crate::device::{MountedPartition, PartitionNaming};
use crate::mounts::MountSource;
use anyhow::{Context, Result, anyhow, bail};
use std::path::{Path, PathBuf};
use std::process::Command;
use tracing::debug;

/// Runs `program args...` and returns its stdout, failing on a non-zero exit.
fn run_utility(program: &Path, args: &[&str]) -> Result<String> {
    let output = Command::new(program)
        .args(args)
        .output()
        .with_context(|| format!("run {} {}", program.display(), args.join(" ")))?;
    if !output.status.success() {
        bail!(
            "{} {} exited with {}",
            program.display(),
            args.join(" "),
            output.status
        );
    }
    Ok(String::from_utf8_lossy(&output.stdout).into_owned())
}

/// Pulls the value of the `Device Node:` line out of `diskutil info` output.
pub fn parse_device_node(text: &str) -> Option<String> {
    text.lines()
        .filter_map(|line| line.trim().strip_prefix("Device Node:"))
        .map(str::trim)
        .find(|node| !node.is_empty())
        .map(str::to_string)
}

/// Parses the output of `mount` (`/dev/disk3s1s1 on / (apfs, sealed, local)`).
pub fn parse_mount_output(text: &str) -> Vec<MountedPartition> {
    let mut partitions = Vec::new();
    for line in text.lines() {
        let Some((source, rest)) = line.split_once(" on ") else {
            continue;
        };
        if !source.starts_with("/dev/") {
            continue;
        }
        let (mountpoint, options) = match rest.rsplit_once(" (") {
            Some((mountpoint, options)) => (mountpoint, options),
            None => (rest, ""),
        };
        let fs_type = options
            .trim_end_matches(')')
            .split(',')
            .next()
            .unwrap_or("")
            .trim();
        partitions.push(MountedPartition::new(source, mountpoint, fs_type));
    }
    partitions
}

/// Asks `diskutil` which device backs the root volume.
#[derive(Clone, Debug)]
pub struct DiskUtilDetector {
    program: PathBuf,
}

impl Default for DiskUtilDetector {
    fn default() -> Self {
        Self::new("diskutil")
    }
}

impl DiskUtilDetector {
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
        }
    }

    fn root_device_node(&self) -> Result<String> {
        let stdout = run_utility(&self.program, &["info", "/"])?;
        parse_device_node(&stdout).ok_or_else(|| anyhow!("no `Device Node:` line in diskutil output"))
    }
}

impl SystemDriveDetector for DiskUtilDetector {
    fn name(&self) -> &'static str {
        "disk-utility"
    }

    fn detect(&self) -> DetectionOutcome {
        let mut outcome = DetectionOutcome::default();
        if let Some(node) = outcome.record("diskutil", self.root_device_node()) {
            debug!(device = %node, "root volume device node");
            outcome.insert_with_base(&node, PartitionNaming::Darwin);
        }
        outcome
    }
}

/// The live mount table as printed by `mount`.
#[derive(Clone, Debug)]
pub struct MountCommand {
    program: PathBuf,
}

impl Default for MountCommand {
    fn default() -> Self {
        Self::new("/sbin/mount")
    }
}

impl MountCommand {
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
        }
    }
}

impl MountSource for MountCommand {
    fn partitions(&self) -> Result<Vec<MountedPartition>> {
        let stdout = run_utility(&self.program, &[])?;
        Ok(parse_mount_output(&stdout))
    }
}
