//! The core, UI-agnostic safety library for DiskForge.
//!
//! `diskforge-core` sits in front of every destructive storage operation
//! (formatting, image writing). It does no disk I/O itself. Operation drivers
//! ask it whether a target device is safe to touch, and if not, what the
//! operator has to type before they may proceed.
//!
//! The library is structured into several key modules:
//! - [`registry`]: The protected and important mountpoints for each platform.
//! - [`platform`]: Platform-specific probes: system drive detection, the live
//!   mount table, and removability.
//! - [`detect`]: The [`detect::SystemDriveDetector`] interface and the
//!   [`detect::DetectionOutcome`] it produces.
//! - [`classify`]: Builds a per-device [`SafetyAssessment`].
//! - [`confirm`]: The risk-proportional confirmation challenge.
//! - [`validate`]: The final allow / block / confirm gate.
//! - [`config`]: Optional TOML configuration.
//!
//! Data flows one way: detector and registry feed the classifier, the
//! classifier feeds the confirmation protocol and the validator, and the
//! caller acts on the result. Every query re-reads the mount table.
//!
//! ## Example: Gating a Format
//!
//! ```rust,no_run
//! use diskforge_core::{GuardConfig, SafetyGuard};
//! use diskforge_core::validate::{ConfirmationOutcome, GateDecision};
//! use std::io;
//! use anyhow::{Result, bail};
//!
//! fn main() -> Result<()> {
//!     let guard = SafetyGuard::initialize(&GuardConfig::default());
//!
//!     let clearance = match guard.begin("/dev/sdb", "format") {
//!         GateDecision::Blocked(blocked) => bail!(blocked.validation.reason),
//!         GateDecision::AutoAllowed(clearance) => clearance,
//!         GateDecision::AwaitingConfirmation(pending) => {
//!             let stdin = io::stdin();
//!             match pending.confirm_with(&mut stdin.lock(), &mut io::stdout())? {
//!                 ConfirmationOutcome::Confirmed(clearance) => clearance,
//!                 ConfirmationOutcome::Rejected(rejection) => bail!("{rejection}"),
//!             }
//!         }
//!     };
//!
//!     println!("{clearance}");
//!     Ok(())
//! }
//! ```

pub mod classify;
pub mod config;
pub mod confirm;
pub mod detect;
pub mod device;
mod guard;
pub mod mounts;
pub mod platform;
pub mod registry;
pub mod validate;

pub use classify::{SafetyAssessment, WarningLevel};
pub use config::{ConfigError, GuardConfig};
pub use confirm::{CRITICAL_PHRASE, ConfirmationChallenge, accept, challenge_for};
pub use detect::{DetectionOutcome, SystemDriveDetector};
pub use device::{MountedPartition, PartitionNaming};
pub use guard::SafetyGuard;
pub use platform::Platform;
pub use validate::{GateDecision, Validation, Verdict};
