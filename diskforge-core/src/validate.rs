//! The final gate in front of a destructive operation.
//!
//! [`validate`] is the plain yes / no / needs-confirmation decision. [`begin`]
//! wraps the same decision in a one-way state machine:
//!
//! ```text
//! assessment ─┬─> Blocked
//!             ├─> AutoAllowed ──────────────> Clearance
//!             └─> AwaitingConfirmation ─┬───> Clearance
//!                                       └───> Rejection
//! ```
//!
//! Every transition consumes its input, so a decision cannot be replayed. A
//! retry starts over from a fresh assessment. The gate decides; enforcing it
//! is the caller's job.

use crate::classify::{SafetyAssessment, WarningLevel};
use crate::confirm::{self, ConfirmationChallenge};
use serde::Serialize;
use std::fmt;
use std::io::{self, BufRead, Write};
use tracing::info;

pub const REASON_BLOCKED: &str = "Operation blocked: critical system device";
pub const REASON_AUTO_ALLOWED: &str = "Safe removable device";
pub const REASON_NEEDS_CONFIRMATION: &str = "Requires confirmation";

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Verdict {
    Blocked,
    AutoAllowed,
    RequiresConfirmation,
}

/// The result of [`validate`].
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct Validation {
    /// `false` is fatal to the requested operation.
    pub allowed: bool,
    pub reason: String,
    pub verdict: Verdict,
}

impl Validation {
    fn new(verdict: Verdict) -> Self {
        let (allowed, reason) = match verdict {
            Verdict::Blocked => (false, REASON_BLOCKED),
            Verdict::AutoAllowed => (true, REASON_AUTO_ALLOWED),
            Verdict::RequiresConfirmation => (true, REASON_NEEDS_CONFIRMATION),
        };
        Self {
            allowed,
            reason: reason.to_string(),
            verdict,
        }
    }
}

/// Decides whether an operation on the assessed device may go ahead.
///
/// A device with no mounted partitions is auto-allowed unless the empty list
/// proves nothing: the mount table was unreadable, the device is an unmounted
/// system disk, or incomplete detection escalated the assessment.
pub fn validate(assessment: &SafetyAssessment) -> Validation {
    let verdict = if assessment.is_system_device
        && assessment.warning_level == WarningLevel::Critical
    {
        Verdict::Blocked
    } else if assessment.mounted_partitions.is_empty()
        && !assessment.is_system_device
        && !assessment.mount_table_failed
        && !assessment.escalated
    {
        Verdict::AutoAllowed
    } else {
        Verdict::RequiresConfirmation
    };
    Validation::new(verdict)
}

/// Proof that an operation passed the gate. Only the gate can create one.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Clearance {
    device: String,
    operation: String,
    warning_level: WarningLevel,
    confirmed: bool,
}

impl Clearance {
    pub fn device(&self) -> &str {
        &self.device
    }

    pub fn operation(&self) -> &str {
        &self.operation
    }

    pub fn warning_level(&self) -> WarningLevel {
        self.warning_level
    }

    /// `true` if the operator typed the challenge phrase, `false` if the
    /// device was auto-allowed.
    pub fn confirmed(&self) -> bool {
        self.confirmed
    }
}

impl fmt::Display for Clearance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "cleared to {} {}", self.operation, self.device)
    }
}

/// The operator's answer did not match the challenge.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Rejection {
    device: String,
    operation: String,
    warning_level: WarningLevel,
}

impl Rejection {
    pub fn device(&self) -> &str {
        &self.device
    }

    pub fn warning_level(&self) -> WarningLevel {
        self.warning_level
    }
}

impl fmt::Display for Rejection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "confirmation rejected, not running {} on {}",
            self.operation, self.device
        )
    }
}

/// A device stopped at the gate.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Blocked {
    pub assessment: SafetyAssessment,
    pub validation: Validation,
}

/// An operation waiting for the operator to answer its challenge.
#[derive(Debug)]
pub struct PendingConfirmation {
    assessment: SafetyAssessment,
    operation: String,
    challenge: ConfirmationChallenge,
}

#[derive(Debug)]
pub enum ConfirmationOutcome {
    Confirmed(Clearance),
    Rejected(Rejection),
}

impl PendingConfirmation {
    pub fn assessment(&self) -> &SafetyAssessment {
        &self.assessment
    }

    pub fn challenge(&self) -> &ConfirmationChallenge {
        &self.challenge
    }

    /// Settles the pending operation with the operator's answer.
    pub fn confirm(self, input: &str) -> ConfirmationOutcome {
        let level = self.challenge.warning_level();
        if confirm::accept(&self.challenge, input) {
            info!(device = %self.assessment.device, operation = %self.operation, %level, "operator confirmed");
            ConfirmationOutcome::Confirmed(Clearance {
                device: self.assessment.device,
                operation: self.operation,
                warning_level: level,
                confirmed: true,
            })
        } else {
            info!(device = %self.assessment.device, operation = %self.operation, %level, "operator confirmation rejected");
            ConfirmationOutcome::Rejected(Rejection {
                device: self.assessment.device,
                operation: self.operation,
                warning_level: level,
            })
        }
    }

    /// Shows the challenge on `output`, reads one answer from `input` and
    /// settles with it.
    pub fn confirm_with<R, W>(self, input: &mut R, output: &mut W) -> io::Result<ConfirmationOutcome>
    where
        R: BufRead,
        W: Write,
    {
        let response = confirm::read_response(&self.challenge, input, output)?;
        Ok(self.confirm(&response))
    }
}

/// Where a freshly assessed operation stands.
#[derive(Debug)]
pub enum GateDecision {
    Blocked(Blocked),
    AutoAllowed(Clearance),
    AwaitingConfirmation(PendingConfirmation),
}

impl GateDecision {
    pub fn validation(&self) -> Validation {
        match self {
            Self::Blocked(blocked) => blocked.validation.clone(),
            Self::AutoAllowed(_) => Validation::new(Verdict::AutoAllowed),
            Self::AwaitingConfirmation(_) => Validation::new(Verdict::RequiresConfirmation),
        }
    }
}

/// Runs the gate for `operation` on an assessment taken just now.
pub fn begin(assessment: SafetyAssessment, operation: &str) -> GateDecision {
    let validation = validate(&assessment);
    info!(
        device = %assessment.device,
        operation,
        level = %assessment.warning_level,
        reason = %validation.reason,
        "safety gate"
    );

    match validation.verdict {
        Verdict::Blocked => GateDecision::Blocked(Blocked {
            assessment,
            validation,
        }),
        Verdict::AutoAllowed => GateDecision::AutoAllowed(Clearance {
            device: assessment.device,
            operation: operation.to_string(),
            warning_level: assessment.warning_level,
            confirmed: false,
        }),
        Verdict::RequiresConfirmation => {
            let challenge = confirm::challenge_for(&assessment, operation);
            GateDecision::AwaitingConfirmation(PendingConfirmation {
                assessment,
                operation: operation.to_string(),
                challenge,
            })
        }
    }
}
