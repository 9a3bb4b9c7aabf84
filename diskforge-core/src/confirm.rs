//! The human confirmation required before a destructive operation.
//!
//! The strength of the challenge follows the device's [`WarningLevel`]:
//!
//! | level      | phrase to type              |
//! |------------|-----------------------------|
//! | `critical` | `I UNDERSTAND THE RISK`     |
//! | `high`     | the operation name, verbatim |
//! | `low`      | the operation name, verbatim |
//!
//! Matching is exact and case-sensitive after trimming surrounding whitespace.
//! There is no partial credit and no retry; a caller that wants to re-prompt
//! must build a fresh assessment first.

use crate::classify::{SafetyAssessment, WarningLevel};
use crate::device::MountedPartition;
use std::fmt::Write as _;
use std::io::{self, BufRead, Write};

/// The phrase demanded for devices holding system partitions.
pub const CRITICAL_PHRASE: &str = "I UNDERSTAND THE RISK";

/// What the operator must type, and the message explaining why.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ConfirmationChallenge {
    warning_level: WarningLevel,
    phrase: String,
    message: String,
}

impl ConfirmationChallenge {
    pub fn warning_level(&self) -> WarningLevel {
        self.warning_level
    }

    /// The exact text that authorizes the operation.
    pub fn phrase(&self) -> &str {
        &self.phrase
    }

    /// Plain-text warning to show before reading the operator's answer.
    pub fn message(&self) -> &str {
        &self.message
    }
}

fn partition_lines(out: &mut String, partitions: &[MountedPartition]) {
    out.push_str("Mounted partitions:\n");
    for partition in partitions {
        let _ = writeln!(out, "  - {} -> {}", partition.device, partition.mountpoint);
    }
}

/// Builds the challenge for running `operation` on the assessed device.
pub fn challenge_for(assessment: &SafetyAssessment, operation: &str) -> ConfirmationChallenge {
    let device = &assessment.device;
    let mut message = String::new();

    let phrase = match assessment.warning_level {
        WarningLevel::Critical => {
            let _ = writeln!(message, "CRITICAL WARNING\n");
            let _ = writeln!(message, "You are about to {operation} {device}");
            message.push_str(
                "This device contains SYSTEM PARTITIONS that are critical for your computer to function!\n\n",
            );
            partition_lines(&mut message, &assessment.mounted_partitions);
            message.push_str("\nProceeding will likely make your system UNBOOTABLE!\n");
            let _ = write!(message, "Type '{CRITICAL_PHRASE}' to continue:");
            CRITICAL_PHRASE.to_string()
        }
        WarningLevel::High => {
            let _ = writeln!(message, "HIGH RISK WARNING\n");
            let _ = writeln!(message, "You are about to {operation} {device}");
            message.push_str("This device contains important system data!\n\n");
            partition_lines(&mut message, &assessment.mounted_partitions);
            let _ = write!(message, "\nType '{operation}' to confirm:");
            operation.to_string()
        }
        WarningLevel::Low => {
            let _ = writeln!(message, "You are about to {operation} {device}");
            message.push_str("This will PERMANENTLY DELETE all data on this device!\n\n");
            let _ = write!(message, "Type '{operation}' to confirm:");
            operation.to_string()
        }
    };

    ConfirmationChallenge {
        warning_level: assessment.warning_level,
        phrase,
        message,
    }
}

/// Checks the operator's answer against the challenge.
///
/// An empty phrase (an empty operation name) accepts nothing.
pub fn accept(challenge: &ConfirmationChallenge, input: &str) -> bool {
    !challenge.phrase.is_empty() && input.trim() == challenge.phrase
}

/// Writes the challenge message to `output` and reads one line from `input`.
///
/// Returns the raw line, without its line terminator. End of input reads as
/// an empty answer.
pub fn read_response<R, W>(
    challenge: &ConfirmationChallenge,
    input: &mut R,
    output: &mut W,
) -> io::Result<String>
where
    R: BufRead,
    W: Write,
{
    writeln!(output, "{}", challenge.message)?;
    output.flush()?;

    let mut line = String::new();
    input.read_line(&mut line)?;
    Ok(line.trim_end_matches(['\r', '\n']).to_string())
}

/// Shows the challenge and reports whether the operator's answer accepts it.
pub fn prompt<R, W>(challenge: &ConfirmationChallenge, input: &mut R, output: &mut W) -> io::Result<bool>
where
    R: BufRead,
    W: Write,
{
    let response = read_response(challenge, input, output)?;
    Ok(accept(challenge, &response))
}
