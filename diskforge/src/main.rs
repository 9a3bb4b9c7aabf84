use anyhow::Result;
use clap::{Parser, Subcommand};
use console::style;
use dialoguer::{Input, theme::ColorfulTheme};
use diskforge_core::validate::{ConfirmationOutcome, GateDecision, PendingConfirmation};
use diskforge_core::{GuardConfig, SafetyAssessment, SafetyGuard, WarningLevel};
use std::io::{self, IsTerminal};
use std::path::PathBuf;
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;

const EXIT_BLOCKED: u8 = 2;
const EXIT_REJECTED: u8 = 3;

#[derive(Parser)]
#[command(name = "diskforge")]
#[command(about = "Risk checks and confirmation for destructive disk operations", version)]
struct Cli {
    /// Configuration file (defaults to $DISKFORGE_CONFIG)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Log debug output to stderr
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List mounted and system disks with their risk level
    List,
    /// Show the safety assessment of one device
    Assess {
        /// Device to assess (e.g. /dev/sdb, /dev/disk2, D:)
        #[arg(required = true)]
        device: String,

        /// Print the assessment as JSON
        #[arg(long)]
        json: bool,
    },
    /// Run the safety gate for an operation and ask for confirmation
    Check {
        /// Target device
        #[arg(required = true)]
        device: String,

        /// Name of the destructive operation; also the phrase to type for
        /// non-critical devices
        #[arg(short, long, default_value = "format")]
        operation: String,
    },
}

fn init_tracing(verbose: bool) {
    let filter = if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"))
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .init();
}

fn styled_level(level: WarningLevel) -> String {
    let label = level.to_string().to_uppercase();
    match level {
        WarningLevel::Critical => style(label).red().bold().to_string(),
        WarningLevel::High => style(label).yellow().bold().to_string(),
        WarningLevel::Low => style(label).green().to_string(),
    }
}

fn yes_no(value: bool) -> &'static str {
    if value { "yes" } else { "no" }
}

fn print_assessment(assessment: &SafetyAssessment) {
    println!("  Device:    {}", style(&assessment.device).cyan());
    println!("  Risk:      {}", styled_level(assessment.warning_level));
    println!("  System:    {}", yes_no(assessment.is_system_device));
    println!("  Removable: {}", yes_no(assessment.is_removable));
    if assessment.degraded() {
        println!(
            "  {} system state could not be fully determined",
            style("Note:").yellow()
        );
    }
    if assessment.mounted_partitions.is_empty() {
        println!("  Mounts:    (none)");
    } else {
        println!("  Mounts:");
        for partition in &assessment.mounted_partitions {
            println!("    - {partition}");
        }
    }
}

/// Shows the challenge and collects the operator's answer.
///
/// Falls back to a plain line read when stdin is not a terminal, so the gate
/// can be driven from a script.
fn ask(pending: PendingConfirmation) -> Result<ConfirmationOutcome> {
    let header = match pending.challenge().warning_level() {
        WarningLevel::Critical => style("!!").red().bold(),
        WarningLevel::High => style("!").yellow().bold(),
        WarningLevel::Low => style("!").yellow(),
    };

    if !io::stdin().is_terminal() {
        let stdin = io::stdin();
        return Ok(pending.confirm_with(&mut stdin.lock(), &mut io::stdout())?);
    }

    println!("{header} {}", pending.challenge().message());
    let answer: String = Input::with_theme(&ColorfulTheme::default())
        .with_prompt(">")
        .allow_empty(true)
        .interact_text()?;
    Ok(pending.confirm(&answer))
}

fn main() -> Result<ExitCode> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let config = GuardConfig::resolve(cli.config.as_deref())?;
    tracing::debug!(?config, "configuration loaded");
    let guard = SafetyGuard::initialize(&config);

    match cli.command {
        Commands::List => {
            let devices = guard.known_devices();
            if devices.is_empty() {
                println!("No disks found.");
                return Ok(ExitCode::SUCCESS);
            }

            println!("Found {} disks:", devices.len());
            println!(
                "\n  {:<16} {:<10} {:<8} {:<10} {}",
                "DEVICE", "RISK", "SYSTEM", "REMOVABLE", "MOUNTS"
            );
            println!("  {:-<16} {:-<10} {:-<8} {:-<10} {:-<20}", "", "", "", "", "");
            for device in devices {
                let assessment = guard.classify(&device);
                let mounts = if assessment.mounted_partitions.is_empty() {
                    "(Not mounted)".to_string()
                } else {
                    assessment
                        .mounted_partitions
                        .iter()
                        .map(|p| p.mountpoint.as_str())
                        .collect::<Vec<_>>()
                        .join(", ")
                };
                println!(
                    "  {:<16} {:<10} {:<8} {:<10} {}",
                    assessment.device,
                    assessment.warning_level,
                    yes_no(assessment.is_system_device),
                    yes_no(assessment.is_removable),
                    mounts
                );
            }
            if guard.system_drives().degraded {
                println!(
                    "\n{} system drive detection was incomplete; run with -v for details.",
                    style("Note:").yellow()
                );
            }
        }
        Commands::Assess { device, json } => {
            let assessment = guard.classify(&device);
            if json {
                println!("{}", serde_json::to_string_pretty(&assessment)?);
            } else {
                print_assessment(&assessment);
            }
        }
        Commands::Check { device, operation } => match guard.begin(&device, &operation) {
            GateDecision::Blocked(blocked) => {
                println!(
                    "{} {}",
                    style("BLOCKED:").red().bold(),
                    blocked.validation.reason
                );
                print_assessment(&blocked.assessment);
                return Ok(ExitCode::from(EXIT_BLOCKED));
            }
            GateDecision::AutoAllowed(clearance) => {
                println!(
                    "{} {} ({}).",
                    style("Allowed:").green().bold(),
                    clearance,
                    style("no mounted partitions").dim()
                );
            }
            GateDecision::AwaitingConfirmation(pending) => match ask(pending)? {
                ConfirmationOutcome::Confirmed(clearance) => {
                    println!("\n{} {}.", style("Confirmed:").green().bold(), clearance);
                }
                ConfirmationOutcome::Rejected(rejection) => {
                    println!("\n{} {}.", style("Rejected:").red().bold(), rejection);
                    return Ok(ExitCode::from(EXIT_REJECTED));
                }
            },
        },
    }

    Ok(ExitCode::SUCCESS)
}
