//! ecsroll - rolling maintenance for ECS cluster instances
//!
//! Usage:
//!   ecsroll                        # Replace every instance of test-ecs-cluster
//!   ecsroll reboot -c prod         # Reboot every instance of cluster `prod`
//!   ecsroll replace -p ops -w 10   # Named profile, shorter waits
//!   ecsroll replace -r env         # Credentials from the environment
//!   ecsroll reboot -y -f json      # Unattended, JSON report on stdout

mod terminal;

use std::io;
use std::process::ExitCode;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use console::style;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use ecsroll_core::config::{DEFAULT_CLUSTER, DEFAULT_PROFILE, DEFAULT_WAIT_SECS};
use ecsroll_core::gate::HumanGate;
use ecsroll_core::prelude::*;

use crate::terminal::{ConfirmPrompter, CountdownPacer, TableReporter};

#[derive(Parser)]
#[command(name = "ecsroll")]
#[command(
    about = "Rolling REPLACE or REBOOT of the EC2 instances behind an ECS cluster",
    long_about = None
)]
struct Cli {
    /// Maintenance action to perform on every cluster instance
    #[arg(value_enum, default_value_t = ActionArg::Replace)]
    action: ActionArg,

    /// ECS cluster name
    #[arg(short, long, default_value = DEFAULT_CLUSTER)]
    cluster: String,

    /// AWS CLI profile (ignored with `--provider env`)
    #[arg(short, long, default_value = DEFAULT_PROFILE)]
    profile: String,

    /// Base wait between observations, in seconds (at most one day)
    #[arg(
        short,
        long,
        default_value_t = DEFAULT_WAIT_SECS,
        value_parser = clap::value_parser!(u64).range(0..=MAX_WAIT_SECS)
    )]
    wait: u64,

    /// Where AWS credentials come from
    #[arg(short = 'r', long, value_enum, default_value_t = ProviderArg::Profile)]
    provider: ProviderArg,

    /// Answer yes to every confirmation
    #[arg(short, long)]
    yes: bool,

    /// Format of the final report
    #[arg(short, long, value_enum, default_value_t = OutputFormat::Table)]
    format: OutputFormat,
}

const MAX_WAIT_SECS: u64 = 86_400;

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
enum ActionArg {
    /// Reboot each instance in place, behind one buffer instance
    Reboot,
    /// Replace each instance with a freshly launched one
    Replace,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
enum ProviderArg {
    /// Named profile from the AWS CLI configuration
    Profile,
    /// Environment variables or instance metadata
    #[value(alias = "environment")]
    Env,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum, Default)]
enum OutputFormat {
    /// Human-readable tables and summary
    #[default]
    Table,
    /// Machine-readable JSON report on stdout; tables go to stderr
    Json,
}

impl Cli {
    fn provider(&self) -> Provider {
        match self.provider {
            ProviderArg::Profile => Provider::Profile(self.profile.clone()),
            ProviderArg::Env => Provider::Environment,
        }
    }

    fn roll_config(&self) -> RollConfig {
        let action = match self.action {
            ActionArg::Reboot => Action::Reboot,
            ActionArg::Replace => Action::Replace,
        };
        RollConfig::new(&self.cluster, action)
            .with_wait(Duration::from_secs(self.wait))
            .with_assume_yes(self.yes)
    }
}

fn main() -> ExitCode {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "ecsroll=info,ecsroll_core=info,warn".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();

    match run(&cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("{} {:#}", style("Error:").red().bold(), err);
            if needs_cleanup_hint(&err) {
                eprintln!("{}", style(MANUAL_CLEANUP_HINT).yellow());
            }
            ExitCode::from(2)
        }
    }
}

fn run(cli: &Cli) -> Result<()> {
    let provider = cli.provider();
    let config = cli.roll_config();
    let aws = AwsCli::new(&provider);
    let mut prompter = ConfirmPrompter::new();

    eprintln!(
        "Initiating '{}' maintenance for ECS cluster '{}'",
        config.action, config.cluster
    );

    if let Some(profile) = provider.profile() {
        ensure_profile(&aws, profile)?;
        HumanGate::new(&mut prompter, config.assume_yes)
            .confirm(&format!("Continue, working with AWS profile '{}'?", profile))?;
    }

    let mut pacer = CountdownPacer::new();
    let mut reporter: Box<dyn Reporter> = match cli.format {
        OutputFormat::Table => Box::new(TableReporter::new()),
        OutputFormat::Json => Box::new(TableReporter::with_writer(io::stderr())),
    };
    let report = RollingOrchestrator::new(
        &aws,
        &config,
        OperatorIo {
            prompter: &mut prompter,
            pacer: &mut pacer,
            reporter: reporter.as_mut(),
        },
    )
    .run()?;

    match cli.format {
        OutputFormat::Table => print_summary(&report),
        OutputFormat::Json => print_report_json(&report)?,
    }
    Ok(())
}

fn ensure_profile(aws: &AwsCli, profile: &str) -> Result<()> {
    let profiles = aws
        .available_profiles()
        .context("Failed to list AWS CLI profiles")?;
    if !profiles.iter().any(|p| p == profile) {
        anyhow::bail!(
            "AWS profile '{}' is not configured. Available profiles: {}",
            profile,
            if profiles.is_empty() {
                "(none)".to_string()
            } else {
                profiles.join(", ")
            }
        );
    }
    Ok(())
}

/// Failures before anything was changed need no cleanup guidance.
fn needs_cleanup_hint(err: &anyhow::Error) -> bool {
    err.downcast_ref::<RollError>()
        .is_some_and(RollError::needs_manual_cleanup)
}

fn print_summary(report: &RollReport) {
    println!();
    println!(
        "{} {} of {} instances in cluster '{}' complete",
        style("✓").green(),
        report.action,
        report.original.len(),
        report.cluster
    );
    for replacement in &report.replacements {
        println!("  joined:  {}", replacement.key());
    }
    if let Some(overflow) = &report.overflow {
        println!("  removed: {} (buffer)", overflow.key());
    }
    println!("  capacity group '{}': {}", report.group, report.final_bounds);
}

fn print_report_json(report: &RollReport) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(report)?);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_replace_test_cluster_with_default_profile() {
        let cli = Cli::try_parse_from(["ecsroll"]).unwrap();
        assert_eq!(cli.action, ActionArg::Replace);
        assert_eq!(cli.provider(), Provider::Profile("default".to_string()));

        let config = cli.roll_config();
        assert_eq!(config.cluster, "test-ecs-cluster");
        assert_eq!(config.action, Action::Replace);
        assert_eq!(config.wait, Duration::from_secs(30));
        assert!(!config.assume_yes);
    }

    #[test]
    fn reboot_with_every_flag() {
        let cli = Cli::try_parse_from([
            "ecsroll", "reboot", "-c", "prod", "-p", "ops", "-w", "5", "-y",
        ])
        .unwrap();
        let config = cli.roll_config();
        assert_eq!(config.action, Action::Reboot);
        assert_eq!(config.cluster, "prod");
        assert_eq!(config.wait, Duration::from_secs(5));
        assert!(config.assume_yes);
        assert_eq!(cli.provider(), Provider::Profile("ops".to_string()));
    }

    #[test]
    fn environment_provider_ignores_profile() {
        let cli = Cli::try_parse_from(["ecsroll", "--provider", "env", "-p", "ops"]).unwrap();
        assert_eq!(cli.provider(), Provider::Environment);

        let cli = Cli::try_parse_from(["ecsroll", "-r", "environment"]).unwrap();
        assert_eq!(cli.provider(), Provider::Environment);
    }

    #[test]
    fn unknown_action_is_rejected() {
        assert!(Cli::try_parse_from(["ecsroll", "restart"]).is_err());
        assert!(Cli::try_parse_from(["ecsroll", "-w", "soon"]).is_err());
    }

    #[test]
    fn wait_is_bounded_to_one_day() {
        let cli = Cli::try_parse_from(["ecsroll", "-w", "86400"]).unwrap();
        assert_eq!(cli.roll_config().wait, Duration::from_secs(86_400));
        assert!(Cli::try_parse_from(["ecsroll", "-w", "86401"]).is_err());
        let too_long = u64::MAX.to_string();
        assert!(Cli::try_parse_from(["ecsroll", "-w", too_long.as_str()]).is_err());
    }

    #[test]
    fn json_format_is_selectable() {
        let cli = Cli::try_parse_from(["ecsroll"]).unwrap();
        assert_eq!(cli.format, OutputFormat::Table);
        let cli = Cli::try_parse_from(["ecsroll", "reboot", "--format", "json"]).unwrap();
        assert_eq!(cli.format, OutputFormat::Json);
        assert!(Cli::try_parse_from(["ecsroll", "-f", "yaml"]).is_err());
    }

    #[test]
    fn report_serializes_for_json_output() {
        let record = |compute_id: &str| InstanceRecord {
            compute_id: compute_id.to_string(),
            scheduler_id: format!("ci-{compute_id}"),
            status: InstanceStatus::Active,
            running_task_count: 1,
            pending_task_count: 0,
        };
        let bounds = CapacityBounds::new(1, 4, 2);
        let report = RollReport {
            action: Action::Reboot,
            cluster: "prod".to_string(),
            group: "prod-asg".to_string(),
            original: ClusterSnapshot::new(vec![record("i-a"), record("i-b")]),
            replacements: Vec::new(),
            overflow: Some(record("i-c")),
            final_snapshot: ClusterSnapshot::new(vec![record("i-a"), record("i-b")]),
            original_bounds: bounds,
            final_bounds: bounds,
        };

        let json = serde_json::to_value(&report).unwrap();
        assert_eq!(json["action"], "reboot");
        assert_eq!(json["cluster"], "prod");
        assert_eq!(json["original"][1]["compute_id"], "i-b");
        assert_eq!(json["original"][0]["status"], "ACTIVE");
        assert_eq!(json["overflow"]["compute_id"], "i-c");
        assert_eq!(json["replacements"], serde_json::json!([]));
        assert_eq!(json["final_bounds"]["desired"], 2);
    }

    #[test]
    fn cleanup_hint_only_after_changes_may_have_happened() {
        let precondition = anyhow::Error::new(RollError::ClusterNotFound {
            cluster: "prod".to_string(),
        });
        assert!(!needs_cleanup_hint(&precondition));

        let aborted = anyhow::Error::new(RollError::Aborted {
            prompt: "Continue?".to_string(),
        });
        assert!(needs_cleanup_hint(&aborted));

        assert!(!needs_cleanup_hint(&anyhow::anyhow!("profile missing")));
    }
}
