//! CLI command definitions for task-balancer.
//!
//! `run` drives a synthetic workload through a balancer and reports how the
//! pool behaved; `config` prints the effective configuration.

use std::path::PathBuf;
use std::thread;
use std::time::Duration;

use anyhow::Context;
use clap::Parser;
use rand::RngExt;
use tracing::info;

use crate::balancer::Balancer;
use crate::config::BalancerConfig;
use crate::metrics::{export_metrics, init_metrics};

/// Elastic worker pool driver.
#[derive(Parser)]
#[command(name = "task-balancer")]
#[command(about = "Run workloads on an elastic, self-healing worker pool")]
#[command(version)]
#[command(
    long_about = "task-balancer runs tasks on a pool of worker threads that grows under backlog,\nshrinks when idle, retries failing tasks, and replaces crashed workers.\n\nExample usage:\n  task-balancer run --min-workers 2 --max-workers 5 --tasks 20 --task-duration-ms 2000"
)]
pub struct Cli {
    /// The subcommand to execute.
    #[command(subcommand)]
    pub command: Commands,

    /// Log level (trace, debug, info, warn, error).
    #[arg(short, long, default_value = "info", global = true)]
    pub log_level: String,
}

/// Available CLI subcommands.
#[derive(clap::Subcommand)]
pub enum Commands {
    /// Submit a synthetic workload and report pool behavior.
    Run(RunArgs),

    /// Print the effective pool configuration as YAML.
    Config(ConfigArgs),
}

/// Pool settings shared by all subcommands. Flags override the config file.
#[derive(Parser, Debug, Clone)]
pub struct PoolArgs {
    /// YAML file with balancer settings.
    #[arg(short = 'c', long)]
    pub config: Option<PathBuf>,

    /// Workers kept alive at all times.
    #[arg(long)]
    pub min_workers: Option<usize>,

    /// Upper bound for scale-up.
    #[arg(long)]
    pub max_workers: Option<usize>,

    /// Seconds a worker may sit idle before it is allowed to exit.
    #[arg(long)]
    pub idle_threshold: Option<u64>,

    /// Attempts per task before it is dropped.
    #[arg(long)]
    pub max_attempts: Option<u32>,

    /// Pause between attempts of a failing task, in milliseconds.
    #[arg(long)]
    pub retry_backoff_ms: Option<u64>,

    /// Pause between monitor passes, in milliseconds.
    #[arg(long)]
    pub monitor_interval_ms: Option<u64>,
}

impl PoolArgs {
    /// Builds the configuration: file (or defaults), then flag overrides.
    pub fn resolve(&self) -> anyhow::Result<BalancerConfig> {
        let mut config = match &self.config {
            Some(path) => BalancerConfig::from_yaml_file(path)?,
            None => BalancerConfig::default(),
        };

        if let Some(v) = self.min_workers {
            config.min_workers = v;
        }
        if let Some(v) = self.max_workers {
            config.max_workers = v;
        }
        if let Some(v) = self.idle_threshold {
            config.idle_threshold_secs = v;
        }
        if let Some(v) = self.max_attempts {
            config.max_attempts = v;
        }
        if let Some(v) = self.retry_backoff_ms {
            config.retry_backoff_ms = v;
        }
        if let Some(v) = self.monitor_interval_ms {
            config.monitor_interval_ms = v;
        }

        config.validate().context("Invalid balancer configuration")?;
        Ok(config)
    }
}

/// Arguments for `task-balancer run`.
#[derive(Parser, Debug)]
pub struct RunArgs {
    #[command(flatten)]
    pub pool: PoolArgs,

    /// Number of tasks to submit.
    #[arg(short = 'n', long, default_value = "20")]
    pub tasks: usize,

    /// How long each task sleeps, in milliseconds.
    #[arg(long, default_value = "500")]
    pub task_duration_ms: u64,

    /// Probability (0.0-1.0) that an attempt fails.
    #[arg(long, default_value = "0.0")]
    pub failure_rate: f64,

    /// How often to log progress, in milliseconds.
    #[arg(long, default_value = "1000")]
    pub report_interval_ms: u64,

    /// Print Prometheus metrics after the run.
    #[arg(long)]
    pub metrics: bool,
}

/// Arguments for `task-balancer config`.
#[derive(Parser, Debug)]
pub struct ConfigArgs {
    #[command(flatten)]
    pub pool: PoolArgs,
}

/// Parse CLI arguments without running any command.
pub fn parse_cli() -> Cli {
    Cli::parse()
}

/// Parse arguments from the environment and run.
pub fn run() -> anyhow::Result<()> {
    run_with_cli(parse_cli())
}

/// Run the command described by `cli`.
pub fn run_with_cli(cli: Cli) -> anyhow::Result<()> {
    match cli.command {
        Commands::Run(args) => run_workload(&args),
        Commands::Config(args) => print_config(&args),
    }
}

fn print_config(args: &ConfigArgs) -> anyhow::Result<()> {
    let config = args.pool.resolve()?;
    let yaml = serde_yaml::to_string(&config).context("Failed to serialize configuration")?;
    print!("{}", yaml);
    Ok(())
}

fn run_workload(args: &RunArgs) -> anyhow::Result<()> {
    anyhow::ensure!(
        (0.0..=1.0).contains(&args.failure_rate),
        "--failure-rate must be between 0.0 and 1.0, got {}",
        args.failure_rate
    );

    let config = args.pool.resolve()?;
    if args.metrics {
        init_metrics().context("Failed to initialize metrics")?;
    }

    let balancer = Balancer::new(config).context("Failed to start balancer")?;
    let task_duration = Duration::from_millis(args.task_duration_ms);
    let failure_rate = args.failure_rate;

    for index in 0..args.tasks {
        balancer.submit(move || {
            thread::sleep(task_duration);
            let roll: f64 = rand::rng().random_range(0.0..1.0);
            if roll < failure_rate {
                anyhow::bail!("synthetic failure in task {}", index);
            }
            Ok(())
        });
    }
    info!(tasks = args.tasks, "Workload submitted");

    let report_interval = Duration::from_millis(args.report_interval_ms.max(1));
    loop {
        thread::sleep(report_interval);
        let stats = balancer.stats();
        info!(
            workers = stats.workers,
            pending = stats.pending_tasks,
            completed = stats.tasks_completed,
            dropped = stats.tasks_dropped,
            "Progress"
        );
        if stats.total_processed() >= args.tasks as u64 {
            break;
        }
    }

    let report =
        serde_json::to_string_pretty(&balancer.stats()).context("Failed to serialize stats")?;
    println!("{}", report);

    if args.metrics {
        print!("{}", export_metrics());
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;
    use std::io::Write;

    #[test]
    fn test_cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_run_args() {
        let cli = Cli::try_parse_from([
            "task-balancer",
            "run",
            "--min-workers",
            "2",
            "--max-workers",
            "5",
            "-n",
            "40",
            "--failure-rate",
            "0.25",
        ])
        .unwrap();

        match cli.command {
            Commands::Run(args) => {
                assert_eq!(args.pool.min_workers, Some(2));
                assert_eq!(args.pool.max_workers, Some(5));
                assert_eq!(args.tasks, 40);
                assert!((args.failure_rate - 0.25).abs() < f64::EPSILON);
                assert_eq!(args.task_duration_ms, 500);
                assert!(!args.metrics);
            }
            Commands::Config(_) => panic!("expected run command"),
        }
        assert_eq!(cli.log_level, "info");
    }

    #[test]
    fn test_resolve_flags_override_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "min_workers: 2\nmax_workers: 8\nidle_threshold_secs: 45").unwrap();

        let args = PoolArgs {
            config: Some(file.path().to_path_buf()),
            min_workers: None,
            max_workers: Some(4),
            idle_threshold: None,
            max_attempts: Some(2),
            retry_backoff_ms: None,
            monitor_interval_ms: None,
        };

        let config = args.resolve().unwrap();
        assert_eq!(config.min_workers, 2);
        assert_eq!(config.max_workers, 4);
        assert_eq!(config.idle_threshold_secs, 45);
        assert_eq!(config.max_attempts, 2);
    }

    #[test]
    fn test_resolve_rejects_invalid_overrides() {
        let args = PoolArgs {
            config: None,
            min_workers: Some(6),
            max_workers: Some(3),
            idle_threshold: None,
            max_attempts: None,
            retry_backoff_ms: None,
            monitor_interval_ms: None,
        };

        let err = args.resolve().unwrap_err();
        assert!(format!("{err:#}").contains("must not exceed"));
    }
}
