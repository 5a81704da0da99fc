//! CLI argument parsing and command handling

use anyhow::{Context, Result};
use clap::Parser;
use rate_runner_core::{BoxError, CallbackParams, LimiterBuilder, LimiterConfig};
use std::path::PathBuf;
use std::time::Duration;

/// rate-runner - drive a unit of work at a bounded rate and concurrency
#[derive(Parser, Debug)]
#[command(name = "rate-runner")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Path to a JSON configuration file; flags override its values
    #[arg(long, env = "RATE_RUNNER_CONFIG")]
    pub config: Option<PathBuf>,

    /// Number of concurrent workers
    #[arg(short, long)]
    pub concurrency: Option<u32>,

    /// Total number of invocations (0 = unbounded)
    #[arg(short, long)]
    pub limit: Option<u32>,

    /// Invocations per second across all workers (0 = unlimited)
    #[arg(short, long)]
    pub qps: Option<u32>,

    /// Maximum run duration in seconds (0 = unbounded)
    #[arg(short, long)]
    pub duration: Option<f64>,

    /// Simulated work per invocation, in milliseconds
    #[arg(long, default_value = "0")]
    pub work_ms: u64,

    /// Fail the callback once the total reaches this many invocations
    #[arg(long)]
    pub fail_after: Option<u64>,

    /// Do not cancel the run on SIGINT/SIGTERM (overrides the config file)
    #[arg(long)]
    pub no_signal: bool,

    /// Print the final report as JSON
    #[arg(long)]
    pub json: bool,

    /// Enable verbose output
    #[arg(short, long)]
    pub verbose: bool,
}

impl Cli {
    /// Resolve the effective configuration from the file and the flags
    pub fn limiter_config(&self) -> Result<LimiterConfig> {
        let mut config = match &self.config {
            Some(path) => {
                let raw = std::fs::read_to_string(path)
                    .with_context(|| format!("Failed to read config file {}", path.display()))?;
                serde_json::from_str(&raw)
                    .with_context(|| format!("Failed to parse config file {}", path.display()))?
            }
            None => LimiterConfig::new(1),
        };

        if let Some(concurrency) = self.concurrency {
            config.concurrency = concurrency;
        }
        if let Some(limit) = self.limit {
            config.limit = limit;
        }
        if let Some(qps) = self.qps {
            config.qps = qps;
        }
        if let Some(secs) = self.duration {
            config.duration = Duration::try_from_secs_f64(secs)
                .with_context(|| format!("Invalid duration: {}", secs))?;
        }
        config.signal_handler = !self.no_signal;

        Ok(config)
    }

    /// Run the limiter and print its report
    pub async fn run(self) -> Result<()> {
        let config = self.limiter_config()?;
        let work = Duration::from_millis(self.work_ms);
        let fail_after = self.fail_after;

        let limiter = LimiterBuilder::new()
            .config(config)
            .callback(move |params: CallbackParams| simulate_work(params, work, fail_after))
            .build()
            .context("Invalid limiter configuration")?;

        let result = limiter.run().await;
        let report = limiter.snapshot();

        if self.json {
            println!("{}", serde_json::to_string_pretty(&report)?);
        } else {
            println!("{}", report);
        }

        result.context("Run failed")
    }
}

/// Stand-in unit of work: sleep, then optionally fail past a threshold
async fn simulate_work(
    params: CallbackParams,
    work: Duration,
    fail_after: Option<u64>,
) -> Result<(), BoxError> {
    if !work.is_zero() {
        tokio::time::sleep(work).await;
    }

    if let Some(threshold) = fail_after {
        let total = params.limiter.num_of_queries();
        if total >= threshold {
            return Err(format!(
                "worker {} reached failure threshold ({} >= {})",
                params.worker_id, total, threshold
            )
            .into());
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_flags_build_config() {
        let cli = Cli::parse_from([
            "rate-runner",
            "-c",
            "4",
            "-l",
            "100",
            "-q",
            "20",
            "-d",
            "2.5",
        ]);
        let config = cli.limiter_config().unwrap();

        assert_eq!(config.concurrency, 4);
        assert_eq!(config.limit, 100);
        assert_eq!(config.qps, 20);
        assert_eq!(config.duration, Duration::from_millis(2500));
        assert!(config.signal_handler);
    }

    #[test]
    fn test_cli_no_signal() {
        let cli = Cli::parse_from(["rate-runner", "-l", "10", "--no-signal"]);
        assert!(!cli.limiter_config().unwrap().signal_handler);
    }

    #[test]
    fn test_cli_config_file_keeps_signal_default() {
        let path = std::env::temp_dir().join(format!(
            "rate-runner-config-{}.json",
            std::process::id()
        ));
        std::fs::write(&path, r#"{"concurrency": 3, "limit": 30, "signal_handler": false}"#)
            .unwrap();

        let cli = Cli::parse_from(["rate-runner", "--config", path.to_str().unwrap(), "-q", "5"]);
        let config = cli.limiter_config().unwrap();

        let cli = Cli::parse_from([
            "rate-runner",
            "--config",
            path.to_str().unwrap(),
            "--no-signal",
        ]);
        let quiet = cli.limiter_config().unwrap();
        std::fs::remove_file(&path).unwrap();

        assert_eq!(config.concurrency, 3);
        assert_eq!(config.limit, 30);
        assert_eq!(config.qps, 5);
        assert!(config.signal_handler);
        assert!(!quiet.signal_handler);
    }

    #[test]
    fn test_cli_rejects_negative_duration() {
        let cli = Cli::parse_from(["rate-runner", "--duration=-1"]);
        assert!(cli.limiter_config().is_err());
    }

    #[test]
    fn test_cli_missing_config_file() {
        let cli = Cli::parse_from(["rate-runner", "--config", "/nonexistent/rate-runner.json"]);
        let err = cli.limiter_config().unwrap_err();
        assert!(err.to_string().contains("Failed to read config file"));
    }

    #[tokio::test]
    async fn test_cli_run_reports_failure() {
        let cli = Cli::parse_from(["rate-runner", "-l", "10", "--fail-after", "3", "--no-signal"]);
        assert!(cli.run().await.is_err());
    }

    #[tokio::test]
    async fn test_cli_run_success() {
        let cli = Cli::parse_from(["rate-runner", "-c", "2", "-l", "10", "--no-signal", "--json"]);
        assert!(cli.run().await.is_ok());
    }
}
