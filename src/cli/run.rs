//! Run subcommand implementation.
//!
//! Handles `outpost run`: load settings, wire the inventory, scan engine and
//! enrichment sources together, run the pipeline, and print the report.

use crate::cli::OutputFormat;
use crate::config::{AppSettings, RunContext};
use crate::enrich::{DnsReverseResolver, Enricher, InterfaceAttachments};
use crate::error::{ConfigResult, RunError, RunResult};
use crate::inventory::JsonFileInventory;
use crate::output;
use crate::pipeline::{self, RunOutcome};
use crate::scanner::TcpConnectEngine;
use clap::Parser;
use std::future::Future;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::info;

/// Scan every public address in an inventory export.
#[derive(Parser, Debug)]
pub struct RunCommand {
    /// Saved result of the inventory query (see `outpost query`)
    #[arg(short, long, value_name = "FILE")]
    pub inventory: PathBuf,

    /// Saved network-interface descriptions used to resolve instance ids
    #[arg(long, value_name = "FILE")]
    pub interfaces: Option<PathBuf>,

    /// List the discovered addresses without scanning them
    #[arg(long)]
    pub noscan: bool,

    /// Ports to scan (e.g., "top100", "22,443", "1-1024")
    #[arg(short, long)]
    pub ports: Option<String>,

    /// Per-probe and per-lookup timeout in milliseconds
    #[arg(short = 't', long, value_name = "MS")]
    pub timeout: Option<u64>,

    /// Deadline for the whole scan in seconds (0 = none)
    #[arg(long, value_name = "SECS")]
    pub scan_timeout: Option<u64>,

    /// Maximum number of concurrent probes
    #[arg(short = 'c', long)]
    pub concurrency: Option<usize>,

    /// Rate limit in probes per second (0 = unlimited)
    #[arg(short = 'r', long = "rate")]
    pub rate_limit: Option<u32>,

    /// Skip reverse DNS lookups
    #[arg(long)]
    pub no_rdns: bool,

    /// Output format for the report
    #[arg(short, long, value_enum, default_value = "plain")]
    pub format: OutputFormat,

    /// Write the report to a file instead of stdout
    #[arg(short, long, value_name = "FILE")]
    pub output: Option<PathBuf>,

    /// Show a progress bar while scanning
    #[arg(long)]
    pub progress: bool,
}

impl RunCommand {
    /// Settings from `config` (or the default settings file) with flags applied on top.
    pub fn settings(&self, config: Option<&Path>) -> ConfigResult<AppSettings> {
        let mut settings = match config {
            Some(path) => AppSettings::load_from(path)?,
            None => AppSettings::load()?,
        };

        if let Some(ports) = &self.ports {
            settings.ports = ports.clone();
        }
        if let Some(timeout) = self.timeout {
            settings.timeout_ms = timeout;
        }
        if let Some(secs) = self.scan_timeout {
            settings.scan_timeout_secs = secs;
        }
        if let Some(concurrency) = self.concurrency {
            settings.concurrency = concurrency;
        }
        if let Some(rate) = self.rate_limit {
            settings.rate_limit = rate;
        }
        if self.no_rdns {
            settings.reverse_dns = false;
        }

        Ok(settings)
    }

    fn context(&self, config: Option<&Path>) -> ConfigResult<RunContext> {
        let mut ctx = RunContext::new(self.settings(config)?)?;
        if self.noscan {
            ctx = ctx.discover_only();
        }
        if self.progress {
            ctx = ctx.with_progress();
        }
        Ok(ctx)
    }

    fn enricher(&self, settings: &AppSettings) -> RunResult<Enricher> {
        let timeout = settings.timeout();
        let mut enricher = Enricher::new(timeout);

        if settings.reverse_dns {
            enricher = enricher.with_reverse_dns(Arc::new(DnsReverseResolver::new(timeout)));
        }
        if let Some(path) = &self.interfaces {
            let attachments = InterfaceAttachments::load(path)?;
            info!(path = %path.display(), "Loaded network interface descriptions");
            enricher = enricher.with_instance_lookup(Arc::new(attachments));
        }

        Ok(enricher)
    }

    /// Execute the run command. `shutdown` cancels an in-progress scan.
    pub async fn execute(
        &self,
        config: Option<&Path>,
        shutdown: impl Future<Output = ()>,
    ) -> RunResult<RunOutcome> {
        let ctx = self.context(config)?;
        let inventory = JsonFileInventory::new(&self.inventory);

        let mut engine = TcpConnectEngine::new(ctx.ports.clone(), ctx.settings.timeout())
            .with_concurrency(ctx.settings.concurrency)
            .with_rate_limit(ctx.settings.rate_limit);
        if ctx.progress {
            engine = engine.with_progress();
        }
        let enricher = self.enricher(&ctx.settings)?;

        let outcome = pipeline::run(&ctx, &inventory, &engine, enricher, shutdown).await?;
        self.report(&outcome)?;
        Ok(outcome)
    }

    fn report(&self, outcome: &RunOutcome) -> RunResult<()> {
        let report = match outcome {
            RunOutcome::NothingToScan => {
                output::print_info("No public IP addresses found, nothing to scan");
                return Ok(());
            }
            RunOutcome::DiscoveryOnly { records, anomalies } => {
                for anomaly in anomalies {
                    output::print_warning(&anomaly.to_string());
                }
                print!("{}", output::discovery_table(records));
                output::print_info(&format!(
                    "{} public address(es) found, scan skipped",
                    records.len()
                ));
                return Ok(());
            }
            RunOutcome::Completed(report) => report,
            RunOutcome::Cancelled(report) => {
                output::print_warning("Scan did not complete, results are partial");
                report
            }
        };

        for anomaly in &report.exposure.anomalies {
            output::print_warning(&anomaly.to_string());
        }
        if report.exposure.is_empty() {
            output::print_info("No open ports found");
        }

        output::write_report(report, self.format, self.output.as_deref())
            .map_err(RunError::Output)?;

        if let Some(path) = &self.output {
            output::print_success(&format!("Report written to {}", path.display()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cli::{Cli, Commands};
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn command(args: &[&str]) -> RunCommand {
        let mut argv = vec!["outpost", "run"];
        argv.extend_from_slice(args);
        match Cli::try_parse_from(argv).unwrap().command {
            Commands::Run(run) => run,
            Commands::Query => panic!("expected run"),
        }
    }

    fn temp_file(content: &str) -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        write!(file, "{}", content).unwrap();
        file
    }

    #[test]
    fn test_flags_override_settings_file() {
        let config = temp_file(r#"{"ports": "22", "concurrency": 50, "rate_limit": 10}"#);
        let run = command(&[
            "--inventory",
            "inventory.json",
            "--ports",
            "22,443",
            "--timeout",
            "250",
            "--no-rdns",
        ]);

        let settings = run.settings(Some(config.path())).unwrap();
        assert_eq!(settings.ports, "22,443");
        assert_eq!(settings.timeout_ms, 250);
        assert_eq!(settings.concurrency, 50);
        assert_eq!(settings.rate_limit, 10);
        assert!(!settings.reverse_dns);
    }

    #[test]
    fn test_invalid_flags_rejected() {
        let config = temp_file("{}");
        let run = command(&["--inventory", "inventory.json", "--concurrency", "0"]);
        assert!(run.context(Some(config.path())).is_err());
    }

    #[tokio::test]
    async fn test_noscan_lists_addresses() {
        let config = temp_file("{}");
        let inventory = temp_file(
            r#"[
                {"resourceId": "eni-1", "accountId": "111",
                 "configuration": {"association": {"publicIp": "203.0.113.5"}}},
                {"resourceId": "eni-2", "accountId": "111",
                 "configuration": {"association": {"publicIp": "203.0.113.5"}}}
            ]"#,
        );
        let run = command(&[
            "--inventory",
            inventory.path().to_str().unwrap(),
            "--noscan",
            "--no-rdns",
        ]);

        let outcome = run
            .execute(Some(config.path()), std::future::pending())
            .await
            .unwrap();
        let RunOutcome::DiscoveryOnly { records, anomalies } = outcome else {
            panic!("expected discovery only");
        };
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].id, "eni-1");
        assert_eq!(anomalies.len(), 1);
        assert!(anomalies[0].to_string().contains("kept eni-1"));
    }

    #[tokio::test]
    async fn test_missing_inventory_is_fatal() {
        let config = temp_file("{}");
        let run = command(&["--inventory", "/nonexistent/inventory.json", "--no-rdns"]);
        let result = run.execute(Some(config.path()), std::future::pending()).await;
        assert!(matches!(result, Err(RunError::Inventory(_))));
    }

    #[tokio::test]
    async fn test_missing_interfaces_file_is_fatal() {
        let config = temp_file("{}");
        let run = command(&[
            "--inventory",
            "inventory.json",
            "--interfaces",
            "/nonexistent/interfaces.json",
            "--no-rdns",
        ]);
        let result = run.execute(Some(config.path()), std::future::pending()).await;
        assert!(matches!(result, Err(RunError::Lookup(_))));
    }
}
