use anyhow::{Context, Result};
use clap::Parser;
use outpost::cli::{Cli, Commands};
use outpost::inventory::PUBLIC_IP_QUERY;
use outpost::output;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    init_logging(&cli.loglevel);

    if let Err(e) = run(cli).await {
        output::print_error(&format!("{:#}", e));
        std::process::exit(1);
    }
}

/// Log to stderr so reports on stdout stay machine-readable.
fn init_logging(level: &str) {
    let filter = EnvFilter::try_from_default_env()
        .ok()
        .or_else(|| EnvFilter::try_new(level).ok())
        .unwrap_or_else(|| EnvFilter::new("info"));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

async fn run(cli: Cli) -> Result<()> {
    match &cli.command {
        Commands::Run(cmd) => {
            cmd.execute(cli.config.as_deref(), shutdown_signal())
                .await
                .context("run failed")?;
        }
        Commands::Query => println!("{}", PUBLIC_IP_QUERY),
    }
    Ok(())
}

async fn shutdown_signal() {
    if tokio::signal::ctrl_c().await.is_err() {
        // No signal handler available; never cancel.
        std::future::pending::<()>().await;
    }
}
