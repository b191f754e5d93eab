use anyhow::{Result, ensure};
use clap::{Parser, Subcommand};
use std::time::Duration;
use tracing::{info, warn};
use tracing_subscriber::prelude::*;
use tracing_subscriber::{EnvFilter, fmt};

use cn_stockinfo::config::AppConfig;
use cn_stockinfo::output::{self, OutputFormat};
use cn_stockinfo::{Dataset, StockInfo};

#[derive(Parser)]
#[command(name = "cn-stockinfo", about = "A-share fundamentals scraper", version)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// table (CSV) or records (JSON)
    #[arg(short, long, global = true)]
    format: Option<OutputFormat>,

    /// Attempts per page before giving up
    #[arg(long, global = true)]
    retries: Option<u32>,

    /// Seconds to pause before each request
    #[arg(long, global = true)]
    pause: Option<f64>,
}

#[derive(Subcommand)]
enum Command {
    /// Quarterly finance table: report, profit, operation, growth, debt_paying, cash_flow
    Finance {
        dataset: Dataset,

        #[arg(short, long)]
        year: i32,

        #[arg(short, long)]
        quarter: i32,
    },

    /// Screener snapshot of all listed companies
    Profiles,
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let filter = match cli.verbose {
        0 => "cn_stockinfo=info,warn",
        1 => "cn_stockinfo=debug,info",
        _ => "trace",
    };

    // stdout carries the data
    tracing_subscriber::registry()
        .with(fmt::layer().compact().with_target(false).with_writer(std::io::stderr))
        .with(EnvFilter::new(filter))
        .init();

    let config = AppConfig::load()?;
    let info = StockInfo::new(&config)?;

    let mut policy = info.default_policy();
    if let Some(retries) = cli.retries {
        policy.max_retries = retries;
    }
    if let Some(pause) = cli.pause {
        ensure!(pause.is_finite() && pause >= 0.0, "--pause must be non-negative, got {}", pause);
        policy.pause = Duration::from_secs_f64(pause);
    }
    let format = cli.format.unwrap_or(config.output.format);

    let table = match cli.command {
        Command::Finance {
            dataset,
            year,
            quarter,
        } => match info.financial(dataset, year, quarter, &policy).await? {
            Some(table) => table,
            None => {
                warn!("Nothing fetched: invalid year/quarter {}/{}", year, quarter);
                return Ok(());
            }
        },
        Command::Profiles => info.stock_profiles(&policy).await?,
    };

    info!("{} rows x {} columns", table.len(), table.columns().len());
    output::render(&table, format, std::io::stdout().lock())?;

    Ok(())
}
