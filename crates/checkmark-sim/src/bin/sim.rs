#![forbid(unsafe_code)]

use std::env;

use anyhow::Result;
use checkmark_sim::{SessionConfig, run_session};
use clap::Parser;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

#[derive(Parser, Debug)]
#[command(
    name = "checkmark-sim",
    about = "Drive a scripted to-do session against the in-memory backend",
    after_help = "EXAMPLES:\n    # Twenty items with one write in ten failing\n    checkmark-sim --items 20 --write-failure-percent 10"
)]
struct Args {
    /// Seed for document ids and fault decisions.
    #[arg(long, default_value_t = 0x5EED)]
    seed: u64,

    /// Number of items added in the first burst.
    #[arg(long, default_value_t = 12)]
    items: usize,

    /// Percentage of writes the store rejects.
    #[arg(long, default_value_t = 0)]
    write_failure_percent: u8,

    /// Delay before each write is acknowledged.
    #[arg(long, default_value_t = 1)]
    ack_delay_millis: u64,

    /// Print the report as JSON.
    #[arg(long)]
    json: bool,
}

fn init_tracing() {
    let filter = EnvFilter::try_from_env("CHECKMARK_LOG").unwrap_or_else(|_| {
        EnvFilter::new(if env::var("DEBUG").is_ok() {
            "checkmark_core=debug,checkmark_sim=debug,info"
        } else {
            "checkmark_core=info,checkmark_sim=info,warn"
        })
    });

    let format = env::var("CHECKMARK_LOG_FORMAT").unwrap_or_else(|_| "compact".to_string());

    let registry = tracing_subscriber::registry().with(filter);

    match format.as_str() {
        "json" => {
            registry.with(fmt::layer().json().with_ansi(false)).init();
        }
        _ => {
            registry.with(fmt::layer().compact()).init();
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();
    let args = Args::parse();

    let config = SessionConfig {
        seed: args.seed,
        items: args.items,
        write_failure_percent: args.write_failure_percent,
        ack_delay_millis: args.ack_delay_millis,
        ..SessionConfig::default()
    };
    let report = run_session(&config).await?;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        println!(
            "session complete: user={} intents={} failed={} visible={} stored={} checked={} converged={} listeners_after_teardown={}",
            report.user,
            report.intents_dispatched,
            report.failed_intents,
            report.visible_items,
            report.stored_items,
            report.checked_items,
            report.converged,
            report.listeners_after_teardown
        );
    }

    Ok(())
}
