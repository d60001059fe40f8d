//! LifeSim - terminal client for the life-simulation game backend
//!
//! Usage:
//!   lifesim --base-url http://127.0.0.1:5000 --first-name Ada --last-name Lovelace
//!
//! Environment Variables:
//!   LIFESIM_BASE_URL - backend root (default: http://127.0.0.1:5000)
//!   LIFESIM_TIMEOUT_SECS - per-request timeout (default: 10)
//!   LIFESIM_STARTING_BALANCE - opening balance used for reconciliation (default: 5000)
//!   RUST_LOG - log filter (default: lifesim_client=info)

use anyhow::{Context, Result};
use clap::Parser;
use rust_decimal::Decimal;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, BufReader, Lines, Stdin};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use lifesim_client::{
    controller::ActionReport, render, render::TerminalSink, ApiError, ClientConfig,
    GameApiClient, GameController, SessionContext,
};

#[derive(Parser, Debug)]
#[command(name = "lifesim")]
#[command(about = "Play the life simulation game from the terminal")]
struct Args {
    /// Backend base URL
    #[arg(long, env = "LIFESIM_BASE_URL")]
    base_url: Option<String>,

    /// Per-request timeout in seconds (LIFESIM_TIMEOUT_SECS)
    #[arg(long)]
    timeout_secs: Option<u64>,

    /// Opening balance assumed when reconciling the ledger (LIFESIM_STARTING_BALANCE)
    #[arg(long)]
    starting_balance: Option<Decimal>,

    /// Player first name (prompted if omitted)
    #[arg(long)]
    first_name: Option<String>,

    /// Player last name (prompted if omitted)
    #[arg(long)]
    last_name: Option<String>,
}

const HELP: &str = "Commands: <number> choose | n next year | f <age> fast-forward | \
h history | p <loan> <amount> pay loan | s status | q quit";

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();
    // Loads .env before clap reads its env fallbacks
    let mut config = ClientConfig::from_env();
    let args = Args::parse();

    if let Some(url) = &args.base_url {
        config = config.with_base_url(url);
    }
    if let Some(secs) = args.timeout_secs.filter(|&s| s > 0) {
        config = config.with_timeout(Duration::from_secs(secs));
    }
    if let Some(balance) = args.starting_balance {
        config = config.with_starting_balance(balance);
    }
    info!(base_url = %config.base_url, "starting lifesim client");

    let api = GameApiClient::new(&config).context("failed to build game API client")?;
    let sink = TerminalSink;
    let controller = GameController::new(&api, &sink, config.starting_balance);

    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    let first_name = match args.first_name {
        Some(n) => n,
        None => prompt(&mut lines, "First name: ").await?,
    };
    let last_name = match args.last_name {
        Some(n) => n,
        None => prompt(&mut lines, "Last name: ").await?,
    };

    let (mut session, report) = controller
        .start(&first_name, &last_name)
        .await
        .map_err(|e| anyhow::anyhow!(e.user_message()))
        .context("could not start a game")?;
    show_report(&report);
    print!("{}", render::player_summary(session.player(), session.balance()));
    println!("{HELP}");

    // The first year begins on the first advance
    let first = controller.advance_year(&mut session).await;
    show_result(&session, first);

    while let Some(line) = lines.next_line().await.context("failed to read stdin")? {
        let mut parts = line.split_whitespace();
        let Some(cmd) = parts.next() else {
            continue;
        };

        let result = match cmd {
            "q" | "quit" => break,
            "n" | "next" => controller.advance_year(&mut session).await,
            "h" | "history" => {
                if let Err(e) = controller.refresh(&mut session).await {
                    println!("! {}", e.0.user_message());
                }
                print!("{}", render::ledger_table(session.ledger()));
                continue;
            }
            "s" | "status" => {
                if let Err(e) = controller.sync_state(&mut session).await {
                    println!("! {}", e.user_message());
                }
                print!("{}", render::player_summary(session.player(), session.balance()));
                continue;
            }
            "f" | "ff" => match parts.next().and_then(|a| a.parse::<u32>().ok()) {
                Some(age) => controller.fast_forward(&mut session, age).await,
                None => Err(ApiError::InvalidRequest("Usage: f <age>".to_string())),
            },
            "p" | "pay" => {
                let loan = parts.next().and_then(|a| a.parse::<usize>().ok());
                let amount = parts.next().and_then(|a| a.parse::<Decimal>().ok());
                match (loan, amount) {
                    (Some(l), Some(a)) => controller.pay_loan(&mut session, l, a).await,
                    _ => Err(ApiError::InvalidRequest(
                        "Usage: p <loan number> <amount>".to_string(),
                    )),
                }
            }
            other => match other.parse::<usize>() {
                Ok(n) => controller.choose(&mut session, n).await,
                Err(_) => {
                    println!("{HELP}");
                    continue;
                }
            },
        };

        show_result(&session, result);
        if session.is_over() {
            break;
        }
    }

    Ok(())
}

fn show_result(session: &SessionContext, result: Result<ActionReport, ApiError>) {
    match result {
        Ok(report) => {
            show_report(&report);
            show_session(session);
        }
        Err(e) => println!("! {}", e.user_message()),
    }
}

fn show_report(report: &ActionReport) {
    if let Some(msg) = &report.message {
        println!("{msg}");
    }
    match &report.ledger_error {
        Some(e) => println!("! Balance not updated: {}", e.0.user_message()),
        None if !report.reconciled => {
            println!("Final balance is as of the last reconciled year; the finished game's history is closed.")
        }
        None => {}
    }
}

fn show_session(session: &SessionContext) {
    if let Some(summary) = session.summary() {
        print!("{}", render::player_summary(session.player(), session.balance()));
        print!("{}", render::final_summary(summary));
        return;
    }
    print!("{}", render::player_summary(session.player(), session.balance()));
    match session.scenario() {
        Some(s) => print!("{}", render::scenario(s)),
        None => println!("No decision pending. Type n to move to the next year."),
    }
}

async fn prompt(lines: &mut Lines<BufReader<Stdin>>, label: &str) -> Result<String> {
    use std::io::Write;
    print!("{label}");
    std::io::stdout().flush().ok();
    let line = lines
        .next_line()
        .await
        .context("failed to read stdin")?
        .context("stdin closed")?;
    Ok(line.trim().to_string())
}

fn init_tracing() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "lifesim_client=info,lifesim=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bad_numeric_env_does_not_stop_argument_parsing() {
        std::env::set_var("LIFESIM_TIMEOUT_SECS", "ten");
        std::env::set_var("LIFESIM_STARTING_BALANCE", "lots");

        let args = Args::try_parse_from(["lifesim"]).unwrap();
        assert_eq!(args.timeout_secs, None);
        assert_eq!(args.starting_balance, None);

        // The lenient env layer falls back to defaults instead
        let cfg = ClientConfig::from_env();
        assert_eq!(cfg.request_timeout, Duration::from_secs(10));
        assert_eq!(cfg.starting_balance, Decimal::from(5000));

        let args = Args::try_parse_from(["lifesim", "--timeout-secs", "3"]).unwrap();
        assert_eq!(args.timeout_secs, Some(3));
    }
}
