//! mixed-clearing CLI
//!
//! Clear random market sessions or solve a portfolio problem from the
//! command line.
//!
//! # Usage
//!
//! ```bash
//! # Clear a random stock pool
//! mixed-clearing stocks --buyers 20 --sellers 5 --seed 7
//!
//! # Bilateral loans, JSON output
//! mixed-clearing loans --format json
//!
//! # Firms -> banks -> funds relay with a custom configuration
//! mixed-clearing relay --banks 2 --config clearing.json
//!
//! # Solve a portfolio problem
//! mixed-clearing optimize --input portfolio.json --solver lcqp
//! ```
//!
//! Set `RUST_LOG=debug` for per-pass solver logs.

use mixed_clearing::config::ClearingConfig;
use mixed_clearing::market::MarketClearingReport;
use mixed_clearing::optimization::{PortfolioSolver, RateCurve};
use mixed_clearing::simulation::{loan_session, relay_session, stock_session, ClearingSession, SessionConfig};
use std::fs;
use std::process;

fn print_usage() {
    eprintln!(
        r#"mixed-clearing: heterogeneous network market clearing

USAGE:
    mixed-clearing <COMMAND> [OPTIONS]

COMMANDS:
    stocks      Clear a random stock pool (investors vs issuers)
    loans       Clear random bilateral loans (firms vs funds)
    relay       Clear firms -> banks -> funds (loans and bank bonds)
    optimize    Solve a portfolio return-maximization problem
    help        Show this message

OPTIONS (stocks, loans, relay):
    --buyers <N>        Investors or firms (default: 10)
    --sellers <N>       Issuers or funds (default: 10)
    --banks <N>         Intermediaries in relay sessions (default: 1)
    --seed <N>          Random seed (default: 42)
    --config <FILE>     JSON clearing configuration
    --format <FORMAT>   Output format: text (default) or json

OPTIONS (optimize):
    --input <FILE>      Path to JSON portfolio problem
    --solver <NAME>     lcqp or domino (default: domino)
    --format <FORMAT>   Output format: text (default) or json

EXAMPLES:
    mixed-clearing stocks --buyers 100 --sellers 100
    mixed-clearing loans --seed 3 --format json
    mixed-clearing relay --banks 3 --config clearing.json
    mixed-clearing optimize --input portfolio.json --solver lcqp"#
    );
}

fn fail(message: impl std::fmt::Display) -> ! {
    eprintln!("Error: {}", message);
    process::exit(1);
}

/// JSON schema for a portfolio problem.
#[derive(serde::Deserialize)]
struct PortfolioInput {
    assets: Vec<RateCurve>,
    #[serde(default)]
    liabilities: Vec<RateCurve>,
    #[serde(default)]
    cash: f64,
    capital: f64,
}

#[derive(serde::Serialize)]
struct PortfolioOutput {
    solver: &'static str,
    assets: Vec<f64>,
    liabilities: Vec<f64>,
    profit: f64,
}

#[derive(serde::Serialize)]
struct SessionOutput<'a> {
    report: &'a MarketClearingReport,
    total_cash_before: f64,
    total_cash_after: f64,
    contracts: usize,
}

fn next_value<'a>(args: &'a [String], i: &mut usize, flag: &str, expects: &str) -> &'a str {
    *i += 1;
    args.get(*i)
        .map(String::as_str)
        .unwrap_or_else(|| fail(format!("{} requires {}", flag, expects)))
}

fn number<T: std::str::FromStr>(args: &[String], i: &mut usize, flag: &str) -> T {
    let value = next_value(args, i, flag, "a number");
    value
        .parse()
        .unwrap_or_else(|_| fail(format!("{} requires a number, got '{}'", flag, value)))
}

fn cmd_session(kind: &str, args: &[String]) {
    let mut session_config = SessionConfig::default();
    let mut clearing = ClearingConfig::default();
    let mut format = "text".to_string();
    let mut i = 0;
    while i < args.len() {
        match args[i].as_str() {
            "--buyers" => session_config.buyers = number(args, &mut i, "--buyers"),
            "--sellers" => session_config.sellers = number(args, &mut i, "--sellers"),
            "--banks" => session_config.intermediaries = number(args, &mut i, "--banks"),
            "--seed" => session_config.seed = number(args, &mut i, "--seed"),
            "--config" => {
                let path = next_value(args, &mut i, "--config", "a file path");
                clearing = ClearingConfig::load_from_file(path)
                    .unwrap_or_else(|e| fail(format!("cannot load '{}': {}", path, e)));
            }
            "--format" => format = next_value(args, &mut i, "--format", "'text' or 'json'").to_string(),
            other => fail(format!("unknown option: {}", other)),
        }
        i += 1;
    }

    let built = match kind {
        "stocks" => stock_session(&session_config, &clearing),
        "loans" => loan_session(&session_config, &clearing),
        _ => relay_session(&session_config, &clearing),
    };
    let mut session: ClearingSession = built.unwrap_or_else(|e| fail(e));
    let before = session.total_cash();
    let report = session.clear(&clearing).unwrap_or_else(|e| fail(e));
    let after = session.total_cash();
    let contracts = session.ledger.borrow().contracts().len();

    if format == "json" {
        let output = SessionOutput {
            report: &report,
            total_cash_before: before,
            total_cash_after: after,
            contracts,
        };
        let json = serde_json::to_string_pretty(&output).unwrap_or_else(|e| fail(e));
        println!("{}", json);
        return;
    }

    println!("Algorithm:  {}", report.algorithm);
    println!("Residual:   {:.3e}", report.residual);
    println!("Accepted:   {}", report.accepted);
    println!("Contracts:  {}", contracts);
    println!("Cash:       {:.6} -> {:.6}", before, after);
    println!();
    for instrument in &session.instruments {
        let rates: Vec<f64> = report
            .rates
            .iter()
            .filter(|(_, i, _)| i == instrument)
            .map(|(_, _, r)| *r)
            .collect();
        if rates.is_empty() {
            println!("{}: no trades", instrument);
            continue;
        }
        let low = rates.iter().copied().fold(f64::INFINITY, f64::min);
        let high = rates.iter().copied().fold(f64::NEG_INFINITY, f64::max);
        println!(
            "{}: {} rate(s) in [{:.6}, {:.6}], matched volume {:.4}",
            instrument,
            rates.len(),
            low,
            high,
            report.matched_volume(instrument)
        );
    }
}

fn cmd_optimize(args: &[String]) {
    let mut input_path = None;
    let mut solver = PortfolioSolver::default();
    let mut format = "text".to_string();
    let mut i = 0;
    while i < args.len() {
        match args[i].as_str() {
            "--input" => input_path = Some(next_value(args, &mut i, "--input", "a file path").to_string()),
            "--solver" => {
                solver = next_value(args, &mut i, "--solver", "'lcqp' or 'domino'")
                    .parse()
                    .unwrap_or_else(|e| fail(e))
            }
            "--format" => format = next_value(args, &mut i, "--format", "'text' or 'json'").to_string(),
            other => fail(format!("unknown option: {}", other)),
        }
        i += 1;
    }

    let path = input_path.unwrap_or_else(|| fail("--input <FILE> is required"));
    let content = fs::read_to_string(&path).unwrap_or_else(|e| fail(format!("cannot read '{}': {}", path, e)));
    let input: PortfolioInput = serde_json::from_str(&content).unwrap_or_else(|e| {
        eprintln!("Error parsing JSON: {}", e);
        eprintln!("Expected format:");
        eprintln!(
            r#"{{
  "assets": [{{ "slope": -0.01, "intercept": 0.0333 }}],
  "liabilities": [{{ "slope": 0.0, "intercept": 0.01 }}],
  "cash": 4.0,
  "capital": 5.0
}}"#
        );
        process::exit(1);
    });

    let optimizer = solver.optimizer();
    let allocation = optimizer
        .perform_optimization(&input.assets, &input.liabilities, input.cash, input.capital)
        .unwrap_or_else(|e| fail(e));
    let (assets, liabilities) = allocation.split_at(input.assets.len());
    let profit = input
        .assets
        .iter()
        .zip(assets)
        .map(|(curve, &a)| curve.rate(a) * a)
        .sum::<f64>()
        - input
            .liabilities
            .iter()
            .zip(liabilities)
            .map(|(curve, &l)| curve.rate(l) * l)
            .sum::<f64>();

    if format == "json" {
        let output = PortfolioOutput {
            solver: optimizer.name(),
            assets: assets.to_vec(),
            liabilities: liabilities.to_vec(),
            profit,
        };
        let json = serde_json::to_string_pretty(&output).unwrap_or_else(|e| fail(e));
        println!("{}", json);
    } else {
        println!("Solver: {}", optimizer.name());
        for (k, a) in assets.iter().enumerate() {
            println!("  asset {:>3}:     {:.10}", k, a);
        }
        for (k, l) in liabilities.iter().enumerate() {
            println!("  liability {:>3}: {:.10}", k, l);
        }
        println!("Profit: {:.10}", profit);
    }
}

fn main() {
    env_logger::init();
    let args: Vec<String> = std::env::args().collect();

    if args.len() < 2 {
        print_usage();
        process::exit(1);
    }

    let command = args[1].as_str();
    let rest = &args[2..];

    match command {
        "stocks" | "loans" | "relay" => cmd_session(command, rest),
        "optimize" => cmd_optimize(rest),
        "help" | "--help" | "-h" => print_usage(),
        _ => {
            eprintln!("Unknown command: {}", command);
            print_usage();
            process::exit(1);
        }
    }
}
