use std::process::ExitCode;

use chrono::Utc;
use tracing_subscriber::EnvFilter;

use train_chain::config::PermitConfig;
use train_chain::geometry::LinearPosition;
use train_chain::snapshot;

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let Some(path) = std::env::args().nth(1) else {
        eprintln!("usage: train-chain <snapshot.json>");
        return ExitCode::from(2);
    };

    let chain = match snapshot::load::<LinearPosition>(&path, PermitConfig::default()) {
        Ok(chain) => chain,
        Err(e) => {
            eprintln!("Failed to load {path}: {e}");
            return ExitCode::FAILURE;
        }
    };

    let now = Utc::now();

    println!("Chain:");
    print!("{chain}");
    println!();

    println!("Positions at {now}:");
    for train in chain.trains() {
        match (train.head(now), train.tail(now)) {
            (Some(head), Some(tail)) => println!(
                "  {} ({:.2}/s): head {head}, tail {tail}",
                train.identifier(),
                train.current_speed(now),
            ),
            _ => println!("  {}: not located", train.identifier()),
        }
    }
    println!();

    println!("Digest: {}", chain.digest());
    ExitCode::SUCCESS
}
