use std::str::FromStr;

use anyhow::Context;
use base64::{engine::general_purpose, Engine as _};
use clap::{Args, Parser, Subcommand};
use fixed::types::I80F48;
use serde_derive::Serialize;

use lendpool::health::{compute_looping_params, compute_max_leverage};
use lendpool::util::system_epoch_secs;

mod configuration;

use configuration::{load_toml, BankConfigDelta, BankSnapshot};

#[derive(Parser, Debug, Clone)]
#[clap()]
struct Cli {
    #[clap(subcommand)]
    command: Command,
}

#[derive(Args, Debug, Clone)]
struct Snapshot {
    /// bank snapshot toml file
    #[clap(short, long, env = "LENDPOOL_SNAPSHOT")]
    snapshot: String,
}

#[derive(Args, Debug, Clone)]
struct BankPair {
    /// snapshot of the bank that receives the deposits
    #[clap(long)]
    deposit: String,

    /// snapshot of the bank that is borrowed from
    #[clap(long)]
    borrow: String,
}

#[derive(Subcommand, Debug, Clone)]
enum Command {
    /// Prints a summary of the bank
    Describe(Snapshot),
    /// Prints utilization, base rate and lending/borrowing rates
    Rates(Snapshot),
    /// Prints remaining deposit and borrow capacity
    Capacity {
        #[clap(flatten)]
        snapshot: Snapshot,

        /// unix seconds, defaults to the current time
        #[clap(long)]
        now: Option<i64>,
    },
    /// Prints the ltv and max leverage of looping the deposit bank against the borrow bank
    MaxLeverage(BankPair),
    /// Computes the borrow needed to loop a principal up to a target leverage
    Loop {
        #[clap(flatten)]
        banks: BankPair,

        /// ui amount of the deposit token
        #[clap(short, long)]
        principal: String,

        #[clap(short, long)]
        leverage: f64,
    },
    /// Prints a config delta file as base64 instruction data
    EncodeConfigOpt {
        #[clap(short, long)]
        delta: String,
    },
}

fn tracing_subscriber_init() {
    let format = tracing_subscriber::fmt::format().with_ansi(atty::is(atty::Stream::Stdout));

    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .event_format(format)
        .init();
}

fn print_json<T: serde::Serialize>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

#[derive(Serialize)]
struct RatesOutput {
    utilization_rate: I80F48,
    base_interest_rate: I80F48,
    lending_rate: I80F48,
    borrowing_rate: I80F48,
}

fn main() -> Result<(), anyhow::Error> {
    dotenv::dotenv().ok();
    tracing_subscriber_init();

    let cli = Cli::parse();

    match cli.command {
        Command::Describe(Snapshot { snapshot }) => {
            let snapshot: BankSnapshot = load_toml(&snapshot)?;
            let bank = snapshot.to_bank()?;
            print!("{}", bank.describe(&snapshot.to_price()?)?);
        }
        Command::Rates(Snapshot { snapshot }) => {
            let bank = load_toml::<BankSnapshot>(&snapshot)?.to_bank()?;
            let rates = bank.compute_interest_rates()?;
            print_json(&RatesOutput {
                utilization_rate: bank.compute_utilization_rate()?,
                base_interest_rate: bank.compute_base_interest_rate()?,
                lending_rate: rates.lending_rate,
                borrowing_rate: rates.borrowing_rate,
            })?;
        }
        Command::Capacity { snapshot, now } => {
            let bank = load_toml::<BankSnapshot>(&snapshot.snapshot)?.to_bank()?;
            let now = match now {
                Some(now) => now,
                None => i64::try_from(system_epoch_secs())?,
            };
            print_json(&bank.compute_remaining_capacity(now)?)?;
        }
        Command::MaxLeverage(BankPair { deposit, borrow }) => {
            let deposit_bank = load_toml::<BankSnapshot>(&deposit)?.to_bank()?;
            let borrow_bank = load_toml::<BankSnapshot>(&borrow)?.to_bank()?;
            let max = compute_max_leverage(&deposit_bank, &borrow_bank);
            if !max.is_sane() {
                tracing::warn!(
                    ltv = max.ltv,
                    max_leverage = max.max_leverage,
                    "bank pair does not allow looping"
                );
            }
            print_json(&max)?;
        }
        Command::Loop {
            banks,
            principal,
            leverage,
        } => {
            let deposit: BankSnapshot = load_toml(&banks.deposit)?;
            let borrow: BankSnapshot = load_toml(&banks.borrow)?;
            let principal = I80F48::from_str(&principal)
                .map_err(|e| anyhow::anyhow!("bad principal {principal:?}: {e}"))?;
            let params = compute_looping_params(
                principal,
                leverage,
                &deposit.to_bank()?,
                &borrow.to_bank()?,
                &deposit.to_price()?,
                &borrow.to_price()?,
            )
            .context("computing looping params")?;
            print_json(&params)?;
        }
        Command::EncodeConfigOpt { delta } => {
            let opt = load_toml::<BankConfigDelta>(&delta)?.to_opt()?;
            let bytes = opt.to_bytes()?;
            println!("{}", general_purpose::STANDARD.encode(bytes));
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn every_subcommand_has_help() {
        let cli = Cli::command();
        for sub in cli.get_subcommands() {
            println!("checking subcommand {}", sub.get_name());
            assert!(sub.get_about().is_some());
        }
        assert!(cli.find_subcommand("max-leverage").is_some());
    }
}
