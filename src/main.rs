use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use hps_core::{
    custody::CustodyAsset,
    deploy::{deploy, DeployOptions},
    Address, Amount, Call,
};
use serde::Serialize;
use serde_json::json;

mod config;
mod keys;
mod service;
mod store;

use config::Config;
use service::{ApiService, Credentials, ServiceError};
use store::StateFile;

#[derive(Parser)]
#[command(name = "hps")]
#[command(about = "Operator CLI for the HPS staking ledger and escrow factory", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Config file path
    #[arg(short, long, global = true, default_value = "hps.toml")]
    config: PathBuf,
}

#[derive(Subcommand)]
enum Commands {
    /// Deploy token, escrow factory, rewards pool and staking ledger
    Init {
        /// Overwrite an existing state file
        #[arg(long)]
        force: bool,
    },

    /// Generate an ed25519 identity and its address
    Keygen {
        #[arg(long)]
        out_dir: PathBuf,
    },

    /// Stake the configured amount for the configured staker
    Stake {
        #[command(flatten)]
        auth: AuthArgs,
    },

    /// Create an escrow for the configured staker
    Escrow {
        #[command(flatten)]
        auth: AuthArgs,
    },

    /// Return stake to a participant (operator only)
    Unstake {
        #[arg(long)]
        participant: Address,
        #[arg(long)]
        amount: Amount,
    },

    /// Show staked and custody balance of an address
    Balance { address: Address },

    /// Check whether an address is a registered escrow
    HasEscrow { address: Address },

    /// Show deployment addresses and ledger totals
    Status,
}

#[derive(clap::Args)]
struct AuthArgs {
    #[arg(long, default_value = "admin")]
    user: String,
    #[arg(long)]
    password: String,
}

impl From<AuthArgs> for Credentials {
    fn from(args: AuthArgs) -> Self {
        Credentials {
            user: args.user,
            password: args.password,
        }
    }
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!(
        "{}",
        serde_json::to_string_pretty(value).context("failed to encode output")?
    );
    Ok(())
}

/// Print the error body a transport would send and fail with its status.
fn report_service_error(err: ServiceError) -> Result<()> {
    print_json(&err.to_response())?;
    bail!("request failed with status {}: {}", err.status_code(), err)
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let log_level = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(log_level)
        .with_writer(std::io::stderr)
        .init();

    let config = Config::load(&cli.config)?;
    let state_path = config.resolve_state_path(&cli.config);

    match cli.command {
        Commands::Init { force } => {
            if state_path.exists() && !force {
                bail!(
                    "state {} already exists (use --force to redeploy)",
                    state_path.display()
                );
            }
            let options = DeployOptions {
                auto_fund_on_stake: config.auto_fund_on_stake,
                seed_balances: config.seed_balances(),
            };
            let (chain, summary) = deploy(config.accounts.operator, &options)?;
            StateFile::new(summary.clone(), chain).save(&state_path)?;
            print_json(&summary)?;
        }

        Commands::Keygen { out_dir } => {
            let identity = keys::generate_identity(&out_dir)?;
            tracing::info!(address = %identity.address, dir = %out_dir.display(), "identity written");
            print_json(&identity)?;
        }

        Commands::Stake { auth } => {
            let mut state = StateFile::load(&state_path)?;
            let service = ApiService::new(&config);
            let result = service.stake(&mut state.chain, &auth.into());
            state.save(&state_path)?;
            match result {
                Ok(response) => print_json(&response)?,
                Err(err) => report_service_error(err)?,
            }
        }

        Commands::Escrow { auth } => {
            let mut state = StateFile::load(&state_path)?;
            let service = ApiService::new(&config);
            let result = service.escrow(&mut state.chain, &auth.into());
            state.save(&state_path)?;
            match result {
                Ok(response) => print_json(&response)?,
                Err(err) => report_service_error(err)?,
            }
        }

        Commands::Unstake {
            participant,
            amount,
        } => {
            let mut state = StateFile::load(&state_path)?;
            let receipt = state.chain.transact(
                config.accounts.operator,
                Call::Unstake {
                    participant,
                    amount,
                },
            )?;
            state.save(&state_path)?;
            print_json(&json!({
                "participant": participant,
                "staked": state.chain.ledger().get_balance_of(&participant),
                "txHash": receipt.tx_hash,
            }))?;
        }

        Commands::Balance { address } => {
            let state = StateFile::load(&state_path)?;
            let chain = &state.chain;
            print_json(&json!({
                "address": address,
                "staked": chain.ledger().get_balance_of(&address),
                "custody": chain.token().balance_of(&address),
                "allowance": chain.token().allowance(&address, &chain.ledger().address()),
            }))?;
        }

        Commands::HasEscrow { address } => {
            let state = StateFile::load(&state_path)?;
            print_json(&json!({
                "address": address,
                "hasEscrow": state.chain.registry().has_escrow(&address),
            }))?;
        }

        Commands::Status => {
            let state = StateFile::load(&state_path)?;
            let chain = &state.chain;
            let ledger = chain.ledger();
            print_json(&json!({
                "deployment": state.deployment,
                "height": chain.height(),
                "totalStaked": ledger.total_staked(),
                "stakers": ledger.stakers().filter(|(_, amount)| **amount > 0).count(),
                "escrows": chain.registry().len(),
                "autoFundOnStake": ledger.wiring().auto_fund_on_stake,
                "stateRoot": format!("0x{}", hex::encode(ledger.state_root())),
            }))?;
        }
    }

    Ok(())
}
