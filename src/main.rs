use std::path::PathBuf;
use std::process;

use clap::{Parser, Subcommand};
use tracing::info;
use tracing_subscriber::EnvFilter;

mod ledger;
mod store;

use ledger::{Amount, Ledger, TokenError, UNIT_SCALE};
use store::StoreError;

#[derive(Debug, thiserror::Error)]
enum CliError {
    #[error(transparent)]
    Token(#[from] TokenError),
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error("serialization failure: {0}")]
    Json(#[from] serde_json::Error),
}

#[derive(Parser)]
#[command(
    name = "tokenbook",
    version,
    about = "Fungible-token ledger: balances, allowances, admin mint/burn"
)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Create a new ledger state file with the whole supply on the creator
    Deploy {
        #[arg(long)]
        state: PathBuf,
        /// Creating account; becomes the administrator
        #[arg(long)]
        account: String,
        #[arg(long, default_value = "Tokenbook")]
        name: String,
        #[arg(long, default_value = "TBK")]
        symbol: String,
        #[arg(long, default_value_t = 8)]
        decimals: u8,
        #[arg(long, default_value_t = 1_000_000 * UNIT_SCALE)]
        supply: Amount,
    },
    /// Print token metadata, total supply, and the administrator
    Info {
        #[arg(long)]
        state: PathBuf,
    },
    /// Get user's balance
    BalanceOf {
        #[arg(long)]
        state: PathBuf,
        #[arg(long)]
        owner: String,
    },
    /// Get from allowances
    Allowance {
        #[arg(long)]
        state: PathBuf,
        #[arg(long)]
        owner: String,
        #[arg(long)]
        spender: String,
    },
    /// Transfer tokens to the user
    Transfer {
        #[arg(long)]
        state: PathBuf,
        #[arg(long)]
        caller: String,
        #[arg(long)]
        to: String,
        #[arg(long)]
        value: Amount,
    },
    /// Give a spender access to the caller's funds
    Approve {
        #[arg(long)]
        state: PathBuf,
        #[arg(long)]
        caller: String,
        #[arg(long)]
        spender: String,
        #[arg(long)]
        value: Amount,
    },
    /// Move tokens on behalf of another account
    TransferFrom {
        #[arg(long)]
        state: PathBuf,
        #[arg(long)]
        caller: String,
        #[arg(long)]
        from: String,
        #[arg(long)]
        to: String,
        #[arg(long)]
        value: Amount,
    },
    /// Expand supply (administrator only)
    Mint {
        #[arg(long)]
        state: PathBuf,
        #[arg(long)]
        caller: String,
        #[arg(long)]
        to: String,
        #[arg(long)]
        value: Amount,
    },
    /// Contract supply (administrator only)
    Burn {
        #[arg(long)]
        state: PathBuf,
        #[arg(long)]
        caller: String,
        #[arg(long)]
        from: String,
        #[arg(long)]
        value: Amount,
    },
    /// Print the emitted event log as JSON lines
    Events {
        #[arg(long)]
        state: PathBuf,
    },
    /// Recompute the state digest and compare it to the stored one
    Verify {
        #[arg(long)]
        state: PathBuf,
    },
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    if let Err(err) = run(cli.command) {
        eprintln!("error: {err}");
        let code = match err {
            CliError::Token(_) => 1,
            CliError::Store(_) | CliError::Json(_) => 2,
        };
        process::exit(code);
    }
}

fn run(command: Command) -> Result<(), CliError> {
    match command {
        Command::Deploy {
            state,
            account,
            name,
            symbol,
            decimals,
            supply,
        } => {
            let ledger = Ledger::deploy(account.clone(), name, symbol, decimals, supply);
            store::create_new(&state, &ledger)?;
            let digest = ledger.snapshot().state_digest;
            info!(admin = %account, supply, "ledger deployed");
            println!("deployed {} to {}", ledger.symbol(), state.display());
            println!("state digest: {digest}");
        }
        Command::Info { state } => {
            let ledger = store::load(&state)?;
            println!("name:         {}", ledger.name());
            println!("symbol:       {}", ledger.symbol());
            println!("decimals:     {}", ledger.decimals());
            println!("total supply: {}", ledger.total_supply());
            println!("admin:        {}", ledger.admin());
        }
        Command::BalanceOf { state, owner } => {
            let ledger = store::load(&state)?;
            println!("{}", ledger.balance_of(&owner));
        }
        Command::Allowance {
            state,
            owner,
            spender,
        } => {
            let ledger = store::load(&state)?;
            println!("{}", ledger.allowance(&owner, &spender));
        }
        Command::Transfer {
            state,
            caller,
            to,
            value,
        } => {
            let mut ledger = store::load(&state)?;
            ledger.transfer(&caller, &to, value)?;
            store::save(&state, &ledger)?;
            info!(%caller, %to, value, "transfer applied");
        }
        Command::Approve {
            state,
            caller,
            spender,
            value,
        } => {
            let mut ledger = store::load(&state)?;
            ledger.approve(&caller, &spender, value)?;
            store::save(&state, &ledger)?;
            info!(owner = %caller, %spender, value, "approval applied");
        }
        Command::TransferFrom {
            state,
            caller,
            from,
            to,
            value,
        } => {
            let mut ledger = store::load(&state)?;
            ledger.transfer_from(&caller, &from, &to, value)?;
            store::save(&state, &ledger)?;
            info!(%caller, %from, %to, value, "delegated transfer applied");
        }
        Command::Mint {
            state,
            caller,
            to,
            value,
        } => {
            let mut ledger = store::load(&state)?;
            ledger.mint(&caller, &to, value)?;
            store::save(&state, &ledger)?;
            info!(%to, value, total_supply = ledger.total_supply(), "mint applied");
        }
        Command::Burn {
            state,
            caller,
            from,
            value,
        } => {
            let mut ledger = store::load(&state)?;
            ledger.burn(&caller, &from, value)?;
            store::save(&state, &ledger)?;
            info!(%from, value, total_supply = ledger.total_supply(), "burn applied");
        }
        Command::Events { state } => {
            let ledger = store::load(&state)?;
            for event in ledger.events() {
                println!("{}", serde_json::to_string(event)?);
            }
        }
        Command::Verify { state } => {
            let digest = store::verify(&state)?;
            println!("state digest ok: {digest}");
        }
    }
    Ok(())
}
