//! Token Approver CLI
//!
//! Runs the HTTP service or performs single queries and approvals from the
//! command line.

use clap::{Parser, Subcommand};
use secrecy::SecretString;
use std::io::BufRead;
use std::path::PathBuf;
use std::sync::Arc;
use token_approver::http::{create_router, AppState};
use token_approver::{
    seed_from_env, ApprovalPipeline, Config, Error, QueryService, Result, RpcLedger,
    WalletDeriver,
};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};
use zeroize::Zeroizing;

/// Environment variable consulted for the approval password before stdin
const PASSWORD_ENV: &str = "APPROVE_PASSWORD";

#[derive(Parser)]
#[command(name = "token-approver")]
#[command(about = "Derive per-user accounts and manage ERC-20 approvals")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Path to config file (JSON)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Emit logs as JSON lines
    #[arg(long, global = true)]
    json_logs: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the HTTP service
    Serve,

    /// Native balance of an address
    Balance {
        address: String,
    },

    /// Token allowance granted by owner to spender
    Allowance {
        owner: String,
        spender: String,
    },

    /// Approve a spender; the password is read from APPROVE_PASSWORD or stdin
    Approve {
        /// Spender address
        #[arg(long)]
        spender: String,

        /// Amount in display units (e.g. 1000 or 1.5)
        #[arg(long)]
        value: String,
    },

    /// Print the account address derived for a password (read from APPROVE_PASSWORD or stdin)
    Address,

    /// Show current configuration
    Config,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present (ignore if not found)
    dotenvy::dotenv().ok();

    let cli = Cli::parse();

    // Initialize logging; RUST_LOG wins over --verbose
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new(if cli.verbose { "debug" } else { "info" })
    });

    tracing_subscriber::registry()
        .with(filter)
        .with(cli.json_logs.then(|| fmt::layer().json()))
        .with((!cli.json_logs).then(fmt::layer))
        .init();

    let config = Config::load(cli.config.as_deref())?;

    match cli.command {
        Commands::Serve => serve(config).await?,
        Commands::Balance { address } => {
            let balance = queries(&config)?.balance_of(&address).await?;
            println!("{}", balance);
        }
        Commands::Allowance { owner, spender } => {
            let allowance = queries(&config)?.allowance_of(&owner, &spender).await?;
            println!("{}", allowance);
        }
        Commands::Approve { spender, value } => {
            run_approve(&config, &spender, &value).await?;
        }
        Commands::Address => {
            let deriver = deriver(&config)?;
            let password = read_password()?;
            let account = tokio::task::spawn_blocking(move || deriver.derive(&password))
                .await
                .map_err(|e| Error::Derivation(e.to_string()))??;
            println!("{}", account.address_string());
        }
        Commands::Config => {
            println!("{}", serde_json::to_string_pretty(&config)?);
        }
    }

    Ok(())
}

fn queries(config: &Config) -> Result<QueryService<RpcLedger>> {
    let ledger = Arc::new(RpcLedger::new(&config.rpc)?);
    Ok(QueryService::new(ledger, config.token_address()?))
}

fn deriver(config: &Config) -> Result<Arc<WalletDeriver>> {
    Ok(Arc::new(WalletDeriver::new(seed_from_env()?, &config.kdf)?))
}

async fn serve(config: Config) -> Result<()> {
    let token = config.token_address()?;
    let ledger = Arc::new(RpcLedger::new(&config.rpc)?);
    let deriver = deriver(&config)?;

    let state = AppState::new(
        QueryService::new(Arc::clone(&ledger), token),
        ApprovalPipeline::new(ledger, deriver, token),
        config.strict_addresses,
    );
    let app = create_router(state);

    let listener = tokio::net::TcpListener::bind(&config.listen_addr).await?;
    tracing::info!(
        listen_addr = %config.listen_addr,
        rpc_url = %config.rpc.url,
        token = %token,
        strict_addresses = config.strict_addresses,
        "Starting HTTP service"
    );

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("HTTP service stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for shutdown signal");
    }
}

async fn run_approve(config: &Config, spender: &str, value: &str) -> Result<()> {
    let value: serde_json::Value = serde_json::from_str(value)
        .map_err(|_| Error::InvalidInput(format!("value is not a number: {}", value)))?;

    let token = config.token_address()?;
    let ledger = Arc::new(RpcLedger::new(&config.rpc)?);
    let pipeline = ApprovalPipeline::new(ledger, deriver(config)?, token)
        .with_strict_addresses(config.strict_addresses);

    let password = read_password()?;
    let receipt = pipeline.approve(spender, &value, password).await?;

    println!("{}", serde_json::to_string_pretty(&receipt)?);
    Ok(())
}

/// Password from the environment, else the first line of stdin
fn read_password() -> Result<SecretString> {
    if let Ok(password) = std::env::var(PASSWORD_ENV) {
        return Ok(SecretString::from(password));
    }

    let mut line = Zeroizing::new(String::new());
    std::io::stdin().lock().read_line(&mut line)?;
    let password = line.trim_end_matches(['\r', '\n']);
    if password.is_empty() {
        return Err(Error::InvalidInput(format!(
            "no password given (set {} or pipe it on stdin)",
            PASSWORD_ENV
        )));
    }
    Ok(SecretString::from(password.to_string()))
}
