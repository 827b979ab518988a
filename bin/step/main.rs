//! Private Step Challenge CLI
//!
//! Upload encrypted step counts, reveal them on-chain and browse the leaderboard.

mod commands;
mod style;

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use step_challenge::ClientConfig;
use style::colors::*;

#[derive(Parser, Debug)]
#[command(name = "step")]
#[command(about = "Private Step Challenge client", version)]
struct Cli {
    /// Config file (TOML)
    #[arg(short, long, global = true, env = "STEP_CONFIG")]
    config: Option<PathBuf>,

    /// Ledger gateway URL
    #[arg(long, global = true, env = "STEP_GATEWAY_URL")]
    gateway: Option<String>,

    /// Step challenge contract address
    #[arg(long, global = true, env = "STEP_CONTRACT_ADDRESS")]
    contract: Option<String>,

    /// FHE relayer URL
    #[arg(long, global = true, env = "STEP_RELAYER_URL")]
    relayer: Option<String>,

    /// Account address to act as
    #[arg(short, long, global = true, env = "STEP_ACCOUNT")]
    account: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Show verified records, ranked by steps
    Leaderboard {
        /// Case-insensitive name filter
        #[arg(short, long, default_value = "")]
        search: String,

        /// Only show verified records
        #[arg(long)]
        verified_only: bool,
    },

    /// Show challenge statistics
    Stats,

    /// Show records uploaded by the account
    History,

    /// Show one record
    Show {
        /// Record id
        id: String,
    },

    /// Encrypt and upload a step count
    Upload {
        /// Participant name
        #[arg(short, long)]
        name: String,

        /// Step count (digits only)
        steps: String,
    },

    /// Reveal a record's step count on-chain
    Verify {
        /// Record id
        id: String,
    },

    /// Check whether the challenge is accepting records
    Check,

    /// Run a full round against in-memory backends
    Demo,
}

pub fn print_banner() {
    println!(
        r#"{}{}
   ┌─┐┌┬┐┌─┐┌─┐  ┌─┐┬ ┬┌─┐┬  ┬  ┌─┐┌┐┌┌─┐┌─┐
   └─┐ │ ├┤ ├─┘  │  ├─┤├─┤│  │  ├┤ ││││ ┬├┤
   └─┘ ┴ └─┘┴    └─┘┴ ┴┴ ┴┴─┘┴─┘└─┘┘└┘└─┘└─┘{}
   {}encrypted steps, verified ranks  v{}{}
"#,
        BOLD,
        CYAN,
        RESET,
        GRAY,
        step_challenge::VERSION,
        RESET
    );
}

impl Cli {
    /// Config file and environment, then command-line flags
    fn client_config(&self) -> Result<ClientConfig> {
        let mut config = ClientConfig::load(self.config.as_deref())?;
        if let Some(url) = &self.gateway {
            config.gateway.url = url.clone();
        }
        if let Some(address) = &self.contract {
            config.gateway.contract_address = address.clone();
        }
        if let Some(url) = &self.relayer {
            config.relayer.url = url.clone();
        }
        if let Some(account) = &self.account {
            config.account = Some(account.clone());
        }
        Ok(config)
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("step_challenge=info".parse()?)
                .add_directive("warn".parse()?),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let config = cli.client_config()?;

    let result = match cli.command {
        Commands::Leaderboard {
            search,
            verified_only,
        } => commands::leaderboard::run(&config, search, verified_only).await,
        Commands::Stats => commands::stats::run(&config).await,
        Commands::History => commands::history::run(&config).await,
        Commands::Show { id } => commands::show::run(&config, id).await,
        Commands::Upload { name, steps } => commands::upload::run(&config, name, steps).await,
        Commands::Verify { id } => commands::verify::run(&config, id).await,
        Commands::Check => commands::check::run(&config).await,
        Commands::Demo => commands::demo::run(&config).await,
    };

    if let Err(e) = result {
        style::print_error(&format!("{:#}", e));
        std::process::exit(1);
    }
    Ok(())
}
