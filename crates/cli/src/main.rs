//! Reloop CLI - Database migrations and stock maintenance tools.
//!
//! # Usage
//!
//! ```bash
//! # Run stock database migrations
//! reloop-cli migrate
//!
//! # Recompute stock ledger quantities from the receipt log
//! reloop-cli ledger reconcile
//!
//! # Same, scoped to one tenant
//! reloop-cli ledger reconcile --tenant 42
//! ```
//!
//! # Commands
//!
//! - `migrate` - Run database migrations
//! - `ledger reconcile` - Recompute cached ledger quantities

#![cfg_attr(not(test), forbid(unsafe_code))]

use clap::{Parser, Subcommand};

mod commands;

#[derive(Parser)]
#[command(name = "reloop-cli")]
#[command(author, version, about = "Reloop CLI tools")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run stock database migrations
    Migrate,
    /// Stock ledger maintenance
    Ledger {
        #[command(subcommand)]
        action: LedgerAction,
    },
}

#[derive(Subcommand)]
enum LedgerAction {
    /// Recompute cached ledger quantities from the receipt log
    Reconcile {
        /// Restrict the reconcile to one tenant
        #[arg(short, long)]
        tenant: Option<i32>,
    },
}

#[tokio::main]
async fn main() {
    // Initialize tracing
    tracing_subscriber::fmt::init();

    let cli = Cli::parse();

    let result: Result<(), Box<dyn std::error::Error>> = run(cli).await;

    if let Err(e) = result {
        tracing::error!("Command failed: {e}");
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<(), Box<dyn std::error::Error>> {
    match cli.command {
        Commands::Migrate => commands::migrate::run().await?,
        Commands::Ledger { action } => match action {
            LedgerAction::Reconcile { tenant } => {
                commands::ledger::reconcile(tenant).await?;
            }
        },
    }
    Ok(())
}
