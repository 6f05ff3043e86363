//! ISCC Hub CLI - operator tooling for the notary hub
//!
//! # Usage
//!
//! ```bash
//! # Run migrations against a fresh database
//! iscc-hub init-db --db-name hub.db
//!
//! # Wipe a non-production database and re-run migrations
//! iscc-hub reset-db --db-name hub.db --yes
//!
//! # Replay the event log and check the gap-less/monotonic invariants
//! iscc-hub verify --db-name hub.db
//!
//! # Sign and submit a throwaway declaration against a running hub
//! iscc-hub declare --url http://localhost:8080
//! ```

use anyhow::Result;
use clap::{Parser, Subcommand};
use colored::Colorize;

mod commands;

use commands::{declare, init_db, reset_db, verify};

/// Operator CLI for the ISCC notary hub.
#[derive(Parser)]
#[command(
    name = "iscc-hub",
    version,
    about = "iscc-hub CLI - operator tooling for the notary hub",
    long_about = "Database lifecycle management, event-log verification, and \
                  smoke-test declaration submission for the ISCC notary hub."
)]
struct Cli {
    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run pending migrations against a database, creating it if absent
    #[command(name = "init-db")]
    InitDb(init_db::InitDbArgs),

    /// Wipe a database file and re-run migrations
    #[command(name = "reset-db")]
    ResetDb(reset_db::ResetDbArgs),

    /// Replay the event log and check spec invariants
    #[command(name = "verify")]
    Verify(verify::VerifyArgs),

    /// Sign and submit a declaration against a running hub
    #[command(name = "declare")]
    Declare(declare::DeclareArgs),
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    setup_logging(cli.verbose);

    match cli.command {
        Commands::InitDb(args) => init_db::run(args).await,
        Commands::ResetDb(args) => reset_db::run(args).await,
        Commands::Verify(args) => verify::run(args).await,
        Commands::Declare(args) => declare::run(args).await,
    }
}

/// Setup logging based on verbosity level
fn setup_logging(verbosity: u8) {
    use tracing_subscriber::EnvFilter;

    let filter = match verbosity {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)))
        .init();
}

/// Print a success message with a checkmark
pub fn print_success(msg: &str) {
    println!("{} {}", "✓".green().bold(), msg);
}

/// Print an error message with an X
pub fn print_error(msg: &str) {
    eprintln!("{} {}", "✗".red().bold(), msg);
}

/// Print a warning message
pub fn print_warning(msg: &str) {
    println!("{} {}", "⚠".yellow().bold(), msg);
}

/// Print an info message
pub fn print_info(msg: &str) {
    println!("{} {}", "ℹ".blue().bold(), msg);
}
