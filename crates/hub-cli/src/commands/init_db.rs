//! init-db command - run pending migrations, creating the database if absent
//!
//! Usage:
//! ```bash
//! iscc-hub init-db --db-name hub.db
//! ```

use anyhow::Result;
use clap::Args;

use iscc_hub_persist::{connect, DbConfig};

use crate::{print_info, print_success};

/// Arguments for the init-db command
#[derive(Args)]
pub struct InitDbArgs {
    /// SQLite database file to create/migrate
    #[arg(long, short = 'd', value_name = "FILE", default_value = "hub.db")]
    db_name: String,
}

/// Run the init-db command
pub async fn run(args: InitDbArgs) -> Result<()> {
    print_info(&format!("opening {} and running migrations...", args.db_name));

    let config = DbConfig::file(&args.db_name);
    connect(&config).await?;

    print_success(&format!("database ready at {}", args.db_name));
    Ok(())
}
