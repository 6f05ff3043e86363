//! reset-db command - wipe a database file and re-run migrations
//!
//! Grounded in `scripts/reset_dev_db.py`'s dev-database reset: refuses to
//! touch anything that looks like a production database unless `--force`
//! is also given.
//!
//! Usage:
//! ```bash
//! iscc-hub reset-db --db-name hub.db --yes
//! ```

use anyhow::{bail, Result};
use clap::Args;

use iscc_hub_persist::{connect, DbConfig};

use crate::{print_info, print_success, print_warning};

/// Arguments for the reset-db command
#[derive(Args)]
pub struct ResetDbArgs {
    /// SQLite database file to wipe and recreate
    #[arg(long, short = 'd', value_name = "FILE", default_value = "hub.db")]
    db_name: String,

    /// Confirm the destructive wipe (required)
    #[arg(long)]
    yes: bool,

    /// Allow resetting a database whose name contains "prod"
    #[arg(long)]
    force: bool,
}

/// Run the reset-db command
pub async fn run(args: ResetDbArgs) -> Result<()> {
    if !args.yes {
        bail!("refusing to wipe {} without --yes", args.db_name);
    }
    if args.db_name.to_lowercase().contains("prod") && !args.force {
        bail!(
            "{} looks like a production database; pass --force to override",
            args.db_name
        );
    }

    for suffix in ["", "-wal", "-shm"] {
        let path = format!("{}{suffix}", args.db_name);
        if std::path::Path::new(&path).exists() {
            std::fs::remove_file(&path)?;
            print_warning(&format!("removed {path}"));
        }
    }

    print_info(&format!("recreating {} and running migrations...", args.db_name));
    let config = DbConfig::file(&args.db_name);
    connect(&config).await?;

    print_success(&format!("database reset at {}", args.db_name));
    Ok(())
}
