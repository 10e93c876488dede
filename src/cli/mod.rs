pub mod import;
pub mod init;
pub mod inspect;
pub mod status;

use std::path::PathBuf;

use clap::{Parser, Subcommand};

use crate::db::{get_connection, init_db, Pool};
use crate::error::Result;
use crate::settings::Settings;

#[derive(Parser)]
#[command(
    name = "vasimport",
    about = "Import parking and VAS billing reports into the revenue database."
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Choose a data directory and initialize the database and folders.
    Init {
        /// Path for vasimport data (default: ~/Documents/vasimport)
        #[arg(long = "data-dir")]
        data_dir: Option<String>,
    },
    /// Import every report waiting in the input folder.
    Import {
        /// Report kind: parking or vas
        #[arg(long)]
        kind: String,
        /// Input folder (default: <data_dir>/input)
        #[arg(long)]
        input: Option<String>,
        /// User id recorded as the actor (default: system user)
        #[arg(long)]
        user: Option<String>,
    },
    /// Parse a report and show its candidates without touching the database.
    Inspect {
        /// Path to the report spreadsheet
        file: PathBuf,
        /// Report kind: parking or vas
        #[arg(long)]
        kind: String,
    },
    /// Show configured locations and database counts.
    Status,
}

/// Open the configured database as a pool, creating the schema if needed.
pub(crate) fn open_pool(settings: &Settings) -> Result<Pool> {
    let db_path = settings.database_path();
    if let Some(parent) = db_path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    init_db(&get_connection(&db_path)?)?;
    Pool::open(&db_path, settings.pool_size)
}
