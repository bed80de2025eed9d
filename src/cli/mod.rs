pub mod audit;
pub mod backup;
pub mod files;
pub mod fleet;
pub mod ingest;
pub mod init;
pub mod reconcile;
pub mod records;
pub mod statements;
pub mod status;
pub mod users;

use clap::{Parser, Subcommand};
use rusqlite::Connection;

use crate::db::{get_connection, init_db};
use crate::error::{LedgerError, Result};
use crate::settings::db_path;

/// Open the configured database, refusing to create one implicitly.
pub(crate) fn open_db() -> Result<Connection> {
    let path = db_path();
    if !path.exists() {
        return Err(LedgerError::Settings(format!(
            "No database found at {}\nRun `fleetledger init` to create one.",
            path.display()
        )));
    }
    let conn = get_connection(&path)?;
    init_db(&conn)?;
    Ok(conn)
}

#[derive(Parser)]
#[command(name = "fleetledger", about = "Toll and freight ledger with fleet reconciliation.")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Choose a data directory and initialize the database.
    Init {
        /// Path for ledger data (default: ~/Documents/fleetledger)
        #[arg(long = "data-dir")]
        data_dir: Option<String>,
        /// Name recorded in the audit log
        #[arg(long)]
        user: Option<String>,
    },
    /// Manage the fleet roster.
    Fleet {
        #[command(subcommand)]
        command: FleetCommands,
    },
    /// Store a scanned document and the records extracted from it.
    Ingest {
        /// Original document (PDF, image, spreadsheet)
        document: String,
        /// JSON output of the extraction service for this document
        #[arg(long)]
        extraction: String,
    },
    /// Truck movement records.
    Records {
        #[command(subcommand)]
        command: RecordsCommands,
    },
    /// List card statement expenses.
    Expenses {
        /// Only expenses whose text contains this
        #[arg(long)]
        search: Option<String>,
    },
    /// List card statements, newest first.
    Statements,
    /// Uploaded source documents.
    Files {
        #[command(subcommand)]
        command: FilesCommands,
    },
    /// Re-run reconciliation of every stored record against the roster.
    Reconcile,
    /// Manage users.
    Users {
        #[command(subcommand)]
        command: UsersCommands,
    },
    /// Show the audit log, newest first.
    Audit {
        #[arg(long, default_value = "20")]
        limit: usize,
    },
    /// Show database location and summary statistics.
    Status,
    /// Back up the database.
    Backup {
        /// Output path (default: <data_dir>/backups/fleetledger-YYYYMMDD-HHMMSS.db)
        #[arg(long)]
        output: Option<String>,
    },
}

#[derive(Subcommand)]
pub enum FleetCommands {
    /// Replace the roster from a CSV/XLSX file and re-reconcile records.
    Import {
        /// Roster spreadsheet
        file: String,
    },
    /// List the current roster.
    List,
}

#[derive(Subcommand)]
pub enum RecordsCommands {
    /// List records.
    List {
        /// Only records that did not match the roster
        #[arg(long)]
        unverified: bool,
    },
    /// Show one record as JSON.
    Show {
        id: String,
    },
    /// Free-text search over plate, owner, tag, concept, unit, date and file name.
    Search {
        query: String,
    },
    /// Delete records by id.
    Delete {
        #[arg(required = true)]
        ids: Vec<String>,
    },
}

#[derive(Subcommand)]
pub enum FilesCommands {
    /// List uploaded files, newest first.
    List,
    /// Delete files and every record, expense and statement extracted from them.
    Delete {
        #[arg(required = true)]
        ids: Vec<String>,
    },
}

#[derive(Subcommand)]
pub enum UsersCommands {
    /// Add a user.
    Add {
        username: String,
        #[arg(long = "name")]
        display_name: Option<String>,
        #[arg(long, default_value = "operator")]
        role: String,
    },
    /// List users.
    List,
}
