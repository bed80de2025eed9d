use crate::cli::open_db;
use crate::db::{get_setting, DB_FILE};
use crate::error::Result;
use crate::fmt::{format_bytes, money, timestamp};
use crate::ingest::LAST_RECONCILED_KEY;
use crate::models::User;
use crate::reconciler::ReconcileSummary;
use crate::settings::load_settings;
use crate::snapshot;
use crate::store;

pub fn run() -> Result<()> {
    let settings = load_settings();
    let data_dir = std::path::PathBuf::from(&settings.data_dir);
    let db_path = data_dir.join(DB_FILE);

    println!("User:       {}", settings.user_name);
    println!("Data dir:   {}", data_dir.display());
    println!("Database:   {}", db_path.display());

    if !db_path.exists() {
        println!();
        println!("Database not found. Run `fleetledger init` to set up.");
        return Ok(());
    }

    let size = std::fs::metadata(&db_path)?.len();
    println!("DB size:    {}", format_bytes(size));

    let conn = open_db()?;
    let snap = snapshot::load(&conn);
    let summary = ReconcileSummary::of(&snap.records);

    println!();
    println!("Fleet:         {}", snap.fleet.len());
    println!("Files:         {}", snap.files.len());
    println!("Records:       {} ({})", summary.total, money(snap.record_total()));
    println!("  verified:    {}", summary.verified);
    println!("  unverified:  {}", summary.unverified);
    println!("  orphaned:    {}", snap.orphaned_records().len());
    println!("Statements:    {}", snap.statements.len());
    println!("Expenses:      {} ({})", snap.expenses.len(), money(snap.expense_total()));
    println!("Users:         {}", store::count::<User>(&conn)?);

    let last = get_setting(&conn, LAST_RECONCILED_KEY)
        .and_then(|v| v.parse::<i64>().ok())
        .map(timestamp)
        .unwrap_or_else(|| "never".to_string());
    println!("Last full reconciliation: {last}");
    Ok(())
}
