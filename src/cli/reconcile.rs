use crate::audit;
use crate::cli::open_db;
use crate::error::Result;
use crate::ingest::rereconcile_all;
use crate::models::AuditAction;
use crate::settings::load_settings;

pub fn run() -> Result<()> {
    let mut conn = open_db()?;
    let summary = rereconcile_all(&mut conn)?;
    println!(
        "{} records reconciled: {} verified, {} unverified",
        summary.total, summary.verified, summary.unverified
    );
    audit::record(
        &conn,
        &load_settings().user_name,
        AuditAction::RecordsReconciled,
        &format!("{} verified of {}", summary.verified, summary.total),
    );
    Ok(())
}
