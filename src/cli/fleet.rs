use std::path::PathBuf;

use comfy_table::{Cell, Table};

use crate::audit;
use crate::cli::open_db;
use crate::error::Result;
use crate::fleet_import::import_fleet;
use crate::models::AuditAction;
use crate::settings::load_settings;
use crate::store;

pub fn import(file: &str) -> Result<()> {
    let mut conn = open_db()?;
    let result = import_fleet(&mut conn, &PathBuf::from(file))?;

    println!("{} roster entries loaded, {} rows skipped", result.entries, result.skipped);
    println!(
        "{} records re-reconciled: {} verified, {} unverified",
        result.reconciled.total, result.reconciled.verified, result.reconciled.unverified
    );

    audit::record(
        &conn,
        &load_settings().user_name,
        AuditAction::FleetReplaced,
        &format!("{} entries from {file}", result.entries),
    );
    Ok(())
}

pub fn list() -> Result<()> {
    let conn = open_db()?;
    let fleet = store::get_fleet(&conn)?;

    let mut table = Table::new();
    table.set_header(vec!["#", "Plate", "Owner", "Tag", "Unit"]);
    for (i, entry) in fleet.iter().enumerate() {
        table.add_row(vec![
            Cell::new(i + 1),
            Cell::new(&entry.plate),
            Cell::new(&entry.owner),
            Cell::new(entry.tag.as_deref().unwrap_or_default()),
            Cell::new(entry.unit_code.as_deref().unwrap_or_default()),
        ]);
    }
    println!("Fleet roster ({} entries)\n{table}", fleet.len());
    Ok(())
}
