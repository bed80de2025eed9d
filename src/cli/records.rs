use colored::Colorize;
use comfy_table::{Cell, Table};

use crate::audit;
use crate::cli::open_db;
use crate::error::{LedgerError, Result};
use crate::fmt::money;
use crate::models::{AuditAction, ExtractedRecord};
use crate::settings::load_settings;
use crate::store;

fn print_records(title: &str, records: &[ExtractedRecord]) {
    let mut table = Table::new();
    table.set_header(vec!["ID", "Date", "Plate", "Owner", "Unit", "Concept", "Amount", "Verified"]);
    for r in records {
        let verified = if r.is_verified {
            "yes".green().to_string()
        } else {
            "no".red().to_string()
        };
        table.add_row(vec![
            Cell::new(&r.id),
            Cell::new(r.date.as_deref().unwrap_or_default()),
            Cell::new(&r.plate),
            Cell::new(&r.owner),
            Cell::new(&r.unit_code),
            Cell::new(&r.concept),
            Cell::new(money(r.amount)),
            Cell::new(verified),
        ]);
    }
    let total: f64 = records.iter().map(|r| r.amount).sum();
    println!("{title} ({} records, {})\n{table}", records.len(), money(total));
}

fn sort_by_date(records: &mut [ExtractedRecord]) {
    records.sort_by(|a, b| a.date.cmp(&b.date).then_with(|| a.id.cmp(&b.id)));
}

pub fn list(unverified_only: bool) -> Result<()> {
    let conn = open_db()?;
    let mut records: Vec<ExtractedRecord> = store::get_all(&conn)?;
    if unverified_only {
        records.retain(|r| !r.is_verified);
    }
    sort_by_date(&mut records);
    print_records(if unverified_only { "Unverified records" } else { "Records" }, &records);
    Ok(())
}

pub fn show(id: &str) -> Result<()> {
    let conn = open_db()?;
    let record: ExtractedRecord = store::get(&conn, id)?
        .ok_or_else(|| LedgerError::Other(format!("No record with id {id}")))?;
    println!("{}", serde_json::to_string_pretty(&record)?);
    Ok(())
}

pub fn search(query: &str) -> Result<()> {
    let conn = open_db()?;
    let mut records: Vec<ExtractedRecord> = store::search(&conn, query)?;
    sort_by_date(&mut records);
    print_records(&format!("Records matching \"{query}\""), &records);
    Ok(())
}

pub fn delete(ids: &[String]) -> Result<()> {
    let conn = open_db()?;
    let deleted = store::delete_by_ids::<ExtractedRecord>(&conn, ids)?;
    println!("{deleted} records deleted");
    audit::record(
        &conn,
        &load_settings().user_name,
        AuditAction::RecordsDeleted,
        &format!("{deleted} of {} requested: {}", ids.len(), ids.join(", ")),
    );
    Ok(())
}
