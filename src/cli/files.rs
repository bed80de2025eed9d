use comfy_table::{Cell, Table};

use crate::audit;
use crate::cli::open_db;
use crate::error::Result;
use crate::fmt::{format_bytes, timestamp};
use crate::models::AuditAction;
use crate::settings::load_settings;
use crate::snapshot;
use crate::store::delete_files_and_dependents;

pub fn list() -> Result<()> {
    let conn = open_db()?;
    let snap = snapshot::load(&conn);

    let mut table = Table::new();
    table.set_header(vec!["ID", "Name", "Type", "Size", "Uploaded", "Records"]);
    for f in &snap.files {
        let records = snap
            .records
            .iter()
            .filter(|r| r.source_file_id.as_deref() == Some(f.id.as_str()))
            .count();
        table.add_row(vec![
            Cell::new(&f.id),
            Cell::new(&f.name),
            Cell::new(&f.mime_type),
            Cell::new(format_bytes(f.size_bytes)),
            Cell::new(timestamp(f.created_at)),
            Cell::new(records),
        ]);
    }
    println!("Files\n{table}");
    Ok(())
}

pub fn delete(ids: &[String]) -> Result<()> {
    let mut conn = open_db()?;
    let result = delete_files_and_dependents(&mut conn, ids)?;
    if result.total() == 0 {
        println!("No matching files.");
        return Ok(());
    }
    println!(
        "Deleted {} files, {} records, {} expenses, {} statements",
        result.files, result.records, result.expenses, result.statements
    );
    audit::record(
        &conn,
        &load_settings().user_name,
        AuditAction::FilesDeleted,
        &format!(
            "files={} records={} expenses={} statements={}",
            result.files, result.records, result.expenses, result.statements
        ),
    );
    Ok(())
}
