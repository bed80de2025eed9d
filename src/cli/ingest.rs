use std::path::PathBuf;

use crate::audit;
use crate::cli::open_db;
use crate::error::Result;
use crate::ingest::{ingest_document, parse_payload};
use crate::models::AuditAction;
use crate::settings::load_settings;

pub fn run(document: &str, extraction: &str) -> Result<()> {
    let payload = parse_payload(&std::fs::read_to_string(extraction)?)?;
    let mut conn = open_db()?;
    let result = ingest_document(&mut conn, &PathBuf::from(document), payload)?;

    if result.duplicate_file {
        println!("This document has already been ingested (file {}).", result.file_id);
        return Ok(());
    }

    println!("Stored file {}", result.file_id);
    println!(
        "{} records: {} verified, {} unverified",
        result.records.total, result.records.verified, result.records.unverified
    );
    println!(
        "{} expenses{}",
        result.expenses,
        if result.statement { ", 1 statement" } else { "" }
    );

    audit::record(
        &conn,
        &load_settings().user_name,
        AuditAction::DocumentIngested,
        &format!("{document}: {} records, {} expenses", result.records.total, result.expenses),
    );
    Ok(())
}
