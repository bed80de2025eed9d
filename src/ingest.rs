use std::path::Path;

use base64::Engine;
use rusqlite::{Connection, OptionalExtension, TransactionBehavior};
use serde::Deserialize;
use sha2::{Digest, Sha256};

use crate::db::set_setting;
use crate::error::Result;
use crate::models::{
    new_id, now_millis, CardStatement, ExpenseCategory, ExpenseRecord, ExtractedIdentity,
    ExtractedRecord, UploadedFileRecord,
};
use crate::reconciler::{reconcile, ReconcileSummary};
use crate::store;

pub const LAST_RECONCILED_KEY: &str = "last_reconciled_at";

// ---------------------------------------------------------------------------
// Extraction payload
// ---------------------------------------------------------------------------

/// What the extraction service returns for one document. Ids and source-file
/// back-references are assigned here, not by the extractor.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExtractionPayload {
    #[serde(default)]
    pub records: Vec<ExtractedLine>,
    #[serde(default)]
    pub expenses: Vec<ExpenseLine>,
    #[serde(default)]
    pub statement: Option<StatementHeader>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExtractedLine {
    #[serde(default)]
    pub plate: String,
    #[serde(default)]
    pub owner: String,
    #[serde(default)]
    pub amount: f64,
    #[serde(default)]
    pub concept: String,
    #[serde(default)]
    pub date: Option<String>,
    #[serde(default)]
    pub tag: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExpenseLine {
    #[serde(default)]
    pub date: String,
    #[serde(default)]
    pub concept: String,
    #[serde(default)]
    pub amount: f64,
    #[serde(default)]
    pub category: ExpenseCategory,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatementHeader {
    #[serde(default)]
    pub bank: String,
    #[serde(default)]
    pub holder: String,
    #[serde(default)]
    pub period: String,
    #[serde(default)]
    pub due_date: String,
    #[serde(default)]
    pub total_billed: f64,
}

pub fn parse_payload(json: &str) -> Result<ExtractionPayload> {
    Ok(serde_json::from_str(json)?)
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn compute_checksum(data: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(data);
    hex::encode(hasher.finalize())
}

pub fn mime_type_for(file_path: &Path) -> &'static str {
    let ext = file_path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase())
        .unwrap_or_default();
    match ext.as_str() {
        "pdf" => "application/pdf",
        "png" => "image/png",
        "jpg" | "jpeg" => "image/jpeg",
        "webp" => "image/webp",
        "csv" => "text/csv",
        "xlsx" => "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet",
        "xls" => "application/vnd.ms-excel",
        _ => "application/octet-stream",
    }
}

/// Id of the stored file with this content hash, if any.
fn find_by_checksum(conn: &Connection, checksum: &str) -> Result<Option<String>> {
    let id = conn
        .query_row(
            "SELECT id FROM files WHERE json_extract(data, '$.checksum') = ?1 LIMIT 1",
            [checksum],
            |row| row.get(0),
        )
        .optional()?;
    Ok(id)
}

// ---------------------------------------------------------------------------
// ingest_document
// ---------------------------------------------------------------------------

pub struct IngestResult {
    pub file_id: String,
    pub records: ReconcileSummary,
    pub expenses: usize,
    pub statement: bool,
    pub duplicate_file: bool,
}

/// Store a scanned document together with what was extracted from it.
///
/// The duplicate check, the roster read and every write happen under one
/// immediate transaction, so a concurrent roster import or ingest of the same
/// document either lands entirely before this one or waits for it.
pub fn ingest_document(
    conn: &mut Connection,
    file_path: &Path,
    payload: ExtractionPayload,
) -> Result<IngestResult> {
    let content = std::fs::read(file_path)?;
    let checksum = compute_checksum(&content);

    let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
    if let Some(existing) = find_by_checksum(&tx, &checksum)? {
        tracing::info!(file_id = %existing, "document already ingested");
        return Ok(IngestResult {
            file_id: existing,
            records: ReconcileSummary::of(&[]),
            expenses: 0,
            statement: false,
            duplicate_file: true,
        });
    }

    let created_at = now_millis();
    let file_name = file_path
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or("")
        .to_string();
    let file = UploadedFileRecord {
        id: new_id(),
        name: file_name.clone(),
        mime_type: mime_type_for(file_path).to_string(),
        size_bytes: content.len() as u64,
        content_base64: base64::engine::general_purpose::STANDARD.encode(&content),
        created_at,
        checksum: Some(checksum),
    };

    let extracted: Vec<ExtractedRecord> = payload
        .records
        .into_iter()
        .map(|line| ExtractedRecord {
            id: new_id(),
            extracted: Some(ExtractedIdentity {
                plate: line.plate.clone(),
                owner: line.owner.clone(),
                tag: line.tag.clone(),
            }),
            plate: line.plate,
            owner: line.owner,
            amount: line.amount,
            concept: line.concept,
            date: line.date,
            tag: line.tag,
            source_file_id: Some(file.id.clone()),
            source_file_name: Some(file_name.clone()),
            unit_code: String::new(),
            registered_owner: None,
            is_verified: false,
        })
        .collect();

    let fleet = store::get_fleet(&tx)?;
    let reconciled = reconcile(&extracted, &fleet);

    let statement_id = payload.statement.as_ref().map(|_| new_id());
    let expenses: Vec<ExpenseRecord> = payload
        .expenses
        .into_iter()
        .map(|line| ExpenseRecord {
            id: new_id(),
            statement_id: statement_id.clone(),
            date: line.date,
            concept: line.concept,
            amount: line.amount,
            category: line.category,
            source_file_id: Some(file.id.clone()),
            source_file_name: Some(file_name.clone()),
        })
        .collect();

    let statement = match (payload.statement, statement_id) {
        (Some(header), Some(id)) => Some(CardStatement {
            id,
            source_file_id: Some(file.id.clone()),
            bank: header.bank,
            holder: header.holder,
            period: header.period,
            due_date: header.due_date,
            total_billed: header.total_billed,
            total_tolls_detected: expenses.iter().map(|e| e.amount).sum(),
            created_at,
        }),
        _ => None,
    };

    store::put(&tx, &file)?;
    for record in &reconciled {
        store::put(&tx, record)?;
    }
    for expense in &expenses {
        store::put(&tx, expense)?;
    }
    if let Some(statement) = &statement {
        store::put(&tx, statement)?;
    }
    tx.commit()?;

    Ok(IngestResult {
        file_id: file.id,
        records: ReconcileSummary::of(&reconciled),
        expenses: expenses.len(),
        statement: statement.is_some(),
        duplicate_file: false,
    })
}

/// Re-run reconciliation over every stored record against the stored roster
/// and write the results back. No transaction of its own.
pub fn reconcile_stored_records(conn: &Connection) -> Result<ReconcileSummary> {
    let fleet = store::get_fleet(conn)?;
    let records: Vec<ExtractedRecord> = store::get_all(conn)?;
    let reconciled = reconcile(&records, &fleet);
    for record in &reconciled {
        store::put(conn, record)?;
    }
    set_setting(conn, LAST_RECONCILED_KEY, &now_millis().to_string())?;
    Ok(ReconcileSummary::of(&reconciled))
}

/// `reconcile_stored_records` inside its own immediate transaction.
pub fn rereconcile_all(conn: &mut Connection) -> Result<ReconcileSummary> {
    let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
    let summary = reconcile_stored_records(&tx)?;
    tx.commit()?;
    Ok(summary)
}
