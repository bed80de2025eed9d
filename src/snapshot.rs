use rusqlite::Connection;

use crate::error::Result;
use crate::models::{CardStatement, ExpenseRecord, ExtractedRecord, FleetEntry, UploadedFileRecord};
use crate::store;

/// Everything the reporting side reads, loaded in one pass.
#[derive(Debug, Default)]
pub struct Snapshot {
    pub records: Vec<ExtractedRecord>,
    pub expenses: Vec<ExpenseRecord>,
    /// Newest first.
    pub statements: Vec<CardStatement>,
    pub fleet: Vec<FleetEntry>,
    /// Newest first.
    pub files: Vec<UploadedFileRecord>,
}

fn or_empty<T>(what: &str, loaded: Result<Vec<T>>) -> Vec<T> {
    loaded.unwrap_or_else(|e| {
        tracing::warn!(collection = what, error = %e, "load failed, continuing with empty list");
        Vec::new()
    })
}

/// Load each collection independently. A collection that fails to load comes
/// back empty instead of failing the others.
pub fn load(conn: &Connection) -> Snapshot {
    let mut statements = or_empty("statements", store::get_all::<CardStatement>(conn));
    statements.sort_by(|a, b| b.created_at.cmp(&a.created_at));
    let mut files = or_empty("files", store::get_all::<UploadedFileRecord>(conn));
    files.sort_by(|a, b| b.created_at.cmp(&a.created_at));

    Snapshot {
        records: or_empty("records", store::get_all(conn)),
        expenses: or_empty("expenses", store::get_all(conn)),
        statements,
        fleet: or_empty("fleet", store::get_fleet(conn)),
        files,
    }
}

impl Snapshot {
    pub fn file_name(&self, file_id: Option<&str>) -> Option<&str> {
        let id = file_id?;
        self.files.iter().find(|f| f.id == id).map(|f| f.name.as_str())
    }

    /// Records whose source file no longer exists.
    pub fn orphaned_records(&self) -> Vec<&ExtractedRecord> {
        self.records
            .iter()
            .filter(|r| r.source_file_id.is_some() && self.file_name(r.source_file_id.as_deref()).is_none())
            .collect()
    }

    pub fn record_total(&self) -> f64 {
        self.records.iter().map(|r| r.amount).sum()
    }

    pub fn expense_total(&self) -> f64 {
        self.expenses.iter().map(|e| e.amount).sum()
    }
}
