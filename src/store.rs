use rusqlite::{Connection, OptionalExtension, TransactionBehavior};
use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::error::Result;
use crate::models::{
    AuditEntry, CardStatement, ExpenseRecord, ExtractedRecord, FleetEntry, UploadedFileRecord, User,
};
use crate::search::build_search_index;

/// A type persisted in one of the keyed collections.
pub trait Entity: Serialize + DeserializeOwned {
    const TABLE: &'static str;

    fn id(&self) -> &str;

    fn source_file_id(&self) -> Option<&str> {
        None
    }

    fn search_index(&self) -> String {
        String::new()
    }

    fn created_at(&self) -> i64 {
        0
    }
}

impl Entity for ExtractedRecord {
    const TABLE: &'static str = "records";

    fn id(&self) -> &str {
        &self.id
    }

    fn source_file_id(&self) -> Option<&str> {
        self.source_file_id.as_deref()
    }

    fn search_index(&self) -> String {
        build_search_index(self)
    }
}

impl Entity for ExpenseRecord {
    const TABLE: &'static str = "expenses";

    fn id(&self) -> &str {
        &self.id
    }

    fn source_file_id(&self) -> Option<&str> {
        self.source_file_id.as_deref()
    }

    fn search_index(&self) -> String {
        build_search_index(self)
    }
}

impl Entity for CardStatement {
    const TABLE: &'static str = "statements";

    fn id(&self) -> &str {
        &self.id
    }

    fn source_file_id(&self) -> Option<&str> {
        self.source_file_id.as_deref()
    }

    fn search_index(&self) -> String {
        build_search_index(self)
    }

    fn created_at(&self) -> i64 {
        self.created_at
    }
}

impl Entity for UploadedFileRecord {
    const TABLE: &'static str = "files";

    fn id(&self) -> &str {
        &self.id
    }

    fn created_at(&self) -> i64 {
        self.created_at
    }
}

impl Entity for User {
    const TABLE: &'static str = "users";

    fn id(&self) -> &str {
        &self.id
    }
}

impl Entity for AuditEntry {
    const TABLE: &'static str = "audit";

    fn id(&self) -> &str {
        &self.id
    }

    fn created_at(&self) -> i64 {
        self.timestamp
    }
}

/// Insert or replace by id. The search index is rebuilt on every write.
pub fn put<T: Entity>(conn: &Connection, entity: &T) -> Result<()> {
    let data = serde_json::to_string(entity)?;
    conn.prepare_cached(&format!(
        "INSERT OR REPLACE INTO {} (id, source_file_id, search_index, created_at, data) \
         VALUES (?1, ?2, ?3, ?4, ?5)",
        T::TABLE
    ))?
    .execute(rusqlite::params![
        entity.id(),
        entity.source_file_id(),
        entity.search_index(),
        entity.created_at(),
        data,
    ])?;
    Ok(())
}

fn decode_rows<T: DeserializeOwned>(table: &str, rows: Vec<String>) -> Vec<T> {
    rows.into_iter()
        .filter_map(|data| match serde_json::from_str(&data) {
            Ok(entity) => Some(entity),
            Err(e) => {
                tracing::warn!(table, error = %e, "skipping undecodable row");
                None
            }
        })
        .collect()
}

/// Every entity in the collection, in no particular order.
pub fn get_all<T: Entity>(conn: &Connection) -> Result<Vec<T>> {
    let mut stmt = conn.prepare(&format!("SELECT data FROM {}", T::TABLE))?;
    let rows = stmt
        .query_map([], |row| row.get(0))?
        .collect::<std::result::Result<Vec<String>, _>>()?;
    Ok(decode_rows(T::TABLE, rows))
}

pub fn get<T: Entity>(conn: &Connection, id: &str) -> Result<Option<T>> {
    let data: Option<String> = conn
        .query_row(
            &format!("SELECT data FROM {} WHERE id = ?1", T::TABLE),
            [id],
            |row| row.get(0),
        )
        .optional()?;
    Ok(data.and_then(|d| decode_rows(T::TABLE, vec![d]).pop()))
}

pub fn count<T: Entity>(conn: &Connection) -> Result<i64> {
    let n = conn.query_row(&format!("SELECT count(*) FROM {}", T::TABLE), [], |row| row.get(0))?;
    Ok(n)
}

/// Remove the given ids. Ids that are not present are ignored.
pub fn delete_by_ids<T: Entity>(conn: &Connection, ids: &[String]) -> Result<usize> {
    let mut stmt = conn.prepare_cached(&format!("DELETE FROM {} WHERE id = ?1", T::TABLE))?;
    let mut deleted = 0usize;
    for id in ids {
        deleted += stmt.execute([id])?;
    }
    Ok(deleted)
}

/// Entities whose search index contains the folded query.
pub fn search<T: Entity>(conn: &Connection, query: &str) -> Result<Vec<T>> {
    let needle = crate::search::fold(query.trim());
    let mut stmt = conn.prepare(&format!(
        "SELECT data FROM {} WHERE instr(search_index, ?1) > 0",
        T::TABLE
    ))?;
    let rows = stmt
        .query_map([needle], |row| row.get(0))?
        .collect::<std::result::Result<Vec<String>, _>>()?;
    Ok(decode_rows(T::TABLE, rows))
}

// ---------------------------------------------------------------------------
// Fleet roster
// ---------------------------------------------------------------------------

/// Roster in insertion order. Matching depends on this order.
pub fn get_fleet(conn: &Connection) -> Result<Vec<FleetEntry>> {
    let mut stmt = conn.prepare("SELECT data FROM fleet ORDER BY seq")?;
    let rows = stmt
        .query_map([], |row| row.get(0))?
        .collect::<std::result::Result<Vec<String>, _>>()?;
    Ok(decode_rows("fleet", rows))
}

/// Clear-then-insert without its own transaction; callers supply one.
pub(crate) fn write_fleet(conn: &Connection, entries: &[FleetEntry]) -> Result<()> {
    conn.execute("DELETE FROM fleet", [])?;
    let mut stmt = conn.prepare_cached("INSERT INTO fleet (data) VALUES (?1)")?;
    for entry in entries {
        stmt.execute([serde_json::to_string(entry)?])?;
    }
    Ok(())
}

/// Replace the whole roster. Rosters are never merged.
pub fn replace_fleet(conn: &mut Connection, entries: &[FleetEntry]) -> Result<()> {
    let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
    write_fleet(&tx, entries)?;
    tx.commit()?;
    Ok(())
}

// ---------------------------------------------------------------------------
// Cascading delete
// ---------------------------------------------------------------------------

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct CascadeResult {
    pub records: usize,
    pub expenses: usize,
    pub statements: usize,
    pub files: usize,
}

impl CascadeResult {
    pub fn total(&self) -> usize {
        self.records + self.expenses + self.statements + self.files
    }
}

/// Delete the files and everything whose `source_file_id` points at them.
/// All four collections commit together or not at all.
pub fn delete_files_and_dependents(conn: &mut Connection, file_ids: &[String]) -> Result<CascadeResult> {
    let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
    let mut result = CascadeResult::default();
    for id in file_ids {
        result.records += tx.execute("DELETE FROM records WHERE source_file_id = ?1", [id])?;
        result.expenses += tx.execute("DELETE FROM expenses WHERE source_file_id = ?1", [id])?;
        result.statements += tx.execute("DELETE FROM statements WHERE source_file_id = ?1", [id])?;
        result.files += tx.execute("DELETE FROM files WHERE id = ?1", [id])?;
    }
    tx.commit()?;
    tracing::debug!(?result, "cascading delete committed");
    Ok(result)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{get_connection, init_db};
    use crate::models::ExpenseCategory;

    fn test_db() -> (tempfile::TempDir, Connection) {
        let dir = tempfile::tempdir().unwrap();
        let conn = get_connection(&dir.path().join("test.db")).unwrap();
        init_db(&conn).unwrap();
        (dir, conn)
    }

    fn record(id: &str, file: Option<&str>) -> ExtractedRecord {
        ExtractedRecord {
            id: id.to_string(),
            plate: "AB123CD".to_string(),
            owner: "José Núñez".to_string(),
            amount: 10.0,
            concept: "Peaje".to_string(),
            date: None,
            tag: None,
            source_file_id: file.map(String::from),
            source_file_name: Some("scan.pdf".to_string()),
            unit_code: String::new(),
            registered_owner: None,
            is_verified: false,
            extracted: None,
        }
    }

    fn expense(id: &str, file: &str) -> ExpenseRecord {
        ExpenseRecord {
            id: id.to_string(),
            statement_id: Some("s1".to_string()),
            date: "2024-05-01".to_string(),
            concept: "Telepeaje".to_string(),
            amount: 2.5,
            category: ExpenseCategory::Toll,
            source_file_id: Some(file.to_string()),
            source_file_name: None,
        }
    }

    fn statement(id: &str, file: &str) -> CardStatement {
        CardStatement {
            id: id.to_string(),
            source_file_id: Some(file.to_string()),
            bank: "Banco Sur".to_string(),
            holder: "ACME".to_string(),
            period: "2024-05".to_string(),
            due_date: "2024-06-10".to_string(),
            total_billed: 100.0,
            total_tolls_detected: 5.0,
            created_at: 1,
        }
    }

    fn file(id: &str) -> UploadedFileRecord {
        UploadedFileRecord {
            id: id.to_string(),
            name: format!("{id}.pdf"),
            mime_type: "application/pdf".to_string(),
            size_bytes: 3,
            content_base64: "YWJj".to_string(),
            created_at: 1,
            checksum: None,
        }
    }

    fn fleet_entry(plate: &str) -> FleetEntry {
        FleetEntry {
            plate: plate.to_string(),
            owner: "ACME".to_string(),
            tag: None,
            unit_code: None,
        }
    }

    fn seed_file(conn: &Connection, id: &str) {
        put(conn, &file(id)).unwrap();
        for i in 0..3 {
            put(conn, &record(&format!("{id}-r{i}"), Some(id))).unwrap();
        }
        for i in 0..2 {
            put(conn, &expense(&format!("{id}-e{i}"), id)).unwrap();
        }
        put(conn, &statement(&format!("{id}-s"), id)).unwrap();
    }

    #[test]
    fn test_put_is_insert_or_replace() {
        let (_dir, conn) = test_db();
        let mut rec = record("r1", None);
        put(&conn, &rec).unwrap();
        put(&conn, &rec).unwrap();
        rec.amount = 99.0;
        put(&conn, &rec).unwrap();
        let all: Vec<ExtractedRecord> = get_all(&conn).unwrap();
        assert_eq!(all.len(), 1);
        assert_eq!(all[0].amount, 99.0);
    }

    #[test]
    fn test_get_by_id() {
        let (_dir, conn) = test_db();
        put(&conn, &record("r1", None)).unwrap();
        let found: Option<ExtractedRecord> = get(&conn, "r1").unwrap();
        assert_eq!(found.unwrap().id, "r1");
        let missing: Option<ExtractedRecord> = get(&conn, "nope").unwrap();
        assert!(missing.is_none());
    }

    #[test]
    fn test_delete_by_ids_ignores_missing() {
        let (_dir, conn) = test_db();
        put(&conn, &record("r1", None)).unwrap();
        put(&conn, &record("r2", None)).unwrap();
        let deleted = delete_by_ids::<ExtractedRecord>(&conn, &["r1".into(), "ghost".into()]).unwrap();
        assert_eq!(deleted, 1);
        assert_eq!(count::<ExtractedRecord>(&conn).unwrap(), 1);
    }

    #[test]
    fn test_search_index_rebuilt_on_overwrite() {
        let (_dir, conn) = test_db();
        let mut rec = record("r1", None);
        put(&conn, &rec).unwrap();
        assert_eq!(search::<ExtractedRecord>(&conn, "NUNEZ").unwrap().len(), 1);
        rec.owner = "Transportes Sur".to_string();
        put(&conn, &rec).unwrap();
        assert!(search::<ExtractedRecord>(&conn, "nunez").unwrap().is_empty());
        assert_eq!(search::<ExtractedRecord>(&conn, "transportes").unwrap().len(), 1);
    }

    #[test]
    fn test_search_folds_query_diacritics() {
        let (_dir, conn) = test_db();
        put(&conn, &record("r1", None)).unwrap();
        assert_eq!(search::<ExtractedRecord>(&conn, "José").unwrap().len(), 1);
    }

    #[test]
    fn test_undecodable_row_is_skipped() {
        let (_dir, conn) = test_db();
        put(&conn, &record("r1", None)).unwrap();
        conn.execute("INSERT INTO records (id, data) VALUES ('bad', 'not json')", []).unwrap();
        let all: Vec<ExtractedRecord> = get_all(&conn).unwrap();
        assert_eq!(all.len(), 1);
    }

    #[test]
    fn test_replace_fleet_leaves_no_residue() {
        let (_dir, mut conn) = test_db();
        replace_fleet(&mut conn, &[fleet_entry("AAA111"), fleet_entry("BBB222")]).unwrap();
        let fleet_b = vec![fleet_entry("CCC333")];
        replace_fleet(&mut conn, &fleet_b).unwrap();
        assert_eq!(get_fleet(&conn).unwrap(), fleet_b);
    }

    #[test]
    fn test_fleet_keeps_roster_order() {
        let (_dir, mut conn) = test_db();
        let roster: Vec<_> = ["ZZZ999", "AAA111", "MMM555"].iter().map(|p| fleet_entry(p)).collect();
        replace_fleet(&mut conn, &roster).unwrap();
        assert_eq!(get_fleet(&conn).unwrap(), roster);
    }

    #[test]
    fn test_undecodable_fleet_row_is_skipped_in_order() {
        let (_dir, mut conn) = test_db();
        replace_fleet(&mut conn, &[fleet_entry("AAA111")]).unwrap();
        conn.execute("INSERT INTO fleet (data) VALUES ('{broken')", []).unwrap();
        conn.execute(
            "INSERT INTO fleet (data) VALUES (?1)",
            [serde_json::to_string(&fleet_entry("BBB222")).unwrap()],
        )
        .unwrap();
        assert_eq!(get_fleet(&conn).unwrap(), vec![fleet_entry("AAA111"), fleet_entry("BBB222")]);
    }

    #[test]
    fn test_cascade_removes_all_dependents() {
        let (_dir, mut conn) = test_db();
        seed_file(&conn, "F");
        seed_file(&conn, "G");
        put(&conn, &record("loose", None)).unwrap();

        let result = delete_files_and_dependents(&mut conn, &["F".to_string()]).unwrap();
        assert_eq!(
            result,
            CascadeResult { records: 3, expenses: 2, statements: 1, files: 1 }
        );

        let records: Vec<ExtractedRecord> = get_all(&conn).unwrap();
        assert!(records.iter().all(|r| r.source_file_id.as_deref() != Some("F")));
        assert_eq!(records.len(), 4);
        let expenses: Vec<ExpenseRecord> = get_all(&conn).unwrap();
        assert!(expenses.iter().all(|e| e.source_file_id.as_deref() == Some("G")));
        let statements: Vec<CardStatement> = get_all(&conn).unwrap();
        assert_eq!(statements.len(), 1);
        let files: Vec<UploadedFileRecord> = get_all(&conn).unwrap();
        assert_eq!(files.len(), 1);
        assert_eq!(files[0].id, "G");
    }

    #[test]
    fn test_cascade_unknown_ids_is_noop() {
        let (_dir, mut conn) = test_db();
        seed_file(&conn, "F");
        let result = delete_files_and_dependents(&mut conn, &["nope".to_string()]).unwrap();
        assert_eq!(result.total(), 0);
        assert_eq!(count::<ExtractedRecord>(&conn).unwrap(), 3);
    }

    #[test]
    fn test_cascade_failure_rolls_back_everything() {
        let (_dir, mut conn) = test_db();
        seed_file(&conn, "F");
        conn.execute_batch("DROP TABLE statements;").unwrap();

        let err = delete_files_and_dependents(&mut conn, &["F".to_string()]);
        assert!(err.is_err());
        assert_eq!(count::<ExtractedRecord>(&conn).unwrap(), 3);
        assert_eq!(count::<ExpenseRecord>(&conn).unwrap(), 2);
        assert_eq!(count::<UploadedFileRecord>(&conn).unwrap(), 1);
    }
}
