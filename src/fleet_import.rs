use std::collections::HashMap;
use std::path::Path;

use regex::Regex;
use rusqlite::{Connection, TransactionBehavior};

use crate::error::{LedgerError, Result};
use crate::ingest::reconcile_stored_records;
use crate::models::{FleetEntry, UNKNOWN_OWNER};
use crate::reconciler::ReconcileSummary;
use crate::store;

const PLATE_HEADER: &str = r"(?i)patente|placa|dominio|matr[ií]cula|plate";
const OWNER_HEADER: &str = r"(?i)propietario|due[ñn]o|titular|empresa|raz[óo]n social|owner";
const TAG_HEADER: &str = r"(?i)\btag\b|telepeaje|dispositivo|transponder";
const UNIT_HEADER: &str = r"(?i)unidad|interno|m[óo]vil|\bunit\b";

/// Which source column feeds each roster field.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct ColumnMap {
    pub plate: Option<String>,
    pub owner: Option<String>,
    pub tag: Option<String>,
    pub unit_code: Option<String>,
}

impl ColumnMap {
    pub fn is_usable(&self) -> bool {
        self.plate.is_some() || self.tag.is_some()
    }
}

fn header_regex(pattern: &str) -> Result<Regex> {
    Regex::new(pattern).map_err(|e| LedgerError::Other(format!("Bad header pattern: {e}")))
}

/// Guess the roster columns from spreadsheet headers. Each header is claimed
/// by at most one field; the tag pattern is tried before the unit pattern.
pub fn guess_columns(headers: &[String]) -> Result<ColumnMap> {
    let patterns = [
        header_regex(TAG_HEADER)?,
        header_regex(PLATE_HEADER)?,
        header_regex(OWNER_HEADER)?,
        header_regex(UNIT_HEADER)?,
    ];
    let mut claimed: Vec<Option<String>> = vec![None; patterns.len()];
    for header in headers {
        let slot = patterns
            .iter()
            .enumerate()
            .find(|(i, re)| claimed[*i].is_none() && re.is_match(header.trim()));
        if let Some((i, _)) = slot {
            claimed[i] = Some(header.clone());
        }
    }
    let [tag, plate, owner, unit_code]: [Option<String>; 4] = claimed
        .try_into()
        .map_err(|_| LedgerError::Other("column map size mismatch".to_string()))?;
    Ok(ColumnMap { plate, owner, tag, unit_code })
}

fn cell(row: &HashMap<String, String>, column: &Option<String>) -> Option<String> {
    column
        .as_ref()
        .and_then(|c| row.get(c))
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

/// Map one generic spreadsheet row to a roster entry. Rows with neither a
/// plate nor a tag carry nothing to match on and are dropped.
pub fn map_row(row: &HashMap<String, String>, columns: &ColumnMap) -> Option<FleetEntry> {
    let plate = cell(row, &columns.plate);
    let tag = cell(row, &columns.tag);
    if plate.is_none() && tag.is_none() {
        return None;
    }
    Some(FleetEntry {
        plate: plate.unwrap_or_default(),
        owner: cell(row, &columns.owner).unwrap_or_else(|| UNKNOWN_OWNER.to_string()),
        tag,
        unit_code: cell(row, &columns.unit_code),
    })
}

pub struct SheetRows {
    pub headers: Vec<String>,
    pub rows: Vec<HashMap<String, String>>,
}

fn read_csv(file_path: &Path) -> Result<SheetRows> {
    let file = std::fs::File::open(file_path)?;
    let mut rdr = csv::ReaderBuilder::new()
        .flexible(true)
        .from_reader(std::io::BufReader::new(file));
    let headers: Vec<String> = rdr.headers()?.iter().map(|h| h.trim().to_string()).collect();
    let mut rows = Vec::new();
    for result in rdr.records() {
        let Ok(record) = result else { continue };
        let row: HashMap<String, String> = headers
            .iter()
            .cloned()
            .zip(record.iter().map(String::from))
            .collect();
        rows.push(row);
    }
    Ok(SheetRows { headers, rows })
}

#[cfg(feature = "xlsx")]
fn read_xlsx(file_path: &Path) -> Result<SheetRows> {
    use calamine::{Data, Reader};

    let mut workbook = calamine::open_workbook_auto(file_path)
        .map_err(|e| LedgerError::Other(format!("Failed to open spreadsheet: {e}")))?;
    let Some(sheet) = workbook.sheet_names().first().cloned() else {
        return Ok(SheetRows { headers: Vec::new(), rows: Vec::new() });
    };
    let range = workbook
        .worksheet_range(&sheet)
        .map_err(|e| LedgerError::Other(format!("Failed to read sheet {sheet}: {e}")))?;

    let text = |d: &Data| -> String {
        match d {
            Data::String(s) => s.trim().to_string(),
            Data::Float(f) if f.fract() == 0.0 => format!("{}", *f as i64),
            Data::Float(f) => f.to_string(),
            Data::Int(i) => i.to_string(),
            Data::Bool(b) => b.to_string(),
            _ => String::new(),
        }
    };

    let mut iter = range.rows();
    let headers: Vec<String> = iter.next().map(|r| r.iter().map(text).collect()).unwrap_or_default();
    let rows: Vec<HashMap<String, String>> = iter
        .map(|r| headers.iter().cloned().zip(r.iter().map(text)).collect())
        .collect();
    Ok(SheetRows { headers, rows })
}

pub fn read_rows(file_path: &Path) -> Result<SheetRows> {
    let ext = file_path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase())
        .unwrap_or_default();
    match ext.as_str() {
        "csv" | "txt" => read_csv(file_path),
        #[cfg(feature = "xlsx")]
        "xlsx" | "xls" | "ods" => read_xlsx(file_path),
        other => Err(LedgerError::UnknownFormat(other.to_string())),
    }
}

pub struct FleetImportResult {
    pub entries: usize,
    pub skipped: usize,
    pub reconciled: ReconcileSummary,
}

/// Replace the roster from a spreadsheet and re-reconcile every stored record
/// against it, in one transaction.
pub fn import_fleet(conn: &mut Connection, file_path: &Path) -> Result<FleetImportResult> {
    let sheet = read_rows(file_path)?;
    let columns = guess_columns(&sheet.headers)?;
    if !columns.is_usable() {
        return Err(LedgerError::UnknownFormat(format!(
            "no plate or tag column in {}",
            sheet.headers.join(", ")
        )));
    }
    tracing::debug!(?columns, "fleet columns guessed");

    let entries: Vec<FleetEntry> = sheet.rows.iter().filter_map(|r| map_row(r, &columns)).collect();
    let skipped = sheet.rows.len() - entries.len();

    let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
    store::write_fleet(&tx, &entries)?;
    let reconciled = reconcile_stored_records(&tx)?;
    tx.commit()?;

    Ok(FleetImportResult {
        entries: entries.len(),
        skipped,
        reconciled,
    })
}
