use serde::{Deserialize, Serialize};

/// Owner value the fleet importer writes when a roster row has no owner.
pub const UNKNOWN_OWNER: &str = "Desconocido";

fn unknown_owner() -> String {
    UNKNOWN_OWNER.to_string()
}

/// One row of the authoritative fleet roster.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FleetEntry {
    #[serde(default)]
    pub plate: String,
    #[serde(default = "unknown_owner")]
    pub owner: String,
    #[serde(default)]
    pub tag: Option<String>,
    #[serde(default)]
    pub unit_code: Option<String>,
}

/// Identifiers exactly as the extractor read them. The reconciler overwrites
/// the record's own `plate`, `owner` and `tag` with roster values, so every
/// pass starts again from these.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExtractedIdentity {
    #[serde(default)]
    pub plate: String,
    #[serde(default)]
    pub owner: String,
    #[serde(default)]
    pub tag: Option<String>,
}

/// A toll/freight line item produced by the extraction service.
///
/// `unit_code`, `registered_owner` and `is_verified` are written by the
/// reconciler; extraction output leaves them at their defaults.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExtractedRecord {
    pub id: String,
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
    #[serde(default)]
    pub source_file_id: Option<String>,
    #[serde(default)]
    pub source_file_name: Option<String>,
    #[serde(default)]
    pub unit_code: String,
    #[serde(default)]
    pub registered_owner: Option<String>,
    #[serde(default)]
    pub is_verified: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub extracted: Option<ExtractedIdentity>,
}

impl ExtractedRecord {
    /// The extractor's identifiers. Rows stored before these were kept fall
    /// back to the current values.
    pub fn extracted_identity(&self) -> ExtractedIdentity {
        self.extracted.clone().unwrap_or_else(|| ExtractedIdentity {
            plate: self.plate.clone(),
            owner: self.owner.clone(),
            tag: self.tag.clone(),
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExpenseCategory {
    Toll,
    Fuel,
    Maintenance,
    Fees,
    #[serde(other)]
    Other,
}

impl Default for ExpenseCategory {
    fn default() -> Self {
        Self::Other
    }
}

impl ExpenseCategory {
    pub fn label(&self) -> &'static str {
        match self {
            Self::Toll => "toll",
            Self::Fuel => "fuel",
            Self::Maintenance => "maintenance",
            Self::Fees => "fees",
            Self::Other => "other",
        }
    }
}

/// A toll/card line item from a bank statement. Never reconciled against the fleet.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExpenseRecord {
    pub id: String,
    #[serde(default)]
    pub statement_id: Option<String>,
    #[serde(default)]
    pub date: String,
    #[serde(default)]
    pub concept: String,
    #[serde(default)]
    pub amount: f64,
    #[serde(default)]
    pub category: ExpenseCategory,
    #[serde(default)]
    pub source_file_id: Option<String>,
    #[serde(default)]
    pub source_file_name: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CardStatement {
    pub id: String,
    #[serde(default)]
    pub source_file_id: Option<String>,
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
    #[serde(default)]
    pub total_tolls_detected: f64,
    #[serde(default)]
    pub created_at: i64,
}

/// The original uploaded document. Root of cascading deletion.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadedFileRecord {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub mime_type: String,
    #[serde(default)]
    pub size_bytes: u64,
    #[serde(default)]
    pub content_base64: String,
    #[serde(default)]
    pub created_at: i64,
    #[serde(default)]
    pub checksum: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: String,
    pub username: String,
    #[serde(default)]
    pub display_name: String,
    #[serde(default)]
    pub role: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuditAction {
    DocumentIngested,
    FleetReplaced,
    RecordsReconciled,
    RecordsDeleted,
    FilesDeleted,
    UserAdded,
    #[serde(other)]
    Other,
}

impl AuditAction {
    pub fn label(&self) -> &'static str {
        match self {
            Self::DocumentIngested => "document_ingested",
            Self::FleetReplaced => "fleet_replaced",
            Self::RecordsReconciled => "records_reconciled",
            Self::RecordsDeleted => "records_deleted",
            Self::FilesDeleted => "files_deleted",
            Self::UserAdded => "user_added",
            Self::Other => "other",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuditEntry {
    pub id: String,
    pub timestamp: i64,
    #[serde(default)]
    pub user: String,
    pub action: AuditAction,
    #[serde(default)]
    pub details: String,
}

pub fn new_id() -> String {
    uuid::Uuid::new_v4().to_string()
}

pub fn now_millis() -> i64 {
    chrono::Utc::now().timestamp_millis()
}
