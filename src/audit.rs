use rusqlite::Connection;

use crate::error::Result;
use crate::models::{new_id, now_millis, AuditAction, AuditEntry};
use crate::store;

/// Append an audit entry. Never fails the caller: errors go to the log.
pub fn record(conn: &Connection, user: &str, action: AuditAction, details: &str) {
    let entry = AuditEntry {
        id: new_id(),
        timestamp: now_millis(),
        user: user.to_string(),
        action,
        details: details.to_string(),
    };
    if let Err(e) = store::put(conn, &entry) {
        tracing::warn!(action = action.label(), error = %e, "audit entry not written");
    }
}

/// Most recent entries first.
pub fn recent(conn: &Connection, limit: usize) -> Result<Vec<AuditEntry>> {
    let mut entries: Vec<AuditEntry> = store::get_all(conn)?;
    entries.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
    entries.truncate(limit);
    Ok(entries)
}
