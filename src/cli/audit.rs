use comfy_table::{Cell, Table};

use crate::audit::recent;
use crate::cli::open_db;
use crate::error::Result;
use crate::fmt::timestamp;

pub fn run(limit: usize) -> Result<()> {
    let conn = open_db()?;
    let entries = recent(&conn, limit)?;

    let mut table = Table::new();
    table.set_header(vec!["When", "User", "Action", "Details"]);
    for e in entries {
        table.add_row(vec![
            Cell::new(timestamp(e.timestamp)),
            Cell::new(e.user),
            Cell::new(e.action.label()),
            Cell::new(e.details),
        ]);
    }
    println!("Audit log\n{table}");
    Ok(())
}
