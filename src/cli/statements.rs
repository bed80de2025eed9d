use comfy_table::{Cell, Table};

use crate::cli::open_db;
use crate::error::Result;
use crate::fmt::money;
use crate::models::ExpenseRecord;
use crate::snapshot;
use crate::store;

pub fn expenses(search: Option<&str>) -> Result<()> {
    let conn = open_db()?;
    let mut expenses: Vec<ExpenseRecord> = match search {
        Some(q) => store::search(&conn, q)?,
        None => store::get_all(&conn)?,
    };
    expenses.sort_by(|a, b| a.date.cmp(&b.date));

    let mut table = Table::new();
    table.set_header(vec!["Date", "Concept", "Category", "Amount", "File"]);
    for e in &expenses {
        table.add_row(vec![
            Cell::new(&e.date),
            Cell::new(&e.concept),
            Cell::new(e.category.label()),
            Cell::new(money(e.amount)),
            Cell::new(e.source_file_name.as_deref().unwrap_or_default()),
        ]);
    }
    let total: f64 = expenses.iter().map(|e| e.amount).sum();
    println!("Expenses ({} items, {})\n{table}", expenses.len(), money(total));
    Ok(())
}

pub fn statements() -> Result<()> {
    let conn = open_db()?;
    let snap = snapshot::load(&conn);

    let mut table = Table::new();
    table.set_header(vec!["Bank", "Holder", "Period", "Due", "Billed", "Tolls", "File"]);
    for s in &snap.statements {
        table.add_row(vec![
            Cell::new(&s.bank),
            Cell::new(&s.holder),
            Cell::new(&s.period),
            Cell::new(&s.due_date),
            Cell::new(money(s.total_billed)),
            Cell::new(money(s.total_tolls_detected)),
            Cell::new(snap.file_name(s.source_file_id.as_deref()).unwrap_or("(missing)")),
        ]);
    }
    println!("Card statements\n{table}");
    Ok(())
}
