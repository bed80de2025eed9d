use comfy_table::{Cell, Table};

use crate::audit;
use crate::cli::open_db;
use crate::error::Result;
use crate::models::{new_id, AuditAction, User};
use crate::settings::load_settings;
use crate::store;

pub fn add(username: &str, display_name: Option<&str>, role: &str) -> Result<()> {
    let conn = open_db()?;
    let user = User {
        id: new_id(),
        username: username.to_string(),
        display_name: display_name.unwrap_or(username).to_string(),
        role: role.to_string(),
    };
    store::put(&conn, &user)?;
    println!("Added user: {username}");
    audit::record(&conn, &load_settings().user_name, AuditAction::UserAdded, username);
    Ok(())
}

pub fn list() -> Result<()> {
    let conn = open_db()?;
    let mut users: Vec<User> = store::get_all(&conn)?;
    users.sort_by(|a, b| a.username.cmp(&b.username));

    let mut table = Table::new();
    table.set_header(vec!["Username", "Name", "Role"]);
    for u in users {
        table.add_row(vec![Cell::new(u.username), Cell::new(u.display_name), Cell::new(u.role)]);
    }
    println!("Users\n{table}");
    Ok(())
}
