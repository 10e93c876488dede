use comfy_table::{Cell, Table};

use crate::db::get_connection;
use crate::error::Result;
use crate::kind::ALL_KINDS;
use crate::settings::load_settings;

pub fn run() -> Result<()> {
    let settings = load_settings();
    let db_path = settings.database_path();

    println!("Data dir:   {}", settings.data_dir);
    println!("Database:   {}", db_path.display());
    println!("Input:      {}", settings.input_path().display());
    println!("Archive:    {}", settings.archive_path().display());
    println!("Errors:     {}", settings.error_path().display());

    if !db_path.exists() {
        println!();
        println!("Database not found. Run `vasimport init` to set up.");
        return Ok(());
    }

    let conn = get_connection(&db_path)?;
    let mut table = Table::new();
    table.set_header(vec!["Kind", "Providers", "Completed", "Errors", "Transactions"]);
    for kind in ALL_KINDS {
        let providers = kind.provider_table();
        let count = |sql: &str| -> rusqlite::Result<i64> { conn.query_row(sql, [], |r| r.get(0)) };
        table.add_row(vec![
            Cell::new(kind.name()),
            Cell::new(count(&format!("SELECT count(*) FROM {providers}"))?),
            Cell::new(count(&format!(
                "SELECT count(*) FROM {providers} WHERE import_status = 'completed'"
            ))?),
            Cell::new(count(&format!(
                "SELECT count(*) FROM {providers} WHERE import_status = 'error'"
            ))?),
            Cell::new(count(&format!("SELECT count(*) FROM {}", kind.transaction_table()))?),
        ]);
    }
    let services: i64 = conn.query_row("SELECT count(*) FROM services", [], |r| r.get(0))?;
    let contracts: i64 = conn.query_row("SELECT count(*) FROM contracts", [], |r| r.get(0))?;
    let activity: i64 = conn.query_row("SELECT count(*) FROM activity_log", [], |r| r.get(0))?;

    println!();
    println!("{table}");
    println!("Services:   {services}");
    println!("Contracts:  {contracts}");
    println!("Activity:   {activity}");
    Ok(())
}
