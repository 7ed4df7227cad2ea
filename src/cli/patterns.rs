use colored::Colorize;
use comfy_table::{Cell, Table};

use crate::cli::open_session;
use crate::corrections::list_patterns;
use crate::error::Result;

pub fn list(user: Option<&str>) -> Result<()> {
    let session = open_session(user)?;
    let rows = list_patterns(&session.conn, session.user_id, &session.settings.categorizer)?;

    let mut table = Table::new();
    table.set_header(vec!["Fragment", "Category", "Corrections", "Share", "Status"]);
    for row in rows {
        let status = if row.active {
            "learned".green().to_string()
        } else {
            "learning".dimmed().to_string()
        };
        table.add_row(vec![
            Cell::new(row.fragment),
            Cell::new(row.category_name),
            Cell::new(row.correction_count),
            Cell::new(format!("{}%", row.confidence)),
            Cell::new(status),
        ]);
    }
    println!("Learned patterns\n{table}");
    Ok(())
}
