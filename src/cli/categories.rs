use comfy_table::{Cell, Table};

use crate::cli::open_session;
use crate::db::get_categories;
use crate::error::Result;

pub fn list(user: Option<&str>) -> Result<()> {
    let session = open_session(user)?;
    let categories = get_categories(&session.conn)?;

    let mut table = Table::new();
    table.set_header(vec!["ID", "Name", "Icon", "Description"]);
    for cat in categories {
        table.add_row(vec![
            Cell::new(cat.id),
            Cell::new(cat.name),
            Cell::new(cat.icon),
            Cell::new(cat.description),
        ]);
    }
    println!("Categories\n{table}");
    Ok(())
}
