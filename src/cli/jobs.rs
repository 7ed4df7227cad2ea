use comfy_table::{Cell, Table};

use crate::cli::open_session;
use crate::error::Result;
use crate::fmt::{money, parse_cents};
use crate::reports::{add_job, list_jobs};

pub fn add(user: Option<&str>, name: &str, quote: &str) -> Result<()> {
    let session = open_session(user)?;
    let job = add_job(&session.conn, session.user_id, name, parse_cents(quote)?)?;
    println!("Saved job: {} (quoted {})", job.name, money(job.quoted_amount_cents));
    Ok(())
}

pub fn list(user: Option<&str>) -> Result<()> {
    let session = open_session(user)?;
    let jobs = list_jobs(&session.conn, session.user_id)?;

    let mut table = Table::new();
    table.set_header(vec!["ID", "Name", "Quoted"]);
    for job in jobs {
        table.add_row(vec![
            Cell::new(job.id),
            Cell::new(job.name),
            Cell::new(money(job.quoted_amount_cents)),
        ]);
    }
    println!("Jobs\n{table}");
    Ok(())
}
