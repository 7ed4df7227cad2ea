use colored::Colorize;
use comfy_table::{Cell, Table};

use crate::cli::open_session;
use crate::error::Result;
use crate::fmt::money;
use crate::reports::{get_expense_breakdown, get_job_profitability};

pub fn jobs(user: Option<&str>) -> Result<()> {
    let session = open_session(user)?;
    let rows = get_job_profitability(&session.conn, session.user_id)?;

    let mut table = Table::new();
    table.set_header(vec!["Job", "Quoted", "Spent", "Expenses", "Margin", "Margin %"]);
    for r in rows {
        let margin = if r.margin_cents < 0 {
            money(r.margin_cents).red().to_string()
        } else {
            money(r.margin_cents).green().to_string()
        };
        table.add_row(vec![
            Cell::new(r.name),
            Cell::new(money(r.quoted_cents)),
            Cell::new(money(r.spent_cents)),
            Cell::new(r.expense_count),
            Cell::new(margin),
            Cell::new(
                r.margin_pct
                    .map(|p| format!("{p:.1}%"))
                    .unwrap_or_else(|| "\u{2014}".to_string()),
            ),
        ]);
    }
    println!("Job Profitability\n{table}");
    Ok(())
}

pub fn expenses(user: Option<&str>) -> Result<()> {
    let session = open_session(user)?;
    let b = get_expense_breakdown(&session.conn, session.user_id)?;

    let mut table = Table::new();
    table.set_header(vec!["Category", "Total", "Count", "%"]);
    for item in &b.categories {
        table.add_row(vec![
            Cell::new(&item.name),
            Cell::new(money(item.total_cents)),
            Cell::new(item.count),
            Cell::new(format!("{:.1}%", item.pct)),
        ]);
    }
    table.add_row(vec![
        Cell::new("TOTAL".bold()),
        Cell::new(money(b.total_cents).bold()),
        Cell::new(""),
        Cell::new(""),
    ]);
    println!("Expense Breakdown\n{table}");
    println!(
        "{} auto-categorized, {} set by you, {} uncategorized",
        b.auto_categorized, b.user_confirmed, b.uncategorized
    );
    Ok(())
}
