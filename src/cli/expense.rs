use colored::Colorize;
use comfy_table::{Cell, Table};

use crate::cli::open_session;
use crate::corrections::{record_correction, CategoryRef};
use crate::error::{CoraError, Result};
use crate::expenses::{create_expense, get_expense, list_expenses, ExpenseFilter, NewExpense};
use crate::fmt::{money, parse_cents};
use crate::models::{Expense, ExpenseSource};

fn category_label(e: &Expense) -> String {
    match (&e.category_name, e.confidence_score) {
        (Some(name), Some(score)) if e.auto_categorized => format!("{name} ({score}%)"),
        (Some(name), _) => name.clone(),
        (None, _) => "\u{2014}".to_string(),
    }
}

#[allow(clippy::too_many_arguments)]
pub fn add(
    user: Option<&str>,
    description: &str,
    amount: &str,
    vendor: &str,
    currency: &str,
    job: Option<&str>,
    date: Option<&str>,
    source: &str,
) -> Result<()> {
    let session = open_session(user)?;
    let source = ExpenseSource::from_key(source)
        .ok_or_else(|| CoraError::InputValidation(format!("unknown source: {source}")))?;

    let mut new = NewExpense::new(vendor, description, parse_cents(amount)?);
    new.currency = currency.to_string();
    new.job_name = job.map(str::to_string);
    new.source = source;
    if let Some(d) = date {
        new.expense_date = d.to_string();
    }

    let expense = create_expense(
        &session.conn,
        session.user_id,
        &new,
        &session.settings.categorizer,
    )?;

    println!("Added expense {}: {}", expense.id, money(expense.amount_cents));
    match (&expense.category_name, expense.confidence_score) {
        (Some(name), Some(score)) => {
            println!("Category: {} ({score}% confidence)", name.green());
        }
        _ => {
            println!(
                "{}",
                format!(
                    "No confident category. Set one with `cora expense correct {} --category <name>`.",
                    expense.id
                )
                .yellow()
            );
        }
    }
    Ok(())
}

pub fn list(user: Option<&str>, uncategorized: bool, job: Option<String>, limit: Option<usize>) -> Result<()> {
    let session = open_session(user)?;
    let filter = ExpenseFilter {
        uncategorized_only: uncategorized,
        job_name: job,
        limit,
    };
    let expenses = list_expenses(&session.conn, session.user_id, &filter)?;

    let mut table = Table::new();
    table.set_header(vec!["ID", "Date", "Vendor", "Description", "Amount", "Category", "Job"]);
    for e in &expenses {
        table.add_row(vec![
            Cell::new(e.id),
            Cell::new(&e.expense_date),
            Cell::new(&e.vendor),
            Cell::new(&e.description),
            Cell::new(format!("{} {}", money(e.amount_cents), e.currency)),
            Cell::new(category_label(e)),
            Cell::new(e.job_name.clone().unwrap_or_default()),
        ]);
    }
    println!("Expenses\n{table}");
    Ok(())
}

pub fn show(user: Option<&str>, id: i64) -> Result<()> {
    let session = open_session(user)?;
    let e = get_expense(&session.conn, session.user_id, id)?;

    println!("Expense {}", e.id);
    println!("  Date:        {}", e.expense_date);
    println!("  Vendor:      {}", e.vendor);
    println!("  Description: {}", e.description);
    println!("  Amount:      {} {}", money(e.amount_cents), e.currency);
    println!("  Category:    {}", category_label(&e));
    println!(
        "  Assigned by: {}",
        match (e.category_id, e.auto_categorized) {
            (None, _) => "nobody yet",
            (Some(_), true) => "auto-categorizer",
            (Some(_), false) => "you",
        }
    );
    println!("  Job:         {}", e.job_name.as_deref().unwrap_or("\u{2014}"));
    println!("  Source:      {}", e.source.key());
    println!("  Updated:     {}", e.updated_at);
    Ok(())
}

pub fn correct(user: Option<&str>, id: i64, category: &str) -> Result<()> {
    let session = open_session(user)?;
    let target = match category.parse::<i64>() {
        Ok(category_id) => CategoryRef::Id(category_id),
        Err(_) => CategoryRef::Name(category),
    };
    let result = record_correction(
        &session.conn,
        session.user_id,
        id,
        target,
        &session.settings.categorizer,
    )?;
    println!("Expense {id} \u{2192} {category}");
    if result.learned {
        println!(
            "{}",
            format!(
                "New expenses matching '{}' will be filed under {category} automatically.",
                result.fragment
            )
            .green()
        );
    } else {
        println!(
            "'{}': {} correction(s), {}% toward this category",
            result.fragment, result.correction_count, result.confidence
        );
    }
    Ok(())
}
