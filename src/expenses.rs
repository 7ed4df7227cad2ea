use rusqlite::{Connection, OptionalExtension, Row};
use tracing::debug;

use crate::categorizer::{categorize_expense, CategoryMatch, ExpenseInput};
use crate::error::{CoraError, Result};
use crate::models::{Expense, ExpenseSource};
use crate::settings::CategorizerConfig;

#[derive(Debug, Clone)]
pub struct NewExpense {
    pub vendor: String,
    pub description: String,
    pub amount_cents: i64,
    pub currency: String,
    pub job_name: Option<String>,
    pub expense_date: String,
    pub source: ExpenseSource,
}

impl NewExpense {
    pub fn new(vendor: &str, description: &str, amount_cents: i64) -> Self {
        Self {
            vendor: vendor.trim().to_string(),
            description: description.trim().to_string(),
            amount_cents,
            currency: "USD".to_string(),
            job_name: None,
            expense_date: chrono::Local::now().format("%Y-%m-%d").to_string(),
            source: ExpenseSource::Manual,
        }
    }

    fn as_input(&self) -> ExpenseInput<'_> {
        ExpenseInput {
            vendor: &self.vendor,
            description: &self.description,
            amount_cents: self.amount_cents,
        }
    }
}

fn normalize_currency(code: &str) -> Result<String> {
    let code = code.trim().to_ascii_uppercase();
    if code.len() != 3 || !code.chars().all(|c| c.is_ascii_alphabetic()) {
        return Err(CoraError::InputValidation(format!(
            "currency must be a three-letter code, got {code:?}"
        )));
    }
    Ok(code)
}

fn validate_date(date: &str) -> Result<()> {
    chrono::NaiveDate::parse_from_str(date, "%Y-%m-%d")
        .map(|_| ())
        .map_err(|_| CoraError::InputValidation(format!("date must be YYYY-MM-DD, got {date:?}")))
}

const EXPENSE_COLUMNS: &str = "e.id, e.user_id, e.amount_cents, e.currency, e.vendor, e.description, \
     e.category_id, c.name, e.confidence_score, e.auto_categorized, e.job_name, e.expense_date, \
     e.source, e.created_at, e.updated_at";

fn expense_from_row(row: &Row) -> rusqlite::Result<Expense> {
    let source: String = row.get(12)?;
    Ok(Expense {
        id: row.get(0)?,
        user_id: row.get(1)?,
        amount_cents: row.get(2)?,
        currency: row.get(3)?,
        vendor: row.get(4)?,
        description: row.get(5)?,
        category_id: row.get(6)?,
        category_name: row.get(7)?,
        confidence_score: row.get(8)?,
        auto_categorized: row.get(9)?,
        job_name: row.get(10)?,
        expense_date: row.get(11)?,
        source: ExpenseSource::from_key(&source).unwrap_or(ExpenseSource::Manual),
        created_at: row.get(13)?,
        updated_at: row.get(14)?,
    })
}

/// Validate, insert and categorize a new expense in one transaction.
/// Malformed input is rejected before anything is written.
pub fn create_expense(
    conn: &Connection,
    user_id: i64,
    new: &NewExpense,
    config: &CategorizerConfig,
) -> Result<Expense> {
    let tx = conn.unchecked_transaction()?;
    let (id, _) = insert_expense(&tx, user_id, new, None, config)?;
    tx.commit()?;
    get_expense(conn, user_id, id)
}

/// Validate, insert and categorize without opening a transaction, so bulk
/// callers can group many rows under one.
pub(crate) fn insert_expense(
    conn: &Connection,
    user_id: i64,
    new: &NewExpense,
    import_id: Option<i64>,
    config: &CategorizerConfig,
) -> Result<(i64, Option<CategoryMatch>)> {
    new.as_input().validate()?;
    let currency = normalize_currency(&new.currency)?;
    validate_date(&new.expense_date)?;
    let job_name = new
        .job_name
        .as_deref()
        .map(str::trim)
        .filter(|j| !j.is_empty());

    conn.execute(
        "INSERT INTO expenses (user_id, amount_cents, currency, vendor, description, job_name, \
         expense_date, source, import_id) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
        rusqlite::params![
            user_id,
            new.amount_cents,
            currency,
            new.vendor,
            new.description,
            job_name,
            new.expense_date,
            new.source.key(),
            import_id,
        ],
    )?;
    let id = conn.last_insert_rowid();
    let result = categorize_expense(conn, user_id, id, config)?;

    debug!(expense_id = id, matched = result.is_some(), "created expense");
    Ok((id, result))
}

pub fn get_expense(conn: &Connection, user_id: i64, id: i64) -> Result<Expense> {
    let sql = format!(
        "SELECT {EXPENSE_COLUMNS} FROM expenses e \
         LEFT JOIN expense_categories c ON e.category_id = c.id \
         WHERE e.id = ?1 AND e.user_id = ?2"
    );
    conn.query_row(&sql, [id, user_id], expense_from_row)
        .optional()?
        .ok_or(CoraError::UnknownExpense(id))
}

#[derive(Debug, Clone, Default)]
pub struct ExpenseFilter {
    pub uncategorized_only: bool,
    pub job_name: Option<String>,
    pub limit: Option<usize>,
}

pub fn list_expenses(conn: &Connection, user_id: i64, filter: &ExpenseFilter) -> Result<Vec<Expense>> {
    let mut sql = format!(
        "SELECT {EXPENSE_COLUMNS} FROM expenses e \
         LEFT JOIN expense_categories c ON e.category_id = c.id \
         WHERE e.user_id = ?1"
    );
    if filter.uncategorized_only {
        sql.push_str(" AND e.category_id IS NULL");
    }
    if filter.job_name.is_some() {
        sql.push_str(" AND e.job_name = ?2");
    }
    sql.push_str(" ORDER BY e.expense_date DESC, e.id DESC");
    if let Some(limit) = filter.limit {
        sql.push_str(&format!(" LIMIT {limit}"));
    }

    let mut stmt = conn.prepare(&sql)?;
    let rows = match &filter.job_name {
        Some(job) => stmt
            .query_map(rusqlite::params![user_id, job], expense_from_row)?
            .collect::<std::result::Result<Vec<_>, _>>()?,
        None => stmt
            .query_map([user_id], expense_from_row)?
            .collect::<std::result::Result<Vec<_>, _>>()?,
    };
    Ok(rows)
}
