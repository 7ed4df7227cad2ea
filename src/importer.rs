use std::path::Path;

use rusqlite::Connection;
use sha2::{Digest, Sha256};
use tracing::warn;

use crate::error::{CoraError, Result};
use crate::expenses::{insert_expense, NewExpense};
use crate::fmt::parse_cents;
use crate::models::{ExpenseSource, ParsedRow};
use crate::settings::CategorizerConfig;

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// Accepts `YYYY-MM-DD` or `MM/DD/YYYY`, returns `YYYY-MM-DD`.
pub fn parse_date(raw: &str) -> Option<String> {
    let raw = raw.trim();
    if let Ok(d) = chrono::NaiveDate::parse_from_str(raw, "%Y-%m-%d") {
        return Some(d.format("%Y-%m-%d").to_string());
    }
    let parts: Vec<&str> = raw.split('/').collect();
    if parts.len() != 3 {
        return None;
    }
    let m: u32 = parts[0].parse().ok()?;
    let d: u32 = parts[1].parse().ok()?;
    let y: i32 = parts[2].parse().ok()?;
    chrono::NaiveDate::from_ymd_opt(y, m, d).map(|dt| dt.format("%Y-%m-%d").to_string())
}

fn compute_checksum(file_path: &Path) -> Result<String> {
    let data = std::fs::read(file_path)?;
    let mut hasher = Sha256::new();
    hasher.update(&data);
    Ok(hex::encode(hasher.finalize()))
}

fn is_duplicate_row(conn: &Connection, user_id: i64, row: &ParsedRow) -> Result<bool> {
    let mut stmt = conn.prepare_cached(
        "SELECT 1 FROM expenses WHERE user_id = ?1 AND expense_date = ?2 AND amount_cents = ?3 \
         AND vendor = ?4 AND description = ?5",
    )?;
    Ok(stmt.exists(rusqlite::params![
        user_id,
        row.date,
        row.amount_cents,
        row.vendor,
        row.description
    ])?)
}

// ---------------------------------------------------------------------------
// Parser
// ---------------------------------------------------------------------------

pub struct ParseOutcome {
    pub rows: Vec<ParsedRow>,
    pub invalid: usize,
}

/// Parse a `date,vendor,description,amount[,job]` CSV. Header names are
/// matched case-insensitively so column order is free.
pub fn parse_expense_csv(file_path: &Path) -> Result<ParseOutcome> {
    let file = std::fs::File::open(file_path)?;
    let mut rdr = csv::ReaderBuilder::new()
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(std::io::BufReader::new(file));

    let headers: Vec<String> = rdr.headers()?.iter().map(|h| h.to_lowercase()).collect();
    let col = |name: &str| headers.iter().position(|h| h == name);
    let (Some(date_col), Some(desc_col), Some(amount_col)) =
        (col("date"), col("description"), col("amount"))
    else {
        return Err(CoraError::Other(
            "CSV must have date, description and amount columns".to_string(),
        ));
    };
    let vendor_col = col("vendor");
    let job_col = col("job");

    let mut rows = Vec::new();
    let mut invalid = 0usize;
    for (line, result) in rdr.records().enumerate() {
        let record = result?;
        let field = |i: Option<usize>| i.and_then(|i| record.get(i)).unwrap_or("").to_string();

        let Some(date) = parse_date(&field(Some(date_col))) else {
            warn!(line = line + 2, "skipping row with unparseable date");
            invalid += 1;
            continue;
        };
        let amount_cents = match parse_cents(&field(Some(amount_col))) {
            Ok(c) => c.abs(),
            Err(e) => {
                warn!(line = line + 2, error = %e, "skipping row with bad amount");
                invalid += 1;
                continue;
            }
        };
        let job = field(job_col);
        rows.push(ParsedRow {
            date,
            vendor: field(vendor_col),
            description: field(Some(desc_col)),
            amount_cents,
            job_name: if job.is_empty() { None } else { Some(job) },
        });
    }
    Ok(ParseOutcome { rows, invalid })
}

// ---------------------------------------------------------------------------
// import_file
// ---------------------------------------------------------------------------

pub struct ImportResult {
    pub imported: usize,
    pub skipped: usize,
    pub invalid: usize,
    pub categorized: usize,
    pub duplicate_file: bool,
}

pub fn import_file(
    conn: &Connection,
    user_id: i64,
    file_path: &Path,
    config: &CategorizerConfig,
) -> Result<ImportResult> {
    let checksum = compute_checksum(file_path)?;
    {
        let mut stmt = conn.prepare("SELECT 1 FROM imports WHERE checksum = ?1 AND user_id = ?2")?;
        if stmt.exists(rusqlite::params![checksum, user_id])? {
            return Ok(ImportResult {
                imported: 0,
                skipped: 0,
                invalid: 0,
                categorized: 0,
                duplicate_file: true,
            });
        }
    }

    let ParseOutcome { rows, mut invalid } = parse_expense_csv(file_path)?;

    // The checksum row and every expense commit together, so a failed import
    // can simply be retried.
    let tx = conn.unchecked_transaction()?;
    tx.execute(
        "INSERT INTO imports (user_id, filename, record_count, checksum) VALUES (?1, ?2, ?3, ?4)",
        rusqlite::params![
            user_id,
            file_path.file_name().and_then(|n| n.to_str()).unwrap_or(""),
            rows.len() as i64,
            checksum,
        ],
    )?;
    let import_id = tx.last_insert_rowid();

    let mut imported = 0usize;
    let mut skipped = 0usize;
    let mut categorized = 0usize;
    for row in &rows {
        if row.amount_cents == 0 {
            invalid += 1;
            continue;
        }
        if is_duplicate_row(&tx, user_id, row)? {
            skipped += 1;
            continue;
        }
        let new = NewExpense {
            vendor: row.vendor.clone(),
            description: row.description.clone(),
            amount_cents: row.amount_cents,
            currency: "USD".to_string(),
            job_name: row.job_name.clone(),
            expense_date: row.date.clone(),
            source: ExpenseSource::BankImport,
        };
        match insert_expense(&tx, user_id, &new, Some(import_id), config) {
            Ok((_, matched)) => {
                if matched.is_some() {
                    categorized += 1;
                }
                imported += 1;
            }
            Err(CoraError::InputValidation(msg)) => {
                warn!(date = %row.date, vendor = %row.vendor, reason = %msg, "skipping invalid row");
                invalid += 1;
            }
            Err(e) => return Err(e),
        }
    }
    tx.commit()?;

    Ok(ImportResult {
        imported,
        skipped,
        invalid,
        categorized,
        duplicate_file: false,
    })
}
