use rusqlite::Connection;

use crate::error::{CoraError, Result};
use crate::models::Job;

// ---------------------------------------------------------------------------
// Jobs
// ---------------------------------------------------------------------------

pub fn add_job(conn: &Connection, user_id: i64, name: &str, quoted_amount_cents: i64) -> Result<Job> {
    let name = name.trim();
    if name.is_empty() {
        return Err(CoraError::InputValidation("job name is required".to_string()));
    }
    if quoted_amount_cents < 0 {
        return Err(CoraError::InputValidation("quoted amount cannot be negative".to_string()));
    }
    conn.execute(
        "INSERT INTO jobs (user_id, name, quoted_amount_cents) VALUES (?1, ?2, ?3) \
         ON CONFLICT (user_id, name) DO UPDATE SET quoted_amount_cents = excluded.quoted_amount_cents",
        rusqlite::params![user_id, name, quoted_amount_cents],
    )?;
    let id = conn.query_row(
        "SELECT id FROM jobs WHERE user_id = ?1 AND name = ?2",
        rusqlite::params![user_id, name],
        |r| r.get(0),
    )?;
    Ok(Job {
        id,
        name: name.to_string(),
        quoted_amount_cents,
    })
}

pub fn list_jobs(conn: &Connection, user_id: i64) -> Result<Vec<Job>> {
    let mut stmt =
        conn.prepare("SELECT id, name, quoted_amount_cents FROM jobs WHERE user_id = ?1 ORDER BY name")?;
    let rows = stmt
        .query_map([user_id], |row| {
            Ok(Job {
                id: row.get(0)?,
                name: row.get(1)?,
                quoted_amount_cents: row.get(2)?,
            })
        })?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(rows)
}

// ---------------------------------------------------------------------------
// Job profitability
// ---------------------------------------------------------------------------

pub struct JobProfitability {
    pub name: String,
    pub quoted_cents: i64,
    pub spent_cents: i64,
    pub expense_count: i64,
    pub margin_cents: i64,
    /// Margin as a share of the quote; `None` for unquoted jobs.
    pub margin_pct: Option<f64>,
}

pub fn get_job_profitability(conn: &Connection, user_id: i64) -> Result<Vec<JobProfitability>> {
    let mut stmt = conn.prepare(
        "SELECT j.name, j.quoted_amount_cents, COALESCE(SUM(e.amount_cents), 0), COUNT(e.id) \
         FROM jobs j \
         LEFT JOIN expenses e ON e.user_id = j.user_id AND e.job_name = j.name \
         WHERE j.user_id = ?1 \
         GROUP BY j.id ORDER BY j.name",
    )?;
    let rows = stmt
        .query_map([user_id], |row| {
            let quoted: i64 = row.get(1)?;
            let spent: i64 = row.get(2)?;
            let margin = quoted - spent;
            Ok(JobProfitability {
                name: row.get(0)?,
                quoted_cents: quoted,
                spent_cents: spent,
                expense_count: row.get(3)?,
                margin_cents: margin,
                margin_pct: if quoted != 0 {
                    Some(margin as f64 / quoted as f64 * 100.0)
                } else {
                    None
                },
            })
        })?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(rows)
}

// ---------------------------------------------------------------------------
// Expense Breakdown
// ---------------------------------------------------------------------------

pub struct ExpenseItem {
    pub name: String,
    pub total_cents: i64,
    pub count: i64,
    pub pct: f64,
}

pub struct ExpenseBreakdown {
    pub categories: Vec<ExpenseItem>,
    pub total_cents: i64,
    pub auto_categorized: i64,
    pub user_confirmed: i64,
    pub uncategorized: i64,
}

pub fn get_expense_breakdown(conn: &Connection, user_id: i64) -> Result<ExpenseBreakdown> {
    let mut stmt = conn.prepare(
        "SELECT COALESCE(c.name, 'Uncategorized'), SUM(e.amount_cents) AS total, COUNT(*) \
         FROM expenses e LEFT JOIN expense_categories c ON e.category_id = c.id \
         WHERE e.user_id = ?1 \
         GROUP BY c.name ORDER BY total DESC",
    )?;
    let raw: Vec<(String, i64, i64)> = stmt
        .query_map([user_id], |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)))?
        .collect::<std::result::Result<Vec<_>, _>>()?;

    let total_cents: i64 = raw.iter().map(|(_, t, _)| t).sum();
    let categories = raw
        .into_iter()
        .map(|(name, t, c)| ExpenseItem {
            name,
            total_cents: t,
            count: c,
            pct: if total_cents != 0 {
                t as f64 / total_cents as f64 * 100.0
            } else {
                0.0
            },
        })
        .collect();

    let (auto_categorized, user_confirmed, uncategorized): (i64, i64, i64) = conn.query_row(
        "SELECT \
           COALESCE(SUM(CASE WHEN category_id IS NOT NULL AND auto_categorized = 1 THEN 1 ELSE 0 END), 0), \
           COALESCE(SUM(CASE WHEN category_id IS NOT NULL AND auto_categorized = 0 THEN 1 ELSE 0 END), 0), \
           COALESCE(SUM(CASE WHEN category_id IS NULL THEN 1 ELSE 0 END), 0) \
         FROM expenses WHERE user_id = ?1",
        [user_id],
        |r| Ok((r.get(0)?, r.get(1)?, r.get(2)?)),
    )?;

    Ok(ExpenseBreakdown {
        categories,
        total_cents,
        auto_categorized,
        user_confirmed,
        uncategorized,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::corrections::{record_correction, CategoryRef};
    use crate::db::{ensure_user, get_connection, init_db};
    use crate::expenses::{create_expense, NewExpense};
    use crate::settings::CategorizerConfig;

    fn test_db() -> (tempfile::TempDir, Connection, i64) {
        let dir = tempfile::tempdir().unwrap();
        let conn = get_connection(&dir.path().join("test.db")).unwrap();
        init_db(&conn).unwrap();
        let user = ensure_user(&conn, "alice").unwrap();
        (dir, conn, user)
    }

    fn add_expense(conn: &Connection, user: i64, vendor: &str, desc: &str, cents: i64, job: Option<&str>) -> i64 {
        let mut new = NewExpense::new(vendor, desc, cents);
        new.job_name = job.map(str::to_string);
        create_expense(conn, user, &new, &CategorizerConfig::default()).unwrap().id
    }

    #[test]
    fn test_job_profitability() {
        let (_dir, conn, user) = test_db();
        add_job(&conn, user, "Miller Deck", 1_000_000).unwrap();
        add_job(&conn, user, "Garcia Roof", 500_000).unwrap();
        add_expense(&conn, user, "Home Depot", "deck boards", 250_000, Some("Miller Deck"));
        add_expense(&conn, user, "Sunbelt Rentals", "post hole auger", 50_000, Some("Miller Deck"));
        add_expense(&conn, user, "Staples", "paper", 1_000, None);

        let report = get_job_profitability(&conn, user).unwrap();
        assert_eq!(report.len(), 2);
        let garcia = &report[0];
        assert_eq!(garcia.name, "Garcia Roof");
        assert_eq!(garcia.spent_cents, 0);
        assert_eq!(garcia.expense_count, 0);
        assert_eq!(garcia.margin_cents, 500_000);

        let miller = &report[1];
        assert_eq!(miller.spent_cents, 300_000);
        assert_eq!(miller.expense_count, 2);
        assert_eq!(miller.margin_cents, 700_000);
        assert!((miller.margin_pct.unwrap() - 70.0).abs() < 1e-9);
    }

    #[test]
    fn test_add_job_updates_quote() {
        let (_dir, conn, user) = test_db();
        let a = add_job(&conn, user, "Shed", 100).unwrap();
        let b = add_job(&conn, user, "Shed", 200).unwrap();
        assert_eq!(a.id, b.id);
        let jobs = list_jobs(&conn, user).unwrap();
        assert_eq!(jobs.len(), 1);
        assert_eq!(jobs[0].quoted_amount_cents, 200);
        assert!(add_job(&conn, user, "  ", 100).is_err());
        assert!(add_job(&conn, user, "Fence", -1).is_err());
    }

    #[test]
    fn test_expense_breakdown() {
        let (_dir, conn, user) = test_db();
        add_expense(&conn, user, "Home Depot", "studs", 30_000, None);
        add_expense(&conn, user, "Lowes", "screws", 10_000, None);
        let mystery = add_expense(&conn, user, "Mystery", "thing", 10_000, None);
        add_expense(&conn, user, "Nobody", "stuff", 5_000, None);
        record_correction(
            &conn,
            user,
            mystery,
            CategoryRef::Name("Other"),
            &CategorizerConfig::default(),
        )
        .unwrap();

        let b = get_expense_breakdown(&conn, user).unwrap();
        assert_eq!(b.total_cents, 55_000);
        assert_eq!(b.categories[0].name, "Materials");
        assert_eq!(b.categories[0].count, 2);
        assert!(b.categories.iter().any(|c| c.name == "Uncategorized" && c.total_cents == 5_000));
        assert_eq!(b.auto_categorized, 2);
        assert_eq!(b.user_confirmed, 1);
        assert_eq!(b.uncategorized, 1);
    }
}
