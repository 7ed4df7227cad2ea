use comfy_table::{Cell, Table};
use rusqlite::OptionalExtension;

use crate::categorizer::check_rule_weight;
use crate::cli::open_session;
use crate::db::category_id_by_name;
use crate::error::{CoraError, Result};
use crate::models::MatchKind;

pub fn add(user: Option<&str>, pattern: &str, category: &str, match_type: &str, weight: i64) -> Result<()> {
    let session = open_session(user)?;
    let conn = &session.conn;

    let kind = MatchKind::from_key(match_type)
        .ok_or_else(|| CoraError::Other(format!("Unknown match type: {match_type}")))?;
    if kind == MatchKind::Regex {
        regex::Regex::new(pattern).map_err(|e| CoraError::Other(format!("Invalid regex: {e}")))?;
    }
    check_rule_weight(weight)?;
    let cat_id = category_id_by_name(conn, category)?;

    conn.execute(
        "INSERT INTO rules (pattern, match_type, category_id, weight) VALUES (?1, ?2, ?3, ?4)",
        rusqlite::params![pattern, kind.key(), cat_id, weight],
    )?;
    println!("Added rule: '{pattern}' \u{2192} {category}");
    Ok(())
}

pub fn list(user: Option<&str>) -> Result<()> {
    let session = open_session(user)?;
    let mut stmt = session.conn.prepare(
        "SELECT r.id, r.pattern, r.match_type, c.name as category, r.weight, r.hit_count \
         FROM rules r JOIN expense_categories c ON r.category_id = c.id \
         WHERE r.is_active = 1 ORDER BY r.match_type, r.id",
    )?;
    let rows: Vec<(i64, String, String, String, i64, i64)> = stmt
        .query_map([], |row| {
            Ok((
                row.get(0)?,
                row.get(1)?,
                row.get(2)?,
                row.get(3)?,
                row.get(4)?,
                row.get(5)?,
            ))
        })?
        .collect::<std::result::Result<Vec<_>, _>>()?;

    let mut table = Table::new();
    table.set_header(vec!["ID", "Pattern", "Type", "Category", "Weight", "Hits"]);
    for (id, pattern, match_type, category, weight, hits) in rows {
        table.add_row(vec![
            Cell::new(id),
            Cell::new(pattern),
            Cell::new(match_type),
            Cell::new(category),
            Cell::new(weight),
            Cell::new(hits),
        ]);
    }
    println!("Rules\n{table}");
    Ok(())
}

pub fn delete(user: Option<&str>, id: i64) -> Result<()> {
    let session = open_session(user)?;
    let conn = &session.conn;

    let row: Option<(String, String, i32)> = conn
        .query_row(
            "SELECT r.pattern, c.name, r.is_active FROM rules r \
             JOIN expense_categories c ON r.category_id = c.id WHERE r.id = ?1",
            [id],
            |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)),
        )
        .optional()?;

    match row {
        None => Err(CoraError::Other(format!("No rule with ID {id}"))),
        Some((_, _, 0)) => Err(CoraError::Other(format!("Rule {id} is already inactive"))),
        Some((pattern, category, _)) => {
            conn.execute("UPDATE rules SET is_active = 0 WHERE id = ?1", [id])?;
            println!("Deleted rule {id}: '{pattern}' \u{2192} {category}");
            Ok(())
        }
    }
}
