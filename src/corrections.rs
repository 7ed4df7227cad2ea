use rusqlite::{Connection, OptionalExtension};
use tracing::{debug, info};

use crate::categorizer::correction_fragment;
use crate::db::category_id_by_name;
use crate::error::{CoraError, Result};
use crate::settings::CategorizerConfig;

pub struct PatternRow {
    pub fragment: String,
    pub category_name: String,
    pub correction_count: i64,
    pub confidence: u8,
    pub active: bool,
}

/// Target of a manual recategorization.
pub enum CategoryRef<'a> {
    Id(i64),
    Name(&'a str),
}

pub struct CorrectionResult {
    pub fragment: String,
    pub correction_count: i64,
    pub confidence: u8,
    /// The fragment now overrides the static rules for this user.
    pub learned: bool,
}

fn is_learned(count: i64, total: i64, config: &CategorizerConfig) -> bool {
    count >= config.min_corrections && share_pct(count, total) >= config.learning_threshold
}

fn share_pct(count: i64, total: i64) -> u8 {
    (count.saturating_mul(100) / total.max(1)).clamp(0, 100) as u8
}

/// (corrections to `category_id`, corrections across all categories) for a fragment.
fn tally(conn: &Connection, user_id: i64, fragment: &str, category_id: i64) -> Result<(i64, i64)> {
    Ok(conn.query_row(
        "SELECT \
           COALESCE((SELECT correction_count FROM user_correction_patterns \
             WHERE user_id = ?1 AND fragment = ?2 AND category_id = ?3), 0), \
           COALESCE((SELECT SUM(correction_count) FROM user_correction_patterns \
             WHERE user_id = ?1 AND fragment = ?2), 0)",
        rusqlite::params![user_id, fragment, category_id],
        |row| Ok((row.get(0)?, row.get(1)?)),
    )?)
}

/// Apply a user's category choice to an expense and feed it back into the
/// user's correction patterns.
///
/// Each expense carries at most one vote. Re-correcting a user-confirmed
/// expense moves its vote to the new category; confirming the category it
/// already holds changes nothing.
pub fn record_correction(
    conn: &Connection,
    user_id: i64,
    expense_id: i64,
    category: CategoryRef,
    config: &CategorizerConfig,
) -> Result<CorrectionResult> {
    let category_id = match category {
        CategoryRef::Id(id) => {
            let exists: bool = conn
                .query_row("SELECT 1 FROM expense_categories WHERE id = ?1", [id], |_| Ok(true))
                .optional()?
                .unwrap_or(false);
            if !exists {
                return Err(CoraError::UnknownCategory(id.to_string()));
            }
            id
        }
        CategoryRef::Name(name) => category_id_by_name(conn, name)?,
    };

    let (vendor, description, current_category, auto): (String, String, Option<i64>, bool) = conn
        .query_row(
            "SELECT vendor, description, category_id, auto_categorized \
             FROM expenses WHERE id = ?1 AND user_id = ?2",
            [expense_id, user_id],
            |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?, row.get(3)?)),
        )
        .optional()?
        .ok_or(CoraError::UnknownExpense(expense_id))?;
    let fragment = correction_fragment(&vendor, &description);
    let prior_vote = current_category.filter(|_| !auto);

    let tx = conn.unchecked_transaction()?;
    let (before_count, before_total) = tally(&tx, user_id, &fragment, category_id)?;
    let was_learned = is_learned(before_count, before_total, config);

    if prior_vote != Some(category_id) {
        tx.execute(
            "UPDATE expenses SET category_id = ?1, confidence_score = NULL, auto_categorized = 0, \
             updated_at = datetime('now') WHERE id = ?2",
            [category_id, expense_id],
        )?;
        if let Some(old) = prior_vote {
            tx.execute(
                "UPDATE user_correction_patterns SET correction_count = correction_count - 1, \
                 updated_at = datetime('now') \
                 WHERE user_id = ?1 AND fragment = ?2 AND category_id = ?3",
                rusqlite::params![user_id, fragment, old],
            )?;
            tx.execute(
                "DELETE FROM user_correction_patterns \
                 WHERE user_id = ?1 AND fragment = ?2 AND correction_count <= 0",
                rusqlite::params![user_id, fragment],
            )?;
        }
        tx.execute(
            "INSERT INTO user_correction_patterns (user_id, fragment, category_id, correction_count) \
             VALUES (?1, ?2, ?3, 1) \
             ON CONFLICT (user_id, fragment, category_id) \
             DO UPDATE SET correction_count = correction_count + 1, updated_at = datetime('now')",
            rusqlite::params![user_id, fragment, category_id],
        )?;
    }
    let (correction_count, total) = tally(&tx, user_id, &fragment, category_id)?;
    tx.commit()?;

    let confidence = share_pct(correction_count, total);
    let learned = is_learned(correction_count, total, config);
    if prior_vote == Some(category_id) {
        debug!(expense_id, category_id, "category already confirmed");
    } else if learned && !was_learned {
        info!(user_id, fragment = %fragment, category_id, confidence, "correction pattern learned");
    } else {
        info!(user_id, expense_id, category_id, correction_count, "recorded correction");
    }

    Ok(CorrectionResult {
        fragment,
        correction_count,
        confidence,
        learned,
    })
}

pub fn list_patterns(
    conn: &Connection,
    user_id: i64,
    config: &CategorizerConfig,
) -> Result<Vec<PatternRow>> {
    let patterns = crate::categorizer::load_learned_patterns(conn, user_id)?;
    let mut stmt = conn.prepare("SELECT name FROM expense_categories WHERE id = ?1")?;
    let mut rows = Vec::with_capacity(patterns.len());
    for p in patterns {
        let category_name: String = stmt.query_row([p.category_id], |r| r.get(0))?;
        let confidence = p.confidence();
        rows.push(PatternRow {
            active: is_learned(p.correction_count, p.fragment_total, config),
            fragment: p.fragment,
            category_name,
            correction_count: p.correction_count,
            confidence,
        });
    }
    Ok(rows)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{ensure_user, get_connection, init_db};
    use crate::expenses::{create_expense, get_expense, NewExpense};

    fn test_db() -> (tempfile::TempDir, Connection, i64) {
        let dir = tempfile::tempdir().unwrap();
        let conn = get_connection(&dir.path().join("test.db")).unwrap();
        init_db(&conn).unwrap();
        let user = ensure_user(&conn, "alice").unwrap();
        (dir, conn, user)
    }

    fn add(conn: &Connection, user: i64, vendor: &str, description: &str) -> i64 {
        create_expense(conn, user, &NewExpense::new(vendor, description, 1250), &CategorizerConfig::default())
            .unwrap()
            .id
    }

    #[test]
    fn test_correction_marks_user_confirmed() {
        let (_dir, conn, user) = test_db();
        let config = CategorizerConfig::default();
        let id = add(&conn, user, "Staples", "office supplies");
        record_correction(&conn, user, id, CategoryRef::Name("Tools & Equipment"), &config).unwrap();
        let e = get_expense(&conn, user, id).unwrap();
        assert_eq!(e.category_name.as_deref(), Some("Tools & Equipment"));
        assert!(!e.auto_categorized);
        assert!(e.confidence_score.is_none());
    }

    #[test]
    fn test_conflicting_corrections_do_not_learn() {
        let (_dir, conn, user) = test_db();
        let config = CategorizerConfig::default();
        for _ in 0..3 {
            let id = add(&conn, user, "Chipotle", "burrito bowls");
            record_correction(&conn, user, id, CategoryRef::Name("Meals & Entertainment"), &config).unwrap();
        }
        let id = add(&conn, user, "Chipotle", "catering deposit");
        let r = record_correction(&conn, user, id, CategoryRef::Name("Other"), &config).unwrap();
        assert_eq!(r.correction_count, 1);
        assert!(!r.learned);

        // Three of four corrections is 75%, under the 85% threshold.
        let id = add(&conn, user, "Chipotle", "burrito bowls");
        assert!(get_expense(&conn, user, id).unwrap().category_id.is_none());
    }

    #[test]
    fn test_corrections_from_other_to_meals_teach_fourth_expense() {
        let (_dir, conn, user) = test_db();
        let config = CategorizerConfig::default();
        let mut last = None;
        for _ in 0..3 {
            let id = add(&conn, user, "Chipotle", "burrito bowls");
            record_correction(&conn, user, id, CategoryRef::Name("Other"), &config).unwrap();
            assert_eq!(
                get_expense(&conn, user, id).unwrap().category_name.as_deref(),
                Some("Other")
            );
            last = Some(
                record_correction(&conn, user, id, CategoryRef::Name("Meals & Entertainment"), &config)
                    .unwrap(),
            );
        }
        let last = last.unwrap();
        assert_eq!(last.correction_count, 3);
        assert_eq!(last.confidence, 100);
        assert!(last.learned);

        let id = add(&conn, user, "Chipotle", "burrito bowls");
        let e = get_expense(&conn, user, id).unwrap();
        assert_eq!(e.category_name.as_deref(), Some("Meals & Entertainment"));
        assert!(e.auto_categorized);

        let rows = list_patterns(&conn, user, &config).unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].category_name, "Meals & Entertainment");
    }

    #[test]
    fn test_repeat_correction_of_one_expense_counts_once() {
        let (_dir, conn, user) = test_db();
        let config = CategorizerConfig::default();
        let id = add(&conn, user, "Ace Hardware", "hinges");
        let mut last = None;
        for _ in 0..3 {
            last = Some(record_correction(&conn, user, id, CategoryRef::Name("Materials"), &config).unwrap());
        }
        let last = last.unwrap();
        assert_eq!(last.correction_count, 1);
        assert!(!last.learned);
    }

    #[test]
    fn test_pattern_learned_once_share_crosses_threshold() {
        let (_dir, conn, user) = test_db();
        let config = CategorizerConfig::default();
        let id = add(&conn, user, "Chipotle", "catering deposit");
        record_correction(&conn, user, id, CategoryRef::Name("Other"), &config).unwrap();

        let mut flips = Vec::new();
        for _ in 0..6 {
            let id = add(&conn, user, "Chipotle", "burrito bowls");
            let r = record_correction(&conn, user, id, CategoryRef::Name("Meals & Entertainment"), &config)
                .unwrap();
            flips.push((r.correction_count, r.confidence, r.learned));
        }
        // 3/4 = 75%, 4/5 = 80%, 5/6 = 83%, then 6/7 = 85% crosses the threshold.
        assert_eq!(flips[2], (3, 75, false));
        assert_eq!(flips[4], (5, 83, false));
        assert_eq!(flips[5], (6, 85, true));
    }

    #[test]
    fn test_fourth_chipotle_is_auto_assigned() {
        let (_dir, conn, user) = test_db();
        let config = CategorizerConfig::default();
        let mut last = None;
        for _ in 0..3 {
            let id = add(&conn, user, "Chipotle", "burrito bowls");
            assert!(get_expense(&conn, user, id).unwrap().category_id.is_none());
            last = Some(
                record_correction(&conn, user, id, CategoryRef::Name("Meals & Entertainment"), &config)
                    .unwrap(),
            );
        }
        assert!(last.unwrap().learned);

        let id = add(&conn, user, "Chipotle", "burrito bowls");
        let e = get_expense(&conn, user, id).unwrap();
        assert_eq!(e.category_name.as_deref(), Some("Meals & Entertainment"));
        assert!(e.auto_categorized);
        assert!(e.confidence_score.unwrap() >= config.learning_threshold);
    }

    #[test]
    fn test_learned_pattern_overrides_static_rule() {
        let (_dir, conn, user) = test_db();
        let config = CategorizerConfig::default();
        for _ in 0..3 {
            let id = add(&conn, user, "Home Depot", "misc");
            assert_eq!(
                get_expense(&conn, user, id).unwrap().category_name.as_deref(),
                Some("Materials")
            );
            record_correction(&conn, user, id, CategoryRef::Name("Tools & Equipment"), &config).unwrap();
        }
        let id = add(&conn, user, "Home Depot", "misc");
        assert_eq!(
            get_expense(&conn, user, id).unwrap().category_name.as_deref(),
            Some("Tools & Equipment")
        );
    }

    #[test]
    fn test_patterns_do_not_leak_between_users() {
        let (_dir, conn, user) = test_db();
        let other = ensure_user(&conn, "bob").unwrap();
        let config = CategorizerConfig::default();
        for _ in 0..3 {
            let id = add(&conn, user, "Chipotle", "burrito bowls");
            record_correction(&conn, user, id, CategoryRef::Name("Meals & Entertainment"), &config).unwrap();
        }
        let id = add(&conn, other, "Chipotle", "burrito bowls");
        assert!(get_expense(&conn, other, id).unwrap().category_id.is_none());
    }

    #[test]
    fn test_blank_vendor_uses_description_fragment() {
        let (_dir, conn, user) = test_db();
        let config = CategorizerConfig::default();
        let id = add(&conn, user, "", "Crew pizza Friday");
        let r = record_correction(&conn, user, id, CategoryRef::Name("Meals & Entertainment"), &config)
            .unwrap();
        assert_eq!(r.fragment, "crew pizza friday");
    }

    #[test]
    fn test_unknown_targets() {
        let (_dir, conn, user) = test_db();
        let config = CategorizerConfig::default();
        let id = add(&conn, user, "Staples", "paper");
        assert!(matches!(
            record_correction(&conn, user, id, CategoryRef::Name("Nope"), &config),
            Err(CoraError::UnknownCategory(_))
        ));
        assert!(matches!(
            record_correction(&conn, user, id, CategoryRef::Id(9999), &config),
            Err(CoraError::UnknownCategory(_))
        ));
        assert!(matches!(
            record_correction(&conn, user, 9999, CategoryRef::Name("Other"), &config),
            Err(CoraError::UnknownExpense(9999))
        ));
    }

    #[test]
    fn test_list_patterns_reports_activity() {
        let (_dir, conn, user) = test_db();
        let config = CategorizerConfig::default();
        for _ in 0..3 {
            let id = add(&conn, user, "Chipotle", "burrito bowls");
            record_correction(&conn, user, id, CategoryRef::Name("Meals & Entertainment"), &config).unwrap();
        }
        let id = add(&conn, user, "Ace Hardware", "hinges");
        record_correction(&conn, user, id, CategoryRef::Name("Materials"), &config).unwrap();

        let rows = list_patterns(&conn, user, &config).unwrap();
        assert_eq!(rows.len(), 2);
        let ace = rows.iter().find(|r| r.fragment == "ace hardware").unwrap();
        assert!(!ace.active);
        let chipotle = rows.iter().find(|r| r.fragment == "chipotle").unwrap();
        assert!(chipotle.active);
        assert_eq!(chipotle.confidence, 100);
        assert_eq!(chipotle.category_name, "Meals & Entertainment");
    }
}
