use rusqlite::OptionalExtension;

use crate::db::get_connection;
use crate::error::Result;
use crate::settings::load_settings;

pub fn run(user: Option<&str>) -> Result<()> {
    let settings = load_settings();
    let db_path = settings.db_path();

    let user_name = settings.effective_user(user);
    println!("User:       {user_name}");
    println!("Data dir:   {}", settings.data_dir);
    println!("Database:   {}", db_path.display());
    println!(
        "Floor:      {}  Learning: {}% after {} corrections",
        settings.categorizer.confidence_floor,
        settings.categorizer.learning_threshold,
        settings.categorizer.min_corrections
    );

    if db_path.exists() {
        let conn = get_connection(&db_path)?;
        // A user with no rows yet has nothing to count.
        let user_id: i64 = conn
            .query_row("SELECT id FROM users WHERE name = ?1", [user_name], |r| r.get(0))
            .optional()?
            .unwrap_or(-1);
        let expenses: i64 = conn.query_row(
            "SELECT count(*) FROM expenses WHERE user_id = ?1",
            [user_id],
            |r| r.get(0),
        )?;
        let uncategorized: i64 = conn.query_row(
            "SELECT count(*) FROM expenses WHERE user_id = ?1 AND category_id IS NULL",
            [user_id],
            |r| r.get(0),
        )?;
        let rules: i64 =
            conn.query_row("SELECT count(*) FROM rules WHERE is_active = 1", [], |r| r.get(0))?;
        let patterns: i64 = conn.query_row(
            "SELECT count(*) FROM user_correction_patterns WHERE user_id = ?1",
            [user_id],
            |r| r.get(0),
        )?;

        println!();
        println!("Expenses:       {expenses}");
        println!("Uncategorized:  {uncategorized}");
        println!("Rules:          {rules}");
        println!("Patterns:       {patterns}");
    } else {
        println!();
        println!("Database not found. Run `cora init` to set up.");
    }

    Ok(())
}
