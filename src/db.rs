use std::path::Path;

use rusqlite::{Connection, OptionalExtension};

use crate::error::{CoraError, Result};
use crate::models::ExpenseCategory;

pub const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS users (
    id INTEGER PRIMARY KEY,
    name TEXT NOT NULL UNIQUE,
    created_at TEXT DEFAULT (datetime('now'))
);

CREATE TABLE IF NOT EXISTS expense_categories (
    id INTEGER PRIMARY KEY,
    name TEXT NOT NULL UNIQUE,
    description TEXT NOT NULL DEFAULT '',
    icon TEXT NOT NULL DEFAULT ''
);

CREATE TABLE IF NOT EXISTS rules (
    id INTEGER PRIMARY KEY,
    pattern TEXT NOT NULL,
    match_type TEXT NOT NULL DEFAULT 'keyword',
    category_id INTEGER NOT NULL,
    weight INTEGER NOT NULL DEFAULT 0,
    hit_count INTEGER NOT NULL DEFAULT 0,
    is_active INTEGER NOT NULL DEFAULT 1,
    created_at TEXT DEFAULT (datetime('now')),
    FOREIGN KEY (category_id) REFERENCES expense_categories(id)
);

CREATE TABLE IF NOT EXISTS jobs (
    id INTEGER PRIMARY KEY,
    user_id INTEGER NOT NULL,
    name TEXT NOT NULL,
    quoted_amount_cents INTEGER NOT NULL DEFAULT 0,
    created_at TEXT DEFAULT (datetime('now')),
    UNIQUE (user_id, name),
    FOREIGN KEY (user_id) REFERENCES users(id)
);

CREATE TABLE IF NOT EXISTS imports (
    id INTEGER PRIMARY KEY,
    user_id INTEGER NOT NULL,
    filename TEXT NOT NULL,
    record_count INTEGER,
    checksum TEXT,
    import_date TEXT DEFAULT (datetime('now')),
    FOREIGN KEY (user_id) REFERENCES users(id)
);

CREATE TABLE IF NOT EXISTS expenses (
    id INTEGER PRIMARY KEY,
    user_id INTEGER NOT NULL,
    amount_cents INTEGER NOT NULL CHECK (amount_cents >= 0),
    currency TEXT NOT NULL DEFAULT 'USD',
    vendor TEXT NOT NULL DEFAULT '',
    description TEXT NOT NULL,
    category_id INTEGER,
    confidence_score INTEGER CHECK (confidence_score BETWEEN 0 AND 100),
    auto_categorized INTEGER NOT NULL DEFAULT 0,
    job_name TEXT,
    expense_date TEXT NOT NULL,
    source TEXT NOT NULL DEFAULT 'manual',
    import_id INTEGER,
    created_at TEXT DEFAULT (datetime('now')),
    updated_at TEXT DEFAULT (datetime('now')),
    FOREIGN KEY (user_id) REFERENCES users(id),
    FOREIGN KEY (category_id) REFERENCES expense_categories(id),
    FOREIGN KEY (import_id) REFERENCES imports(id)
);

CREATE INDEX IF NOT EXISTS idx_expenses_user_category ON expenses (user_id, category_id);

CREATE TABLE IF NOT EXISTS user_correction_patterns (
    id INTEGER PRIMARY KEY,
    user_id INTEGER NOT NULL,
    fragment TEXT NOT NULL,
    category_id INTEGER NOT NULL,
    correction_count INTEGER NOT NULL DEFAULT 0,
    updated_at TEXT DEFAULT (datetime('now')),
    UNIQUE (user_id, fragment, category_id),
    FOREIGN KEY (user_id) REFERENCES users(id),
    FOREIGN KEY (category_id) REFERENCES expense_categories(id)
);
";

// (name, description, icon)
const DEFAULT_CATEGORIES: &[(&str, &str, &str)] = &[
    ("Materials", "Lumber, concrete, drywall, fixtures for job sites", "bricks"),
    ("Tools & Equipment", "Hand tools, power tools, small equipment purchases", "hammer"),
    ("Equipment Rental", "Rented lifts, excavators, scaffolding", "truck-loading"),
    ("Subcontractors", "1099 labor and trade subcontracts", "hard-hat"),
    ("Fuel", "Gas and diesel for trucks and equipment", "gas-pump"),
    ("Vehicle Maintenance", "Repairs, tires, oil changes", "wrench"),
    ("Office Supplies", "Paper, toner, small office items", "paperclip"),
    ("Meals & Entertainment", "Crew meals, client lunches", "utensils"),
    ("Insurance", "General liability, workers comp, vehicle insurance", "shield"),
    ("Permits & Licenses", "Building permits, inspections, contractor licenses", "file-certificate"),
    ("Phone & Internet", "Mobile plans, office internet", "phone"),
    ("Software & Subscriptions", "Estimating, accounting and scheduling tools", "laptop"),
    ("Professional Services", "Accountant, attorney, engineering", "briefcase"),
    ("Advertising & Marketing", "Ads, yard signs, lead services", "megaphone"),
    ("Travel", "Lodging and travel to remote job sites", "plane"),
    ("Bank Fees", "Card processing, wire and account fees", "bank"),
    ("Other", "Anything else", "dots"),
];

// (pattern, match_type, category name, weight)
const DEFAULT_RULES: &[(&str, &str, &str, i64)] = &[
    // Vendors
    ("home depot", "vendor", "Materials", 0),
    ("lowes", "vendor", "Materials", 0),
    ("menards", "vendor", "Materials", 0),
    ("84 lumber", "vendor", "Materials", 0),
    ("ferguson", "vendor", "Materials", 0),
    ("harbor freight", "vendor", "Tools & Equipment", 0),
    ("northern tool", "vendor", "Tools & Equipment", 0),
    ("sunbelt rentals", "vendor", "Equipment Rental", 0),
    ("united rentals", "vendor", "Equipment Rental", 0),
    ("shell", "vendor", "Fuel", 0),
    ("exxon", "vendor", "Fuel", 0),
    ("chevron", "vendor", "Fuel", 0),
    ("speedway", "vendor", "Fuel", 0),
    ("pilot", "vendor", "Fuel", 0),
    ("jiffy lube", "vendor", "Vehicle Maintenance", 0),
    ("discount tire", "vendor", "Vehicle Maintenance", 0),
    ("staples", "vendor", "Office Supplies", 0),
    ("office depot", "vendor", "Office Supplies", 0),
    ("starbucks", "vendor", "Meals & Entertainment", 0),
    ("mcdonalds", "vendor", "Meals & Entertainment", 0),
    ("state farm", "vendor", "Insurance", 0),
    ("progressive", "vendor", "Insurance", 0),
    ("quickbooks", "vendor", "Software & Subscriptions", 0),
    ("google ads", "vendor", "Advertising & Marketing", 0),
    // Description keywords
    ("office supplies", "keyword", "Office Supplies", 0),
    ("toner", "keyword", "Office Supplies", 0),
    ("lumber", "keyword", "Materials", 0),
    ("concrete", "keyword", "Materials", 0),
    ("drywall", "keyword", "Materials", 0),
    ("plywood", "keyword", "Materials", 0),
    ("shingles", "keyword", "Materials", 0),
    ("diesel", "keyword", "Fuel", 0),
    ("fuel", "keyword", "Fuel", 0),
    ("oil change", "keyword", "Vehicle Maintenance", 0),
    ("equipment rental", "keyword", "Equipment Rental", 0),
    ("subcontractor", "keyword", "Subcontractors", 0),
    ("building permit", "keyword", "Permits & Licenses", 5),
    ("permit", "keyword", "Permits & Licenses", 0),
    ("license", "keyword", "Permits & Licenses", 0),
    ("insurance", "keyword", "Insurance", 0),
    ("lunch", "keyword", "Meals & Entertainment", 0),
    ("dinner", "keyword", "Meals & Entertainment", 0),
    ("hotel", "keyword", "Travel", 0),
    ("wire fee", "keyword", "Bank Fees", 0),
    // Raw-text patterns
    (r"\b(verizon|at&t|t-mobile)\b", "regex", "Phone & Internet", 0),
];

pub fn get_connection(db_path: &Path) -> Result<Connection> {
    let conn = Connection::open(db_path)?;
    conn.execute_batch("PRAGMA journal_mode=WAL; PRAGMA foreign_keys=ON;")?;
    Ok(conn)
}

pub fn init_db(conn: &Connection) -> Result<()> {
    conn.execute_batch(SCHEMA)?;

    let count: i64 =
        conn.query_row("SELECT count(*) FROM expense_categories", [], |row| row.get(0))?;
    if count == 0 {
        for (name, description, icon) in DEFAULT_CATEGORIES {
            conn.execute(
                "INSERT INTO expense_categories (name, description, icon) VALUES (?1, ?2, ?3)",
                rusqlite::params![name, description, icon],
            )?;
        }
    }

    let rule_count: i64 = conn.query_row("SELECT count(*) FROM rules", [], |row| row.get(0))?;
    if rule_count == 0 {
        for (pattern, match_type, category, weight) in DEFAULT_RULES {
            let category_id = category_id_by_name(conn, category)?;
            conn.execute(
                "INSERT INTO rules (pattern, match_type, category_id, weight) VALUES (?1, ?2, ?3, ?4)",
                rusqlite::params![pattern, match_type, category_id, weight],
            )?;
        }
    }
    Ok(())
}

/// Look up a user by name, creating the row on first use.
pub fn ensure_user(conn: &Connection, name: &str) -> Result<i64> {
    conn.execute("INSERT OR IGNORE INTO users (name) VALUES (?1)", [name])?;
    let id = conn.query_row("SELECT id FROM users WHERE name = ?1", [name], |r| r.get(0))?;
    Ok(id)
}

pub fn category_id_by_name(conn: &Connection, name: &str) -> Result<i64> {
    conn.query_row(
        "SELECT id FROM expense_categories WHERE name = ?1 COLLATE NOCASE",
        [name],
        |row| row.get(0),
    )
    .optional()?
    .ok_or_else(|| CoraError::UnknownCategory(name.to_string()))
}

pub fn get_categories(conn: &Connection) -> Result<Vec<ExpenseCategory>> {
    let mut stmt =
        conn.prepare("SELECT id, name, description, icon FROM expense_categories ORDER BY name")?;
    let rows = stmt
        .query_map([], |row| {
            Ok(ExpenseCategory {
                id: row.get(0)?,
                name: row.get(1)?,
                description: row.get(2)?,
                icon: row.get(3)?,
            })
        })?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(rows)
}
