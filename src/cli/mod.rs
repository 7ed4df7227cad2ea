pub mod categories;
pub mod categorize;
pub mod expense;
pub mod import;
pub mod init;
pub mod jobs;
pub mod patterns;
pub mod report;
pub mod rules;
pub mod status;

use clap::{Parser, Subcommand};
use rusqlite::Connection;

use crate::db::{ensure_user, get_connection};
use crate::error::{CoraError, Result};
use crate::settings::{load_settings, Settings};

/// Everything a command needs: settings, an open database and the acting user.
pub(crate) struct Session {
    pub settings: Settings,
    pub conn: Connection,
    pub user_id: i64,
}

pub(crate) fn open_session(user: Option<&str>) -> Result<Session> {
    let settings = load_settings();
    settings.categorizer.validate()?;
    let db_path = settings.db_path();
    if !db_path.exists() {
        return Err(CoraError::Other(format!(
            "Database not found at {}. Run `cora init` first.",
            db_path.display()
        )));
    }
    let conn = get_connection(&db_path)?;
    let user_id = ensure_user(&conn, settings.effective_user(user))?;
    Ok(Session {
        settings,
        conn,
        user_id,
    })
}

#[derive(Parser)]
#[command(name = "cora", about = "Expense tracking and auto-categorization for contractors.")]
pub struct Cli {
    /// Act as this user (default: user_name from settings, then "default")
    #[arg(long, global = true)]
    pub user: Option<String>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Set up Cora: choose a data directory and initialize the database.
    Init {
        /// Path for Cora data (default: ~/Documents/cora)
        #[arg(long = "data-dir")]
        data_dir: Option<String>,
    },
    /// Show current database and summary statistics.
    Status,
    /// List expense categories.
    Categories,
    /// Record and inspect expenses.
    Expense {
        #[command(subcommand)]
        command: ExpenseCommands,
    },
    /// Re-run auto-categorization on uncategorized expenses.
    Categorize,
    /// Manage the static categorization rules.
    Rules {
        #[command(subcommand)]
        command: RulesCommands,
    },
    /// Show patterns learned from your corrections.
    Patterns,
    /// Manage jobs and their quoted amounts.
    Jobs {
        #[command(subcommand)]
        command: JobsCommands,
    },
    /// Import a bank CSV (date,vendor,description,amount[,job]) and categorize it.
    Import {
        /// Path to CSV file
        file: String,
    },
    /// Generate reports.
    Report {
        #[command(subcommand)]
        command: ReportCommands,
    },
}

#[derive(Subcommand)]
pub enum ExpenseCommands {
    /// Add an expense; it is categorized automatically.
    Add {
        /// What was bought
        #[arg(long)]
        description: String,
        /// Amount, e.g. 85.47
        #[arg(long, allow_hyphen_values = true)]
        amount: String,
        /// Vendor name
        #[arg(long, default_value = "")]
        vendor: String,
        /// Three-letter currency code
        #[arg(long, default_value = "USD")]
        currency: String,
        /// Job this expense belongs to
        #[arg(long)]
        job: Option<String>,
        /// Date: YYYY-MM-DD (default: today)
        #[arg(long)]
        date: Option<String>,
        /// Source: manual, receipt, bank_import
        #[arg(long, default_value = "manual")]
        source: String,
    },
    /// List expenses.
    List {
        /// Only expenses without a category
        #[arg(long)]
        uncategorized: bool,
        /// Only expenses for this job
        #[arg(long)]
        job: Option<String>,
        /// Maximum rows
        #[arg(long)]
        limit: Option<usize>,
    },
    /// Show one expense.
    Show {
        id: i64,
    },
    /// Set an expense's category yourself; Cora learns from it.
    Correct {
        id: i64,
        /// Category name or ID
        #[arg(long)]
        category: String,
    },
}

#[derive(Subcommand)]
pub enum RulesCommands {
    /// Add a categorization rule.
    Add {
        /// Vendor name, keyword, or regex
        pattern: String,
        /// Category name to assign
        #[arg(long)]
        category: String,
        /// Match type: vendor, keyword, regex
        #[arg(long = "match-type", default_value = "keyword")]
        match_type: String,
        /// Score adjustment added to this rule's matches
        #[arg(long, default_value = "0", allow_hyphen_values = true)]
        weight: i64,
    },
    /// List all active rules.
    List,
    /// Deactivate a rule by ID.
    Delete {
        /// Rule ID (shown in `cora rules list`)
        id: i64,
    },
}

#[derive(Subcommand)]
pub enum JobsCommands {
    /// Add a job or update its quote.
    Add {
        name: String,
        /// Quoted amount, e.g. 12500.00
        #[arg(long)]
        quote: String,
    },
    /// List jobs.
    List,
}

#[derive(Subcommand)]
pub enum ReportCommands {
    /// Quoted amount vs. linked expenses per job.
    Jobs,
    /// Spending by category.
    Expenses,
}
