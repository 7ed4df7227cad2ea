mod categorizer;
mod cli;
mod corrections;
mod db;
mod error;
mod expenses;
mod fmt;
mod importer;
mod models;
mod reports;
mod settings;

use clap::Parser;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use cli::{Cli, Commands, ExpenseCommands, JobsCommands, ReportCommands, RulesCommands};

fn init_logging() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_env("CORA_LOG")
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

fn main() {
    init_logging();
    let cli = Cli::parse();
    let user = cli.user.as_deref();

    let result = match cli.command {
        Commands::Init { data_dir } => cli::init::run(data_dir),
        Commands::Status => cli::status::run(user),
        Commands::Categories => cli::categories::list(user),
        Commands::Expense { command } => match command {
            ExpenseCommands::Add {
                description,
                amount,
                vendor,
                currency,
                job,
                date,
                source,
            } => cli::expense::add(
                user,
                &description,
                &amount,
                &vendor,
                &currency,
                job.as_deref(),
                date.as_deref(),
                &source,
            ),
            ExpenseCommands::List {
                uncategorized,
                job,
                limit,
            } => cli::expense::list(user, uncategorized, job, limit),
            ExpenseCommands::Show { id } => cli::expense::show(user, id),
            ExpenseCommands::Correct { id, category } => cli::expense::correct(user, id, &category),
        },
        Commands::Categorize => cli::categorize::run(user),
        Commands::Rules { command } => match command {
            RulesCommands::Add {
                pattern,
                category,
                match_type,
                weight,
            } => cli::rules::add(user, &pattern, &category, &match_type, weight),
            RulesCommands::List => cli::rules::list(user),
            RulesCommands::Delete { id } => cli::rules::delete(user, id),
        },
        Commands::Patterns => cli::patterns::list(user),
        Commands::Jobs { command } => match command {
            JobsCommands::Add { name, quote } => cli::jobs::add(user, &name, &quote),
            JobsCommands::List => cli::jobs::list(user),
        },
        Commands::Import { file } => cli::import::run(user, &file),
        Commands::Report { command } => match command {
            ReportCommands::Jobs => cli::report::jobs(user),
            ReportCommands::Expenses => cli::report::expenses(user),
        },
    };

    if let Err(e) = result {
        eprintln!("Error: {e}");
        std::process::exit(1);
    }
}
