use std::path::PathBuf;

use crate::cli::open_session;
use crate::error::Result;
use crate::importer::import_file;

pub fn run(user: Option<&str>, file: &str) -> Result<()> {
    let session = open_session(user)?;
    let file_path = PathBuf::from(file);

    let result = import_file(
        &session.conn,
        session.user_id,
        &file_path,
        &session.settings.categorizer,
    )?;

    if result.duplicate_file {
        println!("This file has already been imported (duplicate checksum).");
        return Ok(());
    }

    println!(
        "{} imported, {} skipped (duplicates), {} invalid",
        result.imported, result.skipped, result.invalid
    );
    println!(
        "{} categorized, {} need a category",
        result.categorized,
        result.imported - result.categorized
    );
    Ok(())
}
