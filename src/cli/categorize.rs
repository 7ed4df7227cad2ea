use crate::categorizer::categorize_uncategorized;
use crate::cli::open_session;
use crate::error::Result;

pub fn run(user: Option<&str>) -> Result<()> {
    let session = open_session(user)?;
    let result = categorize_uncategorized(
        &session.conn,
        session.user_id,
        &session.settings.categorizer,
    )?;
    println!(
        "{} categorized, {} still uncategorized",
        result.categorized, result.still_uncategorized
    );
    Ok(())
}
