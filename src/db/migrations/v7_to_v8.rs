//! Adds the per-feed image URL. Existing feeds keep no image until one is
//! fetched, so the column stays null for every migrated row.

use rusqlite::Transaction;

use crate::error::Result;

const ADD_IMAGE_URL_SQL: &str = "ALTER TABLE feeds ADD COLUMN image_url TEXT";

pub fn apply(tx: &Transaction) -> Result<()> {
    tx.execute(ADD_IMAGE_URL_SQL, [])?;
    Ok(())
}
