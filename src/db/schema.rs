use rusqlite::Connection;

use crate::db::signature::SchemaSignature;
use crate::error::{Result, StoreError};

/// Schema version this build reads and writes.
pub const CURRENT_VERSION: u32 = 8;

pub const CREATE_SCHEMA_SQL: &str = r#"
-- feeds table
CREATE TABLE IF NOT EXISTS feeds (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    title TEXT NOT NULL,
    custom_title TEXT NOT NULL,
    url TEXT NOT NULL UNIQUE,
    tag TEXT NOT NULL DEFAULT '',
    notify INTEGER NOT NULL DEFAULT 0,
    last_sync TEXT NOT NULL DEFAULT '1970-01-01T00:00:00+00:00',
    image_url TEXT
);

CREATE INDEX IF NOT EXISTS idx_feeds_url ON feeds(url);

-- feed_items table
CREATE TABLE IF NOT EXISTS feed_items (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    feed_id INTEGER NOT NULL REFERENCES feeds(id) ON DELETE CASCADE,
    guid TEXT NOT NULL,
    title TEXT NOT NULL,
    description TEXT NOT NULL,
    plain_title TEXT NOT NULL,
    plain_snippet TEXT NOT NULL,
    unread INTEGER NOT NULL DEFAULT 1,
    notified INTEGER NOT NULL DEFAULT 0,
    author TEXT,
    enclosure_link TEXT,
    image_url TEXT,
    pub_date TEXT,
    link TEXT,
    UNIQUE(feed_id, guid)
);

CREATE INDEX IF NOT EXISTS idx_feed_items_feed_id ON feed_items(feed_id);
"#;

pub fn store_version(conn: &Connection) -> rusqlite::Result<u32> {
    let version: i64 = conn.pragma_query_value(None, "user_version", |row| row.get(0))?;
    Ok(version as u32)
}

/// Stamp an empty store with the current schema. Migrated stores never pass
/// through here; they are built step by step.
pub fn create_current(conn: &mut Connection) -> Result<()> {
    let tx = conn.transaction()?;
    tx.execute_batch(CREATE_SCHEMA_SQL)?;
    tx.pragma_update(None, "user_version", CURRENT_VERSION)?;

    // A version-0 store is expected to be empty; anything else in it means
    // this is not our database.
    let expected = SchemaSignature::of_ddl(CREATE_SCHEMA_SQL)?;
    let actual = SchemaSignature::read(&tx)?;
    if let Some(detail) = expected.diff(&actual) {
        return Err(StoreError::SchemaMismatch { version: 0, detail });
    }

    tx.commit()?;
    Ok(())
}

/// Fails with [`StoreError::SchemaMismatch`] unless the store matches the
/// current schema.
pub fn verify_current(conn: &Connection) -> Result<()> {
    let expected = SchemaSignature::of_ddl(CREATE_SCHEMA_SQL)?;
    let actual = SchemaSignature::read(conn)?;
    if let Some(detail) = expected.diff(&actual) {
        return Err(StoreError::SchemaMismatch {
            version: CURRENT_VERSION,
            detail,
        });
    }
    Ok(())
}
