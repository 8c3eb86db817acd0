//! Read-only access to the hand-rolled version-5 store.
//!
//! The DDL fragments here are frozen: they describe the last schema written
//! by the pre-migration application generation and exist only so that stores
//! of that vintage can be verified and read during migration. Nothing in this
//! module writes to the store.

use rusqlite::Connection;

use crate::db::normalize::ColumnFamily;
use crate::db::signature::SchemaSignature;
use crate::error::{Result, StoreError};

/// Schema version recorded (via `PRAGMA user_version`) by the last
/// application generation that used the legacy store.
pub const LEGACY_VERSION: u32 = 5;

pub const FEED_TABLE: &str = "Feed";
pub const FEED_ITEM_TABLE: &str = "FeedItem";

pub const CREATE_LEGACY_FEED_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS Feed (
    id INTEGER PRIMARY KEY,
    title TEXT NOT NULL,
    customtitle TEXT NOT NULL,
    url TEXT NOT NULL,
    tag TEXT NOT NULL DEFAULT '',
    notify INTEGER NOT NULL DEFAULT 0,
    UNIQUE(url) ON CONFLICT REPLACE
);
"#;

pub const CREATE_LEGACY_FEED_ITEM_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS FeedItem (
    id INTEGER PRIMARY KEY,
    guid TEXT NOT NULL,
    title TEXT NOT NULL,
    description TEXT NOT NULL,
    plaintitle TEXT NOT NULL,
    plainsnippet TEXT NOT NULL,
    unread INTEGER NOT NULL DEFAULT 1,
    notified INTEGER NOT NULL DEFAULT 0,
    author TEXT,
    enclosurelink TEXT,
    imageurl TEXT,
    pubdate TEXT,
    link TEXT,
    feed INTEGER NOT NULL REFERENCES Feed(id) ON DELETE CASCADE,
    feedtitle TEXT NOT NULL,
    feedurl TEXT NOT NULL,
    tag TEXT NOT NULL DEFAULT '',
    UNIQUE(guid, feed) ON CONFLICT IGNORE
);
"#;

/// Keeps the denormalized item tag in step when a feed is re-tagged.
pub const CREATE_LEGACY_TAG_TRIGGER: &str = r#"
CREATE TRIGGER IF NOT EXISTS trigger_tag_updater
    AFTER UPDATE OF tag ON Feed
    BEGIN
        UPDATE FeedItem SET tag = NEW.tag WHERE feed = NEW.id;
    END;
"#;

/// Session-scoped view the legacy application created on every connection.
pub const CREATE_LEGACY_UNREAD_COUNT_VIEW: &str = r#"
CREATE TEMP VIEW IF NOT EXISTS WithUnreadCount
    AS SELECT id, title, url, tag, customtitle, notify, unreadcount
       FROM Feed
       LEFT JOIN (SELECT COUNT(1) AS unreadcount, feed
           FROM FeedItem
           WHERE unread IS 1
           GROUP BY feed)
       ON Feed.id = feed;
"#;

pub const CREATE_LEGACY_TAGS_VIEW: &str = r#"
CREATE VIEW IF NOT EXISTS TagsView AS SELECT DISTINCT tag FROM Feed;
"#;

/// Removes every legacy object, in dependency order. Run by the first
/// migration step once the data has been copied out.
pub const DROP_LEGACY_SQL: &str = r#"
DROP TRIGGER IF EXISTS trigger_tag_updater;
DROP VIEW IF EXISTS WithUnreadCount;
DROP VIEW IF EXISTS TagsView;
DROP TABLE IF EXISTS FeedItem;
DROP TABLE IF EXISTS Feed;
"#;

/// A legacy column and the normalization family its values go through.
#[derive(Debug, Clone, Copy)]
pub struct LegacyColumn {
    pub name: &'static str,
    pub family: ColumnFamily,
}

const fn col(name: &'static str, family: ColumnFamily) -> LegacyColumn {
    LegacyColumn { name, family }
}

pub const FEED_COLUMNS: &[LegacyColumn] = &[
    col("id", ColumnFamily::Id),
    col("title", ColumnFamily::Text),
    col("customtitle", ColumnFamily::Text),
    col("url", ColumnFamily::Url),
    col("tag", ColumnFamily::Text),
    col("notify", ColumnFamily::Flag),
];

pub const FEED_ITEM_COLUMNS: &[LegacyColumn] = &[
    col("id", ColumnFamily::Id),
    col("feed", ColumnFamily::Id),
    col("guid", ColumnFamily::Text),
    col("title", ColumnFamily::Text),
    col("description", ColumnFamily::Text),
    col("plaintitle", ColumnFamily::Text),
    col("plainsnippet", ColumnFamily::Text),
    col("unread", ColumnFamily::InvertedFlag),
    col("notified", ColumnFamily::Flag),
    col("author", ColumnFamily::NullableText),
    col("enclosurelink", ColumnFamily::NullableText),
    col("imageurl", ColumnFamily::NullableText),
    col("pubdate", ColumnFamily::Timestamp),
    col("link", ColumnFamily::NullableText),
    col("feedtitle", ColumnFamily::Dropped),
    col("feedurl", ColumnFamily::Dropped),
    col("tag", ColumnFamily::Dropped),
];

pub fn legacy_schema_sql() -> String {
    [
        CREATE_LEGACY_FEED_TABLE,
        CREATE_LEGACY_FEED_ITEM_TABLE,
        CREATE_LEGACY_TAG_TRIGGER,
        CREATE_LEGACY_UNREAD_COUNT_VIEW,
        CREATE_LEGACY_TAGS_VIEW,
    ]
    .join("\n")
}

/// Build a version-5 store, as the legacy application would have. Used by
/// tests and fixtures only; production stores arrive in this shape.
pub fn install_schema(conn: &Connection) -> Result<()> {
    conn.execute_batch(&legacy_schema_sql())?;
    conn.pragma_update(None, "user_version", LEGACY_VERSION)?;
    Ok(())
}

/// Fails with [`StoreError::SchemaMismatch`] unless the store's structure is
/// exactly the version-5 shape.
pub fn verify_schema(conn: &Connection) -> Result<()> {
    let expected = SchemaSignature::of_ddl(&legacy_schema_sql())?;
    let actual = SchemaSignature::read(conn)?;
    if let Some(detail) = expected.diff(&actual) {
        return Err(StoreError::SchemaMismatch {
            version: LEGACY_VERSION,
            detail,
        });
    }
    Ok(())
}

#[derive(Debug, Clone)]
pub struct LegacyFeedRow {
    pub id: i64,
    pub title: String,
    pub custom_title: String,
    pub url: String,
    pub tag: Option<String>,
    pub notify: Option<i64>,
}

#[derive(Debug, Clone)]
pub struct LegacyFeedItemRow {
    pub id: i64,
    pub feed: i64,
    pub guid: String,
    pub title: String,
    pub description: String,
    pub plain_title: String,
    pub plain_snippet: String,
    pub unread: Option<i64>,
    pub notified: Option<i64>,
    pub author: Option<String>,
    pub enclosure_link: Option<String>,
    pub image_url: Option<String>,
    pub pub_date: Option<String>,
    pub link: Option<String>,
}

/// Read handle over a verified version-5 store.
pub struct LegacyStore<'a> {
    conn: &'a Connection,
}

impl<'a> LegacyStore<'a> {
    pub fn open(conn: &'a Connection) -> Result<Self> {
        verify_schema(conn)?;
        Ok(Self { conn })
    }

    pub fn feeds(&self) -> Result<Vec<LegacyFeedRow>> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {} FROM {} ORDER BY id",
            select_list(FEED_COLUMNS),
            FEED_TABLE
        ))?;
        let rows = stmt
            .query_map([], |row| {
                Ok(LegacyFeedRow {
                    id: row.get("id")?,
                    title: row.get("title")?,
                    custom_title: row.get("customtitle")?,
                    url: row.get("url")?,
                    tag: row.get("tag")?,
                    notify: row.get("notify")?,
                })
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
    }

    pub fn feed_items(&self) -> Result<Vec<LegacyFeedItemRow>> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {} FROM {} ORDER BY id",
            select_list(FEED_ITEM_COLUMNS),
            FEED_ITEM_TABLE
        ))?;
        let rows = stmt
            .query_map([], |row| {
                Ok(LegacyFeedItemRow {
                    id: row.get("id")?,
                    feed: row.get("feed")?,
                    guid: row.get("guid")?,
                    title: row.get("title")?,
                    description: row.get("description")?,
                    plain_title: row.get("plaintitle")?,
                    plain_snippet: row.get("plainsnippet")?,
                    unread: row.get("unread")?,
                    notified: row.get("notified")?,
                    author: row.get("author")?,
                    enclosure_link: row.get("enclosurelink")?,
                    image_url: row.get("imageurl")?,
                    pub_date: row.get("pubdate")?,
                    link: row.get("link")?,
                })
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
    }

    /// Unread item count per feed, zero included. Mirrors the body of the
    /// legacy `WithUnreadCount` view so it works on any connection.
    pub fn unread_counts(&self) -> Result<Vec<(i64, i64)>> {
        let mut stmt = self.conn.prepare(
            "SELECT Feed.id, COALESCE(unreadcount, 0)
             FROM Feed
             LEFT JOIN (SELECT COUNT(1) AS unreadcount, feed
                 FROM FeedItem
                 WHERE unread IS 1
                 GROUP BY feed)
             ON Feed.id = feed
             ORDER BY Feed.id",
        )?;
        let rows = stmt
            .query_map([], |row| Ok((row.get(0)?, row.get(1)?)))?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
    }

    /// Distinct feed tags, as the legacy `TagsView` reported them.
    pub fn tags(&self) -> Result<Vec<String>> {
        let mut stmt = self
            .conn
            .prepare("SELECT DISTINCT tag FROM Feed ORDER BY tag")?;
        let rows = stmt
            .query_map([], |row| row.get(0))?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
    }
}

fn select_list(columns: &[LegacyColumn]) -> String {
    columns
        .iter()
        .map(|column| column.name)
        .collect::<Vec<_>>()
        .join(", ")
}
