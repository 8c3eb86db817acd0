//! Replaces the hand-rolled legacy tables with the structured schema and
//! copies their rows across, normalized. The legacy trigger and views are
//! superseded here and must not survive this step.

use rusqlite::{params, Transaction};

use crate::db::legacy::{self, LegacyFeedItemRow, LegacyFeedRow, LegacyStore};
use crate::db::normalize;
use crate::error::Result;

/// Version-7 schema: feeds have no image_url yet.
pub const SCHEMA_AFTER: &str = r#"
-- feeds table
CREATE TABLE IF NOT EXISTS feeds (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    title TEXT NOT NULL,
    custom_title TEXT NOT NULL,
    url TEXT NOT NULL UNIQUE,
    tag TEXT NOT NULL DEFAULT '',
    notify INTEGER NOT NULL DEFAULT 0,
    last_sync TEXT NOT NULL DEFAULT '1970-01-01T00:00:00+00:00'
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

pub fn apply(tx: &Transaction) -> Result<()> {
    let (feeds, items) = {
        let store = LegacyStore::open(tx)?;
        (store.feeds()?, store.feed_items()?)
    };

    tx.execute_batch(SCHEMA_AFTER)?;

    // Feeds first so the item foreign keys resolve.
    for feed in &feeds {
        insert_feed(tx, feed)?;
    }
    for item in &items {
        insert_feed_item(tx, item)?;
    }

    tx.execute_batch(legacy::DROP_LEGACY_SQL)?;
    Ok(())
}

fn insert_feed(tx: &Transaction, row: &LegacyFeedRow) -> Result<()> {
    let url = normalize::parse_feed_url(&row.url)?;
    tx.execute(
        "INSERT INTO feeds (id, title, custom_title, url, tag, notify, last_sync)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
        params![
            row.id,
            row.title,
            row.custom_title,
            url.as_str(),
            normalize::text_or_empty(row.tag.clone()),
            normalize::flag_is_set(row.notify),
            normalize::epoch_start().to_rfc3339(),
        ],
    )?;
    Ok(())
}

fn insert_feed_item(tx: &Transaction, row: &LegacyFeedItemRow) -> Result<()> {
    tx.execute(
        "INSERT INTO feed_items (id, feed_id, guid, title, description, plain_title,
             plain_snippet, unread, notified, author, enclosure_link, image_url, pub_date, link)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14)",
        params![
            row.id,
            row.feed,
            row.guid,
            row.title,
            row.description,
            row.plain_title,
            row.plain_snippet,
            normalize::flag_not_cleared(row.unread),
            normalize::flag_is_set(row.notified),
            row.author,
            row.enclosure_link,
            row.image_url,
            normalize::parse_pub_date(row.pub_date.clone()).map(|date| date.to_rfc3339()),
            row.link,
        ],
    )?;
    Ok(())
}
