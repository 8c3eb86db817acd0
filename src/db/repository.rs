use rusqlite::Row;
use tokio_rusqlite::Connection;
use url::Url;

use crate::db::normalize;
use crate::db::schema;
use crate::error::{Result, StoreError};
use crate::models::{Feed, FeedItem};

/// Read access to a migrated store. Each call re-reads current state; opening
/// a store that has not been migrated fails instead of guessing at its shape.
pub struct Repository {
    conn: Connection,
}

impl Repository {
    pub async fn new(db_path: &str) -> Result<Self> {
        let conn = Connection::open(db_path).await?;

        let version = conn.call(|conn| Ok(schema::store_version(conn)?)).await?;
        if version != schema::CURRENT_VERSION {
            return Err(StoreError::SchemaMismatch {
                version,
                detail: format!("expected version {}", schema::CURRENT_VERSION),
            });
        }

        Ok(Self { conn })
    }

    /// All feeds, ordered by ascending id.
    pub async fn load_feeds(&self) -> Result<Vec<Feed>> {
        let feeds = self
            .conn
            .call(|conn| {
                let mut stmt = conn.prepare(
                    "SELECT id, title, custom_title, url, tag, notify, last_sync, image_url
                     FROM feeds ORDER BY id",
                )?;
                let feeds = stmt
                    .query_map([], feed_from_row)?
                    .collect::<std::result::Result<Vec<_>, _>>()?;
                Ok(feeds)
            })
            .await?;
        Ok(feeds)
    }

    /// All items of one feed, ordered by ascending id.
    pub async fn load_feed_items_in_feed(&self, feed_id: i64) -> Result<Vec<FeedItem>> {
        let items = self
            .conn
            .call(move |conn| {
                let mut stmt = conn.prepare(
                    "SELECT id, feed_id, guid, title, description, plain_title, plain_snippet,
                            unread, notified, author, enclosure_link, image_url, pub_date, link
                     FROM feed_items WHERE feed_id = ?1 ORDER BY id",
                )?;
                let items = stmt
                    .query_map([feed_id], feed_item_from_row)?
                    .collect::<std::result::Result<Vec<_>, _>>()?;
                Ok(items)
            })
            .await?;
        Ok(items)
    }

    /// Feeds with their count of unread items, ordered by ascending id.
    pub async fn load_feeds_with_unread_count(&self) -> Result<Vec<(Feed, i64)>> {
        let feeds = self
            .conn
            .call(|conn| {
                let mut stmt = conn.prepare(
                    "SELECT f.id, f.title, f.custom_title, f.url, f.tag, f.notify, f.last_sync,
                            f.image_url, COALESCE(u.unread_count, 0)
                     FROM feeds f
                     LEFT JOIN (SELECT feed_id, COUNT(1) AS unread_count
                         FROM feed_items
                         WHERE unread = 1
                         GROUP BY feed_id) u
                     ON f.id = u.feed_id
                     ORDER BY f.id",
                )?;
                let feeds = stmt
                    .query_map([], |row| Ok((feed_from_row(row)?, row.get(8)?)))?
                    .collect::<std::result::Result<Vec<_>, _>>()?;
                Ok(feeds)
            })
            .await?;
        Ok(feeds)
    }

    /// Distinct feed tags, sorted.
    pub async fn load_tags(&self) -> Result<Vec<String>> {
        let tags = self
            .conn
            .call(|conn| {
                let mut stmt = conn.prepare("SELECT DISTINCT tag FROM feeds ORDER BY tag")?;
                let tags = stmt
                    .query_map([], |row| row.get(0))?
                    .collect::<std::result::Result<Vec<_>, _>>()?;
                Ok(tags)
            })
            .await?;
        Ok(tags)
    }
}

fn feed_from_row(row: &Row) -> rusqlite::Result<Feed> {
    let url: String = row.get(3)?;
    let url = Url::parse(&url).map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(3, rusqlite::types::Type::Text, Box::new(e))
    })?;
    Ok(Feed {
        id: row.get(0)?,
        title: row.get(1)?,
        custom_title: row.get(2)?,
        url,
        tag: row.get(4)?,
        notify: row.get::<_, i64>(5)? != 0,
        last_sync: normalize::parse_timestamp(&row.get::<_, String>(6)?)
            .unwrap_or_else(normalize::epoch_start),
        image_url: row
            .get::<_, Option<String>>(7)?
            .and_then(|s| Url::parse(&s).ok()),
    })
}

fn feed_item_from_row(row: &Row) -> rusqlite::Result<FeedItem> {
    Ok(FeedItem {
        id: row.get(0)?,
        feed_id: row.get(1)?,
        guid: row.get(2)?,
        title: row.get(3)?,
        description: row.get(4)?,
        plain_title: row.get(5)?,
        plain_snippet: row.get(6)?,
        unread: row.get::<_, i64>(7)? != 0,
        notified: row.get::<_, i64>(8)? != 0,
        author: row.get(9)?,
        enclosure_link: row.get(10)?,
        image_url: row.get(11)?,
        pub_date: row
            .get::<_, Option<String>>(12)?
            .and_then(|s| normalize::parse_timestamp(&s)),
        link: row.get(13)?,
    })
}
