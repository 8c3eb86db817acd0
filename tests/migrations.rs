use std::path::PathBuf;

use chrono::{DateTime, TimeZone, Utc};
use rusqlite::{params, Connection, Transaction};
use tempfile::TempDir;
use url::Url;

use feedstore::db::migrations::{self, MigrationStep};
use feedstore::db::{self, legacy, schema};
use feedstore::{Repository, Result, StoreError};

struct LegacyFixture {
    _dir: TempDir,
    path: PathBuf,
}

impl LegacyFixture {
    /// A version-5 store with no rows.
    fn empty() -> Self {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("feeds.db");
        let conn = Connection::open(&path).unwrap();
        legacy::install_schema(&conn).unwrap();
        Self { _dir: dir, path }
    }

    /// A version-5 store holding a bare-minimum feed and a fully populated
    /// one, two items each.
    fn seeded() -> Self {
        let fixture = Self::empty();
        let conn = fixture.connect();

        let id_a = insert_minimal_feed(&conn, "feedA", "feedACustom", "https://feedA");
        let id_b = insert_complete_feed(&conn);
        for index in 0..2 {
            insert_minimal_item(&conn, id_a, "feedA", "https://feedA", index);
            insert_complete_item(&conn, id_b, index);
        }
        fixture
    }

    fn connect(&self) -> Connection {
        Connection::open(&self.path).unwrap()
    }

    fn path_str(&self) -> &str {
        self.path.to_str().unwrap()
    }

    fn user_version(&self) -> u32 {
        schema::store_version(&self.connect()).unwrap()
    }
}

fn insert_minimal_feed(conn: &Connection, title: &str, custom_title: &str, url: &str) -> i64 {
    conn.execute(
        "INSERT INTO Feed (title, customtitle, url, tag) VALUES (?1, ?2, ?3, '')",
        params![title, custom_title, url],
    )
    .unwrap();
    conn.last_insert_rowid()
}

fn insert_complete_feed(conn: &Connection) -> i64 {
    conn.execute(
        "INSERT INTO Feed (title, customtitle, url, tag, notify)
         VALUES ('feedB', 'feedBCustom', 'https://feedB', 'tag', 1)",
        [],
    )
    .unwrap();
    conn.last_insert_rowid()
}

fn insert_minimal_item(conn: &Connection, feed: i64, feed_title: &str, feed_url: &str, index: i64) {
    conn.execute(
        "INSERT INTO FeedItem (guid, title, description, plaintitle, plainsnippet,
             feed, feedtitle, feedurl, tag)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, '')",
        params![
            format!("guid{index}"),
            format!("title{index}"),
            format!("desc{index}"),
            format!("plain{index}"),
            format!("snippet{index}"),
            feed,
            feed_title,
            feed_url,
        ],
    )
    .unwrap();
}

fn insert_complete_item(conn: &Connection, feed: i64, index: i64) {
    conn.execute(
        "INSERT INTO FeedItem (guid, title, description, plaintitle, plainsnippet,
             feed, feedtitle, feedurl, tag, notified, unread, author, enclosurelink,
             imageurl, pubdate, link)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, 'feedB', 'https://feedB', 'tag', 1, 0,
             ?7, ?8, ?9, '2018-02-03T04:05:00', ?10)",
        params![
            format!("guid{index}"),
            format!("title{index}"),
            format!("desc{index}"),
            format!("plain{index}"),
            format!("snippet{index}"),
            feed,
            format!("author{index}"),
            format!("https://enclosure{index}"),
            format!("https://image{index}"),
            format!("https://link{index}"),
        ],
    )
    .unwrap();
}

fn broken_apply(_tx: &Transaction) -> Result<()> {
    Ok(())
}

const BROKEN_SCHEMA_AFTER: &str = "CREATE TABLE IF NOT EXISTS extras (id INTEGER PRIMARY KEY);";

#[tokio::test]
async fn migrated_minimal_feed_uses_defaults() {
    let fixture = LegacyFixture::seeded();
    assert_eq!(db::migrate_path(&fixture.path).unwrap(), 8);

    let repository = Repository::new(fixture.path_str()).await.unwrap();
    let feeds = repository.load_feeds().await.unwrap();
    assert_eq!(feeds.len(), 2, "wrong number of feeds");

    let feed_a = &feeds[0];
    assert_eq!(feed_a.title, "feedA");
    assert_eq!(feed_a.custom_title, "feedACustom");
    assert_eq!(feed_a.url, Url::parse("https://feedA").unwrap());
    assert_eq!(feed_a.tag, "");
    assert_eq!(feed_a.last_sync, DateTime::<Utc>::UNIX_EPOCH);
    assert!(!feed_a.notify);
    assert_eq!(feed_a.image_url, None);
}

#[tokio::test]
async fn migrated_complete_feed_keeps_values() {
    let fixture = LegacyFixture::seeded();
    db::migrate_path(&fixture.path).unwrap();

    let repository = Repository::new(fixture.path_str()).await.unwrap();
    let feeds = repository.load_feeds().await.unwrap();
    assert_eq!(feeds.len(), 2, "wrong number of feeds");

    let feed_b = &feeds[1];
    assert_eq!(feed_b.title, "feedB");
    assert_eq!(feed_b.custom_title, "feedBCustom");
    assert_eq!(feed_b.url, Url::parse("https://feedB").unwrap());
    assert_eq!(feed_b.tag, "tag");
    assert_eq!(feed_b.last_sync, DateTime::<Utc>::UNIX_EPOCH);
    assert!(feed_b.notify);
    assert_eq!(feed_b.image_url, None);
}

#[tokio::test]
async fn migrated_minimal_items_default_to_unread() {
    let fixture = LegacyFixture::seeded();
    db::migrate_path(&fixture.path).unwrap();

    let repository = Repository::new(fixture.path_str()).await.unwrap();
    let feed = repository.load_feeds().await.unwrap()[0].clone();
    assert_eq!(feed.title, "feedA");

    let items = repository.load_feed_items_in_feed(feed.id).await.unwrap();
    assert_eq!(items.len(), 2);

    for (index, item) in items.iter().enumerate() {
        assert_eq!(item.feed_id, feed.id);
        assert_eq!(item.guid, format!("guid{index}"));
        assert_eq!(item.title, format!("title{index}"));
        assert_eq!(item.description, format!("desc{index}"));
        assert_eq!(item.plain_title, format!("plain{index}"));
        assert_eq!(item.plain_snippet, format!("snippet{index}"));
        assert!(item.unread);
        assert!(!item.notified);
        assert_eq!(item.author, None);
        assert_eq!(item.enclosure_link, None);
        assert_eq!(item.image_url, None);
        assert_eq!(item.pub_date, None);
        assert_eq!(item.link, None);
    }
}

#[tokio::test]
async fn migrated_complete_items_keep_values() {
    let fixture = LegacyFixture::seeded();
    db::migrate_path(&fixture.path).unwrap();

    let repository = Repository::new(fixture.path_str()).await.unwrap();
    let feed = repository.load_feeds().await.unwrap()[1].clone();
    assert_eq!(feed.title, "feedB");

    let items = repository.load_feed_items_in_feed(feed.id).await.unwrap();
    assert_eq!(items.len(), 2);

    let pub_date = Utc.with_ymd_and_hms(2018, 2, 3, 4, 5, 0).unwrap();
    for (index, item) in items.iter().enumerate() {
        assert_eq!(item.feed_id, feed.id);
        assert_eq!(item.guid, format!("guid{index}"));
        assert_eq!(item.title, format!("title{index}"));
        assert_eq!(item.description, format!("desc{index}"));
        assert_eq!(item.plain_title, format!("plain{index}"));
        assert_eq!(item.plain_snippet, format!("snippet{index}"));
        assert!(!item.unread);
        assert!(item.notified);
        assert_eq!(item.author.as_deref(), Some(format!("author{index}").as_str()));
        assert_eq!(
            item.enclosure_link.as_deref(),
            Some(format!("https://enclosure{index}").as_str())
        );
        assert_eq!(
            item.image_url.as_deref(),
            Some(format!("https://image{index}").as_str())
        );
        assert_eq!(item.pub_date, Some(pub_date));
        assert_eq!(item.link.as_deref(), Some(format!("https://link{index}").as_str()));
    }
}

#[test]
fn gap_in_chain_leaves_store_untouched() {
    let fixture = LegacyFixture::seeded();

    let mut conn = fixture.connect();
    let err = migrations::apply_migrations(&mut conn, 5, 8, &migrations::steps()[1..]).unwrap_err();
    assert!(matches!(
        err,
        StoreError::MigrationChainIncomplete { from: 5, to: 8 }
    ));
    drop(conn);

    assert_eq!(fixture.user_version(), 5);
    legacy::verify_schema(&fixture.connect()).unwrap();
}

#[tokio::test]
async fn rows_are_ordered_by_ascending_id() {
    let fixture = LegacyFixture::empty();
    {
        let conn = fixture.connect();
        conn.execute(
            "INSERT INTO Feed (id, title, customtitle, url, tag)
             VALUES (2, 'second', 'second', 'https://second', '')",
            [],
        )
        .unwrap();
        conn.execute(
            "INSERT INTO Feed (id, title, customtitle, url, tag)
             VALUES (1, 'first', 'first', 'https://first', '')",
            [],
        )
        .unwrap();
        for id in [20, 10] {
            conn.execute(
                "INSERT INTO FeedItem (id, guid, title, description, plaintitle, plainsnippet,
                     feed, feedtitle, feedurl, tag)
                 VALUES (?1, ?2, 'title', 'desc', 'plain', 'snippet', 1, 'first', 'https://first', '')",
                params![id, format!("guid{id}")],
            )
            .unwrap();
        }
    }
    db::migrate_path(&fixture.path).unwrap();

    let repository = Repository::new(fixture.path_str()).await.unwrap();
    let feed_ids: Vec<i64> = repository
        .load_feeds()
        .await
        .unwrap()
        .iter()
        .map(|feed| feed.id)
        .collect();
    assert_eq!(feed_ids, vec![1, 2]);

    let item_ids: Vec<i64> = repository
        .load_feed_items_in_feed(1)
        .await
        .unwrap()
        .iter()
        .map(|item| item.id)
        .collect();
    assert_eq!(item_ids, vec![10, 20]);
}

#[test]
fn invalid_feed_url_aborts_the_copying_step() {
    let fixture = LegacyFixture::empty();
    insert_minimal_feed(&fixture.connect(), "bad", "bad", "not a url");

    let err = db::migrate_path(&fixture.path).unwrap_err();
    match err {
        StoreError::StepApplicationFailed { from, to, source } => {
            assert_eq!((from, to), (5, 7));
            assert!(matches!(*source, StoreError::InvalidUrl { .. }));
        }
        other => panic!("unexpected error: {other}"),
    }

    assert_eq!(fixture.user_version(), 5);
    legacy::verify_schema(&fixture.connect()).unwrap();
}

#[test]
fn legacy_artifacts_do_not_survive_migration() {
    let fixture = LegacyFixture::seeded();
    db::migrate_path(&fixture.path).unwrap();

    let conn = fixture.connect();
    let leftovers: i64 = conn
        .query_row(
            "SELECT COUNT(*) FROM sqlite_master
             WHERE name IN ('Feed', 'FeedItem', 'TagsView', 'trigger_tag_updater')",
            [],
            |row| row.get(0),
        )
        .unwrap();
    assert_eq!(leftovers, 0);
    schema::verify_current(&conn).unwrap();
}

#[tokio::test]
async fn fresh_store_is_created_at_current_version() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("feeds.db");

    assert_eq!(db::migrate_path(&path).unwrap(), 8);
    schema::verify_current(&Connection::open(&path).unwrap()).unwrap();

    let repository = Repository::new(path.to_str().unwrap()).await.unwrap();
    assert!(repository.load_feeds().await.unwrap().is_empty());
}

#[test]
fn failed_validation_rolls_back_the_step() {
    let fixture = LegacyFixture::seeded();
    db::migrate_path(&fixture.path).unwrap();

    let broken = MigrationStep {
        from_version: 8,
        to_version: 9,
        apply: broken_apply,
        schema_after: BROKEN_SCHEMA_AFTER,
    };
    let mut conn = fixture.connect();
    let err = migrations::apply_migrations(&mut conn, 8, 9, &[broken]).unwrap_err();
    assert!(matches!(
        err,
        StoreError::SchemaValidationFailed { from: 8, to: 9, .. }
    ));
    drop(conn);

    assert_eq!(fixture.user_version(), 8);
    schema::verify_current(&fixture.connect()).unwrap();
}

#[test]
fn committed_steps_survive_a_later_failure() {
    let fixture = LegacyFixture::seeded();
    let real = migrations::steps();
    let steps = [
        MigrationStep {
            from_version: real[0].from_version,
            to_version: real[0].to_version,
            apply: real[0].apply,
            schema_after: real[0].schema_after,
        },
        MigrationStep {
            from_version: real[1].from_version,
            to_version: real[1].to_version,
            apply: real[1].apply,
            schema_after: real[1].schema_after,
        },
        MigrationStep {
            from_version: 8,
            to_version: 9,
            apply: broken_apply,
            schema_after: BROKEN_SCHEMA_AFTER,
        },
    ];

    let mut conn = fixture.connect();
    let err = migrations::apply_migrations(&mut conn, 5, 9, &steps).unwrap_err();
    assert!(matches!(
        err,
        StoreError::SchemaValidationFailed { from: 8, to: 9, .. }
    ));
    drop(conn);

    // The first two steps stay committed; only the failing one rolled back.
    assert_eq!(fixture.user_version(), 8);
    schema::verify_current(&fixture.connect()).unwrap();
}

#[tokio::test]
async fn repository_rejects_unmigrated_store() {
    let fixture = LegacyFixture::seeded();

    let err = Repository::new(fixture.path_str()).await.unwrap_err();
    assert!(matches!(err, StoreError::SchemaMismatch { version: 5, .. }));
}

#[tokio::test]
async fn unread_counts_and_tags_after_migration() {
    let fixture = LegacyFixture::seeded();
    db::migrate_path(&fixture.path).unwrap();

    let repository = Repository::new(fixture.path_str()).await.unwrap();
    let feeds = repository.load_feeds_with_unread_count().await.unwrap();
    assert_eq!(feeds.len(), 2);
    assert_eq!((feeds[0].0.title.as_str(), feeds[0].1), ("feedA", 2));
    assert_eq!((feeds[1].0.title.as_str(), feeds[1].1), ("feedB", 0));

    assert_eq!(
        repository.load_tags().await.unwrap(),
        vec!["".to_string(), "tag".to_string()]
    );
}
