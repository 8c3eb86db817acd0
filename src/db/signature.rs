//! Structural schema fingerprints.
//!
//! A [`SchemaSignature`] captures tables (columns with declared type,
//! NOT NULL, default and primary-key flags), named indexes, triggers and
//! views. Expected signatures are built by executing canonical DDL against a
//! scratch in-memory database, so comparison is independent of how the live
//! store reached its shape (a table grown via `ALTER TABLE` compares equal to
//! one created in its final form).

use std::collections::{BTreeMap, BTreeSet};

use rusqlite::Connection;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnShape {
    pub name: String,
    pub decl_type: String,
    pub not_null: bool,
    pub default: Option<String>,
    pub primary_key: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexShape {
    pub table: String,
    pub unique: bool,
    pub columns: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct SchemaSignature {
    pub tables: BTreeMap<String, Vec<ColumnShape>>,
    /// Explicitly created indexes only; constraint-backed ones are implied
    /// by the column shapes.
    pub indexes: BTreeMap<String, IndexShape>,
    /// Trigger name to the table it fires on.
    pub triggers: BTreeMap<String, String>,
    pub views: BTreeSet<String>,
}

impl SchemaSignature {
    /// Fingerprint the main schema of an open store.
    pub fn read(conn: &Connection) -> rusqlite::Result<Self> {
        let mut signature = SchemaSignature::default();

        let mut stmt = conn.prepare(
            "SELECT name FROM sqlite_master WHERE type = 'table' AND name NOT LIKE 'sqlite_%' ORDER BY name",
        )?;
        let tables = stmt
            .query_map([], |row| row.get::<_, String>(0))?
            .collect::<rusqlite::Result<Vec<_>>>()?;

        for table in tables {
            let columns = read_columns(conn, &table)?;
            read_indexes(conn, &table, &mut signature.indexes)?;
            signature.tables.insert(table, columns);
        }

        let mut stmt = conn
            .prepare("SELECT name, tbl_name FROM sqlite_master WHERE type = 'trigger' ORDER BY name")?;
        let triggers = stmt
            .query_map([], |row| Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?)))?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        signature.triggers.extend(triggers);

        let mut stmt =
            conn.prepare("SELECT name FROM sqlite_master WHERE type = 'view' ORDER BY name")?;
        let views = stmt
            .query_map([], |row| row.get::<_, String>(0))?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        signature.views.extend(views);

        Ok(signature)
    }

    /// Fingerprint of the schema the given DDL produces on an empty store.
    pub fn of_ddl(ddl: &str) -> rusqlite::Result<Self> {
        let scratch = Connection::open_in_memory()?;
        scratch.execute_batch(ddl)?;
        Self::read(&scratch)
    }

    /// First discrepancy between this expected signature and an actual one,
    /// or `None` when the shapes match.
    pub fn diff(&self, actual: &SchemaSignature) -> Option<String> {
        for name in self.tables.keys() {
            if !actual.tables.contains_key(name) {
                return Some(format!("missing table '{name}'"));
            }
        }
        for name in actual.tables.keys() {
            if !self.tables.contains_key(name) {
                return Some(format!("unexpected table '{name}'"));
            }
        }
        for (name, expected) in &self.tables {
            let found = &actual.tables[name];
            if expected != found {
                return Some(format!(
                    "table '{name}' columns differ: expected {expected:?}, found {found:?}"
                ));
            }
        }

        for (name, expected) in &self.indexes {
            match actual.indexes.get(name) {
                None => return Some(format!("missing index '{name}'")),
                Some(found) if found != expected => {
                    return Some(format!(
                        "index '{name}' differs: expected {expected:?}, found {found:?}"
                    ));
                }
                Some(_) => {}
            }
        }
        for name in actual.indexes.keys() {
            if !self.indexes.contains_key(name) {
                return Some(format!("unexpected index '{name}'"));
            }
        }

        for (name, table) in &self.triggers {
            match actual.triggers.get(name) {
                None => return Some(format!("missing trigger '{name}' on '{table}'")),
                Some(found) if found != table => {
                    return Some(format!(
                        "trigger '{name}' fires on '{found}', expected '{table}'"
                    ));
                }
                Some(_) => {}
            }
        }
        for name in actual.triggers.keys() {
            if !self.triggers.contains_key(name) {
                return Some(format!("unexpected trigger '{name}'"));
            }
        }

        if let Some(name) = self.views.difference(&actual.views).next() {
            return Some(format!("missing view '{name}'"));
        }
        if let Some(name) = actual.views.difference(&self.views).next() {
            return Some(format!("unexpected view '{name}'"));
        }

        None
    }
}

fn read_columns(conn: &Connection, table: &str) -> rusqlite::Result<Vec<ColumnShape>> {
    let mut stmt = conn.prepare(
        "SELECT name, type, \"notnull\", dflt_value, pk FROM pragma_table_info(?1) ORDER BY cid",
    )?;
    let columns = stmt.query_map([table], |row| {
        Ok(ColumnShape {
            name: row.get(0)?,
            decl_type: row.get::<_, String>(1)?.to_ascii_uppercase(),
            not_null: row.get::<_, i64>(2)? != 0,
            default: row.get(3)?,
            primary_key: row.get::<_, i64>(4)? != 0,
        })
    })?;
    columns.collect()
}

fn read_indexes(
    conn: &Connection,
    table: &str,
    indexes: &mut BTreeMap<String, IndexShape>,
) -> rusqlite::Result<()> {
    let mut stmt = conn.prepare(
        "SELECT name, \"unique\" FROM pragma_index_list(?1) WHERE origin = 'c' ORDER BY name",
    )?;
    let listed = stmt
        .query_map([table], |row| {
            Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)? != 0))
        })?
        .collect::<rusqlite::Result<Vec<_>>>()?;

    for (name, unique) in listed {
        let mut stmt =
            conn.prepare("SELECT name FROM pragma_index_info(?1) ORDER BY seqno")?;
        let columns = stmt
            .query_map([&name], |row| {
                Ok(row
                    .get::<_, Option<String>>(0)?
                    .unwrap_or_else(|| "<expr>".to_string()))
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        indexes.insert(
            name,
            IndexShape {
                table: table.to_string(),
                unique,
                columns,
            },
        );
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    const DDL: &str = r#"
        CREATE TABLE feeds (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            url TEXT NOT NULL UNIQUE,
            tag TEXT NOT NULL DEFAULT ''
        );
        CREATE INDEX idx_feeds_url ON feeds(url);
    "#;

    #[test]
    fn identical_ddl_has_no_diff() {
        let expected = SchemaSignature::of_ddl(DDL).unwrap();
        let actual = SchemaSignature::of_ddl(DDL).unwrap();
        assert_eq!(expected.diff(&actual), None);
    }

    #[test]
    fn grown_table_matches_final_form() {
        let conn = Connection::open_in_memory().unwrap();
        conn.execute_batch(
            "CREATE TABLE feeds (id INTEGER PRIMARY KEY AUTOINCREMENT, url TEXT NOT NULL UNIQUE, tag TEXT NOT NULL DEFAULT '');
             CREATE INDEX idx_feeds_url ON feeds(url);
             ALTER TABLE feeds ADD COLUMN image_url TEXT;",
        )
        .unwrap();
        let expected = SchemaSignature::of_ddl(
            "CREATE TABLE feeds (id INTEGER PRIMARY KEY AUTOINCREMENT, url TEXT NOT NULL UNIQUE, tag TEXT NOT NULL DEFAULT '', image_url TEXT);
             CREATE INDEX idx_feeds_url ON feeds(url);",
        )
        .unwrap();
        assert_eq!(expected.diff(&SchemaSignature::read(&conn).unwrap()), None);
    }

    #[test]
    fn missing_column_is_reported() {
        let expected = SchemaSignature::of_ddl(DDL).unwrap();
        let actual = SchemaSignature::of_ddl(
            "CREATE TABLE feeds (id INTEGER PRIMARY KEY AUTOINCREMENT, url TEXT NOT NULL UNIQUE);
             CREATE INDEX idx_feeds_url ON feeds(url);",
        )
        .unwrap();
        let detail = expected.diff(&actual).unwrap();
        assert!(detail.contains("feeds"), "unexpected detail: {detail}");
    }

    #[test]
    fn leftover_objects_are_reported() {
        let expected = SchemaSignature::of_ddl(DDL).unwrap();
        let mut ddl = DDL.to_string();
        ddl.push_str("CREATE VIEW TagsView AS SELECT DISTINCT tag FROM feeds;");
        let actual = SchemaSignature::of_ddl(&ddl).unwrap();
        assert_eq!(
            expected.diff(&actual),
            Some("unexpected view 'TagsView'".to_string())
        );
    }
}
