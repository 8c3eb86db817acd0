pub mod legacy;
pub mod migrations;
pub mod normalize;
pub mod repository;
pub mod schema;
pub mod signature;

pub use repository::Repository;

use std::path::Path;

use rusqlite::Connection;
use tracing::{debug, info};

use crate::error::{Result, StoreError};

/// Open the store file and bring it to the current schema version. Returns
/// the version reached; the connection is closed again so readers can open
/// the store afterwards.
pub fn migrate_path(path: &Path) -> Result<u32> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }
    let mut conn = Connection::open(path)?;
    conn.pragma_update(None, "foreign_keys", true)?;
    ensure_current_schema(&mut conn)
}

/// Version dispatch for an exclusively owned connection: create the current
/// schema on an empty store, run the migration chain on an old one, verify
/// an up-to-date one.
pub fn ensure_current_schema(conn: &mut Connection) -> Result<u32> {
    let version = schema::store_version(conn)?;
    match version {
        0 => {
            schema::create_current(conn)?;
            info!(version = schema::CURRENT_VERSION, "created store at current schema");
        }
        legacy::LEGACY_VERSION => {
            legacy::verify_schema(conn)?;
            migrations::apply_migrations(
                conn,
                version,
                schema::CURRENT_VERSION,
                migrations::steps(),
            )?;
            info!(
                from = version,
                to = schema::CURRENT_VERSION,
                "migrated legacy store"
            );
        }
        v if v == schema::CURRENT_VERSION => {
            schema::verify_current(conn)?;
            debug!(version = v, "store already at current schema");
        }
        v if v < schema::CURRENT_VERSION => {
            migrations::apply_migrations(conn, v, schema::CURRENT_VERSION, migrations::steps())?;
            info!(from = v, to = schema::CURRENT_VERSION, "migrated store");
        }
        v => {
            return Err(StoreError::SchemaMismatch {
                version: v,
                detail: format!(
                    "store is newer than this build's version {}",
                    schema::CURRENT_VERSION
                ),
            });
        }
    }
    Ok(schema::CURRENT_VERSION)
}
