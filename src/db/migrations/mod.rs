//! Forward-only, versioned schema migrations.
//!
//! Each step transforms a committed schema version into the next one inside
//! its own transaction and declares, as canonical DDL, the schema it must
//! leave behind. The executor validates that declaration before committing,
//! so a store is only ever observed at a version whose shape checked out.

mod v5_to_v7;
mod v7_to_v8;

use rusqlite::{Connection, Transaction};
use tracing::info;

use crate::db::schema;
use crate::db::signature::SchemaSignature;
use crate::error::{Result, StoreError};

/// A single versioned schema transformation.
pub struct MigrationStep {
    pub from_version: u32,
    pub to_version: u32,
    pub apply: fn(&Transaction) -> Result<()>,
    /// Canonical DDL equivalent to the schema this step produces.
    pub schema_after: &'static str,
}

const STEPS: &[MigrationStep] = &[
    MigrationStep {
        from_version: 5,
        to_version: 7,
        apply: v5_to_v7::apply,
        schema_after: v5_to_v7::SCHEMA_AFTER,
    },
    MigrationStep {
        from_version: 7,
        to_version: 8,
        apply: v7_to_v8::apply,
        schema_after: schema::CREATE_SCHEMA_SQL,
    },
];

/// Every registered step, oldest first.
pub fn steps() -> &'static [MigrationStep] {
    STEPS
}

/// Bring the store from `from_version` to `to_version`, one committed step at
/// a time. On failure the store is left at the version reached so far, which
/// the error reports; already-committed steps are never rolled back.
pub fn apply_migrations(
    conn: &mut Connection,
    from_version: u32,
    to_version: u32,
    steps: &[MigrationStep],
) -> Result<()> {
    let chain = select_chain(steps, from_version, to_version)?;
    for step in chain {
        apply_step(conn, step)?;
    }
    Ok(())
}

/// The contiguous sub-sequence of `steps` covering `[from, to]`, or
/// [`StoreError::MigrationChainIncomplete`] when no gapless chain exists.
fn select_chain<'a>(
    steps: &'a [MigrationStep],
    from: u32,
    to: u32,
) -> Result<Vec<&'a MigrationStep>> {
    let incomplete = || StoreError::MigrationChainIncomplete { from, to };
    if from > to {
        return Err(incomplete());
    }

    let mut chain = Vec::new();
    let mut version = from;
    while version < to {
        let step = steps
            .iter()
            .find(|step| step.from_version == version && step.to_version <= to)
            .ok_or_else(incomplete)?;
        if step.to_version <= step.from_version {
            return Err(incomplete());
        }
        version = step.to_version;
        chain.push(step);
    }
    Ok(chain)
}

fn apply_step(conn: &mut Connection, step: &MigrationStep) -> Result<()> {
    info!(
        from = step.from_version,
        to = step.to_version,
        "applying migration step"
    );

    let tx = conn.transaction()?;
    (step.apply)(&tx).map_err(|source| StoreError::StepApplicationFailed {
        from: step.from_version,
        to: step.to_version,
        source: Box::new(source),
    })?;
    tx.pragma_update(None, "user_version", step.to_version)?;

    let expected = SchemaSignature::of_ddl(step.schema_after)?;
    let actual = SchemaSignature::read(&tx)?;
    if let Some(detail) = expected.diff(&actual) {
        // Dropping the transaction rolls this step back.
        return Err(StoreError::SchemaValidationFailed {
            from: step.from_version,
            to: step.to_version,
            detail,
        });
    }

    tx.commit()?;
    info!(version = step.to_version, "migration step committed");
    Ok(())
}
