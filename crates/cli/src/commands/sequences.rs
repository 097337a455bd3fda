//! Id sequence maintenance.
//!
//! Rows imported from another system carry their own ids. Before the engine
//! allocates new ids, every sequence has to be raised above the highest id
//! already stored in its table.
//!
//! # Usage
//!
//! ```bash
//! tristore sequences sync
//! tristore sequences show
//! ```

use tristore_engine::store::IdSequence;
use tristore_engine::store::postgres::{PgIdAllocator, PgRelationalStore};

use super::{CommandError, connect};

/// Advance each relational sequence to its table's highest id.
///
/// # Errors
///
/// Returns an error if the database is unreachable or a query fails.
pub async fn sync() -> Result<(), CommandError> {
    let pool = connect().await?;
    let relational = PgRelationalStore::new(pool.clone());
    let ids = PgIdAllocator::new(pool);

    for sequence in IdSequence::RELATIONAL {
        let highest = relational.max_id(sequence).await?;
        let value = ids.advance_to(sequence, highest).await?;
        tracing::info!(sequence = sequence.name(), highest, value, "Sequence synced");
    }

    tracing::info!("Sequences synced!");
    Ok(())
}

/// Log each relational sequence next to its table's highest id.
///
/// # Errors
///
/// Returns an error if the database is unreachable or a query fails.
pub async fn show() -> Result<(), CommandError> {
    let pool = connect().await?;
    let relational = PgRelationalStore::new(pool.clone());
    let ids = PgIdAllocator::new(pool);

    for sequence in IdSequence::RELATIONAL {
        let highest = relational.max_id(sequence).await?;
        let value = ids.current(sequence).await?;
        if value < highest {
            tracing::warn!(sequence = sequence.name(), highest, value, "Sequence behind table");
        } else {
            tracing::info!(sequence = sequence.name(), highest, value, "Sequence");
        }
    }
    Ok(())
}
