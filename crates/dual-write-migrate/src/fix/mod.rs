//! Event-driven repair of the target store.
//!
//! The fixer consumes [`InconsistencyEvent`]s and reconciles the target
//! store using base as ground truth. It owns no consumer loop: an external
//! bus subscriber invokes [`Fixer::fix`] once per received event and owns
//! polling, batching, and acknowledgement.
//!
//! Repairs are keyed by id and idempotent, so the same event may be applied
//! any number of times (at-least-once delivery is assumed) and independent
//! events may be applied concurrently.

use std::marker::PhantomData;
use std::sync::Arc;

use tracing::{debug, warn};

use crate::entity::Record;
use crate::error::Result;
use crate::sql;
use crate::store::{SqlValue, StoreClient, StoreStatements};
use crate::validate::{InconsistencyEvent, InconsistencyKind};

/// Repairer for one record type, using base as ground truth.
///
/// The select, upsert, and delete statements are computed once here from the
/// record's storage columns; repair itself needs no per-type code beyond the
/// [`Record`] contract.
pub struct Fixer<R: Record> {
    base: Arc<dyn StoreClient>,
    target: Arc<dyn StoreClient>,
    by_id_sql: String,
    upsert_sql: String,
    delete_sql: String,
    _record: PhantomData<fn() -> R>,
}

impl<R: Record> Fixer<R> {
    /// Create a fixer over the two stores.
    pub fn new(base: Arc<dyn StoreClient>, target: Arc<dyn StoreClient>) -> Self {
        Fixer {
            base,
            target,
            by_id_sql: sql::select_by_id_query(R::table(), R::id_column(), R::columns()),
            upsert_sql: sql::upsert_query(R::table(), R::id_column(), R::columns()),
            delete_sql: sql::delete_by_id_query(R::table(), R::id_column()),
            _record: PhantomData,
        }
    }

    /// Repair the target store for one event.
    ///
    /// - `base_missing`: the row is an orphan, delete it from target.
    /// - `neq` / `target_missing`: re-read base by id. If base no longer has
    ///   the row it was deleted after the event was produced, so delete it
    ///   from target too; otherwise upsert the authoritative row into target.
    ///   A failed base read is logged and skipped: never repair from an
    ///   uncertain read.
    ///
    /// Target-side errors propagate so the consumer loop can decide whether
    /// to redeliver.
    pub async fn fix(&self, event: &InconsistencyEvent) -> Result<()> {
        match event.kind {
            InconsistencyKind::BaseMissing => self.delete_from_target(event.id).await,
            InconsistencyKind::Neq | InconsistencyKind::TargetMissing => {
                let base_row = match self
                    .base
                    .query_row(&self.by_id_sql, &[SqlValue::I64(event.id)])
                    .await
                {
                    Ok(row) => row,
                    Err(err) => {
                        warn!(id = event.id, error = %err, "base re-read failed, skipping repair");
                        return Ok(());
                    }
                };

                match base_row {
                    None => self.delete_from_target(event.id).await,
                    Some(row) => {
                        let entity = R::from_row(&row)?;
                        self.target.execute(&self.upsert_sql, &entity.values()).await?;
                        debug!(id = event.id, table = R::table(), "upserted row into target");
                        Ok(())
                    }
                }
            }
        }
    }

    async fn delete_from_target(&self, id: i64) -> Result<()> {
        let deleted = self
            .target
            .execute(&self.delete_sql, &[SqlValue::I64(id)])
            .await?;
        debug!(id, table = R::table(), deleted, "deleted row from target");
        Ok(())
    }
}
