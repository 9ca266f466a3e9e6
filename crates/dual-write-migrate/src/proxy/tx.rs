//! Dual-write transaction scope.

use tracing::warn;

use crate::error::{DualWriteError, Result};
use crate::pattern::{Pattern, Side};
use crate::router;
use crate::store::{Row, SqlValue, StoreStatements, StoreTx};

/// One in-flight dual-write transaction.
///
/// Owns at most one native transaction per store and a copy of the pattern
/// frozen at begin time: concurrent pattern updates never change the routing
/// of a transaction that is already open. Statement routing follows the same
/// rules as the pool, through the same router implementation.
pub struct DualWriteTx {
    pattern: Pattern,
    primary_side: Side,
    primary: Box<dyn StoreTx>,
    secondary: Option<(Side, Box<dyn StoreTx>)>,
}

impl DualWriteTx {
    pub(crate) fn new(
        pattern: Pattern,
        primary_side: Side,
        primary: Box<dyn StoreTx>,
        secondary: Option<(Side, Box<dyn StoreTx>)>,
    ) -> Self {
        DualWriteTx {
            pattern,
            primary_side,
            primary,
            secondary,
        }
    }

    /// The pattern this transaction was begun under.
    pub fn pattern(&self) -> Pattern {
        self.pattern
    }

    /// Whether the secondary store's transaction is open (false when the
    /// phase is single-store, or when the secondary `begin` failed and the
    /// transaction degraded).
    pub fn is_dual(&self) -> bool {
        self.secondary.is_some()
    }

    /// Execute a write statement inside the transaction.
    pub async fn execute(&self, sql: &str, params: &[SqlValue]) -> Result<u64> {
        router::write_through(
            (self.primary_side, self.primary.as_ref()),
            self.secondary
                .as_ref()
                .map(|(side, tx)| (*side, tx.as_ref())),
            sql,
            params,
        )
        .await
    }

    /// Run a row-set query against the transaction's read side.
    pub async fn query(&self, sql: &str, params: &[SqlValue]) -> Result<Vec<Row>> {
        self.primary.query(sql, params).await
    }

    /// Run a single-row query against the transaction's read side.
    pub async fn query_row(&self, sql: &str, params: &[SqlValue]) -> Result<Option<Row>> {
        self.primary.query_row(sql, params).await
    }

    /// Prepared statements are rejected, as at pool level.
    pub async fn prepare(&self, _sql: &str) -> Result<()> {
        Err(DualWriteError::PrepareUnsupported)
    }

    /// Commit both native transactions.
    ///
    /// The primary result is returned to the caller; the secondary commit is
    /// still attempted and its failure logged only, leaving any divergence to
    /// the validator/fixer loop.
    pub async fn commit(self) -> Result<()> {
        let DualWriteTx {
            primary_side,
            primary,
            secondary,
            ..
        } = self;

        let result = primary.commit().await;
        if let Err(err) = &result {
            warn!(side = %primary_side, error = %err, "primary store commit failed");
        }

        if let Some((side, tx)) = secondary {
            if let Err(err) = tx.commit().await {
                warn!(side = %side, error = %err, "secondary store commit failed, continuing");
            }
        }

        result
    }

    /// Roll back both native transactions, with the same authority rule as
    /// [`commit`](DualWriteTx::commit).
    pub async fn rollback(self) -> Result<()> {
        let DualWriteTx {
            primary_side,
            primary,
            secondary,
            ..
        } = self;

        let result = primary.rollback().await;
        if let Err(err) = &result {
            warn!(side = %primary_side, error = %err, "primary store rollback failed");
        }

        if let Some((side, tx)) = secondary {
            if let Err(err) = tx.rollback().await {
                warn!(side = %side, error = %err, "secondary store rollback failed, continuing");
            }
        }

        result
    }
}
