//! Dual-write connection proxy.
//!
//! [`DualWritePool`] implements the same statement surface as a single-store
//! pool but internally owns a base client and a target client plus the live
//! pattern flag. Every call loads the pattern once (a single atomic read) and
//! routes through [`crate::router`]:
//!
//! | Pattern       | Writes                         | Reads       |
//! |---------------|--------------------------------|-------------|
//! | `source_only` | base only                      | base only   |
//! | `source_first`| base, then target best-effort  | base only   |
//! | `target_first`| target, then base best-effort  | target only |
//! | `target_only` | target only                    | target only |
//!
//! Secondary-store failures never surface to the caller; only the
//! authoritative store's health affects availability.

mod tx;

pub use tx::DualWriteTx;

use std::str::FromStr;
use std::sync::Arc;

use tracing::{info, warn};

use crate::error::{DualWriteError, Result};
use crate::pattern::{Pattern, PatternCell, Side};
use crate::router::{self, Route};
use crate::store::{Row, SqlValue, StoreClient, StoreStatements};

/// Connection proxy fanning statements out to one or both stores according
/// to the live migration pattern.
///
/// Cheap to share: embedders typically hold it in an `Arc` and hand clones of
/// that to request handlers and to the operational tooling that calls
/// [`update_pattern`](DualWritePool::update_pattern).
pub struct DualWritePool {
    base: Arc<dyn StoreClient>,
    target: Arc<dyn StoreClient>,
    pattern: PatternCell,
}

impl DualWritePool {
    /// Create a proxy over the two stores, starting in the given phase.
    pub fn new(
        base: Arc<dyn StoreClient>,
        target: Arc<dyn StoreClient>,
        initial: Pattern,
    ) -> Self {
        DualWritePool {
            base,
            target,
            pattern: PatternCell::new(initial),
        }
    }

    /// The currently active pattern.
    pub fn pattern(&self) -> Result<Pattern> {
        self.pattern.load()
    }

    /// Switch the live pattern from its operational string form.
    ///
    /// This is the pattern control surface for operational tooling. Unknown
    /// names fail with [`DualWriteError::UnknownPattern`]; in-flight
    /// transactions keep the pattern they froze at begin time.
    pub fn update_pattern(&self, pattern: &str) -> Result<()> {
        let next = Pattern::from_str(pattern)?;
        self.set_pattern(next);
        Ok(())
    }

    /// Switch the live pattern with an already-typed value.
    pub fn set_pattern(&self, next: Pattern) {
        let previous = self.pattern.load().ok();
        self.pattern.store(next);
        match previous {
            Some(prev) if prev != next => {
                info!(from = %prev, to = %next, "dual-write pattern updated")
            }
            _ => {}
        }
    }

    fn client_for(&self, side: Side) -> &Arc<dyn StoreClient> {
        match side {
            Side::Base => &self.base,
            Side::Target => &self.target,
        }
    }

    fn route(&self) -> Result<Route> {
        Ok(Route::for_pattern(self.pattern.load()?))
    }

    /// Execute a write statement, routed per the live pattern.
    pub async fn execute(&self, sql: &str, params: &[SqlValue]) -> Result<u64> {
        let route = self.route()?;
        router::write_through(
            (route.primary, self.client_for(route.primary).as_ref()),
            route
                .secondary
                .map(|side| (side, self.client_for(side).as_ref())),
            sql,
            params,
        )
        .await
    }

    /// Run a row-set query against the read side for the live pattern.
    pub async fn query(&self, sql: &str, params: &[SqlValue]) -> Result<Vec<Row>> {
        let route = self.route()?;
        self.client_for(route.primary).query(sql, params).await
    }

    /// Run a single-row query against the read side for the live pattern.
    pub async fn query_row(&self, sql: &str, params: &[SqlValue]) -> Result<Option<Row>> {
        let route = self.route()?;
        self.client_for(route.primary).query_row(sql, params).await
    }

    /// Prepared statements are rejected: a prepared handle would bind to one
    /// store and silently miss the other across a pattern change.
    pub async fn prepare(&self, _sql: &str) -> Result<()> {
        Err(DualWriteError::PrepareUnsupported)
    }

    /// Begin a dual-write transaction.
    ///
    /// The pattern is frozen here and reused for every statement in the
    /// transaction. The primary store's `begin` must succeed; a secondary
    /// `begin` failure degrades the transaction to single-store dual-write
    /// and is logged only.
    pub async fn begin(&self) -> Result<DualWriteTx> {
        let pattern = self.pattern.load()?;
        let route = Route::for_pattern(pattern);

        let primary = self.client_for(route.primary).begin().await.map_err(|err| {
            warn!(side = %route.primary, error = %err, "primary store begin failed");
            err
        })?;

        let secondary = match route.secondary {
            Some(side) => match self.client_for(side).begin().await {
                Ok(tx) => Some((side, tx)),
                Err(err) => {
                    warn!(
                        side = %side,
                        error = %err,
                        "secondary store begin failed, transaction degrades to primary only"
                    );
                    None
                }
            },
            None => None,
        };

        Ok(DualWriteTx::new(pattern, route.primary, primary, secondary))
    }
}
