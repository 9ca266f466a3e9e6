//! Two-directional consistency validation.
//!
//! A validation pass runs two independent full-store scans concurrently:
//!
//! - **Base→target** walks the base store one row at a time in ascending id
//!   order and compares each row against its target counterpart, detecting
//!   stale (`neq`) and missing (`target_missing`) target rows.
//! - **Target→base** walks the target store in id-only batches and probes
//!   base existence with one `IN` query per batch, detecting orphaned target
//!   rows (`base_missing`) that the first direction cannot see.
//!
//! Both scans are best-effort: any single query error is logged and the scan
//! advances. Only cancellation of the caller's token aborts a pass. Detected
//! divergence is published as [`InconsistencyEvent`]s through the injected
//! [`EventProducer`]; publish failures are logged, never retried here.

use std::collections::HashSet;
use std::future::Future;
use std::marker::PhantomData;
use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::entity::{Entity, Record};
use crate::error::{DualWriteError, Result};
use crate::sql;
use crate::store::{SqlValue, StoreClient, StoreStatements};

/// Which scan produced an event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScanDirection {
    /// Base store walked, target store probed.
    BaseToTarget,
    /// Target store walked, base store probed.
    TargetToBase,
}

impl std::fmt::Display for ScanDirection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ScanDirection::BaseToTarget => write!(f, "base_to_target"),
            ScanDirection::TargetToBase => write!(f, "target_to_base"),
        }
    }
}

/// Kind of divergence detected for one entity id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InconsistencyKind {
    /// Present in both stores with differing values.
    Neq,
    /// Present in base, absent from target.
    TargetMissing,
    /// Present in target, absent from base (orphan).
    BaseMissing,
}

/// Record of detected divergence between base and target for one entity id.
///
/// Produced at most once per divergence per pass; duplicates across passes
/// are expected and must be idempotently repairable.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InconsistencyEvent {
    /// Entity identifier the divergence was observed for.
    pub id: i64,
    /// Scan direction that observed it.
    pub direction: ScanDirection,
    /// Kind of divergence.
    pub kind: InconsistencyKind,
    /// When the divergence was observed.
    pub detected_at: DateTime<Utc>,
}

/// Event bus producer boundary.
///
/// Publication is fire-and-forget from the validator's perspective: delivery
/// failures are logged, not retried.
#[async_trait]
pub trait EventProducer: Send + Sync {
    /// Publish one inconsistency event.
    async fn produce(&self, event: &InconsistencyEvent) -> Result<()>;
}

/// Tuning for a validation pass.
#[derive(Debug, Clone)]
pub struct ValidatorConfig {
    /// Page size for the target→base id scan.
    pub batch_size: usize,
    /// Deadline applied to each individual query; an expired row or batch is
    /// logged and skipped, it does not abort the pass.
    pub query_timeout: Duration,
}

impl Default for ValidatorConfig {
    fn default() -> Self {
        ValidatorConfig {
            batch_size: 100,
            query_timeout: Duration::from_secs(30),
        }
    }
}

/// Counters for one scan direction.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DirectionStats {
    /// Rows (or ids) the scan advanced over.
    pub rows_scanned: u64,
    /// Divergences detected and handed to the producer.
    pub inconsistencies: u64,
    /// Queries that errored or timed out and were skipped.
    pub query_errors: u64,
}

/// Result of one full validation pass.
#[derive(Debug, Clone)]
pub struct ValidateStats {
    /// Identifier of this pass, stamped on log lines.
    pub pass_id: Uuid,
    /// Base→target scan counters.
    pub base_to_target: DirectionStats,
    /// Target→base scan counters.
    pub target_to_base: DirectionStats,
    /// Wall-clock duration of the pass.
    pub duration_ms: u64,
}

impl ValidateStats {
    /// Total divergences detected across both directions.
    pub fn total_inconsistencies(&self) -> u64 {
        self.base_to_target.inconsistencies + self.target_to_base.inconsistencies
    }
}

/// Two-directional full-scan consistency validator for one record type.
pub struct Validator<R: Record> {
    base: Arc<dyn StoreClient>,
    target: Arc<dyn StoreClient>,
    producer: Arc<dyn EventProducer>,
    config: ValidatorConfig,
    row_at_sql: String,
    by_id_sql: String,
    id_page_sql: String,
    _record: PhantomData<fn() -> R>,
}

impl<R: Record> Validator<R> {
    /// Create a validator over the two stores with an injected producer.
    ///
    /// Scan statements are generated once here from the record's storage
    /// metadata.
    pub fn new(
        base: Arc<dyn StoreClient>,
        target: Arc<dyn StoreClient>,
        producer: Arc<dyn EventProducer>,
        config: ValidatorConfig,
    ) -> Self {
        Validator {
            base,
            target,
            producer,
            config,
            row_at_sql: sql::select_row_at_query(R::table(), R::id_column(), R::columns()),
            by_id_sql: sql::select_by_id_query(R::table(), R::id_column(), R::columns()),
            id_page_sql: sql::select_id_page_query(R::table(), R::id_column()),
            _record: PhantomData,
        }
    }

    /// Run both scan directions concurrently and return once both complete.
    ///
    /// The first fatal error in either direction cancels the sibling scan.
    /// Since the scans are resilient to per-query failures, the only fatal
    /// error is cancellation of `cancel`.
    pub async fn validate(&self, cancel: &CancellationToken) -> Result<ValidateStats> {
        let pass_id = Uuid::new_v4();
        let start = Instant::now();
        info!(pass = %pass_id, table = R::table(), "starting consistency validation pass");

        let scoped = cancel.child_token();
        let (base_to_target, target_to_base) = tokio::try_join!(
            async {
                self.scan_base_to_target(&scoped).await.map_err(|err| {
                    scoped.cancel();
                    err
                })
            },
            async {
                self.scan_target_to_base(&scoped).await.map_err(|err| {
                    scoped.cancel();
                    err
                })
            },
        )?;

        let stats = ValidateStats {
            pass_id,
            base_to_target,
            target_to_base,
            duration_ms: start.elapsed().as_millis() as u64,
        };
        info!(
            pass = %pass_id,
            table = R::table(),
            inconsistencies = stats.total_inconsistencies(),
            duration_ms = stats.duration_ms,
            "consistency validation pass complete"
        );
        Ok(stats)
    }

    /// Apply the per-query deadline and the pass cancellation token to one
    /// store call.
    async fn guarded<T>(
        &self,
        cancel: &CancellationToken,
        fut: impl Future<Output = Result<T>>,
    ) -> Result<T> {
        tokio::select! {
            _ = cancel.cancelled() => Err(DualWriteError::Cancelled),
            outcome = tokio::time::timeout(self.config.query_timeout, fut) => match outcome {
                Ok(result) => result,
                Err(_) => Err(DualWriteError::Timeout(self.config.query_timeout)),
            },
        }
    }

    /// Build and publish one event; publish failures are logged only.
    async fn emit(
        &self,
        direction: ScanDirection,
        kind: InconsistencyKind,
        id: i64,
        stats: &mut DirectionStats,
    ) {
        stats.inconsistencies += 1;
        let event = InconsistencyEvent {
            id,
            direction,
            kind,
            detected_at: Utc::now(),
        };
        debug!(id, direction = %direction, kind = ?kind, "inconsistency detected");
        if let Err(err) = self.producer.produce(&event).await {
            warn!(id, error = %err, "failed to publish inconsistency event");
        }
    }

    /// Walk base in ascending id order, one row per query, and compare each
    /// row against target. End-of-rows is the success condition.
    async fn scan_base_to_target(&self, cancel: &CancellationToken) -> Result<DirectionStats> {
        let direction = ScanDirection::BaseToTarget;
        let mut stats = DirectionStats::default();
        let mut offset: i64 = 0;

        loop {
            let fetched = self
                .guarded(cancel, self.base.query_row(&self.row_at_sql, &[SqlValue::I64(offset)]))
                .await;
            let row = match fetched {
                Ok(Some(row)) => row,
                Ok(None) => break,
                Err(DualWriteError::Cancelled) => return Err(DualWriteError::Cancelled),
                Err(err) => {
                    warn!(offset, error = %err, "base row fetch failed, skipping position");
                    stats.query_errors += 1;
                    offset += 1;
                    continue;
                }
            };
            stats.rows_scanned += 1;

            let base_entity = match R::from_row(&row) {
                Ok(entity) => entity,
                Err(err) => {
                    warn!(offset, error = %err, "base row decode failed, skipping position");
                    stats.query_errors += 1;
                    offset += 1;
                    continue;
                }
            };
            let id = base_entity.id();

            let lookup = self
                .guarded(cancel, self.target.query_row(&self.by_id_sql, &[SqlValue::I64(id)]))
                .await;
            match lookup {
                Ok(None) => {
                    self.emit(direction, InconsistencyKind::TargetMissing, id, &mut stats)
                        .await;
                }
                Ok(Some(target_row)) => match R::from_row(&target_row) {
                    Ok(target_entity) => {
                        if !base_entity.semantic_eq(&target_entity) {
                            self.emit(direction, InconsistencyKind::Neq, id, &mut stats)
                                .await;
                        }
                    }
                    Err(err) => {
                        warn!(id, error = %err, "target row decode failed, skipping row");
                        stats.query_errors += 1;
                    }
                },
                Err(DualWriteError::Cancelled) => return Err(DualWriteError::Cancelled),
                Err(err) => {
                    warn!(id, error = %err, "target lookup failed, skipping row");
                    stats.query_errors += 1;
                }
            }

            offset += 1;
        }

        Ok(stats)
    }

    /// Walk target in id-only pages and probe base existence per page; ids
    /// the probe does not return are orphans. A short or empty page ends the
    /// scan.
    async fn scan_target_to_base(&self, cancel: &CancellationToken) -> Result<DirectionStats> {
        let direction = ScanDirection::TargetToBase;
        let mut stats = DirectionStats::default();
        let batch = self.config.batch_size;
        let mut offset: i64 = 0;

        loop {
            let page = self
                .guarded(cancel, async {
                    let rows = self
                        .target
                        .query(
                            &self.id_page_sql,
                            &[SqlValue::I64(batch as i64), SqlValue::I64(offset)],
                        )
                        .await?;
                    rows.iter()
                        .map(|row| row.require_i64(R::id_column()))
                        .collect::<Result<Vec<i64>>>()
                })
                .await;
            let ids = match page {
                Ok(ids) => ids,
                Err(DualWriteError::Cancelled) => return Err(DualWriteError::Cancelled),
                Err(err) => {
                    warn!(offset, error = %err, "target id page fetch failed, skipping page");
                    stats.query_errors += 1;
                    offset += batch as i64;
                    continue;
                }
            };
            if ids.is_empty() {
                break;
            }
            stats.rows_scanned += ids.len() as u64;

            let probe_sql = sql::select_ids_in_query(R::table(), R::id_column(), ids.len());
            let params: Vec<SqlValue> = ids.iter().copied().map(SqlValue::I64).collect();
            let probe = self
                .guarded(cancel, async {
                    let rows = self.base.query(&probe_sql, &params).await?;
                    rows.iter()
                        .map(|row| row.require_i64(R::id_column()))
                        .collect::<Result<HashSet<i64>>>()
                })
                .await;
            match probe {
                Ok(present_in_base) => {
                    for id in ids.iter().filter(|id| !present_in_base.contains(id)) {
                        self.emit(direction, InconsistencyKind::BaseMissing, *id, &mut stats)
                            .await;
                    }
                }
                Err(DualWriteError::Cancelled) => return Err(DualWriteError::Cancelled),
                Err(err) => {
                    warn!(offset, error = %err, "base existence probe failed, skipping page");
                    stats.query_errors += 1;
                }
            }

            let fetched = ids.len();
            offset += fetched as i64;
            if fetched < batch {
                break;
            }
        }

        Ok(stats)
    }
}
