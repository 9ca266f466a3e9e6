//! # dual-write-migrate
//!
//! Online dual-write migration library for moving a service's system of
//! record from one relational store ("base") to another ("target") with zero
//! downtime, while continuously detecting and repairing drift between the
//! two:
//!
//! - **Dual-write proxy** that intercepts every statement and transaction and
//!   fans it out to one or both stores according to a live-switchable
//!   migration pattern
//! - **Two-directional consistency validator** that full-scans both stores
//!   looking for divergence and publishes inconsistency events
//! - **Fixer** that repairs divergence using the base store as ground truth
//!
//! The proxy and the validator/fixer share no in-process state: consistency
//! is achieved asynchronously through the event loop, never on the hot path.
//!
//! ## Example
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use dual_write_migrate::{Config, DualWritePool, Fixer, Validator};
//! use tokio_util::sync::CancellationToken;
//!
//! #[tokio::main]
//! async fn main() -> dual_write_migrate::Result<()> {
//!     let config = Config::load("migration.yaml")?;
//!     let pool = Arc::new(DualWritePool::new(base, target, config.pattern));
//!
//!     // Application traffic goes through the proxy as if it were one store.
//!     pool.execute("UPDATE articles SET title = $1 WHERE id = $2", &params).await?;
//!
//!     // Operator flips phases live.
//!     pool.update_pattern("source_first")?;
//!
//!     // An operator-triggered pass scans both stores and publishes events.
//!     let validator: Validator<Article> =
//!         Validator::new(base, target, producer, config.validator.to_validator_config());
//!     let stats = validator.validate(&CancellationToken::new()).await?;
//!     println!("{} inconsistencies found", stats.total_inconsistencies());
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod entity;
pub mod error;
pub mod fix;
pub mod pattern;
pub mod proxy;
pub mod sql;
pub mod store;
pub mod validate;

mod router;

// Re-exports for convenient access
pub use config::{Config, ValidatorSettings};
pub use entity::{Entity, Record};
pub use error::{DualWriteError, Result};
pub use fix::Fixer;
pub use pattern::{Pattern, PatternCell, Side};
pub use proxy::{DualWritePool, DualWriteTx};
pub use store::{Row, SqlValue, StoreClient, StoreStatements, StoreTx};
pub use validate::{
    DirectionStats, EventProducer, InconsistencyEvent, InconsistencyKind, ScanDirection,
    ValidateStats, Validator, ValidatorConfig,
};
