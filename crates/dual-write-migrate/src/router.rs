//! Shared statement routing for the dual-write pool and transaction.
//!
//! The four-way pattern branch lives here and nowhere else: the pool and the
//! transaction both resolve a [`Route`] from the pattern, then delegate to
//! the same [`write_through`] implementation. Secondary-store attempts are
//! issued synchronously in the same call, so by the time a write returns both
//! attempts have been made; their failures are logged and swallowed while the
//! primary result is returned verbatim.

use tracing::warn;

use crate::error::Result;
use crate::pattern::{Pattern, Side};
use crate::store::{SqlValue, StoreStatements};

/// Resolved routing decision for one call.
///
/// Reads are always served by the primary side (the authoritative store is
/// the one whose data the caller may trust), so a single route covers both
/// statement kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Route {
    /// Authoritative store; its errors propagate to the caller.
    pub primary: Side,
    /// Best-effort store, present only in dual-write phases.
    pub secondary: Option<Side>,
}

impl Route {
    /// Resolve the route for a pattern.
    pub fn for_pattern(pattern: Pattern) -> Route {
        Route {
            primary: pattern.primary_side(),
            secondary: pattern.secondary_side(),
        }
    }
}

/// Execute a write on the primary store, then best-effort on the secondary.
/// The primary result is the caller's result.
pub(crate) async fn write_through<P, S>(
    primary: (Side, &P),
    secondary: Option<(Side, &S)>,
    sql: &str,
    params: &[SqlValue],
) -> Result<u64>
where
    P: StoreStatements + ?Sized,
    S: StoreStatements + ?Sized,
{
    let (primary_side, primary_store) = primary;
    let affected = primary_store.execute(sql, params).await.map_err(|err| {
        warn!(side = %primary_side, error = %err, "primary store write failed");
        err
    })?;

    if let Some((side, store)) = secondary {
        if let Err(err) = store.execute(sql, params).await {
            warn!(side = %side, error = %err, "secondary store write failed, continuing");
        }
    }

    Ok(affected)
}
