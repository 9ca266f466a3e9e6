//! Entity contracts the validator and fixer are generic over.

use crate::error::Result;
use crate::store::{Row, SqlValue};

/// Capability every migrated record type must satisfy.
///
/// Entities are never constructed by this library; they are hydrated from
/// driver query results, compared, and discarded.
pub trait Entity: Send + Sync + 'static {
    /// Stable, unique identifier. Scans rely on `ORDER BY` over this id for
    /// progress, so ids must be monotonically non-decreasing in storage order.
    fn id(&self) -> i64;

    /// Value-level equality across all migrated columns.
    fn semantic_eq(&self, other: &Self) -> bool;
}

/// Storage mapping for an [`Entity`], enough for the validator and fixer to
/// address it in either store without per-type SQL.
///
/// `columns()` and `values()` must agree on order, with the id column
/// included; the fixer computes its upsert statement from this list once at
/// construction time.
pub trait Record: Entity + Sized {
    /// Table name, valid in both stores.
    fn table() -> &'static str;

    /// Name of the integer identifier column.
    fn id_column() -> &'static str {
        "id"
    }

    /// Full storage column list, id included.
    fn columns() -> &'static [&'static str];

    /// Hydrate an instance from a driver row.
    fn from_row(row: &Row) -> Result<Self>;

    /// Storage values in `columns()` order.
    fn values(&self) -> Vec<SqlValue>;
}
