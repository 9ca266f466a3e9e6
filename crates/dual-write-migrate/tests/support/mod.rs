//! Shared test doubles: an in-memory store speaking the library's statement
//! shapes, a capturing event producer, and a sample record type.

#![allow(dead_code)]

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use dual_write_migrate::{
    sql, DualWriteError, Entity, EventProducer, InconsistencyEvent, Record, Result, Row, SqlValue,
    StoreClient, StoreStatements, StoreTx,
};

/// Sample migrated record type used across the test suites.
#[derive(Debug, Clone, PartialEq)]
pub struct Article {
    pub id: i64,
    pub title: String,
}

impl Article {
    pub fn new(id: i64, title: &str) -> Self {
        Article {
            id,
            title: title.to_string(),
        }
    }
}

impl Entity for Article {
    fn id(&self) -> i64 {
        self.id
    }

    fn semantic_eq(&self, other: &Self) -> bool {
        self.id == other.id && self.title == other.title
    }
}

impl Record for Article {
    fn table() -> &'static str {
        "articles"
    }

    fn columns() -> &'static [&'static str] {
        &["id", "title"]
    }

    fn from_row(row: &Row) -> Result<Self> {
        Ok(Article {
            id: row.require_i64("id")?,
            title: row.require_text("title")?,
        })
    }

    fn values(&self) -> Vec<SqlValue> {
        vec![
            SqlValue::I64(self.id),
            SqlValue::Text(self.title.clone()),
        ]
    }
}

/// The upsert statement the proxy tests write articles with.
pub fn article_upsert_sql() -> String {
    sql::upsert_query(Article::table(), Article::id_column(), Article::columns())
}

/// The point-lookup statement the proxy tests read articles with.
pub fn article_select_sql() -> String {
    sql::select_by_id_query(Article::table(), Article::id_column(), Article::columns())
}

struct Inner {
    id_column: String,
    columns: Vec<String>,
    rows: Mutex<BTreeMap<i64, Vec<SqlValue>>>,
    log: Mutex<Vec<String>>,
    offline: AtomicBool,
    fail_next: AtomicUsize,
    slow_next: AtomicUsize,
    slow_for: Mutex<Duration>,
    fail_begin: AtomicBool,
    fail_commit: AtomicBool,
    row_at_sql: String,
    by_id_sql: String,
    id_page_sql: String,
    upsert_sql: String,
    delete_sql: String,
    in_prefix: String,
}

impl Inner {
    /// Apply injected latency and failures before touching state.
    async fn gate(&self) -> Result<()> {
        if self.slow_next.load(Ordering::SeqCst) > 0 {
            self.slow_next.fetch_sub(1, Ordering::SeqCst);
            let delay = *self.slow_for.lock().unwrap();
            tokio::time::sleep(delay).await;
        }
        if self.offline.load(Ordering::SeqCst) {
            return Err(DualWriteError::driver("store offline"));
        }
        if self.fail_next.load(Ordering::SeqCst) > 0 {
            self.fail_next.fetch_sub(1, Ordering::SeqCst);
            return Err(DualWriteError::driver("injected failure"));
        }
        Ok(())
    }

    fn full_row(&self, values: &[SqlValue]) -> Row {
        Row::new(self.columns.clone(), values.to_vec())
    }

    fn id_row(&self, id: i64) -> Row {
        Row::new(vec![self.id_column.clone()], vec![SqlValue::I64(id)])
    }

    fn param_i64(params: &[SqlValue], idx: usize) -> Result<i64> {
        params
            .get(idx)
            .and_then(SqlValue::as_i64)
            .ok_or_else(|| DualWriteError::decode(format!("expected i64 param at {idx}")))
    }

    async fn do_execute(&self, sql_text: &str, params: &[SqlValue]) -> Result<u64> {
        self.gate().await?;
        self.log.lock().unwrap().push(sql_text.to_string());
        if sql_text == self.upsert_sql {
            let id = Self::param_i64(params, 0)?;
            self.rows.lock().unwrap().insert(id, params.to_vec());
            Ok(1)
        } else if sql_text == self.delete_sql {
            let id = Self::param_i64(params, 0)?;
            let removed = self.rows.lock().unwrap().remove(&id).is_some();
            Ok(u64::from(removed))
        } else {
            Ok(1)
        }
    }

    async fn do_query(&self, sql_text: &str, params: &[SqlValue]) -> Result<Vec<Row>> {
        self.gate().await?;
        self.log.lock().unwrap().push(sql_text.to_string());
        let rows = self.rows.lock().unwrap();
        if sql_text == self.row_at_sql {
            let offset = Self::param_i64(params, 0)? as usize;
            Ok(rows
                .values()
                .nth(offset)
                .map(|values| self.full_row(values))
                .into_iter()
                .collect())
        } else if sql_text == self.by_id_sql {
            let id = Self::param_i64(params, 0)?;
            Ok(rows
                .get(&id)
                .map(|values| self.full_row(values))
                .into_iter()
                .collect())
        } else if sql_text == self.id_page_sql {
            let limit = Self::param_i64(params, 0)? as usize;
            let offset = Self::param_i64(params, 1)? as usize;
            Ok(rows
                .keys()
                .skip(offset)
                .take(limit)
                .map(|id| self.id_row(*id))
                .collect())
        } else if sql_text.starts_with(&self.in_prefix) {
            Ok(params
                .iter()
                .filter_map(SqlValue::as_i64)
                .filter(|id| rows.contains_key(id))
                .map(|id| self.id_row(id))
                .collect())
        } else {
            Ok(Vec::new())
        }
    }
}

/// In-memory store understanding exactly the statement shapes this library
/// generates, with hooks for injecting latency and failures.
#[derive(Clone)]
pub struct MemoryStore {
    inner: Arc<Inner>,
}

impl MemoryStore {
    pub fn new(table: &str, id_column: &str, columns: &[&str]) -> Arc<Self> {
        let in_prefix = format!(
            "SELECT {id} FROM {table} WHERE {id} IN (",
            id = sql::quote_ident(id_column),
            table = sql::quote_ident(table),
        );
        Arc::new(MemoryStore {
            inner: Arc::new(Inner {
                id_column: id_column.to_string(),
                columns: columns.iter().map(|c| c.to_string()).collect(),
                rows: Mutex::new(BTreeMap::new()),
                log: Mutex::new(Vec::new()),
                offline: AtomicBool::new(false),
                fail_next: AtomicUsize::new(0),
                slow_next: AtomicUsize::new(0),
                slow_for: Mutex::new(Duration::ZERO),
                fail_begin: AtomicBool::new(false),
                fail_commit: AtomicBool::new(false),
                row_at_sql: sql::select_row_at_query(table, id_column, columns),
                by_id_sql: sql::select_by_id_query(table, id_column, columns),
                id_page_sql: sql::select_id_page_query(table, id_column),
                upsert_sql: sql::upsert_query(table, id_column, columns),
                delete_sql: sql::delete_by_id_query(table, id_column),
                in_prefix,
            }),
        })
    }

    /// Store for the [`Article`] sample type.
    pub fn for_articles() -> Arc<Self> {
        Self::new(Article::table(), Article::id_column(), Article::columns())
    }

    pub fn insert(&self, id: i64, values: Vec<SqlValue>) {
        self.inner.rows.lock().unwrap().insert(id, values);
    }

    pub fn insert_article(&self, article: &Article) {
        self.insert(article.id, article.values());
    }

    pub fn get_article(&self, id: i64) -> Option<Article> {
        let rows = self.inner.rows.lock().unwrap();
        rows.get(&id).map(|values| {
            Article::from_row(&Row::new(
                self.inner.columns.clone(),
                values.clone(),
            ))
            .expect("stored article row decodes")
        })
    }

    pub fn len(&self) -> usize {
        self.inner.rows.lock().unwrap().len()
    }

    pub fn set_offline(&self, offline: bool) {
        self.inner.offline.store(offline, Ordering::SeqCst);
    }

    /// Fail the next `n` statements with a driver error.
    pub fn fail_next(&self, n: usize) {
        self.inner.fail_next.store(n, Ordering::SeqCst);
    }

    /// Delay the next `n` statements by `delay`.
    pub fn slow_next(&self, n: usize, delay: Duration) {
        *self.inner.slow_for.lock().unwrap() = delay;
        self.inner.slow_next.store(n, Ordering::SeqCst);
    }

    pub fn set_fail_begin(&self, fail: bool) {
        self.inner.fail_begin.store(fail, Ordering::SeqCst);
    }

    pub fn set_fail_commit(&self, fail: bool) {
        self.inner.fail_commit.store(fail, Ordering::SeqCst);
    }

    pub fn log(&self) -> Vec<String> {
        self.inner.log.lock().unwrap().clone()
    }

    pub fn clear_log(&self) {
        self.inner.log.lock().unwrap().clear();
    }

    /// How many logged statements contain the given fragment.
    pub fn logged_count(&self, fragment: &str) -> usize {
        self.log().iter().filter(|s| s.contains(fragment)).count()
    }
}

#[async_trait]
impl StoreStatements for MemoryStore {
    async fn execute(&self, sql: &str, params: &[SqlValue]) -> Result<u64> {
        self.inner.do_execute(sql, params).await
    }

    async fn query(&self, sql: &str, params: &[SqlValue]) -> Result<Vec<Row>> {
        self.inner.do_query(sql, params).await
    }

    async fn query_row(&self, sql: &str, params: &[SqlValue]) -> Result<Option<Row>> {
        Ok(self.inner.do_query(sql, params).await?.into_iter().next())
    }
}

#[async_trait]
impl StoreClient for MemoryStore {
    async fn begin(&self) -> Result<Box<dyn StoreTx>> {
        if self.inner.offline.load(Ordering::SeqCst) {
            return Err(DualWriteError::driver("store offline"));
        }
        if self.inner.fail_begin.load(Ordering::SeqCst) {
            return Err(DualWriteError::driver("begin failed"));
        }
        self.inner.log.lock().unwrap().push("BEGIN".to_string());
        Ok(Box::new(MemoryTx {
            inner: Arc::clone(&self.inner),
        }))
    }
}

/// Transaction double applying statements straight to the shared state.
pub struct MemoryTx {
    inner: Arc<Inner>,
}

#[async_trait]
impl StoreStatements for MemoryTx {
    async fn execute(&self, sql: &str, params: &[SqlValue]) -> Result<u64> {
        self.inner.do_execute(sql, params).await
    }

    async fn query(&self, sql: &str, params: &[SqlValue]) -> Result<Vec<Row>> {
        self.inner.do_query(sql, params).await
    }

    async fn query_row(&self, sql: &str, params: &[SqlValue]) -> Result<Option<Row>> {
        Ok(self.inner.do_query(sql, params).await?.into_iter().next())
    }
}

#[async_trait]
impl StoreTx for MemoryTx {
    async fn commit(self: Box<Self>) -> Result<()> {
        if self.inner.fail_commit.load(Ordering::SeqCst) {
            return Err(DualWriteError::driver("commit failed"));
        }
        self.inner.log.lock().unwrap().push("COMMIT".to_string());
        Ok(())
    }

    async fn rollback(self: Box<Self>) -> Result<()> {
        self.inner.log.lock().unwrap().push("ROLLBACK".to_string());
        Ok(())
    }
}

/// Event producer that captures published events in memory.
#[derive(Default)]
pub struct CaptureProducer {
    events: Mutex<Vec<InconsistencyEvent>>,
    fail: AtomicBool,
}

impl CaptureProducer {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn events(&self) -> Vec<InconsistencyEvent> {
        self.events.lock().unwrap().clone()
    }

    pub fn set_fail(&self, fail: bool) {
        self.fail.store(fail, Ordering::SeqCst);
    }
}

#[async_trait]
impl EventProducer for CaptureProducer {
    async fn produce(&self, event: &InconsistencyEvent) -> Result<()> {
        if self.fail.load(Ordering::SeqCst) {
            return Err(DualWriteError::driver("event bus unavailable"));
        }
        self.events.lock().unwrap().push(event.clone());
        Ok(())
    }
}
