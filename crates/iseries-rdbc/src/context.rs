//! Data context for iseries-rdbc
//!
//! Executes a statement exactly once against the managed connection and
//! materializes the result, either as a [`DataTable`] or as caller-defined
//! types implementing [`FromRow`]. No retry and no error suppression happen
//! at this layer.

use async_trait::async_trait;
use std::sync::Arc;
use tokio::sync::Mutex;

use crate::connection::{ConnectionConfig, ConnectionFactory, Statement};
use crate::error::Result;
use crate::manager::{AtomicManagerStats, ConnectionManager, HandleState, ManagerStats};
use crate::reader::RowReader;
use crate::types::{DataTable, ResultSet};

/// Mapper capability: a default-constructible type populated from one row.
///
/// # Example
///
/// ```rust,ignore
/// #[derive(Default)]
/// struct Customer {
///     number: i32,
///     last_name: String,
///     balance_due: Option<Decimal>,
/// }
///
/// impl FromRow for Customer {
///     fn populate_from_row(&mut self, reader: &RowReader<'_>) -> Result<()> {
///         self.number = reader.get_i32("CUSNUM")?;
///         self.last_name = reader.get_string("LSTNAM")?;
///         self.balance_due = reader.get_decimal_or("BALDUE", None)?;
///         Ok(())
///     }
/// }
/// ```
pub trait FromRow: Default + Send + 'static {
    /// Fill `self` from the current row
    fn populate_from_row(&mut self, reader: &RowReader<'_>) -> Result<()>;
}

/// Single-attempt statement execution
#[async_trait]
pub trait DataContext: Send + Sync {
    /// Execute and materialize every row into a generic table
    async fn query(&self, statement: &Statement) -> Result<DataTable>;

    /// Execute and map every row into a new `T`
    async fn query_typed<T: FromRow>(&self, statement: &Statement) -> Result<Vec<T>>;
}

/// Map every row of a result set into `T`, eagerly
pub fn map_rows<T: FromRow>(result: ResultSet) -> Result<Vec<T>> {
    let mut items = Vec::with_capacity(result.rows.len());
    for row in &result.rows {
        let mut item = T::default();
        item.populate_from_row(&RowReader::new(row))?;
        items.push(item);
    }
    Ok(items)
}

/// Data context over a single managed connection
pub struct DbContext {
    manager: Mutex<ConnectionManager>,
    stats: Arc<AtomicManagerStats>,
}

impl DbContext {
    /// Wrap an existing connection manager
    pub fn new(manager: ConnectionManager) -> Self {
        let stats = manager.stats_handle();
        Self {
            manager: Mutex::new(manager),
            stats,
        }
    }

    /// Create a context that connects lazily through `factory`
    pub fn connect(factory: Arc<dyn ConnectionFactory>, config: ConnectionConfig) -> Self {
        Self::new(ConnectionManager::new(factory, config))
    }

    /// Connection manager statistics
    pub fn stats(&self) -> ManagerStats {
        self.stats.snapshot()
    }

    /// Lifecycle state of the managed handle
    pub async fn state(&self) -> HandleState {
        self.manager.lock().await.state()
    }

    /// Release the connection. Calling this again has no effect.
    pub async fn dispose(&self) {
        self.manager.lock().await.dispose().await;
    }

    /// Run the statement once; the manager guard is held only for this call
    async fn fetch(&self, statement: &Statement) -> Result<ResultSet> {
        statement.validate()?;
        let params = statement.bind();

        let mut manager = self.manager.lock().await;
        let conn = manager.acquire().await?;
        conn.query(statement.sql(), &params)
            .await
            .map_err(|e| e.with_sql(statement.sql()))
    }
}

#[async_trait]
impl DataContext for DbContext {
    async fn query(&self, statement: &Statement) -> Result<DataTable> {
        let result = self.fetch(statement).await?;
        tracing::debug!(rows = result.rows.len(), sql = %statement.sql(), "Query returned");
        Ok(DataTable::from_result_set(result))
    }

    async fn query_typed<T: FromRow>(&self, statement: &Statement) -> Result<Vec<T>> {
        let result = self.fetch(statement).await?;
        tracing::debug!(
            rows = result.rows.len(),
            sql = %statement.sql(),
            target = std::any::type_name::<T>(),
            "Mapping query rows"
        );
        map_rows(result)
    }
}

impl std::fmt::Debug for DbContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DbContext")
            .field("stats", &self.stats.snapshot())
            .finish_non_exhaustive()
    }
}
