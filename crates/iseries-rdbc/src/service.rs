//! Resilient data-access service
//!
//! Three behaviors over a [`DataContext`]:
//! - [`ResilientService::get_data`]: one attempt, failures logged and turned
//!   into an empty table
//! - [`ResilientService::get_typed_data`]: retried under a [`RetryPolicy`]
//! - [`ResilientService::execute_non_query`]: one attempt on a fresh,
//!   short-lived connection

use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, warn};

use crate::config::ServiceConfig;
use crate::connection::{ConnectionConfig, ConnectionFactory, Statement};
use crate::context::{DataContext, FromRow};
use crate::error::Result;
use crate::retry::{RetryAttempt, RetryPolicy};
use crate::types::DataTable;

/// Hook invoked for every transient failure before its backoff is waited
pub trait RetryListener: Send + Sync {
    /// Called with the statement being retried and the failed attempt
    fn on_retry(&self, statement: &Statement, attempt: &RetryAttempt<'_>);
}

/// Default listener: one `warn!` per retry with the server diagnostics
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingRetryListener;

impl RetryListener for TracingRetryListener {
    fn on_retry(&self, statement: &Statement, attempt: &RetryAttempt<'_>) {
        let diag = attempt.error.diagnostics();
        warn!(
            attempt = attempt.attempt,
            max_attempts = attempt.max_attempts,
            wait_ms = millis(attempt.delay),
            kind = attempt.error.kind(),
            message = %diag.message,
            message_code = ?diag.message_code,
            message_details = ?diag.message_details,
            sql = %statement.sql(),
            parameters = %statement.describe_parameters(),
            "{}",
            retry_message(attempt)
        );
    }
}

fn retry_message(attempt: &RetryAttempt<'_>) -> &'static str {
    if attempt.is_final() {
        "Statement failed on final attempt, waiting out backoff before giving up"
    } else {
        "Statement failed, waiting before next attempt"
    }
}

fn millis(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}

/// Data-access facade with error suppression and bounded retry
pub struct ResilientService<C> {
    context: C,
    policy: RetryPolicy,
    listener: Arc<dyn RetryListener>,
    cancel: Option<CancellationToken>,
}

impl<C: DataContext> ResilientService<C> {
    /// Service with the default retry policy and tracing listener
    pub fn new(context: C) -> Self {
        Self {
            context,
            policy: RetryPolicy::default(),
            listener: Arc::new(TracingRetryListener),
            cancel: None,
        }
    }

    /// Service whose retry policy comes from configuration
    pub fn from_config(context: C, config: &ServiceConfig) -> Self {
        Self::new(context).with_policy(config.retry_policy())
    }

    /// Replace the retry policy
    pub fn with_policy(mut self, policy: RetryPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Replace the retry listener
    pub fn with_listener(mut self, listener: Arc<dyn RetryListener>) -> Self {
        self.listener = listener;
        self
    }

    /// Abort backoff waits when `token` is cancelled
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = Some(token);
        self
    }

    /// The wrapped data context
    pub fn context(&self) -> &C {
        &self.context
    }

    /// Active retry policy
    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    /// Run a query once.
    ///
    /// Only an empty statement is reported as an error. Any other failure is
    /// logged and yields [`DataTable::empty`].
    pub async fn get_data(&self, statement: &Statement) -> Result<DataTable> {
        statement.validate()?;
        debug!(
            sql = %statement.sql(),
            parameters = %statement.describe_parameters(),
            "get_data"
        );

        match self.context.query(statement).await {
            Ok(table) => Ok(table),
            Err(e) => {
                let diag = e.diagnostics();
                error!(
                    kind = e.kind(),
                    message = %diag.message,
                    message_code = ?diag.message_code,
                    message_details = ?diag.message_details,
                    sql = %statement.sql(),
                    parameters = %statement.describe_parameters(),
                    "Query failed, returning empty table"
                );
                Ok(DataTable::empty())
            }
        }
    }

    /// [`get_data`](Self::get_data) for a statement without parameters
    pub async fn get_data_unbound(&self, sql: &str) -> Result<DataTable> {
        self.get_data(&Statement::new(sql)).await
    }

    /// Run a mapped query under the retry policy.
    ///
    /// Transient failures are retried; once the budget is spent the last
    /// failure is returned inside [`Error::RetryExhausted`](crate::Error::RetryExhausted).
    /// Non-retriable failures are returned as-is after the first attempt.
    pub async fn get_typed_data<T: FromRow>(&self, statement: &Statement) -> Result<Vec<T>> {
        statement.validate()?;
        debug!(
            sql = %statement.sql(),
            parameters = %statement.describe_parameters(),
            target = std::any::type_name::<T>(),
            "get_typed_data"
        );

        let listener = Arc::clone(&self.listener);
        let outcome = self
            .policy
            .execute(
                |_| self.context.query_typed::<T>(statement),
                |attempt| listener.on_retry(statement, attempt),
                self.cancel.as_ref(),
            )
            .await;

        match &outcome.result {
            Ok(items) => debug!(
                rows = items.len(),
                attempts = outcome.attempts,
                "get_typed_data succeeded"
            ),
            Err(e) => {
                let diag = e.diagnostics();
                error!(
                    kind = e.kind(),
                    attempts = outcome.attempts,
                    waited_ms = millis(outcome.total_wait()),
                    message = %diag.message,
                    message_code = ?diag.message_code,
                    message_details = ?diag.message_details,
                    sql = %statement.sql(),
                    "get_typed_data failed"
                );
            }
        }
        outcome.into_result()
    }

    /// [`get_typed_data`](Self::get_typed_data) for a statement without parameters
    pub async fn get_typed_data_unbound<T: FromRow>(&self, sql: &str) -> Result<Vec<T>> {
        self.get_typed_data(&Statement::new(sql)).await
    }
}

impl<C> ResilientService<C> {
    /// Execute a data-modifying statement on its own connection.
    ///
    /// See [`execute_non_query`].
    pub async fn execute_non_query(
        factory: &dyn ConnectionFactory,
        config: &ConnectionConfig,
        statement: &Statement,
    ) -> Result<u64> {
        execute_non_query(factory, config, statement).await
    }
}

/// Execute a data-modifying statement on its own connection.
///
/// The connection never touches a context's shared handle and is closed
/// before returning, on both success and failure. No retry.
pub async fn execute_non_query(
    factory: &dyn ConnectionFactory,
    config: &ConnectionConfig,
    statement: &Statement,
) -> Result<u64> {
    statement.validate()?;
    debug!(
        sql = %statement.sql(),
        parameters = %statement.describe_parameters(),
        "execute_non_query"
    );

    let mut conn = factory.create(config)?;
    conn.open().await?;

    let params = statement.bind();
    let result = conn
        .execute(statement.sql(), &params)
        .await
        .map_err(|e| e.with_sql(statement.sql()));

    if let Err(e) = conn.close().await {
        warn!(error = %e, "Failed to close non-query connection");
    }

    if let Ok(affected) = &result {
        debug!(affected = *affected, "execute_non_query completed");
    }
    result
}

impl<C: std::fmt::Debug> std::fmt::Debug for ResilientService<C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResilientService")
            .field("context", &self.context)
            .field("policy", &self.policy)
            .field("cancellable", &self.cancel.is_some())
            .finish_non_exhaustive()
    }
}
