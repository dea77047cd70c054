//! Connection traits for iseries-rdbc
//!
//! Core abstractions for talking to the driver:
//! - Connection: a single handle with an explicit open/closed state
//! - ConnectionFactory: constructs (but does not open) handles
//! - Statement: SQL text plus an optional parameter binder
//! - Parameters: the named values a binder fills in

use async_trait::async_trait;
use std::fmt;
use std::sync::Arc;

use crate::error::{Error, Result};
use crate::types::{ResultSet, Value};

/// State of a driver connection handle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ConnectionState {
    /// Not connected (never opened, closed, or broken)
    Closed,
    /// Connected and usable
    Open,
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Closed => write!(f, "closed"),
            Self::Open => write!(f, "open"),
        }
    }
}

/// A connection handle to the remote database.
///
/// Implemented by the driver. A handle is created closed and must be opened
/// before statements run; a handle whose link drops reports `Closed` again.
#[async_trait]
pub trait Connection: Send + Sync {
    /// Current state of the handle
    fn state(&self) -> ConnectionState;

    /// Open the connection (may block on network I/O)
    async fn open(&mut self) -> Result<()>;

    /// Execute a statement that returns rows
    async fn query(&mut self, sql: &str, params: &Parameters) -> Result<ResultSet>;

    /// Execute a statement that modifies data, returns affected row count
    async fn execute(&mut self, sql: &str, params: &Parameters) -> Result<u64>;

    /// Close the connection
    async fn close(&mut self) -> Result<()>;
}

/// Factory for constructing connection handles
pub trait ConnectionFactory: Send + Sync {
    /// Construct a new, not yet opened, connection handle
    fn create(&self, config: &ConnectionConfig) -> Result<Box<dyn Connection>>;
}

/// Configuration for creating connections
#[derive(Clone, PartialEq, Eq)]
pub struct ConnectionConfig {
    /// Opaque driver connection string (e.g. `DataSource=host;UserID=u;Password=p`)
    pub connection_string: String,
    /// Connection timeout in milliseconds
    pub connect_timeout_ms: u64,
    /// Application name reported to the server
    pub application_name: Option<String>,
}

/// Connection string keys whose values never reach a log line.
const SECRET_KEYS: &[&str] = &["password", "pwd"];

impl ConnectionConfig {
    /// Create configuration from a connection string
    pub fn new(connection_string: impl Into<String>) -> Self {
        Self {
            connection_string: connection_string.into(),
            ..Default::default()
        }
    }

    /// Set connection timeout
    pub fn with_connect_timeout(mut self, ms: u64) -> Self {
        self.connect_timeout_ms = ms;
        self
    }

    /// Set application name
    pub fn with_application_name(mut self, name: impl Into<String>) -> Self {
        self.application_name = Some(name.into());
        self
    }

    /// Connection string with credential values replaced by `***`
    pub fn redacted_connection_string(&self) -> String {
        self.connection_string
            .split(';')
            .map(|pair| match pair.split_once('=') {
                Some((key, _))
                    if SECRET_KEYS
                        .iter()
                        .any(|secret| key.trim().eq_ignore_ascii_case(secret)) =>
                {
                    format!("{key}=***")
                }
                _ => pair.to_string(),
            })
            .collect::<Vec<_>>()
            .join(";")
    }
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self {
            connection_string: String::new(),
            connect_timeout_ms: 10_000,
            application_name: Some("iseries-rdbc".into()),
        }
    }
}

impl fmt::Debug for ConnectionConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectionConfig")
            .field("connection_string", &self.redacted_connection_string())
            .field("connect_timeout_ms", &self.connect_timeout_ms)
            .field("application_name", &self.application_name)
            .finish()
    }
}

/// A single bound parameter
#[derive(Debug, Clone, PartialEq)]
pub struct Parameter {
    /// Parameter name (e.g. `@CUSNUM`)
    pub name: String,
    /// Bound value
    pub value: Value,
}

/// Ordered collection of bound parameters
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Parameters {
    entries: Vec<Parameter>,
}

impl Parameters {
    /// Create an empty collection
    pub fn new() -> Self {
        Self::default()
    }

    /// Bind a named value
    pub fn add(&mut self, name: impl Into<String>, value: impl Into<Value>) -> &mut Self {
        self.entries.push(Parameter {
            name: name.into(),
            value: value.into(),
        });
        self
    }

    /// Number of bound parameters
    #[inline]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether no parameters are bound
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Iterate over the bound parameters
    pub fn iter(&self) -> impl Iterator<Item = &Parameter> {
        self.entries.iter()
    }

    /// Look up a parameter value by name (case-insensitive)
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.entries
            .iter()
            .find(|p| p.name.eq_ignore_ascii_case(name))
            .map(|p| &p.value)
    }

    /// Positional values in bind order
    pub fn values(&self) -> Vec<Value> {
        self.entries.iter().map(|p| p.value.clone()).collect()
    }
}

impl fmt::Display for Parameters {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let rendered: Vec<String> = self
            .entries
            .iter()
            .map(|p| format!("{}={}", p.name, p.value))
            .collect();
        write!(f, "[{}]", rendered.join(", "))
    }
}

/// Callback that binds parameters to a statement
pub type ParameterBinder = Arc<dyn Fn(&mut Parameters) + Send + Sync>;

/// A SQL statement with an optional parameter binder.
///
/// Cheap to clone; the binder is shared and run every time the statement is
/// executed, so a retried statement always sees freshly bound parameters.
#[derive(Clone)]
pub struct Statement {
    sql: String,
    binder: Option<ParameterBinder>,
}

impl Statement {
    /// Statement without parameters
    pub fn new(sql: impl Into<String>) -> Self {
        Self {
            sql: sql.into(),
            binder: None,
        }
    }

    /// Attach a parameter binder
    pub fn with_parameters<F>(mut self, binder: F) -> Self
    where
        F: Fn(&mut Parameters) + Send + Sync + 'static,
    {
        self.binder = Some(Arc::new(binder));
        self
    }

    /// SQL text
    #[inline]
    pub fn sql(&self) -> &str {
        &self.sql
    }

    /// Whether a binder is attached
    #[inline]
    pub fn has_parameters(&self) -> bool {
        self.binder.is_some()
    }

    /// Reject empty or whitespace-only statement text
    pub fn validate(&self) -> Result<()> {
        if self.sql.trim().is_empty() {
            return Err(Error::argument("sql_statement", "statement text is empty"));
        }
        Ok(())
    }

    /// Run the binder into a fresh parameter collection
    pub fn bind(&self) -> Parameters {
        let mut params = Parameters::new();
        if let Some(binder) = &self.binder {
            binder(&mut params);
        }
        params
    }

    /// Human-readable parameter description for logs
    pub fn describe_parameters(&self) -> String {
        match &self.binder {
            Some(_) => self.bind().to_string(),
            None => "none".to_string(),
        }
    }
}

impl fmt::Debug for Statement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Statement")
            .field("sql", &self.sql)
            .field("parameters", &self.describe_parameters())
            .finish()
    }
}

impl From<&str> for Statement {
    fn from(sql: &str) -> Self {
        Self::new(sql)
    }
}

impl From<String> for Statement {
    fn from(sql: String) -> Self {
        Self::new(sql)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_connection_config_builder() {
        let config = ConnectionConfig::new("DataSource=pub400.com;UserID=demo")
            .with_connect_timeout(5000)
            .with_application_name("billing");

        assert_eq!(config.connection_string, "DataSource=pub400.com;UserID=demo");
        assert_eq!(config.connect_timeout_ms, 5000);
        assert_eq!(config.application_name, Some("billing".into()));
    }

    #[test]
    fn test_connection_config_debug_redacts_password() {
        let config = ConnectionConfig::new("DataSource=pub400.com;UserID=demo;Password=s3cret");
        let debug = format!("{config:?}");

        assert!(!debug.contains("s3cret"));
        assert!(debug.contains("Password=***"));
        assert!(debug.contains("UserID=demo"));

        let config = ConnectionConfig::new("DataSource=h;PWD=abc");
        assert_eq!(config.redacted_connection_string(), "DataSource=h;PWD=***");
    }

    #[test]
    fn test_statement_validate() {
        assert!(Statement::new("SELECT 1 FROM SYSIBM.SYSDUMMY1").validate().is_ok());

        let err = Statement::new("").validate().unwrap_err();
        assert!(matches!(err, Error::Argument { .. }));

        let err = Statement::new("   \n").validate().unwrap_err();
        assert!(matches!(err, Error::Argument { .. }));
    }

    #[test]
    fn test_statement_binder_runs_each_time() {
        let stmt = Statement::new("SELECT * FROM QIWS.QCUSTCDT WHERE CUSNUM = ?")
            .with_parameters(|p| {
                p.add("@CUSNUM", 938472);
            });

        assert!(stmt.has_parameters());
        let first = stmt.bind();
        let second = stmt.bind();
        assert_eq!(first, second);
        assert_eq!(first.get("@cusnum"), Some(&Value::Int32(938472)));
        assert_eq!(stmt.describe_parameters(), "[@CUSNUM=938472]");
    }

    #[test]
    fn test_statement_without_binder() {
        let stmt = Statement::from("SELECT 1 FROM SYSIBM.SYSDUMMY1");
        assert!(stmt.bind().is_empty());
        assert_eq!(stmt.describe_parameters(), "none");
    }

    #[test]
    fn test_parameters_display() {
        let mut params = Parameters::new();
        params.add("@STATE", "NY").add("@LIMIT", Value::Null);
        assert_eq!(params.to_string(), "[@STATE='NY', @LIMIT=NULL]");
        assert_eq!(params.values(), vec![Value::from("NY"), Value::Null]);
    }
}
