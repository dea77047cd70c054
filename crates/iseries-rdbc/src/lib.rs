//! # iseries-rdbc
//!
//! Resilient data access for IBM i (AS/400) DB2 databases.
//!
//! The driver itself sits behind the [`Connection`](connection::Connection) and
//! [`ConnectionFactory`](connection::ConnectionFactory) traits; this crate layers
//! connection management, row mapping and a retrying service facade on top.
//!
//! ## Features
//!
//! - **Row Reader**: typed, null-aware column access with explicit defaults
//! - **Connection Manager**: one lazily opened handle, reopened when the link drops
//! - **Data Context**: single-attempt execution into a table or mapped types
//! - **Resilient Service**: error-suppressing reads and bounded retry with a
//!   fixed 1s, 2s, 4s, 8s, 16s backoff
//! - **Configuration**: YAML with environment variable expansion
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use iseries_rdbc::prelude::*;
//!
//! let config = ServiceConfig::from_file("iseries.yaml")?;
//! let context = DbContext::connect(driver_factory, config.connection_config());
//! let service = ResilientService::from_config(context, &config);
//!
//! let statement = Statement::new("SELECT * FROM QIWS.QCUSTCDT WHERE STATE = ?")
//!     .with_parameters(|p| {
//!         p.add("@STATE", "NY");
//!     });
//!
//! // Empty table on any failure
//! let table = service.get_data(&statement).await?;
//!
//! // Retried; RetryExhausted once the schedule is spent
//! let customers: Vec<Customer> = service.get_typed_data(&statement).await?;
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![deny(unsafe_code)]

pub mod config;
pub mod connection;
pub mod context;
pub mod error;
pub mod manager;
pub mod reader;
pub mod retry;
pub mod service;
pub mod types;

/// Prelude module for convenient imports
pub mod prelude {
    // Error types
    pub use crate::error::{Diagnostics, Error, ErrorCategory, Result};

    // Value and type system
    pub use crate::types::{ColumnMetadata, DataTable, ResultSet, Row, Value};

    // Connection traits and config
    pub use crate::connection::{
        Connection, ConnectionConfig, ConnectionFactory, ConnectionState, Parameters, Statement,
    };

    // Row access
    pub use crate::reader::{FromValue, RowReader};

    // Lifecycle and execution
    pub use crate::context::{DataContext, DbContext, FromRow};
    pub use crate::manager::{ConnectionManager, HandleState, ManagerStats};

    // Retry and service
    pub use crate::config::ServiceConfig;
    pub use crate::retry::{Attempt, RetryAttempt, RetryOutcome, RetryPolicy};
    pub use crate::service::{ResilientService, RetryListener, TracingRetryListener};
}

// Re-export commonly used items at crate root
pub use error::{Error, Result};
pub use types::Value;
