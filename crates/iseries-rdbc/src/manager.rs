//! Connection manager for iseries-rdbc
//!
//! Owns exactly one lazily created connection handle. The handle is modelled
//! as an explicit state machine:
//!
//! ```text
//! Uninitialized --ensure_open--> Open
//! Open --(link drops)--> Closed --ensure_open--> Open
//! any --dispose--> Disposed (terminal)
//! ```
//!
//! This is not a pool: every caller shares the same handle.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use crate::connection::{Connection, ConnectionConfig, ConnectionFactory, ConnectionState};
use crate::error::{Error, Result};

/// Lifecycle state of the managed handle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HandleState {
    /// No handle has been constructed yet
    Uninitialized,
    /// Handle exists and is open
    Open,
    /// Handle exists but is not open (never opened, closed, or broken)
    Closed,
    /// Manager was disposed; no further handles are created
    Disposed,
}

/// Manager statistics
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ManagerStats {
    /// Handles constructed by the factory
    pub handles_created: u64,
    /// Successful opens (first open plus reopens)
    pub opens: u64,
    /// Handles closed on dispose
    pub closes: u64,
}

/// Atomic manager stats, readable without holding the manager
#[derive(Debug, Default)]
pub struct AtomicManagerStats {
    handles_created: AtomicU64,
    opens: AtomicU64,
    closes: AtomicU64,
}

impl AtomicManagerStats {
    /// Create new atomic stats
    pub fn new() -> Self {
        Self::default()
    }

    fn record_created(&self) {
        self.handles_created.fetch_add(1, Ordering::Relaxed);
    }

    fn record_open(&self) {
        self.opens.fetch_add(1, Ordering::Relaxed);
    }

    fn record_close(&self) {
        self.closes.fetch_add(1, Ordering::Relaxed);
    }

    /// Snapshot current stats
    pub fn snapshot(&self) -> ManagerStats {
        ManagerStats {
            handles_created: self.handles_created.load(Ordering::Relaxed),
            opens: self.opens.load(Ordering::Relaxed),
            closes: self.closes.load(Ordering::Relaxed),
        }
    }
}

/// Owner of the single shared connection handle
pub struct ConnectionManager {
    factory: Arc<dyn ConnectionFactory>,
    config: ConnectionConfig,
    handle: Option<Box<dyn Connection>>,
    disposed: bool,
    stats: Arc<AtomicManagerStats>,
}

impl ConnectionManager {
    /// Create a manager; no connection is made until first use
    pub fn new(factory: Arc<dyn ConnectionFactory>, config: ConnectionConfig) -> Self {
        Self {
            factory,
            config,
            handle: None,
            disposed: false,
            stats: Arc::new(AtomicManagerStats::new()),
        }
    }

    /// Current lifecycle state
    pub fn state(&self) -> HandleState {
        if self.disposed {
            return HandleState::Disposed;
        }
        match &self.handle {
            None => HandleState::Uninitialized,
            Some(conn) if conn.state() == ConnectionState::Open => HandleState::Open,
            Some(_) => HandleState::Closed,
        }
    }

    /// Connection configuration
    pub fn config(&self) -> &ConnectionConfig {
        &self.config
    }

    /// Shared stats handle
    pub fn stats_handle(&self) -> Arc<AtomicManagerStats> {
        Arc::clone(&self.stats)
    }

    /// Snapshot of the manager statistics
    pub fn stats(&self) -> ManagerStats {
        self.stats.snapshot()
    }

    /// Drive the handle to `Open`, constructing it on first use.
    pub async fn ensure_open(&mut self) -> Result<()> {
        match self.state() {
            HandleState::Disposed => return Err(Error::Disposed),
            HandleState::Open => return Ok(()),
            HandleState::Uninitialized => {
                let conn = self.factory.create(&self.config)?;
                self.stats.record_created();
                tracing::debug!(
                    connection = %self.config.redacted_connection_string(),
                    "Created connection handle"
                );
                self.handle = Some(conn);
            }
            HandleState::Closed => {
                tracing::debug!("Connection handle is not open, reopening");
            }
        }

        if let Some(conn) = self.handle.as_mut() {
            conn.open().await?;
            self.stats.record_open();
            tracing::debug!(state = %conn.state(), "Connection opened");
        }
        Ok(())
    }

    /// Get the shared handle in the open state
    pub async fn acquire(&mut self) -> Result<&mut dyn Connection> {
        self.ensure_open().await?;
        match self.handle.as_deref_mut() {
            Some(conn) => Ok(conn),
            None => Err(Error::internal("connection handle missing after open")),
        }
    }

    /// Close and release the handle. Calling this again has no effect.
    pub async fn dispose(&mut self) {
        if self.disposed {
            return;
        }
        self.disposed = true;

        if let Some(mut conn) = self.handle.take() {
            if conn.state() == ConnectionState::Open {
                if let Err(e) = conn.close().await {
                    tracing::warn!(error = %e, "Failed to close connection on dispose");
                }
            }
            self.stats.record_close();
            tracing::debug!("Connection handle released");
        }
    }
}

impl std::fmt::Debug for ConnectionManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConnectionManager")
            .field("config", &self.config)
            .field("state", &self.state())
            .field("stats", &self.stats.snapshot())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::connection::Parameters;
    use crate::types::ResultSet;
    use async_trait::async_trait;
    use std::sync::atomic::AtomicBool;

    /// Handle whose open state is shared with the test so the link can be dropped
    struct FlakyLink {
        open: Arc<AtomicBool>,
    }

    #[async_trait]
    impl Connection for FlakyLink {
        fn state(&self) -> ConnectionState {
            if self.open.load(Ordering::SeqCst) {
                ConnectionState::Open
            } else {
                ConnectionState::Closed
            }
        }

        async fn open(&mut self) -> Result<()> {
            self.open.store(true, Ordering::SeqCst);
            Ok(())
        }

        async fn query(&mut self, _sql: &str, _params: &Parameters) -> Result<ResultSet> {
            Ok(ResultSet::default())
        }

        async fn execute(&mut self, _sql: &str, _params: &Parameters) -> Result<u64> {
            Ok(0)
        }

        async fn close(&mut self) -> Result<()> {
            self.open.store(false, Ordering::SeqCst);
            Ok(())
        }
    }

    struct FlakyFactory {
        link: Arc<AtomicBool>,
    }

    impl ConnectionFactory for FlakyFactory {
        fn create(&self, _config: &ConnectionConfig) -> Result<Box<dyn Connection>> {
            Ok(Box::new(FlakyLink {
                open: Arc::clone(&self.link),
            }))
        }
    }

    fn manager() -> (ConnectionManager, Arc<AtomicBool>) {
        let link = Arc::new(AtomicBool::new(false));
        let factory = Arc::new(FlakyFactory {
            link: Arc::clone(&link),
        });
        (
            ConnectionManager::new(factory, ConnectionConfig::new("DataSource=test")),
            link,
        )
    }

    #[tokio::test]
    async fn test_lazy_creation() {
        let (manager, _) = manager();
        assert_eq!(manager.state(), HandleState::Uninitialized);
        assert_eq!(manager.stats().handles_created, 0);
    }

    #[tokio::test]
    async fn test_acquire_twice_opens_once() {
        let (mut manager, _) = manager();

        assert_eq!(manager.acquire().await.unwrap().state(), ConnectionState::Open);
        assert_eq!(manager.acquire().await.unwrap().state(), ConnectionState::Open);

        let stats = manager.stats();
        assert_eq!(stats.handles_created, 1);
        assert_eq!(stats.opens, 1);
        assert_eq!(manager.state(), HandleState::Open);
    }

    #[tokio::test]
    async fn test_reopens_after_link_drop() {
        let (mut manager, link) = manager();
        manager.acquire().await.unwrap();

        link.store(false, Ordering::SeqCst);
        assert_eq!(manager.state(), HandleState::Closed);

        manager.acquire().await.unwrap();
        let stats = manager.stats();
        assert_eq!(stats.handles_created, 1);
        assert_eq!(stats.opens, 2);
    }

    #[tokio::test]
    async fn test_dispose_is_idempotent() {
        let (mut manager, link) = manager();
        manager.acquire().await.unwrap();

        manager.dispose().await;
        manager.dispose().await;

        assert!(!link.load(Ordering::SeqCst));
        assert_eq!(manager.stats().closes, 1);
        assert_eq!(manager.state(), HandleState::Disposed);
        assert!(matches!(manager.acquire().await, Err(Error::Disposed)));
    }

    #[tokio::test]
    async fn test_dispose_without_handle() {
        let (mut manager, _) = manager();
        manager.dispose().await;
        assert_eq!(manager.stats().closes, 0);
        assert_eq!(manager.state(), HandleState::Disposed);
    }
}
