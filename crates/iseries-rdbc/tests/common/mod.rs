//! Scripted in-memory driver shared by the integration tests

#![allow(dead_code)]

use async_trait::async_trait;
use iseries_rdbc::prelude::*;
use rust_decimal::Decimal;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::{Arc, Mutex};

type QueryScript = dyn Fn(u32, &str, &Parameters) -> Result<ResultSet> + Send + Sync;
type ExecuteScript = dyn Fn(&str, &Parameters) -> Result<u64> + Send + Sync;

/// Install a test-writer subscriber once; honours `RUST_LOG`
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

/// Driver double: counts every lifecycle call and answers statements from scripts
pub struct FakeDriver {
    pub created: AtomicU32,
    pub opens: AtomicU32,
    pub closes: AtomicU32,
    pub queries: AtomicU32,
    pub executes: AtomicU32,
    pub fail_open: AtomicBool,
    links: Mutex<Vec<Arc<AtomicBool>>>,
    seen: Mutex<Vec<(String, Parameters)>>,
    query: Box<QueryScript>,
    execute: Box<ExecuteScript>,
}

impl FakeDriver {
    /// Driver that answers every query with [`customers`] and every update with 1
    pub fn new() -> Arc<Self> {
        Self::build(|_, _, _| Ok(customers()), |_, _| Ok(1))
    }

    /// Driver with a scripted query; the closure receives the 1-based call number
    pub fn with_query<F>(query: F) -> Arc<Self>
    where
        F: Fn(u32, &str, &Parameters) -> Result<ResultSet> + Send + Sync + 'static,
    {
        Self::build(query, |_, _| Ok(1))
    }

    /// Driver with a scripted update
    pub fn with_execute<F>(execute: F) -> Arc<Self>
    where
        F: Fn(&str, &Parameters) -> Result<u64> + Send + Sync + 'static,
    {
        Self::build(|_, _, _| Ok(customers()), execute)
    }

    fn build<Q, E>(query: Q, execute: E) -> Arc<Self>
    where
        Q: Fn(u32, &str, &Parameters) -> Result<ResultSet> + Send + Sync + 'static,
        E: Fn(&str, &Parameters) -> Result<u64> + Send + Sync + 'static,
    {
        Arc::new(Self {
            created: AtomicU32::new(0),
            opens: AtomicU32::new(0),
            closes: AtomicU32::new(0),
            queries: AtomicU32::new(0),
            executes: AtomicU32::new(0),
            fail_open: AtomicBool::new(false),
            links: Mutex::new(Vec::new()),
            seen: Mutex::new(Vec::new()),
            query: Box::new(query),
            execute: Box::new(execute),
        })
    }

    /// Factory handing out connections backed by this driver
    pub fn factory(self: &Arc<Self>) -> Arc<dyn ConnectionFactory> {
        Arc::new(FakeFactory(Arc::clone(self)))
    }

    /// Simulate the server dropping every open link
    pub fn drop_links(&self) {
        for link in self.links.lock().unwrap().iter() {
            link.store(false, Ordering::SeqCst);
        }
    }

    /// Statements and parameters received so far, in order
    pub fn seen(&self) -> Vec<(String, Parameters)> {
        self.seen.lock().unwrap().clone()
    }

    pub fn count(counter: &AtomicU32) -> u32 {
        counter.load(Ordering::SeqCst)
    }
}

pub struct FakeFactory(pub Arc<FakeDriver>);

impl ConnectionFactory for FakeFactory {
    fn create(&self, _config: &ConnectionConfig) -> Result<Box<dyn Connection>> {
        self.0.created.fetch_add(1, Ordering::SeqCst);
        let link = Arc::new(AtomicBool::new(false));
        self.0.links.lock().unwrap().push(Arc::clone(&link));
        Ok(Box::new(FakeConnection {
            driver: Arc::clone(&self.0),
            link,
        }))
    }
}

struct FakeConnection {
    driver: Arc<FakeDriver>,
    link: Arc<AtomicBool>,
}

impl FakeConnection {
    fn check_open(&self) -> Result<()> {
        if self.link.load(Ordering::SeqCst) {
            Ok(())
        } else {
            Err(Error::connection("connection is not open"))
        }
    }
}

#[async_trait]
impl Connection for FakeConnection {
    fn state(&self) -> ConnectionState {
        if self.link.load(Ordering::SeqCst) {
            ConnectionState::Open
        } else {
            ConnectionState::Closed
        }
    }

    async fn open(&mut self) -> Result<()> {
        if self.driver.fail_open.load(Ordering::SeqCst) {
            return Err(Error::connection("host unreachable"));
        }
        self.link.store(true, Ordering::SeqCst);
        self.driver.opens.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn query(&mut self, sql: &str, params: &Parameters) -> Result<ResultSet> {
        self.check_open()?;
        let n = self.driver.queries.fetch_add(1, Ordering::SeqCst) + 1;
        self.driver
            .seen
            .lock()
            .unwrap()
            .push((sql.to_string(), params.clone()));
        (self.driver.query)(n, sql, params)
    }

    async fn execute(&mut self, sql: &str, params: &Parameters) -> Result<u64> {
        self.check_open()?;
        self.driver.executes.fetch_add(1, Ordering::SeqCst);
        self.driver
            .seen
            .lock()
            .unwrap()
            .push((sql.to_string(), params.clone()));
        (self.driver.execute)(sql, params)
    }

    async fn close(&mut self) -> Result<()> {
        self.link.store(false, Ordering::SeqCst);
        self.driver.closes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

/// Two rows shaped like QIWS.QCUSTCDT
pub fn customers() -> ResultSet {
    let names: Vec<String> = ["CUSNUM", "LSTNAM", "STATE", "CDTLMT", "BALDUE"]
        .iter()
        .map(|s| s.to_string())
        .collect();
    ResultSet::new(
        vec![
            ColumnMetadata::new("CUSNUM", "NUMERIC").with_ordinal(1).not_null(),
            ColumnMetadata::new("LSTNAM", "CHAR").with_ordinal(2).not_null(),
            ColumnMetadata::new("STATE", "CHAR").with_ordinal(3),
            ColumnMetadata::new("CDTLMT", "NUMERIC").with_ordinal(4),
            ColumnMetadata::new("BALDUE", "NUMERIC").with_ordinal(5),
        ],
        vec![
            Row::new(
                names.clone(),
                vec![
                    Value::Int32(938472),
                    Value::from("Henning"),
                    Value::from("TX"),
                    Value::Int32(5000),
                    Value::Decimal(Decimal::new(3700, 2)),
                ],
            ),
            Row::new(
                names,
                vec![
                    Value::Int32(839283),
                    Value::from("Jones"),
                    Value::Null,
                    Value::Null,
                    Value::Decimal(Decimal::new(10000, 2)),
                ],
            ),
        ],
    )
}

/// Typed mapping target for [`customers`]
#[derive(Debug, Default, Clone, PartialEq)]
pub struct Customer {
    pub number: i32,
    pub last_name: String,
    pub state: Option<String>,
    pub credit_limit: Option<Decimal>,
    pub balance_due: Decimal,
}

impl FromRow for Customer {
    fn populate_from_row(&mut self, reader: &RowReader<'_>) -> Result<()> {
        self.number = reader.get_i32("CUSNUM")?;
        self.last_name = reader.get_string("LSTNAM")?;
        self.state = reader.get_string_or("STATE", None)?;
        self.credit_limit = reader.get_decimal_or("CDTLMT", None)?;
        self.balance_due = reader.get_decimal("BALDUE")?;
        Ok(())
    }
}
