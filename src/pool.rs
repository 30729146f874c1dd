//! Connections to the backing store and the pool that hands them out.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use redis::aio::MultiplexedConnection;
use tokio::sync::{OwnedSemaphorePermit, Semaphore};

use crate::error::{Error, Result};
use crate::resp::{Cmd, RespValue};
use crate::transaction::Transaction;

/// Environment variable read by [`PoolConfig::from_env`].
pub const ADDR_ENV: &str = "REDMODEL_ADDR";

/// A request/reply channel to the store.
#[async_trait]
pub trait Connection: Send {
    /// Send every command in one round trip; one reply per command, in order.
    async fn pipeline(&mut self, cmds: &[Cmd]) -> Result<Vec<RespValue>>;

    /// Run `cmds` inside `MULTI`/`EXEC` and return the `EXEC` replies.
    async fn transaction(&mut self, cmds: &[Cmd]) -> Result<Vec<RespValue>> {
        let mut wrapped = Vec::with_capacity(cmds.len() + 2);
        wrapped.push(Cmd::new("MULTI"));
        wrapped.extend_from_slice(cmds);
        wrapped.push(Cmd::new("EXEC"));
        let replies = self.pipeline(&wrapped).await?;
        unpack_exec(replies, cmds.len())
    }
}

/// Opens new connections for a [`Pool`].
#[async_trait]
pub trait Connector: Send + Sync {
    async fn connect(&self) -> Result<Box<dyn Connection>>;
}

fn unpack_exec(replies: Vec<RespValue>, queued: usize) -> Result<Vec<RespValue>> {
    if replies.len() != queued + 2 {
        return Err(Error::Protocol(format!(
            "expected {} replies to MULTI/EXEC, got {}",
            queued + 2,
            replies.len()
        )));
    }
    let mut replies = replies.into_iter();
    for reply in replies.by_ref().take(queued + 1) {
        // MULTI answers OK, each queued command QUEUED or a queue-time error
        reply.into_result()?;
    }
    match replies.next() {
        Some(RespValue::Array(Some(items))) if items.len() == queued => Ok(items),
        Some(RespValue::Array(Some(items))) => Err(Error::Protocol(format!(
            "EXEC returned {} replies for {} commands",
            items.len(),
            queued
        ))),
        Some(RespValue::Array(None)) => Err(Error::Store("transaction aborted".to_string())),
        Some(RespValue::Error(msg)) => Err(Error::Store(msg)),
        _ => Err(Error::Protocol("malformed EXEC reply".to_string())),
    }
}

#[derive(Debug, Clone)]
pub struct PoolConfig {
    /// `host:port` of the store, or a full `redis://` URL.
    pub address: String,
    /// Upper bound on connections in use at once.
    pub max_active: usize,
    /// Connections kept open for reuse.
    pub max_idle: usize,
    pub connect_timeout: Option<Duration>,
    /// Deadline for one whole round trip.
    pub io_timeout: Option<Duration>,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            address: "127.0.0.1:6379".to_string(),
            max_active: 16,
            max_idle: 8,
            connect_timeout: Some(Duration::from_secs(5)),
            io_timeout: Some(Duration::from_secs(5)),
        }
    }
}

impl PoolConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Defaults, with the address taken from `REDMODEL_ADDR` when set.
    pub fn from_env() -> Self {
        let mut config = Self::default();
        if let Ok(addr) = std::env::var(ADDR_ENV) {
            if !addr.trim().is_empty() {
                config.address = addr.trim().to_string();
            }
        }
        config
    }

    /// Connection URL for the `redis` client.
    pub fn url(&self) -> String {
        if self.address.contains("://") {
            self.address.clone()
        } else {
            format!("redis://{}", self.address)
        }
    }

    pub fn address(mut self, address: impl Into<String>) -> Self {
        self.address = address.into();
        self
    }

    pub fn max_active(mut self, n: usize) -> Self {
        self.max_active = n.max(1);
        self
    }

    pub fn max_idle(mut self, n: usize) -> Self {
        self.max_idle = n;
        self
    }

    pub fn connect_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.connect_timeout = timeout;
        self
    }

    pub fn io_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.io_timeout = timeout;
        self
    }
}

/// Connection to a Redis server, multiplexed by the `redis` client.
#[derive(Clone)]
pub struct RedisConnection {
    conn: MultiplexedConnection,
    io_timeout: Option<Duration>,
}

impl RedisConnection {
    pub fn new(conn: MultiplexedConnection, io_timeout: Option<Duration>) -> Self {
        Self { conn, io_timeout }
    }

    async fn query(&mut self, pipe: &redis::Pipeline) -> Result<redis::Value> {
        let sent = pipe.query_async::<_, redis::Value>(&mut self.conn);
        let reply = match self.io_timeout {
            Some(limit) => tokio::time::timeout(limit, sent)
                .await
                .map_err(|_| Error::Timeout)?,
            None => sent.await,
        };
        Ok(reply?)
    }
}

fn to_pipeline(cmds: &[Cmd]) -> redis::Pipeline {
    let mut pipe = redis::pipe();
    for cmd in cmds {
        let mut out = redis::Cmd::new();
        for arg in cmd.as_args() {
            out.arg(arg.as_slice());
        }
        pipe.add_command(out);
    }
    pipe
}

fn to_resp(value: redis::Value) -> RespValue {
    match value {
        redis::Value::Nil => RespValue::null(),
        redis::Value::Int(n) => RespValue::Integer(n),
        redis::Value::Data(bytes) => RespValue::from_bytes(bytes),
        redis::Value::Bulk(items) => RespValue::Array(Some(items.into_iter().map(to_resp).collect())),
        redis::Value::Status(s) => RespValue::SimpleString(s),
        redis::Value::Okay => RespValue::ok(),
    }
}

fn unpack_replies(reply: redis::Value, sent: usize) -> Result<Vec<RespValue>> {
    match reply {
        redis::Value::Bulk(items) if items.len() == sent => Ok(items.into_iter().map(to_resp).collect()),
        redis::Value::Bulk(items) => Err(Error::Protocol(format!(
            "got {} replies for {} commands",
            items.len(),
            sent
        ))),
        _ => Err(Error::Protocol("malformed pipeline reply".to_string())),
    }
}

#[async_trait]
impl Connection for RedisConnection {
    async fn pipeline(&mut self, cmds: &[Cmd]) -> Result<Vec<RespValue>> {
        if cmds.is_empty() {
            return Ok(Vec::new());
        }
        let reply = self.query(&to_pipeline(cmds)).await?;
        unpack_replies(reply, cmds.len())
    }

    async fn transaction(&mut self, cmds: &[Cmd]) -> Result<Vec<RespValue>> {
        if cmds.is_empty() {
            return Ok(Vec::new());
        }
        let mut pipe = to_pipeline(cmds);
        pipe.atomic();
        match self.query(&pipe).await? {
            redis::Value::Nil => Err(Error::Store("transaction aborted".to_string())),
            reply => unpack_replies(reply, cmds.len()),
        }
    }
}

/// Opens [`RedisConnection`]s to `PoolConfig::url`.
#[derive(Debug, Clone)]
pub struct RedisConnector {
    url: String,
    connect_timeout: Option<Duration>,
    io_timeout: Option<Duration>,
}

impl RedisConnector {
    pub fn new(config: &PoolConfig) -> Self {
        Self {
            url: config.url(),
            connect_timeout: config.connect_timeout,
            io_timeout: config.io_timeout,
        }
    }
}

#[async_trait]
impl Connector for RedisConnector {
    async fn connect(&self) -> Result<Box<dyn Connection>> {
        let client = redis::Client::open(self.url.as_str())?;
        let connecting = client.get_multiplexed_tokio_connection();
        let conn = match self.connect_timeout {
            Some(limit) => tokio::time::timeout(limit, connecting)
                .await
                .map_err(|_| Error::Timeout)??,
            None => connecting.await?,
        };
        tracing::debug!("Connected to {}", self.url);
        Ok(Box::new(RedisConnection::new(conn, self.io_timeout)))
    }
}

struct PoolInner {
    connector: Box<dyn Connector>,
    config: PoolConfig,
    idle: Mutex<Vec<Box<dyn Connection>>>,
    slots: Arc<Semaphore>,
}

/// Shared, clonable handle to a set of store connections.
#[derive(Clone)]
pub struct Pool {
    inner: Arc<PoolInner>,
}

impl Pool {
    /// Pool of Redis connections to `config.address`.
    pub fn new(config: PoolConfig) -> Self {
        let connector = RedisConnector::new(&config);
        Self::with_connector(connector, config)
    }

    pub fn with_connector(connector: impl Connector + 'static, config: PoolConfig) -> Self {
        let slots = Arc::new(Semaphore::new(config.max_active.max(1)));
        Self {
            inner: Arc::new(PoolInner {
                connector: Box::new(connector),
                config,
                idle: Mutex::new(Vec::new()),
                slots,
            }),
        }
    }

    pub fn config(&self) -> &PoolConfig {
        &self.inner.config
    }

    /// Wait for a free slot and hand out a connection, reusing an idle one.
    pub async fn get(&self) -> Result<PooledConnection> {
        let permit = Arc::clone(&self.inner.slots)
            .acquire_owned()
            .await
            .map_err(|_| Error::Store("connection pool is closed".to_string()))?;

        let idle = self
            .inner
            .idle
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .pop();
        let conn = match idle {
            Some(conn) => conn,
            None => self.inner.connector.connect().await?,
        };

        Ok(PooledConnection {
            conn: Some(conn),
            pool: Arc::clone(&self.inner),
            broken: false,
            _permit: permit,
        })
    }

    /// Connections currently parked for reuse.
    pub fn idle_count(&self) -> usize {
        self.inner.idle.lock().unwrap_or_else(|e| e.into_inner()).len()
    }

    /// Start a new command batch.
    pub fn transaction<'a>(&self) -> Transaction<'a> {
        Transaction::new(self)
    }
}

/// A connection on loan from a [`Pool`]; returned on drop.
pub struct PooledConnection {
    conn: Option<Box<dyn Connection>>,
    pool: Arc<PoolInner>,
    broken: bool,
    _permit: OwnedSemaphorePermit,
}

impl PooledConnection {
    pub async fn pipeline(&mut self, cmds: &[Cmd]) -> Result<Vec<RespValue>> {
        let Some(conn) = self.conn.as_mut() else {
            return Err(Error::Protocol("connection already released".to_string()));
        };
        // stays set if this future is dropped before the replies are read
        self.broken = true;
        let result = conn.pipeline(cmds).await;
        self.settle(result)
    }

    pub async fn transaction(&mut self, cmds: &[Cmd]) -> Result<Vec<RespValue>> {
        let Some(conn) = self.conn.as_mut() else {
            return Err(Error::Protocol("connection already released".to_string()));
        };
        self.broken = true;
        let result = conn.transaction(cmds).await;
        self.settle(result)
    }

    fn settle<T>(&mut self, result: Result<T>) -> Result<T> {
        self.broken = matches!(&result, Err(e) if e.is_transport());
        result
    }
}

impl Drop for PooledConnection {
    fn drop(&mut self) {
        let Some(conn) = self.conn.take() else {
            return;
        };
        if self.broken {
            tracing::debug!("Discarding connection after an unfinished round trip");
            return;
        }
        let mut idle = self.pool.idle.lock().unwrap_or_else(|e| e.into_inner());
        if idle.len() < self.pool.config.max_idle {
            idle.push(conn);
        }
    }
}
