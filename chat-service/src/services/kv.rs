//! Key-value store adapter.
//!
//! `KvStore` exposes the hash, list and expiry primitives the session store
//! is built on. `RedisStore` is the production backend; `MemoryStore` keeps
//! the same semantics in process for tests and local development.

use super::error::StoreError;
use async_trait::async_trait;
use redis::{aio::ConnectionManager, Client, RedisResult, Script};
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, RwLock};
use std::time::{Duration, Instant};

/// Push onto the head of a list, refresh its TTL and trim it to `cap`,
/// returning the ids that fell off the tail. Runs atomically server-side.
const PUSH_CAPPED_LUA: &str = r#"
redis.call('LPUSH', KEYS[1], ARGV[1])
redis.call('EXPIRE', KEYS[1], ARGV[3])
local cap = tonumber(ARGV[2])
local evicted = redis.call('LRANGE', KEYS[1], cap, -1)
if #evicted > 0 then
  redis.call('LTRIM', KEYS[1], 0, cap - 1)
end
return evicted
"#;

#[async_trait]
pub trait KvStore: Send + Sync {
    /// Set several hash fields at once.
    async fn hset_all(&self, key: &str, fields: &[(&str, String)]) -> Result<(), StoreError>;

    async fn hset(&self, key: &str, field: &str, value: &str) -> Result<(), StoreError>;

    /// All fields of a hash; empty when the key does not exist.
    async fn hgetall(&self, key: &str) -> Result<HashMap<String, String>, StoreError>;

    async fn hincr_by(&self, key: &str, field: &str, delta: i64) -> Result<i64, StoreError>;

    async fn exists(&self, key: &str) -> Result<bool, StoreError>;

    /// Returns false when the key does not exist.
    async fn expire(&self, key: &str, ttl_seconds: u64) -> Result<bool, StoreError>;

    /// Returns false when the key did not exist.
    async fn del(&self, key: &str) -> Result<bool, StoreError>;

    /// Inclusive range with Redis index semantics (negative counts from the tail).
    async fn lrange(&self, key: &str, start: isize, stop: isize)
        -> Result<Vec<String>, StoreError>;

    /// Remove up to `count` occurrences of `value` (0 = all, negative = from the tail).
    async fn lrem(&self, key: &str, count: isize, value: &str) -> Result<usize, StoreError>;

    /// Atomically prepend `value`, refresh the list TTL and trim the list to
    /// `cap` entries. `cap` must be at least 1. Returns the entries removed
    /// from the tail, oldest last.
    async fn push_capped(
        &self,
        key: &str,
        value: &str,
        cap: usize,
        ttl_seconds: u64,
    ) -> Result<Vec<String>, StoreError>;

    async fn ping(&self) -> Result<(), StoreError>;

    /// Non-blocking view of the connection state.
    fn is_ready(&self) -> bool;
}

/// Redis-backed store sharing one auto-reconnecting connection.
pub struct RedisStore {
    client: Client,
    manager: RwLock<Option<ConnectionManager>>,
    ready: AtomicBool,
    push_capped_script: Script,
}

impl RedisStore {
    /// Create an unconnected store; call [`RedisStore::connect`] before use.
    pub fn new(url: &str) -> Result<Self, StoreError> {
        let client = Client::open(url).map_err(|e| StoreError::Connection(e.to_string()))?;
        Ok(Self {
            client,
            manager: RwLock::new(None),
            ready: AtomicBool::new(false),
            push_capped_script: Script::new(PUSH_CAPPED_LUA),
        })
    }

    /// Establish the shared connection. Idempotent; does not retry.
    pub async fn connect(&self) -> Result<(), StoreError> {
        if self.client().is_ok() {
            return Ok(());
        }

        tracing::info!("Connecting to Redis");
        let manager = self.client.get_connection_manager().await.map_err(|e| {
            tracing::error!(error = %e, "Failed to connect to Redis");
            StoreError::Connection(e.to_string())
        })?;

        let mut slot = self
            .manager
            .write()
            .map_err(|_| StoreError::Command("connection slot poisoned".to_string()))?;
        if slot.is_none() {
            *slot = Some(manager);
        }
        self.ready.store(true, Ordering::SeqCst);
        tracing::info!("Redis connection established");
        Ok(())
    }

    /// Drop the shared connection for graceful shutdown.
    pub fn disconnect(&self) {
        if let Ok(mut slot) = self.manager.write() {
            if slot.take().is_some() {
                tracing::info!("Redis connection closed");
            }
        }
        self.ready.store(false, Ordering::SeqCst);
    }

    /// A handle to the shared connection. Cheap to clone.
    pub fn client(&self) -> Result<ConnectionManager, StoreError> {
        self.manager
            .read()
            .map_err(|_| StoreError::Command("connection slot poisoned".to_string()))?
            .clone()
            .ok_or(StoreError::NotConnected)
    }

    /// Convert a command result and log connectivity transitions.
    fn track<T>(&self, result: RedisResult<T>) -> Result<T, StoreError> {
        match result {
            Ok(value) => {
                if !self.ready.swap(true, Ordering::SeqCst) {
                    tracing::info!("Redis connection restored");
                }
                Ok(value)
            }
            Err(e) => {
                let lost = e.is_io_error() || e.is_connection_dropped() || e.is_timeout();
                if lost && self.ready.swap(false, Ordering::SeqCst) {
                    tracing::error!(error = %e, "Redis connection lost");
                }
                Err(StoreError::Redis(e))
            }
        }
    }
}

#[async_trait]
impl KvStore for RedisStore {
    async fn hset_all(&self, key: &str, fields: &[(&str, String)]) -> Result<(), StoreError> {
        let mut conn = self.client()?;
        let mut cmd = redis::cmd("HSET");
        cmd.arg(key);
        for (field, value) in fields {
            cmd.arg(*field).arg(value);
        }
        self.track(cmd.query_async::<_, ()>(&mut conn).await)
    }

    async fn hset(&self, key: &str, field: &str, value: &str) -> Result<(), StoreError> {
        let mut conn = self.client()?;
        self.track(
            redis::cmd("HSET")
                .arg(key)
                .arg(field)
                .arg(value)
                .query_async::<_, ()>(&mut conn)
                .await,
        )
    }

    async fn hgetall(&self, key: &str) -> Result<HashMap<String, String>, StoreError> {
        let mut conn = self.client()?;
        self.track(redis::cmd("HGETALL").arg(key).query_async(&mut conn).await)
    }

    async fn hincr_by(&self, key: &str, field: &str, delta: i64) -> Result<i64, StoreError> {
        let mut conn = self.client()?;
        self.track(
            redis::cmd("HINCRBY")
                .arg(key)
                .arg(field)
                .arg(delta)
                .query_async(&mut conn)
                .await,
        )
    }

    async fn exists(&self, key: &str) -> Result<bool, StoreError> {
        let mut conn = self.client()?;
        self.track(redis::cmd("EXISTS").arg(key).query_async(&mut conn).await)
    }

    async fn expire(&self, key: &str, ttl_seconds: u64) -> Result<bool, StoreError> {
        let mut conn = self.client()?;
        self.track(
            redis::cmd("EXPIRE")
                .arg(key)
                .arg(ttl_seconds)
                .query_async(&mut conn)
                .await,
        )
    }

    async fn del(&self, key: &str) -> Result<bool, StoreError> {
        let mut conn = self.client()?;
        let removed: i64 = self.track(redis::cmd("DEL").arg(key).query_async(&mut conn).await)?;
        Ok(removed > 0)
    }

    async fn lrange(
        &self,
        key: &str,
        start: isize,
        stop: isize,
    ) -> Result<Vec<String>, StoreError> {
        let mut conn = self.client()?;
        self.track(
            redis::cmd("LRANGE")
                .arg(key)
                .arg(start)
                .arg(stop)
                .query_async(&mut conn)
                .await,
        )
    }

    async fn lrem(&self, key: &str, count: isize, value: &str) -> Result<usize, StoreError> {
        let mut conn = self.client()?;
        self.track(
            redis::cmd("LREM")
                .arg(key)
                .arg(count)
                .arg(value)
                .query_async(&mut conn)
                .await,
        )
    }

    async fn push_capped(
        &self,
        key: &str,
        value: &str,
        cap: usize,
        ttl_seconds: u64,
    ) -> Result<Vec<String>, StoreError> {
        let mut conn = self.client()?;
        self.track(
            self.push_capped_script
                .key(key)
                .arg(value)
                .arg(cap)
                .arg(ttl_seconds)
                .invoke_async(&mut conn)
                .await,
        )
    }

    async fn ping(&self) -> Result<(), StoreError> {
        let mut conn = self.client()?;
        let _: String = self.track(redis::cmd("PING").query_async(&mut conn).await)?;
        Ok(())
    }

    fn is_ready(&self) -> bool {
        self.ready.load(Ordering::SeqCst)
    }
}

#[derive(Debug, Clone)]
enum Value {
    Hash(HashMap<String, String>),
    List(VecDeque<String>),
}

#[derive(Debug, Clone)]
struct Entry {
    value: Value,
    expires_at: Option<Instant>,
}

/// In-process store with Redis list/hash/TTL semantics.
#[derive(Default)]
pub struct MemoryStore {
    entries: Mutex<HashMap<String, Entry>>,
}

const WRONG_TYPE: &str = "WRONGTYPE Operation against a key holding the wrong kind of value";

/// Resolve Redis-style inclusive indices against a list of `len` items.
/// Returns `None` for an empty range.
fn resolve_range(len: usize, start: isize, stop: isize) -> Option<(usize, usize)> {
    let len = len as isize;
    let start = if start < 0 { (len + start).max(0) } else { start };
    let stop = if stop < 0 { len + stop } else { stop.min(len - 1) };
    if len == 0 || start > stop || start >= len {
        None
    } else {
        Some((start as usize, stop as usize))
    }
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn with_entries<T>(
        &self,
        f: impl FnOnce(&mut HashMap<String, Entry>) -> Result<T, StoreError>,
    ) -> Result<T, StoreError> {
        let mut entries = self
            .entries
            .lock()
            .map_err(|e| StoreError::Command(format!("Memory store mutex poisoned: {}", e)))?;
        let now = Instant::now();
        entries.retain(|_, entry| entry.expires_at.is_none_or(|at| at > now));
        f(&mut entries)
    }

    /// Remaining lifetime of a key; `None` when absent or persistent.
    pub fn ttl(&self, key: &str) -> Option<Duration> {
        self.with_entries(|entries| {
            Ok(entries
                .get(key)
                .and_then(|e| e.expires_at)
                .map(|at| at.saturating_duration_since(Instant::now())))
        })
        .ok()
        .flatten()
    }

    /// Drop a key as if its TTL had just lapsed.
    pub fn expire_now(&self, key: &str) {
        let _ = self.with_entries(|entries| {
            entries.remove(key);
            Ok(())
        });
    }

    fn hash_mut<'a>(
        entries: &'a mut HashMap<String, Entry>,
        key: &str,
    ) -> Result<&'a mut HashMap<String, String>, StoreError> {
        let entry = entries.entry(key.to_string()).or_insert_with(|| Entry {
            value: Value::Hash(HashMap::new()),
            expires_at: None,
        });
        match &mut entry.value {
            Value::Hash(hash) => Ok(hash),
            Value::List(_) => Err(StoreError::Command(WRONG_TYPE.to_string())),
        }
    }

    fn list_mut<'a>(
        entries: &'a mut HashMap<String, Entry>,
        key: &str,
    ) -> Result<&'a mut VecDeque<String>, StoreError> {
        let entry = entries.entry(key.to_string()).or_insert_with(|| Entry {
            value: Value::List(VecDeque::new()),
            expires_at: None,
        });
        match &mut entry.value {
            Value::List(list) => Ok(list),
            Value::Hash(_) => Err(StoreError::Command(WRONG_TYPE.to_string())),
        }
    }

    fn list_ref<'a>(
        entries: &'a HashMap<String, Entry>,
        key: &str,
    ) -> Result<Option<&'a VecDeque<String>>, StoreError> {
        match entries.get(key).map(|e| &e.value) {
            None => Ok(None),
            Some(Value::List(list)) => Ok(Some(list)),
            Some(Value::Hash(_)) => Err(StoreError::Command(WRONG_TYPE.to_string())),
        }
    }

    /// Redis deletes lists that become empty.
    fn drop_if_empty(entries: &mut HashMap<String, Entry>, key: &str) {
        let empty = matches!(entries.get(key), Some(Entry { value: Value::List(l), .. }) if l.is_empty());
        if empty {
            entries.remove(key);
        }
    }
}

#[async_trait]
impl KvStore for MemoryStore {
    async fn hset_all(&self, key: &str, fields: &[(&str, String)]) -> Result<(), StoreError> {
        self.with_entries(|entries| {
            let hash = Self::hash_mut(entries, key)?;
            for (field, value) in fields {
                hash.insert(field.to_string(), value.clone());
            }
            Ok(())
        })
    }

    async fn hset(&self, key: &str, field: &str, value: &str) -> Result<(), StoreError> {
        self.with_entries(|entries| {
            Self::hash_mut(entries, key)?.insert(field.to_string(), value.to_string());
            Ok(())
        })
    }

    async fn hgetall(&self, key: &str) -> Result<HashMap<String, String>, StoreError> {
        self.with_entries(|entries| match entries.get(key).map(|e| &e.value) {
            None => Ok(HashMap::new()),
            Some(Value::Hash(hash)) => Ok(hash.clone()),
            Some(Value::List(_)) => Err(StoreError::Command(WRONG_TYPE.to_string())),
        })
    }

    async fn hincr_by(&self, key: &str, field: &str, delta: i64) -> Result<i64, StoreError> {
        self.with_entries(|entries| {
            let hash = Self::hash_mut(entries, key)?;
            let current: i64 = match hash.get(field) {
                Some(raw) => raw.parse().map_err(|_| {
                    StoreError::Command("ERR hash value is not an integer".to_string())
                })?,
                None => 0,
            };
            let next = current + delta;
            hash.insert(field.to_string(), next.to_string());
            Ok(next)
        })
    }

    async fn exists(&self, key: &str) -> Result<bool, StoreError> {
        self.with_entries(|entries| Ok(entries.contains_key(key)))
    }

    async fn expire(&self, key: &str, ttl_seconds: u64) -> Result<bool, StoreError> {
        self.with_entries(|entries| match entries.get_mut(key) {
            Some(entry) => {
                entry.expires_at = Some(Instant::now() + Duration::from_secs(ttl_seconds));
                Ok(true)
            }
            None => Ok(false),
        })
    }

    async fn del(&self, key: &str) -> Result<bool, StoreError> {
        self.with_entries(|entries| Ok(entries.remove(key).is_some()))
    }

    async fn lrange(
        &self,
        key: &str,
        start: isize,
        stop: isize,
    ) -> Result<Vec<String>, StoreError> {
        self.with_entries(|entries| {
            let Some(list) = Self::list_ref(entries, key)? else {
                return Ok(Vec::new());
            };
            Ok(match resolve_range(list.len(), start, stop) {
                Some((start, stop)) => list.range(start..=stop).cloned().collect(),
                None => Vec::new(),
            })
        })
    }

    async fn lrem(&self, key: &str, count: isize, value: &str) -> Result<usize, StoreError> {
        self.with_entries(|entries| {
            if Self::list_ref(entries, key)?.is_none() {
                return Ok(0);
            }
            let list = Self::list_mut(entries, key)?;
            let limit = if count == 0 { usize::MAX } else { count.unsigned_abs() };
            let mut removed = 0;
            if count >= 0 {
                let mut i = 0;
                while i < list.len() && removed < limit {
                    if list[i] == value {
                        list.remove(i);
                        removed += 1;
                    } else {
                        i += 1;
                    }
                }
            } else {
                let mut i = list.len();
                while i > 0 && removed < limit {
                    i -= 1;
                    if list[i] == value {
                        list.remove(i);
                        removed += 1;
                    }
                }
            }
            Self::drop_if_empty(entries, key);
            Ok(removed)
        })
    }

    async fn push_capped(
        &self,
        key: &str,
        value: &str,
        cap: usize,
        ttl_seconds: u64,
    ) -> Result<Vec<String>, StoreError> {
        self.with_entries(|entries| {
            let list = Self::list_mut(entries, key)?;
            list.push_front(value.to_string());
            let evicted: Vec<String> = if list.len() > cap {
                list.drain(cap..).collect()
            } else {
                Vec::new()
            };
            if let Some(entry) = entries.get_mut(key) {
                entry.expires_at = Some(Instant::now() + Duration::from_secs(ttl_seconds));
            }
            Ok(evicted)
        })
    }

    async fn ping(&self) -> Result<(), StoreError> {
        self.with_entries(|_| Ok(()))
    }

    fn is_ready(&self) -> bool {
        true
    }
}
