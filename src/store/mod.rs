//! Key-value store abstraction.
//!
//! The engine needs a Redis-shaped store: hashes, sets, lists, sorted sets,
//! an atomic counter, and an all-or-nothing [`Batch`] of writes. A batch may
//! carry watched key versions; if any watched key changed since its version
//! was read, the whole batch is discarded with [`StoreError::WatchConflict`].

pub mod memory;

use std::collections::HashMap;

use thiserror::Error;

pub use memory::MemoryStore;

/// Errors reported by a store backend.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum StoreError {
    /// Operation against a key holding the wrong kind of value.
    #[error("WRONGTYPE operation against key {0}")]
    WrongType(String),

    /// Counter key does not hold an integer.
    #[error("Value at {0} is not an integer")]
    NotInteger(String),

    /// A watched key changed before the batch executed. Nothing was applied.
    #[error("Watched key changed, batch discarded")]
    WatchConflict,

    /// Internal lock poisoned by a panicking writer.
    #[error("Store lock poisoned")]
    Poisoned,
}

/// Convenience result type for store operations.
pub type StoreResult<T> = Result<T, StoreError>;

/// One end of a score range.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ScoreBound {
    Inclusive(f64),
    Exclusive(f64),
    Unbounded,
}

impl ScoreBound {
    /// Whether `score` satisfies this bound used as a minimum.
    pub fn admits_from_below(&self, score: f64) -> bool {
        match *self {
            Self::Inclusive(min) => score >= min,
            Self::Exclusive(min) => score > min,
            Self::Unbounded => true,
        }
    }

    /// Whether `score` satisfies this bound used as a maximum.
    pub fn admits_from_above(&self, score: f64) -> bool {
        match *self {
            Self::Inclusive(max) => score <= max,
            Self::Exclusive(max) => score < max,
            Self::Unbounded => true,
        }
    }
}

/// A single write inside a batch.
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    HSet {
        key: String,
        fields: Vec<(String, String)>,
    },
    HDel {
        key: String,
        field: String,
    },
    SAdd {
        key: String,
        member: String,
    },
    SRem {
        key: String,
        member: String,
    },
    ZAdd {
        key: String,
        member: String,
        score: f64,
    },
    ZRem {
        key: String,
        member: String,
    },
    RPush {
        key: String,
        value: String,
    },
    /// Remove every occurrence of `value`.
    LRem {
        key: String,
        value: String,
    },
    Del {
        key: String,
    },
}

impl Command {
    pub fn key(&self) -> &str {
        match self {
            Self::HSet { key, .. }
            | Self::HDel { key, .. }
            | Self::SAdd { key, .. }
            | Self::SRem { key, .. }
            | Self::ZAdd { key, .. }
            | Self::ZRem { key, .. }
            | Self::RPush { key, .. }
            | Self::LRem { key, .. }
            | Self::Del { key } => key,
        }
    }
}

/// An ordered group of writes applied atomically.
#[derive(Debug, Clone, Default)]
pub struct Batch {
    commands: Vec<Command>,
    watches: Vec<(String, u64)>,
}

impl Batch {
    pub fn new() -> Self {
        Self::default()
    }

    /// Guard the batch on `key` still being at `version`. The first version
    /// recorded for a key wins.
    pub fn watch(&mut self, key: impl Into<String>, version: u64) {
        let key = key.into();
        if !self.watches.iter().any(|(k, _)| *k == key) {
            self.watches.push((key, version));
        }
    }

    pub fn push(&mut self, command: Command) {
        self.commands.push(command);
    }

    pub fn hset(&mut self, key: impl Into<String>, fields: Vec<(String, String)>) {
        self.push(Command::HSet {
            key: key.into(),
            fields,
        });
    }

    pub fn hdel(&mut self, key: impl Into<String>, field: impl Into<String>) {
        self.push(Command::HDel {
            key: key.into(),
            field: field.into(),
        });
    }

    pub fn sadd(&mut self, key: impl Into<String>, member: impl Into<String>) {
        self.push(Command::SAdd {
            key: key.into(),
            member: member.into(),
        });
    }

    pub fn srem(&mut self, key: impl Into<String>, member: impl Into<String>) {
        self.push(Command::SRem {
            key: key.into(),
            member: member.into(),
        });
    }

    pub fn zadd(&mut self, key: impl Into<String>, member: impl Into<String>, score: f64) {
        self.push(Command::ZAdd {
            key: key.into(),
            member: member.into(),
            score,
        });
    }

    pub fn zrem(&mut self, key: impl Into<String>, member: impl Into<String>) {
        self.push(Command::ZRem {
            key: key.into(),
            member: member.into(),
        });
    }

    pub fn rpush(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.push(Command::RPush {
            key: key.into(),
            value: value.into(),
        });
    }

    pub fn lrem(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.push(Command::LRem {
            key: key.into(),
            value: value.into(),
        });
    }

    pub fn del(&mut self, key: impl Into<String>) {
        self.push(Command::Del { key: key.into() });
    }

    pub fn commands(&self) -> &[Command] {
        &self.commands
    }

    pub fn watches(&self) -> &[(String, u64)] {
        &self.watches
    }

    pub fn len(&self) -> usize {
        self.commands.len()
    }

    pub fn is_empty(&self) -> bool {
        self.commands.is_empty()
    }
}

/// The primitives the engine consumes from a key-value store.
///
/// Ranges follow Redis conventions: `start`/`stop` are inclusive ranks and
/// negative values count from the end.
pub trait Store: Send + Sync {
    fn exists(&self, key: &str) -> StoreResult<bool>;

    /// Modification stamp of `key`; changes whenever its contents change,
    /// including delete. Absent keys may share a stamp.
    fn version(&self, key: &str) -> StoreResult<u64>;

    fn hgetall(&self, key: &str) -> StoreResult<HashMap<String, String>>;

    fn hget(&self, key: &str, field: &str) -> StoreResult<Option<String>>;

    fn hexists(&self, key: &str, field: &str) -> StoreResult<bool> {
        Ok(self.hget(key, field)?.is_some())
    }

    /// Atomically increment the counter at `key`, returning the new value.
    fn incr(&self, key: &str) -> StoreResult<i64>;

    /// Members of a set, in lexicographic order.
    fn smembers(&self, key: &str) -> StoreResult<Vec<String>>;

    fn sismember(&self, key: &str, member: &str) -> StoreResult<bool>;

    fn lrange(&self, key: &str, start: i64, stop: i64) -> StoreResult<Vec<String>>;

    fn llen(&self, key: &str) -> StoreResult<usize>;

    fn zrange(
        &self,
        key: &str,
        start: i64,
        stop: i64,
        rev: bool,
    ) -> StoreResult<Vec<(String, f64)>>;

    /// Members with `min <= score <= max` (per bound kind). `rev` yields
    /// descending order; `limit` is `(offset, count)` applied after ordering.
    fn zrangebyscore(
        &self,
        key: &str,
        min: ScoreBound,
        max: ScoreBound,
        rev: bool,
        limit: Option<(usize, usize)>,
    ) -> StoreResult<Vec<(String, f64)>>;

    fn zcount(&self, key: &str, min: ScoreBound, max: ScoreBound) -> StoreResult<usize>;

    fn zrank(&self, key: &str, member: &str, rev: bool) -> StoreResult<Option<usize>>;

    fn zscore(&self, key: &str, member: &str) -> StoreResult<Option<f64>>;

    fn zcard(&self, key: &str) -> StoreResult<usize>;

    /// Apply every command of `batch` or none of them. Returns one integer
    /// reply per command.
    fn exec(&self, batch: Batch) -> StoreResult<Vec<i64>>;
}
