//! In-process store with Redis semantics.

use std::cmp::Ordering;
use std::collections::{BTreeSet, HashMap};
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use super::{Batch, Command, ScoreBound, Store, StoreError, StoreResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Kind {
    Counter,
    Hash,
    Set,
    List,
    ZSet,
}

/// Sorted-set entry, ordered by score then member.
#[derive(Debug, Clone)]
struct ZEntry(f64, String);

impl PartialEq for ZEntry {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for ZEntry {}

impl PartialOrd for ZEntry {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for ZEntry {
    fn cmp(&self, other: &Self) -> Ordering {
        self.0.total_cmp(&other.0).then_with(|| self.1.cmp(&other.1))
    }
}

#[derive(Debug, Default)]
struct ZSet {
    scores: HashMap<String, f64>,
    order: BTreeSet<ZEntry>,
}

impl ZSet {
    fn add(&mut self, member: &str, score: f64) -> bool {
        let previous = self.scores.insert(member.to_string(), score);
        if let Some(old) = previous {
            self.order.remove(&ZEntry(old, member.to_string()));
        }
        self.order.insert(ZEntry(score, member.to_string()));
        previous.is_none()
    }

    fn remove(&mut self, member: &str) -> bool {
        match self.scores.remove(member) {
            Some(old) => {
                self.order.remove(&ZEntry(old, member.to_string()));
                true
            }
            None => false,
        }
    }

    fn ordered(&self, rev: bool) -> Vec<(String, f64)> {
        let iter = self.order.iter().map(|e| (e.1.clone(), e.0));
        if rev {
            iter.rev().collect()
        } else {
            iter.collect()
        }
    }
}

#[derive(Debug)]
enum Data {
    Counter(i64),
    Hash(HashMap<String, String>),
    Set(BTreeSet<String>),
    List(Vec<String>),
    ZSet(ZSet),
}

impl Data {
    fn kind(&self) -> Kind {
        match self {
            Self::Counter(_) => Kind::Counter,
            Self::Hash(_) => Kind::Hash,
            Self::Set(_) => Kind::Set,
            Self::List(_) => Kind::List,
            Self::ZSet(_) => Kind::ZSet,
        }
    }

    fn is_empty(&self) -> bool {
        match self {
            Self::Counter(_) => false,
            Self::Hash(h) => h.is_empty(),
            Self::Set(s) => s.is_empty(),
            Self::List(l) => l.is_empty(),
            Self::ZSet(z) => z.scores.is_empty(),
        }
    }

    fn empty(kind: Kind) -> Self {
        match kind {
            Kind::Counter => Self::Counter(0),
            Kind::Hash => Self::Hash(HashMap::new()),
            Kind::Set => Self::Set(BTreeSet::new()),
            Kind::List => Self::List(Vec::new()),
            Kind::ZSet => Self::ZSet(ZSet::default()),
        }
    }
}

fn command_kind(command: &Command) -> Option<Kind> {
    match command {
        Command::HSet { .. } | Command::HDel { .. } => Some(Kind::Hash),
        Command::SAdd { .. } | Command::SRem { .. } => Some(Kind::Set),
        Command::ZAdd { .. } | Command::ZRem { .. } => Some(Kind::ZSet),
        Command::RPush { .. } | Command::LRem { .. } => Some(Kind::List),
        Command::Del { .. } => None,
    }
}

/// Resolve an inclusive Redis-style rank window against a length.
fn span(len: usize, start: i64, stop: i64) -> Option<(usize, usize)> {
    let len = len as i64;
    let start = if start < 0 { (len + start).max(0) } else { start };
    let stop = if stop < 0 { len + stop } else { stop.min(len - 1) };
    if start >= len || start > stop {
        None
    } else {
        Some((start as usize, stop as usize))
    }
}

#[derive(Debug, Default)]
struct Keyspace {
    data: HashMap<String, Data>,
    /// Stamps of live keys only.
    versions: HashMap<String, u64>,
    clock: u64,
    /// Stamp of the latest removal of any key; the version of every absent
    /// key. A watch on an absent key is therefore broken by any removal.
    vacated: u64,
}

impl Keyspace {
    fn version(&self, key: &str) -> u64 {
        self.versions.get(key).copied().unwrap_or(self.vacated)
    }

    fn touch(&mut self, key: &str) {
        self.clock += 1;
        if self.data.contains_key(key) {
            self.versions.insert(key.to_string(), self.clock);
        } else if self.versions.remove(key).is_some() {
            self.vacated = self.clock;
        }
    }

    fn get(&self, key: &str, kind: Kind) -> StoreResult<Option<&Data>> {
        match self.data.get(key) {
            Some(d) if d.kind() != kind => Err(StoreError::WrongType(key.to_string())),
            other => Ok(other),
        }
    }

    /// Apply one validated command, returning its integer reply.
    fn apply(&mut self, command: Command) -> i64 {
        let key = command.key().to_string();
        let reply = match command_kind(&command) {
            None => i64::from(self.data.remove(&key).is_some()),
            Some(kind) => {
                let data = self
                    .data
                    .entry(key.clone())
                    .or_insert_with(|| Data::empty(kind));
                let reply = match (command, data) {
                    (Command::HSet { fields, .. }, Data::Hash(h)) => fields
                        .into_iter()
                        .map(|(f, v)| i64::from(h.insert(f, v).is_none()))
                        .sum::<i64>(),
                    (Command::HDel { field, .. }, Data::Hash(h)) => {
                        i64::from(h.remove(&field).is_some())
                    }
                    (Command::SAdd { member, .. }, Data::Set(s)) => i64::from(s.insert(member)),
                    (Command::SRem { member, .. }, Data::Set(s)) => i64::from(s.remove(&member)),
                    (Command::ZAdd { member, score, .. }, Data::ZSet(z)) => {
                        i64::from(z.add(&member, score))
                    }
                    (Command::ZRem { member, .. }, Data::ZSet(z)) => i64::from(z.remove(&member)),
                    (Command::RPush { value, .. }, Data::List(l)) => {
                        l.push(value);
                        l.len() as i64
                    }
                    (Command::LRem { value, .. }, Data::List(l)) => {
                        let before = l.len();
                        l.retain(|v| *v != value);
                        (before - l.len()) as i64
                    }
                    // Kinds were validated before any command ran.
                    _ => 0,
                };
                if self.data.get(&key).is_some_and(Data::is_empty) {
                    self.data.remove(&key);
                }
                reply
            }
        };
        self.touch(&key);
        reply
    }
}

/// A thread-safe, in-memory [`Store`].
#[derive(Debug, Default)]
pub struct MemoryStore {
    inner: RwLock<Keyspace>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> StoreResult<RwLockReadGuard<'_, Keyspace>> {
        self.inner.read().map_err(|_| StoreError::Poisoned)
    }

    fn write(&self) -> StoreResult<RwLockWriteGuard<'_, Keyspace>> {
        self.inner.write().map_err(|_| StoreError::Poisoned)
    }

    /// All live keys, sorted.
    pub fn keys(&self) -> StoreResult<Vec<String>> {
        let ks = self.read()?;
        let mut keys: Vec<String> = ks.data.keys().cloned().collect();
        keys.sort_unstable();
        Ok(keys)
    }

    /// Number of live keys.
    pub fn len(&self) -> StoreResult<usize> {
        Ok(self.read()?.data.len())
    }

    pub fn is_empty(&self) -> StoreResult<bool> {
        Ok(self.len()? == 0)
    }
}

impl Store for MemoryStore {
    fn exists(&self, key: &str) -> StoreResult<bool> {
        Ok(self.read()?.data.contains_key(key))
    }

    fn version(&self, key: &str) -> StoreResult<u64> {
        Ok(self.read()?.version(key))
    }

    fn hgetall(&self, key: &str) -> StoreResult<HashMap<String, String>> {
        let ks = self.read()?;
        match ks.get(key, Kind::Hash)? {
            Some(Data::Hash(h)) => Ok(h.clone()),
            _ => Ok(HashMap::new()),
        }
    }

    fn hget(&self, key: &str, field: &str) -> StoreResult<Option<String>> {
        let ks = self.read()?;
        match ks.get(key, Kind::Hash)? {
            Some(Data::Hash(h)) => Ok(h.get(field).cloned()),
            _ => Ok(None),
        }
    }

    fn incr(&self, key: &str) -> StoreResult<i64> {
        let mut ks = self.write()?;
        let data = ks
            .data
            .entry(key.to_string())
            .or_insert(Data::Counter(0));
        let next = match data {
            Data::Counter(n) => {
                *n = n
                    .checked_add(1)
                    .ok_or_else(|| StoreError::NotInteger(key.to_string()))?;
                *n
            }
            _ => return Err(StoreError::WrongType(key.to_string())),
        };
        ks.touch(key);
        Ok(next)
    }

    fn smembers(&self, key: &str) -> StoreResult<Vec<String>> {
        let ks = self.read()?;
        match ks.get(key, Kind::Set)? {
            Some(Data::Set(s)) => Ok(s.iter().cloned().collect()),
            _ => Ok(Vec::new()),
        }
    }

    fn sismember(&self, key: &str, member: &str) -> StoreResult<bool> {
        let ks = self.read()?;
        match ks.get(key, Kind::Set)? {
            Some(Data::Set(s)) => Ok(s.contains(member)),
            _ => Ok(false),
        }
    }

    fn lrange(&self, key: &str, start: i64, stop: i64) -> StoreResult<Vec<String>> {
        let ks = self.read()?;
        match ks.get(key, Kind::List)? {
            Some(Data::List(l)) => Ok(span(l.len(), start, stop)
                .map(|(a, b)| l[a..=b].to_vec())
                .unwrap_or_default()),
            _ => Ok(Vec::new()),
        }
    }

    fn llen(&self, key: &str) -> StoreResult<usize> {
        let ks = self.read()?;
        match ks.get(key, Kind::List)? {
            Some(Data::List(l)) => Ok(l.len()),
            _ => Ok(0),
        }
    }

    fn zrange(
        &self,
        key: &str,
        start: i64,
        stop: i64,
        rev: bool,
    ) -> StoreResult<Vec<(String, f64)>> {
        let ks = self.read()?;
        match ks.get(key, Kind::ZSet)? {
            Some(Data::ZSet(z)) => {
                let ordered = z.ordered(rev);
                Ok(span(ordered.len(), start, stop)
                    .map(|(a, b)| ordered[a..=b].to_vec())
                    .unwrap_or_default())
            }
            _ => Ok(Vec::new()),
        }
    }

    fn zrangebyscore(
        &self,
        key: &str,
        min: ScoreBound,
        max: ScoreBound,
        rev: bool,
        limit: Option<(usize, usize)>,
    ) -> StoreResult<Vec<(String, f64)>> {
        let ks = self.read()?;
        let matching = match ks.get(key, Kind::ZSet)? {
            Some(Data::ZSet(z)) => z
                .ordered(rev)
                .into_iter()
                .filter(|(_, s)| min.admits_from_below(*s) && max.admits_from_above(*s)),
            _ => return Ok(Vec::new()),
        };
        Ok(match limit {
            Some((offset, count)) => matching.skip(offset).take(count).collect(),
            None => matching.collect(),
        })
    }

    fn zcount(&self, key: &str, min: ScoreBound, max: ScoreBound) -> StoreResult<usize> {
        let ks = self.read()?;
        match ks.get(key, Kind::ZSet)? {
            Some(Data::ZSet(z)) => Ok(z
                .order
                .iter()
                .filter(|e| min.admits_from_below(e.0) && max.admits_from_above(e.0))
                .count()),
            _ => Ok(0),
        }
    }

    fn zrank(&self, key: &str, member: &str, rev: bool) -> StoreResult<Option<usize>> {
        let ks = self.read()?;
        match ks.get(key, Kind::ZSet)? {
            Some(Data::ZSet(z)) => {
                let Some(&score) = z.scores.get(member) else {
                    return Ok(None);
                };
                let entry = ZEntry(score, member.to_string());
                let below = z.order.range(..&entry).count();
                Ok(Some(if rev {
                    z.order.len() - 1 - below
                } else {
                    below
                }))
            }
            _ => Ok(None),
        }
    }

    fn zscore(&self, key: &str, member: &str) -> StoreResult<Option<f64>> {
        let ks = self.read()?;
        match ks.get(key, Kind::ZSet)? {
            Some(Data::ZSet(z)) => Ok(z.scores.get(member).copied()),
            _ => Ok(None),
        }
    }

    fn zcard(&self, key: &str) -> StoreResult<usize> {
        let ks = self.read()?;
        match ks.get(key, Kind::ZSet)? {
            Some(Data::ZSet(z)) => Ok(z.scores.len()),
            _ => Ok(0),
        }
    }

    fn exec(&self, batch: Batch) -> StoreResult<Vec<i64>> {
        let mut ks = self.write()?;

        for (key, version) in batch.watches() {
            if ks.version(key) != *version {
                return Err(StoreError::WatchConflict);
            }
        }

        // Validate every command against the key kinds it will meet, so a
        // failing batch leaves no trace.
        let mut planned: HashMap<&str, Option<Kind>> = HashMap::new();
        for command in batch.commands() {
            let key = command.key();
            match command_kind(command) {
                None => {
                    planned.insert(key, None);
                }
                Some(kind) => {
                    let current = match planned.get(key) {
                        Some(k) => *k,
                        None => ks.data.get(key).map(Data::kind),
                    };
                    if current.is_some_and(|k| k != kind) {
                        return Err(StoreError::WrongType(key.to_string()));
                    }
                    planned.insert(key, Some(kind));
                }
            }
        }

        let Batch { commands, .. } = batch;
        Ok(commands.into_iter().map(|c| ks.apply(c)).collect())
    }
}
