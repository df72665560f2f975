//! Shared fixtures for the integration tests.

#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use chrono::{DateTime, Utc};
use kvmodel::config::{EngineConfig, UniqueGuard};
use kvmodel::engine::Db;
use kvmodel::schema::{Attribute, ContainerField, Registry, TypeBuilder};
use kvmodel::store::{Batch, MemoryStore, ScoreBound, Store, StoreResult};
use kvmodel::types::{AttrType, Record, TypeRef, Value};

pub fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

/// Schema used across the tests.
///
/// - `Post`: title (indexed), slug (unique), score (float, score-ordered).
/// - `Comment`: body.
/// - `User`: username (unique), email (indexed), age (score-ordered),
///   city (list-ordered), active, joined (datetime, score-ordered);
///   containers `tags` (indexed set), `nicknames` (unique set), `friends`
///   (set of users, self reference), `history` (list of ints),
///   `badges` (sorted set with explicit scores), `posts` (owned, sorted by
///   score), `comments` (owned list).
/// - `Profile`: owned by `User`, bio; container `links` (list of strings).
pub fn registry() -> Registry {
    let mut registry = Registry::new();
    registry
        .register(
            TypeBuilder::new("Post")
                .attribute(Attribute::string("title").indexed())
                .attribute(Attribute::string("slug").unique())
                .attribute(Attribute::float("score").zindexed()),
        )
        .unwrap();
    registry
        .register(TypeBuilder::new("Comment").attribute(Attribute::string("body")))
        .unwrap();
    registry
        .register(
            TypeBuilder::new("User")
                .attribute(Attribute::string("username").unique())
                .attribute(Attribute::string("email").indexed())
                .attribute(Attribute::int("age").zindexed())
                .attribute(Attribute::string("city").listed())
                .attribute(Attribute::boolean("active"))
                .attribute(Attribute::datetime("joined").zindexed())
                .container(ContainerField::set("tags", AttrType::Str).indexed())
                .container(ContainerField::set("nicknames", AttrType::Str).unique())
                .container(ContainerField::set("friends", AttrType::Ref(TypeRef::This)))
                .container(ContainerField::list("history", AttrType::Int))
                .container(ContainerField::sorted_set("badges", AttrType::Str))
                .container(
                    ContainerField::sorted_set("posts", AttrType::Ref(TypeRef::named("Post")))
                        .owned()
                        .sort_field("score"),
                )
                .container(
                    ContainerField::list("comments", AttrType::Ref(TypeRef::named("Comment")))
                        .owned(),
                ),
        )
        .unwrap();
    registry
        .register(
            TypeBuilder::new("Profile")
                .owner("User")
                .attribute(Attribute::string("bio"))
                .container(ContainerField::list("links", AttrType::Str)),
        )
        .unwrap();
    registry
}

pub fn db() -> Db {
    init_logging();
    Db::in_memory(registry())
}

pub fn db_with(store: Arc<dyn Store>, guard: UniqueGuard, max_retries: u32) -> Db {
    init_logging();
    let config = EngineConfig {
        unique_guard: guard,
        max_retries,
    };
    Db::with_config(store, registry(), config)
}

/// A store that lets a competing writer in just before a batch executes.
///
/// The next `rounds` calls to `exec` first apply `competitor` directly to
/// the inner store, as if another client committed it in between.
pub struct InterferingStore {
    inner: MemoryStore,
    competitor: Batch,
    rounds: Mutex<usize>,
}

impl InterferingStore {
    pub fn new(competitor: Batch, rounds: usize) -> Self {
        Self {
            inner: MemoryStore::new(),
            competitor,
            rounds: Mutex::new(rounds),
        }
    }

    pub fn inner(&self) -> &MemoryStore {
        &self.inner
    }

    /// Stop interfering.
    pub fn calm(&self) {
        *self.rounds.lock().unwrap() = 0;
    }

    /// Interfere with the next `rounds` batches.
    pub fn arm(&self, rounds: usize) {
        *self.rounds.lock().unwrap() = rounds;
    }
}

impl Store for InterferingStore {
    fn exists(&self, key: &str) -> StoreResult<bool> {
        self.inner.exists(key)
    }

    fn version(&self, key: &str) -> StoreResult<u64> {
        self.inner.version(key)
    }

    fn hgetall(&self, key: &str) -> StoreResult<HashMap<String, String>> {
        self.inner.hgetall(key)
    }

    fn hget(&self, key: &str, field: &str) -> StoreResult<Option<String>> {
        self.inner.hget(key, field)
    }

    fn incr(&self, key: &str) -> StoreResult<i64> {
        self.inner.incr(key)
    }

    fn smembers(&self, key: &str) -> StoreResult<Vec<String>> {
        self.inner.smembers(key)
    }

    fn sismember(&self, key: &str, member: &str) -> StoreResult<bool> {
        self.inner.sismember(key, member)
    }

    fn lrange(&self, key: &str, start: i64, stop: i64) -> StoreResult<Vec<String>> {
        self.inner.lrange(key, start, stop)
    }

    fn llen(&self, key: &str) -> StoreResult<usize> {
        self.inner.llen(key)
    }

    fn zrange(&self, key: &str, start: i64, stop: i64, rev: bool) -> StoreResult<Vec<(String, f64)>> {
        self.inner.zrange(key, start, stop, rev)
    }

    fn zrangebyscore(
        &self,
        key: &str,
        min: ScoreBound,
        max: ScoreBound,
        rev: bool,
        limit: Option<(usize, usize)>,
    ) -> StoreResult<Vec<(String, f64)>> {
        self.inner.zrangebyscore(key, min, max, rev, limit)
    }

    fn zcount(&self, key: &str, min: ScoreBound, max: ScoreBound) -> StoreResult<usize> {
        self.inner.zcount(key, min, max)
    }

    fn zrank(&self, key: &str, member: &str, rev: bool) -> StoreResult<Option<usize>> {
        self.inner.zrank(key, member, rev)
    }

    fn zscore(&self, key: &str, member: &str) -> StoreResult<Option<f64>> {
        self.inner.zscore(key, member)
    }

    fn zcard(&self, key: &str) -> StoreResult<usize> {
        self.inner.zcard(key)
    }

    fn exec(&self, batch: Batch) -> StoreResult<Vec<i64>> {
        let interfere = {
            let mut rounds = self.rounds.lock().unwrap();
            if *rounds > 0 {
                *rounds -= 1;
                true
            } else {
                false
            }
        };
        if interfere {
            self.inner.exec(self.competitor.clone())?;
        }
        self.inner.exec(batch)
    }
}

/// Attribute values of a `User`, joined `age` days after a fixed epoch.
pub fn user_fields(username: &str, email: &str, age: i64, city: &str) -> Vec<(&'static str, Value)> {
    let joined = DateTime::<Utc>::from_timestamp(1_700_000_000 + age * 86_400, 0).unwrap();
    vec![
        ("username", Value::from(username)),
        ("email", Value::from(email)),
        ("age", Value::from(age)),
        ("city", Value::from(city)),
        ("active", Value::from(true)),
        ("joined", Value::from(joined)),
    ]
}

/// An unpersisted `User`.
pub fn user(db: &Db, username: &str, email: &str, age: i64, city: &str) -> Record {
    let desc = db.descriptor("User").unwrap();
    Record::new(&desc, user_fields(username, email, age, city)).unwrap()
}

/// Create a `User` and return the persisted record.
pub fn create_user(db: &Db, username: &str, email: &str, age: i64, city: &str) -> Record {
    let desc = db.descriptor("User").unwrap();
    let mut record = user(db, username, email, age, city);
    db.writer(&desc).unwrap().create(&mut record, None).unwrap();
    record
}

/// An unpersisted `Post` whose slug is its title.
pub fn post(db: &Db, title: &str, score: f64) -> Record {
    let desc = db.descriptor("Post").unwrap();
    Record::new(
        &desc,
        vec![
            ("title", Value::from(title)),
            ("slug", Value::from(title)),
            ("score", Value::from(score)),
        ],
    )
    .unwrap()
}
