//! Container fields — list, set and sorted-set values stored under the
//! owning record's key namespace (`T:id:field`).

pub mod writer;

use crate::engine::Db;
use crate::index::keys;
use crate::schema::{ContainerField, ContainerKind};
use crate::store::Store;
use crate::types::value::score_of;
use crate::types::{Handle, ModelError, ModelResult, Value};

pub use writer::{ContainerOrder, ContainerWriter, InsertionOrdered, ScoreOrdered, Unordered};

/// Read-side proxy for one container field of one persisted record.
#[derive(Debug, Clone)]
pub struct Container {
    owner: Handle,
    field: ContainerField,
    key: String,
}

impl Container {
    pub(crate) fn new(owner: Handle, field: &ContainerField) -> Self {
        let key = keys::container_key(&owner.key(), field.name());
        Self {
            owner,
            field: field.clone(),
            key,
        }
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    /// Handle of the record this container belongs to.
    pub fn owner(&self) -> &Handle {
        &self.owner
    }

    pub fn field(&self) -> &ContainerField {
        &self.field
    }

    pub fn kind(&self) -> ContainerKind {
        self.field.kind()
    }

    /// Coerce a value to the element type and return its stored form.
    pub(crate) fn encode(&self, value: Value) -> ModelResult<String> {
        self.field
            .element()
            .coerce(value)
            .map(|v| v.to_stored())
            .map_err(|e| ModelError::bad_args(format!("{}: {}", self.key, e)))
    }

    pub(crate) fn decode(&self, raw: &str) -> ModelResult<Value> {
        self.field.element().read(raw).ok_or_else(|| {
            ModelError::corrupt(&self.key, format!("element {:?} does not parse", raw))
        })
    }

    fn decode_all(&self, raw: Vec<String>) -> ModelResult<Vec<Value>> {
        raw.iter().map(|r| self.decode(r)).collect()
    }

    pub(crate) fn contains_member(&self, store: &dyn Store, member: &str) -> ModelResult<bool> {
        Ok(match self.kind() {
            ContainerKind::List => store.lrange(&self.key, 0, -1)?.iter().any(|m| m == member),
            ContainerKind::Set => store.sismember(&self.key, member)?,
            ContainerKind::SortedSet => store.zscore(&self.key, member)?.is_some(),
        })
    }

    /// Number of elements.
    pub fn len(&self, db: &Db) -> ModelResult<usize> {
        let store = db.store();
        Ok(match self.kind() {
            ContainerKind::List => store.llen(&self.key)?,
            ContainerKind::Set => store.smembers(&self.key)?.len(),
            ContainerKind::SortedSet => store.zcard(&self.key)?,
        })
    }

    pub fn is_empty(&self, db: &Db) -> ModelResult<bool> {
        Ok(self.len(db)? == 0)
    }

    pub fn contains(&self, db: &Db, value: impl Into<Value>) -> ModelResult<bool> {
        let member = self.encode(value.into())?;
        self.contains_member(db.store(), &member)
    }

    /// Stored form of every element, in `items` order.
    pub(crate) fn members(&self, store: &dyn Store) -> ModelResult<Vec<String>> {
        Ok(match self.kind() {
            ContainerKind::List => store.lrange(&self.key, 0, -1)?,
            ContainerKind::Set => store.smembers(&self.key)?,
            ContainerKind::SortedSet => store
                .zrange(&self.key, 0, -1, false)?
                .into_iter()
                .map(|(m, _)| m)
                .collect(),
        })
    }

    /// Every element: lists in insertion order, sets in lexicographic order
    /// of the stored form, sorted sets by ascending score.
    pub fn items(&self, db: &Db) -> ModelResult<Vec<Value>> {
        let raw = self.members(db.store())?;
        self.decode_all(raw)
    }

    /// Elements ranked `start..=stop` (negative ranks count from the end).
    pub fn range(&self, db: &Db, start: i64, stop: i64) -> ModelResult<Vec<Value>> {
        let store = db.store();
        let raw = match self.kind() {
            ContainerKind::List => store.lrange(&self.key, start, stop)?,
            ContainerKind::SortedSet => store
                .zrange(&self.key, start, stop, false)?
                .into_iter()
                .map(|(m, _)| m)
                .collect(),
            ContainerKind::Set => {
                return Err(ModelError::bad_args(format!(
                    "{} is unordered and has no ranks",
                    self.key
                )))
            }
        };
        self.decode_all(raw)
    }

    /// Score of an element of a sorted set.
    pub fn score(&self, db: &Db, value: impl Into<Value>) -> ModelResult<Option<f64>> {
        if self.kind() != ContainerKind::SortedSet {
            return Err(ModelError::bad_args(format!("{} has no scores", self.key)));
        }
        let member = self.encode(value.into())?;
        Ok(db.store().zscore(&self.key, &member)?)
    }
}

/// Score carried by a stored value, or `BadArgs`.
pub(crate) fn stored_score(stored: &str, what: &str) -> ModelResult<f64> {
    score_of(stored)
        .ok_or_else(|| ModelError::bad_args(format!("{} value {:?} is not a score", what, stored)))
}
