//! Score-ordered index of one (type, attribute) pair.

use std::sync::Arc;

use crate::store::{ScoreBound, Store};
use crate::types::value::score_of;
use crate::types::{Handle, ModelError, ModelResult, ObjectId, Value};

use super::keys;

/// Condition accepted by `zfind`. Values are typecast for storage before
/// being turned into scores, so timestamps work like numbers.
#[derive(Debug, Clone, PartialEq)]
pub enum ZCond {
    Eq(Value),
    Lt(Value),
    Lte(Value),
    Gt(Value),
    Gte(Value),
    /// Inclusive on both ends.
    Between(Value, Value),
}

fn score(value: &Value) -> ModelResult<f64> {
    let stored = value.to_stored();
    score_of(&stored)
        .ok_or_else(|| ModelError::bad_args(format!("{:?} cannot be used as a score", value)))
}

impl ZCond {
    /// Score bounds `(min, max)` this condition selects.
    pub fn bounds(&self) -> ModelResult<(ScoreBound, ScoreBound)> {
        Ok(match self {
            Self::Eq(v) => {
                let s = score(v)?;
                (ScoreBound::Inclusive(s), ScoreBound::Inclusive(s))
            }
            Self::Lt(v) => (ScoreBound::Unbounded, ScoreBound::Exclusive(score(v)?)),
            Self::Lte(v) => (ScoreBound::Unbounded, ScoreBound::Inclusive(score(v)?)),
            Self::Gt(v) => (ScoreBound::Exclusive(score(v)?), ScoreBound::Unbounded),
            Self::Gte(v) => (ScoreBound::Inclusive(score(v)?), ScoreBound::Unbounded),
            Self::Between(lo, hi) => (
                ScoreBound::Inclusive(score(lo)?),
                ScoreBound::Inclusive(score(hi)?),
            ),
        })
    }
}

/// Ranks the ids of one type by the score of one attribute. Allocated when
/// the type is registered and shared for the life of the registry.
#[derive(Debug, Clone)]
pub struct ScoreIndex {
    type_name: Arc<str>,
    field: String,
    key: String,
}

impl ScoreIndex {
    pub(crate) fn new(type_name: &str, field: &str) -> Self {
        Self {
            type_name: Arc::from(type_name),
            field: field.to_string(),
            key: keys::score_key(type_name, field),
        }
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn field(&self) -> &str {
        &self.field
    }

    fn handles(&self, entries: Vec<(String, f64)>) -> ModelResult<Vec<Handle>> {
        entries
            .into_iter()
            .map(|(member, _)| {
                ObjectId::parse(&member)
                    .map(|id| Handle::new(self.type_name.clone(), id))
                    .ok_or_else(|| {
                        ModelError::corrupt(&self.key, format!("member {:?} is not an id", member))
                    })
            })
            .collect()
    }

    fn member(&self, handle: &Handle) -> ModelResult<String> {
        if handle.type_name() != &*self.type_name {
            return Err(ModelError::bad_args(format!(
                "{} is not a {} handle",
                handle, self.type_name
            )));
        }
        Ok(handle.id().to_string())
    }

    /// Handles ranked `start..=stop`, lowest score first.
    pub fn range(&self, store: &dyn Store, start: i64, stop: i64) -> ModelResult<Vec<Handle>> {
        self.handles(store.zrange(&self.key, start, stop, false)?)
    }

    /// Handles ranked `start..=stop`, highest score first.
    pub fn revrange(&self, store: &dyn Store, start: i64, stop: i64) -> ModelResult<Vec<Handle>> {
        self.handles(store.zrange(&self.key, start, stop, true)?)
    }

    /// Handles with `min <= score <= max`, ascending.
    pub fn range_by_score(
        &self,
        store: &dyn Store,
        min: f64,
        max: f64,
        limit: Option<(usize, usize)>,
    ) -> ModelResult<Vec<Handle>> {
        self.handles(store.zrangebyscore(
            &self.key,
            ScoreBound::Inclusive(min),
            ScoreBound::Inclusive(max),
            false,
            limit,
        )?)
    }

    /// Handles with `min <= score <= max`, descending.
    pub fn revrange_by_score(
        &self,
        store: &dyn Store,
        max: f64,
        min: f64,
        limit: Option<(usize, usize)>,
    ) -> ModelResult<Vec<Handle>> {
        self.handles(store.zrangebyscore(
            &self.key,
            ScoreBound::Inclusive(min),
            ScoreBound::Inclusive(max),
            true,
            limit,
        )?)
    }

    pub fn count(&self, store: &dyn Store, min: f64, max: f64) -> ModelResult<usize> {
        Ok(store.zcount(
            &self.key,
            ScoreBound::Inclusive(min),
            ScoreBound::Inclusive(max),
        )?)
    }

    pub fn rank(&self, store: &dyn Store, handle: &Handle) -> ModelResult<Option<usize>> {
        Ok(store.zrank(&self.key, &self.member(handle)?, false)?)
    }

    pub fn revrank(&self, store: &dyn Store, handle: &Handle) -> ModelResult<Option<usize>> {
        Ok(store.zrank(&self.key, &self.member(handle)?, true)?)
    }

    pub fn score(&self, store: &dyn Store, handle: &Handle) -> ModelResult<Option<f64>> {
        Ok(store.zscore(&self.key, &self.member(handle)?)?)
    }

    /// Handles whose score satisfies `cond`, ascending.
    pub fn find(&self, store: &dyn Store, cond: &ZCond) -> ModelResult<Vec<Handle>> {
        let (min, max) = cond.bounds()?;
        self.handles(store.zrangebyscore(&self.key, min, max, false, None)?)
    }

    pub fn len(&self, store: &dyn Store) -> ModelResult<usize> {
        Ok(store.zcard(&self.key)?)
    }
}
