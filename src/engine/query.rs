//! Index lookups.
//!
//! `find` and `multifind` work on indexed attributes and on indexed
//! container fields. The latter answer "which record's container holds this
//! value" and return the owner's handle.

use std::collections::BTreeSet;

use crate::index::{keys, ZCond};
use crate::schema::TypeDescriptor;
use crate::types::{Handle, ModelError, ModelResult, ObjectId, Value};

use super::Db;

/// Which index a lookup resolves to.
enum Lookup {
    Unique { key: String, member: String },
    Multi { key: String },
}

impl Db {
    fn lookup(&self, desc: &TypeDescriptor, field: &str, value: Value) -> ModelResult<Lookup> {
        if let Ok(attr) = desc.attribute(field) {
            if !attr.is_indexed() {
                return Err(ModelError::bad_args(format!(
                    "{}.{} is not indexed",
                    desc.name(),
                    field
                )));
            }
            let stored = attr
                .ty()
                .coerce(value)
                .map_err(|e| ModelError::bad_args(format!("{}.{}: {}", desc.name(), field, e)))?
                .to_stored();
            return Ok(if attr.is_unique() {
                Lookup::Unique {
                    key: keys::unique_key(desc.name(), field),
                    member: stored,
                }
            } else {
                Lookup::Multi {
                    key: keys::multi_key(desc.name(), field, &stored),
                }
            });
        }

        let container = desc.container(field)?;
        let base = container.index_base().ok_or_else(|| {
            ModelError::bad_args(format!("{}.{} is not indexed", desc.name(), field))
        })?;
        let stored = container
            .element()
            .coerce(value)
            .map_err(|e| ModelError::bad_args(format!("{}.{}: {}", desc.name(), field, e)))?
            .to_stored();
        Ok(if container.is_unique() {
            Lookup::Unique {
                key: base,
                member: stored,
            }
        } else {
            Lookup::Multi {
                key: format!("{}:{}", base, stored),
            }
        })
    }

    fn handle_of(&self, desc: &TypeDescriptor, key: &str, raw: &str) -> ModelResult<Handle> {
        let id = ObjectId::parse(raw)
            .ok_or_else(|| ModelError::corrupt(key, format!("index member {:?} is not an id", raw)))?;
        Ok(Handle::new(desc.name(), id))
    }

    /// The record holding `value` in a unique index, if any.
    pub fn find(
        &self,
        desc: &TypeDescriptor,
        field: &str,
        value: impl Into<Value>,
    ) -> ModelResult<Option<Handle>> {
        match self.lookup(desc, field, value.into())? {
            Lookup::Unique { key, member } => self
                .store()
                .hget(&key, &member)?
                .map(|raw| self.handle_of(desc, &key, &raw))
                .transpose(),
            Lookup::Multi { .. } => Err(ModelError::bad_args(format!(
                "{}.{} is not unique, use multifind",
                desc.name(),
                field
            ))),
        }
    }

    /// Every record holding `value` in a multi-value index.
    pub fn multifind(
        &self,
        desc: &TypeDescriptor,
        field: &str,
        value: impl Into<Value>,
    ) -> ModelResult<BTreeSet<Handle>> {
        match self.lookup(desc, field, value.into())? {
            Lookup::Multi { key } => self
                .store()
                .smembers(&key)?
                .iter()
                .map(|raw| self.handle_of(desc, &key, raw))
                .collect(),
            Lookup::Unique { .. } => Err(ModelError::bad_args(format!(
                "{}.{} is unique, use find",
                desc.name(),
                field
            ))),
        }
    }

    /// Records holding `value` in a list-ordered index, in the order they
    /// took it, ranks `start..=stop`.
    pub fn getlist(
        &self,
        desc: &TypeDescriptor,
        field: &str,
        value: impl Into<Value>,
        start: i64,
        stop: i64,
    ) -> ModelResult<Vec<Handle>> {
        let attr = desc.attribute(field)?;
        if !attr.is_listed() {
            return Err(ModelError::bad_args(format!(
                "{}.{} is not list-indexed",
                desc.name(),
                field
            )));
        }
        let stored = attr
            .ty()
            .coerce(value.into())
            .map_err(|e| ModelError::bad_args(format!("{}.{}: {}", desc.name(), field, e)))?
            .to_stored();
        let key = keys::list_key(desc.name(), field, &stored);
        self.store()
            .lrange(&key, start, stop)?
            .iter()
            .map(|raw| self.handle_of(desc, &key, raw))
            .collect()
    }

    pub fn zfind(&self, desc: &TypeDescriptor, field: &str, cond: &ZCond) -> ModelResult<Vec<Handle>> {
        desc.score_index(field)?.find(self.store(), cond)
    }

    pub fn zrange(
        &self,
        desc: &TypeDescriptor,
        field: &str,
        start: i64,
        stop: i64,
    ) -> ModelResult<Vec<Handle>> {
        desc.score_index(field)?.range(self.store(), start, stop)
    }

    pub fn zrevrange(
        &self,
        desc: &TypeDescriptor,
        field: &str,
        start: i64,
        stop: i64,
    ) -> ModelResult<Vec<Handle>> {
        desc.score_index(field)?.revrange(self.store(), start, stop)
    }

    pub fn zrangebyscore(
        &self,
        desc: &TypeDescriptor,
        field: &str,
        min: f64,
        max: f64,
        limit: Option<(usize, usize)>,
    ) -> ModelResult<Vec<Handle>> {
        desc.score_index(field)?
            .range_by_score(self.store(), min, max, limit)
    }

    pub fn zrevrangebyscore(
        &self,
        desc: &TypeDescriptor,
        field: &str,
        max: f64,
        min: f64,
        limit: Option<(usize, usize)>,
    ) -> ModelResult<Vec<Handle>> {
        desc.score_index(field)?
            .revrange_by_score(self.store(), max, min, limit)
    }

    pub fn zcount(&self, desc: &TypeDescriptor, field: &str, min: f64, max: f64) -> ModelResult<usize> {
        desc.score_index(field)?.count(self.store(), min, max)
    }

    pub fn zrank(&self, desc: &TypeDescriptor, field: &str, handle: &Handle) -> ModelResult<Option<usize>> {
        desc.score_index(field)?.rank(self.store(), handle)
    }

    pub fn zrevrank(
        &self,
        desc: &TypeDescriptor,
        field: &str,
        handle: &Handle,
    ) -> ModelResult<Option<usize>> {
        desc.score_index(field)?.revrank(self.store(), handle)
    }
}
