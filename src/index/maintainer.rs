//! Index maintenance — the store commands that move an attribute's index
//! entries from one stored value to another.
//!
//! Entries are always derived from the stored (pre-typecast) value, so the
//! same string that was indexed can later be used to find and remove them.

use std::collections::BTreeMap;

use crate::schema::{Attribute, TypeDescriptor};
use crate::store::Batch;
use crate::types::value::score_of;
use crate::types::{ModelError, ModelResult, ObjectId};

use super::keys;

/// Computes index deltas for one record type.
pub struct IndexMaintainer<'a> {
    type_name: &'a str,
}

impl<'a> IndexMaintainer<'a> {
    pub fn new(desc: &'a TypeDescriptor) -> Self {
        Self {
            type_name: desc.name(),
        }
    }

    /// Add the entries implied by `value`.
    pub fn insert(
        &self,
        batch: &mut Batch,
        id: ObjectId,
        attr: &Attribute,
        value: &str,
    ) -> ModelResult<()> {
        let oid = id.to_string();
        let name = attr.name();
        if attr.is_indexed() {
            if attr.is_unique() {
                batch.hset(
                    keys::unique_key(self.type_name, name),
                    vec![(value.to_string(), oid.clone())],
                );
            } else {
                batch.sadd(keys::multi_key(self.type_name, name, value), oid.clone());
            }
        }
        if attr.is_zindexed() {
            let score = score_of(value).ok_or_else(|| {
                ModelError::bad_args(format!("{} is not a valid score for {}", value, name))
            })?;
            batch.zadd(keys::score_key(self.type_name, name), oid.clone(), score);
        }
        if attr.is_listed() {
            batch.rpush(keys::list_key(self.type_name, name, value), oid);
        }
        Ok(())
    }

    /// Remove the entries implied by `value`.
    pub fn remove(&self, batch: &mut Batch, id: ObjectId, attr: &Attribute, value: &str) {
        let oid = id.to_string();
        let name = attr.name();
        if attr.is_indexed() {
            if attr.is_unique() {
                batch.hdel(keys::unique_key(self.type_name, name), value);
            } else {
                batch.srem(keys::multi_key(self.type_name, name, value), oid.clone());
            }
        }
        if attr.is_zindexed() {
            batch.zrem(keys::score_key(self.type_name, name), oid.clone());
        }
        if attr.is_listed() {
            batch.lrem(keys::list_key(self.type_name, name, value), oid);
        }
    }

    /// Move entries from `old` (if it was ever stored) to `new`. Nothing is
    /// emitted when the value is unchanged.
    pub fn replace(
        &self,
        batch: &mut Batch,
        id: ObjectId,
        attr: &Attribute,
        old: Option<&str>,
        new: &str,
    ) -> ModelResult<()> {
        match old {
            Some(old) if old == new => Ok(()),
            Some(old) => {
                self.remove(batch, id, attr, old);
                self.insert(batch, id, attr, new)
            }
            None => self.insert(batch, id, attr, new),
        }
    }

    /// Remove every entry recorded in a record's shadow of indexed values.
    pub fn remove_all(
        &self,
        batch: &mut Batch,
        id: ObjectId,
        desc: &TypeDescriptor,
        shadow: &BTreeMap<String, String>,
    ) {
        for attr in desc.attributes().iter().filter(|a| a.is_tracked()) {
            if let Some(value) = shadow.get(attr.name()) {
                self.remove(batch, id, attr, value);
            }
        }
    }
}
