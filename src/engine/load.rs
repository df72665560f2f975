//! Record loading and handle construction.

use std::collections::BTreeMap;

use crate::schema::TypeDescriptor;
use crate::types::{Handle, ModelError, ModelResult, ObjectId, Record};

use super::Db;

impl Db {
    /// Handle to record `id` of a type. Does not touch the store.
    pub fn by_id(&self, desc: &TypeDescriptor, id: impl Into<ObjectId>) -> Handle {
        Handle::new(desc.name(), id.into())
    }

    /// Handle to the record of an owned type that shares `owner`'s id.
    pub fn by_owner(&self, desc: &TypeDescriptor, owner: &Handle) -> ModelResult<Handle> {
        match desc.owner() {
            Some(t) if t == owner.type_name() => Ok(Handle::new(desc.name(), owner.id())),
            Some(t) => Err(ModelError::bad_args(format!(
                "{} is owned by {}, not {}",
                desc.name(),
                t,
                owner.type_name()
            ))),
            None => Err(ModelError::bad_args(format!(
                "{} has no owner type",
                desc.name()
            ))),
        }
    }

    /// Whether record `id` of a type is stored.
    pub fn exists(&self, desc: &TypeDescriptor, id: impl Into<ObjectId>) -> ModelResult<bool> {
        Ok(self.store().exists(&desc.record_key(id.into()))?)
    }

    /// Materialize the record a handle points at.
    ///
    /// An absent key is `NotFound`. A key that exists but lacks a declared
    /// attribute, or holds one that does not parse, is `DataCorruption`.
    pub fn load(&self, handle: &Handle) -> ModelResult<Record> {
        let desc = self.descriptor(handle.type_name())?;
        let key = handle.key();
        if handle.is_none() {
            return Err(ModelError::NotFound(key));
        }

        let raw = self.store().hgetall(&key)?;
        if raw.is_empty() {
            if self.store().exists(&key)? {
                return Err(ModelError::corrupt(key, "record holds no attributes"));
            }
            return Err(ModelError::NotFound(key));
        }

        let mut values = Vec::with_capacity(desc.attributes().len());
        let mut shadow = BTreeMap::new();
        for attr in desc.attributes() {
            let stored = raw.get(attr.name()).ok_or_else(|| {
                ModelError::corrupt(&key, format!("missing attribute {:?}", attr.name()))
            })?;
            let value = attr.ty().read(stored).ok_or_else(|| {
                ModelError::corrupt(
                    &key,
                    format!(
                        "attribute {:?} holds {:?}, not a {}",
                        attr.name(),
                        stored,
                        attr.ty().name()
                    ),
                )
            })?;
            if attr.is_tracked() {
                shadow.insert(attr.name().to_string(), stored.clone());
            }
            values.push(value);
        }

        Ok(Record::materialized(desc, handle.id(), values, shadow))
    }
}
