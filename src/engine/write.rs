//! Record writer: create, update and delete with index maintenance.
//!
//! Every operation runs its unique pre-checks and builds its batch inside
//! [`Db::commit`], so a guarded write that loses a race starts over from
//! the pre-checks.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use crate::container::writer::stage_clear;
use crate::container::Container;
use crate::index::{keys, IndexMaintainer};
use crate::schema::TypeDescriptor;
use crate::store::Batch;
use crate::types::{Handle, ModelError, ModelResult, ObjectId, Record, Value};

use super::Db;

/// Writes records of one type.
pub struct RecordWriter<'db> {
    db: &'db Db,
    desc: Arc<TypeDescriptor>,
}

impl<'db> RecordWriter<'db> {
    pub(crate) fn new(db: &'db Db, desc: Arc<TypeDescriptor>) -> Self {
        Self { db, desc }
    }

    pub fn descriptor(&self) -> &Arc<TypeDescriptor> {
        &self.desc
    }

    pub(crate) fn check_type(&self, record: &Record) -> ModelResult<()> {
        if record.type_name() != self.desc.name() {
            return Err(ModelError::bad_args(format!(
                "{} writer given a {} record",
                self.desc.name(),
                record.type_name()
            )));
        }
        Ok(())
    }

    fn persisted_id(&self, record: &Record) -> ModelResult<ObjectId> {
        record
            .id()
            .ok_or_else(|| ModelError::bad_args(format!("{} record is not persisted", self.desc.name())))
    }

    /// Pick the id of a new record: the next counter value, or the owner's
    /// id for types that declare an owner. A consumed counter value is
    /// never handed back, even if the create fails afterwards.
    pub(crate) fn assign_id(&self, owner: Option<&Handle>) -> ModelResult<ObjectId> {
        match (self.desc.owner(), owner) {
            (None, None) => {
                let key = self.desc.counter_key();
                let next = self.db.store().incr(&key)?;
                let id = u64::try_from(next)
                    .ok()
                    .filter(|id| *id > 0)
                    .ok_or_else(|| ModelError::corrupt(&key, format!("counter went to {}", next)))?;
                Ok(ObjectId::new(id))
            }
            (None, Some(_)) => Err(ModelError::bad_args(format!(
                "{} has no owner type",
                self.desc.name()
            ))),
            (Some(t), None) => Err(ModelError::bad_args(format!(
                "{} records are created with a {} owner",
                self.desc.name(),
                t
            ))),
            (Some(t), Some(h)) => {
                if h.type_name() != t {
                    return Err(ModelError::bad_args(format!(
                        "{} is owned by {}, not {}",
                        self.desc.name(),
                        t,
                        h.type_name()
                    )));
                }
                if h.is_none() {
                    return Err(ModelError::bad_args(format!("owner {} is not persisted", h)));
                }
                if !self.db.store().exists(&h.key())? {
                    return Err(ModelError::NotFound(h.key()));
                }
                Ok(h.id())
            }
        }
    }

    /// Fail with `Conflict` if a unique value in `data` is held by another
    /// record. Values equal to the shadow are already ours and skipped.
    pub(crate) fn check_unique(
        &self,
        batch: &mut Batch,
        shadow: &BTreeMap<String, String>,
        id: ObjectId,
        data: &[(usize, String)],
    ) -> ModelResult<()> {
        let oid = id.to_string();
        for (pos, stored) in data {
            let attr = &self.desc.attributes()[*pos];
            if !attr.is_unique() || shadow.get(attr.name()) == Some(stored) {
                continue;
            }
            let key = keys::unique_key(self.desc.name(), attr.name());
            self.db.guard(batch, &key)?;
            if let Some(holder) = self.db.store().hget(&key, stored)? {
                if holder != oid {
                    return Err(ModelError::Conflict {
                        key,
                        value: stored.clone(),
                        holder,
                    });
                }
            }
        }
        Ok(())
    }

    /// Stage the attribute write and the index deltas from `shadow` to `data`.
    pub(crate) fn stage_attributes(
        &self,
        batch: &mut Batch,
        id: ObjectId,
        shadow: &BTreeMap<String, String>,
        data: &[(usize, String)],
    ) -> ModelResult<()> {
        let attrs = self.desc.attributes();
        batch.hset(
            self.desc.record_key(id),
            data.iter()
                .map(|(pos, s)| (attrs[*pos].name().to_string(), s.clone()))
                .collect(),
        );
        let maintainer = IndexMaintainer::new(&self.desc);
        for (pos, stored) in data {
            let attr = &attrs[*pos];
            if attr.is_tracked() {
                let old = shadow.get(attr.name()).map(String::as_str);
                maintainer.replace(batch, id, attr, old, stored)?;
            }
        }
        Ok(())
    }

    /// Pre-checks and batch contents of a create under `id`.
    pub(crate) fn stage_create(
        &self,
        batch: &mut Batch,
        id: ObjectId,
        data: &[(usize, String)],
        adopted: bool,
    ) -> ModelResult<()> {
        if adopted {
            let key = self.desc.record_key(id);
            self.db.guard(batch, &key)?;
            if self.db.store().exists(&key)? {
                return Err(ModelError::bad_args(format!("{} already exists", key)));
            }
        }
        let empty = BTreeMap::new();
        self.check_unique(batch, &empty, id, data)?;
        self.stage_attributes(batch, id, &empty, data)
    }

    /// Watch the record key and fail with `NotFound` unless it exists.
    pub(crate) fn stage_present(&self, batch: &mut Batch, id: ObjectId) -> ModelResult<()> {
        let key = self.desc.record_key(id);
        self.db.guard(batch, &key)?;
        if !self.db.store().exists(&key)? {
            return Err(ModelError::NotFound(key));
        }
        Ok(())
    }

    /// Pre-checks and batch contents of a delete. Container fields go with
    /// the record, and elements of owned fields are deleted as well.
    pub(crate) fn stage_delete(
        &self,
        batch: &mut Batch,
        id: ObjectId,
        shadow: &BTreeMap<String, String>,
    ) -> ModelResult<()> {
        self.stage_present(batch, id)?;
        IndexMaintainer::new(&self.desc).remove_all(batch, id, &self.desc, shadow);
        batch.del(self.desc.record_key(id));

        let owner = Handle::new(self.desc.name(), id);
        for field in self.desc.containers() {
            let container = Container::new(owner.clone(), field);
            self.db.guard(batch, container.key())?;
            let members = container.members(self.db.store())?;
            if members.is_empty() {
                continue;
            }
            if let (true, Some(target)) = (field.is_owned(), field.element().target_type()) {
                self.stage_delete_elements(batch, &container, target, &members)?;
            }
            stage_clear(batch, &container, &members);
        }
        Ok(())
    }

    fn stage_delete_elements(
        &self,
        batch: &mut Batch,
        container: &Container,
        target: &str,
        members: &[String],
    ) -> ModelResult<()> {
        let elements = RecordWriter::new(self.db, self.db.registry().get(target)?);
        let distinct: BTreeSet<&str> = members.iter().map(String::as_str).collect();
        for member in distinct {
            let Some(handle) = container.decode(member)?.as_handle().cloned() else {
                continue;
            };
            let element = match self.db.load(&handle) {
                Ok(element) => element,
                // Dangling member, nothing left to delete.
                Err(ModelError::NotFound(_)) => continue,
                Err(e) => return Err(e),
            };
            elements.stage_delete(batch, handle.id(), element.indexed_values())?;
        }
        Ok(())
    }

    /// Persist a new record. Types with an owner take `owner`'s id.
    pub fn create(&self, record: &mut Record, owner: Option<&Handle>) -> ModelResult<Handle> {
        self.check_type(record)?;
        if record.is_persisted() {
            return Err(ModelError::bad_args(format!(
                "{} is already persisted",
                record
            )));
        }
        let id = self.assign_id(owner)?;
        let data = record.stored_all();
        self.db
            .commit(|batch| self.stage_create(batch, id, &data, owner.is_some()))?;
        record.bind(id, &data);
        log::debug!("Created {}", self.desc.record_key(id));
        Ok(Handle::new(self.desc.name(), id))
    }

    /// Change and persist some attributes.
    pub fn update<I, S>(&self, record: &mut Record, fields: I) -> ModelResult<()>
    where
        I: IntoIterator<Item = (S, Value)>,
        S: AsRef<str>,
    {
        self.check_type(record)?;
        let id = self.persisted_id(record)?;
        let changes = record.coerce_fields(fields)?;
        let data: Vec<(usize, String)> = changes
            .iter()
            .map(|(pos, v)| (*pos, v.to_stored()))
            .collect();
        self.write(record, id, changes, data)
    }

    /// Persist every attribute as currently held in memory.
    pub fn update_all(&self, record: &mut Record) -> ModelResult<()> {
        self.check_type(record)?;
        let id = self.persisted_id(record)?;
        let data = record.stored_all();
        self.write(record, id, Vec::new(), data)
    }

    fn write(
        &self,
        record: &mut Record,
        id: ObjectId,
        changes: Vec<(usize, Value)>,
        data: Vec<(usize, String)>,
    ) -> ModelResult<()> {
        let shadow = record.indexed_values().clone();
        self.db.commit(|batch| {
            self.stage_present(batch, id)?;
            self.check_unique(batch, &shadow, id, &data)?;
            self.stage_attributes(batch, id, &shadow, &data)
        })?;
        record.apply_write(changes, &data);
        log::debug!(
            "Updated {} ({} attributes)",
            self.desc.record_key(id),
            data.len()
        );
        Ok(())
    }

    /// Remove a record, its containers and every index entry they hold.
    /// Elements of owned containers are deleted with it. The record is left
    /// unpersisted.
    pub fn delete(&self, record: &mut Record) -> ModelResult<()> {
        self.check_type(record)?;
        let id = self.persisted_id(record)?;
        let shadow = record.indexed_values().clone();
        self.db
            .commit(|batch| self.stage_delete(batch, id, &shadow))?;
        record.unbind();
        log::debug!("Deleted {}", self.desc.record_key(id));
        Ok(())
    }
}
