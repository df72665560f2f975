//! High-level operations: loading, querying and writing records.
//!
//! A [`Db`] ties a [`Store`] to a frozen [`Registry`]. Every write path
//! builds one [`Batch`] and submits it through [`Db::commit`], which re-runs
//! the pre-checks and rebuilds the batch whenever a watched key changed.

pub mod field_writer;
pub mod load;
pub mod query;
pub mod write;

use std::sync::Arc;

use crate::config::EngineConfig;
use crate::container::{ContainerOrder, InsertionOrdered, ScoreOrdered, Unordered};
use crate::schema::{Registry, TypeDescriptor};
use crate::store::{Batch, MemoryStore, Store, StoreError};
use crate::types::{ModelError, ModelResult};

pub use field_writer::ContainerFieldWriter;
pub use write::RecordWriter;

/// A store plus the record types it holds.
pub struct Db {
    store: Arc<dyn Store>,
    registry: Registry,
    config: EngineConfig,
}

impl Db {
    pub fn new(store: Arc<dyn Store>, registry: Registry) -> Self {
        Self::with_config(store, registry, EngineConfig::default())
    }

    pub fn with_config(store: Arc<dyn Store>, registry: Registry, config: EngineConfig) -> Self {
        Self {
            store,
            registry,
            config,
        }
    }

    /// A database backed by a fresh [`MemoryStore`].
    pub fn in_memory(registry: Registry) -> Self {
        Self::new(Arc::new(MemoryStore::new()), registry)
    }

    pub fn store(&self) -> &dyn Store {
        self.store.as_ref()
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Descriptor of a registered type.
    pub fn descriptor(&self, type_name: &str) -> ModelResult<Arc<TypeDescriptor>> {
        self.registry.get(type_name)
    }

    fn registered(&self, desc: &Arc<TypeDescriptor>) -> ModelResult<Arc<TypeDescriptor>> {
        let known = self.registry.get(desc.name())?;
        if !Arc::ptr_eq(&known, desc) {
            return Err(ModelError::bad_args(format!(
                "{} was registered in a different registry",
                desc.name()
            )));
        }
        Ok(known)
    }

    /// Writer for records of one type.
    pub fn writer(&self, desc: &Arc<TypeDescriptor>) -> ModelResult<RecordWriter<'_>> {
        Ok(RecordWriter::new(self, self.registered(desc)?))
    }

    /// Writer for one container field, with ordering `O`. Fails with
    /// `BadArgs` when `O` does not match the declared kind.
    pub fn container_writer<O: ContainerOrder>(
        &self,
        desc: &Arc<TypeDescriptor>,
        field: &str,
    ) -> ModelResult<ContainerFieldWriter<'_, O>> {
        let desc = self.registered(desc)?;
        let field = desc.container(field)?.clone();
        let elements = match (field.is_owned(), field.element().target_type()) {
            (true, Some(target)) => Some(RecordWriter::new(self, self.registry.get(target)?)),
            _ => None,
        };
        ContainerFieldWriter::new(self, field, elements)
    }

    pub fn list_writer(
        &self,
        desc: &Arc<TypeDescriptor>,
        field: &str,
    ) -> ModelResult<ContainerFieldWriter<'_, InsertionOrdered>> {
        self.container_writer(desc, field)
    }

    pub fn set_writer(
        &self,
        desc: &Arc<TypeDescriptor>,
        field: &str,
    ) -> ModelResult<ContainerFieldWriter<'_, Unordered>> {
        self.container_writer(desc, field)
    }

    pub fn sorted_set_writer(
        &self,
        desc: &Arc<TypeDescriptor>,
        field: &str,
    ) -> ModelResult<ContainerFieldWriter<'_, ScoreOrdered>> {
        self.container_writer(desc, field)
    }

    /// Build a batch with `build` and execute it. When writes are guarded
    /// and a watched key changed, the batch is discarded and rebuilt, at
    /// most `max_retries` more times. Errors from `build` end the loop.
    pub(crate) fn commit<F>(&self, mut build: F) -> ModelResult<Vec<i64>>
    where
        F: FnMut(&mut Batch) -> ModelResult<()>,
    {
        let attempts = self.config.max_retries.saturating_add(1);
        for attempt in 1..=attempts {
            let mut batch = Batch::new();
            build(&mut batch)?;
            log::trace!(
                "Executing batch: {} commands, {} watched keys",
                batch.len(),
                batch.watches().len()
            );
            match self.store.exec(batch) {
                Ok(replies) => return Ok(replies),
                Err(StoreError::WatchConflict) => {
                    log::warn!(
                        "Watched key changed, retrying batch (attempt {}/{})",
                        attempt,
                        attempts
                    );
                }
                Err(e) => return Err(e.into()),
            }
        }
        Err(ModelError::Contention { attempts })
    }

    /// Watch `key` at its current version so the batch is discarded if it
    /// changes. No-op when writes are unguarded.
    pub(crate) fn guard(&self, batch: &mut Batch, key: &str) -> ModelResult<()> {
        if self.config.is_guarded() {
            batch.watch(key, self.store.version(key)?);
        }
        Ok(())
    }
}
