//! Generic container writes, parameterized over ordering semantics.
//!
//! A [`ContainerWriter`] stages the raw membership change for one ordering
//! kind plus, when the field is indexed, the matching element -> owner index
//! entry. Ownership of elements is layered on top by the engine.

use std::collections::BTreeSet;
use std::marker::PhantomData;

use crate::engine::Db;
use crate::schema::{ContainerField, ContainerKind};
use crate::store::Batch;
use crate::types::{ModelError, ModelResult};

use super::Container;

/// Membership primitives of one container kind.
pub trait ContainerOrder {
    const KIND: ContainerKind;

    fn push(batch: &mut Batch, key: &str, member: &str, score: Option<f64>) -> ModelResult<()>;

    fn pull(batch: &mut Batch, key: &str, member: &str);
}

/// Unordered set.
#[derive(Debug, Clone, Copy)]
pub struct Unordered;

/// Insertion-ordered list.
#[derive(Debug, Clone, Copy)]
pub struct InsertionOrdered;

/// Score-ordered set.
#[derive(Debug, Clone, Copy)]
pub struct ScoreOrdered;

impl ContainerOrder for Unordered {
    const KIND: ContainerKind = ContainerKind::Set;

    fn push(batch: &mut Batch, key: &str, member: &str, _score: Option<f64>) -> ModelResult<()> {
        batch.sadd(key, member);
        Ok(())
    }

    fn pull(batch: &mut Batch, key: &str, member: &str) {
        batch.srem(key, member);
    }
}

impl ContainerOrder for InsertionOrdered {
    const KIND: ContainerKind = ContainerKind::List;

    fn push(batch: &mut Batch, key: &str, member: &str, _score: Option<f64>) -> ModelResult<()> {
        batch.rpush(key, member);
        Ok(())
    }

    fn pull(batch: &mut Batch, key: &str, member: &str) {
        batch.lrem(key, member);
    }
}

impl ContainerOrder for ScoreOrdered {
    const KIND: ContainerKind = ContainerKind::SortedSet;

    fn push(batch: &mut Batch, key: &str, member: &str, score: Option<f64>) -> ModelResult<()> {
        let score =
            score.ok_or_else(|| ModelError::bad_args(format!("{} needs a score", key)))?;
        batch.zadd(key, member, score);
        Ok(())
    }

    fn pull(batch: &mut Batch, key: &str, member: &str) {
        batch.zrem(key, member);
    }
}

#[derive(Debug, Clone)]
struct ElementIndex {
    base: String,
    unique: bool,
}

impl ElementIndex {
    fn of(field: &ContainerField) -> Option<Self> {
        field.index_base().map(|base| Self {
            base,
            unique: field.is_unique(),
        })
    }

    fn link(&self, batch: &mut Batch, member: &str, owner: &str) {
        if self.unique {
            batch.hset(self.base.clone(), vec![(member.to_string(), owner.to_string())]);
        } else {
            batch.sadd(format!("{}:{}", self.base, member), owner);
        }
    }

    fn unlink(&self, batch: &mut Batch, member: &str, owner: &str) {
        if self.unique {
            batch.hdel(self.base.clone(), member);
        } else {
            batch.srem(format!("{}:{}", self.base, member), owner);
        }
    }
}

/// Stage dropping a whole container: the element index entries of every
/// member, then the container key itself.
pub(crate) fn stage_clear(batch: &mut Batch, container: &Container, members: &[String]) {
    if let Some(index) = ElementIndex::of(container.field()) {
        let owner = container.owner().id().to_string();
        let distinct: BTreeSet<&str> = members.iter().map(String::as_str).collect();
        for member in distinct {
            index.unlink(batch, member, &owner);
        }
    }
    batch.del(container.key());
}

/// Stages membership changes (and element index entries) for one field.
#[derive(Debug, Clone)]
pub struct ContainerWriter<O: ContainerOrder> {
    index: Option<ElementIndex>,
    _order: PhantomData<O>,
}

impl<O: ContainerOrder> ContainerWriter<O> {
    pub fn new(field: &ContainerField) -> ModelResult<Self> {
        if field.kind() != O::KIND {
            return Err(ModelError::bad_args(format!(
                "{}.{} is a {}, not a {}",
                field.model(),
                field.name(),
                field.kind().name(),
                O::KIND.name()
            )));
        }
        Ok(Self {
            index: ElementIndex::of(field),
            _order: PhantomData,
        })
    }

    /// Fail with `Conflict` if a unique element index maps `member` to
    /// another owner. Watches the index key when writes are guarded.
    pub fn check_unique(
        &self,
        db: &Db,
        batch: &mut Batch,
        container: &Container,
        member: &str,
    ) -> ModelResult<()> {
        let Some(index) = self.index.as_ref().filter(|i| i.unique) else {
            return Ok(());
        };
        db.guard(batch, &index.base)?;
        let owner = container.owner().id().to_string();
        match db.store().hget(&index.base, member)? {
            Some(holder) if holder != owner => Err(ModelError::Conflict {
                key: index.base.clone(),
                value: member.to_string(),
                holder,
            }),
            _ => Ok(()),
        }
    }

    /// Stage the insertion of `member`.
    pub fn raw_append(
        &self,
        batch: &mut Batch,
        container: &Container,
        member: &str,
        score: Option<f64>,
    ) -> ModelResult<()> {
        O::push(batch, container.key(), member, score)?;
        if let Some(index) = &self.index {
            index.link(batch, member, &container.owner().id().to_string());
        }
        Ok(())
    }

    /// Stage the removal of every occurrence of `member`.
    pub fn raw_remove(&self, batch: &mut Batch, container: &Container, member: &str) {
        O::pull(batch, container.key(), member);
        if let Some(index) = &self.index {
            index.unlink(batch, member, &container.owner().id().to_string());
        }
    }
}
