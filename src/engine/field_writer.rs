//! Container-field writer.
//!
//! Layers ownership on a [`ContainerWriter`]: owned elements are created
//! when appended and deleted when removed, in the same batch as the
//! membership change.

use crate::container::{stored_score, Container, ContainerOrder, ContainerWriter, ScoreOrdered};
use crate::schema::{ContainerField, ContainerKind};
use crate::store::Batch;
use crate::types::{Handle, ModelError, ModelResult, ObjectId, Record, Value};

use super::{Db, RecordWriter};

/// Appends to and removes from one container field.
pub struct ContainerFieldWriter<'db, O: ContainerOrder> {
    db: &'db Db,
    field: ContainerField,
    inner: ContainerWriter<O>,
    /// Writer of the element type, for owned fields.
    elements: Option<RecordWriter<'db>>,
}

impl<'db, O: ContainerOrder> ContainerFieldWriter<'db, O> {
    pub(crate) fn new(
        db: &'db Db,
        field: ContainerField,
        elements: Option<RecordWriter<'db>>,
    ) -> ModelResult<Self> {
        let inner = ContainerWriter::new(&field)?;
        Ok(Self {
            db,
            field,
            inner,
            elements,
        })
    }

    pub fn field(&self) -> &ContainerField {
        &self.field
    }

    fn check_container(&self, container: &Container) -> ModelResult<()> {
        if container.field().name() != self.field.name()
            || container.owner().type_name() != self.field.model()
        {
            return Err(ModelError::bad_args(format!(
                "{} is not a {}.{} container",
                container.key(),
                self.field.model(),
                self.field.name()
            )));
        }
        Ok(())
    }

    fn owned_elements(&self) -> ModelResult<&RecordWriter<'db>> {
        self.elements.as_ref().ok_or_else(|| {
            ModelError::bad_args(format!(
                "{}.{} does not own its elements",
                self.field.model(),
                self.field.name()
            ))
        })
    }

    fn reject_owned(&self, hint: &str) -> ModelResult<()> {
        if self.elements.is_some() {
            return Err(ModelError::bad_args(format!(
                "{}.{} owns its elements, use {}",
                self.field.model(),
                self.field.name(),
                hint
            )));
        }
        Ok(())
    }

    /// Score to insert with. Sorted sets take exactly one of an explicit
    /// score or a declared sort field; other kinds take neither.
    fn resolve_score(&self, element: Option<&Record>, score: Option<f64>) -> ModelResult<Option<f64>> {
        let what = format!("{}.{}", self.field.model(), self.field.name());
        if O::KIND != ContainerKind::SortedSet {
            return match score {
                Some(_) => Err(ModelError::bad_args(format!("{} takes no score", what))),
                None => Ok(None),
            };
        }
        match (score, self.field.sort_field_name()) {
            (Some(s), None) if s.is_nan() => {
                Err(ModelError::bad_args(format!("{} score is not a number", what)))
            }
            (Some(s), None) => Ok(Some(s)),
            (None, Some(sort)) => {
                let element = element.ok_or_else(|| {
                    ModelError::bad_args(format!("{} sorts by {} of a record element", what, sort))
                })?;
                let stored = element.get(sort)?.to_stored();
                Ok(Some(stored_score(&stored, sort)?))
            }
            (Some(_), Some(sort)) => Err(ModelError::bad_args(format!(
                "{} sorts by {}, an explicit score is not allowed",
                what, sort
            ))),
            (None, None) => Err(ModelError::bad_args(format!("{} needs a score", what))),
        }
    }

    /// Link a value. For a sorted set with a sort field the value must be a
    /// reference, and the referenced record is loaded for its score.
    pub fn append(
        &self,
        container: &Container,
        value: impl Into<Value>,
        score: Option<f64>,
    ) -> ModelResult<()> {
        self.reject_owned("append_owned")?;
        self.check_container(container)?;
        let value = self
            .field
            .element()
            .coerce(value.into())
            .map_err(|e| ModelError::bad_args(format!("{}: {}", container.key(), e)))?;
        let element = match (O::KIND, self.field.sort_field_name(), value.as_handle()) {
            (ContainerKind::SortedSet, Some(_), Some(h)) => Some(h.load(self.db)?),
            _ => None,
        };
        let score = self.resolve_score(element.as_ref(), score)?;
        let member = value.to_stored();
        self.db.commit(|batch| {
            self.inner.check_unique(self.db, batch, container, &member)?;
            self.inner.raw_append(batch, container, &member, score)
        })?;
        log::debug!("Appended {} to {}", member, container.key());
        Ok(())
    }

    /// Create an unpersisted element and link it, in one batch.
    pub fn append_owned(
        &self,
        container: &Container,
        element: &mut Record,
        score: Option<f64>,
    ) -> ModelResult<Handle> {
        let elements = self.owned_elements()?;
        self.check_container(container)?;
        elements.check_type(element)?;
        if element.is_persisted() {
            return Err(ModelError::bad_args(format!(
                "{} is already persisted",
                element
            )));
        }
        let score = self.resolve_score(Some(element), score)?;
        let owner = elements
            .descriptor()
            .owner()
            .map(|_| container.owner());
        let id = elements.assign_id(owner)?;
        let data = element.stored_all();
        let member = id.to_string();
        self.db.commit(|batch| {
            elements.stage_create(batch, id, &data, owner.is_some())?;
            self.inner.check_unique(self.db, batch, container, &member)?;
            self.inner.raw_append(batch, container, &member, score)
        })?;
        element.bind(id, &data);
        log::debug!(
            "Created {} in {}",
            elements.descriptor().record_key(id),
            container.key()
        );
        Ok(Handle::new(elements.descriptor().name(), id))
    }

    /// Stage the removal of `member` if present. Returns whether it was.
    fn stage_unlink(&self, batch: &mut Batch, container: &Container, member: &str) -> ModelResult<bool> {
        self.db.guard(batch, container.key())?;
        if !container.contains_member(self.db.store(), member)? {
            return Ok(false);
        }
        self.inner.raw_remove(batch, container, member);
        Ok(true)
    }

    /// Unlink every occurrence of a value. Returns false if it was not there.
    pub fn remove(&self, container: &Container, value: impl Into<Value>) -> ModelResult<bool> {
        self.reject_owned("remove_owned")?;
        self.check_container(container)?;
        let member = container.encode(value.into())?;
        let mut found = false;
        self.db.commit(|batch| {
            found = self.stage_unlink(batch, container, &member)?;
            Ok(())
        })?;
        if found {
            log::debug!("Removed {} from {}", member, container.key());
        }
        Ok(found)
    }

    /// Unlink an element and delete it, in one batch. `NotFound` if it is
    /// not a member, in which case nothing is deleted.
    pub fn remove_owned(&self, container: &Container, element: &mut Record) -> ModelResult<()> {
        let elements = self.owned_elements()?;
        self.check_container(container)?;
        elements.check_type(element)?;
        let id = self.member_id(element)?;
        let member = id.to_string();
        let shadow = element.indexed_values().clone();
        self.db.commit(|batch| {
            if !self.stage_unlink(batch, container, &member)? {
                return Err(ModelError::NotFound(format!(
                    "{} in {}",
                    member,
                    container.key()
                )));
            }
            elements.stage_delete(batch, id, &shadow)
        })?;
        element.unbind();
        log::debug!(
            "Deleted {} from {}",
            elements.descriptor().record_key(id),
            container.key()
        );
        Ok(())
    }

    fn member_id(&self, element: &Record) -> ModelResult<ObjectId> {
        element
            .id()
            .ok_or_else(|| ModelError::bad_args(format!("{} is not persisted", element)))
    }
}

impl<'db> ContainerFieldWriter<'db, ScoreOrdered> {
    /// Change some attributes of an owned element and move it to the score
    /// of its sort field, in one batch.
    pub fn update<I, S>(&self, container: &Container, element: &mut Record, fields: I) -> ModelResult<()>
    where
        I: IntoIterator<Item = (S, Value)>,
        S: AsRef<str>,
    {
        let changes = element.coerce_fields(fields)?;
        let data: Vec<(usize, String)> = changes
            .iter()
            .map(|(pos, v)| (*pos, v.to_stored()))
            .collect();
        self.rewrite(container, element, changes, data)
    }

    /// Persist every attribute of an owned element and re-rank it.
    pub fn update_all(&self, container: &Container, element: &mut Record) -> ModelResult<()> {
        let data = element.stored_all();
        self.rewrite(container, element, Vec::new(), data)
    }

    fn rewrite(
        &self,
        container: &Container,
        element: &mut Record,
        changes: Vec<(usize, Value)>,
        data: Vec<(usize, String)>,
    ) -> ModelResult<()> {
        let elements = self.owned_elements()?;
        self.check_container(container)?;
        elements.check_type(element)?;
        let sort = self.field.sort_field_name().ok_or_else(|| {
            ModelError::bad_args(format!(
                "{}.{} has no sort field",
                self.field.model(),
                self.field.name()
            ))
        })?;
        let id = self.member_id(element)?;

        let pos = elements.descriptor().attribute_position(sort)?;
        let stored = match data.iter().find(|(p, _)| *p == pos) {
            Some((_, s)) => s.clone(),
            None => element.values()[pos].to_stored(),
        };
        let score = stored_score(&stored, sort)?;

        let member = id.to_string();
        let shadow = element.indexed_values().clone();
        self.db.commit(|batch| {
            elements.stage_present(batch, id)?;
            self.db.guard(batch, container.key())?;
            if !container.contains_member(self.db.store(), &member)? {
                return Err(ModelError::NotFound(format!(
                    "{} in {}",
                    member,
                    container.key()
                )));
            }
            ScoreOrdered::pull(batch, container.key(), &member);
            elements.check_unique(batch, &shadow, id, &data)?;
            elements.stage_attributes(batch, id, &shadow, &data)?;
            ScoreOrdered::push(batch, container.key(), &member, Some(score))
        })?;
        element.apply_write(changes, &data);
        log::debug!(
            "Updated {} in {} at score {}",
            elements.descriptor().record_key(id),
            container.key(),
            score
        );
        Ok(())
    }
}
