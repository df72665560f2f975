//! Materialized records.

use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::sync::Arc;

use crate::container::Container;
use crate::schema::TypeDescriptor;

use super::{Handle, ModelError, ModelResult, ObjectId, Value};

/// An in-memory record: one value per declared attribute, one container proxy
/// per container field once persisted, and the last stored value of every
/// indexed attribute.
#[derive(Debug, Clone)]
pub struct Record {
    desc: Arc<TypeDescriptor>,
    id: Option<ObjectId>,
    values: Vec<Value>,
    /// Stored form of each tracked attribute as last written or loaded. Stale
    /// index entries are removed through these, never through `values`.
    indexed_values: BTreeMap<String, String>,
    containers: Vec<Option<Container>>,
}

impl Record {
    /// Build an unpersisted record. Every declared attribute must be given,
    /// and nothing else.
    pub fn new<I, S>(desc: &Arc<TypeDescriptor>, fields: I) -> ModelResult<Self>
    where
        I: IntoIterator<Item = (S, Value)>,
        S: AsRef<str>,
    {
        let mut given: HashMap<String, Value> = HashMap::new();
        for (name, value) in fields {
            let name = name.as_ref().to_string();
            if given.contains_key(&name) {
                return Err(ModelError::bad_args(format!("{} given twice", name)));
            }
            given.insert(name, value);
        }

        let expected: Vec<&str> = desc.attributes().iter().map(|a| a.name()).collect();
        let mut unexpected: Vec<&str> = given
            .keys()
            .map(String::as_str)
            .filter(|k| !expected.contains(k))
            .collect();
        let missing: Vec<&str> = expected
            .iter()
            .copied()
            .filter(|k| !given.contains_key(*k))
            .collect();
        if !unexpected.is_empty() || !missing.is_empty() {
            unexpected.sort_unstable();
            let mut expected_sorted = expected.clone();
            expected_sorted.sort_unstable();
            return Err(ModelError::bad_args(format!(
                "{} expects {:?}; missing {:?}, unexpected {:?}",
                desc.name(),
                expected_sorted,
                missing,
                unexpected
            )));
        }

        let mut values = Vec::with_capacity(expected.len());
        for attr in desc.attributes() {
            let value = given.remove(attr.name()).ok_or_else(|| {
                ModelError::bad_args(format!("{} is missing", attr.name()))
            })?;
            values.push(coerce(desc, attr.name(), attr.ty(), value)?);
        }

        Ok(Self {
            desc: desc.clone(),
            id: None,
            values,
            indexed_values: BTreeMap::new(),
            containers: vec![None; desc.containers().len()],
        })
    }

    /// Assemble a record read from the store.
    pub(crate) fn materialized(
        desc: Arc<TypeDescriptor>,
        id: ObjectId,
        values: Vec<Value>,
        indexed_values: BTreeMap<String, String>,
    ) -> Self {
        let mut record = Self {
            containers: vec![None; desc.containers().len()],
            desc,
            id: Some(id),
            values,
            indexed_values,
        };
        record.bind_containers(id);
        record
    }

    pub fn descriptor(&self) -> &Arc<TypeDescriptor> {
        &self.desc
    }

    pub fn type_name(&self) -> &str {
        self.desc.name()
    }

    /// Object id, once persisted.
    pub fn id(&self) -> Option<ObjectId> {
        self.id
    }

    pub fn is_persisted(&self) -> bool {
        self.id.is_some()
    }

    /// Handle to this record, once persisted.
    pub fn handle(&self) -> Option<Handle> {
        self.id.map(|id| Handle::new(self.desc.name(), id))
    }

    /// Primary storage key, once persisted.
    pub fn key(&self) -> Option<String> {
        self.id.map(|id| self.desc.record_key(id))
    }

    pub fn get(&self, name: &str) -> ModelResult<&Value> {
        Ok(&self.values[self.desc.attribute_position(name)?])
    }

    /// Change an attribute in memory only. Persist with `update_all`.
    pub fn set(&mut self, name: &str, value: impl Into<Value>) -> ModelResult<()> {
        let pos = self.desc.attribute_position(name)?;
        let attr = &self.desc.attributes()[pos];
        self.values[pos] = coerce(&self.desc, name, attr.ty(), value.into())?;
        Ok(())
    }

    /// Proxy of a container field. Only persisted records have containers.
    pub fn container(&self, name: &str) -> ModelResult<&Container> {
        let pos = self.desc.container_position(name)?;
        self.containers[pos].as_ref().ok_or_else(|| {
            ModelError::bad_args(format!(
                "{}.{} is unavailable until the record is persisted",
                self.desc.name(),
                name
            ))
        })
    }

    /// Last stored form of an indexed attribute, if it was ever stored.
    pub fn indexed_value(&self, name: &str) -> Option<&str> {
        self.indexed_values.get(name).map(String::as_str)
    }

    /// Storage representation of every attribute.
    pub fn to_dict(&self) -> BTreeMap<String, String> {
        self.desc
            .attributes()
            .iter()
            .zip(&self.values)
            .map(|(a, v)| (a.name().to_string(), v.to_stored()))
            .collect()
    }

    /// JSON rendering of the attribute values.
    pub fn to_json(&self) -> serde_json::Value {
        let map: serde_json::Map<String, serde_json::Value> = self
            .desc
            .attributes()
            .iter()
            .zip(&self.values)
            .map(|(a, v)| {
                (
                    a.name().to_string(),
                    serde_json::to_value(v).unwrap_or(serde_json::Value::Null),
                )
            })
            .collect();
        serde_json::Value::Object(map)
    }

    pub(crate) fn values(&self) -> &[Value] {
        &self.values
    }

    pub(crate) fn indexed_values(&self) -> &BTreeMap<String, String> {
        &self.indexed_values
    }

    /// `(attribute position, stored form)` of every attribute.
    pub(crate) fn stored_all(&self) -> Vec<(usize, String)> {
        self.values
            .iter()
            .enumerate()
            .map(|(i, v)| (i, v.to_stored()))
            .collect()
    }

    /// Validate and coerce a set of attribute changes without applying them.
    pub(crate) fn coerce_fields<I, S>(&self, fields: I) -> ModelResult<Vec<(usize, Value)>>
    where
        I: IntoIterator<Item = (S, Value)>,
        S: AsRef<str>,
    {
        let mut changes: Vec<(usize, Value)> = Vec::new();
        for (name, value) in fields {
            let name = name.as_ref();
            let pos = self.desc.attribute_position(name)?;
            let attr = &self.desc.attributes()[pos];
            let value = coerce(&self.desc, name, attr.ty(), value)?;
            match changes.iter_mut().find(|(p, _)| *p == pos) {
                Some(slot) => slot.1 = value,
                None => changes.push((pos, value)),
            }
        }
        if changes.is_empty() {
            return Err(ModelError::bad_args("no fields to update"));
        }
        Ok(changes)
    }

    /// Record a successful write: new values and the shadow of tracked ones.
    pub(crate) fn apply_write(&mut self, changes: Vec<(usize, Value)>, stored: &[(usize, String)]) {
        for (pos, value) in changes {
            self.values[pos] = value;
        }
        for (pos, s) in stored {
            let attr = &self.desc.attributes()[*pos];
            if attr.is_tracked() {
                self.indexed_values
                    .insert(attr.name().to_string(), s.clone());
            }
        }
    }

    /// Mark as persisted under `id` after a successful create.
    pub(crate) fn bind(&mut self, id: ObjectId, stored: &[(usize, String)]) {
        self.id = Some(id);
        self.apply_write(Vec::new(), stored);
        self.bind_containers(id);
    }

    /// Forget identity after a successful delete.
    pub(crate) fn unbind(&mut self) {
        self.id = None;
        self.indexed_values.clear();
        self.containers = vec![None; self.desc.containers().len()];
    }

    fn bind_containers(&mut self, id: ObjectId) {
        let owner = Handle::new(self.desc.name(), id);
        self.containers = self
            .desc
            .containers()
            .iter()
            .map(|f| Some(Container::new(owner.clone(), f)))
            .collect();
    }
}

fn coerce(
    desc: &TypeDescriptor,
    name: &str,
    ty: &crate::types::AttrType,
    value: Value,
) -> ModelResult<Value> {
    ty.coerce(value)
        .map_err(|e| ModelError::bad_args(format!("{}.{}: {}", desc.name(), name, e)))
}

impl fmt::Display for Record {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.key() {
            Some(key) => write!(f, "<{} {}>", key, self.to_json()),
            None => write!(f, "<{}:unsaved {}>", self.desc.name(), self.to_json()),
        }
    }
}
