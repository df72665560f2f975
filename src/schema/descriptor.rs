//! Type descriptors — the frozen per-type table of attributes, container
//! fields and score-ordered indexes.

use std::collections::HashMap;

use crate::index::{keys, ScoreIndex};
use crate::types::{ModelError, ModelResult, ObjectId};

use super::{Attribute, ContainerField};

/// Declaration of a record type, consumed by [`Registry::register`](super::Registry::register).
#[derive(Debug, Clone)]
pub struct TypeBuilder {
    pub(crate) name: String,
    pub(crate) attributes: Vec<Attribute>,
    pub(crate) containers: Vec<ContainerField>,
    pub(crate) owner: Option<String>,
}

impl TypeBuilder {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            attributes: Vec::new(),
            containers: Vec::new(),
            owner: None,
        }
    }

    pub fn attribute(mut self, attribute: Attribute) -> Self {
        self.attributes.push(attribute);
        self
    }

    pub fn container(mut self, field: ContainerField) -> Self {
        self.containers.push(field);
        self
    }

    /// Instances take their id from a record of the owner type instead of
    /// a counter of their own.
    pub fn owner(mut self, type_name: impl Into<String>) -> Self {
        self.owner = Some(type_name.into());
        self
    }
}

/// Immutable metadata of a registered record type.
#[derive(Debug)]
pub struct TypeDescriptor {
    name: String,
    attributes: Vec<Attribute>,
    attr_pos: HashMap<String, usize>,
    containers: Vec<ContainerField>,
    container_pos: HashMap<String, usize>,
    owner: Option<String>,
    score_indexes: HashMap<String, ScoreIndex>,
}

impl TypeDescriptor {
    /// Freeze an already validated declaration.
    pub(crate) fn freeze(builder: TypeBuilder) -> Self {
        let TypeBuilder {
            name,
            attributes,
            containers,
            owner,
        } = builder;
        let attr_pos = attributes
            .iter()
            .enumerate()
            .map(|(i, a)| (a.name().to_string(), i))
            .collect();
        let container_pos = containers
            .iter()
            .enumerate()
            .map(|(i, c)| (c.name().to_string(), i))
            .collect();
        let score_indexes = attributes
            .iter()
            .filter(|a| a.is_zindexed())
            .map(|a| (a.name().to_string(), ScoreIndex::new(&name, a.name())))
            .collect();
        Self {
            name,
            attributes,
            attr_pos,
            containers,
            container_pos,
            owner,
            score_indexes,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Declared attributes, in declaration order.
    pub fn attributes(&self) -> &[Attribute] {
        &self.attributes
    }

    /// Declared container fields, in declaration order.
    pub fn containers(&self) -> &[ContainerField] {
        &self.containers
    }

    pub fn owner(&self) -> Option<&str> {
        self.owner.as_deref()
    }

    pub(crate) fn attribute_position(&self, name: &str) -> ModelResult<usize> {
        self.attr_pos.get(name).copied().ok_or_else(|| {
            ModelError::bad_args(format!("{} has no attribute {:?}", self.name, name))
        })
    }

    pub fn attribute(&self, name: &str) -> ModelResult<&Attribute> {
        Ok(&self.attributes[self.attribute_position(name)?])
    }

    pub(crate) fn container_position(&self, name: &str) -> ModelResult<usize> {
        self.container_pos.get(name).copied().ok_or_else(|| {
            ModelError::bad_args(format!("{} has no container field {:?}", self.name, name))
        })
    }

    pub fn container(&self, name: &str) -> ModelResult<&ContainerField> {
        Ok(&self.containers[self.container_position(name)?])
    }

    /// The score-ordered index of a zindexed attribute.
    pub fn score_index(&self, name: &str) -> ModelResult<&ScoreIndex> {
        self.score_indexes.get(name).ok_or_else(|| {
            ModelError::bad_args(format!("{}.{} is not score-indexed", self.name, name))
        })
    }

    pub fn record_key(&self, id: ObjectId) -> String {
        keys::record_key(&self.name, id)
    }

    pub fn counter_key(&self) -> String {
        keys::counter_key(&self.name)
    }
}
