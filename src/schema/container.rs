//! Container field descriptors (list, set and sorted-set fields).

use crate::index::keys;
use crate::types::AttrType;

/// Ordering semantics of a container field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ContainerKind {
    /// Insertion-ordered sequence, duplicates allowed.
    List,
    /// Unordered set.
    Set,
    /// Score-ordered set.
    SortedSet,
}

impl ContainerKind {
    pub fn name(&self) -> &'static str {
        match self {
            Self::List => "list",
            Self::Set => "set",
            Self::SortedSet => "sorted set",
        }
    }
}

/// A declared container field of a record type.
#[derive(Debug, Clone)]
pub struct ContainerField {
    name: String,
    kind: ContainerKind,
    element: AttrType,
    owned: bool,
    indexed: bool,
    unique: bool,
    sort_field: Option<String>,
    /// Declaring type, filled in on registration.
    model: String,
}

impl ContainerField {
    fn new(name: impl Into<String>, kind: ContainerKind, element: AttrType) -> Self {
        Self {
            name: name.into(),
            kind,
            element,
            owned: false,
            indexed: false,
            unique: false,
            sort_field: None,
            model: String::new(),
        }
    }

    pub fn list(name: impl Into<String>, element: AttrType) -> Self {
        Self::new(name, ContainerKind::List, element)
    }

    pub fn set(name: impl Into<String>, element: AttrType) -> Self {
        Self::new(name, ContainerKind::Set, element)
    }

    pub fn sorted_set(name: impl Into<String>, element: AttrType) -> Self {
        Self::new(name, ContainerKind::SortedSet, element)
    }

    /// Elements are records whose lifecycle follows their membership.
    pub fn owned(mut self) -> Self {
        self.owned = true;
        self
    }

    /// Index element -> owning record ids.
    pub fn indexed(mut self) -> Self {
        self.indexed = true;
        self
    }

    /// Index element -> owning record id, at most one owner per element.
    pub fn unique(mut self) -> Self {
        self.indexed = true;
        self.unique = true;
        self
    }

    /// Attribute of the element type that supplies the score on append.
    pub fn sort_field(mut self, attribute: impl Into<String>) -> Self {
        self.sort_field = Some(attribute.into());
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn kind(&self) -> ContainerKind {
        self.kind
    }

    pub fn element(&self) -> &AttrType {
        &self.element
    }

    pub fn is_owned(&self) -> bool {
        self.owned
    }

    pub fn is_indexed(&self) -> bool {
        self.indexed
    }

    pub fn is_unique(&self) -> bool {
        self.unique
    }

    pub fn sort_field_name(&self) -> Option<&str> {
        self.sort_field.as_deref()
    }

    /// Name of the type declaring this field.
    pub fn model(&self) -> &str {
        &self.model
    }

    /// Index key base (`u:T:f` or `i:T:f`) when the field is indexed.
    pub fn index_base(&self) -> Option<String> {
        if !self.indexed {
            return None;
        }
        Some(if self.unique {
            keys::unique_key(&self.model, &self.name)
        } else {
            keys::multi_base(&self.model, &self.name)
        })
    }

    pub(crate) fn element_mut(&mut self) -> &mut AttrType {
        &mut self.element
    }

    pub(crate) fn bind(&mut self, model: &str) {
        self.model = model.to_string();
    }
}
