//! Attribute descriptors and their index flags.

use crate::types::{AttrType, TypeRef};

/// A declared scalar attribute of a record type.
#[derive(Debug, Clone)]
pub struct Attribute {
    name: String,
    ty: AttrType,
    indexed: bool,
    unique: bool,
    zindexed: bool,
    listed: bool,
}

impl Attribute {
    /// Declare an attribute with no index.
    pub fn new(name: impl Into<String>, ty: AttrType) -> Self {
        Self {
            name: name.into(),
            ty,
            indexed: false,
            unique: false,
            zindexed: false,
            listed: false,
        }
    }

    pub fn string(name: impl Into<String>) -> Self {
        Self::new(name, AttrType::Str)
    }

    pub fn int(name: impl Into<String>) -> Self {
        Self::new(name, AttrType::Int)
    }

    pub fn float(name: impl Into<String>) -> Self {
        Self::new(name, AttrType::Float)
    }

    pub fn boolean(name: impl Into<String>) -> Self {
        Self::new(name, AttrType::Bool)
    }

    pub fn datetime(name: impl Into<String>) -> Self {
        Self::new(name, AttrType::DateTime)
    }

    /// Reference to another record. Use [`TypeRef::This`] for the type being declared.
    pub fn reference(name: impl Into<String>, target: TypeRef) -> Self {
        Self::new(name, AttrType::Ref(target))
    }

    /// Maintain a value -> set of ids index.
    pub fn indexed(mut self) -> Self {
        self.indexed = true;
        self
    }

    /// Maintain a value -> id index and reject duplicate values.
    pub fn unique(mut self) -> Self {
        self.indexed = true;
        self.unique = true;
        self
    }

    /// Maintain a per-type score-ordered index keyed by this attribute.
    pub fn zindexed(mut self) -> Self {
        self.zindexed = true;
        self
    }

    /// Maintain a value -> insertion-ordered list of ids index.
    pub fn listed(mut self) -> Self {
        self.listed = true;
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn ty(&self) -> &AttrType {
        &self.ty
    }

    pub fn is_indexed(&self) -> bool {
        self.indexed
    }

    pub fn is_unique(&self) -> bool {
        self.unique
    }

    pub fn is_zindexed(&self) -> bool {
        self.zindexed
    }

    pub fn is_listed(&self) -> bool {
        self.listed
    }

    /// Whether any index kind tracks this attribute.
    pub fn is_tracked(&self) -> bool {
        self.indexed || self.zindexed || self.listed
    }

    pub(crate) fn ty_mut(&mut self) -> &mut AttrType {
        &mut self.ty
    }
}
