//! Reference handles — (type, id) pairs that can be loaded on demand.

use std::fmt;
use std::sync::Arc;

use crate::engine::Db;
use crate::index::keys;

use super::{ModelResult, ObjectId, Record};

/// A lightweight reference to a record. Holds no data and does not imply the
/// record exists.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Handle {
    type_name: Arc<str>,
    id: ObjectId,
}

impl Handle {
    /// Build a handle without touching storage.
    pub fn new(type_name: impl Into<Arc<str>>, id: ObjectId) -> Self {
        Self {
            type_name: type_name.into(),
            id,
        }
    }

    pub fn type_name(&self) -> &str {
        &self.type_name
    }

    pub fn id(&self) -> ObjectId {
        self.id
    }

    /// Whether this handle is the "no record" sentinel.
    pub fn is_none(&self) -> bool {
        self.id.is_none()
    }

    /// Primary storage key, `{Type}:{id}`.
    pub fn key(&self) -> String {
        keys::record_key(&self.type_name, self.id)
    }

    /// Materialize the referenced record.
    pub fn load(&self, db: &Db) -> ModelResult<Record> {
        db.load(self)
    }
}

impl fmt::Display for Handle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "<Handle: {}>", self.key())
    }
}
