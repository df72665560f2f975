//! Core data types: identifiers, attribute values, handles and records.

pub mod error;
pub mod handle;
pub mod record;
pub mod value;

use std::fmt;

use serde::Serialize;

pub use error::{ModelError, ModelResult};
pub use handle::Handle;
pub use record::Record;
pub use value::{AttrType, TypeRef, Value};

/// Identity of a stored record. `0` is reserved for "no record".
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct ObjectId(u64);

impl ObjectId {
    /// The absent id.
    pub const NONE: ObjectId = ObjectId(0);

    pub fn new(id: u64) -> Self {
        Self(id)
    }

    /// Numeric value of the id.
    pub fn get(self) -> u64 {
        self.0
    }

    pub fn is_none(self) -> bool {
        self.0 == 0
    }

    /// Parse the stored string form of an id.
    pub fn parse(s: &str) -> Option<Self> {
        s.parse::<u64>().ok().map(Self)
    }
}

impl fmt::Display for ObjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u64> for ObjectId {
    fn from(id: u64) -> Self {
        Self(id)
    }
}
