//! kvmodel — typed records with secondary indexes over a Redis-shaped
//! key-value store.
//!
//! Record types are declared once through a [`Registry`]. Records are
//! stored as hashes; unique, multi-value, score-ordered and list-ordered
//! indexes are kept current on every create, update and delete, each write
//! landing as one atomic store batch. Container fields (lists, sets and
//! sorted sets) may own their elements and may be indexed themselves.

pub mod config;
pub mod container;
pub mod engine;
pub mod index;
pub mod schema;
pub mod store;
pub mod types;

// Re-export commonly used types at the crate root
pub use config::{EngineConfig, UniqueGuard};
pub use container::{Container, ContainerOrder, InsertionOrdered, ScoreOrdered, Unordered};
pub use engine::{ContainerFieldWriter, Db, RecordWriter};
pub use index::{ScoreIndex, ZCond};
pub use schema::{Attribute, ContainerField, ContainerKind, Registry, TypeBuilder, TypeDescriptor};
pub use store::{Batch, MemoryStore, ScoreBound, Store, StoreError, StoreResult};
pub use types::{
    AttrType, Handle, ModelError, ModelResult, ObjectId, Record, TypeRef, Value,
};
