//! Record type metadata: attributes, container fields, descriptors and the registry.

pub mod attribute;
pub mod container;
pub mod descriptor;
pub mod registry;

pub use attribute::Attribute;
pub use container::{ContainerField, ContainerKind};
pub use descriptor::{TypeBuilder, TypeDescriptor};
pub use registry::Registry;
