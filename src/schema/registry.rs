//! Explicit type registration.
//!
//! Each type is registered once. Registration resolves self references,
//! checks that every referenced, owning, or element type is itself a
//! registered record type, and freezes the result.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use crate::types::{AttrType, ModelError, ModelResult, TypeRef};

use super::{ContainerKind, TypeBuilder, TypeDescriptor};

/// The set of registered record types.
#[derive(Debug, Default)]
pub struct Registry {
    types: HashMap<String, Arc<TypeDescriptor>>,
}

fn check_name(type_name: &str, name: &str, what: &str) -> ModelResult<()> {
    if name.is_empty() || name.contains(':') {
        return Err(ModelError::definition(
            type_name,
            format!("invalid {} name {:?}", what, name),
        ));
    }
    Ok(())
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Validate and freeze a type declaration. Registering a name twice is an error.
    pub fn register(&mut self, builder: TypeBuilder) -> ModelResult<Arc<TypeDescriptor>> {
        let mut builder = builder;
        let name = builder.name.clone();
        check_name(&name, &name, "type")?;
        if self.types.contains_key(&name) {
            return Err(ModelError::definition(&name, "already registered"));
        }

        let mut seen = HashSet::new();
        for attr in &mut builder.attributes {
            check_name(&name, attr.name(), "field")?;
            if !seen.insert(attr.name().to_string()) {
                return Err(ModelError::definition(
                    &name,
                    format!("duplicate field {:?}", attr.name()),
                ));
            }
            self.resolve(&name, attr.ty_mut())?;
            if attr.is_zindexed() && !attr.ty().is_scoreable() {
                return Err(ModelError::definition(
                    &name,
                    format!(
                        "{} attribute {:?} cannot be score-indexed",
                        attr.ty().name(),
                        attr.name()
                    ),
                ));
            }
        }

        if let Some(owner) = &builder.owner {
            if *owner != name && !self.types.contains_key(owner) {
                return Err(ModelError::definition(
                    &name,
                    format!("owner {} is not a registered record type", owner),
                ));
            }
        }

        for field in &mut builder.containers {
            check_name(&name, field.name(), "field")?;
            if !seen.insert(field.name().to_string()) {
                return Err(ModelError::definition(
                    &name,
                    format!("duplicate field {:?}", field.name()),
                ));
            }
            self.resolve(&name, field.element_mut())?;
            field.bind(&name);

            let target = field.element().target_type().map(str::to_string);
            if field.is_owned() && target.is_none() {
                return Err(ModelError::definition(
                    &name,
                    format!("owned field {:?} must hold records", field.name()),
                ));
            }
            let Some(sort) = field.sort_field_name() else {
                continue;
            };
            if field.kind() != ContainerKind::SortedSet {
                return Err(ModelError::definition(
                    &name,
                    format!("sort field on {} {:?}", field.kind().name(), field.name()),
                ));
            }
            let sort_ty = match &target {
                Some(t) if *t == name => builder
                    .attributes
                    .iter()
                    .find(|a| a.name() == sort)
                    .map(|a| a.ty().clone()),
                Some(t) => self
                    .types
                    .get(t)
                    .and_then(|d| d.attribute(sort).ok())
                    .map(|a| a.ty().clone()),
                None => None,
            };
            if !sort_ty.is_some_and(|t| t.is_scoreable()) {
                return Err(ModelError::definition(
                    &name,
                    format!(
                        "sort field {:?} of {:?} is not a numeric attribute of the element type",
                        sort,
                        field.name()
                    ),
                ));
            }
        }

        let desc = Arc::new(TypeDescriptor::freeze(builder));
        log::debug!(
            "Registered type {} ({} attributes, {} containers)",
            desc.name(),
            desc.attributes().len(),
            desc.containers().len()
        );
        self.types.insert(name, desc.clone());
        Ok(desc)
    }

    /// Resolve `This` to the type being registered and reject references to
    /// anything that is not a record type.
    fn resolve(&self, type_name: &str, ty: &mut AttrType) -> ModelResult<()> {
        let AttrType::Ref(target) = ty else {
            return Ok(());
        };
        if matches!(target, TypeRef::This) {
            *target = TypeRef::Named(type_name.to_string());
        } else if let TypeRef::Named(n) = target {
            if n.as_str() != type_name && !self.types.contains_key(n.as_str()) {
                return Err(ModelError::definition(
                    type_name,
                    format!("{} is not a registered record type", n),
                ));
            }
        }
        Ok(())
    }

    /// Look up a registered type.
    pub fn get(&self, name: &str) -> ModelResult<Arc<TypeDescriptor>> {
        self.types
            .get(name)
            .cloned()
            .ok_or_else(|| ModelError::bad_args(format!("unknown record type {}", name)))
    }

    pub fn contains(&self, name: &str) -> bool {
        self.types.contains_key(name)
    }

    /// Registered type names, sorted.
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.types.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    pub fn len(&self) -> usize {
        self.types.len()
    }

    pub fn is_empty(&self) -> bool {
        self.types.is_empty()
    }
}
