use std::collections::HashMap;
use std::sync::Arc;

use tracing::debug;

use crate::attribute::AttributeDescriptor;
use crate::error::{SchemaError, SchemaResult};
use crate::schema::{Persistable, TypeDescriptor};

/// Name-indexed set of type descriptors.
///
/// Resolves the type tags found in stored documents back to descriptors.
/// Registering a type also registers its ancestors. Registration is
/// idempotent per Rust type; a second Rust type claiming a taken name is
/// rejected.
#[derive(Default)]
pub struct SchemaRegistry {
    types: HashMap<&'static str, Arc<TypeDescriptor>>,
}

impl SchemaRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `T` and its ancestors.
    pub fn register<T: Persistable>(&mut self) -> SchemaResult<()> {
        self.register_descriptor(T::schema().build())
    }

    /// Register an abstract, name-only type.
    pub fn register_abstract(
        &mut self,
        name: &'static str,
        collection: Option<String>,
    ) -> SchemaResult<()> {
        self.register_descriptor(TypeDescriptor::abstract_type(name, collection))
    }

    /// Register a prebuilt descriptor and its ancestors.
    pub fn register_descriptor(&mut self, descriptor: TypeDescriptor) -> SchemaResult<()> {
        if let Some(parent) = descriptor.parent() {
            self.register_descriptor(parent.clone())?;
        }
        if let Some(existing) = self.types.get(descriptor.name()) {
            if existing.type_id() == descriptor.type_id() {
                return Ok(());
            }
            return Err(SchemaError::DuplicateType {
                name: descriptor.name().to_string(),
            });
        }
        debug!(
            type_name = descriptor.name(),
            collection = ?descriptor.collection(),
            attributes = descriptor.attributes().len(),
            "type registered"
        );
        self.types.insert(descriptor.name(), Arc::new(descriptor));
        Ok(())
    }

    /// Look up a type by name.
    pub fn resolve(&self, name: &str) -> SchemaResult<&TypeDescriptor> {
        self.get(name)
            .ok_or_else(|| SchemaError::UnknownType(name.to_string()))
    }

    pub fn get(&self, name: &str) -> Option<&TypeDescriptor> {
        self.types.get(name).map(Arc::as_ref)
    }

    /// The descriptor registered for `T`, if `T` itself was registered.
    pub fn descriptor_of<T: Persistable>(&self) -> Option<&TypeDescriptor> {
        self.get(T::TYPE_NAME)
            .filter(|d| d.type_id() == Some(std::any::TypeId::of::<T>()))
    }

    pub fn contains(&self, name: &str) -> bool {
        self.types.contains_key(name)
    }

    /// Registered names, sorted.
    pub fn type_names(&self) -> Vec<&'static str> {
        let mut names: Vec<&'static str> = self.types.keys().copied().collect();
        names.sort_unstable();
        names
    }

    pub fn len(&self) -> usize {
        self.types.len()
    }

    pub fn is_empty(&self) -> bool {
        self.types.is_empty()
    }

    // -----------------------------------------------------------------------
    // Resolver queries by type name
    // -----------------------------------------------------------------------

    /// Unknown names are not persistable.
    pub fn is_persistable(&self, name: &str) -> bool {
        self.get(name).is_some_and(TypeDescriptor::is_persistable)
    }

    pub fn collection_of(&self, name: &str) -> Option<&str> {
        self.get(name).and_then(TypeDescriptor::collection)
    }

    pub fn attributes_of(&self, name: &str) -> SchemaResult<&[AttributeDescriptor]> {
        self.resolve(name).map(TypeDescriptor::attributes)
    }

    pub fn requires_type_tag(&self, name: &str) -> bool {
        self.get(name).is_some_and(TypeDescriptor::requires_type_tag)
    }
}

impl std::fmt::Debug for SchemaRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SchemaRegistry")
            .field("types", &self.type_names())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::attribute::Attr;
    use crate::schema::TypeSchema;

    #[derive(Default)]
    struct Shape {
        label: String,
    }

    impl Persistable for Shape {
        const TYPE_NAME: &'static str = "Shape";

        fn schema() -> TypeSchema<Self> {
            TypeSchema::persistable("shapes")
                .default_constructor()
                .attribute(Attr::field("label", |s: &Shape| &s.label, |s| &mut s.label).identity())
        }
    }

    #[derive(Default)]
    struct Circle {
        shape: Shape,
        radius: f64,
    }

    impl Persistable for Circle {
        const TYPE_NAME: &'static str = "Circle";

        fn schema() -> TypeSchema<Self> {
            TypeSchema::<Self>::persistable_subtype()
                .extends::<Shape>(|c| &c.shape, |c| &mut c.shape)
                .default_constructor()
                .attribute(Attr::field("radius", |c: &Circle| &c.radius, |c| &mut c.radius).persisted())
        }
    }

    struct Impostor;

    impl Persistable for Impostor {
        const TYPE_NAME: &'static str = "Shape";

        fn schema() -> TypeSchema<Self> {
            TypeSchema::unmapped()
        }
    }

    #[test]
    fn registering_a_subtype_registers_ancestors() {
        let mut registry = SchemaRegistry::new();
        registry.register::<Circle>().unwrap();
        assert_eq!(registry.type_names(), vec!["Circle", "Shape"]);
        assert_eq!(registry.collection_of("Circle"), Some("shapes"));
        assert!(registry.requires_type_tag("Circle"));
        assert!(!registry.requires_type_tag("Shape"));
    }

    #[test]
    fn registration_is_idempotent() {
        let mut registry = SchemaRegistry::new();
        registry.register::<Shape>().unwrap();
        registry.register::<Circle>().unwrap();
        registry.register::<Shape>().unwrap();
        assert_eq!(registry.len(), 2);
        assert!(registry.descriptor_of::<Shape>().is_some());
    }

    #[test]
    fn name_collision_is_rejected() {
        let mut registry = SchemaRegistry::new();
        registry.register::<Shape>().unwrap();
        assert_eq!(
            registry.register::<Impostor>(),
            Err(SchemaError::DuplicateType { name: "Shape".into() })
        );
        assert!(registry.descriptor_of::<Impostor>().is_none());
    }

    #[test]
    fn unknown_names() {
        let registry = SchemaRegistry::new();
        assert!(registry.is_empty());
        assert!(!registry.is_persistable("Nope"));
        assert_eq!(registry.collection_of("Nope"), None);
        assert_eq!(
            registry.resolve("Nope").unwrap_err(),
            SchemaError::UnknownType("Nope".into())
        );
        assert!(registry.attributes_of("Nope").is_err());
    }

    #[test]
    fn abstract_registration() {
        let mut registry = SchemaRegistry::new();
        registry.register_abstract("Drawable", Some("drawables".into())).unwrap();
        registry.register_abstract("Drawable", Some("drawables".into())).unwrap();
        assert!(registry.is_persistable("Drawable"));
        assert!(registry.resolve("Drawable").unwrap().construct().is_none());
    }

    #[test]
    fn attributes_resolve_by_name() {
        let mut registry = SchemaRegistry::new();
        registry.register::<Circle>().unwrap();
        let keys: Vec<&str> = registry
            .attributes_of("Circle")
            .unwrap()
            .iter()
            .map(AttributeDescriptor::storage_key)
            .collect();
        assert_eq!(keys, vec!["radius", "label"]);
    }
}
