//! Type descriptors and the [`TypeSchema`] builder.

use std::any::{Any, TypeId};
use std::fmt;
use std::marker::PhantomData;
use std::sync::Arc;

use crate::attribute::{Attr, AttributeDescriptor};
use crate::object::ObjectRef;

/// How a type's attributes are selected for persistence.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PersistenceMode {
    /// Not persistable. Attributes may still be inherited by persistable
    /// subtypes, but follow opt-in rules.
    Unmapped,
    /// Only attributes marked persisted (or identity) are stored. Only
    /// attributes marked identity are identity-relevant.
    OptIn,
    /// Every attribute not excluded is stored. When
    /// `all_identity_relevant` is false, only attributes marked identity
    /// are identity-relevant.
    OptOut { all_identity_relevant: bool },
}

/// A Rust type that can be described to the mapper.
pub trait Persistable: Any + Sized {
    /// Name written as the polymorphic type tag. Unique per registry.
    const TYPE_NAME: &'static str;

    fn schema() -> TypeSchema<Self>;
}

/// Produces a fresh default instance.
pub type Constructor = Arc<dyn Fn() -> ObjectRef + Send + Sync>;

/// Everything the mapper needs to know about one type.
#[derive(Clone)]
pub struct TypeDescriptor {
    name: &'static str,
    type_id: Option<TypeId>,
    mode: PersistenceMode,
    collection: Option<String>,
    embed_type_tag: bool,
    parent: Option<Arc<TypeDescriptor>>,
    abstractions: Vec<String>,
    attributes: Vec<AttributeDescriptor>,
    constructor: Option<Constructor>,
}

impl TypeDescriptor {
    /// A name-only type with no Rust counterpart, such as an interface
    /// several concrete types implement.
    pub fn abstract_type(name: &'static str, collection: Option<String>) -> Self {
        let mode = if collection.is_some() {
            PersistenceMode::OptIn
        } else {
            PersistenceMode::Unmapped
        };
        Self {
            name,
            type_id: None,
            mode,
            collection,
            embed_type_tag: false,
            parent: None,
            abstractions: Vec::new(),
            attributes: Vec::new(),
            constructor: None,
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    /// `None` for abstract types.
    pub fn type_id(&self) -> Option<TypeId> {
        self.type_id
    }

    pub fn mode(&self) -> PersistenceMode {
        self.mode
    }

    pub fn collection(&self) -> Option<&str> {
        self.collection.as_deref()
    }

    /// Persistable types have a mode other than unmapped and a collection.
    pub fn is_persistable(&self) -> bool {
        self.mode != PersistenceMode::Unmapped && self.collection.is_some()
    }

    pub fn parent(&self) -> Option<&TypeDescriptor> {
        self.parent.as_deref()
    }

    /// Names of every ancestor, nearest first.
    pub fn ancestors(&self) -> Vec<&'static str> {
        let mut out = Vec::new();
        let mut cursor = self.parent();
        while let Some(p) = cursor {
            out.push(p.name);
            cursor = p.parent();
        }
        out
    }

    /// Abstract types this type, or any ancestor, implements.
    pub fn abstractions(&self) -> &[String] {
        &self.abstractions
    }

    /// Whether `name` is this type, an ancestor, or an abstraction.
    pub fn is_a(&self, name: &str) -> bool {
        self.name == name
            || self.ancestors().contains(&name)
            || self.abstractions.iter().any(|a| a == name)
    }

    /// All attributes, excluded ones included. Own attributes come first,
    /// then each ancestor's, base-most last.
    pub fn attributes(&self) -> &[AttributeDescriptor] {
        &self.attributes
    }

    /// Attributes written to the document, in attribute order.
    pub fn persisted_attributes(&self) -> impl Iterator<Item = &AttributeDescriptor> {
        self.attributes.iter().filter(|a| !a.is_excluded())
    }

    pub fn attribute(&self, name: &str) -> Option<&AttributeDescriptor> {
        self.attributes.iter().find(|a| a.name() == name)
    }

    /// Whether stored documents must carry the type tag: the type asked
    /// for it, has a parent, or implements an abstraction.
    pub fn requires_type_tag(&self) -> bool {
        self.embed_type_tag || self.parent.is_some() || !self.abstractions.is_empty()
    }

    pub fn has_constructor(&self) -> bool {
        self.constructor.is_some()
    }

    /// A fresh default instance, if the type declares a constructor.
    pub fn construct(&self) -> Option<ObjectRef> {
        self.constructor.as_ref().map(|ctor| ctor())
    }
}

impl fmt::Debug for TypeDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TypeDescriptor")
            .field("name", &self.name)
            .field("mode", &self.mode)
            .field("collection", &self.collection)
            .field("parent", &self.parent.as_ref().map(|p| p.name))
            .field("abstractions", &self.abstractions)
            .field("attributes", &self.attributes.len())
            .field("constructor", &self.constructor.is_some())
            .finish()
    }
}

// ---------------------------------------------------------------------------
// Builder
// ---------------------------------------------------------------------------

/// Builds the [`TypeDescriptor`] of `T`.
pub struct TypeSchema<T> {
    mode: PersistenceMode,
    collection: Option<String>,
    embed_type_tag: bool,
    abstractions: Vec<String>,
    own: Vec<AttributeDescriptor>,
    inherited: Vec<AttributeDescriptor>,
    parent: Option<Arc<TypeDescriptor>>,
    constructor: Option<Constructor>,
    _type: PhantomData<fn() -> T>,
}

impl<T: Persistable> TypeSchema<T> {
    fn with_mode(mode: PersistenceMode, collection: Option<String>) -> Self {
        Self {
            mode,
            collection,
            embed_type_tag: false,
            abstractions: Vec::new(),
            own: Vec::new(),
            inherited: Vec::new(),
            parent: None,
            constructor: None,
            _type: PhantomData,
        }
    }

    /// Not persistable on its own.
    pub fn unmapped() -> Self {
        Self::with_mode(PersistenceMode::Unmapped, None)
    }

    /// Opt-in persistable type stored in `collection`.
    pub fn persistable(collection: impl Into<String>) -> Self {
        Self::with_mode(PersistenceMode::OptIn, Some(collection.into()))
    }

    /// Opt-in persistable type stored in its parent's collection.
    pub fn persistable_subtype() -> Self {
        Self::with_mode(PersistenceMode::OptIn, None)
    }

    /// Opt-out type stored in `collection`: every attribute is persisted
    /// and identity-relevant unless told otherwise.
    pub fn dataclass(collection: impl Into<String>) -> Self {
        Self::with_mode(
            PersistenceMode::OptOut {
                all_identity_relevant: true,
            },
            Some(collection.into()),
        )
    }

    /// On an opt-out type, only attributes marked identity are
    /// identity-relevant.
    pub fn identity_flagged_only(mut self) -> Self {
        if let PersistenceMode::OptOut { .. } = self.mode {
            self.mode = PersistenceMode::OptOut {
                all_identity_relevant: false,
            };
        }
        self
    }

    /// Always write the type tag.
    pub fn embed_type_tag(mut self) -> Self {
        self.embed_type_tag = true;
        self
    }

    /// Declare that `T` implements the abstract type `name`.
    pub fn implements(mut self, name: impl Into<String>) -> Self {
        let name = name.into();
        if !self.abstractions.contains(&name) {
            self.abstractions.push(name);
        }
        self
    }

    pub fn constructor(mut self, ctor: fn() -> T) -> Self {
        self.constructor = Some(Arc::new(move || ObjectRef::new(ctor())));
        self
    }

    /// Construct through `T::default()`.
    pub fn default_constructor(self) -> Self
    where
        T: Default,
    {
        self.constructor(T::default)
    }

    pub fn attribute(mut self, attr: Attr<T>) -> Self {
        let mut descriptor = attr.into_descriptor();
        descriptor.owner = T::TYPE_NAME;
        self.own.push(descriptor);
        self
    }

    /// Inherit from `P`, embedded in `T` and reached through the lenses.
    ///
    /// `P`'s attributes keep `P`'s persistence rules. `T` inherits `P`'s
    /// collection unless it names its own, and `P`'s abstractions.
    ///
    /// The lenses are checked before `T` is inferred from the return type,
    /// so name it up front: `TypeSchema::<Self>::persistable_subtype()`.
    pub fn extends<P: Persistable>(mut self, up: fn(&T) -> &P, up_mut: fn(&mut T) -> &mut P) -> Self {
        let parent = P::schema().build();
        self.inherited = parent
            .attributes
            .iter()
            .cloned()
            .map(|a| a.lift(up, up_mut))
            .collect();
        for name in &parent.abstractions {
            if !self.abstractions.contains(name) {
                self.abstractions.push(name.clone());
            }
        }
        self.parent = Some(Arc::new(parent));
        self
    }

    pub fn build(self) -> TypeDescriptor {
        let mode = self.mode;
        let mut attributes: Vec<AttributeDescriptor> = self
            .own
            .into_iter()
            .map(|mut a| {
                a.owner_mode = mode;
                a
            })
            .collect();
        attributes.extend(self.inherited);

        let collection = self
            .collection
            .or_else(|| self.parent.as_ref().and_then(|p| p.collection.clone()));

        TypeDescriptor {
            name: T::TYPE_NAME,
            type_id: Some(TypeId::of::<T>()),
            mode,
            collection,
            embed_type_tag: self.embed_type_tag,
            parent: self.parent,
            abstractions: self.abstractions,
            attributes,
            constructor: self.constructor,
        }
    }
}
