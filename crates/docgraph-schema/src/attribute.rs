//! Attribute descriptors and the [`Attr`] builder.

use std::any::{type_name, Any};
use std::fmt;
use std::marker::PhantomData;
use std::sync::Arc;

use crate::error::AccessError;
use crate::field::{EnumType, FieldType};
use crate::schema::PersistenceMode;
use crate::value::{AttributeKind, FieldValue};

/// Reads an attribute from an erased instance.
pub type Getter = Arc<dyn Fn(&dyn Any) -> Result<FieldValue, AccessError> + Send + Sync>;

/// Assigns an attribute on an erased instance.
pub type Setter = Arc<dyn Fn(&mut dyn Any, FieldValue) -> Result<(), AccessError> + Send + Sync>;

/// One attribute of a persistable type, including inherited ones.
///
/// Whether the attribute is persisted and identity-relevant depends on
/// the persistence mode of the type that declares it, not the type that
/// inherits it.
#[derive(Clone)]
pub struct AttributeDescriptor {
    pub(crate) name: String,
    pub(crate) owner: &'static str,
    pub(crate) owner_mode: PersistenceMode,
    pub(crate) kind: AttributeKind,
    pub(crate) key: Option<String>,
    pub(crate) identity: bool,
    pub(crate) persisted: bool,
    pub(crate) excluded: bool,
    getter: Getter,
    setter: Setter,
}

impl AttributeDescriptor {
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Name of the type that declares the attribute.
    pub fn owner(&self) -> &'static str {
        self.owner
    }

    pub fn kind(&self) -> &AttributeKind {
        &self.kind
    }

    /// Document key: the explicit override, else the attribute name.
    pub fn storage_key(&self) -> &str {
        self.key.as_deref().unwrap_or(&self.name)
    }

    /// Whether the attribute is left out of the document.
    ///
    /// Opt-out owners persist everything not explicitly excluded. Opt-in
    /// and unmapped owners persist only attributes declared persisted.
    pub fn is_excluded(&self) -> bool {
        if self.excluded {
            return true;
        }
        match self.owner_mode {
            PersistenceMode::OptOut { .. } => false,
            PersistenceMode::OptIn | PersistenceMode::Unmapped => !self.persisted,
        }
    }

    /// Whether the attribute takes part in matching a stored document.
    pub fn is_identity_relevant(&self) -> bool {
        if self.is_excluded() {
            return false;
        }
        match self.owner_mode {
            PersistenceMode::OptOut {
                all_identity_relevant: true,
            } => true,
            _ => self.identity,
        }
    }

    pub(crate) fn getter(&self) -> &Getter {
        &self.getter
    }

    pub(crate) fn setter(&self) -> &Setter {
        &self.setter
    }

    /// Re-target the accessors from `P` to a subtype `T` that embeds it.
    pub(crate) fn lift<T: 'static, P: 'static>(
        mut self,
        up: fn(&T) -> &P,
        up_mut: fn(&mut T) -> &mut P,
    ) -> Self {
        let get = Arc::clone(&self.getter);
        self.getter = Arc::new(move |obj: &dyn Any| {
            let this = obj
                .downcast_ref::<T>()
                .ok_or(AccessError::OwnerMismatch { expected: type_name::<T>() })?;
            get(up(this) as &dyn Any)
        });
        let set = Arc::clone(&self.setter);
        self.setter = Arc::new(move |obj: &mut dyn Any, value: FieldValue| {
            let this = obj
                .downcast_mut::<T>()
                .ok_or(AccessError::OwnerMismatch { expected: type_name::<T>() })?;
            set(up_mut(this) as &mut dyn Any, value)
        });
        self
    }
}

impl fmt::Debug for AttributeDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AttributeDescriptor")
            .field("name", &self.name)
            .field("owner", &self.owner)
            .field("kind", &self.kind)
            .field("storage_key", &self.storage_key())
            .field("excluded", &self.is_excluded())
            .field("identity", &self.is_identity_relevant())
            .finish()
    }
}

// ---------------------------------------------------------------------------
// Builder
// ---------------------------------------------------------------------------

/// Declares one attribute of `T`.
///
/// ```ignore
/// Attr::field("name", |p: &Person| &p.name, |p| &mut p.name).identity()
/// ```
pub struct Attr<T> {
    descriptor: AttributeDescriptor,
    _owner: PhantomData<fn(&T)>,
}

impl<T: 'static> Attr<T> {
    fn from_parts(name: &str, kind: AttributeKind, getter: Getter, setter: Setter) -> Self {
        Self {
            descriptor: AttributeDescriptor {
                name: name.to_string(),
                owner: "",
                owner_mode: PersistenceMode::Unmapped,
                kind,
                key: None,
                identity: false,
                persisted: false,
                excluded: false,
                getter,
                setter,
            },
            _owner: PhantomData,
        }
    }

    /// A plain field of a [`FieldType`].
    pub fn field<V, G, M>(name: &str, get: G, get_mut: M) -> Self
    where
        V: FieldType,
        G: Fn(&T) -> &V + Send + Sync + 'static,
        M: Fn(&mut T) -> &mut V + Send + Sync + 'static,
    {
        let kind = V::kind();
        let expected = kind.to_string();
        let getter: Getter = Arc::new(move |obj: &dyn Any| {
            let this = obj
                .downcast_ref::<T>()
                .ok_or(AccessError::OwnerMismatch { expected: type_name::<T>() })?;
            Ok(get(this).to_field_value())
        });
        let setter: Setter = Arc::new(move |obj: &mut dyn Any, value: FieldValue| {
            let this = obj
                .downcast_mut::<T>()
                .ok_or(AccessError::OwnerMismatch { expected: type_name::<T>() })?;
            let found = value.variant_name();
            let converted = V::from_field_value(value).ok_or_else(|| AccessError::Incompatible {
                expected: expected.clone(),
                found,
            })?;
            *get_mut(this) = converted;
            Ok(())
        });
        Self::from_parts(name, kind, getter, setter)
    }

    /// A field holding an [`EnumType`], stored by label.
    pub fn enumeration<E, G, M>(name: &str, get: G, get_mut: M) -> Self
    where
        E: EnumType,
        G: Fn(&T) -> &E + Send + Sync + 'static,
        M: Fn(&mut T) -> &mut E + Send + Sync + 'static,
    {
        let kind = AttributeKind::Enum(E::variants().iter().map(EnumType::label).collect());
        let getter: Getter = Arc::new(move |obj: &dyn Any| {
            let this = obj
                .downcast_ref::<T>()
                .ok_or(AccessError::OwnerMismatch { expected: type_name::<T>() })?;
            Ok(FieldValue::Enum(get(this).label().to_string()))
        });
        let setter: Setter = Arc::new(move |obj: &mut dyn Any, value: FieldValue| {
            let this = obj
                .downcast_mut::<T>()
                .ok_or(AccessError::OwnerMismatch { expected: type_name::<T>() })?;
            let variant = match &value {
                FieldValue::Enum(label) | FieldValue::String(label) => E::from_label(label),
                _ => None,
            };
            let variant = variant.ok_or_else(|| AccessError::Incompatible {
                expected: "enum".to_string(),
                found: value.variant_name(),
            })?;
            *get_mut(this) = variant;
            Ok(())
        });
        Self::from_parts(name, kind, getter, setter)
    }

    /// An attribute with hand-written accessors. Either side may fail.
    pub fn custom<G, S>(name: &str, kind: AttributeKind, get: G, set: S) -> Self
    where
        G: Fn(&T) -> Result<FieldValue, AccessError> + Send + Sync + 'static,
        S: Fn(&mut T, FieldValue) -> Result<(), AccessError> + Send + Sync + 'static,
    {
        let getter: Getter = Arc::new(move |obj: &dyn Any| {
            let this = obj
                .downcast_ref::<T>()
                .ok_or(AccessError::OwnerMismatch { expected: type_name::<T>() })?;
            get(this)
        });
        let setter: Setter = Arc::new(move |obj: &mut dyn Any, value: FieldValue| {
            let this = obj
                .downcast_mut::<T>()
                .ok_or(AccessError::OwnerMismatch { expected: type_name::<T>() })?;
            set(this, value)
        });
        Self::from_parts(name, kind, getter, setter)
    }

    /// Override the document key.
    pub fn key(mut self, key: impl Into<String>) -> Self {
        self.descriptor.key = Some(key.into());
        self
    }

    /// Mark identity-relevant. Implies persisted.
    pub fn identity(mut self) -> Self {
        self.descriptor.identity = true;
        self.descriptor.persisted = true;
        self
    }

    /// Mark persisted on an opt-in type.
    pub fn persisted(mut self) -> Self {
        self.descriptor.persisted = true;
        self
    }

    /// Leave out of the document regardless of mode.
    pub fn excluded(mut self) -> Self {
        self.descriptor.excluded = true;
        self
    }

    /// Declare the target type of an untyped reference.
    pub fn declared(mut self, type_name: &'static str) -> Self {
        self.descriptor.kind = self.descriptor.kind.declare(type_name);
        self
    }

    pub(crate) fn into_descriptor(self) -> AttributeDescriptor {
        self.descriptor
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::ScalarKind;

    struct Row {
        label: String,
        weight: f32,
    }

    fn label() -> AttributeDescriptor {
        Attr::field("label", |r: &Row| &r.label, |r| &mut r.label).into_descriptor()
    }

    #[test]
    fn storage_key_defaults_to_name() {
        let plain = label();
        assert_eq!(plain.storage_key(), "label");

        let renamed = Attr::field("label", |r: &Row| &r.label, |r| &mut r.label)
            .key("lbl")
            .into_descriptor();
        assert_eq!(renamed.storage_key(), "lbl");
        assert_eq!(renamed.name(), "label");
    }

    #[test]
    fn field_kind_follows_rust_type() {
        let weight = Attr::field("weight", |r: &Row| &r.weight, |r| &mut r.weight).into_descriptor();
        assert_eq!(weight.kind(), &AttributeKind::Scalar(ScalarKind::Float32));
    }

    #[test]
    fn opt_in_rules() {
        let mut plain = label();
        plain.owner_mode = PersistenceMode::OptIn;
        assert!(plain.is_excluded());
        assert!(!plain.is_identity_relevant());

        let mut id = Attr::field("label", |r: &Row| &r.label, |r| &mut r.label)
            .identity()
            .into_descriptor();
        id.owner_mode = PersistenceMode::OptIn;
        assert!(!id.is_excluded());
        assert!(id.is_identity_relevant());
    }

    #[test]
    fn opt_out_rules() {
        let mut plain = label();
        plain.owner_mode = PersistenceMode::OptOut {
            all_identity_relevant: true,
        };
        assert!(!plain.is_excluded());
        assert!(plain.is_identity_relevant());

        plain.owner_mode = PersistenceMode::OptOut {
            all_identity_relevant: false,
        };
        assert!(!plain.is_excluded());
        assert!(!plain.is_identity_relevant());

        let mut skipped = Attr::field("label", |r: &Row| &r.label, |r| &mut r.label)
            .identity()
            .excluded()
            .into_descriptor();
        skipped.owner_mode = PersistenceMode::OptOut {
            all_identity_relevant: true,
        };
        assert!(skipped.is_excluded());
        assert!(!skipped.is_identity_relevant());
    }

    #[test]
    fn setter_rejects_incompatible_values() {
        let attr = label();
        let mut row = Row {
            label: "a".into(),
            weight: 0.0,
        };
        let err = (attr.setter())(&mut row as &mut dyn Any, FieldValue::Int32(1)).unwrap_err();
        assert!(matches!(err, AccessError::Incompatible { found: "int32", .. }));

        (attr.setter())(&mut row as &mut dyn Any, FieldValue::from("b")).unwrap();
        assert_eq!(row.label, "b");
    }

    #[test]
    fn accessor_checks_owner_type() {
        let attr = label();
        let wrong = 5_i32;
        let err = (attr.getter())(&wrong as &dyn Any).unwrap_err();
        assert!(matches!(err, AccessError::OwnerMismatch { .. }));
    }
}
