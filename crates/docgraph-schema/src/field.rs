//! Conversions between Rust field types and [`FieldValue`].

use std::collections::{BTreeSet, HashSet};
use std::hash::Hash;

use docgraph_types::DocumentId;

use crate::object::{ObjectRef, Shared};
use crate::schema::Persistable;
use crate::value::{AttributeKind, FieldValue, ScalarKind};

/// A Rust type that can back an attribute.
pub trait FieldType: Sized + 'static {
    /// Declared kind of attributes of this type.
    fn kind() -> AttributeKind;

    fn to_field_value(&self) -> FieldValue;

    /// Convert back. `None` if `value` has the wrong shape.
    fn from_field_value(value: FieldValue) -> Option<Self>;
}

/// A fieldless enum stored by variant label.
pub trait EnumType: Copy + 'static {
    /// Every variant, in declaration order.
    fn variants() -> &'static [Self];

    fn label(&self) -> &'static str;

    /// The variant with exactly this label.
    fn from_label(label: &str) -> Option<Self> {
        Self::variants().iter().copied().find(|v| v.label() == label)
    }
}

macro_rules! scalar_field {
    ($($ty:ty => $variant:ident),* $(,)?) => {
        $(
            impl FieldType for $ty {
                fn kind() -> AttributeKind {
                    AttributeKind::Scalar(ScalarKind::$variant)
                }

                fn to_field_value(&self) -> FieldValue {
                    FieldValue::$variant(*self)
                }

                fn from_field_value(value: FieldValue) -> Option<Self> {
                    match value {
                        FieldValue::$variant(v) => Some(v),
                        _ => None,
                    }
                }
            }
        )*
    };
}

scalar_field! {
    bool => Bool,
    i16 => Int16,
    i32 => Int32,
    i64 => Int64,
    f32 => Float32,
    f64 => Float64,
    char => Char,
    DocumentId => Id,
}

impl FieldType for String {
    fn kind() -> AttributeKind {
        AttributeKind::Scalar(ScalarKind::String)
    }

    fn to_field_value(&self) -> FieldValue {
        FieldValue::String(self.clone())
    }

    fn from_field_value(value: FieldValue) -> Option<Self> {
        match value {
            FieldValue::String(s) => Some(s),
            _ => None,
        }
    }
}

/// `None` is stored as null.
impl<V: FieldType> FieldType for Option<V> {
    fn kind() -> AttributeKind {
        V::kind()
    }

    fn to_field_value(&self) -> FieldValue {
        match self {
            Some(v) => v.to_field_value(),
            None => FieldValue::Null,
        }
    }

    fn from_field_value(value: FieldValue) -> Option<Self> {
        match value {
            FieldValue::Null => Some(None),
            other => V::from_field_value(other).map(Some),
        }
    }
}

fn elements<V: FieldType>(value: FieldValue) -> Option<Vec<V>> {
    match value {
        FieldValue::Sequence(items) => items.into_iter().map(V::from_field_value).collect(),
        _ => None,
    }
}

impl<V: FieldType> FieldType for Vec<V> {
    fn kind() -> AttributeKind {
        AttributeKind::Sequence(Box::new(V::kind()))
    }

    fn to_field_value(&self) -> FieldValue {
        FieldValue::Sequence(self.iter().map(FieldType::to_field_value).collect())
    }

    fn from_field_value(value: FieldValue) -> Option<Self> {
        elements(value)
    }
}

impl<V: FieldType> FieldType for Box<[V]> {
    fn kind() -> AttributeKind {
        AttributeKind::Array(Box::new(V::kind()))
    }

    fn to_field_value(&self) -> FieldValue {
        FieldValue::Sequence(self.iter().map(FieldType::to_field_value).collect())
    }

    fn from_field_value(value: FieldValue) -> Option<Self> {
        elements(value).map(Vec::into_boxed_slice)
    }
}

/// Iteration order, and so document order, is unspecified.
impl<V: FieldType + Eq + Hash> FieldType for HashSet<V> {
    fn kind() -> AttributeKind {
        AttributeKind::Set(Box::new(V::kind()))
    }

    fn to_field_value(&self) -> FieldValue {
        FieldValue::Sequence(self.iter().map(FieldType::to_field_value).collect())
    }

    fn from_field_value(value: FieldValue) -> Option<Self> {
        elements::<V>(value).map(|v| v.into_iter().collect())
    }
}

impl<V: FieldType + Ord> FieldType for BTreeSet<V> {
    fn kind() -> AttributeKind {
        AttributeKind::Set(Box::new(V::kind()))
    }

    fn to_field_value(&self) -> FieldValue {
        FieldValue::Sequence(self.iter().map(FieldType::to_field_value).collect())
    }

    fn from_field_value(value: FieldValue) -> Option<Self> {
        elements::<V>(value).map(|v| v.into_iter().collect())
    }
}

/// A reference to another persistable instance of a known type.
impl<T: Persistable> FieldType for Shared<T> {
    fn kind() -> AttributeKind {
        AttributeKind::Reference(Some(T::TYPE_NAME))
    }

    fn to_field_value(&self) -> FieldValue {
        FieldValue::Object(ObjectRef::from_shared(self))
    }

    fn from_field_value(value: FieldValue) -> Option<Self> {
        match value {
            FieldValue::Object(o) => o.downcast::<T>(),
            _ => None,
        }
    }
}

/// A reference to any persistable instance.
impl FieldType for ObjectRef {
    fn kind() -> AttributeKind {
        AttributeKind::Reference(None)
    }

    fn to_field_value(&self) -> FieldValue {
        FieldValue::Object(self.clone())
    }

    fn from_field_value(value: FieldValue) -> Option<Self> {
        match value {
            FieldValue::Object(o) => Some(o),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::object::shared;
    use crate::schema::TypeSchema;

    #[derive(Clone, Copy, Debug, PartialEq, Eq)]
    enum Colour {
        Red,
        Green,
    }

    impl EnumType for Colour {
        fn variants() -> &'static [Self] {
            &[Colour::Red, Colour::Green]
        }

        fn label(&self) -> &'static str {
            match self {
                Colour::Red => "RED",
                Colour::Green => "GREEN",
            }
        }
    }

    struct Leaf;

    impl Persistable for Leaf {
        const TYPE_NAME: &'static str = "Leaf";

        fn schema() -> TypeSchema<Self> {
            TypeSchema::unmapped()
        }
    }

    #[test]
    fn enum_labels_match_exactly() {
        assert_eq!(Colour::from_label("GREEN"), Some(Colour::Green));
        assert_eq!(Colour::from_label("green"), None);
        assert_eq!(Colour::Red.label(), "RED");
    }

    #[test]
    fn option_maps_none_to_null() {
        let none: Option<i32> = None;
        assert_eq!(none.to_field_value(), FieldValue::Null);
        assert_eq!(Option::<i32>::from_field_value(FieldValue::Null), Some(None));
        assert_eq!(Option::<i32>::from_field_value(FieldValue::Int32(4)), Some(Some(4)));
        assert_eq!(Option::<i32>::kind(), i32::kind());
    }

    #[test]
    fn scalars_do_not_widen() {
        assert_eq!(i32::from_field_value(FieldValue::Int64(1)), None);
        assert_eq!(char::from_field_value(FieldValue::Char('z')), Some('z'));
    }

    #[test]
    fn sequences_convert_elementwise() {
        let names = vec!["a".to_string(), "b".to_string()];
        let value = names.to_field_value();
        assert_eq!(Vec::<String>::from_field_value(value), Some(names));

        let mixed = FieldValue::Sequence(vec![FieldValue::Int32(1), FieldValue::from("x")]);
        assert_eq!(Vec::<i32>::from_field_value(mixed), None);
    }

    #[test]
    fn collection_kinds() {
        assert_eq!(
            Box::<[i16]>::kind(),
            AttributeKind::Array(Box::new(AttributeKind::Scalar(ScalarKind::Int16)))
        );
        assert_eq!(
            BTreeSet::<String>::kind(),
            AttributeKind::Set(Box::new(AttributeKind::Scalar(ScalarKind::String)))
        );
        assert_eq!(Shared::<Leaf>::kind(), AttributeKind::Reference(Some("Leaf")));
        assert_eq!(ObjectRef::kind(), AttributeKind::Reference(None));
    }

    #[test]
    fn shared_reference_keeps_identity() {
        let leaf = shared(Leaf);
        let value = leaf.to_field_value();
        let back = Shared::<Leaf>::from_field_value(value).expect("same type");
        assert!(std::rc::Rc::ptr_eq(&leaf, &back));
    }
}
