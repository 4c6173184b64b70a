//! In-memory attribute values and declared attribute kinds.

use std::fmt;

use docgraph_types::DocumentId;

use crate::object::ObjectRef;

/// Declared width of a scalar attribute.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ScalarKind {
    Bool,
    Int16,
    Int32,
    Int64,
    Float32,
    Float64,
    Char,
    String,
    Id,
}

impl fmt::Display for ScalarKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Bool => "bool",
            Self::Int16 => "int16",
            Self::Int32 => "int32",
            Self::Int64 => "int64",
            Self::Float32 => "float32",
            Self::Float64 => "float64",
            Self::Char => "char",
            Self::String => "string",
            Self::Id => "id",
        };
        write!(f, "{name}")
    }
}

/// Declared kind of an attribute.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum AttributeKind {
    /// Primitive scalar of the given width.
    Scalar(ScalarKind),
    /// Enumerated value; holds the enumerator labels.
    Enum(Vec<&'static str>),
    /// Nested persistable object of the declared type. `None` means any
    /// persistable type, resolved through the polymorphic tag.
    Reference(Option<&'static str>),
    /// Ordered sequence.
    Sequence(Box<AttributeKind>),
    /// Unordered set.
    Set(Box<AttributeKind>),
    /// Fixed-size array.
    Array(Box<AttributeKind>),
}

impl AttributeKind {
    pub fn is_scalar(&self) -> bool {
        matches!(self, Self::Scalar(_))
    }

    /// Element kind of a sequence, set, or array.
    pub fn element(&self) -> Option<&AttributeKind> {
        match self {
            Self::Sequence(e) | Self::Set(e) | Self::Array(e) => Some(e),
            _ => None,
        }
    }

    /// Replace an undeclared reference target, including inside
    /// collections, with `type_name`.
    pub(crate) fn declare(self, type_name: &'static str) -> Self {
        match self {
            Self::Reference(None) => Self::Reference(Some(type_name)),
            Self::Sequence(e) => Self::Sequence(Box::new(e.declare(type_name))),
            Self::Set(e) => Self::Set(Box::new(e.declare(type_name))),
            Self::Array(e) => Self::Array(Box::new(e.declare(type_name))),
            other => other,
        }
    }
}

impl fmt::Display for AttributeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Scalar(k) => write!(f, "{k}"),
            Self::Enum(_) => write!(f, "enum"),
            Self::Reference(Some(name)) => write!(f, "ref<{name}>"),
            Self::Reference(None) => write!(f, "ref<*>"),
            Self::Sequence(e) => write!(f, "seq<{e}>"),
            Self::Set(e) => write!(f, "set<{e}>"),
            Self::Array(e) => write!(f, "array<{e}>"),
        }
    }
}

/// A live attribute value read from, or assigned to, an instance.
#[derive(Clone, Debug, PartialEq)]
pub enum FieldValue {
    Null,
    Bool(bool),
    Int16(i16),
    Int32(i32),
    Int64(i64),
    Float32(f32),
    Float64(f64),
    Char(char),
    String(String),
    Id(DocumentId),
    /// Enumerator label.
    Enum(String),
    /// Nested instance, compared by reference identity.
    Object(ObjectRef),
    /// Elements of a sequence, set, or array.
    Sequence(Vec<FieldValue>),
}

impl FieldValue {
    /// Short name of the variant, for diagnostics.
    pub fn variant_name(&self) -> &'static str {
        match self {
            Self::Null => "null",
            Self::Bool(_) => "bool",
            Self::Int16(_) => "int16",
            Self::Int32(_) => "int32",
            Self::Int64(_) => "int64",
            Self::Float32(_) => "float32",
            Self::Float64(_) => "float64",
            Self::Char(_) => "char",
            Self::String(_) => "string",
            Self::Id(_) => "id",
            Self::Enum(_) => "enum",
            Self::Object(_) => "object",
            Self::Sequence(_) => "sequence",
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    /// Whether this is a primitive scalar (not enum, object, or sequence).
    pub fn is_scalar(&self) -> bool {
        matches!(
            self,
            Self::Bool(_)
                | Self::Int16(_)
                | Self::Int32(_)
                | Self::Int64(_)
                | Self::Float32(_)
                | Self::Float64(_)
                | Self::Char(_)
                | Self::String(_)
                | Self::Id(_)
        )
    }

    pub fn as_object(&self) -> Option<&ObjectRef> {
        match self {
            Self::Object(o) => Some(o),
            _ => None,
        }
    }
}

impl From<bool> for FieldValue {
    fn from(v: bool) -> Self {
        Self::Bool(v)
    }
}

impl From<i32> for FieldValue {
    fn from(v: i32) -> Self {
        Self::Int32(v)
    }
}

impl From<i64> for FieldValue {
    fn from(v: i64) -> Self {
        Self::Int64(v)
    }
}

impl From<f64> for FieldValue {
    fn from(v: f64) -> Self {
        Self::Float64(v)
    }
}

impl From<&str> for FieldValue {
    fn from(v: &str) -> Self {
        Self::String(v.to_string())
    }
}

impl From<String> for FieldValue {
    fn from(v: String) -> Self {
        Self::String(v)
    }
}

impl From<ObjectRef> for FieldValue {
    fn from(v: ObjectRef) -> Self {
        Self::Object(v)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kind_display() {
        let kind = AttributeKind::Sequence(Box::new(AttributeKind::Reference(Some("Person"))));
        assert_eq!(kind.to_string(), "seq<ref<Person>>");
        assert_eq!(AttributeKind::Scalar(ScalarKind::Int16).to_string(), "int16");
    }

    #[test]
    fn declare_reaches_into_collections() {
        let kind = AttributeKind::Array(Box::new(AttributeKind::Reference(None)));
        assert_eq!(
            kind.declare("Pet"),
            AttributeKind::Array(Box::new(AttributeKind::Reference(Some("Pet"))))
        );
        let scalar = AttributeKind::Scalar(ScalarKind::Bool);
        assert_eq!(scalar.clone().declare("Pet"), scalar);
    }

    #[test]
    fn element_of_collections_only() {
        let seq = AttributeKind::Set(Box::new(AttributeKind::Scalar(ScalarKind::String)));
        assert_eq!(seq.element(), Some(&AttributeKind::Scalar(ScalarKind::String)));
        assert_eq!(AttributeKind::Reference(None).element(), None);
    }

    #[test]
    fn scalar_classification() {
        assert!(FieldValue::from("x").is_scalar());
        assert!(FieldValue::Char('c').is_scalar());
        assert!(!FieldValue::Enum("A".into()).is_scalar());
        assert!(!FieldValue::Sequence(vec![]).is_scalar());
        assert!(!FieldValue::Null.is_scalar());
    }
}
