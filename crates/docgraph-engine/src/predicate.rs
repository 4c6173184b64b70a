//! Equality predicates and scalar value conversion.

use docgraph_schema::{FieldValue, ObjectRef, TypeDescriptor};
use docgraph_store::Filter;
use docgraph_types::Value;

use crate::diagnostics::{AccessPhase, Diagnostics};

/// Document value of a scalar or enum attribute value.
///
/// Widths collapse to what a document holds: `i16` widens to `Int32`,
/// `f32` to `Double`, `char` becomes a one-character string, an enum its
/// label. `None` for objects and sequences.
pub(crate) fn scalar_value(value: &FieldValue) -> Option<Value> {
    let converted = match value {
        FieldValue::Null => Value::Null,
        FieldValue::Bool(v) => Value::Bool(*v),
        FieldValue::Int16(v) => Value::Int32(i32::from(*v)),
        FieldValue::Int32(v) => Value::Int32(*v),
        FieldValue::Int64(v) => Value::Int64(*v),
        FieldValue::Float32(v) => Value::Double(f64::from(*v)),
        FieldValue::Float64(v) => Value::Double(*v),
        FieldValue::Char(c) => Value::String(c.to_string()),
        FieldValue::String(s) => Value::String(s.clone()),
        FieldValue::Id(id) => Value::Id(*id),
        FieldValue::Enum(label) => Value::String(label.clone()),
        FieldValue::Object(_) | FieldValue::Sequence(_) => return None,
    };
    Some(converted)
}

/// The equality predicates of `instance`.
///
/// Only persisted, identity-relevant attributes of a scalar kind take
/// part, each under its storage key, in attribute order. References and
/// collections never do, even when flagged. An empty filter means the
/// instance cannot be matched against stored documents.
pub(crate) fn build_predicates(
    descriptor: &TypeDescriptor,
    instance: &ObjectRef,
    diagnostics: &Diagnostics,
) -> Filter {
    let mut filter = Filter::new();
    for attr in descriptor.persisted_attributes() {
        if !attr.is_identity_relevant() || !attr.kind().is_scalar() {
            continue;
        }
        match instance.get(attr) {
            Ok(value) => {
                if let Some(v) = scalar_value(&value) {
                    filter.push(attr.storage_key(), v);
                }
            }
            Err(e) => diagnostics.report(descriptor.name(), attr.name(), AccessPhase::Predicate, e),
        }
    }
    filter
}
