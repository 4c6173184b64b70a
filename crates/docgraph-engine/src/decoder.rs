//! Graph decoder: documents to instance graph.

use std::collections::{HashMap, HashSet};

use docgraph_schema::{AttributeDescriptor, AttributeKind, FieldValue, ObjectRef, ScalarKind, TypeDescriptor};
use docgraph_types::{Document, DocumentId, Value};
use tracing::debug;

use crate::diagnostics::AccessPhase;
use crate::error::{MapperError, MapperResult};
use crate::mapper::DocumentMapper;

/// A decoded value, or the part of it still waiting on an instance under
/// construction further up the path.
enum Slot {
    Ready(FieldValue),
    Awaiting(DocumentId),
    Nested(Vec<Slot>),
    /// Nothing to assign; the attribute keeps its default.
    Unset,
}

impl Slot {
    fn is_ready(&self) -> bool {
        matches!(self, Self::Ready(_))
    }

    /// Resolve against the finished instances. `None` if any awaited
    /// identity never finished.
    fn fill(self, instances: &HashMap<DocumentId, ObjectRef>) -> Option<FieldValue> {
        match self {
            Self::Ready(v) => Some(v),
            Self::Unset => Some(FieldValue::Null),
            Self::Awaiting(id) => instances.get(&id).cloned().map(FieldValue::Object),
            Self::Nested(slots) => slots
                .into_iter()
                .map(|s| s.fill(instances))
                .collect::<Option<Vec<_>>>()
                .map(FieldValue::Sequence),
        }
    }
}

struct DeferredAssign {
    instance: ObjectRef,
    type_name: &'static str,
    attribute: AttributeDescriptor,
    slot: Slot,
}

/// State of one top-level decode call.
pub(crate) struct Decoder<'m> {
    mapper: &'m DocumentMapper,
    /// Identities on the current path.
    seen: HashSet<DocumentId>,
    /// Finished instances, shared by every reference to the same identity.
    instances: HashMap<DocumentId, ObjectRef>,
    deferred: Vec<DeferredAssign>,
}

impl<'m> Decoder<'m> {
    pub(crate) fn new(mapper: &'m DocumentMapper) -> Self {
        Self {
            mapper,
            seen: HashSet::new(),
            instances: HashMap::new(),
            deferred: Vec::new(),
        }
    }

    /// Decode the document `id` of `declared`'s collection.
    ///
    /// The stored type tag, when present, picks the concrete type.
    pub(crate) fn decode(&mut self, declared: &TypeDescriptor, id: DocumentId) -> MapperResult<ObjectRef> {
        if let Some(existing) = self.instances.get(&id) {
            return Ok(existing.clone());
        }
        let mapper = self.mapper;
        let collection = declared
            .collection()
            .filter(|_| declared.is_persistable())
            .ok_or_else(|| MapperError::NotPersistable {
                type_name: declared.name().to_string(),
            })?;
        let document = mapper
            .backend()
            .find_by_id(collection, &id)?
            .ok_or_else(|| MapperError::NotFound {
                collection: collection.to_string(),
                id: Some(id),
            })?;

        let concrete = match document.get_str(&mapper.config().type_tag_key) {
            Some(tag) => mapper
                .registry()
                .get(tag)
                .ok_or_else(|| MapperError::UnknownType(tag.to_string()))?,
            None => declared,
        };
        if !concrete.is_a(declared.name()) {
            return Err(MapperError::UnexpectedType {
                expected: declared.name(),
                found: concrete.name(),
            });
        }
        let instance = concrete
            .construct()
            .ok_or_else(|| MapperError::NoDefaultConstructor(concrete.name().to_string()))?;

        self.seen.insert(id);
        let assigned = self.assign_all(&instance, concrete, &document);
        self.seen.remove(&id);
        assigned?;

        debug!(type_name = concrete.name(), collection, id = %id, "document decoded");
        self.instances.insert(id, instance.clone());
        Ok(instance)
    }

    fn assign_all(
        &mut self,
        instance: &ObjectRef,
        concrete: &TypeDescriptor,
        document: &Document,
    ) -> MapperResult<()> {
        for attr in concrete.persisted_attributes() {
            let Some(stored) = document.get(attr.storage_key()) else {
                continue;
            };
            match self.resolve(stored, attr.kind())? {
                Slot::Unset => {}
                Slot::Ready(value) => self.assign(instance, concrete.name(), attr, value),
                slot => self.deferred.push(DeferredAssign {
                    instance: instance.clone(),
                    type_name: concrete.name(),
                    attribute: attr.clone(),
                    slot,
                }),
            }
        }
        Ok(())
    }

    fn resolve(&mut self, stored: &Value, kind: &AttributeKind) -> MapperResult<Slot> {
        if stored.is_null() {
            return Ok(Slot::Unset);
        }
        let slot = match kind {
            AttributeKind::Scalar(scalar) => Slot::Ready(narrow(stored, *scalar)),
            AttributeKind::Enum(labels) => match stored.as_str() {
                Some(label) if labels.iter().any(|l| *l == label) => Slot::Ready(FieldValue::Enum(label.to_string())),
                _ => Slot::Unset,
            },
            AttributeKind::Reference(declared) => match stored.as_id() {
                Some(id) => self.resolve_reference(*declared, id)?,
                None => Slot::Unset,
            },
            AttributeKind::Sequence(element) | AttributeKind::Set(element) | AttributeKind::Array(element) => {
                let Some(items) = stored.as_array() else {
                    return Ok(Slot::Unset);
                };
                let mut slots = Vec::with_capacity(items.len());
                for item in items {
                    let slot = match self.resolve(item, element)? {
                        Slot::Unset => Slot::Ready(FieldValue::Null),
                        other => other,
                    };
                    slots.push(slot);
                }
                if slots.iter().all(Slot::is_ready) {
                    let values = slots
                        .into_iter()
                        .filter_map(|s| match s {
                            Slot::Ready(v) => Some(v),
                            _ => None,
                        })
                        .collect();
                    Slot::Ready(FieldValue::Sequence(values))
                } else {
                    Slot::Nested(slots)
                }
            }
        };
        Ok(slot)
    }

    fn resolve_reference(&mut self, declared: Option<&'static str>, id: DocumentId) -> MapperResult<Slot> {
        if let Some(existing) = self.instances.get(&id) {
            return Ok(Slot::Ready(FieldValue::Object(existing.clone())));
        }
        if self.seen.contains(&id) {
            return Ok(Slot::Awaiting(id));
        }
        let Some(declared) = declared else {
            debug!(id = %id, "reference without a declared type left unset");
            return Ok(Slot::Unset);
        };
        let mapper = self.mapper;
        let target = mapper
            .registry()
            .get(declared)
            .ok_or_else(|| MapperError::UnknownType(declared.to_string()))?;
        match self.decode(target, id) {
            Ok(instance) => Ok(Slot::Ready(FieldValue::Object(instance))),
            Err(e) if e.is_absent() => Ok(Slot::Unset),
            Err(e) => Err(e),
        }
    }

    fn assign(&self, instance: &ObjectRef, type_name: &str, attr: &AttributeDescriptor, value: FieldValue) {
        if let Err(e) = instance.set(attr, value) {
            self.mapper
                .diagnostics()
                .report(type_name, attr.name(), AccessPhase::Decode, e);
        }
    }

    /// Assign every deferred attribute, in the order they were queued.
    pub(crate) fn drain(&mut self) {
        for task in std::mem::take(&mut self.deferred) {
            match task.slot.fill(&self.instances) {
                Some(value) => self.assign(&task.instance, task.type_name, &task.attribute, value),
                None => debug!(
                    type_name = task.type_name,
                    attribute = task.attribute.name(),
                    "deferred reference never resolved; attribute left at default"
                ),
            }
        }
    }
}

/// Convert a stored value to the declared scalar width.
///
/// Numbers convert with `as` semantics, so out-of-range values wrap or
/// saturate. A value of the wrong shape is passed through unchanged and
/// rejected by the attribute's setter.
fn narrow(stored: &Value, kind: ScalarKind) -> FieldValue {
    match (kind, stored) {
        (ScalarKind::Bool, Value::Bool(v)) => FieldValue::Bool(*v),
        (ScalarKind::Int16, Value::Int32(v)) => FieldValue::Int16(*v as i16),
        (ScalarKind::Int16, Value::Int64(v)) => FieldValue::Int16(*v as i16),
        (ScalarKind::Int16, Value::Double(v)) => FieldValue::Int16(*v as i16),
        (ScalarKind::Int32, Value::Int32(v)) => FieldValue::Int32(*v),
        (ScalarKind::Int32, Value::Int64(v)) => FieldValue::Int32(*v as i32),
        (ScalarKind::Int32, Value::Double(v)) => FieldValue::Int32(*v as i32),
        (ScalarKind::Int64, Value::Int32(v)) => FieldValue::Int64(i64::from(*v)),
        (ScalarKind::Int64, Value::Int64(v)) => FieldValue::Int64(*v),
        (ScalarKind::Int64, Value::Double(v)) => FieldValue::Int64(*v as i64),
        (ScalarKind::Float32, Value::Int32(v)) => FieldValue::Float32(*v as f32),
        (ScalarKind::Float32, Value::Int64(v)) => FieldValue::Float32(*v as f32),
        (ScalarKind::Float32, Value::Double(v)) => FieldValue::Float32(*v as f32),
        (ScalarKind::Float64, Value::Int32(v)) => FieldValue::Float64(f64::from(*v)),
        (ScalarKind::Float64, Value::Int64(v)) => FieldValue::Float64(*v as f64),
        (ScalarKind::Float64, Value::Double(v)) => FieldValue::Float64(*v),
        (ScalarKind::Char, Value::String(s)) if s.chars().count() == 1 => match s.chars().next() {
            Some(c) => FieldValue::Char(c),
            None => FieldValue::String(s.clone()),
        },
        (ScalarKind::String, Value::String(s)) => FieldValue::String(s.clone()),
        (ScalarKind::Id, Value::Id(id)) => FieldValue::Id(*id),
        (_, other) => raw(other),
    }
}

fn raw(stored: &Value) -> FieldValue {
    match stored {
        Value::Null | Value::Document(_) => FieldValue::Null,
        Value::Bool(v) => FieldValue::Bool(*v),
        Value::Int32(v) => FieldValue::Int32(*v),
        Value::Int64(v) => FieldValue::Int64(*v),
        Value::Double(v) => FieldValue::Float64(*v),
        Value::String(s) => FieldValue::String(s.clone()),
        Value::Id(id) => FieldValue::Id(*id),
        Value::Array(items) => FieldValue::Sequence(items.iter().map(raw).collect()),
    }
}
