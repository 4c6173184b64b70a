//! Graph encoder: instance graph to documents.

use docgraph_schema::{AttributeKind, FieldValue, ObjectRef, ScalarKind, TypeDescriptor};
use docgraph_types::{Document, DocumentId, Value};
use tracing::debug;

use crate::diagnostics::AccessPhase;
use crate::error::{EncodeError, MapperError, MapperResult};
use crate::mapper::DocumentMapper;
use crate::predicate::{build_predicates, scalar_value};

/// A reference back into the current path, written once both ends are
/// stored.
struct DeferredLink {
    parent: ObjectRef,
    collection: String,
    key: String,
    /// Element indices inside the value at `key`; empty for the key itself.
    position: Vec<usize>,
    target: ObjectRef,
}

/// Where a value being encoded will land.
struct Site<'a> {
    owner: &'a ObjectRef,
    type_name: &'static str,
    collection: &'a str,
    attribute: &'a str,
    key: &'a str,
}

/// State of one top-level `store` call.
pub(crate) struct Encoder<'m> {
    mapper: &'m DocumentMapper,
    path: Vec<ObjectRef>,
    deferred: Vec<DeferredLink>,
}

impl<'m> Encoder<'m> {
    pub(crate) fn new(mapper: &'m DocumentMapper) -> Self {
        Self {
            mapper,
            path: Vec::new(),
            deferred: Vec::new(),
        }
    }

    /// Store `instance` and everything reachable from it.
    pub(crate) fn encode(&mut self, instance: &ObjectRef) -> MapperResult<DocumentId> {
        let mapper = self.mapper;
        let descriptor = mapper
            .registry()
            .get(instance.type_name())
            .filter(|d| d.is_persistable())
            .ok_or_else(|| MapperError::NotPersistable {
                type_name: instance.type_name().to_string(),
            })?;
        mapper.config().check_type(descriptor)?;
        let collection = descriptor.collection().unwrap_or_default();

        self.path.push(instance.clone());
        let built = self.build_document(instance, descriptor, collection);
        self.path.pop();
        let mut document = built?;

        if descriptor.requires_type_tag() {
            document.insert(mapper.config().type_tag_key.as_str(), descriptor.name());
        }
        self.upsert(instance, descriptor, collection, document)
    }

    fn build_document(
        &mut self,
        instance: &ObjectRef,
        descriptor: &TypeDescriptor,
        collection: &str,
    ) -> MapperResult<Document> {
        let mut document = Document::new();
        for attr in descriptor.persisted_attributes() {
            let value = match instance.get(attr) {
                Ok(v) => v,
                Err(e) => {
                    self.mapper
                        .diagnostics()
                        .report(descriptor.name(), attr.name(), AccessPhase::Encode, e);
                    continue;
                }
            };
            let site = Site {
                owner: instance,
                type_name: descriptor.name(),
                collection,
                attribute: attr.name(),
                key: attr.storage_key(),
            };
            let stored = self.encode_value(&site, &mut Vec::new(), value, attr.kind())?;
            document.insert(attr.storage_key(), stored);
        }
        Ok(document)
    }

    fn encode_value(
        &mut self,
        site: &Site<'_>,
        position: &mut Vec<usize>,
        value: FieldValue,
        kind: &AttributeKind,
    ) -> MapperResult<Value> {
        if value.is_null() {
            return Ok(Value::Null);
        }
        if !fits(&value, kind) {
            return Err(MapperError::StoreFailure {
                type_name: site.type_name.to_string(),
                attribute: site.attribute.to_string(),
                cause: EncodeError {
                    expected: kind.to_string(),
                    found: value.variant_name(),
                },
            });
        }
        match value {
            FieldValue::Object(target) => {
                if self.path.iter().any(|p| p.ptr_eq(&target)) {
                    debug!(
                        type_name = site.type_name,
                        key = site.key,
                        target = target.type_name(),
                        "cyclic reference deferred"
                    );
                    self.deferred.push(DeferredLink {
                        parent: site.owner.clone(),
                        collection: site.collection.to_string(),
                        key: site.key.to_string(),
                        position: position.clone(),
                        target,
                    });
                    return Ok(Value::Null);
                }
                match self.encode(&target) {
                    Ok(id) => Ok(Value::Id(id)),
                    Err(e) if e.is_absent() => Ok(Value::Null),
                    Err(e) => Err(e),
                }
            }
            FieldValue::Sequence(items) => {
                let element = kind.element().unwrap_or(kind);
                let mut out = Vec::with_capacity(items.len());
                for (i, item) in items.into_iter().enumerate() {
                    position.push(i);
                    let stored = self.encode_value(site, position, item, element);
                    position.pop();
                    out.push(stored?);
                }
                Ok(Value::Array(out))
            }
            scalar => Ok(scalar_value(&scalar).unwrap_or(Value::Null)),
        }
    }

    /// Replace the document matching the instance's predicates, or insert.
    fn upsert(
        &self,
        instance: &ObjectRef,
        descriptor: &TypeDescriptor,
        collection: &str,
        document: Document,
    ) -> MapperResult<DocumentId> {
        let store = self.mapper.backend();
        let filter = build_predicates(descriptor, instance, self.mapper.diagnostics());
        if !filter.is_empty() {
            if let Some(previous) = store.find_one_and_replace(collection, &filter, document.clone())? {
                if let Some(id) = previous.id() {
                    debug!(type_name = descriptor.name(), collection, id = %id, "document replaced");
                    return Ok(id);
                }
            }
        }
        let id = store.insert_one(collection, document)?;
        debug!(type_name = descriptor.name(), collection, id = %id, "document inserted");
        Ok(id)
    }

    /// Write every deferred link, in the order they were found.
    ///
    /// Both ends are located again through their predicates. A link whose
    /// parent or target cannot be located is dropped.
    pub(crate) fn drain(&mut self) -> MapperResult<()> {
        let mapper = self.mapper;
        let store = mapper.backend();
        for link in std::mem::take(&mut self.deferred) {
            let parent = mapper.identity_of(&link.parent)?;
            let target = mapper.identity_of(&link.target)?;
            let (Some(parent_id), Some(target_id)) = (parent, target) else {
                debug!(collection = %link.collection, key = %link.key, "deferred link unresolved; skipped");
                continue;
            };

            if link.position.is_empty() {
                store.update_field(&link.collection, &parent_id, &link.key, Value::Id(target_id))?;
            } else {
                let Some(mut document) = store.find_by_id(&link.collection, &parent_id)? else {
                    continue;
                };
                let Some(slot) = document.get_mut(&link.key) else {
                    continue;
                };
                if !replace_at(slot, &link.position, Value::Id(target_id)) {
                    continue;
                }
                let patched = slot.clone();
                store.update_field(&link.collection, &parent_id, &link.key, patched)?;
            }
            debug!(
                collection = %link.collection,
                key = %link.key,
                parent = %parent_id,
                target = %target_id,
                "deferred link written"
            );
        }
        Ok(())
    }
}

/// Whether a non-null value has the shape `kind` declares.
fn fits(value: &FieldValue, kind: &AttributeKind) -> bool {
    match kind {
        AttributeKind::Scalar(scalar) => matches!(
            (scalar, value),
            (ScalarKind::Bool, FieldValue::Bool(_))
                | (ScalarKind::Int16, FieldValue::Int16(_))
                | (ScalarKind::Int32, FieldValue::Int32(_))
                | (ScalarKind::Int64, FieldValue::Int64(_))
                | (ScalarKind::Float32, FieldValue::Float32(_))
                | (ScalarKind::Float64, FieldValue::Float64(_))
                | (ScalarKind::Char, FieldValue::Char(_))
                | (ScalarKind::String, FieldValue::String(_))
                | (ScalarKind::Id, FieldValue::Id(_))
        ),
        AttributeKind::Enum(_) => matches!(value, FieldValue::Enum(_)),
        AttributeKind::Reference(_) => matches!(value, FieldValue::Object(_)),
        AttributeKind::Sequence(_) | AttributeKind::Set(_) | AttributeKind::Array(_) => {
            matches!(value, FieldValue::Sequence(_))
        }
    }
}

fn replace_at(slot: &mut Value, position: &[usize], replacement: Value) -> bool {
    match position.split_first() {
        None => {
            *slot = replacement;
            true
        }
        Some((index, rest)) => match slot {
            Value::Array(items) => items
                .get_mut(*index)
                .is_some_and(|item| replace_at(item, rest, replacement)),
            _ => false,
        },
    }
}
