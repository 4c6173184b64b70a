use std::sync::Arc;

use docgraph_schema::{AsObjectRef, FieldValue, ObjectRef, Persistable, SchemaRegistry, Shared, TypeDescriptor};
use docgraph_store::{DocumentStore, Filter, StoreError};
use docgraph_types::{DocumentId, Value};
use tracing::debug;

use crate::config::MapperConfig;
use crate::decoder::Decoder;
use crate::diagnostics::Diagnostics;
use crate::encoder::Encoder;
use crate::error::{MapperError, MapperResult};
use crate::predicate::{build_predicates, scalar_value};

/// Maps object graphs to documents of a [`DocumentStore`] and back.
///
/// Every public call is one synchronous traversal. Deferred cycle patches
/// are applied after the traversal finishes, in the order they were found.
pub struct DocumentMapper {
    store: Arc<dyn DocumentStore>,
    registry: Arc<SchemaRegistry>,
    config: MapperConfig,
    diagnostics: Diagnostics,
}

impl DocumentMapper {
    pub fn new(store: Arc<dyn DocumentStore>, registry: Arc<SchemaRegistry>) -> Self {
        Self::with_config(store, registry, MapperConfig::default())
    }

    pub fn with_config(
        store: Arc<dyn DocumentStore>,
        registry: Arc<SchemaRegistry>,
        config: MapperConfig,
    ) -> Self {
        let diagnostics = Diagnostics::with_capacity(config.record_diagnostics, config.max_diagnostics);
        Self {
            store,
            registry,
            config,
            diagnostics,
        }
    }

    pub fn backend(&self) -> &dyn DocumentStore {
        self.store.as_ref()
    }

    pub fn registry(&self) -> &SchemaRegistry {
        &self.registry
    }

    pub fn config(&self) -> &MapperConfig {
        &self.config
    }

    /// Attribute access failures seen so far.
    pub fn diagnostics(&self) -> &Diagnostics {
        &self.diagnostics
    }

    // -----------------------------------------------------------------------
    // Store
    // -----------------------------------------------------------------------

    /// Store `instance` and every object reachable from it.
    ///
    /// An instance whose predicates match a stored document replaces it
    /// and keeps its identity; otherwise a new document is inserted. The
    /// match and the replace are separate store calls, so two concurrent
    /// stores of equal objects can both insert.
    pub fn store(&self, instance: &impl AsObjectRef) -> MapperResult<DocumentId> {
        let root = instance.object_ref();
        let mut encoder = Encoder::new(self);
        let id = encoder.encode(&root)?;
        encoder.drain()?;
        debug!(type_name = root.type_name(), id = %id, "graph stored");
        Ok(id)
    }

    // -----------------------------------------------------------------------
    // Decode
    // -----------------------------------------------------------------------

    /// Decode document `id` as `T`.
    ///
    /// Fails with [`MapperError::UnexpectedType`] when the stored type tag
    /// names a subtype; use [`decode_ref`](Self::decode_ref) for
    /// polymorphic reads.
    pub fn decode_to<T: Persistable>(&self, id: DocumentId) -> MapperResult<Shared<T>> {
        let instance = self.decode_ref(T::TYPE_NAME, id)?;
        typed::<T>(&instance)
    }

    /// Decode document `id` of `type_name`'s collection as whatever type
    /// its tag names.
    pub fn decode_ref(&self, type_name: &str, id: DocumentId) -> MapperResult<ObjectRef> {
        let declared = self.persistable(type_name)?;
        let mut decoder = Decoder::new(self);
        let instance = decoder.decode(declared, id)?;
        decoder.drain();
        Ok(instance)
    }

    /// Decode every `T` document of `T`'s collection, in collection order.
    ///
    /// Documents tagged with another type sharing the collection, such as
    /// a subtype, are skipped; [`decode_all_refs`](Self::decode_all_refs)
    /// returns them too.
    pub fn decode_all<T: Persistable>(&self) -> MapperResult<Vec<Shared<T>>> {
        self.decode_all_except::<T>(&[])
    }

    /// Like [`decode_all`](Self::decode_all), skipping `exclusions`.
    pub fn decode_all_except<T: Persistable>(
        &self,
        exclusions: &[DocumentId],
    ) -> MapperResult<Vec<Shared<T>>> {
        self.collection_ids::<T>()?
            .into_iter()
            .filter(|id| !exclusions.contains(id))
            .map(|id| self.decode_to::<T>(id))
            .collect()
    }

    /// Decode every document of `type_name`'s collection as whatever type
    /// its tag names, in collection order.
    pub fn decode_all_refs(&self, type_name: &str) -> MapperResult<Vec<ObjectRef>> {
        self.all_ids(type_name)?
            .into_iter()
            .map(|id| self.decode_ref(type_name, id))
            .collect()
    }

    /// Decode the first document of `T`'s collection matching `filters`.
    ///
    /// Object values are replaced by their stored identity first; if one
    /// cannot be located the whole lookup is `NotFound`.
    pub fn decode_from_filters<T: Persistable>(
        &self,
        filters: &[(&str, FieldValue)],
    ) -> MapperResult<Shared<T>> {
        let descriptor = self.persistable(T::TYPE_NAME)?;
        let collection = descriptor.collection().unwrap_or_default();
        let mut filter = Filter::new();
        for (key, value) in filters {
            filter.push(*key, self.filter_value(value)?);
        }
        let document = self
            .store
            .find_one(collection, &filter)?
            .ok_or_else(|| MapperError::NotFound {
                collection: collection.to_string(),
                id: None,
            })?;
        let id = document.id().ok_or_else(|| StoreError::MissingId {
            collection: collection.to_string(),
        })?;
        self.decode_to::<T>(id)
    }

    fn filter_value(&self, value: &FieldValue) -> MapperResult<Value> {
        match value {
            FieldValue::Object(target) => {
                let id = self.identity_of(target)?.ok_or_else(|| MapperError::NotFound {
                    collection: self
                        .registry
                        .collection_of(target.type_name())
                        .unwrap_or_default()
                        .to_string(),
                    id: None,
                })?;
                Ok(Value::Id(id))
            }
            FieldValue::Sequence(items) => items
                .iter()
                .map(|item| self.filter_value(item))
                .collect::<MapperResult<Vec<_>>>()
                .map(Value::Array),
            scalar => Ok(scalar_value(scalar).unwrap_or(Value::Null)),
        }
    }

    // -----------------------------------------------------------------------
    // Identity
    // -----------------------------------------------------------------------

    /// The equality predicates of `instance`. Empty for unknown types.
    pub fn predicates_of(&self, instance: &impl AsObjectRef) -> Filter {
        let instance = instance.object_ref();
        match self.registry.get(instance.type_name()) {
            Some(descriptor) => build_predicates(descriptor, &instance, &self.diagnostics),
            None => Filter::new(),
        }
    }

    /// Stored identity of `instance`, located through its predicates.
    ///
    /// `None` when the type is not persistable, has no predicates, or no
    /// stored document matches.
    pub fn identity_of(&self, instance: &impl AsObjectRef) -> MapperResult<Option<DocumentId>> {
        let instance = instance.object_ref();
        let Some(descriptor) = self
            .registry
            .get(instance.type_name())
            .filter(|d| d.is_persistable())
        else {
            return Ok(None);
        };
        let filter = build_predicates(descriptor, &instance, &self.diagnostics);
        if filter.is_empty() {
            return Ok(None);
        }
        let collection = descriptor.collection().unwrap_or_default();
        Ok(self
            .store
            .find_one(collection, &filter)?
            .and_then(|d| d.id()))
    }

    /// Whether both instances denote the same stored document: same type
    /// and equal, non-empty predicates.
    pub fn store_equal(&self, a: &impl AsObjectRef, b: &impl AsObjectRef) -> bool {
        let (a, b) = (a.object_ref(), b.object_ref());
        if a.type_name() != b.type_name() {
            return false;
        }
        let left = self.predicates_of(&a);
        !left.is_empty() && left == self.predicates_of(&b)
    }

    // -----------------------------------------------------------------------
    // Collections
    // -----------------------------------------------------------------------

    /// Identities of the `T` documents in `T`'s collection, in order.
    ///
    /// A tagged document counts when its tag names `T`. An untagged one
    /// counts when `T` writes no tag.
    pub fn collection_ids<T: Persistable>(&self) -> MapperResult<Vec<DocumentId>> {
        let descriptor = self.persistable(T::TYPE_NAME)?;
        let collection = descriptor.collection().unwrap_or_default();
        let untagged = !descriptor.requires_type_tag();
        let tag_key = self.config.type_tag_key.as_str();
        Ok(self
            .store
            .find_all(collection)?
            .filter(|d| match d.get_str(tag_key) {
                Some(tag) => tag == T::TYPE_NAME,
                None => untagged,
            })
            .filter_map(|d| d.id())
            .collect())
    }

    /// Identities of every document in `type_name`'s collection, in order.
    pub fn all_ids(&self, type_name: &str) -> MapperResult<Vec<DocumentId>> {
        let collection = self.persistable(type_name)?.collection().unwrap_or_default();
        Ok(self
            .store
            .find_all(collection)?
            .filter_map(|d| d.id())
            .collect())
    }

    /// Number of documents in `T`'s collection, other types sharing it
    /// included.
    pub fn count_of<T: Persistable>(&self, estimated: bool) -> MapperResult<u64> {
        let collection = self.persistable(T::TYPE_NAME)?.collection().unwrap_or_default();
        let count = if estimated {
            self.store.estimated_count(collection)?
        } else {
            self.store.count(collection)?
        };
        Ok(count)
    }

    fn persistable(&self, type_name: &str) -> MapperResult<&TypeDescriptor> {
        self.registry
            .get(type_name)
            .filter(|d| d.is_persistable())
            .ok_or_else(|| MapperError::NotPersistable {
                type_name: type_name.to_string(),
            })
    }
}

fn typed<T: Persistable>(instance: &ObjectRef) -> MapperResult<Shared<T>> {
    instance.downcast::<T>().ok_or(MapperError::UnexpectedType {
        expected: T::TYPE_NAME,
        found: instance.type_name(),
    })
}

impl std::fmt::Debug for DocumentMapper {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DocumentMapper")
            .field("registry", &self.registry)
            .field("config", &self.config)
            .field("diagnostics", &self.diagnostics.len())
            .finish()
    }
}
