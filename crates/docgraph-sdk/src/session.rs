use std::fmt;
use std::sync::Arc;

use docgraph_engine::{Diagnostics, DocumentMapper, MapperConfig};
use docgraph_schema::{AsObjectRef, FieldValue, ObjectRef, Persistable, SchemaError, SchemaRegistry, Shared};
use docgraph_store::{DocumentStore, InMemoryDocumentStore};
use docgraph_types::DocumentId;
use docgraph_view::CollectionView;
use tracing::debug;

use crate::error::{SdkError, SdkResult};

/// Builder for a [`Docgraph`] session.
///
/// Registration errors are kept until [`build`](Self::build) so calls can
/// be chained.
pub struct DocgraphBuilder {
    backend: Option<Arc<dyn DocumentStore>>,
    config: MapperConfig,
    registry: SchemaRegistry,
    pending: Option<SchemaError>,
}

impl DocgraphBuilder {
    fn new() -> Self {
        Self {
            backend: None,
            config: MapperConfig::default(),
            registry: SchemaRegistry::new(),
            pending: None,
        }
    }

    /// Document store to map against. Defaults to a fresh in-memory store.
    pub fn backend(mut self, store: Arc<dyn DocumentStore>) -> Self {
        self.backend = Some(store);
        self
    }

    pub fn config(mut self, config: MapperConfig) -> Self {
        self.config = config;
        self
    }

    /// Parse the mapper configuration from TOML text.
    pub fn config_toml(mut self, text: &str) -> SdkResult<Self> {
        self.config = MapperConfig::from_toml_str(text)?;
        Ok(self)
    }

    /// Register `T` and its ancestors.
    pub fn register<T: Persistable>(mut self) -> Self {
        if self.pending.is_none() {
            self.pending = self.registry.register::<T>().err();
        }
        self
    }

    /// Register an abstraction that types name with `implements`.
    pub fn register_abstract(mut self, name: &'static str, collection: Option<&str>) -> Self {
        if self.pending.is_none() {
            self.pending = self
                .registry
                .register_abstract(name, collection.map(str::to_string))
                .err();
        }
        self
    }

    pub fn build(self) -> SdkResult<Docgraph> {
        if let Some(e) = self.pending {
            return Err(SdkError::Schema(e));
        }
        self.config.validate()?;
        self.config.check_schema(&self.registry)?;
        let store = self
            .backend
            .unwrap_or_else(|| Arc::new(InMemoryDocumentStore::new()));
        debug!(
            types = self.registry.len(),
            type_tag_key = %self.config.type_tag_key,
            "docgraph session ready"
        );
        Ok(Docgraph {
            mapper: DocumentMapper::with_config(store, Arc::new(self.registry), self.config),
        })
    }
}

impl fmt::Debug for DocgraphBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DocgraphBuilder")
            .field("has_backend", &self.backend.is_some())
            .field("config", &self.config)
            .field("types", &self.registry.type_names())
            .field("pending", &self.pending)
            .finish()
    }
}

/// High-level docgraph session.
pub struct Docgraph {
    mapper: DocumentMapper,
}

impl Docgraph {
    pub fn builder() -> DocgraphBuilder {
        DocgraphBuilder::new()
    }

    /// A session over a fresh in-memory store with default configuration.
    pub fn in_memory(registry: SchemaRegistry) -> Self {
        Self {
            mapper: DocumentMapper::new(Arc::new(InMemoryDocumentStore::new()), Arc::new(registry)),
        }
    }

    pub fn mapper(&self) -> &DocumentMapper {
        &self.mapper
    }

    pub fn registry(&self) -> &SchemaRegistry {
        self.mapper.registry()
    }

    pub fn diagnostics(&self) -> &Diagnostics {
        self.mapper.diagnostics()
    }

    // ---- Graph operations ----

    /// Store `instance` and everything reachable from it.
    pub fn store(&self, instance: &impl AsObjectRef) -> SdkResult<DocumentId> {
        Ok(self.mapper.store(instance)?)
    }

    pub fn decode_to<T: Persistable>(&self, id: DocumentId) -> SdkResult<Shared<T>> {
        Ok(self.mapper.decode_to::<T>(id)?)
    }

    /// Decode as whatever concrete type the stored tag names.
    pub fn decode_ref(&self, type_name: &str, id: DocumentId) -> SdkResult<ObjectRef> {
        Ok(self.mapper.decode_ref(type_name, id)?)
    }

    /// Every stored `T`; documents tagged with a subtype are skipped.
    pub fn decode_all<T: Persistable>(&self) -> SdkResult<Vec<Shared<T>>> {
        Ok(self.mapper.decode_all::<T>()?)
    }

    /// Every document of `type_name`'s collection, each decoded as the
    /// type its tag names.
    pub fn decode_all_refs(&self, type_name: &str) -> SdkResult<Vec<ObjectRef>> {
        Ok(self.mapper.decode_all_refs(type_name)?)
    }

    pub fn decode_from_filters<T: Persistable>(&self, filters: &[(&str, FieldValue)]) -> SdkResult<Shared<T>> {
        Ok(self.mapper.decode_from_filters::<T>(filters)?)
    }

    // ---- Identity ----

    pub fn identity_of(&self, instance: &impl AsObjectRef) -> SdkResult<Option<DocumentId>> {
        Ok(self.mapper.identity_of(instance)?)
    }

    pub fn store_equal(&self, a: &impl AsObjectRef, b: &impl AsObjectRef) -> bool {
        self.mapper.store_equal(a, b)
    }

    /// Exact number of documents in `T`'s collection, subtypes included.
    pub fn count<T: Persistable>(&self) -> SdkResult<u64> {
        Ok(self.mapper.count_of::<T>(false)?)
    }

    // ---- Views ----

    /// Every stored `T`, decoded now.
    pub fn eager_view<T: Persistable>(&self) -> SdkResult<CollectionView<'_, T>> {
        Ok(CollectionView::eager_full(&self.mapper)?)
    }

    /// Every stored `T`, decoded on access.
    pub fn lazy_view<T: Persistable>(&self) -> CollectionView<'_, T> {
        CollectionView::lazy_full(&self.mapper)
    }

    pub fn empty_eager_view<T: Persistable>(&self) -> CollectionView<'_, T> {
        CollectionView::eager_empty(&self.mapper)
    }

    pub fn empty_lazy_view<T: Persistable>(&self) -> CollectionView<'_, T> {
        CollectionView::lazy_empty(&self.mapper)
    }
}

impl fmt::Debug for Docgraph {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Docgraph").field("mapper", &self.mapper).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::rc::Rc;

    use docgraph_engine::MapperError;
    use docgraph_schema::{shared, Attr, TypeSchema};
    use docgraph_view::Scope;
    use proptest::prelude::*;

    fn init_tracing() {
        let _ = tracing_subscriber::fmt().with_test_writer().try_init();
    }

    // -----------------------------------------------------------------------
    // Fixtures
    // -----------------------------------------------------------------------

    #[derive(Debug, Default)]
    struct Author {
        name: String,
        born: i32,
        favourite: Option<Shared<Book>>,
    }

    impl Persistable for Author {
        const TYPE_NAME: &'static str = "Author";

        fn schema() -> TypeSchema<Self> {
            TypeSchema::persistable("authors")
                .default_constructor()
                .attribute(Attr::field("name", |a: &Author| &a.name, |a| &mut a.name).identity())
                .attribute(Attr::field("born", |a: &Author| &a.born, |a| &mut a.born).persisted())
                .attribute(Attr::field("favourite", |a: &Author| &a.favourite, |a| &mut a.favourite).persisted())
        }
    }

    #[derive(Debug, Default)]
    struct Book {
        isbn: String,
        title: String,
        pages: i32,
        author: Option<Shared<Author>>,
    }

    impl Persistable for Book {
        const TYPE_NAME: &'static str = "Book";

        fn schema() -> TypeSchema<Self> {
            TypeSchema::persistable("books")
                .default_constructor()
                .attribute(Attr::field("isbn", |b: &Book| &b.isbn, |b| &mut b.isbn).identity())
                .attribute(Attr::field("title", |b: &Book| &b.title, |b| &mut b.title).persisted())
                .attribute(Attr::field("pages", |b: &Book| &b.pages, |b| &mut b.pages).persisted())
                .attribute(Attr::field("author", |b: &Book| &b.author, |b| &mut b.author).persisted())
        }
    }

    fn book(isbn: &str, pages: i32) -> Shared<Book> {
        shared(Book {
            isbn: isbn.to_string(),
            title: format!("Title of {isbn}"),
            pages,
            author: None,
        })
    }

    #[derive(Default)]
    struct Media {
        title: String,
    }

    impl Persistable for Media {
        const TYPE_NAME: &'static str = "Media";

        fn schema() -> TypeSchema<Self> {
            TypeSchema::persistable("media")
                .default_constructor()
                .attribute(Attr::field("title", |m: &Media| &m.title, |m| &mut m.title).identity())
        }
    }

    #[derive(Default)]
    struct Film {
        media: Media,
        minutes: i32,
    }

    impl Persistable for Film {
        const TYPE_NAME: &'static str = "Film";

        fn schema() -> TypeSchema<Self> {
            TypeSchema::<Self>::persistable_subtype()
                .extends::<Media>(|f| &f.media, |f| &mut f.media)
                .default_constructor()
                .attribute(Attr::field("minutes", |f: &Film| &f.minutes, |f| &mut f.minutes).persisted())
        }
    }

    #[derive(Default)]
    struct Shelf {
        label: String,
        item: Option<ObjectRef>,
    }

    impl Persistable for Shelf {
        const TYPE_NAME: &'static str = "Shelf";

        fn schema() -> TypeSchema<Self> {
            TypeSchema::persistable("shelves")
                .default_constructor()
                .attribute(Attr::field("label", |s: &Shelf| &s.label, |s| &mut s.label).identity())
                .attribute(
                    Attr::field("item", |s: &Shelf| &s.item, |s| &mut s.item)
                        .declared("Media")
                        .persisted(),
                )
        }
    }

    /// No identity attributes: every store inserts.
    #[derive(Default)]
    struct LogLine {
        text: String,
    }

    impl Persistable for LogLine {
        const TYPE_NAME: &'static str = "LogLine";

        fn schema() -> TypeSchema<Self> {
            TypeSchema::dataclass("log")
                .identity_flagged_only()
                .default_constructor()
                .attribute(Attr::field("text", |l: &LogLine| &l.text, |l| &mut l.text))
        }
    }

    fn session() -> Docgraph {
        init_tracing();
        Docgraph::builder()
            .register::<Author>()
            .register::<Book>()
            .register::<Film>()
            .register::<Shelf>()
            .register::<LogLine>()
            .build()
            .unwrap()
    }

    // -----------------------------------------------------------------------
    // Builder
    // -----------------------------------------------------------------------

    #[test]
    fn builder_registers_ancestors() {
        let docgraph = session();
        assert_eq!(
            docgraph.registry().type_names(),
            vec!["Author", "Book", "Film", "LogLine", "Media", "Shelf"]
        );
    }

    #[test]
    fn builder_reports_duplicate_names_at_build() {
        struct Impostor;
        impl Persistable for Impostor {
            const TYPE_NAME: &'static str = "Book";
            fn schema() -> TypeSchema<Self> {
                TypeSchema::persistable("impostors")
            }
        }

        let result = Docgraph::builder()
            .register::<Book>()
            .register::<Impostor>()
            .register::<Author>()
            .build();
        assert!(matches!(
            result,
            Err(SdkError::Schema(SchemaError::DuplicateType { .. }))
        ));
    }

    #[test]
    fn builder_reads_toml_config() {
        let store = Arc::new(InMemoryDocumentStore::new());
        let docgraph = Docgraph::builder()
            .backend(store.clone())
            .config_toml("type_tag_key = \"kind\"")
            .unwrap()
            .register::<Film>()
            .build()
            .unwrap();

        let film = shared(Film {
            media: Media { title: "Heat".into() },
            minutes: 170,
        });
        let id = docgraph.store(&film).unwrap();
        let document = store.find_by_id("media", &id).unwrap().unwrap();
        assert_eq!(document.get_str("kind"), Some("Film"));
        assert!(document.get("_type").is_none());
    }

    #[test]
    fn builder_rejects_invalid_config() {
        let result = Docgraph::builder().config_toml("type_tag_key = \"\"");
        assert!(matches!(result, Err(SdkError::Mapper(_))));
    }

    #[test]
    fn builder_rejects_attributes_on_the_tag_key() {
        let result = Docgraph::builder()
            .config_toml("type_tag_key = \"title\"")
            .unwrap()
            .register::<Film>()
            .build();
        assert!(matches!(result, Err(SdkError::Mapper(MapperError::Config(_)))));
    }

    #[test]
    fn base_and_subtype_share_a_collection() {
        let docgraph = session();
        docgraph.store(&shared(Media { title: "Radio".into() })).unwrap();
        docgraph
            .store(&shared(Film {
                media: Media { title: "Heat".into() },
                minutes: 170,
            }))
            .unwrap();

        let media = docgraph.decode_all::<Media>().unwrap();
        assert_eq!(media.len(), 1);
        assert_eq!(media[0].borrow().title, "Radio");
        assert_eq!(docgraph.decode_all::<Film>().unwrap().len(), 1);

        let names: Vec<&str> = docgraph
            .decode_all_refs("Media")
            .unwrap()
            .iter()
            .map(|r| r.type_name())
            .collect();
        assert_eq!(names, vec!["Media", "Film"]);
        assert_eq!(docgraph.count::<Media>().unwrap(), 2);
    }

    #[test]
    fn in_memory_session_uses_given_registry() {
        let mut registry = SchemaRegistry::new();
        registry.register::<Book>().unwrap();
        let docgraph = Docgraph::in_memory(registry);
        let id = docgraph.store(&book("1", 10)).unwrap();
        assert_eq!(docgraph.decode_to::<Book>(id).unwrap().borrow().pages, 10);
        assert!(docgraph.store(&shared(LogLine::default())).unwrap_err().is_absent());
    }

    // -----------------------------------------------------------------------
    // End-to-end properties
    // -----------------------------------------------------------------------

    #[test]
    fn mutual_references_decode_to_the_same_instance() {
        let docgraph = session();
        let author = shared(Author {
            name: "Le Guin".into(),
            born: 1929,
            favourite: None,
        });
        let novel = book("0-441-47812-3", 304);
        novel.borrow_mut().author = Some(author.clone());
        author.borrow_mut().favourite = Some(novel.clone());

        let id = docgraph.store(&author).unwrap();
        assert_eq!(docgraph.count::<Author>().unwrap(), 1);
        assert_eq!(docgraph.count::<Book>().unwrap(), 1);

        let decoded = docgraph.decode_to::<Author>(id).unwrap();
        let favourite = decoded.borrow().favourite.clone().unwrap();
        assert_eq!(favourite.borrow().pages, 304);
        let back = favourite.borrow().author.clone().unwrap();
        assert!(Rc::ptr_eq(&back, &decoded));
    }

    #[test]
    fn subtype_survives_base_typed_reference() {
        let docgraph = session();
        let film = shared(Film {
            media: Media { title: "Alien".into() },
            minutes: 117,
        });
        let shelf = shared(Shelf {
            label: "sci-fi".into(),
            item: Some(ObjectRef::from_shared(&film)),
        });

        let id = docgraph.store(&shelf).unwrap();
        let decoded = docgraph.decode_to::<Shelf>(id).unwrap();
        let item = decoded.borrow().item.clone().unwrap();
        assert!(item.is::<Film>());
        let film_back = item.downcast::<Film>().unwrap();
        assert_eq!(film_back.borrow().minutes, 117);
        assert_eq!(film_back.borrow().media.title, "Alien");

        let media_id = docgraph.identity_of(&film).unwrap().unwrap();
        assert_eq!(docgraph.decode_ref("Media", media_id).unwrap().type_name(), "Film");
    }

    #[test]
    fn instances_without_identity_always_insert() {
        let docgraph = session();
        let line = shared(LogLine { text: "started".into() });
        let first = docgraph.store(&line).unwrap();
        let second = docgraph.store(&line).unwrap();
        assert_ne!(first, second);
        assert_eq!(docgraph.count::<LogLine>().unwrap(), 2);
        assert!(docgraph.identity_of(&line).unwrap().is_none());
    }

    #[test]
    fn filters_locate_by_nested_identity() {
        let docgraph = session();
        let author = shared(Author {
            name: "Borges".into(),
            born: 1899,
            favourite: None,
        });
        let ficciones = book("978-0802130303", 174);
        ficciones.borrow_mut().author = Some(author.clone());
        docgraph.store(&ficciones).unwrap();

        let found = docgraph
            .decode_from_filters::<Book>(&[("author", FieldValue::Object(ObjectRef::from_shared(&author)))])
            .unwrap();
        assert_eq!(found.borrow().isbn, "978-0802130303");

        let stranger = shared(Author {
            name: "Nobody".into(),
            ..Author::default()
        });
        let missing = docgraph
            .decode_from_filters::<Book>(&[("author", FieldValue::Object(ObjectRef::from_shared(&stranger)))])
            .unwrap_err();
        assert!(missing.is_absent());
    }

    #[test]
    fn views_over_a_session() {
        let docgraph = session();
        for i in 0..3 {
            docgraph.store(&book(&i.to_string(), 100 + i)).unwrap();
        }
        let eager = docgraph.eager_view::<Book>().unwrap();
        assert_eq!(eager.len().unwrap(), 3);

        let mut lazy = docgraph.lazy_view::<Book>();
        assert_eq!(lazy.scope(), Scope::Blacklist);
        assert!(lazy.remove(&book("1", 0)).unwrap());
        let pages: Vec<i32> = lazy.iter().map(|b| b.unwrap().borrow().pages).collect();
        assert_eq!(pages, vec![100, 102]);

        let mut picked = docgraph.empty_lazy_view::<Book>();
        picked.add(&book("2", 0)).unwrap();
        assert_eq!(picked.get(0).unwrap().unwrap().borrow().pages, 102);
        assert!(docgraph.empty_eager_view::<Book>().is_empty().unwrap());
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(48))]

        #[test]
        fn round_trip_preserves_scalars(
            isbn in "[0-9]{1,13}",
            title in "[A-Za-z ]{0,24}",
            pages in any::<i32>(),
        ) {
            let docgraph = session();
            let original = shared(Book { isbn, title, pages, author: None });
            let id = docgraph.store(&original).unwrap();

            let decoded = docgraph.decode_to::<Book>(id).unwrap();
            prop_assert!(docgraph.store_equal(&decoded, &original));
            let (a, b) = (decoded.borrow(), original.borrow());
            prop_assert_eq!(&a.isbn, &b.isbn);
            prop_assert_eq!(&a.title, &b.title);
            prop_assert_eq!(a.pages, b.pages);
        }

        #[test]
        fn upsert_is_idempotent(isbn in "[0-9]{1,13}", first in any::<i32>(), second in any::<i32>()) {
            let docgraph = session();
            let a = docgraph.store(&book(&isbn, first)).unwrap();
            let b = docgraph.store(&book(&isbn, second)).unwrap();
            prop_assert_eq!(a, b);
            prop_assert_eq!(docgraph.count::<Book>().unwrap(), 1);
            prop_assert_eq!(docgraph.decode_to::<Book>(a).unwrap().borrow().pages, second);
        }

        #[test]
        fn blacklist_view_tracks_removal(n in 1usize..10, pick in any::<prop::sample::Index>()) {
            let docgraph = session();
            for i in 0..n {
                docgraph.store(&book(&format!("isbn-{i}"), i as i32)).unwrap();
            }
            let mut view = docgraph.lazy_view::<Book>();
            prop_assert_eq!(view.len().unwrap(), n);

            let k = pick.index(n);
            let target = book(&format!("isbn-{k}"), 0);
            prop_assert!(view.remove(&target).unwrap());
            prop_assert_eq!(view.len().unwrap(), n - 1);
            let still_there = view
                .iter()
                .any(|b| b.unwrap().borrow().isbn == format!("isbn-{k}"));
            prop_assert!(!still_there);

            prop_assert!(view.add(&target).unwrap());
            prop_assert_eq!(view.len().unwrap(), n);
        }
    }
}
