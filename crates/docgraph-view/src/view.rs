use std::fmt;

use docgraph_engine::DocumentMapper;
use docgraph_schema::{Persistable, Shared};
use docgraph_types::DocumentId;
use tracing::debug;

use crate::error::{ViewError, ViewResult};

/// How a view holds its members.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Backing {
    /// Decoded instances, compared by store equality.
    Eager,
    /// Document identities, decoded on access.
    Lazy,
}

/// What a lazy view's identity list means.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Scope {
    /// The list is the membership, in order.
    Explicit,
    /// The membership is the live collection minus the list.
    Blacklist,
}

enum Members<T> {
    Eager(Vec<Shared<T>>),
    Lazy { ids: Vec<DocumentId>, scope: Scope },
}

/// A list-shaped view over the stored instances of `T`.
///
/// Instances handed to a lazy view must already be stored: they are
/// located through their equality predicates, and one that cannot be
/// located is never a member.
pub struct CollectionView<'m, T: Persistable> {
    mapper: &'m DocumentMapper,
    members: Members<T>,
}

impl<'m, T: Persistable> CollectionView<'m, T> {
    /// An empty view holding decoded instances.
    pub fn eager_empty(mapper: &'m DocumentMapper) -> Self {
        Self {
            mapper,
            members: Members::Eager(Vec::new()),
        }
    }

    /// The whole collection, decoded now.
    pub fn eager_full(mapper: &'m DocumentMapper) -> ViewResult<Self> {
        Ok(Self {
            mapper,
            members: Members::Eager(mapper.decode_all::<T>()?),
        })
    }

    /// An empty view holding identities.
    pub fn lazy_empty(mapper: &'m DocumentMapper) -> Self {
        Self {
            mapper,
            members: Members::Lazy {
                ids: Vec::new(),
                scope: Scope::Explicit,
            },
        }
    }

    /// The whole live collection, as an empty blacklist.
    pub fn lazy_full(mapper: &'m DocumentMapper) -> Self {
        Self {
            mapper,
            members: Members::Lazy {
                ids: Vec::new(),
                scope: Scope::Blacklist,
            },
        }
    }

    pub fn backing(&self) -> Backing {
        match self.members {
            Members::Eager(_) => Backing::Eager,
            Members::Lazy { .. } => Backing::Lazy,
        }
    }

    /// Eager views always have explicit scope.
    pub fn scope(&self) -> Scope {
        match self.members {
            Members::Eager(_) => Scope::Explicit,
            Members::Lazy { scope, .. } => scope,
        }
    }

    // -----------------------------------------------------------------------
    // Queries
    // -----------------------------------------------------------------------

    /// Identities of the members, in view order. Eager members that cannot
    /// be located are left out.
    pub fn ids(&self) -> ViewResult<Vec<DocumentId>> {
        match &self.members {
            Members::Eager(items) => {
                let mut out = Vec::with_capacity(items.len());
                for item in items {
                    if let Some(id) = self.mapper.identity_of(item)? {
                        out.push(id);
                    }
                }
                Ok(out)
            }
            Members::Lazy { ids, scope: Scope::Explicit } => Ok(ids.clone()),
            Members::Lazy { ids: excluded, scope: Scope::Blacklist } => Ok(self
                .mapper
                .collection_ids::<T>()?
                .into_iter()
                .filter(|id| !excluded.contains(id))
                .collect()),
        }
    }

    /// Exact number of members.
    pub fn len(&self) -> ViewResult<usize> {
        match &self.members {
            Members::Eager(items) => Ok(items.len()),
            Members::Lazy { ids, scope: Scope::Explicit } => Ok(ids.len()),
            Members::Lazy { scope: Scope::Blacklist, .. } => Ok(self.ids()?.len()),
        }
    }

    /// Number of members, from the store's estimated count under
    /// blacklist scope. Exact otherwise.
    ///
    /// The estimate counts every document of the collection, including
    /// those of other types sharing it.
    pub fn len_estimated(&self) -> ViewResult<usize> {
        match &self.members {
            Members::Lazy { ids: excluded, scope: Scope::Blacklist } => {
                let total = self.mapper.count_of::<T>(true)?;
                let total = usize::try_from(total).unwrap_or(usize::MAX);
                Ok(total.saturating_sub(excluded.len()))
            }
            _ => self.len(),
        }
    }

    pub fn is_empty(&self) -> ViewResult<bool> {
        Ok(self.len()? == 0)
    }

    pub fn contains(&self, element: &Shared<T>) -> ViewResult<bool> {
        Ok(self.index_of(element)?.is_some())
    }

    pub fn contains_all(&self, elements: &[Shared<T>]) -> ViewResult<bool> {
        for element in elements {
            if !self.contains(element)? {
                return Ok(false);
            }
        }
        Ok(true)
    }

    /// Position of the first member store-equal to `element`.
    pub fn index_of(&self, element: &Shared<T>) -> ViewResult<Option<usize>> {
        match &self.members {
            Members::Eager(items) => Ok(items.iter().position(|i| self.mapper.store_equal(i, element))),
            Members::Lazy { .. } => {
                let Some(id) = self.mapper.identity_of(element)? else {
                    return Ok(None);
                };
                Ok(self.ids()?.iter().position(|m| *m == id))
            }
        }
    }

    /// Position of the last member store-equal to `element`.
    pub fn last_index_of(&self, element: &Shared<T>) -> ViewResult<Option<usize>> {
        match &self.members {
            Members::Eager(items) => Ok(items.iter().rposition(|i| self.mapper.store_equal(i, element))),
            Members::Lazy { .. } => {
                let Some(id) = self.mapper.identity_of(element)? else {
                    return Ok(None);
                };
                Ok(self.ids()?.iter().rposition(|m| *m == id))
            }
        }
    }

    /// The member at `index`; `None` past the end.
    pub fn get(&self, index: usize) -> ViewResult<Option<Shared<T>>> {
        match &self.members {
            Members::Eager(items) => Ok(items.get(index).cloned()),
            Members::Lazy { .. } => match self.ids()?.get(index) {
                Some(id) => Ok(Some(self.mapper.decode_to::<T>(*id)?)),
                None => Ok(None),
            },
        }
    }

    /// Members in view order. Lazy views decode each one as it is reached.
    pub fn iter(&self) -> Box<dyn Iterator<Item = ViewResult<Shared<T>>> + '_> {
        match &self.members {
            Members::Eager(items) => Box::new(items.iter().cloned().map(Ok::<_, ViewError>)),
            Members::Lazy { .. } => match self.ids() {
                Ok(ids) => {
                    let mapper = self.mapper;
                    Box::new(
                        ids.into_iter()
                            .map(move |id| mapper.decode_to::<T>(id).map_err(ViewError::from)),
                    )
                }
                Err(e) => Box::new(std::iter::once(Err::<Shared<T>, _>(e))),
            },
        }
    }

    pub fn to_vec(&self) -> ViewResult<Vec<Shared<T>>> {
        self.iter().collect()
    }

    /// A new view over members `from..to`, with explicit scope.
    pub fn sub_list(&self, from: usize, to: usize) -> ViewResult<CollectionView<'m, T>> {
        let len = self.len()?;
        if to > len {
            return Err(ViewError::IndexOutOfBounds { index: to, len });
        }
        if from > to {
            return Err(ViewError::IndexOutOfBounds { index: from, len: to });
        }
        let members = match &self.members {
            Members::Eager(items) => Members::Eager(items[from..to].to_vec()),
            Members::Lazy { .. } => Members::Lazy {
                ids: self.ids()?[from..to].to_vec(),
                scope: Scope::Explicit,
            },
        };
        Ok(CollectionView {
            mapper: self.mapper,
            members,
        })
    }

    // -----------------------------------------------------------------------
    // Membership changes
    // -----------------------------------------------------------------------

    /// Add `element` unless a store-equal member exists. Returns whether
    /// membership changed. Never stores anything.
    pub fn add(&mut self, element: &Shared<T>) -> ViewResult<bool> {
        if let Members::Eager(_) = self.members {
            if self.contains(element)? {
                return Ok(false);
            }
            if let Members::Eager(items) = &mut self.members {
                items.push(element.clone());
            }
            return Ok(true);
        }
        let Some(id) = self.mapper.identity_of(element)? else {
            return Ok(false);
        };
        let Members::Lazy { ids, scope } = &mut self.members else {
            return Ok(false);
        };
        match scope {
            Scope::Explicit if ids.contains(&id) => Ok(false),
            Scope::Explicit => {
                ids.push(id);
                Ok(true)
            }
            Scope::Blacklist => match ids.iter().position(|x| *x == id) {
                Some(pos) => {
                    ids.remove(pos);
                    Ok(true)
                }
                None => Ok(false),
            },
        }
    }

    /// Add each element. Returns whether membership changed.
    pub fn add_all(&mut self, elements: &[Shared<T>]) -> ViewResult<bool> {
        let mut changed = false;
        for element in elements {
            changed |= self.add(element)?;
        }
        Ok(changed)
    }

    /// Insert `element` before `index`. Under blacklist scope positions
    /// are not ours to choose, so this is [`add`](Self::add).
    pub fn insert(&mut self, index: usize, element: &Shared<T>) -> ViewResult<bool> {
        if self.scope() == Scope::Blacklist {
            return self.add(element);
        }
        let len = self.len()?;
        if index > len {
            return Err(ViewError::IndexOutOfBounds { index, len });
        }
        if self.contains(element)? {
            return Ok(false);
        }
        let id = match self.members {
            Members::Eager(_) => None,
            Members::Lazy { .. } => match self.mapper.identity_of(element)? {
                Some(id) => Some(id),
                None => return Ok(false),
            },
        };
        match (&mut self.members, id) {
            (Members::Eager(items), _) => items.insert(index, element.clone()),
            (Members::Lazy { ids, .. }, Some(id)) => ids.insert(index, id),
            (Members::Lazy { .. }, None) => return Ok(false),
        }
        Ok(true)
    }

    /// Replace the member at `index`, returning the previous one.
    pub fn set(&mut self, index: usize, element: &Shared<T>) -> ViewResult<Shared<T>> {
        let len = self.len()?;
        if index >= len {
            return Err(ViewError::IndexOutOfBounds { index, len });
        }
        if let Members::Eager(items) = &mut self.members {
            return Ok(std::mem::replace(&mut items[index], element.clone()));
        }

        let id = self
            .mapper
            .identity_of(element)?
            .ok_or(ViewError::NotStored { type_name: T::TYPE_NAME })?;
        let previous_id = self.ids()?[index];
        let previous = self.mapper.decode_to::<T>(previous_id)?;
        if let Members::Lazy { ids, scope } = &mut self.members {
            match scope {
                Scope::Explicit => ids[index] = id,
                Scope::Blacklist => {
                    ids.retain(|x| *x != id);
                    if previous_id != id {
                        ids.push(previous_id);
                    }
                }
            }
        }
        Ok(previous)
    }

    /// Remove the first member store-equal to `element`. Returns whether
    /// membership changed. Never deletes anything.
    pub fn remove(&mut self, element: &Shared<T>) -> ViewResult<bool> {
        if let Members::Eager(_) = self.members {
            let Some(pos) = self.index_of(element)? else {
                return Ok(false);
            };
            if let Members::Eager(items) = &mut self.members {
                items.remove(pos);
            }
            return Ok(true);
        }
        let Some(id) = self.mapper.identity_of(element)? else {
            return Ok(false);
        };
        let Members::Lazy { ids, scope } = &mut self.members else {
            return Ok(false);
        };
        match scope {
            Scope::Explicit => match ids.iter().position(|x| *x == id) {
                Some(pos) => {
                    ids.remove(pos);
                    Ok(true)
                }
                None => Ok(false),
            },
            Scope::Blacklist if ids.contains(&id) => Ok(false),
            Scope::Blacklist => {
                ids.push(id);
                Ok(true)
            }
        }
    }

    /// Remove each element. Returns whether membership changed.
    pub fn remove_all(&mut self, elements: &[Shared<T>]) -> ViewResult<bool> {
        let mut changed = false;
        for element in elements {
            changed |= self.remove(element)?;
        }
        Ok(changed)
    }

    /// Remove and return the member at `index`.
    pub fn remove_at(&mut self, index: usize) -> ViewResult<Shared<T>> {
        let len = self.len()?;
        if index >= len {
            return Err(ViewError::IndexOutOfBounds { index, len });
        }
        if let Members::Eager(items) = &mut self.members {
            return Ok(items.remove(index));
        }
        let id = self.ids()?[index];
        let removed = self.mapper.decode_to::<T>(id)?;
        if let Members::Lazy { ids, scope } = &mut self.members {
            match scope {
                Scope::Explicit => {
                    ids.remove(index);
                }
                Scope::Blacklist => ids.push(id),
            }
        }
        Ok(removed)
    }

    /// Drop every member. A blacklist view becomes an empty explicit one.
    pub fn clear(&mut self) {
        match &mut self.members {
            Members::Eager(items) => items.clear(),
            Members::Lazy { ids, scope } => {
                ids.clear();
                if *scope == Scope::Blacklist {
                    debug!(type_name = T::TYPE_NAME, "blacklist view cleared; now explicit");
                }
                *scope = Scope::Explicit;
            }
        }
    }

    /// Make every stored instance a member. A lazy view becomes an empty
    /// blacklist; an eager view decodes the collection again.
    pub fn add_whole_collection(&mut self) -> ViewResult<()> {
        match &mut self.members {
            Members::Eager(items) => *items = self.mapper.decode_all::<T>()?,
            Members::Lazy { ids, scope } => {
                ids.clear();
                *scope = Scope::Blacklist;
            }
        }
        Ok(())
    }
}

impl<T: Persistable> fmt::Debug for CollectionView<'_, T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let held = match &self.members {
            Members::Eager(items) => items.len(),
            Members::Lazy { ids, .. } => ids.len(),
        };
        f.debug_struct("CollectionView")
            .field("type_name", &T::TYPE_NAME)
            .field("backing", &self.backing())
            .field("scope", &self.scope())
            .field("held", &held)
            .finish()
    }
}
