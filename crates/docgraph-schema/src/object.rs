//! Shared, type-erased handles to live instances.
//!
//! Object graphs may be cyclic, so instances live behind
//! `Rc<RefCell<T>>`. [`ObjectRef`] erases `T` while keeping reference
//! identity: two handles are equal exactly when they point at the same
//! allocation.

use std::any::Any;
use std::cell::RefCell;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::rc::Rc;

use crate::attribute::{AttributeDescriptor, Getter, Setter};
use crate::error::AccessError;
use crate::schema::Persistable;
use crate::value::FieldValue;

/// A shared, mutable instance of a persistable type.
pub type Shared<T> = Rc<RefCell<T>>;

/// Wrap `value` in a fresh [`Shared`] cell.
pub fn shared<T>(value: T) -> Shared<T> {
    Rc::new(RefCell::new(value))
}

pub(crate) trait ErasedEntity {
    fn type_name(&self) -> &'static str;
    fn read(&self, getter: &Getter) -> Result<FieldValue, AccessError>;
    fn write(&self, setter: &Setter, value: FieldValue) -> Result<(), AccessError>;
    fn into_any(self: Rc<Self>) -> Rc<dyn Any>;
}

impl<T: Persistable> ErasedEntity for RefCell<T> {
    fn type_name(&self) -> &'static str {
        T::TYPE_NAME
    }

    fn read(&self, getter: &Getter) -> Result<FieldValue, AccessError> {
        let this = self.try_borrow().map_err(|_| AccessError::Borrowed {
            type_name: T::TYPE_NAME,
        })?;
        getter(&*this as &dyn Any)
    }

    fn write(&self, setter: &Setter, value: FieldValue) -> Result<(), AccessError> {
        let mut this = self.try_borrow_mut().map_err(|_| AccessError::Borrowed {
            type_name: T::TYPE_NAME,
        })?;
        setter(&mut *this as &mut dyn Any, value)
    }

    fn into_any(self: Rc<Self>) -> Rc<dyn Any> {
        self
    }
}

/// Type-erased handle to a live persistable instance.
#[derive(Clone)]
pub struct ObjectRef(Rc<dyn ErasedEntity>);

impl ObjectRef {
    /// Move `value` into a new shared cell.
    pub fn new<T: Persistable>(value: T) -> Self {
        Self::from_shared(&shared(value))
    }

    /// Erase an existing shared instance. The handle aliases it.
    pub fn from_shared<T: Persistable>(instance: &Shared<T>) -> Self {
        let erased: Rc<dyn ErasedEntity> = instance.clone();
        Self(erased)
    }

    /// Registered name of the concrete type.
    pub fn type_name(&self) -> &'static str {
        self.0.type_name()
    }

    /// Address of the underlying allocation.
    pub fn addr(&self) -> usize {
        Rc::as_ptr(&self.0).cast::<()>() as usize
    }

    /// Whether both handles point at the same instance.
    pub fn ptr_eq(&self, other: &ObjectRef) -> bool {
        self.addr() == other.addr()
    }

    /// Recover the typed instance. `None` if the concrete type differs.
    pub fn downcast<T: Persistable>(&self) -> Option<Shared<T>> {
        Rc::clone(&self.0).into_any().downcast::<RefCell<T>>().ok()
    }

    pub fn is<T: Persistable>(&self) -> bool {
        self.downcast::<T>().is_some()
    }

    /// Read one attribute.
    pub fn get(&self, attribute: &AttributeDescriptor) -> Result<FieldValue, AccessError> {
        self.0.read(attribute.getter())
    }

    /// Assign one attribute.
    pub fn set(&self, attribute: &AttributeDescriptor, value: FieldValue) -> Result<(), AccessError> {
        self.0.write(attribute.setter(), value)
    }
}

impl PartialEq for ObjectRef {
    fn eq(&self, other: &Self) -> bool {
        self.ptr_eq(other)
    }
}

impl Eq for ObjectRef {}

impl Hash for ObjectRef {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.addr().hash(state);
    }
}

impl fmt::Debug for ObjectRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ObjectRef({}@{:#x})", self.type_name(), self.addr())
    }
}

/// Anything that can hand out an [`ObjectRef`] to a live instance.
pub trait AsObjectRef {
    fn object_ref(&self) -> ObjectRef;
}

impl AsObjectRef for ObjectRef {
    fn object_ref(&self) -> ObjectRef {
        self.clone()
    }
}

impl<T: Persistable> AsObjectRef for Rc<RefCell<T>> {
    fn object_ref(&self) -> ObjectRef {
        ObjectRef::from_shared(self)
    }
}
