use std::rc::Rc;
use std::sync::Arc;

/// Payloads that share ownership through a reference counter.
///
/// The map never looks at the counter itself. [`IMap::to_vec_ref`] calls
/// [`incref`](RefCounted::incref) for every exported entry and the set
/// operations call [`decref`](RefCounted::decref) for every handle they drop.
///
/// [`IMap::to_vec_ref`]: crate::IMap::to_vec_ref
pub trait RefCounted: Sized {
    /// Returns a new handle to the same object, bumping its counter.
    fn incref(&self) -> Self;

    /// Gives up this handle. Reaching zero is the object's own business.
    fn decref(self) {
        drop(self)
    }

    /// Whether `self` and `other` are handles to the same object.
    fn same_object(&self, other: &Self) -> bool;
}

impl<U: ?Sized> RefCounted for Rc<U> {
    fn incref(&self) -> Self {
        Rc::clone(self)
    }

    fn same_object(&self, other: &Self) -> bool {
        Rc::ptr_eq(self, other)
    }
}

impl<U: ?Sized> RefCounted for Arc<U> {
    fn incref(&self) -> Self {
        Arc::clone(self)
    }

    fn same_object(&self, other: &Self) -> bool {
        Arc::ptr_eq(self, other)
    }
}
