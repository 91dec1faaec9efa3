//! Core types shared by topics and registries.

use crate::error::BoxError;
use std::any::Any;
use std::fmt;
use std::sync::Arc;

type Callback<M> = dyn Fn(Option<&Context>, &M) -> Result<(), BoxError> + Send + Sync;

/// A subscriber callback.
///
/// Cloning is cheap and yields the *same* subscriber: clones compare equal
/// under [`Subscriber::same`], so a clone can be used to `unsub` the original.
pub struct Subscriber<M> {
    callback: Arc<Callback<M>>,
}

impl<M: 'static> Subscriber<M> {
    /// Wrap an infallible callback that ignores any bound context.
    pub fn new<F>(f: F) -> Self
    where
        F: Fn(&M) + Send + Sync + 'static,
    {
        Self {
            callback: Arc::new(move |_: Option<&Context>, message: &M| {
                f(message);
                Ok(())
            }),
        }
    }

    /// Wrap a callback whose `Err` is reported to the error sink.
    pub fn fallible<F, E>(f: F) -> Self
    where
        F: Fn(&M) -> Result<(), E> + Send + Sync + 'static,
        E: Into<BoxError> + 'static,
    {
        Self {
            callback: Arc::new(move |_: Option<&Context>, message: &M| {
                f(message).map_err(Into::into)
            }),
        }
    }

    /// Wrap a callback that receives the context it was subscribed with.
    pub fn contextual<F, E>(f: F) -> Self
    where
        F: Fn(Option<&Context>, &M) -> Result<(), E> + Send + Sync + 'static,
        E: Into<BoxError> + 'static,
    {
        Self {
            callback: Arc::new(move |context: Option<&Context>, message: &M| {
                f(context, message).map_err(Into::into)
            }),
        }
    }
}

impl<M> Subscriber<M> {
    /// True if both handles refer to the same callback.
    pub fn same(&self, other: &Subscriber<M>) -> bool {
        Arc::ptr_eq(&self.callback, &other.callback)
    }

    pub(crate) fn call(&self, context: Option<&Context>, message: &M) -> Result<(), BoxError> {
        (self.callback)(context, message)
    }
}

impl<M> Clone for Subscriber<M> {
    fn clone(&self) -> Self {
        Self {
            callback: Arc::clone(&self.callback),
        }
    }
}

impl<M> fmt::Debug for Subscriber<M> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Subscriber({:p})", Arc::as_ptr(&self.callback) as *const ())
    }
}

/// Receiver bound to a subscription and handed back on every delivery.
///
/// Compared by identity, not by value: two contexts built from equal values
/// are still different contexts.
#[derive(Clone)]
pub struct Context(Arc<dyn Any + Send + Sync>);

impl Context {
    /// Bind `value` as a context.
    pub fn new<T: Any + Send + Sync>(value: T) -> Self {
        Context(Arc::new(value))
    }

    /// Borrow the bound value as `T`, if that is its type.
    pub fn downcast_ref<T: Any>(&self) -> Option<&T> {
        self.0.downcast_ref::<T>()
    }

    /// True if both handles refer to the same bound value.
    pub fn same(&self, other: &Context) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }

    pub(crate) fn same_opt(a: Option<&Context>, b: Option<&Context>) -> bool {
        match (a, b) {
            (None, None) => true,
            (Some(a), Some(b)) => a.same(b),
            _ => false,
        }
    }
}

impl fmt::Debug for Context {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Context({:p})", Arc::as_ptr(&self.0) as *const ())
    }
}
