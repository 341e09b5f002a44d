//! Future-like handles to assets that may still be loading
//!
//! An [`AssetReference`] starts `Pending` and settles exactly once, either
//! `Loaded` with a value or `Failed` with a message. Both are terminal, so a
//! reference observed `Loaded` stays `Loaded` with the same value.

use std::fmt;
use std::sync::Arc;

use parking_lot::Mutex;

use crate::dispatch::MainThread;
use crate::path::VirtualPath;

type Subscriber<T> = Box<dyn FnOnce(&Arc<T>) + Send + 'static>;

/// Snapshot of a reference's state
#[derive(Debug)]
pub enum LoadState<T> {
    Pending,
    Loaded(Arc<T>),
    Failed(String),
}

impl<T> Clone for LoadState<T> {
    fn clone(&self) -> Self {
        match self {
            Self::Pending => Self::Pending,
            Self::Loaded(value) => Self::Loaded(Arc::clone(value)),
            Self::Failed(message) => Self::Failed(message.clone()),
        }
    }
}

enum Slot<T> {
    Pending(Vec<Subscriber<T>>),
    Loaded(Arc<T>),
    Failed(String),
}

struct Inner<T> {
    path: VirtualPath,
    slot: Mutex<Slot<T>>,
}

/// Shared handle to an asset of type `T` at a virtual path
///
/// Clones share state. The cache hands the same reference to every caller
/// requesting the same `(T, path)`.
pub struct AssetReference<T> {
    inner: Arc<Inner<T>>,
}

impl<T> Clone for AssetReference<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<T> fmt::Debug for AssetReference<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = match &*self.inner.slot.lock() {
            Slot::Pending(subscribers) => format!("Pending({} subscribers)", subscribers.len()),
            Slot::Loaded(_) => "Loaded".to_string(),
            Slot::Failed(message) => format!("Failed({})", message),
        };
        f.debug_struct("AssetReference")
            .field("path", &self.inner.path)
            .field("state", &state)
            .finish()
    }
}

impl<T: Send + Sync + 'static> AssetReference<T> {
    /// A pending reference
    pub fn new(path: VirtualPath) -> Self {
        Self::with_slot(path, Slot::Pending(Vec::new()))
    }

    /// A reference that is already loaded
    pub fn loaded(path: VirtualPath, value: Arc<T>) -> Self {
        Self::with_slot(path, Slot::Loaded(value))
    }

    fn with_slot(path: VirtualPath, slot: Slot<T>) -> Self {
        Self {
            inner: Arc::new(Inner {
                path,
                slot: Mutex::new(slot),
            }),
        }
    }

    pub fn path(&self) -> &VirtualPath {
        &self.inner.path
    }

    /// Settle as `Loaded` and run the subscribers in subscription order
    ///
    /// Returns `false` and drops `value` when the reference had already
    /// settled.
    pub fn set_value(&self, value: T, main: &MainThread) -> bool {
        self.set_shared(Arc::new(value), main)
    }

    /// [`set_value`](Self::set_value) for a value that is already shared
    pub fn set_shared(&self, value: Arc<T>, _main: &MainThread) -> bool {
        let subscribers = {
            let mut slot = self.inner.slot.lock();
            match &mut *slot {
                Slot::Pending(subscribers) => {
                    let subscribers = std::mem::take(subscribers);
                    *slot = Slot::Loaded(Arc::clone(&value));
                    subscribers
                }
                _ => return false,
            }
        };
        for subscriber in subscribers {
            subscriber(&value);
        }
        true
    }

    /// Settle as `Failed`; pending subscribers are dropped without running
    pub fn fail(&self, message: impl Into<String>) -> bool {
        let mut slot = self.inner.slot.lock();
        if !matches!(*slot, Slot::Pending(_)) {
            return false;
        }
        *slot = Slot::Failed(message.into());
        true
    }

    /// Run `f` once the value is available
    ///
    /// Runs immediately on the calling thread when already loaded; otherwise
    /// `f` runs on the thread that settles the reference. Checking and
    /// subscribing happen under one lock, so a completion can't slip between.
    pub fn subscribe<F>(&self, f: F)
    where
        F: FnOnce(&Arc<T>) + Send + 'static,
    {
        let value = {
            let mut slot = self.inner.slot.lock();
            match &mut *slot {
                Slot::Pending(subscribers) => {
                    subscribers.push(Box::new(f));
                    return;
                }
                Slot::Loaded(value) => Arc::clone(value),
                Slot::Failed(_) => return,
            }
        };
        f(&value);
    }

    pub fn state(&self) -> LoadState<T> {
        match &*self.inner.slot.lock() {
            Slot::Pending(_) => LoadState::Pending,
            Slot::Loaded(value) => LoadState::Loaded(Arc::clone(value)),
            Slot::Failed(message) => LoadState::Failed(message.clone()),
        }
    }

    /// The value, once loaded
    pub fn value(&self) -> Option<Arc<T>> {
        match &*self.inner.slot.lock() {
            Slot::Loaded(value) => Some(Arc::clone(value)),
            _ => None,
        }
    }

    /// The failure message, once failed
    pub fn error(&self) -> Option<String> {
        match &*self.inner.slot.lock() {
            Slot::Failed(message) => Some(message.clone()),
            _ => None,
        }
    }

    pub fn is_loaded(&self) -> bool {
        matches!(*self.inner.slot.lock(), Slot::Loaded(_))
    }

    pub fn is_pending(&self) -> bool {
        matches!(*self.inner.slot.lock(), Slot::Pending(_))
    }

    pub fn is_failed(&self) -> bool {
        matches!(*self.inner.slot.lock(), Slot::Failed(_))
    }

    /// Whether both handles share one reference
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }

    /// Number of live handles, the cache's included
    pub(crate) fn handle_count(&self) -> usize {
        Arc::strong_count(&self.inner)
    }
}
