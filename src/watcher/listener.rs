use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;

use crate::dispatch::MainThread;
use crate::path::VirtualPath;

/// Receives reload notifications on the main thread
pub trait ReloadListener: Send + Sync + 'static {
    /// A file settled after being created, written or renamed into `path`
    fn asset_changed(&self, path: &VirtualPath, main: &MainThread);

    /// The file at `path` was deleted
    fn asset_removed(&self, path: &VirtualPath, main: &MainThread) {
        self.asset_changed(path, main);
    }
}

impl<F> ReloadListener for F
where
    F: Fn(&VirtualPath, &MainThread) + Send + Sync + 'static,
{
    fn asset_changed(&self, path: &VirtualPath, main: &MainThread) {
        self(path, main)
    }
}

type Callback = Arc<dyn Fn(&VirtualPath, &MainThread) + Send + Sync>;

/// Per-path reload callbacks
#[derive(Default)]
pub struct ReloadHooks {
    by_path: RwLock<HashMap<VirtualPath, Vec<Callback>>>,
    any: RwLock<Vec<Callback>>,
}

impl ReloadHooks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Call `f` whenever `path` changes
    pub fn on_change<F>(&self, path: impl Into<VirtualPath>, f: F)
    where
        F: Fn(&VirtualPath, &MainThread) + Send + Sync + 'static,
    {
        self.by_path
            .write()
            .entry(path.into())
            .or_default()
            .push(Arc::new(f));
    }

    /// Call `f` for every change
    pub fn on_any<F>(&self, f: F)
    where
        F: Fn(&VirtualPath, &MainThread) + Send + Sync + 'static,
    {
        self.any.write().push(Arc::new(f));
    }

    pub fn clear(&self, path: &VirtualPath) {
        self.by_path.write().remove(path);
    }

    pub fn hook_count(&self) -> usize {
        self.by_path.read().values().map(Vec::len).sum::<usize>() + self.any.read().len()
    }
}

impl ReloadListener for ReloadHooks {
    fn asset_changed(&self, path: &VirtualPath, main: &MainThread) {
        // Callbacks may register more hooks
        let mut callbacks: Vec<Callback> = self
            .by_path
            .read()
            .get(path)
            .cloned()
            .unwrap_or_default();
        callbacks.extend(self.any.read().iter().cloned());
        for callback in callbacks {
            callback(path, main);
        }
    }
}

impl std::fmt::Debug for ReloadHooks {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ReloadHooks")
            .field("paths", &self.by_path.read().len())
            .field("any", &self.any.read().len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn test_hooks_fire_for_their_path() {
        let main = MainThread::claim();
        let hooks = ReloadHooks::new();
        let hits = Arc::new(AtomicUsize::new(0));
        let any = Arc::new(AtomicUsize::new(0));

        let h = Arc::clone(&hits);
        hooks.on_change("tex/a.png", move |_, _| {
            h.fetch_add(1, Ordering::SeqCst);
        });
        let a = Arc::clone(&any);
        hooks.on_any(move |_, _| {
            a.fetch_add(1, Ordering::SeqCst);
        });

        hooks.asset_changed(&VirtualPath::new("tex/a.png"), &main);
        hooks.asset_changed(&VirtualPath::new("tex/b.png"), &main);

        assert_eq!(hits.load(Ordering::SeqCst), 1);
        assert_eq!(any.load(Ordering::SeqCst), 2);
        assert_eq!(hooks.hook_count(), 2);
    }

    #[test]
    fn test_closure_is_a_listener() {
        let main = MainThread::claim();
        let seen = Arc::new(parking_lot::Mutex::new(Vec::new()));
        let s = Arc::clone(&seen);
        let listener: Arc<dyn ReloadListener> =
            Arc::new(move |path: &VirtualPath, _: &MainThread| s.lock().push(path.clone()));

        listener.asset_changed(&VirtualPath::new("a.mat"), &main);
        listener.asset_removed(&VirtualPath::new("b.mat"), &main);

        assert_eq!(
            *seen.lock(),
            vec![VirtualPath::new("a.mat"), VirtualPath::new("b.mat")]
        );
    }
}
