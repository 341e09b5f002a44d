//! Tokio async runtime implementation

use super::{AsyncSpawner, BoxFuture, JoinHandle};
use std::future::Future;
use std::time::Duration;
use tokio::runtime::Handle;

/// Spawns onto a Tokio runtime
///
/// The runtime handle is captured at construction, so tasks can be spawned
/// later from threads that are not part of the runtime (filesystem watcher
/// callbacks, the main thread).
#[derive(Clone, Debug, Default)]
pub struct TokioSpawner {
    handle: Option<Handle>,
}

impl TokioSpawner {
    /// Capture the runtime the caller is running on, if any
    pub fn new() -> Self {
        Self {
            handle: Handle::try_current().ok(),
        }
    }

    /// Spawn onto an explicit runtime
    pub fn with_handle(handle: Handle) -> Self {
        Self {
            handle: Some(handle),
        }
    }

    fn current(&self) -> Option<Handle> {
        self.handle.clone().or_else(|| Handle::try_current().ok())
    }
}

impl AsyncSpawner for TokioSpawner {
    fn spawn<F>(&self, task: F) -> JoinHandle
    where
        F: Future<Output = ()> + Send + 'static,
    {
        match self.current() {
            Some(handle) => JoinHandle::new(handle.spawn(task)),
            None => {
                log::error!("No Tokio runtime available; background task dropped");
                JoinHandle::new(())
            }
        }
    }

    fn sleep(&self, duration: Duration) -> BoxFuture<'static, ()> {
        Box::pin(tokio::time::sleep(duration))
    }

    fn runtime_name(&self) -> &'static str {
        "Tokio"
    }

    fn block_on<F, T>(&self, future: F) -> Option<T>
    where
        F: Future<Output = T>,
    {
        if let Ok(handle) = Handle::try_current() {
            // Already inside the runtime: give up this worker while blocking
            Some(tokio::task::block_in_place(|| handle.block_on(future)))
        } else if let Some(handle) = &self.handle {
            Some(handle.block_on(future))
        } else {
            let rt = tokio::runtime::Runtime::new().ok()?;
            Some(rt.block_on(future))
        }
    }
}
