//! Main-thread capability and the deferred task queue
//!
//! GPU resources may only be built by the thread that owns the graphics
//! context. That thread holds a [`MainThread`] token; every operation that
//! finalizes a resource takes `&MainThread`, and since the token is neither
//! `Send` nor `Sync`, background code can only reach it by queueing a task.

use std::any::Any;
use std::cell::Cell;
use std::marker::PhantomData;
use std::panic::{catch_unwind, AssertUnwindSafe};

use crossbeam_channel::{Receiver, Sender};

/// Proof that the current code runs on the main (graphics) thread
#[derive(Debug)]
pub struct MainThread {
    _not_send: PhantomData<*const ()>,
}

impl MainThread {
    /// Claim the capability for the calling thread
    ///
    /// Call this once from the thread that owns the graphics context and keep
    /// the token for as long as that thread runs the frame loop. Claiming
    /// from inside a background load is a bug and trips a debug assertion.
    pub fn claim() -> Self {
        debug_assert!(
            !BACKGROUND.with(Cell::get),
            "MainThread claimed from a background load"
        );
        Self {
            _not_send: PhantomData,
        }
    }
}

thread_local! {
    static BACKGROUND: Cell<bool> = const { Cell::new(false) };
}

/// Marks the current thread as running background work until dropped
pub(crate) struct BackgroundScope {
    previous: bool,
}

impl BackgroundScope {
    pub(crate) fn enter() -> Self {
        Self {
            previous: BACKGROUND.with(|b| b.replace(true)),
        }
    }
}

impl Drop for BackgroundScope {
    fn drop(&mut self) {
        BACKGROUND.with(|b| b.set(self.previous));
    }
}

/// Text of a caught panic payload
pub(crate) fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

/// A deferred action run on the main thread
pub type MainThreadTask = Box<dyn FnOnce(&MainThread) + Send + 'static>;

/// Queue of actions for the main thread
///
/// FIFO, single consumer. No priorities and no cancellation.
pub trait Dispatcher: Send + Sync {
    fn queue(&self, task: MainThreadTask);
}

/// Channel-backed [`Dispatcher`] drained once per tick by the main thread
#[derive(Debug, Clone)]
pub struct MainThreadQueue {
    sender: Sender<MainThreadTask>,
    receiver: Receiver<MainThreadTask>,
}

impl Default for MainThreadQueue {
    fn default() -> Self {
        Self::new()
    }
}

impl MainThreadQueue {
    pub fn new() -> Self {
        let (sender, receiver) = crossbeam_channel::unbounded();
        Self { sender, receiver }
    }

    /// Run every task queued so far, in order; returns how many ran
    ///
    /// Tasks queued by the tasks themselves run on the next drain. A panicking
    /// task is logged and does not stop the rest of the tick.
    pub fn drain(&self, main: &MainThread) -> usize {
        let pending = self.receiver.len();
        let mut ran = 0;
        for _ in 0..pending {
            let Ok(task) = self.receiver.try_recv() else {
                break;
            };
            if let Err(payload) = catch_unwind(AssertUnwindSafe(|| task(main))) {
                log::error!("Main-thread task panicked: {}", panic_message(&*payload));
            }
            ran += 1;
        }
        ran
    }

    /// Number of tasks waiting
    pub fn len(&self) -> usize {
        self.receiver.len()
    }

    pub fn is_empty(&self) -> bool {
        self.receiver.is_empty()
    }
}

impl Dispatcher for MainThreadQueue {
    fn queue(&self, task: MainThreadTask) {
        // Both ends live in self, so the channel cannot be disconnected
        let _ = self.sender.send(task);
    }
}
