use std::collections::BTreeMap;

use jobtrack_core::JobKind;
use jobtrack_logging::{track_debug, track_warn};
use tokio::task::JoinHandle;

/// A live background resource owned by a job.
pub trait Disposable: Send {
    /// Stops the resource. Calling it again is a no-op.
    fn dispose(&mut self);
    fn is_live(&self) -> bool;
}

/// Which kind of resource a job holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Slot {
    Channel,
    Poll,
    Fetch,
}

/// Registry of every live channel, poll loop and in-flight fetch.
///
/// Each job kind holds at most one resource per [`Slot`]. Everything still
/// registered is disposed when the janitor is dropped.
#[derive(Default)]
pub struct ResourceJanitor {
    live: BTreeMap<(JobKind, Slot), Box<dyn Disposable>>,
}

impl ResourceJanitor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `resource`, disposing any previous occupant of the slot first.
    pub fn register(&mut self, kind: JobKind, slot: Slot, resource: Box<dyn Disposable>) {
        if let Some(mut previous) = self.live.insert((kind, slot), resource) {
            track_warn!("replacing {:?} still registered for {} job", slot, kind);
            previous.dispose();
        }
    }

    /// Disposes the resource in one slot. Returns whether one was registered.
    pub fn dispose(&mut self, kind: JobKind, slot: Slot) -> bool {
        match self.live.remove(&(kind, slot)) {
            Some(mut resource) => {
                resource.dispose();
                track_debug!("disposed {:?} of {} job", slot, kind);
                true
            }
            None => false,
        }
    }

    pub fn dispose_job(&mut self, kind: JobKind) -> usize {
        [Slot::Channel, Slot::Poll, Slot::Fetch]
            .into_iter()
            .filter(|slot| self.dispose(kind, *slot))
            .count()
    }

    pub fn dispose_all(&mut self) -> usize {
        let live = std::mem::take(&mut self.live);
        let count = live.len();
        for (_, mut resource) in live {
            resource.dispose();
        }
        if count > 0 {
            track_debug!("disposed {} tracked resources", count);
        }
        count
    }

    pub fn is_registered(&self, kind: JobKind, slot: Slot) -> bool {
        self.live.contains_key(&(kind, slot))
    }

    /// Registered resources that are still running.
    pub fn live_count(&self) -> usize {
        self.live.values().filter(|resource| resource.is_live()).count()
    }

    pub fn len(&self) -> usize {
        self.live.len()
    }

    pub fn is_empty(&self) -> bool {
        self.live.is_empty()
    }
}

impl Drop for ResourceJanitor {
    fn drop(&mut self) {
        self.dispose_all();
    }
}

/// A spawned one-shot task, aborted on dispose.
pub struct TaskGuard {
    task: JoinHandle<()>,
}

impl TaskGuard {
    pub fn new(task: JoinHandle<()>) -> Self {
        Self { task }
    }
}

impl Disposable for TaskGuard {
    fn dispose(&mut self) {
        self.task.abort();
    }

    fn is_live(&self) -> bool {
        !self.task.is_finished()
    }
}
