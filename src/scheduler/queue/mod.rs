//! Ready-queue algorithms
//!
//! Every scheduler instance keeps its ready tasks in exactly one of these
//! structures. All of them order tasks by an unsigned scheduling key (lower
//! runs first) and keep arrival order among equal keys:
//!
//! - `deterministic`: one FIFO per priority level plus a two-level bitmap, O(1)
//! - `simple`: a single sorted chain, O(n) enqueue, O(1) extract
//! - `edf`: an ordered tree keyed by (deadline key, arrival), O(log n)
//!
//! `enqueue` appends behind equal keys; `enqueue_first` places the task ahead
//! of equal keys and is used for tasks that lost their processor to
//! preemption, so they resume before later arrivals of the same priority.

mod deterministic;
mod edf;
mod simple;

pub use deterministic::{DeterministicQueue, PriorityBitmap};
pub use edf::{edf_key, EdfQueue, EDF_BACKGROUND_BASE};
pub use simple::SimpleQueue;

use super::types::{Priority, TaskId};

/// Uniform contract of every ready-queue algorithm.
pub trait RunQueue {
    /// Append `id` behind every task with a key `<= key`.
    fn enqueue(&mut self, id: TaskId, key: u64);

    /// Insert `id` ahead of every task with a key `>= key`.
    fn enqueue_first(&mut self, id: TaskId, key: u64);

    /// Remove and return the first task.
    fn extract_highest(&mut self) -> Option<TaskId>;

    /// The first task without removing it.
    fn peek_highest(&self) -> Option<TaskId>;

    /// Remove `id`; returns `false` if it was not queued.
    fn remove(&mut self, id: TaskId) -> bool;

    fn contains(&self, id: TaskId) -> bool;

    /// Key the task was queued with.
    fn key_of(&self, id: TaskId) -> Option<u64>;

    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Walk tasks in scheduling order and return the first one for which
    /// `pred(id, key)` holds.
    fn first_matching(&self, pred: &mut dyn FnMut(TaskId, u64) -> bool) -> Option<TaskId>;

    /// Move a queued task to its new key, behind its new equals.
    fn reposition(&mut self, id: TaskId, key: u64) -> bool {
        if !self.remove(id) {
            return false;
        }
        self.enqueue(id, key);
        true
    }
}

/// Storage variant chosen per scheduler instance.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum QueueKind {
    Deterministic,
    Simple,
    Edf,
}

/// Closed set of ready-queue structures, dispatched statically.
pub enum ReadyQueue {
    Deterministic(DeterministicQueue),
    Simple(SimpleQueue),
    Edf(EdfQueue),
}

impl ReadyQueue {
    pub fn new(kind: QueueKind, max_priority: Priority) -> Self {
        match kind {
            QueueKind::Deterministic => {
                ReadyQueue::Deterministic(DeterministicQueue::new(max_priority))
            }
            QueueKind::Simple => ReadyQueue::Simple(SimpleQueue::new()),
            QueueKind::Edf => ReadyQueue::Edf(EdfQueue::new()),
        }
    }

    pub fn kind(&self) -> QueueKind {
        match self {
            ReadyQueue::Deterministic(_) => QueueKind::Deterministic,
            ReadyQueue::Simple(_) => QueueKind::Simple,
            ReadyQueue::Edf(_) => QueueKind::Edf,
        }
    }

    /// Task ids in scheduling order.
    pub fn order(&self) -> alloc::vec::Vec<TaskId> {
        let mut out = alloc::vec::Vec::with_capacity(self.len());
        self.first_matching(&mut |id, _| {
            out.push(id);
            false
        });
        out
    }
}

macro_rules! forward {
    ($self:ident, $q:ident => $body:expr) => {
        match $self {
            ReadyQueue::Deterministic($q) => $body,
            ReadyQueue::Simple($q) => $body,
            ReadyQueue::Edf($q) => $body,
        }
    };
}

impl RunQueue for ReadyQueue {
    fn enqueue(&mut self, id: TaskId, key: u64) {
        forward!(self, q => q.enqueue(id, key))
    }

    fn enqueue_first(&mut self, id: TaskId, key: u64) {
        forward!(self, q => q.enqueue_first(id, key))
    }

    fn extract_highest(&mut self) -> Option<TaskId> {
        forward!(self, q => q.extract_highest())
    }

    fn peek_highest(&self) -> Option<TaskId> {
        forward!(self, q => q.peek_highest())
    }

    fn remove(&mut self, id: TaskId) -> bool {
        forward!(self, q => q.remove(id))
    }

    fn contains(&self, id: TaskId) -> bool {
        forward!(self, q => q.contains(id))
    }

    fn key_of(&self, id: TaskId) -> Option<u64> {
        forward!(self, q => q.key_of(id))
    }

    fn len(&self) -> usize {
        forward!(self, q => q.len())
    }

    fn first_matching(&self, pred: &mut dyn FnMut(TaskId, u64) -> bool) -> Option<TaskId> {
        forward!(self, q => q.first_matching(pred))
    }

    fn reposition(&mut self, id: TaskId, key: u64) -> bool {
        forward!(self, q => q.reposition(id, key))
    }
}
