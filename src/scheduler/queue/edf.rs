//! Earliest-deadline-first ready queue
//!
//! Tasks are kept in a balanced tree ordered by `(key, arrival)`. A
//! deadline-driven task's key is its absolute deadline; a background task's key
//! is its static priority offset into a reserved range above every deadline
//! key, so any active deadline strictly dominates every background task and
//! background tasks among themselves behave like plain priority scheduling.

use alloc::collections::BTreeMap;
use alloc::vec::Vec;

use super::super::types::{Priority, TaskId};
use super::RunQueue;

/// First key of the background range: `min(i64::MAX, 2^62 - 1)`.
pub const EDF_BACKGROUND_BASE: u64 = (1u64 << 62) - 1;

/// Scheduling key of a task under EDF.
///
/// `deadline` is the absolute deadline of a deadline-driven task; `None` (or a
/// throttled server) selects the background range.
#[inline]
pub fn edf_key(deadline: Option<u64>, priority: Priority, throttled: bool) -> u64 {
    match deadline {
        Some(d) if !throttled => d.min(EDF_BACKGROUND_BASE - 1),
        _ => EDF_BACKGROUND_BASE + priority as u64,
    }
}

pub struct EdfQueue {
    tree: BTreeMap<(u64, i64), TaskId>,
    slots: Vec<Option<(u64, i64)>>,
    next_tail: i64,
    next_head: i64,
}

impl EdfQueue {
    pub const fn new() -> Self {
        Self {
            tree: BTreeMap::new(),
            slots: Vec::new(),
            next_tail: 0,
            next_head: -1,
        }
    }

    fn record(&mut self, id: TaskId, node: (u64, i64)) {
        let idx = id.index();
        if idx >= self.slots.len() {
            self.slots.resize(idx + 1, None);
        }
        self.slots[idx] = Some(node);
        self.tree.insert(node, id);
    }

    /// Earliest key currently queued.
    pub fn earliest_key(&self) -> Option<u64> {
        self.tree.keys().next().map(|(key, _)| *key)
    }
}

impl Default for EdfQueue {
    fn default() -> Self {
        Self::new()
    }
}

impl RunQueue for EdfQueue {
    fn enqueue(&mut self, id: TaskId, key: u64) {
        let seq = self.next_tail;
        self.next_tail += 1;
        self.record(id, (key, seq));
    }

    fn enqueue_first(&mut self, id: TaskId, key: u64) {
        let seq = self.next_head;
        self.next_head -= 1;
        self.record(id, (key, seq));
    }

    fn extract_highest(&mut self) -> Option<TaskId> {
        let (node, id) = self.tree.pop_first()?;
        debug_assert_eq!(self.slots[id.index()], Some(node));
        self.slots[id.index()] = None;
        Some(id)
    }

    fn peek_highest(&self) -> Option<TaskId> {
        self.tree.values().next().copied()
    }

    fn remove(&mut self, id: TaskId) -> bool {
        let Some(node) = self.slots.get_mut(id.index()).and_then(Option::take) else {
            return false;
        };
        self.tree.remove(&node).is_some()
    }

    fn contains(&self, id: TaskId) -> bool {
        self.slots
            .get(id.index())
            .map_or(false, |slot| slot.is_some())
    }

    fn key_of(&self, id: TaskId) -> Option<u64> {
        self.slots
            .get(id.index())
            .copied()
            .flatten()
            .map(|(key, _)| key)
    }

    fn len(&self) -> usize {
        self.tree.len()
    }

    fn first_matching(&self, pred: &mut dyn FnMut(TaskId, u64) -> bool) -> Option<TaskId> {
        self.tree
            .iter()
            .find(|((key, _), id)| pred(**id, *key))
            .map(|(_, id)| *id)
    }
}
