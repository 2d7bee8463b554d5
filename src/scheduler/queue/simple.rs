//! Simple priority ready queue
//!
//! A single chain kept sorted by key. Enqueue scans for the insertion point,
//! extraction takes the head. Memory use is one chain regardless of the
//! number of priority levels.

use super::super::chain::{Chain, ChainLinks};
use super::super::types::TaskId;
use super::RunQueue;

pub struct SimpleQueue {
    chain: Chain,
    links: ChainLinks,
}

impl SimpleQueue {
    pub const fn new() -> Self {
        Self {
            chain: Chain::new(),
            links: ChainLinks::new(),
        }
    }

    /// First queued task for which `stop(key)` holds.
    fn find(&self, mut stop: impl FnMut(u64) -> bool) -> Option<TaskId> {
        self.chain
            .iter(&self.links)
            .find(|(_, key)| stop(*key))
            .map(|(id, _)| id)
    }
}

impl Default for SimpleQueue {
    fn default() -> Self {
        Self::new()
    }
}

impl RunQueue for SimpleQueue {
    fn enqueue(&mut self, id: TaskId, key: u64) {
        match self.find(|k| k > key) {
            Some(at) => self.chain.insert_before(&mut self.links, at, id, key),
            None => self.chain.push_back(&mut self.links, id, key),
        }
    }

    fn enqueue_first(&mut self, id: TaskId, key: u64) {
        match self.find(|k| k >= key) {
            Some(at) => self.chain.insert_before(&mut self.links, at, id, key),
            None => self.chain.push_back(&mut self.links, id, key),
        }
    }

    fn extract_highest(&mut self) -> Option<TaskId> {
        self.chain.pop_front(&mut self.links)
    }

    fn peek_highest(&self) -> Option<TaskId> {
        self.chain.head()
    }

    fn remove(&mut self, id: TaskId) -> bool {
        self.chain.unlink(&mut self.links, id)
    }

    fn contains(&self, id: TaskId) -> bool {
        self.links.is_linked(id)
    }

    fn key_of(&self, id: TaskId) -> Option<u64> {
        self.links.key(id)
    }

    fn len(&self) -> usize {
        self.chain.len()
    }

    fn first_matching(&self, pred: &mut dyn FnMut(TaskId, u64) -> bool) -> Option<TaskId> {
        self.chain
            .iter(&self.links)
            .find(|(id, key)| pred(*id, *key))
            .map(|(id, _)| id)
    }
}
