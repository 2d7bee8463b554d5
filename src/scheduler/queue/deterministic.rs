//! Deterministic priority ready queue
//!
//! One FIFO chain per priority level and a two-level bitmap of non-empty
//! levels. Finding the highest ready level is two `trailing_zeros` on 64-bit
//! words, so every operation is O(1) independent of the number of tasks.

use alloc::vec;
use alloc::vec::Vec;

use super::super::chain::{Chain, ChainLinks};
use super::super::types::{Priority, TaskId};
use super::RunQueue;

/// Two-level bitmap over priority levels (up to 64 * 64 levels).
pub struct PriorityBitmap {
    major: u64,
    minor: Vec<u64>,
}

impl PriorityBitmap {
    pub fn new(levels: usize) -> Self {
        let words = levels.div_ceil(64).clamp(1, 64);
        Self {
            major: 0,
            minor: vec![0; words],
        }
    }

    #[inline]
    pub fn insert(&mut self, level: usize) {
        let (hi, lo) = (level / 64, level % 64);
        self.minor[hi] |= 1u64 << lo;
        self.major |= 1u64 << hi;
    }

    #[inline]
    pub fn remove(&mut self, level: usize) {
        let (hi, lo) = (level / 64, level % 64);
        self.minor[hi] &= !(1u64 << lo);
        if self.minor[hi] == 0 {
            self.major &= !(1u64 << hi);
        }
    }

    #[inline]
    pub fn is_set(&self, level: usize) -> bool {
        let (hi, lo) = (level / 64, level % 64);
        self.minor.get(hi).map_or(false, |w| (w >> lo) & 1 == 1)
    }

    /// Lowest set level, i.e. the most important non-empty priority.
    #[inline]
    pub fn highest(&self) -> Option<usize> {
        if self.major == 0 {
            return None;
        }
        let hi = self.major.trailing_zeros() as usize;
        let lo = self.minor[hi].trailing_zeros() as usize;
        Some(hi * 64 + lo)
    }

    /// Lowest set level that is `>= from`.
    pub fn next_from(&self, from: usize) -> Option<usize> {
        let (mut hi, lo) = (from / 64, from % 64);
        if hi >= self.minor.len() {
            return None;
        }
        let word = self.minor[hi] & (u64::MAX << lo);
        if word != 0 {
            return Some(hi * 64 + word.trailing_zeros() as usize);
        }
        hi += 1;
        if hi >= 64 {
            return None;
        }
        let rest = self.major & (u64::MAX << hi);
        if rest == 0 {
            return None;
        }
        let hi = rest.trailing_zeros() as usize;
        Some(hi * 64 + self.minor[hi].trailing_zeros() as usize)
    }

    pub fn is_empty(&self) -> bool {
        self.major == 0
    }
}

pub struct DeterministicQueue {
    chains: Vec<Chain>,
    links: ChainLinks,
    bitmap: PriorityBitmap,
    count: usize,
}

impl DeterministicQueue {
    pub fn new(max_priority: Priority) -> Self {
        let levels = max_priority as usize + 1;
        Self {
            chains: vec![Chain::new(); levels],
            links: ChainLinks::new(),
            bitmap: PriorityBitmap::new(levels),
            count: 0,
        }
    }

    pub fn levels(&self) -> usize {
        self.chains.len()
    }

    #[inline]
    fn level(&self, key: u64) -> usize {
        (key as usize).min(self.chains.len() - 1)
    }

    /// Number of tasks ready at `priority`.
    pub fn level_len(&self, priority: Priority) -> usize {
        self.chains
            .get(priority as usize)
            .map_or(0, |chain| chain.len())
    }
}

impl RunQueue for DeterministicQueue {
    fn enqueue(&mut self, id: TaskId, key: u64) {
        let level = self.level(key);
        self.chains[level].push_back(&mut self.links, id, key);
        self.bitmap.insert(level);
        self.count += 1;
    }

    fn enqueue_first(&mut self, id: TaskId, key: u64) {
        let level = self.level(key);
        self.chains[level].push_front(&mut self.links, id, key);
        self.bitmap.insert(level);
        self.count += 1;
    }

    fn extract_highest(&mut self) -> Option<TaskId> {
        let level = self.bitmap.highest()?;
        let id = self.chains[level].pop_front(&mut self.links)?;
        if self.chains[level].is_empty() {
            self.bitmap.remove(level);
        }
        self.count -= 1;
        Some(id)
    }

    fn peek_highest(&self) -> Option<TaskId> {
        let level = self.bitmap.highest()?;
        self.chains[level].head()
    }

    fn remove(&mut self, id: TaskId) -> bool {
        let Some(key) = self.links.key(id) else {
            return false;
        };
        let level = self.level(key);
        if !self.chains[level].unlink(&mut self.links, id) {
            return false;
        }
        if self.chains[level].is_empty() {
            self.bitmap.remove(level);
        }
        self.count -= 1;
        true
    }

    fn contains(&self, id: TaskId) -> bool {
        self.links.is_linked(id)
    }

    fn key_of(&self, id: TaskId) -> Option<u64> {
        self.links.key(id)
    }

    fn len(&self) -> usize {
        self.count
    }

    fn first_matching(&self, pred: &mut dyn FnMut(TaskId, u64) -> bool) -> Option<TaskId> {
        let mut level = self.bitmap.highest();
        while let Some(l) = level {
            for (id, key) in self.chains[l].iter(&self.links) {
                if pred(id, key) {
                    return Some(id);
                }
            }
            level = self.bitmap.next_from(l + 1);
        }
        None
    }
}
