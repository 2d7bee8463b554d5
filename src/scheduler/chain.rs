//! Index-linked FIFO chains
//!
//! Ready queues keep their tasks in doubly linked chains whose links live in a
//! side table owned by the queue and indexed by [`TaskId`]. Unlinking a task is
//! O(1) and a task never touches its own linkage.

use alloc::vec::Vec;

use super::types::TaskId;

#[derive(Clone, Copy, Default)]
struct Link {
    prev: Option<TaskId>,
    next: Option<TaskId>,
    key: u64,
    linked: bool,
}

/// Link storage shared by every chain of one ready queue.
#[derive(Default)]
pub struct ChainLinks {
    links: Vec<Link>,
}

impl ChainLinks {
    pub const fn new() -> Self {
        Self { links: Vec::new() }
    }

    fn slot(&mut self, id: TaskId) -> &mut Link {
        let idx = id.index();
        if idx >= self.links.len() {
            self.links.resize(idx + 1, Link::default());
        }
        &mut self.links[idx]
    }

    #[inline]
    pub fn is_linked(&self, id: TaskId) -> bool {
        self.links.get(id.index()).map_or(false, |l| l.linked)
    }

    /// Key recorded when the task was linked
    #[inline]
    pub fn key(&self, id: TaskId) -> Option<u64> {
        self.links
            .get(id.index())
            .filter(|l| l.linked)
            .map(|l| l.key)
    }

    #[inline]
    fn next(&self, id: TaskId) -> Option<TaskId> {
        self.links.get(id.index()).and_then(|l| l.next)
    }
}

/// Head/tail anchor of one chain.
#[derive(Clone, Copy, Default)]
pub struct Chain {
    head: Option<TaskId>,
    tail: Option<TaskId>,
    len: usize,
}

impl Chain {
    pub const fn new() -> Self {
        Self {
            head: None,
            tail: None,
            len: 0,
        }
    }

    #[inline]
    pub fn head(&self) -> Option<TaskId> {
        self.head
    }

    #[inline]
    pub fn tail(&self) -> Option<TaskId> {
        self.tail
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.len
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn push_back(&mut self, links: &mut ChainLinks, id: TaskId, key: u64) {
        let old_tail = self.tail;
        *links.slot(id) = Link {
            prev: old_tail,
            next: None,
            key,
            linked: true,
        };
        match old_tail {
            Some(t) => links.slot(t).next = Some(id),
            None => self.head = Some(id),
        }
        self.tail = Some(id);
        self.len += 1;
    }

    pub fn push_front(&mut self, links: &mut ChainLinks, id: TaskId, key: u64) {
        let old_head = self.head;
        *links.slot(id) = Link {
            prev: None,
            next: old_head,
            key,
            linked: true,
        };
        match old_head {
            Some(h) => links.slot(h).prev = Some(id),
            None => self.tail = Some(id),
        }
        self.head = Some(id);
        self.len += 1;
    }

    /// Link `id` immediately before `at`, which must be on this chain.
    pub fn insert_before(&mut self, links: &mut ChainLinks, at: TaskId, id: TaskId, key: u64) {
        let prev = links.slot(at).prev;
        *links.slot(id) = Link {
            prev,
            next: Some(at),
            key,
            linked: true,
        };
        links.slot(at).prev = Some(id);
        match prev {
            Some(p) => links.slot(p).next = Some(id),
            None => self.head = Some(id),
        }
        self.len += 1;
    }

    /// Unlink `id`; returns `false` if it was not linked.
    pub fn unlink(&mut self, links: &mut ChainLinks, id: TaskId) -> bool {
        if !links.is_linked(id) {
            return false;
        }
        let Link { prev, next, .. } = *links.slot(id);
        match prev {
            Some(p) => links.slot(p).next = next,
            None => self.head = next,
        }
        match next {
            Some(n) => links.slot(n).prev = prev,
            None => self.tail = prev,
        }
        *links.slot(id) = Link::default();
        self.len -= 1;
        true
    }

    pub fn pop_front(&mut self, links: &mut ChainLinks) -> Option<TaskId> {
        let head = self.head?;
        self.unlink(links, head);
        Some(head)
    }

    pub fn iter<'a>(&self, links: &'a ChainLinks) -> ChainIter<'a> {
        ChainIter {
            links,
            next: self.head,
        }
    }
}

pub struct ChainIter<'a> {
    links: &'a ChainLinks,
    next: Option<TaskId>,
}

impl Iterator for ChainIter<'_> {
    type Item = (TaskId, u64);

    fn next(&mut self) -> Option<Self::Item> {
        let id = self.next?;
        self.next = self.links.next(id);
        Some((id, self.links.key(id).unwrap_or(0)))
    }
}
