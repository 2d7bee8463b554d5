//! Timeout watchdog
//!
//! Blocked tasks may carry one armed timeout. Timeouts fire in expiry order,
//! and in arming order among equal expiries. Any external unblock, restart or
//! deletion disarms the timeout before it can fire.

use alloc::collections::BTreeMap;
use alloc::vec::Vec;

use super::core::System;
use super::error::{SchedError, SchedResult};
use super::types::{TaskId, TaskState, WaitFlags};

/// (expiry tick, arming sequence)
pub type TimeoutKey = (u64, u64);

pub struct TimeoutQueue {
    armed: BTreeMap<TimeoutKey, TaskId>,
    seq: u64,
}

impl TimeoutQueue {
    pub const fn new() -> Self {
        Self {
            armed: BTreeMap::new(),
            seq: 0,
        }
    }

    pub fn arm(&mut self, id: TaskId, expiry: u64) -> TimeoutKey {
        let key = (expiry, self.seq);
        self.seq += 1;
        self.armed.insert(key, id);
        key
    }

    pub fn disarm(&mut self, key: TimeoutKey) -> bool {
        self.armed.remove(&key).is_some()
    }

    /// Remove and return every timeout with expiry `<= now`, in firing order.
    pub fn expire(&mut self, now: u64) -> Vec<TaskId> {
        let mut fired = Vec::new();
        while let Some(entry) = self.armed.first_entry() {
            if entry.key().0 > now {
                break;
            }
            fired.push(entry.remove());
        }
        fired
    }

    pub fn next_expiry(&self) -> Option<u64> {
        self.armed.keys().next().map(|(expiry, _)| *expiry)
    }

    pub fn len(&self) -> usize {
        self.armed.len()
    }

    pub fn is_empty(&self) -> bool {
        self.armed.is_empty()
    }
}

impl Default for TimeoutQueue {
    fn default() -> Self {
        Self::new()
    }
}

impl System {
    /// Block `id` for `reason` and arm a timeout `ticks` from now.
    ///
    /// `ticks == 0` waits without a timeout.
    pub fn block_with_timeout(
        &mut self,
        id: TaskId,
        reason: WaitFlags,
        ticks: u64,
    ) -> SchedResult<()> {
        self.block(id, reason)?;
        if ticks > 0 {
            self.arm_timeout(id, ticks);
        }
        Ok(())
    }

    /// Timed delay. A zero delay yields the processor instead.
    pub fn wake_after(&mut self, id: TaskId, ticks: u64) -> SchedResult<()> {
        if ticks == 0 {
            return self.yield_now(id);
        }
        self.block_with_timeout(id, WaitFlags::DELAY, ticks)
    }

    /// Ticks until the timeout of `id` fires, if one is armed.
    pub fn remaining_timeout(&self, id: TaskId) -> SchedResult<Option<u64>> {
        let tcb = self.tasks.lookup(id)?;
        Ok(tcb.timeout.map(|(expiry, _)| expiry.saturating_sub(self.now)))
    }

    pub(crate) fn arm_timeout(&mut self, id: TaskId, ticks: u64) {
        self.disarm_timeout(id);
        let expiry = self.now.saturating_add(ticks);
        let key = self.timeouts.arm(id, expiry);
        if let Some(tcb) = self.tasks.get_mut(id) {
            tcb.timeout = Some(key);
        }
    }

    pub(crate) fn disarm_timeout(&mut self, id: TaskId) {
        let Some(key) = self.tasks.get_mut(id).and_then(|tcb| tcb.timeout.take()) else {
            return;
        };
        self.timeouts.disarm(key);
    }

    /// Fire expired timeouts: the awaited condition is abandoned, suspension
    /// is left in place.
    pub(crate) fn fire_timeouts(&mut self) {
        for id in self.timeouts.expire(self.now) {
            let Some(tcb) = self.tasks.get_mut(id) else {
                continue;
            };
            tcb.timeout = None;
            if tcb.state != TaskState::Blocked {
                continue;
            }
            self.stats.timeouts_fired += 1;
            crate::ktrace!("Timeout fired for task {}", id);
            if let Err(err) = self.clear_wait(id, WaitFlags::CONDITION) {
                crate::kwarn!("Timeout of task {} not delivered: {}", id, err);
            }
        }
    }

    pub(crate) fn ensure_blocked(&self, id: TaskId) -> SchedResult<()> {
        match self.tasks.state(id) {
            TaskState::NonExistent => Err(SchedError::InvalidId),
            TaskState::Blocked => Ok(()),
            _ => Err(SchedError::IncorrectState),
        }
    }
}
