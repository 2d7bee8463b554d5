//! Per-processor scheduler state
//!
//! Each processor records whether it is online, which scheduler instance owns
//! it, the task it is executing and the last floating-point user whose
//! coprocessor state is still live in its registers.
//!
//! ## Lock Hierarchy
//!
//! All fields except the statistics counters are only changed with the
//! scheduler system lock held. The counters are atomics so statistics can be
//! sampled without it.

use core::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use super::types::{SchedulerId, TaskId};

#[repr(C, align(64))]
pub struct Processor {
    /// Processor index
    pub index: usize,

    /// Present and started by the platform
    pub online: bool,

    /// Scheduler instance owning this processor
    pub owner: Option<SchedulerId>,

    /// Task currently executing (None = idle)
    pub executing: Option<TaskId>,

    /// Task whose floating-point context is loaded in this processor
    pub fp_owner: Option<TaskId>,

    /// A scheduling decision affecting this processor was deferred
    need_resched: AtomicBool,

    /// Context switches performed on this processor
    pub context_switches: AtomicU64,

    /// Preemptions on this processor
    pub preemptions: AtomicU64,

    /// Ticks spent without a task
    pub idle_ticks: AtomicU64,

    /// Tasks migrated to this processor
    pub migrations_in: AtomicU64,
}

impl Processor {
    pub const fn new(index: usize, online: bool) -> Self {
        Self {
            index,
            online,
            owner: None,
            executing: None,
            fp_owner: None,
            need_resched: AtomicBool::new(false),
            context_switches: AtomicU64::new(0),
            preemptions: AtomicU64::new(0),
            idle_ticks: AtomicU64::new(0),
            migrations_in: AtomicU64::new(0),
        }
    }

    #[inline]
    pub fn is_idle(&self) -> bool {
        self.executing.is_none()
    }

    /// Set the need_resched flag
    pub fn set_need_resched(&self, value: bool) {
        self.need_resched.store(value, Ordering::Release);
    }

    /// Check and clear the need_resched flag
    pub fn check_need_resched(&self) -> bool {
        self.need_resched.swap(false, Ordering::AcqRel)
    }

    pub fn need_resched(&self) -> bool {
        self.need_resched.load(Ordering::Acquire)
    }

    pub fn stats(&self) -> PerCpuStats {
        PerCpuStats {
            cpu_id: self.index,
            online: self.online,
            owner: self.owner,
            executing: self.executing,
            context_switches: self.context_switches.load(Ordering::Relaxed),
            preemptions: self.preemptions.load(Ordering::Relaxed),
            idle_ticks: self.idle_ticks.load(Ordering::Relaxed),
            migrations_in: self.migrations_in.load(Ordering::Relaxed),
        }
    }
}

/// Snapshot of one processor's counters
#[derive(Clone, Copy, Debug)]
pub struct PerCpuStats {
    pub cpu_id: usize,
    pub online: bool,
    pub owner: Option<SchedulerId>,
    pub executing: Option<TaskId>,
    pub context_switches: u64,
    pub preemptions: u64,
    pub idle_ticks: u64,
    pub migrations_in: u64,
}
