//! Scheduler instances
//!
//! An instance binds one ready-queue algorithm to the set of processors it
//! currently owns. It translates a task's priority/deadline state into the
//! scheduling key its queue orders by.

use super::queue::{edf_key, QueueKind, ReadyQueue, RunQueue};
use super::table::Tcb;
use super::types::{CpuMask, ObjectName, Priority, SchedulerId, TaskId};

/// Scheduling algorithm of an instance, fixed at configuration time.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SchedAlgorithm {
    DeterministicPriority,
    SimplePriority,
    Edf,
    Cbs,
    SmpDeterministicPriority,
    SmpSimplePriority,
    SmpEdf,
    SmpPriorityAffinity,
}

impl SchedAlgorithm {
    pub const fn as_str(self) -> &'static str {
        match self {
            SchedAlgorithm::DeterministicPriority => "Deterministic Priority",
            SchedAlgorithm::SimplePriority => "Simple Priority",
            SchedAlgorithm::Edf => "EDF",
            SchedAlgorithm::Cbs => "CBS",
            SchedAlgorithm::SmpDeterministicPriority => "SMP Deterministic Priority",
            SchedAlgorithm::SmpSimplePriority => "SMP Simple Priority",
            SchedAlgorithm::SmpEdf => "SMP EDF",
            SchedAlgorithm::SmpPriorityAffinity => "SMP Priority Affinity",
        }
    }

    pub const fn queue_kind(self) -> QueueKind {
        match self {
            SchedAlgorithm::DeterministicPriority
            | SchedAlgorithm::SmpDeterministicPriority
            | SchedAlgorithm::SmpPriorityAffinity => QueueKind::Deterministic,
            SchedAlgorithm::SimplePriority | SchedAlgorithm::SmpSimplePriority => {
                QueueKind::Simple
            }
            SchedAlgorithm::Edf | SchedAlgorithm::Cbs | SchedAlgorithm::SmpEdf => QueueKind::Edf,
        }
    }

    /// Keys are deadlines rather than priorities.
    pub const fn is_deadline_driven(self) -> bool {
        matches!(
            self,
            SchedAlgorithm::Edf | SchedAlgorithm::Cbs | SchedAlgorithm::SmpEdf
        )
    }

    pub const fn is_smp(self) -> bool {
        matches!(
            self,
            SchedAlgorithm::SmpDeterministicPriority
                | SchedAlgorithm::SmpSimplePriority
                | SchedAlgorithm::SmpEdf
                | SchedAlgorithm::SmpPriorityAffinity
        )
    }

    /// Accepts affinity sets other than "one processor" or "all processors".
    pub const fn supports_arbitrary_affinity(self) -> bool {
        matches!(self, SchedAlgorithm::SmpPriorityAffinity)
    }

    pub const fn supports_cbs(self) -> bool {
        matches!(self, SchedAlgorithm::Cbs)
    }
}

pub struct SchedulerInstance {
    pub id: SchedulerId,
    pub name: ObjectName,
    pub algorithm: SchedAlgorithm,
    pub max_priority: Priority,
    pub processors: CpuMask,
    pub(crate) ready: ReadyQueue,
    pub(crate) need_resched: bool,
}

impl SchedulerInstance {
    pub fn new(
        id: SchedulerId,
        name: ObjectName,
        algorithm: SchedAlgorithm,
        max_priority: Priority,
    ) -> Self {
        Self {
            id,
            name,
            algorithm,
            max_priority,
            processors: CpuMask::empty(),
            ready: ReadyQueue::new(algorithm.queue_kind(), max_priority),
            need_resched: false,
        }
    }

    /// Scheduling key of `tcb` under this instance's algorithm.
    #[inline]
    pub fn key_of(&self, tcb: &Tcb) -> u64 {
        if self.algorithm.is_deadline_driven() {
            edf_key(tcb.deadline, tcb.priority, tcb.throttled())
        } else {
            tcb.priority as u64
        }
    }

    #[inline]
    pub fn valid_priority(&self, priority: Priority) -> bool {
        priority <= self.max_priority
    }

    /// Queue a task that just became ready, behind its equals.
    pub fn enqueue(&mut self, tcb: &Tcb) {
        let key = self.key_of(tcb);
        self.ready.enqueue(tcb.id, key);
        self.need_resched = true;
    }

    /// Queue a task that lost its processor, ahead of its equals.
    pub fn enqueue_first(&mut self, tcb: &Tcb) {
        let key = self.key_of(tcb);
        self.ready.enqueue_first(tcb.id, key);
        self.need_resched = true;
    }

    pub fn remove(&mut self, id: TaskId) -> bool {
        let removed = self.ready.remove(id);
        if removed {
            self.need_resched = true;
        }
        removed
    }

    /// Re-key a ready task after a priority or deadline change.
    pub fn reposition(&mut self, tcb: &Tcb) -> bool {
        let key = self.key_of(tcb);
        let moved = self.ready.reposition(tcb.id, key);
        self.need_resched = true;
        moved
    }

    pub fn ready_queue(&self) -> &ReadyQueue {
        &self.ready
    }

    /// Whether the instance accepts `mask` as a task affinity.
    pub fn accepts_affinity(&self, mask: &CpuMask) -> bool {
        if !mask.intersects(&self.processors) {
            return false;
        }
        self.algorithm.supports_arbitrary_affinity() || mask.contains_all(&self.processors)
    }

    pub fn processor_count(&self) -> usize {
        self.processors.count()
    }
}
