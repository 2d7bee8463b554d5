//! Task life cycle
//!
//! Creation, start, restart and deletion, plus the blocked-state bookkeeping
//! used by the external managers. A blocked task carries a set of wait
//! reasons and only becomes ready again once every reason is cleared.

use crate::{kdebug, ktrace};

use super::core::System;
use super::error::{SchedError, SchedResult};
use super::table::TaskParams;
use super::types::{TaskId, TaskState, WaitFlags};

impl System {
    /// Create a dormant task. The scheduler does not own it until started.
    pub fn create_task(&mut self, params: TaskParams) -> SchedResult<TaskId> {
        let instance = self
            .instances
            .get(params.scheduler.index())
            .ok_or(SchedError::InvalidId)?;
        if !instance.valid_priority(params.priority) {
            return Err(SchedError::InvalidPriority);
        }
        if params.affinity != super::types::CpuMask::all()
            && !instance.accepts_affinity(&params.affinity)
        {
            return Err(SchedError::InvalidNumber);
        }

        let id = self.tasks.create(params)?;
        kdebug!(
            "Task {} '{}' created on scheduler '{}' with priority {}",
            id,
            params.name,
            instance.name,
            params.priority
        );
        Ok(id)
    }

    /// Dormant -> ready: the scheduler takes ownership of the task.
    pub fn start_task(&mut self, id: TaskId) -> SchedResult<()> {
        match self.tasks.state(id) {
            TaskState::NonExistent => return Err(SchedError::InvalidId),
            TaskState::Dormant => {}
            _ => return Err(SchedError::IncorrectState),
        }
        self.platform.initialize_context(id);
        self.make_ready(id);
        kdebug!("Task {} started", id);
        self.dispatch();
        Ok(())
    }

    /// Re-enter the ready state with the creation parameters, discarding
    /// any wait, deadline, server and pinning.
    pub fn restart_task(&mut self, id: TaskId) -> SchedResult<()> {
        match self.tasks.state(id) {
            TaskState::NonExistent => return Err(SchedError::InvalidId),
            TaskState::Dormant => return Err(SchedError::IncorrectState),
            _ => {}
        }
        self.detach(id);

        let ticks = self.ticks_per_timeslice;
        let tcb = self.tasks.lookup_mut(id)?;
        let params = tcb.initial;
        tcb.wait = WaitFlags::empty();
        tcb.base_priority = params.priority;
        tcb.priority = params.priority;
        tcb.preemptible = params.preemptible;
        tcb.timeslice = params.timeslice;
        tcb.timeslice_remaining = ticks;
        tcb.fp = params.fp;
        tcb.affinity = params.affinity;
        tcb.pinned = None;
        tcb.home = params.scheduler;
        tcb.deadline = None;
        tcb.cbs = None;

        self.platform.initialize_context(id);
        self.make_ready(id);
        kdebug!("Task {} restarted", id);
        self.dispatch();
        Ok(())
    }

    /// Any state -> non-existent. All queue, processor and timeout linkage
    /// is released before the slot is freed.
    pub fn delete_task(&mut self, id: TaskId) -> SchedResult<()> {
        let home = self.tasks.lookup(id)?.home;
        self.detach(id);
        self.tasks.free(id);
        self.mark(home);
        kdebug!("Task {} deleted", id);
        self.dispatch();
        Ok(())
    }

    /// Remove `id` from its ready queue, its processor and the timeout queue.
    fn detach(&mut self, id: TaskId) {
        self.disarm_timeout(id);
        let Some(tcb) = self.tasks.get(id) else {
            return;
        };
        let (state, home, cpu) = (tcb.state, tcb.home, tcb.cpu);
        if state == TaskState::Ready {
            self.instances[home.index()].remove(id);
        }
        if let Some(cpu) = cpu {
            if self.processors[cpu].executing == Some(id) {
                self.discard(cpu);
            }
        }
        // The live FP registers no longer belong to any context.
        for processor in self.processors.iter_mut() {
            if processor.fp_owner == Some(id) {
                processor.fp_owner = None;
            }
        }
        if let Some(tcb) = self.tasks.get_mut(id) {
            tcb.cpu = None;
            tcb.state = TaskState::Dormant;
        }
    }

    /// Add the suspension reason. A suspended task stays blocked until
    /// resumed, whatever else it waits for.
    pub fn suspend(&mut self, id: TaskId) -> SchedResult<()> {
        let tcb = self.tasks.lookup(id)?;
        if !tcb.state.is_started() || tcb.wait.contains(WaitFlags::SUSPENDED) {
            return Err(SchedError::IncorrectState);
        }
        self.enter_blocked(id, WaitFlags::SUSPENDED);
        self.dispatch();
        Ok(())
    }

    pub fn resume(&mut self, id: TaskId) -> SchedResult<()> {
        let tcb = self.tasks.lookup(id)?;
        if !tcb.wait.contains(WaitFlags::SUSPENDED) {
            return Err(SchedError::IncorrectState);
        }
        self.clear_wait(id, WaitFlags::SUSPENDED)?;
        self.dispatch();
        Ok(())
    }

    pub fn is_suspended(&self, id: TaskId) -> SchedResult<bool> {
        Ok(self.tasks.lookup(id)?.wait.contains(WaitFlags::SUSPENDED))
    }

    /// Block `id` waiting for `reason`.
    pub fn block(&mut self, id: TaskId, reason: WaitFlags) -> SchedResult<()> {
        if reason.is_empty() || reason.contains(WaitFlags::SUSPENDED) {
            return Err(SchedError::InvalidNumber);
        }
        if !self.tasks.lookup(id)?.state.is_started() {
            return Err(SchedError::IncorrectState);
        }
        self.enter_blocked(id, reason);
        self.dispatch();
        Ok(())
    }

    /// Clear `reason` from a blocked task; it becomes ready once nothing
    /// else holds it.
    pub fn unblock(&mut self, id: TaskId, reason: WaitFlags) -> SchedResult<()> {
        if reason.contains(WaitFlags::SUSPENDED) {
            return Err(SchedError::InvalidNumber);
        }
        self.ensure_blocked(id)?;
        if !self.tasks.lookup(id)?.wait.intersects(reason) {
            return Err(SchedError::IncorrectState);
        }
        self.clear_wait(id, reason)?;
        self.dispatch();
        Ok(())
    }

    /// The awaited condition is satisfied, whatever it was.
    pub fn release(&mut self, id: TaskId) -> SchedResult<()> {
        self.unblock(id, WaitFlags::CONDITION)
    }

    pub fn wait_flags(&self, id: TaskId) -> SchedResult<WaitFlags> {
        Ok(self.tasks.lookup(id)?.wait)
    }

    /// Give up the processor to the next equal-key peer, if any.
    pub fn yield_now(&mut self, id: TaskId) -> SchedResult<()> {
        let tcb = self.tasks.lookup(id)?;
        if tcb.state != TaskState::Executing {
            return Err(SchedError::IncorrectState);
        }
        let Some(cpu) = tcb.cpu else {
            return Err(SchedError::IncorrectState);
        };
        if !self.has_equal_peer(id, cpu) {
            return Ok(());
        }
        self.rotate(id);
        if let Some(tcb) = self.tasks.get_mut(id) {
            tcb.voluntary_switches += 1;
        }
        self.stats.total_voluntary_switches += 1;
        self.dispatch();
        Ok(())
    }

    fn enter_blocked(&mut self, id: TaskId, reason: WaitFlags) {
        let Some(tcb) = self.tasks.get_mut(id) else {
            return;
        };
        tcb.wait.insert(reason);
        let (state, home) = (tcb.state, tcb.home);
        match state {
            TaskState::Ready => {
                tcb.state = TaskState::Blocked;
                self.instances[home.index()].remove(id);
            }
            TaskState::Executing => {
                tcb.state = TaskState::Blocked;
                tcb.voluntary_switches += 1;
                self.stats.total_voluntary_switches += 1;
                self.mark(home);
            }
            _ => {}
        }
        ktrace!("Task {} blocked ({:?})", id, reason);
    }

    /// Remove wait reasons; the task becomes ready once none remains.
    pub(crate) fn clear_wait(&mut self, id: TaskId, flags: WaitFlags) -> SchedResult<()> {
        let tcb = self.tasks.lookup_mut(id)?;
        tcb.wait.remove(flags);
        let waiting_condition = tcb.wait.intersects(WaitFlags::CONDITION);
        let wake = tcb.wait.is_empty() && tcb.state == TaskState::Blocked;
        if !waiting_condition {
            self.disarm_timeout(id);
        }
        if wake {
            self.make_ready(id);
        }
        Ok(())
    }

    /// Enter the ready state behind tasks of equal key.
    pub(crate) fn make_ready(&mut self, id: TaskId) {
        self.admit_server(id);
        let Some(tcb) = self.tasks.get_mut(id) else {
            return;
        };
        tcb.state = TaskState::Ready;
        let tcb = *tcb;
        self.instances[tcb.home.index()].enqueue(&tcb);
        ktrace!("Task {} ready", id);
    }
}
