//! Priority, deadline and dispatch-mode changes
//!
//! Every change re-keys the task in its ready queue (ready tasks) or marks
//! its instance for re-evaluation (executing tasks). A task whose key changes
//! is placed behind its new equals.

use crate::ktrace;

use super::core::System;
use super::error::{SchedError, SchedResult};
use super::types::{Priority, TaskId, TaskState};

impl System {
    /// Set the base priority and return the previous one.
    pub fn set_priority(&mut self, id: TaskId, priority: Priority) -> SchedResult<Priority> {
        let tcb = self.tasks.lookup(id)?;
        if !self.instances[tcb.home.index()].valid_priority(priority) {
            return Err(SchedError::InvalidPriority);
        }
        let tcb = self.tasks.lookup_mut(id)?;
        let old = tcb.base_priority;
        tcb.base_priority = priority;
        tcb.priority = priority;
        ktrace!("Task {} priority {} -> {}", id, old, priority);
        self.requeue(id);
        self.dispatch();
        Ok(old)
    }

    pub fn get_priority(&self, id: TaskId) -> SchedResult<Priority> {
        Ok(self.tasks.lookup(id)?.priority)
    }

    /// Enable or disable preemption; returns the previous mode.
    pub fn set_preemption(&mut self, id: TaskId, preemptible: bool) -> SchedResult<bool> {
        let tcb = self.tasks.lookup_mut(id)?;
        let old = tcb.preemptible;
        tcb.preemptible = preemptible;
        let home = tcb.home;
        if old != preemptible {
            self.mark(home);
            self.dispatch();
        }
        Ok(old)
    }

    /// Enable or disable timeslicing; returns the previous mode.
    pub fn set_timeslice(&mut self, id: TaskId, timeslice: bool) -> SchedResult<bool> {
        let ticks = self.ticks_per_timeslice;
        let tcb = self.tasks.lookup_mut(id)?;
        let old = tcb.timeslice;
        tcb.timeslice = timeslice;
        if timeslice && !old {
            tcb.timeslice_remaining = ticks;
        }
        Ok(old)
    }

    /// Mark or unmark the task as a floating-point user.
    pub fn set_fp(&mut self, id: TaskId, fp: bool) -> SchedResult<bool> {
        let tcb = self.tasks.lookup_mut(id)?;
        let old = tcb.fp;
        tcb.fp = fp;
        if !fp {
            for processor in self.processors.iter_mut() {
                if processor.fp_owner == Some(id) {
                    processor.fp_owner = None;
                }
            }
        }
        Ok(old)
    }

    /// Make the task deadline-driven with a deadline `length` ticks from now.
    ///
    /// Priority instances ignore deadlines. On a CBS instance a task with a
    /// server starts a new server period instead.
    pub fn install_deadline(&mut self, id: TaskId, length: u64) -> SchedResult<()> {
        if length == 0 {
            return Err(SchedError::InvalidNumber);
        }
        let now = self.now;
        let tcb = self.tasks.lookup_mut(id)?;
        if tcb.state == TaskState::Dormant {
            return Err(SchedError::IncorrectState);
        }
        let algorithm = self.instances[tcb.home.index()].algorithm;
        if !algorithm.is_deadline_driven() {
            return Ok(());
        }
        match tcb.cbs.as_mut() {
            Some(server) => {
                server.restart_period(now);
                tcb.deadline = Some(server.deadline);
            }
            None => tcb.deadline = Some(now.saturating_add(length)),
        }
        ktrace!("Task {} deadline set to {:?}", id, tcb.deadline);
        self.requeue(id);
        self.dispatch();
        Ok(())
    }

    /// Return the task to background priority. A CBS server keeps policing
    /// the task with its own period.
    pub fn cancel_deadline(&mut self, id: TaskId) -> SchedResult<()> {
        let tcb = self.tasks.lookup_mut(id)?;
        let algorithm = self.instances[tcb.home.index()].algorithm;
        if !algorithm.is_deadline_driven() {
            return Ok(());
        }
        tcb.deadline = tcb.cbs.map(|server| server.deadline);
        self.requeue(id);
        self.dispatch();
        Ok(())
    }

    pub fn get_deadline(&self, id: TaskId) -> SchedResult<Option<u64>> {
        Ok(self.tasks.lookup(id)?.deadline)
    }
}
