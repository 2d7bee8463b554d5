//! SMP: processor affinity, pinning and processor ownership
//!
//! Each online processor belongs to at most one scheduler instance. Moving
//! processors between instances and moving tasks between instances are the
//! only operations that change a task's reachable processor set, so both
//! check every affected task before they mutate anything.

use crate::{kdebug, kinfo, kwarn};

use super::core::System;
use super::error::{SchedError, SchedResult};
use super::types::{CpuMask, Priority, SchedulerId, TaskId, TaskState};

impl System {
    /// Set the processor affinity of a task.
    pub fn set_affinity(&mut self, id: TaskId, affinity: CpuMask) -> SchedResult<()> {
        let tcb = self.tasks.lookup(id)?;
        let home = tcb.home;
        if !self.instances[home.index()].accepts_affinity(&affinity) {
            return Err(SchedError::InvalidNumber);
        }
        if let Some(tcb) = self.tasks.get_mut(id) {
            tcb.affinity = affinity;
        }
        kdebug!("Set processor affinity for task {} to {:?}", id, affinity);
        self.mark(home);
        self.dispatch();
        Ok(())
    }

    pub fn get_affinity(&self, id: TaskId) -> SchedResult<CpuMask> {
        Ok(self.tasks.lookup(id)?.affinity)
    }

    /// Restrict a task to one processor of its home instance, overriding
    /// its affinity until unpinned.
    pub fn pin(&mut self, id: TaskId, cpu: usize) -> SchedResult<()> {
        let tcb = self.tasks.lookup(id)?;
        let home = tcb.home;
        if !self.instances[home.index()].processors.is_set(cpu) {
            return Err(SchedError::InvalidNumber);
        }
        if let Some(tcb) = self.tasks.get_mut(id) {
            tcb.pinned = Some(cpu);
        }
        kdebug!("Task {} pinned to processor {}", id, cpu);
        self.mark(home);
        self.dispatch();
        Ok(())
    }

    pub fn unpin(&mut self, id: TaskId) -> SchedResult<()> {
        let tcb = self.tasks.lookup_mut(id)?;
        if tcb.pinned.take().is_none() {
            return Ok(());
        }
        let home = tcb.home;
        self.mark(home);
        self.dispatch();
        Ok(())
    }

    pub fn pinned(&self, id: TaskId) -> SchedResult<Option<usize>> {
        Ok(self.tasks.lookup(id)?.pinned)
    }

    /// Move a task to another scheduler instance with a new priority.
    pub fn set_scheduler(
        &mut self,
        id: TaskId,
        scheduler: SchedulerId,
        priority: Priority,
    ) -> SchedResult<()> {
        let tcb = *self.tasks.lookup(id)?;
        let target = self
            .instances
            .get(scheduler.index())
            .ok_or(SchedError::InvalidId)?;
        if !target.valid_priority(priority) {
            return Err(SchedError::InvalidPriority);
        }
        if tcb.home == scheduler {
            self.set_priority(id, priority)?;
            return Ok(());
        }
        if tcb.cbs.is_some() && !target.algorithm.supports_cbs() {
            return Err(SchedError::ResourceInUse);
        }
        if target.processors.is_empty() {
            return Err(SchedError::Unsatisfied);
        }
        if let Some(cpu) = tcb.pinned {
            if !target.processors.is_set(cpu) {
                return Err(SchedError::Unsatisfied);
            }
        }
        if tcb.affinity != CpuMask::all() && !target.accepts_affinity(&tcb.affinity) {
            return Err(SchedError::Unsatisfied);
        }

        let old_home = tcb.home;
        let runnable = matches!(tcb.state, TaskState::Ready | TaskState::Executing);
        match tcb.state {
            TaskState::Ready => {
                self.instances[old_home.index()].remove(id);
            }
            TaskState::Executing => {
                if let Some(cpu) = tcb.cpu {
                    self.evict(cpu);
                }
            }
            _ => {}
        }

        if let Some(tcb) = self.tasks.get_mut(id) {
            tcb.home = scheduler;
            tcb.base_priority = priority;
            tcb.priority = priority;
        }
        if runnable {
            self.make_ready(id);
        }
        self.mark(old_home);
        self.mark(scheduler);
        kdebug!(
            "Task {} moved from scheduler {} to {} with priority {}",
            id,
            old_home,
            scheduler,
            priority
        );
        self.dispatch();
        Ok(())
    }

    /// Hand an online, unowned processor to a scheduler instance.
    pub fn add_processor(&mut self, scheduler: SchedulerId, cpu: usize) -> SchedResult<()> {
        if self.platform.in_interrupt() {
            return Err(SchedError::CalledFromInterrupt);
        }
        let instance = self
            .instances
            .get(scheduler.index())
            .ok_or(SchedError::InvalidId)?;
        let processor = self.processors.get(cpu).ok_or(SchedError::NotConfigured)?;
        if !processor.online {
            return Err(SchedError::IncorrectState);
        }
        if processor.owner.is_some() {
            return Err(SchedError::ResourceInUse);
        }
        if !instance.algorithm.is_smp() && instance.processor_count() >= 1 {
            return Err(SchedError::TooMany);
        }

        self.processors[cpu].owner = Some(scheduler);
        self.instances[scheduler.index()].processors.set(cpu);
        self.mark(scheduler);
        kinfo!(
            "Processor {} added to scheduler '{}'",
            cpu,
            self.instances[scheduler.index()].name
        );
        self.dispatch();
        Ok(())
    }

    /// Release a processor from its instance. Fails without any change when
    /// the instance would keep tasks it can no longer run.
    pub fn remove_processor(&mut self, scheduler: SchedulerId, cpu: usize) -> SchedResult<()> {
        if self.platform.in_interrupt() {
            return Err(SchedError::CalledFromInterrupt);
        }
        let instance = self
            .instances
            .get(scheduler.index())
            .ok_or(SchedError::InvalidId)?;
        if !instance.processors.is_set(cpu) {
            return Err(SchedError::InvalidNumber);
        }

        let remaining = instance.processors.without(cpu);
        for tcb in self.tasks.iter().filter(|t| t.home == scheduler) {
            let stranded = remaining.is_empty()
                || tcb.pinned == Some(cpu)
                || !tcb.affinity.intersects(&remaining);
            if stranded {
                kwarn!(
                    "Processor {} not removed from scheduler '{}': task {} would be stranded",
                    cpu,
                    instance.name,
                    tcb.id
                );
                return Err(SchedError::ResourceInUse);
            }
        }

        self.instances[scheduler.index()].processors.clear(cpu);
        self.processors[cpu].owner = None;
        if let Some(task) = self.evict(cpu) {
            if let Some(tcb) = self.tasks.get_mut(task) {
                if tcb.state == TaskState::Executing {
                    tcb.state = TaskState::Ready;
                    let tcb = *tcb;
                    self.instances[tcb.home.index()].enqueue_first(&tcb);
                }
            }
        }
        self.mark(scheduler);
        kinfo!(
            "Processor {} removed from scheduler '{}'",
            cpu,
            self.instances[scheduler.index()].name
        );
        self.dispatch();
        Ok(())
    }

    /// Platform hot-plug: only processors no instance owns change state.
    pub fn set_processor_online(&mut self, cpu: usize, online: bool) -> SchedResult<()> {
        let processor_max = self.processor_max;
        let processor = self
            .processors
            .get_mut(cpu)
            .ok_or(SchedError::NotConfigured)?;
        if processor.owner.is_some() {
            return Err(SchedError::IncorrectState);
        }
        if online && cpu >= processor_max {
            return Err(SchedError::NotConfigured);
        }
        processor.online = online;
        kinfo!(
            "Processor {} is now {}",
            cpu,
            if online { "online" } else { "offline" }
        );
        Ok(())
    }
}
