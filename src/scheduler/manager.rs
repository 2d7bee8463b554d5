//! Scheduler manager directives
//!
//! Identification and processor queries over the instance table, as methods
//! on [`System`] and as free functions on the global scheduler.

use super::core::System;
use super::error::{SchedError, SchedResult};
use super::types::{CpuMask, ObjectName, Priority, SchedulerId, TaskId};
use super::with_system;

impl System {
    /// Instance with the given name.
    pub fn ident(&self, name: ObjectName) -> SchedResult<SchedulerId> {
        self.instances
            .iter()
            .find(|i| i.name == name)
            .map(|i| i.id)
            .ok_or(SchedError::InvalidName)
    }

    /// Instance owning processor `cpu`.
    pub fn ident_by_processor(&self, cpu: usize) -> SchedResult<SchedulerId> {
        if cpu >= self.processor_max {
            return Err(SchedError::InvalidName);
        }
        self.processors[cpu].owner.ok_or(SchedError::IncorrectState)
    }

    /// Instance owning the highest-numbered online processor of `set`.
    pub fn ident_by_processor_set(&self, set: &[u64]) -> SchedResult<SchedulerId> {
        // The slice carries its own size; only an empty set is malformed
        if set.is_empty() {
            return Err(SchedError::InvalidSize);
        }
        let mask = CpuMask::from_words(set);
        let cpu = (0..self.processor_max)
            .rev()
            .find(|cpu| mask.is_set(*cpu) && self.processors[*cpu].online)
            .ok_or(SchedError::InvalidName)?;
        self.processors[cpu].owner.ok_or(SchedError::IncorrectState)
    }

    pub fn get_maximum_priority(&self, scheduler: SchedulerId) -> SchedResult<Priority> {
        self.instance(scheduler)
            .map(|i| i.max_priority)
            .ok_or(SchedError::InvalidId)
    }

    /// Index of the processor executing the caller.
    pub fn get_processor(&self) -> usize {
        if self.processor_max == 1 {
            0
        } else {
            self.platform.current_processor()
        }
    }

    pub fn get_processor_maximum(&self) -> usize {
        self.processor_max
    }

    /// Write the processor set of `scheduler` into `set`.
    pub fn get_processor_set(&self, scheduler: SchedulerId, set: &mut [u64]) -> SchedResult<()> {
        let instance = self.instance(scheduler).ok_or(SchedError::InvalidId)?;
        if set.len() * 64 < self.processor_max {
            return Err(SchedError::InvalidSize);
        }
        set.fill(0);
        for (dst, src) in set.iter_mut().zip(instance.processors.words().iter()) {
            *dst = *src;
        }
        Ok(())
    }

    pub fn processor_is_online(&self, cpu: usize) -> bool {
        self.processors.get(cpu).map_or(false, |p| p.online)
    }

    pub fn processor_owner(&self, cpu: usize) -> Option<SchedulerId> {
        self.processors.get(cpu).and_then(|p| p.owner)
    }
}

pub fn ident(name: ObjectName) -> SchedResult<SchedulerId> {
    with_system(|sys| sys.ident(name))?
}

pub fn ident_by_processor(cpu: usize) -> SchedResult<SchedulerId> {
    with_system(|sys| sys.ident_by_processor(cpu))?
}

pub fn ident_by_processor_set(set: &[u64]) -> SchedResult<SchedulerId> {
    with_system(|sys| sys.ident_by_processor_set(set))?
}

pub fn get_maximum_priority(scheduler: SchedulerId) -> SchedResult<Priority> {
    with_system(|sys| sys.get_maximum_priority(scheduler))?
}

/// Processor 0 until the scheduler is initialized.
pub fn get_processor() -> usize {
    with_system(|sys| sys.get_processor()).unwrap_or(0)
}

pub fn get_processor_maximum() -> usize {
    with_system(|sys| sys.get_processor_maximum()).unwrap_or(1)
}

pub fn get_processor_set(scheduler: SchedulerId, set: &mut [u64]) -> SchedResult<()> {
    with_system(|sys| sys.get_processor_set(scheduler, set))?
}

pub fn add_processor(scheduler: SchedulerId, cpu: usize) -> SchedResult<()> {
    with_system(|sys| sys.add_processor(scheduler, cpu))?
}

pub fn remove_processor(scheduler: SchedulerId, cpu: usize) -> SchedResult<()> {
    with_system(|sys| sys.remove_processor(scheduler, cpu))?
}

/// Clock tick entry point for the platform timer.
pub fn tick() -> SchedResult<()> {
    with_system(|sys| sys.tick())
}

pub fn dispatch_disable() -> SchedResult<u32> {
    with_system(|sys| sys.dispatch_disable())
}

pub fn dispatch_enable() -> SchedResult<u32> {
    with_system(|sys| sys.dispatch_enable())
}

/// Task currently executing on `cpu`.
pub fn executing(cpu: usize) -> Option<TaskId> {
    with_system(|sys| sys.executing(cpu)).ok().flatten()
}
