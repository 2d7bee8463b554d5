//! Scheduler subsystem
//!
//! This module provides the task-scheduling core: the ready-queue algorithms,
//! the scheduler instances that bind an algorithm to a set of processors,
//! and the dispatcher that keeps every owned processor running the best
//! eligible task.
//!
//! ## Algorithms
//!
//! - **Deterministic Priority**: per-priority FIFOs plus a bitmap, O(1)
//! - **Simple Priority**: one sorted list, O(n) enqueue
//! - **EDF**: deadline-ordered tree, background tasks behind every deadline
//! - **CBS**: EDF with per-task budget servers
//! - **SMP** variants of the above, and SMP priority with arbitrary affinity
//!
//! ## Module Organization
//!
//! - `types`: identifiers, task states, wait flags, processor masks
//! - `error`: status codes returned by every directive
//! - `chain`: index-linked FIFO chains shared by the priority queues
//! - `queue`: the ready-queue algorithms
//! - `table`: task control blocks and the task arena
//! - `instance`: scheduler instances and scheduling keys
//! - `percpu`: per-processor state and counters
//! - `context`: platform context-switch capability
//! - `core`: the dispatcher, tick handling and timeslicing
//! - `task`: task life cycle and blocking
//! - `priority`: priority, preemption, FP and deadline changes
//! - `cbs`: constant bandwidth servers
//! - `timeout`: timed waits
//! - `smp`: affinity, pinning and processor ownership
//! - `manager`: identification and processor directives
//! - `stats`: statistics and debugging functions

mod cbs;
mod chain;
mod context;
mod core;
mod error;
mod instance;
mod manager;
pub mod percpu;
mod priority;
pub mod queue;
mod smp;
mod stats;
mod table;
mod task;
mod timeout;
mod types;

use alloc::boxed::Box;
use lazy_static::lazy_static;
use spin::Mutex;

use crate::config::{ConfigError, SystemConfig};

pub use self::core::System;
pub use cbs::{CbsParameters, CbsServer};
pub use chain::{Chain, ChainLinks};
pub use context::{NullPlatform, Platform};
pub use error::{ErrorCategory, SchedError, SchedResult};
pub use instance::{SchedAlgorithm, SchedulerInstance};
pub use percpu::{PerCpuStats, Processor};
pub use queue::{QueueKind, ReadyQueue, RunQueue};
pub use stats::TaskCounts;
pub use table::{TaskParams, TaskTable, Tcb};
pub use timeout::{TimeoutKey, TimeoutQueue};
pub use types::{CpuMask, ObjectName, Priority, SchedulerId, SchedulerStats, TaskId, TaskState};
pub use types::{WaitFlags, CPU_MASK_WORDS, MAX_CPUS};
pub use types::{DEFAULT_MAX_PRIORITY, DEFAULT_MAX_TASKS, DEFAULT_TICKS_PER_TIMESLICE, MAX_PRIORITY_LIMIT};

pub use manager::{
    add_processor, dispatch_disable, dispatch_enable, executing, get_maximum_priority,
    get_processor, get_processor_maximum, get_processor_set, ident, ident_by_processor,
    ident_by_processor_set, remove_processor, tick,
};

lazy_static! {
    /// The system scheduler. Everything after boot mutates it under this lock.
    pub static ref SCHEDULER: Mutex<Option<System>> = Mutex::new(None);
}

/// Build the scheduler from the boot configuration.
pub fn init(config: &SystemConfig, platform: Box<dyn Platform>) -> Result<(), ConfigError> {
    let mut slot = SCHEDULER.lock();
    if slot.is_some() {
        return Err(ConfigError::AlreadyInitialized);
    }
    *slot = Some(System::new(config, platform)?);
    Ok(())
}

pub fn is_initialized() -> bool {
    SCHEDULER.lock().is_some()
}

/// Run `f` on the global scheduler with its lock held.
pub fn with_system<R>(f: impl FnOnce(&mut System) -> R) -> SchedResult<R> {
    let mut slot = SCHEDULER.lock();
    let system = slot.as_mut().ok_or(SchedError::NotDefined)?;
    Ok(f(system))
}

/// Tear the global scheduler down, returning it.
pub fn shutdown() -> Option<System> {
    SCHEDULER.lock().take()
}
