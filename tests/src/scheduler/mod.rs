//! Scheduling Core Test Suite
//!
//! Tests for the ready-queue algorithms, the dispatcher and the directives.
//! This module includes:
//! - Ready-queue ordering (deterministic, simple, EDF)
//! - Dispatch order, preemption and non-preemptible tasks
//! - Timeslicing, yield and lazy floating-point switching
//! - Task state machine and timed waits
//! - EDF deadlines and CBS budget enforcement
//! - SMP placement, affinity, pinning and processor ownership
//! - Scheduler manager directives and the global scheduler

mod edf;
mod state_machine;

use crate::config::{SchedulerConfig, SystemConfig};
use crate::mock::{MockHandle, MockPlatform};
use crate::scheduler::{
    CpuMask, Priority, SchedAlgorithm, SchedulerId, System, TaskId, TaskParams, WaitFlags,
};

/// Boot a scheduler over a mock platform with `config.processor_max` processors.
pub fn boot(config: SystemConfig) -> (System, MockHandle) {
    let processors = config.processor_max;
    boot_on(config, processors)
}

/// Boot a scheduler over a mock platform reporting `processors` processors.
pub fn boot_on(config: SystemConfig, processors: usize) -> (System, MockHandle) {
    let (platform, handle) = MockPlatform::new(processors);
    let system = System::new(&config, Box::new(platform)).expect("valid configuration");
    (system, handle)
}

/// One processor, one instance of `algorithm`.
pub fn uni(algorithm: SchedAlgorithm) -> (System, MockHandle) {
    boot(SystemConfig::uniprocessor(algorithm))
}

/// `processors` processors owned by one instance of `algorithm`.
pub fn smp(algorithm: SchedAlgorithm, processors: usize) -> (System, MockHandle) {
    boot(SystemConfig::smp(algorithm, processors))
}

/// Two instances over four processors: an affinity instance on 0-1 and a
/// deterministic one on 2-3.
pub fn partitioned_config() -> SystemConfig {
    SystemConfig::with_processors(4)
        .with_instance(
            SchedulerConfig::new("MPA ", SchedAlgorithm::SmpPriorityAffinity)
                .with_processors(mask(&[0, 1])),
        )
        .with_instance(
            SchedulerConfig::new("MPD ", SchedAlgorithm::SmpDeterministicPriority)
                .with_processors(mask(&[2, 3])),
        )
}

pub fn partitioned() -> (System, MockHandle) {
    boot(partitioned_config())
}

/// Create a dormant task with `priority` on the first instance.
pub fn create(system: &mut System, priority: Priority) -> TaskId {
    system
        .create_task(TaskParams::new(priority))
        .expect("task created")
}

/// Create and start a task with `priority` on the first instance.
pub fn spawn(system: &mut System, priority: Priority) -> TaskId {
    spawn_with(system, TaskParams::new(priority))
}

pub fn spawn_with(system: &mut System, params: TaskParams) -> TaskId {
    let id = system.create_task(params).expect("task created");
    system.start_task(id).expect("task started");
    id
}

/// Start every task in `ids` with dispatching disabled, so they become
/// ready in order before the dispatcher runs once.
pub fn start_together(system: &mut System, ids: &[TaskId]) {
    system.dispatch_disable();
    for id in ids {
        system.start_task(*id).expect("task started");
    }
    system.dispatch_enable();
}

/// Block whatever runs on `cpu` and return it.
pub fn block_current(system: &mut System, cpu: usize) -> TaskId {
    let id = system.executing(cpu).expect("processor busy");
    system.block(id, WaitFlags::SEMAPHORE).expect("task blocked");
    id
}

pub fn mask(cpus: &[usize]) -> CpuMask {
    let mut mask = CpuMask::empty();
    for cpu in cpus {
        mask.set(*cpu);
    }
    mask
}

pub const FIRST: SchedulerId = SchedulerId(0);
pub const SECOND: SchedulerId = SchedulerId(1);
