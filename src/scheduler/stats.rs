//! Scheduler statistics and debugging functions

use alloc::vec::Vec;

use super::core::System;
use super::error::{SchedError, SchedResult};
use super::percpu::PerCpuStats;
use super::types::{SchedulerId, SchedulerStats, TaskId, TaskState};

/// Number of tasks in each state
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct TaskCounts {
    pub dormant: usize,
    pub ready: usize,
    pub blocked: usize,
    pub executing: usize,
}

impl System {
    /// Get scheduler statistics
    pub fn stats(&self) -> SchedulerStats {
        self.stats
    }

    pub fn percpu_stats(&self) -> Vec<PerCpuStats> {
        self.processors.iter().map(|p| p.stats()).collect()
    }

    pub fn task_counts(&self) -> TaskCounts {
        let mut counts = TaskCounts::default();
        for tcb in self.tasks.iter() {
            match tcb.state {
                TaskState::Dormant => counts.dormant += 1,
                TaskState::Ready => counts.ready += 1,
                TaskState::Blocked => counts.blocked += 1,
                TaskState::Executing => counts.executing += 1,
                TaskState::NonExistent => {}
            }
        }
        counts
    }

    /// Ready tasks of an instance in the order they would be dispatched.
    pub fn ready_order(&self, scheduler: SchedulerId) -> SchedResult<Vec<TaskId>> {
        let instance = self.instance(scheduler).ok_or(SchedError::InvalidId)?;
        Ok(instance.ready.order())
    }

    /// Executing task of every processor, indexed by processor.
    pub fn executing_tasks(&self) -> Vec<Option<TaskId>> {
        self.processors.iter().map(|p| p.executing).collect()
    }

    /// List all tasks for debugging
    pub fn list_tasks(&self) {
        crate::kinfo!("=== Task List (tick {}) ===", self.now);
        crate::kinfo!(
            "{:<6} {:<6} {:<10} {:<5} {:<5} {:<4} {:<8} {:<10} {:<10}",
            "ID", "Name", "State", "Sched", "Prio", "CPU", "Deadline", "CpuTime", "Switches"
        );

        for tcb in self.tasks.iter() {
            crate::kinfo!(
                "{:<6} {:<6} {:<10} {:<5} {:<5} {:<4} {:<8} {:<10} {:<10}",
                tcb.id,
                tcb.name,
                tcb.state.as_str(),
                tcb.home,
                tcb.priority,
                tcb.cpu.map_or(-1, |c| c as i64),
                tcb.deadline.map_or(-1, |d| d as i64),
                tcb.cpu_time,
                tcb.dispatch_count
            );
        }

        let stats = &self.stats;
        crate::kinfo!("=== Scheduler Statistics ===");
        crate::kinfo!("Total context switches: {}", stats.total_context_switches);
        crate::kinfo!("Total preemptions: {}", stats.total_preemptions);
        crate::kinfo!("Total voluntary switches: {}", stats.total_voluntary_switches);
        crate::kinfo!("Timeslice rotations: {}", stats.timeslice_rotations);
        crate::kinfo!("Migrations: {}", stats.migration_count);
        crate::kinfo!("FP saves/restores: {}/{}", stats.fp_saves, stats.fp_restores);
        crate::kinfo!(
            "CBS overruns: {}, admission demotions: {}",
            stats.cbs_overruns,
            stats.cbs_admission_demotions
        );
    }

    /// List per-processor statistics
    pub fn list_percpu_stats(&self) {
        crate::kinfo!("=== Per-Processor Statistics ===");
        for stats in self.percpu_stats() {
            crate::kinfo!(
                "CPU {}: {} owner={:?} executing={:?} switches={} preemptions={} idle={} migrations_in={}",
                stats.cpu_id,
                if stats.online { "online" } else { "offline" },
                stats.owner,
                stats.executing,
                stats.context_switches,
                stats.preemptions,
                stats.idle_ticks,
                stats.migrations_in
            );
        }
    }
}
