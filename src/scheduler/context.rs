//! Platform context-switch capability
//!
//! The scheduler decides which task runs where; how registers are saved and
//! restored belongs to the platform. `context_switch` must atomically suspend
//! `from` on `cpu` and resume `to`, preserving all architectural state. A
//! `None` side means the processor's idle context.

use super::types::TaskId;

pub trait Platform: Send {
    /// Suspend `from` and resume `to` on `cpu`.
    fn context_switch(&mut self, cpu: usize, from: Option<TaskId>, to: Option<TaskId>);

    /// Store the numeric-coprocessor registers of `task` loaded on `cpu`.
    fn save_fp(&mut self, cpu: usize, task: TaskId);

    /// Load the numeric-coprocessor registers of `task` on `cpu`.
    fn restore_fp(&mut self, cpu: usize, task: TaskId);

    /// Build a fresh register context for `task` (start and restart).
    fn initialize_context(&mut self, _task: TaskId) {}

    /// Index of the processor executing the caller.
    fn current_processor(&self) -> usize {
        0
    }

    /// Number of processors the hardware reports.
    fn processor_count(&self) -> usize {
        1
    }

    /// Whether the caller runs in interrupt context.
    fn in_interrupt(&self) -> bool {
        false
    }
}

/// Bookkeeping-only platform for configurations without a real switch path.
#[derive(Clone, Copy, Debug, Default)]
pub struct NullPlatform {
    processors: usize,
}

impl NullPlatform {
    pub const fn new(processors: usize) -> Self {
        Self { processors }
    }
}

impl Platform for NullPlatform {
    fn context_switch(&mut self, _cpu: usize, _from: Option<TaskId>, _to: Option<TaskId>) {}

    fn save_fp(&mut self, _cpu: usize, _task: TaskId) {}

    fn restore_fp(&mut self, _cpu: usize, _task: TaskId) {}

    fn processor_count(&self) -> usize {
        self.processors.max(1)
    }
}
