//! Constant Bandwidth Server
//!
//! A server reserves `budget` ticks of execution every `period` ticks for
//! exactly one task on a CBS instance. The task runs with the server
//! deadline as its EDF key. When the budget is used up, or when the task
//! becomes ready with more budget left than the time to the deadline allows,
//! the server is throttled: the task drops to background priority until the
//! period boundary, where the budget is replenished in full.

use alloc::vec::Vec;

use crate::{kdebug, kwarn};

use super::core::System;
use super::error::{SchedError, SchedResult};
use super::types::{TaskId, TaskState};

/// Bandwidth fixed point: one whole processor.
const BANDWIDTH_UNIT: u128 = 1_000_000_000;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct CbsServer {
    pub budget: u64,
    pub period: u64,
    /// Budget left in the current period
    pub remaining: u64,
    pub period_start: u64,
    /// Absolute end of the current period
    pub deadline: u64,
    /// Running at background priority until `deadline`
    pub throttled: bool,
    pub overruns: u64,
}

impl CbsServer {
    fn new(budget: u64, period: u64, now: u64) -> Self {
        Self {
            budget,
            period,
            remaining: budget,
            period_start: now,
            deadline: now.saturating_add(period),
            throttled: false,
            overruns: 0,
        }
    }

    fn bandwidth(&self) -> u128 {
        bandwidth(self.budget, self.period)
    }

    /// Whether `remaining / (deadline - now)` exceeds `budget / period`.
    pub fn exceeds_bandwidth(&self, now: u64) -> bool {
        let left = self.deadline.saturating_sub(now) as u128;
        (self.remaining as u128) * (self.period as u128) > (self.budget as u128) * left
    }

    /// Start a fresh period at `now` with a full budget.
    pub(crate) fn restart_period(&mut self, now: u64) {
        self.period_start = now;
        self.deadline = now.saturating_add(self.period);
        self.remaining = self.budget;
        self.throttled = false;
    }
}

/// Approved server parameters
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct CbsParameters {
    pub budget: u64,
    pub period: u64,
}

fn bandwidth(budget: u64, period: u64) -> u128 {
    (budget as u128) * BANDWIDTH_UNIT / (period as u128)
}

fn check_parameters(budget: u64, period: u64) -> SchedResult<()> {
    if budget == 0 || period == 0 || budget > period {
        return Err(SchedError::InvalidNumber);
    }
    Ok(())
}

impl System {
    /// Attach a server to `task`, which must live on a CBS instance.
    pub fn cbs_create_server(&mut self, task: TaskId, budget: u64, period: u64) -> SchedResult<()> {
        check_parameters(budget, period)?;
        let tcb = self.tasks.lookup(task)?;
        let home = tcb.home;
        if !self.instances[home.index()].algorithm.supports_cbs() {
            return Err(SchedError::IncorrectState);
        }
        if tcb.cbs.is_some() {
            return Err(SchedError::ResourceInUse);
        }
        self.check_admission(task, bandwidth(budget, period))?;

        let server = CbsServer::new(budget, period, self.now);
        self.bind_server(task, Some(server));
        kdebug!(
            "CBS server created for task {}: budget {} period {}",
            task,
            budget,
            period
        );
        self.dispatch();
        Ok(())
    }

    /// Detach the server; the task continues as a background task.
    pub fn cbs_destroy_server(&mut self, task: TaskId) -> SchedResult<()> {
        if self.tasks.lookup(task)?.cbs.is_none() {
            return Err(SchedError::NotDefined);
        }
        self.bind_server(task, None);
        kdebug!("CBS server of task {} destroyed", task);
        self.dispatch();
        Ok(())
    }

    /// Change the reservation. The budget applies at once (capping what is
    /// left), the period from the next boundary.
    pub fn cbs_set_parameters(&mut self, task: TaskId, budget: u64, period: u64) -> SchedResult<()> {
        check_parameters(budget, period)?;
        if self.tasks.lookup(task)?.cbs.is_none() {
            return Err(SchedError::NotDefined);
        }
        self.check_admission(task, bandwidth(budget, period))?;

        let Some(server) = self.tasks.get_mut(task).and_then(|t| t.cbs.as_mut()) else {
            return Err(SchedError::NotDefined);
        };
        server.budget = budget;
        server.period = period;
        server.remaining = server.remaining.min(budget);
        if server.remaining == 0 {
            server.throttled = true;
        }
        self.requeue(task);
        self.dispatch();
        Ok(())
    }

    pub fn cbs_get_parameters(&self, task: TaskId) -> SchedResult<CbsParameters> {
        let server = self.server(task)?;
        Ok(CbsParameters {
            budget: server.budget,
            period: server.period,
        })
    }

    /// Execution consumed in the current period.
    pub fn cbs_get_execution_time(&self, task: TaskId) -> SchedResult<u64> {
        let server = self.server(task)?;
        Ok(server.budget.saturating_sub(server.remaining))
    }

    pub fn cbs_get_remaining_budget(&self, task: TaskId) -> SchedResult<u64> {
        Ok(self.server(task)?.remaining)
    }

    pub fn cbs_get_approved_budget(&self, task: TaskId) -> SchedResult<u64> {
        Ok(self.server(task)?.budget)
    }

    /// Server state including the overrun counter.
    pub fn cbs_server(&self, task: TaskId) -> SchedResult<CbsServer> {
        self.server(task)
    }

    fn server(&self, task: TaskId) -> SchedResult<CbsServer> {
        self.tasks.lookup(task)?.cbs.ok_or(SchedError::NotDefined)
    }

    /// Reject a reservation that would push the instance's total bandwidth
    /// beyond the processors it owns.
    fn check_admission(&self, task: TaskId, requested: u128) -> SchedResult<()> {
        let home = self.tasks.lookup(task)?.home;
        let processors = self.instances[home.index()].processor_count().max(1) as u128;
        let reserved: u128 = self
            .tasks
            .iter()
            .filter(|t| t.home == home && t.id != task)
            .filter_map(|t| t.cbs.map(|s| s.bandwidth()))
            .sum();
        if reserved + requested > processors * BANDWIDTH_UNIT {
            kwarn!(
                "CBS admission rejected for task {}: bandwidth exceeds {} processors",
                task,
                processors
            );
            return Err(SchedError::Unsatisfied);
        }
        Ok(())
    }

    /// Install or remove the server and bring the task's key in line.
    pub(crate) fn bind_server(&mut self, task: TaskId, server: Option<CbsServer>) {
        let Some(tcb) = self.tasks.get_mut(task) else {
            return;
        };
        tcb.cbs = server;
        tcb.deadline = server.map(|s| s.deadline);
        self.requeue(task);
    }

    /// Re-key a task whose priority, deadline or throttling changed.
    pub(crate) fn requeue(&mut self, task: TaskId) {
        let Some(tcb) = self.tasks.get(task) else {
            return;
        };
        let tcb = *tcb;
        match tcb.state {
            TaskState::Ready => {
                self.instances[tcb.home.index()].reposition(&tcb);
            }
            TaskState::Executing => self.mark(tcb.home),
            _ => {}
        }
    }

    /// Admission rule applied whenever a server task becomes ready.
    pub(crate) fn admit_server(&mut self, task: TaskId) {
        let now = self.now;
        let Some(server) = self.tasks.get_mut(task).and_then(|t| t.cbs.as_mut()) else {
            return;
        };
        if server.throttled || !server.exceeds_bandwidth(now) {
            return;
        }
        server.throttled = true;
        let deadline = server.deadline;
        self.stats.cbs_admission_demotions += 1;
        kwarn!(
            "CBS task {} exceeds its bandwidth on wakeup, background until tick {}",
            task,
            deadline
        );
    }

    /// Charge one tick of execution to the server of `task`. A budget that
    /// runs out on the period boundary is replenished, not throttled.
    pub(crate) fn charge_budget(&mut self, task: TaskId) {
        let now = self.now;
        let Some(tcb) = self.tasks.get_mut(task) else {
            return;
        };
        let home = tcb.home;
        let Some(server) = tcb.cbs.as_mut() else {
            return;
        };
        if server.throttled {
            return;
        }
        server.remaining = server.remaining.saturating_sub(1);
        if server.remaining > 0 || now >= server.deadline {
            return;
        }
        server.throttled = true;
        server.overruns += 1;
        let deadline = server.deadline;
        self.stats.cbs_overruns += 1;
        kwarn!(
            "CBS task {} exhausted its budget, background until tick {}",
            task,
            deadline
        );
        self.mark(home);
    }

    /// Roll every server whose period ended over to a fresh period.
    pub(crate) fn replenish_servers(&mut self) {
        let now = self.now;
        let due: Vec<TaskId> = self
            .tasks
            .iter()
            .filter(|t| t.cbs.map_or(false, |s| now >= s.deadline))
            .map(|t| t.id)
            .collect();

        for task in due {
            let Some(tcb) = self.tasks.get_mut(task) else {
                continue;
            };
            let Some(server) = tcb.cbs.as_mut() else {
                continue;
            };
            let mut start = server.deadline;
            while let Some(next) = start.checked_add(server.period).filter(|n| *n <= now) {
                start = next;
            }
            server.restart_period(start);
            tcb.deadline = Some(server.deadline);
            kdebug!(
                "CBS server of task {} replenished, deadline {}",
                task,
                server.deadline
            );
            self.requeue(task);
        }
    }
}
