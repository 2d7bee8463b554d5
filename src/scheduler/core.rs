//! Dispatcher - processor assignment and context switching
//!
//! `System` owns the task table, the scheduler instances and the processors.
//! After every scheduling event the affected instances are marked and
//! `dispatch` re-establishes, for every owned processor, that it executes the
//! best eligible task:
//!
//! 1. Executing tasks with preemption disabled keep their processor.
//! 2. Remaining candidates (preemptible executing tasks and ready tasks) are
//!    visited in key order, executing tasks ahead of ready tasks with the same
//!    key, and each takes an eligible free processor: its current one, else
//!    an idle one, else the one running the least important task. A
//!    candidate restricted to taken processors gets one when the heirs there
//!    can move to other free processors.
//! 3. Displaced executing tasks go back to the head of their priority group
//!    and the platform switches every processor whose task changed.
//!
//! Priority is evaluated first, preemption mode second and timeslicing last:
//! timeslice rotation only reorders tasks of equal key.

use alloc::boxed::Box;
use alloc::vec::Vec;

use crate::config::{ConfigError, SystemConfig};
use crate::{kinfo, ktrace, kwarn};

use super::context::Platform;
use super::instance::SchedulerInstance;
use super::percpu::Processor;
use super::queue::RunQueue;
use super::table::{TaskTable, Tcb};
use super::timeout::TimeoutQueue;
use super::types::{CpuMask, SchedulerId, SchedulerStats, TaskId, TaskState};

use core::sync::atomic::Ordering;

pub struct System {
    pub(crate) tasks: TaskTable,
    pub(crate) instances: Vec<SchedulerInstance>,
    pub(crate) processors: Vec<Processor>,
    pub(crate) platform: Box<dyn Platform>,
    pub(crate) timeouts: TimeoutQueue,
    pub(crate) now: u64,
    pub(crate) ticks_per_timeslice: u32,
    pub(crate) dispatch_disable_level: u32,
    pub(crate) stats: SchedulerStats,
    /// min(platform processors, configured maximum)
    pub(crate) processor_max: usize,
}

/// Planned occupant of one processor
#[derive(Clone, Copy)]
struct Slot {
    cpu: usize,
    current: Option<TaskId>,
    /// Key of the task that currently occupies the processor and still
    /// competes for it; `None` when the processor is effectively idle.
    occupant_key: Option<u64>,
    heir: Option<TaskId>,
}

/// Assignment of candidates, in key order, to the processors of one
/// instance. A candidate whose eligible processors are all taken may still
/// get one when the heirs there can move to other processors they may run
/// on, so the placed set only ever grows.
struct Planner<'a> {
    tasks: &'a TaskTable,
    owned: CpuMask,
    free: CpuMask,
    /// Processors kept by a non-preemptible task
    fixed: CpuMask,
    slots: Vec<Slot>,
}

impl<'a> Planner<'a> {
    fn full(&self) -> bool {
        self.free.is_empty()
    }

    fn slot(&self, cpu: usize) -> Option<&Slot> {
        self.slots.iter().find(|s| s.cpu == cpu)
    }

    fn slot_mut(&mut self, cpu: usize) -> Option<&mut Slot> {
        self.slots.iter_mut().find(|s| s.cpu == cpu)
    }

    /// Give `id` a free eligible processor, preferring `current`. With none
    /// free, try to move heirs out of the way.
    fn place(&mut self, id: TaskId, current: Option<usize>) {
        let Some(tcb) = self.tasks.get(id) else {
            return;
        };
        let eligible = tcb.eligible(&self.owned);
        let choices = eligible.and(&self.free);
        let cpu = if choices.is_empty() {
            let mut visited = CpuMask::empty();
            match self.reassign(&eligible, &mut visited) {
                Some(cpu) => cpu,
                None => return,
            }
        } else {
            match current.filter(|c| choices.is_set(*c)) {
                Some(cpu) => cpu,
                None => self.pick_victim(tcb, &choices),
            }
        };
        if let Some(slot) = self.slot_mut(cpu) {
            slot.heir = Some(id);
        }
        self.free.clear(cpu);
    }

    /// Release one processor of `wanted` by moving its heir to another
    /// processor that heir may run on, recursively, ending on a free one.
    /// The returned processor keeps its stale heir until the caller
    /// overwrites it.
    fn reassign(&mut self, wanted: &CpuMask, visited: &mut CpuMask) -> Option<usize> {
        for cpu in wanted.iter() {
            if visited.is_set(cpu) || self.fixed.is_set(cpu) {
                continue;
            }
            visited.set(cpu);
            let Some(heir) = self.slot(cpu).and_then(|s| s.heir) else {
                continue;
            };
            let Some(tcb) = self.tasks.get(heir) else {
                continue;
            };
            let elsewhere = tcb.eligible(&self.owned).without(cpu);
            let target = match elsewhere.and(&self.free).first_set() {
                Some(free) => {
                    self.free.clear(free);
                    Some(free)
                }
                None => self.reassign(&elsewhere, visited),
            };
            if let Some(target) = target {
                if let Some(slot) = self.slot_mut(target) {
                    slot.heir = Some(heir);
                }
                return Some(cpu);
            }
        }
        None
    }

    /// Idle processors first (the last one used, else the lowest index),
    /// then the processor whose occupant is least important. Among equal
    /// occupants the highest processor index loses.
    fn pick_victim(&self, tcb: &Tcb, choices: &CpuMask) -> usize {
        if let Some(last) = tcb.last_cpu {
            if choices.is_set(last) && self.slot(last).map_or(false, |s| s.occupant_key.is_none()) {
                return last;
            }
        }
        let mut idle = None;
        let mut victim: Option<(u64, usize)> = None;
        for cpu in choices.iter() {
            match self.slot(cpu).and_then(|s| s.occupant_key) {
                None => {
                    if idle.is_none() {
                        idle = Some(cpu);
                    }
                }
                Some(key) => {
                    if victim.map_or(true, |(worst, _)| key >= worst) {
                        victim = Some((key, cpu));
                    }
                }
            }
        }
        idle.or(victim.map(|(_, cpu)| cpu)).unwrap_or(0)
    }
}

impl System {
    /// Build the scheduling core from a validated configuration.
    pub fn new(config: &SystemConfig, platform: Box<dyn Platform>) -> Result<Self, ConfigError> {
        config.validate()?;

        let platform_cpus = platform.processor_count().max(1);
        let processor_max = platform_cpus.min(config.processor_max);

        let processors: Vec<Processor> = (0..config.processor_max)
            .map(|cpu| Processor::new(cpu, cpu < platform_cpus && config.online.is_set(cpu)))
            .collect();

        let mut system = Self {
            tasks: TaskTable::new(config.max_tasks),
            instances: Vec::with_capacity(config.instances.len()),
            processors,
            platform,
            timeouts: TimeoutQueue::new(),
            now: 0,
            ticks_per_timeslice: config.ticks_per_timeslice,
            dispatch_disable_level: 0,
            stats: SchedulerStats::new(),
            processor_max,
        };

        for (idx, cfg) in config.instances.iter().enumerate() {
            let id = SchedulerId(idx as u32);
            let mut instance =
                SchedulerInstance::new(id, cfg.name, cfg.algorithm, cfg.max_priority);
            for cpu in cfg.processors.iter() {
                if !system.processors[cpu].online {
                    kwarn!(
                        "Scheduler '{}': processor {} is offline at boot, not assigned",
                        cfg.name,
                        cpu
                    );
                    continue;
                }
                system.processors[cpu].owner = Some(id);
                instance.processors.set(cpu);
            }
            kinfo!(
                "Scheduler '{}' ({}) initialized: max priority {}, processors {:?}",
                cfg.name,
                cfg.algorithm.as_str(),
                cfg.max_priority,
                instance.processors
            );
            system.instances.push(instance);
        }

        kinfo!(
            "Scheduling core initialized ({} instances, {} of {} processors, {} max tasks, {} tick timeslice)",
            system.instances.len(),
            processor_max,
            config.processor_max,
            config.max_tasks,
            config.ticks_per_timeslice
        );

        Ok(system)
    }

    /// Current scheduler tick
    #[inline]
    pub fn now(&self) -> u64 {
        self.now
    }

    pub fn task(&self, id: TaskId) -> Option<&Tcb> {
        self.tasks.get(id)
    }

    pub fn state(&self, id: TaskId) -> TaskState {
        self.tasks.state(id)
    }

    /// Task executing on `cpu`
    pub fn executing(&self, cpu: usize) -> Option<TaskId> {
        self.processors.get(cpu).and_then(|p| p.executing)
    }

    pub fn instance(&self, id: SchedulerId) -> Option<&SchedulerInstance> {
        self.instances.get(id.index())
    }

    pub fn instance_count(&self) -> usize {
        self.instances.len()
    }

    pub(crate) fn mark(&mut self, id: SchedulerId) {
        if let Some(instance) = self.instances.get_mut(id.index()) {
            instance.need_resched = true;
        }
    }

    // ------------------------------------------------------------------
    // Dispatch disable (critical section)
    // ------------------------------------------------------------------

    /// Enter a dispatch-disabled section. Sections nest.
    pub fn dispatch_disable(&mut self) -> u32 {
        self.dispatch_disable_level += 1;
        self.dispatch_disable_level
    }

    /// Leave a dispatch-disabled section; the outermost exit runs any
    /// deferred dispatch.
    pub fn dispatch_enable(&mut self) -> u32 {
        self.dispatch_disable_level = self.dispatch_disable_level.saturating_sub(1);
        if self.dispatch_disable_level == 0 {
            self.dispatch();
        }
        self.dispatch_disable_level
    }

    pub fn dispatch_disable_level(&self) -> u32 {
        self.dispatch_disable_level
    }

    // ------------------------------------------------------------------
    // Dispatch
    // ------------------------------------------------------------------

    /// Re-evaluate every marked instance and switch processors as needed.
    pub fn dispatch(&mut self) {
        if self.dispatch_disable_level > 0 {
            let mut deferred = false;
            for instance in self.instances.iter().filter(|i| i.need_resched) {
                for cpu in instance.processors.iter() {
                    self.processors[cpu].set_need_resched(true);
                    deferred = true;
                }
            }
            if deferred {
                self.stats.deferred_dispatches += 1;
            }
            return;
        }

        // Switching may mark another instance (a task leaving a processor it
        // does not belong to any more); the bound covers one such round each.
        let mut rounds = self.instances.len() * 2 + 1;
        while rounds > 0 {
            let Some(idx) = self.instances.iter().position(|i| i.need_resched) else {
                break;
            };
            self.instances[idx].need_resched = false;
            self.schedule_instance(SchedulerId(idx as u32));
            rounds -= 1;
        }

        for processor in &self.processors {
            processor.check_need_resched();
        }
    }

    fn schedule_instance(&mut self, sid: SchedulerId) {
        let owned = self.instances[sid.index()].processors;
        if owned.is_empty() {
            return;
        }
        let slots = self.plan(sid, owned);
        self.apply(sid, slots);
        self.instances[sid.index()].need_resched = false;
    }

    fn plan(&self, sid: SchedulerId, owned: CpuMask) -> Vec<Slot> {
        let instance = &self.instances[sid.index()];
        let mut planner = Planner {
            tasks: &self.tasks,
            owned,
            free: owned,
            fixed: CpuMask::empty(),
            slots: Vec::with_capacity(owned.count()),
        };

        // (key, task, processor) of preemptible executing tasks
        let mut running: Vec<(u64, TaskId, usize)> = Vec::new();

        for cpu in owned.iter() {
            let current = self.processors[cpu].executing;
            let mut slot = Slot {
                cpu,
                current,
                occupant_key: None,
                heir: None,
            };
            let competing = current
                .and_then(|id| self.tasks.get(id))
                .filter(|tcb| tcb.state == TaskState::Executing && tcb.home == sid);
            if let Some(tcb) = competing {
                if !tcb.preemptible && tcb.can_run_on(cpu) {
                    slot.heir = Some(tcb.id);
                    planner.free.clear(cpu);
                    planner.fixed.set(cpu);
                } else {
                    let key = instance.key_of(tcb);
                    slot.occupant_key = Some(key);
                    running.push((key, tcb.id, cpu));
                }
            }
            planner.slots.push(slot);
        }
        running.sort_by_key(|(key, _, cpu)| (*key, *cpu));

        let mut next_running = 0;
        if !planner.full() {
            instance.ready.first_matching(&mut |id, key| {
                while next_running < running.len() && running[next_running].0 <= key {
                    let (_, rid, rcpu) = running[next_running];
                    planner.place(rid, Some(rcpu));
                    next_running += 1;
                    if planner.full() {
                        return true;
                    }
                }
                let hint = match planner.tasks.get(id) {
                    Some(tcb) => tcb.cpu,
                    None => return false,
                };
                // Still occupying a processor of another instance
                if hint.map_or(false, |cpu| !owned.is_set(cpu)) {
                    return false;
                }
                planner.place(id, hint);
                planner.full()
            });
        }
        while next_running < running.len() && !planner.full() {
            let (_, rid, rcpu) = running[next_running];
            planner.place(rid, Some(rcpu));
            next_running += 1;
        }

        planner.slots
    }

    fn apply(&mut self, sid: SchedulerId, slots: Vec<Slot>) {
        let is_heir = |id: TaskId| slots.iter().any(|s| s.heir == Some(id));

        // Displaced executing tasks return to the head of their group.
        for slot in &slots {
            let Some(old) = slot.current else { continue };
            if slot.heir == Some(old) || is_heir(old) {
                continue;
            }
            let Some(tcb) = self.tasks.get_mut(old) else {
                continue;
            };
            if tcb.state != TaskState::Executing || tcb.home != sid {
                continue;
            }
            tcb.state = TaskState::Ready;
            tcb.preempt_count += 1;
            let tcb = *tcb;
            self.instances[sid.index()].enqueue_first(&tcb);
            self.processors[slot.cpu]
                .preemptions
                .fetch_add(1, Ordering::Relaxed);
            self.stats.total_preemptions += 1;
            ktrace!("Task {} preempted on processor {}", old, slot.cpu);
        }

        // Heirs leave the ready queue. A rotated task chosen again for the
        // processor it still occupies resumes without a switch.
        for slot in &slots {
            let Some(heir) = slot.heir else { continue };
            self.instances[sid.index()].ready.remove(heir);
            if slot.current == Some(heir) {
                if let Some(tcb) = self.tasks.get_mut(heir) {
                    tcb.state = TaskState::Executing;
                }
            }
        }

        // Switch; a processor whose heir still runs elsewhere waits until
        // that processor has switched away.
        let mut pending: Vec<Slot> = slots
            .into_iter()
            .filter(|s| s.heir != s.current)
            .collect();
        while !pending.is_empty() {
            let ready = pending.iter().position(|s| {
                s.heir.map_or(true, |h| {
                    !pending.iter().any(|o| o.cpu != s.cpu && o.current == Some(h))
                })
            });
            match ready {
                Some(pos) => {
                    let slot = pending.remove(pos);
                    self.switch_processor(slot.cpu, slot.heir);
                }
                None => {
                    let cpu = pending[0].cpu;
                    self.switch_processor(cpu, None);
                    pending[0].current = None;
                }
            }
        }
    }

    /// Hand `cpu` to `heir`, saving the outgoing task.
    pub(crate) fn switch_processor(&mut self, cpu: usize, heir: Option<TaskId>) {
        let from = self.processors[cpu].executing;
        if from == heir {
            return;
        }
        let owner = self.processors[cpu].owner;

        if let Some(old) = from {
            if let Some(tcb) = self.tasks.get_mut(old) {
                if tcb.cpu == Some(cpu) {
                    tcb.cpu = None;
                }
                tcb.last_cpu = Some(cpu);
                let home = tcb.home;
                if tcb.state == TaskState::Ready && Some(home) != owner {
                    self.mark(home);
                }
            }
        }

        if let Some(new) = heir {
            self.switch_in(cpu, new);
        }

        self.platform.context_switch(cpu, from, heir);
        self.processors[cpu].executing = heir;
        self.processors[cpu]
            .context_switches
            .fetch_add(1, Ordering::Relaxed);
        self.stats.total_context_switches += 1;
        ktrace!("Processor {}: switch {:?} -> {:?}", cpu, from, heir);
    }

    fn switch_in(&mut self, cpu: usize, id: TaskId) {
        let replenish = self.ticks_per_timeslice;
        let Some(tcb) = self.tasks.get_mut(id) else {
            return;
        };
        if tcb.last_cpu.map_or(false, |last| last != cpu) {
            self.stats.migration_count += 1;
            self.processors[cpu]
                .migrations_in
                .fetch_add(1, Ordering::Relaxed);
        }
        tcb.state = TaskState::Executing;
        tcb.cpu = Some(cpu);
        tcb.dispatch_count += 1;
        tcb.timeslice_remaining = replenish;
        let fp = tcb.fp;

        if fp {
            self.load_fp(cpu, id);
        }
    }

    /// Lazy floating-point switch: registers are only saved and restored
    /// when the incoming FP user is not the one already loaded.
    fn load_fp(&mut self, cpu: usize, id: TaskId) {
        // FP state left live on another processor by a migrating task
        for idx in 0..self.processors.len() {
            if idx != cpu && self.processors[idx].fp_owner == Some(id) {
                self.platform.save_fp(idx, id);
                self.processors[idx].fp_owner = None;
                self.stats.fp_saves += 1;
            }
        }

        let loaded = self.processors[cpu].fp_owner;
        if loaded == Some(id) {
            return;
        }
        if let Some(previous) = loaded {
            if self.tasks.get(previous).is_some() {
                self.platform.save_fp(cpu, previous);
                self.stats.fp_saves += 1;
            }
        }
        self.platform.restore_fp(cpu, id);
        self.stats.fp_restores += 1;
        self.processors[cpu].fp_owner = Some(id);
    }

    /// Take `cpu` away from its task immediately, saving its context. The
    /// task is left as it is; callers requeue it.
    pub(crate) fn evict(&mut self, cpu: usize) -> Option<TaskId> {
        let task = self.processors[cpu].executing?;
        self.platform.context_switch(cpu, Some(task), None);
        self.processors[cpu].executing = None;
        self.processors[cpu]
            .context_switches
            .fetch_add(1, Ordering::Relaxed);
        self.stats.total_context_switches += 1;
        if let Some(tcb) = self.tasks.get_mut(task) {
            tcb.cpu = None;
            tcb.last_cpu = Some(cpu);
        }
        Some(task)
    }

    /// Drop `cpu`'s current task without saving it (deletion, restart).
    pub(crate) fn discard(&mut self, cpu: usize) {
        self.processors[cpu].executing = None;
        if let Some(owner) = self.processors[cpu].owner {
            self.mark(owner);
        }
    }

    // ------------------------------------------------------------------
    // Clock tick
    // ------------------------------------------------------------------

    /// Advance the clock by one tick: charge executing tasks, enforce
    /// timeslices and CBS budgets, roll server periods, fire timeouts and
    /// dispatch.
    pub fn tick(&mut self) {
        self.now += 1;
        crate::logger::set_tick(self.now);

        for cpu in 0..self.processors.len() {
            if !self.processors[cpu].online {
                continue;
            }
            let Some(id) = self.processors[cpu].executing else {
                self.processors[cpu].idle_ticks.fetch_add(1, Ordering::Relaxed);
                continue;
            };
            let Some(tcb) = self.tasks.get_mut(id) else {
                continue;
            };
            if tcb.state != TaskState::Executing {
                continue;
            }
            tcb.cpu_time += 1;
            self.charge_budget(id);
            self.charge_timeslice(cpu, id);
        }

        self.replenish_servers();
        self.fire_timeouts();
        self.dispatch();
    }

    /// Advance the clock by `ticks` ticks.
    pub fn advance(&mut self, ticks: u64) {
        for _ in 0..ticks {
            self.tick();
        }
    }

    fn charge_timeslice(&mut self, cpu: usize, id: TaskId) {
        let replenish = self.ticks_per_timeslice;
        let Some(tcb) = self.tasks.get_mut(id) else {
            return;
        };
        if !tcb.preemptible || !tcb.timeslice || tcb.state != TaskState::Executing {
            return;
        }
        tcb.timeslice_remaining = tcb.timeslice_remaining.saturating_sub(1);
        if tcb.timeslice_remaining > 0 {
            return;
        }
        tcb.timeslice_remaining = replenish;
        if self.has_equal_peer(id, cpu) {
            self.rotate(id);
            self.stats.timeslice_rotations += 1;
        }
    }

    /// Whether a ready task with the same key as `id` may run on `cpu`.
    pub(crate) fn has_equal_peer(&self, id: TaskId, cpu: usize) -> bool {
        let Some(tcb) = self.tasks.get(id) else {
            return false;
        };
        let instance = &self.instances[tcb.home.index()];
        let key = instance.key_of(tcb);
        let tasks = &self.tasks;
        let found = instance.ready.first_matching(&mut |peer, peer_key| {
            peer_key > key
                || (peer_key == key && tasks.get(peer).map_or(false, |t| t.can_run_on(cpu)))
        });
        found
            .and_then(|peer| instance.ready.key_of(peer))
            .map_or(false, |peer_key| peer_key == key)
    }

    /// Move an executing task behind its equals; the processor is handed
    /// over at the next dispatch.
    pub(crate) fn rotate(&mut self, id: TaskId) {
        let Some(tcb) = self.tasks.get_mut(id) else {
            return;
        };
        tcb.state = TaskState::Ready;
        let tcb = *tcb;
        self.instances[tcb.home.index()].enqueue(&tcb);
        ktrace!("Task {} rotated behind its priority group", id);
    }
}
