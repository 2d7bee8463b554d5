//! Task control blocks and the task table
//!
//! The table is an arena indexed by [`TaskId`]. A slot holds a TCB from task
//! creation (dormant) until deletion, when the slot becomes free again and the
//! task is non-existent.

use alloc::vec::Vec;

use super::cbs::CbsServer;
use super::error::{SchedError, SchedResult};
use super::timeout::TimeoutKey;
use super::types::{CpuMask, ObjectName, Priority, SchedulerId, TaskId, TaskState, WaitFlags};

/// Creation parameters of a task.
#[derive(Clone, Copy, Debug)]
pub struct TaskParams {
    pub name: ObjectName,
    pub priority: Priority,
    pub scheduler: SchedulerId,
    pub preemptible: bool,
    pub timeslice: bool,
    pub fp: bool,
    pub affinity: CpuMask,
}

impl TaskParams {
    pub fn new(priority: Priority) -> Self {
        Self {
            name: ObjectName::default(),
            priority,
            scheduler: SchedulerId(0),
            preemptible: true,
            timeslice: false,
            fp: false,
            affinity: CpuMask::all(),
        }
    }

    pub fn named(mut self, name: &str) -> Self {
        self.name = ObjectName::from_str(name);
        self
    }

    pub fn on(mut self, scheduler: SchedulerId) -> Self {
        self.scheduler = scheduler;
        self
    }

    pub fn non_preemptible(mut self) -> Self {
        self.preemptible = false;
        self
    }

    pub fn with_timeslice(mut self) -> Self {
        self.timeslice = true;
        self
    }

    pub fn with_fp(mut self) -> Self {
        self.fp = true;
        self
    }

    pub fn with_affinity(mut self, affinity: CpuMask) -> Self {
        self.affinity = affinity;
        self
    }
}

/// Task control block
#[derive(Clone, Copy, Debug)]
pub struct Tcb {
    pub id: TaskId,
    pub name: ObjectName,
    pub state: TaskState,
    pub wait: WaitFlags,
    pub initial: TaskParams,
    pub base_priority: Priority,   // Priority set by the owner
    pub priority: Priority,        // Effective priority used for queueing
    pub preemptible: bool,
    pub timeslice: bool,
    pub timeslice_remaining: u32,
    pub fp: bool,
    pub affinity: CpuMask,
    pub pinned: Option<usize>,
    pub home: SchedulerId,
    pub deadline: Option<u64>,     // Absolute deadline tick (EDF/CBS)
    pub cbs: Option<CbsServer>,
    pub cpu: Option<usize>,        // Processor currently executing this task
    pub last_cpu: Option<usize>,
    pub timeout: Option<TimeoutKey>, // Armed timeout (expiry tick, arming order)
    pub cpu_time: u64,
    pub dispatch_count: u64,
    pub preempt_count: u64,
    pub voluntary_switches: u64,
}

impl Tcb {
    fn new(id: TaskId, params: TaskParams) -> Self {
        Self {
            id,
            name: params.name,
            state: TaskState::Dormant,
            wait: WaitFlags::empty(),
            initial: params,
            base_priority: params.priority,
            priority: params.priority,
            preemptible: params.preemptible,
            timeslice: params.timeslice,
            timeslice_remaining: 0,
            fp: params.fp,
            affinity: params.affinity,
            pinned: None,
            home: params.scheduler,
            deadline: None,
            cbs: None,
            cpu: None,
            last_cpu: None,
            timeout: None,
            cpu_time: 0,
            dispatch_count: 0,
            preempt_count: 0,
            voluntary_switches: 0,
        }
    }

    /// Whether a CBS server currently holds this task at background priority.
    #[inline]
    pub fn throttled(&self) -> bool {
        self.cbs.map_or(false, |s| s.throttled)
    }

    /// Processors this task may run on, restricted to `owned`.
    pub fn eligible(&self, owned: &CpuMask) -> CpuMask {
        match self.pinned {
            Some(cpu) if owned.is_set(cpu) => CpuMask::single(cpu),
            Some(_) => CpuMask::empty(),
            None => self.affinity.and(owned),
        }
    }

    #[inline]
    pub fn can_run_on(&self, cpu: usize) -> bool {
        match self.pinned {
            Some(p) => p == cpu,
            None => self.affinity.is_set(cpu),
        }
    }
}

/// Arena of task control blocks
pub struct TaskTable {
    slots: Vec<Option<Tcb>>,
    capacity: usize,
    live: usize,
}

impl TaskTable {
    pub const fn new(capacity: usize) -> Self {
        Self {
            slots: Vec::new(),
            capacity,
            live: 0,
        }
    }

    /// Allocate a slot and create a dormant task in it.
    pub fn create(&mut self, params: TaskParams) -> SchedResult<TaskId> {
        let idx = match self.slots.iter().position(|slot| slot.is_none()) {
            Some(idx) => idx,
            None if self.slots.len() < self.capacity => {
                self.slots.push(None);
                self.slots.len() - 1
            }
            None => return Err(SchedError::TooMany),
        };
        let id = TaskId(idx as u32);
        self.slots[idx] = Some(Tcb::new(id, params));
        self.live += 1;
        Ok(id)
    }

    /// Free the slot; the task becomes non-existent.
    pub fn free(&mut self, id: TaskId) -> Option<Tcb> {
        let tcb = self.slots.get_mut(id.index())?.take()?;
        self.live -= 1;
        Some(tcb)
    }

    #[inline]
    pub fn get(&self, id: TaskId) -> Option<&Tcb> {
        self.slots.get(id.index()).and_then(|slot| slot.as_ref())
    }

    #[inline]
    pub fn get_mut(&mut self, id: TaskId) -> Option<&mut Tcb> {
        self.slots.get_mut(id.index()).and_then(|slot| slot.as_mut())
    }

    pub fn lookup(&self, id: TaskId) -> SchedResult<&Tcb> {
        self.get(id).ok_or(SchedError::InvalidId)
    }

    pub fn lookup_mut(&mut self, id: TaskId) -> SchedResult<&mut Tcb> {
        self.get_mut(id).ok_or(SchedError::InvalidId)
    }

    pub fn state(&self, id: TaskId) -> TaskState {
        self.get(id).map_or(TaskState::NonExistent, |tcb| tcb.state)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Tcb> {
        self.slots.iter().filter_map(|slot| slot.as_ref())
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut Tcb> {
        self.slots.iter_mut().filter_map(|slot| slot.as_mut())
    }

    pub fn ids(&self) -> Vec<TaskId> {
        self.iter().map(|tcb| tcb.id).collect()
    }

    pub fn len(&self) -> usize {
        self.live
    }

    pub fn is_empty(&self) -> bool {
        self.live == 0
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}
