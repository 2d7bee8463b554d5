//! Scheduler type definitions
//!
//! This module contains the identifiers, masks and state enums shared by the
//! whole scheduler subsystem.

use core::fmt;

use bitflags::bitflags;

/// Task priority. Lower values are more important.
pub type Priority = u32;

/// Maximum number of processors the core can address
pub const MAX_CPUS: usize = 256;

/// Number of 64-bit words backing a [`CpuMask`]
pub const CPU_MASK_WORDS: usize = MAX_CPUS / 64;

/// Default maximum priority of a scheduler instance
pub const DEFAULT_MAX_PRIORITY: Priority = 255;

/// Upper bound for a configured maximum priority (two-level bitmap capacity)
pub const MAX_PRIORITY_LIMIT: Priority = 4095;

/// Default number of ticks in one timeslice quantum
pub const DEFAULT_TICKS_PER_TIMESLICE: u32 = 50;

/// Default capacity of the task table
pub const DEFAULT_MAX_TASKS: usize = 1024;

/// Stable task identifier. It doubles as the task's slot in the task table.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TaskId(pub u32);

impl TaskId {
    #[inline]
    pub const fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for TaskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "T{}", self.0)
    }
}

/// Scheduler instance identifier (index into the instance table).
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SchedulerId(pub u32);

impl SchedulerId {
    #[inline]
    pub const fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for SchedulerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "S{}", self.0)
    }
}

/// Four-character object name, packed big-endian like classic RTOS names.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Default)]
pub struct ObjectName(pub u32);

impl ObjectName {
    pub const fn new(chars: &[u8; 4]) -> Self {
        Self(u32::from_be_bytes(*chars))
    }

    /// Build a name from up to four bytes of `s`, padding with spaces.
    pub fn from_str(s: &str) -> Self {
        let mut chars = [b' '; 4];
        for (dst, src) in chars.iter_mut().zip(s.bytes()) {
            *dst = src;
        }
        Self::new(&chars)
    }

    pub const fn as_bytes(self) -> [u8; 4] {
        self.0.to_be_bytes()
    }
}

impl fmt::Display for ObjectName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for byte in self.as_bytes() {
            let c = if byte.is_ascii_graphic() || byte == b' ' {
                byte as char
            } else {
                '?'
            };
            write!(f, "{}", c)?;
        }
        Ok(())
    }
}

/// Task life-cycle state
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TaskState {
    NonExistent,
    Dormant,
    Ready,
    Blocked,
    Executing,
}

impl TaskState {
    pub const fn as_str(self) -> &'static str {
        match self {
            TaskState::NonExistent => "NonExistent",
            TaskState::Dormant => "Dormant",
            TaskState::Ready => "Ready",
            TaskState::Blocked => "Blocked",
            TaskState::Executing => "Executing",
        }
    }

    /// Whether the scheduler owns the task (started and not deleted).
    pub const fn is_started(self) -> bool {
        matches!(
            self,
            TaskState::Ready | TaskState::Blocked | TaskState::Executing
        )
    }
}

bitflags! {
    /// Reasons a blocked task is waiting. A task leaves the blocked state
    /// only when every bit is clear.
    #[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
    pub struct WaitFlags: u32 {
        const MESSAGE   = 1 << 0;
        const SEMAPHORE = 1 << 1;
        const DELAY     = 1 << 2;
        const PERIOD    = 1 << 3;
        const SEGMENT   = 1 << 4;
        const EVENT     = 1 << 5;
        const BARRIER   = 1 << 6;
        const SUSPENDED = 1 << 31;

        /// Every reason that is satisfied by the awaited condition or a timeout
        const CONDITION = Self::MESSAGE.bits()
            | Self::SEMAPHORE.bits()
            | Self::DELAY.bits()
            | Self::PERIOD.bits()
            | Self::SEGMENT.bits()
            | Self::EVENT.bits()
            | Self::BARRIER.bits();
    }
}

/// Processor set, one bit per processor index.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct CpuMask {
    bits: [u64; CPU_MASK_WORDS],
}

impl CpuMask {
    pub const fn empty() -> Self {
        Self {
            bits: [0; CPU_MASK_WORDS],
        }
    }

    pub const fn all() -> Self {
        Self {
            bits: [u64::MAX; CPU_MASK_WORDS],
        }
    }

    pub fn single(cpu: usize) -> Self {
        let mut mask = Self::empty();
        mask.set(cpu);
        mask
    }

    /// Mask containing processors `0..count`.
    pub fn first_n(count: usize) -> Self {
        let mut mask = Self::empty();
        for cpu in 0..count.min(MAX_CPUS) {
            mask.set(cpu);
        }
        mask
    }

    /// Build a mask from raw words; words beyond the mask capacity are ignored.
    pub fn from_words(words: &[u64]) -> Self {
        let mut mask = Self::empty();
        for (dst, src) in mask.bits.iter_mut().zip(words.iter()) {
            *dst = *src;
        }
        mask
    }

    pub fn words(&self) -> &[u64; CPU_MASK_WORDS] {
        &self.bits
    }

    #[inline]
    pub fn set(&mut self, cpu: usize) {
        if cpu < MAX_CPUS {
            self.bits[cpu / 64] |= 1u64 << (cpu % 64);
        }
    }

    #[inline]
    pub fn clear(&mut self, cpu: usize) {
        if cpu < MAX_CPUS {
            self.bits[cpu / 64] &= !(1u64 << (cpu % 64));
        }
    }

    #[inline]
    pub fn is_set(&self, cpu: usize) -> bool {
        cpu < MAX_CPUS && (self.bits[cpu / 64] & (1u64 << (cpu % 64))) != 0
    }

    pub fn is_empty(&self) -> bool {
        self.bits.iter().all(|w| *w == 0)
    }

    pub fn count(&self) -> usize {
        self.bits.iter().map(|w| w.count_ones() as usize).sum()
    }

    pub fn first_set(&self) -> Option<usize> {
        self.bits
            .iter()
            .enumerate()
            .find(|(_, w)| **w != 0)
            .map(|(i, w)| i * 64 + w.trailing_zeros() as usize)
    }

    pub fn last_set(&self) -> Option<usize> {
        self.bits
            .iter()
            .enumerate()
            .rev()
            .find(|(_, w)| **w != 0)
            .map(|(i, w)| i * 64 + 63 - w.leading_zeros() as usize)
    }

    pub fn and(&self, other: &CpuMask) -> CpuMask {
        let mut out = *self;
        for (dst, src) in out.bits.iter_mut().zip(other.bits.iter()) {
            *dst &= *src;
        }
        out
    }

    pub fn or(&self, other: &CpuMask) -> CpuMask {
        let mut out = *self;
        for (dst, src) in out.bits.iter_mut().zip(other.bits.iter()) {
            *dst |= *src;
        }
        out
    }

    pub fn without(&self, cpu: usize) -> CpuMask {
        let mut out = *self;
        out.clear(cpu);
        out
    }

    pub fn intersects(&self, other: &CpuMask) -> bool {
        self.bits
            .iter()
            .zip(other.bits.iter())
            .any(|(a, b)| (a & b) != 0)
    }

    /// Whether every processor of `other` is also in `self`.
    pub fn contains_all(&self, other: &CpuMask) -> bool {
        self.bits
            .iter()
            .zip(other.bits.iter())
            .all(|(a, b)| (a & b) == *b)
    }

    pub fn iter(&self) -> CpuMaskIter<'_> {
        CpuMaskIter { mask: self, next: 0 }
    }
}

impl Default for CpuMask {
    fn default() -> Self {
        Self::all()
    }
}

impl fmt::Debug for CpuMask {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_set().entries(self.iter()).finish()
    }
}

pub struct CpuMaskIter<'a> {
    mask: &'a CpuMask,
    next: usize,
}

impl Iterator for CpuMaskIter<'_> {
    type Item = usize;

    fn next(&mut self) -> Option<usize> {
        while self.next < MAX_CPUS {
            let word = self.mask.bits[self.next / 64] >> (self.next % 64);
            if word == 0 {
                self.next = (self.next / 64 + 1) * 64;
                continue;
            }
            let cpu = self.next + word.trailing_zeros() as usize;
            self.next = cpu + 1;
            return Some(cpu);
        }
        None
    }
}

/// Scheduler statistics structure
#[derive(Clone, Copy, Debug, Default)]
pub struct SchedulerStats {
    pub total_context_switches: u64,
    pub total_preemptions: u64,
    pub total_voluntary_switches: u64,
    pub timeslice_rotations: u64,
    pub migration_count: u64,
    pub fp_saves: u64,
    pub fp_restores: u64,
    pub cbs_overruns: u64,
    pub cbs_admission_demotions: u64,
    pub timeouts_fired: u64,
    pub deferred_dispatches: u64,
}

impl SchedulerStats {
    pub const fn new() -> Self {
        Self {
            total_context_switches: 0,
            total_preemptions: 0,
            total_voluntary_switches: 0,
            timeslice_rotations: 0,
            migration_count: 0,
            fp_saves: 0,
            fp_restores: 0,
            cbs_overruns: 0,
            cbs_admission_demotions: 0,
            timeouts_fired: 0,
            deferred_dispatches: 0,
        }
    }
}
