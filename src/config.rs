//! Boot-time scheduler configuration
//!
//! The instance table and processor assignment are fixed before the first
//! task runs. After `scheduler::init` only the add/remove processor
//! directives change the assignment.

use alloc::vec;
use alloc::vec::Vec;
use core::fmt;

use crate::logger::{self, LogLevel};
use crate::scheduler::{
    CpuMask, ObjectName, Priority, SchedAlgorithm, DEFAULT_MAX_PRIORITY, DEFAULT_MAX_TASKS,
    DEFAULT_TICKS_PER_TIMESLICE, MAX_CPUS, MAX_PRIORITY_LIMIT,
};

/// One scheduler instance of the instance table
#[derive(Clone, Copy, Debug)]
pub struct SchedulerConfig {
    pub name: ObjectName,
    pub algorithm: SchedAlgorithm,
    pub max_priority: Priority,
    /// Processors owned at boot
    pub processors: CpuMask,
}

impl SchedulerConfig {
    pub fn new(name: &str, algorithm: SchedAlgorithm) -> Self {
        Self {
            name: ObjectName::from_str(name),
            algorithm,
            max_priority: DEFAULT_MAX_PRIORITY,
            processors: CpuMask::empty(),
        }
    }

    pub fn with_max_priority(mut self, max_priority: Priority) -> Self {
        self.max_priority = max_priority;
        self
    }

    pub fn with_processors(mut self, processors: CpuMask) -> Self {
        self.processors = processors;
        self
    }
}

/// Whole-system configuration
#[derive(Clone, Debug)]
pub struct SystemConfig {
    /// Configured processor maximum
    pub processor_max: usize,
    /// Processors the platform brought online
    pub online: CpuMask,
    pub ticks_per_timeslice: u32,
    pub max_tasks: usize,
    pub instances: Vec<SchedulerConfig>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ConfigError {
    EmptyInstanceTable,
    DuplicateName(ObjectName),
    ProcessorOutOfRange(usize),
    ProcessorAssignedTwice(usize),
    UniprocessorOverloaded(ObjectName),
    PriorityOutOfRange(Priority),
    InvalidProcessorMax(usize),
    InvalidTimeslice,
    SmpDisabled,
    AlreadyInitialized,
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::EmptyInstanceTable => write!(f, "no scheduler instance configured"),
            ConfigError::DuplicateName(name) => write!(f, "duplicate scheduler name '{}'", name),
            ConfigError::ProcessorOutOfRange(cpu) => {
                write!(f, "processor {} beyond processor maximum", cpu)
            }
            ConfigError::ProcessorAssignedTwice(cpu) => {
                write!(f, "processor {} assigned to two schedulers", cpu)
            }
            ConfigError::UniprocessorOverloaded(name) => {
                write!(f, "uniprocessor scheduler '{}' owns several processors", name)
            }
            ConfigError::PriorityOutOfRange(prio) => {
                write!(f, "maximum priority {} out of range", prio)
            }
            ConfigError::InvalidProcessorMax(max) => write!(f, "invalid processor maximum {}", max),
            ConfigError::InvalidTimeslice => write!(f, "timeslice must be at least one tick"),
            ConfigError::SmpDisabled => write!(f, "SMP scheduler configured without smp support"),
            ConfigError::AlreadyInitialized => write!(f, "scheduler already initialized"),
        }
    }
}

impl SystemConfig {
    /// One processor owned by a single instance of `algorithm`.
    pub fn uniprocessor(algorithm: SchedAlgorithm) -> Self {
        Self {
            processor_max: 1,
            online: CpuMask::single(0),
            ticks_per_timeslice: DEFAULT_TICKS_PER_TIMESLICE,
            max_tasks: DEFAULT_MAX_TASKS,
            instances: vec![SchedulerConfig::new(default_name(algorithm), algorithm)
                .with_processors(CpuMask::single(0))],
        }
    }

    /// `processors` online processors all owned by one instance of `algorithm`.
    pub fn smp(algorithm: SchedAlgorithm, processors: usize) -> Self {
        Self {
            processor_max: processors,
            online: CpuMask::first_n(processors),
            ticks_per_timeslice: DEFAULT_TICKS_PER_TIMESLICE,
            max_tasks: DEFAULT_MAX_TASKS,
            instances: vec![SchedulerConfig::new(default_name(algorithm), algorithm)
                .with_processors(CpuMask::first_n(processors))],
        }
    }

    /// Empty instance table over `processor_max` online processors.
    pub fn with_processors(processor_max: usize) -> Self {
        Self {
            processor_max,
            online: CpuMask::first_n(processor_max),
            ticks_per_timeslice: DEFAULT_TICKS_PER_TIMESLICE,
            max_tasks: DEFAULT_MAX_TASKS,
            instances: Vec::new(),
        }
    }

    pub fn with_instance(mut self, instance: SchedulerConfig) -> Self {
        self.instances.push(instance);
        self
    }

    pub fn with_timeslice(mut self, ticks: u32) -> Self {
        self.ticks_per_timeslice = ticks;
        self
    }

    pub fn with_online(mut self, online: CpuMask) -> Self {
        self.online = online;
        self
    }

    pub fn with_max_tasks(mut self, max_tasks: usize) -> Self {
        self.max_tasks = max_tasks;
        self
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.processor_max == 0 || self.processor_max > MAX_CPUS {
            return Err(ConfigError::InvalidProcessorMax(self.processor_max));
        }
        if self.ticks_per_timeslice == 0 {
            return Err(ConfigError::InvalidTimeslice);
        }
        if self.instances.is_empty() {
            return Err(ConfigError::EmptyInstanceTable);
        }

        let mut assigned = CpuMask::empty();
        for (idx, instance) in self.instances.iter().enumerate() {
            if self.instances[..idx].iter().any(|o| o.name == instance.name) {
                return Err(ConfigError::DuplicateName(instance.name));
            }
            if instance.max_priority == 0 || instance.max_priority > MAX_PRIORITY_LIMIT {
                return Err(ConfigError::PriorityOutOfRange(instance.max_priority));
            }
            if instance.algorithm.is_smp() && !cfg!(feature = "smp") {
                return Err(ConfigError::SmpDisabled);
            }
            if !instance.algorithm.is_smp() && instance.processors.count() > 1 {
                return Err(ConfigError::UniprocessorOverloaded(instance.name));
            }
            for cpu in instance.processors.iter() {
                if cpu >= self.processor_max {
                    return Err(ConfigError::ProcessorOutOfRange(cpu));
                }
                if assigned.is_set(cpu) {
                    return Err(ConfigError::ProcessorAssignedTwice(cpu));
                }
                assigned.set(cpu);
            }
        }
        Ok(())
    }

    /// Apply boot command-line directives.
    ///
    /// Understands `sched.timeslice=<ticks>`, `sched.cpus=<n>` (limits the
    /// online processors) and `loglevel=<level>`. Unknown tokens are ignored.
    pub fn apply_cmdline(&mut self, cmdline: &str) {
        crate::kinfo!("Parsing scheduler configuration from cmdline: {}", cmdline);

        for token in cmdline.split_whitespace() {
            let Some((key, value)) = token.split_once('=') else {
                continue;
            };
            match key {
                "sched.timeslice" => match value.parse::<u32>() {
                    Ok(ticks) if ticks > 0 => {
                        self.ticks_per_timeslice = ticks;
                        crate::kinfo!("Scheduler config: timeslice={} ticks", ticks);
                    }
                    _ => crate::kwarn!("Scheduler config: ignoring timeslice '{}'", value),
                },
                "sched.cpus" => match value.parse::<usize>() {
                    Ok(cpus) if cpus > 0 => {
                        self.online = self.online.and(&CpuMask::first_n(cpus));
                        crate::kinfo!("Scheduler config: cpus={}", cpus);
                    }
                    _ => crate::kwarn!("Scheduler config: ignoring cpus '{}'", value),
                },
                _ => {}
            }
        }

        if let Some(level) = logger::parse_level_directive(cmdline) {
            logger::set_max_level(level);
            crate::kinfo!("Kernel log level set to {}", LogLevel::as_str(level));
        }
    }
}

fn default_name(algorithm: SchedAlgorithm) -> &'static str {
    match algorithm {
        SchedAlgorithm::DeterministicPriority => "UPD ",
        SchedAlgorithm::SimplePriority => "UPS ",
        SchedAlgorithm::Edf => "UPE ",
        SchedAlgorithm::Cbs => "UPC ",
        SchedAlgorithm::SmpDeterministicPriority => "MPD ",
        SchedAlgorithm::SmpSimplePriority => "MPS ",
        SchedAlgorithm::SmpEdf => "MPE ",
        SchedAlgorithm::SmpPriorityAffinity => "MPA ",
    }
}
