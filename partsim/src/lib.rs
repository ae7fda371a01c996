//! Welcome to `partsim`!
//!
//! A fixed-partition multiprogramming simulator. Memory is carved into
//! partitions whose sizes never change; a batch of jobs competes for them,
//! one logical tick at a time, under either first-fit or best-fit placement.

mod job;
mod clock;
mod eventlog;

pub mod algo;
pub mod ledger;
pub mod registry;
pub mod analyze;
pub mod snapshot;
pub mod controller;
pub mod workload;
pub mod helpe;

pub use crate::helpe::*;

/// Our fundamental unit of interest. A [`Job`] asks for
/// [`size`](Job::size) KB of memory for [`run_time`](Job::run_time)
/// consecutive ticks.
///
/// Everything that changes while the simulation runs lives in
/// [`state`](Job::state). The lifecycle is one-way:
///
/// ```text
/// Waiting ──► Running ──► Done
///    │
///    └──────► TooBig
/// ```
///
/// > ***ATTENTION:*** a job is [`TooBig`](JobState::TooBig) only when it
/// > exceeds *every* partition, occupied or not. A job that merely finds all
/// > suitable partitions busy keeps waiting.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Job {
    pub id:         JobId,
    pub size:       Kilobytes,
    pub run_time:   Ticks,
    /// Ticks spent in [`JobState::Waiting`] without being admitted.
    pub wait_time:  Ticks,
    pub state:      JobState,
}

/// A slice of memory fixed at initialization. Its id doubles as its
/// position in the candidate order of both placement strategies.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Partition {
    pub id:             PartitionId,
    pub size:           Kilobytes,
    pub status:         PartitionStatus,
    /// Number of admissions hosted so far. Never decremented.
    pub use_count:      u32,
    // Audit counters, updated once per tick of occupancy.
    pub busy_ticks:     Ticks,
    pub occupied_area:  KilobyteTicks,
}

/// One simulation run: a clock, a placement [`Strategy`], the jobs and the
/// partitions they compete for.
///
/// A [`Simulation`] is built from a validated [`SimConfig`] and is advanced
/// by [`Simulation::step`] (see [`algo`]). It holds no global state; the
/// [`controller::SimulationController`] owns the live instance.
#[derive(Debug, Clone)]
pub struct Simulation {
    config:     SimConfig,
    clock:      clock::Clock,
    strategy:   Strategy,
    ledger:     ledger::JobLedger,
    registry:   registry::PartitionRegistry,
    log:        eventlog::EventLog,
    admissions: Vec<Admission>,
}

impl Simulation {
    /// Builds a fresh simulation. The configuration is validated before
    /// anything is constructed.
    pub fn new(config: &SimConfig) -> Result<Self, ConfigError> {
        Self::with_log_capacity(config, DEFAULT_LOG_CAPACITY)
    }

    pub fn with_log_capacity(config: &SimConfig, log_capacity: usize) -> Result<Self, ConfigError> {
        let ledger = ledger::init(&config.jobs)?;
        let registry = registry::PartitionRegistry::new(&config.partitions)?;
        let mut log = eventlog::EventLog::new(log_capacity);
        log.record(0, format!(
            "Simulation started with {} jobs and {} partitions using {} strategy",
            ledger.len(),
            registry.len(),
            config.strategy,
        ));
        info!(
            jobs = ledger.len(),
            partitions = registry.len(),
            strategy = %config.strategy,
            "simulation initialized"
        );

        Ok(Self {
            config:     config.clone(),
            clock:      clock::Clock::new(),
            strategy:   config.strategy,
            ledger,
            registry,
            log,
            admissions: vec![],
        })
    }

    pub fn config(&self) -> &SimConfig {
        &self.config
    }

    pub fn clock(&self) -> Ticks {
        self.clock.now()
    }

    pub fn strategy(&self) -> Strategy {
        self.strategy
    }

    pub fn jobs(&self) -> &ledger::JobLedger {
        &self.ledger
    }

    pub fn partitions(&self) -> &registry::PartitionRegistry {
        &self.registry
    }

    /// Every admission made so far, in the order they happened.
    pub fn admissions(&self) -> &[Admission] {
        &self.admissions
    }

    pub fn recent_logs(&self) -> Vec<String> {
        self.log.lines()
    }

    /// Lines dropped from the front of the bounded event log.
    pub fn evicted_logs(&self) -> u64 {
        self.log.evicted()
    }

    /// `true` iff every job is either done or too big.
    pub fn is_done(&self) -> bool {
        self.ledger.all_settled()
    }
}
