pub mod placement;

use crate::{
    helpe::*,
    analyze::{compute, Statistics},
};
use self::placement::select;

/// What a single [`Simulation::step`] did.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StepReport {
    /// Clock value the step ran at (i.e., before advancing).
    pub tick:           Ticks,
    /// `false` if the simulation was already finished and nothing moved.
    pub advanced:       bool,
    pub completed:      Vec<JobId>,
    pub admitted:       Vec<(JobId, PartitionId)>,
    pub too_big:        Vec<JobId>,
    /// Jobs left waiting once the admission pass was over.
    pub still_waiting:  usize,
}

impl Simulation {
    /// Advances the simulation by one tick.
    ///
    /// Phases, in order, all at the current clock value `now`:
    ///
    /// 1. **Completion pass.** Every running job burns one tick. Jobs that
    ///    run out become done with `completion = now`, and their partitions
    ///    are freed (use counts stay).
    /// 2. **Admission pass.** Waiting jobs are considered in input order.
    ///    A job larger than every partition becomes too big for good.
    ///    Otherwise the [`Strategy`] picks among the partitions free *right
    ///    now*, which includes those freed in phase 1 and excludes those
    ///    taken earlier in this same pass. Jobs nobody could host are
    ///    charged one tick of waiting.
    /// 3. The clock advances by one.
    ///
    /// A job admitted at tick `t` therefore completes at exactly
    /// `t + run_time`.
    ///
    /// Stepping a finished simulation changes nothing.
    pub fn step(&mut self) -> Result<StepReport, StateError> {
        let now = self.clock.now();
        if self.is_done() {
            trace!(tick = now, "step on a finished simulation ignored");
            return Ok(StepReport { tick: now, ..Default::default() });
        }

        let mut report = StepReport {
            tick:       now,
            advanced:   true,
            ..Default::default()
        };
        self.completion_pass(now, &mut report)?;
        self.admission_pass(now, &mut report)?;
        self.clock.advance();
        trace!(
            tick = now,
            completed = report.completed.len(),
            admitted = report.admitted.len(),
            waiting = report.still_waiting,
            "step done"
        );

        Ok(report)
    }

    fn completion_pass(&mut self, now: Ticks, report: &mut StepReport) -> Result<(), StateError> {
        let ticked = self.ledger.tick_running(now)?;
        for &(_, partition, size) in &ticked.ran {
            self.registry.record_busy_tick(partition, size)?;
        }
        for (job, partition) in ticked.finished {
            let evicted = self.registry.release(partition)?;
            debug_assert_eq!(evicted, job, "Partition hosted someone else!");
            self.log.record(now, format!("Job {job} completed, Partition {partition} freed"));
            debug!(tick = now, job, partition, "job completed");
            report.completed.push(job);
        }

        Ok(())
    }

    fn admission_pass(&mut self, now: Ticks, report: &mut StepReport) -> Result<(), StateError> {
        // Snapshot the queue first: admitting mutates the ledger.
        let waiting: Vec<(JobId, Kilobytes)> = self.ledger
            .waiting_jobs()
            .map(|j| (j.id, j.size))
            .collect();

        for (job, size) in waiting {
            if !self.registry.could_ever_fit(size) {
                self.ledger.mark_too_big(job)?;
                self.log.record(now, format!(
                    "Job {job} (size={size}) marked as TOO BIG - largest partition is {}",
                    self.registry.max_size()
                ));
                debug!(tick = now, job, size, "job too big for every partition");
                report.too_big.push(job);
                continue;
            }

            match select(self.strategy, self.registry.free_partitions(), size) {
                Some(partition) => {
                    self.registry.occupy(partition, job)?;
                    self.ledger.mark_running(job, partition, now)?;
                    let partition_size = self.registry
                        .get(partition)
                        .map(|p| p.size)
                        .ok_or(StateError::UnknownPartition(partition))?;
                    self.admissions.push(Admission {
                        job,
                        partition,
                        tick:       now,
                        job_size:   size,
                        partition_size,
                    });
                    self.log.record(now, format!(
                        "Job {job} (size={size}) allocated to Partition {partition} (size={partition_size}) via {}",
                        self.strategy
                    ));
                    debug!(tick = now, job, partition, leftover = partition_size - size, "job admitted");
                    report.admitted.push((job, partition));
                },
                None            => {
                    self.log.record(now, format!(
                        "Job {job} (size={size}) waiting - no suitable partition available"
                    ));
                }
            }
        }
        report.still_waiting = self.ledger.accumulate_wait();

        Ok(())
    }

    /// Steps until every job is done or too big. Returns the number of
    /// steps taken.
    ///
    /// Termination is guaranteed within [`JobLedger::step_bound`] steps;
    /// exceeding it means an invariant broke, and is reported rather than
    /// looped on.
    pub fn run_to_completion(&mut self) -> Result<u64, StateError> {
        let bound = self.ledger.step_bound();
        let mut steps = 0;
        while !self.is_done() {
            if steps >= bound {
                warn!(steps, bound, "simulation failed to settle");
                return Err(StateError::Stalled { steps });
            }
            self.step()?;
            steps += 1;
        }
        info!(steps, clock = self.clock.now(), strategy = %self.strategy, "simulation finished");

        Ok(steps)
    }

    /// Statistics over the current state. Meaningful at any time, final
    /// once [`Simulation::is_done`].
    pub fn statistics(&self) -> Statistics {
        compute(self)
    }
}

/// Runs `config` to completion once per [`Strategy`], in parallel, and
/// returns the final statistics in [`Strategy::ALL`] order. The strategy
/// named in `config` is ignored.
pub fn compare_strategies(config: &SimConfig) -> Result<Vec<Statistics>, SimError> {
    config.validate()?;
    Strategy::ALL
        .par_iter()
        .map(|&strategy| -> Result<Statistics, SimError> {
            let mut sim = Simulation::new(&SimConfig {
                strategy,
                ..config.clone()
            })?;
            sim.run_to_completion()?;
            Ok(sim.statistics())
        })
        .collect()
}
