use crate::helpe::*;

/// The jobs of a simulation, keyed by id and kept in input order.
///
/// Input order is admission priority: within one step, a job listed
/// earlier is always offered a partition before any job listed later.
#[derive(Debug, Clone, Default)]
pub struct JobLedger {
    jobs: IndexMap<JobId, Job>,
}

/// What one tick of running did to the running jobs.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TickReport {
    /// Every job that ran this tick: (job, its partition, its size).
    pub ran:        Vec<(JobId, PartitionId, Kilobytes)>,
    /// The subset that finished, with the partition each one vacates.
    pub finished:   Vec<(JobId, PartitionId)>,
}

/// Builds a [JobLedger] out of the input jobs. A successfully returned
/// ledger is guaranteed to be compliant with all of `partsim`'s
/// assumptions about jobs (see [`check_jobs`]):
/// - at least one job
/// - no job has a zero id, size, or run time
/// - sizes and run times stay within [`MAX_KILOBYTES`] and [`MAX_RUN_TIME`]
/// - no two jobs share an id
pub fn init(specs: &[JobSpec]) -> Result<JobLedger, ConfigError> {
    check_jobs(specs)?;
    let jobs = specs.iter()
        .map(|s| (s.id, Job::new(s)))
        .collect();

    Ok(JobLedger { jobs })
}

impl JobLedger {
    pub fn len(&self) -> usize {
        self.jobs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.jobs.is_empty()
    }

    pub fn get(&self, id: JobId) -> Option<&Job> {
        self.jobs.get(&id)
    }

    fn get_mut(&mut self, id: JobId) -> Result<&mut Job, StateError> {
        self.jobs.get_mut(&id).ok_or(StateError::UnknownJob(id))
    }

    /// All jobs, in input order.
    pub fn iter(&self) -> impl Iterator<Item = &Job> {
        self.jobs.values()
    }

    /// Waiting jobs, in input order.
    pub fn waiting_jobs(&self) -> impl Iterator<Item = &Job> {
        self.iter().filter(|j| j.is_waiting())
    }

    pub fn running_jobs(&self) -> impl Iterator<Item = &Job> {
        self.iter().filter(|j| j.is_running())
    }

    pub fn count(&self, status: JobStatus) -> usize {
        self.iter().filter(|j| j.status() == status).count()
    }

    /// `true` once no job can change anymore.
    pub fn all_settled(&self) -> bool {
        self.iter().all(|j| j.state.is_settled())
    }

    /// Upper bound on the number of steps needed to settle every job:
    /// the sum of all run times plus one step per job.
    /// Saturates rather than overflowing.
    pub fn step_bound(&self) -> u64 {
        self.iter()
            .fold(0u64, |acc, j| acc.saturating_add(j.run_time.saturating_add(1)))
    }

    pub fn mark_running(&mut self, id: JobId, partition: PartitionId, now: Ticks) -> Result<(), StateError> {
        self.get_mut(id)?.admit(partition, now)
    }

    pub fn mark_too_big(&mut self, id: JobId) -> Result<(), StateError> {
        self.get_mut(id)?.reject()
    }

    /// Runs every running job for one tick. Jobs whose run time is used
    /// up become done as of `now`.
    pub fn tick_running(&mut self, now: Ticks) -> Result<TickReport, StateError> {
        let mut report = TickReport::default();
        for j in self.jobs.values_mut().filter(|j| j.is_running()) {
            let id = j.id;
            let size = j.size;
            // Grab the partition before the job possibly leaves it.
            let partition = j.partition().ok_or(StateError::UnknownJob(id))?;
            report.ran.push((id, partition, size));
            if let Some(vacated) = j.run_one_tick(now)? {
                report.finished.push((id, vacated));
            }
        }

        Ok(report)
    }

    /// Charges one tick of waiting to every job still waiting. Returns
    /// how many there were.
    pub fn accumulate_wait(&mut self) -> usize {
        let mut waiting = 0;
        for j in self.jobs.values_mut().filter(|j| j.is_waiting()) {
            j.wait_one_tick();
            waiting += 1;
        }

        waiting
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ledger(jobs: &[(JobId, Kilobytes, Ticks)]) -> JobLedger {
        let specs: Vec<JobSpec> = jobs.iter().map(|&j| j.into()).collect();
        init(&specs).unwrap()
    }

    #[test]
    fn init_keeps_input_order() {
        let l = ledger(&[(9, 1, 1), (2, 1, 1), (5, 1, 1)]);
        assert_eq!(l.iter().map(|j| j.id).collect::<Vec<_>>(), vec![9, 2, 5]);
        assert_eq!(l.step_bound(), 6);
    }

    #[test]
    fn init_rejects_bad_jobs() {
        assert!(matches!(init(&[]), Err(ConfigError::NoJobs)));
        let dup: Vec<JobSpec> = vec![(4, 1, 1).into(), (4, 2, 2).into()];
        assert!(matches!(init(&dup), Err(ConfigError::DuplicateJob { job: 4 })));
        let zero: Vec<JobSpec> = vec![(4, 1, 0).into()];
        assert!(matches!(init(&zero), Err(ConfigError::ZeroRunTime { job: 4 })));
    }

    #[test]
    fn init_agrees_with_config_validation() {
        let cases: [&[(JobId, Kilobytes, Ticks)]; 4] = [
            &[(0, 1, 1)],
            &[(1, MAX_KILOBYTES + 1, 1)],
            &[(1, 1, MAX_RUN_TIME + 1)],
            &[(1, 1, 1), (1, 1, 1)],
        ];
        for jobs in cases {
            let config = SimConfig::new(jobs, &[10], Strategy::FirstFit);
            assert_eq!(
                init(&config.jobs).err().map(|e| e.to_string()),
                config.validate().err().map(|e| e.to_string()),
            );
        }
    }

    #[test]
    fn step_bound_saturates() {
        let spec = JobSpec { id: 1, size: 1, run_time: u64::MAX };
        let mut jobs = IndexMap::new();
        jobs.insert(1, Job::new(&spec));
        jobs.insert(2, Job::new(&JobSpec { id: 2, ..spec }));
        let l = JobLedger { jobs };
        assert_eq!(l.step_bound(), u64::MAX);
    }

    #[test]
    fn waiting_running_done() {
        let mut l = ledger(&[(1, 10, 1), (2, 10, 2), (3, 10, 1)]);
        l.mark_running(1, 0, 0).unwrap();
        l.mark_running(2, 1, 0).unwrap();
        assert_eq!(l.accumulate_wait(), 1);
        assert_eq!(l.waiting_jobs().map(|j| j.id).collect::<Vec<_>>(), vec![3]);

        let report = l.tick_running(1).unwrap();
        assert_eq!(report.ran, vec![(1, 0, 10), (2, 1, 10)]);
        assert_eq!(report.finished, vec![(1, 0)]);
        assert_eq!(l.get(1).unwrap().completion(), Some(1));
        assert_eq!(l.count(JobStatus::Running), 1);

        l.mark_too_big(3).unwrap();
        assert!(!l.all_settled());
        let report = l.tick_running(2).unwrap();
        assert_eq!(report.finished, vec![(2, 1)]);
        assert!(l.all_settled());
        assert_eq!(l.get(3).unwrap().wait_time, 1);
    }

    #[test]
    fn unknown_job() {
        let mut l = ledger(&[(1, 10, 1)]);
        assert_eq!(l.mark_running(8, 0, 0), Err(StateError::UnknownJob(8)));
        assert_eq!(l.mark_too_big(8), Err(StateError::UnknownJob(8)));
    }
}
