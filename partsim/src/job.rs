use crate::helpe::*;

impl Job {
    /// A freshly submitted job. Every job starts out waiting; whether it
    /// is too big is decided at its first admission attempt.
    pub fn new(spec: &JobSpec) -> Self {
        Self {
            id:         spec.id,
            size:       spec.size,
            run_time:   spec.run_time,
            wait_time:  0,
            state:      JobState::Waiting,
        }
    }

    pub fn get_id(&self) -> JobId {
        self.id
    }

    pub fn status(&self) -> JobStatus {
        self.state.status()
    }

    #[inline(always)]
    pub fn is_waiting(&self) -> bool {
        matches!(self.state, JobState::Waiting)
    }

    #[inline(always)]
    pub fn is_running(&self) -> bool {
        matches!(self.state, JobState::Running { .. })
    }

    pub fn partition(&self) -> Option<PartitionId> {
        self.state.partition()
    }

    pub fn started(&self) -> Option<Ticks> {
        self.state.started()
    }

    pub fn completion(&self) -> Option<Ticks> {
        self.state.completion()
    }

    /// Ticks left before completion. Only meaningful while running.
    pub fn remaining(&self) -> Option<Ticks> {
        if let JobState::Running { remaining, .. } = self.state {
            Some(remaining)
        } else { None }
    }

    /// How many ticks the job has held its partition so far.
    pub fn occupied_ticks(&self) -> Ticks {
        match self.state {
            JobState::Running { remaining, .. } => self.run_time - remaining,
            JobState::Done { .. }               => self.run_time,
            JobState::Waiting | JobState::TooBig => 0,
        }
    }

    fn bad_transition(&self, to: JobStatus) -> StateError {
        StateError::BadTransition {
            job:    self.id,
            from:   self.status(),
            to,
        }
    }

    /// Waiting → Running, hosted by `partition` from tick `now` on.
    pub(crate) fn admit(&mut self, partition: PartitionId, now: Ticks) -> Result<(), StateError> {
        if !self.is_waiting() {
            return Err(self.bad_transition(JobStatus::Running));
        }
        self.state = JobState::Running {
            partition,
            started:    now,
            remaining:  self.run_time,
        };

        Ok(())
    }

    /// Waiting → TooBig.
    pub(crate) fn reject(&mut self) -> Result<(), StateError> {
        if !self.is_waiting() {
            return Err(self.bad_transition(JobStatus::TooBig));
        }
        self.state = JobState::TooBig;

        Ok(())
    }

    /// Charges one tick of waiting. No-op unless waiting.
    pub(crate) fn wait_one_tick(&mut self) {
        if self.is_waiting() {
            self.wait_time += 1;
        }
    }

    /// Burns one tick of run time. When nothing is left, the job is done
    /// as of `now` and the partition it leaves behind is returned.
    pub(crate) fn run_one_tick(&mut self, now: Ticks) -> Result<Option<PartitionId>, StateError> {
        let JobState::Running { partition, started, remaining } = self.state else {
            return Err(self.bad_transition(JobStatus::Done));
        };
        // A running job always has at least one tick left.
        debug_assert!(remaining > 0, "Running job with nothing left to run!");
        let remaining = remaining.saturating_sub(1);
        if remaining == 0 {
            self.state = JobState::Done {
                partition,
                started,
                completion: now,
            };
            Ok(Some(partition))
        } else {
            self.state = JobState::Running { partition, started, remaining };
            Ok(None)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn spec(id: JobId, size: Kilobytes, run_time: Ticks) -> JobSpec {
        JobSpec { id, size, run_time }
    }

    #[test]
    fn full_lifecycle() {
        let mut j = Job::new(&spec(1, 50, 2));
        assert!(j.is_waiting());
        j.wait_one_tick();
        assert_eq!(j.wait_time, 1);

        j.admit(3, 1).unwrap();
        assert_eq!(j.remaining(), Some(2));
        assert_eq!(j.partition(), Some(3));
        j.wait_one_tick();
        assert_eq!(j.wait_time, 1, "running jobs do not accrue waiting time");

        assert_eq!(j.run_one_tick(2).unwrap(), None);
        assert_eq!(j.occupied_ticks(), 1);
        assert_eq!(j.run_one_tick(3).unwrap(), Some(3));
        assert_eq!(j.status(), JobStatus::Done);
        assert_eq!(j.completion(), Some(3));
        assert_eq!(j.completion().unwrap() - j.started().unwrap(), j.run_time);
        assert_eq!(j.occupied_ticks(), 2);
    }

    #[test]
    fn illegal_transitions() {
        let mut j = Job::new(&spec(7, 10, 1));
        assert!(j.run_one_tick(0).is_err());
        j.reject().unwrap();
        assert_eq!(
            j.admit(0, 0),
            Err(StateError::BadTransition { job: 7, from: JobStatus::TooBig, to: JobStatus::Running })
        );
        assert!(j.reject().is_err());
        j.wait_one_tick();
        assert_eq!(j.wait_time, 0);
    }
}
