use crate::helpe::*;
use rand::{rngs::StdRng, Rng, SeedableRng};

/// Partition sizes of the classic demonstration workload, in KB.
pub const DEMO_PARTITIONS: [Kilobytes; 10] = [
    9500, 7000, 4500, 8500, 3000, 9000, 1000, 5500, 1500, 500,
];

/// Jobs of the classic demonstration workload, as `(id, size, run_time)`.
pub const DEMO_JOBS: [(JobId, Kilobytes, Ticks); 25] = [
    (1, 5760, 5),  (2, 4190, 4),  (3, 3290, 8),  (4, 2030, 2),  (5, 2550, 2),
    (6, 6990, 6),  (7, 8940, 8),  (8, 740, 10),  (9, 3930, 7),  (10, 6890, 6),
    (11, 6580, 5), (12, 3820, 8), (13, 9140, 9), (14, 420, 10), (15, 220, 10),
    (16, 7540, 7), (17, 3210, 3), (18, 1380, 1), (19, 9850, 9), (20, 3610, 3),
    (21, 7540, 7), (22, 2710, 2), (23, 8390, 8), (24, 5950, 5), (25, 760, 10),
];

/// 25 jobs over 10 partitions. Job 19 exceeds every partition.
pub fn demo_config(strategy: Strategy) -> SimConfig {
    SimConfig::new(&DEMO_JOBS, &DEMO_PARTITIONS, strategy)
}

/// Knobs of [`random_config`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RandomWorkload {
    pub jobs:               usize,
    pub partitions:         usize,
    /// Upper bound of partition sizes. Job sizes may overshoot it by
    /// about 10%, so some jobs can end up too big.
    pub max_size:           Kilobytes,
    pub max_run_time:       Ticks,
}

impl Default for RandomWorkload {
    fn default() -> Self {
        Self {
            jobs:           25,
            partitions:     10,
            max_size:       10_000,
            max_run_time:   10,
        }
    }
}

/// A reproducible random workload: the same `seed` always yields the
/// same configuration. Job ids run from 1, in input order.
pub fn random_config(seed: u64, shape: RandomWorkload, strategy: Strategy) -> SimConfig {
    let mut rng = StdRng::seed_from_u64(seed);
    let max_size = shape.max_size.max(1);
    let max_job_size = max_size + max_size / 10;
    let max_run_time = shape.max_run_time.max(1);

    let partitions = (0..shape.partitions)
        .map(|_| rng.gen_range(1..=max_size))
        .collect();
    let jobs = (1..=shape.jobs as JobId)
        .map(|id| JobSpec {
            id,
            size:       rng.gen_range(1..=max_job_size),
            run_time:   rng.gen_range(1..=max_run_time),
        })
        .collect();
    debug!(seed, jobs = shape.jobs, partitions = shape.partitions, "random workload generated");

    SimConfig {
        jobs,
        partitions,
        strategy,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn demo_is_valid() {
        let config = demo_config(Strategy::BestFit);
        assert!(config.validate().is_ok());
        assert_eq!(config.jobs.len(), 25);
        assert_eq!(config.partitions.len(), 10);
        assert_eq!(config.strategy, Strategy::BestFit);
        let max = config.partitions.iter().max().copied().unwrap();
        let too_big: Vec<JobId> = config.jobs.iter()
            .filter(|j| j.size > max)
            .map(|j| j.id)
            .collect();
        assert_eq!(too_big, vec![19]);
    }

    #[test]
    fn demo_runs_to_completion() {
        for strategy in Strategy::ALL {
            let mut sim = Simulation::new(&demo_config(strategy)).unwrap();
            sim.run_to_completion().unwrap();
            let stats = sim.statistics();
            assert_eq!(stats.throughput, 24);
            assert_eq!(stats.too_big_jobs, 1);
        }
    }

    #[test]
    fn random_is_reproducible() {
        let shape = RandomWorkload::default();
        let a = random_config(7, shape, Strategy::FirstFit);
        let b = random_config(7, shape, Strategy::FirstFit);
        assert_eq!(a, b);
        assert_ne!(a, random_config(8, shape, Strategy::FirstFit));
        assert!(a.validate().is_ok());
    }

    #[test]
    fn random_respects_shape() {
        let shape = RandomWorkload {
            jobs:           40,
            partitions:     3,
            max_size:       100,
            max_run_time:   4,
        };
        let config = random_config(42, shape, Strategy::BestFit);
        assert_eq!(config.jobs.len(), 40);
        assert_eq!(config.partitions.len(), 3);
        assert!(config.partitions.iter().all(|&p| (1..=100).contains(&p)));
        assert!(config.jobs.iter().all(|j| (1..=110).contains(&j.size)));
        assert!(config.jobs.iter().all(|j| (1..=4).contains(&j.run_time)));
        assert!(config.jobs.iter().map(|j| j.id).eq(1..=40));
    }
}
