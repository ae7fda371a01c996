pub use std::{
    sync::{Arc, Mutex, MutexGuard, PoisonError},
    io::{BufRead, BufReader},
    collections::{HashSet, VecDeque},
    path::PathBuf,
    str::FromStr,
    fmt,
};
pub use thiserror::Error;
pub use itertools::Itertools;
pub use rayon::prelude::*;
pub use indexmap::IndexMap;
pub use clap::{Parser, ValueEnum};
pub use serde::{Deserialize, Serialize};
pub use tracing::{debug, info, trace, warn};

pub use crate::{Job, Partition, Simulation,
    ledger::JobLedger,
    registry::PartitionRegistry,
};

/// The unit of logical time. One [`Simulation::step`] advances the clock
/// by exactly one of these.
pub type Ticks = u64;

/// Job and partition sizes are measured in KB.
pub type Kilobytes = u64;

/// Memory held over time, i.e., `size × ticks`. This is what utilization
/// is measured in. Wide enough that no product of a valid size and a
/// tick count can overflow it.
pub type KilobyteTicks = u128;

pub type JobId = u32;

/// Partitions are numbered from zero, in input order.
pub type PartitionId = usize;

/// How many event-log lines a simulation keeps around, unless told
/// otherwise. Older lines are evicted first.
pub const DEFAULT_LOG_CAPACITY: usize = 50;

/// Largest job or partition size accepted, in KB (1 PiB).
pub const MAX_KILOBYTES: Kilobytes = 1 << 40;

/// Largest run time accepted, in ticks.
pub const MAX_RUN_TIME: Ticks = 1 << 32;

//---START LIFECYCLE
/// Where a [`Job`] is in its lifecycle, plus whatever data only
/// makes sense in that phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobState {
    Waiting,
    Running {
        partition:  PartitionId,
        started:    Ticks,
        remaining:  Ticks,
    },
    Done {
        partition:  PartitionId,
        started:    Ticks,
        completion: Ticks,
    },
    /// Bigger than every partition. Terminal.
    TooBig,
}

impl JobState {
    pub fn status(&self) -> JobStatus {
        match self {
            JobState::Waiting           => JobStatus::Waiting,
            JobState::Running { .. }    => JobStatus::Running,
            JobState::Done { .. }       => JobStatus::Done,
            JobState::TooBig            => JobStatus::TooBig,
        }
    }

    /// The partition hosting (or having hosted) the job.
    pub fn partition(&self) -> Option<PartitionId> {
        match self {
            JobState::Running { partition, .. } |
            JobState::Done { partition, .. }    => Some(*partition),
            JobState::Waiting | JobState::TooBig => None,
        }
    }

    /// The tick at which the job was admitted.
    pub fn started(&self) -> Option<Ticks> {
        match self {
            JobState::Running { started, .. } |
            JobState::Done { started, .. }      => Some(*started),
            JobState::Waiting | JobState::TooBig => None,
        }
    }

    pub fn completion(&self) -> Option<Ticks> {
        if let JobState::Done { completion, .. } = self {
            Some(*completion)
        } else { None }
    }

    /// Done and too-big jobs will never change again.
    pub fn is_settled(&self) -> bool {
        matches!(self, JobState::Done { .. } | JobState::TooBig)
    }
}

/// The bare lifecycle tag of a [`JobState`], as shown to consumers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum JobStatus {
    Waiting,
    Running,
    Done,
    #[serde(rename = "too big")]
    TooBig,
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            JobStatus::Waiting  => "waiting",
            JobStatus::Running  => "running",
            JobStatus::Done     => "done",
            JobStatus::TooBig   => "too big",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PartitionStatus {
    Free,
    Allocated(JobId),
}

impl PartitionStatus {
    pub fn occupant(&self) -> Option<JobId> {
        match self {
            PartitionStatus::Free           => None,
            PartitionStatus::Allocated(j)   => Some(*j),
        }
    }

    pub fn is_free(&self) -> bool {
        matches!(self, PartitionStatus::Free)
    }
}
//---END LIFECYCLE

/// Placement strategy, fixed for the lifetime of a [`Simulation`].
#[derive(Copy, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord, ValueEnum, Debug, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case", try_from = "String")]
pub enum Strategy {
    /// First free partition (in id order) that is big enough
    #[default]
    FirstFit,
    /// Smallest free partition that is big enough
    BestFit,
}

impl Strategy {
    pub const ALL: [Strategy; 2] = [Strategy::FirstFit, Strategy::BestFit];

    pub fn as_str(&self) -> &'static str {
        match self {
            Strategy::FirstFit  => "first-fit",
            Strategy::BestFit   => "best-fit",
        }
    }
}

impl fmt::Display for Strategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Strategy {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let squashed: String = s.trim()
            .chars()
            .filter(|c| !matches!(c, '-' | '_' | ' '))
            .collect::<String>()
            .to_ascii_lowercase();
        match squashed.as_str() {
            "firstfit"  => Ok(Strategy::FirstFit),
            "bestfit"   => Ok(Strategy::BestFit),
            _           => Err(ConfigError::UnknownStrategy(s.to_string())),
        }
    }
}

impl TryFrom<String> for Strategy {
    type Error = ConfigError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        s.parse()
    }
}

/// A job being placed into a partition. Recorded once per admission,
/// never modified afterwards.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Admission {
    pub job:            JobId,
    pub partition:      PartitionId,
    pub tick:           Ticks,
    pub job_size:       Kilobytes,
    pub partition_size: Kilobytes,
}

impl Admission {
    /// Internal fragmentation caused by this placement.
    pub fn leftover(&self) -> Kilobytes {
        self.partition_size - self.job_size
    }
}

//---START CONFIGURATION
/// One input job. On the wire it is the triple `[id, size, runTime]`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "(JobId, Kilobytes, Ticks)", into = "(JobId, Kilobytes, Ticks)")]
pub struct JobSpec {
    pub id:         JobId,
    pub size:       Kilobytes,
    pub run_time:   Ticks,
}

impl From<(JobId, Kilobytes, Ticks)> for JobSpec {
    fn from((id, size, run_time): (JobId, Kilobytes, Ticks)) -> Self {
        Self { id, size, run_time }
    }
}

impl From<JobSpec> for (JobId, Kilobytes, Ticks) {
    fn from(j: JobSpec) -> Self {
        (j.id, j.size, j.run_time)
    }
}

/// Everything needed to build a [`Simulation`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SimConfig {
    pub jobs:       Vec<JobSpec>,
    pub partitions: Vec<Kilobytes>,
    #[serde(default)]
    pub strategy:   Strategy,
}

impl SimConfig {
    pub fn new(
        jobs:       &[(JobId, Kilobytes, Ticks)],
        partitions: &[Kilobytes],
        strategy:   Strategy,
    ) -> Self {
        Self {
            jobs:       jobs.iter().map(|&j| j.into()).collect(),
            partitions: partitions.to_vec(),
            strategy,
        }
    }

    pub fn from_json(s: &str) -> Result<Self, ConfigError> {
        Ok(serde_json::from_str(s)?)
    }

    /// Checks everything that can be checked without running anything.
    /// Jobs too big for every partition are *not* rejected here: they
    /// are classified at admission time.
    pub fn validate(&self) -> Result<(), ConfigError> {
        check_jobs(&self.jobs)?;
        check_partitions(&self.partitions)
    }
}

/// The job half of [`SimConfig::validate`].
pub fn check_jobs(jobs: &[JobSpec]) -> Result<(), ConfigError> {
    if jobs.is_empty() {
        return Err(ConfigError::NoJobs);
    }
    let mut seen = HashSet::with_capacity(jobs.len());
    for j in jobs {
        if j.id == 0 {
            return Err(ConfigError::ZeroJobId);
        } else if j.size == 0 {
            return Err(ConfigError::ZeroJobSize { job: j.id });
        } else if j.size > MAX_KILOBYTES {
            return Err(ConfigError::JobSizeOverLimit { job: j.id });
        } else if j.run_time == 0 {
            return Err(ConfigError::ZeroRunTime { job: j.id });
        } else if j.run_time > MAX_RUN_TIME {
            return Err(ConfigError::RunTimeOverLimit { job: j.id });
        } else if !seen.insert(j.id) {
            return Err(ConfigError::DuplicateJob { job: j.id });
        }
    }

    Ok(())
}

/// The partition half of [`SimConfig::validate`].
pub fn check_partitions(sizes: &[Kilobytes]) -> Result<(), ConfigError> {
    if sizes.is_empty() {
        return Err(ConfigError::NoPartitions);
    }
    if let Some(partition) = sizes.iter().position(|&s| s == 0) {
        return Err(ConfigError::ZeroPartitionSize { partition });
    }
    if let Some(partition) = sizes.iter().position(|&s| s > MAX_KILOBYTES) {
        return Err(ConfigError::PartitionOverLimit { partition });
    }

    Ok(())
}
//---END CONFIGURATION

//---START ERRORS
/// Rejected input. Raised before any simulation state is built, so a
/// previously loaded simulation is left untouched.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("jobs and partitions are required (no jobs given)")]
    NoJobs,
    #[error("jobs and partitions are required (no partitions given)")]
    NoPartitions,
    #[error("partition {partition} has zero size")]
    ZeroPartitionSize { partition: PartitionId },
    #[error("partition {partition} is larger than {} KB", MAX_KILOBYTES)]
    PartitionOverLimit { partition: PartitionId },
    #[error("job ids must be positive")]
    ZeroJobId,
    #[error("job {job} has zero size")]
    ZeroJobSize { job: JobId },
    #[error("job {job} is larger than {} KB", MAX_KILOBYTES)]
    JobSizeOverLimit { job: JobId },
    #[error("job {job} has zero run time")]
    ZeroRunTime { job: JobId },
    #[error("job {job} runs longer than {} ticks", MAX_RUN_TIME)]
    RunTimeOverLimit { job: JobId },
    #[error("job id {job} appears more than once")]
    DuplicateJob { job: JobId },
    #[error("unknown strategy `{0}` (expected first-fit or best-fit)")]
    UnknownStrategy(String),
    #[error("malformed input: {0}")]
    Malformed(String),
    #[error("malformed JSON: {0}")]
    Json(#[from] serde_json::Error),
    #[error("could not read input: {0}")]
    Io(#[from] std::io::Error),
}

/// An operation was attempted in a state that does not allow it.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StateError {
    #[error("simulation not initialized")]
    NotInitialized,
    #[error("no partition with id {0}")]
    UnknownPartition(PartitionId),
    #[error("partition {partition} already hosts job {occupant}")]
    PartitionBusy { partition: PartitionId, occupant: JobId },
    #[error("partition {0} is not allocated")]
    PartitionNotAllocated(PartitionId),
    #[error("no job with id {0}")]
    UnknownJob(JobId),
    #[error("job {job} cannot go from {from} to {to}")]
    BadTransition { job: JobId, from: JobStatus, to: JobStatus },
    #[error("simulation lock poisoned by an earlier panic")]
    Poisoned,
    #[error("simulation still unsettled after {steps} steps")]
    Stalled { steps: u64 },
}

#[derive(Error, Debug)]
pub enum SimError {
    #[error(transparent)]
    Validation(#[from] ConfigError),
    #[error(transparent)]
    State(#[from] StateError),
}
//---END ERRORS

//---START EXTERNAL INTERFACES
// Readers for the input formats understood by the `partsim` binary.
// To support another format, implement `JobGen` for it.

/// Defines the interface for reading jobs from some source.
pub trait JobGen<T> {
    fn new(path: PathBuf) -> Self;
    fn read_jobs(&self) -> Result<Vec<JobSpec>, ConfigError>;
    /// Turns one record of the source into a [`JobSpec`].
    fn gen_single(&self, d: T) -> JobSpec;
}

/// A CSV job list: a header line, then one `id,size,run_time` per line.
/// Partitions and strategy come from elsewhere.
pub struct CsvJobParser {
    pub path: PathBuf,
}

impl JobGen<&[u64; 3]> for CsvJobParser {
    fn new(path: PathBuf) -> Self {
        Self {
            path,
        }
    }

    fn read_jobs(&self) -> Result<Vec<JobSpec>, ConfigError> {
        let fd = std::fs::File::open(self.path.as_path())?;
        let reader = BufReader::new(fd);
        let mut res = vec![];
        let mut data_buf: [u64; 3] = [0; 3];
        // First line is the header!
        for (line_no, line) in reader.lines().enumerate().skip(1) {
            let line = line?;
            if line.trim().is_empty() { continue; }
            let fields: Vec<&str> = line.split(',').map(str::trim).collect();
            if fields.len() < 3 {
                return Err(ConfigError::Malformed(
                    format!("line {}: expected id,size,run_time", line_no + 1)
                ));
            }
            for (idx, field) in fields.iter().take(3).enumerate() {
                data_buf[idx] = field.parse().map_err(|_| ConfigError::Malformed(
                    format!("line {}: `{}` is not a non-negative integer", line_no + 1, field)
                ))?;
            }
            if data_buf[0] > JobId::MAX as u64 {
                return Err(ConfigError::Malformed(
                    format!("line {}: job id {} out of range", line_no + 1, data_buf[0])
                ));
            }
            res.push(self.gen_single(&data_buf));
        }

        Ok(res)
    }

    fn gen_single(&self, d: &[u64; 3]) -> JobSpec {
        JobSpec {
            id:         d[0] as JobId,
            size:       d[1],
            run_time:   d[2],
        }
    }
}

/// A complete [`SimConfig`] in its JSON wire form.
pub struct JsonConfigParser {
    pub path: PathBuf,
}

impl JsonConfigParser {
    pub fn new(path: PathBuf) -> Self {
        Self {
            path,
        }
    }

    pub fn read_config(&self) -> Result<SimConfig, ConfigError> {
        let fd = std::fs::File::open(self.path.as_path())?;
        Ok(serde_json::from_reader(BufReader::new(fd))?)
    }
}

#[derive(Copy, Clone, PartialEq, Eq, PartialOrd, Ord, ValueEnum, Debug)]
pub enum InputType {
    /// A JSON object with `jobs`, `partitions` and (optionally) `strategy`
    Json,
    /// A CSV job list (`id,size,run_time` with a header line)
    Csv,
}

/// Reads a configuration from `file_path`. Non-empty `partitions` and a
/// given `strategy` override whatever the file says; a CSV file carries
/// jobs only, so it needs them.
pub fn read_from_path(
    format:     InputType,
    file_path:  PathBuf,
    partitions: &[Kilobytes],
    strategy:   Option<Strategy>,
) -> Result<SimConfig, ConfigError> {
    let mut config = match format {
        InputType::Json => JsonConfigParser::new(file_path).read_config()?,
        InputType::Csv  => SimConfig {
            jobs:       CsvJobParser::new(file_path).read_jobs()?,
            partitions: vec![],
            strategy:   Strategy::default(),
        },
    };
    if !partitions.is_empty() {
        config.partitions = partitions.to_vec();
    }
    if let Some(s) = strategy {
        config.strategy = s;
    }
    config.validate()?;

    Ok(config)
}
//---END EXTERNAL INTERFACES

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strategy_names() {
        assert_eq!("first-fit".parse::<Strategy>().unwrap(), Strategy::FirstFit);
        assert_eq!("Best_Fit".parse::<Strategy>().unwrap(), Strategy::BestFit);
        assert_eq!("bestfit".parse::<Strategy>().unwrap(), Strategy::BestFit);
        assert!(matches!(
            "worst-fit".parse::<Strategy>(),
            Err(ConfigError::UnknownStrategy(s)) if s == "worst-fit"
        ));
        assert_eq!(Strategy::BestFit.to_string(), "best-fit");
    }

    #[test]
    fn config_wire_form() {
        let config = SimConfig::from_json(
            r#"{"jobs": [[1, 50, 2], [2, 10, 1]], "partitions": [100, 20], "strategy": "best-fit"}"#
        ).unwrap();
        assert_eq!(config, SimConfig::new(&[(1, 50, 2), (2, 10, 1)], &[100, 20], Strategy::BestFit));

        let back = serde_json::to_value(&config).unwrap();
        assert_eq!(back["jobs"][0], serde_json::json!([1, 50, 2]));
        assert_eq!(back["strategy"], "best-fit");
    }

    #[test]
    fn strategy_defaults_to_first_fit() {
        let config = SimConfig::from_json(r#"{"jobs": [[1, 5, 1]], "partitions": [10]}"#).unwrap();
        assert_eq!(config.strategy, Strategy::FirstFit);
    }

    #[test]
    fn unknown_strategy_is_rejected() {
        let res = SimConfig::from_json(r#"{"jobs": [[1, 5, 1]], "partitions": [10], "strategy": "next-fit"}"#);
        assert!(matches!(res, Err(ConfigError::Json(_))));
    }

    #[test]
    fn negative_sizes_are_rejected() {
        let res = SimConfig::from_json(r#"{"jobs": [[1, -5, 1]], "partitions": [10]}"#);
        assert!(res.is_err());
    }

    #[test]
    fn validation() {
        let ok = SimConfig::new(&[(1, 5, 1)], &[10], Strategy::FirstFit);
        assert!(ok.validate().is_ok());

        let cases = [
            (SimConfig::new(&[], &[10], Strategy::FirstFit), "no jobs"),
            (SimConfig::new(&[(1, 5, 1)], &[], Strategy::FirstFit), "no partitions"),
            (SimConfig::new(&[(1, 5, 1)], &[10, 0], Strategy::FirstFit), "zero partition"),
            (SimConfig::new(&[(0, 5, 1)], &[10], Strategy::FirstFit), "zero id"),
            (SimConfig::new(&[(1, 0, 1)], &[10], Strategy::FirstFit), "zero size"),
            (SimConfig::new(&[(1, 5, 0)], &[10], Strategy::FirstFit), "zero run time"),
            (SimConfig::new(&[(1, 5, 1), (1, 6, 2)], &[10], Strategy::FirstFit), "duplicate"),
        ];
        for (config, what) in cases {
            assert!(config.validate().is_err(), "{what} should be rejected");
        }
        assert!(matches!(
            SimConfig::new(&[(1, 5, 1)], &[10, 0], Strategy::FirstFit).validate(),
            Err(ConfigError::ZeroPartitionSize { partition: 1 })
        ));
    }

    #[test]
    fn sizes_are_capped() {
        let ok = SimConfig::new(&[(1, MAX_KILOBYTES, MAX_RUN_TIME)], &[MAX_KILOBYTES], Strategy::FirstFit);
        assert!(ok.validate().is_ok());
        assert!(matches!(
            SimConfig::new(&[(1, 1, 2)], &[10, u64::MAX / 2], Strategy::FirstFit).validate(),
            Err(ConfigError::PartitionOverLimit { partition: 1 })
        ));
        assert!(matches!(
            SimConfig::new(&[(3, MAX_KILOBYTES + 1, 1)], &[10], Strategy::FirstFit).validate(),
            Err(ConfigError::JobSizeOverLimit { job: 3 })
        ));
        assert!(matches!(
            SimConfig::new(&[(2, 1, u64::MAX)], &[10], Strategy::FirstFit).validate(),
            Err(ConfigError::RunTimeOverLimit { job: 2 })
        ));
    }

    #[test]
    fn too_big_reads_the_same_everywhere() {
        assert_eq!(serde_json::to_value(JobStatus::TooBig).unwrap(), "too big");
        assert_eq!(serde_json::to_value(JobStatus::Waiting).unwrap(), "waiting");
        assert_eq!(serde_json::from_str::<JobStatus>(r#""too big""#).unwrap(), JobStatus::TooBig);
        for status in [JobStatus::Waiting, JobStatus::Running, JobStatus::Done, JobStatus::TooBig] {
            assert_eq!(serde_json::to_value(status).unwrap(), status.to_string());
        }
    }

    #[test]
    fn job_state_accessors() {
        let running = JobState::Running { partition: 2, started: 4, remaining: 1 };
        assert_eq!(running.status(), JobStatus::Running);
        assert_eq!(running.partition(), Some(2));
        assert_eq!(running.started(), Some(4));
        assert_eq!(running.completion(), None);
        assert!(!running.is_settled());
        assert!(JobState::TooBig.is_settled());
        assert_eq!(JobStatus::TooBig.to_string(), "too big");
    }

    #[test]
    fn json_config_file() {
        let path = std::env::temp_dir().join(format!("partsim-json-{}.json", std::process::id()));
        std::fs::write(&path, r#"{"jobs": [[1, 50, 2]], "partitions": [100], "strategy": "best-fit"}"#).unwrap();
        let as_is = read_from_path(InputType::Json, path.clone(), &[], None).unwrap();
        let overridden = read_from_path(InputType::Json, path.clone(), &[60, 70], Some(Strategy::FirstFit)).unwrap();
        std::fs::remove_file(&path).unwrap();
        assert_eq!(as_is, SimConfig::new(&[(1, 50, 2)], &[100], Strategy::BestFit));
        assert_eq!(overridden, SimConfig::new(&[(1, 50, 2)], &[60, 70], Strategy::FirstFit));
    }

    #[test]
    fn csv_jobs() {
        let path = std::env::temp_dir().join(format!("partsim-csv-{}.csv", std::process::id()));
        std::fs::write(&path, "id,size,run_time\n1, 50, 2\n\n2,10,1\n").unwrap();
        let config = read_from_path(InputType::Csv, path.clone(), &[100], Some(Strategy::BestFit)).unwrap();
        std::fs::remove_file(&path).unwrap();
        assert_eq!(config, SimConfig::new(&[(1, 50, 2), (2, 10, 1)], &[100], Strategy::BestFit));
    }

    #[test]
    fn csv_needs_partitions() {
        let path = std::env::temp_dir().join(format!("partsim-csv-nop-{}.csv", std::process::id()));
        std::fs::write(&path, "id,size,run_time\n1,50,2\n").unwrap();
        let res = read_from_path(InputType::Csv, path.clone(), &[], None);
        std::fs::remove_file(&path).unwrap();
        assert!(matches!(res, Err(ConfigError::NoPartitions)));
    }

    #[test]
    fn csv_garbage() {
        let path = std::env::temp_dir().join(format!("partsim-csv-bad-{}.csv", std::process::id()));
        std::fs::write(&path, "id,size,run_time\n1,fifty,2\n").unwrap();
        let res = CsvJobParser::new(path.clone()).read_jobs();
        std::fs::remove_file(&path).unwrap();
        assert!(matches!(res, Err(ConfigError::Malformed(_))));
    }
}
