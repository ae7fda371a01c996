use crate::{
    helpe::*,
    analyze::Statistics,
};

/// A read-only copy of a [Simulation], as handed to whoever draws it.
/// Nothing in here points back into the live simulation.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Snapshot {
    pub clock:          Ticks,
    pub is_done:        bool,
    pub strategy:       Strategy,
    pub jobs:           Vec<JobRecord>,
    pub partitions:     Vec<PartitionRecord>,
    pub recent_logs:    Vec<String>,
    /// Present only once the simulation is done.
    pub statistics:     Option<Statistics>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct JobRecord {
    pub id:         JobId,
    pub size:       Kilobytes,
    pub run_time:   Ticks,
    pub status:     JobStatus,
    pub wait_time:  Ticks,
    pub partition:  Option<PartitionId>,
    pub started:    Option<Ticks>,
    pub completion: Option<Ticks>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum PartitionRecordStatus {
    Free,
    Allocated,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PartitionRecord {
    pub id:         PartitionId,
    pub size:       Kilobytes,
    pub status:     PartitionRecordStatus,
    pub occupant:   Option<JobId>,
    pub use_count:  u32,
}

impl From<&Job> for JobRecord {
    fn from(j: &Job) -> Self {
        Self {
            id:         j.id,
            size:       j.size,
            run_time:   j.run_time,
            status:     j.status(),
            wait_time:  j.wait_time,
            partition:  j.partition(),
            started:    j.started(),
            completion: j.completion(),
        }
    }
}

impl From<&Partition> for PartitionRecord {
    fn from(p: &Partition) -> Self {
        Self {
            id:         p.id,
            size:       p.size,
            status:     if p.is_free() {
                PartitionRecordStatus::Free
            } else { PartitionRecordStatus::Allocated },
            occupant:   p.occupant(),
            use_count:  p.use_count,
        }
    }
}

impl Snapshot {
    pub fn capture(sim: &Simulation) -> Self {
        let is_done = sim.is_done();
        Self {
            clock:          sim.clock(),
            is_done,
            strategy:       sim.strategy(),
            jobs:           sim.jobs().iter().map(JobRecord::from).collect(),
            partitions:     sim.partitions().iter().map(PartitionRecord::from).collect(),
            recent_logs:    sim.recent_logs(),
            statistics:     if is_done { Some(sim.statistics()) } else { None },
        }
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }

    /// The job table, memory table and recent log, as plain text.
    pub fn render(&self) -> String {
        let header = format!("--- Time: {} | Strategy: {} ---", self.clock, self.strategy);
        let mut out = format!("{header}\n\nJob Table:\nID  Size  RunTime  Status     Wait  Completion\n");
        for j in &self.jobs {
            let completion = j.completion.map_or_else(|| String::from("--"), |c| c.to_string());
            out.push_str(&format!(
                "{:02}  {:04}  {:03}      {:<9}  {:03}   {}\n",
                j.id, j.size, j.run_time, j.status.to_string(), j.wait_time, completion
            ));
        }
        out.push_str("\nMemory Table:\nPID  Size  Status     Job  UseCount\n");
        for p in &self.partitions {
            let (status, job) = match p.occupant {
                Some(j) => ("busy", j.to_string()),
                None    => ("free", String::from("--")),
            };
            out.push_str(&format!(
                "{:02}   {:04}  {:<9}  {:>3}  {}\n",
                p.id, p.size, status, job, p.use_count
            ));
        }
        out.push_str("\nRecent Log:\n");
        if self.recent_logs.is_empty() {
            out.push_str("No events yet...\n");
        } else {
            for line in &self.recent_logs {
                out.push_str(line);
                out.push('\n');
            }
        }

        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wire_shape() {
        let mut sim = Simulation::new(&SimConfig::new(&[(1, 50, 2), (2, 70, 1)], &[100], Strategy::FirstFit)).unwrap();
        sim.step().unwrap();
        let v = serde_json::to_value(Snapshot::capture(&sim)).unwrap();
        assert_eq!(v["clock"], 1);
        assert_eq!(v["isDone"], false);
        assert_eq!(v["strategy"], "first-fit");
        assert_eq!(v["jobs"][0]["status"], "running");
        assert_eq!(v["jobs"][0]["runTime"], 2);
        assert_eq!(v["jobs"][0]["completion"], serde_json::Value::Null);
        assert_eq!(v["jobs"][1]["status"], "waiting");
        assert_eq!(v["jobs"][1]["waitTime"], 1);
        assert_eq!(v["partitions"][0]["status"], "allocated");
        assert_eq!(v["partitions"][0]["occupant"], 1);
        assert_eq!(v["partitions"][0]["useCount"], 1);
        assert!(v["statistics"].is_null());
        assert!(v["recentLogs"].as_array().unwrap().len() >= 2);
    }

    #[test]
    fn statistics_appear_once_done() {
        let mut sim = Simulation::new(&SimConfig::new(&[(1, 100, 1)], &[50], Strategy::FirstFit)).unwrap();
        sim.step().unwrap();
        let snap = Snapshot::capture(&sim);
        assert!(snap.is_done);
        assert_eq!(snap.jobs[0].status, JobStatus::TooBig);
        let stats = snap.statistics.unwrap();
        assert_eq!(stats.too_big_jobs, 1);
        assert_eq!(stats.throughput, 0);
    }

    #[test]
    fn render_tables() {
        let mut sim = Simulation::new(&SimConfig::new(&[(1, 50, 1)], &[100, 20], Strategy::BestFit)).unwrap();
        sim.step().unwrap();
        let text = Snapshot::capture(&sim).render();
        assert!(text.starts_with("--- Time: 1 | Strategy: best-fit ---"));
        assert!(text.contains("01  0050  001      running    000   --"));
        assert!(text.contains("00   0100  busy         1  1"));
        assert!(text.contains("01   0020  free        --  0"));
        assert!(text.contains("[T000] Job 1 (size=50) allocated to Partition 0 (size=100) via best-fit"));
    }
}
