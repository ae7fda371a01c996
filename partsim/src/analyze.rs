use crate::helpe::*;

/// Summary figures of a run, plus the arithmetic behind each of them.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Statistics {
    pub strategy:           Strategy,
    /// Number of completed jobs.
    pub throughput:         usize,
    pub total_jobs:         usize,
    /// Mean waiting time of completed jobs. Too-big jobs don't count.
    pub avg_wait_time:      f64,
    /// Occupied KB-ticks over available KB-ticks, in percent.
    pub utilization:        f64,
    /// Mean leftover space per admission, in KB.
    pub avg_internal_frag:  f64,
    pub too_big_jobs:       usize,
    pub total_ticks:        Ticks,
    pub details:            StatsDetails,
}

/// Human-readable derivations of every figure in [Statistics], so
/// that a consumer can check them by hand.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StatsDetails {
    pub throughput_calc:        String,
    pub wait_time_calc:         String,
    pub utilization_calc:       String,
    pub fragmentation_calc:     String,
    pub fragmentation_details:  Vec<String>,
    pub partition_usage:        Vec<String>,
    pub too_big_details:        Vec<String>,
}

#[inline(always)]
fn mean(values: impl Iterator<Item = u64>) -> Option<f64> {
    let (sum, n) = values.fold((0u64, 0u64), |(s, n), v| (s.saturating_add(v), n + 1));
    if n == 0 { None } else { Some(sum as f64 / n as f64) }
}

/// Derives [Statistics] from whatever state `sim` is in. Nothing is
/// mutated; call it as often as needed.
pub fn compute(sim: &Simulation) -> Statistics {
    let jobs = sim.jobs();
    let partitions = sim.partitions();
    let elapsed = sim.clock();

    let done: Vec<&Job> = jobs.iter()
        .filter(|j| j.status() == JobStatus::Done)
        .collect();
    let too_big: Vec<&Job> = jobs.iter()
        .filter(|j| j.status() == JobStatus::TooBig)
        .collect();

    //---START THROUGHPUT
    let throughput = done.len();
    let mut throughput_calc = format!(
        "Throughput = {} jobs completed (out of {} total jobs)",
        throughput,
        jobs.len()
    );
    if !too_big.is_empty() {
        throughput_calc.push_str(&format!(
            "\n   Note: {} jobs were too big for any partition",
            too_big.len()
        ));
    }
    //---END THROUGHPUT

    //---START WAIT TIME
    let avg_wait_time = mean(done.iter().map(|j| j.wait_time)).unwrap_or(0.0);
    let wait_time_calc = if done.is_empty() {
        String::from("Avg Wait Time = 0 (no completed jobs)")
    } else {
        format!(
            "Avg Wait Time = {:.2} ticks (from jobs: [{}])",
            avg_wait_time,
            done.iter().map(|j| j.wait_time).join(", ")
        )
    };
    //---END WAIT TIME

    //---START UTILIZATION
    let occupied = partitions.iter()
        .fold(0, |acc: KilobyteTicks, p| acc.saturating_add(p.occupied_area));
    let available = partitions.iter()
        .fold(0, |acc: KilobyteTicks, p| acc.saturating_add(p.area(elapsed)));
    let (utilization, utilization_calc) = if available == 0 {
        (0.0, String::from("Utilization = 0 (no ticks elapsed)"))
    } else {
        let u = occupied as f64 / available as f64 * 100.0;
        (u, format!(
            "Utilization = {} KB-ticks occupied / ({} KB x {} ticks) = {:.1}%",
            occupied,
            partitions.total_size(),
            elapsed,
            u
        ))
    };
    //---END UTILIZATION

    //---START FRAGMENTATION
    let admissions = sim.admissions();
    let avg_internal_frag = mean(admissions.iter().map(|a| a.leftover())).unwrap_or(0.0);
    let fragmentation_calc = if admissions.is_empty() {
        String::from("Avg Fragmentation = 0 (no admissions)")
    } else {
        format!(
            "Avg Fragmentation = {:.2} KB (over {} admissions)",
            avg_internal_frag,
            admissions.len()
        )
    };
    let fragmentation_details = admissions.iter()
        .map(|a| format!(
            "Job {}: {} - {} = {} (Partition {}, T{:03})",
            a.job, a.partition_size, a.job_size, a.leftover(), a.partition, a.tick
        ))
        .collect();
    //---END FRAGMENTATION

    let partition_usage = partitions.iter()
        .map(|p| format!(
            "Partition {} (size={}): used {} times, occupied for {} ticks",
            p.id, p.size, p.use_count, p.busy_ticks
        ))
        .collect();
    let too_big_details = too_big.iter()
        .map(|j| format!(
            "Job {}: size {} KB (largest partition: {} KB)",
            j.id, j.size, partitions.max_size()
        ))
        .collect();

    Statistics {
        strategy:           sim.strategy(),
        throughput,
        total_jobs:         jobs.len(),
        avg_wait_time,
        utilization,
        avg_internal_frag,
        too_big_jobs:       too_big.len(),
        total_ticks:        elapsed,
        details: StatsDetails {
            throughput_calc,
            wait_time_calc,
            utilization_calc,
            fragmentation_calc,
            fragmentation_details,
            partition_usage,
            too_big_details,
        },
    }
}

impl fmt::Display for Statistics {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let rule = "=".repeat(80);
        let d = &self.details;
        writeln!(f, "{rule}")?;
        writeln!(f, "SIMULATION FINISHED - DETAILED STATISTICS")?;
        writeln!(f, "{rule}\n")?;
        writeln!(f, "Strategy: {}", self.strategy.as_str().to_uppercase())?;
        writeln!(f, "Total Simulation Time: {} ticks\n", self.total_ticks)?;

        writeln!(f, "1. THROUGHPUT CALCULATION:\n   {}\n", d.throughput_calc)?;
        writeln!(f, "2. AVERAGE WAIT TIME CALCULATION:\n   {}\n", d.wait_time_calc)?;
        writeln!(f, "3. MEMORY UTILIZATION CALCULATION:\n   {}\n", d.utilization_calc)?;
        writeln!(f, "4. INTERNAL FRAGMENTATION CALCULATION:\n   {}", d.fragmentation_calc)?;
        if !d.fragmentation_details.is_empty() {
            writeln!(f, "   Detailed breakdown:")?;
            for line in &d.fragmentation_details {
                writeln!(f, "     - {line}")?;
            }
        }
        writeln!(f)?;
        writeln!(f, "5. PARTITION USAGE ANALYSIS:")?;
        for line in &d.partition_usage {
            writeln!(f, "   - {line}")?;
        }
        if !d.too_big_details.is_empty() {
            writeln!(f, "\n6. JOBS TOO LARGE TO ALLOCATE:")?;
            for line in &d.too_big_details {
                writeln!(f, "   - {line}")?;
            }
        }
        writeln!(f)?;

        writeln!(f, "SUMMARY:")?;
        writeln!(f, "   Throughput: {} jobs", self.throughput)?;
        if self.too_big_jobs > 0 {
            writeln!(f, "   Jobs Too Big: {} jobs", self.too_big_jobs)?;
        }
        writeln!(f, "   Avg Wait Time: {:.2} ticks", self.avg_wait_time)?;
        writeln!(f, "   Memory Utilization: {:.1}%", self.utilization)?;
        writeln!(f, "   Avg Internal Fragmentation: {:.2} KB", self.avg_internal_frag)?;
        write!(f, "{rule}")
    }
}
