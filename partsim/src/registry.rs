use crate::helpe::*;

/// The fixed set of memory partitions. Built once; partitions are never
/// created, destroyed, resized, or merged afterwards.
#[derive(Debug, Clone)]
pub struct PartitionRegistry {
    partitions: Vec<Partition>,
    // Cached, since the too-big check runs on every admission attempt.
    max_size:   Kilobytes,
}

impl Partition {
    pub fn new(id: PartitionId, size: Kilobytes) -> Self {
        Self {
            id,
            size,
            status:         PartitionStatus::Free,
            use_count:      0,
            busy_ticks:     0,
            occupied_area:  0,
        }
    }

    #[inline(always)]
    pub fn is_free(&self) -> bool {
        self.status.is_free()
    }

    #[inline(always)]
    pub fn fits(&self, job_size: Kilobytes) -> bool {
        self.size >= job_size
    }

    pub fn occupant(&self) -> Option<JobId> {
        self.status.occupant()
    }

    /// Total capacity offered over `ticks` ticks.
    pub fn area(&self, ticks: Ticks) -> KilobyteTicks {
        KilobyteTicks::from(self.size) * KilobyteTicks::from(ticks)
    }
}

impl PartitionRegistry {
    /// Partition `i` gets size `sizes[i]`.
    pub fn new(sizes: &[Kilobytes]) -> Result<Self, ConfigError> {
        check_partitions(sizes)?;
        let partitions: Vec<Partition> = sizes.iter()
            .enumerate()
            .map(|(id, &size)| Partition::new(id, size))
            .collect();
        let max_size = sizes.iter().copied().max().unwrap_or(0);

        Ok(Self {
            partitions,
            max_size,
        })
    }

    pub fn len(&self) -> usize {
        self.partitions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.partitions.is_empty()
    }

    pub fn get(&self, id: PartitionId) -> Option<&Partition> {
        self.partitions.get(id)
    }

    fn get_mut(&mut self, id: PartitionId) -> Result<&mut Partition, StateError> {
        self.partitions.get_mut(id).ok_or(StateError::UnknownPartition(id))
    }

    /// All partitions, in id order.
    pub fn iter(&self) -> impl Iterator<Item = &Partition> {
        self.partitions.iter()
    }

    /// Free partitions, in id order.
    pub fn free_partitions(&self) -> impl Iterator<Item = &Partition> {
        self.iter().filter(|p| p.is_free())
    }

    pub fn max_size(&self) -> Kilobytes {
        self.max_size
    }

    /// Sum of all partition sizes.
    pub fn total_size(&self) -> Kilobytes {
        self.iter().fold(0, |acc: Kilobytes, p| acc.saturating_add(p.size))
    }

    /// `true` if some partition, occupied or not, could ever host a job
    /// of `job_size`.
    #[inline(always)]
    pub fn could_ever_fit(&self, job_size: Kilobytes) -> bool {
        job_size <= self.max_size
    }

    /// Hands partition `id` to job `job`.
    pub fn occupy(&mut self, id: PartitionId, job: JobId) -> Result<(), StateError> {
        let p = self.get_mut(id)?;
        if let PartitionStatus::Allocated(occupant) = p.status {
            return Err(StateError::PartitionBusy { partition: id, occupant });
        }
        p.status = PartitionStatus::Allocated(job);
        p.use_count += 1;

        Ok(())
    }

    /// Frees partition `id`. Returns the job that was evicted.
    /// `use_count` is left as is.
    pub fn release(&mut self, id: PartitionId) -> Result<JobId, StateError> {
        let p = self.get_mut(id)?;
        match p.status {
            PartitionStatus::Allocated(occupant)    => {
                p.status = PartitionStatus::Free;
                Ok(occupant)
            },
            PartitionStatus::Free                   => Err(StateError::PartitionNotAllocated(id)),
        }
    }

    /// Books one tick of occupancy by a job of `job_size` KB.
    pub fn record_busy_tick(&mut self, id: PartitionId, job_size: Kilobytes) -> Result<(), StateError> {
        let p = self.get_mut(id)?;
        if p.is_free() {
            return Err(StateError::PartitionNotAllocated(id));
        }
        p.busy_ticks += 1;
        p.occupied_area += KilobyteTicks::from(job_size);

        Ok(())
    }
}
