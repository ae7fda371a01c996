use crate::helpe::*;

/// Picks a partition for a job of `job_size` KB among `free` partitions,
/// according to `strategy`.
///
/// Only the partitions handed in are considered: a job that would fit
/// some currently *occupied* partition still gets `None`, and will be
/// retried next step.
pub fn select<'a>(
    strategy:   Strategy,
    free:       impl IntoIterator<Item = &'a Partition>,
    job_size:   Kilobytes,
) -> Option<PartitionId> {
    match strategy {
        Strategy::FirstFit  => first_fit(free, job_size),
        Strategy::BestFit   => best_fit(free, job_size),
    }
}

/// The first partition, in iteration order, that is big enough.
#[inline(always)]
pub fn first_fit<'a>(
    free:       impl IntoIterator<Item = &'a Partition>,
    job_size:   Kilobytes,
) -> Option<PartitionId> {
    free.into_iter()
        .find(|p| p.fits(job_size))
        .map(|p| p.id)
}

/// The smallest partition that is big enough, i.e., the one leaving
/// the least internal fragmentation. Ties go to the lowest id.
#[inline(always)]
pub fn best_fit<'a>(
    free:       impl IntoIterator<Item = &'a Partition>,
    job_size:   Kilobytes,
) -> Option<PartitionId> {
    free.into_iter()
        .filter(|p| p.fits(job_size))
        .min_by_key(|p| (p.size, p.id))
        .map(|p| p.id)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parts(sizes: &[Kilobytes]) -> Vec<Partition> {
        sizes.iter()
            .enumerate()
            .map(|(id, &s)| Partition::new(id, s))
            .collect()
    }

    #[test]
    fn strategies_diverge() {
        let p = parts(&[30, 10]);
        assert_eq!(select(Strategy::FirstFit, &p, 10), Some(0));
        assert_eq!(select(Strategy::BestFit, &p, 10), Some(1));
    }

    #[test]
    fn best_fit_ties_go_to_lowest_id() {
        let p = parts(&[50, 20, 40, 20]);
        assert_eq!(best_fit(&p, 15), Some(1));
        assert_eq!(best_fit(&p, 21), Some(2));
    }

    #[test]
    fn first_fit_skips_small_ones() {
        let p = parts(&[5, 8, 100, 9]);
        assert_eq!(first_fit(&p, 9), Some(2));
        assert_eq!(first_fit(&p, 8), Some(1));
    }

    #[test]
    fn exact_fit_counts() {
        let p = parts(&[10]);
        assert_eq!(first_fit(&p, 10), Some(0));
        assert_eq!(best_fit(&p, 10), Some(0));
    }

    #[test]
    fn nothing_fits() {
        let p = parts(&[5, 8]);
        assert_eq!(select(Strategy::FirstFit, &p, 9), None);
        assert_eq!(select(Strategy::BestFit, &p, 9), None);
        assert_eq!(select(Strategy::BestFit, &Vec::<Partition>::new(), 1), None);
    }

    #[test]
    fn only_free_partitions_are_candidates() {
        let mut p = parts(&[100, 60]);
        p[0].status = PartitionStatus::Allocated(1);
        let free: Vec<&Partition> = p.iter().filter(|x| x.is_free()).collect();
        assert_eq!(select(Strategy::FirstFit, free.iter().copied(), 50), Some(1));
        assert_eq!(select(Strategy::FirstFit, free.iter().copied(), 70), None);
    }
}
