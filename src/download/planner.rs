//! Worker-count policy and byte-range partitioning.
//!
//! The count is size-tiered, then capped by the caller's bound and by the
//! host's core count. Ranges split `[0, size - 1]` into `workers` contiguous
//! pieces of `size / workers` bytes; the last piece absorbs the remainder.

const MIB: u64 = 1024 * 1024;

/// Hard ceiling for very large resources.
const MAX_WORKERS: usize = 16;

/// One contiguous, inclusive byte range assigned to one worker.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChunkRange {
    /// 0-based worker index; also the part file suffix.
    pub index: usize,
    /// First byte offset.
    pub start: u64,
    /// Last byte offset, inclusive.
    pub end: u64,
}

impl ChunkRange {
    /// Number of bytes covered.
    #[must_use]
    pub fn len(&self) -> u64 {
        self.end - self.start + 1
    }

    /// Always false: a range covers at least one byte.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        false
    }
}

/// Size-tiered suggestion before any caps.
fn tiered_suggestion(size: u64, requested: usize) -> usize {
    match size {
        0 => 1,
        s if s < 10 * MIB => 2,
        s if s < 50 * MIB => 4,
        s if s < 500 * MIB => 8,
        _ => requested.min(MAX_WORKERS),
    }
}

/// Ceiling imposed by small hosts.
fn core_cap(cores: usize) -> usize {
    match cores {
        0..=2 => 4,
        3..=4 => 8,
        _ => MAX_WORKERS,
    }
}

/// Chooses how many workers to run.
///
/// A `requested` bound of 0 is treated as 1. The result is at least 1 and
/// never exceeds `size` when the size is known.
#[must_use]
pub fn plan_workers(size: u64, requested: usize, cores: usize, supports_ranges: bool) -> usize {
    if !supports_ranges || size == 0 {
        return 1;
    }
    let requested = requested.max(1);
    let workers = tiered_suggestion(size, requested)
        .min(requested)
        .min(core_cap(cores))
        .max(1);
    let by_size = usize::try_from(size).unwrap_or(usize::MAX);
    workers.min(by_size)
}

/// Splits `[0, size - 1]` into `workers` contiguous ranges.
///
/// Returns an empty plan for an unknown (zero) size. `workers` is clamped to
/// `1..=size`.
#[must_use]
pub fn plan_ranges(size: u64, workers: usize) -> Vec<ChunkRange> {
    if size == 0 {
        return Vec::new();
    }
    let workers = u64::try_from(workers.max(1)).unwrap_or(u64::MAX).min(size);
    let chunk = size / workers;
    (0..workers)
        .map(|i| {
            let start = i * chunk;
            let end = if i + 1 == workers {
                size - 1
            } else {
                start + chunk - 1
            };
            ChunkRange {
                index: usize::try_from(i).unwrap_or(usize::MAX),
                start,
                end,
            }
        })
        .collect()
}

/// Core count of the host, for [`plan_workers`].
#[must_use]
pub fn host_cores() -> usize {
    num_cpus::get()
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn assert_partition(size: u64, ranges: &[ChunkRange]) {
        assert_eq!(ranges.first().unwrap().start, 0);
        assert_eq!(ranges.last().unwrap().end, size - 1);
        for (i, pair) in ranges.windows(2).enumerate() {
            assert_eq!(pair[0].end + 1, pair[1].start, "gap or overlap at {i}");
        }
        for (i, range) in ranges.iter().enumerate() {
            assert_eq!(range.index, i);
            assert!(range.start <= range.end);
        }
        assert_eq!(ranges.iter().map(ChunkRange::len).sum::<u64>(), size);
    }

    #[test]
    fn test_plan_ranges_partitions_exactly() {
        for size in [1_u64, 2, 7, 100, 1023, 4096, 10_000_019] {
            for workers in 1..=16 {
                let ranges = plan_ranges(size, workers);
                assert_partition(size, &ranges);
                assert!(ranges.len() as u64 <= size);
            }
        }
    }

    #[test]
    fn test_plan_ranges_last_absorbs_remainder() {
        let ranges = plan_ranges(10, 3);
        assert_eq!(ranges.len(), 3);
        assert_eq!((ranges[0].start, ranges[0].end), (0, 2));
        assert_eq!((ranges[1].start, ranges[1].end), (3, 5));
        assert_eq!((ranges[2].start, ranges[2].end), (6, 9));
    }

    #[test]
    fn test_plan_ranges_unknown_size_is_empty() {
        assert!(plan_ranges(0, 4).is_empty());
    }

    #[test]
    fn test_hundred_megabytes_on_eight_cores_uses_eight_workers() {
        let size = 100 * 1000 * 1000;
        let workers = plan_workers(size, 8, 8, true);
        assert_eq!(workers, 8);

        let ranges = plan_ranges(size, workers);
        let chunk = size / 8;
        for range in &ranges[..7] {
            assert_eq!(range.len(), chunk);
        }
        assert_eq!(ranges[7].end, size - 1);
        assert_eq!(ranges[7].len(), size - 7 * chunk);
    }

    #[test]
    fn test_no_range_support_means_one_worker() {
        for size in [0, 1, 5 * MIB, 800 * MIB] {
            assert_eq!(plan_workers(size, 16, 32, false), 1);
        }
    }

    #[test]
    fn test_size_tiers() {
        assert_eq!(plan_workers(0, 16, 32, true), 1);
        assert_eq!(plan_workers(MIB, 16, 32, true), 2);
        assert_eq!(plan_workers(20 * MIB, 16, 32, true), 4);
        assert_eq!(plan_workers(200 * MIB, 16, 32, true), 8);
        assert_eq!(plan_workers(600 * MIB, 16, 32, true), 16);
        assert_eq!(plan_workers(600 * MIB, 12, 32, true), 12);
    }

    #[test]
    fn test_core_cap() {
        assert_eq!(plan_workers(600 * MIB, 16, 2, true), 4);
        assert_eq!(plan_workers(600 * MIB, 16, 4, true), 8);
        assert_eq!(plan_workers(600 * MIB, 16, 1, true), 4);
    }

    #[test]
    fn test_requested_bound_wins_and_zero_is_one() {
        assert_eq!(plan_workers(200 * MIB, 3, 32, true), 3);
        assert_eq!(plan_workers(200 * MIB, 0, 32, true), 1);
    }

    #[test]
    fn test_never_more_workers_than_bytes() {
        assert_eq!(plan_workers(1, 8, 8, true), 1);
        assert_eq!(plan_workers(3, 16, 32, true), 2);
    }

    #[test]
    fn test_chunk_range_len_is_inclusive() {
        let range = ChunkRange {
            index: 1,
            start: 100,
            end: 199,
        };
        assert_eq!(range.len(), 100);
    }

    #[test]
    fn test_host_cores_is_positive() {
        assert!(host_cores() >= 1);
    }
}
