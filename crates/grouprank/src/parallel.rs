//! Per-partition fan-out for the counting and ranking scans.

use crate::engine::RankResult;

/// Run `task` once per partition index and collect the results in partition order.
///
/// With `parallel` set and more than one partition, tasks run on the crate-local rayon pool;
/// otherwise, or when no pool could be built, they run in index order on the calling thread. The
/// first error aborts the fan-out.
pub(crate) fn for_each_partition<R, F>(
    parallel: bool,
    partitions: usize,
    task: F,
) -> RankResult<Vec<R>>
where
    R: Send,
    F: Fn(usize) -> RankResult<R> + Send + Sync,
{
    if parallel && partitions > 1 {
        if let Some(result) = pool::scan(partitions, &task) {
            return result;
        }
    }
    (0..partitions).map(task).collect()
}

#[cfg(all(feature = "parallel", not(target_arch = "wasm32")))]
mod pool {
    use crate::engine::RankResult;
    use rayon::prelude::*;
    use rayon::ThreadPool;
    use std::sync::OnceLock;

    /// Built on first use. A crate-local pool lets a failed build fall back to sequential
    /// scans, where rayon's global pool would panic.
    static SCAN_POOL: OnceLock<Option<ThreadPool>> = OnceLock::new();

    fn scan_threads() -> usize {
        std::env::var("RAYON_NUM_THREADS")
            .ok()
            .and_then(|s| s.parse::<usize>().ok())
            .filter(|&n| n > 0)
            .or_else(|| std::thread::available_parallelism().ok().map(|n| n.get()))
            .unwrap_or(1)
    }

    fn build(threads: usize) -> Option<ThreadPool> {
        let try_build = |n| {
            rayon::ThreadPoolBuilder::new()
                .num_threads(n)
                .thread_name(|i| format!("grouprank-{i}"))
                .build()
        };
        match try_build(threads) {
            Ok(pool) => Some(pool),
            Err(err) if threads > 1 => {
                log::warn!("could not build a {threads}-thread scan pool ({err}); using 1 thread");
                try_build(1).ok()
            }
            Err(err) => {
                log::warn!("could not build a scan pool ({err}); scanning partitions in order");
                None
            }
        }
    }

    /// `None` when no pool is available.
    pub(super) fn scan<R, F>(partitions: usize, task: &F) -> Option<RankResult<Vec<R>>>
    where
        R: Send,
        F: Fn(usize) -> RankResult<R> + Send + Sync,
    {
        let pool = SCAN_POOL.get_or_init(|| build(scan_threads())).as_ref()?;
        log::trace!(
            "scanning {partitions} partitions on {} threads",
            pool.current_num_threads()
        );
        Some(pool.install(|| (0..partitions).into_par_iter().map(task).collect()))
    }
}

#[cfg(not(all(feature = "parallel", not(target_arch = "wasm32"))))]
mod pool {
    use crate::engine::RankResult;

    pub(super) fn scan<R, F>(_partitions: usize, _task: &F) -> Option<RankResult<Vec<R>>>
    where
        R: Send,
        F: Fn(usize) -> RankResult<R> + Send + Sync,
    {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::RankError;
    use pretty_assertions::assert_eq;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn results_keep_partition_order() {
        for parallel in [false, true] {
            let out = for_each_partition(parallel, 64, |p| Ok(p * 10)).unwrap();
            assert_eq!(out, (0..64).map(|p| p * 10).collect::<Vec<_>>());
        }
    }

    #[test]
    fn a_failing_partition_fails_the_fan_out() {
        for parallel in [false, true] {
            let err = for_each_partition(parallel, 8, |p| {
                if p == 5 {
                    Err(RankError::Storage {
                        partition: p,
                        message: "unreadable page".to_string(),
                    })
                } else {
                    Ok(p)
                }
            })
            .unwrap_err();
            assert!(matches!(err, RankError::Storage { partition: 5, .. }), "{err}");
        }
    }

    #[test]
    fn sequential_fan_out_runs_in_index_order() {
        let next = AtomicUsize::new(0);
        let seen = for_each_partition(false, 5, |p| {
            Ok(next.fetch_add(1, Ordering::SeqCst) == p)
        })
        .unwrap();
        assert_eq!(seen, vec![true; 5]);
    }

    #[test]
    fn no_partitions_yield_no_results() {
        let out: Vec<usize> = for_each_partition(true, 0, Ok).unwrap();
        assert!(out.is_empty());
    }
}
