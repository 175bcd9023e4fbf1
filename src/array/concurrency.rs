//! Work partitioning for prefetching and bulk writes.
//!
//! Work items are split into contiguous, disjoint partitions, one per worker.
//! Each worker owns a state (e.g. a codec chain clone) created on the calling thread before work is distributed.

use std::{
    ops::Range,
    sync::atomic::{AtomicBool, Ordering},
};

use parking_lot::Mutex;
use rayon::iter::{IndexedParallelIterator, IntoParallelIterator, ParallelIterator};

use super::ArrayError;

/// The number of workers for `num_items` items of work given a configured maximum of `max_threads`.
///
/// Never more workers than items, and at least one.
#[must_use]
pub(crate) fn worker_count(max_threads: usize, num_items: usize) -> usize {
    max_threads.min(num_items).max(1)
}

/// Partition `num_items` into `num_workers` contiguous ranges.
///
/// Worker `i` gets `[i * n / t, (i + 1) * n / t)`, so range lengths differ by at most one.
#[must_use]
pub(crate) fn partition(num_items: usize, num_workers: usize) -> Vec<Range<usize>> {
    let num_workers = num_workers.max(1);
    (0..num_workers)
        .map(|i| (i * num_items / num_workers)..((i + 1) * num_items / num_workers))
        .collect()
}

/// Apply `op` to every item, with the items partitioned across one worker per entry of `states`.
///
/// A failing worker raises an abort flag that other workers check before each item.
///
/// # Errors
/// Returns the first error recorded by any worker.
pub(crate) fn for_each_partitioned<T, S, F>(
    items: &[T],
    states: Vec<S>,
    op: F,
) -> Result<(), ArrayError>
where
    T: Sync,
    S: Send,
    F: Fn(&mut S, &T) -> Result<(), ArrayError> + Sync,
{
    let partitions = partition(items.len(), states.len());
    let abort = AtomicBool::new(false);
    let first_error: Mutex<Option<ArrayError>> = Mutex::new(None);
    states
        .into_par_iter()
        .zip(partitions)
        .for_each(|(mut state, range)| {
            for item in &items[range] {
                if abort.load(Ordering::Acquire) {
                    return;
                }
                if let Err(err) = op(&mut state, item) {
                    abort.store(true, Ordering::Release);
                    first_error.lock().get_or_insert(err);
                    return;
                }
            }
        });
    match first_error.into_inner() {
        Some(err) => Err(err),
        None if abort.into_inner() => Err(ArrayError::Aborted),
        None => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;
    use std::sync::atomic::AtomicUsize;

    use super::*;

    #[test]
    fn worker_count_bounds() {
        assert_eq!(worker_count(8, 3), 3);
        assert_eq!(worker_count(2, 100), 2);
        assert_eq!(worker_count(4, 0), 1);
        assert_eq!(worker_count(0, 5), 1);
    }

    #[test]
    fn partition_disjoint_and_complete() {
        for num_workers in 1..=8 {
            for num_items in 1..=10 * num_workers {
                let partitions = partition(num_items, worker_count(num_workers, num_items));
                let mut seen = HashSet::new();
                for range in &partitions {
                    for item in range.clone() {
                        assert!(seen.insert(item), "item {item} assigned twice");
                    }
                }
                assert_eq!(seen, (0..num_items).collect::<HashSet<_>>());
                let lengths: Vec<usize> = partitions.iter().map(ExactSizeIterator::len).collect();
                let (min, max) = (lengths.iter().min(), lengths.iter().max());
                assert!(max.unwrap() - min.unwrap() <= 1);
                assert!(partitions.iter().all(|range| !range.is_empty()));
            }
        }
    }

    #[test]
    fn for_each_partitioned_visits_all() {
        let items: Vec<usize> = (0..37).collect();
        let sum = AtomicUsize::new(0);
        for_each_partitioned(&items, vec![(); 4], |_state, item| {
            sum.fetch_add(*item, Ordering::Relaxed);
            Ok(())
        })
        .unwrap();
        assert_eq!(sum.into_inner(), items.iter().sum::<usize>());
    }

    #[test]
    fn for_each_partitioned_first_error() {
        let items: Vec<usize> = (0..100).collect();
        let result = for_each_partitioned(&items, vec![(); 3], |_state, item| {
            if *item == 50 {
                Err(ArrayError::InvalidElementValue)
            } else {
                Ok(())
            }
        });
        assert!(matches!(result, Err(ArrayError::InvalidElementValue)));
    }
}
