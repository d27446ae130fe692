//! # Sort Algorithms
//!
//! Pluggable orderings used by sparse sets, storages and groups.

use std::cmp::Ordering;

/// Comparison sort used to reorder a set.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum SortAlgorithm {
    /// The standard library's unstable pattern-defeating quicksort.
    #[default]
    Standard,
    /// Stable insertion sort. Fast for small or nearly sorted ranges.
    Insertion,
}

impl SortAlgorithm {
    /// Sorts `slice` according to `compare`.
    pub fn sort<T, F>(self, slice: &mut [T], compare: F)
    where
        F: FnMut(&T, &T) -> Ordering,
    {
        match self {
            Self::Standard => slice.sort_unstable_by(compare),
            Self::Insertion => insertion_sort(slice, compare),
        }
    }
}

/// Stable in-place insertion sort.
pub fn insertion_sort<T, F>(slice: &mut [T], mut compare: F)
where
    F: FnMut(&T, &T) -> Ordering,
{
    for i in 1..slice.len() {
        let mut j = i;
        while j > 0 && compare(&slice[j - 1], &slice[j]) == Ordering::Greater {
            slice.swap(j - 1, j);
            j -= 1;
        }
    }
}

const RADIX_BITS: u32 = 8;
const RADIX_BUCKETS: usize = 1 << RADIX_BITS;
const RADIX_PASSES: u32 = u32::BITS / RADIX_BITS;

/// Stable LSD radix sort on a 32-bit key, ascending.
///
/// Runs in O(n) with four 8-bit passes and one scratch buffer.
pub fn radix_sort<T, K>(slice: &mut [T], mut key: K)
where
    T: Copy,
    K: FnMut(&T) -> u32,
{
    if slice.len() < 2 {
        return;
    }

    let mut items: Vec<(u32, T)> = slice.iter().map(|item| (key(item), *item)).collect();
    let mut scratch = items.clone();

    for pass in 0..RADIX_PASSES {
        let shift = pass * RADIX_BITS;
        let bucket = |k: u32| ((k >> shift) as usize) & (RADIX_BUCKETS - 1);

        let mut offsets = [0usize; RADIX_BUCKETS];
        for &(k, _) in &items {
            offsets[bucket(k)] += 1;
        }
        let mut total = 0;
        for offset in &mut offsets {
            let count = *offset;
            *offset = total;
            total += count;
        }
        for &(k, item) in &items {
            let slot = &mut offsets[bucket(k)];
            scratch[*slot] = (k, item);
            *slot += 1;
        }
        std::mem::swap(&mut items, &mut scratch);
    }

    for (dst, (_, item)) in slice.iter_mut().zip(items) {
        *dst = item;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::{rngs::StdRng, Rng, SeedableRng};

    #[test]
    fn test_insertion_sort_is_stable() {
        let mut pairs = vec![(3, 'a'), (1, 'b'), (3, 'c'), (2, 'd'), (1, 'e')];
        insertion_sort(&mut pairs, |l, r| l.0.cmp(&r.0));
        assert_eq!(pairs, vec![(1, 'b'), (1, 'e'), (2, 'd'), (3, 'a'), (3, 'c')]);
    }

    #[test]
    fn test_radix_matches_std() {
        let mut rng = StdRng::seed_from_u64(7);
        let mut values: Vec<u32> = (0..2000).map(|_| rng.gen()).collect();
        let mut expected = values.clone();
        expected.sort_unstable();

        radix_sort(&mut values, |v| *v);
        assert_eq!(values, expected);
    }

    #[test]
    fn test_radix_is_stable() {
        let mut pairs = vec![(5u32, 0), (1, 1), (5, 2), (0, 3), (1, 4)];
        radix_sort(&mut pairs, |p| p.0);
        assert_eq!(pairs, vec![(0, 3), (1, 1), (1, 4), (5, 0), (5, 2)]);
    }

    #[test]
    fn test_algorithms_agree() {
        let mut a = vec![9, 4, 7, 1, 8, 2];
        let mut b = a.clone();
        SortAlgorithm::Standard.sort(&mut a, Ord::cmp);
        SortAlgorithm::Insertion.sort(&mut b, Ord::cmp);
        assert_eq!(a, b);
    }
}
