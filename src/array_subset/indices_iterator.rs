use std::iter::FusedIterator;

use crate::array::ArrayIndices;

use super::ArraySubset;

/// Iterates over element indices in an array subset in C order.
///
/// Created by [`ArraySubset::indices`].
#[derive(Clone, Debug)]
pub struct IndicesIterator {
    subset: ArraySubset,
    next: Option<ArrayIndices>,
    remaining: usize,
}

impl IndicesIterator {
    pub(super) fn new(subset: ArraySubset) -> Self {
        let remaining = subset.num_elements_usize();
        let next = (remaining > 0).then(|| subset.start().to_vec());
        Self {
            subset,
            next,
            remaining,
        }
    }
}

impl Iterator for IndicesIterator {
    type Item = ArrayIndices;

    fn next(&mut self) -> Option<Self::Item> {
        let current = self.next.take()?;
        self.remaining -= 1;

        let mut next = current.clone();
        let mut carry = true;
        for dim in (0..next.len()).rev() {
            next[dim] += 1;
            if next[dim] < self.subset.start()[dim] + self.subset.shape()[dim] {
                carry = false;
                break;
            }
            next[dim] = self.subset.start()[dim];
        }
        if !carry {
            self.next = Some(next);
        }
        Some(current)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (self.remaining, Some(self.remaining))
    }
}

impl ExactSizeIterator for IndicesIterator {}

impl FusedIterator for IndicesIterator {}
