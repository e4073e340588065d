//! Growable scratch arena with checkpoints.
//!
//! Every allocation is appended to one backing `Vec`. Callers take a
//! [`Marker`] before a scoped computation and [`Arena::revert`] to it
//! afterwards; nothing is ever freed individually. The bake pipeline uses this
//! to bound peak memory while rasterizing glyphs and decoding sprites one at a
//! time.

use std::ops::Range;

/// A saved arena length. Reverting to it drops everything allocated after it
/// was taken.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct Marker(usize);

#[derive(Debug)]
pub struct Arena<T> {
    items: Vec<T>,
}

impl<T> Default for Arena<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> Arena<T> {
    pub fn new() -> Self {
        Self { items: Vec::new() }
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            items: Vec::with_capacity(capacity),
        }
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Elements the arena can hold before it has to grow again.
    pub fn capacity(&self) -> usize {
        self.items.capacity()
    }

    /// Pushes one value and returns its index.
    pub fn push(&mut self, value: T) -> usize {
        self.items.push(value);
        self.items.len() - 1
    }

    /// Appends every value from `iter` and returns the range they occupy.
    pub fn extend<I: IntoIterator<Item = T>>(&mut self, iter: I) -> Range<usize> {
        let start = self.items.len();
        self.items.extend(iter);
        start..self.items.len()
    }

    pub fn mark(&self) -> Marker {
        Marker(self.items.len())
    }

    /// Drops every allocation made after `marker`. Reverting to a marker
    /// that lies beyond the current length is a no-op.
    pub fn revert(&mut self, marker: Marker) {
        self.items.truncate(marker.0);
    }

    /// Drops everything; keeps the capacity for the next scope.
    pub fn clear(&mut self) {
        self.items.clear();
    }

    pub fn get(&self, range: Range<usize>) -> &[T] {
        &self.items[range]
    }

    pub fn get_mut(&mut self, range: Range<usize>) -> &mut [T] {
        &mut self.items[range]
    }

    pub fn as_slice(&self) -> &[T] {
        &self.items
    }

    pub fn as_mut_slice(&mut self) -> &mut [T] {
        &mut self.items
    }

    /// Runs `f` and reverts everything it allocated, returning its result.
    pub fn scope<R>(&mut self, f: impl FnOnce(&mut Self) -> R) -> R {
        let marker = self.mark();
        let result = f(self);
        self.revert(marker);
        result
    }
}

impl<T: Clone> Arena<T> {
    /// Allocates `count` copies of `fill` and returns their range.
    pub fn alloc(&mut self, count: usize, fill: T) -> Range<usize> {
        let start = self.items.len();
        self.items.resize(start + count, fill);
        start..self.items.len()
    }
}
