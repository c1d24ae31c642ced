//! Splitting a recipient list into blind-copy batches.

use std::fmt;
use std::num::NonZeroUsize;
use std::str::FromStr;

/// Maximum number of recipients per outgoing message. Always at least 1.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct BatchSize(NonZeroUsize);

impl BatchSize {
    /// Batch size used when none is configured.
    pub const DEFAULT: Self = Self(match NonZeroUsize::new(20) {
        Some(n) => n,
        None => unreachable!(),
    });

    /// Returns `None` for a zero size.
    #[must_use]
    pub const fn new(size: usize) -> Option<Self> {
        match NonZeroUsize::new(size) {
            Some(n) => Some(Self(n)),
            None => None,
        }
    }

    #[must_use]
    pub const fn get(self) -> usize {
        self.0.get()
    }
}

impl Default for BatchSize {
    fn default() -> Self {
        Self::DEFAULT
    }
}

impl fmt::Display for BatchSize {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.0, f)
    }
}

impl FromStr for BatchSize {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let n: usize = s.parse().map_err(|e| format!("invalid batch size {s:?}: {e}"))?;
        Self::new(n).ok_or_else(|| "batch size must be at least 1".to_string())
    }
}

/// Lazy iterator over contiguous batches of a recipient list.
///
/// Cloning yields an independent iterator starting from the same position, so
/// a fresh call to [`chunk`] (or a clone taken before iterating) replays the
/// exact same batch boundaries.
#[derive(Debug, Clone)]
pub struct Batches<'a> {
    rest: &'a [String],
    size: usize,
}

/// Partition `addresses` into batches of at most `size` recipients.
///
/// A list no longer than `size` comes back as a single batch, an empty list
/// yields no batch at all, and every batch but the last has exactly `size`
/// entries.
#[must_use]
pub const fn chunk(addresses: &[String], size: BatchSize) -> Batches<'_> {
    Batches {
        rest: addresses,
        size: size.get(),
    }
}

impl<'a> Iterator for Batches<'a> {
    type Item = &'a [String];

    fn next(&mut self) -> Option<Self::Item> {
        if self.rest.is_empty() {
            return None;
        }
        let end = self.size.min(self.rest.len());
        let (batch, rest) = self.rest.split_at(end);
        self.rest = rest;
        Some(batch)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let n = self.rest.len().div_ceil(self.size);
        (n, Some(n))
    }
}

impl ExactSizeIterator for Batches<'_> {}

impl std::iter::FusedIterator for Batches<'_> {}

#[cfg(test)]
mod tests {
    use super::*;

    fn addrs(n: usize) -> Vec<String> {
        (0..n).map(|i| format!("user{i}@example.org")).collect()
    }

    #[test]
    fn zero_batch_size_is_rejected() {
        assert!(BatchSize::new(0).is_none());
        assert!("0".parse::<BatchSize>().is_err());
        assert_eq!("7".parse::<BatchSize>().unwrap().get(), 7);
    }

    #[test]
    fn concatenation_reproduces_input() {
        for len in 0..50 {
            let list = addrs(len);
            for size in 1..25 {
                let size = BatchSize::new(size).unwrap();
                let batches: Vec<_> = chunk(&list, size).collect();
                assert_eq!(batches.concat(), list);
                assert_eq!(batches.is_empty(), list.is_empty());
                if let Some((last, full)) = batches.split_last() {
                    assert!(full.iter().all(|b| b.len() == size.get()));
                    assert!((1..=size.get()).contains(&last.len()));
                }
                assert_eq!(chunk(&list, size).len(), batches.len());
            }
        }
    }

    #[test]
    fn short_list_is_a_single_batch() {
        let list = addrs(20);
        let batches: Vec<_> = chunk(&list, BatchSize::DEFAULT).collect();
        assert_eq!(batches.len(), 1);
        assert_eq!(batches[0], list.as_slice());
    }

    #[test]
    fn forty_five_in_twenties() {
        let list = addrs(45);
        let sizes: Vec<_> = chunk(&list, BatchSize::DEFAULT).map(<[String]>::len).collect();
        assert_eq!(sizes, vec![20, 20, 5]);
    }

    #[test]
    fn restarting_yields_identical_batches() {
        let list = addrs(33);
        let size = BatchSize::new(8).unwrap();
        let it = chunk(&list, size);
        let first: Vec<_> = it.clone().collect();
        let second: Vec<_> = it.collect();
        assert_eq!(first, second);
        assert_eq!(first, chunk(&list, size).collect::<Vec<_>>());
    }
}
