//! Range set - compressed representation of a sorted set of build numbers
//!
//! Build numbers for a job tend to be contiguous runs, so the set is kept as
//! sorted, non-overlapping, non-adjacent half-open ranges. The relational
//! store expands a range set into one row per number on save and rebuilds it
//! number by number on load.

use serde::{Deserialize, Serialize};

/// Half-open interval `[start, end)` of build numbers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Range {
    pub start: i32,
    pub end: i32,
}

impl Range {
    pub fn single(n: i32) -> Self {
        Range { start: n, end: n + 1 }
    }

    pub fn includes(&self, n: i32) -> bool {
        self.start <= n && n < self.end
    }
}

/// Sorted set of build numbers, stored as merged ranges.
///
/// Invariant: ranges are sorted by `start`, never overlap, and never touch
/// (adjacent ranges are merged on insertion).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RangeSet {
    ranges: Vec<Range>,
}

impl RangeSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a set from individual numbers, in any order
    pub fn from_numbers<I: IntoIterator<Item = i32>>(numbers: I) -> Self {
        let mut set = Self::new();
        for n in numbers {
            set.add(n);
        }
        set
    }

    /// Insert a single number. Returns false if it was already present.
    pub fn add(&mut self, n: i32) -> bool {
        // Index of the first range starting after n
        let idx = self.ranges.partition_point(|r| r.start <= n);

        if idx > 0 && self.ranges[idx - 1].includes(n) {
            return false;
        }

        let extends_prev = idx > 0 && self.ranges[idx - 1].end == n;
        let extends_next = idx < self.ranges.len() && self.ranges[idx].start == n + 1;

        match (extends_prev, extends_next) {
            (true, true) => {
                self.ranges[idx - 1].end = self.ranges[idx].end;
                self.ranges.remove(idx);
            }
            (true, false) => self.ranges[idx - 1].end = n + 1,
            (false, true) => self.ranges[idx].start = n,
            (false, false) => self.ranges.insert(idx, Range::single(n)),
        }
        true
    }

    pub fn includes(&self, n: i32) -> bool {
        let idx = self.ranges.partition_point(|r| r.start <= n);
        idx > 0 && self.ranges[idx - 1].includes(n)
    }

    pub fn is_empty(&self) -> bool {
        self.ranges.is_empty()
    }

    /// Number of individual build numbers in the set
    pub fn len(&self) -> usize {
        self.ranges.iter().map(|r| (r.end - r.start) as usize).sum()
    }

    /// Expand into individual numbers, ascending
    pub fn list_numbers(&self) -> Vec<i32> {
        self.ranges.iter().flat_map(|r| r.start..r.end).collect()
    }

    pub fn min(&self) -> Option<i32> {
        self.ranges.first().map(|r| r.start)
    }

    pub fn max(&self) -> Option<i32> {
        self.ranges.last().map(|r| r.end - 1)
    }
}

impl std::fmt::Display for RangeSet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let parts: Vec<String> = self
            .ranges
            .iter()
            .map(|r| {
                if r.end == r.start + 1 {
                    format!("{}", r.start)
                } else {
                    format!("{}-{}", r.start, r.end - 1)
                }
            })
            .collect();
        write!(f, "[{}]", parts.join(","))
    }
}
