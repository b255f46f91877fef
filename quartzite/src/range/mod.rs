//! Ranges over an index key prefix.
//!
//! A [`Range`] bounds a tuple of key columns. Bounds are compared lexicographically, and every
//! range of one access path has bounds of the same width, so a sorted range sequence can be
//! merged with plain tuple comparison. Shorter bounds are padded with [`Datum::MinValue`] or
//! [`Datum::MaxValue`] depending on inclusiveness before merging, see [`Range::pad_to`].
//!
//! The NULL key sorts before every non-null value, which is how index storage orders it:
//! `IS NULL` is the point range `[NULL, NULL]` and `a < 5` is `(NULL, 5)`.

mod builder;
pub use builder::*;
mod coerce;
pub use coerce::*;
mod like;
pub use like::*;

use std::cmp::Ordering;
use std::fmt::{Display, Formatter};

use datafusion_common::ScalarValue;
use itertools::Itertools;
use smallvec::{smallvec, SmallVec};

/// One key value of a range bound.
#[derive(Clone, Debug, Hash, Eq, PartialEq)]
pub enum Datum {
    MinValue,
    Null,
    Value(ScalarValue),
    MaxValue,
}

impl Datum {
    fn rank(&self) -> u8 {
        match self {
            Datum::MinValue => 0,
            Datum::Null => 1,
            Datum::Value(_) => 2,
            Datum::MaxValue => 3,
        }
    }
}

impl Ord for Datum {
    fn cmp(&self, other: &Self) -> Ordering {
        match (self, other) {
            (Datum::Value(a), Datum::Value(b)) => {
                // Values of one key column are coerced to one type before they get here.
                a.partial_cmp(b).unwrap_or(Ordering::Equal)
            }
            _ => self.rank().cmp(&other.rank()),
        }
    }
}

impl PartialOrd for Datum {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Display for Datum {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Datum::MinValue => write!(f, "-inf"),
            Datum::Null => write!(f, "NULL"),
            Datum::Value(ScalarValue::Utf8(Some(s))) => write!(f, "{:?}", s),
            Datum::Value(v) => write!(f, "{}", v),
            Datum::MaxValue => write!(f, "+inf"),
        }
    }
}

/// Bounded interval over one key column.
#[derive(Clone, Debug, Hash, Eq, PartialEq)]
pub struct Interval {
    pub low: Datum,
    pub low_inclusive: bool,
    pub high: Datum,
    pub high_inclusive: bool,
}

impl Interval {
    pub fn full() -> Self {
        Self {
            low: Datum::MinValue,
            low_inclusive: true,
            high: Datum::MaxValue,
            high_inclusive: true,
        }
    }

    pub fn point(d: Datum) -> Self {
        Self {
            low: d.clone(),
            low_inclusive: true,
            high: d,
            high_inclusive: true,
        }
    }

    /// Every non-null value.
    pub fn not_null() -> Self {
        Self {
            low: Datum::Null,
            low_inclusive: false,
            high: Datum::MaxValue,
            high_inclusive: true,
        }
    }

    pub fn new(low: Datum, low_inclusive: bool, high: Datum, high_inclusive: bool) -> Self {
        Self {
            low,
            low_inclusive,
            high,
            high_inclusive,
        }
    }

    pub fn is_point(&self) -> bool {
        self.low_inclusive && self.high_inclusive && self.low == self.high
    }

    pub fn is_full(&self) -> bool {
        self.low == Datum::MinValue && self.high == Datum::MaxValue
    }

    pub fn is_empty(&self) -> bool {
        match self.low.cmp(&self.high) {
            Ordering::Greater => true,
            Ordering::Equal => !(self.low_inclusive && self.high_inclusive),
            Ordering::Less => false,
        }
    }

    fn intersect(&self, other: &Interval) -> Option<Interval> {
        let (low, low_inclusive) = match self.low.cmp(&other.low) {
            Ordering::Greater => (self.low.clone(), self.low_inclusive),
            Ordering::Less => (other.low.clone(), other.low_inclusive),
            Ordering::Equal => (self.low.clone(), self.low_inclusive && other.low_inclusive),
        };
        let (high, high_inclusive) = match self.high.cmp(&other.high) {
            Ordering::Less => (self.high.clone(), self.high_inclusive),
            Ordering::Greater => (other.high.clone(), other.high_inclusive),
            Ordering::Equal => (
                self.high.clone(),
                self.high_inclusive && other.high_inclusive,
            ),
        };
        let ret = Interval::new(low, low_inclusive, high, high_inclusive);
        (!ret.is_empty()).then_some(ret)
    }
}

/// Sorts and merges intervals of one column, dropping empty ones.
pub fn union_intervals(intervals: Vec<Interval>) -> Vec<Interval> {
    let ranges = intervals
        .into_iter()
        .filter(|i| !i.is_empty())
        .map(Range::from)
        .collect();
    normalize_ranges(ranges)
        .into_iter()
        .map(|r| Interval {
            low: r.low[0].clone(),
            low_inclusive: r.low_inclusive,
            high: r.high[0].clone(),
            high_inclusive: r.high_inclusive,
        })
        .collect()
}

/// Intersection of two normalized interval sets.
pub fn intersect_intervals(left: &[Interval], right: &[Interval]) -> Vec<Interval> {
    let pieces = left
        .iter()
        .cartesian_product(right.iter())
        .filter_map(|(l, r)| l.intersect(r))
        .collect();
    union_intervals(pieces)
}

pub type KeyTuple = SmallVec<[Datum; 4]>;

/// A range over a key column prefix.
#[derive(Clone, Debug, Hash, Eq, PartialEq)]
pub struct Range {
    pub low: KeyTuple,
    pub low_inclusive: bool,
    pub high: KeyTuple,
    pub high_inclusive: bool,
}

impl From<Interval> for Range {
    fn from(i: Interval) -> Self {
        Self {
            low: smallvec![i.low],
            low_inclusive: i.low_inclusive,
            high: smallvec![i.high],
            high_inclusive: i.high_inclusive,
        }
    }
}

impl Range {
    pub fn full() -> Self {
        Range::from(Interval::full())
    }

    /// Width of bounds.
    pub fn width(&self) -> usize {
        self.low.len()
    }

    pub fn is_full(&self) -> bool {
        self.low.iter().all(|d| *d == Datum::MinValue)
            && self.high.iter().all(|d| *d == Datum::MaxValue)
    }

    /// Whether the range matches exactly one key prefix.
    pub fn is_point(&self) -> bool {
        self.low_inclusive && self.high_inclusive && self.low == self.high
    }

    /// Number of leading columns where low and high bound agree on a value.
    pub fn point_prefix_len(&self) -> usize {
        self.low
            .iter()
            .zip(self.high.iter())
            .take_while(|(l, h)| l == h && matches!(l, Datum::Value(_) | Datum::Null))
            .count()
    }

    pub fn is_empty(&self) -> bool {
        match self.low.cmp(&self.high) {
            Ordering::Greater => true,
            Ordering::Equal => !(self.low_inclusive && self.high_inclusive),
            Ordering::Less => false,
        }
    }

    /// Pads bounds to `width` columns without changing the set of matched keys.
    pub fn pad_to(&mut self, width: usize) {
        let low_pad = if self.low_inclusive {
            Datum::MinValue
        } else {
            Datum::MaxValue
        };
        let high_pad = if self.high_inclusive {
            Datum::MaxValue
        } else {
            Datum::MinValue
        };
        while self.low.len() < width {
            self.low.push(low_pad.clone());
        }
        while self.high.len() < width {
            self.high.push(high_pad.clone());
        }
    }

    /// Whether `key` (a full width tuple) lies within this range.
    pub fn contains(&self, key: &[Datum]) -> bool {
        let above_low = match key.cmp(self.low.as_slice()) {
            Ordering::Greater => true,
            Ordering::Equal => self.low_inclusive,
            Ordering::Less => false,
        };
        let below_high = match key.cmp(self.high.as_slice()) {
            Ordering::Less => true,
            Ordering::Equal => self.high_inclusive,
            Ordering::Greater => false,
        };
        above_low && below_high
    }
}

impl Display for Range {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}{},{}{}",
            if self.low_inclusive { "[" } else { "(" },
            self.low.iter().join(" "),
            self.high.iter().join(" "),
            if self.high_inclusive { "]" } else { ")" },
        )
    }
}

fn cmp_low(a: &Range, b: &Range) -> Ordering {
    a.low
        .cmp(&b.low)
        // An inclusive low bound starts before an exclusive one on same key.
        .then_with(|| b.low_inclusive.cmp(&a.low_inclusive))
}

/// Sorts ranges ascending and merges overlapping or touching ones.
///
/// Empty ranges are dropped and all ranges are padded to one width. The result is ascending and
/// pairwise disjoint, and normalizing it again yields the same sequence.
pub fn normalize_ranges(mut ranges: Vec<Range>) -> Vec<Range> {
    let width = ranges.iter().map(|r| r.width()).max().unwrap_or(0);
    ranges.iter_mut().for_each(|r| r.pad_to(width));
    ranges.retain(|r| !r.is_empty());
    ranges.sort_by(cmp_low);

    let mut result: Vec<Range> = Vec::with_capacity(ranges.len());
    for range in ranges {
        if let Some(last) = result.last_mut() {
            let overlaps = match range.low.cmp(&last.high) {
                Ordering::Less => true,
                Ordering::Equal => range.low_inclusive || last.high_inclusive,
                Ordering::Greater => false,
            };
            if overlaps {
                match range.high.cmp(&last.high) {
                    Ordering::Greater => {
                        last.high = range.high;
                        last.high_inclusive = range.high_inclusive;
                    }
                    Ordering::Equal => {
                        last.high_inclusive |= range.high_inclusive;
                    }
                    Ordering::Less => {}
                }
                continue;
            }
        }
        result.push(range);
    }
    result
}

/// Union of two normalized range sequences.
pub fn union_ranges(left: Vec<Range>, right: Vec<Range>) -> Vec<Range> {
    normalize_ranges(left.into_iter().chain(right).collect())
}

#[cfg(test)]
pub(crate) fn int(v: i64) -> Datum {
    Datum::Value(ScalarValue::Int64(Some(v)))
}
