//! Global-to-local index translation for concatenated containers.
//!
//! An [`IndexMap`] is built once from the ordered sub-container lengths
//! `L_0..L_{n-1}` and answers `locate(p)` for every global position `p` in
//! `[0, total]`:
//!
//! - `p < total` maps to `(c, o)` with `o < L_c`;
//! - `p == total` maps to the sentinel `(n-1, L_{n-1})`, the exclusive upper
//!   bound of the last sub-container.
//!
//! ## Invariants
//! - `container` is non-decreasing in `p`.
//! - Within one container, `offset` grows by exactly 1 per step and restarts
//!   at 0 when `container` advances.
//! - Zero-length containers own no position (except, if last, the sentinel).
//!
//! Two lookup strategies produce identical answers:
//! [`IndexStrategy::Table`] stores all `total + 1` locations (O(1) lookup),
//! [`IndexStrategy::Offsets`] stores `n + 1` cumulative starts and binary
//! searches them (O(log n) lookup, O(n) memory).

use crate::error::{Result, TraceError};
use serde::{Deserialize, Serialize};
use std::ops::Range;

/// Where a global position lives.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Location {
    /// Sub-container index in concatenation order.
    pub container: usize,
    /// Offset inside that sub-container.
    pub offset: usize,
}

impl Location {
    /// Construct a location.
    #[inline]
    #[must_use]
    pub const fn new(container: usize, offset: usize) -> Self {
        Self { container, offset }
    }
}

/// A contiguous piece of a global range that lives in one sub-container.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub struct SubRange {
    /// Sub-container index.
    pub container: usize,
    /// Inclusive local start.
    pub lo: usize,
    /// Exclusive local end.
    pub hi: usize,
}

impl SubRange {
    /// Number of records covered.
    #[inline]
    #[must_use]
    pub const fn len(&self) -> usize {
        self.hi - self.lo
    }

    /// Whether the piece is empty.
    #[inline]
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.hi == self.lo
    }

    /// Local range, ready for `get_range`.
    #[inline]
    #[must_use]
    pub const fn local(&self) -> Range<usize> {
        self.lo..self.hi
    }
}

/// How an [`IndexMap`] answers lookups.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum IndexStrategy {
    /// Precomputed table of `total + 1` locations.
    #[default]
    Table,
    /// Cumulative starts plus binary search.
    Offsets,
}

#[derive(Clone, Debug)]
enum Lookup {
    Table(Vec<Location>),
    Offsets(Vec<usize>),
}

/// Immutable translation from global positions to [`Location`]s.
#[derive(Clone, Debug)]
pub struct IndexMap {
    lengths: Vec<usize>,
    total: usize,
    lookup: Lookup,
}

impl IndexMap {
    /// Build the map for sub-containers of the given lengths.
    ///
    /// # Errors
    /// [`TraceError::EmptyContainerList`] when `lengths` is empty;
    /// [`TraceError::Inconsistent`] when the total overflows `usize`.
    pub fn build(lengths: &[usize], strategy: IndexStrategy) -> Result<Self> {
        let (&last_len, _) = lengths
            .split_last()
            .ok_or(TraceError::EmptyContainerList)?;
        let total = lengths
            .iter()
            .try_fold(0usize, |acc, &l| acc.checked_add(l))
            .ok_or_else(|| TraceError::Inconsistent("total trace count overflows".into()))?;
        let sentinel = Location::new(lengths.len() - 1, last_len);

        let lookup = match strategy {
            IndexStrategy::Table => {
                let mut table = Vec::with_capacity(total.saturating_add(1));
                for (container, &len) in lengths.iter().enumerate() {
                    table.extend((0..len).map(|offset| Location::new(container, offset)));
                }
                table.push(sentinel);
                Lookup::Table(table)
            }
            IndexStrategy::Offsets => {
                let mut starts = Vec::with_capacity(lengths.len() + 1);
                let mut current = 0usize;
                starts.push(current);
                for &len in lengths {
                    current += len;
                    starts.push(current);
                }
                Lookup::Offsets(starts)
            }
        };

        Ok(Self {
            lengths: lengths.to_vec(),
            total,
            lookup,
        })
    }

    /// Sum of all sub-container lengths.
    #[inline]
    #[must_use]
    pub const fn total(&self) -> usize {
        self.total
    }

    /// Sub-container lengths, in order.
    #[inline]
    #[must_use]
    pub fn lengths(&self) -> &[usize] {
        &self.lengths
    }

    /// Lookup strategy in use.
    #[must_use]
    pub const fn strategy(&self) -> IndexStrategy {
        match self.lookup {
            Lookup::Table(_) => IndexStrategy::Table,
            Lookup::Offsets(_) => IndexStrategy::Offsets,
        }
    }

    /// The entry for `total`: one past the end of the last sub-container.
    #[must_use]
    pub fn sentinel(&self) -> Location {
        let last = self.lengths.len() - 1;
        Location::new(last, self.lengths[last])
    }

    /// Translate a global position in `[0, total]`.
    ///
    /// # Errors
    /// [`TraceError::OutOfBounds`] when `pos > total`.
    pub fn locate(&self, pos: usize) -> Result<Location> {
        if pos > self.total {
            return Err(TraceError::OutOfBounds {
                index: pos,
                len: self.total,
            });
        }
        if pos == self.total {
            return Ok(self.sentinel());
        }
        Ok(match &self.lookup {
            Lookup::Table(table) => table[pos],
            Lookup::Offsets(starts) => {
                // starts[0] == 0 <= pos < total == starts[n], so c is in [0, n).
                let c = starts.partition_point(|&s| s <= pos) - 1;
                Location::new(c, pos - starts[c])
            }
        })
    }

    /// Every entry, `total + 1` of them, sentinel last.
    pub fn entries(&self) -> impl Iterator<Item = Location> + '_ {
        self.lengths
            .iter()
            .enumerate()
            .flat_map(|(c, &len)| (0..len).map(move |o| Location::new(c, o)))
            .chain(std::iter::once(self.sentinel()))
    }

    /// Split global `range` into per-container pieces, in container order.
    ///
    /// Zero-length containers strictly inside the range are skipped. An empty
    /// range yields no pieces.
    ///
    /// # Errors
    /// [`TraceError::OutOfBounds`] when `range.end > total`;
    /// [`TraceError::ArgumentKind`] when `range.start > range.end`.
    pub fn decompose(&self, range: Range<usize>) -> Result<Vec<SubRange>> {
        crate::container::check_range(&range, self.total)?;
        if range.is_empty() {
            return Ok(Vec::new());
        }
        let begin = self.locate(range.start)?;
        let last = self.locate(range.end - 1)?;
        let end = last.offset + 1;

        if begin.container == last.container {
            return Ok(vec![SubRange {
                container: begin.container,
                lo: begin.offset,
                hi: end,
            }]);
        }

        let mut pieces = Vec::with_capacity(last.container - begin.container + 1);
        pieces.push(SubRange {
            container: begin.container,
            lo: begin.offset,
            hi: self.lengths[begin.container],
        });
        for c in begin.container + 1..last.container {
            if self.lengths[c] > 0 {
                pieces.push(SubRange {
                    container: c,
                    lo: 0,
                    hi: self.lengths[c],
                });
            }
        }
        pieces.push(SubRange {
            container: last.container,
            lo: 0,
            hi: end,
        });
        Ok(pieces)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const STRATEGIES: [IndexStrategy; 2] = [IndexStrategy::Table, IndexStrategy::Offsets];

    #[test]
    fn rejects_empty_length_list() {
        for s in STRATEGIES {
            assert!(matches!(
                IndexMap::build(&[], s),
                Err(TraceError::EmptyContainerList)
            ));
        }
    }

    #[test]
    fn table_layout_matches_manual_enumeration() {
        let m = IndexMap::build(&[3, 4], IndexStrategy::Table).unwrap();
        let got: Vec<(usize, usize)> = m.entries().map(|l| (l.container, l.offset)).collect();
        assert_eq!(
            got,
            vec![(0, 0), (0, 1), (0, 2), (1, 0), (1, 1), (1, 2), (1, 3), (1, 4)]
        );
        assert_eq!(m.total(), 7);
        assert_eq!(m.locate(7).unwrap(), Location::new(1, 4));
        assert!(m.locate(8).unwrap_err().is_out_of_bounds());
    }

    #[test]
    fn strategies_agree_including_empty_members() {
        let lengths = [0, 2, 0, 0, 3, 1, 0];
        let table = IndexMap::build(&lengths, IndexStrategy::Table).unwrap();
        let offsets = IndexMap::build(&lengths, IndexStrategy::Offsets).unwrap();
        assert_eq!(table.strategy(), IndexStrategy::Table);
        assert_eq!(offsets.strategy(), IndexStrategy::Offsets);
        for p in 0..=table.total() {
            assert_eq!(table.locate(p).unwrap(), offsets.locate(p).unwrap(), "pos {p}");
        }
        assert_eq!(table.sentinel(), Location::new(6, 0));
        assert_eq!(table.locate(0).unwrap(), Location::new(1, 0));
        assert_eq!(table.locate(2).unwrap(), Location::new(4, 0));
    }

    #[test]
    fn decompose_within_one_container() {
        let m = IndexMap::build(&[3, 4], IndexStrategy::Table).unwrap();
        assert_eq!(
            m.decompose(4..6).unwrap(),
            vec![SubRange { container: 1, lo: 1, hi: 3 }]
        );
    }

    #[test]
    fn decompose_across_one_boundary() {
        let m = IndexMap::build(&[3, 4], IndexStrategy::Offsets).unwrap();
        assert_eq!(
            m.decompose(2..5).unwrap(),
            vec![
                SubRange { container: 0, lo: 2, hi: 3 },
                SubRange { container: 1, lo: 0, hi: 2 },
            ]
        );
    }

    #[test]
    fn decompose_spans_middle_containers_and_skips_empty_ones() {
        let m = IndexMap::build(&[2, 3, 0, 2, 4], IndexStrategy::Table).unwrap();
        let pieces = m.decompose(1..10).unwrap();
        assert_eq!(
            pieces,
            vec![
                SubRange { container: 0, lo: 1, hi: 2 },
                SubRange { container: 1, lo: 0, hi: 3 },
                SubRange { container: 3, lo: 0, hi: 2 },
                SubRange { container: 4, lo: 0, hi: 3 },
            ]
        );
        assert_eq!(pieces.iter().map(SubRange::len).sum::<usize>(), 9);
    }

    #[test]
    fn decompose_ending_exactly_on_a_boundary() {
        let m = IndexMap::build(&[3, 4], IndexStrategy::Table).unwrap();
        assert_eq!(
            m.decompose(0..3).unwrap(),
            vec![SubRange { container: 0, lo: 0, hi: 3 }]
        );
        assert_eq!(
            m.decompose(0..7).unwrap().last().copied(),
            Some(SubRange { container: 1, lo: 0, hi: 4 })
        );
    }

    #[test]
    fn decompose_errors_and_empty_ranges() {
        let m = IndexMap::build(&[3, 4], IndexStrategy::Table).unwrap();
        assert!(m.decompose(5..5).unwrap().is_empty());
        assert!(m.decompose(7..7).unwrap().is_empty());
        assert!(m.decompose(6..8).unwrap_err().is_out_of_bounds());
    }
}
