//! Randomized invariants of the concatenation layer.
//!
//! For arbitrary sub-container lengths (zero included) these check that:
//! - every global position maps to exactly the record a manual walk finds,
//! - a contiguous range read equals the point reads it covers, in order,
//! - both index strategies agree everywhere, sentinel included.

mod common;

use common::tagged_set;
use proptest::prelude::*;
use sctrace_core::prelude::*;
use sctrace_core::{IndexMap, Location};

/// 1..6 sub-containers of 0..8 records each.
fn arb_lengths() -> impl Strategy<Value = Vec<usize>> {
    prop::collection::vec(0usize..8, 1..6)
}

/// Lengths plus an in-bounds `lo <= hi` pair.
fn arb_lengths_and_range() -> impl Strategy<Value = (Vec<usize>, usize, usize)> {
    arb_lengths().prop_flat_map(|lengths| {
        let total: usize = lengths.iter().sum();
        (Just(lengths), 0..=total, 0..=total)
            .prop_map(|(l, a, b)| (l, a.min(b), a.max(b)))
    })
}

/// Walk the lengths by hand to find where `pos` lives.
#[track_caller]
fn walk(lengths: &[usize], pos: usize) -> Location {
    let mut rest = pos;
    for (c, &len) in lengths.iter().enumerate() {
        if rest < len {
            return Location::new(c, rest);
        }
        rest -= len;
    }
    let last = lengths.len() - 1;
    assert_eq!(rest, 0, "position {pos} is past the end");
    Location::new(last, lengths[last])
}

proptest! {
    #![proptest_config(ProptestConfig {
        cases: 64,
        .. ProptestConfig::default()
    })]

    #[test]
    fn locate_agrees_with_a_manual_walk(lengths in arb_lengths()) {
        let table = IndexMap::build(&lengths, IndexStrategy::Table).unwrap();
        let offsets = IndexMap::build(&lengths, IndexStrategy::Offsets).unwrap();
        let total: usize = lengths.iter().sum();
        prop_assert_eq!(table.total(), total);

        let mut prev: Option<Location> = None;
        for p in 0..=total {
            let want = walk(&lengths, p);
            prop_assert_eq!(table.locate(p).unwrap(), want);
            prop_assert_eq!(offsets.locate(p).unwrap(), want);
            if p < total {
                prop_assert!(want.offset < lengths[want.container]);
                // Container is non-decreasing, offsets step by one or restart.
                if let Some(prev) = prev {
                    prop_assert!(want.container >= prev.container);
                    if want.container == prev.container {
                        prop_assert_eq!(want.offset, prev.offset + 1);
                    } else {
                        prop_assert_eq!(want.offset, 0);
                    }
                }
                prev = Some(want);
            }
        }
        prop_assert!(table.locate(total + 1).unwrap_err().is_out_of_bounds());
        prop_assert_eq!(table.entries().count(), total + 1);
    }

    #[test]
    fn range_reads_equal_point_reads((lengths, lo, hi) in arb_lengths_and_range()) {
        let mut subs = tagged_set(&lengths);
        let m = MultipleContainer::new(subs.iter_mut().collect()).unwrap();

        let batch = m.get_range(lo..hi).unwrap();
        prop_assert_eq!(batch.len(), hi - lo);
        for (j, got) in batch.traces().enumerate() {
            prop_assert_eq!(got, m.get(lo + j).unwrap());
        }

        // The same span requested as a contiguous list, when non-empty.
        if hi > lo {
            let listed = m.select(&Selection::from((lo..hi).collect::<Vec<_>>())).unwrap();
            prop_assert_eq!(listed, batch);
        }
    }

    #[test]
    fn point_reads_come_from_the_owning_member(lengths in arb_lengths()) {
        let mut subs = tagged_set(&lengths);
        let reference = tagged_set(&lengths);
        let m = MultipleContainer::new(subs.iter_mut().collect()).unwrap();

        for p in 0..m.len() {
            let at = walk(&lengths, p);
            prop_assert_eq!(m.get(p).unwrap(), reference[at.container].get(at.offset).unwrap());
        }
        prop_assert!(m.get(m.len()).unwrap_err().is_out_of_bounds());
    }

    #[test]
    fn offsets_strategy_reads_identically((lengths, lo, hi) in arb_lengths_and_range()) {
        let mut a = tagged_set(&lengths);
        let mut b = tagged_set(&lengths);
        let table = MultipleContainer::new(a.iter_mut().collect()).unwrap();
        let offsets = MultipleContainer::with_config(
            b.iter_mut().collect(),
            MultipleConfig { strategy: IndexStrategy::Offsets, ..MultipleConfig::default() },
        )
        .unwrap();
        prop_assert_eq!(table.get_range(lo..hi).unwrap(), offsets.get_range(lo..hi).unwrap());
    }
}
