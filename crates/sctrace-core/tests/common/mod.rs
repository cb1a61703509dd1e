//! Shared fixtures for integration tests.

#![allow(dead_code)]

use ndarray::{Array1, Array2};
use sctrace_core::TraceBatchContainer;

/// Number of points per leakage sample in fixtures.
pub const POINTS: usize = 4;

/// Container `tag` with `len` records whose contents encode their origin:
/// leakage point `s` of record `t` is `tag * 10_000 + t * 10 + s`, and the
/// value is `[tag, t]`.
#[track_caller]
pub fn tagged(tag: u16, len: usize) -> TraceBatchContainer<i32, u16> {
    let l = Array2::from_shape_fn((len, POINTS), |(t, s)| {
        i32::from(tag) * 10_000 + (t * 10 + s) as i32
    });
    let v = Array2::from_shape_fn((len, 2), |(t, k)| if k == 0 { tag } else { t as u16 });
    TraceBatchContainer::new(l.into_dyn(), v.into_dyn()).expect("fixture arrays are aligned")
}

/// One tagged container per entry of `lengths`, tags starting at 1.
pub fn tagged_set(lengths: &[usize]) -> Vec<TraceBatchContainer<i32, u16>> {
    lengths
        .iter()
        .enumerate()
        .map(|(i, &len)| tagged(i as u16 + 1, len))
        .collect()
}

/// Container with scalar values (value shape `[]`).
pub fn scalar_values(len: usize) -> TraceBatchContainer<f32, u8> {
    let l = Array2::from_shape_fn((len, POINTS), |(t, s)| (t * POINTS + s) as f32);
    let v = Array1::from_shape_fn(len, |t| t as u8);
    TraceBatchContainer::new(l.into_dyn(), v.into_dyn()).expect("fixture arrays are aligned")
}
