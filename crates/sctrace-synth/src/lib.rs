//! Synthetic trace containers.
//!
//! Real acquisitions are large and awkward to ship with a test suite, so this
//! crate fabricates small, deterministic ones with a realistic structure:
//! random byte values and leakage that follows their Hamming weight plus
//! uniform noise.
//!
//! Callers use stable paths like `sctrace_synth::generator::generate`.

#![forbid(unsafe_code)]
#![deny(rust_2018_idioms)]
#![warn(
    missing_docs,
    clippy::all,
    clippy::pedantic,
    clippy::nursery,
    clippy::unwrap_used,
    clippy::expect_used
)]
#![cfg_attr(test, allow(clippy::unwrap_used, clippy::expect_used))]

/// Seeded generator for `TraceBatchContainer<f32, u8>`.
pub mod generator;
