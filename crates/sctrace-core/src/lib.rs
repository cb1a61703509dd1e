//! sctrace-core — trace containers and their zero-copy concatenation.
//!
//! A *trace container* is an ordered collection of (leakage, value) records
//! from side-channel measurements. This crate defines:
//! - the array model (`Trace`, `Batch`, `ArraySpec`, `DType`),
//! - the [`TraceContainer`] contract and the request shapes it accepts
//!   ([`Selection`]),
//! - per-field sections and processing closures,
//! - an in-memory container ([`TraceBatchContainer`]),
//! - the global-to-local [`IndexMap`], and
//! - [`MultipleContainer`], which presents several containers as one.
//!
//! ```
//! use ndarray::Array2;
//! use sctrace_core::prelude::*;
//!
//! let mk = |n: usize| {
//!     TraceBatchContainer::new(
//!         Array2::<f32>::zeros((n, 8)).into_dyn(),
//!         Array2::<u8>::zeros((n, 16)).into_dyn(),
//!     )
//! };
//! let (mut a, mut b) = (mk(3)?, mk(4)?);
//! let all = MultipleContainer::new(vec![&mut a, &mut b])?;
//! assert_eq!(all.len(), 7);
//! let batch = all.select(&Selection::from(2..5))?;
//! assert_eq!(batch.leakages().shape(), &[3, 8]);
//! # Ok::<(), sctrace_core::TraceError>(())
//! ```

#![forbid(unsafe_code)]
#![deny(rust_2018_idioms)]
#![deny(missing_docs)]
#![warn(
    clippy::all,
    clippy::pedantic,
    clippy::nursery,
    clippy::unwrap_used,
    clippy::expect_used
)]
// Small, explicit allowlist to keep docs readable and APIs ergonomic.
#![allow(
    clippy::missing_panics_doc,
    clippy::module_name_repetitions,
    clippy::doc_markdown
)]
#![cfg_attr(test, allow(clippy::unwrap_used, clippy::expect_used))]

/// Fixed-size batch iteration.
pub mod batches;
/// The container trait and request shapes.
pub mod container;
/// Crate-local error type.
pub mod error;
/// Global-to-local index translation.
pub mod index;
/// In-memory container.
pub mod memory;
/// Concatenation of containers.
pub mod multiple;
/// Section selectors and processing closures.
pub mod section;
/// Array model: dtypes, specs, traces, batches.
pub mod types;

// ---- Re-exports for workspace compatibility ----
pub use batches::*;
pub use container::*;
pub use error::*;
pub use index::*;
pub use memory::*;
pub use multiple::*;
pub use section::*;
pub use types::*;

/// Commonly-used items for quick imports.
///
/// ```rust
/// use sctrace_core::prelude::*;
/// ```
pub mod prelude {
    pub use crate::{
        batches::batches,
        container::{Selection, TraceContainer},
        error::TraceError,
        index::IndexStrategy,
        memory::TraceBatchContainer,
        multiple::{MultipleConfig, MultipleContainer, Settings, ShapePolicy},
        section::{Processing, Section},
        types::{ArraySpec, Batch, DType, Element, Trace},
    };
}
