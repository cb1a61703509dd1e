//! The trace-container contract and the request shapes it accepts.
//!
//! [`TraceContainer`] is the seam between single-source containers (such as
//! [`crate::memory::TraceBatchContainer`]) and the concatenation layer
//! ([`crate::multiple::MultipleContainer`]). Both implement it, so a
//! concatenation can stand in for (or be nested inside) a plain container.
//!
//! ## Contracts implementors should uphold
//! - `get(i)` fails with [`TraceError::OutOfBounds`] for `i >= len()`; it
//!   never clamps.
//! - `get_range(lo..hi)` returns exactly `hi - lo` records, record `j` equal
//!   to `get(lo + j)`.
//! - Derived specs reflect the currently configured section and processing.

use crate::error::{Result, TraceError};
use crate::section::{Processing, Section};
use crate::types::{ArraySpec, Batch, Element, Trace};
use std::ops::{Range, RangeFrom, RangeFull, RangeInclusive, RangeTo};

/// Shorthand for the batch type of a container.
pub type BatchOf<C> = Batch<<C as TraceContainer>::Leakage, <C as TraceContainer>::Value>;

/// Ordered, finite, indexable collection of (leakage, value) records.
pub trait TraceContainer {
    /// Leakage element type.
    type Leakage: Element;
    /// Value element type.
    type Value: Element;

    /// Number of records.
    fn len(&self) -> usize;

    /// Whether the container holds no records.
    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Record at `index`.
    ///
    /// # Errors
    /// [`TraceError::OutOfBounds`] when `index >= len()`.
    fn get(&self, index: usize) -> Result<Trace<Self::Leakage, Self::Value>>;

    /// Records `range.start..range.end`, stacked.
    ///
    /// # Errors
    /// [`TraceError::OutOfBounds`] when `range.end > len()`;
    /// [`TraceError::ArgumentKind`] when `range.start > range.end`.
    fn get_range(&self, range: Range<usize>) -> Result<Batch<Self::Leakage, Self::Value>>;

    /// Resolve `selection` against `len()` and fetch it as a batch.
    ///
    /// # Errors
    /// Whatever [`Selection::resolve`] or the underlying access raises.
    fn select(&self, selection: &Selection) -> Result<Batch<Self::Leakage, Self::Value>> {
        match selection.resolve(self.len())? {
            Resolved::Single(index) => self.get(index).map(Batch::from_trace),
            Resolved::Span(range) => self.get_range(range),
        }
    }

    /// Per-trace leakage geometry under the current configuration.
    fn leakage_spec(&self) -> ArraySpec;

    /// Per-trace value geometry under the current configuration.
    fn value_spec(&self) -> ArraySpec;

    /// Current leakage section.
    fn leakage_section(&self) -> Option<&Section>;

    /// Replace the leakage section.
    ///
    /// # Errors
    /// Fails if the section does not fit the raw leakage samples.
    fn set_leakage_section(&mut self, section: Option<Section>) -> Result<()>;

    /// Current leakage processing.
    fn leakage_processing(&self) -> Option<&Processing<Self::Leakage>>;

    /// Replace the leakage processing.
    ///
    /// # Errors
    /// Implementation-specific; the in-memory container never fails here.
    fn set_leakage_processing(
        &mut self,
        processing: Option<Processing<Self::Leakage>>,
    ) -> Result<()>;

    /// Current value section.
    fn value_section(&self) -> Option<&Section>;

    /// Replace the value section.
    ///
    /// # Errors
    /// Fails if the section does not fit the raw value samples.
    fn set_value_section(&mut self, section: Option<Section>) -> Result<()>;

    /// Current value processing.
    fn value_processing(&self) -> Option<&Processing<Self::Value>>;

    /// Replace the value processing.
    ///
    /// # Errors
    /// Implementation-specific; the in-memory container never fails here.
    fn set_value_processing(&mut self, processing: Option<Processing<Self::Value>>)
        -> Result<()>;
}

/// A request against a container.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Selection {
    /// One record.
    Index(usize),
    /// Half-open span; `None` bounds default to `0` and `len()`, a `None`
    /// step means 1. Any other step is rejected.
    Range {
        /// Inclusive start.
        start: Option<usize>,
        /// Exclusive stop.
        stop: Option<usize>,
        /// Stride; only 1 is accepted.
        step: Option<usize>,
    },
    /// Explicit positions; must be non-empty and increase by exactly 1.
    Indices(Vec<usize>),
}

/// Outcome of [`Selection::resolve`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Resolved {
    /// A single record.
    Single(usize),
    /// A contiguous half-open span within bounds.
    Span(Range<usize>),
}

impl Selection {
    /// The whole container.
    #[must_use]
    pub const fn all() -> Self {
        Self::Range {
            start: None,
            stop: None,
            step: None,
        }
    }

    /// `start..stop` with an explicit stride.
    #[must_use]
    pub const fn stepped(start: usize, stop: usize, step: usize) -> Self {
        Self::Range {
            start: Some(start),
            stop: Some(stop),
            step: Some(step),
        }
    }

    /// Validate the request shape and bounds against a container of `len`
    /// records.
    ///
    /// Shape checks (stride, gaps, emptiness) run before bounds checks.
    ///
    /// # Errors
    /// - [`TraceError::NonContiguous`] for a step other than 1 or a gapped list;
    /// - [`TraceError::ArgumentKind`] for an empty list or a start past its stop;
    /// - [`TraceError::OutOfBounds`] for an index or endpoint past `len`.
    pub fn resolve(&self, len: usize) -> Result<Resolved> {
        match self {
            Self::Index(index) => {
                if *index >= len {
                    return Err(TraceError::OutOfBounds { index: *index, len });
                }
                Ok(Resolved::Single(*index))
            }
            Self::Range { start, stop, step } => {
                if let Some(step) = step.filter(|&s| s != 1) {
                    return Err(TraceError::NonContiguous(format!(
                        "range step is {step}, only 1 is supported"
                    )));
                }
                let begin = start.unwrap_or(0);
                let end = stop.unwrap_or(len);
                span(begin, end, len)
            }
            Self::Indices(positions) => {
                let (Some(&first), Some(&last)) = (positions.first(), positions.last()) else {
                    return Err(TraceError::ArgumentKind("empty index list".into()));
                };
                if let Some(w) = positions
                    .windows(2)
                    .find(|w| w[0].checked_add(1) != Some(w[1]))
                {
                    return Err(TraceError::NonContiguous(format!(
                        "index {} follows index {}",
                        w[1], w[0]
                    )));
                }
                if last >= len {
                    return Err(TraceError::OutOfBounds { index: last, len });
                }
                Ok(Resolved::Span(first..last + 1))
            }
        }
    }
}

fn span(begin: usize, end: usize, len: usize) -> Result<Resolved> {
    if end > len {
        return Err(TraceError::OutOfBounds { index: end, len });
    }
    if begin > len {
        return Err(TraceError::OutOfBounds { index: begin, len });
    }
    if begin > end {
        return Err(TraceError::ArgumentKind(format!(
            "range start {begin} is past its stop {end}"
        )));
    }
    Ok(Resolved::Span(begin..end))
}

/// Check `range` against a container of `len` records.
///
/// # Errors
/// Same as the span branch of [`Selection::resolve`].
pub fn check_range(range: &Range<usize>, len: usize) -> Result<()> {
    span(range.start, range.end, len).map(|_| ())
}

impl From<usize> for Selection {
    fn from(index: usize) -> Self {
        Self::Index(index)
    }
}

impl From<Range<usize>> for Selection {
    fn from(r: Range<usize>) -> Self {
        Self::Range {
            start: Some(r.start),
            stop: Some(r.end),
            step: None,
        }
    }
}

impl From<RangeInclusive<usize>> for Selection {
    fn from(r: RangeInclusive<usize>) -> Self {
        let (start, end) = r.into_inner();
        Self::Range {
            start: Some(start),
            stop: Some(end.saturating_add(1)),
            step: None,
        }
    }
}

impl From<RangeFrom<usize>> for Selection {
    fn from(r: RangeFrom<usize>) -> Self {
        Self::Range {
            start: Some(r.start),
            stop: None,
            step: None,
        }
    }
}

impl From<RangeTo<usize>> for Selection {
    fn from(r: RangeTo<usize>) -> Self {
        Self::Range {
            start: None,
            stop: Some(r.end),
            step: None,
        }
    }
}

impl From<RangeFull> for Selection {
    fn from(_: RangeFull) -> Self {
        Self::all()
    }
}

impl From<Vec<usize>> for Selection {
    fn from(v: Vec<usize>) -> Self {
        Self::Indices(v)
    }
}

impl From<&[usize]> for Selection {
    fn from(v: &[usize]) -> Self {
        Self::Indices(v.to_vec())
    }
}
