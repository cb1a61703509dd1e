//! Section selectors and processing functions applied to raw samples.
//!
//! A raw per-trace sample first goes through its optional [`Section`]
//! (restricting axis 0 of the sample) and then through its optional
//! [`Processing`] closure. [`transform`] applies both in that order.

use crate::error::{Result, TraceError};
use crate::types::Element;
use ndarray::{ArrayD, ArrayViewD, Axis, Slice};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

/// Restriction of a raw sample along its first axis.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Section {
    /// Half-open span `[start, end)`.
    Range {
        /// First kept point.
        start: usize,
        /// One past the last kept point.
        end: usize,
    },
    /// Explicit points, in the given order.
    Indices(Vec<usize>),
}

impl Section {
    /// `[start, end)` span.
    #[inline]
    #[must_use]
    pub const fn range(start: usize, end: usize) -> Self {
        Self::Range { start, end }
    }

    /// Number of points kept along axis 0.
    #[must_use]
    pub fn len(&self) -> usize {
        match self {
            Self::Range { start, end } => end.saturating_sub(*start),
            Self::Indices(ix) => ix.len(),
        }
    }

    /// Whether the section keeps nothing.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Shape of a sample of raw shape `raw` once sectioned.
    ///
    /// # Errors
    /// Fails on a 0-dimensional sample or when the section reaches past
    /// `raw[0]`.
    pub fn section_shape(&self, raw: &[usize]) -> Result<Vec<usize>> {
        let Some((&extent, rest)) = raw.split_first() else {
            return Err(TraceError::Section(
                "cannot section a scalar sample".into(),
            ));
        };
        self.check_extent(extent)?;
        Ok(std::iter::once(self.len()).chain(rest.iter().copied()).collect())
    }

    /// Restrict `sample` along axis 0.
    ///
    /// # Errors
    /// Same conditions as [`Section::section_shape`].
    pub fn apply<T: Clone>(&self, sample: ArrayViewD<'_, T>) -> Result<ArrayD<T>> {
        self.section_shape(sample.shape())?;
        Ok(match self {
            Self::Range { start, end } => sample
                .slice_axis(Axis(0), Slice::from(*start..*end))
                .to_owned(),
            Self::Indices(ix) => sample.select(Axis(0), ix),
        })
    }

    fn check_extent(&self, extent: usize) -> Result<()> {
        match self {
            Self::Range { start, end } if start > end || *end > extent => Err(
                TraceError::Section(format!("{self} does not fit a sample of {extent} points")),
            ),
            Self::Indices(ix) => match ix.iter().find(|&&i| i >= extent) {
                Some(i) => Err(TraceError::Section(format!(
                    "point {i} is past a sample of {extent} points"
                ))),
                None => Ok(()),
            },
            Self::Range { .. } => Ok(()),
        }
    }
}

impl fmt::Display for Section {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Range { start, end } => write!(f, "{start}..{end}"),
            Self::Indices(ix) => {
                let parts: Vec<String> = ix.iter().map(ToString::to_string).collect();
                f.write_str(&parts.join(","))
            }
        }
    }
}

/// Parses `"lo..hi"` as a range and `"a,b,c"` (or a single `"a"`) as indices.
impl FromStr for Section {
    type Err = TraceError;

    fn from_str(s: &str) -> Result<Self> {
        let bad = |what: &str| TraceError::Section(format!("cannot parse {what:?} as a section"));
        let s = s.trim();
        if let Some((lo, hi)) = s.split_once("..") {
            let start = lo.trim().parse().map_err(|_| bad(s))?;
            let end = hi.trim().parse().map_err(|_| bad(s))?;
            return Ok(Self::range(start, end));
        }
        s.split(',')
            .map(|p| p.trim().parse::<usize>().map_err(|_| bad(s)))
            .collect::<Result<Vec<_>>>()
            .map(Self::Indices)
    }
}

type ProcessFn<T> = dyn Fn(ArrayD<T>) -> ArrayD<T> + Send + Sync;

/// Named transformation applied to sectioned samples.
///
/// Clones share the same closure; equality is identity of that closure, so
/// two containers "use the same processing" only if they hold clones of one
/// `Processing` value.
pub struct Processing<T> {
    name: Arc<str>,
    func: Arc<ProcessFn<T>>,
}

impl<T> Processing<T> {
    /// Wrap `func` under a display `name`.
    pub fn new<F>(name: &str, func: F) -> Self
    where
        F: Fn(ArrayD<T>) -> ArrayD<T> + Send + Sync + 'static,
    {
        Self {
            name: Arc::from(name),
            func: Arc::new(func),
        }
    }

    /// Display name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Run the transformation.
    #[must_use]
    pub fn apply(&self, sample: ArrayD<T>) -> ArrayD<T> {
        (self.func)(sample)
    }

    /// Whether `self` and `other` wrap the same closure.
    #[must_use]
    pub fn same_as(&self, other: &Self) -> bool {
        Arc::as_ptr(&self.func).cast::<()>() == Arc::as_ptr(&other.func).cast::<()>()
    }
}

impl<T> Clone for Processing<T> {
    fn clone(&self) -> Self {
        Self {
            name: Arc::clone(&self.name),
            func: Arc::clone(&self.func),
        }
    }
}

impl<T> PartialEq for Processing<T> {
    fn eq(&self, other: &Self) -> bool {
        self.same_as(other)
    }
}

impl<T> fmt::Debug for Processing<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Processing").field(&self.name).finish()
    }
}

/// Section, then process, one raw sample.
///
/// # Errors
/// Propagates [`Section::apply`] failures.
pub fn transform<T: Element>(
    raw: ArrayViewD<'_, T>,
    section: Option<&Section>,
    processing: Option<&Processing<T>>,
) -> Result<ArrayD<T>> {
    let sample = match section {
        Some(s) => s.apply(raw)?,
        None => raw.to_owned(),
    };
    Ok(match processing {
        Some(p) => p.apply(sample),
        None => sample,
    })
}
