//! Array model shared across the workspace.
//!
//! A trace container hands out [`Trace`]s (one record) and [`Batch`]es
//! (several aligned records). Both carry a leakage array and a value array;
//! a batch stacks records along a leading axis of length `len()`.
//!
//! Per-trace geometry is described by [`ArraySpec`]: the trailing shape plus
//! the element [`DType`], which every [`Element`] type reports statically.

use crate::error::{Result, TraceError};
use ndarray::{ArrayD, Axis, IxDyn};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Element type of a leakage or value array.
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum DType {
    /// `u8`
    U8,
    /// `i8`
    I8,
    /// `u16`
    U16,
    /// `i16`
    I16,
    /// `u32`
    U32,
    /// `i32`
    I32,
    /// `u64`
    U64,
    /// `i64`
    I64,
    /// `f32`
    F32,
    /// `f64`
    F64,
}

impl DType {
    /// Lowercase Rust name of the element type.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::U8 => "u8",
            Self::I8 => "i8",
            Self::U16 => "u16",
            Self::I16 => "i16",
            Self::U32 => "u32",
            Self::I32 => "i32",
            Self::U64 => "u64",
            Self::I64 => "i64",
            Self::F32 => "f32",
            Self::F64 => "f64",
        }
    }
}

impl fmt::Display for DType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Scalar types that can populate a leakage or value array.
pub trait Element:
    Copy + Default + PartialEq + fmt::Debug + Serialize + Send + Sync + 'static
{
    /// Runtime tag for this element type.
    const DTYPE: DType;
}

macro_rules! impl_element {
    ($($t:ty => $d:ident),* $(,)?) => {
        $(impl Element for $t { const DTYPE: DType = DType::$d; })*
    };
}

impl_element!(
    u8 => U8, i8 => I8, u16 => U16, i16 => I16, u32 => U32,
    i32 => I32, u64 => U64, i64 => I64, f32 => F32, f64 => F64,
);

/// Shape and dtype of a single trace's leakage (or value).
///
/// `shape` excludes the leading trace axis; an empty shape is a scalar.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub struct ArraySpec {
    /// Per-trace shape.
    pub shape: Vec<usize>,
    /// Element type.
    pub dtype: DType,
}

impl ArraySpec {
    /// Construct a spec (no validation).
    #[inline]
    #[must_use]
    pub const fn new(shape: Vec<usize>, dtype: DType) -> Self {
        Self { shape, dtype }
    }

    /// Spec for element type `T` with the given per-trace shape.
    #[inline]
    #[must_use]
    pub fn of<T: Element>(shape: &[usize]) -> Self {
        Self::new(shape.to_vec(), T::DTYPE)
    }

    /// Shape of a batch of `n` traces: `(n, shape...)`.
    #[must_use]
    pub fn batch_shape(&self, n: usize) -> Vec<usize> {
        std::iter::once(n).chain(self.shape.iter().copied()).collect()
    }
}

impl fmt::Display for ArraySpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{:?}", self.dtype, self.shape)
    }
}

/// One record: a leakage sample and its associated value.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Trace<L, V> {
    /// Leakage sample (after section and processing).
    pub leakage: ArrayD<L>,
    /// Associated value (after section and processing).
    pub value: ArrayD<V>,
}

impl<L: Element, V: Element> Trace<L, V> {
    /// Pair a leakage sample with its value.
    #[inline]
    #[must_use]
    pub const fn new(leakage: ArrayD<L>, value: ArrayD<V>) -> Self {
        Self { leakage, value }
    }
}

/// Aligned group of records; axis 0 of both arrays indexes the record.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Batch<L, V> {
    leakages: ArrayD<L>,
    values: ArrayD<V>,
}

impl<L: Element, V: Element> Batch<L, V> {
    /// Build a batch from stacked arrays.
    ///
    /// # Errors
    /// Fails if either array is 0-dimensional or if their leading lengths differ.
    pub fn new(leakages: ArrayD<L>, values: ArrayD<V>) -> Result<Self> {
        if leakages.ndim() == 0 || values.ndim() == 0 {
            return Err(TraceError::Inconsistent(
                "batch arrays need a leading trace axis".into(),
            ));
        }
        let (nl, nv) = (leakages.len_of(Axis(0)), values.len_of(Axis(0)));
        if nl != nv {
            return Err(TraceError::Inconsistent(format!(
                "{nl} leakages paired with {nv} values"
            )));
        }
        Ok(Self { leakages, values })
    }

    /// Zero-length batch with the given per-trace geometry.
    #[must_use]
    pub fn empty(leakage: &ArraySpec, value: &ArraySpec) -> Self {
        Self {
            leakages: ArrayD::from_elem(IxDyn(&leakage.batch_shape(0)), L::default()),
            values: ArrayD::from_elem(IxDyn(&value.batch_shape(0)), V::default()),
        }
    }

    /// Single-record batch.
    #[must_use]
    pub fn from_trace(trace: Trace<L, V>) -> Self {
        Self {
            leakages: trace.leakage.insert_axis(Axis(0)),
            values: trace.value.insert_axis(Axis(0)),
        }
    }

    /// Number of records.
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.leakages.len_of(Axis(0))
    }

    /// Whether the batch holds no records.
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Stacked leakages, shape `(len, leakage_shape...)`.
    #[inline]
    #[must_use]
    pub const fn leakages(&self) -> &ArrayD<L> {
        &self.leakages
    }

    /// Stacked values, shape `(len, value_shape...)`.
    #[inline]
    #[must_use]
    pub const fn values(&self) -> &ArrayD<V> {
        &self.values
    }

    /// Release the underlying arrays.
    #[must_use]
    pub fn into_parts(self) -> (ArrayD<L>, ArrayD<V>) {
        (self.leakages, self.values)
    }

    /// Copy out record `j`, or `None` past the end.
    #[must_use]
    pub fn trace(&self, j: usize) -> Option<Trace<L, V>> {
        (j < self.len()).then(|| {
            Trace::new(
                self.leakages.index_axis(Axis(0), j).to_owned(),
                self.values.index_axis(Axis(0), j).to_owned(),
            )
        })
    }

    /// Iterate over owned copies of every record, in order.
    pub fn traces(&self) -> impl Iterator<Item = Trace<L, V>> + '_ {
        (0..self.len()).filter_map(move |j| self.trace(j))
    }

    /// Per-trace leakage geometry.
    #[must_use]
    pub fn leakage_spec(&self) -> ArraySpec {
        ArraySpec::of::<L>(&self.leakages.shape()[1..])
    }

    /// Per-trace value geometry.
    #[must_use]
    pub fn value_spec(&self) -> ArraySpec {
        ArraySpec::of::<V>(&self.values.shape()[1..])
    }
}
