//! In-memory trace container.
//!
//! [`TraceBatchContainer`] owns raw leakage and value arrays whose axis 0
//! indexes the record. Sections and processing are applied lazily, on every
//! access, to the record being read; the raw arrays are never rewritten.
//!
//! Derived specs are computed by running the current configuration on record
//! 0. An empty container reports its sectioned raw shape since there is no
//! sample to process.

use crate::container::{check_range, TraceContainer};
use crate::error::{Result, TraceError};
use crate::section::{transform, Processing, Section};
use crate::types::{ArraySpec, Batch, Element, Trace};
use ndarray::{ArrayD, ArrayViewD, Axis, Slice};
use std::ops::Range;

/// Container backed by two owned arrays.
#[derive(Clone, Debug)]
pub struct TraceBatchContainer<L: Element, V: Element> {
    leakages: ArrayD<L>,
    values: ArrayD<V>,
    leakage_section: Option<Section>,
    leakage_processing: Option<Processing<L>>,
    value_section: Option<Section>,
    value_processing: Option<Processing<V>>,
    leakage_spec: ArraySpec,
    value_spec: ArraySpec,
}

impl<L: Element, V: Element> TraceBatchContainer<L, V> {
    /// Wrap raw arrays of shape `(n, leakage...)` and `(n, value...)`.
    ///
    /// # Errors
    /// Fails if either array lacks a leading axis or the record counts differ.
    pub fn new(leakages: ArrayD<L>, values: ArrayD<V>) -> Result<Self> {
        let (leakages, values) = Batch::new(leakages, values)?.into_parts();
        let leakage_spec = derive_spec(&leakages, None, None)?;
        let value_spec = derive_spec(&values, None, None)?;
        Ok(Self {
            leakages,
            values,
            leakage_section: None,
            leakage_processing: None,
            value_section: None,
            value_processing: None,
            leakage_spec,
            value_spec,
        })
    }

    /// Raw leakage array, ignoring section and processing.
    #[must_use]
    pub const fn raw_leakages(&self) -> &ArrayD<L> {
        &self.leakages
    }

    /// Raw value array, ignoring section and processing.
    #[must_use]
    pub const fn raw_values(&self) -> &ArrayD<V> {
        &self.values
    }

    fn check_index(&self, index: usize) -> Result<()> {
        if index >= self.len() {
            return Err(TraceError::OutOfBounds {
                index,
                len: self.len(),
            });
        }
        Ok(())
    }

    fn is_raw(&self) -> bool {
        self.leakage_section.is_none()
            && self.leakage_processing.is_none()
            && self.value_section.is_none()
            && self.value_processing.is_none()
    }
}

/// Per-trace spec of `raw` under a section and processing.
fn derive_spec<T: Element>(
    raw: &ArrayD<T>,
    section: Option<&Section>,
    processing: Option<&Processing<T>>,
) -> Result<ArraySpec> {
    if raw.len_of(Axis(0)) == 0 {
        let trailing = &raw.shape()[1..];
        let shape = match section {
            Some(s) => s.section_shape(trailing)?,
            None => trailing.to_vec(),
        };
        return Ok(ArraySpec::of::<T>(&shape));
    }
    let first = transform(raw.index_axis(Axis(0), 0), section, processing)?;
    Ok(ArraySpec::of::<T>(first.shape()))
}

/// Transform records `range` of `raw` and stack them.
fn stack_range<T: Element>(
    raw: &ArrayD<T>,
    range: Range<usize>,
    section: Option<&Section>,
    processing: Option<&Processing<T>>,
    spec: &ArraySpec,
) -> Result<ArrayD<T>> {
    if range.is_empty() {
        return Ok(ArrayD::from_elem(spec.batch_shape(0), T::default()));
    }
    let samples = range
        .map(|i| transform(raw.index_axis(Axis(0), i), section, processing))
        .collect::<Result<Vec<_>>>()?;
    let views: Vec<ArrayViewD<'_, T>> = samples.iter().map(|s| s.view()).collect();
    Ok(ndarray::stack(Axis(0), &views)?)
}

impl<L: Element, V: Element> TraceContainer for TraceBatchContainer<L, V> {
    type Leakage = L;
    type Value = V;

    fn len(&self) -> usize {
        self.leakages.len_of(Axis(0))
    }

    fn get(&self, index: usize) -> Result<Trace<L, V>> {
        self.check_index(index)?;
        let leakage = transform(
            self.leakages.index_axis(Axis(0), index),
            self.leakage_section.as_ref(),
            self.leakage_processing.as_ref(),
        )?;
        let value = transform(
            self.values.index_axis(Axis(0), index),
            self.value_section.as_ref(),
            self.value_processing.as_ref(),
        )?;
        Ok(Trace::new(leakage, value))
    }

    fn get_range(&self, range: Range<usize>) -> Result<Batch<L, V>> {
        check_range(&range, self.len())?;
        if self.is_raw() {
            let slice = Slice::from(range);
            return Batch::new(
                self.leakages.slice_axis(Axis(0), slice).to_owned(),
                self.values.slice_axis(Axis(0), slice).to_owned(),
            );
        }
        let leakages = stack_range(
            &self.leakages,
            range.clone(),
            self.leakage_section.as_ref(),
            self.leakage_processing.as_ref(),
            &self.leakage_spec,
        )?;
        let values = stack_range(
            &self.values,
            range,
            self.value_section.as_ref(),
            self.value_processing.as_ref(),
            &self.value_spec,
        )?;
        Batch::new(leakages, values)
    }

    fn leakage_spec(&self) -> ArraySpec {
        self.leakage_spec.clone()
    }

    fn value_spec(&self) -> ArraySpec {
        self.value_spec.clone()
    }

    fn leakage_section(&self) -> Option<&Section> {
        self.leakage_section.as_ref()
    }

    fn set_leakage_section(&mut self, section: Option<Section>) -> Result<()> {
        self.leakage_spec = derive_spec(
            &self.leakages,
            section.as_ref(),
            self.leakage_processing.as_ref(),
        )?;
        self.leakage_section = section;
        Ok(())
    }

    fn leakage_processing(&self) -> Option<&Processing<L>> {
        self.leakage_processing.as_ref()
    }

    fn set_leakage_processing(&mut self, processing: Option<Processing<L>>) -> Result<()> {
        self.leakage_spec = derive_spec(
            &self.leakages,
            self.leakage_section.as_ref(),
            processing.as_ref(),
        )?;
        self.leakage_processing = processing;
        Ok(())
    }

    fn value_section(&self) -> Option<&Section> {
        self.value_section.as_ref()
    }

    fn set_value_section(&mut self, section: Option<Section>) -> Result<()> {
        self.value_spec = derive_spec(
            &self.values,
            section.as_ref(),
            self.value_processing.as_ref(),
        )?;
        self.value_section = section;
        Ok(())
    }

    fn value_processing(&self) -> Option<&Processing<V>> {
        self.value_processing.as_ref()
    }

    fn set_value_processing(&mut self, processing: Option<Processing<V>>) -> Result<()> {
        self.value_spec = derive_spec(
            &self.values,
            self.value_section.as_ref(),
            processing.as_ref(),
        )?;
        self.value_processing = processing;
        Ok(())
    }
}
