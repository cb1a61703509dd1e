//! Virtual concatenation of trace containers.
//!
//! [`MultipleContainer`] borrows an ordered list of sub-containers and
//! exposes them as one contiguous container. Nothing is copied at
//! construction: single-record reads are forwarded to the owning
//! sub-container, and range reads are split at sub-container boundaries,
//! fetched piecewise and merged into freshly allocated buffers.
//!
//! Configuration (sections and processing) written to the aggregate is
//! forwarded to every sub-container in list order and remembered locally;
//! getters return the remembered value. Construction writes an initial
//! [`Settings`] the same way, so members never keep a section or processing
//! the aggregate does not report. What happens to the derived
//! shape/dtype afterwards is governed by [`ShapePolicy`].
//!
//! Sub-containers are held as `&'a mut C`, so nothing else can resize or
//! reconfigure them while the aggregate is alive. That is what keeps the
//! [`IndexMap`] built at construction valid.

use crate::container::TraceContainer;
use crate::error::{Result, TraceError};
use crate::index::{IndexMap, IndexStrategy, Location, SubRange};
use crate::section::{Processing, Section};
use crate::types::{ArraySpec, Batch, Element, Trace};
use ndarray::{ArrayD, Axis, Slice};
use serde::{Deserialize, Serialize};
use std::ops::Range;
use tracing::{debug, warn};

/// How derived specs are refreshed after a configuration change.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ShapePolicy {
    /// Take the specs of the last sub-container written, without comparing
    /// the others.
    LastWriterWins,
    /// Require every non-empty sub-container to report the same specs, both
    /// at construction and after each propagated change. A change that
    /// breaks agreement is rolled back.
    #[default]
    RequireUniform,
}

/// Knobs for [`MultipleContainer`].
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct MultipleConfig {
    /// Index translation strategy.
    pub strategy: IndexStrategy,
    /// Derived-spec policy.
    pub shape_policy: ShapePolicy,
}

/// Initial sections and processing pushed to every sub-container when a
/// [`MultipleContainer`] is built. `None` clears the member's setting.
#[derive(Clone, Debug)]
pub struct Settings<L, V> {
    /// Section applied to leakage samples.
    pub leakage_section: Option<Section>,
    /// Processing applied to sectioned leakage samples.
    pub leakage_processing: Option<Processing<L>>,
    /// Section applied to value samples.
    pub value_section: Option<Section>,
    /// Processing applied to sectioned value samples.
    pub value_processing: Option<Processing<V>>,
}

impl<L, V> Default for Settings<L, V> {
    fn default() -> Self {
        Self {
            leakage_section: None,
            leakage_processing: None,
            value_section: None,
            value_processing: None,
        }
    }
}

impl<L, V> Settings<L, V> {
    /// Current settings of `container`.
    #[must_use]
    pub fn of<C>(container: &C) -> Self
    where
        C: TraceContainer<Leakage = L, Value = V> + ?Sized,
    {
        Self {
            leakage_section: container.leakage_section().cloned(),
            leakage_processing: container.leakage_processing().cloned(),
            value_section: container.value_section().cloned(),
            value_processing: container.value_processing().cloned(),
        }
    }

    /// Write all four settings to `container`, stopping at the first error.
    ///
    /// # Errors
    /// Whatever the container's setters return.
    pub fn write_to<C>(self, container: &mut C) -> Result<()>
    where
        C: TraceContainer<Leakage = L, Value = V> + ?Sized,
    {
        container.set_leakage_section(self.leakage_section)?;
        container.set_leakage_processing(self.leakage_processing)?;
        container.set_value_section(self.value_section)?;
        container.set_value_processing(self.value_processing)
    }
}

/// Concatenation of borrowed sub-containers.
pub struct MultipleContainer<'a, C: TraceContainer + ?Sized> {
    containers: Vec<&'a mut C>,
    index: IndexMap,
    config: MultipleConfig,
    leakage_spec: ArraySpec,
    value_spec: ArraySpec,
    leakage_section: Option<Section>,
    leakage_processing: Option<Processing<C::Leakage>>,
    value_section: Option<Section>,
    value_processing: Option<Processing<C::Value>>,
}

impl<'a, C: TraceContainer + ?Sized> MultipleContainer<'a, C> {
    /// Concatenate `containers` with the default configuration.
    ///
    /// # Errors
    /// See [`Self::with_config`].
    pub fn new(containers: Vec<&'a mut C>) -> Result<Self> {
        Self::with_config(containers, MultipleConfig::default())
    }

    /// Concatenate `containers` in the given order, clearing every member's
    /// sections and processing.
    ///
    /// # Errors
    /// See [`Self::with_settings`].
    pub fn with_config(containers: Vec<&'a mut C>, config: MultipleConfig) -> Result<Self> {
        Self::with_settings(containers, config, Settings::default())
    }

    /// Concatenate `containers` in the given order and push `settings` to
    /// every member, as if each setter had been called on the aggregate.
    ///
    /// On failure every member gets back the settings it had on entry.
    ///
    /// # Errors
    /// - [`TraceError::EmptyContainerList`] when `containers` is empty;
    /// - [`TraceError::Section`] when a member rejects a section;
    /// - [`TraceError::Inconsistent`] under [`ShapePolicy::RequireUniform`]
    ///   when sub-containers disagree on their specs.
    pub fn with_settings(
        containers: Vec<&'a mut C>,
        config: MultipleConfig,
        settings: Settings<C::Leakage, C::Value>,
    ) -> Result<Self> {
        let lengths: Vec<usize> = containers.iter().map(|c| c.len()).collect();
        let index = IndexMap::build(&lengths, config.strategy)?;
        let first = containers.first().ok_or(TraceError::EmptyContainerList)?;
        // Placeholder until the first setter refreshes it under the policy.
        let (leakage_spec, value_spec) = (first.leakage_spec(), first.value_spec());
        debug!(
            containers = containers.len(),
            total = index.total(),
            strategy = ?config.strategy,
            policy = ?config.shape_policy,
            "creating multiple container"
        );
        let entry: Vec<Settings<C::Leakage, C::Value>> =
            containers.iter().map(|c| Settings::of(&**c)).collect();
        let mut multi = Self {
            containers,
            index,
            config,
            leakage_spec,
            value_spec,
            leakage_section: None,
            leakage_processing: None,
            value_section: None,
            value_processing: None,
        };
        if let Err(err) = settings.write_to(&mut multi) {
            warn!(%err, "initial settings rejected, restoring sub-containers");
            for (i, (c, prior)) in multi.containers.iter_mut().zip(entry).enumerate() {
                if let Err(err) = prior.write_to(&mut **c) {
                    warn!(container = i, %err, "could not restore previous settings");
                }
            }
            return Err(err);
        }
        Ok(multi)
    }

    /// Number of sub-containers.
    #[must_use]
    pub fn container_count(&self) -> usize {
        self.containers.len()
    }

    /// Shared view of the sub-containers, in concatenation order.
    pub fn containers(&self) -> impl Iterator<Item = &C> + '_ {
        self.containers.iter().map(|c| &**c)
    }

    /// Shared view of sub-container `i`.
    #[must_use]
    pub fn container(&self, i: usize) -> Option<&C> {
        self.containers.get(i).map(|c| &**c)
    }

    /// The translation table built at construction.
    #[must_use]
    pub const fn index_map(&self) -> &IndexMap {
        &self.index
    }

    /// Active configuration.
    #[must_use]
    pub const fn config(&self) -> MultipleConfig {
        self.config
    }

    /// Translate a global position (`total` yields the sentinel).
    ///
    /// # Errors
    /// [`TraceError::OutOfBounds`] when `pos > len()`.
    pub fn locate(&self, pos: usize) -> Result<Location> {
        self.index.locate(pos)
    }

    /// Specs after a configuration change, per the active policy.
    fn refreshed_specs(&self) -> Result<(ArraySpec, ArraySpec)> {
        match self.config.shape_policy {
            ShapePolicy::RequireUniform => uniform_specs(&self.containers),
            ShapePolicy::LastWriterWins => {
                let last = self.containers.last().ok_or(TraceError::EmptyContainerList)?;
                Ok((last.leakage_spec(), last.value_spec()))
            }
        }
    }

    /// Write `value` to every sub-container, then refresh derived specs.
    ///
    /// On any failure the sub-containers already written get their previous
    /// setting back and the error is returned.
    fn propagate<T: Clone>(
        &mut self,
        field: &'static str,
        value: &Option<T>,
        read: impl Fn(&C) -> Option<T>,
        write: impl Fn(&mut C, Option<T>) -> Result<()>,
    ) -> Result<()> {
        debug!(field, containers = self.containers.len(), "propagating setting");
        let mut previous = Vec::with_capacity(self.containers.len());
        for i in 0..self.containers.len() {
            let c = &mut *self.containers[i];
            let prior = read(&*c);
            if let Err(err) = write(c, value.clone()) {
                warn!(field, container = i, %err, "sub-container rejected setting");
                restore(&mut self.containers, &previous, &write);
                return Err(err);
            }
            previous.push(prior);
        }
        match self.refreshed_specs() {
            Ok((leakage_spec, value_spec)) => {
                self.leakage_spec = leakage_spec;
                self.value_spec = value_spec;
                Ok(())
            }
            Err(err) => {
                warn!(field, %err, "setting breaks spec agreement, rolling back");
                restore(&mut self.containers, &previous, &write);
                Err(err)
            }
        }
    }

    /// Copy `batch` into rows `at..at + batch.len()` of the output buffers.
    fn merge_into(
        &self,
        piece: &SubRange,
        batch: &Batch<C::Leakage, C::Value>,
        leakages: &mut ArrayD<C::Leakage>,
        values: &mut ArrayD<C::Value>,
        at: usize,
    ) -> Result<()> {
        if batch.len() != piece.len() {
            return Err(TraceError::Inconsistent(format!(
                "container {} returned {} records for {:?}",
                piece.container,
                batch.len(),
                piece.local()
            )));
        }
        fits(piece.container, &batch.leakage_spec(), &self.leakage_spec, "leakage")?;
        fits(piece.container, &batch.value_spec(), &self.value_spec, "value")?;
        let rows = Slice::from(at..at + batch.len());
        leakages
            .slice_axis_mut(Axis(0), rows)
            .assign(batch.leakages());
        values.slice_axis_mut(Axis(0), rows).assign(batch.values());
        Ok(())
    }
}

fn fits(container: usize, got: &ArraySpec, want: &ArraySpec, what: &str) -> Result<()> {
    if got == want {
        return Ok(());
    }
    Err(TraceError::Inconsistent(format!(
        "container {container} produced {what} {got}, expected {want}"
    )))
}

fn alloc<T: Element>(spec: &ArraySpec, n: usize) -> ArrayD<T> {
    ArrayD::from_elem(spec.batch_shape(n), T::default())
}

/// Specs shared by every non-empty sub-container (the first one's if all
/// are empty).
fn uniform_specs<C: TraceContainer + ?Sized>(containers: &[&mut C]) -> Result<(ArraySpec, ArraySpec)> {
    let first = containers.first().ok_or(TraceError::EmptyContainerList)?;
    let reference = containers
        .iter()
        .find(|c| !c.is_empty())
        .unwrap_or(first);
    let (leakage, value) = (reference.leakage_spec(), reference.value_spec());
    for (i, c) in containers.iter().enumerate().filter(|(_, c)| !c.is_empty()) {
        fits(i, &c.leakage_spec(), &leakage, "leakage")?;
        fits(i, &c.value_spec(), &value, "value")?;
    }
    Ok((leakage, value))
}

fn restore<C: TraceContainer + ?Sized, T: Clone>(
    containers: &mut [&mut C],
    previous: &[Option<T>],
    write: &impl Fn(&mut C, Option<T>) -> Result<()>,
) {
    for (i, (c, prior)) in containers.iter_mut().zip(previous).enumerate() {
        if let Err(err) = write(&mut **c, prior.clone()) {
            warn!(container = i, %err, "could not restore previous setting");
        }
    }
}

impl<C: TraceContainer + ?Sized> TraceContainer for MultipleContainer<'_, C> {
    type Leakage = C::Leakage;
    type Value = C::Value;

    fn len(&self) -> usize {
        self.index.total()
    }

    fn get(&self, index: usize) -> Result<Trace<C::Leakage, C::Value>> {
        if index >= self.len() {
            return Err(TraceError::OutOfBounds {
                index,
                len: self.len(),
            });
        }
        let loc = self.index.locate(index)?;
        debug!(index, container = loc.container, offset = loc.offset, "get");
        self.containers[loc.container].get(loc.offset)
    }

    fn get_range(&self, range: Range<usize>) -> Result<Batch<C::Leakage, C::Value>> {
        let pieces = self.index.decompose(range.clone())?;
        debug!(?range, pieces = pieces.len(), "get_range");
        if range.is_empty() {
            return Ok(Batch::empty(&self.leakage_spec, &self.value_spec));
        }

        let n = range.len();
        let mut leakages = alloc::<C::Leakage>(&self.leakage_spec, n);
        let mut values = alloc::<C::Value>(&self.value_spec, n);
        let mut at = 0;
        for piece in &pieces {
            let batch = self.containers[piece.container].get_range(piece.local())?;
            self.merge_into(piece, &batch, &mut leakages, &mut values, at)?;
            at += batch.len();
        }
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
        self.propagate(
            "leakage_section",
            &section,
            |c| c.leakage_section().cloned(),
            |c, s| c.set_leakage_section(s),
        )?;
        self.leakage_section = section;
        Ok(())
    }

    fn leakage_processing(&self) -> Option<&Processing<C::Leakage>> {
        self.leakage_processing.as_ref()
    }

    fn set_leakage_processing(
        &mut self,
        processing: Option<Processing<C::Leakage>>,
    ) -> Result<()> {
        self.propagate(
            "leakage_processing",
            &processing,
            |c| c.leakage_processing().cloned(),
            |c, p| c.set_leakage_processing(p),
        )?;
        self.leakage_processing = processing;
        Ok(())
    }

    fn value_section(&self) -> Option<&Section> {
        self.value_section.as_ref()
    }

    fn set_value_section(&mut self, section: Option<Section>) -> Result<()> {
        self.propagate(
            "value_section",
            &section,
            |c| c.value_section().cloned(),
            |c, s| c.set_value_section(s),
        )?;
        self.value_section = section;
        Ok(())
    }

    fn value_processing(&self) -> Option<&Processing<C::Value>> {
        self.value_processing.as_ref()
    }

    fn set_value_processing(&mut self, processing: Option<Processing<C::Value>>) -> Result<()> {
        self.propagate(
            "value_processing",
            &processing,
            |c| c.value_processing().cloned(),
            |c, p| c.set_value_processing(p),
        )?;
        self.value_processing = processing;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::TraceBatchContainer;
    use ndarray::{arr1, Array2};

    type Tbc = TraceBatchContainer<i32, u8>;

    /// `len` records of 4 points; leakage encodes (tag, record, point).
    fn tagged(tag: i32, len: usize) -> Tbc {
        let l = Array2::from_shape_fn((len, 4), |(t, s)| tag * 1000 + t as i32 * 10 + s as i32);
        let v = Array2::from_shape_fn((len, 1), |(t, _)| t as u8);
        TraceBatchContainer::new(l.into_dyn(), v.into_dyn()).unwrap()
    }

    #[test]
    fn empty_list_is_rejected() {
        let r = MultipleContainer::<Tbc>::new(Vec::new());
        assert!(matches!(r, Err(TraceError::EmptyContainerList)));
    }

    #[test]
    fn config_is_kebab_case_with_defaults() {
        let c: MultipleConfig =
            serde_json::from_str(r#"{"shape-policy":"last-writer-wins"}"#).unwrap();
        assert_eq!(c.strategy, IndexStrategy::Table);
        assert_eq!(c.shape_policy, ShapePolicy::LastWriterWins);
        assert_eq!(
            serde_json::to_string(&MultipleConfig::default()).unwrap(),
            r#"{"strategy":"table","shape-policy":"require-uniform"}"#
        );
    }

    #[test]
    fn single_index_is_forwarded() {
        let (mut a, mut b) = (tagged(1, 3), tagged(2, 4));
        let m = MultipleContainer::new(vec![&mut a, &mut b]).unwrap();
        assert_eq!(m.len(), 7);
        assert_eq!(m.get(3).unwrap().leakage, arr1(&[2000, 2001, 2002, 2003]).into_dyn());
        assert!(m.get(7).unwrap_err().is_out_of_bounds());
    }

    #[test]
    fn range_over_one_boundary_merges_in_order() {
        let (mut a, mut b) = (tagged(1, 3), tagged(2, 4));
        let m = MultipleContainer::new(vec![&mut a, &mut b]).unwrap();
        let batch = m.get_range(2..5).unwrap();
        let firsts: Vec<i32> = batch.traces().map(|t| t.leakage[[0]]).collect();
        assert_eq!(firsts, vec![1020, 2000, 2010]);
    }

    #[test]
    fn mismatched_specs_are_rejected_under_uniform_policy() {
        let mut a = tagged(1, 2);
        let mut b = TraceBatchContainer::new(
            Array2::<i32>::zeros((2, 5)).into_dyn(),
            Array2::<u8>::zeros((2, 1)).into_dyn(),
        )
        .unwrap();
        let r = MultipleContainer::new(vec![&mut a, &mut b]);
        assert!(matches!(r, Err(TraceError::Inconsistent(_))));
    }

    #[test]
    fn last_writer_wins_defers_mismatch_to_the_merge() {
        let mut a = tagged(1, 2);
        let mut b = TraceBatchContainer::new(
            Array2::<i32>::zeros((2, 5)).into_dyn(),
            Array2::<u8>::zeros((2, 1)).into_dyn(),
        )
        .unwrap();
        let config = MultipleConfig {
            shape_policy: ShapePolicy::LastWriterWins,
            ..MultipleConfig::default()
        };
        let m = MultipleContainer::with_config(vec![&mut a, &mut b], config).unwrap();
        assert_eq!(m.leakage_spec().shape, vec![5]);
        assert!(m.get_range(2..4).is_ok());
        assert!(matches!(m.get_range(0..2), Err(TraceError::Inconsistent(_))));
        assert!(matches!(m.get_range(1..3), Err(TraceError::Inconsistent(_))));
    }

    #[test]
    fn last_writer_wins_accepts_diverging_processing() {
        let (mut a, mut b) = (tagged(1, 2), tagged(2, 2));
        let config = MultipleConfig {
            shape_policy: ShapePolicy::LastWriterWins,
            ..MultipleConfig::default()
        };
        let mut m = MultipleContainer::with_config(vec![&mut a, &mut b], config).unwrap();

        let grow = Processing::new("grow", |x: ArrayD<i32>| {
            if x[[0]] >= 2000 {
                ndarray::concatenate(Axis(0), &[x.view(), x.view()]).unwrap()
            } else {
                x
            }
        });
        m.set_leakage_processing(Some(grow.clone())).unwrap();
        assert!(m.leakage_processing().is_some_and(|p| p.same_as(&grow)));
        assert!(m
            .containers()
            .all(|c| c.leakage_processing().is_some_and(|p| p.same_as(&grow))));

        let last = m.container(1).unwrap().leakage_spec();
        assert_eq!(last.shape, vec![8]);
        assert_eq!(m.leakage_spec(), last);
        assert_eq!(m.get_range(2..4).unwrap().leakages().shape(), &[2, 8]);
        assert!(matches!(m.get_range(0..2), Err(TraceError::Inconsistent(_))));
        assert!(matches!(m.get_range(1..3), Err(TraceError::Inconsistent(_))));
    }

    #[test]
    fn empty_range_keeps_trailing_geometry() {
        let (mut a, mut b) = (tagged(1, 2), tagged(2, 3));
        let m = MultipleContainer::new(vec![&mut a, &mut b]).unwrap();
        let batch = m.get_range(2..2).unwrap();
        assert!(batch.is_empty());
        assert_eq!(batch.leakages().shape(), &[0, 4]);
        assert_eq!(batch.values().shape(), &[0, 1]);
        assert!(m.get_range(6..6).unwrap_err().is_out_of_bounds());
    }

    #[test]
    fn rejected_section_is_rolled_back_everywhere() {
        let mut a = tagged(1, 2);
        let mut b = TraceBatchContainer::new(
            Array2::<i32>::zeros((2, 2)).into_dyn(),
            Array2::<u8>::zeros((2, 1)).into_dyn(),
        )
        .unwrap();
        let config = MultipleConfig {
            shape_policy: ShapePolicy::LastWriterWins,
            ..MultipleConfig::default()
        };
        let mut m = MultipleContainer::with_config(vec![&mut a, &mut b], config).unwrap();
        // Fits the 4-point container, not the 2-point one.
        let err = m.set_leakage_section(Some(Section::range(1, 4))).unwrap_err();
        assert!(matches!(err, TraceError::Section(_)));
        assert!(m.leakage_section().is_none());
        assert!(m.containers().all(|c| c.leakage_section().is_none()));
    }

    #[test]
    fn diverging_processing_is_rolled_back_under_uniform_policy() {
        let (mut a, mut b) = (tagged(1, 2), tagged(2, 2));
        let mut m = MultipleContainer::new(vec![&mut a, &mut b]).unwrap();

        // Output length depends on the raw content, so the two members diverge.
        let grow = Processing::new("grow", |x: ArrayD<i32>| {
            if x[[0]] >= 2000 {
                ndarray::concatenate(Axis(0), &[x.view(), x.view()]).unwrap()
            } else {
                x
            }
        });
        let err = m.set_leakage_processing(Some(grow)).unwrap_err();
        assert!(matches!(err, TraceError::Inconsistent(_)));
        assert!(m.leakage_processing().is_none());
        assert!(m.containers().all(|c| c.leakage_processing().is_none()));
        assert_eq!(m.leakage_spec().shape, vec![4]);
    }
}
