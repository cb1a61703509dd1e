//! Fixed-size batch iteration over any [`TraceContainer`].
//!
//! Analyses usually stream a container in consecutive contiguous chunks;
//! [`batches`] yields those chunks as fresh [`Batch`]es, the last one possibly
//! shorter. Each chunk goes through `get_range`, so a concatenation is read
//! piecewise without ever materializing the whole set.

use crate::container::{BatchOf, TraceContainer};
use crate::error::{Result, TraceError};

/// Iterator returned by [`batches`].
#[derive(Debug)]
pub struct Batches<'c, C: ?Sized> {
    container: &'c C,
    size: usize,
    next: usize,
}

/// Iterate over `container` in chunks of `size` records.
///
/// # Errors
/// [`TraceError::ArgumentKind`] when `size == 0`.
pub fn batches<C: TraceContainer + ?Sized>(container: &C, size: usize) -> Result<Batches<'_, C>> {
    if size == 0 {
        return Err(TraceError::ArgumentKind("batch size must be positive".into()));
    }
    Ok(Batches {
        container,
        size,
        next: 0,
    })
}

impl<C: TraceContainer + ?Sized> Iterator for Batches<'_, C> {
    type Item = Result<BatchOf<C>>;

    fn next(&mut self) -> Option<Self::Item> {
        let len = self.container.len();
        if self.next >= len {
            return None;
        }
        let hi = self.next.saturating_add(self.size).min(len);
        let range = self.next..hi;
        // Stop after an error instead of retrying the same chunk forever.
        self.next = hi;
        Some(self.container.get_range(range))
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = self.container.len().saturating_sub(self.next);
        let n = remaining.div_ceil(self.size);
        (n, Some(n))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::TraceBatchContainer;
    use ndarray::{Array1, Array2};

    fn counting(len: usize) -> TraceBatchContainer<u16, u16> {
        let l = Array2::from_shape_fn((len, 2), |(t, s)| (t * 2 + s) as u16);
        let v = Array1::from_shape_fn(len, |t| t as u16);
        TraceBatchContainer::new(l.into_dyn(), v.into_dyn()).unwrap()
    }

    #[test]
    fn chunks_cover_the_container_in_order() {
        let c = counting(7);
        let it = batches(&c, 3).unwrap();
        assert_eq!(it.size_hint(), (3, Some(3)));
        let lens: Vec<usize> = it.map(|b| b.unwrap().len()).collect();
        assert_eq!(lens, vec![3, 3, 1]);

        let values: Vec<u16> = batches(&c, 3)
            .unwrap()
            .flat_map(|b| b.unwrap().values().iter().copied().collect::<Vec<_>>())
            .collect();
        assert_eq!(values, (0..7).collect::<Vec<u16>>());
    }

    #[test]
    fn zero_size_is_rejected() {
        let c = counting(2);
        assert!(matches!(batches(&c, 0), Err(TraceError::ArgumentKind(_))));
    }

    #[test]
    fn empty_container_yields_nothing() {
        let c = counting(0);
        assert_eq!(batches(&c, 4).unwrap().count(), 0);
    }
}
