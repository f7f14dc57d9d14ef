//! Prepared bulk cursors over one attribute column.
//!
//! Codecs and pipeline utilities resolve an attribute once into a view,
//! then run tight per-particle loops without any further name or handle
//! resolution.

use std::slice::{ChunksExact, ChunksExactMut};

use crate::util::{AttrElement, Error, Result};

use super::attribute::Attribute;
use super::store::ParticleStore;

/// Read-only cursor over one per-particle attribute column.
pub struct AttrView<'a, T: AttrElement> {
    data: &'a [T],
    count: usize,
}

impl<'a, T: AttrElement> AttrView<'a, T> {
    /// Number of particles in the view.
    #[inline]
    pub fn len(&self) -> usize {
        if self.count == 0 {
            0
        } else {
            self.data.len() / self.count
        }
    }

    /// True when the view covers zero particles.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Tuple width of the attribute.
    #[inline]
    pub fn count(&self) -> usize {
        self.count
    }

    /// One particle's tuple. Plain slice indexing: out-of-range panics.
    #[inline]
    pub fn get(&self, particle: usize) -> &[T] {
        let start = particle * self.count;
        &self.data[start..start + self.count]
    }

    /// Iterate over all tuples in particle order.
    #[inline]
    pub fn iter(&self) -> ChunksExact<'a, T> {
        self.data.chunks_exact(self.count)
    }

    /// The whole column as one flat slice.
    #[inline]
    pub fn as_slice(&self) -> &'a [T] {
        self.data
    }
}

/// Mutable cursor over one per-particle attribute column.
pub struct AttrViewMut<'a, T: AttrElement> {
    data: &'a mut [T],
    count: usize,
}

impl<'a, T: AttrElement> AttrViewMut<'a, T> {
    /// Number of particles in the view.
    #[inline]
    pub fn len(&self) -> usize {
        if self.count == 0 {
            0
        } else {
            self.data.len() / self.count
        }
    }

    /// True when the view covers zero particles.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Tuple width of the attribute.
    #[inline]
    pub fn count(&self) -> usize {
        self.count
    }

    /// One particle's tuple, mutable. Out-of-range panics.
    #[inline]
    pub fn get_mut(&mut self, particle: usize) -> &mut [T] {
        let start = particle * self.count;
        &mut self.data[start..start + self.count]
    }

    /// Iterate mutably over all tuples in particle order.
    #[inline]
    pub fn iter_mut(&mut self) -> ChunksExactMut<'_, T> {
        self.data.chunks_exact_mut(self.count)
    }

    /// The whole column as one flat mutable slice.
    #[inline]
    pub fn as_mut_slice(&mut self) -> &mut [T] {
        self.data
    }
}

impl ParticleStore {
    /// Prepare a read-only bulk cursor over a per-particle attribute.
    ///
    /// Fails like [`data`](Self::data) on a stale handle or a storage-class
    /// mismatch; element access inside the view is plain slice indexing.
    pub fn view<T: AttrElement>(&self, attr: &Attribute) -> Result<AttrView<'_, T>> {
        let col = self.column(attr)?;
        if !T::matches(col.attr.attr_type()) {
            return Err(Error::TypeMismatch {
                name: col.attr.name().to_string(),
                expected: col.attr.attr_type(),
                actual: T::NAME.to_string(),
            });
        }
        Ok(AttrView {
            data: bytemuck::cast_slice(&col.data),
            count: col.attr.count(),
        })
    }

    /// Prepare a mutable bulk cursor over a per-particle attribute.
    pub fn view_mut<T: AttrElement>(&mut self, attr: &Attribute) -> Result<AttrViewMut<'_, T>> {
        let col = self.column_mut(attr)?;
        if !T::matches(col.attr.attr_type()) {
            return Err(Error::TypeMismatch {
                name: col.attr.name().to_string(),
                expected: col.attr.attr_type(),
                actual: T::NAME.to_string(),
            });
        }
        let count = col.attr.count();
        Ok(AttrViewMut {
            data: bytemuck::cast_slice_mut(&mut col.data),
            count,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::util::AttributeType;

    #[test]
    fn test_view_iteration() {
        let mut store = ParticleStore::new();
        let pos = store
            .add_attribute("position", AttributeType::Vector, 3)
            .unwrap();
        store.add_particles(3);
        {
            let mut view = store.view_mut::<f32>(&pos).unwrap();
            for (i, tuple) in view.iter_mut().enumerate() {
                tuple[0] = i as f32;
                tuple[2] = 10.0 * i as f32;
            }
        }
        let view = store.view::<f32>(&pos).unwrap();
        assert_eq!(view.len(), 3);
        assert_eq!(view.count(), 3);
        assert_eq!(view.get(1), &[1.0, 0.0, 10.0]);
        assert_eq!(view.iter().count(), 3);
        assert_eq!(view.as_slice().len(), 9);
    }

    #[test]
    fn test_view_type_mismatch() {
        let mut store = ParticleStore::new();
        let id = store.add_attribute("id", AttributeType::Int, 1).unwrap();
        assert!(matches!(
            store.view::<f32>(&id),
            Err(Error::TypeMismatch { .. })
        ));
    }
}
