//! ParticleStore - the in-memory columnar particle container.

use std::collections::HashMap;
use std::sync::Arc;

use crate::util::{AttrElement, AttributeType, Error, Result};

use super::attribute::Attribute;

/// Per-attribute dictionary of unique strings.
///
/// IndexedStr columns store i32 tokens into this table. Tokens are assigned
/// in registration order and never change for the lifetime of the store.
#[derive(Clone, Debug, Default)]
pub(crate) struct StringTable {
    strings: Vec<String>,
    lookup: HashMap<String, i32>,
}

impl StringTable {
    /// Register a string, returning its token. Idempotent.
    pub(crate) fn register(&mut self, s: &str) -> i32 {
        if let Some(&token) = self.lookup.get(s) {
            return token;
        }
        let token = self.strings.len() as i32;
        self.strings.push(s.to_string());
        self.lookup.insert(s.to_string(), token);
        token
    }

    /// Look up a string without registering it.
    #[inline]
    pub(crate) fn lookup(&self, s: &str) -> Option<i32> {
        self.lookup.get(s).copied()
    }

    /// All registered strings, ordered by token.
    #[inline]
    pub(crate) fn strings(&self) -> &[String] {
        &self.strings
    }
}

/// One attribute column: the handle, its backing storage and (for
/// IndexedStr) its string table.
///
/// Storage is raw 4-byte cells; every element type is four bytes wide, so
/// a column reinterprets infallibly as `&[f32]` or `&[i32]`.
#[derive(Debug)]
pub(crate) struct Column {
    pub(crate) attr: Attribute,
    pub(crate) data: Vec<u32>,
    pub(crate) strings: StringTable,
}

/// In-memory columnar container for particle data.
///
/// Owns two independent attribute classes: per-particle attributes (one
/// value per particle) and fixed attributes (one value for the whole
/// dataset), each backed by a contiguous typed column, plus the
/// indexed-string dictionaries and the particle count.
///
/// Typed reads and writes go through resolved [`Attribute`] handles so hot
/// loops never re-resolve by name. Borrowed data views follow the usual
/// borrow rules: a structural mutation (`add_attribute`, `add_particles`)
/// requires `&mut self` and therefore cannot race any outstanding view.
///
/// Stores are single-threaded while being built; wrap the finished store
/// with [`into_shared`](Self::into_shared) to hand atomically
/// reference-counted clones to multiple consumers.
#[derive(Debug, Default)]
pub struct ParticleStore {
    pub(crate) particle_count: usize,
    pub(crate) attrs: Vec<Column>,
    pub(crate) attr_index: HashMap<String, usize>,
    pub(crate) fixed: Vec<Column>,
    pub(crate) fixed_index: HashMap<String, usize>,
}

impl ParticleStore {
    /// Create an empty store with no attributes and zero particles.
    pub fn new() -> Self {
        Self::default()
    }

    /// Move the store behind an atomic reference count for shared
    /// ownership across consumers. The store is dropped exactly once,
    /// after the last clone is released.
    pub fn into_shared(self) -> Arc<Self> {
        Arc::new(self)
    }

    // === Per-particle attributes ===

    /// Register a per-particle attribute.
    ///
    /// The backing column is zero-initialized for the current particle
    /// count. `Vector` attributes always get tuple width 3 regardless of
    /// the requested count. Fails with [`Error::DuplicateAttribute`] if the
    /// name is already registered in this class.
    pub fn add_attribute(
        &mut self,
        name: &str,
        attr_type: AttributeType,
        count: usize,
    ) -> Result<Attribute> {
        if self.attr_index.contains_key(name) {
            return Err(Error::DuplicateAttribute(name.to_string()));
        }
        let count = attr_type.normalized_count(count);
        if count == 0 {
            return Err(Error::corrupt(format!(
                "attribute \"{name}\" declares a zero tuple width"
            )));
        }
        let attr = Attribute {
            name: name.to_string(),
            attr_type,
            count,
            index: self.attrs.len(),
        };
        self.attr_index.insert(name.to_string(), attr.index);
        self.attrs.push(Column {
            attr: attr.clone(),
            data: vec![0u32; self.particle_count * count],
            strings: StringTable::default(),
        });
        Ok(attr)
    }

    /// Remove a per-particle attribute and drop its column.
    ///
    /// Returns false when the name is not registered. Handles to the
    /// removed attribute and to attributes registered after it go stale;
    /// a stale handle fails resolution instead of aliasing another column.
    pub fn remove_attribute(&mut self, name: &str) -> bool {
        let Some(&i) = self.attr_index.get(name) else {
            return false;
        };
        self.attrs.remove(i);
        self.attr_index.remove(name);
        for (j, col) in self.attrs.iter_mut().enumerate().skip(i) {
            col.attr.index = j;
            self.attr_index.insert(col.attr.name.clone(), j);
        }
        true
    }

    /// Look up a per-particle attribute by name. Never fails.
    pub fn attribute_info(&self, name: &str) -> Option<Attribute> {
        self.attr_index
            .get(name)
            .map(|&i| self.attrs[i].attr.clone())
    }

    /// Look up a per-particle attribute by positional index. Never fails.
    pub fn attribute_info_by_index(&self, index: usize) -> Option<Attribute> {
        self.attrs.get(index).map(|c| c.attr.clone())
    }

    /// Number of registered per-particle attributes.
    #[inline]
    pub fn num_attributes(&self) -> usize {
        self.attrs.len()
    }

    // === Particles ===

    /// Current particle count.
    #[inline]
    pub fn num_particles(&self) -> usize {
        self.particle_count
    }

    /// Append one particle, zero-initialized. Returns its index.
    pub fn add_particle(&mut self) -> usize {
        self.add_particles(1)
    }

    /// Append `n` particles, zero-initialized, extending every per-particle
    /// column. Returns the index of the first new particle. Growth is
    /// amortized (Vec semantics), so repeated single appends stay linear.
    pub fn add_particles(&mut self, n: usize) -> usize {
        let first = self.particle_count;
        self.particle_count += n;
        for col in &mut self.attrs {
            col.data.resize(self.particle_count * col.attr.count, 0);
        }
        first
    }

    /// Remove a whole particle range `[start, start + n)`, shifting later
    /// particles down. Individual attribute values cannot be removed, only
    /// attributes or particle ranges.
    pub fn remove_particles(&mut self, start: usize, n: usize) -> Result<()> {
        let end = start
            .checked_add(n)
            .filter(|&end| end <= self.particle_count)
            .ok_or(Error::OutOfRange {
                index: start.saturating_add(n),
                count: self.particle_count,
            })?;
        for col in &mut self.attrs {
            let width = col.attr.count;
            col.data.drain(start * width..end * width);
        }
        self.particle_count -= n;
        Ok(())
    }

    // === Typed data access ===

    /// Borrow one particle's tuple for the given attribute.
    ///
    /// `T` must match the attribute's storage class (`f32` for
    /// FLOAT/VECTOR, `i32` for INT/INDEXEDSTR), otherwise
    /// [`Error::TypeMismatch`]. A bad particle index is
    /// [`Error::OutOfRange`]. These checks are always on; the per-element
    /// cost is two comparisons on an already-resolved handle.
    pub fn data<T: AttrElement>(&self, attr: &Attribute, particle: usize) -> Result<&[T]> {
        let col = self.column(attr)?;
        check_element::<T>(&col.attr)?;
        if particle >= self.particle_count {
            return Err(Error::OutOfRange {
                index: particle,
                count: self.particle_count,
            });
        }
        let elems: &[T] = bytemuck::cast_slice(&col.data);
        let start = particle * col.attr.count;
        Ok(&elems[start..start + col.attr.count])
    }

    /// Mutably borrow one particle's tuple for the given attribute.
    ///
    /// Same contract as [`data`](Self::data).
    pub fn data_mut<T: AttrElement>(
        &mut self,
        attr: &Attribute,
        particle: usize,
    ) -> Result<&mut [T]> {
        if particle >= self.particle_count {
            return Err(Error::OutOfRange {
                index: particle,
                count: self.particle_count,
            });
        }
        let col = self.column_mut(attr)?;
        check_element::<T>(&col.attr)?;
        let count = col.attr.count;
        let elems: &mut [T] = bytemuck::cast_slice_mut(&mut col.data);
        let start = particle * count;
        Ok(&mut elems[start..start + count])
    }

    // === Indexed strings ===

    /// Register a string in an IndexedStr attribute's dictionary and
    /// return its token. Idempotent: the same string always yields the
    /// same token, stable for the lifetime of the store.
    pub fn register_indexed_str(&mut self, attr: &Attribute, s: &str) -> Result<i32> {
        let col = self.column_mut(attr)?;
        check_indexed(&col.attr)?;
        Ok(col.strings.register(s))
    }

    /// Look up a string token without registering. Pure query: returns
    /// `None` for unknown strings and for non-IndexedStr attributes.
    pub fn lookup_indexed_str(&self, attr: &Attribute, s: &str) -> Option<i32> {
        let col = self.column(attr).ok()?;
        col.strings.lookup(s)
    }

    /// All registered strings of an IndexedStr attribute, ordered by token.
    pub fn indexed_strs(&self, attr: &Attribute) -> Result<&[String]> {
        let col = self.column(attr)?;
        check_indexed(&col.attr)?;
        Ok(col.strings.strings())
    }

    // === Fixed attributes ===

    /// Register a fixed (dataset-level) attribute with a single
    /// zero-initialized value slot. Same contract as
    /// [`add_attribute`](Self::add_attribute), in the fixed class.
    pub fn add_fixed_attribute(
        &mut self,
        name: &str,
        attr_type: AttributeType,
        count: usize,
    ) -> Result<Attribute> {
        if self.fixed_index.contains_key(name) {
            return Err(Error::DuplicateAttribute(name.to_string()));
        }
        let count = attr_type.normalized_count(count);
        if count == 0 {
            return Err(Error::corrupt(format!(
                "fixed attribute \"{name}\" declares a zero tuple width"
            )));
        }
        let attr = Attribute {
            name: name.to_string(),
            attr_type,
            count,
            index: self.fixed.len(),
        };
        self.fixed_index.insert(name.to_string(), attr.index);
        self.fixed.push(Column {
            attr: attr.clone(),
            data: vec![0u32; count],
            strings: StringTable::default(),
        });
        Ok(attr)
    }

    /// Remove a fixed attribute and its value slot. Returns false when
    /// the name is not registered in the fixed class.
    pub fn remove_fixed_attribute(&mut self, name: &str) -> bool {
        let Some(&i) = self.fixed_index.get(name) else {
            return false;
        };
        self.fixed.remove(i);
        self.fixed_index.remove(name);
        for (j, col) in self.fixed.iter_mut().enumerate().skip(i) {
            col.attr.index = j;
            self.fixed_index.insert(col.attr.name.clone(), j);
        }
        true
    }

    /// Look up a fixed attribute by name. Never fails.
    pub fn fixed_attribute_info(&self, name: &str) -> Option<Attribute> {
        self.fixed_index
            .get(name)
            .map(|&i| self.fixed[i].attr.clone())
    }

    /// Look up a fixed attribute by positional index. Never fails.
    pub fn fixed_attribute_info_by_index(&self, index: usize) -> Option<Attribute> {
        self.fixed.get(index).map(|c| c.attr.clone())
    }

    /// Number of registered fixed attributes.
    #[inline]
    pub fn num_fixed_attributes(&self) -> usize {
        self.fixed.len()
    }

    /// Borrow a fixed attribute's single value tuple.
    pub fn fixed_data<T: AttrElement>(&self, attr: &Attribute) -> Result<&[T]> {
        let col = self.fixed_column(attr)?;
        check_element::<T>(&col.attr)?;
        Ok(bytemuck::cast_slice(&col.data))
    }

    /// Mutably borrow a fixed attribute's single value tuple.
    pub fn fixed_data_mut<T: AttrElement>(&mut self, attr: &Attribute) -> Result<&mut [T]> {
        let col = self.fixed_column_mut(attr)?;
        check_element::<T>(&col.attr)?;
        Ok(bytemuck::cast_slice_mut(&mut col.data))
    }

    /// Register a string in a fixed IndexedStr attribute's dictionary.
    pub fn register_fixed_indexed_str(&mut self, attr: &Attribute, s: &str) -> Result<i32> {
        let col = self.fixed_column_mut(attr)?;
        check_indexed(&col.attr)?;
        Ok(col.strings.register(s))
    }

    /// Look up a fixed string token without registering.
    pub fn lookup_fixed_indexed_str(&self, attr: &Attribute, s: &str) -> Option<i32> {
        let col = self.fixed_column(attr).ok()?;
        col.strings.lookup(s)
    }

    /// All registered strings of a fixed IndexedStr attribute.
    pub fn fixed_indexed_strs(&self, attr: &Attribute) -> Result<&[String]> {
        let col = self.fixed_column(attr)?;
        check_indexed(&col.attr)?;
        Ok(col.strings.strings())
    }

    // === Column resolution ===

    pub(crate) fn column(&self, attr: &Attribute) -> Result<&Column> {
        let col = self.attrs.get(attr.index).ok_or(Error::OutOfRange {
            index: attr.index,
            count: self.attrs.len(),
        })?;
        if col.attr.name != attr.name {
            return Err(Error::MissingAttribute(attr.name.clone()));
        }
        Ok(col)
    }

    pub(crate) fn column_mut(&mut self, attr: &Attribute) -> Result<&mut Column> {
        let len = self.attrs.len();
        let col = self.attrs.get_mut(attr.index).ok_or(Error::OutOfRange {
            index: attr.index,
            count: len,
        })?;
        if col.attr.name != attr.name {
            return Err(Error::MissingAttribute(attr.name.clone()));
        }
        Ok(col)
    }

    fn fixed_column(&self, attr: &Attribute) -> Result<&Column> {
        let col = self.fixed.get(attr.index).ok_or(Error::OutOfRange {
            index: attr.index,
            count: self.fixed.len(),
        })?;
        if col.attr.name != attr.name {
            return Err(Error::MissingAttribute(attr.name.clone()));
        }
        Ok(col)
    }

    fn fixed_column_mut(&mut self, attr: &Attribute) -> Result<&mut Column> {
        let len = self.fixed.len();
        let col = self.fixed.get_mut(attr.index).ok_or(Error::OutOfRange {
            index: attr.index,
            count: len,
        })?;
        if col.attr.name != attr.name {
            return Err(Error::MissingAttribute(attr.name.clone()));
        }
        Ok(col)
    }
}

/// Check that `T` matches the attribute's storage class.
fn check_element<T: AttrElement>(attr: &Attribute) -> Result<()> {
    if !T::matches(attr.attr_type) {
        return Err(Error::TypeMismatch {
            name: attr.name.clone(),
            expected: attr.attr_type,
            actual: T::NAME.to_string(),
        });
    }
    Ok(())
}

/// Check that the attribute is IndexedStr.
fn check_indexed(attr: &Attribute) -> Result<()> {
    if attr.attr_type != AttributeType::IndexedStr {
        return Err(Error::TypeMismatch {
            name: attr.name.clone(),
            expected: AttributeType::IndexedStr,
            actual: attr.attr_type.to_string(),
        });
    }
    Ok(())
}
