//! Schema-preserving and deep copies of a store.

use super::store::{Column, ParticleStore};

/// Copy a store's declarations without any particles.
///
/// The result carries every per-particle and fixed attribute (name, type,
/// tuple width, positional index), all indexed-string dictionaries with
/// their token assignments intact, and the fixed attributes' data values.
/// The particle count is zero and every per-particle column is empty.
pub fn clone_schema(src: &ParticleStore) -> ParticleStore {
    let mut dst = ParticleStore::new();
    for col in &src.attrs {
        dst.attrs.push(Column {
            attr: col.attr.clone(),
            data: Vec::new(),
            strings: col.strings.clone(),
        });
    }
    dst.attr_index = src.attr_index.clone();
    for col in &src.fixed {
        dst.fixed.push(Column {
            attr: col.attr.clone(),
            data: col.data.clone(),
            strings: col.strings.clone(),
        });
    }
    dst.fixed_index = src.fixed_index.clone();
    dst
}

/// Copy a store, optionally including its particle data.
///
/// With `with_particles` false this is [`clone_schema`]. With true, every
/// per-particle column is copied verbatim: numeric values bit-for-bit and
/// indexed-string tokens unchanged (the dictionaries are cloned with the
/// schema, so tokens keep their meaning).
pub fn clone(src: &ParticleStore, with_particles: bool) -> ParticleStore {
    let mut dst = clone_schema(src);
    if with_particles {
        dst.particle_count = src.particle_count;
        for (dst_col, src_col) in dst.attrs.iter_mut().zip(&src.attrs) {
            dst_col.data = src_col.data.clone();
        }
    }
    dst
}
