//! Identifier-keyed merge of two stores.

use std::collections::HashMap;

use tracing::warn;

use crate::util::{AttributeType, Error, Result};

use super::attribute::Attribute;
use super::store::ParticleStore;

/// One delta attribute paired with its base counterpart.
struct SharedAttr {
    src: Attribute,
    dst: Attribute,
    /// delta token -> base token, for IndexedStr pairs
    token_map: Option<Vec<i32>>,
}

/// Apply `delta` onto `base`, keyed by the named identifier attribute.
///
/// Delta particles whose identifier value matches a base particle
/// overwrite that particle's values for every attribute the two stores
/// share by name (same type and tuple width); all other delta particles
/// are appended to base. Attributes present on only one side do not flow;
/// a shared name with a mismatched type or width is skipped with a
/// warning. IndexedStr values are re-registered into base's dictionary,
/// so tokens are remapped, never copied raw.
///
/// The identifier must be INT width 1 on both sides when present on both.
/// When either side lacks it, every delta particle appends. Duplicated
/// identifier values resolve first-match: the first base occurrence is
/// the overwrite target, and delta rows apply in order (the last one
/// wins).
pub fn merge(base: &mut ParticleStore, delta: &ParticleStore, id_name: &str) -> Result<()> {
    let mut shared = Vec::new();
    for i in 0..delta.num_attributes() {
        let Some(src) = delta.attribute_info_by_index(i) else {
            continue;
        };
        let Some(dst) = base.attribute_info(src.name()) else {
            continue;
        };
        if dst.attr_type() != src.attr_type() || dst.count() != src.count() {
            warn!(
                attribute = src.name(),
                "skipping merge of attribute with mismatched declaration"
            );
            continue;
        }
        let token_map = if src.attr_type() == AttributeType::IndexedStr {
            let strings = delta.indexed_strs(&src)?;
            let mut map = Vec::with_capacity(strings.len());
            for s in strings {
                map.push(base.register_indexed_str(&dst, s)?);
            }
            Some(map)
        } else {
            None
        };
        shared.push(SharedAttr { src, dst, token_map });
    }

    // Identifier index over base, first occurrence wins.
    let mut index: HashMap<i32, usize> = HashMap::new();
    let keyed = match (base.attribute_info(id_name), delta.attribute_info(id_name)) {
        (Some(b), Some(d)) => {
            for attr in [&b, &d] {
                if attr.attr_type() != AttributeType::Int || attr.count() != 1 {
                    return Err(Error::TypeMismatch {
                        name: id_name.to_string(),
                        expected: AttributeType::Int,
                        actual: format!("{}[{}]", attr.attr_type(), attr.count()),
                    });
                }
            }
            let ids = base.view::<i32>(&b)?;
            for (i, tuple) in ids.iter().enumerate() {
                index.entry(tuple[0]).or_insert(i);
            }
            Some(d)
        }
        _ => None,
    };

    for j in 0..delta.num_particles() {
        let target = match &keyed {
            Some(delta_id) => {
                let id_val = delta.data::<i32>(delta_id, j)?[0];
                match index.get(&id_val) {
                    Some(&i) => i,
                    None => {
                        let appended = base.add_particle();
                        index.insert(id_val, appended);
                        appended
                    }
                }
            }
            None => base.add_particle(),
        };

        for pair in &shared {
            if pair.src.attr_type().is_float() {
                let values = delta.data::<f32>(&pair.src, j)?.to_vec();
                base.data_mut::<f32>(&pair.dst, target)?
                    .copy_from_slice(&values);
            } else {
                let mut values = delta.data::<i32>(&pair.src, j)?.to_vec();
                if let Some(map) = &pair.token_map {
                    for v in &mut values {
                        let token = *v as usize;
                        if token >= map.len() {
                            return Err(Error::corrupt(format!(
                                "token {} outside string table of \"{}\"",
                                v,
                                pair.src.name()
                            )));
                        }
                        *v = map[token];
                    }
                }
                base.data_mut::<i32>(&pair.dst, target)?
                    .copy_from_slice(&values);
            }
        }
    }

    Ok(())
}
