//! Scene-description output (.rib, write-only).
//!
//! Emits a `Points` directive from the store's position attribute
//! (accepting either the `position` or `P` spelling), a per-point
//! `width` array when a `radius`/`width` attribute exists (constant
//! width 1 otherwise), and a two-sample motion block bracketing the unit
//! interval when a `positionNext` attribute is present.

use std::io::Write;

use crate::core::{Attribute, ParticleStore};
use crate::util::{AttributeType, Error, Result};

use super::find_attr;

/// Write a store as a RIB fragment.
pub fn write(writer: &mut dyn Write, store: &ParticleStore) -> Result<()> {
    let position = find_attr(store, &["position", "P"], |a| {
        a.attr_type().is_float() && a.count() == 3
    })
    .ok_or_else(|| Error::MissingAttribute("position".to_string()))?;
    let next = find_attr(store, &["positionNext"], |a| {
        a.attr_type().is_float() && a.count() == 3
    });
    let width = find_attr(store, &["radius", "width"], |a| {
        a.attr_type() == AttributeType::Float && a.count() == 1
    });

    writeln!(writer, "##RenderMan RIB")?;
    writeln!(writer, "version 3.03")?;

    if next.is_some() {
        writeln!(writer, "MotionBegin [0 1]")?;
    }
    write_points(writer, store, &position, width.as_ref())?;
    if let Some(next) = &next {
        write_points(writer, store, next, width.as_ref())?;
        writeln!(writer, "MotionEnd")?;
    }
    Ok(())
}

fn write_points(
    writer: &mut dyn Write,
    store: &ParticleStore,
    position: &Attribute,
    width: Option<&Attribute>,
) -> Result<()> {
    write!(writer, "Points \"P\" [")?;
    for v in store.view::<f32>(position)?.as_slice() {
        write!(writer, " {v}")?;
    }
    write!(writer, " ]")?;
    match width {
        Some(w) => {
            write!(writer, " \"width\" [")?;
            for v in store.view::<f32>(w)?.as_slice() {
                write!(writer, " {v}")?;
            }
            writeln!(writer, " ]")?;
        }
        None => writeln!(writer, " \"constantwidth\" [1]")?,
    }
    Ok(())
}
