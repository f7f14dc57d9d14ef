//! Format codecs - one reader/writer pair per on-disk cache format.
//!
//! Every codec consumes/produces a [`ParticleStore`](crate::core::ParticleStore)
//! through the public schema API and speaks a plain `BufRead`/`Write`;
//! gzip framing and extension dispatch live in [`crate::io`].
//!
//! - [`pdb`] - proprietary binary particle cache
//! - [`pda`] - text attribute-table cache
//! - [`bgeo`] - tagged binary geometry cache (modern v5 + legacy fallback)
//! - [`geo`] - legacy text geometry cache
//! - [`pts`] - fixed 7-column point scan (read-only)
//! - [`rib`] - scene-description output (write-only)

use std::io::BufRead;

use crate::core::{Attribute, ParticleStore};
use crate::util::Result;

pub mod bgeo;
pub mod geo;
pub mod pda;
pub mod pdb;
pub mod pts;
pub mod rib;

/// Map a format-native attribute name to its canonical in-memory form.
///
/// The canonical names are always the long forms: `P` is stored as
/// `position` and `width` as `radius`.
pub(crate) fn canonical_name(name: &str) -> &str {
    match name {
        "P" => "position",
        "width" => "radius",
        _ => name,
    }
}

/// Map a canonical attribute name back to the geometry formats' spelling.
pub(crate) fn native_name(name: &str) -> &str {
    match name {
        "radius" => "width",
        _ => name,
    }
}

/// Read one line into `buf`, returning false at end of stream.
pub(crate) fn read_line(reader: &mut dyn BufRead, buf: &mut String) -> Result<bool> {
    buf.clear();
    let n = reader.read_line(buf)?;
    Ok(n > 0)
}

/// Find the first attribute matching one of `names` and the predicate.
pub(crate) fn find_attr(
    store: &ParticleStore,
    names: &[&str],
    pred: impl Fn(&Attribute) -> bool,
) -> Option<Attribute> {
    names
        .iter()
        .filter_map(|n| store.attribute_info(n))
        .find(pred)
}
