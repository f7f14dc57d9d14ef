//! Fixed 7-column point scan (.pts, read-only).
//!
//! No header and no signature: each line is `x y z m r g b` where `m` is
//! an ignored magic column and r/g/b are 8-bit color values. Positions are
//! stored with y and z swapped relative to the file order, colors scaled
//! to 0..1, and every accepted row gets an auto-incrementing `id`. Lines
//! that do not yield exactly seven numeric tokens are skipped.

use std::io::BufRead;

use tracing::debug;

use crate::core::ParticleStore;
use crate::util::{AttributeType, Result};

use super::read_line;

/// Read a pts stream into a store.
pub fn read(reader: &mut dyn BufRead, headers_only: bool) -> Result<ParticleStore> {
    let mut store = ParticleStore::new();
    let position = store.add_attribute("position", AttributeType::Vector, 3)?;
    let color = store.add_attribute("color", AttributeType::Vector, 3)?;
    let id = store.add_attribute("id", AttributeType::Int, 1)?;

    let mut line = String::new();
    let mut row = 0usize;
    let mut accepted = 0usize;
    while read_line(reader, &mut line)? {
        row += 1;
        let mut values = [0f32; 7];
        let mut n = 0usize;
        let mut ok = true;
        for token in line.split_whitespace() {
            if n == 7 {
                ok = false;
                break;
            }
            match token.parse::<f32>() {
                Ok(v) => {
                    values[n] = v;
                    n += 1;
                }
                Err(_) => {
                    ok = false;
                    break;
                }
            }
        }
        if !ok || n != 7 {
            if !line.trim().is_empty() {
                debug!(row, "skipping malformed pts line");
            }
            continue;
        }

        if headers_only {
            accepted += 1;
            continue;
        }

        let i = store.add_particle();
        // file order is x y z; storage swaps y/z
        store
            .data_mut::<f32>(&position, i)?
            .copy_from_slice(&[values[0], values[2], values[1]]);
        store.data_mut::<f32>(&color, i)?.copy_from_slice(&[
            values[4] / 255.0,
            values[5] / 255.0,
            values[6] / 255.0,
        ]);
        store.data_mut::<i32>(&id, i)?[0] = i as i32;
    }

    if headers_only {
        store.add_particles(accepted);
    }
    Ok(store)
}
