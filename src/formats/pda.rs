//! Text attribute-table cache (.pda).
//!
//! Attributes are parallel whitespace-delimited columns behind declarative
//! headers:
//!
//! ```text
//! ATTRIBUTES
//! position life id
//! TYPES
//! V R I
//! NUMBER_OF_PARTICLES: 3
//! BEGIN DATA
//! 0 0 0 0.5 7
//! ...
//! ```
//!
//! Type codes: `V` = VECTOR (width 3), `R` = FLOAT (width 1), `I` = INT
//! (width 1). FLOAT attributes with another width and INDEXEDSTR
//! attributes have no representation here; the writer drops them with a
//! warning.

use std::io::{BufRead, Write};

use tracing::warn;

use crate::core::{Attribute, ParticleStore};
use crate::util::{AttributeType, Error, Result};

use super::{canonical_name, read_line};

fn code_for(attr: &Attribute) -> Option<char> {
    match attr.attr_type() {
        AttributeType::Vector => Some('V'),
        AttributeType::Float if attr.count() == 1 => Some('R'),
        AttributeType::Int if attr.count() == 1 => Some('I'),
        _ => None,
    }
}

/// Read a pda stream into a store.
pub fn read(reader: &mut dyn BufRead, headers_only: bool) -> Result<ParticleStore> {
    let mut line = String::new();

    if !read_line(reader, &mut line)? || line.trim() != "ATTRIBUTES" {
        return Err(Error::mismatch("pda", "missing ATTRIBUTES header"));
    }
    read_line(reader, &mut line)?;
    let names: Vec<String> = line
        .split_whitespace()
        .map(|n| canonical_name(n).to_string())
        .collect();

    if !read_line(reader, &mut line)? || line.trim() != "TYPES" {
        return Err(Error::corrupt("missing TYPES header"));
    }
    read_line(reader, &mut line)?;
    let codes: Vec<String> = line.split_whitespace().map(str::to_string).collect();
    if codes.len() != names.len() {
        return Err(Error::corrupt(format!(
            "{} attribute names but {} type codes",
            names.len(),
            codes.len()
        )));
    }

    if !read_line(reader, &mut line)? {
        return Err(Error::corrupt("missing NUMBER_OF_PARTICLES line"));
    }
    let num_particles = line
        .trim()
        .strip_prefix("NUMBER_OF_PARTICLES:")
        .map(str::trim)
        .and_then(|n| n.parse::<usize>().ok())
        .ok_or_else(|| Error::corrupt(format!("bad particle count line: {}", line.trim())))?;

    if !read_line(reader, &mut line)? || line.trim() != "BEGIN DATA" {
        return Err(Error::corrupt("missing BEGIN DATA line"));
    }

    let mut store = ParticleStore::new();
    let mut attrs = Vec::with_capacity(names.len());
    for (name, code) in names.iter().zip(&codes) {
        let attr_type = match code.as_str() {
            "V" => AttributeType::Vector,
            "R" => AttributeType::Float,
            "I" => AttributeType::Int,
            other => {
                return Err(Error::corrupt(format!("unknown type code \"{other}\"")));
            }
        };
        attrs.push(store.add_attribute(name, attr_type, 1)?);
    }
    store.add_particles(num_particles);

    if headers_only {
        return Ok(store);
    }

    let row_width: usize = attrs.iter().map(|a| a.count()).sum();
    for i in 0..num_particles {
        if !read_line(reader, &mut line)? {
            return Err(Error::corrupt(format!(
                "data ends after {i} of {num_particles} rows"
            )));
        }
        let tokens: Vec<&str> = line.split_whitespace().collect();
        if tokens.len() < row_width {
            return Err(Error::corrupt(format!(
                "row {i} has {} of {row_width} values",
                tokens.len()
            )));
        }
        let mut col = 0usize;
        for attr in &attrs {
            if attr.attr_type().is_float() {
                let out = store.data_mut::<f32>(attr, i)?;
                for v in out.iter_mut() {
                    *v = parse_token(tokens[col], i)?;
                    col += 1;
                }
            } else {
                let out = store.data_mut::<i32>(attr, i)?;
                for v in out.iter_mut() {
                    *v = parse_token(tokens[col], i)?;
                    col += 1;
                }
            }
        }
    }

    Ok(store)
}

fn parse_token<T: std::str::FromStr>(token: &str, row: usize) -> Result<T> {
    token
        .parse()
        .map_err(|_| Error::corrupt(format!("unparseable value \"{token}\" in row {row}")))
}

/// Write a store as a pda stream.
pub fn write(writer: &mut dyn Write, store: &ParticleStore) -> Result<()> {
    let mut attrs = Vec::new();
    let mut codes = Vec::new();
    for i in 0..store.num_attributes() {
        let Some(attr) = store.attribute_info_by_index(i) else {
            continue;
        };
        match code_for(&attr) {
            Some(code) => {
                codes.push(code);
                attrs.push(attr);
            }
            None => warn!(
                attribute = attr.name(),
                "attribute has no pda representation, dropping"
            ),
        }
    }

    writeln!(writer, "ATTRIBUTES")?;
    let names: Vec<&str> = attrs.iter().map(|a| a.name()).collect();
    writeln!(writer, "{}", names.join(" "))?;
    writeln!(writer, "TYPES")?;
    let codes: Vec<String> = codes.iter().map(|c| c.to_string()).collect();
    writeln!(writer, "{}", codes.join(" "))?;
    writeln!(writer, "NUMBER_OF_PARTICLES: {}", store.num_particles())?;
    writeln!(writer, "BEGIN DATA")?;

    for i in 0..store.num_particles() {
        let mut row = String::new();
        for attr in &attrs {
            if attr.attr_type().is_float() {
                for v in store.data::<f32>(attr, i)? {
                    if !row.is_empty() {
                        row.push(' ');
                    }
                    row.push_str(&v.to_string());
                }
            } else {
                for v in store.data::<i32>(attr, i)? {
                    if !row.is_empty() {
                        row.push(' ');
                    }
                    row.push_str(&v.to_string());
                }
            }
        }
        writeln!(writer, "{row}")?;
    }

    Ok(())
}
