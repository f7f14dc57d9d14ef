//! Legacy text geometry cache (.geo).
//!
//! Classic line-oriented layout:
//!
//! ```text
//! PGEOMETRY V5
//! NPoints 2 NPrims 0
//! NPointGroups 0 NPrimGroups 0
//! NPointAttrib 1 NVertexAttrib 0 NPrimAttrib 0 NAttrib 0
//! PointAttrib
//! life 1 float 0
//! 0 0 0 1 ( 0.5 )
//! 1 2 3 1 ( 1.5 )
//! beginExtra
//! endExtra
//! ```
//!
//! The position is the leading `x y z 1` columns of each point line;
//! declared attributes follow inside parentheses. `index` attributes
//! carry their dictionary inline, quoted. `P` and `width` alias to the
//! canonical `position` and `radius` on read.

use std::io::{BufRead, Write};

use smallvec::SmallVec;

use crate::core::{Attribute, ParticleStore};
use crate::util::{AttributeType, Error, Result};

use super::{canonical_name, find_attr, native_name, read_line};

/// Signature keyword on the first line.
pub(crate) const GEO_KEYWORD: &str = "PGEOMETRY";

/// Read a geo stream into a store.
pub fn read(reader: &mut dyn BufRead, headers_only: bool) -> Result<ParticleStore> {
    let mut line = String::new();

    if !read_line(reader, &mut line)? {
        return Err(Error::mismatch("geo", "empty stream"));
    }
    let mut head = line.split_whitespace();
    if head.next() != Some(GEO_KEYWORD) {
        return Err(Error::mismatch("geo", "missing PGEOMETRY keyword"));
    }

    let npoints = parse_counts(reader, &mut line, "NPoints")?;
    parse_counts(reader, &mut line, "NPointGroups")?;
    let npointattrib = parse_counts(reader, &mut line, "NPointAttrib")?;

    let mut store = ParticleStore::new();
    let position = store.add_attribute("position", AttributeType::Vector, 3)?;

    let mut attrs: Vec<Attribute> = Vec::with_capacity(npointattrib);
    if npointattrib > 0 {
        if !read_line(reader, &mut line)? || line.trim() != "PointAttrib" {
            return Err(Error::corrupt("missing PointAttrib section"));
        }
        for _ in 0..npointattrib {
            if !read_line(reader, &mut line)? {
                return Err(Error::corrupt("truncated attribute table"));
            }
            attrs.push(parse_attrib_line(&mut store, &line)?);
        }
    }

    store.add_particles(npoints);
    if headers_only {
        for _ in 0..npoints {
            if !read_line(reader, &mut line)? {
                return Err(Error::corrupt("truncated point data"));
            }
        }
        return Ok(store);
    }

    let dict_sizes: Vec<usize> = attrs
        .iter()
        .map(|a| match a.attr_type() {
            AttributeType::IndexedStr => store.indexed_strs(a).map(|s| s.len()).unwrap_or(0),
            _ => 0,
        })
        .collect();

    for i in 0..npoints {
        if !read_line(reader, &mut line)? {
            return Err(Error::corrupt(format!(
                "point data ends after {i} of {npoints} rows"
            )));
        }
        let tokens: SmallVec<[&str; 16]> = line
            .split_whitespace()
            .map(|t| t.trim_start_matches('(').trim_end_matches(')'))
            .filter(|t| !t.is_empty())
            .collect();
        let row_width: usize = 4 + attrs.iter().map(|a| a.count()).sum::<usize>();
        if tokens.len() < row_width {
            return Err(Error::corrupt(format!(
                "point row {i} has {} of {row_width} values",
                tokens.len()
            )));
        }
        let x = parse_f32(tokens[0], i)?;
        let y = parse_f32(tokens[1], i)?;
        let z = parse_f32(tokens[2], i)?;
        // tokens[3] is the homogeneous coordinate
        store
            .data_mut::<f32>(&position, i)?
            .copy_from_slice(&[x, y, z]);

        let mut col = 4usize;
        for (attr, &dict_len) in attrs.iter().zip(&dict_sizes) {
            if attr.attr_type().is_float() {
                let out = store.data_mut::<f32>(attr, i)?;
                for v in out.iter_mut() {
                    *v = parse_f32(tokens[col], i)?;
                    col += 1;
                }
            } else {
                let out = store.data_mut::<i32>(attr, i)?;
                for v in out.iter_mut() {
                    let raw: i32 = tokens[col]
                        .parse()
                        .map_err(|_| Error::corrupt(format!(
                            "unparseable value \"{}\" in point row {i}",
                            tokens[col]
                        )))?;
                    if attr.attr_type() == AttributeType::IndexedStr
                        && (raw < 0 || raw as usize >= dict_len)
                    {
                        return Err(Error::corrupt(format!(
                            "token {raw} outside string table of \"{}\"",
                            attr.name()
                        )));
                    }
                    *v = raw;
                    col += 1;
                }
            }
        }
    }

    // trailing sections (beginExtra/endExtra, primitives) are ignored
    Ok(store)
}

/// Parse a `KEY n KEY n ...` counts line, returning the first value and
/// validating the leading keyword.
fn parse_counts(reader: &mut dyn BufRead, line: &mut String, keyword: &str) -> Result<usize> {
    if !read_line(reader, line)? {
        return Err(Error::corrupt(format!("missing {keyword} line")));
    }
    let tokens: Vec<&str> = line.split_whitespace().collect();
    if tokens.len() < 2 || tokens[0] != keyword {
        return Err(Error::corrupt(format!("bad {keyword} line: {}", line.trim())));
    }
    tokens[1]
        .parse()
        .map_err(|_| Error::corrupt(format!("bad {keyword} value: {}", tokens[1])))
}

/// Parse one `name size type ...` attribute-table line.
fn parse_attrib_line(store: &mut ParticleStore, line: &str) -> Result<Attribute> {
    let tokens: Vec<&str> = line.split_whitespace().collect();
    if tokens.len() < 3 {
        return Err(Error::corrupt(format!("bad attribute line: {}", line.trim())));
    }
    let name = canonical_name(tokens[0]).to_string();
    let size: usize = tokens[1]
        .parse()
        .map_err(|_| Error::corrupt(format!("bad attribute size: {}", tokens[1])))?;
    match tokens[2] {
        "float" => {
            let attr_type = if size == 3 {
                AttributeType::Vector
            } else {
                AttributeType::Float
            };
            store.add_attribute(&name, attr_type, size)
        }
        "int" => store.add_attribute(&name, AttributeType::Int, size),
        "index" => {
            let attr = store.add_attribute(&name, AttributeType::IndexedStr, size)?;
            let nstrings: usize = tokens
                .get(3)
                .and_then(|t| t.parse().ok())
                .ok_or_else(|| Error::corrupt("bad index dictionary count"))?;
            if tokens.len() < 4 + nstrings {
                return Err(Error::corrupt(format!(
                    "index attribute \"{name}\" declares {nstrings} strings, found {}",
                    tokens.len() - 4
                )));
            }
            for t in &tokens[4..4 + nstrings] {
                store.register_indexed_str(&attr, t.trim_matches('"'))?;
            }
            Ok(attr)
        }
        other => Err(Error::corrupt(format!("unknown attribute type \"{other}\""))),
    }
}

fn parse_f32(token: &str, row: usize) -> Result<f32> {
    token
        .parse()
        .map_err(|_| Error::corrupt(format!("unparseable value \"{token}\" in point row {row}")))
}

/// Write a store as a geo stream.
pub fn write(writer: &mut dyn Write, store: &ParticleStore) -> Result<()> {
    let mut table: Vec<Attribute> = Vec::new();
    for i in 0..store.num_attributes() {
        let Some(attr) = store.attribute_info_by_index(i) else {
            continue;
        };
        if attr.name() != "position" {
            table.push(attr);
        }
    }
    let position = find_attr(store, &["position"], |a| {
        a.attr_type() == AttributeType::Vector
    });

    let npoints = store.num_particles();
    writeln!(writer, "{GEO_KEYWORD} V5")?;
    writeln!(writer, "NPoints {npoints} NPrims 0")?;
    writeln!(writer, "NPointGroups 0 NPrimGroups 0")?;
    writeln!(
        writer,
        "NPointAttrib {} NVertexAttrib 0 NPrimAttrib 0 NAttrib 0",
        table.len()
    )?;

    if !table.is_empty() {
        writeln!(writer, "PointAttrib")?;
        for attr in &table {
            let name = native_name(attr.name());
            match attr.attr_type() {
                AttributeType::IndexedStr => {
                    let strings = store.indexed_strs(attr)?;
                    let mut entry = format!("{name} {} index {}", attr.count(), strings.len());
                    for s in strings {
                        entry.push_str(&format!(" \"{s}\""));
                    }
                    writeln!(writer, "{entry}")?;
                }
                AttributeType::Int => {
                    let zeros = vec!["0"; attr.count()].join(" ");
                    writeln!(writer, "{name} {} int {zeros}", attr.count())?;
                }
                AttributeType::Float | AttributeType::Vector => {
                    let zeros = vec!["0"; attr.count()].join(" ");
                    writeln!(writer, "{name} {} float {zeros}", attr.count())?;
                }
            }
        }
    }

    for i in 0..npoints {
        let mut row = String::new();
        match &position {
            Some(pos) => {
                for v in store.data::<f32>(pos, i)? {
                    row.push_str(&v.to_string());
                    row.push(' ');
                }
                row.push('1');
            }
            None => row.push_str("0 0 0 1"),
        }
        if !table.is_empty() {
            row.push_str(" (");
            for attr in &table {
                if attr.attr_type().is_float() {
                    for v in store.data::<f32>(attr, i)? {
                        row.push(' ');
                        row.push_str(&v.to_string());
                    }
                } else {
                    for v in store.data::<i32>(attr, i)? {
                        row.push(' ');
                        row.push_str(&v.to_string());
                    }
                }
            }
            row.push_str(" )");
        }
        writeln!(writer, "{row}")?;
    }

    writeln!(writer, "beginExtra")?;
    writeln!(writer, "endExtra")?;
    Ok(())
}
