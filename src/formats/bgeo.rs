//! Tagged binary geometry cache (.bgeo).
//!
//! Big-endian throughout. The modern layout is version 5: a counted
//! header block, a per-attribute table with typed default tuples and
//! index-string dictionaries, then one tightly packed record per point
//! starting with a homogeneous 4-float position. Older caches (version
//! byte 1-4 in place of the `V` tag) lack dictionaries and store bare
//! 3-float positions; the reader falls back to that layout transparently
//! when the modern header is rejected. The writer always emits version 5.

use std::io::{BufRead, Read, Write};

use byteorder::{BigEndian, ReadBytesExt, WriteBytesExt};
use smallvec::SmallVec;
use tracing::warn;

use crate::core::{Attribute, ParticleStore};
use crate::io::stream::skip_bytes;
use crate::util::{AttributeType, Error, Result};

use super::{canonical_name, native_name};

/// Magic bytes at the start of the file.
pub(crate) const BGEO_MAGIC: &[u8; 4] = b"Bgeo";

/// Version tag byte of the modern layout.
const VERSION_TAG: u8 = b'V';

/// Modern format version.
const BGEO_VERSION: i32 = 5;

/// Attribute type tags in the point-attribute table.
const HTYPE_FLOAT: i32 = 0;
const HTYPE_INT: i32 = 1;
const HTYPE_INDEX: i32 = 5;

/// Read a length-prefixed (u16, big-endian) string.
fn read_hstring(reader: &mut dyn BufRead) -> Result<String> {
    let len = reader.read_u16::<BigEndian>()? as usize;
    let mut bytes = vec![0u8; len];
    reader.read_exact(&mut bytes)?;
    String::from_utf8(bytes).map_err(|e| Error::corrupt(format!("invalid UTF-8 in name: {e}")))
}

fn write_hstring(writer: &mut dyn Write, s: &str) -> Result<()> {
    writer.write_u16::<BigEndian>(s.len() as u16)?;
    writer.write_all(s.as_bytes())?;
    Ok(())
}

fn read_count(reader: &mut dyn BufRead, what: &str) -> Result<usize> {
    let v = reader.read_i32::<BigEndian>()?;
    if v < 0 {
        return Err(Error::corrupt(format!("negative {what} count {v}")));
    }
    Ok(v as usize)
}

/// Read a bgeo stream into a store.
///
/// Tries the modern parser first; a `Bgeo` magic with a legacy version
/// byte where the `V` tag belongs routes to the legacy decoder inside
/// this same call. Any other header is a format mismatch.
pub fn read(reader: &mut dyn BufRead, headers_only: bool) -> Result<ParticleStore> {
    let mut magic = [0u8; 4];
    reader.read_exact(&mut magic)?;
    if &magic != BGEO_MAGIC {
        return Err(Error::mismatch("bgeo", format!("bad magic {magic:02x?}")));
    }
    let tag = reader.read_u8()?;
    if tag == VERSION_TAG {
        let version = reader.read_i32::<BigEndian>()?;
        if version != BGEO_VERSION {
            return Err(Error::mismatch(
                "bgeo",
                format!("unsupported version {version}"),
            ));
        }
        read_modern(reader, headers_only)
    } else if (1..=4).contains(&tag) {
        warn!(version = tag, "modern bgeo header rejected, using legacy decode");
        read_legacy(reader, headers_only)
    } else {
        Err(Error::mismatch("bgeo", format!("bad version tag 0x{tag:02x}")))
    }
}

fn read_modern(reader: &mut dyn BufRead, headers_only: bool) -> Result<ParticleStore> {
    let npoints = read_count(reader, "point")?;
    let _nprims = read_count(reader, "primitive")?;
    let _npointgroups = read_count(reader, "point group")?;
    let _nprimgroups = read_count(reader, "primitive group")?;
    let npointattrib = read_count(reader, "point attribute")?;
    let _nvertexattrib = read_count(reader, "vertex attribute")?;
    let _nprimattrib = read_count(reader, "primitive attribute")?;
    let _nattrib = read_count(reader, "detail attribute")?;

    let mut store = ParticleStore::new();
    let position = store.add_attribute("position", AttributeType::Vector, 3)?;

    let mut attrs: Vec<Attribute> = Vec::with_capacity(npointattrib);
    for _ in 0..npointattrib {
        let raw_name = read_hstring(reader)?;
        let name = canonical_name(&raw_name).to_string();
        let size = read_count(reader, "attribute size")?;
        let htype = reader.read_i32::<BigEndian>()?;
        let attr = match htype {
            HTYPE_INDEX => {
                let attr = store.add_attribute(&name, AttributeType::IndexedStr, size)?;
                let nstrings = read_count(reader, "dictionary")?;
                for _ in 0..nstrings {
                    let s = read_hstring(reader)?;
                    store.register_indexed_str(&attr, &s)?;
                }
                attr
            }
            HTYPE_FLOAT => {
                let attr_type = if size == 3 {
                    AttributeType::Vector
                } else {
                    AttributeType::Float
                };
                let attr = store.add_attribute(&name, attr_type, size)?;
                skip_bytes(reader, (size * 4) as u64)?; // defaults
                attr
            }
            HTYPE_INT => {
                let attr = store.add_attribute(&name, AttributeType::Int, size)?;
                skip_bytes(reader, (size * 4) as u64)?; // defaults
                attr
            }
            other => {
                return Err(Error::corrupt(format!(
                    "unknown attribute type {other} for \"{raw_name}\""
                )));
            }
        };
        attrs.push(attr);
    }

    store.add_particles(npoints);
    if headers_only {
        let stride: usize = 16 + attrs.iter().map(|a| a.count() * 4).sum::<usize>();
        skip_bytes(reader, (npoints * stride) as u64)?;
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
        let x = reader.read_f32::<BigEndian>()?;
        let y = reader.read_f32::<BigEndian>()?;
        let z = reader.read_f32::<BigEndian>()?;
        let _w = reader.read_f32::<BigEndian>()?;
        store
            .data_mut::<f32>(&position, i)?
            .copy_from_slice(&[x, y, z]);
        for (attr, &dict_len) in attrs.iter().zip(&dict_sizes) {
            read_point_values(reader, &mut store, attr, i, dict_len)?;
        }
    }

    Ok(store)
}

fn read_legacy(reader: &mut dyn BufRead, headers_only: bool) -> Result<ParticleStore> {
    let npoints = read_count(reader, "point")?;
    let npointattrib = read_count(reader, "point attribute")?;

    let mut store = ParticleStore::new();
    let position = store.add_attribute("position", AttributeType::Vector, 3)?;

    let mut attrs: Vec<Attribute> = Vec::with_capacity(npointattrib);
    for _ in 0..npointattrib {
        let raw_name = read_hstring(reader)?;
        let name = canonical_name(&raw_name).to_string();
        let size = read_count(reader, "attribute size")?;
        let htype = reader.read_i32::<BigEndian>()?;
        let attr_type = match htype {
            HTYPE_FLOAT => {
                if size == 3 {
                    AttributeType::Vector
                } else {
                    AttributeType::Float
                }
            }
            HTYPE_INT => AttributeType::Int,
            other => {
                return Err(Error::corrupt(format!(
                    "unknown legacy attribute type {other} for \"{raw_name}\""
                )));
            }
        };
        attrs.push(store.add_attribute(&name, attr_type, size)?);
    }

    store.add_particles(npoints);
    if headers_only {
        let stride: usize = 12 + attrs.iter().map(|a| a.count() * 4).sum::<usize>();
        skip_bytes(reader, (npoints * stride) as u64)?;
        return Ok(store);
    }

    for i in 0..npoints {
        let x = reader.read_f32::<BigEndian>()?;
        let y = reader.read_f32::<BigEndian>()?;
        let z = reader.read_f32::<BigEndian>()?;
        store
            .data_mut::<f32>(&position, i)?
            .copy_from_slice(&[x, y, z]);
        for attr in &attrs {
            read_point_values(reader, &mut store, attr, i, 0)?;
        }
    }

    Ok(store)
}

fn read_point_values(
    reader: &mut dyn BufRead,
    store: &mut ParticleStore,
    attr: &Attribute,
    particle: usize,
    dict_len: usize,
) -> Result<()> {
    if attr.attr_type().is_float() {
        let mut values: SmallVec<[f32; 4]> = SmallVec::with_capacity(attr.count());
        for _ in 0..attr.count() {
            values.push(reader.read_f32::<BigEndian>()?);
        }
        store.data_mut::<f32>(attr, particle)?.copy_from_slice(&values);
    } else {
        let mut values: SmallVec<[i32; 4]> = SmallVec::with_capacity(attr.count());
        for _ in 0..attr.count() {
            let raw = reader.read_i32::<BigEndian>()?;
            if attr.attr_type() == AttributeType::IndexedStr
                && (raw < 0 || raw as usize >= dict_len)
            {
                return Err(Error::corrupt(format!(
                    "token {raw} outside string table of \"{}\"",
                    attr.name()
                )));
            }
            values.push(raw);
        }
        store.data_mut::<i32>(attr, particle)?.copy_from_slice(&values);
    }
    Ok(())
}

/// Write a store as a modern (version 5) bgeo stream.
pub fn write(writer: &mut dyn Write, store: &ParticleStore) -> Result<()> {
    writer.write_all(BGEO_MAGIC)?;
    writer.write_u8(VERSION_TAG)?;
    writer.write_i32::<BigEndian>(BGEO_VERSION)?;

    let mut table: Vec<Attribute> = Vec::new();
    for i in 0..store.num_attributes() {
        let Some(attr) = store.attribute_info_by_index(i) else {
            continue;
        };
        if attr.name() != "position" {
            table.push(attr);
        }
    }

    let npoints = store.num_particles();
    writer.write_i32::<BigEndian>(npoints as i32)?;
    writer.write_i32::<BigEndian>(0)?; // nprims
    writer.write_i32::<BigEndian>(0)?; // npointgroups
    writer.write_i32::<BigEndian>(0)?; // nprimgroups
    writer.write_i32::<BigEndian>(table.len() as i32)?;
    writer.write_i32::<BigEndian>(0)?; // nvertexattrib
    writer.write_i32::<BigEndian>(0)?; // nprimattrib
    writer.write_i32::<BigEndian>(0)?; // nattrib

    for attr in &table {
        write_hstring(writer, native_name(attr.name()))?;
        writer.write_i32::<BigEndian>(attr.count() as i32)?;
        match attr.attr_type() {
            AttributeType::IndexedStr => {
                writer.write_i32::<BigEndian>(HTYPE_INDEX)?;
                let strings = store.indexed_strs(attr)?;
                writer.write_i32::<BigEndian>(strings.len() as i32)?;
                for s in strings {
                    write_hstring(writer, s)?;
                }
            }
            AttributeType::Int => {
                writer.write_i32::<BigEndian>(HTYPE_INT)?;
                for _ in 0..attr.count() {
                    writer.write_i32::<BigEndian>(0)?; // default
                }
            }
            AttributeType::Float | AttributeType::Vector => {
                writer.write_i32::<BigEndian>(HTYPE_FLOAT)?;
                for _ in 0..attr.count() {
                    writer.write_f32::<BigEndian>(0.0)?; // default
                }
            }
        }
    }

    let position = super::find_attr(store, &["position"], |a| {
        a.attr_type() == AttributeType::Vector
    });
    for i in 0..npoints {
        match &position {
            Some(pos) => {
                let p = store.data::<f32>(pos, i)?;
                writer.write_f32::<BigEndian>(p[0])?;
                writer.write_f32::<BigEndian>(p[1])?;
                writer.write_f32::<BigEndian>(p[2])?;
            }
            None => {
                for _ in 0..3 {
                    writer.write_f32::<BigEndian>(0.0)?;
                }
            }
        }
        writer.write_f32::<BigEndian>(1.0)?; // homogeneous w

        for attr in &table {
            if attr.attr_type().is_float() {
                for v in store.data::<f32>(attr, i)? {
                    writer.write_f32::<BigEndian>(*v)?;
                }
            } else {
                for v in store.data::<i32>(attr, i)? {
                    writer.write_i32::<BigEndian>(*v)?;
                }
            }
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn sample() -> ParticleStore {
        let mut store = ParticleStore::new();
        let pos = store
            .add_attribute("position", AttributeType::Vector, 3)
            .unwrap();
        let radius = store
            .add_attribute("radius", AttributeType::Float, 1)
            .unwrap();
        let kind = store
            .add_attribute("kind", AttributeType::IndexedStr, 1)
            .unwrap();
        store.add_particles(2);
        let a = store.register_indexed_str(&kind, "dust").unwrap();
        let b = store.register_indexed_str(&kind, "ember").unwrap();
        for i in 0..2 {
            store
                .data_mut::<f32>(&pos, i)
                .unwrap()
                .copy_from_slice(&[i as f32, -2.0, 0.5]);
            store.data_mut::<f32>(&radius, i).unwrap()[0] = 0.1 * (i + 1) as f32;
            store.data_mut::<i32>(&kind, i).unwrap()[0] = if i == 0 { a } else { b };
        }
        store
    }

    #[test]
    fn test_roundtrip_in_memory() {
        let store = sample();
        let mut bytes = Vec::new();
        write(&mut bytes, &store).unwrap();

        let mut cur = Cursor::new(bytes);
        let back = read(&mut cur, false).unwrap();
        assert_eq!(back.num_particles(), 2);
        assert_eq!(back.num_attributes(), 3);

        let pos = back.attribute_info("position").unwrap();
        assert_eq!(back.data::<f32>(&pos, 1).unwrap(), &[1.0, -2.0, 0.5]);
        // radius went to disk as "width" and came back canonical
        let radius = back.attribute_info("radius").unwrap();
        assert_eq!(back.data::<f32>(&radius, 0).unwrap()[0], 0.1);
        let kind = back.attribute_info("kind").unwrap();
        assert_eq!(back.indexed_strs(&kind).unwrap(), &["dust", "ember"]);
        assert_eq!(back.data::<i32>(&kind, 1).unwrap()[0], 1);
    }

    #[test]
    fn test_headers_only_skips_payload() {
        let store = sample();
        let mut bytes = Vec::new();
        write(&mut bytes, &store).unwrap();
        let payload_len = bytes.len();

        let mut cur = Cursor::new(bytes);
        let headers = read(&mut cur, true).unwrap();
        assert_eq!(headers.num_particles(), 2);
        assert_eq!(headers.num_attributes(), 3);
        let pos = headers.attribute_info("position").unwrap();
        assert_eq!(headers.data::<f32>(&pos, 1).unwrap(), &[0.0, 0.0, 0.0]);
        // the skip consumed the whole point payload
        assert_eq!(cur.position() as usize, payload_len);
    }

    fn legacy_bytes() -> Vec<u8> {
        let mut bytes = Vec::new();
        bytes.extend_from_slice(BGEO_MAGIC);
        bytes.push(3); // legacy version byte where 'V' would be
        bytes.write_i32::<BigEndian>(2).unwrap(); // npoints
        bytes.write_i32::<BigEndian>(1).unwrap(); // npointattrib
        // attribute: life, size 1, float
        bytes.write_u16::<BigEndian>(4).unwrap();
        bytes.extend_from_slice(b"life");
        bytes.write_i32::<BigEndian>(1).unwrap();
        bytes.write_i32::<BigEndian>(HTYPE_FLOAT).unwrap();
        // two points: 3 floats position + 1 float life
        for i in 0..2 {
            bytes.write_f32::<BigEndian>(i as f32).unwrap();
            bytes.write_f32::<BigEndian>(2.0).unwrap();
            bytes.write_f32::<BigEndian>(3.0).unwrap();
            bytes.write_f32::<BigEndian>(0.5 + i as f32).unwrap();
        }
        bytes
    }

    #[test]
    fn test_legacy_fallback() {
        let mut cur = Cursor::new(legacy_bytes());
        let store = read(&mut cur, false).unwrap();
        assert_eq!(store.num_particles(), 2);
        let pos = store.attribute_info("position").unwrap();
        assert_eq!(store.data::<f32>(&pos, 1).unwrap(), &[1.0, 2.0, 3.0]);
        let life = store.attribute_info("life").unwrap();
        assert_eq!(store.data::<f32>(&life, 1).unwrap()[0], 1.5);
    }

    #[test]
    fn test_legacy_headers_only() {
        let mut cur = Cursor::new(legacy_bytes());
        let store = read(&mut cur, true).unwrap();
        assert_eq!(store.num_particles(), 2);
        assert!(store.attribute_info("life").is_some());
    }

    #[test]
    fn test_bad_magic() {
        let mut cur = Cursor::new(b"NotAGeo\0\0\0\0\0".to_vec());
        assert!(matches!(
            read(&mut cur, false),
            Err(Error::FormatMismatch { format: "bgeo", .. })
        ));
    }

    #[test]
    fn test_unsupported_version() {
        let mut bytes = Vec::new();
        bytes.extend_from_slice(BGEO_MAGIC);
        bytes.push(VERSION_TAG);
        bytes.write_i32::<BigEndian>(9).unwrap();
        let mut cur = Cursor::new(bytes);
        assert!(matches!(
            read(&mut cur, false),
            Err(Error::FormatMismatch { format: "bgeo", .. })
        ));
    }

    #[test]
    fn test_empty_store_roundtrip() {
        let mut store = ParticleStore::new();
        store
            .add_attribute("velocity", AttributeType::Vector, 3)
            .unwrap();
        let mut bytes = Vec::new();
        write(&mut bytes, &store).unwrap();

        let mut cur = Cursor::new(bytes);
        let back = read(&mut cur, false).unwrap();
        assert_eq!(back.num_particles(), 0);
        assert!(back.attribute_info("velocity").is_some());
    }
}
