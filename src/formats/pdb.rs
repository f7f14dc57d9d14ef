//! Proprietary binary particle cache (.pdb).
//!
//! Layout: a fixed little-endian header followed by streamed per-channel
//! blocks, each a channel header (NUL-terminated name, type tag, tuple
//! width, optional string dictionary) and its tightly packed column-major
//! payload. Files written on a big-endian host carry the same layout with
//! every multi-byte field byte-swapped; the reader detects this from the
//! magic word and swaps transparently.

use std::io::{BufRead, Write};

use byteorder::{BigEndian, ByteOrder, LittleEndian, ReadBytesExt, WriteBytesExt};

use crate::core::ParticleStore;
use crate::io::stream::{read_cstring, skip_bytes};
use crate::util::{AttributeType, Error, Result};

/// Magic constant at offset 0.
pub(crate) const PDB_MAGIC: u32 = 670;

/// Format version written by this implementation.
const PDB_VERSION: f32 = 1.0;

/// Value of the header swap word in the file's own byte order.
const PDB_NO_SWAP: u32 = 1;

/// Channel type tags.
const TAG_FLOAT: u32 = 0;
const TAG_VECTOR: u32 = 1;
const TAG_INT: u32 = 2;
const TAG_INDEXEDSTR: u32 = 3;

fn tag_for(attr_type: AttributeType) -> u32 {
    match attr_type {
        AttributeType::Float => TAG_FLOAT,
        AttributeType::Vector => TAG_VECTOR,
        AttributeType::Int => TAG_INT,
        AttributeType::IndexedStr => TAG_INDEXEDSTR,
    }
}

fn type_for(tag: u32) -> Result<AttributeType> {
    match tag {
        TAG_FLOAT => Ok(AttributeType::Float),
        TAG_VECTOR => Ok(AttributeType::Vector),
        TAG_INT => Ok(AttributeType::Int),
        TAG_INDEXEDSTR => Ok(AttributeType::IndexedStr),
        _ => Err(Error::corrupt(format!("unknown pdb channel type {tag}"))),
    }
}

/// Read a pdb stream into a store.
pub fn read(reader: &mut dyn BufRead, headers_only: bool) -> Result<ParticleStore> {
    let magic = reader.read_u32::<LittleEndian>()?;
    if magic == PDB_MAGIC {
        read_body::<LittleEndian>(reader, headers_only)
    } else if magic.swap_bytes() == PDB_MAGIC {
        read_body::<BigEndian>(reader, headers_only)
    } else {
        Err(Error::mismatch("pdb", format!("bad magic 0x{magic:08x}")))
    }
}

fn read_body<B: ByteOrder>(reader: &mut dyn BufRead, headers_only: bool) -> Result<ParticleStore> {
    let swap = reader.read_u32::<B>()?;
    if swap != PDB_NO_SWAP {
        return Err(Error::corrupt(format!("bad pdb swap word {swap}")));
    }
    let _version = reader.read_f32::<B>()?;
    let time = reader.read_f32::<B>()?;
    let num_particles = reader.read_u32::<B>()? as usize;
    let num_attrs = reader.read_u32::<B>()? as usize;

    let mut store = ParticleStore::new();
    let time_attr = store.add_fixed_attribute("time", AttributeType::Float, 1)?;
    store.fixed_data_mut::<f32>(&time_attr)?[0] = time;
    store.add_particles(num_particles);

    for _ in 0..num_attrs {
        let name = read_cstring(reader)?;
        let tag = reader.read_u32::<B>()?;
        let count = reader.read_u32::<B>()? as usize;
        let attr_type = type_for(tag)?;
        let attr = store.add_attribute(&name, attr_type, count)?;

        let mut dict_len = 0usize;
        if attr_type == AttributeType::IndexedStr {
            let n = reader.read_u32::<B>()? as usize;
            for _ in 0..n {
                let s = read_cstring(reader)?;
                store.register_indexed_str(&attr, &s)?;
            }
            dict_len = n;
        }

        let elements = num_particles * attr.count();
        if headers_only {
            skip_bytes(reader, (elements * attr_type.element_size()) as u64)?;
            continue;
        }
        if attr_type.is_float() {
            let mut view = store.view_mut::<f32>(&attr)?;
            for v in view.as_mut_slice() {
                *v = reader.read_f32::<B>()?;
            }
        } else {
            let mut view = store.view_mut::<i32>(&attr)?;
            for v in view.as_mut_slice() {
                let raw = reader.read_i32::<B>()?;
                if attr_type == AttributeType::IndexedStr
                    && (raw < 0 || raw as usize >= dict_len)
                {
                    return Err(Error::corrupt(format!(
                        "token {raw} outside string table of \"{name}\""
                    )));
                }
                *v = raw;
            }
        }
    }

    Ok(store)
}

/// Write a store as a pdb stream (little-endian).
pub fn write(writer: &mut dyn Write, store: &ParticleStore) -> Result<()> {
    writer.write_u32::<LittleEndian>(PDB_MAGIC)?;
    writer.write_u32::<LittleEndian>(PDB_NO_SWAP)?;
    writer.write_f32::<LittleEndian>(PDB_VERSION)?;

    let time = match store.fixed_attribute_info("time") {
        Some(a) if a.attr_type() == AttributeType::Float => store.fixed_data::<f32>(&a)?[0],
        _ => 0.0,
    };
    writer.write_f32::<LittleEndian>(time)?;
    writer.write_u32::<LittleEndian>(store.num_particles() as u32)?;
    writer.write_u32::<LittleEndian>(store.num_attributes() as u32)?;

    for i in 0..store.num_attributes() {
        let Some(attr) = store.attribute_info_by_index(i) else {
            continue;
        };
        writer.write_all(attr.name().as_bytes())?;
        writer.write_u8(0)?;
        writer.write_u32::<LittleEndian>(tag_for(attr.attr_type()))?;
        writer.write_u32::<LittleEndian>(attr.count() as u32)?;

        if attr.attr_type() == AttributeType::IndexedStr {
            let strings = store.indexed_strs(&attr)?;
            writer.write_u32::<LittleEndian>(strings.len() as u32)?;
            for s in strings {
                writer.write_all(s.as_bytes())?;
                writer.write_u8(0)?;
            }
        }

        if attr.attr_type().is_float() {
            for v in store.view::<f32>(&attr)?.as_slice() {
                writer.write_f32::<LittleEndian>(*v)?;
            }
        } else {
            for v in store.view::<i32>(&attr)?.as_slice() {
                writer.write_i32::<LittleEndian>(*v)?;
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
        let id = store.add_attribute("id", AttributeType::Int, 1).unwrap();
        let kind = store
            .add_attribute("kind", AttributeType::IndexedStr, 1)
            .unwrap();
        store.add_particles(3);
        let spark = store.register_indexed_str(&kind, "spark").unwrap();
        let smoke = store.register_indexed_str(&kind, "smoke").unwrap();
        for i in 0..3 {
            store
                .data_mut::<f32>(&pos, i)
                .unwrap()
                .copy_from_slice(&[i as f32, 2.0, -3.5]);
            store.data_mut::<i32>(&id, i).unwrap()[0] = 100 + i as i32;
            store.data_mut::<i32>(&kind, i).unwrap()[0] =
                if i % 2 == 0 { spark } else { smoke };
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
        assert_eq!(back.num_particles(), 3);
        assert_eq!(back.num_attributes(), 3);

        let pos = back.attribute_info("position").unwrap();
        let kind = back.attribute_info("kind").unwrap();
        assert_eq!(back.data::<f32>(&pos, 2).unwrap(), &[2.0, 2.0, -3.5]);
        assert_eq!(back.indexed_strs(&kind).unwrap(), &["spark", "smoke"]);
        assert_eq!(back.data::<i32>(&kind, 1).unwrap()[0], 1);
    }

    #[test]
    fn test_headers_only_skips_payload() {
        let store = sample();
        let mut bytes = Vec::new();
        write(&mut bytes, &store).unwrap();

        let mut cur = Cursor::new(bytes);
        let headers = read(&mut cur, true).unwrap();
        assert_eq!(headers.num_particles(), 3);
        assert_eq!(headers.num_attributes(), 3);
        let pos = headers.attribute_info("position").unwrap();
        // payload skipped, columns stay zero-filled
        assert_eq!(headers.data::<f32>(&pos, 0).unwrap(), &[0.0, 0.0, 0.0]);
    }

    #[test]
    fn test_big_endian_read() {
        // Hand-build a big-endian file: header + one FLOAT channel, 1 particle.
        let mut bytes = Vec::new();
        bytes.write_u32::<BigEndian>(PDB_MAGIC).unwrap();
        bytes.write_u32::<BigEndian>(PDB_NO_SWAP).unwrap();
        bytes.write_f32::<BigEndian>(PDB_VERSION).unwrap();
        bytes.write_f32::<BigEndian>(0.25).unwrap();
        bytes.write_u32::<BigEndian>(1).unwrap();
        bytes.write_u32::<BigEndian>(1).unwrap();
        bytes.extend_from_slice(b"life\0");
        bytes.write_u32::<BigEndian>(TAG_FLOAT).unwrap();
        bytes.write_u32::<BigEndian>(1).unwrap();
        bytes.write_f32::<BigEndian>(7.5).unwrap();

        let mut cur = Cursor::new(bytes);
        let store = read(&mut cur, false).unwrap();
        let life = store.attribute_info("life").unwrap();
        assert_eq!(store.data::<f32>(&life, 0).unwrap()[0], 7.5);
        let time = store.fixed_attribute_info("time").unwrap();
        assert_eq!(store.fixed_data::<f32>(&time).unwrap()[0], 0.25);
    }

    #[test]
    fn test_bad_magic() {
        let mut cur = Cursor::new(vec![0xde, 0xad, 0xbe, 0xef, 0, 0, 0, 0]);
        assert!(matches!(
            read(&mut cur, false),
            Err(Error::FormatMismatch { format: "pdb", .. })
        ));
    }

    #[test]
    fn test_token_out_of_range_is_corrupt() {
        let mut bytes = Vec::new();
        bytes.write_u32::<LittleEndian>(PDB_MAGIC).unwrap();
        bytes.write_u32::<LittleEndian>(PDB_NO_SWAP).unwrap();
        bytes.write_f32::<LittleEndian>(PDB_VERSION).unwrap();
        bytes.write_f32::<LittleEndian>(0.0).unwrap();
        bytes.write_u32::<LittleEndian>(1).unwrap();
        bytes.write_u32::<LittleEndian>(1).unwrap();
        bytes.extend_from_slice(b"kind\0");
        bytes.write_u32::<LittleEndian>(TAG_INDEXEDSTR).unwrap();
        bytes.write_u32::<LittleEndian>(1).unwrap();
        bytes.write_u32::<LittleEndian>(1).unwrap(); // one dictionary entry
        bytes.extend_from_slice(b"only\0");
        bytes.write_i32::<LittleEndian>(3).unwrap(); // token 3 out of range

        let mut cur = Cursor::new(bytes);
        assert!(matches!(
            read(&mut cur, false),
            Err(Error::CorruptData(_))
        ));
    }

    #[test]
    fn test_truncated_stream_is_io_error() {
        let store = sample();
        let mut bytes = Vec::new();
        write(&mut bytes, &store).unwrap();
        bytes.truncate(bytes.len() - 5);

        let mut cur = Cursor::new(bytes);
        assert!(matches!(read(&mut cur, false), Err(Error::Io(_))));
    }
}
