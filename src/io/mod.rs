//! Registry/dispatch - filename extensions to codecs.
//!
//! Maps a filename's extension (case-sensitive, `.gz` compounds included)
//! to its codec and exposes the three entry points external collaborators
//! use: [`read`], [`read_headers`] and [`write`]. The dispatch table is an
//! immutable process-wide `static`, built at compile time and never
//! mutated, so it is thread-safe by construction.

use std::io::{BufRead, Write as _};
use std::path::Path;

use crate::core::ParticleStore;
use crate::formats;
use crate::util::{Error, Result};

pub(crate) mod stream;

type ReadFn = fn(&mut dyn BufRead, bool) -> Result<ParticleStore>;
type WriteFn = fn(&mut dyn std::io::Write, &ParticleStore) -> Result<()>;

struct Codec {
    id: &'static str,
    read: Option<ReadFn>,
    write: Option<WriteFn>,
}

static CODECS: &[Codec] = &[
    Codec {
        id: "pdb",
        read: Some(formats::pdb::read),
        write: Some(formats::pdb::write),
    },
    Codec {
        id: "pda",
        read: Some(formats::pda::read),
        write: Some(formats::pda::write),
    },
    Codec {
        id: "bgeo",
        read: Some(formats::bgeo::read),
        write: Some(formats::bgeo::write),
    },
    Codec {
        id: "geo",
        read: Some(formats::geo::read),
        write: Some(formats::geo::write),
    },
    Codec {
        id: "pts",
        read: Some(formats::pts::read),
        write: None,
    },
    Codec {
        id: "rib",
        read: None,
        write: Some(formats::rib::write),
    },
];

/// Resolve a path to `(format id, gz suffix present)`.
///
/// The trailing `.gz` is stripped first so compound extensions like
/// `.bgeo.gz` resolve to the inner format. Matching is case-sensitive.
fn format_id(path: &Path) -> Option<(&str, bool)> {
    let name = path.file_name()?.to_str()?;
    let mut parts: Vec<&str> = name.split('.').collect();
    let mut gz = false;
    if parts.len() > 1 && parts[parts.len() - 1] == "gz" {
        parts.pop();
        gz = true;
    }
    if parts.len() > 1 {
        parts.last().map(|ext| (*ext, gz))
    } else {
        None
    }
}

fn codec_for(path: &Path) -> Result<(&'static Codec, bool)> {
    let (ext, gz) = format_id(path)
        .ok_or_else(|| Error::UnsupportedFormat(path.display().to_string()))?;
    CODECS
        .iter()
        .find(|c| c.id == ext)
        .map(|c| (c, gz))
        .ok_or_else(|| Error::UnsupportedFormat(ext.to_string()))
}

fn read_impl(path: &Path, headers_only: bool) -> Result<ParticleStore> {
    let (codec, _) = codec_for(path)?;
    let read_fn = codec
        .read
        .ok_or_else(|| Error::UnsupportedFormat(format!("{} is write-only", codec.id)))?;
    let mut reader = stream::open_input(path)?;
    read_fn(&mut *reader, headers_only)
}

/// Read a cache file completely: schema, particle count and every value.
///
/// The codec is picked by extension; gzip framing is detected by magic
/// bytes independent of the suffix.
pub fn read(path: impl AsRef<Path>) -> Result<ParticleStore> {
    read_impl(path.as_ref(), false)
}

/// Read only the schema and particle count, skipping the bulk payload.
///
/// The returned store declares every attribute and reports the true
/// particle count, with all columns zero-filled. Substantially faster
/// than [`read`] on large caches.
pub fn read_headers(path: impl AsRef<Path>) -> Result<ParticleStore> {
    read_impl(path.as_ref(), true)
}

/// Write a store to a cache file in the format named by the extension.
///
/// `compressed` requests a gzip frame; a `.gz` suffix implies it. The
/// encoder is finalized on the success path and released by RAII on every
/// error path.
pub fn write(path: impl AsRef<Path>, store: &ParticleStore, compressed: bool) -> Result<()> {
    let path = path.as_ref();
    let (codec, gz) = codec_for(path)?;
    let write_fn = codec
        .write
        .ok_or_else(|| Error::UnsupportedFormat(format!("{} is read-only", codec.id)))?;
    let mut out = stream::OutputStream::create(path, compressed || gz)?;
    write_fn(&mut out, store)?;
    out.flush()?;
    out.finish()
}

/// Format identifiers with a reader, in registry order.
pub fn supported_read_formats() -> Vec<&'static str> {
    CODECS.iter().filter(|c| c.read.is_some()).map(|c| c.id).collect()
}

/// Format identifiers with a writer, in registry order.
pub fn supported_write_formats() -> Vec<&'static str> {
    CODECS.iter().filter(|c| c.write.is_some()).map(|c| c.id).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_id() {
        assert_eq!(format_id(Path::new("a/b/cache.pdb")), Some(("pdb", false)));
        assert_eq!(
            format_id(Path::new("cache.bgeo.gz")),
            Some(("bgeo", true))
        );
        assert_eq!(format_id(Path::new("cache")), None);
        assert_eq!(format_id(Path::new("cache.gz")), None);
        // case-sensitive
        assert_eq!(format_id(Path::new("cache.PDB")), Some(("PDB", false)));
    }

    #[test]
    fn test_supported_formats() {
        let reads = supported_read_formats();
        assert!(reads.contains(&"pdb"));
        assert!(reads.contains(&"pts"));
        assert!(!reads.contains(&"rib"));

        let writes = supported_write_formats();
        assert!(writes.contains(&"rib"));
        assert!(!writes.contains(&"pts"));
    }

    #[test]
    fn test_unknown_extension() {
        assert!(matches!(
            read(Path::new("file.obj")),
            Err(Error::UnsupportedFormat(_))
        ));
        let store = ParticleStore::new();
        assert!(matches!(
            write(Path::new("file.PDB"), &store, false),
            Err(Error::UnsupportedFormat(_))
        ));
    }

    #[test]
    fn test_write_only_and_read_only() {
        assert!(matches!(
            read(Path::new("out.rib")),
            Err(Error::UnsupportedFormat(_))
        ));
        let store = ParticleStore::new();
        assert!(matches!(
            write(Path::new("scan.pts"), &store, false),
            Err(Error::UnsupportedFormat(_))
        ));
    }
}
