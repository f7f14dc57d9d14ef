//! Stream plumbing shared by every codec.
//!
//! Input files are sniffed for a gzip frame by magic bytes, independent of
//! the filename suffix; output files are optionally gzip-framed. Codecs
//! only ever see a plain `BufRead`/`Write`.

use std::fs::File;
use std::io::{self, BufRead, BufReader, BufWriter, Read, Write};
use std::path::Path;

use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use flate2::Compression;

use crate::util::{Error, Result};

/// Gzip frame magic bytes.
const GZIP_MAGIC: [u8; 2] = [0x1f, 0x8b];

/// Open a file for reading, transparently decompressing a gzip frame.
///
/// The frame is detected by peeking at the first two bytes, so a gzipped
/// payload is handled no matter what the file is named.
pub(crate) fn open_input(path: &Path) -> Result<Box<dyn BufRead>> {
    let file = File::open(path).map_err(|e| {
        if e.kind() == io::ErrorKind::NotFound {
            Error::FileNotFound(path.to_path_buf())
        } else {
            Error::Io(e)
        }
    })?;
    let mut reader = BufReader::new(file);
    let head = reader.fill_buf()?;
    if head.len() >= 2 && head[..2] == GZIP_MAGIC {
        Ok(Box::new(BufReader::new(GzDecoder::new(reader))))
    } else {
        Ok(Box::new(reader))
    }
}

/// Output stream, plain or gzip-framed.
///
/// [`finish`](Self::finish) must be called to flush the frame trailer;
/// dropping early (an error path) still closes the descriptor via RAII.
pub(crate) enum OutputStream {
    Plain(BufWriter<File>),
    Gzip(GzEncoder<BufWriter<File>>),
}

impl OutputStream {
    /// Create (truncating) the target file, gzip-framed when requested.
    pub(crate) fn create(path: &Path, compressed: bool) -> Result<Self> {
        let file = File::create(path)?;
        let writer = BufWriter::new(file);
        if compressed {
            Ok(Self::Gzip(GzEncoder::new(writer, Compression::default())))
        } else {
            Ok(Self::Plain(writer))
        }
    }

    /// Finalize the stream, writing the gzip trailer where applicable.
    pub(crate) fn finish(self) -> Result<()> {
        match self {
            Self::Plain(mut w) => w.flush()?,
            Self::Gzip(enc) => {
                enc.finish()?.flush()?;
            }
        }
        Ok(())
    }
}

impl Write for OutputStream {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        match self {
            Self::Plain(w) => w.write(buf),
            Self::Gzip(w) => w.write(buf),
        }
    }

    fn flush(&mut self) -> io::Result<()> {
        match self {
            Self::Plain(w) => w.flush(),
            Self::Gzip(w) => w.flush(),
        }
    }
}

/// Skip exactly `n` bytes of the stream.
///
/// Rendered as a bounded copy into a sink because gzip-framed inputs are
/// not seekable. A short stream is an I/O error (truncated payload).
pub(crate) fn skip_bytes(reader: &mut dyn BufRead, n: u64) -> Result<()> {
    let copied = io::copy(&mut (&mut *reader).take(n), &mut io::sink())?;
    if copied != n {
        return Err(Error::Io(io::Error::new(
            io::ErrorKind::UnexpectedEof,
            format!("expected {n} more bytes, stream ended after {copied}"),
        )));
    }
    Ok(())
}

/// Read exactly one NUL-terminated string.
pub(crate) fn read_cstring(reader: &mut dyn BufRead) -> Result<String> {
    let mut bytes = Vec::new();
    reader.read_until(0, &mut bytes)?;
    match bytes.pop() {
        Some(0) => {}
        _ => {
            return Err(Error::Io(io::Error::new(
                io::ErrorKind::UnexpectedEof,
                "unterminated string",
            )))
        }
    }
    String::from_utf8(bytes).map_err(|e| Error::corrupt(format!("invalid UTF-8 in name: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn test_gzip_sniffing() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("payload.dat");

        let body = b"NUMBER_OF_PARTICLES: 3\n".repeat(10);
        {
            let mut out = OutputStream::create(&path, true).unwrap();
            out.write_all(&body).unwrap();
            out.finish().unwrap();
        }
        // On-disk bytes are a gzip frame...
        let raw = std::fs::read(&path).unwrap();
        assert_eq!(&raw[..2], &GZIP_MAGIC);
        // ...but open_input hands back the plain payload.
        let mut reader = open_input(&path).unwrap();
        let mut decoded = Vec::new();
        reader.read_to_end(&mut decoded).unwrap();
        assert_eq!(decoded, body);
    }

    #[test]
    fn test_plain_passthrough() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("plain.dat");
        {
            let mut out = OutputStream::create(&path, false).unwrap();
            out.write_all(b"hello").unwrap();
            out.finish().unwrap();
        }
        let mut reader = open_input(&path).unwrap();
        let mut decoded = Vec::new();
        reader.read_to_end(&mut decoded).unwrap();
        assert_eq!(decoded, b"hello");
    }

    #[test]
    fn test_missing_file() {
        let err = open_input(Path::new("/no/such/file.pdb"));
        assert!(matches!(err, Err(Error::FileNotFound(_))));
    }

    #[test]
    fn test_skip_bytes() {
        let mut cur = Cursor::new(vec![0u8; 16]);
        skip_bytes(&mut cur, 10).unwrap();
        assert_eq!(cur.position(), 10);
        let err = skip_bytes(&mut cur, 10);
        assert!(matches!(err, Err(Error::Io(_))));
    }

    #[test]
    fn test_read_cstring() {
        let mut cur = Cursor::new(b"position\0rest".to_vec());
        assert_eq!(read_cstring(&mut cur).unwrap(), "position");
        let mut cur = Cursor::new(b"unterminated".to_vec());
        assert!(read_cstring(&mut cur).is_err());
    }
}
