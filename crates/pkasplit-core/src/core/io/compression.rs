//! Gzip handling for SD file streams.
//!
//! Input compression is detected by content, not by extension: the file is
//! first opened through a gzip decoder and a single byte is read. If that read
//! fails the file is reopened as plain bytes. Output is always compressed.

use flate2::Compression;
use flate2::read::MultiGzDecoder;
use flate2::write::GzEncoder;
use std::fs::File;
use std::io::{self, BufReader, BufWriter, Read, Write};
use std::path::Path;
use tracing::debug;

/// Reader that transparently handles gzip compression.
pub enum MaybeGzReader<R: Read> {
    Plain(R),
    Gzip(MultiGzDecoder<R>),
}

impl<R: Read> Read for MaybeGzReader<R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        match self {
            MaybeGzReader::Plain(r) => r.read(buf),
            MaybeGzReader::Gzip(r) => r.read(buf),
        }
    }
}

impl<R: Read> MaybeGzReader<R> {
    pub fn is_compressed(&self) -> bool {
        matches!(self, MaybeGzReader::Gzip(_))
    }
}

/// Returns `true` if a one-byte read through a gzip decoder succeeds.
pub fn probe_gzip(path: &Path) -> io::Result<bool> {
    let file = File::open(path)?;
    let mut decoder = MultiGzDecoder::new(file);
    let mut byte = [0u8; 1];
    Ok(decoder.read(&mut byte).is_ok())
}

/// Opens an SD file for buffered reading, decompressing it if needed.
///
/// # Errors
///
/// Returns an error if the file cannot be opened.
pub fn open_input(path: &Path) -> io::Result<BufReader<MaybeGzReader<File>>> {
    let compressed = probe_gzip(path)?;
    debug!(path = %path.display(), compressed, "Opening input stream.");
    let file = File::open(path)?;
    let reader = if compressed {
        MaybeGzReader::Gzip(MultiGzDecoder::new(file))
    } else {
        MaybeGzReader::Plain(file)
    };
    Ok(BufReader::new(reader))
}

/// Creates a gzip-compressed output stream at `path`, truncating any
/// existing file.
///
/// The caller must call [`GzEncoder::finish`] to write the gzip trailer and
/// observe any error doing so.
pub fn create_output(path: &Path) -> io::Result<GzEncoder<BufWriter<File>>> {
    let file = File::create(path)?;
    Ok(gzip_writer(BufWriter::new(file)))
}

/// Create a gzip encoder for a writer.
pub fn gzip_writer<W: Write>(writer: W) -> GzEncoder<W> {
    GzEncoder::new(writer, Compression::default())
}
