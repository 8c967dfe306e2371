use std::fs::File;
use std::io::{self, BufRead, BufReader, Cursor};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use bzip2::read::MultiBzDecoder;
use flate2::read::MultiGzDecoder;

/// 1MB, large enough to keep decompressors busy.
const READ_BUFFER: usize = 1024 * 1024;

pub type BoxedReader = Box<dyn BufRead + Send>;

/// Opens a fresh reader over one input each time it is called. The reader
/// belongs to the caller and is closed when dropped.
pub type ReaderFactory = Arc<dyn Fn() -> io::Result<BoxedReader> + Send + Sync>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Compression {
    Plain,
    Bzip2,
    Gzip,
}

impl Compression {
    pub fn detect(path: &Path) -> Self {
        match path.extension().and_then(|e| e.to_str()) {
            Some(ext) if ext.eq_ignore_ascii_case("bz2") => Compression::Bzip2,
            Some(ext) if ext.eq_ignore_ascii_case("gz") => Compression::Gzip,
            _ => Compression::Plain,
        }
    }
}

/// Open a dump file, decompressing `.bz2` and `.gz` on the fly.
/// Multistream archives are read to the end.
pub fn open_file(path: &Path) -> io::Result<BoxedReader> {
    let file = File::open(path)?;
    let reader: BoxedReader = match Compression::detect(path) {
        Compression::Bzip2 => Box::new(BufReader::with_capacity(READ_BUFFER, MultiBzDecoder::new(file))),
        Compression::Gzip => Box::new(BufReader::with_capacity(READ_BUFFER, MultiGzDecoder::new(file))),
        Compression::Plain => Box::new(BufReader::with_capacity(READ_BUFFER, file)),
    };
    Ok(reader)
}

pub fn file_reader(path: impl AsRef<Path>) -> ReaderFactory {
    let path: PathBuf = path.as_ref().to_path_buf();
    Arc::new(move || open_file(&path))
}

/// Serve an in-memory export; every call starts from the beginning.
pub fn bytes_reader(bytes: impl Into<Vec<u8>>) -> ReaderFactory {
    let bytes: Vec<u8> = bytes.into();
    let bytes: Arc<[u8]> = Arc::from(bytes);
    Arc::new(move || -> io::Result<BoxedReader> { Ok(Box::new(Cursor::new(Arc::clone(&bytes)))) })
}
