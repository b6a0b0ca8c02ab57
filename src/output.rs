//! Output files for the triple and schema streams, and CSV tables.

use crate::models::{Result, WikiventsError};
use flate2::Compression;
use flate2::write::GzEncoder;
use serde::Serialize;
use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::Path;

/// Default output buffer size (1 MB)
pub const OUTPUT_BUFFER_SIZE: usize = 1024 * 1024;

/// A buffered output file, optionally gzip-compressed.
pub enum OutputFile {
    Plain(BufWriter<File>),
    Gzip(GzEncoder<BufWriter<File>>),
}

impl OutputFile {
    /// Create (or truncate) `path`.
    pub fn create(path: &Path, compress: bool) -> Result<Self> {
        let file = File::create(path)
            .map_err(|e| WikiventsError::io(format!("creating {}", path.display()), e))?;
        let buffered = BufWriter::with_capacity(OUTPUT_BUFFER_SIZE, file);
        Ok(if compress {
            Self::Gzip(GzEncoder::new(buffered, Compression::default()))
        } else {
            Self::Plain(buffered)
        })
    }

    /// Write the gzip trailer if any and flush everything to disk.
    pub fn finish(self) -> Result<()> {
        let mut buffered = match self {
            Self::Plain(w) => w,
            Self::Gzip(encoder) => encoder
                .finish()
                .map_err(|e| WikiventsError::io("finishing gzip stream", e))?,
        };
        buffered
            .flush()
            .map_err(|e| WikiventsError::io("flushing output file", e))
    }
}

impl Write for OutputFile {
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

/// Write `rows` to `path` as headerless CSV. Returns the number of rows.
pub fn write_csv<T: Serialize>(path: &Path, rows: &[T]) -> Result<usize> {
    let csv_error = |source| WikiventsError::Csv {
        path: path.to_owned(),
        source,
    };
    let mut writer = csv::WriterBuilder::new()
        .has_headers(false)
        .from_path(path)
        .map_err(csv_error)?;
    for row in rows {
        writer.serialize(row).map_err(csv_error)?;
    }
    writer
        .flush()
        .map_err(|e| WikiventsError::io(format!("flushing {}", path.display()), e))?;
    Ok(rows.len())
}
