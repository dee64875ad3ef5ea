//! Archive Sink
//!
//! Byte-for-byte log of the session: the encoded metadata header once,
//! then every record's raw bytes in arrival order. Nothing is framed
//! beyond what the record encoding already carries, so the output is a
//! valid DBN stream readable by standard tooling.
//!
//! # Destinations
//!
//! - `-`: stdout, uncompressed
//! - `*.zst` (or forced): zstd-compressed file
//! - anything else: plain file
//!
//! The sink is closed exactly once. Dropping an unclosed sink flushes
//! best-effort and logs any failure.

use std::fmt;
use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};

use zstd::stream::write::Encoder as ZstdEncoder;

use crate::application::ports::{ArchiveError, RecordArchive};

/// zstd compression level.
const ZSTD_LEVEL: i32 = 3;

/// Buffer in front of the output.
const BUFFER_CAPACITY: usize = 1024 * 1024;

// =============================================================================
// Destination
// =============================================================================

/// Where the archive goes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ArchiveDestination {
    /// Standard output, never compressed.
    Stdout,
    /// A file on disk.
    File {
        /// Output path.
        path: PathBuf,
        /// Wrap in a zstd frame.
        compress: bool,
    },
}

impl ArchiveDestination {
    /// Interpret an output argument.
    ///
    /// `-` is stdout. A path is compressed when it ends in `.zst` or when
    /// `force_zstd` is set.
    #[must_use]
    pub fn parse(out: &str, force_zstd: bool) -> Self {
        if out == "-" {
            return Self::Stdout;
        }
        let path = PathBuf::from(out);
        let compress = force_zstd || has_zst_extension(&path);
        Self::File { path, compress }
    }

    /// Whether output is zstd-compressed.
    #[must_use]
    pub const fn is_compressed(&self) -> bool {
        matches!(self, Self::File { compress: true, .. })
    }
}

impl fmt::Display for ArchiveDestination {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Stdout => f.write_str("stdout"),
            Self::File { path, .. } => write!(f, "{}", path.display()),
        }
    }
}

fn has_zst_extension(path: &Path) -> bool {
    path.extension()
        .is_some_and(|ext| ext.eq_ignore_ascii_case("zst"))
}

// =============================================================================
// Sink
// =============================================================================

type Output = BufWriter<Box<dyn Write + Send>>;

enum Writer {
    Plain(Output),
    Zstd(ZstdEncoder<'static, Output>),
}

impl Writer {
    fn new(output: Box<dyn Write + Send>, compress: bool) -> io::Result<Self> {
        let buffered = BufWriter::with_capacity(BUFFER_CAPACITY, output);
        if compress {
            Ok(Self::Zstd(ZstdEncoder::new(buffered, ZSTD_LEVEL)?))
        } else {
            Ok(Self::Plain(buffered))
        }
    }

    fn write_all(&mut self, bytes: &[u8]) -> io::Result<()> {
        match self {
            Self::Plain(w) => w.write_all(bytes),
            Self::Zstd(w) => w.write_all(bytes),
        }
    }

    fn finish(self) -> io::Result<()> {
        match self {
            Self::Plain(mut w) => w.flush(),
            Self::Zstd(w) => w.finish()?.flush(),
        }
    }
}

/// Append-only archive of one session.
pub struct ArchiveSink {
    writer: Option<Writer>,
    destination: String,
    header_written: bool,
    entries: u64,
    bytes_written: u64,
}

impl fmt::Debug for ArchiveSink {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ArchiveSink")
            .field("destination", &self.destination)
            .field("open", &self.writer.is_some())
            .field("header_written", &self.header_written)
            .field("entries", &self.entries)
            .field("bytes_written", &self.bytes_written)
            .finish()
    }
}

impl ArchiveSink {
    /// Open the destination for writing, truncating any existing file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be created.
    pub fn open(destination: &ArchiveDestination) -> Result<Self, ArchiveError> {
        let (output, compress): (Box<dyn Write + Send>, bool) = match destination {
            ArchiveDestination::Stdout => (Box::new(io::stdout()), false),
            ArchiveDestination::File { path, compress } => {
                let file = File::create(path).map_err(|source| ArchiveError::Open {
                    path: path.clone(),
                    source,
                })?;
                (Box::new(file), *compress)
            }
        };
        let sink = Self::with_writer(destination.to_string(), output, compress)?;
        tracing::debug!(destination = %destination, compress, "Archive opened");
        Ok(sink)
    }

    /// Archive into an arbitrary writer.
    ///
    /// # Errors
    ///
    /// Returns an error if the compression context cannot be created.
    pub fn from_writer<W>(name: impl Into<String>, output: W, compress: bool) -> Result<Self, ArchiveError>
    where
        W: Write + Send + 'static,
    {
        Self::with_writer(name.into(), Box::new(output), compress)
    }

    fn with_writer(
        destination: String,
        output: Box<dyn Write + Send>,
        compress: bool,
    ) -> Result<Self, ArchiveError> {
        Ok(Self {
            writer: Some(Writer::new(output, compress)?),
            destination,
            header_written: false,
            entries: 0,
            bytes_written: 0,
        })
    }

    /// Whether the sink has been closed.
    #[must_use]
    pub const fn is_closed(&self) -> bool {
        self.writer.is_none()
    }

    /// Records appended after the header.
    #[must_use]
    pub const fn entries(&self) -> u64 {
        self.entries
    }
}

impl RecordArchive for ArchiveSink {
    fn write_header(&mut self, header: &[u8]) -> Result<(), ArchiveError> {
        if self.header_written {
            return Err(ArchiveError::HeaderAlreadyWritten);
        }
        let writer = self.writer.as_mut().ok_or(ArchiveError::Closed)?;
        writer.write_all(header)?;
        self.header_written = true;
        self.bytes_written += header.len() as u64;
        Ok(())
    }

    fn append(&mut self, raw: &[u8]) -> Result<(), ArchiveError> {
        if !self.header_written {
            return Err(ArchiveError::HeaderMissing);
        }
        let writer = self.writer.as_mut().ok_or(ArchiveError::Closed)?;
        writer.write_all(raw)?;
        self.entries += 1;
        self.bytes_written += raw.len() as u64;
        Ok(())
    }

    fn close(&mut self) -> Result<(), ArchiveError> {
        let Some(writer) = self.writer.take() else {
            return Ok(());
        };
        writer.finish()?;
        tracing::debug!(
            destination = %self.destination,
            entries = self.entries,
            bytes = self.bytes_written,
            "Archive closed"
        );
        Ok(())
    }

    fn bytes_written(&self) -> u64 {
        self.bytes_written
    }
}

impl Drop for ArchiveSink {
    fn drop(&mut self) {
        if let Some(writer) = self.writer.take()
            && let Err(e) = writer.finish()
        {
            tracing::error!(destination = %self.destination, error = %e, "Archive flush on drop failed");
        }
    }
}
