//! Record Archive Port (Driven Port)
//!
//! Append-only byte log of a session: one header, then raw records in
//! arrival order. Every failure is fatal to the session.

use std::io;
use std::path::PathBuf;

/// Archive errors.
#[derive(Debug, thiserror::Error)]
pub enum ArchiveError {
    /// The destination could not be opened.
    #[error("failed to open archive {path}: {source}")]
    Open {
        /// Destination path.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: io::Error,
    },

    /// A write, flush, or compression frame failed.
    #[error("archive write failed: {0}")]
    Write(#[from] io::Error),

    /// A record was appended before the header.
    #[error("archive header not written")]
    HeaderMissing,

    /// The header was written twice.
    #[error("archive header already written")]
    HeaderAlreadyWritten,

    /// The sink was used after close.
    #[error("archive already closed")]
    Closed,
}

/// Port for the session archive.
pub trait RecordArchive: Send {
    /// Write the session header. Allowed once, before any record.
    fn write_header(&mut self, header: &[u8]) -> Result<(), ArchiveError>;

    /// Append one record's raw bytes.
    fn append(&mut self, raw: &[u8]) -> Result<(), ArchiveError>;

    /// Flush and release the destination. Later calls are no-ops.
    fn close(&mut self) -> Result<(), ArchiveError>;

    /// Bytes written so far, header included.
    fn bytes_written(&self) -> u64;
}
