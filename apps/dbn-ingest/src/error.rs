//! Ingestion error taxonomy.
//!
//! | variant       | cause                                        | effect                         |
//! |---------------|----------------------------------------------|--------------------------------|
//! | `Setup`       | connect, auth, subscribe, migrate, start     | session never created          |
//! | `Decode`      | malformed record or unrepresentable value    | session aborted                |
//! | `Persistence` | store rejected a write                       | session aborted                |
//! | `Archival`    | archive write or flush failed                | session aborted                |
//! | `Feed`        | transport lost while streaming               | session aborted                |
//! | `Lifecycle`   | double start, stop before start              | reported, session unaffected   |

use crate::application::ports::{ArchiveError, FeedError, FeedSchema, StoreError};
use crate::domain::records::DecodeError;
use crate::domain::symbology::SymbologyError;

pub use crate::domain::session::LifecycleError;

/// Failure while bringing a session up.
#[derive(Debug, thiserror::Error)]
pub enum SetupError {
    /// The archive destination could not be opened.
    #[error("archive: {0}")]
    Archive(#[source] ArchiveError),

    /// Connection or authentication failed.
    #[error("authentication: {0}")]
    Authenticate(#[source] FeedError),

    /// A subscription request failed.
    #[error("subscribe {schema}: {source}")]
    Subscribe {
        /// Schema of the failed request.
        schema: FeedSchema,
        /// Underlying feed error.
        #[source]
        source: FeedError,
    },

    /// Schema migration failed.
    #[error("migration: {0}")]
    Migration(#[source] StoreError),

    /// The feed refused to start.
    #[error("start: {0}")]
    Start(#[source] FeedError),

    /// The session metadata carried unusable symbology.
    #[error("symbology: {0}")]
    Symbology(#[source] SymbologyError),
}

/// Any error an ingestion session can report.
#[derive(Debug, thiserror::Error)]
pub enum IngestError {
    /// Session could not be created.
    #[error("setup failed: {0}")]
    Setup(#[from] SetupError),

    /// A record could not be decoded or normalized.
    #[error("decode failed: {0}")]
    Decode(#[from] DecodeError),

    /// The store rejected a write.
    #[error("persistence failed: {0}")]
    Persistence(#[from] StoreError),

    /// The archive could not be written.
    #[error("archival failed: {0}")]
    Archival(#[from] ArchiveError),

    /// The feed failed while streaming.
    #[error("feed failed: {0}")]
    Feed(FeedError),

    /// The session was used out of order.
    #[error(transparent)]
    Lifecycle(#[from] LifecycleError),
}

impl From<FeedError> for IngestError {
    fn from(err: FeedError) -> Self {
        match err {
            FeedError::Decode(e) => Self::Decode(e),
            other => Self::Feed(other),
        }
    }
}

impl IngestError {
    /// Whether the error ends the session.
    #[must_use]
    pub const fn is_fatal(&self) -> bool {
        !matches!(self, Self::Lifecycle(_))
    }
}
