//! Session Metadata
//!
//! What the feed declares about a session when it starts: dataset, time
//! bounds, and any symbology mappings it already knows. The encoded header
//! is carried verbatim so the archive can be replayed by standard tooling.

use databento::dbn::{Metadata, encode::dbn::MetadataEncoder};
use time::{Date, OffsetDateTime};

use super::records::DecodeError;

/// Metadata describing a live session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionMetadata {
    metadata: Metadata,
    header: Vec<u8>,
}

impl SessionMetadata {
    /// Wrap DBN metadata, encoding the header written at the head of the
    /// archive.
    ///
    /// # Errors
    ///
    /// Returns an error if the header cannot be encoded.
    pub fn from_dbn(metadata: Metadata) -> Result<Self, DecodeError> {
        let mut header = Vec::new();
        MetadataEncoder::new(&mut header)
            .encode(&metadata)
            .map_err(|e| DecodeError::malformed("metadata", e.to_string()))?;
        Ok(Self { metadata, header })
    }

    /// Dataset identifier.
    #[must_use]
    pub fn dataset(&self) -> &str {
        &self.metadata.dataset
    }

    /// Session start in nanoseconds since the UNIX epoch.
    #[must_use]
    pub const fn start(&self) -> u64 {
        self.metadata.start
    }

    /// Session end in nanoseconds, `None` for an open-ended live session.
    #[must_use]
    pub fn end(&self) -> Option<u64> {
        self.metadata.end.map(std::num::NonZeroU64::get)
    }

    /// Number of raw symbols with mappings known at start.
    #[must_use]
    pub fn mapping_count(&self) -> usize {
        self.metadata.mappings.len()
    }

    /// The metadata as decoded from the feed.
    #[must_use]
    pub const fn dbn(&self) -> &Metadata {
        &self.metadata
    }

    /// Encoded header bytes.
    #[must_use]
    pub fn header(&self) -> &[u8] {
        &self.header
    }

    /// Midpoint of the advertised bounds in nanoseconds.
    ///
    /// Open-ended sessions use their start.
    #[must_use]
    pub fn midpoint(&self) -> u64 {
        let start = self.start();
        match self.end() {
            Some(end) if end > start => start + (end - start) / 2,
            _ => start,
        }
    }

    /// Calendar date (UTC) of [`Self::midpoint`].
    #[must_use]
    pub fn midpoint_date(&self) -> Option<Date> {
        OffsetDateTime::from_unix_timestamp_nanos(i128::from(self.midpoint()))
            .ok()
            .map(OffsetDateTime::date)
    }
}

#[cfg(test)]
mod tests {
    use std::num::NonZeroU64;

    use databento::dbn::{SType, Schema};
    use time::Month;

    use super::*;

    fn metadata(start: u64, end: Option<u64>) -> SessionMetadata {
        let mut metadata = Metadata::builder()
            .dataset("TEST".to_string())
            .schema(Some(Schema::Trades))
            .start(start)
            .stype_in(Some(SType::RawSymbol))
            .stype_out(SType::InstrumentId)
            .build();
        metadata.end = end.and_then(NonZeroU64::new);
        SessionMetadata::from_dbn(metadata).unwrap()
    }

    #[test]
    fn header_is_encoded_dbn() {
        let md = metadata(100, None);
        assert_eq!(&md.header()[..3], b"DBN");
        assert_eq!(md.dataset(), "TEST");
    }

    #[test]
    fn midpoint_of_bounded_session() {
        assert_eq!(metadata(100, Some(300)).midpoint(), 200);
    }

    #[test]
    fn midpoint_of_open_session_is_start() {
        assert_eq!(metadata(100, None).midpoint(), 100);
    }

    #[test]
    fn midpoint_with_inverted_bounds_is_start() {
        assert_eq!(metadata(300, Some(100)).midpoint(), 300);
    }

    #[test]
    fn midpoint_date_is_utc() {
        // 2023-11-14T22:13:20Z
        let md = metadata(1_700_000_000_000_000_000, None);
        assert_eq!(
            md.midpoint_date(),
            Date::from_calendar_date(2023, Month::November, 14).ok()
        );
    }
}
