//! Symbol Resolver
//!
//! Point-in-time instrument-id to ticker mapping for one session, kept in a
//! DBN [`PitSymbolMap`].
//!
//! # Semantics
//!
//! - Seeded from the session metadata at the midpoint of its advertised
//!   bounds; bindings do not vary within a session. Metadata mapped from
//!   instrument ids (inverse symbology) is handled by the map itself.
//! - In-stream mapping updates overwrite the previous binding outright.
//!   Superseded tickers are not retained.
//! - Lookups never fail: an unknown id is reported as
//!   [`Resolution::Unresolved`] and the caller chooses what to do.

use databento::dbn::PitSymbolMap;

use super::metadata::SessionMetadata;
use super::records::MappingUpdate;

/// Errors seeding the resolver from metadata.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SymbologyError {
    /// The metadata bounds do not translate to a calendar date.
    #[error("session midpoint {0} is not a representable timestamp")]
    InvalidMidpoint(u64),

    /// The mappings could not be applied for the midpoint date.
    #[error("metadata mappings rejected: {0}")]
    Mappings(String),
}

/// Outcome of a lookup.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resolution<'a> {
    /// The id is bound to this ticker.
    Resolved(&'a str),
    /// No binding exists for the id.
    Unresolved,
}

impl<'a> Resolution<'a> {
    /// The ticker, if resolved.
    #[must_use]
    pub const fn ticker(self) -> Option<&'a str> {
        match self {
            Self::Resolved(ticker) => Some(ticker),
            Self::Unresolved => None,
        }
    }
}

/// Current instrument-id to ticker bindings.
#[derive(Debug)]
pub struct SymbolResolver {
    map: PitSymbolMap,
}

impl Default for SymbolResolver {
    fn default() -> Self {
        Self::new()
    }
}

impl SymbolResolver {
    /// Create an empty resolver.
    #[must_use]
    pub fn new() -> Self {
        Self {
            map: PitSymbolMap::new(),
        }
    }

    /// Replace all bindings with those valid at the midpoint of the session
    /// bounds.
    ///
    /// Returns the number of bindings installed.
    ///
    /// # Errors
    ///
    /// Returns an error if the midpoint is not a valid date or the mappings
    /// cannot be applied for it.
    pub fn initialize(&mut self, metadata: &SessionMetadata) -> Result<usize, SymbologyError> {
        if metadata.mapping_count() == 0 {
            self.map = PitSymbolMap::new();
            return Ok(0);
        }
        let date = metadata
            .midpoint_date()
            .ok_or_else(|| SymbologyError::InvalidMidpoint(metadata.midpoint()))?;

        self.map = PitSymbolMap::from_metadata(metadata.dbn(), date)
            .map_err(|e| SymbologyError::Mappings(e.to_string()))?;

        let installed = self.map.len();
        tracing::debug!(%date, installed, "Symbol resolver seeded from metadata");
        Ok(installed)
    }

    /// Look up the current ticker for `instrument_id`.
    #[must_use]
    pub fn resolve(&self, instrument_id: u32) -> Resolution<'_> {
        self.map
            .get(instrument_id)
            .map_or(Resolution::Unresolved, |ticker| {
                Resolution::Resolved(ticker.as_str())
            })
    }

    /// Install a binding, replacing any previous one for the same id.
    ///
    /// Returns the superseded ticker, if there was one.
    pub fn apply_mapping_update(&mut self, update: &MappingUpdate) -> Option<String> {
        self.map
            .inner_mut()
            .insert(update.instrument_id, update.ticker.clone())
    }

    /// Number of live bindings.
    #[must_use]
    pub fn len(&self) -> usize {
        self.map.len()
    }

    /// Whether no bindings exist.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }
}
