//! Record Dispatcher
//!
//! Routes one decoded record to its handler. Trades and bars are resolved
//! to a ticker and upserted; mapping changes go to the resolver; every
//! other kind is acknowledged and dropped. The caller awaits each dispatch
//! before pulling the next record, so a mapping change always lands before
//! the records behind it.

use tracing::{debug, warn};

use crate::application::ports::{IngestMetrics, MarketStore};
use crate::domain::records::{FeedRecord, RecordKind};
use crate::domain::rows::{CandleRow, Table, TradeRow, UpsertOutcome};
use crate::domain::session::StreamSummary;
use crate::domain::symbology::{Resolution, SymbolResolver};
use crate::error::IngestError;

/// What dispatching a record did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DispatchOutcome {
    /// A row was submitted to the store.
    Persisted {
        /// Target table.
        table: Table,
        /// Whether the row was new.
        outcome: UpsertOutcome,
    },
    /// The resolver binding changed.
    MappingApplied {
        /// Rebound instrument.
        instrument_id: u32,
        /// Binding that was replaced.
        previous: Option<String>,
    },
    /// No ticker was bound; nothing was written.
    Unresolved {
        /// Table the record would have gone to.
        table: Table,
        /// Unbound instrument.
        instrument_id: u32,
    },
    /// The record carries nothing to persist.
    Ignored(RecordKind),
}

impl DispatchOutcome {
    /// Add this outcome to the session counters.
    pub const fn tally(&self, summary: &mut StreamSummary) {
        match self {
            Self::Persisted {
                table: Table::Trades,
                outcome: UpsertOutcome::Inserted,
            } => summary.trades_inserted += 1,
            Self::Persisted {
                table: Table::Trades,
                outcome: UpsertOutcome::Duplicate,
            } => summary.trades_duplicate += 1,
            Self::Persisted {
                table: Table::Candles,
                outcome: UpsertOutcome::Inserted,
            } => summary.candles_inserted += 1,
            Self::Persisted {
                table: Table::Candles,
                outcome: UpsertOutcome::Duplicate,
            } => summary.candles_duplicate += 1,
            Self::MappingApplied { .. } => summary.mapping_updates += 1,
            Self::Unresolved { .. } => summary.unresolved += 1,
            Self::Ignored(_) => summary.ignored += 1,
        }
    }

    /// Report this outcome to `metrics`.
    pub fn record(&self, metrics: &dyn IngestMetrics) {
        match self {
            Self::Persisted { table, outcome } => metrics.record_row(*table, *outcome),
            Self::MappingApplied { .. } => metrics.record_mapping_update(),
            Self::Unresolved { table, .. } => metrics.record_unresolved(*table),
            Self::Ignored(_) => {}
        }
    }
}

/// Dispatch one record.
///
/// # Errors
///
/// Returns an error if a trade or bar cannot be normalized or the store
/// rejects the write. Both end the session.
pub async fn dispatch<S>(
    record: &FeedRecord,
    resolver: &mut SymbolResolver,
    store: &S,
) -> Result<DispatchOutcome, IngestError>
where
    S: MarketStore + ?Sized,
{
    match record {
        FeedRecord::Trade(trade) => {
            let row = match resolver.resolve(trade.instrument_id) {
                Resolution::Resolved(ticker) => TradeRow::from_event(trade, ticker)?,
                Resolution::Unresolved => {
                    return Ok(unresolved(Table::Trades, trade.instrument_id));
                }
            };
            let outcome = store.upsert_trade(&row).await?;
            Ok(persisted(Table::Trades, outcome))
        }
        FeedRecord::Bar(bar) => {
            let row = match resolver.resolve(bar.instrument_id) {
                Resolution::Resolved(ticker) => CandleRow::from_event(bar, ticker)?,
                Resolution::Unresolved => {
                    return Ok(unresolved(Table::Candles, bar.instrument_id));
                }
            };
            let outcome = store.upsert_candle(&row).await?;
            Ok(persisted(Table::Candles, outcome))
        }
        FeedRecord::SymbolMapping(update) => {
            let previous = resolver.apply_mapping_update(update);
            debug!(
                instrument_id = update.instrument_id,
                ticker = %update.ticker,
                previous = ?previous,
                "Symbol mapping applied"
            );
            Ok(DispatchOutcome::MappingApplied {
                instrument_id: update.instrument_id,
                previous,
            })
        }
        FeedRecord::Ignored(RecordKind::Unknown(tag)) => {
            debug!(rtype = *tag, "Unknown record type; archived only");
            Ok(DispatchOutcome::Ignored(RecordKind::Unknown(*tag)))
        }
        FeedRecord::Ignored(kind) => Ok(DispatchOutcome::Ignored(*kind)),
    }
}

const fn persisted(table: Table, outcome: UpsertOutcome) -> DispatchOutcome {
    DispatchOutcome::Persisted { table, outcome }
}

fn unresolved(table: Table, instrument_id: u32) -> DispatchOutcome {
    warn!(
        instrument_id,
        table = table.as_str(),
        "No ticker bound for instrument; record not persisted"
    );
    DispatchOutcome::Unresolved {
        table,
        instrument_id,
    }
}
