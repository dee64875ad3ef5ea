//! Databento Live Feed Adapter
//!
//! `FeedClient` over the official `databento` crate. Records arrive as
//! borrowed DBN records; each is copied into an owned [`StreamRecord`]
//! holding its exact bytes plus the decoded variant, so the loop can
//! dispatch and archive it after the client has moved on.
//!
//! ```text
//! ┌──────────────┐  RecordRef  ┌──────────────┐  StreamRecord  ┌───────────────┐
//! │  LiveClient  │────────────>│ decode_record│───────────────>│ StreamSession │
//! └──────────────┘             └──────────────┘                └───────────────┘
//! ```

use async_trait::async_trait;
use databento::{
    LiveClient,
    dbn::{OhlcvMsg, Record, RecordRef, SType, Schema, SymbolMappingMsg, TradeMsg, rtype},
    live::Subscription,
};
use tracing::{debug, info};

use crate::application::ports::{
    FeedClient, FeedError, FeedSchema, SubscriptionRequest, Symbology,
};
use crate::domain::metadata::SessionMetadata;
use crate::domain::records::{
    BarEvent, DecodeError, FeedRecord, MappingUpdate, RecordKind, StreamRecord, TradeEvent,
};
use crate::infrastructure::config::ApiKey;

// ============================================================================
// Record Routing
// ============================================================================

/// Which decoder a record type tag selects.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Route {
    /// MBP-0 trade.
    Trade,
    /// One-minute OHLCV bar.
    Bar,
    /// Symbol mapping change.
    SymbolMapping,
    /// Recognized, nothing to decode.
    Ignored(RecordKind),
}

/// Map a record type tag to its route.
///
/// Tags outside the known set route to [`RecordKind::Unknown`] so the
/// record is still archived.
#[must_use]
pub const fn route(rtype: u8) -> Route {
    match rtype {
        rtype::MBP_0 => Route::Trade,
        rtype::OHLCV_1M => Route::Bar,
        rtype::SYMBOL_MAPPING => Route::SymbolMapping,
        rtype::MBP_1
        | rtype::CMBP_1
        | rtype::BBO_1S
        | rtype::BBO_1M
        | rtype::CBBO_1S
        | rtype::CBBO_1M
        | rtype::TCBBO => Route::Ignored(RecordKind::Quote),
        rtype::MBO | rtype::MBP_10 => Route::Ignored(RecordKind::BookDelta),
        rtype::OHLCV_1S
        | rtype::OHLCV_1H
        | rtype::OHLCV_1D
        | rtype::OHLCV_EOD
        | rtype::OHLCV_DEPRECATED => Route::Ignored(RecordKind::OtherBar),
        rtype::IMBALANCE => Route::Ignored(RecordKind::Imbalance),
        rtype::STATISTICS => Route::Ignored(RecordKind::Statistics),
        rtype::STATUS => Route::Ignored(RecordKind::Status),
        rtype::INSTRUMENT_DEF => Route::Ignored(RecordKind::InstrumentDefinition),
        rtype::ERROR => Route::Ignored(RecordKind::ErrorNotice),
        rtype::SYSTEM => Route::Ignored(RecordKind::SystemNotice),
        other => Route::Ignored(RecordKind::Unknown(other)),
    }
}

fn body_mismatch(kind: &'static str) -> DecodeError {
    DecodeError::malformed(kind, "record body does not match its type")
}

/// Copy a borrowed record into an owned [`StreamRecord`].
///
/// # Errors
///
/// Returns an error if the body does not match its type tag.
pub fn decode_record(record: RecordRef<'_>) -> Result<StreamRecord, DecodeError> {
    let decoded = match route(record.header().rtype) {
        Route::Trade => {
            let msg = record.get::<TradeMsg>().ok_or_else(|| body_mismatch("trade"))?;
            FeedRecord::Trade(TradeEvent {
                instrument_id: msg.hd.instrument_id,
                publisher_id: msg.hd.publisher_id,
                ts_event: msg.hd.ts_event,
                price: msg.price,
                size: msg.size,
            })
        }
        Route::Bar => {
            let msg = record.get::<OhlcvMsg>().ok_or_else(|| body_mismatch("bar"))?;
            FeedRecord::Bar(BarEvent {
                instrument_id: msg.hd.instrument_id,
                publisher_id: msg.hd.publisher_id,
                ts_event: msg.hd.ts_event,
                open: msg.open,
                high: msg.high,
                low: msg.low,
                close: msg.close,
                volume: msg.volume,
            })
        }
        Route::SymbolMapping => {
            let msg = record
                .get::<SymbolMappingMsg>()
                .ok_or_else(|| body_mismatch("symbol_mapping"))?;
            let ticker = msg
                .stype_out_symbol()
                .map_err(|e| DecodeError::malformed("symbol_mapping", e.to_string()))?;
            FeedRecord::SymbolMapping(MappingUpdate {
                instrument_id: msg.hd.instrument_id,
                ticker: ticker.to_string(),
                ts_event: msg.hd.ts_event,
            })
        }
        Route::Ignored(kind) => FeedRecord::Ignored(kind),
    };
    Ok(StreamRecord::new(record.as_ref().to_vec(), decoded))
}

// ============================================================================
// Subscription Conversion
// ============================================================================

const fn to_schema(schema: FeedSchema) -> Schema {
    match schema {
        FeedSchema::Trades => Schema::Trades,
        FeedSchema::Ohlcv1m => Schema::Ohlcv1M,
        FeedSchema::Ohlcv1s => Schema::Ohlcv1S,
        FeedSchema::Ohlcv1h => Schema::Ohlcv1H,
        FeedSchema::Ohlcv1d => Schema::Ohlcv1D,
        FeedSchema::Mbp1 => Schema::Mbp1,
        FeedSchema::Mbp10 => Schema::Mbp10,
        FeedSchema::Mbo => Schema::Mbo,
        FeedSchema::Tbbo => Schema::Tbbo,
        FeedSchema::Bbo1s => Schema::Bbo1S,
        FeedSchema::Bbo1m => Schema::Bbo1M,
        FeedSchema::Definition => Schema::Definition,
        FeedSchema::Statistics => Schema::Statistics,
        FeedSchema::Status => Schema::Status,
        FeedSchema::Imbalance => Schema::Imbalance,
    }
}

const fn to_stype(symbology: Symbology) -> SType {
    match symbology {
        Symbology::RawSymbol => SType::RawSymbol,
        Symbology::InstrumentId => SType::InstrumentId,
        Symbology::Parent => SType::Parent,
        Symbology::Continuous => SType::Continuous,
    }
}

fn to_subscription(request: &SubscriptionRequest) -> Result<Subscription, FeedError> {
    let mut subscription = Subscription::builder()
        .symbols(request.symbols.clone())
        .schema(to_schema(request.schema))
        .stype_in(to_stype(request.stype_in))
        .build();

    if let Some(start) = request.start {
        let nanos = start
            .timestamp_nanos_opt()
            .ok_or_else(|| FeedError::Subscription {
                schema: request.schema,
                message: format!("start {start} out of range"),
            })?;
        let start = time::OffsetDateTime::from_unix_timestamp_nanos(i128::from(nanos)).map_err(
            |e| FeedError::Subscription {
                schema: request.schema,
                message: e.to_string(),
            },
        )?;
        subscription.start = Some(start);
    }
    subscription.use_snapshot = request.snapshot;
    Ok(subscription)
}

// ============================================================================
// Client
// ============================================================================

/// Live feed backed by a Databento gateway session.
pub struct DatabentoFeed {
    api_key: ApiKey,
    dataset: String,
    client: Option<LiveClient>,
}

impl std::fmt::Debug for DatabentoFeed {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DatabentoFeed")
            .field("api_key", &self.api_key)
            .field("dataset", &self.dataset)
            .field("connected", &self.client.is_some())
            .finish()
    }
}

impl DatabentoFeed {
    /// Create an unconnected feed.
    #[must_use]
    pub const fn new(api_key: ApiKey, dataset: String) -> Self {
        Self {
            api_key,
            dataset,
            client: None,
        }
    }

    fn client(&mut self) -> Result<&mut LiveClient, FeedError> {
        self.client
            .as_mut()
            .ok_or(FeedError::NotReady("not authenticated"))
    }
}

#[async_trait]
impl FeedClient for DatabentoFeed {
    async fn authenticate(&mut self) -> Result<(), FeedError> {
        let client = LiveClient::builder()
            .key(self.api_key.expose())
            .map_err(|e| FeedError::Authentication(e.to_string()))?
            .dataset(&self.dataset)
            .build()
            .await
            .map_err(|e| FeedError::Authentication(e.to_string()))?;

        info!(dataset = %self.dataset, "Connected to Databento");
        self.client = Some(client);
        Ok(())
    }

    async fn subscribe(&mut self, request: &SubscriptionRequest) -> Result<(), FeedError> {
        let subscription = to_subscription(request)?;
        self.client()?
            .subscribe(subscription)
            .await
            .map_err(|e| FeedError::Subscription {
                schema: request.schema,
                message: e.to_string(),
            })
    }

    async fn start(&mut self) -> Result<SessionMetadata, FeedError> {
        let metadata = self
            .client()?
            .start()
            .await
            .map_err(|e| FeedError::Transport(e.to_string()))?;
        debug!(version = metadata.version, "Received session metadata");
        Ok(SessionMetadata::from_dbn(metadata)?)
    }

    async fn next_record(&mut self) -> Result<Option<StreamRecord>, FeedError> {
        let record = self
            .client()?
            .next_record()
            .await
            .map_err(|e| FeedError::Transport(e.to_string()))?;
        match record {
            Some(record) => Ok(Some(decode_record(record)?)),
            None => Ok(None),
        }
    }

    async fn stop(&mut self) -> Result<(), FeedError> {
        let Some(mut client) = self.client.take() else {
            return Ok(());
        };
        client
            .close()
            .await
            .map_err(|e| FeedError::Transport(e.to_string()))?;
        info!(dataset = %self.dataset, "Disconnected from Databento");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use chrono::{TimeZone, Utc};
    use databento::dbn::RecordHeader;
    use test_case::test_case;

    use super::*;

    #[test_case(rtype::MBP_0, Route::Trade ; "trade")]
    #[test_case(rtype::OHLCV_1M, Route::Bar ; "minute bar")]
    #[test_case(rtype::SYMBOL_MAPPING, Route::SymbolMapping ; "mapping")]
    #[test_case(rtype::MBP_1, Route::Ignored(RecordKind::Quote) ; "quote")]
    #[test_case(rtype::BBO_1S, Route::Ignored(RecordKind::Quote) ; "bbo")]
    #[test_case(rtype::MBO, Route::Ignored(RecordKind::BookDelta) ; "mbo")]
    #[test_case(rtype::OHLCV_1D, Route::Ignored(RecordKind::OtherBar) ; "daily bar")]
    #[test_case(rtype::IMBALANCE, Route::Ignored(RecordKind::Imbalance) ; "imbalance")]
    #[test_case(rtype::STATUS, Route::Ignored(RecordKind::Status) ; "status")]
    #[test_case(rtype::INSTRUMENT_DEF, Route::Ignored(RecordKind::InstrumentDefinition) ; "definition")]
    #[test_case(rtype::ERROR, Route::Ignored(RecordKind::ErrorNotice) ; "error")]
    #[test_case(rtype::SYSTEM, Route::Ignored(RecordKind::SystemNotice) ; "system")]
    fn routes_known_tags(tag: u8, expected: Route) {
        assert_eq!(route(tag), expected);
    }

    #[test]
    fn unknown_tag_is_kept_as_unknown() {
        let msg = TradeMsg {
            hd: RecordHeader::new::<TradeMsg>(0xEE, 1, 42, 1_700_000_000_000_000_000),
            price: 1_000_000_000,
            size: 1,
            ..TradeMsg::default()
        };
        let expected = RecordRef::from(&msg).as_ref().to_vec();

        let decoded = decode_record(RecordRef::from(&msg)).unwrap();

        assert_eq!(decoded.record(), &FeedRecord::Ignored(RecordKind::Unknown(0xEE)));
        assert_eq!(decoded.raw(), expected.as_slice());
    }

    #[test]
    fn decodes_trade_with_verbatim_bytes() {
        let msg = TradeMsg {
            hd: RecordHeader::new::<TradeMsg>(rtype::MBP_0, 1, 42, 1_700_000_000_000_500_000),
            price: 100_250_000_000,
            size: 10,
            ..TradeMsg::default()
        };
        let expected = RecordRef::from(&msg).as_ref().to_vec();

        let decoded = decode_record(RecordRef::from(&msg)).unwrap();

        assert_eq!(decoded.raw(), expected.as_slice());
        assert_eq!(
            decoded.record(),
            &FeedRecord::Trade(TradeEvent {
                instrument_id: 42,
                publisher_id: 1,
                ts_event: 1_700_000_000_000_500_000,
                price: 100_250_000_000,
                size: 10,
            })
        );
    }

    #[test]
    fn decodes_minute_bar() {
        let msg = OhlcvMsg {
            hd: RecordHeader::new::<OhlcvMsg>(rtype::OHLCV_1M, 2, 7, 60_000_000_000),
            open: 1,
            high: 4,
            low: 0,
            close: 3,
            volume: 99,
        };

        let decoded = decode_record(RecordRef::from(&msg)).unwrap();

        assert!(matches!(
            decoded.record(),
            FeedRecord::Bar(BarEvent {
                instrument_id: 7,
                volume: 99,
                ..
            })
        ));
    }

    #[test]
    fn hourly_bar_is_ignored() {
        let msg = OhlcvMsg {
            hd: RecordHeader::new::<OhlcvMsg>(rtype::OHLCV_1H, 2, 7, 0),
            open: 1,
            high: 1,
            low: 1,
            close: 1,
            volume: 1,
        };

        let decoded = decode_record(RecordRef::from(&msg)).unwrap();

        assert_eq!(decoded.record(), &FeedRecord::Ignored(RecordKind::OtherBar));
        assert_eq!(decoded.raw().len(), std::mem::size_of::<OhlcvMsg>());
    }

    #[test]
    fn subscription_carries_start_and_snapshot() {
        let request = SubscriptionRequest {
            schema: FeedSchema::Ohlcv1m,
            stype_in: Symbology::RawSymbol,
            symbols: vec!["XYZ".to_string()],
            start: Some(Utc.timestamp_opt(1_700_000_000, 0).unwrap()),
            snapshot: true,
        };

        let subscription = to_subscription(&request).unwrap();

        assert_eq!(subscription.schema, Schema::Ohlcv1M);
        assert_eq!(subscription.stype_in, SType::RawSymbol);
        assert!(subscription.use_snapshot);
        assert_eq!(
            subscription.start.map(time::OffsetDateTime::unix_timestamp),
            Some(1_700_000_000)
        );
    }

    #[test]
    fn api_key_is_not_debug_printed() {
        let feed = DatabentoFeed::new(ApiKey::new("db-secret".into()), "TEST".into());
        assert!(!format!("{feed:?}").contains("db-secret"));
    }
}
