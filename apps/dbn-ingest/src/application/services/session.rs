//! Session Controller
//!
//! Owns one feed connection from setup to stop and runs the single
//! ingestion loop. Per iteration, strictly in order:
//!
//! 1. check the stop token
//! 2. pull the next record
//! 3. dispatch it (resolve, persist, or apply a mapping change)
//! 4. append its raw bytes to the archive
//!
//! Stops are cooperative: a record already pulled is always dispatched and
//! archived before the loop exits. A stop also interrupts a pull that is
//! still waiting on a quiet feed. Every exit path closes the archive once.

use std::sync::Arc;
use std::time::Instant;

use parking_lot::Mutex;
use tokio_util::sync::CancellationToken;
use tracing::{Instrument, debug, error, info, info_span, warn};
use uuid::Uuid;

use super::dispatcher::dispatch;
use crate::application::ports::{
    FeedClient, IngestMetrics, MarketStore, RecordArchive, SubscriptionRequest,
};
use crate::domain::metadata::SessionMetadata;
use crate::domain::session::{LifecycleError, SessionState, StreamEnd, StreamSummary};
use crate::domain::symbology::SymbolResolver;
use crate::error::{IngestError, SetupError};

/// Records between progress log lines.
const PROGRESS_INTERVAL: u64 = 10_000;

/// What the controller needs to bring a session up.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionConfig {
    /// Dataset identifier.
    pub dataset: String,
    /// Requests issued during setup, in order.
    pub subscriptions: Vec<SubscriptionRequest>,
}

// =============================================================================
// Shared State
// =============================================================================

#[derive(Debug)]
struct SessionShared {
    state: Mutex<SessionState>,
    cancel: CancellationToken,
    metrics: Arc<dyn IngestMetrics>,
}

impl SessionShared {
    fn advance(&self, next: SessionState) -> Result<(), LifecycleError> {
        let mut state = self.state.lock();
        if !state.can_transition_to(next) {
            return Err(LifecycleError::InvalidTransition {
                from: *state,
                to: next,
            });
        }
        *state = next;
        drop(state);
        self.metrics.set_session_state(next);
        Ok(())
    }

    fn finish(&self) {
        *self.state.lock() = SessionState::Stopped;
        self.metrics.set_session_state(SessionState::Stopped);
    }
}

/// Cloneable control surface for a running session.
#[derive(Debug, Clone)]
pub struct SessionHandle {
    id: Uuid,
    shared: Arc<SessionShared>,
}

impl SessionHandle {
    /// Session identifier.
    #[must_use]
    pub const fn id(&self) -> Uuid {
        self.id
    }

    /// Current lifecycle state.
    #[must_use]
    pub fn state(&self) -> SessionState {
        *self.shared.state.lock()
    }

    /// Whether a stop has been requested.
    #[must_use]
    pub fn is_stop_requested(&self) -> bool {
        self.shared.cancel.is_cancelled()
    }

    /// Ask the loop to exit at the next record boundary.
    ///
    /// Stopping a stopping or stopped session is a no-op.
    ///
    /// # Errors
    ///
    /// Returns [`LifecycleError::NotStarted`] if the stream is not being
    /// followed yet. The request is still latched, so a later
    /// `follow_stream` exits before pulling any record.
    pub fn stop(&self) -> Result<(), LifecycleError> {
        let mut state = self.shared.state.lock();
        match *state {
            SessionState::Streaming => {
                *state = SessionState::Stopping;
                drop(state);
                self.shared.metrics.set_session_state(SessionState::Stopping);
                self.shared.cancel.cancel();
                info!(session_id = %self.id, "Stop requested");
                Ok(())
            }
            SessionState::Stopping | SessionState::Stopped => Ok(()),
            _ => {
                drop(state);
                self.shared.cancel.cancel();
                Err(LifecycleError::NotStarted)
            }
        }
    }
}

// =============================================================================
// Session
// =============================================================================

/// One ingestion session. Started at most once.
pub struct StreamSession<F, S, A>
where
    F: FeedClient,
    S: MarketStore,
    A: RecordArchive,
{
    id: Uuid,
    config: SessionConfig,
    feed: F,
    store: Arc<S>,
    archive: A,
    resolver: SymbolResolver,
    metadata: SessionMetadata,
    metrics: Arc<dyn IngestMetrics>,
    shared: Arc<SessionShared>,
}

impl<F, S, A> StreamSession<F, S, A>
where
    F: FeedClient,
    S: MarketStore,
    A: RecordArchive,
{
    /// Bring a session up: authenticate, subscribe, migrate the store and
    /// start the feed.
    ///
    /// `archive` must already be open. On any failure it is closed before
    /// this returns. `metrics` receives state changes and per-record
    /// measurements. `cancel` stops the session from outside, like
    /// [`SessionHandle::stop`].
    ///
    /// # Errors
    ///
    /// Returns [`IngestError::Setup`] if any step fails.
    pub async fn connect(
        config: SessionConfig,
        mut feed: F,
        store: Arc<S>,
        mut archive: A,
        metrics: Arc<dyn IngestMetrics>,
        cancel: CancellationToken,
    ) -> Result<Self, IngestError> {
        let id = Uuid::new_v4();
        let shared = Arc::new(SessionShared {
            state: Mutex::new(SessionState::Created),
            cancel,
            metrics: Arc::clone(&metrics),
        });
        metrics.set_session_state(SessionState::Created);

        let span = info_span!("session", session_id = %id, dataset = %config.dataset);
        let setup = Self::setup(&config, &mut feed, store.as_ref(), &shared)
            .instrument(span)
            .await;

        match setup {
            Ok(metadata) => Ok(Self {
                id,
                config,
                feed,
                store,
                archive,
                resolver: SymbolResolver::new(),
                metadata,
                metrics,
                shared,
            }),
            Err(e) => {
                error!(session_id = %id, error = %e, "Session setup failed");
                shared.finish();
                if let Err(close) = archive.close() {
                    warn!(session_id = %id, error = %close, "Archive close after setup failure failed");
                }
                if let Err(stop) = feed.stop().await {
                    debug!(session_id = %id, error = %stop, "Feed stop after setup failure failed");
                }
                Err(e)
            }
        }
    }

    async fn setup(
        config: &SessionConfig,
        feed: &mut F,
        store: &S,
        shared: &SessionShared,
    ) -> Result<SessionMetadata, IngestError> {
        shared.advance(SessionState::Authenticating)?;
        feed.authenticate().await.map_err(SetupError::Authenticate)?;
        info!("Authenticated");

        shared.advance(SessionState::Subscribing)?;
        for request in &config.subscriptions {
            if request.symbols.is_empty() {
                warn!(schema = %request.schema, "No symbols given; subscription skipped");
                continue;
            }
            feed.subscribe(request)
                .await
                .map_err(|source| SetupError::Subscribe {
                    schema: request.schema,
                    source,
                })?;
            info!(
                schema = %request.schema,
                stype_in = %request.stype_in,
                symbols = request.symbols.len(),
                snapshot = request.snapshot,
                "Subscribed"
            );
        }

        store.migrate().await.map_err(SetupError::Migration)?;

        let metadata = feed.start().await.map_err(SetupError::Start)?;
        shared.advance(SessionState::Started)?;
        info!(
            start = metadata.start(),
            end = ?metadata.end(),
            mappings = metadata.mapping_count(),
            "Session started"
        );
        Ok(metadata)
    }

    /// Session identifier.
    #[must_use]
    pub const fn id(&self) -> Uuid {
        self.id
    }

    /// A handle for stopping the session from another task.
    #[must_use]
    pub fn handle(&self) -> SessionHandle {
        SessionHandle {
            id: self.id,
            shared: Arc::clone(&self.shared),
        }
    }

    /// Current lifecycle state.
    #[must_use]
    pub fn state(&self) -> SessionState {
        *self.shared.state.lock()
    }

    /// Resolver as it stands now.
    #[must_use]
    pub const fn resolver(&self) -> &SymbolResolver {
        &self.resolver
    }

    /// Run the ingestion loop until end of stream, a stop, or an error.
    ///
    /// # Errors
    ///
    /// Returns [`LifecycleError::AlreadyStarted`] on a second call, and
    /// otherwise the first decode, persistence, archival or feed error.
    pub async fn follow_stream(&mut self) -> Result<StreamSummary, IngestError> {
        self.shared
            .advance(SessionState::Streaming)
            .map_err(|_| LifecycleError::AlreadyStarted)?;

        let span = info_span!("session", session_id = %self.id, dataset = %self.config.dataset);
        let result = self.run().instrument(span).await;

        let closed = self.archive.close();
        if let Err(e) = self.feed.stop().await {
            debug!(session_id = %self.id, error = %e, "Feed stop failed");
        }
        self.shared.finish();

        match (result, closed) {
            (Ok(mut summary), Ok(())) => {
                summary.archived_bytes = self.archive.bytes_written();
                info!(
                    session_id = %self.id,
                    records = summary.records,
                    trades_inserted = summary.trades_inserted,
                    trades_duplicate = summary.trades_duplicate,
                    candles_inserted = summary.candles_inserted,
                    candles_duplicate = summary.candles_duplicate,
                    mapping_updates = summary.mapping_updates,
                    unresolved = summary.unresolved,
                    ignored = summary.ignored,
                    archived_bytes = summary.archived_bytes,
                    end = ?summary.end,
                    "Session stopped"
                );
                Ok(summary)
            }
            (Ok(_), Err(e)) => {
                error!(session_id = %self.id, error = %e, "Archive close failed");
                Err(e.into())
            }
            (Err(e), closed) => {
                if let Err(close) = closed {
                    warn!(session_id = %self.id, error = %close, "Archive close after failure failed");
                }
                error!(session_id = %self.id, error = %e, "Session aborted");
                Err(e)
            }
        }
    }

    async fn run(&mut self) -> Result<StreamSummary, IngestError> {
        let mut summary = StreamSummary::default();

        let header = self.metadata.header();
        self.archive.write_header(header)?;
        self.metrics.record_archived_bytes(header.len() as u64);

        let seeded = self
            .resolver
            .initialize(&self.metadata)
            .map_err(SetupError::Symbology)?;
        info!(seeded, "Streaming");

        loop {
            if self.shared.cancel.is_cancelled() {
                summary.end = StreamEnd::Stopped;
                break;
            }

            let pulled = tokio::select! {
                biased;
                () = self.shared.cancel.cancelled() => None,
                next = self.feed.next_record() => Some(next?),
            };
            let Some(next) = pulled else {
                debug!("Stop requested while waiting for a record");
                summary.end = StreamEnd::Stopped;
                break;
            };
            let Some(record) = next else {
                summary.end = StreamEnd::EndOfStream;
                break;
            };
            let started = Instant::now();
            self.metrics.record_received(record.record().label());

            let outcome = dispatch(record.record(), &mut self.resolver, self.store.as_ref()).await?;
            outcome.tally(&mut summary);
            outcome.record(self.metrics.as_ref());

            self.archive.append(record.raw())?;
            self.metrics.record_archived_bytes(record.raw().len() as u64);
            summary.records += 1;
            self.metrics.record_processing_duration(started.elapsed());

            if summary.records % PROGRESS_INTERVAL == 0 {
                info!(
                    records = summary.records,
                    trades = summary.trades_inserted,
                    candles = summary.candles_inserted,
                    "Progress"
                );
            }
        }

        Ok(summary)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::ports::NoopMetrics;

    fn shared(state: SessionState) -> SessionShared {
        SessionShared {
            state: Mutex::new(state),
            cancel: CancellationToken::new(),
            metrics: Arc::new(NoopMetrics),
        }
    }

    fn handle(state: SessionState) -> SessionHandle {
        SessionHandle {
            id: Uuid::nil(),
            shared: Arc::new(shared(state)),
        }
    }

    #[test]
    fn stop_while_streaming_moves_to_stopping() {
        let handle = handle(SessionState::Streaming);

        handle.stop().unwrap();

        assert_eq!(handle.state(), SessionState::Stopping);
        assert!(handle.is_stop_requested());
    }

    #[test]
    fn second_stop_is_a_no_op() {
        let handle = handle(SessionState::Streaming);
        handle.stop().unwrap();

        handle.stop().unwrap();

        assert_eq!(handle.state(), SessionState::Stopping);
    }

    #[test]
    fn stop_after_stopped_is_a_no_op() {
        let handle = handle(SessionState::Stopped);
        handle.stop().unwrap();
        assert_eq!(handle.state(), SessionState::Stopped);
    }

    #[test]
    fn stop_before_streaming_is_reported_but_latched() {
        let handle = handle(SessionState::Started);

        assert_eq!(handle.stop(), Err(LifecycleError::NotStarted));
        assert_eq!(handle.state(), SessionState::Started);
        assert!(handle.is_stop_requested());
    }

    #[test]
    fn advance_rejects_out_of_order_transition() {
        let shared = shared(SessionState::Created);
        assert!(matches!(
            shared.advance(SessionState::Streaming),
            Err(LifecycleError::InvalidTransition { .. })
        ));
        shared.advance(SessionState::Authenticating).unwrap();
    }
}
