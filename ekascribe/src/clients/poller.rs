//! Bounded status polling
//!
//! State diagram:
//! ```text
//! Polling ──all outputs terminal──> Complete
//!    │  │
//!    │  └──elapsed >= max_duration──> TimedOut
//!    └──────cancellation token────> Cancelled
//! ```
//!
//! A failed status fetch keeps the poller in `Polling`; only the deadline
//! and cancellation end it without a result.

use std::time::Duration;

use async_trait::async_trait;
use ekascribe_protocol::{StatusResponse, TranscriptionStatus};
use log::{debug, error, info, warn};
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use super::client::{error_body, EkaClient};
use super::error::{PollError, StatusFetchError};
use super::session::Session;

const STATUS_PATH: &str = "/voice/api/v3/status";

pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(5);
pub const DEFAULT_MAX_POLL_DURATION: Duration = Duration::from_secs(300);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollConfig {
    /// Wait between two status fetches
    pub interval: Duration,
    /// Deadline measured from the start of polling
    pub max_duration: Duration,
}

impl Default for PollConfig {
    fn default() -> Self {
        Self {
            interval: DEFAULT_POLL_INTERVAL,
            max_duration: DEFAULT_MAX_POLL_DURATION,
        }
    }
}

/// Poller states
#[derive(Debug, Clone, Copy, PartialEq, Eq, strum::Display)]
pub enum PollState {
    /// Waiting for outputs to reach a terminal status
    Polling,
    /// Every output of the latest snapshot is terminal
    Complete,
    /// The deadline elapsed first
    TimedOut,
    /// The caller stopped the wait
    Cancelled,
}

impl PollState {
    /// State after one fetch cycle.
    ///
    /// Completion is checked before the deadline, so a snapshot fetched in
    /// time is never discarded.
    pub fn after_cycle(
        snapshot: Option<&TranscriptionStatus>,
        elapsed: Duration,
        config: &PollConfig,
    ) -> Self {
        if snapshot.is_some_and(TranscriptionStatus::is_complete) {
            PollState::Complete
        } else if elapsed >= config.max_duration {
            PollState::TimedOut
        } else {
            PollState::Polling
        }
    }
}

/// Source of status snapshots for one transaction
#[async_trait]
pub trait StatusSource: Send + Sync {
    async fn fetch_status(&self, transaction_id: &str)
        -> Result<TranscriptionStatus, StatusFetchError>;
}

/// The status endpoint of the API, bound to a session
pub struct StatusEndpoint<'a> {
    client: &'a EkaClient,
    session: &'a Session,
}

#[async_trait]
impl StatusSource for StatusEndpoint<'_> {
    async fn fetch_status(
        &self,
        transaction_id: &str,
    ) -> Result<TranscriptionStatus, StatusFetchError> {
        self.client.get_status(self.session, transaction_id).await
    }
}

impl EkaClient {
    /// Fetch one status snapshot of a transaction
    pub async fn get_status(
        &self,
        session: &Session,
        transaction_id: &str,
    ) -> Result<TranscriptionStatus, StatusFetchError> {
        let url = self.endpoint(&format!("{}/{}", STATUS_PATH, transaction_id));

        let response = session
            .authorize(self.api.get(&url))
            .send()
            .await
            .map_err(StatusFetchError::Request)?;

        if !response.status().is_success() {
            let (status, body) = error_body(response).await;
            return Err(StatusFetchError::Rejected { status, body });
        }

        let response: StatusResponse = response
            .json()
            .await
            .map_err(StatusFetchError::InvalidResponse)?;
        Ok(response.into())
    }

    pub fn status_endpoint<'a>(&'a self, session: &'a Session) -> StatusEndpoint<'a> {
        StatusEndpoint {
            client: self,
            session,
        }
    }

    /// Poll the transaction until every output is terminal.
    pub async fn poll_for_completion(
        &self,
        session: &Session,
        transaction_id: &str,
        config: &PollConfig,
        cancel: &CancellationToken,
    ) -> Result<TranscriptionStatus, PollError> {
        poll_for_completion(
            &self.status_endpoint(session),
            transaction_id,
            config,
            cancel,
        )
        .await
    }
}

/// Poll `source` until its snapshot is complete, the deadline elapses or
/// `cancel` fires.
///
/// Never waits past the deadline, including on a status request still in
/// flight, and never fetches more often than once per `config.interval`.
pub async fn poll_for_completion<S: StatusSource + ?Sized>(
    source: &S,
    transaction_id: &str,
    config: &PollConfig,
    cancel: &CancellationToken,
) -> Result<TranscriptionStatus, PollError> {
    let start = Instant::now();
    let deadline = start + config.max_duration;
    let mut attempts: u32 = 0;
    let mut last_error: Option<String> = None;

    info!(
        "Polling transaction {} every {:?} for up to {:?}",
        transaction_id, config.interval, config.max_duration
    );

    loop {
        if cancel.is_cancelled() {
            return Err(cancelled(transaction_id, start, attempts));
        }

        attempts += 1;
        let fetched = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(cancelled(transaction_id, start, attempts)),
            fetched = source.fetch_status(transaction_id) => fetched,
            _ = tokio::time::sleep_until(deadline) => {
                warn!(
                    "Status fetch {} for transaction {} still running at the deadline",
                    attempts, transaction_id
                );
                return Err(timed_out(transaction_id, start, attempts, last_error));
            }
        };

        let snapshot = match fetched {
            Ok(snapshot) => {
                debug!(
                    "Transaction {} attempt {} at {:.1}s: {} of {} output(s) pending",
                    transaction_id,
                    attempts,
                    start.elapsed().as_secs_f64(),
                    snapshot.pending_count(),
                    snapshot.outputs.len()
                );
                Some(snapshot)
            }
            Err(e) => {
                warn!(
                    "Status fetch {} for transaction {} failed: {}",
                    attempts, transaction_id, e
                );
                last_error = Some(e.to_string());
                None
            }
        };

        let elapsed = start.elapsed();
        let state = PollState::after_cycle(snapshot.as_ref(), elapsed, config);
        match state {
            PollState::Complete => {
                info!(
                    "Transaction {} complete after {} attempt(s) ({:.1}s)",
                    transaction_id,
                    attempts,
                    elapsed.as_secs_f64()
                );
                if let Some(snapshot) = snapshot {
                    return Ok(snapshot);
                }
            }
            PollState::TimedOut => {
                return Err(timed_out(transaction_id, start, attempts, last_error));
            }
            PollState::Polling | PollState::Cancelled => {}
        }

        let remaining = config.max_duration.saturating_sub(elapsed);
        let wait = config.interval.min(remaining);
        tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(cancelled(transaction_id, start, attempts)),
            _ = tokio::time::sleep(wait) => {}
        }
    }
}

fn timed_out(
    transaction_id: &str,
    start: Instant,
    attempts: u32,
    last_error: Option<String>,
) -> PollError {
    let elapsed = start.elapsed();
    error!(
        "Polling transaction {} timed out after {:.1}s",
        transaction_id,
        elapsed.as_secs_f64()
    );
    PollError::TimedOut {
        elapsed,
        attempts,
        last_error,
    }
}

fn cancelled(transaction_id: &str, start: Instant, attempts: u32) -> PollError {
    info!(
        "Polling transaction {} cancelled after {} attempt(s)",
        transaction_id, attempts
    );
    PollError::Cancelled {
        elapsed: start.elapsed(),
        attempts,
    }
}
