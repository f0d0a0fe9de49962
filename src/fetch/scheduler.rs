//! Fetch cycle scheduler
//!
//! This module handles:
//! - Fanning out one worker task per source
//! - Global concurrency limiting via a semaphore
//! - The per-source retry state machine with exponential backoff
//! - Cancellation at every suspension point
//! - Handing bodies to the normalizer and results to storage
//!
//! Outcomes are returned in the order the sources were given, whatever
//! order the workers finish in.

use crate::config::{Settings, SourceDescriptor};
use crate::fetch::backoff::RetryPolicy;
use crate::fetch::fetcher::{build_http_client, fetch_source, FetchError};
use crate::fetch::outcome::FetchOutcome;
use crate::normalize::{normalize_with_options, NormalizeOptions};
use crate::state::TaskState;
use crate::storage::{now_rfc3339, Storage, StorageError, StorageResult};
use crate::FeedError;
use reqwest::Client;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Semaphore;
use tokio::task::JoinError;
use tokio_util::sync::CancellationToken;
use tracing::Instrument;

/// Runs fetch cycles over a set of sources against one store
///
/// The scheduler coordinates:
/// - Global concurrency limits (max sources fetching at once)
/// - Per-source retries with exponential backoff and jitter
/// - Persistence of normalized items and one audit record per source
pub struct Scheduler<S> {
    storage: Arc<S>,
    client: Client,
    settings: Settings,
}

impl<S> Scheduler<S>
where
    S: Storage + Send + Sync + 'static,
{
    /// Creates a new scheduler with its own HTTP client
    ///
    /// # Arguments
    ///
    /// * `storage` - The store shared by all workers
    /// * `settings` - Concurrency, timeout and retry settings
    ///
    /// # Returns
    ///
    /// * `Ok(Scheduler)` - Ready to run cycles
    /// * `Err(FeedError::Http)` - The HTTP client could not be built
    pub fn new(storage: Arc<S>, settings: Settings) -> Result<Self, FeedError> {
        let client = build_http_client(&settings.user_agent)?;
        Ok(Self::with_client(storage, settings, client))
    }

    /// Creates a scheduler around an existing HTTP client
    pub fn with_client(storage: Arc<S>, settings: Settings, client: Client) -> Self {
        Self {
            storage,
            client,
            settings,
        }
    }

    /// Runs one fetch cycle over `sources`
    ///
    /// Every source gets exactly one outcome, in input order. A failing source
    /// never stops the others. When `cancel` fires, waiting and retrying
    /// workers stop and report `Cancelled`; work already persisted stays.
    ///
    /// # Arguments
    ///
    /// * `sources` - Validated source descriptors
    /// * `cancel` - Shared cancellation signal
    ///
    /// # Returns
    ///
    /// * `Ok(Vec<FetchOutcome>)` - One outcome per source
    /// * `Err(FeedError::Storage)` - The store became unusable during the cycle
    pub async fn run_cycle(
        &self,
        sources: &[SourceDescriptor],
        cancel: &CancellationToken,
    ) -> Result<Vec<FetchOutcome>, FeedError> {
        let started = Instant::now();
        let concurrency = self.settings.max_concurrency.max(1);
        tracing::info!(
            "Starting fetch cycle over {} sources (concurrency {})",
            sources.len(),
            concurrency
        );

        let semaphore = Arc::new(Semaphore::new(concurrency));
        // Child token: a fatal storage error stops this cycle without
        // cancelling the caller's token
        let cycle_cancel = cancel.child_token();
        let policy = RetryPolicy::from_settings(&self.settings);

        let handles: Vec<_> = sources
            .iter()
            .map(|source| {
                let worker = SourceWorker {
                    client: self.client.clone(),
                    storage: Arc::clone(&self.storage),
                    semaphore: Arc::clone(&semaphore),
                    cancel: cycle_cancel.clone(),
                    policy,
                    timeout: source.timeout(&self.settings),
                    source: source.clone(),
                    state: TaskState::Pending,
                };
                let span = tracing::info_span!("source", name = %source.name);
                tokio::spawn(worker.run().instrument(span))
            })
            .collect();

        let mut outcomes = Vec::with_capacity(sources.len());
        let mut fatal: Option<StorageError> = None;

        for (source, handle) in sources.iter().zip(handles) {
            let result = match handle.await {
                Ok(result) => result,
                Err(join_error) => {
                    self.lost_worker_outcome(source, join_error, &cycle_cancel)
                        .await
                }
            };
            let outcome = match result {
                Ok(outcome) => outcome,
                Err(e) => {
                    let outcome =
                        FetchOutcome::failed(&source.name, Duration::ZERO, 0, e.to_string(), vec![]);
                    fatal.get_or_insert(e);
                    outcome
                }
            };
            outcomes.push(outcome);
        }

        if let Some(e) = fatal {
            tracing::error!("Fetch cycle aborted: {}", e);
            return Err(e.into());
        }

        let succeeded = outcomes.iter().filter(|o| o.success).count();
        let cancelled = outcomes.iter().filter(|o| o.is_cancelled()).count();
        let new_items: u64 = outcomes.iter().map(|o| o.new_item_count).sum();
        tracing::info!(
            "Fetch cycle finished in {:.2}s: {} succeeded, {} failed, {} cancelled, {} new items",
            started.elapsed().as_secs_f64(),
            succeeded,
            outcomes.len() - succeeded - cancelled,
            cancelled,
            new_items
        );

        Ok(outcomes)
    }

    /// Fails and audits a source whose worker task died without an outcome
    async fn lost_worker_outcome(
        &self,
        source: &SourceDescriptor,
        join_error: JoinError,
        cancel: &CancellationToken,
    ) -> Result<FetchOutcome, StorageError> {
        tracing::error!("Worker for {} did not finish: {}", source.name, join_error);
        let outcome = FetchOutcome::failed(
            &source.name,
            Duration::ZERO,
            0,
            format!("worker task failed: {}", join_error),
            vec![],
        );
        log_outcome(&self.storage, cancel, &outcome, &now_rfc3339()).await?;
        Ok(outcome)
    }
}

/// Everything one source task owns for the duration of a cycle
struct SourceWorker<S> {
    client: Client,
    storage: Arc<S>,
    semaphore: Arc<Semaphore>,
    cancel: CancellationToken,
    policy: RetryPolicy,
    timeout: Duration,
    source: SourceDescriptor,
    state: TaskState,
}

impl<S> SourceWorker<S>
where
    S: Storage + Send + Sync + 'static,
{
    fn advance(&mut self, next: TaskState) {
        debug_assert!(
            self.state.can_transition_to(next),
            "illegal transition {} -> {}",
            self.state,
            next
        );
        tracing::trace!("{} -> {}", self.state, next);
        self.state = next;
    }

    /// Drives the source from Pending to a terminal state
    ///
    /// Only a fatal storage error is returned as `Err`.
    async fn run(mut self) -> Result<FetchOutcome, StorageError> {
        let name = self.source.name.clone();

        let _permit = tokio::select! {
            biased;
            _ = self.cancel.cancelled() => {
                tracing::debug!("Cancelled while waiting for a slot");
                self.advance(TaskState::Cancelled);
                return Ok(FetchOutcome::cancelled(&name, Duration::ZERO, 0));
            }
            permit = Arc::clone(&self.semaphore).acquire_owned() => match permit {
                Ok(permit) => permit,
                Err(_) => return Ok(FetchOutcome::cancelled(&name, Duration::ZERO, 0)),
            },
        };

        if self.cancel.is_cancelled() {
            self.advance(TaskState::Cancelled);
            return Ok(FetchOutcome::cancelled(&name, Duration::ZERO, 0));
        }

        let attempted_at = now_rfc3339();
        let started = Instant::now();
        let (result, attempts) = self.fetch_with_retry().await;

        let outcome = match result {
            Ok(body) => self.ingest(&body, started, attempts).await?,
            Err(FetchError::Cancelled) => {
                tracing::info!("Cancelled after {} attempt(s)", attempts);
                FetchOutcome::cancelled(&name, started.elapsed(), attempts)
            }
            Err(e) => {
                tracing::warn!("Giving up after {} attempt(s): {}", attempts, e);
                FetchOutcome::failed(&name, started.elapsed(), attempts, e.to_string(), vec![])
            }
        };
        self.advance(outcome.state);

        self.record(&outcome, &attempted_at).await?;

        if outcome.success {
            tracing::info!(
                "Fetched {} items ({} new, {} warnings) in {}ms",
                outcome.item_count,
                outcome.new_item_count,
                outcome.warnings.len(),
                outcome.duration.as_millis()
            );
        }

        Ok(outcome)
    }

    /// Runs the Fetching/Retrying loop
    ///
    /// Returns the body or the last error, plus the number of attempts made.
    async fn fetch_with_retry(&mut self) -> (Result<Vec<u8>, FetchError>, u32) {
        let max_attempts = self.policy.max_attempts();
        let mut attempt = 0;

        loop {
            attempt += 1;
            self.advance(TaskState::Fetching);
            tracing::debug!("Attempt {}/{}: GET {}", attempt, max_attempts, self.source.url);

            let result = tokio::select! {
                biased;
                _ = self.cancel.cancelled() => Err(FetchError::Cancelled),
                result = fetch_source(&self.client, &self.source, self.timeout) => result,
            };

            match result {
                Ok(body) => return (Ok(body), attempt),
                Err(e) if e.is_retryable() && attempt < max_attempts => {
                    let delay = self.policy.delay_for(attempt);
                    tracing::warn!(
                        "Attempt {}/{} failed: {}; retrying in {}ms",
                        attempt,
                        max_attempts,
                        e,
                        delay.as_millis()
                    );
                    self.advance(TaskState::Retrying);

                    tokio::select! {
                        biased;
                        _ = self.cancel.cancelled() => return (Err(FetchError::Cancelled), attempt),
                        _ = tokio::time::sleep(delay) => {}
                    }
                }
                Err(e) => return (Err(e), attempt),
            }
        }
    }

    /// Normalizes a fetched body and persists the items
    async fn ingest(
        &mut self,
        body: &[u8],
        started: Instant,
        attempts: u32,
    ) -> Result<FetchOutcome, StorageError> {
        let name = self.source.name.clone();
        let options = NormalizeOptions {
            keep_raw: self.source.keep_raw,
            max_items: self.source.max_items,
        };
        let normalized = normalize_with_options(&name, self.source.shape, body, &options);

        for warning in &normalized.warnings {
            tracing::warn!("{}", warning);
        }

        if let Some(feed_error) = normalized.feed_error {
            return Ok(FetchOutcome::failed(
                &name,
                started.elapsed(),
                attempts,
                feed_error,
                normalized.warnings,
            ));
        }

        let items = normalized.items;
        let item_count = items.len() as u64;
        let storage = Arc::clone(&self.storage);
        let source = name.clone();

        let persisted = tokio::task::spawn_blocking(move || -> StorageResult<u64> {
            let before = storage.count_items(&source)?;
            storage.upsert_items(&items)?;
            let after = storage.count_items(&source)?;
            Ok(after.saturating_sub(before))
        })
        .await;

        let error = match persisted {
            Ok(Ok(new_items)) => {
                return Ok(FetchOutcome::success(
                    &name,
                    started.elapsed(),
                    attempts,
                    item_count,
                    new_items,
                    normalized.warnings,
                ))
            }
            Ok(Err(e)) if e.is_fatal() => {
                self.cancel.cancel();
                return Err(e);
            }
            Ok(Err(e)) => format!("storage error: {}", e),
            Err(join_error) => format!("storage task failed: {}", join_error),
        };

        tracing::error!("Could not persist items: {}", error);
        Ok(FetchOutcome::failed(
            &name,
            started.elapsed(),
            attempts,
            error,
            normalized.warnings,
        ))
    }

    async fn record(&self, outcome: &FetchOutcome, attempted_at: &str) -> StorageResult<()> {
        log_outcome(&self.storage, &self.cancel, outcome, attempted_at).await
    }
}

/// Appends the audit record for `outcome`
///
/// A fatal storage error cancels `cancel` and is returned; anything else is
/// logged and swallowed.
async fn log_outcome<S>(
    storage: &Arc<S>,
    cancel: &CancellationToken,
    outcome: &FetchOutcome,
    attempted_at: &str,
) -> StorageResult<()>
where
    S: Storage + Send + Sync + 'static,
{
    let Some(record) = outcome.audit_record(attempted_at) else {
        return Ok(());
    };

    let storage = Arc::clone(storage);
    match tokio::task::spawn_blocking(move || storage.log_attempt(&record)).await {
        Ok(Ok(())) => Ok(()),
        Ok(Err(e)) if e.is_fatal() => {
            cancel.cancel();
            Err(e)
        }
        Ok(Err(e)) => {
            tracing::warn!("Failed to log fetch attempt: {}", e);
            Ok(())
        }
        Err(join_error) => {
            tracing::warn!("Failed to log fetch attempt: {}", join_error);
            Ok(())
        }
    }
}
