//! Concurrent snapshot resolution for a shortlist.
//!
//! Fire-all, join-all: one task per identifier on a `JoinSet`, bounded by a
//! semaphore, each request under its own timeout. The call returns only after
//! every task has finished, so the tracker always sees a settled batch.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use market::{MarketError, Snapshot, SnapshotSource};
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{debug, error, instrument, warn};

enum FetchOutcome {
    Resolved(Snapshot),
    Failed(MarketError),
    TimedOut,
}

pub struct SnapshotFetcher {
    source: Arc<dyn SnapshotSource>,
    timeout: Duration,
    permits: Arc<Semaphore>,
}

impl SnapshotFetcher {
    pub fn new(source: Arc<dyn SnapshotSource>, timeout: Duration, max_in_flight: usize) -> Self {
        Self {
            source,
            timeout,
            permits: Arc::new(Semaphore::new(max_in_flight.max(1))),
        }
    }

    /// Resolves a snapshot per identifier. Failed or timed-out identifiers are
    /// simply absent from the result.
    #[instrument(skip_all, level = "debug")]
    pub async fn fetch<I, S>(&self, identifiers: I) -> HashMap<String, Snapshot>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut tasks = JoinSet::new();

        for identifier in identifiers {
            let identifier: String = identifier.into();
            let source = Arc::clone(&self.source);
            let permits = Arc::clone(&self.permits);
            let timeout = self.timeout;

            tasks.spawn(async move {
                // The semaphore is never closed, so acquisition only waits.
                let _permit = permits.acquire_owned().await.ok();

                let outcome = match tokio::time::timeout(timeout, source.fetch_snapshot(&identifier))
                    .await
                {
                    Ok(Ok(snapshot)) => FetchOutcome::Resolved(snapshot),
                    Ok(Err(e)) => FetchOutcome::Failed(e),
                    Err(_) => FetchOutcome::TimedOut,
                };
                (identifier, outcome)
            });
        }

        let requested = tasks.len();
        let mut resolved = HashMap::with_capacity(requested);

        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok((identifier, FetchOutcome::Resolved(snapshot))) => {
                    resolved.insert(identifier, snapshot);
                }
                Ok((identifier, FetchOutcome::Failed(e))) => {
                    warn!(identifier = %identifier, error = %e, "snapshot fetch failed; skipped this cycle");
                }
                Ok((identifier, FetchOutcome::TimedOut)) => {
                    warn!(
                        identifier = %identifier,
                        timeout_ms = self.timeout.as_millis() as u64,
                        "snapshot fetch timed out; skipped this cycle"
                    );
                }
                Err(e) => {
                    error!(error = ?e, "snapshot task aborted");
                }
            }
        }

        debug!(requested, resolved = resolved.len(), "snapshot batch settled");

        resolved
    }
}
