//! Snapshot → poll → restore handshake that turns one workspace into N.

use crate::cleanup::ForkedWorkspaces;
use crate::error::ForkError;
use futures::stream::{FuturesUnordered, StreamExt};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::{sleep, sleep_until, Instant};
use tracing::{debug, info, instrument, warn};
use wsfork_gateway::{Gateway, SnapshotStatus, WorkspaceHandle};

/// Floor applied to the poll interval so a zero interval cannot spin.
pub const MIN_POLL_INTERVAL: Duration = Duration::from_millis(10);

#[derive(Debug, Clone)]
pub struct ForkOptions {
    /// Raised to [`MIN_POLL_INTERVAL`] when smaller.
    pub poll_interval: Duration,
    /// Consecutive status errors tolerated before failing with
    /// [`ForkError::PollUnreachable`]. `None` leaves only the wall-clock deadline.
    pub max_poll_failures: Option<u32>,
    pub delete_trigger: bool,
}

impl Default for ForkOptions {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_secs(1),
            max_poll_failures: Some(10),
            delete_trigger: false,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct ForkEngine {
    options: ForkOptions,
}

impl ForkEngine {
    pub fn new(options: ForkOptions) -> Self {
        Self { options }
    }

    /// Produce `count` new workspaces seeded from the current state of `source`.
    ///
    /// The source is only snapshotted, never modified. Either exactly `count`
    /// handles come back, in restore order, or an error does and no restored
    /// workspace is left behind (short of ones listed in [`ForkError::Restore`]).
    /// A `count` of zero returns immediately without contacting the gateway.
    ///
    /// Dropping the returned future part way deletes whatever was already
    /// restored. A timeout too large to represent means no deadline.
    pub async fn fork(
        &self,
        source: &WorkspaceHandle,
        count: usize,
        timeout: Duration,
    ) -> Result<Vec<WorkspaceHandle>, ForkError> {
        self.fork_guarded(source, count, timeout)
            .await
            .map(ForkedWorkspaces::into_workspaces)
    }

    #[instrument(skip(self, source), fields(source = %source.id()))]
    pub(crate) async fn fork_guarded(
        &self,
        source: &WorkspaceHandle,
        count: usize,
        timeout: Duration,
    ) -> Result<ForkedWorkspaces, ForkError> {
        if count == 0 {
            debug!("Nothing to fork");
            return Ok(ForkedWorkspaces::default());
        }

        let trigger = source
            .create_snapshot_trigger()
            .await
            .map_err(ForkError::Trigger)?;
        info!(trigger = %trigger.name, "Snapshot trigger created");

        let gateway = source.gateway();
        let snapshot = self.wait_for_snapshot(gateway, &trigger.name, timeout).await?;
        info!(trigger = %trigger.name, snapshot = %snapshot, "Snapshot ready");

        let forked = restore_all(gateway, &snapshot, count).await?;
        info!(snapshot = %snapshot, count, "Forked workspaces restored");

        if self.options.delete_trigger {
            if let Err(e) = gateway.delete_snapshot_trigger(&trigger.name).await {
                warn!(trigger = %trigger.name, "Failed to delete snapshot trigger: {}", e);
            }
        }

        Ok(forked)
    }

    async fn wait_for_snapshot(
        &self,
        gateway: &Arc<dyn Gateway>,
        trigger: &str,
        timeout: Duration,
    ) -> Result<String, ForkError> {
        let deadline = Instant::now().checked_add(timeout);
        let interval = self.options.poll_interval.max(MIN_POLL_INTERVAL);
        let mut consecutive_failures = 0u32;

        loop {
            match gateway.snapshot_status(trigger).await {
                Ok(SnapshotStatus::Ready { snapshot_name }) => return Ok(snapshot_name),
                Ok(SnapshotStatus::Failed { reason }) => {
                    return Err(ForkError::SnapshotFailed {
                        trigger: trigger.to_string(),
                        reason,
                    });
                }
                Ok(SnapshotStatus::Pending) => {
                    consecutive_failures = 0;
                    debug!(trigger, "Snapshot pending");
                }
                Err(e) => {
                    // The endpoint erroring is read as "not ready yet".
                    consecutive_failures += 1;
                    warn!(trigger, attempt = consecutive_failures, "Snapshot status unavailable: {}", e);

                    if let Some(limit) = self.options.max_poll_failures {
                        if consecutive_failures >= limit {
                            return Err(ForkError::PollUnreachable {
                                trigger: trigger.to_string(),
                                attempts: consecutive_failures,
                                source: e,
                            });
                        }
                    }
                }
            }

            let now = Instant::now();
            let Some(deadline) = deadline else {
                sleep(interval).await;
                continue;
            };
            if now >= deadline {
                return Err(ForkError::Timeout {
                    trigger: trigger.to_string(),
                    timeout,
                });
            }

            // One last poll lands exactly on the deadline.
            let next = now.checked_add(interval).map_or(deadline, |next| next.min(deadline));
            sleep_until(next).await;
        }
    }
}

/// Issue `count` restores concurrently, keeping results in issue order.
///
/// Each restored workspace is owned by the returned guard from the moment its
/// restore completes. On any failure the ones already created are deleted
/// before the error is returned.
async fn restore_all(
    gateway: &Arc<dyn Gateway>,
    snapshot: &str,
    count: usize,
) -> Result<ForkedWorkspaces, ForkError> {
    let mut pending: FuturesUnordered<_> = (0..count)
        .map(|index| async move { (index, gateway.restore_snapshot(snapshot).await) })
        .collect();

    let mut forked = ForkedWorkspaces::default();
    let mut positions = Vec::with_capacity(count);
    let mut first_error = None;
    while let Some((index, outcome)) = pending.next().await {
        match outcome {
            Ok(id) => {
                forked.push(WorkspaceHandle::new(id, Arc::clone(gateway)));
                positions.push(index);
            }
            Err(e) => {
                warn!(snapshot, "Restore failed: {}", e);
                first_error.get_or_insert(e);
            }
        }
    }

    let Some(source) = first_error else {
        let mut ordered: Vec<_> = positions.into_iter().zip(forked.into_workspaces()).collect();
        ordered.sort_by_key(|(index, _)| *index);
        return Ok(ForkedWorkspaces::new(
            ordered.into_iter().map(|(_, workspace)| workspace).collect(),
        ));
    };

    let created = forked.len();
    warn!(
        snapshot,
        created,
        requested = count,
        "Partial restore, deleting workspaces already created"
    );
    let leaked = forked
        .release()
        .await
        .into_iter()
        .map(|warning| warning.workspace_id)
        .collect();

    Err(ForkError::Restore {
        snapshot: snapshot.to_string(),
        requested: count,
        created,
        leaked,
        source,
    })
}
