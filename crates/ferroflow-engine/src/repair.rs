// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Stuck-instance repair service.
//!
//! Instances can be left claimed forever when their owning executor dies
//! mid-run. On a separate cadence from the poller, this service finds rows
//! whose `modified` is stale and whose owner has stopped heartbeating, locks
//! them through the usual `modified` CAS, and returns them to the claimable
//! pool. Any live executor in the group picks them up on its next tick,
//! which is what makes execution at-least-once.

use std::sync::Arc;

use tokio::sync::watch;
use tracing::{error, info, warn};

use ferroflow_core::ActionType;
use ferroflow_store::NewAction;

use crate::error::Result;
use crate::manager::EngineShared;

const REPAIR_BATCH_LIMIT: i64 = 100;

/// Background loop at `STUCK_INTERVAL` cadence.
pub(crate) async fn repair_loop(shared: Arc<EngineShared>, mut shutdown: watch::Receiver<bool>) {
    info!(
        interval_secs = shared.config.stuck_interval.as_secs(),
        cutoff_minutes = shared.config.stuck_after_minutes,
        "workflow repair service started"
    );

    loop {
        tokio::select! {
            biased;

            changed = shutdown.changed() => {
                if changed.is_err() || *shutdown.borrow() {
                    info!("workflow repair service shutting down");
                    break;
                }
            }

            _ = tokio::time::sleep(shared.config.stuck_interval) => {
                if let Err(err) = repair_once(&shared).await {
                    error!(error = %err, "error repairing stuck workflows");
                }
            }
        }
    }
}

/// One repair pass. Returns how many instances were freed.
pub(crate) async fn repair_once(shared: &EngineShared) -> Result<usize> {
    let stuck = shared
        .workflows
        .find_stuck(
            shared.config.stuck_after_minutes,
            &shared.config.executor_group,
            REPAIR_BATCH_LIMIT,
        )
        .await?;

    let mut repaired = 0;
    for workflow in stuck {
        warn!(
            workflow_id = workflow.id,
            business_key = %workflow.business_key,
            state = %workflow.state,
            status = %workflow.status,
            "repairing stuck workflow"
        );

        let previous_executor = workflow.executor_id;
        if !shared
            .workflows
            .lock_by_modified(workflow.id, workflow.modified)
            .await?
        {
            // Someone else touched the row since we read it; leave it be.
            continue;
        }

        shared
            .save_action(
                NewAction::new(
                    workflow.id,
                    shared.executor_id(),
                    ActionType::Repaired,
                    "REPAIRED",
                    format!(
                        "repaired and rescheduled, previous executor was {}",
                        previous_executor
                            .map(|id| id.to_string())
                            .unwrap_or_else(|| "unknown".to_string())
                    ),
                )
                .with_counts(workflow.execution_count, workflow.retry_count),
            )
            .await;

        // Make the row claimable right away: IN_PROGRESS, due now, unowned.
        shared
            .workflows
            .schedule_specific(workflow.id, shared.clock.now())
            .await?;
        shared.workflows.clear_executor(workflow.id).await?;
        repaired += 1;
    }

    Ok(repaired)
}
