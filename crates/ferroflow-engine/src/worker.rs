// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Worker pool draining the ready queue.
//!
//! Workers are long-lived tasks sharing one bounded queue of claimed,
//! set-up instances. Each worker interprets one instance at a time; an
//! in-flight run always completes before the worker observes shutdown.

use std::sync::Arc;

use tokio::sync::{mpsc, watch, Mutex};
use tracing::info;

use ferroflow_core::{Workflow, WorkflowRecord};

use crate::interpreter;
use crate::manager::EngineShared;

/// One claimed instance ready for interpretation.
pub(crate) struct WorkItem {
    pub workflow: Box<dyn Workflow>,
    pub record: WorkflowRecord,
}

/// Long-lived worker task: pull one item, run it, repeat.
pub(crate) async fn worker_loop(
    worker_id: usize,
    shared: Arc<EngineShared>,
    queue: Arc<Mutex<mpsc::Receiver<WorkItem>>>,
    mut shutdown: watch::Receiver<bool>,
) {
    loop {
        let item = tokio::select! {
            biased;

            changed = shutdown.changed() => {
                if changed.is_err() || *shutdown.borrow() {
                    info!(worker_id, "worker shutting down");
                    break;
                }
                continue;
            }

            item = recv_next(&queue) => item,
        };

        match item {
            Some(item) => {
                interpreter::run_workflow(&shared, item.workflow, item.record, worker_id).await;
            }
            None => {
                info!(worker_id, "workflow queue closed");
                break;
            }
        }
    }
}

async fn recv_next(queue: &Arc<Mutex<mpsc::Receiver<WorkItem>>>) -> Option<WorkItem> {
    queue.lock().await.recv().await
}
