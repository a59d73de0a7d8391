// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Runnable FerroFlow example.
//!
//! Starts the engine plus HTTP control plane against SQLite (by default
//! `./gflow.db`) with the demo workflows registered. Create an instance
//! with:
//!
//! ```text
//! curl -X POST localhost:8080/api/workflows \
//!   -d '{"externalId":"e1","executorGroup":"default","workflowType":"GetIp","businessKey":"demo"}'
//! ```

mod workflows;

use std::sync::Arc;

use tracing::info;
use tracing_subscriber::EnvFilter;

use ferroflow_core::SystemClock;
use ferroflow_engine::{server, EngineConfig, WorkflowManager, WorkflowRegistry};
use ferroflow_store::schema;

use crate::workflows::{DemoChildWorkflow, DemoParentWorkflow, GetIpWorkflow};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::from_default_env().add_directive(tracing::Level::INFO.into()),
        )
        .init();

    if std::env::var("DATABASE_TYPE").is_err() {
        std::env::set_var("DATABASE_TYPE", "SQLITE");
    }
    let config = EngineConfig::from_env()?;

    let pool = ferroflow_store::connect(&config.connection_url()).await?;
    schema::ensure_schema(&pool, config.dialect).await?;

    let mut registry = WorkflowRegistry::new();
    registry.register("GetIp", || Box::new(GetIpWorkflow::default()));
    registry.register("DemoParent", || Box::new(DemoParentWorkflow::default()));
    registry.register("DemoChild", || Box::new(DemoChildWorkflow::default()));

    let server_port = config.server_port;
    let manager = WorkflowManager::new(pool, config, registry, Arc::new(SystemClock));
    let engine = manager.start().await?;

    let http = tokio::spawn(server::serve(
        manager.clone(),
        server_port,
        engine.shutdown_signal(),
    ));

    tokio::signal::ctrl_c().await?;
    info!("shutting down");
    engine.shutdown().await;
    let _ = http.await;
    Ok(())
}
