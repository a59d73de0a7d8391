// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! FerroFlow execution engine.
//!
//! A durable, database-backed workflow engine: user state machines are
//! persisted as rows and executed cooperatively by any number of engine
//! processes. Each process runs a poller that claims due instances through
//! a `modified`-token compare-and-set, a bounded worker pool interpreting
//! them, a repair service that frees instances whose executor died, and a
//! heartbeat keeping this process's liveness row fresh.
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use ferroflow_core::SystemClock;
//! use ferroflow_engine::{EngineConfig, WorkflowManager, WorkflowRegistry};
//!
//! let config = EngineConfig::from_env()?;
//! let pool = ferroflow_store::connect(&config.connection_url()).await?;
//! let mut registry = WorkflowRegistry::new();
//! registry.register("GetIp", || Box::new(GetIpWorkflow::default()));
//!
//! let manager = WorkflowManager::new(pool, config, registry, Arc::new(SystemClock));
//! let engine = manager.start().await?;
//! // ...
//! engine.shutdown().await;
//! ```

pub mod config;
pub mod error;
mod interpreter;
pub mod manager;
pub mod registry;
mod repair;
pub mod server;
mod worker;

pub use config::{parse_duration, ConfigError, EngineConfig};
pub use error::{EngineError, Result};
pub use manager::{EngineHandle, WorkflowManager};
pub use registry::{flow_chart, RegistryError, WorkflowFactory, WorkflowRegistry};
