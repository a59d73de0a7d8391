// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Schema bootstrap.
//!
//! Production deployments run managed migrations; this module exists for
//! embedded use, the demo binary, and the test harness. Every statement is
//! idempotent, so calling [`ensure_schema`] repeatedly is safe.
//!
//! Timestamps are TEXT on every backend (see the dialect module for the
//! serialization contract); identifier-like strings are VARCHAR on MySQL
//! because TEXT columns there cannot carry unique indexes.

use sqlx::AnyPool;

use crate::dialect::Dialect;
use crate::error::Result;

const SQLITE_SCHEMA: &[&str] = &[
    "CREATE TABLE IF NOT EXISTS workflow (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        status TEXT NOT NULL,
        execution_count BIGINT NOT NULL DEFAULT 0,
        retry_count BIGINT NOT NULL DEFAULT 0,
        created TEXT NOT NULL,
        modified TEXT NOT NULL,
        next_activation TEXT,
        started TEXT,
        executor_id BIGINT,
        executor_group TEXT NOT NULL,
        workflow_type TEXT NOT NULL,
        external_id TEXT NOT NULL,
        business_key TEXT NOT NULL,
        state TEXT NOT NULL,
        state_vars TEXT,
        parent_workflow_id BIGINT
    )",
    "CREATE TABLE IF NOT EXISTS workflow_actions (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        workflow_id BIGINT NOT NULL,
        executor_id BIGINT NOT NULL,
        execution_count BIGINT NOT NULL DEFAULT 0,
        retry_count BIGINT NOT NULL DEFAULT 0,
        type TEXT NOT NULL,
        name TEXT NOT NULL,
        text TEXT NOT NULL,
        date_time TEXT NOT NULL
    )",
    "CREATE TABLE IF NOT EXISTS executors (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        name TEXT NOT NULL,
        started TEXT NOT NULL,
        last_active TEXT NOT NULL
    )",
    "CREATE TABLE IF NOT EXISTS workflow_definitions (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        name TEXT NOT NULL,
        description TEXT NOT NULL,
        created TEXT NOT NULL,
        updated TEXT NOT NULL,
        flow_chart TEXT NOT NULL
    )",
    "CREATE TABLE IF NOT EXISTS users (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        username TEXT NOT NULL,
        password_hash TEXT NOT NULL,
        api_key TEXT,
        enabled INTEGER NOT NULL DEFAULT 1,
        session_id TEXT,
        session_expiry TEXT
    )",
    "CREATE UNIQUE INDEX IF NOT EXISTS idx_workflow_external_id ON workflow (external_id)",
    "CREATE INDEX IF NOT EXISTS idx_workflow_pending ON workflow (executor_group, status, next_activation)",
    "CREATE INDEX IF NOT EXISTS idx_workflow_parent ON workflow (parent_workflow_id)",
    "CREATE INDEX IF NOT EXISTS idx_workflow_actions_workflow ON workflow_actions (workflow_id, id DESC)",
    "CREATE INDEX IF NOT EXISTS idx_executors_last_active ON executors (last_active)",
    "CREATE UNIQUE INDEX IF NOT EXISTS idx_workflow_definitions_name ON workflow_definitions (name)",
    "CREATE UNIQUE INDEX IF NOT EXISTS idx_users_username ON users (username)",
];

const POSTGRES_SCHEMA: &[&str] = &[
    "CREATE TABLE IF NOT EXISTS workflow (
        id BIGSERIAL PRIMARY KEY,
        status TEXT NOT NULL,
        execution_count BIGINT NOT NULL DEFAULT 0,
        retry_count BIGINT NOT NULL DEFAULT 0,
        created TEXT NOT NULL,
        modified TEXT NOT NULL,
        next_activation TEXT,
        started TEXT,
        executor_id BIGINT,
        executor_group TEXT NOT NULL,
        workflow_type TEXT NOT NULL,
        external_id TEXT NOT NULL,
        business_key TEXT NOT NULL,
        state TEXT NOT NULL,
        state_vars TEXT,
        parent_workflow_id BIGINT
    )",
    "CREATE TABLE IF NOT EXISTS workflow_actions (
        id BIGSERIAL PRIMARY KEY,
        workflow_id BIGINT NOT NULL,
        executor_id BIGINT NOT NULL,
        execution_count BIGINT NOT NULL DEFAULT 0,
        retry_count BIGINT NOT NULL DEFAULT 0,
        type TEXT NOT NULL,
        name TEXT NOT NULL,
        text TEXT NOT NULL,
        date_time TEXT NOT NULL
    )",
    "CREATE TABLE IF NOT EXISTS executors (
        id BIGSERIAL PRIMARY KEY,
        name TEXT NOT NULL,
        started TEXT NOT NULL,
        last_active TEXT NOT NULL
    )",
    "CREATE TABLE IF NOT EXISTS workflow_definitions (
        id BIGSERIAL PRIMARY KEY,
        name TEXT NOT NULL,
        description TEXT NOT NULL,
        created TEXT NOT NULL,
        updated TEXT NOT NULL,
        flow_chart TEXT NOT NULL
    )",
    "CREATE TABLE IF NOT EXISTS users (
        id BIGSERIAL PRIMARY KEY,
        username TEXT NOT NULL,
        password_hash TEXT NOT NULL,
        api_key TEXT,
        enabled BOOLEAN NOT NULL DEFAULT TRUE,
        session_id TEXT,
        session_expiry TEXT
    )",
    "CREATE UNIQUE INDEX IF NOT EXISTS idx_workflow_external_id ON workflow (external_id)",
    "CREATE INDEX IF NOT EXISTS idx_workflow_pending ON workflow (executor_group, status, next_activation)",
    "CREATE INDEX IF NOT EXISTS idx_workflow_parent ON workflow (parent_workflow_id)",
    "CREATE INDEX IF NOT EXISTS idx_workflow_actions_workflow ON workflow_actions (workflow_id, id DESC)",
    "CREATE INDEX IF NOT EXISTS idx_executors_last_active ON executors (last_active)",
    "CREATE UNIQUE INDEX IF NOT EXISTS idx_workflow_definitions_name ON workflow_definitions (name)",
    "CREATE UNIQUE INDEX IF NOT EXISTS idx_users_username ON users (username)",
];

const MYSQL_SCHEMA: &[&str] = &[
    "CREATE TABLE IF NOT EXISTS workflow (
        id BIGINT NOT NULL AUTO_INCREMENT PRIMARY KEY,
        status VARCHAR(32) NOT NULL,
        execution_count BIGINT NOT NULL DEFAULT 0,
        retry_count BIGINT NOT NULL DEFAULT 0,
        created VARCHAR(32) NOT NULL,
        modified VARCHAR(32) NOT NULL,
        next_activation VARCHAR(32),
        started VARCHAR(32),
        executor_id BIGINT,
        executor_group VARCHAR(128) NOT NULL,
        workflow_type VARCHAR(128) NOT NULL,
        external_id VARCHAR(255) NOT NULL,
        business_key VARCHAR(255) NOT NULL,
        state VARCHAR(128) NOT NULL,
        state_vars TEXT,
        parent_workflow_id BIGINT,
        UNIQUE KEY idx_workflow_external_id (external_id),
        KEY idx_workflow_pending (executor_group, status, next_activation),
        KEY idx_workflow_parent (parent_workflow_id)
    )",
    "CREATE TABLE IF NOT EXISTS workflow_actions (
        id BIGINT NOT NULL AUTO_INCREMENT PRIMARY KEY,
        workflow_id BIGINT NOT NULL,
        executor_id BIGINT NOT NULL,
        execution_count BIGINT NOT NULL DEFAULT 0,
        retry_count BIGINT NOT NULL DEFAULT 0,
        type VARCHAR(32) NOT NULL,
        name VARCHAR(128) NOT NULL,
        text TEXT NOT NULL,
        date_time VARCHAR(32) NOT NULL,
        KEY idx_workflow_actions_workflow (workflow_id, id DESC)
    )",
    "CREATE TABLE IF NOT EXISTS executors (
        id BIGINT NOT NULL AUTO_INCREMENT PRIMARY KEY,
        name VARCHAR(255) NOT NULL,
        started VARCHAR(32) NOT NULL,
        last_active VARCHAR(32) NOT NULL,
        KEY idx_executors_last_active (last_active)
    )",
    "CREATE TABLE IF NOT EXISTS workflow_definitions (
        id BIGINT NOT NULL AUTO_INCREMENT PRIMARY KEY,
        name VARCHAR(128) NOT NULL,
        description TEXT NOT NULL,
        created VARCHAR(32) NOT NULL,
        updated VARCHAR(32) NOT NULL,
        flow_chart TEXT NOT NULL,
        UNIQUE KEY idx_workflow_definitions_name (name)
    )",
    "CREATE TABLE IF NOT EXISTS users (
        id BIGINT NOT NULL AUTO_INCREMENT PRIMARY KEY,
        username VARCHAR(128) NOT NULL,
        password_hash VARCHAR(255) NOT NULL,
        api_key VARCHAR(255),
        enabled BOOLEAN NOT NULL DEFAULT TRUE,
        session_id VARCHAR(255),
        session_expiry VARCHAR(32),
        UNIQUE KEY idx_users_username (username)
    )",
];

/// Create all tables and indices for the given backend if they are missing.
pub async fn ensure_schema(pool: &AnyPool, dialect: Dialect) -> Result<()> {
    let statements = match dialect {
        Dialect::Sqlite => SQLITE_SCHEMA,
        Dialect::Postgres => POSTGRES_SCHEMA,
        Dialect::MySql => MYSQL_SCHEMA,
    };
    for statement in statements {
        sqlx::query(statement).execute(pool).await?;
    }
    Ok(())
}
