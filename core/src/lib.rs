// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Remedy core
//!
//! Deduplicates upstream failure patterns into reviewable suggestions and
//! manages their approval lifecycle.
//!
//! # Architecture
//!
//! - **domain:** aggregates, value objects, repository and provider traits, configuration
//! - **application:** deduplication orchestrator, lifecycle service, review queries
//! - **infrastructure:** embedding adapters, repositories, event bus, notifiers
//! - **presentation:** axum HTTP API

pub mod application;
pub mod domain;
pub mod infrastructure;
pub mod presentation;

pub use domain::*;
