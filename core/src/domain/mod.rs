// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! # Domain Layer
//!
//! Aggregates, value objects and the interfaces the outer layers implement.
//!
//! - **Layer:** Domain Layer
//! - **Purpose:** Suggestion aggregate, failure patterns, similarity matching

pub mod config;
pub mod embedding;
pub mod events;
pub mod notification;
pub mod pattern;
pub mod repository;
pub mod similarity;
pub mod suggestion;
