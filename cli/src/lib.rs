// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Remedy CLI library - exposes testable components
//!
//! # Architecture
//!
//! - **Layer:** Interface / Presentation Layer
//! - **Purpose:** Wires core services from configuration and implements the
//!   `remedy` subcommands on top of them

pub mod bootstrap;
pub mod commands;
