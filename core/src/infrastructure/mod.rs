// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

pub mod db;
pub mod embedding;
pub mod event_bus;
pub mod notification;
pub mod repositories;

pub use notification::{LogNotifier, WebhookNotifier};
