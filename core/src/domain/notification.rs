// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Review notifications
//!
//! Fire-and-forget side channel announcing review decisions. Delivery has no
//! consistency requirement: a failed notification never affects the decision.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::suggestion::{ReviewAction, SuggestionId};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReviewNotification {
    pub suggestion_id: SuggestionId,
    pub action: ReviewAction,
    pub actor: String,
    pub timestamp: DateTime<Utc>,
}

#[async_trait]
pub trait Notifier: Send + Sync {
    async fn notify(&self, notification: &ReviewNotification) -> Result<(), NotificationError>;
}

#[derive(Debug, thiserror::Error)]
pub enum NotificationError {
    #[error("Network error: {0}")]
    Network(String),

    #[error("Endpoint rejected notification with HTTP {0}")]
    Rejected(u16),
}
