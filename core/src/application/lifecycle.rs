// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Suggestion Lifecycle Service
//!
//! Approve/reject on top of the repository's atomic transition. Reviewers
//! call this concurrently; correctness rests entirely on the repository's
//! optimistic commit.
//!
//! On success a review notification is spawned and never awaited. A failed
//! notification is logged and does not affect the decision.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::{info, warn};

use crate::domain::events::SuggestionEvent;
use crate::domain::notification::{Notifier, ReviewNotification};
use crate::domain::repository::{RepositoryError, SuggestionRepository};
use crate::domain::suggestion::{ReviewAction, SuggestionId, SuggestionStatus, TransitionRecord};
use crate::infrastructure::event_bus::EventBus;

/// Actor recorded when the caller supplies none.
pub const ANONYMOUS_ACTOR: &str = "anonymous";

#[derive(Debug, thiserror::Error)]
pub enum LifecycleError {
    #[error("Suggestion {0} not found")]
    NotFound(SuggestionId),

    #[error("Suggestion already decided (status: {status})")]
    Conflict { status: SuggestionStatus },

    #[error("Suggestion is being modified concurrently; gave up after {attempts} attempts")]
    Contention { attempts: u32 },

    #[error("Validation failed: {0}")]
    Validation(String),

    #[error(transparent)]
    Repository(RepositoryError),
}

impl LifecycleError {
    fn from_repository(id: SuggestionId, err: RepositoryError) -> Self {
        match err {
            RepositoryError::NotFound(_) => LifecycleError::NotFound(id),
            RepositoryError::Conflict { status } => LifecycleError::Conflict { status },
            RepositoryError::Contention { attempts } => LifecycleError::Contention { attempts },
            RepositoryError::Validation(msg) => LifecycleError::Validation(msg),
            other => LifecycleError::Repository(other),
        }
    }
}

/// Review decisions on pending suggestions
#[async_trait]
pub trait LifecycleService: Send + Sync {
    async fn approve(
        &self,
        id: SuggestionId,
        actor: &str,
        notes: Option<String>,
    ) -> Result<TransitionRecord, LifecycleError>;

    /// `reason` is required and must not be blank.
    async fn reject(
        &self,
        id: SuggestionId,
        actor: &str,
        reason: &str,
    ) -> Result<TransitionRecord, LifecycleError>;
}

pub struct StandardLifecycleService {
    suggestions: Arc<dyn SuggestionRepository>,
    notifier: Arc<dyn Notifier>,
    event_bus: Arc<EventBus>,
}

impl StandardLifecycleService {
    pub fn new(
        suggestions: Arc<dyn SuggestionRepository>,
        notifier: Arc<dyn Notifier>,
        event_bus: Arc<EventBus>,
    ) -> Self {
        Self {
            suggestions,
            notifier,
            event_bus,
        }
    }

    async fn decide(
        &self,
        id: SuggestionId,
        action: ReviewAction,
        actor: &str,
        notes: Option<String>,
    ) -> Result<TransitionRecord, LifecycleError> {
        let actor = normalize_actor(actor);

        let record = self
            .suggestions
            .transition_status(id, action.target_status(), &actor, notes.clone())
            .await
            .map_err(|e| LifecycleError::from_repository(id, e))?;

        info!(suggestion_id = %id, action = %action, actor = %actor, "Suggestion decided");
        metrics::counter!("remedy_transitions_total", "action" => action.as_str()).increment(1);

        let event = match action {
            ReviewAction::Approve => SuggestionEvent::SuggestionApproved {
                suggestion_id: id,
                actor: actor.clone(),
                approved_at: record.timestamp,
            },
            ReviewAction::Reject => SuggestionEvent::SuggestionRejected {
                suggestion_id: id,
                actor: actor.clone(),
                reason: notes.unwrap_or_default(),
                rejected_at: record.timestamp,
            },
        };
        self.event_bus.publish_suggestion_event(event);

        self.spawn_notification(ReviewNotification {
            suggestion_id: id,
            action,
            actor,
            timestamp: record.timestamp,
        });

        Ok(record)
    }

    fn spawn_notification(&self, notification: ReviewNotification) {
        let notifier = self.notifier.clone();
        tokio::spawn(async move {
            if let Err(e) = notifier.notify(&notification).await {
                warn!(
                    suggestion_id = %notification.suggestion_id,
                    error = %e,
                    "Review notification failed"
                );
            }
        });
    }
}

#[async_trait]
impl LifecycleService for StandardLifecycleService {
    async fn approve(
        &self,
        id: SuggestionId,
        actor: &str,
        notes: Option<String>,
    ) -> Result<TransitionRecord, LifecycleError> {
        let notes = notes
            .map(|n| n.trim().to_string())
            .filter(|n| !n.is_empty());
        self.decide(id, ReviewAction::Approve, actor, notes).await
    }

    async fn reject(
        &self,
        id: SuggestionId,
        actor: &str,
        reason: &str,
    ) -> Result<TransitionRecord, LifecycleError> {
        let reason = reason.trim();
        if reason.is_empty() {
            return Err(LifecycleError::Validation(
                "A reason is required to reject a suggestion".to_string(),
            ));
        }
        self.decide(id, ReviewAction::Reject, actor, Some(reason.to_string()))
            .await
    }
}

fn normalize_actor(actor: &str) -> String {
    match actor.trim() {
        "" => ANONYMOUS_ACTOR.to_string(),
        trimmed => trimmed.to_string(),
    }
}
