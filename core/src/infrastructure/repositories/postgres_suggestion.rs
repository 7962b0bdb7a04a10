// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::postgres::{PgPool, PgRow};
use sqlx::{Postgres, QueryBuilder, Row, Transaction};
use tracing::{debug, warn};
use uuid::Uuid;

use super::{map_suggestion_error, paginate, DEFAULT_MAX_ATTEMPTS};
use crate::domain::embedding::Embedding;
use crate::domain::pattern::FailurePattern;
use crate::domain::repository::{
    MergeOutcome, RepositoryError, SuggestionPage, SuggestionQuery, SuggestionRepository,
};
use crate::domain::similarity::{MatchCandidate, SimilarityMatch};
use crate::domain::suggestion::{
    Suggestion, SuggestionId, SuggestionStatus, TransitionRecord,
};

const SUGGESTION_COLUMNS: &str = "id, suggestion_type, status, severity, embedding, \
     pattern_summary, source_traces, approval_metadata, version_history, \
     created_at, updated_at, revision";

/// Result of one transactional attempt.
enum Attempt<T> {
    Committed(T),
    /// A concurrent writer got there first; retry from the read.
    Stale,
}

/// Failure of one transactional attempt. Raw driver errors are kept so
/// serialization failures can be told apart from real faults.
enum AttemptError {
    Sql(sqlx::Error),
    Repository(RepositoryError),
}

impl From<sqlx::Error> for AttemptError {
    fn from(err: sqlx::Error) -> Self {
        AttemptError::Sql(err)
    }
}

impl From<RepositoryError> for AttemptError {
    fn from(err: RepositoryError) -> Self {
        AttemptError::Repository(err)
    }
}

impl From<serde_json::Error> for AttemptError {
    fn from(err: serde_json::Error) -> Self {
        AttemptError::Repository(err.into())
    }
}

pub struct PostgresSuggestionRepository {
    pool: PgPool,
    max_attempts: u32,
    transaction_timeout: Duration,
}

impl PostgresSuggestionRepository {
    pub fn new(pool: PgPool) -> Self {
        Self {
            pool,
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            transaction_timeout: Duration::from_secs(5),
        }
    }

    pub fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = max_attempts.max(1);
        self
    }

    pub fn with_transaction_timeout(mut self, timeout: Duration) -> Self {
        self.transaction_timeout = timeout;
        self
    }

    async fn begin(&self) -> Result<Transaction<'static, Postgres>, sqlx::Error> {
        let mut tx = self.pool.begin().await?;
        // SET LOCAL does not accept bind parameters
        let statement = format!(
            "SET LOCAL statement_timeout = {}",
            self.transaction_timeout.as_millis()
        );
        sqlx::query(&statement).execute(&mut *tx).await?;
        Ok(tx)
    }

    async fn attempt_merge(
        &self,
        pattern: &FailurePattern,
        embedding: &Embedding,
        matched: Option<SimilarityMatch>,
    ) -> Result<Attempt<MergeOutcome>, AttemptError> {
        let mut tx = self.begin().await?;

        let owner: Option<Uuid> =
            sqlx::query_scalar("SELECT suggestion_id FROM trace_claims WHERE trace_id = $1")
                .bind(pattern.trace_id.as_str())
                .fetch_optional(&mut *tx)
                .await?;

        let outcome = if let Some(owner) = owner {
            MergeOutcome::AlreadyPresent {
                suggestion_id: SuggestionId(owner),
            }
        } else if let Some(m) = matched {
            let row = sqlx::query(&format!(
                "SELECT {} FROM suggestions WHERE id = $1",
                SUGGESTION_COLUMNS
            ))
            .bind(m.suggestion_id.0)
            .fetch_optional(&mut *tx)
            .await?
            .ok_or_else(|| RepositoryError::NotFound(format!("Suggestion {}", m.suggestion_id)))?;

            let mut suggestion = row_to_suggestion(&row)?;
            let expected_revision = suggestion.revision();
            suggestion.absorb(pattern, m.score);

            let updated = sqlx::query(
                r#"
                UPDATE suggestions
                SET source_traces = $2, updated_at = $3, revision = $4
                WHERE id = $1 AND revision = $5
                "#,
            )
            .bind(suggestion.id().0)
            .bind(serde_json::to_value(suggestion.source_traces())?)
            .bind(suggestion.updated_at())
            .bind(suggestion.revision() as i64)
            .bind(expected_revision as i64)
            .execute(&mut *tx)
            .await?;

            if updated.rows_affected() == 0 || !claim_trace(&mut tx, pattern, suggestion.id()).await? {
                tx.rollback().await?;
                return Ok(Attempt::Stale);
            }

            MergeOutcome::Merged {
                suggestion_id: suggestion.id(),
                score: m.score,
                merged_at: suggestion.updated_at(),
            }
        } else {
            let suggestion = Suggestion::found(pattern, embedding.clone());
            insert_suggestion(&mut tx, &suggestion).await?;

            if !claim_trace(&mut tx, pattern, suggestion.id()).await? {
                tx.rollback().await?;
                return Ok(Attempt::Stale);
            }

            MergeOutcome::Created {
                suggestion_id: suggestion.id(),
                created_at: suggestion.created_at(),
            }
        };

        sqlx::query("UPDATE failure_patterns SET processed = TRUE WHERE pattern_id = $1")
            .bind(pattern.pattern_id.0)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(Attempt::Committed(outcome))
    }

    async fn attempt_transition(
        &self,
        id: SuggestionId,
        new_status: SuggestionStatus,
        actor: &str,
        notes: Option<String>,
    ) -> Result<Attempt<TransitionRecord>, AttemptError> {
        let mut tx = self.begin().await?;

        let row = sqlx::query(&format!(
            "SELECT {} FROM suggestions WHERE id = $1",
            SUGGESTION_COLUMNS
        ))
        .bind(id.0)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or_else(|| RepositoryError::NotFound(format!("Suggestion {}", id)))?;

        let mut suggestion = row_to_suggestion(&row)?;
        let expected_revision = suggestion.revision();
        let record = suggestion
            .transition_to(new_status, actor, notes)
            .map_err(map_suggestion_error)?;

        let updated = sqlx::query(
            r#"
            UPDATE suggestions
            SET status = $2, approval_metadata = $3, version_history = $4,
                updated_at = $5, revision = $6
            WHERE id = $1 AND revision = $7
            "#,
        )
        .bind(id.0)
        .bind(suggestion.status().as_str())
        .bind(serde_json::to_value(suggestion.approval_metadata())?)
        .bind(serde_json::to_value(suggestion.version_history())?)
        .bind(suggestion.updated_at())
        .bind(suggestion.revision() as i64)
        .bind(expected_revision as i64)
        .execute(&mut *tx)
        .await?;

        if updated.rows_affected() == 0 {
            tx.rollback().await?;
            return Ok(Attempt::Stale);
        }

        tx.commit().await?;
        Ok(Attempt::Committed(record))
    }

    async fn with_retry<T, F, Fut>(&self, label: &str, mut op: F) -> Result<T, RepositoryError>
    where
        F: FnMut() -> Fut,
        Fut: std::future::Future<Output = Result<Attempt<T>, AttemptError>>,
    {
        for attempt in 1..=self.max_attempts {
            match op().await {
                Ok(Attempt::Committed(value)) => return Ok(value),
                Ok(Attempt::Stale) => {
                    debug!(attempt, operation = label, "Stale revision, retrying");
                }
                Err(AttemptError::Sql(e)) if is_retryable(&e) => {
                    debug!(attempt, operation = label, error = %e, "Serialization failure, retrying");
                }
                Err(AttemptError::Sql(e)) => return Err(e.into()),
                Err(AttemptError::Repository(e)) => return Err(e),
            }
            metrics::counter!("remedy_transaction_retries_total").increment(1);
        }

        warn!(operation = label, attempts = self.max_attempts, "Gave up on contended transaction");
        Err(RepositoryError::Contention {
            attempts: self.max_attempts,
        })
    }
}

/// Record the trace claim. `false` when another suggestion holds it.
async fn claim_trace(
    tx: &mut Transaction<'static, Postgres>,
    pattern: &FailurePattern,
    suggestion_id: SuggestionId,
) -> Result<bool, sqlx::Error> {
    let inserted = sqlx::query(
        r#"
        INSERT INTO trace_claims (trace_id, suggestion_id, claimed_at)
        VALUES ($1, $2, $3)
        ON CONFLICT (trace_id) DO NOTHING
        "#,
    )
    .bind(pattern.trace_id.as_str())
    .bind(suggestion_id.0)
    .bind(Utc::now())
    .execute(&mut **tx)
    .await?;

    Ok(inserted.rows_affected() == 1)
}

async fn insert_suggestion(
    tx: &mut Transaction<'static, Postgres>,
    suggestion: &Suggestion,
) -> Result<(), AttemptError> {
    sqlx::query(
        r#"
        INSERT INTO suggestions (
            id, suggestion_type, status, severity, embedding, pattern_summary,
            source_traces, approval_metadata, version_history,
            created_at, updated_at, revision
        )
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)
        "#,
    )
    .bind(suggestion.id().0)
    .bind(suggestion.suggestion_type().as_str())
    .bind(suggestion.status().as_str())
    .bind(suggestion.severity().as_str())
    .bind(suggestion.embedding().to_vec())
    .bind(serde_json::to_value(suggestion.pattern_summary())?)
    .bind(serde_json::to_value(suggestion.source_traces())?)
    .bind(serde_json::to_value(suggestion.approval_metadata())?)
    .bind(serde_json::to_value(suggestion.version_history())?)
    .bind(suggestion.created_at())
    .bind(suggestion.updated_at())
    .bind(suggestion.revision() as i64)
    .execute(&mut **tx)
    .await?;

    Ok(())
}

/// SQLSTATE 40001 (serialization_failure) and 40P01 (deadlock_detected).
fn is_retryable(err: &sqlx::Error) -> bool {
    err.as_database_error()
        .and_then(|db| db.code())
        .is_some_and(|code| is_retryable_code(&code))
}

fn is_retryable_code(code: &str) -> bool {
    matches!(code, "40001" | "40P01")
}

fn parse_label<T>(value: &str) -> Result<T, RepositoryError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    value
        .parse()
        .map_err(|e: T::Err| RepositoryError::Serialization(e.to_string()))
}

fn row_to_suggestion(row: &PgRow) -> Result<Suggestion, RepositoryError> {
    let id: Uuid = row.try_get("id")?;
    let suggestion_type: String = row.try_get("suggestion_type")?;
    let status: String = row.try_get("status")?;
    let severity: String = row.try_get("severity")?;
    let embedding: Vec<f32> = row.try_get("embedding")?;
    let pattern_summary: serde_json::Value = row.try_get("pattern_summary")?;
    let source_traces: serde_json::Value = row.try_get("source_traces")?;
    let approval_metadata: Option<serde_json::Value> = row.try_get("approval_metadata")?;
    let version_history: serde_json::Value = row.try_get("version_history")?;
    let created_at: DateTime<Utc> = row.try_get("created_at")?;
    let updated_at: DateTime<Utc> = row.try_get("updated_at")?;
    let revision: i64 = row.try_get("revision")?;

    Ok(Suggestion {
        id: SuggestionId(id),
        suggestion_type: parse_label(&suggestion_type)?,
        status: parse_label(&status)?,
        severity: parse_label(&severity)?,
        embedding,
        pattern_summary: serde_json::from_value(pattern_summary)?,
        source_traces: serde_json::from_value(source_traces)?,
        approval_metadata: match approval_metadata {
            Some(serde_json::Value::Null) | None => None,
            Some(value) => Some(serde_json::from_value(value)?),
        },
        version_history: serde_json::from_value(version_history)?,
        created_at,
        updated_at,
        revision: revision as u64,
    })
}

#[async_trait]
impl SuggestionRepository for PostgresSuggestionRepository {
    async fn merge_or_create(
        &self,
        pattern: &FailurePattern,
        embedding: Embedding,
        matched: Option<SimilarityMatch>,
    ) -> Result<MergeOutcome, RepositoryError> {
        let outcome = self
            .with_retry("merge_or_create", || self.attempt_merge(pattern, &embedding, matched))
            .await?;

        if let MergeOutcome::AlreadyPresent { suggestion_id } = outcome {
            warn!(
                trace_id = %pattern.trace_id,
                suggestion_id = %suggestion_id,
                "Trace already recorded on a suggestion, skipping"
            );
        }
        Ok(outcome)
    }

    async fn transition_status(
        &self,
        id: SuggestionId,
        new_status: SuggestionStatus,
        actor: &str,
        notes: Option<String>,
    ) -> Result<TransitionRecord, RepositoryError> {
        self.with_retry("transition_status", || {
            self.attempt_transition(id, new_status, actor, notes.clone())
        })
        .await
    }

    async fn find_by_id(&self, id: SuggestionId) -> Result<Option<Suggestion>, RepositoryError> {
        let row = sqlx::query(&format!(
            "SELECT {} FROM suggestions WHERE id = $1",
            SUGGESTION_COLUMNS
        ))
        .bind(id.0)
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref().map(row_to_suggestion).transpose()
    }

    async fn list(&self, query: &SuggestionQuery) -> Result<SuggestionPage, RepositoryError> {
        let cursor: Option<(DateTime<Utc>, Uuid)> = match query.after {
            Some(after) => Some(
                sqlx::query_as("SELECT created_at, id FROM suggestions WHERE id = $1")
                    .bind(after.0)
                    .fetch_optional(&self.pool)
                    .await?
                    .ok_or_else(|| {
                        RepositoryError::Validation(format!("Unknown cursor {}", after))
                    })?,
            ),
            None => None,
        };

        let mut builder: QueryBuilder<Postgres> = QueryBuilder::new(format!(
            "SELECT {} FROM suggestions WHERE TRUE",
            SUGGESTION_COLUMNS
        ));
        if let Some(status) = query.status {
            builder.push(" AND status = ").push_bind(status.as_str());
        }
        if let Some(suggestion_type) = query.suggestion_type {
            builder
                .push(" AND suggestion_type = ")
                .push_bind(suggestion_type.as_str());
        }
        if let Some(severity) = query.severity {
            builder.push(" AND severity = ").push_bind(severity.as_str());
        }
        if let Some((created_at, id)) = cursor {
            builder
                .push(" AND (created_at, id) > (")
                .push_bind(created_at)
                .push(", ")
                .push_bind(id)
                .push(")");
        }
        builder
            .push(" ORDER BY created_at ASC, id ASC LIMIT ")
            .push_bind((query.page_size() + 1) as i64);

        let rows = builder.build().fetch_all(&self.pool).await?;
        let items = rows
            .iter()
            .map(row_to_suggestion)
            .collect::<Result<Vec<_>, _>>()?;

        Ok(paginate(items, None, query.page_size()))
    }

    async fn match_snapshot(&self) -> Result<Vec<MatchCandidate>, RepositoryError> {
        let rows = sqlx::query("SELECT id, embedding, created_at FROM suggestions")
            .fetch_all(&self.pool)
            .await?;

        rows.iter()
            .map(|row| -> Result<MatchCandidate, RepositoryError> {
                Ok(MatchCandidate {
                    suggestion_id: SuggestionId(row.try_get("id")?),
                    embedding: row.try_get("embedding")?,
                    created_at: row.try_get("created_at")?,
                })
            })
            .collect()
    }
}
