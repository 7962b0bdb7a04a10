// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::postgres::{PgPool, PgRow};
use sqlx::Row;
use uuid::Uuid;

use crate::domain::pattern::{FailurePattern, PatternId, TraceId};
use crate::domain::repository::{FailurePatternRepository, RepositoryError};
use crate::domain::suggestion::Severity;

const PATTERN_COLUMNS: &str = "pattern_id, trace_id, failure_type, trigger_condition, \
     title, summary, confidence, severity, extracted_at, processed";

pub struct PostgresFailurePatternRepository {
    pool: PgPool,
}

impl PostgresFailurePatternRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

fn row_to_pattern(row: &PgRow) -> Result<FailurePattern, RepositoryError> {
    let pattern_id: Uuid = row.try_get("pattern_id")?;
    let trace_id: String = row.try_get("trace_id")?;
    let severity: String = row.try_get("severity")?;
    let extracted_at: DateTime<Utc> = row.try_get("extracted_at")?;

    let severity = severity
        .parse::<Severity>()
        .map_err(|e| RepositoryError::Serialization(e.to_string()))?;

    Ok(FailurePattern {
        pattern_id: PatternId(pattern_id),
        trace_id: TraceId(trace_id),
        failure_type: row.try_get("failure_type")?,
        trigger_condition: row.try_get("trigger_condition")?,
        title: row.try_get("title")?,
        summary: row.try_get("summary")?,
        confidence: row.try_get("confidence")?,
        severity,
        extracted_at,
        processed: row.try_get("processed")?,
    })
}

#[async_trait]
impl FailurePatternRepository for PostgresFailurePatternRepository {
    async fn insert(&self, pattern: &FailurePattern) -> Result<(), RepositoryError> {
        let result = sqlx::query(
            r#"
            INSERT INTO failure_patterns (
                pattern_id, trace_id, failure_type, trigger_condition,
                title, summary, confidence, severity, extracted_at, processed
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            ON CONFLICT (pattern_id) DO NOTHING
            "#,
        )
        .bind(pattern.pattern_id.0)
        .bind(pattern.trace_id.as_str())
        .bind(&pattern.failure_type)
        .bind(&pattern.trigger_condition)
        .bind(&pattern.title)
        .bind(&pattern.summary)
        .bind(pattern.confidence)
        .bind(pattern.severity.as_str())
        .bind(pattern.extracted_at)
        .bind(pattern.processed)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::Validation(format!(
                "Pattern {} already exists",
                pattern.pattern_id
            )));
        }
        Ok(())
    }

    async fn fetch_unprocessed(&self, limit: usize) -> Result<Vec<FailurePattern>, RepositoryError> {
        let rows = sqlx::query(&format!(
            r#"
            SELECT {}
            FROM failure_patterns
            WHERE processed = FALSE
            ORDER BY extracted_at ASC, pattern_id ASC
            LIMIT $1
            "#,
            PATTERN_COLUMNS
        ))
        .bind(limit as i64)
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(row_to_pattern).collect()
    }

    async fn find_by_id(&self, id: PatternId) -> Result<Option<FailurePattern>, RepositoryError> {
        let row = sqlx::query(&format!(
            "SELECT {} FROM failure_patterns WHERE pattern_id = $1",
            PATTERN_COLUMNS
        ))
        .bind(id.0)
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref().map(row_to_pattern).transpose()
    }

    async fn mark_processed(&self, id: PatternId) -> Result<(), RepositoryError> {
        sqlx::query("UPDATE failure_patterns SET processed = TRUE WHERE pattern_id = $1")
            .bind(id.0)
            .execute(&self.pool)
            .await?;
        Ok(())
    }
}
