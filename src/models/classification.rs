//! # Classification Model
//!
//! Append-only record of each classification attempt: one row per classified
//! USER message, carrying the scenario, confidence, producing model and its
//! reasoning.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, PgPool, Postgres, Transaction};
use uuid::Uuid;

use crate::constants::Scenario;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct Classification {
    pub id: Uuid,
    pub message_id: Uuid,
    pub detected_scenario: String,
    pub confidence: f64,
    pub ai_model: String,
    pub reasoning: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl Classification {
    /// Typed view of the stored scenario; corrupted rows default to UNKNOWN.
    pub fn scenario(&self) -> Scenario {
        Scenario::parse_lenient(&self.detected_scenario)
    }
}

/// Insert payload for a classification attempt
#[derive(Debug, Clone)]
pub struct NewClassification {
    pub message_id: Uuid,
    pub detected_scenario: Scenario,
    pub confidence: f64,
    pub ai_model: String,
    pub reasoning: Option<String>,
}

const CLASSIFICATION_COLUMNS: &str =
    "id, message_id, detected_scenario, confidence, ai_model, reasoning, created_at";

impl Classification {
    pub async fn create(
        tx: &mut Transaction<'_, Postgres>,
        new_classification: NewClassification,
    ) -> Result<Classification, sqlx::Error> {
        let query = format!(
            r#"
            INSERT INTO classifications (id, message_id, detected_scenario, confidence,
                                         ai_model, reasoning, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, NOW())
            RETURNING {CLASSIFICATION_COLUMNS}
            "#
        );

        sqlx::query_as::<_, Classification>(&query)
            .bind(Uuid::new_v4())
            .bind(new_classification.message_id)
            .bind(new_classification.detected_scenario.as_str())
            .bind(new_classification.confidence)
            .bind(&new_classification.ai_model)
            .bind(new_classification.reasoning)
            .fetch_one(&mut **tx)
            .await
    }

    pub async fn find_latest_for_message(
        pool: &PgPool,
        message_id: Uuid,
    ) -> Result<Option<Classification>, sqlx::Error> {
        let query = format!(
            r#"
            SELECT {CLASSIFICATION_COLUMNS}
            FROM classifications
            WHERE message_id = $1
            ORDER BY created_at DESC
            LIMIT 1
            "#
        );

        sqlx::query_as::<_, Classification>(&query)
            .bind(message_id)
            .fetch_optional(pool)
            .await
    }

    /// Count low-confidence classifications for a client inside the trailing
    /// window (repeated-failure escalation rule).
    pub async fn low_confidence_count_since(
        pool: &PgPool,
        client_id: &str,
        below_confidence: f64,
        since: DateTime<Utc>,
    ) -> Result<i64, sqlx::Error> {
        let row: (i64,) = sqlx::query_as(
            r#"
            SELECT COUNT(*)
            FROM classifications c
            JOIN messages m ON m.id = c.message_id
            WHERE m.client_id = $1 AND c.confidence < $2 AND c.created_at >= $3
            "#,
        )
        .bind(client_id)
        .bind(below_confidence)
        .bind(since)
        .fetch_one(pool)
        .await?;
        Ok(row.0)
    }
}
