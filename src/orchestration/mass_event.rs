//! # Mass-Event (Outage) Detector
//!
//! Flags floods of near-identical inbound messages from distinct clients,
//! which indicate a platform-wide incident rather than independent requests.
//! Runs before the AI classifier as a cheap pre-filter: during an incident it
//! overrides classification with a fixed MASS_OUTAGE scenario at high
//! confidence, which also avoids a burst of redundant paid gateway calls.

use chrono::{Duration, Utc};
use sqlx::PgPool;
use tracing::{instrument, warn};

use crate::config::MassEventConfig;
use crate::error::Result;
use crate::models::Message;
use crate::orchestration::types::MassEventReport;

pub struct MassEventDetector {
    pool: PgPool,
    config: MassEventConfig,
}

impl MassEventDetector {
    pub fn new(pool: PgPool, config: MassEventConfig) -> Self {
        Self { pool, config }
    }

    /// Scan recent USER messages from other clients and count those whose
    /// similarity to the candidate meets the threshold.
    #[instrument(skip(self, text), fields(client_id = %excluding_client_id))]
    pub async fn detect(&self, text: &str, excluding_client_id: &str) -> Result<MassEventReport> {
        let since = Utc::now() - Duration::minutes(self.config.time_window_minutes);
        let window = Message::recent_user_messages_excluding(
            &self.pool,
            excluding_client_id,
            since,
            self.config.scan_limit,
        )
        .await?;

        if window.len() < self.config.mass_threshold {
            return Ok(MassEventReport {
                is_mass_event: false,
                similar_count: window.len(),
                avg_similarity: 0.0,
            });
        }

        let mut similar_count = 0usize;
        let mut total_similarity = 0.0f64;
        for message in &window {
            let similarity = sequence_ratio(text, &message.content);
            if similarity >= self.config.similarity_threshold {
                similar_count += 1;
                total_similarity += similarity;
            }
        }

        let avg_similarity = if similar_count > 0 {
            total_similarity / similar_count as f64
        } else {
            0.0
        };
        let is_mass_event = similar_count >= self.config.mass_threshold;

        if is_mass_event {
            warn!(
                similar_count = similar_count,
                avg_similarity = avg_similarity,
                window_minutes = self.config.time_window_minutes,
                "Mass event detected, overriding classification"
            );
        }

        Ok(MassEventReport {
            is_mass_event,
            similar_count,
            avg_similarity,
        })
    }

    pub fn override_confidence(&self) -> f64 {
        self.config.override_confidence
    }
}

/// Ratcliff/Obershelp similarity: 2M/T where M is the total length of the
/// recursively matched common runs and T the combined length. Case-folded
/// before matching. Returns a value in [0, 1].
pub fn sequence_ratio(a: &str, b: &str) -> f64 {
    let a: Vec<char> = a.to_lowercase().chars().collect();
    let b: Vec<char> = b.to_lowercase().chars().collect();
    let total = a.len() + b.len();
    if total == 0 {
        return 1.0;
    }
    let matched = matching_chars(&a, &b);
    2.0 * matched as f64 / total as f64
}

fn matching_chars(a: &[char], b: &[char]) -> usize {
    if a.is_empty() || b.is_empty() {
        return 0;
    }

    let (a_start, b_start, len) = longest_common_run(a, b);
    if len == 0 {
        return 0;
    }

    len + matching_chars(&a[..a_start], &b[..b_start])
        + matching_chars(&a[a_start + len..], &b[b_start + len..])
}

/// Longest common contiguous run between two slices, O(len(a) * len(b)) with
/// a single rolling row. Window messages are capped, so inputs stay small.
fn longest_common_run(a: &[char], b: &[char]) -> (usize, usize, usize) {
    let mut best = (0usize, 0usize, 0usize);
    let mut row = vec![0usize; b.len() + 1];

    for (i, ca) in a.iter().enumerate() {
        let mut prev_diag = 0usize;
        for (j, cb) in b.iter().enumerate() {
            let current = if ca == cb { prev_diag + 1 } else { 0 };
            prev_diag = row[j + 1];
            row[j + 1] = current;
            if current > best.2 {
                best = (i + 1 - current, j + 1 - current, current);
            }
        }
    }

    best
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_identical_strings_are_fully_similar() {
        assert_eq!(sequence_ratio("internet is down", "internet is down"), 1.0);
    }

    #[test]
    fn test_case_is_folded() {
        assert_eq!(sequence_ratio("Internet Is Down", "internet is down"), 1.0);
    }

    #[test]
    fn test_disjoint_strings_score_zero() {
        assert_eq!(sequence_ratio("abc", "xyz"), 0.0);
    }

    #[test]
    fn test_empty_inputs() {
        assert_eq!(sequence_ratio("", ""), 1.0);
        assert_eq!(sequence_ratio("abc", ""), 0.0);
    }

    #[test]
    fn test_near_identical_strings_clear_the_threshold() {
        let ratio = sequence_ratio(
            "the video lesson will not load",
            "the video lesson will not load!!",
        );
        assert!(ratio >= 0.9, "ratio was {ratio}");
    }

    #[test]
    fn test_unrelated_sentences_stay_below_threshold() {
        let ratio = sequence_ratio(
            "hello, i want to change my schedule",
            "zzqq xw vv kk pp mm nn bb",
        );
        assert!(ratio < 0.7, "ratio was {ratio}");
    }

    #[test]
    fn test_ratio_is_symmetric() {
        let left = sequence_ratio("connection lost", "lost connection");
        let right = sequence_ratio("lost connection", "connection lost");
        assert!((left - right).abs() < 1e-9);
    }
}
