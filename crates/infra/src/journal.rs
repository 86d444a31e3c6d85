//! Execution journal: one entry per validated command, for audit and
//! success-rate reporting.
//!
//! Journaling is best-effort. The orchestrator logs a failed write and
//! carries on; it never changes the outcome reported to the caller.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;
use thiserror::Error;

use sovereign_commands::{ExecutionOutcome, RawCommand, ValidationResult};
use sovereign_core::{CallerId, RecordId};

/// Confidence recorded for a command the validator rejected.
pub const REJECTED_CONFIDENCE: f64 = 0.3;
/// Confidence recorded for a dispatched command that succeeded.
pub const SUCCEEDED_CONFIDENCE: f64 = 0.9;
/// Confidence recorded for a dispatched command that failed.
pub const FAILED_CONFIDENCE: f64 = 0.5;

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct JournalEntry {
    pub id: RecordId,
    pub intent: String,
    pub caller: CallerId,
    pub command: RawCommand,
    pub validation: ValidationResult,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub execution: Option<ExecutionOutcome>,
    pub confidence: f64,
    pub recorded_at: DateTime<Utc>,
}

impl JournalEntry {
    /// Entry for a command that never reached dispatch.
    pub fn rejected(
        intent: impl Into<String>,
        caller: CallerId,
        command: RawCommand,
        validation: ValidationResult,
    ) -> Self {
        Self {
            id: RecordId::new(),
            intent: intent.into(),
            caller,
            command,
            validation,
            execution: None,
            confidence: REJECTED_CONFIDENCE,
            recorded_at: Utc::now(),
        }
    }

    pub fn dispatched(
        intent: impl Into<String>,
        caller: CallerId,
        command: RawCommand,
        validation: ValidationResult,
        execution: ExecutionOutcome,
    ) -> Self {
        let confidence = if execution.success {
            SUCCEEDED_CONFIDENCE
        } else {
            FAILED_CONFIDENCE
        };
        Self {
            id: RecordId::new(),
            intent: intent.into(),
            caller,
            command,
            validation,
            execution: Some(execution),
            confidence,
            recorded_at: Utc::now(),
        }
    }

    pub fn succeeded(&self) -> bool {
        self.execution.as_ref().is_some_and(|e| e.success)
    }
}

/// Aggregate view over the journal.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct JournalStats {
    pub total_commands: usize,
    pub successful_commands: usize,
    /// `successful / total`, 0.0 for an empty journal.
    pub success_rate: f64,
    /// `(target, count)`, most used first.
    pub most_used_targets: Vec<(String, usize)>,
    pub most_used_actions: Vec<(String, usize)>,
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum JournalError {
    #[error("journal unavailable: {0}")]
    Unavailable(String),
}

#[async_trait]
pub trait ExecutionJournal: Send + Sync {
    async fn record(&self, entry: JournalEntry) -> Result<(), JournalError>;

    async fn stats(&self) -> Result<JournalStats, JournalError>;
}

#[async_trait]
impl<T> ExecutionJournal for Arc<T>
where
    T: ExecutionJournal + ?Sized,
{
    async fn record(&self, entry: JournalEntry) -> Result<(), JournalError> {
        (**self).record(entry).await
    }

    async fn stats(&self) -> Result<JournalStats, JournalError> {
        (**self).stats().await
    }
}

/// In-memory journal for tests/dev.
#[derive(Debug, Default)]
pub struct InMemoryJournal {
    entries: RwLock<Vec<JournalEntry>>,
}

impl InMemoryJournal {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn entries(&self) -> Vec<JournalEntry> {
        self.entries.read().map(|e| e.clone()).unwrap_or_default()
    }
}

fn poisoned() -> JournalError {
    JournalError::Unavailable("journal lock poisoned".into())
}

fn ranked(counts: HashMap<String, usize>) -> Vec<(String, usize)> {
    let mut ranked: Vec<_> = counts.into_iter().collect();
    ranked.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
    ranked
}

#[async_trait]
impl ExecutionJournal for InMemoryJournal {
    async fn record(&self, entry: JournalEntry) -> Result<(), JournalError> {
        self.entries.write().map_err(|_| poisoned())?.push(entry);
        Ok(())
    }

    async fn stats(&self) -> Result<JournalStats, JournalError> {
        let entries = self.entries.read().map_err(|_| poisoned())?;

        let mut targets: HashMap<String, usize> = HashMap::new();
        let mut actions: HashMap<String, usize> = HashMap::new();
        let mut successful = 0;
        for entry in entries.iter() {
            if entry.succeeded() {
                successful += 1;
            }
            if let Some(target) = &entry.command.target {
                *targets.entry(target.to_ascii_uppercase()).or_default() += 1;
            }
            if let Some(action) = &entry.command.action {
                *actions.entry(action.to_ascii_uppercase()).or_default() += 1;
            }
        }

        let total = entries.len();
        Ok(JournalStats {
            total_commands: total,
            successful_commands: successful,
            success_rate: if total == 0 {
                0.0
            } else {
                successful as f64 / total as f64
            },
            most_used_targets: ranked(targets),
            most_used_actions: ranked(actions),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn raw(action: &str, target: &str) -> RawCommand {
        RawCommand {
            action: Some(action.into()),
            target: Some(target.into()),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn stats_count_successes_and_rank_usage() {
        let journal = InMemoryJournal::new();
        let caller = CallerId::new("u");

        journal
            .record(JournalEntry::dispatched(
                "list bids",
                caller.clone(),
                raw("READ", "BID"),
                ValidationResult::approved(),
                ExecutionOutcome::success("Found 0 bids"),
            ))
            .await
            .unwrap();
        journal
            .record(JournalEntry::dispatched(
                "submit bid",
                caller.clone(),
                raw("EXECUTE", "BID"),
                ValidationResult::approved(),
                ExecutionOutcome::failure("execution failed"),
            ))
            .await
            .unwrap();
        journal
            .record(JournalEntry::rejected(
                "run payroll",
                caller,
                raw("PROCESS", "PAYROLL_RUN"),
                ValidationResult::rejected(sovereign_commands::Gate::Authorization, "denied"),
            ))
            .await
            .unwrap();

        let stats = journal.stats().await.unwrap();
        assert_eq!(stats.total_commands, 3);
        assert_eq!(stats.successful_commands, 1);
        assert!((stats.success_rate - 1.0 / 3.0).abs() < f64::EPSILON);
        assert_eq!(stats.most_used_targets[0], ("BID".to_string(), 2));

        let confidences: Vec<f64> = journal.entries().iter().map(|e| e.confidence).collect();
        assert_eq!(confidences, vec![SUCCEEDED_CONFIDENCE, FAILED_CONFIDENCE, REJECTED_CONFIDENCE]);
    }

    #[tokio::test]
    async fn empty_journal_reports_zero_rate() {
        let stats = InMemoryJournal::new().stats().await.unwrap();
        assert_eq!(stats.total_commands, 0);
        assert_eq!(stats.success_rate, 0.0);
    }
}
