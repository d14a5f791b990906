//! Audit records for completed pipeline runs.

use std::fmt::Debug;

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::guardrails::GuardrailViolation;
use crate::llms::ServedBy;
use crate::orchestrator::StageRecord;
use crate::tone::ToneDecision;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditRecord {
    pub user_id: String,
    pub request_id: Uuid,
    pub timestamp: DateTime<Utc>,
    pub stages: Vec<StageRecord>,
    pub tone: Option<ToneDecision>,
    pub violations: Vec<GuardrailViolation>,
    pub served_by: Option<ServedBy>,
    pub bypassed: bool,
}

/// Receives one record per completed request.
pub trait AuditSink: Send + Sync + Debug {
    fn record(&self, record: AuditRecord);
}

#[derive(Debug, Default)]
pub struct InMemoryAuditSink {
    records: RwLock<Vec<AuditRecord>>,
}

impl InMemoryAuditSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn records(&self) -> Vec<AuditRecord> {
        self.records.read().clone()
    }

    pub fn for_user(&self, user_id: &str) -> Vec<AuditRecord> {
        self.records
            .read()
            .iter()
            .filter(|r| r.user_id == user_id)
            .cloned()
            .collect()
    }

    pub fn len(&self) -> usize {
        self.records.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.read().is_empty()
    }
}

impl AuditSink for InMemoryAuditSink {
    fn record(&self, record: AuditRecord) {
        self.records.write().push(record);
    }
}

/// Writes each record as one JSON line through the `log` facade.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogAuditSink;

impl AuditSink for LogAuditSink {
    fn record(&self, record: AuditRecord) {
        match serde_json::to_string(&record) {
            Ok(line) => log::info!(target: "mirrorback::audit", "{}", line),
            Err(e) => log::error!("failed to serialize audit record {}: {}", record.request_id, e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::orchestrator::{PipelineStage, StageStatus};

    fn record(user: &str) -> AuditRecord {
        AuditRecord {
            user_id: user.to_string(),
            request_id: Uuid::new_v4(),
            timestamp: Utc::now(),
            stages: vec![StageRecord {
                stage: PipelineStage::CrisisCheck,
                outcome: StageStatus::Completed,
            }],
            tone: None,
            violations: Vec::new(),
            served_by: None,
            bypassed: true,
        }
    }

    #[test]
    fn test_in_memory_sink_filters_by_user() {
        let sink = InMemoryAuditSink::new();
        sink.record(record("a"));
        sink.record(record("b"));
        sink.record(record("a"));
        assert_eq!(sink.len(), 3);
        assert_eq!(sink.for_user("a").len(), 2);
        assert!(sink.for_user("c").is_empty());
    }

    #[test]
    fn test_record_serializes_stage_outcomes() {
        let json = serde_json::to_value(record("a")).unwrap();
        assert_eq!(json["stages"][0]["stage"], "crisis_check");
        assert_eq!(json["stages"][0]["outcome"]["status"], "completed");
    }
}
