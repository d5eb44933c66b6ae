use merge_engine::{Choice, Decision};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// One line of the decision log: what happened to a single file in a run.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DecisionRecord {
    pub file: PathBuf,
    pub choice: Choice,
    /// Whether the reasoning chain ran for this file.
    pub auto: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub decision: Option<Decision>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub confidence: Option<f64>,
    pub conflicts: usize,
    pub run_id: String,
    pub timestamp: u64,
}

/// Aggregate view over a decision log.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DecisionStats {
    pub total: usize,
    pub automatic: usize,
    pub manual_review: usize,
    pub kept_current: usize,
    pub kept_incoming: usize,
    pub average_confidence: Option<f64>,
}

impl DecisionStats {
    pub fn from_records(records: &[DecisionRecord]) -> Self {
        let mut stats = DecisionStats {
            total: records.len(),
            ..Default::default()
        };
        let mut confidence_sum = 0.0;
        let mut confidence_count = 0usize;

        for record in records {
            if record.auto {
                stats.automatic += 1;
            }
            if record.decision == Some(Decision::ManualReview) {
                stats.manual_review += 1;
            }
            match record.choice {
                Choice::Current => stats.kept_current += 1,
                Choice::Incoming => stats.kept_incoming += 1,
            }
            if let Some(c) = record.confidence {
                confidence_sum += c;
                confidence_count += 1;
            }
        }

        if confidence_count > 0 {
            stats.average_confidence = Some(confidence_sum / confidence_count as f64);
        }
        stats
    }
}

/// Milliseconds since the Unix epoch.
pub fn now_millis() -> u64 {
    chrono::Utc::now().timestamp_millis().max(0) as u64
}

/// Fresh identifier shared by every record of one resolve run.
pub fn new_run_id() -> String {
    uuid::Uuid::new_v4().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(choice: Choice, decision: Option<Decision>, confidence: Option<f64>) -> DecisionRecord {
        DecisionRecord {
            file: PathBuf::from("src/app.ts"),
            choice,
            auto: decision.is_some(),
            decision,
            confidence,
            conflicts: 1,
            run_id: "run".into(),
            timestamp: 0,
        }
    }

    #[test]
    fn test_serializes_camel_case_and_skips_empty() {
        let json = serde_json::to_value(record(Choice::Current, None, None)).unwrap();
        assert_eq!(json["choice"], "current");
        assert_eq!(json["runId"], "run");
        assert!(json.get("decision").is_none());
        assert!(json.get("confidence").is_none());
    }

    #[test]
    fn test_stats() {
        let records = vec![
            record(Choice::Current, Some(Decision::KeepCurrent), Some(0.9)),
            record(Choice::Incoming, Some(Decision::ManualReview), Some(0.3)),
            record(Choice::Incoming, None, None),
        ];
        let stats = DecisionStats::from_records(&records);
        assert_eq!(stats.total, 3);
        assert_eq!(stats.automatic, 2);
        assert_eq!(stats.manual_review, 1);
        assert_eq!(stats.kept_current, 1);
        assert_eq!(stats.kept_incoming, 2);
        let avg = stats.average_confidence.unwrap();
        assert!((avg - 0.6).abs() < 1e-9);
    }

    #[test]
    fn test_empty_stats() {
        assert_eq!(DecisionStats::from_records(&[]), DecisionStats::default());
    }
}
