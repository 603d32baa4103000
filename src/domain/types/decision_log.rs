use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DecisionType {
    SignalEvaluation,
    RiskCheck,
    ProtectionTrip,
    ConnectionEvent,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ImpactLevel {
    Low,
    Medium,
    High,
    Critical,
}

/// Append-only record of every accept/reject at the decision pipeline
/// (§3, §4.7). Retention 48h by default (§9 open question resolved: pick
/// 48h, configurable).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AiDecisionLog {
    pub id: uuid::Uuid,
    pub decision_type: DecisionType,
    pub decision: String, // "APPROVED" | "REJECTED"
    pub symbol: String,
    pub timeframe: Option<String>,
    pub primary_reason: String,
    pub detailed_reasoning: Value,
    pub impact_level: ImpactLevel,
    pub confidence_score: Option<f64>,
    pub risk_score: Option<f64>,
    pub timestamp: DateTime<Utc>,
}

impl AiDecisionLog {
    pub fn approved(symbol: &str, timeframe: Option<&str>, confidence: f64, reasoning: Value, now: DateTime<Utc>) -> Self {
        Self {
            id: uuid::Uuid::new_v4(),
            decision_type: DecisionType::SignalEvaluation,
            decision: "APPROVED".into(),
            symbol: symbol.into(),
            timeframe: timeframe.map(|s| s.into()),
            primary_reason: "CONDITIONS_MET".into(),
            detailed_reasoning: reasoning,
            impact_level: ImpactLevel::Medium,
            confidence_score: Some(confidence),
            risk_score: None,
            timestamp: now,
        }
    }

    pub fn rejected(
        symbol: &str,
        timeframe: Option<&str>,
        reason_code: &str,
        impact: ImpactLevel,
        reasoning: Value,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id: uuid::Uuid::new_v4(),
            decision_type: DecisionType::SignalEvaluation,
            decision: "REJECTED".into(),
            symbol: symbol.into(),
            timeframe: timeframe.map(|s| s.into()),
            primary_reason: reason_code.into(),
            detailed_reasoning: reasoning,
            impact_level: impact,
            confidence_score: None,
            risk_score: None,
            timestamp: now,
        }
    }
}
