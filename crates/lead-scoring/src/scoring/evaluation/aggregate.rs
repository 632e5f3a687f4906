use serde::Serialize;
use tracing::warn;

use super::super::domain::{Lead, RuleId, ScoreBreakdown, ScoringSettings};
use super::condition::{evaluate, MatchResult, TypeMismatch};

/// Rule skipped during a scoring pass because it could not be evaluated.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RuleDiagnostic {
    pub rule_id: RuleId,
    pub rule_name: String,
    pub error: TypeMismatch,
}

/// Rule-based result for one lead before any AI adjustment.
///
/// `score` is clamped to the settings' bounds while each breakdown entry keeps the
/// rule's full contribution, so the two disagree whenever the raw total is out of range.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Aggregation {
    pub score: i32,
    pub breakdown: Vec<ScoreBreakdown>,
    pub diagnostics: Vec<RuleDiagnostic>,
}

impl Aggregation {
    /// Unclamped sum of the breakdown entries.
    pub fn raw_total(&self) -> i64 {
        self.breakdown
            .iter()
            .map(|entry| i64::from(entry.score))
            .sum()
    }

    pub fn is_clamped(&self) -> bool {
        self.raw_total() != i64::from(self.score)
    }
}

pub fn aggregate(settings: &ScoringSettings, lead: &Lead) -> Aggregation {
    let mut breakdown = Vec::new();
    let mut diagnostics = Vec::new();
    let mut total: i64 = 0;

    for rule in settings.active_rules() {
        match evaluate(rule, lead) {
            Ok(MatchResult {
                matched: true,
                reason,
            }) => {
                total += i64::from(rule.points);
                breakdown.push(ScoreBreakdown {
                    category: rule.name.clone(),
                    score: rule.points,
                    reason,
                });
            }
            Ok(_) => {}
            Err(error) => {
                warn!(
                    rule_id = %rule.id,
                    lead_id = %lead.id,
                    %error,
                    "skipping rule that cannot be evaluated"
                );
                diagnostics.push(RuleDiagnostic {
                    rule_id: rule.id.clone(),
                    rule_name: rule.name.clone(),
                    error,
                });
            }
        }
    }

    Aggregation {
        score: settings.clamp(total),
        breakdown,
        diagnostics,
    }
}
