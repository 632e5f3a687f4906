use std::time::Duration;

use async_trait::async_trait;

use super::domain::{Lead, ScoreBreakdown};

/// Breakdown category recorded for an applied AI adjustment.
pub const AI_ASSIST_CATEGORY: &str = "AI Assist";
/// Breakdown reason recorded for an applied AI adjustment.
pub const AI_ASSIST_REASON: &str = "AI-suggested adjustment";

/// Optional, possibly slow, collaborator that nudges a rule-based score.
///
/// Implementations return the signed delta to apply on top of `base_score`. The
/// scoring service bounds every call with a timeout and clamps the adjusted total.
#[async_trait]
pub trait ScoreAdjuster: Send + Sync {
    async fn adjust(
        &self,
        lead: &Lead,
        base_score: i32,
        breakdown: &[ScoreBreakdown],
    ) -> Result<i32, AssistError>;
}

/// Why an AI adjustment was not applied.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AssistError {
    #[error("AI assist timed out after {0:?}")]
    Timeout(Duration),
    #[error("AI assist unavailable: {0}")]
    Unavailable(String),
    #[error("AI assist cancelled")]
    Cancelled,
}

/// Adjuster used when no AI backend is configured.
#[derive(Debug, Default, Clone, Copy)]
pub struct DisabledAssist;

#[async_trait]
impl ScoreAdjuster for DisabledAssist {
    async fn adjust(
        &self,
        _lead: &Lead,
        _base_score: i32,
        _breakdown: &[ScoreBreakdown],
    ) -> Result<i32, AssistError> {
        Err(AssistError::Unavailable(
            "no AI backend configured".to_string(),
        ))
    }
}
