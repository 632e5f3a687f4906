//! Rule-based lead scoring: rule administration, condition evaluation, score
//! aggregation and the optional AI adjustment step.

pub mod assist;
pub mod domain;
pub(crate) mod evaluation;
pub mod facade;
pub mod legacy;
pub mod repository;
pub mod router;
pub mod service;
pub mod store;
pub mod validation;

#[cfg(test)]
mod tests;

pub use assist::{AssistError, DisabledAssist, ScoreAdjuster, AI_ASSIST_CATEGORY, AI_ASSIST_REASON};
pub use domain::{
    Lead, LeadId, LeadPriority, LeadSource, LeadStatus, RuleId, RuleSpec, RuleValue,
    ScoreBreakdown, ScoreField, ScoreOperator, ScoreRule, ScoringSettings, TemporalValue,
    DEFAULT_MAX_SCORE, DEFAULT_MIN_SCORE,
};
pub use evaluation::{aggregate, evaluate, Aggregation, MatchResult, RuleDiagnostic, TypeMismatch};
pub use facade::{BatchReport, LeadScore, ScoringFacade, ScoringServiceError};
pub use legacy::{LegacyCondition, LegacyOperator, LegacyScoringRule};
pub use repository::{LeadRepository, RepositoryError};
pub use router::scoring_router;
pub use service::{
    BatchCancellation, BatchScoring, ScoredLead, ScoringOptions, ScoringService, ScoringWarning,
};
pub use store::{RuleSetStore, StoreError};
pub use validation::ValidationError;
