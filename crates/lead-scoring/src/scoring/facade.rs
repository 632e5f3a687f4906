use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use serde::Serialize;
use tracing::{info, warn};

use super::assist::ScoreAdjuster;
use super::domain::{Lead, LeadId, RuleId, RuleSpec, ScoreBreakdown, ScoringSettings};
use super::evaluation::RuleDiagnostic;
use super::repository::{LeadRepository, RepositoryError};
use super::service::{BatchCancellation, ScoredLead, ScoringService, ScoringWarning};
use super::store::{RuleSetStore, StoreError};
use super::validation::ValidationError;

/// Score returned to callers for one lead.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LeadScore {
    pub lead_id: LeadId,
    pub score: i32,
    pub breakdown: Vec<ScoreBreakdown>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub diagnostics: Vec<RuleDiagnostic>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub warnings: Vec<ScoringWarning>,
}

impl From<ScoredLead> for LeadScore {
    fn from(scored: ScoredLead) -> Self {
        Self {
            lead_id: scored.lead.id,
            score: scored.score,
            breakdown: scored.lead.score_breakdown,
            diagnostics: scored.diagnostics,
            warnings: scored.warnings,
        }
    }
}

/// Outcome of scoring a set of leads by id.
#[derive(Debug, Default, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchReport {
    pub scores: BTreeMap<LeadId, LeadScore>,
    pub missing: Vec<LeadId>,
    pub cancelled: Vec<LeadId>,
    pub failed: Vec<LeadId>,
}

/// Error raised by the caller-facing scoring API.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ScoringServiceError {
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error("rule {0} not found")]
    RuleNotFound(RuleId),
    #[error("lead {0} not found")]
    LeadNotFound(LeadId),
    #[error(transparent)]
    Repository(#[from] RepositoryError),
}

impl From<StoreError> for ScoringServiceError {
    fn from(error: StoreError) -> Self {
        match error {
            StoreError::Validation(error) => ScoringServiceError::Validation(error),
            StoreError::NotFound(id) => ScoringServiceError::RuleNotFound(id),
        }
    }
}

/// Entry point used by the UI and batch jobs: rule administration plus lead scoring.
///
/// Every scoring call takes one snapshot of the rule set up front and persists the
/// refreshed lead through the repository.
pub struct ScoringFacade<R, A> {
    store: Arc<RuleSetStore>,
    leads: Arc<R>,
    scoring: ScoringService<A>,
}

impl<R, A> ScoringFacade<R, A>
where
    R: LeadRepository + 'static,
    A: ScoreAdjuster + 'static,
{
    pub fn new(store: Arc<RuleSetStore>, leads: Arc<R>, scoring: ScoringService<A>) -> Self {
        Self {
            store,
            leads,
            scoring,
        }
    }

    pub fn settings(&self) -> Arc<ScoringSettings> {
        self.store.snapshot()
    }

    pub fn create_rule(&self, spec: RuleSpec) -> Result<RuleId, ScoringServiceError> {
        let id = self.store.add_rule(spec)?;
        info!(rule_id = %id, "scoring rule created");
        Ok(id)
    }

    pub fn update_rule(&self, id: &RuleId, spec: RuleSpec) -> Result<(), ScoringServiceError> {
        self.store.update_rule(id, spec)?;
        info!(rule_id = %id, "scoring rule updated");
        Ok(())
    }

    /// Idempotent; returns whether a rule was actually removed.
    pub fn delete_rule(&self, id: &RuleId) -> bool {
        let removed = self.store.remove_rule(id);
        if removed {
            info!(rule_id = %id, "scoring rule deleted");
        }
        removed
    }

    pub fn set_bounds(&self, min_score: i32, max_score: i32) -> Result<(), ScoringServiceError> {
        self.store.set_bounds(min_score, max_score)?;
        info!(min_score, max_score, "score bounds updated");
        Ok(())
    }

    pub fn set_ai_assist(&self, enabled: bool) {
        self.store.set_ai_assist(enabled);
        info!(enabled, "AI assist toggled");
    }

    /// Score a created or edited lead and persist it with its new score.
    pub async fn save_lead(&self, lead: Lead) -> Result<LeadScore, ScoringServiceError> {
        let settings = self.store.snapshot();
        let scored = self.scoring.score_lead(&lead, &settings).await;
        self.persist(scored)
    }

    pub async fn score_lead(&self, id: &LeadId) -> Result<LeadScore, ScoringServiceError> {
        let lead = self
            .leads
            .fetch(id)?
            .ok_or_else(|| ScoringServiceError::LeadNotFound(id.clone()))?;

        let settings = self.store.snapshot();
        let scored = self.scoring.score_lead(&lead, &settings).await;
        self.persist(scored)
    }

    /// Score the given leads against one snapshot. Unknown ids land in `missing`;
    /// a lead whose fetch or persist fails lands in `failed` without affecting the rest.
    pub async fn score_leads(
        &self,
        ids: Vec<LeadId>,
        cancellation: &BatchCancellation,
    ) -> BatchReport {
        let mut report = BatchReport::default();
        let mut seen = BTreeSet::new();
        let mut leads = Vec::with_capacity(ids.len());

        for id in ids {
            if !seen.insert(id.clone()) {
                continue;
            }
            match self.leads.fetch(&id) {
                Ok(Some(lead)) => leads.push(lead),
                Ok(None) => report.missing.push(id),
                Err(error) => {
                    warn!(lead_id = %id, %error, "could not load lead for scoring");
                    report.failed.push(id);
                }
            }
        }

        self.run_batch(leads, cancellation, report).await
    }

    /// Re-score every stored lead, e.g. after the rule set changed.
    pub async fn rescore_all(
        &self,
        cancellation: &BatchCancellation,
    ) -> Result<BatchReport, ScoringServiceError> {
        let leads = self.leads.all()?;
        Ok(self
            .run_batch(leads, cancellation, BatchReport::default())
            .await)
    }

    async fn run_batch(
        &self,
        leads: Vec<Lead>,
        cancellation: &BatchCancellation,
        mut report: BatchReport,
    ) -> BatchReport {
        let requested = leads.len();
        let batch = self
            .scoring
            .score_leads(leads, self.store.snapshot(), cancellation)
            .await;

        for scored in batch.scored {
            let lead_id = scored.lead.id.clone();
            match self.persist(scored) {
                Ok(score) => {
                    report.scores.insert(lead_id, score);
                }
                Err(error) => {
                    warn!(lead_id = %lead_id, %error, "could not persist scored lead");
                    report.failed.push(lead_id);
                }
            }
        }
        report.cancelled.extend(batch.cancelled);
        report.failed.extend(batch.failed);

        info!(
            requested,
            scored = report.scores.len(),
            missing = report.missing.len(),
            cancelled = report.cancelled.len(),
            failed = report.failed.len(),
            "batch scoring finished"
        );
        report
    }

    fn persist(&self, scored: ScoredLead) -> Result<LeadScore, ScoringServiceError> {
        self.leads.upsert(scored.lead.clone())?;
        info!(lead_id = %scored.lead.id, score = scored.score, "lead scored");
        Ok(LeadScore::from(scored))
    }
}
