use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use serde::Serialize;
use tokio::sync::{Notify, Semaphore};
use tokio::task::JoinSet;
use tracing::{debug, warn};

use super::assist::{AssistError, ScoreAdjuster, AI_ASSIST_CATEGORY, AI_ASSIST_REASON};
use super::domain::{Lead, LeadId, ScoreBreakdown, ScoringSettings};
use super::evaluation::{aggregate, Aggregation, RuleDiagnostic};

pub const DEFAULT_ASSIST_TIMEOUT: Duration = Duration::from_millis(2_000);

/// Runtime knobs for the scoring service.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScoringOptions {
    pub assist_timeout: Duration,
    pub max_concurrency: usize,
}

impl Default for ScoringOptions {
    fn default() -> Self {
        Self {
            assist_timeout: DEFAULT_ASSIST_TIMEOUT,
            max_concurrency: default_concurrency(),
        }
    }
}

pub fn default_concurrency() -> usize {
    thread::available_parallelism()
        .map(|parallelism| parallelism.get())
        .unwrap_or(4)
}

/// Non-fatal degradation reported alongside a score.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, thiserror::Error)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum ScoringWarning {
    #[error("AI assist timed out after {timeout_ms} ms; base score kept")]
    #[serde(rename_all = "camelCase")]
    AssistTimedOut { timeout_ms: u64 },
    #[error("AI assist unavailable ({reason}); base score kept")]
    AssistUnavailable { reason: String },
    #[error("AI assist cancelled; base score kept")]
    AssistCancelled,
}

impl From<AssistError> for ScoringWarning {
    fn from(error: AssistError) -> Self {
        match error {
            AssistError::Timeout(timeout) => ScoringWarning::AssistTimedOut {
                timeout_ms: u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX),
            },
            AssistError::Unavailable(reason) => ScoringWarning::AssistUnavailable { reason },
            AssistError::Cancelled => ScoringWarning::AssistCancelled,
        }
    }
}

/// Result of scoring one lead. `lead` is a fresh copy with score and breakdown set.
#[derive(Debug, Clone, PartialEq)]
pub struct ScoredLead {
    pub lead: Lead,
    pub score: i32,
    pub diagnostics: Vec<RuleDiagnostic>,
    pub warnings: Vec<ScoringWarning>,
}

impl ScoredLead {
    pub fn breakdown(&self) -> &[ScoreBreakdown] {
        &self.lead.score_breakdown
    }
}

/// Outcome of a batch pass, in input order.
#[derive(Debug, Default)]
pub struct BatchScoring {
    pub scored: Vec<ScoredLead>,
    /// Leads never dispatched because the batch was cancelled first.
    pub cancelled: Vec<LeadId>,
    /// Leads whose scoring task terminated abnormally.
    pub failed: Vec<LeadId>,
}

/// Shared cancellation signal for a batch. Clones observe the same flag.
#[derive(Debug, Clone, Default)]
pub struct BatchCancellation {
    inner: Arc<CancellationState>,
}

#[derive(Debug, Default)]
struct CancellationState {
    cancelled: AtomicBool,
    notify: Notify,
}

impl BatchCancellation {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.inner.cancelled.store(true, Ordering::Release);
        self.inner.notify.notify_waiters();
    }

    pub fn is_cancelled(&self) -> bool {
        self.inner.cancelled.load(Ordering::Acquire)
    }

    /// Resolves once `cancel` has been called.
    pub async fn cancelled(&self) {
        loop {
            let notified = self.inner.notify.notified();
            if self.is_cancelled() {
                return;
            }
            notified.await;
        }
    }
}

/// Orchestrates rule aggregation and the optional AI adjustment.
pub struct ScoringService<A> {
    adjuster: Arc<A>,
    options: ScoringOptions,
}

impl<A> Clone for ScoringService<A> {
    fn clone(&self) -> Self {
        Self {
            adjuster: Arc::clone(&self.adjuster),
            options: self.options.clone(),
        }
    }
}

impl<A> ScoringService<A>
where
    A: ScoreAdjuster + 'static,
{
    pub fn new(adjuster: Arc<A>, options: ScoringOptions) -> Self {
        Self { adjuster, options }
    }

    pub fn options(&self) -> &ScoringOptions {
        &self.options
    }

    /// Score one lead against a settings snapshot. Never fails; AI problems become warnings.
    pub async fn score_lead(&self, lead: &Lead, settings: &ScoringSettings) -> ScoredLead {
        self.score(lead, settings, None).await
    }

    /// Score many leads against one snapshot with bounded parallelism.
    pub async fn score_leads(
        &self,
        leads: Vec<Lead>,
        settings: Arc<ScoringSettings>,
        cancellation: &BatchCancellation,
    ) -> BatchScoring {
        let permits = Arc::new(Semaphore::new(self.options.max_concurrency.max(1)));
        let mut tasks = JoinSet::new();
        let mut dispatched = Vec::with_capacity(leads.len());
        let mut cancelled = Vec::new();

        let mut pending = leads.into_iter();
        while let Some(lead) = pending.next() {
            let permit = tokio::select! {
                biased;
                _ = cancellation.cancelled() => None,
                permit = Arc::clone(&permits).acquire_owned() => permit.ok(),
            };
            let Some(permit) = permit else {
                cancelled.push(lead.id);
                cancelled.extend(pending.by_ref().map(|lead| lead.id));
                break;
            };

            let index = dispatched.len();
            dispatched.push(lead.id.clone());

            let service = self.clone();
            let settings = Arc::clone(&settings);
            let cancellation = cancellation.clone();
            tasks.spawn(async move {
                let _permit = permit;
                let scored = service.score(&lead, &settings, Some(&cancellation)).await;
                (index, scored)
            });
        }

        if !cancelled.is_empty() {
            debug!(cancelled = cancelled.len(), "batch cancelled before dispatch completed");
        }

        let mut slots: Vec<Option<ScoredLead>> = vec![None; dispatched.len()];
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok((index, scored)) => slots[index] = Some(scored),
                Err(error) => warn!(%error, "lead scoring task terminated abnormally"),
            }
        }

        let mut scored = Vec::with_capacity(slots.len());
        let mut failed = Vec::new();
        for (lead_id, slot) in dispatched.into_iter().zip(slots) {
            match slot {
                Some(result) => scored.push(result),
                None => failed.push(lead_id),
            }
        }

        BatchScoring {
            scored,
            cancelled,
            failed,
        }
    }

    async fn score(
        &self,
        lead: &Lead,
        settings: &ScoringSettings,
        cancellation: Option<&BatchCancellation>,
    ) -> ScoredLead {
        let Aggregation {
            mut score,
            mut breakdown,
            diagnostics,
        } = aggregate(settings, lead);
        let mut warnings = Vec::new();

        if settings.ai_assist {
            match self.assist(lead, score, &breakdown, cancellation).await {
                Ok(delta) => {
                    score = settings.clamp(i64::from(score) + i64::from(delta));
                    breakdown.push(ScoreBreakdown {
                        category: AI_ASSIST_CATEGORY.to_string(),
                        score: delta,
                        reason: AI_ASSIST_REASON.to_string(),
                    });
                }
                Err(error) => {
                    warn!(lead_id = %lead.id, %error, "AI assist failed; keeping base score");
                    warnings.push(ScoringWarning::from(error));
                }
            }
        }

        ScoredLead {
            lead: lead.with_score(score, breakdown),
            score,
            diagnostics,
            warnings,
        }
    }

    async fn assist(
        &self,
        lead: &Lead,
        base_score: i32,
        breakdown: &[ScoreBreakdown],
        cancellation: Option<&BatchCancellation>,
    ) -> Result<i32, AssistError> {
        let timeout = self.options.assist_timeout;
        let call = tokio::time::timeout(timeout, self.adjuster.adjust(lead, base_score, breakdown));

        let outcome = match cancellation {
            Some(cancellation) => tokio::select! {
                outcome = call => outcome,
                _ = cancellation.cancelled() => return Err(AssistError::Cancelled),
            },
            None => call.await,
        };

        outcome.map_err(|_| AssistError::Timeout(timeout))?
    }
}
