use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use axum::response::Response;
use chrono::{TimeZone, Utc};
use serde_json::Value;

use crate::scoring::{
    AssistError, Lead, LeadId, LeadRepository, LeadSource, LeadStatus, RepositoryError,
    RuleSetStore, RuleSpec, RuleValue, ScoreAdjuster, ScoreBreakdown, ScoreField, ScoreOperator,
    ScoringFacade, ScoringOptions, ScoringService, ScoringSettings,
};

pub(super) fn text(value: &str) -> Option<RuleValue> {
    Some(RuleValue::Text(value.to_string()))
}

pub(super) fn number(value: f64) -> Option<RuleValue> {
    Some(RuleValue::Number(value))
}

pub(super) fn referral_rule() -> RuleSpec {
    RuleSpec::new(
        "Referral tag",
        ScoreField::Tags,
        ScoreOperator::Contains,
        text("referral"),
        10,
    )
}

pub(super) fn big_budget_rule() -> RuleSpec {
    RuleSpec::new(
        "Big budget",
        ScoreField::Budget,
        ScoreOperator::GreaterThan,
        number(10_000.0),
        20,
    )
}

pub(super) fn engaged_rule() -> RuleSpec {
    RuleSpec::new(
        "Engaged",
        ScoreField::InteractionCount,
        ScoreOperator::GreaterThan,
        number(3.0),
        15,
    )
}

pub(super) fn qualified_rule() -> RuleSpec {
    RuleSpec::new(
        "Qualified",
        ScoreField::Status,
        ScoreOperator::Equals,
        text("Qualified"),
        25,
    )
}

pub(super) fn lead(id: &str) -> Lead {
    let mut lead = Lead::new(id, "Acme Corp", LeadSource::Referral, LeadStatus::Qualified);
    lead.name = Some("Dana Whitfield".to_string());
    lead.tags = ["referral", "vip"].into_iter().map(String::from).collect();
    lead.budget = Some(5_000.0);
    lead.interaction_count = 4;
    lead.last_interaction = Some(
        Utc.with_ymd_and_hms(2025, 3, 14, 16, 45, 0)
            .single()
            .expect("valid timestamp"),
    );
    lead
}

/// Settings built through the store so every rule is validated and numbered.
pub(super) fn settings_with(rules: Vec<RuleSpec>) -> ScoringSettings {
    let store = RuleSetStore::new();
    for spec in rules {
        store.add_rule(spec).expect("fixture rule is valid");
    }
    store.snapshot().as_ref().clone()
}

pub(super) fn options(timeout: Duration, max_concurrency: usize) -> ScoringOptions {
    ScoringOptions {
        assist_timeout: timeout,
        max_concurrency,
    }
}

pub(super) fn service<A: ScoreAdjuster + 'static>(adjuster: A) -> ScoringService<A> {
    ScoringService::new(Arc::new(adjuster), options(Duration::from_secs(2), 2))
}

pub(super) fn build_facade<A: ScoreAdjuster + 'static>(
    adjuster: A,
    leads: Vec<Lead>,
) -> (
    ScoringFacade<MemoryLeads, A>,
    Arc<RuleSetStore>,
    Arc<MemoryLeads>,
) {
    let store = Arc::new(RuleSetStore::new());
    let repository = Arc::new(MemoryLeads::seeded(leads));
    let facade = ScoringFacade::new(store.clone(), repository.clone(), service(adjuster));
    (facade, store, repository)
}

#[derive(Default, Clone)]
pub(super) struct MemoryLeads {
    records: Arc<Mutex<HashMap<LeadId, Lead>>>,
}

impl MemoryLeads {
    pub(super) fn seeded(leads: Vec<Lead>) -> Self {
        let records = leads
            .into_iter()
            .map(|lead| (lead.id.clone(), lead))
            .collect();
        Self {
            records: Arc::new(Mutex::new(records)),
        }
    }

    pub(super) fn get(&self, id: &str) -> Option<Lead> {
        self.records
            .lock()
            .expect("repository mutex poisoned")
            .get(&LeadId(id.to_string()))
            .cloned()
    }
}

impl LeadRepository for MemoryLeads {
    fn upsert(&self, lead: Lead) -> Result<(), RepositoryError> {
        self.records
            .lock()
            .expect("repository mutex poisoned")
            .insert(lead.id.clone(), lead);
        Ok(())
    }

    fn fetch(&self, id: &LeadId) -> Result<Option<Lead>, RepositoryError> {
        Ok(self
            .records
            .lock()
            .expect("repository mutex poisoned")
            .get(id)
            .cloned())
    }

    fn all(&self) -> Result<Vec<Lead>, RepositoryError> {
        let mut leads: Vec<Lead> = self
            .records
            .lock()
            .expect("repository mutex poisoned")
            .values()
            .cloned()
            .collect();
        leads.sort_by(|left, right| left.id.cmp(&right.id));
        Ok(leads)
    }
}

pub(super) struct UnavailableLeads;

impl LeadRepository for UnavailableLeads {
    fn upsert(&self, _lead: Lead) -> Result<(), RepositoryError> {
        Err(RepositoryError::Unavailable("database offline".to_string()))
    }

    fn fetch(&self, _id: &LeadId) -> Result<Option<Lead>, RepositoryError> {
        Err(RepositoryError::Unavailable("database offline".to_string()))
    }

    fn all(&self) -> Result<Vec<Lead>, RepositoryError> {
        Err(RepositoryError::Unavailable("database offline".to_string()))
    }
}

/// Adjuster returning a fixed delta and counting its invocations.
#[derive(Default)]
pub(super) struct FixedAdjustment {
    delta: i32,
    calls: AtomicUsize,
}

impl FixedAdjustment {
    pub(super) fn new(delta: i32) -> Self {
        Self {
            delta,
            calls: AtomicUsize::new(0),
        }
    }

    pub(super) fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ScoreAdjuster for FixedAdjustment {
    async fn adjust(
        &self,
        _lead: &Lead,
        _base_score: i32,
        _breakdown: &[ScoreBreakdown],
    ) -> Result<i32, AssistError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.delta)
    }
}

/// Adjuster that answers only after `delay`.
pub(super) struct SlowAdjustment {
    pub(super) delay: Duration,
}

#[async_trait]
impl ScoreAdjuster for SlowAdjustment {
    async fn adjust(
        &self,
        _lead: &Lead,
        _base_score: i32,
        _breakdown: &[ScoreBreakdown],
    ) -> Result<i32, AssistError> {
        tokio::time::sleep(self.delay).await;
        Ok(5)
    }
}

pub(super) async fn read_json_body(response: Response) -> Value {
    let body = axum::body::to_bytes(response.into_body(), 64 * 1024)
        .await
        .expect("read body");
    serde_json::from_slice(&body).expect("json payload")
}
