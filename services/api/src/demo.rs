use crate::infra::InMemoryLeadRepository;
use async_trait::async_trait;
use chrono::{Duration, Utc};
use clap::Args;
use lead_scoring::error::AppError;
use lead_scoring::import;
use lead_scoring::scoring::{
    AssistError, BatchCancellation, BatchReport, DisabledAssist, Lead, LeadPriority, LeadScore,
    LeadRepository, LeadSource, LeadStatus, RuleSetStore, RuleSpec, RuleValue, ScoreAdjuster,
    ScoreBreakdown, ScoreField, ScoreOperator, ScoringFacade, ScoringOptions, ScoringService,
    ScoringServiceError,
};
use std::path::PathBuf;
use std::sync::Arc;

#[derive(Args, Debug)]
pub(crate) struct ScoreArgs {
    /// JSON rule set export (current or legacy rule shape)
    #[arg(long)]
    pub(crate) rules: PathBuf,
    /// CSV lead export
    #[arg(long)]
    pub(crate) leads: PathBuf,
    /// Print scores as JSON instead of a listing
    #[arg(long)]
    pub(crate) json: bool,
}

#[derive(Args, Debug, Default)]
pub(crate) struct DemoArgs {
    /// Enable the AI assist step using a local engagement heuristic
    #[arg(long)]
    pub(crate) ai_assist: bool,
    /// Print the batch report as JSON after the listing
    #[arg(long)]
    pub(crate) json: bool,
}

/// Stand-in for a remote AI collaborator: rewards recent, frequent engagement.
pub(crate) struct EngagementAssist;

#[async_trait]
impl ScoreAdjuster for EngagementAssist {
    async fn adjust(
        &self,
        lead: &Lead,
        _base_score: i32,
        _breakdown: &[ScoreBreakdown],
    ) -> Result<i32, AssistError> {
        if lead.status == LeadStatus::Lost {
            return Ok(-5);
        }
        let recent = lead
            .last_interaction
            .is_some_and(|at| Utc::now() - at < Duration::days(14));
        Ok(match (recent, lead.interaction_count) {
            (true, count) if count >= 5 => 8,
            (true, _) => 4,
            _ => 0,
        })
    }
}

pub(crate) async fn run_score(args: ScoreArgs) -> Result<(), AppError> {
    let ScoreArgs { rules, leads, json } = args;

    let store = import::store_from_path(&rules)?;
    let leads = import::leads_from_path(&leads)?;
    let facade = ScoringFacade::new(
        Arc::new(store),
        Arc::new(InMemoryLeadRepository::default()),
        ScoringService::new(Arc::new(DisabledAssist), ScoringOptions::default()),
    );

    let mut scores = Vec::with_capacity(leads.len());
    for lead in leads {
        scores.push(facade.save_lead(lead).await?);
    }

    if json {
        let rendered = serde_json::to_string_pretty(&scores).map_err(std::io::Error::from)?;
        println!("{rendered}");
        return Ok(());
    }

    println!(
        "Scored {} leads against {} rules",
        scores.len(),
        facade.settings().rules.len()
    );
    for score in &scores {
        render_score(score);
    }
    Ok(())
}

pub(crate) async fn run_demo(args: DemoArgs) -> Result<(), AppError> {
    let DemoArgs { ai_assist, json } = args;

    println!("Lead scoring demo");
    let store = Arc::new(RuleSetStore::new());
    for spec in demo_rules() {
        let name = spec.name.clone();
        match store.add_rule(spec) {
            Ok(id) => println!("- rule {id}: {name}"),
            Err(err) => println!("- rule '{name}' rejected: {err}"),
        }
    }
    store.set_ai_assist(ai_assist);

    let repository = Arc::new(InMemoryLeadRepository::default());
    let mut ids = Vec::new();
    for lead in demo_leads() {
        ids.push(lead.id.clone());
        repository
            .upsert(lead)
            .map_err(ScoringServiceError::from)?;
    }

    let facade = ScoringFacade::new(
        store.clone(),
        repository,
        ScoringService::new(Arc::new(EngagementAssist), ScoringOptions::default()),
    );

    let settings = facade.settings();
    println!(
        "\nScoring {} leads (bounds {}..={}, AI assist {})",
        ids.len(),
        settings.min_score,
        settings.max_score,
        if settings.ai_assist { "on" } else { "off" }
    );
    let report = facade.score_leads(ids, &BatchCancellation::new()).await;
    render_report(&report);

    if json {
        let rendered = serde_json::to_string_pretty(&report).map_err(std::io::Error::from)?;
        println!("\n{rendered}");
    }
    Ok(())
}

fn render_report(report: &BatchReport) {
    for score in report.scores.values() {
        render_score(score);
    }
    if !report.missing.is_empty() {
        println!("Missing leads: {}", join_ids(&report.missing));
    }
    if !report.cancelled.is_empty() {
        println!("Cancelled before scoring: {}", join_ids(&report.cancelled));
    }
    if !report.failed.is_empty() {
        println!("Failed: {}", join_ids(&report.failed));
    }
}

fn render_score(score: &LeadScore) {
    let raw_total: i64 = score
        .breakdown
        .iter()
        .map(|entry| i64::from(entry.score))
        .sum();
    if raw_total == i64::from(score.score) {
        println!("- {} -> {}", score.lead_id, score.score);
    } else {
        println!(
            "- {} -> {} (raw total {raw_total}, clamped)",
            score.lead_id, score.score
        );
    }

    for entry in &score.breakdown {
        println!("    {:+} {} ({})", entry.score, entry.category, entry.reason);
    }
    for diagnostic in &score.diagnostics {
        println!(
            "    skipped {}: {}",
            diagnostic.rule_name, diagnostic.error
        );
    }
    for warning in &score.warnings {
        println!("    warning: {warning}");
    }
}

fn join_ids<T: std::fmt::Display>(ids: &[T]) -> String {
    ids.iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

fn text(value: &str) -> Option<RuleValue> {
    Some(RuleValue::Text(value.to_string()))
}

fn number(value: f64) -> Option<RuleValue> {
    Some(RuleValue::Number(value))
}

pub(crate) fn demo_rules() -> Vec<RuleSpec> {
    vec![
        RuleSpec::new(
            "Referral tag",
            ScoreField::Tags,
            ScoreOperator::Contains,
            text("referral"),
            10,
        ),
        RuleSpec::new(
            "Big budget",
            ScoreField::Budget,
            ScoreOperator::GreaterThan,
            number(10_000.0),
            20,
        ),
        RuleSpec::new(
            "Qualified pipeline",
            ScoreField::Status,
            ScoreOperator::Equals,
            text("Qualified"),
            30,
        ),
        RuleSpec::new(
            "Engaged",
            ScoreField::InteractionCount,
            ScoreOperator::GreaterThan,
            number(3.0),
            15,
        ),
        RuleSpec::new(
            "Enterprise account",
            ScoreField::Company,
            ScoreOperator::Contains,
            text("corp"),
            40,
        ),
        RuleSpec::new(
            "No budget on file",
            ScoreField::Budget,
            ScoreOperator::NotExists,
            None,
            -10,
        ),
        RuleSpec::new(
            "Trade show follow-up",
            ScoreField::Source,
            ScoreOperator::Equals,
            text("trade show"),
            5,
        )
        .inactive(),
        RuleSpec::new(
            "Premium budget",
            ScoreField::Budget,
            ScoreOperator::GreaterThan,
            text("high"),
            25,
        ),
    ]
}

pub(crate) fn demo_leads() -> Vec<Lead> {
    let now = Utc::now();

    let mut dana = Lead::new("lead-001", "Acme Corp", LeadSource::Referral, LeadStatus::Qualified);
    dana.name = Some("Dana Whitfield".to_string());
    dana.priority = Some(LeadPriority::High);
    dana.tags = ["referral", "vip"].into_iter().map(String::from).collect();
    dana.budget = Some(25_000.0);
    dana.interaction_count = 6;
    dana.last_interaction = Some(now - Duration::days(2));

    let mut sam = Lead::new("lead-002", "Globex", LeadSource::Website, LeadStatus::Contacted);
    sam.name = Some("Sam Ortiz".to_string());
    sam.budget = Some(5_000.0);
    sam.interaction_count = 2;
    sam.last_interaction = Some(now - Duration::days(40));

    let mut riley = Lead::new("lead-003", "Initech", LeadSource::TradeShow, LeadStatus::Lost);
    riley.priority = Some(LeadPriority::Low);
    riley.tags = ["trade-show"].into_iter().map(String::from).collect();

    vec![dana, sam, riley]
}
