use std::collections::BTreeSet;
use std::fmt;

use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use serde::{Deserialize, Serialize};

/// Identifier wrapper for CRM leads.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LeadId(pub String);

impl fmt::Display for LeadId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Identifier wrapper for scoring rules, allocated by the rule set store.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RuleId(pub String);

impl fmt::Display for RuleId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Channel a lead arrived through.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum LeadSource {
    Website,
    LinkedIn,
    Referral,
    #[serde(rename = "Trade Show")]
    TradeShow,
    Webinar,
    Other,
}

impl LeadSource {
    pub const ALL: [LeadSource; 6] = [
        LeadSource::Website,
        LeadSource::LinkedIn,
        LeadSource::Referral,
        LeadSource::TradeShow,
        LeadSource::Webinar,
        LeadSource::Other,
    ];

    pub const fn label(self) -> &'static str {
        match self {
            LeadSource::Website => "Website",
            LeadSource::LinkedIn => "LinkedIn",
            LeadSource::Referral => "Referral",
            LeadSource::TradeShow => "Trade Show",
            LeadSource::Webinar => "Webinar",
            LeadSource::Other => "Other",
        }
    }

    /// Case-insensitive lookup used by imports and rule validation.
    pub fn from_label(raw: &str) -> Option<Self> {
        let raw = raw.trim();
        Self::ALL
            .into_iter()
            .find(|source| source.label().eq_ignore_ascii_case(raw))
    }
}

/// Pipeline stage of a lead.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum LeadStatus {
    New,
    Contacted,
    Qualified,
    Lost,
    Converted,
}

impl LeadStatus {
    pub const ALL: [LeadStatus; 5] = [
        LeadStatus::New,
        LeadStatus::Contacted,
        LeadStatus::Qualified,
        LeadStatus::Lost,
        LeadStatus::Converted,
    ];

    pub const fn label(self) -> &'static str {
        match self {
            LeadStatus::New => "New",
            LeadStatus::Contacted => "Contacted",
            LeadStatus::Qualified => "Qualified",
            LeadStatus::Lost => "Lost",
            LeadStatus::Converted => "Converted",
        }
    }

    pub fn from_label(raw: &str) -> Option<Self> {
        let raw = raw.trim();
        Self::ALL
            .into_iter()
            .find(|status| status.label().eq_ignore_ascii_case(raw))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum LeadPriority {
    Low,
    Medium,
    High,
}

impl LeadPriority {
    pub fn from_label(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "low" => Some(LeadPriority::Low),
            "medium" => Some(LeadPriority::Medium),
            "high" => Some(LeadPriority::High),
            _ => None,
        }
    }
}

/// CRM contact or opportunity subject to scoring.
///
/// `score` and `score_breakdown` are a cache of the last scoring pass and are only
/// ever written together through [`Lead::with_score`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Lead {
    pub id: LeadId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default)]
    pub company: String,
    pub source: LeadSource,
    pub status: LeadStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub priority: Option<LeadPriority>,
    #[serde(default)]
    pub tags: BTreeSet<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub budget: Option<f64>,
    #[serde(default)]
    pub interaction_count: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_interaction: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub score: Option<i32>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub score_breakdown: Vec<ScoreBreakdown>,
}

impl Lead {
    pub fn new(
        id: impl Into<String>,
        company: impl Into<String>,
        source: LeadSource,
        status: LeadStatus,
    ) -> Self {
        Self {
            id: LeadId(id.into()),
            name: None,
            company: company.into(),
            source,
            status,
            priority: None,
            tags: BTreeSet::new(),
            budget: None,
            interaction_count: 0,
            last_interaction: None,
            score: None,
            score_breakdown: Vec::new(),
        }
    }

    /// Copy of this lead carrying the result of a scoring pass.
    pub fn with_score(&self, score: i32, breakdown: Vec<ScoreBreakdown>) -> Self {
        Self {
            score: Some(score),
            score_breakdown: breakdown,
            ..self.clone()
        }
    }
}

/// Attribute of a lead a rule can inspect.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ScoreField {
    Source,
    Status,
    Tags,
    Budget,
    Company,
    InteractionCount,
    LastInteraction,
}

impl ScoreField {
    pub const ALL: [ScoreField; 7] = [
        ScoreField::Source,
        ScoreField::Status,
        ScoreField::Tags,
        ScoreField::Budget,
        ScoreField::Company,
        ScoreField::InteractionCount,
        ScoreField::LastInteraction,
    ];

    /// Name used on the wire and in breakdown reasons.
    pub const fn as_str(self) -> &'static str {
        match self {
            ScoreField::Source => "source",
            ScoreField::Status => "status",
            ScoreField::Tags => "tags",
            ScoreField::Budget => "budget",
            ScoreField::Company => "company",
            ScoreField::InteractionCount => "interactionCount",
            ScoreField::LastInteraction => "lastInteraction",
        }
    }

    /// Accepts the wire name as well as its snake_case spelling.
    pub fn from_name(raw: &str) -> Option<Self> {
        let wanted = raw.trim().replace('_', "").to_ascii_lowercase();
        Self::ALL
            .into_iter()
            .find(|field| field.as_str().to_ascii_lowercase() == wanted)
    }

    pub const fn is_enumerated(self) -> bool {
        matches!(self, ScoreField::Source | ScoreField::Status)
    }

    pub const fn is_numeric(self) -> bool {
        matches!(self, ScoreField::Budget | ScoreField::InteractionCount)
    }

    pub const fn is_temporal(self) -> bool {
        matches!(self, ScoreField::LastInteraction)
    }

    /// Fields with a natural ordering, the only ones `greater_than`/`less_than` apply to.
    pub const fn is_ordered(self) -> bool {
        self.is_numeric() || self.is_temporal()
    }

    pub const fn supports_contains(self) -> bool {
        matches!(self, ScoreField::Tags | ScoreField::Company)
    }
}

impl fmt::Display for ScoreField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScoreOperator {
    Equals,
    Contains,
    GreaterThan,
    LessThan,
    Exists,
    NotExists,
}

impl ScoreOperator {
    pub const fn as_str(self) -> &'static str {
        match self {
            ScoreOperator::Equals => "equals",
            ScoreOperator::Contains => "contains",
            ScoreOperator::GreaterThan => "greater_than",
            ScoreOperator::LessThan => "less_than",
            ScoreOperator::Exists => "exists",
            ScoreOperator::NotExists => "not_exists",
        }
    }

    pub const fn is_existence(self) -> bool {
        matches!(self, ScoreOperator::Exists | ScoreOperator::NotExists)
    }
}

impl fmt::Display for ScoreOperator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Operand of a rule condition. Untagged on the wire so dashboard payloads
/// (`"referral"`, `10000`, `true`) deserialize directly.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RuleValue {
    Boolean(bool),
    Number(f64),
    Text(String),
}

impl RuleValue {
    /// Numeric reading of the value; numeric text is accepted.
    pub fn as_number(&self) -> Option<f64> {
        let number = match self {
            RuleValue::Number(number) => *number,
            RuleValue::Text(text) => text.trim().parse::<f64>().ok()?,
            RuleValue::Boolean(_) => return None,
        };
        number.is_finite().then_some(number)
    }

    /// Text reading of the value; numbers render the way they display.
    pub fn as_text(&self) -> Option<String> {
        match self {
            RuleValue::Text(text) => Some(text.clone()),
            RuleValue::Number(number) if number.is_finite() => Some(number.to_string()),
            _ => None,
        }
    }

    /// Temporal reading: RFC 3339 timestamp, `YYYY-MM-DD` date, or epoch milliseconds.
    pub fn as_temporal(&self) -> Option<TemporalValue> {
        match self {
            RuleValue::Number(millis) if millis.is_finite() => {
                DateTime::<Utc>::from_timestamp_millis(*millis as i64).map(TemporalValue::Instant)
            }
            RuleValue::Text(text) => parse_temporal(text),
            _ => None,
        }
    }
}

impl fmt::Display for RuleValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RuleValue::Boolean(flag) => write!(f, "{flag}"),
            RuleValue::Number(number) => write!(f, "{number}"),
            RuleValue::Text(text) => f.write_str(text),
        }
    }
}

/// Point in time a `lastInteraction` rule compares against.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TemporalValue {
    Day(NaiveDate),
    Instant(DateTime<Utc>),
}

impl TemporalValue {
    /// Ordering anchor; a calendar day starts at midnight UTC.
    pub fn instant(self) -> DateTime<Utc> {
        match self {
            TemporalValue::Day(day) => day.and_time(NaiveTime::MIN).and_utc(),
            TemporalValue::Instant(instant) => instant,
        }
    }
}

pub(crate) fn parse_temporal(raw: &str) -> Option<TemporalValue> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return None;
    }

    if let Ok(instant) = DateTime::parse_from_rfc3339(trimmed) {
        return Some(TemporalValue::Instant(instant.with_timezone(&Utc)));
    }

    NaiveDate::parse_from_str(trimmed, "%Y-%m-%d")
        .ok()
        .map(TemporalValue::Day)
}

/// Condition-to-points mapping evaluated against each lead.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScoreRule {
    pub id: RuleId,
    pub name: String,
    pub field: ScoreField,
    pub operator: ScoreOperator,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<RuleValue>,
    pub points: i32,
    #[serde(default = "active_by_default")]
    pub is_active: bool,
}

/// Rule definition submitted on create and update; the store assigns the id.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RuleSpec {
    pub name: String,
    pub field: ScoreField,
    pub operator: ScoreOperator,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<RuleValue>,
    pub points: i32,
    #[serde(default = "active_by_default")]
    pub is_active: bool,
}

impl RuleSpec {
    pub fn new(
        name: impl Into<String>,
        field: ScoreField,
        operator: ScoreOperator,
        value: Option<RuleValue>,
        points: i32,
    ) -> Self {
        Self {
            name: name.into(),
            field,
            operator,
            value,
            points,
            is_active: true,
        }
    }

    pub fn inactive(mut self) -> Self {
        self.is_active = false;
        self
    }

    pub(crate) fn into_rule(self, id: RuleId) -> ScoreRule {
        ScoreRule {
            id,
            name: self.name,
            field: self.field,
            operator: self.operator,
            value: self.value,
            points: self.points,
            is_active: self.is_active,
        }
    }
}

impl From<ScoreRule> for RuleSpec {
    fn from(rule: ScoreRule) -> Self {
        Self {
            name: rule.name,
            field: rule.field,
            operator: rule.operator,
            value: rule.value,
            points: rule.points,
            is_active: rule.is_active,
        }
    }
}

fn active_by_default() -> bool {
    true
}

pub const DEFAULT_MIN_SCORE: i32 = 0;
pub const DEFAULT_MAX_SCORE: i32 = 100;

fn default_min_score() -> i32 {
    DEFAULT_MIN_SCORE
}

fn default_max_score() -> i32 {
    DEFAULT_MAX_SCORE
}

/// Ordered rule set plus score bounds; evaluation order is list order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScoringSettings {
    #[serde(default)]
    pub rules: Vec<ScoreRule>,
    #[serde(default = "default_min_score")]
    pub min_score: i32,
    #[serde(default = "default_max_score")]
    pub max_score: i32,
    #[serde(default)]
    pub ai_assist: bool,
}

impl Default for ScoringSettings {
    fn default() -> Self {
        Self {
            rules: Vec::new(),
            min_score: DEFAULT_MIN_SCORE,
            max_score: DEFAULT_MAX_SCORE,
            ai_assist: false,
        }
    }
}

impl ScoringSettings {
    pub fn active_rules(&self) -> impl Iterator<Item = &ScoreRule> {
        self.rules.iter().filter(|rule| rule.is_active)
    }

    pub fn rule(&self, id: &RuleId) -> Option<&ScoreRule> {
        self.rules.iter().find(|rule| &rule.id == id)
    }

    /// Clamp a raw total into `[min_score, max_score]`.
    pub fn clamp(&self, raw: i64) -> i32 {
        let bounded = raw
            .max(i64::from(self.min_score))
            .min(i64::from(self.max_score));
        bounded as i32
    }
}

/// Per-rule contribution explaining a computed score.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScoreBreakdown {
    pub category: String,
    pub score: i32,
    pub reason: String,
}
