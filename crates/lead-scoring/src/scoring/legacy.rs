//! Older nested rule shape still found in exported dashboards.
//!
//! ```json
//! { "id": "r1", "name": "Referral", "category": "Source",
//!   "condition": { "field": "source", "operator": "equals", "value": "Referral" },
//!   "points": 20, "active": true }
//! ```

use serde::{Deserialize, Serialize};

use super::domain::{RuleId, RuleValue, ScoreField, ScoreOperator, ScoreRule};
use super::validation::{validate_rule, ValidationError};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum LegacyOperator {
    Equals,
    Contains,
    GreaterThan,
    LessThan,
}

impl From<LegacyOperator> for ScoreOperator {
    fn from(operator: LegacyOperator) -> Self {
        match operator {
            LegacyOperator::Equals => ScoreOperator::Equals,
            LegacyOperator::Contains => ScoreOperator::Contains,
            LegacyOperator::GreaterThan => ScoreOperator::GreaterThan,
            LegacyOperator::LessThan => ScoreOperator::LessThan,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LegacyCondition {
    pub field: String,
    pub operator: LegacyOperator,
    pub value: RuleValue,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LegacyScoringRule {
    pub id: RuleId,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub category: String,
    pub condition: LegacyCondition,
    pub points: i32,
    #[serde(default = "active_by_default")]
    pub active: bool,
}

fn active_by_default() -> bool {
    true
}

impl TryFrom<LegacyScoringRule> for ScoreRule {
    type Error = ValidationError;

    /// The name doubles as the breakdown category, so a blank name falls back to
    /// the legacy category; otherwise the category is dropped.
    fn try_from(legacy: LegacyScoringRule) -> Result<Self, Self::Error> {
        let field = ScoreField::from_name(&legacy.condition.field)
            .ok_or_else(|| ValidationError::UnknownField(legacy.condition.field.clone()))?;

        let name = if legacy.name.trim().is_empty() {
            legacy.category
        } else {
            legacy.name
        };

        validate_rule(ScoreRule {
            id: legacy.id,
            name,
            field,
            operator: legacy.condition.operator.into(),
            value: Some(legacy.condition.value),
            points: legacy.points,
            is_active: legacy.active,
        })
    }
}
