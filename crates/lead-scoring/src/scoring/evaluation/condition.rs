use std::collections::BTreeSet;

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};

use super::super::domain::{
    Lead, RuleValue, ScoreField, ScoreOperator, ScoreRule, TemporalValue,
};

/// Outcome of a single rule condition; `reason` becomes the breakdown entry text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MatchResult {
    pub matched: bool,
    pub reason: String,
}

/// Raised when a stored rule cannot be applied to a lead.
#[derive(Debug, Clone, PartialEq, Serialize, thiserror::Error)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum TypeMismatch {
    #[error("operator {operator} cannot be applied to field {field}")]
    UnsupportedOperator {
        field: ScoreField,
        operator: ScoreOperator,
    },
    #[error("{field} {operator} requires a value")]
    MissingValue {
        field: ScoreField,
        operator: ScoreOperator,
    },
    #[error("{field} {operator} expects {expected}, found '{found}'")]
    IncompatibleValue {
        field: ScoreField,
        operator: ScoreOperator,
        expected: &'static str,
        found: String,
    },
}

/// Lead attribute resolved for one field. Unset and empty attributes are `Absent`.
enum Attribute<'a> {
    Absent,
    Label(&'static str),
    Text(&'a str),
    Tags(&'a BTreeSet<String>),
    Number(f64),
    Timestamp(DateTime<Utc>),
}

impl Attribute<'_> {
    fn resolve(field: ScoreField, lead: &Lead) -> Attribute<'_> {
        match field {
            ScoreField::Source => Attribute::Label(lead.source.label()),
            ScoreField::Status => Attribute::Label(lead.status.label()),
            ScoreField::Company if lead.company.trim().is_empty() => Attribute::Absent,
            ScoreField::Company => Attribute::Text(&lead.company),
            ScoreField::Tags if lead.tags.is_empty() => Attribute::Absent,
            ScoreField::Tags => Attribute::Tags(&lead.tags),
            ScoreField::Budget => lead
                .budget
                .filter(|budget| budget.is_finite())
                .map_or(Attribute::Absent, Attribute::Number),
            ScoreField::InteractionCount => Attribute::Number(f64::from(lead.interaction_count)),
            ScoreField::LastInteraction => lead
                .last_interaction
                .map_or(Attribute::Absent, Attribute::Timestamp),
        }
    }

    fn is_present(&self) -> bool {
        !matches!(self, Attribute::Absent)
    }

    fn render(&self) -> String {
        match self {
            Attribute::Absent => "absent".to_string(),
            Attribute::Label(label) => (*label).to_string(),
            Attribute::Text(text) => (*text).to_string(),
            Attribute::Tags(tags) => tags.iter().cloned().collect::<Vec<_>>().join(", "),
            Attribute::Number(number) => number.to_string(),
            Attribute::Timestamp(instant) => instant.to_rfc3339_opts(SecondsFormat::Secs, true),
        }
    }
}

/// Rule value interpreted for the rule's field, checked independently of any lead.
enum Operand {
    Label(String),
    Text(String),
    Number(f64),
    Temporal(TemporalValue),
}

impl Operand {
    fn for_rule(rule: &ScoreRule) -> Result<Self, TypeMismatch> {
        let (field, operator) = (rule.field, rule.operator);
        let value = rule
            .value
            .as_ref()
            .ok_or(TypeMismatch::MissingValue { field, operator })?;
        let mismatch = |expected: &'static str| TypeMismatch::IncompatibleValue {
            field,
            operator,
            expected,
            found: value.to_string(),
        };

        if field.is_enumerated() {
            match value {
                RuleValue::Text(label) => Ok(Operand::Label(label.clone())),
                _ => Err(mismatch("a label")),
            }
        } else if field.is_numeric() {
            value
                .as_number()
                .map(Operand::Number)
                .ok_or_else(|| mismatch("a number"))
        } else if field.is_temporal() {
            value
                .as_temporal()
                .map(Operand::Temporal)
                .ok_or_else(|| mismatch("a date, timestamp or epoch milliseconds"))
        } else {
            value
                .as_text()
                .map(Operand::Text)
                .ok_or_else(|| mismatch("text"))
        }
    }
}

/// Evaluate one rule against one lead. Pure; absent attributes never raise.
pub fn evaluate(rule: &ScoreRule, lead: &Lead) -> Result<MatchResult, TypeMismatch> {
    let field = rule.field;
    let attribute = Attribute::resolve(field, lead);

    match rule.operator {
        ScoreOperator::Exists => Ok(MatchResult {
            matched: attribute.is_present(),
            reason: format!("{field} is present"),
        }),
        ScoreOperator::NotExists => Ok(MatchResult {
            matched: !attribute.is_present(),
            reason: format!("{field} is absent"),
        }),
        ScoreOperator::Equals => equals(rule, &attribute),
        ScoreOperator::Contains => contains(rule, &attribute),
        ScoreOperator::GreaterThan | ScoreOperator::LessThan => compare(rule, &attribute),
    }
}

fn equals(rule: &ScoreRule, attribute: &Attribute<'_>) -> Result<MatchResult, TypeMismatch> {
    let operand = Operand::for_rule(rule)?;

    let matched = match (&operand, attribute) {
        (Operand::Label(expected), Attribute::Label(actual)) => expected == actual,
        (Operand::Text(expected), Attribute::Tags(tags)) => tags.contains(expected),
        (Operand::Text(expected), Attribute::Text(actual)) => {
            actual.trim().to_lowercase() == expected.trim().to_lowercase()
        }
        (Operand::Number(expected), Attribute::Number(actual)) => actual == expected,
        (Operand::Temporal(TemporalValue::Day(day)), Attribute::Timestamp(actual)) => {
            actual.date_naive() == *day
        }
        (Operand::Temporal(TemporalValue::Instant(instant)), Attribute::Timestamp(actual)) => {
            actual == instant
        }
        _ => false,
    };

    Ok(MatchResult {
        matched,
        reason: format!("{} equals '{}'", rule.field, display_value(rule)),
    })
}

/// Case-insensitive for both tags and company; `equals` on tags stays an exact
/// membership test.
fn contains(rule: &ScoreRule, attribute: &Attribute<'_>) -> Result<MatchResult, TypeMismatch> {
    if !rule.field.supports_contains() {
        return Err(TypeMismatch::UnsupportedOperator {
            field: rule.field,
            operator: rule.operator,
        });
    }

    let Operand::Text(needle) = Operand::for_rule(rule)? else {
        return Err(TypeMismatch::UnsupportedOperator {
            field: rule.field,
            operator: rule.operator,
        });
    };
    let needle = needle.to_lowercase();

    let matched = match attribute {
        Attribute::Tags(tags) => tags.iter().any(|tag| tag.to_lowercase() == needle),
        Attribute::Text(text) => text.to_lowercase().contains(&needle),
        _ => false,
    };

    Ok(MatchResult {
        matched,
        reason: format!("{} contains '{}'", rule.field, display_value(rule)),
    })
}

fn compare(rule: &ScoreRule, attribute: &Attribute<'_>) -> Result<MatchResult, TypeMismatch> {
    if !rule.field.is_ordered() {
        return Err(TypeMismatch::UnsupportedOperator {
            field: rule.field,
            operator: rule.operator,
        });
    }

    let greater = rule.operator == ScoreOperator::GreaterThan;
    let operand = Operand::for_rule(rule)?;

    let ordering = match (&operand, attribute) {
        (Operand::Number(threshold), Attribute::Number(actual)) => actual.partial_cmp(threshold),
        (Operand::Temporal(bound), Attribute::Timestamp(actual)) => {
            Some(actual.cmp(&bound.instant()))
        }
        _ => None,
    };
    let matched = match ordering {
        Some(std::cmp::Ordering::Greater) => greater,
        Some(std::cmp::Ordering::Less) => !greater,
        _ => false,
    };

    let relation = if greater { "greater than" } else { "less than" };
    let reason = if attribute.is_present() {
        format!(
            "{} {} {} {}",
            rule.field,
            attribute.render(),
            relation,
            display_value(rule)
        )
    } else {
        format!("{} {} {}", rule.field, relation, display_value(rule))
    };

    Ok(MatchResult { matched, reason })
}

fn display_value(rule: &ScoreRule) -> String {
    rule.value
        .as_ref()
        .map(ToString::to_string)
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scoring::domain::{LeadSource, LeadStatus, RuleId};
    use chrono::TimeZone;

    fn rule(field: ScoreField, operator: ScoreOperator, value: Option<RuleValue>) -> ScoreRule {
        ScoreRule {
            id: RuleId("rule-test".to_string()),
            name: "test".to_string(),
            field,
            operator,
            value,
            points: 10,
            is_active: true,
        }
    }

    fn text(value: &str) -> Option<RuleValue> {
        Some(RuleValue::Text(value.to_string()))
    }

    fn lead() -> Lead {
        let mut lead = Lead::new("lead-1", "Acme Corp", LeadSource::Referral, LeadStatus::New);
        lead.tags = ["referral".to_string(), "vip".to_string()].into_iter().collect();
        lead.budget = Some(5000.0);
        lead.interaction_count = 4;
        lead.last_interaction = Some(Utc.with_ymd_and_hms(2025, 3, 14, 15, 0, 0).unwrap());
        lead
    }

    #[test]
    fn tags_contains_matches_member_with_reason() {
        let result = evaluate(
            &rule(ScoreField::Tags, ScoreOperator::Contains, text("Referral")),
            &lead(),
        )
        .expect("evaluates");

        assert!(result.matched);
        assert_eq!(result.reason, "tags contains 'Referral'");
    }

    #[test]
    fn tags_equals_is_exact_membership() {
        let lead = lead();
        assert!(
            evaluate(&rule(ScoreField::Tags, ScoreOperator::Equals, text("vip")), &lead)
                .unwrap()
                .matched
        );
        assert!(
            !evaluate(&rule(ScoreField::Tags, ScoreOperator::Equals, text("VIP")), &lead)
                .unwrap()
                .matched
        );
    }

    #[test]
    fn company_matching_is_case_insensitive() {
        let lead = lead();
        assert!(
            evaluate(
                &rule(ScoreField::Company, ScoreOperator::Equals, text(" acme corp ")),
                &lead
            )
            .unwrap()
            .matched
        );
        assert!(
            evaluate(&rule(ScoreField::Company, ScoreOperator::Contains, text("ACME")), &lead)
                .unwrap()
                .matched
        );
    }

    #[test]
    fn enumerated_equality_is_exact() {
        let lead = lead();
        assert!(
            evaluate(&rule(ScoreField::Source, ScoreOperator::Equals, text("Referral")), &lead)
                .unwrap()
                .matched
        );
        assert!(
            !evaluate(&rule(ScoreField::Source, ScoreOperator::Equals, text("referral")), &lead)
                .unwrap()
                .matched
        );
    }

    #[test]
    fn budget_below_threshold_does_not_match() {
        let result = evaluate(
            &rule(
                ScoreField::Budget,
                ScoreOperator::GreaterThan,
                Some(RuleValue::Number(10000.0)),
            ),
            &lead(),
        )
        .expect("evaluates");

        assert!(!result.matched);
        assert_eq!(result.reason, "budget 5000 greater than 10000");
    }

    #[test]
    fn absent_budget_never_matches_comparisons() {
        let mut lead = lead();
        lead.budget = None;

        for operator in [ScoreOperator::GreaterThan, ScoreOperator::LessThan] {
            let result = evaluate(
                &rule(ScoreField::Budget, operator, Some(RuleValue::Number(1.0))),
                &lead,
            )
            .expect("absent attribute is not an error");
            assert!(!result.matched);
        }
    }

    #[test]
    fn interaction_count_compares_numerically() {
        let result = evaluate(
            &rule(
                ScoreField::InteractionCount,
                ScoreOperator::GreaterThan,
                Some(RuleValue::Number(3.0)),
            ),
            &lead(),
        )
        .unwrap();
        assert!(result.matched);
        assert_eq!(result.reason, "interactionCount 4 greater than 3");
    }

    #[test]
    fn last_interaction_compares_against_dates_and_instants() {
        let lead = lead();
        assert!(
            evaluate(
                &rule(
                    ScoreField::LastInteraction,
                    ScoreOperator::GreaterThan,
                    text("2025-03-01"),
                ),
                &lead
            )
            .unwrap()
            .matched
        );
        assert!(
            evaluate(
                &rule(
                    ScoreField::LastInteraction,
                    ScoreOperator::LessThan,
                    text("2025-03-14T16:00:00Z"),
                ),
                &lead
            )
            .unwrap()
            .matched
        );
        assert!(
            evaluate(
                &rule(
                    ScoreField::LastInteraction,
                    ScoreOperator::Equals,
                    text("2025-03-14"),
                ),
                &lead
            )
            .unwrap()
            .matched
        );
    }

    #[test]
    fn stale_non_numeric_threshold_is_a_type_mismatch() {
        let error = evaluate(
            &rule(ScoreField::Budget, ScoreOperator::GreaterThan, text("high")),
            &lead(),
        )
        .expect_err("non-numeric threshold");

        assert!(matches!(
            error,
            TypeMismatch::IncompatibleValue {
                field: ScoreField::Budget,
                ..
            }
        ));
    }

    #[test]
    fn ordering_on_free_text_is_a_type_mismatch() {
        let error = evaluate(
            &rule(
                ScoreField::Company,
                ScoreOperator::GreaterThan,
                Some(RuleValue::Number(1.0)),
            ),
            &lead(),
        )
        .expect_err("company is not ordered");
        assert!(matches!(error, TypeMismatch::UnsupportedOperator { .. }));
    }

    #[test]
    fn exists_and_not_exists_are_complementary() {
        let populated = lead();
        let mut sparse = Lead::new("lead-2", "  ", LeadSource::Other, LeadStatus::Lost);
        sparse.budget = Some(f64::NAN);

        for field in ScoreField::ALL {
            for lead in [&populated, &sparse] {
                let exists = evaluate(&rule(field, ScoreOperator::Exists, None), lead).unwrap();
                let missing = evaluate(&rule(field, ScoreOperator::NotExists, None), lead).unwrap();
                assert_eq!(exists.matched, !missing.matched, "field {field}");
            }
        }

        assert!(
            !evaluate(&rule(ScoreField::Company, ScoreOperator::Exists, None), &sparse)
                .unwrap()
                .matched
        );
        assert!(
            evaluate(&rule(ScoreField::InteractionCount, ScoreOperator::Exists, None), &sparse)
                .unwrap()
                .matched
        );
    }
}
