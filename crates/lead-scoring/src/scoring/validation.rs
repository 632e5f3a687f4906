use super::domain::{
    LeadSource, LeadStatus, RuleId, RuleSpec, RuleValue, ScoreField, ScoreOperator, ScoreRule,
};

/// Rule definitions rejected before they reach the rule set store.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ValidationError {
    #[error("rule name must not be blank")]
    BlankName,
    #[error("unknown rule field '{0}'")]
    UnknownField(String),
    #[error("operator {operator} is not supported for field {field}")]
    UnsupportedOperator {
        field: ScoreField,
        operator: ScoreOperator,
    },
    #[error("{field} {operator} requires a value")]
    MissingValue {
        field: ScoreField,
        operator: ScoreOperator,
    },
    #[error("{field} {operator} expects {expected}, found '{value}'")]
    IncompatibleValue {
        field: ScoreField,
        operator: ScoreOperator,
        expected: &'static str,
        value: String,
    },
    #[error("'{value}' is not a known {field} label")]
    UnknownLabel { field: ScoreField, value: String },
    #[error("minimum score {min} exceeds maximum score {max}")]
    InvalidBounds { min: i32, max: i32 },
    #[error("rule {0} is defined more than once")]
    DuplicateRule(RuleId),
}

/// Validate a submitted rule and normalize its value into the form the evaluator expects.
pub fn validate_spec(spec: RuleSpec) -> Result<RuleSpec, ValidationError> {
    if spec.name.trim().is_empty() {
        return Err(ValidationError::BlankName);
    }

    let value = normalize_condition(spec.field, spec.operator, spec.value)?;
    Ok(RuleSpec { value, ..spec })
}

/// Same checks as [`validate_spec`] for rules that already carry an id (persisted or imported).
pub fn validate_rule(rule: ScoreRule) -> Result<ScoreRule, ValidationError> {
    let id = rule.id.clone();
    validate_spec(rule.into()).map(|spec| spec.into_rule(id))
}

pub fn validate_bounds(min: i32, max: i32) -> Result<(), ValidationError> {
    if min > max {
        return Err(ValidationError::InvalidBounds { min, max });
    }
    Ok(())
}

fn normalize_condition(
    field: ScoreField,
    operator: ScoreOperator,
    value: Option<RuleValue>,
) -> Result<Option<RuleValue>, ValidationError> {
    if operator.is_existence() {
        return Ok(value);
    }

    let supported = match operator {
        ScoreOperator::Contains => field.supports_contains(),
        ScoreOperator::GreaterThan | ScoreOperator::LessThan => field.is_ordered(),
        _ => true,
    };
    if !supported {
        return Err(ValidationError::UnsupportedOperator { field, operator });
    }

    let value = value.ok_or(ValidationError::MissingValue { field, operator })?;
    let incompatible = |expected: &'static str, value: &RuleValue| {
        ValidationError::IncompatibleValue {
            field,
            operator,
            expected,
            value: value.to_string(),
        }
    };

    let normalized = if field.is_enumerated() {
        let RuleValue::Text(label) = &value else {
            return Err(incompatible("a label", &value));
        };
        let canonical = match field {
            ScoreField::Source => LeadSource::from_label(label).map(LeadSource::label),
            _ => LeadStatus::from_label(label).map(LeadStatus::label),
        };
        let canonical = canonical.ok_or_else(|| ValidationError::UnknownLabel {
            field,
            value: label.clone(),
        })?;
        RuleValue::Text(canonical.to_string())
    } else if field.is_numeric() {
        let number = value
            .as_number()
            .ok_or_else(|| incompatible("a number", &value))?;
        RuleValue::Number(number)
    } else if field.is_temporal() {
        if value.as_temporal().is_none() {
            return Err(incompatible(
                "a date, RFC 3339 timestamp or epoch milliseconds",
                &value,
            ));
        }
        match value {
            RuleValue::Text(text) => RuleValue::Text(text.trim().to_string()),
            other => other,
        }
    } else {
        let text = value
            .as_text()
            .ok_or_else(|| incompatible("text", &value))?;
        RuleValue::Text(text)
    };

    Ok(Some(normalized))
}
