use std::collections::HashSet;
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use tracing::debug;

use super::domain::{RuleId, RuleSpec, ScoreRule, ScoringSettings};
use super::validation::{validate_bounds, validate_rule, validate_spec, ValidationError};

/// Error raised by rule set mutations.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum StoreError {
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error("rule {0} not found")]
    NotFound(RuleId),
}

/// Owner of the administrator-defined rule set.
///
/// Mutations are serialized behind the write lock and publish a freshly built
/// `ScoringSettings`; snapshots already handed out keep pointing at the old value.
#[derive(Debug, Default)]
pub struct RuleSetStore {
    state: RwLock<StoreState>,
}

#[derive(Debug, Default)]
struct StoreState {
    settings: Arc<ScoringSettings>,
    sequence: u64,
}

impl StoreState {
    fn publish(&mut self, settings: ScoringSettings) {
        self.settings = Arc::new(settings);
    }

    fn next_rule_id(&mut self) -> RuleId {
        loop {
            self.sequence += 1;
            let candidate = RuleId(format!("rule-{:04}", self.sequence));
            if self.settings.rule(&candidate).is_none() {
                return candidate;
            }
        }
    }
}

impl RuleSetStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Empty rule set with the given score bounds.
    pub fn with_bounds(min_score: i32, max_score: i32) -> Result<Self, ValidationError> {
        Self::from_settings(ScoringSettings {
            min_score,
            max_score,
            ..ScoringSettings::default()
        })
    }

    /// Rebuild a store from persisted settings, applying the same checks as `add_rule`.
    pub fn from_settings(settings: ScoringSettings) -> Result<Self, ValidationError> {
        validate_bounds(settings.min_score, settings.max_score)?;

        let mut seen = HashSet::new();
        let rules = settings
            .rules
            .into_iter()
            .map(|rule| {
                if !seen.insert(rule.id.clone()) {
                    return Err(ValidationError::DuplicateRule(rule.id));
                }
                validate_rule(rule)
            })
            .collect::<Result<Vec<ScoreRule>, ValidationError>>()?;

        let settings = ScoringSettings { rules, ..settings };
        Ok(Self {
            state: RwLock::new(StoreState {
                settings: Arc::new(settings),
                sequence: 0,
            }),
        })
    }

    /// Immutable point-in-time copy for one evaluation pass.
    pub fn snapshot(&self) -> Arc<ScoringSettings> {
        Arc::clone(&self.read().settings)
    }

    pub fn rule(&self, id: &RuleId) -> Option<ScoreRule> {
        self.read().settings.rule(id).cloned()
    }

    pub fn len(&self) -> usize {
        self.read().settings.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Validate and append a rule, returning its newly allocated id.
    pub fn add_rule(&self, spec: RuleSpec) -> Result<RuleId, ValidationError> {
        let spec = validate_spec(spec)?;

        let mut state = self.write();
        let id = state.next_rule_id();
        let mut settings = ScoringSettings::clone(&state.settings);
        settings.rules.push(spec.into_rule(id.clone()));
        state.publish(settings);

        debug!(rule_id = %id, "rule added");
        Ok(id)
    }

    /// Replace a rule in place, keeping its position in the evaluation order.
    pub fn update_rule(&self, id: &RuleId, spec: RuleSpec) -> Result<(), StoreError> {
        let spec = validate_spec(spec)?;

        let mut state = self.write();
        let mut settings = ScoringSettings::clone(&state.settings);
        let slot = settings
            .rules
            .iter_mut()
            .find(|rule| &rule.id == id)
            .ok_or_else(|| StoreError::NotFound(id.clone()))?;
        *slot = spec.into_rule(id.clone());
        state.publish(settings);

        debug!(rule_id = %id, "rule updated");
        Ok(())
    }

    /// Remove a rule; unknown ids are a no-op. Returns whether anything was removed.
    pub fn remove_rule(&self, id: &RuleId) -> bool {
        let mut state = self.write();
        if state.settings.rule(id).is_none() {
            return false;
        }

        let mut settings = ScoringSettings::clone(&state.settings);
        settings.rules.retain(|rule| &rule.id != id);
        state.publish(settings);

        debug!(rule_id = %id, "rule removed");
        true
    }

    pub fn set_bounds(&self, min_score: i32, max_score: i32) -> Result<(), ValidationError> {
        validate_bounds(min_score, max_score)?;

        let mut state = self.write();
        let settings = ScoringSettings {
            min_score,
            max_score,
            ..ScoringSettings::clone(&state.settings)
        };
        state.publish(settings);
        Ok(())
    }

    pub fn set_ai_assist(&self, enabled: bool) {
        let mut state = self.write();
        if state.settings.ai_assist == enabled {
            return;
        }

        let settings = ScoringSettings {
            ai_assist: enabled,
            ..ScoringSettings::clone(&state.settings)
        };
        state.publish(settings);
    }

    fn read(&self) -> RwLockReadGuard<'_, StoreState> {
        self.state.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, StoreState> {
        self.state.write().unwrap_or_else(PoisonError::into_inner)
    }
}
