use std::io::Read;
use std::path::Path;

use serde::Deserialize;
use tracing::info;

use super::ImportError;
use crate::scoring::{LegacyScoringRule, RuleSetStore, ScoreRule, ScoringSettings};

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RuleSetDocument {
    #[serde(default)]
    rules: Vec<RuleEntry>,
    #[serde(default)]
    min_score: Option<i32>,
    #[serde(default)]
    max_score: Option<i32>,
    #[serde(default)]
    ai_assist: Option<bool>,
}

/// Either the flat rule shape or the older nested `condition` shape.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum RuleEntry {
    Current(ScoreRule),
    Legacy(LegacyScoringRule),
}

impl RuleEntry {
    fn into_rule(self) -> Result<ScoreRule, ImportError> {
        match self {
            RuleEntry::Current(rule) => Ok(rule),
            RuleEntry::Legacy(legacy) => Ok(ScoreRule::try_from(legacy)?),
        }
    }
}

/// Build a rule set store from a JSON export. Every rule is re-validated.
pub fn load_settings<R: Read>(reader: R) -> Result<RuleSetStore, ImportError> {
    load_settings_with(reader, &ScoringSettings::default())
}

/// Like [`load_settings`], taking bounds and the AI flag from `fallback` when the
/// document leaves them out. Rules in `fallback` are ignored.
pub fn load_settings_with<R: Read>(
    reader: R,
    fallback: &ScoringSettings,
) -> Result<RuleSetStore, ImportError> {
    let document: RuleSetDocument = serde_json::from_reader(reader)?;

    let rules = document
        .rules
        .into_iter()
        .map(RuleEntry::into_rule)
        .collect::<Result<Vec<_>, _>>()?;

    let settings = ScoringSettings {
        rules,
        min_score: document.min_score.unwrap_or(fallback.min_score),
        max_score: document.max_score.unwrap_or(fallback.max_score),
        ai_assist: document.ai_assist.unwrap_or(fallback.ai_assist),
    };
    let store = RuleSetStore::from_settings(settings)?;

    info!(rules = store.len(), "rule set imported");
    Ok(store)
}

pub fn store_from_path<P: AsRef<Path>>(path: P) -> Result<RuleSetStore, ImportError> {
    store_from_path_with(path, &ScoringSettings::default())
}

pub fn store_from_path_with<P: AsRef<Path>>(
    path: P,
    fallback: &ScoringSettings,
) -> Result<RuleSetStore, ImportError> {
    let file = std::fs::File::open(path)?;
    load_settings_with(std::io::BufReader::new(file), fallback)
}
