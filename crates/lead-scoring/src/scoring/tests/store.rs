use super::common::*;

use crate::scoring::{
    RuleId, RuleSetStore, RuleSpec, RuleValue, ScoreField, ScoreOperator, ScoreRule,
    ScoringSettings, StoreError, ValidationError,
};

#[test]
fn add_rule_allocates_sequential_ids() {
    let store = RuleSetStore::new();

    let first = store.add_rule(referral_rule()).expect("valid rule");
    let second = store.add_rule(engaged_rule()).expect("valid rule");

    assert_eq!(first, RuleId("rule-0001".to_string()));
    assert_eq!(second, RuleId("rule-0002".to_string()));
    assert_eq!(store.len(), 2);
}

#[test]
fn id_allocation_skips_ids_loaded_from_settings() {
    let store = RuleSetStore::from_settings(ScoringSettings {
        rules: vec![referral_rule().into_rule(RuleId("rule-0001".to_string()))],
        ..ScoringSettings::default()
    })
    .expect("valid settings");

    let id = store.add_rule(engaged_rule()).expect("valid rule");

    assert_eq!(id, RuleId("rule-0002".to_string()));
}

#[test]
fn stores_are_independent() {
    let left = RuleSetStore::new();
    let right = RuleSetStore::new();

    left.add_rule(referral_rule()).expect("valid rule");
    let id = right.add_rule(engaged_rule()).expect("valid rule");

    assert_eq!(id, RuleId("rule-0001".to_string()));
}

#[test]
fn rejected_rule_leaves_store_unchanged() {
    let store = RuleSetStore::new();
    store.add_rule(referral_rule()).expect("valid rule");
    let before = store.snapshot();

    let error = store
        .add_rule(RuleSpec::new(
            "Premium",
            ScoreField::Budget,
            ScoreOperator::GreaterThan,
            text("high"),
            30,
        ))
        .expect_err("non-numeric threshold rejected");

    assert!(matches!(error, ValidationError::IncompatibleValue { .. }));
    assert_eq!(store.snapshot(), before);
}

#[test]
fn snapshots_do_not_observe_later_mutations() {
    let store = RuleSetStore::new();
    let id = store.add_rule(referral_rule()).expect("valid rule");
    let snapshot = store.snapshot();

    store
        .update_rule(&id, referral_rule().inactive())
        .expect("update succeeds");
    store.add_rule(engaged_rule()).expect("valid rule");
    store.set_bounds(10, 50).expect("valid bounds");

    assert_eq!(snapshot.rules.len(), 1);
    assert!(snapshot.rules[0].is_active);
    assert_eq!((snapshot.min_score, snapshot.max_score), (0, 100));

    let current = store.snapshot();
    assert_eq!(current.rules.len(), 2);
    assert!(!current.rules[0].is_active);
}

#[test]
fn update_keeps_position_and_id() {
    let store = RuleSetStore::new();
    let first = store.add_rule(referral_rule()).expect("valid rule");
    store.add_rule(engaged_rule()).expect("valid rule");

    store
        .update_rule(&first, qualified_rule())
        .expect("update succeeds");

    let snapshot = store.snapshot();
    assert_eq!(snapshot.rules[0].id, first);
    assert_eq!(snapshot.rules[0].name, "Qualified");
}

#[test]
fn update_of_unknown_rule_is_not_found() {
    let store = RuleSetStore::new();
    let missing = RuleId("rule-9999".to_string());

    let error = store
        .update_rule(&missing, referral_rule())
        .expect_err("unknown rule");

    assert_eq!(error, StoreError::NotFound(missing));
}

#[test]
fn deleting_missing_rule_is_idempotent() {
    let store = RuleSetStore::new();
    store.add_rule(referral_rule()).expect("valid rule");
    let missing = RuleId("rule-0042".to_string());

    assert!(!store.remove_rule(&missing));
    let once = store.snapshot();
    assert!(!store.remove_rule(&missing));
    let twice = store.snapshot();

    assert_eq!(once, twice);
    assert_eq!(store.len(), 1);
}

#[test]
fn removing_existing_rule_drops_it() {
    let store = RuleSetStore::new();
    let id = store.add_rule(referral_rule()).expect("valid rule");

    assert!(store.remove_rule(&id));
    assert!(store.rule(&id).is_none());
    assert!(store.is_empty());
}

#[test]
fn invalid_bounds_are_rejected() {
    let store = RuleSetStore::new();

    assert_eq!(
        store.set_bounds(80, 20),
        Err(ValidationError::InvalidBounds { min: 80, max: 20 })
    );
    assert_eq!(store.snapshot().max_score, 100);
    assert!(RuleSetStore::with_bounds(5, 1).is_err());
}

#[test]
fn ai_assist_toggle_is_published() {
    let store = RuleSetStore::new();
    store.set_ai_assist(true);
    assert!(store.snapshot().ai_assist);
    store.set_ai_assist(false);
    assert!(!store.snapshot().ai_assist);
}

#[test]
fn loading_settings_revalidates_rules() {
    let duplicate = ScoringSettings {
        rules: vec![
            referral_rule().into_rule(RuleId("r1".to_string())),
            engaged_rule().into_rule(RuleId("r1".to_string())),
        ],
        ..ScoringSettings::default()
    };
    assert_eq!(
        RuleSetStore::from_settings(duplicate).err(),
        Some(ValidationError::DuplicateRule(RuleId("r1".to_string())))
    );

    let stale = ScoringSettings {
        rules: vec![ScoreRule {
            id: RuleId("r2".to_string()),
            name: "Premium".to_string(),
            field: ScoreField::Budget,
            operator: ScoreOperator::GreaterThan,
            value: Some(RuleValue::Text("high".to_string())),
            points: 30,
            is_active: true,
        }],
        ..ScoringSettings::default()
    };
    assert!(RuleSetStore::from_settings(stale).is_err());
}

#[test]
fn readers_see_whole_snapshots_while_a_writer_mutates() {
    let store = RuleSetStore::new();

    std::thread::scope(|scope| {
        scope.spawn(|| {
            for step in 1..=200 {
                store.add_rule(referral_rule()).expect("valid rule");
                store.set_bounds(step, step + 100).expect("valid bounds");
            }
        });

        for _ in 0..4 {
            scope.spawn(|| {
                let mut seen = 0;
                for _ in 0..500 {
                    let settings = store.snapshot();
                    assert_eq!(settings.max_score - settings.min_score, 100);
                    assert!(settings.rules.len() >= seen);
                    seen = settings.rules.len();

                    for (index, rule) in settings.rules.iter().enumerate() {
                        assert_eq!(rule.id, RuleId(format!("rule-{:04}", index + 1)));
                    }
                }
            });
        }
    });

    let settings = store.snapshot();
    assert_eq!(settings.rules.len(), 200);
    assert_eq!((settings.min_score, settings.max_score), (200, 300));
}
