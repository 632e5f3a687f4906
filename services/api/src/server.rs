use crate::cli::ServeArgs;
use crate::infra::{AppState, InMemoryLeadRepository};
use crate::routes::with_scoring_routes;
use axum::Extension;
use axum_prometheus::PrometheusMetricLayer;
use lead_scoring::config::{AppConfig, ScoringConfig};
use lead_scoring::error::AppError;
use lead_scoring::import;
use lead_scoring::scoring::{
    DisabledAssist, RuleSetStore, ScoringFacade, ScoringService, ScoringServiceError,
    ScoringSettings,
};
use lead_scoring::telemetry;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use tracing::{info, warn};

pub(crate) async fn run(mut args: ServeArgs) -> Result<(), AppError> {
    let mut config = AppConfig::load()?;

    if let Some(host) = args.host.take() {
        config.server.host = host;
    }
    if let Some(port) = args.port.take() {
        config.server.port = port;
    }

    telemetry::init(&config.telemetry)?;

    let (prometheus_layer, prometheus_handle) = PrometheusMetricLayer::pair();
    let readiness_flag = Arc::new(std::sync::atomic::AtomicBool::new(false));
    let app_state = AppState {
        readiness: readiness_flag.clone(),
        metrics: Arc::new(prometheus_handle),
    };

    let store = Arc::new(rule_store(&config.scoring)?);
    let repository = Arc::new(InMemoryLeadRepository::default());
    let scoring = ScoringService::new(Arc::new(DisabledAssist), config.scoring.options());
    let facade = Arc::new(ScoringFacade::new(store.clone(), repository, scoring));

    let app = with_scoring_routes(facade)
        .layer(Extension(app_state))
        .layer(prometheus_layer);

    let addr = config.server.socket_addr()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    readiness_flag.store(true, Ordering::Release);

    info!(
        ?config.environment,
        %addr,
        rules = store.len(),
        "lead scoring service ready"
    );

    axum::serve(listener, app).await?;
    Ok(())
}

/// Rule set from `SCORING_RULES_PATH` when configured, otherwise an empty set
/// with the configured bounds. Bounds and AI flag written in the file take
/// precedence over the environment.
pub(crate) fn rule_store(config: &ScoringConfig) -> Result<RuleSetStore, AppError> {
    let configured = ScoringSettings {
        min_score: config.min_score,
        max_score: config.max_score,
        ai_assist: config.ai_assist,
        ..ScoringSettings::default()
    };

    let Some(path) = &config.rules_path else {
        let store = RuleSetStore::with_bounds(config.min_score, config.max_score)
            .map_err(ScoringServiceError::from)?;
        store.set_ai_assist(config.ai_assist);
        return Ok(store);
    };

    info!(path = %path.display(), "loading scoring rules");
    let store = import::store_from_path_with(path, &configured)?;

    let loaded = store.snapshot();
    if (loaded.min_score, loaded.max_score) != (config.min_score, config.max_score) {
        warn!(
            file_min = loaded.min_score,
            file_max = loaded.max_score,
            env_min = config.min_score,
            env_max = config.max_score,
            "rule file bounds override SCORING_MIN_SCORE/SCORING_MAX_SCORE"
        );
    }
    if loaded.ai_assist != config.ai_assist {
        warn!(
            file = loaded.ai_assist,
            env = config.ai_assist,
            "rule file aiAssist overrides SCORING_AI_ASSIST"
        );
    }
    Ok(store)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rule_store_uses_configured_bounds_without_file() {
        let config = ScoringConfig {
            min_score: 10,
            max_score: 60,
            ai_assist: true,
            ..ScoringConfig::default()
        };

        let store = rule_store(&config).expect("store builds");
        let settings = store.snapshot();

        assert_eq!((settings.min_score, settings.max_score), (10, 60));
        assert!(settings.ai_assist);
        assert!(store.is_empty());
    }

    #[test]
    fn rule_store_reports_missing_rule_file() {
        let config = ScoringConfig {
            rules_path: Some("does/not/exist.json".into()),
            ..ScoringConfig::default()
        };

        assert!(matches!(rule_store(&config), Err(AppError::Import(_))));
    }

    #[test]
    fn rule_file_without_bounds_uses_configured_ones() {
        let path = std::env::temp_dir().join(format!(
            "lead-scoring-rules-{}.json",
            std::process::id()
        ));
        std::fs::write(
            &path,
            r#"{"aiAssist": false, "rules": [
                {"id": "rule-0001", "name": "Referral tag", "field": "tags",
                 "operator": "contains", "value": "referral", "points": 10}
            ]}"#,
        )
        .expect("write rule file");
        let config = ScoringConfig {
            min_score: -20,
            max_score: 150,
            ai_assist: true,
            rules_path: Some(path.clone()),
            ..ScoringConfig::default()
        };

        let store = rule_store(&config);
        std::fs::remove_file(&path).expect("remove rule file");

        let settings = store.expect("store builds").snapshot();
        assert_eq!((settings.min_score, settings.max_score), (-20, 150));
        assert!(!settings.ai_assist);
        assert_eq!(settings.rules.len(), 1);
    }
}
