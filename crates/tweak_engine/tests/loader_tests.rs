//! Progressive bootstrap and status reloads.

use std::sync::Arc;
use std::time::Duration;

use tweak_common::{RiskLevel, TweakStatus};
use tweak_engine::fake::{self, FakeBackend};
use tweak_engine::{EngineConfig, EngineError, LoadPhase, TweakEngine};

fn engine_with(backend: &Arc<FakeBackend>) -> TweakEngine {
    TweakEngine::new(backend.clone(), EngineConfig::default())
}

#[tokio::test]
async fn test_two_phase_load() {
    let backend = Arc::new(FakeBackend::sample());
    let engine = engine_with(&backend);
    assert_eq!(engine.load_phase(), LoadPhase::Empty);
    assert!(engine.tweaks().await.is_empty());

    let catalog = engine.ensure_catalog().await.unwrap();
    assert_eq!(engine.load_phase(), LoadPhase::CatalogReady);
    assert_eq!(catalog.len(), 4);
    assert_eq!(backend.calls("get_all_tweak_statuses"), 0);

    // Every id already has a default status after phase one.
    let tweaks = engine.tweaks().await;
    assert_eq!(tweaks.len(), 4);
    assert!(tweaks.iter().all(|t| t.status == TweakStatus::unapplied(t.id())));

    engine.ensure_status().await.unwrap();
    assert_eq!(engine.load_phase(), LoadPhase::Ready);
    assert_eq!(engine.system_info().await.unwrap().hostname, "testbox");
}

#[tokio::test]
async fn test_concurrent_loads_share_one_round_trip() {
    let backend = Arc::new(FakeBackend::sample());
    backend.set_delay(Duration::from_millis(10));
    let engine = engine_with(&backend);

    let (a, b, c) = tokio::join!(
        engine.ensure_loaded(),
        engine.ensure_loaded(),
        engine.ensure_catalog()
    );
    a.unwrap();
    b.unwrap();
    c.unwrap();

    assert_eq!(backend.calls("get_categories"), 1);
    assert_eq!(backend.calls("get_available_tweaks"), 1);
    assert_eq!(backend.calls("get_all_tweak_statuses"), 1);
    assert_eq!(backend.calls("get_system_info"), 1);
}

#[tokio::test]
async fn test_loaded_phases_are_noops() {
    let backend = Arc::new(FakeBackend::sample());
    let engine = engine_with(&backend);
    engine.ensure_loaded().await.unwrap();
    let calls = backend.total_calls();

    engine.ensure_loaded().await.unwrap();
    engine.ensure_catalog().await.unwrap();

    assert_eq!(backend.total_calls(), calls);
}

#[tokio::test]
async fn test_catalog_failure_is_fatal_and_retryable() {
    let backend = Arc::new(FakeBackend::sample());
    backend.unreachable("get_available_tweaks");
    let engine = engine_with(&backend);

    let err = engine.ensure_loaded().await.unwrap_err();
    assert!(matches!(err, EngineError::CatalogLoad(_)));
    assert!(err.is_fatal());
    assert_eq!(engine.load_phase(), LoadPhase::Empty);

    backend.reachable("get_available_tweaks");
    engine.ensure_loaded().await.unwrap();
    assert_eq!(engine.load_phase(), LoadPhase::Ready);
}

#[tokio::test]
async fn test_inconsistent_catalog_is_fatal() {
    let backend = Arc::new(FakeBackend::new(
        vec![fake::category("privacy", "Privacy", 0)],
        vec![fake::tweak("orphan", "missing", &["Off", "On"], RiskLevel::Low, false)],
    ));
    let engine = engine_with(&backend);

    let err = engine.ensure_catalog().await.unwrap_err();
    assert!(matches!(err, EngineError::CatalogIntegrity(_)));
}

#[tokio::test]
async fn test_status_failure_is_fatal() {
    let backend = Arc::new(FakeBackend::sample());
    backend.unreachable("get_all_tweak_statuses");
    let engine = engine_with(&backend);

    let err = engine.ensure_loaded().await.unwrap_err();
    assert!(matches!(err, EngineError::StatusLoad(_)));
    assert!(err.is_fatal());
    assert_eq!(engine.load_phase(), LoadPhase::CatalogReady);
}

#[tokio::test]
async fn test_system_info_failure_is_soft() {
    let backend = Arc::new(FakeBackend::sample());
    backend.unreachable("get_system_info");
    let engine = engine_with(&backend);

    engine.ensure_loaded().await.unwrap();

    assert_eq!(engine.load_phase(), LoadPhase::Ready);
    assert!(engine.system_info().await.is_none());
}

#[tokio::test]
async fn test_unreported_status_defaults_to_unapplied() {
    let backend = Arc::new(FakeBackend::sample());
    backend.set_status(TweakStatus {
        tweak_id: "telemetry".to_string(),
        is_applied: true,
        has_backup: true,
        current_option_index: Some(0),
        error: None,
    });
    backend.hide_status("telemetry");
    let engine = engine_with(&backend);

    engine.ensure_loaded().await.unwrap();

    let tweak = engine.tweak("telemetry").await.unwrap();
    assert_eq!(tweak.status, TweakStatus::unapplied("telemetry"));
}

#[tokio::test]
async fn test_reload_replaces_statuses_and_bumps_version() {
    let backend = Arc::new(FakeBackend::sample());
    let engine = engine_with(&backend);
    engine.ensure_loaded().await.unwrap();
    let version = engine.status_version().await;
    let mut watcher = engine.subscribe_status().await;
    let _ = watcher.borrow_and_update();

    let applied = TweakStatus {
        tweak_id: "search_indexer".to_string(),
        is_applied: true,
        has_backup: true,
        current_option_index: Some(0),
        error: None,
    };
    backend.set_status(applied.clone());
    engine.reload().await.unwrap();

    assert_eq!(engine.tweak("search_indexer").await.unwrap().status, applied);
    assert!(engine.status_version().await > version);
    assert!(watcher.has_changed().unwrap());
    assert_eq!(backend.calls("get_all_tweak_statuses"), 2);
}

#[tokio::test]
async fn test_refresh_single_status() {
    let backend = Arc::new(FakeBackend::sample());
    let engine = engine_with(&backend);
    engine.ensure_loaded().await.unwrap();

    let mut status = TweakStatus::unapplied("hibernation");
    status.error = Some("detection failed".to_string());
    backend.set_status(status.clone());

    let refreshed = engine.refresh_status("hibernation").await.unwrap();
    assert_eq!(refreshed, status);
    assert_eq!(engine.tweak("hibernation").await.unwrap().status, status);

    backend.unreachable("get_tweak_status");
    assert!(matches!(
        engine.refresh_status("hibernation").await,
        Err(EngineError::Refresh { .. })
    ));
    assert!(matches!(
        engine.refresh_status("ghost").await,
        Err(EngineError::UnknownTweak(_))
    ));
}
