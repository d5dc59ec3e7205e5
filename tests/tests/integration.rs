//! End-to-end tests over the manager + router stack with scripted engines.

use ocrflow_core::{
    BackendRouter, Complexity, ManualGauge, ModelManager, OcrError, PageInput, ResourceClass,
    RuntimeConfig,
};
use ocrflow_testing::{ScriptedEngine, SlotTracker, manager_with};
use std::sync::Arc;
use std::time::Duration;

/// Best-effort subscriber setup; later calls are no-ops. Run with
/// `RUST_LOG=debug` to see the scripted engines and the manager talk.
fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

struct Stack {
    router: BackendRouter,
    manager: ModelManager,
    gauge: Arc<ManualGauge>,
    deepseek: Arc<ScriptedEngine>,
    got: Arc<ScriptedEngine>,
    surya: Arc<ScriptedEngine>,
}

/// The canonical 3-tier stack: deepseek-ocr (constrained, 14000 MB),
/// got-ocr (constrained, 11000 MB), surya (unconstrained, 0) over a
/// 16000 MB pool.
fn stack(
    deepseek: ScriptedEngine,
    got: ScriptedEngine,
    surya: ScriptedEngine,
    used_mb: u64,
    config: RuntimeConfig,
) -> Stack {
    init_tracing();
    let deepseek = deepseek.shared();
    let got = got.shared();
    let surya = surya.shared();
    let gauge = Arc::new(ManualGauge::new(16_000, used_mb));
    let manager = manager_with(
        &[
            (deepseek.clone(), ResourceClass::Constrained, 14_000),
            (got.clone(), ResourceClass::Constrained, 11_000),
            (surya.clone(), ResourceClass::Unconstrained, 0),
        ],
        gauge.clone(),
    );
    let router = BackendRouter::new(manager.clone(), &config).expect("router build");
    Stack {
        router,
        manager,
        gauge,
        deepseek,
        got,
        surya,
    }
}

fn tier_config() -> RuntimeConfig {
    RuntimeConfig::new(vec![
        "deepseek-ocr".to_string(),
        "got-ocr".to_string(),
        "surya".to_string(),
    ])
}

fn page() -> PageInput {
    PageInput::path("/scans/contract-p3.png")
}

#[tokio::test]
async fn degradation_walks_the_full_chain_in_order() {
    // 6000 MB already used: neither constrained tier fits (10000 MB free),
    // the unconstrained fallback must serve the request
    let s = stack(
        ScriptedEngine::new("deepseek-ocr"),
        ScriptedEngine::new("got-ocr"),
        ScriptedEngine::new("surya"),
        6_000,
        tier_config(),
    );

    let out = s
        .router
        .route(&page(), Complexity::Complex, None)
        .await
        .expect("fallback must serve");
    assert_eq!(out.model, "surya");
    assert_eq!(s.deepseek.load_calls(), 0);
    assert_eq!(s.got.load_calls(), 0);
    assert_eq!(s.surya.process_calls(), 1);
}

#[tokio::test]
async fn constrained_slot_never_holds_two_models_under_concurrent_routes() {
    let tracker = SlotTracker::new();
    let s = stack(
        ScriptedEngine::new("deepseek-ocr")
            .with_load_delay(Duration::from_millis(5))
            .with_tracker(tracker.clone()),
        ScriptedEngine::new("got-ocr")
            .with_load_delay(Duration::from_millis(5))
            .with_tracker(tracker.clone()),
        ScriptedEngine::new("surya"),
        0,
        tier_config(),
    );

    // concurrent requests forced to different constrained tiers evict each
    // other; thrash is expected, slot violations are not
    let mut handles = Vec::new();
    for i in 0..16 {
        let router_tier = if i % 2 == 0 { "deepseek-ocr" } else { "got-ocr" };
        let s_manager = s.manager.clone();
        handles.push(tokio::spawn(async move {
            s_manager.acquire(router_tier).await
        }));
    }
    for h in handles {
        // individual acquires may be evicted afterwards but must not error
        h.await.unwrap().expect("acquire");
    }

    assert!(
        tracker.max_seen() <= 1,
        "constrained slot held {} models at once",
        tracker.max_seen()
    );
}

#[tokio::test]
async fn critical_pressure_routes_straight_to_fallback() {
    let s = stack(
        ScriptedEngine::new("deepseek-ocr"),
        ScriptedEngine::new("got-ocr"),
        ScriptedEngine::new("surya"),
        15_000, // 93.75% used, past the default 90% critical threshold
        tier_config(),
    );

    let out = s
        .router
        .route(&page(), Complexity::Complex, None)
        .await
        .expect("fallback must serve");
    assert_eq!(out.model, "surya");
    assert_eq!(s.deepseek.load_calls(), 0);
    assert_eq!(s.got.load_calls(), 0);
}

#[tokio::test]
async fn processing_failure_reaches_the_caller_unchanged() {
    let s = stack(
        ScriptedEngine::new("deepseek-ocr").with_failing_process(),
        ScriptedEngine::new("got-ocr"),
        ScriptedEngine::new("surya"),
        0,
        tier_config(),
    );

    let err = s
        .router
        .route(&page(), Complexity::Complex, None)
        .await
        .unwrap_err();
    match err {
        OcrError::ProcessingFailure(msg) => assert!(msg.contains("deepseek-ocr")),
        other => panic!("expected ProcessingFailure, got {other:?}"),
    }
    // degradation never kicked in
    assert_eq!(s.got.load_calls(), 0);
    assert_eq!(s.surya.load_calls(), 0);
}

#[tokio::test]
async fn eager_startup_warms_fallbacks_and_best_constrained_tier() {
    let config = tier_config().with_lazy_loading(false);
    let s = stack(
        ScriptedEngine::new("deepseek-ocr"),
        ScriptedEngine::new("got-ocr"),
        ScriptedEngine::new("surya"),
        0,
        config.clone(),
    );

    assert!(!config.lazy_loading);
    s.router.warm_up().await;

    assert!(s.manager.is_loaded("surya"));
    assert!(s.manager.is_loaded("deepseek-ocr"));
    assert!(!s.manager.is_loaded("got-ocr"));
}

#[tokio::test]
async fn abandoned_waiter_still_gets_a_loaded_model() {
    let s = stack(
        ScriptedEngine::new("deepseek-ocr").with_load_delay(Duration::from_millis(120)),
        ScriptedEngine::new("got-ocr"),
        ScriptedEngine::new("surya"),
        0,
        tier_config(),
    );

    let err = s
        .manager
        .acquire_timeout("deepseek-ocr", Duration::from_millis(10))
        .await
        .unwrap_err();
    assert!(matches!(err, OcrError::AcquireTimeout { .. }));

    // the load was not cancelled; it finishes and the model is usable
    tokio::time::sleep(Duration::from_millis(250)).await;
    assert!(s.manager.is_loaded("deepseek-ocr"));
    assert_eq!(s.deepseek.load_calls(), 1);
}

#[tokio::test]
async fn pressure_recovers_when_the_pool_drains() {
    let s = stack(
        ScriptedEngine::new("deepseek-ocr"),
        ScriptedEngine::new("got-ocr"),
        ScriptedEngine::new("surya"),
        15_000,
        tier_config(),
    );

    let out = s.router.route(&page(), Complexity::Complex, None).await.unwrap();
    assert_eq!(out.model, "surya");

    // pool drains; the best tier is reachable again
    s.gauge.set_used_mb(0);
    let out = s.router.route(&page(), Complexity::Complex, None).await.unwrap();
    assert_eq!(out.model, "deepseek-ocr");
}

#[tokio::test]
async fn detected_gauge_drives_a_real_manager() {
    // whatever this machine has (GPU or RAM fallback), the stack comes up
    // and reports a coherent pressure level
    init_tracing();
    let gauge = ocrflow_gpu::detect_gauge();
    let surya = ScriptedEngine::new("surya").shared();
    let registry = ocrflow_core::ModelRegistry::builder()
        .register(ocrflow_core::ModelDescriptor::new(
            "surya",
            ResourceClass::Unconstrained,
            0,
            ScriptedEngine::factory(&surya),
        ))
        .build()
        .unwrap();
    let manager = ModelManager::new(
        registry,
        gauge,
        ocrflow_core::PressureThresholds::default(),
    );

    let stats = manager.stats();
    assert!(stats.total_mb > 0);
    manager.acquire("surya").await.unwrap();
    assert!(manager.is_loaded("surya"));
}
