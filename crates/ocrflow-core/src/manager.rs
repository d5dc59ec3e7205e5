//! Model lifecycle manager.
//!
//! Owns every model entry, serializes load/unload per entry, and enforces
//! the single-slot constraint for constrained-class models: the pool holds
//! exactly one of them, so eviction always means "evict whatever is
//! currently active" — there is never a choice among cached entries the
//! way an LRU cache would have.
//!
//! Locking protocol:
//! - `promotion` (async) serializes the decision of which constrained
//!   model owns the slot. It is acquired before any entry lock and
//!   released as soon as the promoted entry's lock is held, so it is
//!   never held across a load and unconstrained models never touch it.
//! - each entry's `op_lock` (async) serializes load/unload on that entry;
//!   the first caller performs the load, concurrent callers block on the
//!   same lock and pick up the finished instance.
//! - `active_constrained` and per-entry slot data live behind sync
//!   mutexes held only for short non-await sections.
//!
//! Load and unload finalization runs in a spawned task that owns the entry
//! lock, so a caller that abandons its wait (deadline, dropped future)
//! never cancels the operation or leaves the entry mid-transition.

use crate::engine::OcrEngine;
use crate::error::{OcrError, OcrResult};
use crate::gauge::ResourceGauge;
use crate::pressure::{PressureLevel, PressureThresholds};
use crate::registry::{ModelRegistry, ResourceClass};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Mutex as AsyncMutex;
use tracing::{debug, info, warn};

/// Lifecycle state of one model entry.
///
/// Legal transitions: Unloaded → Loading → Loaded → Unloading → Unloaded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModelState {
    Unloaded,
    Loading,
    Loaded,
    Unloading,
}

impl std::fmt::Display for ModelState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ModelState::Unloaded => write!(f, "unloaded"),
            ModelState::Loading => write!(f, "loading"),
            ModelState::Loaded => write!(f, "loaded"),
            ModelState::Unloading => write!(f, "unloading"),
        }
    }
}

struct Slot {
    state: ModelState,
    instance: Option<Arc<dyn OcrEngine>>,
}

struct ModelEntry {
    name: String,
    class: ResourceClass,
    required_mb: u64,
    op_lock: Arc<AsyncMutex<()>>,
    slot: parking_lot::Mutex<Slot>,
}

impl ModelEntry {
    fn new(name: String, class: ResourceClass, required_mb: u64) -> Self {
        Self {
            name,
            class,
            required_mb,
            op_lock: Arc::new(AsyncMutex::new(())),
            slot: parking_lot::Mutex::new(Slot {
                state: ModelState::Unloaded,
                instance: None,
            }),
        }
    }

    fn state(&self) -> ModelState {
        self.slot.lock().state
    }

    /// The live instance, only while fully loaded.
    fn loaded_instance(&self) -> Option<Arc<dyn OcrEngine>> {
        let slot = self.slot.lock();
        if slot.state == ModelState::Loaded {
            slot.instance.clone()
        } else {
            None
        }
    }

    fn set_loading(&self) {
        self.slot.lock().state = ModelState::Loading;
    }

    fn set_loaded(&self, instance: Arc<dyn OcrEngine>) {
        let mut slot = self.slot.lock();
        slot.state = ModelState::Loaded;
        slot.instance = Some(instance);
    }

    fn reset_unloaded(&self) {
        let mut slot = self.slot.lock();
        slot.state = ModelState::Unloaded;
        slot.instance = None;
    }
}

struct ManagerInner {
    registry: ModelRegistry,
    gauge: Arc<dyn ResourceGauge>,
    thresholds: PressureThresholds,
    entries: HashMap<String, Arc<ModelEntry>>,
    promotion: AsyncMutex<()>,
    active_constrained: parking_lot::Mutex<Option<String>>,
}

/// Snapshot of the manager's current footprint.
#[derive(Debug, Clone)]
pub struct ManagerStats {
    pub loaded_models: Vec<String>,
    pub used_mb: u64,
    pub total_mb: u64,
    pub available_mb: u64,
    pub pressure: PressureLevel,
    pub timestamp: chrono::DateTime<chrono::Utc>,
}

/// Lifecycle manager for all registered models.
///
/// Cheaply cloneable — all clones share the same underlying state. Callers
/// receive it by explicit injection; there is no ambient singleton.
#[derive(Clone)]
pub struct ModelManager {
    inner: Arc<ManagerInner>,
}

impl ModelManager {
    pub fn new(
        registry: ModelRegistry,
        gauge: Arc<dyn ResourceGauge>,
        thresholds: PressureThresholds,
    ) -> Self {
        let mut entries = HashMap::with_capacity(registry.len());
        for name in registry.names() {
            // names() comes straight from the registry map, so the lookup
            // cannot miss
            if let Some(d) = registry.get(&name) {
                entries.insert(
                    name.clone(),
                    Arc::new(ModelEntry::new(name, d.class(), d.required_mb())),
                );
            }
        }
        Self {
            inner: Arc::new(ManagerInner {
                registry,
                gauge,
                thresholds,
                entries,
                promotion: AsyncMutex::new(()),
                active_constrained: parking_lot::Mutex::new(None),
            }),
        }
    }

    /// Return a ready-to-use engine for `name`, loading it if necessary.
    ///
    /// Loaded entries return immediately. An unloaded entry is loaded by
    /// the first caller; concurrent callers for the same name block on the
    /// entry lock and receive the same instance — exactly one underlying
    /// `load()` happens. A constrained model first evicts whichever
    /// constrained model currently holds the slot.
    ///
    /// On any failure the entry reads `Unloaded` again before the error
    /// returns, so retrying is always safe.
    pub async fn acquire(&self, name: &str) -> OcrResult<Arc<dyn OcrEngine>> {
        let entry = self.entry(name)?;

        if let Some(instance) = entry.loaded_instance() {
            return Ok(instance);
        }

        match entry.class {
            ResourceClass::Unconstrained => self.load_entry(entry, None).await,
            ResourceClass::Constrained => {
                let promo = self.inner.promotion.lock().await;

                let victim = self.inner.active_constrained.lock().clone();
                if let Some(victim) = victim.filter(|v| v.as_str() != name) {
                    debug!(model = %name, evicting = %victim, "promoting into constrained slot");
                    if let Err(err) = self.release(&victim).await {
                        // the victim's entry is already back to Unloaded,
                        // so the slot is genuinely free
                        warn!(model = %victim, error = %err, "unload failed during eviction");
                    }
                }

                self.load_entry(entry, Some(promo)).await
            }
        }
    }

    /// [`acquire`](Self::acquire) with a deadline.
    ///
    /// A timed-out waiter abandons the wait; an in-flight `load()` keeps
    /// running in its own task and finalizes shared state normally — the
    /// model is expensive to start loading and cheap to let finish.
    pub async fn acquire_timeout(
        &self,
        name: &str,
        timeout: Duration,
    ) -> OcrResult<Arc<dyn OcrEngine>> {
        match tokio::time::timeout(timeout, self.acquire(name)).await {
            Ok(result) => result,
            Err(_) => Err(OcrError::AcquireTimeout {
                model: name.to_string(),
                timeout_ms: timeout.as_millis() as u64,
            }),
        }
    }

    /// Unload `name` and discard its instance. Idempotent: releasing an
    /// already-unloaded entry is a no-op. An unload error is reported, but
    /// only after the entry is restored to `Unloaded`.
    pub async fn release(&self, name: &str) -> OcrResult<()> {
        let entry = self.entry(name)?;
        let guard = entry.op_lock.clone().lock_owned().await;

        let instance = {
            let mut slot = entry.slot.lock();
            match slot.state {
                ModelState::Unloaded => return Ok(()),
                _ => {
                    slot.state = ModelState::Unloading;
                    slot.instance.take()
                }
            }
        };

        let unload_task = {
            let entry = entry.clone();
            let inner = self.inner.clone();
            tokio::spawn(async move {
                let result = match instance {
                    Some(instance) => instance.unload().await,
                    None => Ok(()),
                };

                entry.reset_unloaded();
                {
                    let mut active = inner.active_constrained.lock();
                    if active.as_deref() == Some(entry.name.as_str()) {
                        *active = None;
                    }
                }

                match &result {
                    Ok(()) => info!(model = %entry.name, "model unloaded"),
                    Err(err) => {
                        warn!(model = %entry.name, error = %err, "unload reported an error, instance discarded")
                    }
                }

                drop(guard);
                result
            })
        };

        match unload_task.await {
            Ok(result) => result,
            Err(join_err) => {
                entry.reset_unloaded();
                self.clear_active_if(name);
                Err(OcrError::LoadFailure(format!(
                    "unload task for {name} panicked: {join_err}"
                )))
            }
        }
    }

    /// The catalog this manager was built from.
    pub fn registry(&self) -> &ModelRegistry {
        &self.inner.registry
    }

    /// Current pressure level, evaluated fresh from the gauge.
    pub fn pressure_level(&self) -> PressureLevel {
        self.inner.thresholds.read(self.inner.gauge.as_ref())
    }

    /// Lifecycle state of `name`, if registered.
    pub fn state(&self, name: &str) -> Option<ModelState> {
        self.inner.entries.get(name).map(|e| e.state())
    }

    pub fn is_loaded(&self, name: &str) -> bool {
        self.state(name) == Some(ModelState::Loaded)
    }

    /// Resource class of `name`, if registered.
    pub fn class_of(&self, name: &str) -> Option<ResourceClass> {
        self.inner.entries.get(name).map(|e| e.class)
    }

    /// Names of all currently loaded models.
    pub fn loaded_models(&self) -> Vec<String> {
        self.inner
            .entries
            .values()
            .filter(|e| e.state() == ModelState::Loaded)
            .map(|e| e.name.clone())
            .collect()
    }

    /// The constrained model currently owning the slot, if any.
    pub fn active_constrained(&self) -> Option<String> {
        self.inner.active_constrained.lock().clone()
    }

    pub fn stats(&self) -> ManagerStats {
        let gauge = self.inner.gauge.as_ref();
        ManagerStats {
            loaded_models: self.loaded_models(),
            used_mb: gauge.used_mb(),
            total_mb: gauge.total_mb(),
            available_mb: gauge.available_mb(),
            pressure: self.pressure_level(),
            timestamp: chrono::Utc::now(),
        }
    }

    /// Best-effort bulk load for eager startup. Failures are logged, not
    /// propagated — a model that cannot warm up will be retried on its
    /// first acquire.
    pub async fn preload(&self, names: &[String]) {
        for name in names {
            match self.acquire(name).await {
                Ok(_) => debug!(model = %name, "preloaded"),
                Err(err) => warn!(model = %name, error = %err, "preload failed"),
            }
        }
    }

    /// Release every loaded model. Used on graceful shutdown.
    pub async fn shutdown(&self) {
        for name in self.loaded_models() {
            if let Err(err) = self.release(&name).await {
                warn!(model = %name, error = %err, "error unloading during shutdown");
            }
        }
        info!("model manager shut down");
    }

    // ------------------------------------------------------------------
    // Internals
    // ------------------------------------------------------------------

    fn entry(&self, name: &str) -> OcrResult<Arc<ModelEntry>> {
        self.inner
            .entries
            .get(name)
            .cloned()
            .ok_or_else(|| OcrError::UnknownModel(name.to_string()))
    }

    fn clear_active_if(&self, name: &str) {
        let mut active = self.inner.active_constrained.lock();
        if active.as_deref() == Some(name) {
            *active = None;
        }
    }

    /// Single-flight load of one entry. For constrained entries the caller
    /// passes the held promotion guard; it is dropped once this entry's
    /// lock is held and the slot claim is written, so the promotion lock
    /// never spans the load itself.
    async fn load_entry(
        &self,
        entry: Arc<ModelEntry>,
        promo: Option<tokio::sync::MutexGuard<'_, ()>>,
    ) -> OcrResult<Arc<dyn OcrEngine>> {
        let guard = entry.op_lock.clone().lock_owned().await;

        // a concurrent caller may have finished the load while we waited
        if let Some(instance) = entry.loaded_instance() {
            return Ok(instance);
        }

        // claim the slot before the load begins so a concurrent promotion
        // sees this entry as the one to evict
        if entry.class == ResourceClass::Constrained {
            *self.inner.active_constrained.lock() = Some(entry.name.clone());
        }
        drop(promo);

        let available = self.inner.gauge.available_mb();
        if entry.required_mb > available {
            if entry.class == ResourceClass::Constrained {
                self.clear_active_if(&entry.name);
            }
            return Err(OcrError::ResourceExhausted(format!(
                "model {} needs {} MB, only {} MB available",
                entry.name, entry.required_mb, available
            )));
        }

        let descriptor = self
            .inner
            .registry
            .get(&entry.name)
            .ok_or_else(|| OcrError::UnknownModel(entry.name.clone()))?;
        let instance = descriptor.instantiate();

        entry.set_loading();
        info!(
            model = %entry.name,
            class = %entry.class,
            required_mb = entry.required_mb,
            "loading model"
        );

        // the load runs in its own task so an abandoned waiter cannot
        // cancel it by dropping this future
        let load_task = {
            let entry = entry.clone();
            let instance = instance.clone();
            let inner = self.inner.clone();
            let started = Instant::now();
            tokio::spawn(async move {
                let result = instance.load().await;
                match &result {
                    Ok(()) => {
                        entry.set_loaded(instance.clone());
                        info!(
                            model = %entry.name,
                            elapsed_ms = started.elapsed().as_millis() as u64,
                            "model loaded"
                        );
                    }
                    Err(err) => {
                        entry.reset_unloaded();
                        if entry.class == ResourceClass::Constrained {
                            let mut active = inner.active_constrained.lock();
                            if active.as_deref() == Some(entry.name.as_str()) {
                                *active = None;
                            }
                        }
                        warn!(model = %entry.name, error = %err, "model load failed");
                    }
                }
                drop(guard);
                result.map(|()| instance)
            })
        };

        match load_task.await {
            Ok(Ok(instance)) => Ok(instance),
            Ok(Err(err)) => Err(OcrError::LoadFailure(err.to_string())),
            Err(join_err) => {
                entry.reset_unloaded();
                self.clear_active_if(&entry.name);
                Err(OcrError::LoadFailure(format!(
                    "load task for {} panicked: {join_err}",
                    entry.name
                )))
            }
        }
    }
}
