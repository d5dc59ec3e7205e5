//! Tiered backend router with bounded degradation.
//!
//! A request enters with a complexity signal, gets mapped to a starting
//! tier, and walks down the tier list on resource failures until something
//! answers. Data failures are never retried on a cheaper tier.

use crate::config::RuntimeConfig;
use crate::engine::{Complexity, OcrOutput, PageInput};
use crate::error::{OcrError, OcrResult};
use crate::manager::ModelManager;
use crate::pressure::PressureLevel;
use crate::registry::ResourceClass;
use std::time::Duration;
use tracing::{debug, info, warn};

#[derive(Debug, Clone)]
struct Tier {
    name: String,
    class: ResourceClass,
}

/// Routes requests to the best available model tier.
pub struct BackendRouter {
    manager: ModelManager,
    tiers: Vec<Tier>,
    acquire_timeout: Option<Duration>,
}

impl BackendRouter {
    /// Build a router over `config.tiers`. Validation is
    /// [`RuntimeConfig::validate`]: the tier list must be non-empty, fully
    /// registered, and end in an unconstrained model so degradation always
    /// has a landing spot.
    pub fn new(manager: ModelManager, config: &RuntimeConfig) -> OcrResult<Self> {
        config.validate(manager.registry())?;

        let mut tiers = Vec::with_capacity(config.tiers.len());
        for name in &config.tiers {
            // validate() checked every tier is registered
            let class = manager
                .class_of(name)
                .ok_or_else(|| OcrError::UnknownModel(name.to_string()))?;
            tiers.push(Tier {
                name: name.clone(),
                class,
            });
        }
        Ok(Self {
            manager,
            tiers,
            acquire_timeout: config.acquire_timeout_secs.map(Duration::from_secs),
        })
    }

    /// The configured tier names, best first.
    pub fn tier_names(&self) -> Vec<String> {
        self.tiers.iter().map(|t| t.name.clone()).collect()
    }

    /// Eager startup loading: every unconstrained tier plus the
    /// highest-quality constrained tier. Best effort — failures are
    /// logged and retried lazily on first use.
    pub async fn warm_up(&self) {
        let mut names: Vec<String> = Vec::new();
        if let Some(first_constrained) = self
            .tiers
            .iter()
            .find(|t| t.class == ResourceClass::Constrained)
        {
            names.push(first_constrained.name.clone());
        }
        names.extend(
            self.tiers
                .iter()
                .filter(|t| t.class == ResourceClass::Unconstrained)
                .map(|t| t.name.clone()),
        );
        info!(models = ?names, "warming up backends");
        self.manager.preload(&names).await;
    }

    /// Route one request.
    ///
    /// `forced_tier` is the operator override used by an administrative
    /// backend switch; it replaces the complexity mapping and must name a
    /// configured tier. Under critical pressure the walk starts at the
    /// first unconstrained tier and constrained tiers are never attempted,
    /// pre-empting a load that is known likely to fail.
    pub async fn route(
        &self,
        input: &PageInput,
        complexity: Complexity,
        forced_tier: Option<&str>,
    ) -> OcrResult<OcrOutput> {
        let mut start = match forced_tier {
            Some(name) => self
                .tiers
                .iter()
                .position(|t| t.name == name)
                .ok_or_else(|| OcrError::UnknownModel(name.to_string()))?,
            None => self.start_index(complexity),
        };

        let critical = self.manager.pressure_level() == PressureLevel::Critical;
        if critical {
            let first_cheap = self
                .tiers
                .iter()
                .position(|t| t.class == ResourceClass::Unconstrained)
                .unwrap_or(self.tiers.len() - 1);
            if start < first_cheap {
                debug!(
                    from = %self.tiers[start].name,
                    to = %self.tiers[first_cheap].name,
                    "critical pressure, clamping start tier"
                );
                start = first_cheap;
            }
        }

        let mut attempts: Vec<String> = Vec::new();
        for tier in &self.tiers[start..] {
            if critical && tier.class == ResourceClass::Constrained {
                debug!(model = %tier.name, "skipping constrained tier under critical pressure");
                continue;
            }

            let engine = match self.acquire(&tier.name).await {
                Ok(engine) => engine,
                Err(err) if err.is_resource() => {
                    warn!(model = %tier.name, error = %err, "tier unavailable, degrading");
                    attempts.push(format!("{}: {}", tier.name, err));
                    // defensive eviction keeps a half-claimed slot from
                    // lingering; release is idempotent
                    if let Err(e) = self.manager.release(&tier.name).await {
                        warn!(model = %tier.name, error = %e, "defensive release failed");
                    }
                    continue;
                }
                Err(err) => return Err(err),
            };

            match engine.process(input).await {
                Ok(output) => {
                    info!(model = %tier.name, "request served");
                    return Ok(output);
                }
                Err(OcrError::ResourceExhausted(msg)) => {
                    warn!(model = %tier.name, error = %msg, "backend ran out of resources, degrading");
                    attempts.push(format!("{}: resource exhausted: {}", tier.name, msg));
                    if let Err(e) = self.manager.release(&tier.name).await {
                        warn!(model = %tier.name, error = %e, "defensive release failed");
                    }
                    continue;
                }
                // a data problem: surface unmodified, a cheaper model will
                // not fix a malformed input
                Err(err) => return Err(err),
            }
        }

        Err(OcrError::AllBackendsFailed { attempts })
    }

    async fn acquire(
        &self,
        name: &str,
    ) -> OcrResult<std::sync::Arc<dyn crate::engine::OcrEngine>> {
        match self.acquire_timeout {
            Some(timeout) => self.manager.acquire_timeout(name, timeout).await,
            None => self.manager.acquire(name).await,
        }
    }

    /// Complexity → starting index: complex pages get the best tier,
    /// standard pages the middle of the list, simple pages the cheapest.
    fn start_index(&self, complexity: Complexity) -> usize {
        let last = self.tiers.len() - 1;
        let index = match complexity {
            Complexity::Complex => 0,
            Complexity::Standard => self.tiers.len() / 2,
            Complexity::Simple => last,
        };
        index.min(last)
    }
}
