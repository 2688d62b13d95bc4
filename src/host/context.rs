use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use log::info;
use once_cell::sync::OnceCell;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::config::HostConfig;
use crate::host::bridge::ReactiveBridge;
use crate::host::error::{LogSupervisor, Supervisor};
use crate::host::scheduler::TickScheduler;

/// Opaque identifier for a player or other world entity, used as an
/// affinity key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct EntityId(Uuid);

impl EntityId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for EntityId {
    fn default() -> Self {
        Self::new()
    }
}

/// A partition of the simulated world with its own owning execution context
/// in the region-affine backend mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct RegionId(pub u64);

/// The unit of "where code is safe to run". Re-derived from the affinity
/// resolver at every dispatch, never cached across calls.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ExecutionContext {
    Global,
    Region(RegionId),
}

/// What a scheduling call is aimed at. `Entity` targets are resolved to an
/// owning context at execution time, because the entity may have moved
/// between region owners since the work was scheduled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatchTarget {
    Global,
    Entity(EntityId),
}

/// Resolves the current owner of an entity. `None` means the entity is gone
/// (disconnected, removed) and any work aimed at it must be dropped.
pub trait AffinityResolver: Send + Sync {
    fn resolve(&self, entity: EntityId) -> Option<RegionId>;
}

/// Mutable ownership table. The host moves entities between regions as they
/// cross borders and removes them on disconnect.
pub struct AffinityMap {
    owners: Mutex<HashMap<EntityId, RegionId>>,
}

impl AffinityMap {
    pub fn new() -> Self {
        Self {
            owners: Mutex::new(HashMap::new()),
        }
    }

    /// Place an entity in a region, replacing any previous owner.
    pub fn place(&self, entity: EntityId, region: RegionId) {
        self.owners.lock().unwrap().insert(entity, region);
    }

    /// Remove an entity from the world entirely.
    pub fn remove(&self, entity: EntityId) {
        self.owners.lock().unwrap().remove(&entity);
    }
}

impl Default for AffinityMap {
    fn default() -> Self {
        Self::new()
    }
}

impl AffinityResolver for AffinityMap {
    fn resolve(&self, entity: EntityId) -> Option<RegionId> {
        self.owners.lock().unwrap().get(&entity).copied()
    }
}

/// Which scheduler backend is active. Selected exactly once per process by
/// the capability probe and never changed afterwards.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchedulerMode {
    /// One shared logical thread for everything.
    Global,
    /// One logical thread per region; work must run on the thread owning
    /// the region that contains its target.
    RegionAffine,
}

static SCHEDULER_MODE: OnceCell<SchedulerMode> = OnceCell::new();

/// One-time capability probe, cached for the process lifetime. The closure
/// asks the host environment whether region-affine scheduling is available;
/// it runs at most once no matter how often the probe is called.
pub fn probe_scheduler_mode(detect_region_capable: impl FnOnce() -> bool) -> SchedulerMode {
    *SCHEDULER_MODE.get_or_init(|| {
        let mode = if detect_region_capable() {
            SchedulerMode::RegionAffine
        } else {
            SchedulerMode::Global
        };
        info!("capability probe selected {:?} scheduling", mode);
        mode
    })
}

/// Process-scoped context object. Constructed once at startup and passed to
/// every component that needs it; there is no ambient singleton to reach for.
pub struct HostContext {
    config: HostConfig,
    mode: SchedulerMode,
    affinity: Arc<dyn AffinityResolver>,
    supervisor: Arc<dyn Supervisor>,
    scheduler: Arc<TickScheduler>,
    bridge: ReactiveBridge,
}

impl HostContext {
    pub fn new(
        config: HostConfig,
        mode: SchedulerMode,
        affinity: Arc<dyn AffinityResolver>,
    ) -> Arc<Self> {
        Self::with_supervisor(config, mode, affinity, Arc::new(LogSupervisor))
    }

    pub fn with_supervisor(
        config: HostConfig,
        mode: SchedulerMode,
        affinity: Arc<dyn AffinityResolver>,
        supervisor: Arc<dyn Supervisor>,
    ) -> Arc<Self> {
        let scheduler = Arc::new(TickScheduler::new(
            mode,
            affinity.clone(),
            supervisor.clone(),
        ));
        let bridge = ReactiveBridge::new(scheduler.clone(), supervisor.clone());
        Arc::new(Self {
            config,
            mode,
            affinity,
            supervisor,
            scheduler,
            bridge,
        })
    }

    /// Standard boot path: honor the config override when present, otherwise
    /// run the cached capability probe.
    pub fn boot(
        config: HostConfig,
        affinity: Arc<dyn AffinityResolver>,
        detect_region_capable: impl FnOnce() -> bool,
    ) -> Arc<Self> {
        let mode = match config.region_capable_override {
            Some(true) => SchedulerMode::RegionAffine,
            Some(false) => SchedulerMode::Global,
            None => probe_scheduler_mode(detect_region_capable),
        };
        Self::new(config, mode, affinity)
    }

    pub fn config(&self) -> &HostConfig {
        &self.config
    }

    pub fn mode(&self) -> SchedulerMode {
        self.mode
    }

    pub fn affinity(&self) -> &Arc<dyn AffinityResolver> {
        &self.affinity
    }

    pub fn supervisor(&self) -> &Arc<dyn Supervisor> {
        &self.supervisor
    }

    pub fn scheduler(&self) -> &Arc<TickScheduler> {
        &self.scheduler
    }

    pub fn bridge(&self) -> &ReactiveBridge {
        &self.bridge
    }

    /// One step of the host loop: pump reactive producers, then run one
    /// scheduling pass of the logical clock.
    pub fn tick(&self) {
        self.bridge.pump();
        self.scheduler.advance();
    }

    pub fn shutdown(&self) {
        self.scheduler.shutdown();
    }
}
