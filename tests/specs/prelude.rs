use std::sync::Arc;
use std::time::Duration;

use sbx_adapters::{
    AssociationStore, ContainerRuntime, ControlChannelFactory, EventPublisher,
    FakeContainerRuntime, FakeControlChannelFactory, FakeEventPublisher, InMemoryAssociationStore,
};
use sbx_core::{FakeClock, ProjectId, TenantId};
use sbx_engine::{
    AlwaysAvailableProbe, HealthMonitor, HealthMonitorConfig, LifecycleConfig, LifecycleService,
    OrphanCleaner, PortAllocator, Registry, ResourceAccounting,
};

pub type Svc = LifecycleService<AlwaysAvailableProbe, FakeClock>;
pub type Monitor = HealthMonitor<AlwaysAvailableProbe, FakeClock>;

/// Every component wired together behind fakes, for black-box tests against
/// the public API surface only.
pub struct Harness {
    pub service: Arc<Svc>,
    pub registry: Arc<Registry<AlwaysAvailableProbe>>,
    pub runtime: Arc<FakeContainerRuntime>,
    pub associations: Arc<InMemoryAssociationStore>,
    pub control_factory: FakeControlChannelFactory,
    pub monitor: Arc<Monitor>,
    pub orphan_cleaner: Arc<OrphanCleaner>,
    pub events: Arc<FakeEventPublisher>,
    pub clock: FakeClock,
}

pub struct HarnessOpts {
    pub max_concurrent_sandboxes: usize,
    pub min_age_for_cleanup: Duration,
    pub max_recovery_attempts: u32,
    pub recovery_backoff_base: Duration,
    pub recovery_backoff_cap: Duration,
    pub auto_recover: bool,
    pub rebuild_cooldown: Duration,
}

impl Default for HarnessOpts {
    fn default() -> Self {
        Self {
            max_concurrent_sandboxes: 64,
            min_age_for_cleanup: Duration::from_secs(0),
            max_recovery_attempts: 3,
            recovery_backoff_base: Duration::from_secs(5),
            recovery_backoff_cap: Duration::from_secs(60),
            auto_recover: true,
            rebuild_cooldown: Duration::from_secs(30),
        }
    }
}

pub fn harness_with(opts: HarnessOpts) -> Harness {
    let registry = Arc::new(Registry::with_allocator(PortAllocator::with_probe(
        21000,
        3000,
        AlwaysAvailableProbe,
    )));
    let runtime = Arc::new(FakeContainerRuntime::new());
    let associations = Arc::new(InMemoryAssociationStore::new());
    let control_factory = FakeControlChannelFactory::new();
    let events = Arc::new(FakeEventPublisher::new());
    let clock = FakeClock::new();

    let resource_accounting = Arc::new(ResourceAccounting::new(
        opts.max_concurrent_sandboxes,
        opts.min_age_for_cleanup,
        Duration::from_secs(30),
        clock.clone(),
    ));

    let lifecycle_config = LifecycleConfig {
        rebuild_cooldown: opts.rebuild_cooldown,
        auto_recover: opts.auto_recover,
        ..LifecycleConfig::default()
    };

    let service = Arc::new(LifecycleService::new(
        registry.clone(),
        associations.clone() as Arc<dyn AssociationStore>,
        runtime.clone() as Arc<dyn ContainerRuntime>,
        Arc::new(control_factory.clone()) as Arc<dyn ControlChannelFactory>,
        events.clone() as Arc<dyn EventPublisher>,
        resource_accounting,
        lifecycle_config,
        clock.clone(),
    ));

    let monitor_config = HealthMonitorConfig {
        max_recovery_attempts: opts.max_recovery_attempts,
        recovery_backoff_base: opts.recovery_backoff_base,
        recovery_backoff_cap: opts.recovery_backoff_cap,
        auto_recover: opts.auto_recover,
        ..HealthMonitorConfig::default()
    };
    let monitor = Arc::new(HealthMonitor::new(
        registry.clone(),
        runtime.clone() as Arc<dyn ContainerRuntime>,
        Arc::new(control_factory.clone()) as Arc<dyn ControlChannelFactory>,
        service.clone(),
        monitor_config,
        clock.clone(),
    ));

    let orphan_cleaner = Arc::new(OrphanCleaner::new(
        runtime.clone() as Arc<dyn ContainerRuntime>,
        associations.clone() as Arc<dyn AssociationStore>,
        Duration::from_secs(60),
        true,
    ));

    Harness { service, registry, runtime, associations, control_factory, monitor, orphan_cleaner, events, clock }
}

pub fn harness() -> Harness {
    harness_with(HarnessOpts::default())
}

pub fn project(name: &str) -> ProjectId {
    ProjectId::new(name)
}

pub fn tenant(name: &str) -> TenantId {
    TenantId::new(name)
}
