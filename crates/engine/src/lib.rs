// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! sbx-engine: the orchestration layer of the sandbox lifecycle core.
//!
//! Everything in this crate is wired against the ports `sbx-adapters`
//! defines rather than a concrete adapter, so it runs the same way against
//! a real container daemon or a fake one (§9 Dynamic dispatch). Nothing
//! here talks to a database, the network, or a container runtime directly.

pub mod health;
pub mod health_monitor;
pub mod lifecycle;
pub mod orphan_cleaner;
pub mod port_allocator;
pub mod registry;
pub mod resource_accounting;
pub mod startup_sync;
pub mod ttl_cache;

pub use health::{check as check_health, CheckParams as HealthCheckParams};
pub use health_monitor::{HealthMonitor, HealthMonitorConfig, RecoveryEvent, RecoveryEventKind};
pub use lifecycle::{LifecycleConfig, LifecycleService, SandboxInfo};
pub use orphan_cleaner::{OrphanCleaner, OrphanCleanerStats};
pub use port_allocator::{AlwaysAvailableProbe, PortAllocator, PortProbe, TcpPortProbe};
pub use registry::Registry;
pub use resource_accounting::ResourceAccounting;
pub use startup_sync::{startup_sync, StartupSyncStats};
pub use ttl_cache::{TtlCache, TtlSweepable};
