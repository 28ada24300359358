// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! sbx-adapters: pluggable implementations of the stable ports §9 names
//! (Dynamic dispatch) — Association Store, Event Publisher, Container
//! Runtime. The core carries no adapter vocabulary; everything that talks
//! to a database, the event bus, or a container daemon lives here.

pub mod association_store;
pub mod container_runtime;
pub mod control_channel;
pub mod error;
pub mod event_publisher;
pub mod ports;

pub use association_store::InMemoryAssociationStore;
pub use container_runtime::{BollardContainerRuntime, FakeContainerRuntime};
pub use control_channel::{FakeControlChannel, FakeControlChannelFactory, WsControlChannelFactory};
pub use error::{AdapterError, AdapterResult};
pub use event_publisher::{FakeEventPublisher, LoggingEventPublisher};
pub use ports::{
    AssociationStore, ContainerRuntime, ContainerStats, ControlChannel, ControlChannelFactory,
    CreateSpec, EventPublisher, Mount, ProjectLockGuard,
};
