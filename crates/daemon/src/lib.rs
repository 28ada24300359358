// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Wiring for the `sbxd` binary: turns a resolved [`config::Config`] into a
//! running set of adapters, the three engine layers, and the background
//! loops, then drives graceful shutdown. Kept separate from `main.rs` so
//! integration tests can construct the same service graph against fake
//! adapters without spawning a process.

pub mod config;
pub mod error;
pub mod logging;
pub mod service;

pub use config::Config;
pub use error::DaemonError;
pub use service::Service;
