// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! In-memory `ControlChannel` for deterministic tests.
//!
//! Exposes failure-injection hooks so tests can drive the Health Monitor's
//! recovery paths (§8 scenarios 3, 4) without a real sandbox: flip
//! `set_connected(false)` to simulate a dropped MCP connection, or
//! `fail_next_ping`/`fail_connect` to make the next call return an error.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use sbx_core::SandboxId;

use crate::error::{AdapterError, AdapterResult};
use crate::ports::{ControlChannel, ControlChannelFactory};

#[derive(Default)]
struct SharedState {
    connected: AtomicBool,
    services: Mutex<Vec<String>>,
    tools: Mutex<Vec<String>>,
    fail_next_ping: AtomicBool,
    fail_exec_probe: AtomicBool,
    ping_calls: Mutex<u32>,
}

/// One fake sandbox's connection state, shared between the registry entry
/// returned by [`FakeControlChannelFactory::connect`] and the test's handle
/// to poke it.
#[derive(Clone)]
pub struct FakeControlChannel {
    state: Arc<SharedState>,
}

impl FakeControlChannel {
    fn new() -> Self {
        Self {
            state: Arc::new(SharedState {
                connected: AtomicBool::new(true),
                services: Mutex::new(vec!["desktop".into(), "terminal".into()]),
                tools: Mutex::new(vec!["bash".into(), "read_file".into()]),
                fail_next_ping: AtomicBool::new(false),
                fail_exec_probe: AtomicBool::new(false),
                ping_calls: Mutex::new(0),
            }),
        }
    }

    pub fn set_connected(&self, connected: bool) {
        self.state.connected.store(connected, Ordering::SeqCst);
    }

    pub fn set_services(&self, services: Vec<String>) {
        *self.state.services.lock() = services;
    }

    pub fn fail_next_ping(&self) {
        self.state.fail_next_ping.store(true, Ordering::SeqCst);
    }

    pub fn fail_exec_probe(&self, fail: bool) {
        self.state.fail_exec_probe.store(fail, Ordering::SeqCst);
    }

    pub fn ping_calls(&self) -> u32 {
        *self.state.ping_calls.lock()
    }
}

#[async_trait]
impl ControlChannel for FakeControlChannel {
    async fn is_connected(&self) -> bool {
        self.state.connected.load(Ordering::SeqCst)
    }

    async fn ping(&self, _timeout: Duration) -> AdapterResult<()> {
        *self.state.ping_calls.lock() += 1;
        if !self.state.connected.load(Ordering::SeqCst) {
            return Err(AdapterError::ControlChannel("not connected".into()));
        }
        if self.state.fail_next_ping.swap(false, Ordering::SeqCst) {
            return Err(AdapterError::ControlChannel("simulated ping failure".into()));
        }
        Ok(())
    }

    async fn list_running_services(&self, _timeout: Duration) -> AdapterResult<Vec<String>> {
        Ok(self.state.services.lock().clone())
    }

    async fn exec_probe(&self, _timeout: Duration) -> AdapterResult<()> {
        if self.state.fail_exec_probe.load(Ordering::SeqCst) {
            return Err(AdapterError::ControlChannel("simulated probe failure".into()));
        }
        Ok(())
    }

    async fn call_tool(
        &self,
        tool_name: &str,
        arguments: serde_json::Value,
        _timeout: Duration,
    ) -> AdapterResult<serde_json::Value> {
        Ok(serde_json::json!({"tool": tool_name, "echoed": arguments}))
    }

    async fn list_tools(&self, _timeout: Duration) -> AdapterResult<Vec<String>> {
        Ok(self.state.tools.lock().clone())
    }
}

/// Hands out one [`FakeControlChannel`] per sandbox and remembers it so
/// tests can look the handle back up via [`Self::channel_for`].
#[derive(Clone, Default)]
pub struct FakeControlChannelFactory {
    channels: Arc<Mutex<std::collections::HashMap<SandboxId, FakeControlChannel>>>,
    fail_connect_for: Arc<Mutex<VecDeque<SandboxId>>>,
}

impl FakeControlChannelFactory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn channel_for(&self, sandbox_id: &SandboxId) -> Option<FakeControlChannel> {
        self.channels.lock().get(sandbox_id).cloned()
    }

    /// Makes the next `connect` call for `sandbox_id` fail once.
    pub fn fail_next_connect(&self, sandbox_id: SandboxId) {
        self.fail_connect_for.lock().push_back(sandbox_id);
    }
}

#[async_trait]
impl ControlChannelFactory for FakeControlChannelFactory {
    async fn connect(
        &self,
        sandbox_id: &SandboxId,
        _endpoint_url: &str,
        _timeout: Duration,
    ) -> AdapterResult<Arc<dyn ControlChannel>> {
        {
            let mut pending = self.fail_connect_for.lock();
            if let Some(pos) = pending.iter().position(|id| id == sandbox_id) {
                pending.remove(pos);
                return Err(AdapterError::ControlChannel("simulated connect failure".into()));
            }
        }
        let channel = self
            .channels
            .lock()
            .entry(sandbox_id.clone())
            .or_insert_with(FakeControlChannel::new)
            .clone();
        Ok(Arc::new(channel))
    }
}

#[cfg(test)]
#[path = "fake_tests.rs"]
mod tests;
