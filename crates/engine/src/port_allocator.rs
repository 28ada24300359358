// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Collision-free allocation of host port triplets (§4.1).
//!
//! Owns its own lock (`port_allocation_lock`) distinct from the Registry's
//! `instance_lock`/`cleanup_lock` — the three never nest (§4.3, P5).

use std::collections::HashSet;
use std::net::SocketAddr;

use async_trait::async_trait;
use parking_lot::Mutex;
use sbx_core::{PortTriplet, SandboxError, SandboxResult};

/// OS-level availability probe, abstracted so tests don't need real sockets.
#[async_trait]
pub trait PortProbe: Send + Sync {
    async fn is_available(&self, port: u16) -> bool;
}

/// Attempts a non-blocking bind on `0.0.0.0:<port>`; available iff it succeeds.
#[derive(Default)]
pub struct TcpPortProbe;

#[async_trait]
impl PortProbe for TcpPortProbe {
    async fn is_available(&self, port: u16) -> bool {
        let addr: SocketAddr = ([0, 0, 0, 0], port).into();
        tokio::net::TcpListener::bind(addr).await.is_ok()
    }
}

/// Always reports every port as free; used by tests that only care about
/// in-process uniqueness, not real socket availability.
#[derive(Default)]
pub struct AlwaysAvailableProbe;

#[async_trait]
impl PortProbe for AlwaysAvailableProbe {
    async fn is_available(&self, _port: u16) -> bool {
        true
    }
}

struct State {
    in_use: HashSet<u16>,
    cursor: usize,
}

/// Cursor over a configured port range, advancing modulo the number of
/// triplets it contains (§4.1).
pub struct PortAllocator<P: PortProbe = TcpPortProbe> {
    range_start: u16,
    num_triplets: usize,
    probe: P,
    state: Mutex<State>,
}

impl PortAllocator<TcpPortProbe> {
    pub fn new(range_start: u16, range_width: u16) -> Self {
        Self::with_probe(range_start, range_width, TcpPortProbe)
    }
}

impl<P: PortProbe> PortAllocator<P> {
    pub fn with_probe(range_start: u16, range_width: u16, probe: P) -> Self {
        let num_triplets = (range_width / 3).max(1) as usize;
        Self {
            range_start,
            num_triplets,
            probe,
            state: Mutex::new(State { in_use: HashSet::new(), cursor: 0 }),
        }
    }

    fn triplet_at(&self, index: usize) -> PortTriplet {
        let base = self.range_start.saturating_add((index * 3) as u16);
        PortTriplet { mcp: base, desktop: base + 1, terminal: base + 2 }
    }

    /// Scans from the cursor for a free triplet, reserves it, and advances
    /// the cursor. Fails with `ResourceExhausted` once every index has been
    /// tried.
    pub async fn allocate(&self) -> SandboxResult<PortTriplet> {
        let start_cursor = { self.state.lock().cursor };
        for offset in 0..self.num_triplets {
            let index = (start_cursor + offset) % self.num_triplets;
            let triplet = self.triplet_at(index);

            let already_reserved = {
                let state = self.state.lock();
                triplet.as_array().iter().any(|p| state.in_use.contains(p))
            };
            if already_reserved {
                continue;
            }

            let mut available = true;
            for port in triplet.as_array() {
                if !self.probe.is_available(port).await {
                    available = false;
                    break;
                }
            }
            if !available {
                continue;
            }

            let mut state = self.state.lock();
            // Re-check under lock: another task may have reserved it while we probed.
            if triplet.as_array().iter().any(|p| state.in_use.contains(p)) {
                continue;
            }
            for port in triplet.as_array() {
                state.in_use.insert(port);
            }
            state.cursor = (index + 1) % self.num_triplets;
            return Ok(triplet);
        }
        Err(SandboxError::ResourceExhausted(format!(
            "no free port triplet in range {}..{}",
            self.range_start,
            self.range_start.saturating_add((self.num_triplets * 3) as u16)
        )))
    }

    pub fn release(&self, triplet: PortTriplet) {
        let mut state = self.state.lock();
        for port in triplet.as_array() {
            state.in_use.remove(&port);
        }
    }

    pub fn in_use_count(&self) -> usize {
        self.state.lock().in_use.len()
    }
}

#[cfg(test)]
#[path = "port_allocator_tests.rs"]
mod tests;
