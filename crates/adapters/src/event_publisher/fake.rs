// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! In-memory event recorder for tests.

use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;
use sbx_core::LifecycleEvent;

use crate::error::AdapterResult;
use crate::ports::EventPublisher;

#[derive(Clone, Default)]
pub struct FakeEventPublisher {
    events: Arc<Mutex<Vec<LifecycleEvent>>>,
}

impl FakeEventPublisher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<LifecycleEvent> {
        self.events.lock().clone()
    }

    pub fn count_of(&self, event_type: sbx_core::LifecycleEventType) -> usize {
        self.events.lock().iter().filter(|e| e.event_type == event_type).count()
    }
}

#[async_trait]
impl EventPublisher for FakeEventPublisher {
    async fn publish(&self, event: LifecycleEvent) -> AdapterResult<()> {
        self.events.lock().push(event);
        Ok(())
    }
}
