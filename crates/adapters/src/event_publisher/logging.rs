// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Publisher that logs every event via `tracing`.
//!
//! Stands in for the real event bus (out of scope, §1): good enough for a
//! single-process deployment where lifecycle transitions only need to reach
//! the daemon's own logs, and a safe default so `publish` is never a no-op
//! that silently drops events.

use async_trait::async_trait;
use sbx_core::LifecycleEvent;
use tracing::info;

use crate::error::AdapterResult;
use crate::ports::EventPublisher;

#[derive(Default)]
pub struct LoggingEventPublisher;

#[async_trait]
impl EventPublisher for LoggingEventPublisher {
    async fn publish(&self, event: LifecycleEvent) -> AdapterResult<()> {
        info!(
            event_type = %event.event_type,
            sandbox_id = %event.sandbox_id,
            project_id = %event.project_id,
            tenant_id = %event.tenant_id,
            stream = %LifecycleEvent::stream_name(&event.project_id),
            "lifecycle event"
        );
        Ok(())
    }
}
