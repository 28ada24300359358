// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Resource profiles: named memory/cpu/timeout/desktop defaults (§4.6).

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::domain::{SandboxConfig, SandboxOverrides, SecurityProfile};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResourceProfile {
    Lite,
    #[default]
    Standard,
    Full,
}

crate::simple_display! {
    ResourceProfile {
        Lite => "lite",
        Standard => "standard",
        Full => "full",
    }
}

impl ResourceProfile {
    /// Baseline config for this profile, before per-call overrides are applied.
    pub fn defaults(&self, image: impl Into<String>) -> SandboxConfig {
        let (memory_limit, cpu_limit, timeout_seconds, desktop_enabled) = match self {
            ResourceProfile::Lite => ("512m", 0.5, 300, false),
            ResourceProfile::Standard => ("2g", 1.0, 1800, true),
            ResourceProfile::Full => ("4g", 2.0, 3600, true),
        };
        SandboxConfig {
            image: image.into(),
            memory_limit: memory_limit.to_string(),
            cpu_limit,
            timeout_seconds,
            desktop_enabled,
            environment: BTreeMap::new(),
            security: SecurityProfile::default(),
        }
    }

    /// Resolve a full config by layering `overrides` onto this profile's defaults.
    pub fn resolve(&self, image: impl Into<String>, overrides: &SandboxOverrides) -> SandboxConfig {
        let mut config = self.defaults(image);
        if let Some(memory_limit) = &overrides.memory_limit {
            config.memory_limit = memory_limit.clone();
        }
        if let Some(cpu_limit) = overrides.cpu_limit {
            config.cpu_limit = cpu_limit;
        }
        if let Some(timeout_seconds) = overrides.timeout_seconds {
            config.timeout_seconds = timeout_seconds;
        }
        if let Some(desktop_enabled) = overrides.desktop_enabled {
            config.desktop_enabled = desktop_enabled;
        }
        if let Some(environment) = &overrides.environment {
            config.environment = environment.clone();
        }
        config
    }
}

#[cfg(test)]
#[path = "profile_tests.rs"]
mod tests;
