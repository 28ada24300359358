// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Centralized environment variable access for the daemon binary (§10
//! Ambient Engineering, "Configuration").
//!
//! One small accessor function per tunable, each independently testable,
//! composed into [`Config::load`]. Malformed values are reported through
//! `Result` rather than a panic — this module never calls `.unwrap()` on
//! anything an operator controls.

use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid value for {var}: {value:?}")]
    InvalidValue { var: &'static str, value: String },
}

type ConfigResult<T> = Result<T, ConfigError>;

fn env_u16(var: &'static str, default: u16) -> ConfigResult<u16> {
    match std::env::var(var) {
        Ok(raw) => raw.parse().map_err(|_| ConfigError::InvalidValue { var, value: raw }),
        Err(_) => Ok(default),
    }
}

fn env_u32(var: &'static str, default: u32) -> ConfigResult<u32> {
    match std::env::var(var) {
        Ok(raw) => raw.parse().map_err(|_| ConfigError::InvalidValue { var, value: raw }),
        Err(_) => Ok(default),
    }
}

fn env_usize(var: &'static str, default: usize) -> ConfigResult<usize> {
    match std::env::var(var) {
        Ok(raw) => raw.parse().map_err(|_| ConfigError::InvalidValue { var, value: raw }),
        Err(_) => Ok(default),
    }
}

fn env_f64(var: &'static str, default: f64) -> ConfigResult<f64> {
    match std::env::var(var) {
        Ok(raw) => raw.parse().map_err(|_| ConfigError::InvalidValue { var, value: raw }),
        Err(_) => Ok(default),
    }
}

fn env_secs(var: &'static str, default: Duration) -> ConfigResult<Duration> {
    match std::env::var(var) {
        Ok(raw) => raw
            .parse::<u64>()
            .map(Duration::from_secs)
            .map_err(|_| ConfigError::InvalidValue { var, value: raw }),
        Err(_) => Ok(default),
    }
}

fn env_bool(var: &'static str, default: bool) -> ConfigResult<bool> {
    match std::env::var(var) {
        Ok(raw) => match raw.as_str() {
            "1" | "true" | "yes" => Ok(true),
            "0" | "false" | "no" => Ok(false),
            _ => Err(ConfigError::InvalidValue { var, value: raw }),
        },
        Err(_) => Ok(default),
    }
}

fn env_path(var: &'static str, default: impl Into<PathBuf>) -> PathBuf {
    std::env::var(var).map(PathBuf::from).unwrap_or_else(|_| default.into())
}

/// §4.1 Port Allocator range.
pub fn port_range_start() -> ConfigResult<u16> {
    env_u16("SBX_PORT_RANGE_START", 18765)
}

pub fn port_range_width() -> ConfigResult<u16> {
    env_u16("SBX_PORT_RANGE_WIDTH", 1000)
}

/// §4.5 health-loop interval.
pub fn health_interval() -> ConfigResult<Duration> {
    env_secs("SBX_HEALTH_INTERVAL_SECS", Duration::from_secs(60))
}

/// §4.5 heartbeat-loop interval.
pub fn heartbeat_interval() -> ConfigResult<Duration> {
    env_secs("SBX_HEARTBEAT_INTERVAL_SECS", Duration::from_secs(30))
}

/// §4.5 TTL-cleanup-loop interval.
pub fn ttl_cleanup_interval() -> ConfigResult<Duration> {
    env_secs("SBX_TTL_CLEANUP_INTERVAL_SECS", Duration::from_secs(300))
}

/// §4.5 bounded-recovery ceiling.
pub fn max_recovery_attempts() -> ConfigResult<u32> {
    env_u32("SBX_MAX_RECOVERY_ATTEMPTS", 3)
}

/// §4.5 recovery backoff `base · 2^attempt`.
pub fn recovery_backoff_base() -> ConfigResult<Duration> {
    env_secs("SBX_RECOVERY_BACKOFF_BASE_SECS", Duration::from_secs(5))
}

/// §4.5 recovery backoff cap.
pub fn recovery_backoff_cap() -> ConfigResult<Duration> {
    env_secs("SBX_RECOVERY_BACKOFF_CAP_SECS", Duration::from_secs(60))
}

/// §4.6 `rebuild_cooldown`.
pub fn rebuild_cooldown() -> ConfigResult<Duration> {
    env_secs("SBX_REBUILD_COOLDOWN_SECS", Duration::from_secs(30))
}

/// §4.6 advisory-lock acquisition timeout.
pub fn advisory_lock_timeout() -> ConfigResult<Duration> {
    env_secs("SBX_ADVISORY_LOCK_TIMEOUT_SECS", Duration::from_secs(10))
}

/// §4.6 Create-new step 4 host ceilings.
pub fn max_host_memory_mb() -> ConfigResult<f64> {
    env_f64("SBX_MAX_HOST_MEMORY_MB", 16_384.0)
}

pub fn max_host_cpu() -> ConfigResult<f64> {
    env_f64("SBX_MAX_HOST_CPU", 8.0)
}

/// §4.8 Resource Accounting concurrency ceiling.
pub fn max_concurrent_sandboxes() -> ConfigResult<usize> {
    env_usize("SBX_MAX_CONCURRENT_SANDBOXES", 50)
}

/// §4.8 minimum-age guard before an idle sandbox is eligible for reap.
pub fn min_age_for_cleanup() -> ConfigResult<Duration> {
    env_secs("SBX_MIN_AGE_FOR_CLEANUP_SECS", Duration::from_secs(600))
}

/// §4.8 usage-stats cache TTL.
pub fn usage_cache_ttl() -> ConfigResult<Duration> {
    env_secs("SBX_USAGE_CACHE_TTL_SECS", Duration::from_secs(30))
}

/// §4.7 Orphan Cleaner interval and grace period.
pub fn orphan_cleanup_interval() -> ConfigResult<Duration> {
    env_secs("SBX_ORPHAN_CLEANUP_INTERVAL_SECS", Duration::from_secs(300))
}

pub fn orphan_grace_period() -> ConfigResult<Duration> {
    env_secs("SBX_ORPHAN_GRACE_PERIOD_SECS", Duration::from_secs(120))
}

/// §4.7 "when DB checks are enabled" — criterion (c) cross-references the
/// Association Store and costs a full container listing per pass.
pub fn orphan_association_checks_enabled() -> ConfigResult<bool> {
    env_bool("SBX_ORPHAN_ASSOCIATION_CHECKS", true)
}

/// §4.6 `health_check` cache freshness window.
pub fn health_check_interval() -> ConfigResult<Duration> {
    env_secs("SBX_HEALTH_CHECK_INTERVAL_SECS", Duration::from_secs(30))
}

/// §4.2 restart policy `MaximumRetryCount`.
pub fn restart_max_retry_count() -> ConfigResult<u32> {
    let value = env_u32("SBX_RESTART_MAX_RETRY_COUNT", 3)?;
    if !(1..=5).contains(&value) {
        return Err(ConfigError::InvalidValue {
            var: "SBX_RESTART_MAX_RETRY_COUNT",
            value: value.to_string(),
        });
    }
    Ok(value)
}

/// §4.6 root directory under which `project_path` is mounted.
pub fn projects_root() -> PathBuf {
    env_path("SBX_PROJECTS_ROOT", "/var/lib/memstack/sandboxes")
}

/// Whether this process talks to a real container daemon (`docker`) or the
/// in-memory fake (`fake`) — the fake is useful for running the daemon in a
/// development environment with no Docker socket available.
pub fn container_runtime_backend() -> String {
    std::env::var("SBX_CONTAINER_RUNTIME").unwrap_or_else(|_| "docker".to_string())
}

pub fn auto_recover() -> ConfigResult<bool> {
    env_bool("SBX_AUTO_RECOVER", true)
}

/// Every tunable this crate's components need, resolved once at startup.
#[derive(Debug, Clone)]
pub struct Config {
    pub port_range_start: u16,
    pub port_range_width: u16,
    pub health_interval: Duration,
    pub heartbeat_interval: Duration,
    pub ttl_cleanup_interval: Duration,
    pub max_recovery_attempts: u32,
    pub recovery_backoff_base: Duration,
    pub recovery_backoff_cap: Duration,
    pub rebuild_cooldown: Duration,
    pub advisory_lock_timeout: Duration,
    pub max_host_memory_mb: f64,
    pub max_host_cpu: f64,
    pub max_concurrent_sandboxes: usize,
    pub min_age_for_cleanup: Duration,
    pub usage_cache_ttl: Duration,
    pub orphan_cleanup_interval: Duration,
    pub orphan_grace_period: Duration,
    pub orphan_association_checks_enabled: bool,
    pub health_check_interval: Duration,
    pub restart_max_retry_count: u32,
    pub projects_root: PathBuf,
    pub container_runtime_backend: String,
    pub auto_recover: bool,
}

impl Config {
    /// Resolves every setting named in this module from the environment.
    /// Never panics: a malformed value surfaces as an `Err` the caller can
    /// log and exit on, rather than an unwinding panic mid-startup.
    pub fn load() -> ConfigResult<Self> {
        Ok(Self {
            port_range_start: port_range_start()?,
            port_range_width: port_range_width()?,
            health_interval: health_interval()?,
            heartbeat_interval: heartbeat_interval()?,
            ttl_cleanup_interval: ttl_cleanup_interval()?,
            max_recovery_attempts: max_recovery_attempts()?,
            recovery_backoff_base: recovery_backoff_base()?,
            recovery_backoff_cap: recovery_backoff_cap()?,
            rebuild_cooldown: rebuild_cooldown()?,
            advisory_lock_timeout: advisory_lock_timeout()?,
            max_host_memory_mb: max_host_memory_mb()?,
            max_host_cpu: max_host_cpu()?,
            max_concurrent_sandboxes: max_concurrent_sandboxes()?,
            min_age_for_cleanup: min_age_for_cleanup()?,
            usage_cache_ttl: usage_cache_ttl()?,
            orphan_cleanup_interval: orphan_cleanup_interval()?,
            orphan_grace_period: orphan_grace_period()?,
            orphan_association_checks_enabled: orphan_association_checks_enabled()?,
            health_check_interval: health_check_interval()?,
            restart_max_retry_count: restart_max_retry_count()?,
            projects_root: projects_root(),
            container_runtime_backend: container_runtime_backend(),
            auto_recover: auto_recover()?,
        })
    }
}

#[cfg(test)]
#[path = "config_tests.rs"]
mod tests;
