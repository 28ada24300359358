// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! `ContainerRuntime` backed by a local Docker daemon via `bollard` (§6
//! Container Runtime port, §4.2 creation contract).
//!
//! Every method here is a blocking call from the scheduler's point of view;
//! callers are responsible for not holding a Registry lock across them (§5,
//! P5) — this adapter itself takes no lock of its own.

use std::collections::{BTreeMap, HashMap};
use std::time::Duration;

use async_trait::async_trait;
use bollard::container::{
    Config as DockerConfig, CreateContainerOptions, ListContainersOptions,
    RemoveContainerOptions, StatsOptions, StopContainerOptions,
};
use bollard::exec::{CreateExecOptions, StartExecResults};
use bollard::image::CreateImageOptions;
use bollard::models::{HostConfig, PortBinding, PortMap, RestartPolicy, RestartPolicyNameEnum};
use bollard::Docker;
use futures_util::StreamExt;
use sbx_core::{
    Container, ContainerStatus, Labels, NetworkMode, PortTriplet, ProjectId, SandboxId, TenantId,
};

use crate::error::{AdapterError, AdapterResult};
use crate::ports::{ContainerRuntime, ContainerStats, CreateSpec};

/// Container-side ports the sandbox image listens on; these are mapped to
/// the host's allocated [`sbx_core::PortTriplet`] at create time.
const MCP_CONTAINER_PORT: u16 = 8765;
const DESKTOP_CONTAINER_PORT: u16 = 8080;
const TERMINAL_CONTAINER_PORT: u16 = 7681;

const LABEL_SANDBOX: &str = "memstack.sandbox";
const LABEL_PROJECT_ID: &str = "memstack.project_id";
const LABEL_TENANT_ID: &str = "memstack.tenant_id";

pub struct BollardContainerRuntime {
    docker: Docker,
}

impl BollardContainerRuntime {
    /// Connects using the platform default (`DOCKER_HOST` env var, or the
    /// local unix/npipe socket).
    pub fn connect_local() -> AdapterResult<Self> {
        let docker = Docker::connect_with_local_defaults()?;
        Ok(Self { docker })
    }

    pub fn new(docker: Docker) -> Self {
        Self { docker }
    }
}

fn parse_memory_limit(limit: &str) -> AdapterResult<i64> {
    let lower = limit.trim().to_ascii_lowercase();
    let (digits, multiplier): (&str, f64) = if let Some(n) = lower.strip_suffix("g") {
        (n, 1024.0 * 1024.0 * 1024.0)
    } else if let Some(n) = lower.strip_suffix("m") {
        (n, 1024.0 * 1024.0)
    } else if let Some(n) = lower.strip_suffix("k") {
        (n, 1024.0)
    } else {
        (lower.as_str(), 1.0)
    };
    digits
        .trim()
        .parse::<f64>()
        .map(|v| (v * multiplier) as i64)
        .map_err(|_| AdapterError::Runtime(format!("invalid memory_limit: {limit}")))
}

fn network_mode_str(mode: &NetworkMode) -> String {
    match mode {
        NetworkMode::Bridge => "bridge".to_string(),
        NetworkMode::None => "none".to_string(),
        NetworkMode::Host => "host".to_string(),
        NetworkMode::Container(id) => format!("container:{id}"),
    }
}

fn status_from_docker(state: Option<&str>) -> ContainerStatus {
    match state {
        Some("running") => ContainerStatus::Running,
        Some("exited") => ContainerStatus::Exited,
        Some("dead") => ContainerStatus::Dead,
        Some("created") => ContainerStatus::Created,
        _ => ContainerStatus::Unknown,
    }
}

fn labels_from_docker(raw: Option<HashMap<String, String>>) -> Option<Labels> {
    let raw: BTreeMap<String, String> = raw.unwrap_or_default().into_iter().collect();
    Labels::from_map(&raw)
}

/// Reverse-maps the container-side ports the sandbox image listens on back
/// to the host ports Docker published them on, via `inspect_container`'s
/// `NetworkSettings.ports` (§4.7 Startup Sync relies on this).
fn ports_from_network_settings(port_map: Option<PortMap>) -> Option<PortTriplet> {
    let port_map = port_map?;
    let host_port_for = |container_port: u16| -> Option<u16> {
        port_map
            .get(&format!("{container_port}/tcp"))?
            .as_ref()?
            .first()?
            .host_port
            .as_ref()?
            .parse()
            .ok()
    };
    Some(PortTriplet {
        mcp: host_port_for(MCP_CONTAINER_PORT)?,
        desktop: host_port_for(DESKTOP_CONTAINER_PORT)?,
        terminal: host_port_for(TERMINAL_CONTAINER_PORT)?,
    })
}

/// Same reverse mapping from `list_containers`' summary `ports` field.
fn ports_from_summary(ports: Option<Vec<bollard::models::Port>>) -> Option<PortTriplet> {
    let ports = ports?;
    let host_port_for = |container_port: u16| -> Option<u16> {
        ports
            .iter()
            .find(|p| p.private_port == container_port)
            .and_then(|p| p.public_port)
    };
    Some(PortTriplet {
        mcp: host_port_for(MCP_CONTAINER_PORT)?,
        desktop: host_port_for(DESKTOP_CONTAINER_PORT)?,
        terminal: host_port_for(TERMINAL_CONTAINER_PORT)?,
    })
}

#[async_trait]
impl ContainerRuntime for BollardContainerRuntime {
    async fn pull_image_if_absent(&self, image: &str) -> AdapterResult<()> {
        if self.docker.inspect_image(image).await.is_ok() {
            return Ok(());
        }
        tracing::info!(image, "pulling sandbox image");
        let options = Some(CreateImageOptions { from_image: image, ..Default::default() });
        let mut stream = self.docker.create_image(options, None, None);
        while let Some(progress) = stream.next().await {
            progress?;
        }
        Ok(())
    }

    async fn create(&self, spec: CreateSpec<'_>) -> AdapterResult<Container> {
        let mut port_bindings: PortMap = HashMap::new();
        let mut exposed_ports: HashMap<String, HashMap<(), ()>> = HashMap::new();
        for (container_port, host_port) in [
            (MCP_CONTAINER_PORT, spec.ports.mcp),
            (DESKTOP_CONTAINER_PORT, spec.ports.desktop),
            (TERMINAL_CONTAINER_PORT, spec.ports.terminal),
        ] {
            let key = format!("{container_port}/tcp");
            port_bindings.insert(
                key.clone(),
                Some(vec![PortBinding {
                    host_ip: Some("0.0.0.0".to_string()),
                    host_port: Some(host_port.to_string()),
                }]),
            );
            exposed_ports.insert(key, HashMap::new());
        }

        let binds = vec![format!("{}:/workspace:rw", spec.project_path.display())];
        let host_config = HostConfig {
            binds: Some(binds),
            port_bindings: Some(port_bindings),
            memory: Some(parse_memory_limit(&spec.config.memory_limit)?),
            nano_cpus: Some((spec.config.cpu_limit * 1_000_000_000.0) as i64),
            cap_drop: spec
                .config
                .security
                .drop_all_capabilities
                .then(|| vec!["ALL".to_string()]),
            security_opt: spec
                .config
                .security
                .no_new_privileges
                .then(|| vec!["no-new-privileges:true".to_string()]),
            network_mode: Some(network_mode_str(&spec.config.security.network_mode)),
            restart_policy: Some(RestartPolicy {
                name: Some(RestartPolicyNameEnum::ON_FAILURE),
                maximum_retry_count: Some(spec.restart_max_retry_count as i64),
            }),
            ..Default::default()
        };

        let env: Vec<String> = spec.env.iter().map(|(k, v)| format!("{k}={v}")).collect();
        let config = DockerConfig {
            image: Some(spec.config.image.clone()),
            env: Some(env),
            exposed_ports: Some(exposed_ports),
            working_dir: Some("/workspace".to_string()),
            labels: Some(spec.labels.clone().into_iter().collect()),
            host_config: Some(host_config),
            ..Default::default()
        };

        let options = CreateContainerOptions { name: spec.sandbox_id.as_str(), platform: None };
        let response = self.docker.create_container(Some(options), config).await?;

        let labels = Labels {
            sandbox: true,
            sandbox_id: spec.sandbox_id.clone(),
            project_id: spec
                .labels
                .get(LABEL_PROJECT_ID)
                .map(|s| ProjectId::new(s))
                .unwrap_or_else(|| ProjectId::new("")),
            tenant_id: spec
                .labels
                .get(LABEL_TENANT_ID)
                .map(|s| TenantId::new(s))
                .unwrap_or_else(|| TenantId::new("")),
            created_at: chrono::Utc::now(),
        };
        Ok(Container {
            runtime_id: response.id,
            labels,
            status: ContainerStatus::Created,
            ports: Some(spec.ports),
        })
    }

    async fn start(&self, runtime_id: &str) -> AdapterResult<()> {
        self.docker.start_container::<String>(runtime_id, None).await?;
        Ok(())
    }

    async fn stop(&self, runtime_id: &str, timeout: Duration) -> AdapterResult<()> {
        let options = StopContainerOptions { t: timeout.as_secs() as i64 };
        self.docker.stop_container(runtime_id, Some(options)).await?;
        Ok(())
    }

    async fn remove(&self, runtime_id: &str, force: bool) -> AdapterResult<()> {
        let options = RemoveContainerOptions { force, v: true, ..Default::default() };
        match self.docker.remove_container(runtime_id, Some(options)).await {
            Ok(()) => Ok(()),
            Err(bollard::errors::Error::DockerResponseServerError { status_code: 404, .. }) => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    async fn get_by_id(&self, runtime_id: &str) -> AdapterResult<Option<Container>> {
        match self.docker.inspect_container(runtime_id, None).await {
            Ok(details) => {
                let runtime_id = details.id.unwrap_or_else(|| runtime_id.to_string());
                let raw_labels = details.config.as_ref().and_then(|c| c.labels.clone());
                let Some(labels) = labels_from_docker(raw_labels) else { return Ok(None) };
                let status = status_from_docker(
                    details.state.as_ref().and_then(|s| s.status.as_ref()).map(|s| s.as_ref()),
                );
                let ports = ports_from_network_settings(
                    details.network_settings.as_ref().and_then(|n| n.ports.clone()),
                );
                Ok(Some(Container { runtime_id, labels, status, ports }))
            }
            Err(bollard::errors::Error::DockerResponseServerError { status_code: 404, .. }) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    async fn get_by_sandbox_id(&self, sandbox_id: &SandboxId) -> AdapterResult<Option<Container>> {
        let containers = self.list_sandbox_containers(None, None).await?;
        Ok(containers.into_iter().find(|c| &c.labels.sandbox_id == sandbox_id))
    }

    async fn list_sandbox_containers(
        &self,
        project_id: Option<&ProjectId>,
        tenant_id: Option<&TenantId>,
    ) -> AdapterResult<Vec<Container>> {
        let mut filters = HashMap::new();
        filters.insert("label".to_string(), vec![format!("{LABEL_SANDBOX}=true")]);
        let options = ListContainersOptions { all: true, filters, ..Default::default() };
        let summaries = self.docker.list_containers(Some(options)).await?;

        let mut out = Vec::new();
        for summary in summaries {
            let Some(labels) = labels_from_docker(summary.labels) else { continue };
            if project_id.is_some_and(|p| &labels.project_id != p) {
                continue;
            }
            if tenant_id.is_some_and(|t| &labels.tenant_id != t) {
                continue;
            }
            let runtime_id = summary.id.unwrap_or_default();
            let status = status_from_docker(summary.state.as_deref());
            let ports = ports_from_summary(summary.ports.clone());
            out.push(Container { runtime_id, labels, status, ports });
        }
        Ok(out)
    }

    async fn container_exists(&self, sandbox_id: &SandboxId) -> AdapterResult<bool> {
        Ok(self.get_by_sandbox_id(sandbox_id).await?.is_some())
    }

    async fn is_running(&self, runtime_id: &str) -> AdapterResult<bool> {
        Ok(self
            .get_by_id(runtime_id)
            .await?
            .map(|c| c.status == ContainerStatus::Running)
            .unwrap_or(false))
    }

    async fn stats(&self, runtime_id: &str) -> AdapterResult<ContainerStats> {
        let options = StatsOptions { stream: false, one_shot: true };
        let mut stream = self.docker.stats(runtime_id, Some(options));
        let sample = stream
            .next()
            .await
            .ok_or_else(|| AdapterError::NotFound(runtime_id.to_string()))??;

        let cpu_delta = sample.cpu_stats.cpu_usage.total_usage as f64
            - sample.precpu_stats.cpu_usage.total_usage as f64;
        let system_delta = sample.cpu_stats.system_cpu_usage.unwrap_or(0) as f64
            - sample.precpu_stats.system_cpu_usage.unwrap_or(0) as f64;
        let online_cpus = sample.cpu_stats.online_cpus.unwrap_or(1).max(1) as f64;
        let cpu_percent = if system_delta > 0.0 && cpu_delta > 0.0 {
            (cpu_delta / system_delta) * online_cpus * 100.0
        } else {
            0.0
        };
        let mem_usage = sample.memory_stats.usage.unwrap_or(0) as f64;
        let mem_limit = sample.memory_stats.limit.unwrap_or(1).max(1) as f64;
        Ok(ContainerStats {
            cpu_percent,
            mem_mb: mem_usage / (1024.0 * 1024.0),
            mem_percent: (mem_usage / mem_limit) * 100.0,
        })
    }

    async fn cleanup_orphans(&self, grace_period: Duration) -> AdapterResult<u32> {
        let mut filters = HashMap::new();
        filters.insert("label".to_string(), vec![format!("{LABEL_SANDBOX}=true")]);
        let options = ListContainersOptions { all: true, filters, ..Default::default() };
        let summaries = self.docker.list_containers(Some(options)).await?;

        let now = chrono::Utc::now();
        let mut removed = 0u32;
        for summary in summaries {
            let is_orphan = labels_from_docker(summary.labels.clone()).is_none();
            let grace_elapsed = matches!(summary.state.as_deref(), Some("exited" | "dead" | "created"))
                && summary
                    .created
                    .and_then(|ts| chrono::DateTime::from_timestamp(ts, 0))
                    .map(|created| {
                        now.signed_duration_since(created).to_std().unwrap_or_default() > grace_period
                    })
                    .unwrap_or(false);
            if !is_orphan && !grace_elapsed {
                continue;
            }
            let Some(id) = summary.id else { continue };
            if self.remove(&id, true).await.is_ok() {
                removed += 1;
            }
        }
        Ok(removed)
    }

    async fn exec(&self, runtime_id: &str, command: &[String]) -> AdapterResult<String> {
        let options = CreateExecOptions {
            attach_stdout: Some(true),
            attach_stderr: Some(true),
            tty: Some(true),
            cmd: Some(command.to_vec()),
            ..Default::default()
        };
        let exec = self.docker.create_exec(runtime_id, options).await?;
        match self.docker.start_exec(&exec.id, None).await? {
            StartExecResults::Attached { mut output, .. } => {
                let mut buf = String::new();
                while let Some(chunk) = output.next().await {
                    buf.push_str(&chunk?.to_string());
                }
                Ok(buf)
            }
            StartExecResults::Detached => Ok(String::new()),
        }
    }
}
