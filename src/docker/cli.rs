use async_trait::async_trait;
use std::io::ErrorKind;
use std::process::{Output, Stdio};
use tokio::process::Command;
use tracing::debug;

use crate::config::ResourceLimits;
use crate::docker::runtime::{ContainerHandle, ContainerRuntime, ContainerSpec};
use crate::error::RuntimeError;

/// Messages the Docker client prints when the daemon cannot be reached.
const DAEMON_UNREACHABLE: [&str; 3] = [
    "Cannot connect to the Docker daemon",
    "error during connect",
    "Is the docker daemon running",
];

/// Container runtime backed by the `docker` command line client.
#[derive(Debug, Clone)]
pub struct DockerCli {
    bin: String,
    limits: ResourceLimits,
}

impl DockerCli {
    pub fn new(bin: impl Into<String>, limits: ResourceLimits) -> Self {
        Self {
            bin: bin.into(),
            limits,
        }
    }

    /// Arguments for `docker run`, without the binary name.
    pub fn run_args(&self, spec: &ContainerSpec) -> Vec<String> {
        let mut args = vec!["run".to_string(), "-d".to_string()];
        if spec.tty {
            args.push("-t".to_string());
        }
        args.extend(["--name".to_string(), spec.name.clone()]);

        if self.limits.network_disabled {
            args.push("--network=none".to_string());
        }
        if let Some(ref memory) = self.limits.memory {
            args.extend(["--memory".to_string(), memory.clone()]);
        }
        if let Some(pids) = self.limits.pids {
            args.extend(["--pids-limit".to_string(), pids.to_string()]);
        }

        for (key, value) in &spec.labels {
            args.extend(["--label".to_string(), format!("{}={}", key, value)]);
        }
        for mount in &spec.mounts {
            let mode = if mount.read_only { "ro" } else { "rw" };
            args.extend([
                "-v".to_string(),
                format!(
                    "{}:{}:{}",
                    mount.host_path.display(),
                    mount.container_path,
                    mode
                ),
            ]);
        }
        if let Some(ref entrypoint) = spec.entrypoint {
            args.extend(["--entrypoint".to_string(), entrypoint.clone()]);
        }

        args.push(spec.image.clone());
        args.extend(spec.command.iter().cloned());
        args
    }

    async fn docker(&self, operation: &str, args: &[String]) -> Result<Output, RuntimeError> {
        debug!(operation, ?args, "invoking container cli");
        let output = Command::new(&self.bin)
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .output()
            .await
            .map_err(|e| match e.kind() {
                ErrorKind::NotFound => {
                    RuntimeError::Unavailable(format!("'{}' executable not found", self.bin))
                }
                _ => RuntimeError::Io(e),
            })?;

        if output.status.success() {
            return Ok(output);
        }

        let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
        if DAEMON_UNREACHABLE.iter().any(|m| stderr.contains(m)) {
            return Err(RuntimeError::Unavailable(stderr));
        }
        Err(RuntimeError::OperationFailed {
            operation: format!("{} {}", self.bin, operation),
            reason: stderr,
        })
    }
}

#[async_trait]
impl ContainerRuntime for DockerCli {
    fn name(&self) -> &'static str {
        "docker"
    }

    async fn create_and_run(&self, spec: &ContainerSpec) -> Result<ContainerHandle, RuntimeError> {
        let output = self.docker("run", &self.run_args(spec)).await?;
        let id = String::from_utf8_lossy(&output.stdout).trim().to_string();
        if id.is_empty() {
            return Err(RuntimeError::OperationFailed {
                operation: format!("{} run", self.bin),
                reason: "no container id returned".to_string(),
            });
        }
        Ok(ContainerHandle { id })
    }

    async fn wait(&self, handle: &ContainerHandle) -> Result<i64, RuntimeError> {
        let output = self
            .docker("wait", &["wait".to_string(), handle.id.clone()])
            .await?;
        let status = String::from_utf8_lossy(&output.stdout);
        status
            .trim()
            .parse::<i64>()
            .map_err(|_| RuntimeError::OperationFailed {
                operation: format!("{} wait", self.bin),
                reason: format!("unexpected exit status {:?}", status.trim()),
            })
    }

    async fn logs(&self, handle: &ContainerHandle) -> Result<Vec<u8>, RuntimeError> {
        let output = self
            .docker("logs", &["logs".to_string(), handle.id.clone()])
            .await?;
        let mut combined = output.stdout;
        combined.extend_from_slice(&output.stderr);
        Ok(combined)
    }

    async fn remove(&self, handle: &ContainerHandle) -> Result<(), RuntimeError> {
        match self
            .docker("rm", &["rm".to_string(), "-f".to_string(), handle.id.clone()])
            .await
        {
            Err(RuntimeError::OperationFailed { reason, .. }) if reason.contains("No such container") => {
                Ok(())
            }
            other => other.map(|_| ()),
        }
    }
}
