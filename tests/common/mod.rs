#![allow(dead_code)]

use async_trait::async_trait;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use copilot_sandbox::config::{ImageConfig, SandboxConfig};
use copilot_sandbox::docker::{ContainerHandle, ContainerRuntime, ContainerSpec};
use copilot_sandbox::error::RuntimeError;
use copilot_sandbox::registry::ToolRegistry;
use copilot_sandbox::sandbox::SessionOptions;
use copilot_sandbox::Dispatcher;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Create,
    Wait,
    Logs,
    Remove,
}

/// Container runtime that plays back a fixed outcome and records every call.
pub struct ScriptedRuntime {
    pub exit_code: i64,
    pub logs: Vec<u8>,
    pub fail_at: Option<Stage>,
    /// `wait` never returns.
    pub hang: bool,
    pub wait_delay: Duration,

    pub creates: AtomicUsize,
    pub removes: AtomicUsize,
    pub live: AtomicUsize,
    pub max_live: AtomicUsize,
    pub specs: Mutex<Vec<ContainerSpec>>,
    /// Contents of the mounted source files as seen at create time.
    pub staged: Mutex<Vec<String>>,
    /// Ids or names passed to `remove`.
    pub removed: Mutex<Vec<String>>,
}

impl ScriptedRuntime {
    pub fn exiting(exit_code: i64, logs: &str) -> Self {
        Self {
            exit_code,
            logs: logs.as_bytes().to_vec(),
            fail_at: None,
            hang: false,
            wait_delay: Duration::ZERO,
            creates: AtomicUsize::new(0),
            removes: AtomicUsize::new(0),
            live: AtomicUsize::new(0),
            max_live: AtomicUsize::new(0),
            specs: Mutex::new(Vec::new()),
            staged: Mutex::new(Vec::new()),
            removed: Mutex::new(Vec::new()),
        }
    }

    pub fn failing_at(stage: Stage) -> Self {
        Self {
            fail_at: Some(stage),
            ..Self::exiting(0, "ok")
        }
    }

    pub fn hanging() -> Self {
        Self {
            hang: true,
            ..Self::exiting(0, "")
        }
    }

    pub fn with_wait_delay(mut self, delay: Duration) -> Self {
        self.wait_delay = delay;
        self
    }

    pub fn creates(&self) -> usize {
        self.creates.load(Ordering::SeqCst)
    }

    pub fn removes(&self) -> usize {
        self.removes.load(Ordering::SeqCst)
    }

    pub fn last_spec(&self) -> ContainerSpec {
        self.specs.lock().unwrap().last().cloned().expect("no container created")
    }

    fn fail(&self, stage: Stage) -> Result<(), RuntimeError> {
        if self.fail_at == Some(stage) {
            return Err(match stage {
                Stage::Create => RuntimeError::Unavailable(
                    "Cannot connect to the Docker daemon at unix:///var/run/docker.sock".to_string(),
                ),
                other => RuntimeError::OperationFailed {
                    operation: format!("{:?}", other).to_lowercase(),
                    reason: "scripted failure".to_string(),
                },
            });
        }
        Ok(())
    }
}

#[async_trait]
impl ContainerRuntime for ScriptedRuntime {
    fn name(&self) -> &'static str {
        "scripted"
    }

    async fn create_and_run(&self, spec: &ContainerSpec) -> Result<ContainerHandle, RuntimeError> {
        self.creates.fetch_add(1, Ordering::SeqCst);
        for mount in &spec.mounts {
            let contents = std::fs::read_to_string(&mount.host_path)?;
            self.staged.lock().unwrap().push(contents);
        }
        self.specs.lock().unwrap().push(spec.clone());
        self.fail(Stage::Create)?;

        let live = self.live.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_live.fetch_max(live, Ordering::SeqCst);
        Ok(ContainerHandle {
            id: format!("container-{}", spec.name),
        })
    }

    async fn wait(&self, _handle: &ContainerHandle) -> Result<i64, RuntimeError> {
        if self.hang {
            std::future::pending::<()>().await;
        }
        if !self.wait_delay.is_zero() {
            tokio::time::sleep(self.wait_delay).await;
        }
        self.fail(Stage::Wait)?;
        Ok(self.exit_code)
    }

    async fn logs(&self, _handle: &ContainerHandle) -> Result<Vec<u8>, RuntimeError> {
        self.fail(Stage::Logs)?;
        Ok(self.logs.clone())
    }

    async fn remove(&self, handle: &ContainerHandle) -> Result<(), RuntimeError> {
        self.removes.fetch_add(1, Ordering::SeqCst);
        self.removed.lock().unwrap().push(handle.id.clone());
        let _ = self
            .live
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1));
        self.fail(Stage::Remove)
    }
}

pub fn options(staging_dir: &Path) -> SessionOptions {
    SessionOptions {
        staging_dir: staging_dir.to_path_buf(),
        mount_dir: "/sandbox".to_string(),
        timeout: Duration::from_secs(10),
    }
}

pub fn registry() -> ToolRegistry {
    ToolRegistry::builtin(&ImageConfig::default())
}

pub fn dispatcher(runtime: Arc<ScriptedRuntime>, staging_dir: &Path, max_sessions: usize) -> Dispatcher {
    Dispatcher::new(registry(), runtime, options(staging_dir), max_sessions)
}

pub fn staged_files(dir: &Path) -> usize {
    std::fs::read_dir(dir).map(|d| d.count()).unwrap_or(0)
}

pub fn config_for_docker(staging_dir: &Path) -> SandboxConfig {
    SandboxConfig {
        staging_dir: staging_dir.to_path_buf(),
        ..SandboxConfig::default()
    }
}
