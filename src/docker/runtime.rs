use async_trait::async_trait;
use std::path::PathBuf;

use crate::error::RuntimeError;

/// A host file or directory bound into the container.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Mount {
    pub host_path: PathBuf,
    pub container_path: String,
    pub read_only: bool,
}

/// Everything needed to start one detached container.
#[derive(Debug, Clone)]
pub struct ContainerSpec {
    pub name: String,
    pub image: String,
    /// Overrides the image entrypoint so toolchain images with their own
    /// entrypoint still run the pipeline through the shell.
    pub entrypoint: Option<String>,
    pub command: Vec<String>,
    pub mounts: Vec<Mount>,
    pub labels: Vec<(String, String)>,
    /// Allocate a pseudo-terminal; stdout and stderr then arrive as one stream.
    pub tty: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContainerHandle {
    pub id: String,
}

/// Minimal container runtime contract used by sandbox sessions.
///
/// Implementations must be safe to call from many sessions at once; every
/// call may fail with a connectivity or runtime error.
#[async_trait]
pub trait ContainerRuntime: Send + Sync {
    fn name(&self) -> &'static str;

    /// Create the container and start it detached.
    async fn create_and_run(&self, spec: &ContainerSpec) -> Result<ContainerHandle, RuntimeError>;

    /// Block until the container exits and return its exit status.
    async fn wait(&self, handle: &ContainerHandle) -> Result<i64, RuntimeError>;

    /// Combined stdout/stderr of the container.
    async fn logs(&self, handle: &ContainerHandle) -> Result<Vec<u8>, RuntimeError>;

    /// Force-remove the container, killing it if still running.
    async fn remove(&self, handle: &ContainerHandle) -> Result<(), RuntimeError>;
}
