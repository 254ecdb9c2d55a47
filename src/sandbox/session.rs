use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::config::SandboxConfig;
use crate::docker::{ContainerHandle, ContainerRuntime, ContainerSpec, Mount};
use crate::error::SandboxError;
use crate::normalize::{format_lint_report, normalize_log_bytes, strip_markdown};
use crate::registry::{CommandTemplate, ExitClass, Language};
use crate::result::ExecutionResult;
use crate::sandbox::staging::{new_token, StagedSource};
use crate::sandbox::SessionState;

/// Label put on every sandbox container, carrying the session id.
pub const SESSION_LABEL: &str = "copilot-sandbox.session";

/// Per-session settings taken from the sandbox configuration.
#[derive(Debug, Clone)]
pub struct SessionOptions {
    pub staging_dir: PathBuf,
    pub mount_dir: String,
    pub timeout: Duration,
}

impl From<&SandboxConfig> for SessionOptions {
    fn from(config: &SandboxConfig) -> Self {
        Self {
            staging_dir: config.staging_dir.clone(),
            mount_dir: config.mount_dir.clone(),
            timeout: config.default_timeout(),
        }
    }
}

/// One ephemeral execution of a command template against submitted source.
///
/// The session owns its container and staged file exclusively. [`run`]
/// never returns an error: every failure is folded into the result, and
/// teardown is attempted exactly once whatever happened before it.
///
/// [`run`]: SandboxSession::run
pub struct SandboxSession<'a> {
    id: String,
    runtime: Arc<dyn ContainerRuntime>,
    template: &'a CommandTemplate,
    language: Language,
    options: SessionOptions,
    state: SessionState,
    staged: Option<StagedSource>,
    /// Name the container was requested under; set before creation so a
    /// container left half-started by a failed `create_and_run` is still removed.
    container_name: Option<String>,
    handle: Option<ContainerHandle>,
    torn_down: bool,
}

impl<'a> SandboxSession<'a> {
    pub fn new(
        runtime: Arc<dyn ContainerRuntime>,
        template: &'a CommandTemplate,
        language: Language,
        options: SessionOptions,
    ) -> Self {
        Self {
            id: new_token(),
            runtime,
            template,
            language,
            options,
            state: SessionState::Created,
            staged: None,
            container_name: None,
            handle: None,
            torn_down: false,
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    fn transition(&mut self, next: SessionState) {
        debug!(session = %self.id, from = %self.state, to = %next, "session state change");
        self.state = next;
    }

    /// Run the whole lifecycle and map it onto the result contract.
    pub async fn run(
        &mut self,
        source_code: &str,
        args: &[String],
        timeout: Option<Duration>,
    ) -> ExecutionResult {
        let deadline = timeout.unwrap_or(self.options.timeout);
        let outcome = self.drive(source_code, args, deadline).await;

        if let Err(ref err) = outcome {
            warn!(session = %self.id, state = %self.state, error = %err, "sandbox session aborted");
            self.transition(SessionState::Aborted);
        }
        self.teardown().await;

        match outcome {
            Ok((exit_code, captured)) => match self.template.exit_policy.classify(exit_code) {
                ExitClass::Clean => ExecutionResult::passed(captured, exit_code),
                ExitClass::Findings => ExecutionResult::with_findings(captured, exit_code),
                ExitClass::Failed => ExecutionResult::non_zero_exit(captured, exit_code),
            },
            Err(err) => ExecutionResult::from_error(&err),
        }
    }

    async fn drive(
        &mut self,
        source_code: &str,
        args: &[String],
        deadline: Duration,
    ) -> Result<(i64, String), SandboxError> {
        let source = strip_markdown(source_code);
        if source.is_empty() {
            return Err(SandboxError::EmptySource);
        }

        self.provision(&source, args).await?;
        let exit_code = self.execute(deadline).await?;
        let captured = self.capture().await?;
        Ok((exit_code, captured))
    }

    /// Stage the source under a fresh token and start the container with the
    /// staged file mounted read-only.
    pub async fn provision(&mut self, source: &str, args: &[String]) -> Result<(), SandboxError> {
        self.transition(SessionState::Provisioning);

        let staged = StagedSource::write(
            &self.options.staging_dir,
            &self.options.mount_dir,
            &self.id,
            self.language.extension(),
            source,
        )
        .await
        .map_err(|e| SandboxError::Provision {
            reason: format!("could not stage source: {}", e),
            retryable: false,
        })?;

        let command = self.template.render(&staged.container_path, args);
        let spec = ContainerSpec {
            name: format!("copilot-sandbox-{}", self.id),
            image: self.template.image.clone(),
            entrypoint: Some("/bin/sh".to_string()),
            command: vec!["-c".to_string(), command],
            mounts: vec![Mount {
                host_path: staged.host_path.clone(),
                container_path: staged.container_path.clone(),
                read_only: true,
            }],
            labels: vec![(SESSION_LABEL.to_string(), self.id.clone())],
            tty: true,
        };
        self.staged = Some(staged);
        self.container_name = Some(spec.name.clone());

        info!(
            session = %self.id,
            image = %spec.image,
            runtime = self.runtime.name(),
            "provisioning sandbox"
        );
        let handle = self
            .runtime
            .create_and_run(&spec)
            .await
            .map_err(SandboxError::provision)?;
        self.handle = Some(handle);
        self.transition(SessionState::Running);
        Ok(())
    }

    /// Wait for the container's exit status, bounded by `deadline`.
    pub async fn execute(&mut self, deadline: Duration) -> Result<i64, SandboxError> {
        let handle = self.running_handle()?;
        match tokio::time::timeout(deadline, self.runtime.wait(&handle)).await {
            Ok(Ok(exit_code)) => {
                info!(session = %self.id, exit_code, "sandbox exited");
                Ok(exit_code)
            }
            Ok(Err(e)) => Err(SandboxError::Execution(e.to_string())),
            Err(_) => {
                warn!(session = %self.id, timeout_secs = deadline.as_secs_f64(), "sandbox timed out");
                Err(SandboxError::Timeout(deadline))
            }
        }
    }

    /// Read and normalize the combined output stream.
    pub async fn capture(&mut self) -> Result<String, SandboxError> {
        let handle = self.running_handle()?;
        let raw = self
            .runtime
            .logs(&handle)
            .await
            .map_err(|e| SandboxError::Capture(e.to_string()))?;

        let mut text = normalize_log_bytes(&raw);
        if self.template.format_report {
            text = format_lint_report(&text);
        }
        self.transition(SessionState::Captured);
        Ok(text)
    }

    /// Remove the container and the staged file. Runs at most once; failures
    /// are logged and swallowed.
    pub async fn teardown(&mut self) {
        if self.torn_down {
            return;
        }
        self.torn_down = true;

        if let Some(handle) = self.container_to_remove() {
            if let Err(e) = self.runtime.remove(&handle).await {
                warn!(session = %self.id, container = %handle.id, error = %e, "failed to remove sandbox container");
            }
        }
        if let Some(staged) = self.staged.take() {
            if let Err(e) = staged.remove().await {
                warn!(session = %self.id, path = %staged.host_path.display(), error = %e, "failed to remove staged source");
            }
        }

        if self.state != SessionState::Aborted {
            self.transition(SessionState::TornDown);
        }
        debug!(session = %self.id, "sandbox torn down");
    }

    /// The started container, or the requested name when start-up failed.
    fn container_to_remove(&mut self) -> Option<ContainerHandle> {
        let name = self.container_name.take();
        self.handle
            .take()
            .or_else(|| name.map(|id| ContainerHandle { id }))
    }

    fn running_handle(&self) -> Result<ContainerHandle, SandboxError> {
        self.handle
            .clone()
            .ok_or_else(|| SandboxError::Execution("sandbox was never provisioned".to_string()))
    }
}

impl Drop for SandboxSession<'_> {
    // A session future dropped mid-flight (caller cancelled) still owns a
    // container; hand its removal to the runtime in the background.
    fn drop(&mut self) {
        if self.torn_down || (self.container_name.is_none() && self.staged.is_none()) {
            return;
        }
        let Ok(rt) = tokio::runtime::Handle::try_current() else {
            warn!(session = %self.id, "session dropped outside a runtime; container left behind");
            return;
        };
        let runtime = Arc::clone(&self.runtime);
        let handle = self.container_to_remove();
        let staged = self.staged.take();
        let id = self.id.clone();
        rt.spawn(async move {
            if let Some(handle) = handle {
                if let Err(e) = runtime.remove(&handle).await {
                    warn!(session = %id, error = %e, "failed to remove abandoned sandbox container");
                }
            }
            if let Some(staged) = staged {
                if let Err(e) = staged.remove().await {
                    warn!(session = %id, path = %staged.host_path.display(), error = %e, "failed to remove abandoned staged source");
                }
            }
        });
    }
}
