use futures::future::join_all;
use std::sync::Arc;
use tokio::sync::Semaphore;
use tracing::{debug, info, instrument, warn};

use crate::config::SandboxConfig;
use crate::context::{ChatMessage, RequestContext, Role};
use crate::docker::{ContainerRuntime, DockerCli};
use crate::error::SandboxError;
use crate::registry::ToolRegistry;
use crate::result::ExecutionResult;
use crate::sandbox::{ExecutionRequest, SandboxSession, SessionOptions};
use crate::search::{BingSearch, WebSearch};
use crate::tools::{find_tool, ToolArgs};
use crate::workers::{Worker, SEARCH_TOOL};

/// Resolves requests against the tool registry and runs each one in its own
/// sandbox session. Cheap to clone; clones share the runtime and the
/// concurrency limit.
#[derive(Clone)]
pub struct Dispatcher {
    registry: Arc<ToolRegistry>,
    runtime: Arc<dyn ContainerRuntime>,
    limiter: Arc<Semaphore>,
    options: SessionOptions,
    search: Option<Arc<dyn WebSearch>>,
    search_count: u32,
}

impl Dispatcher {
    pub fn new(
        registry: ToolRegistry,
        runtime: Arc<dyn ContainerRuntime>,
        options: SessionOptions,
        max_concurrent_sessions: usize,
    ) -> Self {
        Self {
            registry: Arc::new(registry),
            runtime,
            limiter: Arc::new(Semaphore::new(max_concurrent_sessions.max(1))),
            options,
            search: None,
            search_count: 0,
        }
    }

    /// Back the `web_search` tool with `search`, asking for `count` results.
    pub fn with_search(mut self, search: Arc<dyn WebSearch>, count: u32) -> Self {
        self.search = Some(search);
        self.search_count = count;
        self
    }

    /// Builtin toolchains on the configured docker client. Web search is
    /// enabled when an API key is configured.
    pub fn from_config(config: &SandboxConfig) -> Self {
        let runtime = DockerCli::new(config.docker_bin.clone(), config.limits.clone());
        let dispatcher = Self::new(
            ToolRegistry::builtin(&config.images),
            Arc::new(runtime),
            SessionOptions::from(config),
            config.max_concurrent_sessions,
        );
        match BingSearch::new(&config.search) {
            Ok(search) => dispatcher.with_search(Arc::new(search), config.search.result_count),
            Err(e) => {
                debug!(error = %e, "web search disabled");
                dispatcher
            }
        }
    }

    pub fn registry(&self) -> &ToolRegistry {
        &self.registry
    }

    /// Run one request. The only `Err` is an unregistered (kind, language)
    /// pair, reported before anything is provisioned; every other failure is
    /// part of the returned result.
    #[instrument(skip_all, fields(kind = %request.tool_kind, language = %request.language))]
    pub async fn dispatch(&self, request: ExecutionRequest) -> Result<ExecutionResult, SandboxError> {
        let template = self.registry.resolve(request.tool_kind, request.language)?;

        let _permit = match self.limiter.acquire().await {
            Ok(permit) => permit,
            Err(_) => {
                return Ok(ExecutionResult::from_error(&SandboxError::Provision {
                    reason: "dispatcher is shutting down".to_string(),
                    retryable: false,
                }))
            }
        };

        let mut session = SandboxSession::new(
            Arc::clone(&self.runtime),
            template,
            request.language,
            self.options.clone(),
        );
        info!(session = session.id(), "dispatching to sandbox");
        let result = session
            .run(&request.source_code, &request.program_args, request.timeout)
            .await;
        info!(session = session.id(), success = result.success, "sandbox finished");
        Ok(result)
    }

    /// Run several requests concurrently, bounded by the session limit.
    pub async fn dispatch_all(
        &self,
        requests: Vec<ExecutionRequest>,
    ) -> Vec<Result<ExecutionResult, SandboxError>> {
        join_all(requests.into_iter().map(|r| self.dispatch(r))).await
    }

    /// Invoke a tool by name on behalf of `worker` and record the JSON result
    /// in the request's history. Names outside the worker's tool set are
    /// refused before anything runs.
    pub async fn invoke_tool(
        &self,
        ctx: &mut RequestContext,
        worker: Worker,
        name: &str,
        args: ToolArgs,
    ) -> Result<ExecutionResult, SandboxError> {
        let tool = find_tool(name);
        if tool.is_none() && name != SEARCH_TOOL {
            return Err(SandboxError::UnknownToolName(name.to_string()));
        }
        if !worker.may_call(name) {
            warn!(%worker, tool = name, "tool call refused");
            return Err(SandboxError::ToolNotPermitted {
                worker,
                tool: name.to_string(),
            });
        }

        let result = match tool {
            Some(tool) => self.dispatch(tool.request(args)).await?,
            None => self.web_search(&args.code).await?,
        };

        let content = serde_json::to_string(&result).unwrap_or_else(|_| result.text().to_string());
        ctx.push(ChatMessage::new(Role::Tool, Some(name), content));
        Ok(result)
    }

    async fn web_search(&self, query: &str) -> Result<ExecutionResult, SandboxError> {
        let search = self.search.as_ref().ok_or(SandboxError::SearchUnavailable)?;
        info!(query, "web search");
        let text = search.search(query, self.search_count).await;
        Ok(ExecutionResult::from_search(text))
    }

    /// Stop admitting new sessions; running ones finish normally.
    pub fn close(&self) {
        self.limiter.close();
    }
}
