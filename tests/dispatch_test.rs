/// Dispatch and tool invocation tests
mod common;

use async_trait::async_trait;
use common::{dispatcher, staged_files, ScriptedRuntime};
use copilot_sandbox::context::{RequestContext, Role};
use copilot_sandbox::registry::{Language, ToolKind};
use copilot_sandbox::search::WebSearch;
use copilot_sandbox::tools::ToolArgs;
use copilot_sandbox::workers::{Worker, SEARCH_TOOL};
use copilot_sandbox::{ExecutionRequest, FailureKind, SandboxError};
use std::sync::atomic::Ordering;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tempfile::tempdir;

#[tokio::test]
async fn test_unknown_pair_fails_before_provisioning() {
    let dir = tempdir().unwrap();
    let runtime = Arc::new(ScriptedRuntime::exiting(0, "ok"));
    let dispatcher = dispatcher(runtime.clone(), dir.path(), 4);

    let request = ExecutionRequest::new(ToolKind::Run, Language::C, "int main(void){return 0;}");
    let err = dispatcher.dispatch(request).await.unwrap_err();

    assert!(matches!(
        err,
        SandboxError::UnknownTool {
            kind: ToolKind::Run,
            language: Language::C
        }
    ));
    assert_eq!(runtime.creates(), 0);
    assert_eq!(staged_files(dir.path()), 0);
}

#[tokio::test]
async fn test_dispatch_returns_contract() {
    let dir = tempdir().unwrap();
    let runtime = Arc::new(ScriptedRuntime::exiting(0, "3\r\n"));
    let dispatcher = dispatcher(runtime.clone(), dir.path(), 4);

    let request = ExecutionRequest::new(ToolKind::Run, Language::Python, "```python\nprint(1 + 2)\n```")
        .with_args(vec!["--flag".to_string()]);
    let result = dispatcher.dispatch(request).await.unwrap();

    assert!(result.success);
    assert_eq!(result.output.as_deref(), Some("3"));
    assert!(runtime.last_spec().command[1].ends_with(".py --flag"));
}

#[tokio::test]
async fn test_invoke_tool_records_history() {
    let dir = tempdir().unwrap();
    let runtime = Arc::new(ScriptedRuntime::exiting(0, "hi"));
    let dispatcher = dispatcher(runtime, dir.path(), 4);
    let mut ctx = RequestContext::from_user("run this please");

    let args = ToolArgs {
        code: "print('hi')".to_string(),
        params: vec![],
    };
    let result = dispatcher.invoke_tool(&mut ctx, Worker::Sanitizer, "run_python", args).await.unwrap();
    assert!(result.success);

    assert_eq!(ctx.history().len(), 2);
    let message = ctx.last().unwrap();
    assert_eq!(message.role, Role::Tool);
    assert_eq!(message.name.as_deref(), Some("run_python"));
    let recorded: serde_json::Value = serde_json::from_str(&message.content).unwrap();
    assert_eq!(recorded["success"], true);
    assert_eq!(recorded["output"], "hi");
}

#[tokio::test]
async fn test_invoke_unknown_tool_name() {
    let dir = tempdir().unwrap();
    let runtime = Arc::new(ScriptedRuntime::exiting(0, ""));
    let dispatcher = dispatcher(runtime.clone(), dir.path(), 4);
    let mut ctx = RequestContext::from_user("lint my rust");

    let err = dispatcher
        .invoke_tool(&mut ctx, Worker::Linter, "lint_rust", ToolArgs::default())
        .await
        .unwrap_err();

    assert!(matches!(err, SandboxError::UnknownToolName(ref name) if name == "lint_rust"));
    assert_eq!(ctx.history().len(), 1);
    assert_eq!(runtime.creates(), 0);
}

#[tokio::test]
async fn test_worker_cannot_call_foreign_tool() {
    let dir = tempdir().unwrap();
    let runtime = Arc::new(ScriptedRuntime::exiting(0, "ok"));
    let dispatcher = dispatcher(runtime.clone(), dir.path(), 4);
    let mut ctx = RequestContext::from_user("check this for leaks");

    let args = ToolArgs {
        code: "int main(void){return 0;}".to_string(),
        params: vec![],
    };
    let err = dispatcher
        .invoke_tool(&mut ctx, Worker::Linter, "sanitize_c", args.clone())
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        SandboxError::ToolNotPermitted { worker: Worker::Linter, ref tool } if tool == "sanitize_c"
    ));

    let err = dispatcher
        .invoke_tool(&mut ctx, Worker::Optimizer, "run_python", args)
        .await
        .unwrap_err();
    assert!(matches!(err, SandboxError::ToolNotPermitted { worker: Worker::Optimizer, .. }));

    assert_eq!(ctx.history().len(), 1);
    assert_eq!(runtime.creates(), 0);
    assert_eq!(staged_files(dir.path()), 0);
}

struct CannedSearch {
    queries: Mutex<Vec<(String, u32)>>,
}

#[async_trait]
impl WebSearch for CannedSearch {
    async fn search(&self, query: &str, count: u32) -> String {
        self.queries.lock().unwrap().push((query.to_string(), count));
        "Title: CLion\nSnippet: C IDE\nLink: https://jetbrains.com/clion".to_string()
    }
}

#[tokio::test]
async fn test_helper_web_search_is_recorded() {
    let dir = tempdir().unwrap();
    let runtime = Arc::new(ScriptedRuntime::exiting(0, ""));
    let search = Arc::new(CannedSearch {
        queries: Mutex::new(Vec::new()),
    });
    let dispatcher = dispatcher(runtime.clone(), dir.path(), 4).with_search(search.clone(), 3);
    let mut ctx = RequestContext::from_user("which IDE for C?");

    let args: ToolArgs = serde_json::from_str(r#"{"query": "best C IDE"}"#).unwrap();
    let result = dispatcher
        .invoke_tool(&mut ctx, Worker::Helper, SEARCH_TOOL, args)
        .await
        .unwrap();

    assert!(result.success);
    assert!(result.output.unwrap().starts_with("Title: CLion"));
    assert_eq!(*search.queries.lock().unwrap(), vec![("best C IDE".to_string(), 3)]);
    assert_eq!(ctx.last().unwrap().name.as_deref(), Some(SEARCH_TOOL));
    assert_eq!(runtime.creates(), 0);

    // search is the helper's alone
    let err = dispatcher
        .invoke_tool(&mut ctx, Worker::Sanitizer, SEARCH_TOOL, ToolArgs::default())
        .await
        .unwrap_err();
    assert!(matches!(err, SandboxError::ToolNotPermitted { .. }));
}

#[tokio::test]
async fn test_web_search_without_backend() {
    let dir = tempdir().unwrap();
    let runtime = Arc::new(ScriptedRuntime::exiting(0, ""));
    let dispatcher = dispatcher(runtime, dir.path(), 4);
    let mut ctx = RequestContext::from_user("which IDE for C?");

    let err = dispatcher
        .invoke_tool(&mut ctx, Worker::Helper, SEARCH_TOOL, ToolArgs::default())
        .await
        .unwrap_err();
    assert!(matches!(err, SandboxError::SearchUnavailable));
    assert_eq!(ctx.history().len(), 1);
}

#[tokio::test]
async fn test_concurrency_is_bounded() {
    let dir = tempdir().unwrap();
    let runtime =
        Arc::new(ScriptedRuntime::exiting(0, "ok").with_wait_delay(Duration::from_millis(25)));
    let dispatcher = dispatcher(runtime.clone(), dir.path(), 2);

    let requests = (0..6)
        .map(|i| ExecutionRequest::new(ToolKind::Run, Language::Python, format!("print({})", i)))
        .collect();
    let results = dispatcher.dispatch_all(requests).await;

    assert_eq!(results.len(), 6);
    assert!(results.iter().all(|r| r.as_ref().unwrap().success));
    assert_eq!(runtime.creates(), 6);
    assert_eq!(runtime.removes(), 6);
    assert!(runtime.max_live.load(Ordering::SeqCst) <= 2);
    assert_eq!(staged_files(dir.path()), 0);
}

#[tokio::test]
async fn test_caller_deadline_overrides_default() {
    let dir = tempdir().unwrap();
    let runtime = Arc::new(ScriptedRuntime::hanging());
    let dispatcher = dispatcher(runtime.clone(), dir.path(), 4);

    let request = ExecutionRequest::new(ToolKind::Run, Language::Python, "while True: pass")
        .with_timeout(Duration::from_millis(50));
    let started = std::time::Instant::now();
    let result = dispatcher.dispatch(request).await.unwrap();

    assert!(started.elapsed() < Duration::from_secs(5));
    assert_eq!(result.failure, Some(FailureKind::Timeout));
    assert_eq!(runtime.removes(), 1);
}

#[tokio::test]
async fn test_closed_dispatcher_rejects_new_sessions() {
    let dir = tempdir().unwrap();
    let runtime = Arc::new(ScriptedRuntime::exiting(0, "ok"));
    let dispatcher = dispatcher(runtime.clone(), dir.path(), 1);
    dispatcher.close();

    let request = ExecutionRequest::new(ToolKind::Run, Language::Python, "print(1)");
    let result = dispatcher.dispatch(request).await.unwrap();

    assert!(!result.success);
    assert_eq!(result.failure, Some(FailureKind::Provision));
    assert_eq!(runtime.creates(), 0);
}
