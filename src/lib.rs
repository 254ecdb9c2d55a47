pub mod config;
pub mod context;
pub mod dispatch;
pub mod docker;
pub mod error;
pub mod normalize;
pub mod registry;
pub mod result;
pub mod sandbox;
pub mod search;
pub mod tools;
pub mod workers;

pub use config::SandboxConfig;
pub use dispatch::Dispatcher;
pub use error::SandboxError;
pub use result::{ExecutionResult, FailureKind};
pub use sandbox::ExecutionRequest;
