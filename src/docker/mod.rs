pub mod cli;
pub mod runtime;

pub use cli::DockerCli;
pub use runtime::{ContainerHandle, ContainerRuntime, ContainerSpec, Mount};
