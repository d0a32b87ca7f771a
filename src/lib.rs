#![forbid(unsafe_code)]

pub mod command;
pub mod config;
pub mod deploy;
pub mod error;
pub mod inventory;
pub mod runner;
pub mod store;
pub mod telemetry;
pub mod vars;

pub use command::CommandLine;
pub use config::{CliArgs, DeployConfig, DeploymentKind, DeploymentTarget, OutputFormat};
pub use error::DeployerError;
pub use inventory::HostPair;
pub use runner::{CommandRunner, ShellRunner};
pub use store::{ConfigStore, Section};
