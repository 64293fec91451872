//! AWS backend for matomo-ops
//!
//! Implements `matomo_ops_core::StackProvider` on top of the `aws` and `cdk`
//! command-line tools. Every command goes through a `CommandRunner`, and
//! JSON output is decoded into the typed structs in `responses`.

pub mod command;
pub mod config;
pub mod provider;
pub mod responses;

pub use command::{CommandOutput, CommandRunner, CommandSpec, ProcessRunner};
pub use config::AwsConfig;
pub use provider::{AwsCliProvider, VPC_ID_OUTPUT};
