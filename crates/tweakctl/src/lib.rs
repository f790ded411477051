//! tweakctl - command-line front end for the tweak daemon

pub mod cli;
pub mod commands;
pub mod config;
pub mod logging;
pub mod output;
pub mod rpc_client;

pub use cli::{ChangeArg, Cli, Commands};
pub use config::CtlConfig;
pub use rpc_client::{RpcBackend, RpcClient};
