//! CLI commands

mod deploy;

pub use deploy::DeployCommand;
