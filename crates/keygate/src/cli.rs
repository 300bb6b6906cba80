use std::path::PathBuf;

use clap::{Parser, Subcommand};

#[derive(Clone, Debug, Parser)]
#[command(name = "keygate", version = env!("CARGO_PKG_VERSION"), about, long_about = None, propagate_version = true)]
pub struct App {
    /// Configuration file; `KEYGATE_*` environment variables override it
    #[arg(short, long, global = true, default_value = "keygate.toml")]
    pub config: PathBuf,

    #[command(subcommand)]
    pub cmd: Commands,
}

#[derive(Clone, Debug, Subcommand)]
pub enum Commands {
    /// Validate a key, then download and unpack the bundle
    #[command(alias = "a", name = "activate")]
    Activate {
        key: String,
        /// Provision again even when a valid entitlement record exists
        #[arg(long)]
        force: bool,
    },
    /// Re-validate the stored key and launch the provisioned artifact
    #[command(alias = "r", name = "resume")]
    Resume,
    /// Validate a key without provisioning anything
    #[command(alias = "c", name = "check")]
    Check { key: String },
}
