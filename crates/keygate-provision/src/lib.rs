//! License-gated bundle provisioning.
//!
//! [`ProvisioningPipeline`] validates a key, downloads the bundle (primary source, then
//! backup), unpacks it into the asset directory and finally writes the local
//! [`EntitlementRecord`]. The record is never written for a run that did not finish
//! extracting, and it is re-validated remotely before it is trusted on a later start.

mod config;
mod entitlement;
mod error;
mod job;
mod launcher;
mod layout;
mod pipeline;

pub use config::{BundleConfig, PipelineSettings, ProvisionConfig, RegistryConfig, TransferConfig};
pub use entitlement::EntitlementRecord;
pub use error::{ConfigError, ProvisionError, ProvisionErrorKind, StartError};
pub use job::{JobState, JobStatus};
pub use launcher::{Launcher, ProcessLauncher};
pub use layout::AssetLayout;
pub use pipeline::{PipelineBuilder, ProvisioningPipeline};
