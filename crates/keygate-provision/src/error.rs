use std::path::PathBuf;

use keygate_archive::{ExtractError, ExtractErrorKind};
use keygate_fetch::{FetchError, TransferErrorKind};
use keygate_license::{ValidationError, ValidationErrorKind};
use thiserror::Error;

use crate::job::JobState;

/// First failure of a provisioning run. Its `Display` is the job's error message.
#[derive(Debug, Error)]
pub enum ProvisionError {
    #[error("{0}")]
    Validation(#[from] ValidationError),

    #[error("download failed: {0}")]
    Transfer(#[from] FetchError),

    #[error("extraction failed: {0}")]
    Extract(#[from] ExtractError),

    #[error("failed to save entitlement record '{path}': {source}")]
    Persist {
        path: PathBuf,
        source: keygate_fs::Error,
    },

    #[error("provisioning worker stopped unexpectedly: {0}")]
    Worker(String),
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ProvisionErrorKind {
    Validation(ValidationErrorKind),
    Transfer(TransferErrorKind),
    Extract(ExtractErrorKind),
    PersistWriteFailed,
    Worker,
}

impl ProvisionError {
    pub fn kind(&self) -> ProvisionErrorKind {
        match self {
            Self::Validation(e) => ProvisionErrorKind::Validation(e.kind()),
            Self::Transfer(e) => ProvisionErrorKind::Transfer(e.kind()),
            Self::Extract(e) => ProvisionErrorKind::Extract(e.kind()),
            Self::Persist { .. } => ProvisionErrorKind::PersistWriteFailed,
            Self::Worker(_) => ProvisionErrorKind::Worker,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum StartError {
    #[error("a provisioning job is already {state}")]
    Busy { state: JobState },
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("missing configuration value `{0}`")]
    Missing(&'static str),

    #[error("could not determine the home directory")]
    NoHomeDir,

    #[error("invalid configuration value `{field}`: {reason}")]
    Invalid { field: &'static str, reason: String },
}
