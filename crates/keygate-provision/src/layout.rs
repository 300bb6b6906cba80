use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};

use crate::error::ConfigError;

/// Where the bundle lands: the asset directory, the archive inside it, and the
/// artifact launched once provisioning is complete.
#[derive(Clone, Debug)]
pub struct AssetLayout {
    root: PathBuf,
    launch_artifact: Option<PathBuf>,
}

impl AssetLayout {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            launch_artifact: None,
        }
    }

    /// `<home>/.<dir_name>`.
    pub fn in_home(dir_name: &str) -> Result<Self, ConfigError> {
        let home = home::home_dir().ok_or(ConfigError::NoHomeDir)?;
        Ok(Self::new(home.join(format!(".{}", dir_name.trim_start_matches('.')))))
    }

    /// Path of the launched artifact, relative to the asset directory.
    pub fn with_launch_artifact(mut self, relative: impl Into<PathBuf>) -> Self {
        self.launch_artifact = Some(relative.into());
        self
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Download target for a run started at `at`.
    pub fn archive_path(&self, at: DateTime<Utc>) -> PathBuf {
        self.root.join(format!("bundle_{}.zip", at.timestamp()))
    }

    pub fn launch_path(&self) -> Option<PathBuf> {
        self.launch_artifact.as_ref().map(|p| self.root.join(p))
    }
}
