use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use keygate_fetch::{FetchOptions, LowSpeedLimit, Timeouts};
use keygate_license::{
    HttpDocumentStore, HttpIdentityResolver, HttpTokenAuthority, KeyRegistryClient,
    RemoteKeyValidator, RetryPolicy,
};
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::entitlement::EntitlementRecord;
use crate::error::ConfigError;
use crate::layout::AssetLayout;

/// Every tunable of a provisioning setup.
///
/// Deserializes from a partial document; absent fields take their defaults.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProvisionConfig {
    /// Token authority base URL; the key is appended as the last path segment.
    pub authority_url: String,
    pub identity_url: String,
    pub registry: RegistryConfig,
    pub bundle: BundleConfig,
    /// Name of the hidden directory under the home directory.
    pub asset_dir_name: String,
    /// Artifact started by resume, relative to the asset directory.
    pub launch_artifact: Option<PathBuf>,
    pub entitlement_file: PathBuf,
    /// Extra validation runs after a registry conflict.
    pub conflict_retries: u32,
    /// Timeout for authority, identity and registry requests.
    pub request_timeout_secs: u64,
    pub request_attempts: u32,
    pub retry_delay_ms: u64,
    pub transfer: TransferConfig,
}

impl Default for ProvisionConfig {
    fn default() -> Self {
        Self {
            authority_url: String::new(),
            identity_url: "https://api.ipify.org/?format=json".to_string(),
            registry: RegistryConfig::default(),
            bundle: BundleConfig::default(),
            asset_dir_name: "keygate".to_string(),
            launch_artifact: None,
            entitlement_file: PathBuf::from("key.txt"),
            conflict_retries: 2,
            request_timeout_secs: 15,
            request_attempts: 3,
            retry_delay_ms: 1000,
            transfer: TransferConfig::default(),
        }
    }
}

#[derive(Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RegistryConfig {
    /// Document URL. Without it keys are validated but never bound.
    pub url: Option<String>,
    pub token: Option<String>,
    pub message: String,
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            url: None,
            token: None,
            message: "Register license binding".to_string(),
        }
    }
}

impl fmt::Debug for RegistryConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RegistryConfig")
            .field("url", &self.url)
            .field("token", &self.token.as_ref().map(|_| "****"))
            .field("message", &self.message)
            .finish()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BundleConfig {
    pub primary_url: String,
    pub backup_url: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TransferConfig {
    pub connect_timeout_secs: u64,
    pub total_timeout_secs: u64,
    /// `0` disables the throughput floor.
    pub low_speed_bytes_per_sec: u64,
    pub low_speed_window_secs: u64,
    pub max_redirects: u32,
    pub min_file_size: u64,
}

impl Default for TransferConfig {
    fn default() -> Self {
        Self {
            connect_timeout_secs: 15,
            total_timeout_secs: 60,
            low_speed_bytes_per_sec: 500,
            low_speed_window_secs: 20,
            max_redirects: 10,
            min_file_size: 1024,
        }
    }
}

impl TransferConfig {
    pub fn fetch_options(&self) -> FetchOptions {
        let low_speed = (self.low_speed_bytes_per_sec > 0).then(|| LowSpeedLimit {
            bytes_per_sec: self.low_speed_bytes_per_sec,
            window: Duration::from_secs(self.low_speed_window_secs.max(1)),
        });
        FetchOptions::default()
            .timeouts(Timeouts {
                connect: Duration::from_secs(self.connect_timeout_secs),
                total: Duration::from_secs(self.total_timeout_secs),
            })
            .low_speed(low_speed)
            .max_redirects(self.max_redirects)
            .min_file_size(self.min_file_size)
    }
}

/// Settings consumed by [`ProvisioningPipeline`](crate::ProvisioningPipeline).
#[derive(Debug, Clone)]
pub struct PipelineSettings {
    pub primary_url: String,
    pub backup_url: String,
    pub layout: AssetLayout,
    pub entitlement: EntitlementRecord,
    pub fetch: FetchOptions,
    pub conflict_retries: u32,
}

fn required(value: &str, field: &'static str) -> Result<(), ConfigError> {
    if value.trim().is_empty() {
        return Err(ConfigError::Missing(field));
    }
    Ok(())
}

impl ProvisionConfig {
    /// Check the values without which no run can succeed.
    pub fn validate(&self) -> Result<(), ConfigError> {
        required(&self.authority_url, "authority_url")?;
        required(&self.identity_url, "identity_url")?;
        required(&self.bundle.primary_url, "bundle.primary_url")?;
        required(&self.bundle.backup_url, "bundle.backup_url")?;
        if self.transfer.total_timeout_secs == 0 {
            return Err(ConfigError::Invalid {
                field: "transfer.total_timeout_secs",
                reason: "must be positive".to_string(),
            });
        }
        Ok(())
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            attempts: self.request_attempts.max(1),
            base_delay: Duration::from_millis(self.retry_delay_ms),
        }
    }

    /// Validator backed by the configured HTTP services.
    pub fn build_validator(&self) -> Result<RemoteKeyValidator, ConfigError> {
        let timeout = Duration::from_secs(self.request_timeout_secs);
        let retry = self.retry_policy();

        let authority =
            HttpTokenAuthority::new(&self.authority_url, timeout, retry).map_err(|e| {
                ConfigError::Invalid {
                    field: "authority_url",
                    reason: e.to_string(),
                }
            })?;
        let identity = HttpIdentityResolver::new(&self.identity_url, timeout, retry).map_err(
            |e| ConfigError::Invalid {
                field: "identity_url",
                reason: e.to_string(),
            },
        )?;
        let validator = RemoteKeyValidator::new(Arc::new(authority), Arc::new(identity));

        let Some(url) = self.registry.url.as_deref().filter(|u| !u.trim().is_empty()) else {
            warn!("no registry configured, keys will not be bound to an identity");
            return Ok(validator);
        };
        let mut store = HttpDocumentStore::new(url, timeout)
            .map_err(|e| ConfigError::Invalid {
                field: "registry.url",
                reason: e.to_string(),
            })?
            .with_message(&self.registry.message);
        if let Some(token) = &self.registry.token {
            store = store.with_token(token);
        }
        Ok(validator.with_registry(KeyRegistryClient::new(Arc::new(store))))
    }

    pub fn pipeline_settings(&self) -> Result<PipelineSettings, ConfigError> {
        let mut layout = AssetLayout::in_home(&self.asset_dir_name)?;
        if let Some(artifact) = &self.launch_artifact {
            layout = layout.with_launch_artifact(artifact);
        }
        Ok(PipelineSettings {
            primary_url: self.bundle.primary_url.clone(),
            backup_url: self.bundle.backup_url.clone(),
            layout,
            entitlement: EntitlementRecord::new(&self.entitlement_file),
            fetch: self.transfer.fetch_options(),
            conflict_retries: self.conflict_retries,
        })
    }
}
