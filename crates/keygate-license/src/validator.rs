use std::fmt;
use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::authority::TokenAuthority;
use crate::error::{Result, ValidationError};
use crate::identity::IdentityResolver;
use crate::key::{IdentityFingerprint, LicenseKey};
use crate::registry::{BindOutcome, KeyRegistryClient};

/// Result of one validation attempt as shown to a user.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ValidationOutcome {
    pub valid: bool,
    pub reason: Option<String>,
}

impl ValidationOutcome {
    pub fn accepted() -> Self {
        Self {
            valid: true,
            reason: None,
        }
    }

    pub fn rejected(reason: impl Into<String>) -> Self {
        Self {
            valid: false,
            reason: Some(reason.into()),
        }
    }
}

impl From<&Result<Validated>> for ValidationOutcome {
    fn from(result: &Result<Validated>) -> Self {
        match result {
            Ok(_) => Self::accepted(),
            Err(e) => Self::rejected(e.to_string()),
        }
    }
}

/// How the key relates to the registry after a successful validation.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Binding {
    /// The key was unbound and is now bound to the current identity.
    NewlyBound,
    /// The key was already bound to the current identity; nothing was written.
    AlreadyBound,
    /// No registry is configured.
    Unchecked,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Validated {
    pub identity: IdentityFingerprint,
    pub binding: Binding,
}

/// Validates a key with the token authority, then binds it to the caller's identity in
/// the key registry.
#[derive(Clone)]
pub struct RemoteKeyValidator {
    authority: Arc<dyn TokenAuthority>,
    identity: Arc<dyn IdentityResolver>,
    registry: Option<KeyRegistryClient>,
}

impl fmt::Debug for RemoteKeyValidator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RemoteKeyValidator")
            .field("registry", &self.registry.is_some())
            .finish_non_exhaustive()
    }
}

impl RemoteKeyValidator {
    pub fn new(authority: Arc<dyn TokenAuthority>, identity: Arc<dyn IdentityResolver>) -> Self {
        Self {
            authority,
            identity,
            registry: None,
        }
    }

    pub fn with_registry(mut self, registry: KeyRegistryClient) -> Self {
        self.registry = Some(registry);
        self
    }

    /// Run one validation.
    ///
    /// 1. An empty key fails before any network call.
    /// 2. The authority must accept the key.
    /// 3. The current identity is looked up fresh.
    /// 4. With a registry: a key bound elsewhere fails with
    ///    [`ValidationError::IdentityMismatch`]; an unbound key is bound with a write
    ///    conditioned on the version that was read. A lost race fails with
    ///    [`ValidationError::RegistryConflict`] and never overwrites the other writer.
    pub async fn validate(&self, key: &LicenseKey) -> Result<Validated> {
        if key.is_empty() {
            return Err(ValidationError::EmptyKey);
        }

        if !self.authority.is_valid(key).await? {
            info!(key = %key, "license key rejected by authority");
            return Err(ValidationError::AuthorityRejected);
        }
        debug!(key = %key, "license key accepted by authority");

        let identity = self.identity.resolve().await?;

        let Some(registry) = &self.registry else {
            return Ok(Validated {
                identity,
                binding: Binding::Unchecked,
            });
        };

        let snapshot = registry.fetch().await?;
        let binding = match snapshot.record.bound_identity(key) {
            Some(bound) if bound == identity => Binding::AlreadyBound,
            Some(bound) => {
                warn!(key = %key, bound = %bound, current = %identity, "license key bound to another identity");
                return Err(ValidationError::IdentityMismatch);
            }
            None => match registry.bind(&snapshot, key, &identity).await? {
                BindOutcome::Written(_) => Binding::NewlyBound,
                BindOutcome::Unchanged => Binding::AlreadyBound,
            },
        };

        Ok(Validated { identity, binding })
    }

    /// [`validate`](Self::validate), re-run up to `extra_attempts` more times while it
    /// fails with a registry conflict.
    pub async fn validate_retrying(
        &self,
        key: &LicenseKey,
        extra_attempts: u32,
    ) -> Result<Validated> {
        let mut attempt = 0;
        loop {
            match self.validate(key).await {
                Err(e) if e.is_retryable() && attempt < extra_attempts => {
                    attempt += 1;
                    warn!(key = %key, attempt, "registry conflict, validating again");
                }
                result => return result,
            }
        }
    }

    /// Single validation folded into a [`ValidationOutcome`].
    pub async fn outcome(&self, key: &LicenseKey) -> ValidationOutcome {
        ValidationOutcome::from(&self.validate(key).await)
    }
}
