//! License key validation.
//!
//! A key is accepted when the token authority says it is valid and the shared key
//! registry either binds it to the caller's current network identity or already has
//! it bound to that identity.
//!
//! # Architecture
//!
//! - [`authority`] - the [`TokenAuthority`] seam and its HTTP implementation
//! - [`identity`] - the [`IdentityResolver`] seam and its HTTP implementation
//! - [`registry`] - the versioned key record, its stores and [`KeyRegistryClient`]
//! - [`validator`] - [`RemoteKeyValidator`], which drives the steps above

pub mod authority;
mod error;
mod http;
pub mod identity;
mod key;
pub mod registry;
pub mod validator;

pub use authority::{HttpTokenAuthority, TokenAuthority};
pub use error::{
    AuthorityError, IdentityError, Result, StoreError, ValidationError, ValidationErrorKind,
};
pub use http::RetryPolicy;
pub use identity::{HttpIdentityResolver, IdentityResolver};
pub use key::{IdentityFingerprint, LicenseKey};
pub use registry::{
    BindOutcome, HttpDocumentStore, KeyRecord, KeyRegistryClient, MemoryStore, RegistrySnapshot,
    RegistryStore, VersionToken, VersionedDocument,
};
pub use validator::{Binding, RemoteKeyValidator, Validated, ValidationOutcome};
