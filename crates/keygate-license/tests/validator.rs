//! RemoteKeyValidator against in-memory fakes.

use std::collections::HashSet;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use keygate_license::{
    AuthorityError, Binding, IdentityError, IdentityFingerprint, IdentityResolver, KeyRecord,
    KeyRegistryClient, LicenseKey, MemoryStore, RemoteKeyValidator, TokenAuthority,
    ValidationError, ValidationErrorKind,
};

#[derive(Default)]
struct FakeAuthority {
    valid: HashSet<String>,
    unreachable: bool,
    calls: AtomicUsize,
}

impl FakeAuthority {
    fn accepting(keys: &[&str]) -> Self {
        Self {
            valid: keys.iter().map(|k| k.to_string()).collect(),
            ..Self::default()
        }
    }
}

#[async_trait]
impl TokenAuthority for FakeAuthority {
    async fn is_valid(&self, key: &LicenseKey) -> Result<bool, AuthorityError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.unreachable {
            return Err(AuthorityError::Unreachable("no data".into()));
        }
        Ok(self.valid.contains(key.expose()))
    }
}

struct FakeIdentity {
    address: Mutex<Option<String>>,
    calls: AtomicUsize,
}

impl FakeIdentity {
    fn at(address: &str) -> Self {
        Self {
            address: Mutex::new(Some(address.to_string())),
            calls: AtomicUsize::new(0),
        }
    }

    fn offline() -> Self {
        Self {
            address: Mutex::new(None),
            calls: AtomicUsize::new(0),
        }
    }

    fn move_to(&self, address: &str) {
        *self.address.lock().unwrap() = Some(address.to_string());
    }
}

#[async_trait]
impl IdentityResolver for FakeIdentity {
    async fn resolve(&self) -> Result<IdentityFingerprint, IdentityError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        match self.address.lock().unwrap().clone() {
            Some(address) => Ok(IdentityFingerprint::new(address)),
            None => Err(IdentityError::Unreachable("offline".into())),
        }
    }
}

struct Harness {
    authority: Arc<FakeAuthority>,
    identity: Arc<FakeIdentity>,
    store: Arc<MemoryStore>,
    validator: RemoteKeyValidator,
}

fn harness(authority: FakeAuthority, identity: FakeIdentity, store: MemoryStore) -> Harness {
    let authority = Arc::new(authority);
    let identity = Arc::new(identity);
    let store = Arc::new(store);
    let validator = RemoteKeyValidator::new(authority.clone(), identity.clone())
        .with_registry(KeyRegistryClient::new(store.clone()));
    Harness {
        authority,
        identity,
        store,
        validator,
    }
}

fn bound_to(store: &MemoryStore, key: &str) -> Option<IdentityFingerprint> {
    let content = store.content()?;
    KeyRecord::parse(&content)
        .unwrap()
        .bound_identity(&LicenseKey::new(key))
}

#[tokio::test]
async fn empty_key_makes_no_network_call() {
    let h = harness(
        FakeAuthority::accepting(&[""]),
        FakeIdentity::at("1.1.1.1"),
        MemoryStore::new(),
    );

    for raw in ["", "   ", "\n\t"] {
        let err = h.validator.validate(&LicenseKey::new(raw)).await.unwrap_err();
        assert_eq!(err, ValidationError::EmptyKey);
    }

    assert_eq!(h.authority.calls.load(Ordering::SeqCst), 0);
    assert_eq!(h.identity.calls.load(Ordering::SeqCst), 0);
    assert_eq!(h.store.reads(), 0);
}

#[tokio::test]
async fn rejected_key_never_touches_registry() {
    let h = harness(
        FakeAuthority::accepting(&["GOOD"]),
        FakeIdentity::at("1.1.1.1"),
        MemoryStore::new(),
    );

    let err = h.validator.validate(&LicenseKey::new("BAD")).await.unwrap_err();

    assert_eq!(err.kind(), ValidationErrorKind::AuthorityRejected);
    assert_eq!(h.store.reads(), 0);
    assert_eq!(h.store.writes(), 0);
    assert_eq!(h.identity.calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn unreachable_authority() {
    let h = harness(
        FakeAuthority {
            unreachable: true,
            ..FakeAuthority::default()
        },
        FakeIdentity::at("1.1.1.1"),
        MemoryStore::new(),
    );

    let err = h.validator.validate(&LicenseKey::new("KEY")).await.unwrap_err();

    assert_eq!(err.kind(), ValidationErrorKind::AuthorityUnreachable);
}

#[tokio::test]
async fn identity_lookup_failure() {
    let h = harness(
        FakeAuthority::accepting(&["KEY"]),
        FakeIdentity::offline(),
        MemoryStore::new(),
    );

    let err = h.validator.validate(&LicenseKey::new("KEY")).await.unwrap_err();

    assert_eq!(err.kind(), ValidationErrorKind::IdentityLookupFailed);
    assert_eq!(h.store.writes(), 0);
}

#[tokio::test]
async fn first_validation_binds_into_absent_document() {
    let h = harness(
        FakeAuthority::accepting(&["KEY"]),
        FakeIdentity::at("203.0.113.7"),
        MemoryStore::new(),
    );

    let validated = h.validator.validate(&LicenseKey::new("KEY")).await.unwrap();

    assert_eq!(validated.binding, Binding::NewlyBound);
    assert_eq!(validated.identity.as_str(), "203.0.113.7");
    assert_eq!(h.store.writes(), 1);
    assert_eq!(
        bound_to(&h.store, "KEY"),
        Some(IdentityFingerprint::new("203.0.113.7"))
    );
}

#[tokio::test]
async fn binding_keeps_other_entries() {
    let h = harness(
        FakeAuthority::accepting(&["KEY"]),
        FakeIdentity::at("203.0.113.7"),
        MemoryStore::with_content(r#"{"OTHER": "198.51.100.1"}"#),
    );

    h.validator.validate(&LicenseKey::new("KEY")).await.unwrap();

    assert_eq!(
        bound_to(&h.store, "OTHER"),
        Some(IdentityFingerprint::new("198.51.100.1"))
    );
    assert!(bound_to(&h.store, "KEY").is_some());
}

#[tokio::test]
async fn second_validation_is_idempotent_and_writes_nothing() {
    let h = harness(
        FakeAuthority::accepting(&["KEY"]),
        FakeIdentity::at("203.0.113.7"),
        MemoryStore::new(),
    );
    let key = LicenseKey::new("KEY");

    let first = h.validator.validate(&key).await.unwrap();
    let writes_after_first = h.store.writes();
    let second = h.validator.validate(&key).await.unwrap();

    assert_eq!(first.binding, Binding::NewlyBound);
    assert_eq!(second.binding, Binding::AlreadyBound);
    assert_eq!(h.store.writes(), writes_after_first);
    assert!(h.validator.outcome(&key).await.valid);
}

#[tokio::test]
async fn different_identity_is_a_mismatch() {
    let h = harness(
        FakeAuthority::accepting(&["KEY"]),
        FakeIdentity::at("203.0.113.7"),
        MemoryStore::new(),
    );
    let key = LicenseKey::new("KEY");
    h.validator.validate(&key).await.unwrap();

    h.identity.move_to("198.51.100.200");
    let err = h.validator.validate(&key).await.unwrap_err();

    assert_eq!(err, ValidationError::IdentityMismatch);
    assert_eq!(
        bound_to(&h.store, "KEY"),
        Some(IdentityFingerprint::new("203.0.113.7"))
    );

    let outcome = h.validator.outcome(&key).await;
    assert!(!outcome.valid);
    assert!(outcome.reason.unwrap().contains("different network identity"));
}

#[tokio::test]
async fn concurrent_writer_causes_conflict_without_lost_update() {
    let h = harness(
        FakeAuthority::accepting(&["KEY"]),
        FakeIdentity::at("203.0.113.7"),
        MemoryStore::with_content("{}"),
    );
    let concurrent = r#"{"RIVAL": "192.0.2.55"}"#;
    h.store.interleave_write(concurrent);

    let err = h.validator.validate(&LicenseKey::new("KEY")).await.unwrap_err();

    assert_eq!(err.kind(), ValidationErrorKind::RegistryConflict);
    assert_eq!(h.store.content().unwrap(), concurrent);
}

#[tokio::test]
async fn validate_retrying_recovers_from_conflict() {
    let h = harness(
        FakeAuthority::accepting(&["KEY"]),
        FakeIdentity::at("203.0.113.7"),
        MemoryStore::with_content("{}"),
    );
    h.store.interleave_write(r#"{"RIVAL": "192.0.2.55"}"#);

    let validated = h
        .validator
        .validate_retrying(&LicenseKey::new("KEY"), 2)
        .await
        .unwrap();

    assert_eq!(validated.binding, Binding::NewlyBound);
    assert!(bound_to(&h.store, "RIVAL").is_some());
    assert!(bound_to(&h.store, "KEY").is_some());
    assert_eq!(h.authority.calls.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn validate_retrying_does_not_retry_other_failures() {
    let h = harness(
        FakeAuthority::accepting(&[]),
        FakeIdentity::at("203.0.113.7"),
        MemoryStore::new(),
    );

    let err = h
        .validator
        .validate_retrying(&LicenseKey::new("KEY"), 5)
        .await
        .unwrap_err();

    assert_eq!(err, ValidationError::AuthorityRejected);
    assert_eq!(h.authority.calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn malformed_registry_is_not_overwritten() {
    let h = harness(
        FakeAuthority::accepting(&["KEY"]),
        FakeIdentity::at("203.0.113.7"),
        MemoryStore::with_content("not json"),
    );

    let err = h.validator.validate(&LicenseKey::new("KEY")).await.unwrap_err();

    assert_eq!(err.kind(), ValidationErrorKind::ResponseMalformed);
    assert_eq!(h.store.content().unwrap(), "not json");
    assert_eq!(h.store.writes(), 0);
}

#[tokio::test]
async fn without_registry_only_authority_and_identity_are_checked() {
    let validator = RemoteKeyValidator::new(
        Arc::new(FakeAuthority::accepting(&["KEY"])),
        Arc::new(FakeIdentity::at("203.0.113.7")),
    );

    let validated = validator.validate(&LicenseKey::new("KEY")).await.unwrap();

    assert_eq!(validated.binding, Binding::Unchecked);
}
