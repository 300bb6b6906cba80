//! The provisioning state machine.
//!
//! ```text
//! Idle --start--> Validating --> Downloading --> Extracting --> Persisting --> Succeeded
//!                      \              \              \              \
//!                       `--------------`--------------`--------------`--> Failed
//! Succeeded | Failed --start--> Validating
//! ```
//!
//! One run at a time executes on a spawned worker. Callers poll
//! [`ProvisioningPipeline::status`]; nothing blocks them and a run cannot be cancelled.

use std::fmt;
use std::path::Path;
use std::sync::{Arc, Mutex};

use chrono::Utc;
use keygate_archive::{ExtractOptions, ExtractProgress, ExtractReport};
use keygate_fetch::{Fetcher, HttpClient, Progress};
use keygate_license::{LicenseKey, RemoteKeyValidator};
use tokio::runtime::Handle;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::config::PipelineSettings;
use crate::error::{ProvisionError, StartError};
use crate::job::{JobCell, JobState, JobStatus};
use crate::launcher::{Launcher, ProcessLauncher};

type Observer = Arc<dyn Fn(JobState) + Send + Sync>;

pub struct ProvisioningPipeline<C: HttpClient> {
    inner: Arc<Inner<C>>,
    worker: Mutex<Option<JoinHandle<()>>>,
    runtime: Handle,
}

struct Inner<C: HttpClient> {
    validator: RemoteKeyValidator,
    fetcher: Fetcher<C>,
    settings: PipelineSettings,
    launcher: Arc<dyn Launcher>,
    observer: Option<Observer>,
    job: Arc<JobCell>,
}

pub struct PipelineBuilder<C: HttpClient> {
    validator: RemoteKeyValidator,
    fetcher: Fetcher<C>,
    settings: PipelineSettings,
    launcher: Arc<dyn Launcher>,
    observer: Option<Observer>,
}

impl<C: HttpClient> PipelineBuilder<C> {
    pub fn launcher(mut self, launcher: Arc<dyn Launcher>) -> Self {
        self.launcher = launcher;
        self
    }

    /// Called on every state transition, from the worker.
    pub fn observer(mut self, observer: Arc<dyn Fn(JobState) + Send + Sync>) -> Self {
        self.observer = Some(observer);
        self
    }

    /// Runs will be spawned on `runtime`.
    pub fn build(self, runtime: Handle) -> ProvisioningPipeline<C> {
        ProvisioningPipeline {
            inner: Arc::new(Inner {
                validator: self.validator,
                fetcher: self.fetcher,
                settings: self.settings,
                launcher: self.launcher,
                observer: self.observer,
                job: Arc::new(JobCell::default()),
            }),
            worker: Mutex::new(None),
            runtime,
        }
    }
}

impl<C: HttpClient> fmt::Debug for ProvisioningPipeline<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProvisioningPipeline")
            .field("status", &self.inner.job.snapshot())
            .field("settings", &self.inner.settings)
            .finish_non_exhaustive()
    }
}

impl<C: HttpClient + 'static> ProvisioningPipeline<C> {
    pub fn builder(
        validator: RemoteKeyValidator,
        fetcher: Fetcher<C>,
        settings: PipelineSettings,
    ) -> PipelineBuilder<C> {
        PipelineBuilder {
            validator,
            fetcher,
            settings,
            launcher: Arc::new(ProcessLauncher),
            observer: None,
        }
    }

    /// Begin a run for `key`. Fails with [`StartError::Busy`] while a run is active; the
    /// active run is not affected.
    pub fn start(&self, key: LicenseKey) -> Result<(), StartError> {
        let mut worker = self
            .worker
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        self.inner.job.try_begin()?;
        self.inner.notify(JobState::Validating);
        info!(key = %key, "provisioning started");

        let inner = Arc::clone(&self.inner);
        *worker = Some(self.runtime.spawn(async move { inner.run(key).await }));
        Ok(())
    }

    pub fn status(&self) -> JobStatus {
        let status = self.inner.job.snapshot();
        if status.state.is_active() && self.worker_exited() {
            return self.worker_lost(status.state);
        }
        status
    }

    pub fn is_finished(&self) -> bool {
        self.status().state.is_terminal()
    }

    /// Startup check: if an entitlement record exists, re-validate its key and launch the
    /// provisioned artifact.
    ///
    /// A key that no longer validates has its record deleted. Returns `true` only when the
    /// key validated and the artifact (if one is configured) was launched.
    pub async fn resume_if_entitled(&self) -> bool {
        self.inner.resume().await
    }

    pub fn settings(&self) -> &PipelineSettings {
        &self.inner.settings
    }

    /// The worker is gone while the job looked `observed`. A worker that finished
    /// normally has already left `observed`, and its result stands.
    fn worker_lost(&self, observed: JobState) -> JobStatus {
        let error = ProvisionError::Worker("run ended without a result".into());
        if self.inner.job.fail_if(observed, &error) {
            warn!(state = %observed, "provisioning worker exited without a result");
            self.inner.notify(JobState::Failed);
        }
        self.inner.job.snapshot()
    }

    fn worker_exited(&self) -> bool {
        self.worker
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .as_ref()
            .is_some_and(JoinHandle::is_finished)
    }
}

impl<C: HttpClient + 'static> Inner<C> {
    async fn run(&self, key: LicenseKey) {
        match self.stages(&key).await {
            Ok(()) => {
                self.job.succeed();
                self.notify(JobState::Succeeded);
                info!(key = %key, "provisioning succeeded");
            }
            Err(e) => {
                warn!(key = %key, error = %e, "provisioning failed");
                self.job.fail(&e);
                self.notify(JobState::Failed);
            }
        }
    }

    async fn stages(&self, key: &LicenseKey) -> Result<(), ProvisionError> {
        let validated = self
            .validator
            .validate_retrying(key, self.settings.conflict_retries)
            .await?;
        debug!(identity = %validated.identity, binding = ?validated.binding, "key validated");

        self.enter(JobState::Downloading);
        let archive = self.settings.layout.archive_path(Utc::now());
        let job = Arc::clone(&self.job);
        let options = self
            .settings
            .fetch
            .clone()
            .on_progress(Arc::new(move |p: &Progress| {
                if let Some(fraction) = p.fraction() {
                    job.set_progress(fraction);
                }
            }));
        self.fetcher
            .fetch_with_fallback(
                &self.settings.primary_url,
                &self.settings.backup_url,
                &archive,
                &options,
            )
            .await?;

        self.enter(JobState::Extracting);
        let extracted = self.extract(&archive).await;
        remove_archive(&archive);
        let report = extracted?;
        if !report.is_complete() {
            warn!(skipped = report.skipped.len(), "some archive entries were not extracted");
        }

        self.enter(JobState::Persisting);
        self.settings
            .entitlement
            .store(key)
            .map_err(|source| ProvisionError::Persist {
                path: self.settings.entitlement.path().to_path_buf(),
                source,
            })?;
        Ok(())
    }

    async fn extract(&self, archive: &Path) -> Result<ExtractReport, ProvisionError> {
        let job = Arc::clone(&self.job);
        let options = ExtractOptions::default().on_progress(Arc::new(
            move |p: &ExtractProgress| job.set_progress(p.fraction()),
        ));
        let archive = archive.to_path_buf();
        let destination = self.settings.layout.root().to_path_buf();

        let report = tokio::task::spawn_blocking(move || {
            keygate_archive::extract_with(&archive, &destination, &options)
        })
        .await
        .map_err(|e| ProvisionError::Worker(format!("extraction task failed: {e}")))??;
        Ok(report)
    }

    async fn resume(&self) -> bool {
        let entitlement = &self.settings.entitlement;
        let key = match entitlement.load() {
            Ok(Some(key)) => key,
            Ok(None) => {
                debug!(path = %entitlement.path().display(), "no entitlement record");
                return false;
            }
            Err(e) => {
                warn!(error = %e, "failed to read entitlement record");
                return false;
            }
        };

        if let Err(e) = self
            .validator
            .validate_retrying(&key, self.settings.conflict_retries)
            .await
        {
            info!(key = %key, error = %e, "stored key no longer valid, removing entitlement record");
            if let Err(e) = entitlement.remove() {
                warn!(error = %e, "failed to remove stale entitlement record");
            }
            return false;
        }

        let Some(artifact) = self.settings.layout.launch_path() else {
            info!(key = %key, "already provisioned");
            return true;
        };
        if !artifact.is_file() {
            warn!(artifact = %artifact.display(), "entitled but the launch artifact is missing");
            return false;
        }
        match self.launcher.launch(&artifact) {
            Ok(()) => {
                info!(key = %key, "already provisioned");
                true
            }
            Err(e) => {
                warn!(artifact = %artifact.display(), error = %e, "failed to launch");
                false
            }
        }
    }

    fn enter(&self, state: JobState) {
        self.job.enter(state);
        self.notify(state);
    }

    fn notify(&self, state: JobState) {
        debug!(state = %state, "job state changed");
        if let Some(observer) = &self.observer {
            observer(state);
        }
    }
}

fn remove_archive(archive: &Path) {
    if let Err(e) = keygate_fs::remove_if_exists(archive) {
        warn!(archive = %archive.display(), error = %e, "failed to remove downloaded archive");
    }
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;

    use async_trait::async_trait;
    use keygate_fetch::{FetchOptions, HttpResponse};
    use keygate_license::{
        AuthorityError, IdentityError, IdentityFingerprint, IdentityResolver, TokenAuthority,
    };

    use super::*;
    use crate::entitlement::EntitlementRecord;
    use crate::error::ProvisionErrorKind;
    use crate::layout::AssetLayout;

    struct Offline;

    impl HttpClient for Offline {
        type Error = std::io::Error;

        async fn stream(
            &self,
            url: &str,
            _headers: &[(String, String)],
        ) -> Result<HttpResponse<std::io::Error>, std::io::Error> {
            Err(std::io::Error::other(format!("offline: {url}")))
        }
    }

    struct Accepting;

    #[async_trait]
    impl TokenAuthority for Accepting {
        async fn is_valid(&self, _key: &LicenseKey) -> Result<bool, AuthorityError> {
            Ok(true)
        }
    }

    #[async_trait]
    impl IdentityResolver for Accepting {
        async fn resolve(&self) -> Result<IdentityFingerprint, IdentityError> {
            Ok(IdentityFingerprint::new("198.51.100.1"))
        }
    }

    fn pipeline() -> ProvisioningPipeline<Offline> {
        let validator = RemoteKeyValidator::new(Arc::new(Accepting), Arc::new(Accepting));
        let settings = PipelineSettings {
            primary_url: "https://primary.test/bundle.zip".into(),
            backup_url: "https://backup.test/bundle.zip".into(),
            layout: AssetLayout::new(PathBuf::from("unused")),
            entitlement: EntitlementRecord::new(PathBuf::from("unused/key.txt")),
            fetch: FetchOptions::default(),
            conflict_retries: 0,
        };
        ProvisioningPipeline::builder(validator, Fetcher::new(Offline), settings)
            .build(Handle::current())
    }

    async fn install_finished_worker(pipeline: &ProvisioningPipeline<Offline>) {
        let handle = tokio::spawn(async {});
        while !handle.is_finished() {
            tokio::task::yield_now().await;
        }
        *pipeline.worker.lock().unwrap() = Some(handle);
    }

    #[tokio::test]
    async fn test_success_after_observation_is_kept() {
        let pipeline = pipeline();
        let job = &pipeline.inner.job;
        job.try_begin().unwrap();
        job.enter(JobState::Persisting);

        // A poller reads Persisting, then the worker succeeds and exits before the poller
        // checks the handle.
        let observed = pipeline.inner.job.snapshot().state;
        job.succeed();
        install_finished_worker(&pipeline).await;

        let status = pipeline.worker_lost(observed);
        assert_eq!(status.state, JobState::Succeeded);
        assert_eq!(status.error_message, None);
        assert_eq!(pipeline.status().state, JobState::Succeeded);
    }

    #[tokio::test]
    async fn test_vanished_worker_fails_the_job() {
        let pipeline = pipeline();
        let job = &pipeline.inner.job;
        job.try_begin().unwrap();
        job.enter(JobState::Extracting);
        install_finished_worker(&pipeline).await;

        let status = pipeline.status();
        assert_eq!(status.state, JobState::Failed);
        assert_eq!(status.error_kind, Some(ProvisionErrorKind::Worker));
        assert!(pipeline.is_finished());
    }
}
