//! keygate - activate a license key and provision the licensed bundle.

use std::process::ExitCode;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use keygate_fetch::{Fetcher, ReqwestClient};
use keygate_license::LicenseKey;
use keygate_provision::{JobState, ProvisionConfig, ProvisioningPipeline};
use tokio::runtime::{Handle, Runtime};
use tracing::{debug, error};
use tracing_subscriber::EnvFilter;

mod cli;
mod config;
mod progress;

use cli::{App, Commands};
use progress::JobProgress;

const LOG_ENV: &str = "KEYGATE_LOG";
const POLL_INTERVAL: Duration = Duration::from_millis(100);

fn main() -> ExitCode {
    init_tracing();
    let app = App::parse();
    match run(app) {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::FAILURE,
        Err(e) => {
            error!(error = %format!("{e:#}"), "keygate failed");
            eprintln!("error: {e:#}");
            ExitCode::FAILURE
        }
    }
}

fn init_tracing() {
    let filter = EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn runtime() -> Result<Runtime> {
    tokio::runtime::Builder::new_multi_thread()
        .worker_threads(4)
        .enable_all()
        .build()
        .context("failed to start the async runtime")
}

fn run(app: App) -> Result<bool> {
    let config = config::load(&app.config)
        .with_context(|| format!("failed to load configuration from '{}'", app.config.display()))?;
    debug!(path = %app.config.display(), "configuration loaded");
    let rt = runtime()?;

    match app.cmd {
        Commands::Activate { key, force } => {
            let pipeline = pipeline(&config, rt.handle().clone())?;
            rt.block_on(activate(&pipeline, LicenseKey::new(key), force))
        }
        Commands::Resume => {
            let pipeline = pipeline(&config, rt.handle().clone())?;
            let resumed = rt.block_on(pipeline.resume_if_entitled());
            if !resumed {
                println!("Not provisioned on this machine. Run `keygate activate <KEY>`.");
            }
            Ok(resumed)
        }
        Commands::Check { key } => {
            let validator = config.build_validator()?;
            let outcome = rt.block_on(validator.outcome(&LicenseKey::new(key)));
            match &outcome.reason {
                None => println!("License key is valid."),
                Some(reason) => println!("License key is not valid: {reason}"),
            }
            Ok(outcome.valid)
        }
    }
}

fn pipeline(config: &ProvisionConfig, runtime: Handle) -> Result<ProvisioningPipeline<ReqwestClient>> {
    let settings = config.pipeline_settings()?;
    let client = ReqwestClient::new(settings.fetch.timeouts.connect)
        .context("failed to build the HTTP client")?;
    let validator = config.build_validator()?;
    Ok(ProvisioningPipeline::builder(validator, Fetcher::new(client), settings).build(runtime))
}

async fn activate(
    pipeline: &ProvisioningPipeline<ReqwestClient>,
    key: LicenseKey,
    force: bool,
) -> Result<bool> {
    if !force && pipeline.resume_if_entitled().await {
        println!("Already provisioned.");
        return Ok(true);
    }

    pipeline.start(key)?;
    let bar = JobProgress::new();
    let status = loop {
        let status = pipeline.status();
        if status.state.is_terminal() {
            break status;
        }
        bar.update(&status);
        tokio::time::sleep(POLL_INTERVAL).await;
    };
    bar.finish(&status);

    match (status.state, &status.error_message) {
        (JobState::Succeeded, _) => {
            println!(
                "Provisioned into {}",
                pipeline.settings().layout.root().display()
            );
            Ok(true)
        }
        (_, Some(message)) => {
            eprintln!("Provisioning failed: {message}");
            Ok(false)
        }
        (_, None) => {
            eprintln!("Provisioning failed.");
            Ok(false)
        }
    }
}
