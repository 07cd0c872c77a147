//! Courier API Client - Main Entry Point
//!
//! Sends one request through the full pipeline against the saved state
//! (environments, cookies, history) and writes the state back.

mod cli;
mod config;

use std::sync::Arc;

use clap::Parser;
use courier_application::{PipelineConfig, PipelineOutcome, RequestPipeline, StateRepository, Store};
use courier_domain::{Script, TabId};
use courier_infrastructure::{FileStateRepository, IsolateSandbox, ReqwestTransport, SystemClock};
use tracing::{info, warn};
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

use crate::cli::Cli;
use crate::config::AppConfig;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();
    let config = AppConfig::from_env()?;

    let repository = match &config.state_path {
        Some(path) => FileStateRepository::new(path),
        None => FileStateRepository::in_config_dir()?,
    };
    info!(
        path = %repository.path().display(),
        "Starting Courier v{}",
        env!("CARGO_PKG_VERSION")
    );

    let store = Store::from_persisted(repository.load().await?);
    let tab = open_tab(&store, &cli).await?;

    let transport = ReqwestTransport::builder()
        .timeout(config.request_timeout)
        .build()?;
    let pipeline = RequestPipeline::new(
        Arc::new(transport),
        Arc::new(IsolateSandbox::new()),
        Arc::new(SystemClock::new()),
    )
    .with_config(PipelineConfig {
        script_timeout: config.script_timeout,
    });

    let result = pipeline.send(&store, tab).await;
    print_scripts(&store, tab);
    repository.save(&store.persisted()).await?;

    match result {
        Ok(outcome) => {
            print_outcome(&outcome);
            Ok(())
        }
        Err(err) => {
            let kind = err.kind();
            eprintln!("{}: {err}", kind.title());
            for suggestion in kind.suggestions() {
                eprintln!("  - {suggestion}");
            }
            Err(err.into())
        }
    }
}

/// Adds a tab for the arguments and points it at the chosen environment.
async fn open_tab(store: &Store, cli: &Cli) -> Result<TabId, Box<dyn std::error::Error>> {
    let mut request = cli.to_request()?;
    if let Some(path) = &cli.pre_request_script {
        request.pre_request_script = Some(Script::Source(tokio::fs::read_to_string(path).await?));
    }
    if let Some(path) = &cli.test_script {
        request.test_script = Some(Script::Source(tokio::fs::read_to_string(path).await?));
    }

    let tab = store.add_tab(request);
    if let Some(name) = &cli.environment {
        let environment = store
            .environments()
            .into_iter()
            .find(|env| &env.name == name)
            .ok_or_else(|| format!("no saved environment named '{name}'"))?;
        store.set_tab_environment(tab, Some(environment.id))?;
    }
    Ok(tab)
}

fn print_scripts(store: &Store, tab: TabId) {
    let Some(tab) = store.tab(tab) else {
        return;
    };
    for line in &tab.script_logs {
        println!("[log] {line}");
    }
    for error in &tab.script_errors {
        warn!(%error, "script error");
        println!("[error] {error}");
    }
}

fn print_outcome(outcome: &PipelineOutcome) {
    let response = &outcome.response;
    println!("{} {}", outcome.request.method, outcome.url);
    println!(
        "{} {} ({} ms, {} bytes)",
        response.status, response.status_text, response.elapsed_ms, response.size_bytes
    );
    for (name, value) in &response.headers {
        println!("{name}: {value}");
    }
    println!();
    println!("{}", response.body.to_text());

    if !outcome.test_results.is_empty() {
        println!();
        for result in &outcome.test_results {
            match &result.message {
                None => println!("PASS {}", result.name),
                Some(message) => println!("FAIL {}: {message}", result.name),
            }
        }
    }
}
