//! Smoke harness for the passthrough service worker.
//!
//! Registers the worker for the origin of each URL, opens a page there and
//! sends the URL through the worker as a navigation. One JSON line is printed
//! per URL.
//!
//! ## Usage
//!
//! ```bash
//! sw-smoke https://example.com/ https://example.com/missing
//! sw-smoke --config relay.json --format json https://example.com/
//! sw-smoke --verbose https://example.com/app/
//! ```

use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use relay_common::{init_logging, HostConfig, LogConfig, LogFormat, RelayError, RelayResult};
use relay_net::{Fetch, LoaderConfig, Request, ResourceLoader};
use relay_sw::{PassthroughWorker, RegistrationOptions, ServiceWorkerContainer};
use serde_json::json;
use std::collections::HashSet;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{debug, info};
use url::Url;

#[derive(Parser)]
#[command(name = "sw-smoke")]
#[command(about = "Forward URLs through the passthrough service worker")]
struct Cli {
    /// Host config file (JSON)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Registration scope, relative to each origin
    #[arg(short, long, default_value = "/")]
    scope: String,

    /// Debug logging with source locations, overriding the config file
    #[arg(short, long)]
    verbose: bool,

    /// Log format, overriding the config file
    #[arg(short, long, value_enum)]
    format: Option<Format>,

    /// URLs to fetch
    #[arg(required = true)]
    urls: Vec<String>,
}

#[derive(Clone, Copy, ValueEnum)]
enum Format {
    Pretty,
    Compact,
    Json,
}

impl From<Format> for LogFormat {
    fn from(format: Format) -> Self {
        match format {
            Format::Pretty => LogFormat::Pretty,
            Format::Compact => LogFormat::Compact,
            Format::Json => LogFormat::Json,
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => HostConfig::load(path)
            .with_context(|| format!("loading config {}", path.display()))?,
        None => HostConfig::default(),
    };

    let mut log_config = if cli.verbose {
        LogConfig::debug()
    } else {
        LogConfig::from_settings(&config.logging)
    };
    if let Some(format) = cli.format {
        log_config = log_config.with_format(format.into());
    }
    init_logging(log_config);

    let loader = ResourceLoader::new(LoaderConfig::from_settings(&config.network))
        .map_err(|e| RelayError::network_with_source("building HTTP client", e))?;
    let fetcher: Arc<dyn Fetch> = Arc::new(loader);
    let (container, mut events) = ServiceWorkerContainer::new(fetcher);

    tokio::spawn(async move {
        while let Some(event) = events.recv().await {
            debug!(?event, "Service worker event");
        }
    });

    // One registration per origin.
    let mut registered = HashSet::new();

    for raw in &cli.urls {
        let url = Url::parse(raw).with_context(|| format!("invalid URL {raw}"))?;
        let origin = url.origin().ascii_serialization();

        if registered.insert(origin.clone()) {
            let scope = register_origin(&container, &origin, &cli.scope).await?;
            info!(scope = %scope, "Passthrough worker registered");
        }

        let client = container.add_client(url.as_str()).await?;
        let result = container
            .handle_fetch(Some(&client.id), Request::get(url.clone()), true)
            .await;

        let line = match result {
            Ok(response) => json!({
                "url": url.as_str(),
                "controlled": client.is_controlled(),
                "status": response.status.as_u16(),
                "content_type": response.content_type.as_ref().map(|m| m.to_string()),
                "bytes": response.body().len(),
            }),
            Err(e) => json!({
                "url": url.as_str(),
                "controlled": client.is_controlled(),
                "error": e.category(),
                "message": e.to_string(),
            }),
        };
        println!("{line}");

        container.remove_client(&client.id).await;
    }

    Ok(())
}

async fn register_origin(
    container: &ServiceWorkerContainer,
    origin: &str,
    scope: &str,
) -> RelayResult<String> {
    let script = format!("{origin}/relay-sw.js");
    let scope = container
        .register(
            &script,
            RegistrationOptions::with_scope(scope),
            Arc::new(PassthroughWorker::new()),
        )
        .await?;
    Ok(scope)
}
