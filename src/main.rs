//! gateway-response CLI.
//!
//! Fetches a path from a configured backend and prints the normalized
//! response: decoded backends as JSON, `no-op` backends as raw bytes.
//!
//! ```text
//! gateway-response -c gateway.toml check
//! gateway-response -c gateway.toml fetch users /users/1
//! gateway-response -c gateway.toml fetch users /users/1 --interval 5
//! ```

use std::path::PathBuf;
use std::time::Duration;

use bytes::Bytes;
use clap::{Parser, Subcommand};
use http::header::USER_AGENT;
use http::HeaderMap;
use http_body_util::Empty;
use hyper_util::{
    client::legacy::{connect::HttpConnector, Client},
    rt::TokioExecutor,
};
use serde_json::{json, Map, Value};
use tokio_util::sync::CancellationToken;

use gateway_response::config::loader::load_config;
use gateway_response::config::watcher::ConfigWatcher;
use gateway_response::config::GatewayConfig;
use gateway_response::observability::logging::init_logging;
use gateway_response::proxy::{Response, SharedRegistry};

type HttpClient = Client<HttpConnector, Empty<Bytes>>;

#[derive(Parser)]
#[command(name = "gateway-response")]
#[command(about = "Fetch and normalize upstream responses", long_about = None)]
struct Cli {
    /// Gateway configuration file (TOML).
    #[arg(short, long, default_value = "gateway.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Validate the configuration and list backends
    Check,
    /// Fetch a path from a backend and print the normalized response
    Fetch {
        backend: String,

        #[arg(default_value = "/")]
        path: String,

        /// Re-fetch every N seconds, reloading the config when it changes
        #[arg(short, long)]
        interval: Option<u64>,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let config = load_config(&cli.config)?;
    init_logging(&config.observability)?;

    tracing::info!(
        path = ?cli.config,
        backends = config.backends.len(),
        "Configuration loaded"
    );

    match cli.command {
        Commands::Check => {
            for backend in &config.backends {
                println!(
                    "{:<20} {:<24} encoding={} headers={}",
                    backend.name,
                    backend.address,
                    backend.encoding.as_str(),
                    backend.response_headers.join(",")
                );
            }
        }
        Commands::Fetch {
            backend,
            path,
            interval,
        } => {
            let cancel = CancellationToken::new();
            tokio::spawn(cancel_on_interrupt(cancel.clone()));

            let registry = SharedRegistry::from_config(&config);
            let client: HttpClient =
                Client::builder(TokioExecutor::new()).build(HttpConnector::new());

            match interval {
                None => fetch_once(&client, &registry, &config, &backend, &path, &cancel).await?,
                Some(secs) => {
                    let (watcher, mut updates) = ConfigWatcher::new(&cli.config);
                    let _watcher = watcher.run()?;

                    let mut current = config;
                    let mut ticker = tokio::time::interval(Duration::from_secs(secs.max(1)));
                    loop {
                        tokio::select! {
                            _ = ticker.tick() => {
                                if let Err(e) = fetch_once(&client, &registry, &current, &backend, &path, &cancel).await {
                                    tracing::error!(error = %e, "Fetch failed");
                                }
                            }
                            Some(updated) = updates.recv() => {
                                registry.reload(&updated);
                                current = updated;
                            }
                            _ = cancel.cancelled() => break,
                        }
                    }
                }
            }
        }
    }

    Ok(())
}

async fn fetch_once(
    client: &HttpClient,
    registry: &SharedRegistry,
    config: &GatewayConfig,
    backend: &str,
    path: &str,
    cancel: &CancellationToken,
) -> Result<(), Box<dyn std::error::Error>> {
    let backend_config = config
        .backend(backend)
        .ok_or_else(|| format!("unknown backend `{}`", backend))?;
    let url = backend_config.base_url()?.join(path)?;

    let request = http::Request::get(url.as_str())
        .header(USER_AGENT, "gateway-response")
        .body(Empty::new())?;

    tracing::debug!(backend = %backend, url = %url, "Fetching upstream");

    let timeout = Duration::from_secs(config.timeouts.request_secs);
    let upstream = tokio::time::timeout(timeout, client.request(request))
        .await
        .map_err(|_| format!("upstream request timed out after {}s", timeout.as_secs()))??;

    let response = registry.load().normalize(backend, cancel, upstream).await?;
    print_response(response).await
}

async fn print_response(mut response: Response) -> Result<(), Box<dyn std::error::Error>> {
    match response.take_stream() {
        Some(stream) => {
            eprintln!("status: {}", response.metadata.status_code);
            let mut reader = stream.into_reader();
            tokio::io::copy(&mut reader, &mut tokio::io::stdout()).await?;
        }
        None => {
            let out = json!({
                "status": response.metadata.status_code.as_u16(),
                "headers": headers_json(&response.metadata.headers),
                "data": Value::Object(response.data),
            });
            println!("{}", serde_json::to_string_pretty(&out)?);
        }
    }
    Ok(())
}

fn headers_json(headers: &HeaderMap) -> Value {
    let mut out = Map::new();
    for (name, value) in headers {
        out.insert(
            name.as_str().to_string(),
            Value::String(String::from_utf8_lossy(value.as_bytes()).into_owned()),
        );
    }
    Value::Object(out)
}

/// Cancel in-flight work on Ctrl+C.
async fn cancel_on_interrupt(cancel: CancellationToken) {
    if tokio::signal::ctrl_c().await.is_ok() {
        tracing::info!("Interrupt received, cancelling");
        cancel.cancel();
    }
}
