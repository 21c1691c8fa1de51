use std::fs::OpenOptions;
use std::path::Path;
use std::sync::{Arc, Mutex};

use reqwest::{redirect, ClientBuilder};
use tracing::info;
use tracing_subscriber::EnvFilter;
use watcher_core::{
    spawn_watcher, ChromeFetcher, ConfigSource, EnvSource, FetcherKind, HttpFetcher, Notifier,
    PageFetcher, PushoverNotifier, RunState, Watcher, WatcherConfig,
};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let source: Arc<dyn ConfigSource> = Arc::new(EnvSource);
    let config = match WatcherConfig::load(source.as_ref()) {
        Ok(config) => config,
        Err(err) => {
            eprintln!("uhrforum-watcher: {}", err);
            return Err(err.into());
        }
    };
    init_tracing(&config.log_file)?;

    let client = ClientBuilder::new()
        .redirect(redirect::Policy::limited(5))
        .user_agent("uhrforum-watcher/0.1")
        .build()?;
    let notifier: Arc<dyn Notifier> = Arc::new(PushoverNotifier::new(client, &config.pushover));
    let fetcher = build_fetcher(&config)?;
    info!(url = %config.fetch.url, fetcher = ?config.fetch.kind, "starting watcher");

    let watcher = Watcher::new(
        fetcher,
        notifier,
        config.fetch.url.clone(),
        config.category.clone(),
    )
    .with_headers(config.fetch.headers.clone())
    .with_state(RunState::new(config.seen_capacity));
    watcher.announce_start().await;

    let handle = spawn_watcher(watcher, source);
    shutdown_signal().await;
    let watcher = handle.stop().await?;
    info!(
        cycles = watcher.state().cycles,
        seen = watcher.state().seen.len(),
        "watcher stopped"
    );
    Ok(())
}

fn init_tracing(log_file: &Path) -> std::io::Result<()> {
    let file = OpenOptions::new().create(true).append(true).open(log_file)?;
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_ansi(false)
        .with_writer(Mutex::new(file))
        .try_init();
    Ok(())
}

fn build_fetcher(config: &WatcherConfig) -> watcher_core::error::Result<Arc<dyn PageFetcher>> {
    let fetch = &config.fetch;
    let fetcher: Arc<dyn PageFetcher> = match fetch.kind {
        FetcherKind::Chrome => Arc::new(ChromeFetcher::new(&fetch.chrome_bin, fetch.timeout)),
        FetcherKind::Http => Arc::new(HttpFetcher::new(fetch.timeout)?),
    };
    Ok(fetcher)
}

async fn shutdown_signal() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};
        match signal(SignalKind::terminate()) {
            Ok(mut terminate) => {
                tokio::select! {
                    _ = tokio::signal::ctrl_c() => {}
                    _ = terminate.recv() => {}
                }
            }
            Err(_) => {
                let _ = tokio::signal::ctrl_c().await;
            }
        }
    }
    #[cfg(not(unix))]
    {
        let _ = tokio::signal::ctrl_c().await;
    }
}
