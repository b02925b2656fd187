//! Desktop client for queueing yt-dlp downloads and following their progress

// egui front end
mod app;
// Gateway implementation backed by a local yt-dlp
mod backend;
// yt-dlp process spawning logic
mod downloader;
// Backend lifecycle events and their decoding
mod events;
// yt-dlp metadata to client records
mod formats;
// Request/response surface of the backend
mod gateway;
// Cached download history
mod history;
// Data models for tasks, history and settings
mod model;
// Progress line parsing
mod progress;
// Live task registry
mod registry;
// Which screen is visible
mod router;
// Application state and user flows
mod session;
// JSON settings and history files
mod store;
// Event channel consumer
mod sync;
// Thumbnail fetching
mod thumbnail;

use std::{future::Future, sync::Arc};

use eframe::egui;
use once_cell::sync::OnceCell;
use tokio::runtime::Runtime;

use app::YtdApp;
use backend::LocalBackend;
use gateway::BackendGateway;
use store::Store;

// Global Tokio runtime stored in a OnceCell for lazy init
static RUNTIME: OnceCell<Arc<Runtime>> = OnceCell::new();

/// Runs a future on the shared runtime.
pub fn spawn<F>(fut: F)
where
    F: Future<Output = ()> + Send + 'static,
{
    match RUNTIME.get() {
        Some(rt) => {
            rt.spawn(fut);
        }
        None => log::error!("runtime not initialized; dropping background work"),
    }
}

/// Runs blocking work (HTTP fetches, image decoding) off the UI thread.
pub fn spawn_blocking<F>(work: F)
where
    F: FnOnce() + Send + 'static,
{
    match RUNTIME.get() {
        Some(rt) => {
            rt.spawn_blocking(work);
        }
        None => log::error!("runtime not initialized; dropping background work"),
    }
}

/// Program entry point: initializes logging and the runtime, then launches the GUI
fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let rt = Arc::new(Runtime::new()?);
    RUNTIME
        .set(rt)
        .map_err(|_| "runtime initialized twice")?;

    let store_dir = store::default_dir();
    log::info!("using data directory {}", store_dir.display());
    let backend: Arc<dyn BackendGateway> = Arc::new(LocalBackend::new(Store::open(store_dir)?));

    let options = eframe::NativeOptions {
        viewport: egui::ViewportBuilder::default()
            .with_inner_size([1100.0, 720.0])
            .with_min_inner_size([720.0, 480.0]),
        ..Default::default()
    };
    eframe::run_native(
        "YTD Downloader",
        options,
        Box::new(move |cc| Box::new(YtdApp::new(cc, backend))),
    )?;
    Ok(())
}
