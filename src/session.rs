//! Application state and the user-initiated flows that mutate it.
//!
//! The egui thread renders from [`AppState`] while gateway calls run on the
//! tokio runtime, so the state sits behind one mutex. The lock is only taken
//! in short synchronous sections and never held across an `.await`.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use log::{info, warn};

use crate::gateway::BackendGateway;
use crate::history::HistoryCache;
use crate::model::{
    PlaylistItem, Settings, Theme, VideoDetails, SETTING_DOWNLOAD_PATH, SETTING_THEME,
};
use crate::registry::TaskRegistry;
use crate::router::ViewRouter;

/// Title given to tasks queued from the batch text box
pub const BATCH_TITLE: &str = "Batch task";

/// Asks the UI to redraw
pub type Repaint = Arc<dyn Fn() + Send + Sync>;

/// Input of the single-video view
#[derive(Debug, Default)]
pub struct SingleInput {
    pub url: String,
    pub details: Option<VideoDetails>,
    /// Empty selects the backend's automatic best format
    pub selected_format: String,
}

/// Input of the batch/playlist view
#[derive(Debug, Default)]
pub struct BatchInput {
    /// One URL per line
    pub urls: String,
    pub playlist: Vec<PlaylistItem>,
}

#[derive(Debug, Default)]
pub struct AppState {
    pub router: ViewRouter,
    pub tasks: TaskRegistry,
    pub history: HistoryCache,
    pub settings: Settings,
    pub single: SingleInput,
    pub batch: BatchInput,
    /// An analyze request is in flight
    pub analyzing: bool,
}

impl AppState {
    /// Resets every transient input so the pages are ready for the next URL.
    pub fn clear_inputs(&mut self) {
        self.single = SingleInput::default();
        self.batch = BatchInput::default();
    }
}

/// One item to put in the download queue
#[derive(Debug, Clone, PartialEq)]
pub struct DownloadRequest {
    pub url: String,
    pub title: String,
    pub thumbnail: String,
}

impl DownloadRequest {
    pub fn new(url: &str, title: &str, thumbnail: &str) -> Self {
        Self {
            url: url.to_string(),
            title: title.to_string(),
            thumbnail: thumbnail.to_string(),
        }
    }
}

impl From<&PlaylistItem> for DownloadRequest {
    fn from(item: &PlaylistItem) -> Self {
        Self::new(&item.url, &item.title, &item.thumbnail)
    }
}

/// Parses the batch text box: one URL per line, anything not starting with `http` is skipped.
pub fn batch_requests(text: &str) -> Vec<DownloadRequest> {
    text.lines()
        .map(str::trim)
        .filter(|line| line.starts_with("http"))
        .map(|url| DownloadRequest::new(url, BATCH_TITLE, ""))
        .collect()
}

/// Cheap handle shared by the UI, the event synchronizer and spawned flows
#[derive(Clone)]
pub struct Session {
    state: Arc<Mutex<AppState>>,
    gateway: Arc<dyn BackendGateway>,
    repaint: Repaint,
}

impl Session {
    pub fn new(gateway: Arc<dyn BackendGateway>, repaint: Repaint) -> Self {
        Self {
            state: Arc::new(Mutex::new(AppState::default())),
            gateway,
            repaint,
        }
    }

    pub fn state(&self) -> MutexGuard<'_, AppState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn gateway(&self) -> &Arc<dyn BackendGateway> {
        &self.gateway
    }

    pub fn request_repaint(&self) {
        (self.repaint)();
    }

    /// Loads persisted preferences and the initial history snapshot.
    pub async fn load_settings(&self) {
        let theme = match self.gateway.get_setting(SETTING_THEME).await {
            Ok(value) => value.as_deref().and_then(Theme::parse),
            Err(e) => {
                warn!("could not read theme setting: {}", e);
                None
            }
        };
        let path = match self.gateway.get_setting(SETTING_DOWNLOAD_PATH).await {
            Ok(value) => value.filter(|p| !p.is_empty()),
            Err(e) => {
                warn!("could not read download path setting: {}", e);
                None
            }
        };
        {
            let mut state = self.state();
            if let Some(theme) = theme {
                state.settings.theme = theme;
            }
            if let Some(path) = path {
                state.settings.download_path = path;
            }
        }
        self.refresh_history().await;
    }

    /// The single entry point that puts a URL in the download queue.
    ///
    /// Returns the new task id, or `None` when the URL was empty.
    pub async fn start_download(&self, request: DownloadRequest) -> Option<String> {
        let format_id = self.state().single.selected_format.clone();
        self.start_with_format(request, &format_id).await
    }

    /// Queues every request in order, one outstanding start request at a time.
    ///
    /// The format is read per item, so a choice made on the single-video page
    /// only reaches the first item; the clear after it leaves the rest on auto.
    pub async fn start_batch(&self, requests: Vec<DownloadRequest>) -> Vec<String> {
        let mut ids = Vec::with_capacity(requests.len());
        for request in requests {
            if let Some(id) = self.start_download(request).await {
                ids.push(id);
            }
        }
        ids
    }

    /// Queues the analyzed video of the single view with the chosen format.
    pub async fn confirm_single(&self) -> Option<String> {
        let request = {
            let state = self.state();
            let details = state.single.details.as_ref()?;
            DownloadRequest::new(&state.single.url, &details.title, &details.thumbnail)
        };
        self.start_download(request).await
    }

    /// Queues every URL line of the batch text box.
    pub async fn start_batch_text(&self) -> Vec<String> {
        let requests = batch_requests(&self.state().batch.urls);
        self.start_batch(requests).await
    }

    /// Queues every item of the analyzed playlist.
    pub async fn download_playlist(&self) -> Vec<String> {
        let requests: Vec<DownloadRequest> = self
            .state()
            .batch
            .playlist
            .iter()
            .map(DownloadRequest::from)
            .collect();
        self.start_batch(requests).await
    }

    async fn start_with_format(&self, request: DownloadRequest, format_id: &str) -> Option<String> {
        let url = request.url.trim();
        if url.is_empty() {
            return None;
        }

        let id = self
            .state()
            .tasks
            .create_task(url, &request.title, &request.thumbnail);
        self.request_repaint();

        match self
            .gateway
            .start_download_task(&id, url, format_id, &request.title, &request.thumbnail)
            .await
        {
            Ok(()) => info!("queued task {} for {}", id, url),
            // Nothing retries this; the task stays Waiting until the backend says otherwise.
            Err(e) => warn!("start request for task {} failed: {}", id, e),
        }

        {
            let mut state = self.state();
            state.clear_inputs();
            state.router.force_downloading();
        }
        self.request_repaint();
        Some(id)
    }

    /// Analyzes the URL typed in the single view.
    pub async fn analyze_video(&self) {
        let url = {
            let mut state = self.state();
            let url = state.single.url.trim().to_string();
            if url.is_empty() || state.analyzing {
                return;
            }
            state.analyzing = true;
            url
        };
        self.request_repaint();

        let result = self.gateway.get_video_details(&url).await;
        {
            let mut state = self.state();
            state.analyzing = false;
            match result {
                Ok(details) => {
                    state.single.details = Some(details);
                    state.single.selected_format.clear();
                }
                Err(e) => {
                    warn!("analysis of {} failed: {}", url, e);
                    state.single.details = None;
                }
            }
        }
        self.request_repaint();
    }

    /// Resolves the batch text box as a playlist URL.
    pub async fn analyze_playlist(&self) {
        let url = {
            let mut state = self.state();
            let url = state.batch.urls.trim().to_string();
            if url.is_empty() || state.analyzing {
                return;
            }
            state.analyzing = true;
            url
        };
        self.request_repaint();

        let result = self.gateway.get_playlist_details(&url).await;
        {
            let mut state = self.state();
            state.analyzing = false;
            match result {
                Ok(items) => state.batch.playlist = items,
                Err(e) => {
                    warn!("playlist analysis of {} failed: {}", url, e);
                    state.batch.playlist.clear();
                }
            }
        }
        self.request_repaint();
    }

    /// Replaces the cached history with the backend's current list.
    pub async fn refresh_history(&self) {
        match self.gateway.get_history().await {
            Ok(entries) => {
                self.state().history.replace(entries);
                self.request_repaint();
            }
            Err(e) => warn!("could not load history: {}", e),
        }
    }

    /// Deletes a history entry, optionally with its file, then refreshes.
    pub async fn delete_history(&self, id: &str, also_delete_file: bool) {
        if let Err(e) = self.gateway.delete_history(id, also_delete_file).await {
            warn!("could not delete history entry {}: {}", id, e);
        }
        self.refresh_history().await;
    }

    pub async fn toggle_theme(&self) {
        let theme = {
            let mut state = self.state();
            state.settings.theme = state.settings.theme.toggled();
            state.settings.theme
        };
        self.request_repaint();
        if let Err(e) = self.gateway.save_setting(SETTING_THEME, theme.as_str()).await {
            warn!("could not save theme: {}", e);
        }
    }

    /// Shows the directory picker. The backend persists the chosen path.
    pub async fn choose_directory(&self) {
        match self.gateway.select_directory().await {
            Ok(Some(path)) => {
                self.state().settings.download_path = path;
                self.request_repaint();
            }
            Ok(None) => {}
            Err(e) => warn!("directory selection failed: {}", e),
        }
    }

    pub async fn open_file(&self, path: &str) {
        if let Err(e) = self.gateway.open_file(path).await {
            warn!("could not open {}: {}", path, e);
        }
    }

    pub async fn open_folder(&self, path: &str) {
        if let Err(e) = self.gateway.open_folder(path).await {
            warn!("could not reveal {}: {}", path, e);
        }
    }
}
