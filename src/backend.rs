//! Gateway implementation that runs yt-dlp locally.

use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};

use async_trait::async_trait;
use log::{error, info, warn};
use tokio::sync::mpsc::unbounded_channel;
use tokio::sync::Semaphore;

use crate::downloader::{dump_json, resolve_filename, spawn_download, ytdlp_binary, DownloadJob};
use crate::events::{EventReceiver, EventSender, RawEvent};
use crate::formats::{normalize_url, playlist_items, video_details};
use crate::gateway::{BackendGateway, GatewayError, GatewayResult};
use crate::model::{
    HistoryEntry, PlaylistItem, VideoDetails, SETTING_DOWNLOAD_PATH, SETTING_MAX_CONCURRENT,
};
use crate::store::Store;

const DEFAULT_MAX_CONCURRENT: usize = 3;
const OUTPUT_TEMPLATE: &str = "%(title)s.%(ext)s";

pub struct LocalBackend {
    store: Arc<Store>,
    events: EventSender,
    receiver: Mutex<Option<EventReceiver>>,
    /// Bounds how many yt-dlp downloads run at once
    slots: Arc<Semaphore>,
}

impl LocalBackend {
    pub fn new(store: Store) -> Self {
        let max = store
            .setting(SETTING_MAX_CONCURRENT)
            .and_then(|v| v.trim().parse::<usize>().ok())
            .filter(|n| *n > 0)
            .unwrap_or(DEFAULT_MAX_CONCURRENT);
        info!("running at most {} downloads at once", max);

        let (events, receiver) = unbounded_channel();
        Self {
            store: Arc::new(store),
            events,
            receiver: Mutex::new(Some(receiver)),
            slots: Arc::new(Semaphore::new(max)),
        }
    }

    fn output_template(&self) -> String {
        match self.store.setting(SETTING_DOWNLOAD_PATH) {
            Some(dir) if !dir.is_empty() => Path::new(&dir).join(OUTPUT_TEMPLATE).display().to_string(),
            _ => OUTPUT_TEMPLATE.to_string(),
        }
    }
}

/// Runs one accepted download to its end and reports the outcome as events.
async fn run_task(
    store: Arc<Store>,
    slots: Arc<Semaphore>,
    events: EventSender,
    job: DownloadJob,
    entry: HistoryEntry,
) {
    let Ok(_permit) = slots.acquire_owned().await else {
        return;
    };

    let result = async {
        let bin = ytdlp_binary()?;
        let file_path = resolve_filename(&bin, &job.output_template, &job.url).await?;
        let _ = events.send(RawEvent::started(&job.id));
        spawn_download(&bin, &job, events.clone()).await?;
        Ok::<_, GatewayError>(file_path)
    }
    .await;

    match result {
        Ok(file_path) => {
            if let Err(e) = store.push_history(HistoryEntry { file_path, ..entry }) {
                error!("could not record history for {}: {}", job.id, e);
            }
            info!("task {} finished", job.id);
            let _ = events.send(RawEvent::complete(&job.id));
        }
        Err(e) => {
            warn!("task {} failed: {}", job.id, e);
            let _ = events.send(RawEvent::error(&job.id));
        }
    }
}

#[async_trait]
impl BackendGateway for LocalBackend {
    fn subscribe(&self) -> Option<EventReceiver> {
        self.receiver
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
    }

    async fn get_setting(&self, key: &str) -> GatewayResult<Option<String>> {
        Ok(self.store.setting(key))
    }

    async fn save_setting(&self, key: &str, value: &str) -> GatewayResult<()> {
        self.store.save_setting(key, value)
    }

    async fn get_video_details(&self, url: &str) -> GatewayResult<VideoDetails> {
        let url = normalize_url(url);
        let bin = ytdlp_binary()?;
        let raw = dump_json(&bin, &["--dump-json", "--flat-playlist", url.as_str()]).await?;
        Ok(video_details(&raw))
    }

    async fn get_playlist_details(&self, url: &str) -> GatewayResult<Vec<PlaylistItem>> {
        let bin = ytdlp_binary()?;
        let raw = dump_json(&bin, &["--flat-playlist", "--dump-single-json", url.trim()]).await?;
        Ok(playlist_items(&raw))
    }

    async fn start_download_task(
        &self,
        id: &str,
        url: &str,
        format_id: &str,
        title: &str,
        thumbnail: &str,
    ) -> GatewayResult<()> {
        let job = DownloadJob {
            id: id.to_string(),
            url: url.to_string(),
            format_id: format_id.to_string(),
            output_template: self.output_template(),
        };
        let entry = HistoryEntry {
            id: id.to_string(),
            title: title.to_string(),
            thumbnail: thumbnail.to_string(),
            file_path: String::new(),
        };
        tokio::spawn(run_task(
            self.store.clone(),
            self.slots.clone(),
            self.events.clone(),
            job,
            entry,
        ));
        Ok(())
    }

    async fn get_history(&self) -> GatewayResult<Vec<HistoryEntry>> {
        Ok(self.store.history())
    }

    async fn delete_history(&self, id: &str, delete_file: bool) -> GatewayResult<()> {
        if delete_file {
            if let Some(entry) = self.store.history_entry(id) {
                if !entry.file_path.is_empty() {
                    match tokio::fs::remove_file(&entry.file_path).await {
                        Ok(()) => info!("deleted {}", entry.file_path),
                        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                        Err(e) => warn!("could not delete {}: {}", entry.file_path, e),
                    }
                }
            }
        }
        self.store.remove_history(id)?;
        Ok(())
    }

    async fn open_file(&self, path: &str) -> GatewayResult<()> {
        open_with_system(path, false).await
    }

    async fn open_folder(&self, path: &str) -> GatewayResult<()> {
        open_with_system(path, true).await
    }

    async fn select_directory(&self) -> GatewayResult<Option<String>> {
        let current = self.store.setting(SETTING_DOWNLOAD_PATH).unwrap_or_default();
        // the async dialog hands the native call to the platform's UI thread
        let mut dialog = rfd::AsyncFileDialog::new();
        if !current.is_empty() {
            dialog = dialog.set_directory(&current);
        }
        let picked = dialog.pick_folder().await;
        self.remember_directory(picked.as_ref().map(|handle| handle.path()))
    }
}

impl LocalBackend {
    /// Persists a folder picked in the dialog. `None` means the dialog was cancelled.
    fn remember_directory(&self, picked: Option<&Path>) -> GatewayResult<Option<String>> {
        let Some(folder) = picked else {
            return Ok(None);
        };
        let folder = folder.display().to_string();
        self.store.save_setting(SETTING_DOWNLOAD_PATH, &folder)?;
        info!("download folder set to {}", folder);
        Ok(Some(folder))
    }
}

/// Opens `path` with the platform's default handler, or reveals it in the file manager.
async fn open_with_system(path: &str, reveal: bool) -> GatewayResult<()> {
    let mut cmd;
    #[cfg(target_os = "windows")]
    {
        cmd = tokio::process::Command::new(if reveal { "explorer" } else { "cmd" });
        if reveal {
            cmd.arg(format!("/select,{}", path));
        } else {
            cmd.args(["/c", "start", "", path]);
        }
    }
    #[cfg(target_os = "macos")]
    {
        cmd = tokio::process::Command::new("open");
        if reveal {
            cmd.arg("-R");
        }
        cmd.arg(path);
    }
    #[cfg(all(unix, not(target_os = "macos")))]
    {
        cmd = tokio::process::Command::new("xdg-open");
        let target: PathBuf = if reveal {
            Path::new(path).parent().map(Path::to_path_buf).unwrap_or_default()
        } else {
            PathBuf::from(path)
        };
        cmd.arg(target);
    }

    let status = cmd.status().await?;
    if status.success() {
        Ok(())
    } else {
        Err(GatewayError::Execution(format!("opening {} exited with {}", path, status)))
    }
}
