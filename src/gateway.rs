// Backend gateway trait definition

use std::fmt;

use async_trait::async_trait;

use crate::events::EventReceiver;
use crate::model::{HistoryEntry, PlaylistItem, VideoDetails};

#[derive(Debug)]
pub enum GatewayError {
    /// yt-dlp (or another helper) could not be located or launched
    ToolNotFound(String),

    /// A helper process ran but reported failure
    Execution(String),

    /// Output could not be understood
    Parse(String),

    /// Local file access failed
    Io(std::io::Error),
}

impl fmt::Display for GatewayError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ToolNotFound(tool) => write!(f, "Tool not found: {}", tool),
            Self::Execution(msg) => write!(f, "Execution error: {}", msg),
            Self::Parse(msg) => write!(f, "Parse error: {}", msg),
            Self::Io(err) => write!(f, "I/O error: {}", err),
        }
    }
}

impl std::error::Error for GatewayError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Io(err) => Some(err),
            _ => None,
        }
    }
}

impl From<std::io::Error> for GatewayError {
    fn from(err: std::io::Error) -> Self {
        Self::Io(err)
    }
}

impl From<serde_json::Error> for GatewayError {
    fn from(err: serde_json::Error) -> Self {
        Self::Parse(err.to_string())
    }
}

pub type GatewayResult<T> = Result<T, GatewayError>;

/// Everything the client asks of the download backend.
///
/// Downloads are started here but their outcome only ever arrives on the
/// event channel handed out by [`BackendGateway::subscribe`].
#[async_trait]
pub trait BackendGateway: Send + Sync {
    /// Hands out the event channel. Only the first call returns `Some`.
    fn subscribe(&self) -> Option<EventReceiver>;

    async fn get_setting(&self, key: &str) -> GatewayResult<Option<String>>;

    async fn save_setting(&self, key: &str, value: &str) -> GatewayResult<()>;

    async fn get_video_details(&self, url: &str) -> GatewayResult<VideoDetails>;

    async fn get_playlist_details(&self, url: &str) -> GatewayResult<Vec<PlaylistItem>>;

    /// Queues a download. `id` is echoed back in every event for this task.
    async fn start_download_task(
        &self,
        id: &str,
        url: &str,
        format_id: &str,
        title: &str,
        thumbnail: &str,
    ) -> GatewayResult<()>;

    async fn get_history(&self) -> GatewayResult<Vec<HistoryEntry>>;

    async fn delete_history(&self, id: &str, delete_file: bool) -> GatewayResult<()>;

    async fn open_file(&self, path: &str) -> GatewayResult<()>;

    async fn open_folder(&self, path: &str) -> GatewayResult<()>;

    /// Lets the user pick a directory. `None` when the dialog was dismissed.
    async fn select_directory(&self) -> GatewayResult<Option<String>>;
}

#[cfg(test)]
pub mod mock {
    //! In-memory gateway used by the flow tests.

    use std::collections::HashMap;
    use std::sync::Mutex;

    use tokio::sync::mpsc::unbounded_channel;

    use super::*;
    use crate::events::{EventSender, RawEvent};

    /// A recorded start request
    #[derive(Debug, Clone, PartialEq)]
    pub struct StartCall {
        pub id: String,
        pub url: String,
        pub format_id: String,
        pub title: String,
        pub thumbnail: String,
    }

    type StartHook = Box<dyn Fn(&StartCall) + Send + Sync>;

    pub struct MockGateway {
        tx: EventSender,
        rx: Mutex<Option<EventReceiver>>,
        pub settings: Mutex<HashMap<String, String>>,
        pub history: Mutex<Vec<HistoryEntry>>,
        pub video: Mutex<Option<VideoDetails>>,
        pub playlist: Mutex<Option<Vec<PlaylistItem>>>,
        pub starts: Mutex<Vec<StartCall>>,
        pub history_calls: Mutex<usize>,
        pub deletes: Mutex<Vec<(String, bool)>>,
        pub fail_starts: bool,
        on_start: Mutex<Option<StartHook>>,
    }

    impl MockGateway {
        pub fn new() -> Self {
            let (tx, rx) = unbounded_channel();
            Self {
                tx,
                rx: Mutex::new(Some(rx)),
                settings: Mutex::new(HashMap::new()),
                history: Mutex::new(Vec::new()),
                video: Mutex::new(None),
                playlist: Mutex::new(None),
                starts: Mutex::new(Vec::new()),
                history_calls: Mutex::new(0),
                deletes: Mutex::new(Vec::new()),
                fail_starts: false,
                on_start: Mutex::new(None),
            }
        }

        pub fn failing_starts() -> Self {
            Self {
                fail_starts: true,
                ..Self::new()
            }
        }

        /// Pushes an event as the backend would.
        pub fn emit(&self, event: RawEvent) {
            let _ = self.tx.send(event);
        }

        /// Runs `hook` inside every start request, before it returns.
        pub fn on_start(&self, hook: impl Fn(&StartCall) + Send + Sync + 'static) {
            *self.on_start.lock().unwrap() = Some(Box::new(hook));
        }

        pub fn start_calls(&self) -> Vec<StartCall> {
            self.starts.lock().unwrap().clone()
        }

        pub fn history_calls(&self) -> usize {
            *self.history_calls.lock().unwrap()
        }
    }

    #[async_trait]
    impl BackendGateway for MockGateway {
        fn subscribe(&self) -> Option<EventReceiver> {
            self.rx.lock().unwrap().take()
        }

        async fn get_setting(&self, key: &str) -> GatewayResult<Option<String>> {
            Ok(self.settings.lock().unwrap().get(key).cloned())
        }

        async fn save_setting(&self, key: &str, value: &str) -> GatewayResult<()> {
            self.settings
                .lock()
                .unwrap()
                .insert(key.to_string(), value.to_string());
            Ok(())
        }

        async fn get_video_details(&self, _url: &str) -> GatewayResult<VideoDetails> {
            self.video
                .lock()
                .unwrap()
                .clone()
                .ok_or_else(|| GatewayError::Execution("analysis failed".into()))
        }

        async fn get_playlist_details(&self, _url: &str) -> GatewayResult<Vec<PlaylistItem>> {
            self.playlist
                .lock()
                .unwrap()
                .clone()
                .ok_or_else(|| GatewayError::Execution("playlist failed".into()))
        }

        async fn start_download_task(
            &self,
            id: &str,
            url: &str,
            format_id: &str,
            title: &str,
            thumbnail: &str,
        ) -> GatewayResult<()> {
            let call = StartCall {
                id: id.to_string(),
                url: url.to_string(),
                format_id: format_id.to_string(),
                title: title.to_string(),
                thumbnail: thumbnail.to_string(),
            };
            if let Some(hook) = self.on_start.lock().unwrap().as_ref() {
                hook(&call);
            }
            self.starts.lock().unwrap().push(call);
            tokio::task::yield_now().await;
            if self.fail_starts {
                return Err(GatewayError::Execution("start rejected".into()));
            }
            Ok(())
        }

        async fn get_history(&self) -> GatewayResult<Vec<HistoryEntry>> {
            *self.history_calls.lock().unwrap() += 1;
            Ok(self.history.lock().unwrap().clone())
        }

        async fn delete_history(&self, id: &str, delete_file: bool) -> GatewayResult<()> {
            self.deletes
                .lock()
                .unwrap()
                .push((id.to_string(), delete_file));
            self.history.lock().unwrap().retain(|e| e.id != id);
            Ok(())
        }

        async fn open_file(&self, _path: &str) -> GatewayResult<()> {
            Ok(())
        }

        async fn open_folder(&self, _path: &str) -> GatewayResult<()> {
            Ok(())
        }

        async fn select_directory(&self) -> GatewayResult<Option<String>> {
            Ok(Some("/media/videos".to_string()))
        }
    }
}
