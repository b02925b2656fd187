use serde::{Deserialize, Serialize};

/// Placeholder shown as speed until the first progress event arrives
pub const DEFAULT_SPEED: &str = "0B/s";
/// Placeholder shown as time remaining until the first progress event arrives
pub const DEFAULT_ETA: &str = "--:--";
/// Shown in place of the speed once a task has failed
pub const FAILED_SPEED: &str = "Failed";

/// Represents the current state of a queued download
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskStatus {
    /// Accepted by the backend, not yet running
    Waiting,
    /// Download is in progress
    Downloading,
    /// Backend reported a failure; stays visible
    Error,
}

impl TaskStatus {
    /// Lenient parse of a status string as sent by the backend
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "waiting" | "pending" => Some(Self::Waiting),
            "downloading" => Some(Self::Downloading),
            "error" | "failed" => Some(Self::Error),
            _ => None,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Self::Waiting => "Waiting",
            Self::Downloading => "Downloading",
            Self::Error => "Error",
        }
    }
}

/// Data structure for tracking a download task in the UI
#[derive(Debug, Clone, PartialEq)]
pub struct Task {
    /// Client-generated id, echoed back by the backend in every event
    pub id: String,
    pub url: String,
    /// Human-readable title, may be a placeholder for batch items
    pub title: String,
    pub thumbnail: String,
    pub status: TaskStatus,
    /// Progress percentage (0.0 to 100.0)
    pub percent: f32,
    pub speed: String,
    pub eta: String,
}

/// A completed download as stored by the backend
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryEntry {
    pub id: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub thumbnail: String,
    #[serde(default)]
    pub file_path: String,
}

/// One selectable download format of an analyzed video
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FormatOption {
    pub format_id: String,
    pub label: String,
}

/// Result of analyzing a single video URL
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct VideoDetails {
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub thumbnail: String,
    #[serde(default)]
    pub processed_formats: Vec<FormatOption>,
}

/// One entry of an analyzed playlist
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlaylistItem {
    pub url: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub thumbnail: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Theme {
    #[default]
    Light,
    Dark,
}

impl Theme {
    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "light" => Some(Self::Light),
            "dark" => Some(Self::Dark),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Light => "light",
            Self::Dark => "dark",
        }
    }

    pub fn toggled(self) -> Self {
        match self {
            Self::Light => Self::Dark,
            Self::Dark => Self::Light,
        }
    }
}

/// User preferences, persisted by the backend under `theme` and `download_path`
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Settings {
    pub theme: Theme,
    /// Empty means the backend's default location
    pub download_path: String,
}

pub const SETTING_THEME: &str = "theme";
pub const SETTING_DOWNLOAD_PATH: &str = "download_path";
pub const SETTING_MAX_CONCURRENT: &str = "max_concurrent";
