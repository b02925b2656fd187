//! Turns raw yt-dlp metadata into the records shown by the client.

use serde_json::Value;

use crate::model::{FormatOption, PlaylistItem, VideoDetails};

const WATCH_URL: &str = "https://www.youtube.com/watch?v=";

/// Expands a bare video id into a watch URL.
pub fn normalize_url(url: &str) -> String {
    let url = url.trim();
    if url.starts_with("http") {
        url.to_string()
    } else {
        format!("{}{}", WATCH_URL, url)
    }
}

fn field<'a>(obj: &'a Value, key: &str) -> &'a str {
    obj.get(key).and_then(Value::as_str).unwrap_or("")
}

// format_id is sometimes numeric in older extractors
fn id_field(obj: &Value, key: &str) -> String {
    match obj.get(key) {
        Some(Value::String(s)) => s.clone(),
        Some(Value::Number(n)) => n.to_string(),
        _ => String::new(),
    }
}

/// Builds the labelled format list from a `--dump-json` document.
///
/// Storyboards and formats without any resolution info are left out.
pub fn process_formats(raw: &Value) -> Vec<FormatOption> {
    let Some(formats) = raw.get("formats").and_then(Value::as_array) else {
        return Vec::new();
    };

    formats
        .iter()
        .filter_map(|f| {
            let id = id_field(f, "format_id");
            let ext = field(f, "ext");
            let res = field(f, "resolution");
            let vcodec = field(f, "vcodec");
            let acodec = field(f, "acodec");

            let category = if vcodec != "none" && acodec != "none" {
                "Best merged stream"
            } else if vcodec == "none" {
                "Audio only"
            } else if res.contains("2160") || res.contains("4320") {
                "Ultra HD (4K/8K)"
            } else {
                "Video"
            };

            let info = match field(f, "format_note") {
                "" => res,
                note => note,
            };
            if id.is_empty() || info.is_empty() || id.contains("sb") {
                return None;
            }

            Some(FormatOption {
                label: format!("{:<16} | ID: {:<5} | {:<5} | {}", category, id, ext, info),
                format_id: id,
            })
        })
        .collect()
}

pub fn video_details(raw: &Value) -> VideoDetails {
    VideoDetails {
        title: field(raw, "title").to_string(),
        thumbnail: field(raw, "thumbnail").to_string(),
        processed_formats: process_formats(raw),
    }
}

/// Reads the entries of a `--flat-playlist --dump-single-json` document.
pub fn playlist_items(raw: &Value) -> Vec<PlaylistItem> {
    let Some(entries) = raw.get("entries").and_then(Value::as_array) else {
        return Vec::new();
    };

    entries
        .iter()
        .filter_map(|entry| {
            let url = match field(entry, "url") {
                "" => field(entry, "id"),
                url => url,
            };
            if url.is_empty() {
                return None;
            }
            let thumbnail = match field(entry, "thumbnail") {
                "" => entry
                    .get("thumbnails")
                    .and_then(Value::as_array)
                    .and_then(|t| t.last())
                    .map(|t| field(t, "url"))
                    .unwrap_or(""),
                thumb => thumb,
            };
            Some(PlaylistItem {
                url: normalize_url(url),
                title: field(entry, "title").to_string(),
                thumbnail: thumbnail.to_string(),
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn bare_ids_become_watch_urls() {
        assert_eq!(normalize_url("dQw4w9WgXcQ"), "https://www.youtube.com/watch?v=dQw4w9WgXcQ");
        assert_eq!(normalize_url(" https://youtu.be/x "), "https://youtu.be/x");
    }

    #[test]
    fn formats_are_classified_and_filtered() {
        let raw = json!({
            "title": "clip",
            "thumbnail": "http://img",
            "formats": [
                { "format_id": "sb0", "ext": "mhtml", "format_note": "storyboard", "vcodec": "none", "acodec": "none" },
                { "format_id": "140", "ext": "m4a", "format_note": "medium", "vcodec": "none", "acodec": "mp4a" },
                { "format_id": "18", "ext": "mp4", "format_note": "360p", "vcodec": "avc1", "acodec": "mp4a" },
                { "format_id": "313", "ext": "webm", "resolution": "3840x2160", "vcodec": "vp9", "acodec": "none" },
                { "format_id": "137", "ext": "mp4", "vcodec": "avc1", "acodec": "none" }
            ]
        });
        let details = video_details(&raw);
        assert_eq!(details.title, "clip");
        let ids: Vec<&str> = details.processed_formats.iter().map(|f| f.format_id.as_str()).collect();
        assert_eq!(ids, vec!["140", "18", "313"]);
        assert!(details.processed_formats[0].label.starts_with("Audio only"));
        assert!(details.processed_formats[1].label.starts_with("Best merged stream"));
        assert!(details.processed_formats[2].label.starts_with("Ultra HD (4K/8K)"));
        assert!(details.processed_formats[2].label.ends_with("| 3840x2160"));
    }

    #[test]
    fn playlist_entries_are_normalized() {
        let raw = json!({
            "entries": [
                { "url": "abc123", "title": "first", "thumbnails": [{ "url": "small" }, { "url": "large" }] },
                { "url": "https://www.youtube.com/watch?v=def", "title": "second", "thumbnail": "t2" },
                { "title": "broken" }
            ]
        });
        let items = playlist_items(&raw);
        assert_eq!(items.len(), 2);
        assert_eq!(items[0].url, "https://www.youtube.com/watch?v=abc123");
        assert_eq!(items[0].thumbnail, "large");
        assert_eq!(items[1].thumbnail, "t2");
    }
}
