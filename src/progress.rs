/// Template handed to yt-dlp so every progress line has the same shape
pub const PROGRESS_TEMPLATE: &str =
    "at:%(progress._speed_str)s eta:%(progress._eta_str)s per:%(progress._percent_str)s";

/// One parsed progress line
#[derive(Debug, Clone, PartialEq)]
pub struct ProgressLine {
    /// Percentage as printed, without the `%` sign
    pub percent: String,
    pub speed: String,
    pub eta: String,
}

/// Parses a line produced with [`PROGRESS_TEMPLATE`].
///
/// yt-dlp pads its `_str` fields, so values are cut at the next marker instead
/// of at whitespace. Lines without a numeric percentage are not progress lines.
pub fn parse_progress_from_line(line: &str) -> Option<ProgressLine> {
    let per = line.find("per:")?;
    let percent = line[per + 4..].trim().strip_suffix('%')?.trim();
    if percent.is_empty() || percent.parse::<f32>().is_err() {
        return None;
    }

    let head = &line[..per];
    let (speed, eta) = match (head.find("at:"), head.find("eta:")) {
        (Some(at), Some(eta)) if at < eta => (head[at + 3..eta].trim(), head[eta + 4..].trim()),
        _ => ("", ""),
    };

    Some(ProgressLine {
        percent: percent.to_string(),
        speed: speed.to_string(),
        eta: eta.to_string(),
    })
}
