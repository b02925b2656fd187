use std::{
    fs::File,
    io::Write,
    path::{Path, PathBuf},
    process::Stdio,
};

use log::debug;
use rust_embed::RustEmbed;
use serde_json::Value;
use tokio::{
    io::{AsyncBufReadExt, AsyncRead, BufReader},
    process::Command,
};

use crate::events::{EventSender, RawEvent};
use crate::gateway::{GatewayError, GatewayResult};
use crate::progress::{parse_progress_from_line, PROGRESS_TEMPLATE};

/// Optional bundled yt-dlp; drop the binary into `assets/` to embed it
#[derive(RustEmbed)]
#[folder = "assets/"]
pub struct Asset;

const BIN: &str = if cfg!(target_os = "windows") { "yt-dlp.exe" } else { "yt-dlp" };

/// Locates yt-dlp: the embedded copy (extracted to the temp dir), then
/// `./yt-dlp`, then whatever `PATH` resolves.
pub fn ytdlp_binary() -> GatewayResult<PathBuf> {
    if let Some(data) = Asset::get(BIN) {
        let tmp = std::env::temp_dir().join(BIN);
        if !tmp.exists() {
            let mut f = File::create(&tmp)?;
            f.write_all(&data.data)?;
            #[cfg(unix)]
            {
                use std::os::unix::fs::PermissionsExt;
                std::fs::set_permissions(&tmp, std::fs::Permissions::from_mode(0o755))?;
            }
        }
        return Ok(tmp);
    }
    let local = Path::new(".").join(BIN);
    if local.is_file() {
        return Ok(local);
    }
    Ok(PathBuf::from(BIN))
}

fn launch_error(bin: &Path, err: std::io::Error) -> GatewayError {
    if err.kind() == std::io::ErrorKind::NotFound {
        GatewayError::ToolNotFound(bin.display().to_string())
    } else {
        GatewayError::Io(err)
    }
}

/// Runs yt-dlp to completion and parses its stdout as one JSON document.
pub async fn dump_json(bin: &Path, args: &[&str]) -> GatewayResult<Value> {
    let out = Command::new(bin)
        .args(args)
        .stdin(Stdio::null())
        .output()
        .await
        .map_err(|e| launch_error(bin, e))?;
    if !out.status.success() {
        let stderr = String::from_utf8_lossy(&out.stderr);
        return Err(GatewayError::Execution(stderr.trim().to_string()));
    }
    Ok(serde_json::from_slice(&out.stdout)?)
}

/// Asks yt-dlp where `url` will be written with `template`.
pub async fn resolve_filename(bin: &Path, template: &str, url: &str) -> GatewayResult<String> {
    let out = Command::new(bin)
        .args(["--get-filename", "-o", template, url])
        .stdin(Stdio::null())
        .output()
        .await
        .map_err(|e| launch_error(bin, e))?;
    Ok(String::from_utf8_lossy(&out.stdout).trim().to_string())
}

/// What to download and where
#[derive(Debug, Clone)]
pub struct DownloadJob {
    pub id: String,
    pub url: String,
    pub format_id: String,
    pub output_template: String,
}

impl DownloadJob {
    fn args(&self) -> Vec<String> {
        let mut args = vec![
            "--newline".to_owned(),
            "--progress".to_owned(),
            "--no-warnings".to_owned(),
            "--progress-template".to_owned(),
            PROGRESS_TEMPLATE.to_owned(),
            "-o".to_owned(),
            self.output_template.clone(),
        ];
        if !self.format_id.is_empty() {
            args.push("-f".to_owned());
            args.push(self.format_id.clone());
        }
        args.push(self.url.clone());
        args
    }
}

/// Runs one download, forwarding every progress line as a `task_progress` event.
pub async fn spawn_download(bin: &Path, job: &DownloadJob, events: EventSender) -> GatewayResult<()> {
    let mut child = Command::new(bin)
        .args(job.args())
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true)
        .spawn()
        .map_err(|e| launch_error(bin, e))?;

    // yt-dlp prints progress on either stream depending on the environment
    let out = child
        .stdout
        .take()
        .ok_or_else(|| GatewayError::Execution("yt-dlp stdout unavailable".into()))?;
    let err = child
        .stderr
        .take()
        .ok_or_else(|| GatewayError::Execution("yt-dlp stderr unavailable".into()))?;
    let err_reader = tokio::spawn(forward_progress(err, job.id.clone(), events.clone()));
    let read = forward_progress(out, job.id.clone(), events).await;
    if read.is_err() {
        let _ = child.start_kill();
    }
    let _ = err_reader.await;

    let status = child.wait().await?;
    read?;
    if status.success() {
        Ok(())
    } else {
        Err(GatewayError::Execution(format!("yt-dlp exited with {}", status)))
    }
}

async fn forward_progress<R>(stream: R, id: String, events: EventSender) -> GatewayResult<()>
where
    R: AsyncRead + Unpin,
{
    let mut lines = BufReader::new(stream).lines();
    while let Some(line) = lines.next_line().await? {
        debug!("yt-dlp [{}]> {}", id, line);
        if let Some(p) = parse_progress_from_line(&line) {
            let _ = events.send(RawEvent::progress(&id, &p.percent, &p.speed, &p.eta));
        }
    }
    Ok(())
}
