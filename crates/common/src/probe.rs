//! Media duration probe
//!
//! Thin wrapper over `ffprobe` for querying the duration of a finished
//! media file. Duration is advisory metadata, never a correctness gate:
//! every failure mode reports 0.0 instead of erroring.

use std::path::Path;
use tokio::process::Command;
use tracing::warn;

/// Query a media file's duration in seconds via `ffprobe`.
///
/// Returns 0.0 when the probe cannot run or produces unparseable output.
pub async fn probe_duration(path: &Path) -> f64 {
    let output = Command::new("ffprobe")
        .arg("-v")
        .arg("quiet")
        .arg("-show_entries")
        .arg("format=duration")
        .arg("-of")
        .arg("csv=p=0")
        .arg(path)
        .output()
        .await;

    match output {
        Ok(out) if out.status.success() => String::from_utf8_lossy(&out.stdout)
            .trim()
            .parse()
            .unwrap_or(0.0),
        Ok(out) => {
            warn!(
                "Could not probe duration of {}: {}",
                path.display(),
                String::from_utf8_lossy(&out.stderr).trim()
            );
            0.0
        }
        Err(e) => {
            warn!("Failed to run ffprobe for {}: {}", path.display(), e);
            0.0
        }
    }
}
