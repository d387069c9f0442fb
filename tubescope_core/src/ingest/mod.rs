// src/ingest/mod.rs
//
// Entry funnel for raw exports. File uploads, URL fetches, folder reads and
// ZIP archives all converge on the same text-parsing entry point.

pub mod columns;
pub mod layout;
pub mod normalize;

use crate::error::PipelineError;
use crate::model::VideoRecord;
use std::io::{Cursor, Read};
use std::path::Path;
use tracing::{debug, warn};
use zip::ZipArchive;

pub use layout::parse_export_text;

/// Literal markers identifying a per-channel video export inside an archive.
const MARKER_TITLE: &str = "Video title";
const MARKER_PUBLISH_TIME: &str = "Video publish time";
const MARKER_PUBLISH_DATE: &str = "Publish date";

const ZIP_MAGIC: &[u8] = b"PK\x03\x04";

fn looks_like_video_export(content: &str) -> bool {
    content.contains(MARKER_TITLE)
        && (content.contains(MARKER_PUBLISH_TIME) || content.contains(MARKER_PUBLISH_DATE))
}

/// Channel label for a ZIP member: its parent directory name, else the file
/// stem. Stacked content inside the member can still override per block.
fn zip_entry_channel(name: &str) -> String {
    let path = Path::new(name);
    path.parent()
        .and_then(|p| p.file_name())
        .or_else(|| path.file_stem())
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "unknown".to_string())
}

/// Ingests a ZIP of per-channel CSV exports. An archive yielding zero videos
/// across all members is a hard failure - it almost certainly means the
/// wrong file was supplied.
pub fn ingest_zip(bytes: &[u8]) -> Result<Vec<VideoRecord>, PipelineError> {
    let mut archive = ZipArchive::new(Cursor::new(bytes))?;
    let mut records = Vec::new();

    for index in 0..archive.len() {
        let mut entry = archive.by_index(index)?;
        if entry.is_dir() || !entry.name().to_lowercase().ends_with(".csv") {
            continue;
        }
        let name = entry.name().to_string();
        let mut raw = Vec::new();
        entry.read_to_end(&mut raw)?;
        let content = String::from_utf8_lossy(&raw);
        if !looks_like_video_export(&content) {
            debug!(member = %name, "skipping archive member without export markers");
            continue;
        }
        let channel = zip_entry_channel(&name);
        let parsed = parse_export_text(&content, &channel);
        debug!(member = %name, rows = parsed.len(), "parsed archive member");
        records.extend(parsed);
    }

    if records.is_empty() {
        return Err(PipelineError::EmptyArchive);
    }
    Ok(records)
}

/// Ingests a file or directory path. A `.zip` goes through archive
/// ingestion; a directory is read one `.csv` at a time; anything else is
/// treated as raw export text. Empty output from a plain file means "could
/// not interpret this file", not "file has no videos".
pub fn ingest_path(path: impl AsRef<Path>) -> Result<Vec<VideoRecord>, PipelineError> {
    let path = path.as_ref();
    if path.is_dir() {
        return ingest_dir(path);
    }

    let extension = path
        .extension()
        .map(|e| e.to_string_lossy().to_lowercase())
        .unwrap_or_default();
    if extension == "zip" {
        let bytes = std::fs::read(path)?;
        return ingest_zip(&bytes);
    }

    let text = std::fs::read_to_string(path)?;
    let channel = file_stem(path);
    Ok(parse_export_text(&text, &channel))
}

fn ingest_dir(dir: &Path) -> Result<Vec<VideoRecord>, PipelineError> {
    let mut records = Vec::new();
    let mut entries: Vec<_> = std::fs::read_dir(dir)?
        .filter_map(|e| e.ok())
        .map(|e| e.path())
        .collect();
    entries.sort();

    for path in entries {
        if !path.is_file() {
            continue;
        }
        let extension = path
            .extension()
            .map(|e| e.to_string_lossy().to_lowercase())
            .unwrap_or_default();
        if extension != "csv" {
            continue;
        }
        match std::fs::read_to_string(&path) {
            Ok(text) => records.extend(parse_export_text(&text, &file_stem(&path))),
            Err(err) => warn!(path = %path.display(), "unreadable export file: {}", err),
        }
    }
    Ok(records)
}

fn file_stem(path: &Path) -> String {
    path.file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "export".to_string())
}

/// Fetches an export over HTTP and funnels it through the same parsers.
/// ZIP payloads are detected by magic bytes rather than trusting headers.
pub async fn ingest_url(url: &str) -> Result<Vec<VideoRecord>, PipelineError> {
    let client = reqwest::Client::builder()
        .user_agent("tubescope/0.1.0")
        .build()
        .map_err(|e| PipelineError::Other(e.to_string()))?;
    let resp = client.get(url).send().await?;
    let status = resp.status();
    if !status.is_success() {
        return Err(PipelineError::InvalidInput(format!(
            "export fetch failed: {} for {}",
            status, url
        )));
    }
    let bytes = resp.bytes().await?;
    if bytes.starts_with(ZIP_MAGIC) {
        return ingest_zip(&bytes);
    }
    let text = String::from_utf8_lossy(&bytes);
    let channel = url::Url::parse(url)
        .ok()
        .and_then(|u| {
            u.path_segments()
                .and_then(|segments| segments.last().map(|s| s.to_string()))
        })
        .filter(|s| !s.is_empty())
        .unwrap_or_else(|| "export".to_string());
    Ok(parse_export_text(&text, &channel))
}
