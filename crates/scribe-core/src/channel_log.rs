use std::collections::HashMap;
use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use anyhow::{anyhow, Context, Result};

use crate::payload::EventPayload;

/// Maps an untrusted channel id onto a path-safe filename. Real Slack ids
/// are alphanumeric and pass through unchanged.
pub fn sanitize_for_path(raw: &str) -> String {
    let sanitized = raw
        .chars()
        .map(|ch| {
            if ch.is_ascii_alphanumeric() || ch == '-' || ch == '_' || ch == '.' {
                ch
            } else {
                '_'
            }
        })
        .collect::<String>();
    let trimmed = sanitized.trim_matches(|ch| ch == '_' || ch == '.');
    if trimmed.is_empty() {
        "channel".to_string()
    } else {
        trimmed.to_string()
    }
}

/// One append-only JSON Lines file. The handle stays open for the process
/// lifetime; the mutex keeps concurrent appends whole-line.
#[derive(Clone)]
struct ChannelLogFile {
    path: PathBuf,
    file: Arc<Mutex<File>>,
}

impl ChannelLogFile {
    fn open(path: PathBuf) -> Result<Self> {
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .with_context(|| format!("failed to open {}", path.display()))?;
        Ok(Self {
            path,
            file: Arc::new(Mutex::new(file)),
        })
    }

    fn append(&self, data: &EventPayload) -> Result<()> {
        // Map is btree-backed, so this is compact JSON with sorted keys.
        let line = serde_json::to_string(data).context("failed to encode event")?;
        let mut file = self
            .file
            .lock()
            .map_err(|_| anyhow!("channel log mutex is poisoned"))?;
        writeln!(file, "{line}")
            .with_context(|| format!("failed to append to {}", self.path.display()))?;
        file.flush()
            .with_context(|| format!("failed to flush {}", self.path.display()))?;
        Ok(())
    }
}

/// The destination directory: one append-only log per channel id, opened
/// lazily on the first event for that channel and kept open afterwards.
pub struct ChannelLogSet {
    root: PathBuf,
    files: Mutex<HashMap<String, ChannelLogFile>>,
}

impl ChannelLogSet {
    /// Opens the destination directory, creating it if missing.
    pub fn open(root: impl Into<PathBuf>) -> Result<Self> {
        let root = root.into();
        std::fs::create_dir_all(&root)
            .with_context(|| format!("failed to create {}", root.display()))?;
        Ok(Self {
            root,
            files: Mutex::new(HashMap::new()),
        })
    }

    /// Appends one event to the channel's log as a single JSON line.
    pub fn append(&self, channel_id: &str, data: &EventPayload) -> Result<()> {
        self.log_for(channel_id)?.append(data)
    }

    /// Path the given channel id is written to.
    pub fn path_for(&self, channel_id: &str) -> PathBuf {
        self.root.join(sanitize_for_path(channel_id))
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn log_for(&self, channel_id: &str) -> Result<ChannelLogFile> {
        let mut files = self
            .files
            .lock()
            .map_err(|_| anyhow!("channel log registry mutex is poisoned"))?;
        if let Some(found) = files.get(channel_id) {
            return Ok(found.clone());
        }
        let opened = ChannelLogFile::open(self.path_for(channel_id))?;
        files.insert(channel_id.to_string(), opened.clone());
        Ok(opened)
    }
}
