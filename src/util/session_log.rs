// Copyright (c) 2024 Mike Tsao

//! The session log records each bar's lane values as one JSON object per
//! line. Replay and scene derivation read it back.

use anyhow::Context;
use log::info;
use serde::{Deserialize, Serialize};
use std::{
    collections::BTreeMap,
    fs::{File, OpenOptions},
    io::{BufRead, BufReader, Write},
    path::{Path, PathBuf},
    time::{SystemTime, UNIX_EPOCH},
};

/// One bar's worth of session log.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct SessionLogEntry {
    /// Seconds since the Unix epoch.
    pub timestamp: f64,
    /// Zero-based bar number.
    pub bar: u64,
    /// The scene that was active during the bar.
    pub scene_index: usize,
    /// Whether scene changes were disabled.
    pub frozen_scene: bool,
    /// Lanes whose values were held, sorted by name.
    pub frozen_lanes: Vec<String>,
    /// Each lane's most recent value.
    pub lanes: BTreeMap<String, u8>,
}
impl SessionLogEntry {
    /// Seconds since the Unix epoch, for [SessionLogEntry::timestamp].
    pub fn now() -> f64 {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map_or(0.0, |d| d.as_secs_f64())
    }
}

/// Appends [SessionLogEntry]s to a file. The file isn't opened until the
/// first entry is written, and every line is flushed as it's written.
#[derive(Debug)]
pub struct SessionLogWriter {
    path: PathBuf,
    file: Option<File>,
}
impl SessionLogWriter {
    #[allow(missing_docs)]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            file: None,
        }
    }

    /// Appends one line.
    pub fn write_entry(&mut self, entry: &SessionLogEntry) -> anyhow::Result<()> {
        if self.file.is_none() {
            let file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(&self.path)
                .with_context(|| format!("opening session log {}", self.path.display()))?;
            info!("Logging session to {}", self.path.display());
            self.file = Some(file);
        }
        if let Some(file) = self.file.as_mut() {
            let mut line = serde_json::to_string(entry)?;
            line.push('\n');
            file.write_all(line.as_bytes())?;
            file.flush()?;
        }
        Ok(())
    }

    /// Flushes and closes the file. A later write reopens it.
    pub fn close(&mut self) -> anyhow::Result<()> {
        if let Some(mut file) = self.file.take() {
            file.flush()?;
        }
        Ok(())
    }

    #[allow(missing_docs)]
    pub fn path(&self) -> &Path {
        &self.path
    }
}

/// Reads every entry in a session log. Blank lines are skipped.
pub fn read_session_log(path: &Path) -> anyhow::Result<Vec<SessionLogEntry>> {
    let file =
        File::open(path).with_context(|| format!("opening session log {}", path.display()))?;
    let mut entries = Vec::default();
    for (index, line) in BufReader::new(file).lines().enumerate() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        entries.push(serde_json::from_str(&line).with_context(|| {
            format!("{}: line {}", path.display(), index + 1)
        })?);
    }
    Ok(entries)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn entry_has_expected_fields() {
        let entry = SessionLogEntry {
            timestamp: 1.5,
            bar: 3,
            scene_index: 2,
            frozen_scene: false,
            frozen_lanes: vec!["a".to_string()],
            lanes: BTreeMap::from([("b".to_string(), 7), ("a".to_string(), 9)]),
        };
        let json = serde_json::to_string(&entry).unwrap();
        assert_eq!(
            json,
            r#"{"timestamp":1.5,"bar":3,"scene_index":2,"frozen_scene":false,"frozen_lanes":["a"],"lanes":{"a":9,"b":7}}"#
        );
    }

    #[test]
    fn writer_opens_lazily() {
        let path = std::env::temp_dir().join(format!(
            "spiralwalk-lazy-{}-{}.jsonl",
            std::process::id(),
            line!()
        ));
        let _ = std::fs::remove_file(&path);
        let mut writer = SessionLogWriter::new(&path);
        assert!(writer.close().is_ok());
        assert!(!path.exists());

        writer.write_entry(&SessionLogEntry::default()).unwrap();
        assert!(path.exists());
        writer.close().unwrap();
        let _ = std::fs::remove_file(&path);
    }
}
