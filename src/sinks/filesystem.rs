//! Filesystem sink with per-device rotation

use super::{SinkError, Snapshot, StorageSink};
use crate::device::Device;
use crate::utils::expand_tilde;
use anyhow::{bail, Context, Result};
use chrono::{DateTime, Utc};
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

fn default_retention() -> usize {
    10
}

#[derive(Debug, Deserialize)]
struct FilesystemConfig {
    path: PathBuf,
    #[serde(default = "default_retention")]
    retention: usize,
}

/// Stores snapshots as `<root>/<device>/<device>_<timestamp>.cfg` with a
/// `<device>_latest.cfg` alias, keeping the newest `retention` files.
pub struct FilesystemSink {
    root: PathBuf,
    retention: usize,
}

impl FilesystemSink {
    pub fn from_config(config: &toml::Value) -> Result<Self> {
        let parsed: FilesystemConfig = config
            .clone()
            .try_into()
            .context("invalid filesystem sink configuration")?;

        if parsed.retention == 0 {
            bail!("filesystem sink: retention must be at least 1");
        }

        let root = expand_tilde(&parsed.path);
        fs::create_dir_all(&root)
            .with_context(|| format!("failed to create backup directory {:?}", root))?;

        info!("filesystem sink initialized at {:?}", root);

        Ok(Self {
            root,
            retention: parsed.retention,
        })
    }

    /// Build a sink directly (used by tests and embedding callers).
    pub fn new(root: impl Into<PathBuf>, retention: usize) -> Result<Self> {
        if retention == 0 {
            bail!("retention must be at least 1");
        }
        let root = root.into();
        fs::create_dir_all(&root)
            .with_context(|| format!("failed to create backup directory {:?}", root))?;
        Ok(Self { root, retention })
    }

    fn device_dir(&self, device_name: &str) -> PathBuf {
        self.root.join(device_name)
    }

    fn latest_name(device_name: &str) -> String {
        format!("{}_latest.cfg", device_name)
    }

    /// All stored snapshot files for a device, newest first. The latest
    /// alias and anything that is not a regular file are excluded.
    fn snapshot_files(&self, device_name: &str) -> Result<Vec<(PathBuf, DateTime<Utc>)>, SinkError> {
        let dir = self.device_dir(device_name);
        if !dir.exists() {
            return Ok(Vec::new());
        }

        let prefix = format!("{}_", device_name);
        let latest = Self::latest_name(device_name);
        let mut files = Vec::new();

        for entry in fs::read_dir(&dir)? {
            let entry = entry?;
            let file_name = entry.file_name().to_string_lossy().into_owned();
            if !file_name.starts_with(&prefix) || !file_name.ends_with(".cfg") || file_name == latest {
                continue;
            }
            // symlink_metadata so the alias is skipped even if misnamed
            let meta = fs::symlink_metadata(entry.path())?;
            if !meta.is_file() {
                continue;
            }
            let modified: DateTime<Utc> = meta.modified()?.into();
            files.push((entry.path(), modified));
        }

        // Newest first; file name (embedded timestamp) breaks mtime ties
        files.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| b.0.cmp(&a.0)));
        Ok(files)
    }

    /// Delete every snapshot beyond the retention count. Never touches the
    /// file at `just_written`.
    fn rotate(&self, device_name: &str, just_written: &Path) -> Result<(), SinkError> {
        let files = self.snapshot_files(device_name)?;
        if files.len() <= self.retention {
            return Ok(());
        }

        for (path, _) in files.into_iter().skip(self.retention) {
            if path == just_written {
                continue;
            }
            debug!("rotating out old snapshot {:?}", path);
            if let Err(e) = fs::remove_file(&path) {
                warn!("failed to remove old snapshot {:?}: {}", path, e);
            }
        }

        Ok(())
    }

    fn refresh_latest_alias(&self, dir: &Path, device_name: &str, file_name: &str) -> Result<(), SinkError> {
        let alias = dir.join(Self::latest_name(device_name));

        if alias.symlink_metadata().is_ok() {
            fs::remove_file(&alias)?;
        }

        #[cfg(unix)]
        std::os::unix::fs::symlink(file_name, &alias)?;

        #[cfg(not(unix))]
        fs::copy(dir.join(file_name), &alias)?;

        Ok(())
    }
}

impl StorageSink for FilesystemSink {
    fn name(&self) -> &str {
        "filesystem"
    }

    fn store(&self, device: &Device, snapshot: &str) -> Result<(), SinkError> {
        let dir = self.device_dir(&device.name);
        fs::create_dir_all(&dir)?;

        let timestamp = Utc::now().format("%Y%m%d_%H%M%S%3f");
        let file_name = format!("{}_{}.cfg", device.name, timestamp);
        let path = dir.join(&file_name);

        fs::write(&path, snapshot)?;
        info!("stored snapshot {:?}", path);

        self.refresh_latest_alias(&dir, &device.name, &file_name)?;
        self.rotate(&device.name, &path)?;

        Ok(())
    }

    fn history(&self, device_name: &str) -> Result<Vec<Snapshot>, SinkError> {
        let files = self.snapshot_files(device_name)?;
        Ok(files
            .into_iter()
            .filter_map(|(path, creation_time)| {
                path.file_name().map(|n| Snapshot {
                    id: n.to_string_lossy().into_owned(),
                    creation_time,
                })
            })
            .collect())
    }

    fn read_latest(&self, device_name: &str) -> Result<String, SinkError> {
        self.read(device_name, &Self::latest_name(device_name))
    }

    fn read(&self, device_name: &str, snapshot_id: &str) -> Result<String, SinkError> {
        // ids are plain file names; anything with a path separator is bogus
        if snapshot_id.contains('/') || snapshot_id.contains('\\') {
            return Err(SinkError::NotFound {
                device: device_name.to_string(),
                id: snapshot_id.to_string(),
            });
        }

        let path = self.device_dir(device_name).join(snapshot_id);
        match fs::read_to_string(&path) {
            Ok(content) => Ok(content),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Err(SinkError::NotFound {
                device: device_name.to_string(),
                id: snapshot_id.to_string(),
            }),
            Err(e) => Err(SinkError::Io(e)),
        }
    }
}
