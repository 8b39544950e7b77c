//! JSON-file device cache

use super::DeviceCache;
use crate::device::Device;
use anyhow::{Context, Result};
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tracing::{debug, info};

#[derive(Debug, Clone, Serialize, Deserialize)]
struct Record {
    #[serde(flatten)]
    device: Device,
    last_seen: DateTime<Utc>,
}

/// Device cache persisted as a single JSON file. Mutations are serialized
/// through an internal lock and flushed atomically (write + rename).
pub struct JsonDeviceCache {
    path: PathBuf,
    records: Mutex<HashMap<String, Record>>,
}

impl JsonDeviceCache {
    pub fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("failed to create cache directory {:?}", parent))?;
        }

        let records = if path.exists() {
            let contents = fs::read_to_string(&path)
                .with_context(|| format!("failed to read device cache {:?}", path))?;
            serde_json::from_str(&contents)
                .with_context(|| format!("device cache {:?} is corrupt", path))?
        } else {
            HashMap::new()
        };

        Ok(Self {
            path,
            records: Mutex::new(records),
        })
    }

    fn persist(&self, records: &HashMap<String, Record>) -> Result<()> {
        let contents = serde_json::to_string_pretty(records)?;
        let tmp = self.path.with_extension("json.tmp");
        fs::write(&tmp, contents)
            .with_context(|| format!("failed to write device cache {:?}", tmp))?;
        fs::rename(&tmp, &self.path)
            .with_context(|| format!("failed to replace device cache {:?}", self.path))?;
        Ok(())
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl DeviceCache for JsonDeviceCache {
    fn upsert_many(&self, devices: &[Device]) -> Result<()> {
        let now = Utc::now();
        let mut records = self.records.lock().unwrap();

        for device in devices {
            match records.get_mut(&device.name) {
                Some(existing) => {
                    let kept_backup = device.last_backup.or(existing.device.last_backup);
                    existing.device = device.clone();
                    existing.device.last_backup = kept_backup;
                    existing.last_seen = now;
                }
                None => {
                    records.insert(
                        device.name.clone(),
                        Record {
                            device: device.clone(),
                            last_seen: now,
                        },
                    );
                }
            }
        }

        debug!("upserted {} devices into cache", devices.len());
        self.persist(&records)
    }

    fn remove_stale(&self, max_age: Duration) -> Result<usize> {
        let cutoff = Utc::now() - max_age;
        let mut records = self.records.lock().unwrap();

        let before = records.len();
        records.retain(|_, record| record.last_seen >= cutoff);
        let removed = before - records.len();

        if removed > 0 {
            info!("removed {} stale devices from cache", removed);
            self.persist(&records)?;
        }

        Ok(removed)
    }

    fn all(&self) -> Result<Vec<Device>> {
        let records = self.records.lock().unwrap();
        let mut devices: Vec<Device> = records.values().map(|r| r.device.clone()).collect();
        devices.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(devices)
    }

    fn get(&self, name: &str) -> Result<Option<Device>> {
        let records = self.records.lock().unwrap();
        Ok(records.get(name).map(|r| r.device.clone()))
    }
}
