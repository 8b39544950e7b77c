//! Storage sinks
//!
//! A sink persists processed snapshots and owns the retention policy for
//! its copies. Sinks are resolved by type name through the capability
//! registry and shared across concurrent device workers, so implementations
//! must tolerate concurrent writes for *different* devices; the pipeline
//! guarantees writes for one device are never interleaved.

mod filesystem;

pub use filesystem::FilesystemSink;

use crate::device::Device;
use chrono::{DateTime, Utc};
use serde::Serialize;

/// One stored configuration capture for one device.
///
/// `id` is sink-defined and opaque to the orchestrator (the filesystem sink
/// uses the file name).
#[derive(Debug, Clone, Serialize)]
pub struct Snapshot {
    pub id: String,
    pub creation_time: DateTime<Utc>,
}

impl Snapshot {
    /// Human-readable age ("3h ago") for presentation. Derived, never
    /// persisted.
    pub fn age_label(&self, now: DateTime<Utc>) -> String {
        let elapsed = now.signed_duration_since(self.creation_time);
        if elapsed.num_days() > 0 {
            format!("{}d ago", elapsed.num_days())
        } else if elapsed.num_hours() > 0 {
            format!("{}h ago", elapsed.num_hours())
        } else if elapsed.num_minutes() > 0 {
            format!("{}m ago", elapsed.num_minutes())
        } else {
            format!("{}s ago", elapsed.num_seconds().max(0))
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum SinkError {
    #[error("snapshot '{id}' not found for device '{device}'")]
    NotFound { device: String, id: String },

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

pub trait StorageSink: Send + Sync {
    /// Type name this instance was resolved under (for logging).
    fn name(&self) -> &str;

    /// Persist a new snapshot for a device and apply retention.
    fn store(&self, device: &Device, snapshot: &str) -> Result<(), SinkError>;

    /// Stored history for a device, newest first. Excludes the latest alias.
    fn history(&self, device_name: &str) -> Result<Vec<Snapshot>, SinkError>;

    /// Content of the most recent snapshot.
    fn read_latest(&self, device_name: &str) -> Result<String, SinkError>;

    /// Content of a specific snapshot by its opaque identifier.
    fn read(&self, device_name: &str, snapshot_id: &str) -> Result<String, SinkError>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[test]
    fn test_age_label_buckets() {
        let now = Utc::now();
        let snap = |ago: Duration| Snapshot {
            id: "x".to_string(),
            creation_time: now - ago,
        };

        assert_eq!(snap(Duration::seconds(30)).age_label(now), "30s ago");
        assert_eq!(snap(Duration::minutes(5)).age_label(now), "5m ago");
        assert_eq!(snap(Duration::hours(7)).age_label(now), "7h ago");
        assert_eq!(snap(Duration::days(2)).age_label(now), "2d ago");
    }
}
