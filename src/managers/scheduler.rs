//! Backup orchestrator
//!
//! Owns the run lifecycle: pulls the fleet from every inventory source,
//! fans per-device pipelines out over a bounded worker pool, aggregates the
//! outcomes, refreshes the device cache and sweeps stale entries. A single
//! in-flight-run guard keeps the recurring cron trigger and manual triggers
//! from overlapping.

use crate::config::{normalize_cron, Config};
use crate::device::Device;
use crate::managers::backup::BackupEngine;
use crate::registry::PluginRegistry;
use crate::sinks::StorageSink;
use crate::store::DeviceCache;
use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use cron::Schedule;
use rayon::prelude::*;
use serde::Serialize;
use std::collections::HashSet;
use std::str::FromStr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;
use tracing::{error, info, warn};

/// Aggregate result of one run. `degraded` devices captured a snapshot but
/// at least one sink write failed; they are also counted in `success`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct RunSummary {
    pub success: u32,
    pub degraded: u32,
    pub failed: u32,
    pub total: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum DeviceOutcome {
    /// Snapshot captured and stored by every sink
    Success,
    /// Snapshot captured but one or more sink writes failed
    Degraded,
    Failed,
}

/// Point-in-time view of the orchestrator for status queries.
#[derive(Debug, Clone, Serialize)]
pub struct SchedulerStatus {
    /// Whether the recurring trigger is armed and has a schedule
    pub is_active: bool,
    pub run_in_progress: bool,
    pub last_run: Option<DateTime<Utc>>,
    pub next_run: Option<DateTime<Utc>>,
    pub cron: Option<String>,
    pub last_summary: Option<RunSummary>,
}

#[derive(Default)]
struct RunState {
    last_run: Option<DateTime<Utc>>,
    last_summary: Option<RunSummary>,
}

pub struct Scheduler {
    config: Config,
    registry: Arc<PluginRegistry>,
    engine: BackupEngine,
    cache: Arc<dyn DeviceCache>,
    schedule: Option<Schedule>,
    armed: AtomicBool,
    run_active: AtomicBool,
    stop_loop: AtomicBool,
    state: Mutex<RunState>,
}

impl Scheduler {
    pub fn new(
        config: Config,
        registry: Arc<PluginRegistry>,
        engine: BackupEngine,
        cache: Arc<dyn DeviceCache>,
    ) -> Result<Self> {
        let schedule = match &config.scheduler.cron {
            Some(expr) => Some(
                Schedule::from_str(&normalize_cron(expr))
                    .with_context(|| format!("invalid cron expression '{}'", expr))?,
            ),
            None => None,
        };

        let armed = config.scheduler.enabled && schedule.is_some();
        if config.scheduler.enabled && schedule.is_none() {
            warn!("scheduler enabled but no cron configured; recurring trigger disabled");
        }

        Ok(Self {
            config,
            registry,
            engine,
            cache,
            schedule,
            armed: AtomicBool::new(armed),
            run_active: AtomicBool::new(false),
            stop_loop: AtomicBool::new(false),
            state: Mutex::new(RunState::default()),
        })
    }

    /// Arm the recurring trigger.
    pub fn start(&self) {
        if self.schedule.is_none() {
            warn!("cannot start recurring trigger: no cron configured");
            return;
        }
        self.armed.store(true, Ordering::SeqCst);
        info!("recurring trigger armed");
    }

    /// Disarm the recurring trigger. Does not cancel an in-flight run.
    pub fn stop(&self) {
        self.armed.store(false, Ordering::SeqCst);
        info!("recurring trigger disarmed");
    }

    /// Stop the daemon loop after the current iteration.
    pub fn shutdown(&self) {
        self.stop_loop.store(true, Ordering::SeqCst);
    }

    pub fn status(&self) -> SchedulerStatus {
        let state = self.state.lock().unwrap();
        SchedulerStatus {
            is_active: self.armed.load(Ordering::SeqCst),
            run_in_progress: self.run_active.load(Ordering::SeqCst),
            last_run: state.last_run,
            next_run: self.next_run(),
            cron: self.config.scheduler.cron.clone(),
            last_summary: state.last_summary,
        }
    }

    /// When the recurring trigger fires next, if armed.
    pub fn next_run(&self) -> Option<DateTime<Utc>> {
        if !self.armed.load(Ordering::SeqCst) {
            return None;
        }
        self.schedule
            .as_ref()
            .and_then(|s| s.upcoming(Utc).next())
    }

    /// Manual trigger: accepted immediately, run proceeds in background.
    /// Returns false when a run is already in flight.
    pub fn trigger_run(self: &Arc<Self>) -> bool {
        if self.run_active.load(Ordering::SeqCst) {
            warn!("trigger rejected: a backup run is already in flight");
            return false;
        }
        let scheduler = Arc::clone(self);
        thread::spawn(move || {
            scheduler.run_backup();
        });
        true
    }

    /// Execute one full backup run. Returns `None` when another run holds
    /// the in-flight guard.
    pub fn run_backup(&self) -> Option<RunSummary> {
        if self
            .run_active
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            warn!("backup run skipped: another run is already in flight");
            return None;
        }

        let summary = self.execute_run();
        self.run_active.store(false, Ordering::SeqCst);
        Some(summary)
    }

    fn execute_run(&self) -> RunSummary {
        self.state.lock().unwrap().last_run = Some(Utc::now());
        info!("starting backup run");

        let mut devices = self.collect_devices();
        let total = devices.len() as u32;

        if devices.is_empty() {
            warn!("no devices loaded from inventory sources");
            return self.finish_run(RunSummary::default());
        }

        let sinks = self.resolve_sinks();
        if sinks.is_empty() {
            error!("no storage sinks resolved; device backups skipped");
            return self.finish_run(RunSummary {
                total,
                ..Default::default()
            });
        }

        let outcomes = self.run_pool(&devices, &sinks);

        let now = Utc::now();
        let mut summary = RunSummary {
            total,
            ..Default::default()
        };
        for (device, outcome) in devices.iter_mut().zip(&outcomes) {
            match outcome {
                DeviceOutcome::Success | DeviceOutcome::Degraded => {
                    device.last_backup = Some(now);
                    summary.success += 1;
                    if *outcome == DeviceOutcome::Degraded {
                        summary.degraded += 1;
                    }
                }
                DeviceOutcome::Failed => summary.failed += 1,
            }
        }

        // The full fleet is upserted regardless of backup outcome; the
        // sweep is cache hygiene and runs even when every device failed.
        if let Err(e) = self.cache.upsert_many(&devices) {
            error!("failed to update device cache: {:#}", e);
        }
        self.sweep();

        self.finish_run(summary)
    }

    fn finish_run(&self, summary: RunSummary) -> RunSummary {
        self.state.lock().unwrap().last_summary = Some(summary);
        info!(
            "backup run completed: {} succeeded ({} degraded), {} failed, {} total",
            summary.success, summary.degraded, summary.failed, summary.total
        );
        summary
    }

    /// Back up every device over a pool bounded by `max_workers`.
    fn run_pool(&self, devices: &[Device], sinks: &[Arc<dyn StorageSink>]) -> Vec<DeviceOutcome> {
        let workers = self.config.scheduler.max_workers.min(devices.len().max(1));
        match rayon::ThreadPoolBuilder::new().num_threads(workers).build() {
            Ok(pool) => pool.install(|| {
                devices
                    .par_iter()
                    .map(|device| self.backup_one(device, sinks))
                    .collect()
            }),
            Err(e) => {
                error!("failed to build worker pool, running sequentially: {}", e);
                devices
                    .iter()
                    .map(|device| self.backup_one(device, sinks))
                    .collect()
            }
        }
    }

    /// One device end to end: model, pipeline, sink fan-out. Every failure
    /// is contained here so one device can never abort the run.
    fn backup_one(&self, device: &Device, sinks: &[Arc<dyn StorageSink>]) -> DeviceOutcome {
        let model = match self.registry.resolve_model(&device.device_type) {
            Ok(model) => model,
            Err(e) => {
                error!("{}: {}", device.name, e);
                return DeviceOutcome::Failed;
            }
        };

        let snapshot = match self.engine.backup_device(device, model.as_ref()) {
            Ok(snapshot) => snapshot,
            // already logged per failure category by the pipeline
            Err(_) => return DeviceOutcome::Failed,
        };

        let mut sink_failures = 0;
        for sink in sinks {
            if let Err(e) = sink.store(device, &snapshot) {
                error!("failed to store {} snapshot in {}: {}", device.name, sink.name(), e);
                sink_failures += 1;
            }
        }

        if sink_failures == 0 {
            DeviceOutcome::Success
        } else {
            warn!(
                "{}: snapshot captured but {} of {} sinks failed",
                device.name,
                sink_failures,
                sinks.len()
            );
            DeviceOutcome::Degraded
        }
    }

    /// Query every configured source. Failures exclude only the failing
    /// source; duplicate names keep the first occurrence.
    fn collect_devices(&self) -> Vec<Device> {
        let mut devices = Vec::new();
        let mut seen = HashSet::new();

        for spec in &self.config.sources {
            let source = match self.registry.resolve_source(&spec.type_name, &spec.config) {
                Ok(source) => source,
                Err(e) => {
                    error!("{}", e);
                    continue;
                }
            };

            match source.devices() {
                Ok(list) => {
                    info!("loaded {} devices from source '{}'", list.len(), spec.type_name);
                    for device in list {
                        if seen.insert(device.name.clone()) {
                            devices.push(device);
                        } else {
                            warn!("duplicate device '{}' ignored", device.name);
                        }
                    }
                }
                Err(e) => error!("failed to load devices from '{}': {:#}", spec.type_name, e),
            }
        }

        devices
    }

    /// Resolve every configured sink; a resolution failure excludes only
    /// that sink.
    fn resolve_sinks(&self) -> Vec<Arc<dyn StorageSink>> {
        let mut sinks = Vec::new();
        for spec in &self.config.sinks {
            match self.registry.resolve_sink(&spec.type_name, &spec.config) {
                Ok(sink) => sinks.push(sink),
                Err(e) => error!("{}", e),
            }
        }
        sinks
    }

    fn sweep(&self) {
        let window = chrono::Duration::hours(self.config.global.stale_after_hours as i64);
        match self.cache.remove_stale(window) {
            Ok(0) => {}
            Ok(n) => info!("staleness sweep removed {} devices", n),
            Err(e) => error!("staleness sweep failed: {:#}", e),
        }
    }

    /// Inventory sync without backups: refresh the cache from every source
    /// and sweep stale entries. Returns the number of devices seen.
    pub fn sync_devices(&self) -> usize {
        info!("syncing devices from inventory sources");
        let devices = self.collect_devices();

        if !devices.is_empty() {
            if let Err(e) = self.cache.upsert_many(&devices) {
                error!("failed to update device cache: {:#}", e);
            }
        }
        self.sweep();

        devices.len()
    }

    /// On-demand backup of one cached device, bypassing inventory sync.
    pub fn backup_single(&self, name: &str) -> Result<()> {
        let mut device = self
            .cache
            .get(name)?
            .with_context(|| format!("device '{}' not found in cache (try 'cfgsnap sync')", name))?;

        let sinks = self.resolve_sinks();
        if sinks.is_empty() {
            anyhow::bail!("no storage sinks resolved");
        }

        match self.backup_one(&device, &sinks) {
            DeviceOutcome::Failed => anyhow::bail!("backup failed for device '{}'", name),
            outcome => {
                device.last_backup = Some(Utc::now());
                self.cache.upsert_many(&[device])?;
                if outcome == DeviceOutcome::Degraded {
                    warn!("device '{}' backed up with degraded storage", name);
                }
                Ok(())
            }
        }
    }

    /// Daemon loop: sleep until the next cron occurrence, run, repeat.
    /// Returns when [`Scheduler::shutdown`] is called (after finishing any
    /// run in progress) or when no schedule is configured.
    pub fn run_loop(&self) {
        let Some(schedule) = &self.schedule else {
            info!("no cron schedule configured; nothing to do");
            return;
        };

        info!(
            "scheduler loop started (cron '{}')",
            self.config.scheduler.cron.as_deref().unwrap_or_default()
        );

        while !self.stop_loop.load(Ordering::SeqCst) {
            let Some(next) = schedule.upcoming(Utc).next() else {
                warn!("cron schedule has no future occurrences");
                return;
            };

            // short sleep slices so stop/shutdown are honored promptly
            while Utc::now() < next {
                if self.stop_loop.load(Ordering::SeqCst) {
                    return;
                }
                thread::sleep(Duration::from_millis(500));
            }

            if self.armed.load(Ordering::SeqCst) {
                self.run_backup();
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_run_summary_default_is_all_zero() {
        let summary = RunSummary::default();
        assert_eq!(summary.success, 0);
        assert_eq!(summary.failed, 0);
        assert_eq!(summary.total, 0);
    }
}
