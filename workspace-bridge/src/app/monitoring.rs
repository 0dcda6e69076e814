use crate::telemetry::{BackendLabels, BridgeMetrics};
use opentelemetry_sdk::metrics::SdkMeterProvider;
use std::sync::Arc;
use std::time::Duration;
use sysinfo::{Pid, ProcessesToUpdate, System};
use tokio::time::{self, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, warn};

pub const DEFAULT_MONITORING_INTERVAL: Duration = Duration::from_secs(5);

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct MemorySample {
    /// Virtual memory reserved by the process.
    pub max_bytes: u64,
    /// Resident set size.
    pub used_bytes: u64,
}

pub struct MemoryProbe {
    system: System,
    pid: Pid,
}

impl MemoryProbe {
    pub fn current_process() -> Result<Self, String> {
        let pid = sysinfo::get_current_pid().map_err(str::to_string)?;
        Ok(Self {
            system: System::new(),
            pid,
        })
    }

    pub fn sample(&mut self) -> Option<MemorySample> {
        self.system
            .refresh_processes(ProcessesToUpdate::Some(&[self.pid]), true);
        self.system.process(self.pid).map(|process| MemorySample {
            max_bytes: process.virtual_memory(),
            used_bytes: process.memory(),
        })
    }
}

/// Pushes backend memory gauges every `interval` and flushes them right away.
pub async fn run_memory_monitor(
    metrics: Arc<BridgeMetrics>,
    provider: Option<SdkMeterProvider>,
    labels: BackendLabels,
    interval: Duration,
    cancel: CancellationToken,
) {
    let mut probe = match MemoryProbe::current_process() {
        Ok(probe) => probe,
        Err(err) => {
            error!(%err, "memory monitoring unavailable");
            return;
        }
    };
    let mut ticker = time::interval(interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => break,
            _ = ticker.tick() => {}
        }

        match probe.sample() {
            Some(sample) => {
                metrics.record_memory(sample.max_bytes, sample.used_bytes, &labels);
                debug!(
                    max_bytes = sample.max_bytes,
                    used_bytes = sample.used_bytes,
                    "backend memory sampled"
                );
            }
            None => warn!("backend process not found while sampling memory"),
        }

        if let Some(provider) = provider.clone() {
            let flushed = tokio::task::spawn_blocking(move || provider.force_flush()).await;
            match flushed {
                Ok(Ok(())) => {}
                Ok(Err(err)) => error!(%err, "failed to push memory metrics"),
                Err(err) => error!(%err, "memory metrics flush task failed"),
            }
        }
    }
    debug!("memory monitor stopped");
}
