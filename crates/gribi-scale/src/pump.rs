//! Rate-limited streaming of prebuilt entries.

use crate::client::RibClient;
use crate::config::PumpConfig;
use crate::entry::Entry;
use crate::error::{Result, ScaleError};
use log::{debug, info};
use serde::Serialize;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct PumpStats {
    pub chunks_sent: usize,
    pub entries_sent: usize,
    /// True if the pump stopped on cancellation with entries left unsent
    pub cancelled: bool,
}

/// Sends a fixed number of entries per tick until done or cancelled.
///
/// The first chunk goes out one full tick after [`RatePump::run`] starts.
/// Cancellation abandons whatever has not been sent; nothing already sent is
/// rolled back.
pub struct RatePump {
    config: PumpConfig,
}

impl RatePump {
    pub fn new(config: PumpConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &PumpConfig {
        &self.config
    }

    pub async fn run(
        &self,
        client: &dyn RibClient,
        entries: &[Entry],
        cancel: CancellationToken,
    ) -> Result<PumpStats> {
        let period = self.config.tick();
        let mut ticker = interval_at(Instant::now() + period, period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        let mut stats = PumpStats::default();
        info!(
            "pumping {} entries at {} per {:?}",
            entries.len(),
            self.config.ops_per_tick,
            period
        );

        for chunk in entries.chunks(self.config.ops_per_tick.max(1)) {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    stats.cancelled = true;
                    info!(
                        "pump cancelled after {} entries, {} unsent",
                        stats.entries_sent,
                        entries.len() - stats.entries_sent
                    );
                    break;
                }
                _ = ticker.tick() => {
                    client
                        .add_entries(chunk, None)
                        .await
                        .map_err(|source| ScaleError::Transaction {
                            phase: "pump".to_string(),
                            batches: Vec::new(),
                            source,
                        })?;
                    stats.chunks_sent += 1;
                    stats.entries_sent += chunk.len();
                    debug!("pump chunk {}: {} entries", stats.chunks_sent, chunk.len());
                }
            }
        }

        Ok(stats)
    }
}
