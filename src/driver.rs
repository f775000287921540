/*!
 # Driving loop

 Once per tick: reload the alarms from the store, read the clock once,
 compute the combined brightness and hand it to the sink.
*/

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::RwLock;
use tokio::time::{self, MissedTickBehavior};
use tracing::{debug, error, info, instrument, warn};

use crate::alarm_set::AlarmSet;
use crate::clock::Clock;
use crate::ramp::RampConfig;
use crate::sink::BrightnessSink;
use crate::store::AlarmStore;
use crate::Result;

/// Alarm set shared between the driver and any reader holding `Driver::alarms`
pub type SharedAlarms = Arc<RwLock<AlarmSet>>;

pub struct Driver<C, S, K> {
    clock: C,
    store: S,
    sink: K,
    ramp: RampConfig,
    alarms: SharedAlarms,
}

impl<C, S, K> Driver<C, S, K>
where
    C: Clock,
    S: AlarmStore,
    K: BrightnessSink,
{
    pub fn new(clock: C, store: S, sink: K, ramp: RampConfig) -> Self {
        Self {
            clock,
            store,
            sink,
            ramp,
            alarms: SharedAlarms::default(),
        }
    }

    pub fn alarms(&self) -> SharedAlarms {
        Arc::clone(&self.alarms)
    }

    pub fn sink(&self) -> &K {
        &self.sink
    }

    /// Replaces the shared alarm set with the store's current content.
    ///
    /// The new set is built before the write lock is taken, so readers only
    /// ever see a complete set.
    pub fn reload(&self) -> Result<usize> {
        let set: AlarmSet = self.store.load_all()?.into_iter().collect();
        let count = set.len();
        *self.alarms.write() = set;
        Ok(count)
    }

    /// Brightness the light should have right now
    pub fn compute(&self) -> Result<u8> {
        let now = self.clock.now();
        let level = self.alarms.read().desired_brightness(now, &self.ramp)?;
        Ok(level.min(100))
    }

    /// One poll, compute and actuate cycle; returns the level sent to the sink
    #[instrument(skip(self))]
    pub async fn tick(&mut self) -> Result<u8> {
        if let Err(e) = self.reload() {
            warn!("Failed to reload alarms, keeping previous set: {}", e);
        }

        let brightness = self.compute().unwrap_or_else(|e| {
            error!("Failed to compute brightness, turning light off: {}", e);
            0
        });

        debug!("Setting brightness to: {}%", brightness);
        self.sink.set(brightness).await?;
        Ok(brightness)
    }

    /// Ticks every `period` until `shutdown` completes, then turns the light
    /// off
    pub async fn run<F>(&mut self, period: Duration, shutdown: F) -> Result<()>
    where
        F: Future<Output = ()>,
    {
        info!("Starting driver with {:?} tick interval", period);
        let mut interval = time::interval(period);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
        tokio::pin!(shutdown);

        loop {
            tokio::select! {
                _ = &mut shutdown => break,
                _ = interval.tick() => {
                    if let Err(e) = self.tick().await {
                        error!("Failed to update light: {}", e);
                    }
                }
            }
        }

        info!("Shutting down, turning light off");
        self.sink.set(0).await?;
        Ok(())
    }
}
