use log::{debug, error, info, warn};
use std::time::Duration;
use tokio::time::sleep;

use crate::config::DeviceConfig;
use crate::output::Publisher;
use crate::protocol::{decode_reading, Reading};
use crate::serial::CounterLink;
use crate::utils::error::BridgeError;

/// Where a cycle currently is.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Requesting,
    Reading,
    Decoding,
    Publishing,
    Sleeping,
    Failed,
}

/// Drives request, read, decode, publish and sleep, forever.
///
/// Serial, decode and fatal publish errors end the loop and are handed back
/// to the caller. A reading the publisher could not deliver is dropped and
/// the loop carries on after the usual sleep.
pub struct PollLoop {
    counter: Box<dyn CounterLink>,
    publisher: Publisher,
    interval: Duration,
    verbose: bool,
    phase: Phase,
    cycles: u64,
    dropped: u64,
}

impl PollLoop {
    pub fn new(counter: Box<dyn CounterLink>, publisher: Publisher, config: &DeviceConfig) -> Self {
        Self {
            counter,
            publisher,
            interval: config.poll_interval(),
            verbose: config.verbose,
            phase: Phase::Requesting,
            cycles: 0,
            dropped: 0,
        }
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn cycles(&self) -> u64 {
        self.cycles
    }

    pub fn dropped(&self) -> u64 {
        self.dropped
    }

    /// Only returns on a fatal error.
    pub async fn run(&mut self) -> Result<(), BridgeError> {
        info!("🔄 Starting CPM polling");
        info!("   ⏱️  Update interval: {:?}", self.interval);
        info!("   📏 Response width: {} bytes", self.counter.response_width());

        loop {
            if let Err(e) = self.run_cycle().await {
                error!(
                    "💥 Poll loop failed while {:?} after {} cycle(s): {}",
                    self.phase, self.cycles, e
                );
                self.phase = Phase::Failed;
                return Err(e);
            }
        }
    }

    /// One full cycle, including the trailing sleep.
    pub async fn run_cycle(&mut self) -> Result<Reading, BridgeError> {
        self.phase = Phase::Requesting;
        self.counter.send_query().await?;

        self.phase = Phase::Reading;
        let raw = self.counter.read_response().await?;

        self.phase = Phase::Decoding;
        let reading = decode_reading(&raw, self.counter.response_width())?;
        if self.verbose {
            info!("☢️  CPM: {}", reading.cpm);
        } else {
            debug!("☢️  CPM: {}", reading.cpm);
        }

        self.phase = Phase::Publishing;
        match self.publisher.publish(&reading).await.map_err(BridgeError::from) {
            Ok(()) => debug!("📤 Published reading #{}", self.publisher.published_count()),
            Err(e) if e.is_fatal() => return Err(e),
            Err(e) => {
                self.dropped += 1;
                warn!("📵 Reading of {} CPM dropped: {}", reading.cpm, e);
            }
        }

        self.phase = Phase::Sleeping;
        sleep(self.interval).await;

        self.cycles += 1;
        Ok(reading)
    }
}
