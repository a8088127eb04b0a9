//! The background polling task.
//!
//! [`PollingTask::run`] reads the sensor, sleeps for the configured interval
//! and repeats until its [`StopToken`] is raised. It is meant to run at a
//! lower priority than the audio callback: on an embassy executor, spawn it
//! from a low-priority task; on a hosted target, drive it with
//! `embassy_futures::block_on` on its own thread. The sleep comes from the
//! injected [`DelayNs`], which is `embassy_time::Delay` on hardware.

use core::fmt::Debug;
use core::sync::atomic::{AtomicBool, Ordering};

use embassy_time::Duration;
use embedded_hal_async::delay::DelayNs;
use embedded_hal_async::i2c::{self, I2c, SevenBitAddress};

use crate::error::TransferError;
use crate::touch::TrillSensor;

/// Consecutive failed reads after which an error is logged.
pub const FAILURE_STREAK_ALERT: u32 = 100;

/// Cooperative cancellation shared between the supervisor and the polling task.
///
/// The stop flag is set once and never cleared.
#[derive(Debug, Default)]
pub struct StopToken {
    stop: AtomicBool,
    exited: AtomicBool,
}

impl StopToken {
    /// A token with no stop requested.
    pub const fn new() -> Self {
        Self {
            stop: AtomicBool::new(false),
            exited: AtomicBool::new(false),
        }
    }

    /// Asks the polling task to finish after its current iteration.
    pub fn request_stop(&self) {
        self.stop.store(true, Ordering::Release);
    }

    /// Whether a stop has been requested.
    pub fn is_stop_requested(&self) -> bool {
        self.stop.load(Ordering::Acquire)
    }

    /// Whether the polling task has returned.
    pub fn has_exited(&self) -> bool {
        self.exited.load(Ordering::Acquire)
    }

    fn mark_exited(&self) {
        self.exited.store(true, Ordering::Release);
    }
}

/// Counters kept by the polling task, returned when it exits.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PollStats {
    /// Successful reads.
    pub reads: u32,
    /// Failed reads.
    pub failures: u32,
    /// Failed reads since the last success.
    pub consecutive_failures: u32,
    /// Longest run of failed reads seen.
    pub longest_failure_streak: u32,
}

impl PollStats {
    fn record<E: Debug>(&mut self, result: &Result<(), TransferError<E>>) {
        match result {
            Ok(()) => {
                if self.consecutive_failures > 0 {
                    log::info!(
                        "poll: sensor back after {} failed reads",
                        self.consecutive_failures
                    );
                }
                self.reads = self.reads.wrapping_add(1);
                self.consecutive_failures = 0;
            }
            Err(err) => {
                self.failures = self.failures.wrapping_add(1);
                self.consecutive_failures = self.consecutive_failures.saturating_add(1);
                self.longest_failure_streak =
                    self.longest_failure_streak.max(self.consecutive_failures);
                match self.consecutive_failures {
                    1 => log::warn!("poll: {err}"),
                    FAILURE_STREAK_ALERT => log::error!(
                        "poll: {FAILURE_STREAK_ALERT} consecutive failed reads, last: {err}"
                    ),
                    _ => {}
                }
            }
        }
    }
}

/// Repeatedly reads a sensor until stopped.
pub struct PollingTask<
    'a,
    I2cType: I2c<SevenBitAddress, Error = ErrorType>,
    ErrorType: i2c::Error,
    D: DelayNs,
> {
    sensor: TrillSensor<'a, I2cType, ErrorType>,
    delay: D,
    stop: &'a StopToken,
    sleep: Duration,
}

impl<'a, I2cType, ErrorType, D> PollingTask<'a, I2cType, ErrorType, D>
where
    I2cType: I2c<SevenBitAddress, Error = ErrorType>,
    ErrorType: i2c::Error,
    D: DelayNs,
{
    /// Creates a task polling `sensor` every `sleep`, using `delay` to wait.
    pub fn new(
        sensor: TrillSensor<'a, I2cType, ErrorType>,
        delay: D,
        stop: &'a StopToken,
        sleep: Duration,
    ) -> Self {
        Self {
            sensor,
            delay,
            stop,
            sleep,
        }
    }

    /// The polled sensor.
    pub fn sensor(&self) -> &TrillSensor<'a, I2cType, ErrorType> {
        &self.sensor
    }

    /// Polls until the stop token is raised, then returns the counters.
    ///
    /// The flag is checked before every read, so after a stop request the
    /// task returns within one sleep plus one bus transaction and never
    /// publishes again. Failed reads are logged and skipped.
    pub async fn run(mut self) -> PollStats {
        let sleep_us = u32::try_from(self.sleep.as_micros()).unwrap_or(u32::MAX);
        log::debug!(
            "poll: {:?} at {:#04x}, {sleep_us}us between reads",
            self.sensor.device_type(),
            self.sensor.address()
        );

        let mut stats = PollStats::default();
        while !self.stop.is_stop_requested() {
            let result = self.sensor.read_once().await;
            stats.record(&result);
            self.delay.delay_us(sleep_us).await;
        }

        self.stop.mark_exited();
        log::info!(
            "poll: stopped after {} reads, {} failures",
            stats.reads,
            stats.failures
        );
        stats
    }
}
