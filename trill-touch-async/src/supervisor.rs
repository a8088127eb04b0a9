//! Device lifecycle: setup, spawning the poller and shutdown.

use embassy_time::Duration;
use embedded_bus_async::{RwLockI2cDevice, SharedI2cBus};
use embedded_hal_async::delay::DelayNs;
use embedded_hal_async::i2c::{self, I2c, SevenBitAddress};

use crate::config::SetupParams;
use crate::error::{SetupError, StartError};
use crate::poll::{PollingTask, StopToken};
use crate::report::{threshold_frames, ReportScheduler};
use crate::state::StateCell;
use crate::touch::TrillSensor;

/// Where a supervised sensor is in its life.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Lifecycle {
    /// Not set up, or setup failed.
    Uninitialized,
    /// Setup succeeded; no poller yet.
    Initialized,
    /// The polling task has been spawned.
    Polling,
    /// The polling task saw the stop request and returned. Terminal.
    Stopped,
}

/// The sensor driver type used on a shared bus.
pub type SharedTrillSensor<'a, I2cType, ErrorType> =
    TrillSensor<'a, RwLockI2cDevice<I2cType, ErrorType>, ErrorType>;

/// The polling task type produced by [`Supervisor::start_polling`].
pub type SharedPollingTask<'a, I2cType, ErrorType, D> =
    PollingTask<'a, RwLockI2cDevice<I2cType, ErrorType>, ErrorType, D>;

/// Owns one sensor from setup until its poller stops.
///
/// The supervisor replaces process-wide state: the frame counter lives in
/// the [`ReportScheduler`] it returns to the audio callback, and the poller
/// is handed to a caller-supplied spawn function.
pub struct Supervisor<'a, I2cType, ErrorType>
where
    I2cType: I2c<SevenBitAddress, Error = ErrorType>,
    ErrorType: i2c::Error,
{
    stop: &'a StopToken,
    sensor: Option<SharedTrillSensor<'a, I2cType, ErrorType>>,
    poll_sleep: Duration,
    spawned: bool,
}

impl<'a, I2cType, ErrorType> Supervisor<'a, I2cType, ErrorType>
where
    I2cType: I2c<SevenBitAddress, Error = ErrorType>,
    ErrorType: i2c::Error,
{
    /// Creates an uninitialized supervisor stopped through `stop`.
    pub fn new(stop: &'a StopToken) -> Self {
        Self {
            stop,
            sensor: None,
            poll_sleep: SetupParams::default().poll_sleep,
            spawned: false,
        }
    }

    /// The current lifecycle state.
    pub fn lifecycle(&self) -> Lifecycle {
        if self.spawned {
            if self.stop.has_exited() {
                Lifecycle::Stopped
            } else {
                Lifecycle::Polling
            }
        } else if self.sensor.is_some() {
            Lifecycle::Initialized
        } else {
            Lifecycle::Uninitialized
        }
    }

    /// The sensor, between setup and spawning the poller.
    pub fn sensor(&self) -> Option<&SharedTrillSensor<'a, I2cType, ErrorType>> {
        self.sensor.as_ref()
    }

    /// Brings the sensor described by `params` up on `bus`.
    ///
    /// Reserves the address on the bus, probes the device, and computes the
    /// report threshold from `sample_rate`. On success the returned
    /// scheduler belongs in the audio callback. On failure the supervisor
    /// stays uninitialized, the address is released and nothing is spawned.
    /// `cell` stays borrowed either way, so a retry needs a fresh cell.
    pub async fn setup(
        &mut self,
        bus: &SharedI2cBus<I2cType, ErrorType>,
        cell: &'a mut StateCell,
        params: &SetupParams,
        sample_rate: f32,
    ) -> Result<ReportScheduler<'a>, SetupError<ErrorType>> {
        if self.lifecycle() != Lifecycle::Uninitialized {
            return Err(SetupError::AlreadyInitialized);
        }

        let result = self.try_setup(bus, cell, params, sample_rate).await;
        if let Err(err) = &result {
            log::error!(
                "Unable to initialise touch sensor on bus {} at {:#04x}: {err}",
                params.device.bus_id,
                params.device.resolved_address()
            );
        }
        result
    }

    async fn try_setup(
        &mut self,
        bus: &SharedI2cBus<I2cType, ErrorType>,
        cell: &'a mut StateCell,
        params: &SetupParams,
        sample_rate: f32,
    ) -> Result<ReportScheduler<'a>, SetupError<ErrorType>> {
        let config = &params.device;
        if config.bus_id != bus.id() {
            return Err(SetupError::WrongBus {
                expected: config.bus_id,
                actual: bus.id(),
            });
        }
        let threshold = threshold_frames(sample_rate, params.report_interval_s)
            .ok_or(SetupError::InvalidInterval)?;

        let device = bus.device(config.resolved_address())?;
        let (sensor, reader) = TrillSensor::setup(device, config, cell).await?;
        log::debug!("supervisor: reporting every {threshold} frames");

        self.poll_sleep = params.poll_sleep;
        self.sensor = Some(sensor);
        Ok(ReportScheduler::new(reader, threshold))
    }

    /// Hands the polling task to `spawn` and enters [`Lifecycle::Polling`].
    ///
    /// `spawn` decides where the task runs: an embassy task, a thread driving
    /// it with `block_on`, or any other low-priority job queue. If `spawn`
    /// fails the task, and with it the sensor, is dropped.
    pub fn start_polling<D, S, F>(&mut self, delay: D, spawn: F) -> Result<(), StartError<S>>
    where
        D: DelayNs,
        F: FnOnce(SharedPollingTask<'a, I2cType, ErrorType, D>) -> Result<(), S>,
    {
        let sensor = self.sensor.take().ok_or(StartError::NotInitialized)?;
        spawn(PollingTask::new(sensor, delay, self.stop, self.poll_sleep))
            .map_err(StartError::Spawn)?;
        self.spawned = true;
        log::debug!("supervisor: polling task started");
        Ok(())
    }

    /// Raises the stop flag. The poller exits at its next check.
    pub fn request_stop(&self) {
        self.stop.request_stop();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::DeviceConfig;
    use crate::device::DeviceType;
    use crate::mock::MockTrill;
    use embassy_futures::block_on;

    struct NoDelay;

    impl DelayNs for NoDelay {
        async fn delay_ns(&mut self, _ns: u32) {}
    }

    fn bar_params(address: u8) -> SetupParams {
        SetupParams::new(DeviceConfig::new(1, DeviceType::Bar).with_address(address))
    }

    #[test]
    fn walks_through_the_whole_lifecycle() {
        let stop = StopToken::new();
        let bus = SharedI2cBus::new(1, MockTrill::new(0x21, DeviceType::Bar));
        let mut cell = StateCell::new();
        let mut supervisor = Supervisor::new(&stop);
        assert_eq!(supervisor.lifecycle(), Lifecycle::Uninitialized);

        let scheduler =
            block_on(supervisor.setup(&bus, &mut cell, &bar_params(0x21), 44_100.0)).unwrap();
        assert_eq!(scheduler.counter().threshold_frames(), 4410);
        assert_eq!(supervisor.lifecycle(), Lifecycle::Initialized);
        assert_eq!(supervisor.sensor().map(|s| s.address()), Some(0x21));

        let mut task = None;
        supervisor
            .start_polling(NoDelay, |t| {
                task = Some(t);
                Ok::<(), ()>(())
            })
            .unwrap();
        assert_eq!(supervisor.lifecycle(), Lifecycle::Polling);

        supervisor.request_stop();
        let stats = block_on(task.unwrap().run());
        assert_eq!(stats.reads, 0);
        assert_eq!(supervisor.lifecycle(), Lifecycle::Stopped);
    }

    #[test]
    fn failed_setup_stays_uninitialized_and_cannot_spawn() {
        let stop = StopToken::new();
        let bus = SharedI2cBus::new(1, MockTrill::new(0x20, DeviceType::Bar));
        let mut cell = StateCell::new();
        let mut supervisor = Supervisor::new(&stop);

        let result = block_on(supervisor.setup(&bus, &mut cell, &bar_params(0x21), 44_100.0));
        assert!(matches!(result, Err(SetupError::DeviceNotFound { address: 0x21 })));
        assert_eq!(supervisor.lifecycle(), Lifecycle::Uninitialized);
        assert!(!bus.is_claimed(0x21));

        let mut spawned = false;
        let start = supervisor.start_polling(NoDelay, |_| {
            spawned = true;
            Ok::<(), ()>(())
        });
        assert_eq!(start, Err(StartError::NotInitialized));
        assert!(!spawned);
    }

    #[test]
    fn failed_setup_can_be_retried_with_a_fresh_cell() {
        let stop = StopToken::new();
        let bus = SharedI2cBus::new(1, MockTrill::new(0x21, DeviceType::Bar));
        let mut first = StateCell::new();
        let mut second = StateCell::new();
        let mut supervisor = Supervisor::new(&stop);

        let wrong = block_on(supervisor.setup(&bus, &mut first, &bar_params(0x22), 44_100.0));
        assert!(matches!(wrong, Err(SetupError::DeviceNotFound { address: 0x22 })));
        assert!(!bus.is_claimed(0x22));

        let retry = block_on(supervisor.setup(&bus, &mut second, &bar_params(0x21), 44_100.0));
        assert!(retry.is_ok());
        assert_eq!(supervisor.lifecycle(), Lifecycle::Initialized);
    }

    #[test]
    fn second_setup_is_rejected() {
        let stop = StopToken::new();
        let bus = SharedI2cBus::new(1, MockTrill::new(0x21, DeviceType::Bar));
        let mut first = StateCell::new();
        let mut second = StateCell::new();
        let mut supervisor = Supervisor::new(&stop);

        assert!(block_on(supervisor.setup(&bus, &mut first, &bar_params(0x21), 48_000.0)).is_ok());
        let again = block_on(supervisor.setup(&bus, &mut second, &bar_params(0x21), 48_000.0));
        assert!(matches!(again, Err(SetupError::AlreadyInitialized)));
    }

    #[test]
    fn shared_address_cannot_be_set_up_twice() {
        let stop = StopToken::new();
        let bus = SharedI2cBus::new(1, MockTrill::new(0x21, DeviceType::Bar));
        let mut first_cell = StateCell::new();
        let mut second_cell = StateCell::new();
        let mut first = Supervisor::new(&stop);
        let mut second = Supervisor::new(&stop);

        assert!(block_on(first.setup(&bus, &mut first_cell, &bar_params(0x21), 44_100.0)).is_ok());
        let result = block_on(second.setup(&bus, &mut second_cell, &bar_params(0x21), 44_100.0));
        assert!(matches!(
            result,
            Err(SetupError::AddressInUse {
                bus_id: 1,
                address: 0x21
            })
        ));
        assert_eq!(second.lifecycle(), Lifecycle::Uninitialized);
    }

    #[test]
    fn config_for_another_bus_is_rejected() {
        let stop = StopToken::new();
        let bus = SharedI2cBus::new(0, MockTrill::new(0x21, DeviceType::Bar));
        let mut cell = StateCell::new();
        let mut supervisor = Supervisor::new(&stop);
        let result = block_on(supervisor.setup(&bus, &mut cell, &bar_params(0x21), 44_100.0));
        assert!(matches!(
            result,
            Err(SetupError::WrongBus {
                expected: 1,
                actual: 0
            })
        ));
    }

    #[test]
    fn negative_interval_is_rejected() {
        let stop = StopToken::new();
        let bus = SharedI2cBus::new(1, MockTrill::new(0x21, DeviceType::Bar));
        let mut cell = StateCell::new();
        let mut supervisor = Supervisor::new(&stop);
        let params = bar_params(0x21).with_report_interval(-0.5);
        let result = block_on(supervisor.setup(&bus, &mut cell, &params, 44_100.0));
        assert!(matches!(result, Err(SetupError::InvalidInterval)));
    }
}
