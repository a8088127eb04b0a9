//! Setup parameters.

use embassy_time::Duration;

use crate::device::{DeviceType, ScanMode};

/// Identifies one sensor on one bus.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeviceConfig {
    /// The bus the device is wired to.
    pub bus_id: u8,
    /// The expected family. Setup fails if another family answers.
    pub device_type: DeviceType,
    /// Requested scan mode.
    pub scan_mode: ScanMode,
    /// 7-bit address. `None` uses the family's default address.
    pub address: Option<u8>,
}

impl DeviceConfig {
    /// A config for `device_type` on `bus_id` at its default address, in auto mode.
    pub fn new(bus_id: u8, device_type: DeviceType) -> Self {
        Self {
            bus_id,
            device_type,
            scan_mode: ScanMode::Auto,
            address: None,
        }
    }

    /// Overrides the default address.
    pub fn with_address(mut self, address: u8) -> Self {
        self.address = Some(address);
        self
    }

    /// Selects the scan mode.
    pub fn with_scan_mode(mut self, scan_mode: ScanMode) -> Self {
        self.scan_mode = scan_mode;
        self
    }

    /// The address setup will probe.
    pub fn resolved_address(&self) -> u8 {
        self.address.unwrap_or_else(|| self.device_type.default_address())
    }
}

/// Everything the supervisor needs to bring a sensor up.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SetupParams {
    /// The sensor to talk to.
    pub device: DeviceConfig,
    /// Seconds between two report lines. `0.0` reports on every audio block.
    pub report_interval_s: f32,
    /// Pause between two bus reads of the polling task.
    pub poll_sleep: Duration,
}

impl Default for SetupParams {
    fn default() -> Self {
        Self {
            device: DeviceConfig::new(1, DeviceType::Bar),
            report_interval_s: 0.1,
            poll_sleep: Duration::from_micros(12_000),
        }
    }
}

impl SetupParams {
    /// Default parameters for `device`.
    pub fn new(device: DeviceConfig) -> Self {
        Self {
            device,
            ..Self::default()
        }
    }

    /// Sets the report interval in seconds.
    pub fn with_report_interval(mut self, seconds: f32) -> Self {
        self.report_interval_s = seconds;
        self
    }

    /// Sets the pause between two polls.
    pub fn with_poll_sleep(mut self, poll_sleep: Duration) -> Self {
        self.poll_sleep = poll_sleep;
        self
    }
}
