//! An asynchronous, `no_std` driver for capacitive touch sensors that feeds an
//! audio callback.
//!
//! Two contexts cooperate:
//!
//! * a background [`PollingTask`] that talks to the sensor over a shared I2C
//!   bus, may block on slow transfers, and sleeps between reads;
//! * a real-time [`ReportScheduler`], called once per audio block, that
//!   counts frames and periodically formats the latest sensor state without
//!   ever blocking.
//!
//! Decoded frames travel from the first to the second through a lock-free
//! [`StateCell`]. A [`Supervisor`] probes the device, wires both halves
//! together and tracks the lifecycle until a [`StopToken`] ends polling.
//!
//! # Usage
//!
//! The polling task may block on the bus, so it runs apart from the audio
//! callback: here on its own thread, on hardware in a low-priority embassy
//! task. A runnable host version lives in `examples/custom_address.rs`.
//!
//! ```no_run
//! # use embedded_hal_async::i2c::{ErrorKind, ErrorType, I2c, Operation};
//! # struct Bus;
//! # impl ErrorType for Bus {
//! #     type Error = ErrorKind;
//! # }
//! # impl I2c for Bus {
//! #     async fn transaction(&mut self, _: u8, _: &mut [Operation<'_>]) -> Result<(), ErrorKind> {
//! #         Ok(())
//! #     }
//! # }
//! use embassy_futures::block_on;
//! use embassy_time::Delay;
//! use embedded_bus_async::SharedI2cBus;
//! use static_cell::StaticCell;
//! use trill_touch_async::{
//!     DeviceConfig, DeviceType, ScanMode, SetupParams, StateCell, StopToken, Supervisor,
//! };
//!
//! static STOP: StopToken = StopToken::new();
//! static CELL: StaticCell<StateCell> = StaticCell::new();
//!
//! # fn main() { block_on(async {
//! # let i2c = Bus;
//! // A bar on bus 1 whose address jumpers select 0x21 instead of 0x20.
//! let bus = SharedI2cBus::new(1, i2c);
//! let params = SetupParams::new(
//!     DeviceConfig::new(1, DeviceType::Bar)
//!         .with_scan_mode(ScanMode::Auto)
//!         .with_address(0x21),
//! );
//!
//! let mut supervisor = Supervisor::new(&STOP);
//! let cell = CELL.init(StateCell::new());
//! let mut scheduler = match supervisor.setup(&bus, cell, &params, 44_100.0).await {
//!     Ok(scheduler) => scheduler,
//!     Err(err) => {
//!         log::error!("Unable to initialise touch sensor: {err}");
//!         return;
//!     }
//! };
//! supervisor
//!     .start_polling(Delay, |task| {
//!         std::thread::spawn(move || block_on(task.run()));
//!         Ok::<(), ()>(())
//!     })
//!     .unwrap();
//!
//! // In the audio callback, once per block of 64 frames:
//! scheduler.render(64, &mut |line: &str| print!("{line}"));
//! # }) }
//! ```

#![cfg_attr(not(test), no_std)]
#![deny(missing_docs)]

pub mod config;
pub mod decode;
pub mod device;
pub mod error;
pub mod poll;
pub mod report;
pub mod state;
pub mod supervisor;
pub mod touch;

#[cfg(test)]
mod mock;

pub use config::{DeviceConfig, SetupParams};
pub use device::{DecodeMode, DeviceType, ScanMode};
pub use error::{SetupError, StartError, TransferError};
pub use poll::{PollStats, PollingTask, StopToken};
pub use report::{threshold_frames, ReportCounter, ReportScheduler, ReportSink};
pub use state::{DecodedState, StateCell, StatePublisher, StateReader, TouchEvent};
pub use supervisor::{Lifecycle, Supervisor};
pub use touch::TrillSensor;
