//! A bar whose address jumpers select 0x21 instead of its default 0x20.
//!
//! Every family has its own default address (bar 0x20, square 0x28, craft
//! 0x30, ring 0x38, hex 0x40, flex 0x48). Two sensors of the same family on
//! one bus need different addresses, so the address is given explicitly
//! and overrides the default.
//!
//! The bar is simulated on the host with one finger sweeping along it. The
//! main thread plays a 44.1 kHz audio callback and prints the touches every
//! 100 ms, while the poller reads the bar every 12 ms on its own thread.

use std::time::Duration as StdDuration;

use embassy_futures::block_on;
use embassy_time::{Delay, Duration};
use embedded_bus_async::SharedI2cBus;
use embedded_hal_async::i2c::{
    ErrorKind, ErrorType, I2c, NoAcknowledgeSource, Operation, SevenBitAddress,
};
use static_cell::StaticCell;
use trill_touch_async::{
    DeviceConfig, DeviceType, ScanMode, SetupParams, StateCell, StopToken, Supervisor,
};

const ADDRESS: u8 = 0x21;
const SAMPLE_RATE: f32 = 44_100.0;
const BLOCK_FRAMES: usize = 64;
const RUN_SECONDS: f32 = 2.0;

static STOP: StopToken = StopToken::new();
static CELL: StaticCell<StateCell> = StaticCell::new();

/// A bar at [`ADDRESS`] with one finger moving from end to end.
struct SweepingBar {
    identify_pending: bool,
    position: u16,
}

impl ErrorType for SweepingBar {
    type Error = ErrorKind;
}

impl I2c for SweepingBar {
    async fn transaction(
        &mut self,
        address: SevenBitAddress,
        operations: &mut [Operation<'_>],
    ) -> Result<(), Self::Error> {
        if address != ADDRESS {
            return Err(ErrorKind::NoAcknowledge(NoAcknowledgeSource::Address));
        }
        for op in operations {
            match op {
                Operation::Write(bytes) => {
                    if bytes.starts_with(&[0x00, 0x08]) {
                        self.identify_pending = true;
                    }
                }
                Operation::Read(buf) if self.identify_pending => {
                    self.identify_pending = false;
                    buf[..3].copy_from_slice(&[0xFE, DeviceType::Bar.id(), 1]);
                }
                Operation::Read(buf) => {
                    // One location then four empty slots, followed by five sizes.
                    let words = [self.position, 0xFFFF, 0xFFFF, 0xFFFF, 0xFFFF, 1500, 0, 0, 0, 0];
                    for (chunk, word) in buf.chunks_mut(2).zip(words) {
                        chunk.copy_from_slice(&word.to_be_bytes());
                    }
                    self.position = (self.position + 40) % 3200;
                }
            }
        }
        Ok(())
    }
}

fn main() {
    let bus = SharedI2cBus::new(
        1,
        SweepingBar {
            identify_pending: false,
            position: 0,
        },
    );
    let params = SetupParams::new(
        DeviceConfig::new(1, DeviceType::Bar)
            .with_scan_mode(ScanMode::Auto)
            .with_address(ADDRESS),
    )
    .with_report_interval(0.1)
    .with_poll_sleep(Duration::from_micros(12_000));

    let mut supervisor = Supervisor::new(&STOP);
    let cell = CELL.init(StateCell::new());
    let mut scheduler = match block_on(supervisor.setup(&bus, cell, &params, SAMPLE_RATE)) {
        Ok(scheduler) => scheduler,
        Err(err) => {
            eprintln!("Unable to initialise touch sensor. Is the address correct? {err}");
            return;
        }
    };

    let mut poller = None;
    supervisor
        .start_polling(Delay, |task| {
            poller = Some(std::thread::spawn(move || block_on(task.run())));
            Ok::<(), ()>(())
        })
        .unwrap();

    let block = StdDuration::from_secs_f32(BLOCK_FRAMES as f32 / SAMPLE_RATE);
    let blocks = (RUN_SECONDS * SAMPLE_RATE) as usize / BLOCK_FRAMES;
    for _ in 0..blocks {
        scheduler.render(BLOCK_FRAMES, &mut |line: &str| print!("{line}"));
        std::thread::sleep(block);
    }

    supervisor.request_stop();
    if let Some(poller) = poller {
        let stats = poller.join().unwrap();
        println!("Stopped after {} reads, {} failures", stats.reads, stats.failures);
    }
}
