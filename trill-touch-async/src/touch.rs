//! Core implementation of the touch sensor driver.

use embedded_hal_async::i2c::{self, I2c, SevenBitAddress};

use crate::config::DeviceConfig;
use crate::decode::decode_into;
use crate::device::{DecodeMode, DeviceType, MAX_CHANNELS};
use crate::error::{SetupError, TransferError};
use crate::state::{DecodedState, StateCell, StatePublisher, StateReader, TouchEvent};

// Registers
pub(crate) const REG_COMMAND: u8 = 0x00;
pub(crate) const REG_DATA: u8 = 0x04;

// Commands written to REG_COMMAND
pub(crate) const CMD_MODE: u8 = 0x01;
pub(crate) const CMD_IDENTIFY: u8 = 0x08;

/// First byte of a valid identify response.
pub(crate) const IDENTIFY_MAGIC: u8 = 0xFE;

/// A driver for one capacitive touch sensor.
///
/// Created by [`TrillSensor::setup`], which probes the device and locks in
/// the decode mode. Every successful [`TrillSensor::read_once`] publishes a
/// complete new frame to the [`StateReader`] returned alongside the driver.
pub struct TrillSensor<
    'a,
    I2cType: I2c<SevenBitAddress, Error = ErrorType>,
    ErrorType: i2c::Error,
> {
    i2c: I2cType,
    address: u8,
    device_type: DeviceType,
    firmware_version: u8,
    state: DecodedState,
    publisher: StatePublisher<'a>,
    payload: [u8; 2 * MAX_CHANNELS],
}

impl<'a, I2cType: I2c<SevenBitAddress, Error = ErrorType>, ErrorType: i2c::Error>
    TrillSensor<'a, I2cType, ErrorType>
{
    /// Probes the device described by `config` and puts it in its scan mode.
    ///
    /// Fails with [`SetupError::DeviceNotFound`] if nothing sensible answers
    /// at the address and [`SetupError::TypeMismatch`] if a different family
    /// does. On success, `cell` is primed with an empty frame of the resolved
    /// mode and its reading end is returned with the driver.
    pub async fn setup(
        mut i2c: I2cType,
        config: &DeviceConfig,
        cell: &'a mut StateCell,
    ) -> Result<(Self, StateReader<'a>), SetupError<ErrorType>> {
        let address = config.resolved_address();
        if address > 0x7F {
            return Err(SetupError::InvalidAddress(address));
        }

        let not_found = |err: ErrorType| {
            log::debug!("trill: no answer at {address:#04x}: {err:?}");
            SetupError::DeviceNotFound { address }
        };
        i2c.write(address, &[REG_COMMAND, CMD_IDENTIFY])
            .await
            .map_err(not_found)?;
        let mut identity = [0u8; 3];
        i2c.write_read(address, &[REG_DATA], &mut identity)
            .await
            .map_err(not_found)?;
        log::trace!("trill: identify response {identity:02x?}");

        if identity[0] != IDENTIFY_MAGIC {
            log::debug!("trill: unexpected identify response at {address:#04x}");
            return Err(SetupError::DeviceNotFound { address });
        }
        let found = DeviceType::from_id(identity[1]);
        if found != Some(config.device_type) {
            return Err(SetupError::TypeMismatch {
                expected: config.device_type,
                found,
            });
        }

        let device_type = config.device_type;
        let mode = config.scan_mode.resolve(device_type);
        i2c.write(address, &[REG_COMMAND, CMD_MODE, mode.command_byte()])
            .await
            .map_err(|err| {
                log::warn!("Error writing CMD_MODE: {err:?}");
                SetupError::Bus(err)
            })?;

        let state = DecodedState::empty(mode, device_type.channel_count());
        let (publisher, reader) = cell.split(state.clone());
        log::info!(
            "trill: {device_type:?} (firmware {}) at {address:#04x} in {mode:?} mode",
            identity[2]
        );

        Ok((
            Self {
                i2c,
                address,
                device_type,
                firmware_version: identity[2],
                state,
                publisher,
                payload: [0; 2 * MAX_CHANNELS],
            },
            reader,
        ))
    }

    /// Reads and decodes one frame, then publishes it.
    ///
    /// On a bus error nothing is published and the last frame stays current.
    pub async fn read_once(&mut self) -> Result<(), TransferError<ErrorType>> {
        let len = self.device_type.payload_len(self.state.mode());
        let payload = &mut self.payload[..len];
        self.i2c
            .write_read(self.address, &[REG_DATA], payload)
            .await
            .map_err(TransferError::Bus)?;

        decode_into(self.device_type, payload, &mut self.state);
        self.publisher.publish(&self.state);
        Ok(())
    }

    /// The frame decoded by the last successful read.
    pub fn state(&self) -> &DecodedState {
        &self.state
    }

    /// The family of the probed device.
    pub fn device_type(&self) -> DeviceType {
        self.device_type
    }

    /// The decode mode locked in at setup.
    pub fn mode(&self) -> DecodeMode {
        self.state.mode()
    }

    /// The bus address in use.
    pub fn address(&self) -> u8 {
        self.address
    }

    /// Firmware revision from the identify response.
    pub fn firmware_version(&self) -> u8 {
        self.firmware_version
    }

    /// Whether touches carry a horizontal location.
    pub fn is_2d(&self) -> bool {
        self.device_type.is_2d()
    }

    /// Number of channels of the device.
    pub fn num_channels(&self) -> usize {
        self.device_type.channel_count()
    }

    /// Number of touches in the last frame; always 0 in raw mode.
    pub fn number_of_touches(&self) -> usize {
        self.state.touches().map_or(0, <[TouchEvent]>::len)
    }

    /// The location of touch `index` in the last frame.
    pub fn touch_location(&self, index: usize) -> Option<f32> {
        self.touch(index).map(|touch| touch.location)
    }

    /// The horizontal location of touch `index`, on 2-D devices.
    pub fn touch_horizontal_location(&self, index: usize) -> Option<f32> {
        self.touch(index).and_then(|touch| touch.horizontal_location)
    }

    /// The size of touch `index` in the last frame.
    pub fn touch_size(&self, index: usize) -> Option<f32> {
        self.touch(index).map(|touch| touch.size)
    }

    /// Channel readings of the last frame, in raw mode.
    pub fn raw_data(&self) -> Option<&[f32]> {
        self.state.channels()
    }

    fn touch(&self, index: usize) -> Option<&TouchEvent> {
        self.state.touches().and_then(|touches| touches.get(index))
    }
}
