//! Error types for setup and polling.

use core::fmt::{self, Debug, Display};

use embedded_bus_async::BusError;

use crate::device::DeviceType;

/// Why a sensor could not be brought up. Fatal for that sensor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SetupError<E> {
    /// Nothing answered the identify probe at the address.
    DeviceNotFound {
        /// The probed address.
        address: u8,
    },
    /// A device answered, but not the family that was configured.
    TypeMismatch {
        /// The configured family.
        expected: DeviceType,
        /// The family that answered, if its id is known.
        found: Option<DeviceType>,
    },
    /// The address does not fit in 7 bits.
    InvalidAddress(u8),
    /// Another sensor on the same bus already uses the address.
    AddressInUse {
        /// The shared bus.
        bus_id: u8,
        /// The contested address.
        address: u8,
    },
    /// The bus has no room to register another device.
    BusFull,
    /// The config names a different bus than the one handed to setup.
    WrongBus {
        /// `DeviceConfig::bus_id`.
        expected: u8,
        /// The id of the bus actually given.
        actual: u8,
    },
    /// The report interval is negative or not a number.
    InvalidInterval,
    /// Setup already succeeded once on this supervisor.
    AlreadyInitialized,
    /// The device was found but rejected the mode command.
    Bus(E),
}

impl<E> From<BusError> for SetupError<E> {
    fn from(err: BusError) -> Self {
        match err {
            BusError::InvalidAddress(address) => SetupError::InvalidAddress(address),
            BusError::AddressInUse { bus_id, address } => {
                SetupError::AddressInUse { bus_id, address }
            }
            BusError::TooManyDevices => SetupError::BusFull,
        }
    }
}

impl<E: Debug> Display for SetupError<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::DeviceNotFound { address } => write!(f, "no device at {address:#04x}"),
            Self::TypeMismatch { expected, found } => {
                write!(f, "expected {expected:?}, found {found:?}")
            }
            Self::InvalidAddress(address) => write!(f, "invalid 7-bit address {address:#04x}"),
            Self::AddressInUse { bus_id, address } => {
                write!(f, "address {address:#04x} already in use on bus {bus_id}")
            }
            Self::BusFull => write!(f, "too many devices on the bus"),
            Self::WrongBus { expected, actual } => {
                write!(f, "device configured for bus {expected}, got bus {actual}")
            }
            Self::InvalidInterval => write!(f, "report interval must be finite and >= 0"),
            Self::AlreadyInitialized => write!(f, "sensor already initialized"),
            Self::Bus(err) => write!(f, "bus error during setup: {err:?}"),
        }
    }
}

impl<E: Debug> core::error::Error for SetupError<E> {}

/// A failed bus read. The previously published state stays valid.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransferError<E> {
    /// The bus transaction failed.
    Bus(E),
}

impl<E: Debug> Display for TransferError<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Bus(err) => write!(f, "bus transfer failed: {err:?}"),
        }
    }
}

impl<E: Debug> core::error::Error for TransferError<E> {}

/// Why the polling task could not be started.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StartError<S> {
    /// Setup has not succeeded, or polling was already started.
    NotInitialized,
    /// The spawner refused the task.
    Spawn(S),
}

impl<S: Debug> Display for StartError<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotInitialized => write!(f, "sensor not initialized"),
            Self::Spawn(err) => write!(f, "failed to spawn polling task: {err:?}"),
        }
    }
}

impl<S: Debug> core::error::Error for StartError<S> {}
