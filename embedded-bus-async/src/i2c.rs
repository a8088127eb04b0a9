//! A shared I2C bus with per-address device handles.
//!
//! Several drivers can sit on one physical bus. Each gets its own
//! [`RwLockI2cDevice`], obtained from [`SharedI2cBus::device`], which both
//! serializes transactions through a `RwLock` and reserves the device's 7-bit
//! address for as long as the handle lives. Two handles for the same address
//! on the same bus cannot coexist.

use alloc::sync::Arc;
use core::cell::RefCell;
use core::fmt;

use embassy_sync::blocking_mutex::{raw::CriticalSectionRawMutex, Mutex};
use embassy_sync::rwlock::RwLock;
use embedded_hal::i2c::{Operation, SevenBitAddress};
use embedded_hal_async::i2c::{self, I2c};
use heapless::Vec;

/// Highest valid 7-bit address.
pub const MAX_ADDRESS: u8 = 0x7F;

/// Maximum number of devices that can be claimed on one bus at the same time.
pub const MAX_DEVICES: usize = 16;

type Claims = Mutex<CriticalSectionRawMutex, RefCell<Vec<u8, MAX_DEVICES>>>;

/// An error returned when a device handle cannot be created.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BusError {
    /// The address does not fit in 7 bits.
    InvalidAddress(u8),
    /// Another handle on this bus already owns the address.
    AddressInUse {
        /// The bus the conflict happened on.
        bus_id: u8,
        /// The contested address.
        address: u8,
    },
    /// The claim table is full.
    TooManyDevices,
}

impl fmt::Display for BusError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidAddress(address) => write!(f, "invalid 7-bit address {address:#04x}"),
            Self::AddressInUse { bus_id, address } => {
                write!(f, "address {address:#04x} already in use on bus {bus_id}")
            }
            Self::TooManyDevices => write!(f, "more than {MAX_DEVICES} devices on one bus"),
        }
    }
}

impl core::error::Error for BusError {}

/// One physical I2C bus, shareable between drivers.
pub struct SharedI2cBus<I2cType, ErrorType: i2c::Error>
where
    I2cType: I2c<SevenBitAddress, Error = ErrorType>,
{
    id: u8,
    bus: Arc<RwLock<CriticalSectionRawMutex, I2cType>>,
    claims: Arc<Claims>,
}

impl<I2cType, ErrorType: i2c::Error> SharedI2cBus<I2cType, ErrorType>
where
    I2cType: I2c<SevenBitAddress, Error = ErrorType>,
{
    /// Wraps the bus peripheral `i2c`, identified by `id`.
    pub fn new(id: u8, i2c: I2cType) -> Self {
        Self {
            id,
            bus: Arc::new(RwLock::new(i2c)),
            claims: Arc::new(Mutex::new(RefCell::new(Vec::new()))),
        }
    }

    /// The bus identifier given at construction.
    pub fn id(&self) -> u8 {
        self.id
    }

    /// Returns `true` if a live handle currently owns `address`.
    pub fn is_claimed(&self, address: u8) -> bool {
        self.claims.lock(|claims| claims.borrow().contains(&address))
    }

    /// Creates a device handle for `address`, reserving it on this bus.
    ///
    /// The reservation is released when the returned handle is dropped.
    pub fn device(&self, address: u8) -> Result<RwLockI2cDevice<I2cType, ErrorType>, BusError> {
        if address > MAX_ADDRESS {
            return Err(BusError::InvalidAddress(address));
        }
        self.claims.lock(|claims| {
            let mut claims = claims.borrow_mut();
            if claims.contains(&address) {
                return Err(BusError::AddressInUse {
                    bus_id: self.id,
                    address,
                });
            }
            claims.push(address).map_err(|_| BusError::TooManyDevices)
        })?;
        log::trace!("i2c bus {}: claimed {address:#04x}", self.id);

        Ok(RwLockI2cDevice {
            bus_id: self.id,
            address,
            bus: self.bus.clone(),
            claims: self.claims.clone(),
        })
    }
}

/// `RwLock`-based shared bus [`I2c`] implementation bound to one address.
///
/// Transactions are forwarded to the shared bus with whatever address the
/// caller passes, so a driver can still issue general-call style traffic;
/// [`RwLockI2cDevice::address`] is the address this handle reserved.
pub struct RwLockI2cDevice<I2cType, ErrorType: i2c::Error>
where
    I2cType: I2c<SevenBitAddress, Error = ErrorType>,
{
    bus_id: u8,
    address: u8,
    bus: Arc<RwLock<CriticalSectionRawMutex, I2cType>>,
    claims: Arc<Claims>,
}

impl<I2cType, ErrorType: i2c::Error> RwLockI2cDevice<I2cType, ErrorType>
where
    I2cType: I2c<SevenBitAddress, Error = ErrorType>,
{
    /// The address reserved by this handle.
    pub fn address(&self) -> u8 {
        self.address
    }

    /// The id of the bus this handle belongs to.
    pub fn bus_id(&self) -> u8 {
        self.bus_id
    }
}

impl<I2cType, ErrorType: i2c::Error> Drop for RwLockI2cDevice<I2cType, ErrorType>
where
    I2cType: I2c<SevenBitAddress, Error = ErrorType>,
{
    fn drop(&mut self) {
        let address = self.address;
        self.claims.lock(|claims| {
            claims.borrow_mut().retain(|claimed| *claimed != address);
        });
        log::trace!("i2c bus {}: released {address:#04x}", self.bus_id);
    }
}

impl<I2cType, ErrorType: i2c::Error> i2c::ErrorType for RwLockI2cDevice<I2cType, ErrorType>
where
    I2cType: I2c<SevenBitAddress, Error = ErrorType>,
{
    type Error = ErrorType;
}

impl<I2cType, ErrorType: i2c::Error> I2c for RwLockI2cDevice<I2cType, ErrorType>
where
    I2cType: I2c<SevenBitAddress, Error = ErrorType>,
{
    async fn transaction(
        &mut self,
        address: SevenBitAddress,
        operations: &mut [Operation<'_>],
    ) -> Result<(), Self::Error> {
        let mut bus = self.bus.write().await;
        bus.transaction(address, operations).await
    }
}
