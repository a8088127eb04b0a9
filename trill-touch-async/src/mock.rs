//! An in-memory sensor for unit tests.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::vec::Vec;

use embedded_hal_async::i2c::{
    ErrorKind, ErrorType, I2c, NoAcknowledgeSource, Operation, SevenBitAddress,
};

use crate::device::DeviceType;
use crate::touch::{CMD_IDENTIFY, CMD_MODE, IDENTIFY_MAGIC, REG_COMMAND};

struct Inner {
    address: u8,
    identity: [u8; 3],
    mode: Option<u8>,
    reject_mode: bool,
    identify_pending: bool,
    frames: VecDeque<Vec<u8>>,
    current: Vec<u8>,
    failures_left: usize,
    reads: usize,
}

/// A fake device answering on one address. Clones share the same device.
#[derive(Clone)]
pub(crate) struct MockTrill(Arc<Mutex<Inner>>);

impl MockTrill {
    pub(crate) fn new(address: u8, device_type: DeviceType) -> Self {
        Self(Arc::new(Mutex::new(Inner {
            address,
            identity: [IDENTIFY_MAGIC, device_type.id(), 3],
            mode: None,
            reject_mode: false,
            identify_pending: false,
            frames: VecDeque::new(),
            current: Vec::new(),
            failures_left: 0,
            reads: 0,
        })))
    }

    /// The last mode byte written, if any.
    pub(crate) fn mode(&self) -> Option<u8> {
        self.0.lock().unwrap().mode
    }

    /// Number of data reads that succeeded.
    pub(crate) fn reads(&self) -> usize {
        self.0.lock().unwrap().reads
    }

    /// Replaces the 3-byte identify answer.
    pub(crate) fn set_identity(&self, identity: [u8; 3]) {
        self.0.lock().unwrap().identity = identity;
    }

    /// Makes every mode command fail with a bus error.
    pub(crate) fn reject_mode_writes(&self) {
        self.0.lock().unwrap().reject_mode = true;
    }

    pub(crate) fn fail_next_reads(&self, count: usize) {
        self.0.lock().unwrap().failures_left = count;
    }

    /// Queues a 1-D centroid frame with the given locations and sizes.
    pub(crate) fn push_centroid(&self, locations: &[u16], sizes: &[u16]) {
        let mut words = [0xFFFFu16; 5].to_vec();
        words[..locations.len()].copy_from_slice(locations);
        let mut size_words = [0u16; 5].to_vec();
        size_words[..sizes.len()].copy_from_slice(sizes);
        words.extend(size_words);
        self.push_words(&words);
    }

    /// Queues a frame made of big-endian words.
    pub(crate) fn push_words(&self, words: &[u16]) {
        let bytes = words.iter().flat_map(|w| w.to_be_bytes()).collect();
        self.0.lock().unwrap().frames.push_back(bytes);
    }
}

impl ErrorType for MockTrill {
    type Error = ErrorKind;
}

impl I2c for MockTrill {
    async fn transaction(
        &mut self,
        address: SevenBitAddress,
        operations: &mut [Operation<'_>],
    ) -> Result<(), Self::Error> {
        let mut inner = self.0.lock().unwrap();
        if address != inner.address {
            return Err(ErrorKind::NoAcknowledge(NoAcknowledgeSource::Address));
        }
        for op in operations {
            match op {
                Operation::Write(bytes) => match bytes {
                    [REG_COMMAND, CMD_IDENTIFY, ..] => inner.identify_pending = true,
                    [REG_COMMAND, CMD_MODE, ..] if inner.reject_mode => {
                        return Err(ErrorKind::Bus);
                    }
                    [REG_COMMAND, CMD_MODE, mode, ..] => inner.mode = Some(*mode),
                    _ => {}
                },
                Operation::Read(buf) if inner.identify_pending => {
                    inner.identify_pending = false;
                    let identity = inner.identity;
                    let n = buf.len().min(identity.len());
                    buf[..n].copy_from_slice(&identity[..n]);
                }
                Operation::Read(buf) => {
                    if inner.failures_left > 0 {
                        inner.failures_left -= 1;
                        return Err(ErrorKind::Bus);
                    }
                    if let Some(frame) = inner.frames.pop_front() {
                        inner.current = frame;
                    }
                    inner.reads += 1;
                    buf.fill(0xFF);
                    let n = buf.len().min(inner.current.len());
                    buf[..n].copy_from_slice(&inner.current[..n]);
                }
            }
        }
        Ok(())
    }
}
