//! Decoded sensor state and its lock-free handoff to the audio thread.
//!
//! The polling side publishes whole frames into a [`StateCell`] through a
//! [`StatePublisher`]; the real-time side picks up the latest complete frame
//! with a [`StateReader`]. The cell is a triple buffer: each side owns one
//! slot outright and the third slot is exchanged through a single atomic
//! byte, so neither side ever waits on the other and a reader can never see
//! half of one frame and half of another.

use core::cell::UnsafeCell;
use core::fmt;
use core::marker::PhantomData;
use core::sync::atomic::{AtomicU8, Ordering};

use heapless::Vec;

use crate::device::{DecodeMode, MAX_CHANNELS, MAX_TOUCHES};

/// A single touch position.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TouchEvent {
    /// Position along the main axis, in `[0, 1]`.
    pub location: f32,
    /// Position along the horizontal axis, in `[0, 1]`. Only present on 2-D devices.
    pub horizontal_location: Option<f32>,
    /// Contact size, in `[0, 1]`.
    pub size: f32,
}

/// The most recent decode result.
///
/// The variant is fixed at setup and never changes afterwards.
#[derive(Debug, Clone, PartialEq)]
pub enum DecodedState {
    /// Touches found in centroid mode, in the order the device reports them.
    Centroid(Vec<TouchEvent, MAX_TOUCHES>),
    /// One normalized reading per channel.
    Raw(Vec<f32, MAX_CHANNELS>),
}

impl DecodedState {
    /// An empty frame of the given shape: no touches, or all channels at zero.
    pub fn empty(mode: DecodeMode, channels: usize) -> Self {
        match mode {
            DecodeMode::Centroid => DecodedState::Centroid(Vec::new()),
            DecodeMode::Raw => {
                let mut readings = Vec::new();
                // Channel counts never exceed MAX_CHANNELS.
                let _ = readings.resize(channels.min(MAX_CHANNELS), 0.0);
                DecodedState::Raw(readings)
            }
        }
    }

    /// The decode mode this state belongs to.
    pub fn mode(&self) -> DecodeMode {
        match self {
            DecodedState::Centroid(_) => DecodeMode::Centroid,
            DecodedState::Raw(_) => DecodeMode::Raw,
        }
    }

    /// The touches of a centroid frame, or `None` for raw frames.
    pub fn touches(&self) -> Option<&[TouchEvent]> {
        match self {
            DecodedState::Centroid(touches) => Some(touches),
            DecodedState::Raw(_) => None,
        }
    }

    /// The channel readings of a raw frame, or `None` for centroid frames.
    pub fn channels(&self) -> Option<&[f32]> {
        match self {
            DecodedState::Centroid(_) => None,
            DecodedState::Raw(readings) => Some(readings),
        }
    }

    /// Writes the report line for this frame, including the trailing newline.
    ///
    /// Centroid frames are written as `Touches: <n>:` followed by each
    /// location (and horizontal location on 2-D devices); raw frames as the
    /// bare list of channel readings. Every value has three decimals and a
    /// trailing space.
    pub fn write_report<W: fmt::Write>(&self, out: &mut W) -> fmt::Result {
        match self {
            DecodedState::Centroid(touches) => {
                write!(out, "Touches: {}:", touches.len())?;
                for touch in touches {
                    write!(out, "{:.3} ", touch.location)?;
                    if let Some(horizontal) = touch.horizontal_location {
                        write!(out, "{horizontal:.3} ")?;
                    }
                }
            }
            DecodedState::Raw(readings) => {
                for reading in readings {
                    write!(out, "{reading:.3} ")?;
                }
            }
        }
        out.write_char('\n')
    }
}

const EMPTY: DecodedState = DecodedState::Centroid(Vec::new());
const FRESH: u8 = 0x80;
const INDEX: u8 = 0x03;

/// Triple-buffered storage for [`DecodedState`].
pub struct StateCell {
    slots: [UnsafeCell<DecodedState>; 3],
    // Index of the slot owned by neither side, plus FRESH if it holds an
    // unread frame.
    middle: AtomicU8,
}

// Each slot is only ever touched by whichever side currently owns its index;
// ownership moves exclusively through `middle`.
unsafe impl Sync for StateCell {}

impl Default for StateCell {
    fn default() -> Self {
        Self::new()
    }
}

impl StateCell {
    /// Creates a cell holding empty centroid frames.
    pub const fn new() -> Self {
        Self {
            slots: [
                UnsafeCell::new(EMPTY),
                UnsafeCell::new(EMPTY),
                UnsafeCell::new(EMPTY),
            ],
            middle: AtomicU8::new(1),
        }
    }

    /// Fills every slot with `initial` and splits the cell into its two ends.
    ///
    /// Borrowing the cell mutably guarantees that only one publisher and one
    /// reader exist at a time.
    pub fn split(&mut self, initial: DecodedState) -> (StatePublisher<'_>, StateReader<'_>) {
        for slot in &mut self.slots {
            slot.get_mut().clone_from(&initial);
        }
        *self.middle.get_mut() = 1;
        let cell: &StateCell = self;
        (
            StatePublisher {
                cell,
                owned: 0,
                _not_sync: PhantomData,
            },
            StateReader {
                cell,
                owned: 2,
                _not_sync: PhantomData,
            },
        )
    }
}

/// The writing end of a [`StateCell`].
pub struct StatePublisher<'a> {
    cell: &'a StateCell,
    owned: u8,
    _not_sync: PhantomData<core::cell::Cell<()>>,
}

impl StatePublisher<'_> {
    /// Makes `state` the latest frame. Never blocks.
    pub fn publish(&mut self, state: &DecodedState) {
        // SAFETY: `owned` is never visible to the reader until the swap below.
        unsafe { (*self.cell.slots[self.owned as usize].get()).clone_from(state) };
        let previous = self.cell.middle.swap(self.owned | FRESH, Ordering::AcqRel);
        self.owned = previous & INDEX;
    }
}

/// The reading end of a [`StateCell`]. Safe to use from the real-time context.
pub struct StateReader<'a> {
    cell: &'a StateCell,
    owned: u8,
    _not_sync: PhantomData<core::cell::Cell<()>>,
}

impl StateReader<'_> {
    /// Returns the most recently published frame. Never blocks.
    ///
    /// If nothing new was published since the last call, the same frame is
    /// returned again.
    pub fn snapshot(&mut self) -> &DecodedState {
        if self.cell.middle.load(Ordering::Relaxed) & FRESH != 0 {
            let previous = self.cell.middle.swap(self.owned, Ordering::AcqRel);
            self.owned = previous & INDEX;
        }
        // SAFETY: the publisher cannot obtain `owned` while we hold it, and the
        // returned borrow keeps `self` (and thus `owned`) pinned.
        unsafe { &*self.cell.slots[self.owned as usize].get() }
    }

    /// Returns `true` if a frame was published since the last snapshot.
    pub fn has_update(&self) -> bool {
        self.cell.middle.load(Ordering::Relaxed) & FRESH != 0
    }
}
