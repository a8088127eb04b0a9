//! Report scheduling inside the audio callback.
//!
//! Nothing in this module blocks, allocates or logs: it is called from the
//! real-time context once per audio block.

use heapless::String;

use crate::state::{DecodedState, StateReader};

/// Capacity of one formatted report line.
pub const REPORT_CAPACITY: usize = 256;

/// Destination of report lines, the real-time equivalent of a print call.
///
/// Implementations run on the audio thread and must not block.
pub trait ReportSink {
    /// Receives one complete line, including its trailing newline.
    fn emit(&mut self, line: &str);
}

impl<F: FnMut(&str)> ReportSink for F {
    fn emit(&mut self, line: &str) {
        self(line)
    }
}

/// Converts a report interval into audio frames: `round(sample_rate * interval_s)`.
///
/// Returns `None` if either input is negative or not finite.
pub fn threshold_frames(sample_rate: f32, interval_s: f32) -> Option<u32> {
    let frames = sample_rate * interval_s;
    if !frames.is_finite() || sample_rate < 0.0 || interval_s < 0.0 {
        return None;
    }
    // Float to int casts saturate; adding a half rounds non-negative values.
    Some((frames + 0.5) as u32)
}

/// Frame counting state, owned by the audio callback.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReportCounter {
    frames_since_last_report: u32,
    threshold_frames: u32,
}

impl ReportCounter {
    /// A counter that fires every `threshold_frames` frames; 0 fires on every block.
    pub const fn new(threshold_frames: u32) -> Self {
        Self {
            frames_since_last_report: 0,
            threshold_frames,
        }
    }

    /// Frames counted since the last report.
    pub fn frames_since_last_report(&self) -> u32 {
        self.frames_since_last_report
    }

    /// Frames between two reports.
    pub fn threshold_frames(&self) -> u32 {
        self.threshold_frames
    }

    /// Adds a block of `frames` and returns `true` (resetting to zero) when a
    /// report is due.
    pub fn advance(&mut self, frames: u32) -> bool {
        self.frames_since_last_report = self.frames_since_last_report.saturating_add(frames);
        if self.frames_since_last_report >= self.threshold_frames {
            self.frames_since_last_report = 0;
            true
        } else {
            false
        }
    }
}

/// Emits a snapshot of the sensor state every few audio frames.
pub struct ReportScheduler<'a> {
    counter: ReportCounter,
    reader: StateReader<'a>,
    line: String<REPORT_CAPACITY>,
    emitted: u32,
    skipped: u32,
}

impl<'a> ReportScheduler<'a> {
    /// Creates a scheduler reading from `reader` every `threshold_frames` frames.
    pub fn new(reader: StateReader<'a>, threshold_frames: u32) -> Self {
        Self {
            counter: ReportCounter::new(threshold_frames),
            reader,
            line: String::new(),
            emitted: 0,
            skipped: 0,
        }
    }

    /// Accounts for one audio block of `frames` frames.
    ///
    /// When the threshold is reached, formats exactly one line from the
    /// latest sensor state and hands it to `sink`. Returns `true` if a line
    /// was emitted. A line that does not fit is dropped and counted in
    /// [`ReportScheduler::skipped_reports`].
    pub fn render<S: ReportSink + ?Sized>(&mut self, frames: usize, sink: &mut S) -> bool {
        let frames = u32::try_from(frames).unwrap_or(u32::MAX);
        if !self.counter.advance(frames) {
            return false;
        }

        self.line.clear();
        if self.reader.snapshot().write_report(&mut self.line).is_err() {
            self.skipped = self.skipped.wrapping_add(1);
            return false;
        }
        sink.emit(&self.line);
        self.emitted = self.emitted.wrapping_add(1);
        true
    }

    /// The latest published sensor state.
    pub fn snapshot(&mut self) -> &DecodedState {
        self.reader.snapshot()
    }

    /// The frame counter.
    pub fn counter(&self) -> &ReportCounter {
        &self.counter
    }

    /// Lines emitted so far.
    pub fn reports_emitted(&self) -> u32 {
        self.emitted
    }

    /// Reports dropped because the line did not fit.
    pub fn skipped_reports(&self) -> u32 {
        self.skipped
    }
}
