// SPDX-License-Identifier: GPL-3.0-only

//! Audible scan confirmation

use crate::constants::beep;
use tracing::info;

/// Oscillator waveform
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Waveform {
    Square,
    Sine,
}

/// Parameters of a confirmation tone
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BeepTone {
    pub duration_ms: u32,
    pub frequency_hz: u32,
    /// Volume in percent
    pub volume: u32,
    pub waveform: Waveform,
}

impl Default for BeepTone {
    fn default() -> Self {
        Self {
            duration_ms: beep::DURATION_MS,
            frequency_hz: beep::FREQUENCY_HZ,
            volume: beep::VOLUME,
            waveform: Waveform::Square,
        }
    }
}

/// Tone generator provided by the host
pub trait ScanFeedback: Send + Sync {
    /// Play a tone without blocking the caller
    fn beep(&self, tone: &BeepTone);
}

/// Feedback that does nothing
#[derive(Debug, Default, Clone, Copy)]
pub struct SilentFeedback;

impl ScanFeedback for SilentFeedback {
    fn beep(&self, _tone: &BeepTone) {}
}

/// Feedback that logs every tone
#[derive(Debug, Default, Clone, Copy)]
pub struct LogFeedback;

impl ScanFeedback for LogFeedback {
    fn beep(&self, tone: &BeepTone) {
        info!(
            frequency_hz = tone.frequency_hz,
            duration_ms = tone.duration_ms,
            volume = tone.volume,
            "Beep"
        );
    }
}
