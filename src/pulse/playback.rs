//! Playback orchestration
//!
//! Owns the active pattern and its sample sequence. Playback is always
//! stopped before the sequence is recomputed, so the driver never sees a
//! partially written buffer.

use crate::pulse::traits::{PulseConfig, PulseError, PulseOutput};
use crate::waveform::{compute, SampleSequence, WaveformPattern};

/// Drives a pulse generator with computed waveform sequences
pub struct PlaybackController<D: PulseOutput> {
    driver: D,
    config: PulseConfig,
    pattern: Option<WaveformPattern>,
    sequence: SampleSequence,
}

impl<D: PulseOutput> PlaybackController<D> {
    /// Create a controller; nothing plays until `apply_pattern` is called
    pub fn new(driver: D, config: PulseConfig) -> Self {
        Self {
            driver,
            config,
            pattern: None,
            sequence: SampleSequence::new(),
        }
    }

    /// Switch playback to `pattern`
    ///
    /// Stops the current sequence, reinitialises the driver, recomputes the
    /// samples and starts looped playback on all channels. Reserved patterns
    /// and configurations whose sequence would not fit the sample buffer are
    /// rejected before the running sequence is touched.
    pub fn apply_pattern(&mut self, pattern: WaveformPattern) -> Result<(), PulseError> {
        if !pattern.is_implemented() {
            log::warn!("Pattern {:?} has no samples, keeping current output", pattern);
            return Err(PulseError::UnsupportedPattern);
        }
        if let Err(error) = self.config.validate() {
            log::warn!("Pulse configuration rejected, keeping current output");
            return Err(error);
        }

        self.driver.stop();
        self.pattern = None;

        self.driver.init(&self.config)?;
        self.sequence = compute(pattern, self.config.step_count, self.config.top_value);
        self.driver
            .start_loop(&self.sequence, self.config.repeats)?;

        self.pattern = Some(pattern);
        log::info!(
            "Playing {:?} ({} samples, top {})",
            pattern,
            self.sequence.len(),
            self.config.top_value
        );
        Ok(())
    }

    /// Pattern currently playing, if any
    pub fn active_pattern(&self) -> Option<WaveformPattern> {
        self.pattern
    }

    /// Sequence loaded for the active pattern
    pub fn sequence(&self) -> &[u16] {
        &self.sequence
    }

    /// Timing and channel configuration
    pub fn config(&self) -> &PulseConfig {
        &self.config
    }

    #[cfg(test)]
    pub fn driver(&self) -> &D {
        &self.driver
    }

    #[cfg(test)]
    pub fn driver_mut(&mut self) -> &mut D {
        &mut self.driver
    }
}
