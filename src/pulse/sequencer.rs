//! Software sequence playback
//!
//! Steps through a loaded sample sequence one output period at a time and
//! writes the duty cycle to every channel. Each sample is held for
//! `repeats + 1` periods and the sequence loops until replaced.

use crate::config::pwm::CHANNEL_COUNT;
use crate::pulse::traits::{ChannelPin, PulseError};
use crate::waveform::SampleSequence;
use embedded_hal::pwm::SetDutyCycle;

/// Position within a looping sample sequence
#[derive(Debug, Clone, Default)]
pub struct SequenceCursor {
    samples: SampleSequence,
    repeats: u16,
    index: usize,
    held: u16,
}

impl SequenceCursor {
    /// Cursor with nothing loaded
    pub fn idle() -> Self {
        Self::default()
    }

    /// Load a sequence, starting from its first sample
    pub fn load(samples: &[u16], repeats: u16) -> Result<Self, PulseError> {
        if samples.is_empty() {
            return Err(PulseError::InvalidSequence);
        }

        let mut sequence = SampleSequence::new();
        sequence
            .extend_from_slice(samples)
            .map_err(|_| PulseError::InvalidSequence)?;

        Ok(Self {
            samples: sequence,
            repeats,
            index: 0,
            held: 0,
        })
    }

    /// Whether a sequence is loaded
    pub fn is_active(&self) -> bool {
        !self.samples.is_empty()
    }

    /// Sample for the next output period
    pub fn next_sample(&mut self) -> Option<u16> {
        let sample = *self.samples.get(self.index)?;

        if self.held >= self.repeats {
            self.held = 0;
            self.index = (self.index + 1) % self.samples.len();
        } else {
            self.held += 1;
        }

        Some(sample)
    }
}

/// Duty-cycle outputs fed from one sample
pub struct DutyOutputs<P: SetDutyCycle> {
    channels: [P; CHANNEL_COUNT],
    inverted: [bool; CHANNEL_COUNT],
    top_value: u16,
}

impl<P: SetDutyCycle> DutyOutputs<P> {
    /// Wrap PWM channels in the order given by `pins`
    pub fn new(channels: [P; CHANNEL_COUNT], pins: &[ChannelPin; CHANNEL_COUNT], top_value: u16) -> Self {
        Self {
            channels,
            inverted: pins.map(|p| p.inverted),
            top_value,
        }
    }

    /// Change the counter top the samples are measured against
    pub fn set_top_value(&mut self, top_value: u16) {
        self.top_value = top_value;
    }

    /// Drive every channel with `sample` (out of `top_value`)
    pub fn write(&mut self, sample: u16) -> Result<(), P::Error> {
        if self.top_value == 0 {
            return self.off();
        }

        let sample = sample.min(self.top_value);
        for (channel, &inverted) in self.channels.iter_mut().zip(self.inverted.iter()) {
            let num = if inverted {
                self.top_value - sample
            } else {
                sample
            };
            channel.set_duty_cycle_fraction(num, self.top_value)?;
        }
        Ok(())
    }

    /// Drive every channel low
    pub fn off(&mut self) -> Result<(), P::Error> {
        for channel in self.channels.iter_mut() {
            channel.set_duty_cycle_fully_off()?;
        }
        Ok(())
    }

    #[cfg(test)]
    pub fn channels(&self) -> &[P; CHANNEL_COUNT] {
        &self.channels
    }
}
