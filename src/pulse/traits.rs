//! Pulse generator trait for abstraction and testability
//!
//! This trait defines the interface to the sequence-playback hardware,
//! allowing the real driver to be swapped with a mock for testing.

use crate::config::{pulse_pins, pwm};

/// Errors that can occur during pulse generator operations
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PulseError {
    /// Driver rejected the channel or timing configuration
    InvalidConfig,
    /// Playback requested before the driver was initialised
    NotInitialised,
    /// Empty sequence or sequence larger than the driver can hold
    InvalidSequence,
    /// Pattern has no generation logic
    UnsupportedPattern,
}

impl core::fmt::Display for PulseError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::InvalidConfig => write!(f, "invalid pulse configuration"),
            Self::NotInitialised => write!(f, "pulse driver not initialised"),
            Self::InvalidSequence => write!(f, "invalid sample sequence"),
            Self::UnsupportedPattern => write!(f, "unsupported waveform pattern"),
        }
    }
}

/// Counter direction of the pulse timer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CountMode {
    /// Count up to top then wrap (edge-aligned)
    Up,
    /// Count up then down (centre-aligned)
    UpDown,
}

/// One output channel of the pulse generator
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChannelPin {
    /// GPIO number
    pub pin: u8,
    /// Output is driven with the complement of the duty cycle
    pub inverted: bool,
}

/// Channel map and timing base of the pulse generator
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PulseConfig {
    /// Output channels, all fed from the same sample
    pub channels: [ChannelPin; pwm::CHANNEL_COUNT],
    /// Counter clock in Hz
    pub base_clock_hz: u32,
    /// Counter top value (period length in ticks)
    pub top_value: u16,
    /// Counter direction
    pub count_mode: CountMode,
    /// Samples per sequence
    pub step_count: usize,
    /// Extra periods each sample is held for
    pub repeats: u16,
}

impl PulseConfig {
    /// Length of one output period in microseconds
    pub fn period_us(&self) -> u64 {
        if self.base_clock_hz == 0 {
            return 0;
        }
        u64::from(self.top_value) * 1_000_000 / u64::from(self.base_clock_hz)
    }

    /// Check that a full sequence fits the sample buffer and the timing is usable
    pub fn validate(&self) -> Result<(), PulseError> {
        if self.step_count == 0 || self.step_count > pwm::MAX_STEP_COUNT {
            return Err(PulseError::InvalidConfig);
        }
        if self.top_value == 0 || self.period_us() == 0 {
            return Err(PulseError::InvalidConfig);
        }
        Ok(())
    }
}

impl Default for PulseConfig {
    fn default() -> Self {
        Self {
            channels: [
                ChannelPin {
                    pin: pulse_pins::CHANNEL_0,
                    inverted: false,
                },
                ChannelPin {
                    pin: pulse_pins::CHANNEL_1,
                    inverted: false,
                },
                ChannelPin {
                    pin: pulse_pins::CHANNEL_2,
                    inverted: true,
                },
                ChannelPin {
                    pin: pulse_pins::CHANNEL_3,
                    inverted: true,
                },
            ],
            base_clock_hz: pwm::BASE_CLOCK_HZ,
            top_value: pwm::TOP,
            count_mode: CountMode::Up,
            step_count: pwm::STEP_COUNT,
            repeats: pwm::REPEATS,
        }
    }
}

/// Abstract sequence-playback pulse generator
///
/// The driver must not read a sequence after `stop()` returns, and must
/// take everything it needs from `samples` before `start_loop` returns.
pub trait PulseOutput {
    /// Configure channels and timing base, discarding any previous setup
    fn init(&mut self, config: &PulseConfig) -> Result<(), PulseError>;

    /// Play `samples` on every channel in an endless loop
    fn start_loop(&mut self, samples: &[u16], repeats: u16) -> Result<(), PulseError>;

    /// Stop playback
    fn stop(&mut self);
}


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_timing() {
        let config = PulseConfig::default();

        // 10000 ticks at 500 kHz
        assert_eq!(config.period_us(), 20_000);
        assert_eq!(config.repeats, 1);
        assert_eq!(config.count_mode, CountMode::Up);
    }

    #[test]
    fn test_config_validation() {
        assert_eq!(PulseConfig::default().validate(), Ok(()));

        let largest = PulseConfig {
            step_count: pwm::MAX_STEP_COUNT,
            ..PulseConfig::default()
        };
        assert_eq!(largest.validate(), Ok(()));

        let oversized = PulseConfig {
            step_count: pwm::MAX_STEP_COUNT + 1,
            ..PulseConfig::default()
        };
        assert_eq!(oversized.validate(), Err(PulseError::InvalidConfig));

        let empty = PulseConfig {
            step_count: 0,
            ..PulseConfig::default()
        };
        assert_eq!(empty.validate(), Err(PulseError::InvalidConfig));

        let no_clock = PulseConfig {
            base_clock_hz: 0,
            ..PulseConfig::default()
        };
        assert_eq!(no_clock.validate(), Err(PulseError::InvalidConfig));
    }

    #[test]
    fn test_default_config_channels() {
        let config = PulseConfig::default();

        assert!(!config.channels[0].inverted);
        assert!(!config.channels[1].inverted);
        assert!(config.channels[2].inverted);
        assert!(config.channels[3].inverted);
    }

    #[test]
    fn test_zero_clock_period() {
        let config = PulseConfig {
            base_clock_hz: 0,
            ..PulseConfig::default()
        };
        assert_eq!(config.period_us(), 0);
    }
}
