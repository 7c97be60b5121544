//! Waveform pattern selector

/// Waveform patterns selectable over BLE
///
/// The discriminant is the code a client writes to the PWM value
/// characteristic to select the pattern.
#[repr(u32)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WaveformPattern {
    /// Constant low duty (code 0)
    FlatLow = 0,
    /// Constant mid duty (code 1)
    FlatMid = 1,
    /// Constant full duty (code 2)
    FlatHigh = 2,
    /// Reserved, no samples (code 3)
    Left = 3,
    /// Reserved, no samples (code 4)
    Right = 4,
    /// Reserved, no samples (code 5)
    LateralVariation = 5,
    /// Triangular ramp up then down (code 6)
    RollingHills = 6,
}

impl WaveformPattern {
    /// Try to convert a PWM value code to a pattern
    pub fn from_code(code: u32) -> Option<Self> {
        match code {
            0 => Some(Self::FlatLow),
            1 => Some(Self::FlatMid),
            2 => Some(Self::FlatHigh),
            3 => Some(Self::Left),
            4 => Some(Self::Right),
            5 => Some(Self::LateralVariation),
            6 => Some(Self::RollingHills),
            _ => None,
        }
    }

    /// Code written over BLE to select this pattern
    pub fn code(self) -> u32 {
        self as u32
    }

    /// Whether samples can be generated for this pattern
    pub fn is_implemented(self) -> bool {
        !matches!(self, Self::Left | Self::Right | Self::LateralVariation)
    }
}
