//! Hardware and protocol configuration constants for the sled board

/// Pulse output pins, one per sequence channel
pub mod pulse_pins {
    pub const CHANNEL_0: u8 = 4;
    pub const CHANNEL_1: u8 = 5;
    /// Channels 2 and 3 drive inverted outputs
    pub const CHANNEL_2: u8 = 6;
    pub const CHANNEL_3: u8 = 7;
}

/// Pulse generator timing and waveform levels
pub mod pwm {
    /// Counter top value (one output period)
    pub const TOP: u16 = 10_000;
    /// Duty level for the mid flat pattern
    pub const MID: u16 = 7_500;
    /// Duty level for the low flat pattern
    pub const LOW: u16 = 2_000;
    /// Samples per sequence
    pub const STEP_COUNT: usize = 100;
    /// Largest sequence the sample buffer can hold
    pub const MAX_STEP_COUNT: usize = 256;
    /// Counter clock in Hz (one period is TOP / BASE_CLOCK_HZ = 20 ms)
    pub const BASE_CLOCK_HZ: u32 = 500_000;
    /// Extra periods each sample is held for
    pub const REPEATS: u16 = 1;
    /// Number of output channels driven by one sequence
    pub const CHANNEL_COUNT: usize = 4;
}

/// BLE identifiers and limits
pub mod ble {
    /// Vendor-specific base UUID (little-endian, bytes 12..14 replaced by the short UUID)
    pub const UUID_BASE: [u8; 16] = [
        0x1C, 0x6B, 0x5D, 0x0F, 0x48, 0x14, 0x26, 0xA2, 0x7F, 0x4F, 0xCF, 0x0F, 0x0E, 0xD0, 0x3C,
        0x82,
    ];
    pub const SERVICE_UUID: u16 = 0x1400;
    pub const SLED_VALUE_CHAR_UUID: u16 = 0x1401;
    pub const PWM_VALUE_CHAR_UUID: u16 = 0x1402;

    /// Sled value characteristic size
    pub const SLED_VALUE_LEN: usize = 8;
    /// PWM value characteristic size
    pub const PWM_VALUE_LEN: usize = 4;
    /// CCCD write size
    pub const CCCD_LEN: usize = 2;

    /// Device name prefix for advertising
    pub const DEVICE_NAME_PREFIX: &str = "Sled-";
    /// The device only ever serves one peer
    pub const CONNECTIONS_MAX: usize = 1;
    pub const L2CAP_CHANNELS_MAX: usize = 3;
}

/// Application defaults
pub mod app {
    /// Pattern code applied at start-up (FlatLow)
    pub const DEFAULT_PATTERN_CODE: u32 = 0;
    /// Interval between sled value notifications while subscribed
    pub const SLED_VALUE_INTERVAL_MS: u64 = 1_000;
}
