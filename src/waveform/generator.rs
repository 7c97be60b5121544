//! Sample sequence generation
//!
//! Flat levels scale with `top_value` so that the reference top of 10000
//! yields 2000 / 7500 / 10000 and every sample stays within `[0, top_value]`.

use crate::config::pwm::{LOW, MAX_STEP_COUNT, MID, TOP};
use crate::waveform::pattern::WaveformPattern;
use heapless::Vec;

/// Duty-cycle samples for one full sequence period
pub type SampleSequence = Vec<u16, MAX_STEP_COUNT>;

/// Compute the sample sequence for `pattern`.
///
/// Returns `step_count` samples for implemented patterns and an empty
/// sequence for the reserved ones. `step_count` is bounded by the buffer
/// capacity (`MAX_STEP_COUNT`).
pub fn compute(pattern: WaveformPattern, step_count: usize, top_value: u16) -> SampleSequence {
    if step_count > MAX_STEP_COUNT {
        log::warn!(
            "{} steps requested, sequence truncated to {}",
            step_count,
            MAX_STEP_COUNT
        );
    }
    let step_count = step_count.min(MAX_STEP_COUNT);
    let mut samples = SampleSequence::new();

    match pattern {
        WaveformPattern::FlatLow => fill(&mut samples, step_count, scale(LOW, top_value)),
        WaveformPattern::FlatMid => fill(&mut samples, step_count, scale(MID, top_value)),
        WaveformPattern::FlatHigh => fill(&mut samples, step_count, top_value),
        WaveformPattern::RollingHills => rolling_hills(&mut samples, step_count, top_value),
        WaveformPattern::Left | WaveformPattern::Right | WaveformPattern::LateralVariation => {}
    }

    samples
}

/// Scale a level defined against the reference `TOP` onto `top_value`
fn scale(level: u16, top_value: u16) -> u16 {
    (u32::from(level) * u32::from(top_value) / u32::from(TOP)) as u16
}

fn fill(samples: &mut SampleSequence, step_count: usize, value: u16) {
    // Capacity already bounded by the caller
    let _ = samples.resize(step_count, value);
}

/// Rising running sum for the first `step_count / 2` samples, then falling.
fn rolling_hills(samples: &mut SampleSequence, step_count: usize, top_value: u16) {
    if step_count == 0 {
        return;
    }

    let step = (usize::from(top_value) / step_count) as u16;
    let rising = step_count / 2;
    let mut value: u16 = 0;

    for _ in 0..rising {
        value = value.saturating_add(step).min(top_value);
        let _ = samples.push(value);
    }

    for _ in rising..step_count {
        value = value.saturating_sub(step);
        let _ = samples.push(value);
    }
}
