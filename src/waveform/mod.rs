//! Duty-cycle waveform synthesis
//!
//! Pure computation of the sample sequences loaded into the pulse generator.
//! Nothing here touches hardware.

pub mod generator;
pub mod pattern;

pub use generator::{compute, SampleSequence};
pub use pattern::WaveformPattern;
