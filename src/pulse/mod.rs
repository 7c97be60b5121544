//! Pulse generator control
//!
//! Hardware abstraction for the sequence-playback pulse generator, the
//! orchestration that loads waveforms into it and the software sequencer
//! used on targets without hardware sequence playback.

pub mod playback;
pub mod sequencer;
pub mod traits;

pub use playback::PlaybackController;
pub use sequencer::{DutyOutputs, SequenceCursor};
pub use traits::{ChannelPin, CountMode, PulseConfig, PulseError, PulseOutput};
