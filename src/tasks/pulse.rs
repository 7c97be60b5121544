//! Pulse task for sequence playback on the LEDC outputs
//!
//! The ESP32-S3 has no PWM sequence player, so [`EspPulseOutput`] hands the
//! sample sequence to this task, which steps it once per output period.

use core::cell::RefCell;
use core::convert::Infallible;

use embassy_futures::select::{select, Either};
use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::blocking_mutex::Mutex;
use embassy_sync::signal::Signal;
use embassy_time::{Duration, Ticker};
use embedded_hal::pwm::{ErrorType, SetDutyCycle};
use esp_hal::ledc::channel::{self, ChannelHW};
use esp_hal::ledc::LowSpeed;

use crate::pulse::{
    CountMode, DutyOutputs, PulseConfig, PulseError, PulseOutput, SequenceCursor,
};

/// LEDC duty resolution in bits
pub const LEDC_DUTY_BITS: u32 = 14;

/// Sequence and timing shared between the driver and the task
struct PlaybackState {
    cursor: SequenceCursor,
    period_us: u64,
    top_value: u16,
}

/// Playback state, `None` until the driver is initialised
static PLAYBACK: Mutex<CriticalSectionRawMutex, RefCell<Option<PlaybackState>>> =
    Mutex::new(RefCell::new(None));

/// Wakes the task when the playback state changes
static PLAYBACK_CHANGED: Signal<CriticalSectionRawMutex, ()> = Signal::new();

/// [`PulseOutput`] backed by [`pulse_task`]
#[derive(Default)]
pub struct EspPulseOutput;

impl EspPulseOutput {
    pub fn new() -> Self {
        Self
    }
}

impl PulseOutput for EspPulseOutput {
    fn init(&mut self, config: &PulseConfig) -> Result<(), PulseError> {
        // LEDC timers only count up
        if config.count_mode == CountMode::UpDown {
            return Err(PulseError::InvalidConfig);
        }

        config.validate()?;
        let period_us = config.period_us();

        PLAYBACK.lock(|state| {
            state.replace(Some(PlaybackState {
                cursor: SequenceCursor::idle(),
                period_us,
                top_value: config.top_value,
            }));
        });
        PLAYBACK_CHANGED.signal(());
        Ok(())
    }

    fn start_loop(&mut self, samples: &[u16], repeats: u16) -> Result<(), PulseError> {
        let cursor = SequenceCursor::load(samples, repeats)?;

        PLAYBACK.lock(|state| {
            let mut state = state.borrow_mut();
            let playback = state.as_mut().ok_or(PulseError::NotInitialised)?;
            playback.cursor = cursor;
            Ok::<(), PulseError>(())
        })?;
        PLAYBACK_CHANGED.signal(());
        Ok(())
    }

    fn stop(&mut self) {
        PLAYBACK.lock(|state| {
            if let Some(playback) = state.borrow_mut().as_mut() {
                playback.cursor = SequenceCursor::idle();
            }
        });
        PLAYBACK_CHANGED.signal(());
    }
}

/// LEDC channel driven through its raw duty register
pub struct LedcPulseChannel {
    channel: channel::Channel<'static, LowSpeed>,
}

impl LedcPulseChannel {
    pub fn new(channel: channel::Channel<'static, LowSpeed>) -> Self {
        Self { channel }
    }
}

impl ErrorType for LedcPulseChannel {
    type Error = Infallible;
}

impl SetDutyCycle for LedcPulseChannel {
    fn max_duty_cycle(&self) -> u16 {
        ((1u32 << LEDC_DUTY_BITS) - 1) as u16
    }

    fn set_duty_cycle(&mut self, duty: u16) -> Result<(), Self::Error> {
        self.channel.set_duty_hw(u32::from(duty));
        Ok(())
    }
}

/// Timing snapshot of the current playback
fn current_timing() -> Option<(u64, u16, bool)> {
    PLAYBACK.lock(|state| {
        state
            .borrow()
            .as_ref()
            .map(|p| (p.period_us, p.top_value, p.cursor.is_active()))
    })
}

/// Next sample of the current sequence
fn next_sample() -> Option<u16> {
    PLAYBACK.lock(|state| {
        state
            .borrow_mut()
            .as_mut()
            .and_then(|p| p.cursor.next_sample())
    })
}

/// Task that plays the loaded sequence on all pulse channels
///
/// Outputs stay off while nothing is loaded. Any change to the playback
/// state restarts the period ticker so a new sequence starts on a fresh
/// period boundary.
pub async fn pulse_task(mut outputs: DutyOutputs<LedcPulseChannel>) {
    loop {
        let Some((period_us, top_value, true)) = current_timing() else {
            let _ = outputs.off();
            PLAYBACK_CHANGED.wait().await;
            continue;
        };

        log::debug!("Pulse: playing, period {} us", period_us);
        outputs.set_top_value(top_value);
        let mut ticker = Ticker::every(Duration::from_micros(period_us));

        loop {
            let Some(sample) = next_sample() else {
                break;
            };
            let _ = outputs.write(sample);

            match select(ticker.next(), PLAYBACK_CHANGED.wait()).await {
                Either::First(()) => {}
                Either::Second(()) => break,
            }
        }
    }
}
