//! Sled application logic
//!
//! Reacts to sled service callbacks: PWM value writes select the waveform
//! played on the pulse outputs, and the notification subscription decides
//! whether the BLE task keeps publishing the sled value.

use crate::ble::SledEvents;
use crate::config::app::DEFAULT_PATTERN_CODE;
use crate::pulse::{PlaybackController, PulseError, PulseOutput};
use crate::waveform::WaveformPattern;

/// Application state shared with the sled service
pub struct SledApplication<D: PulseOutput> {
    playback: PlaybackController<D>,
    publishing: bool,
    last_error: Option<PulseError>,
}

impl<D: PulseOutput> SledApplication<D> {
    pub fn new(playback: PlaybackController<D>) -> Self {
        Self {
            playback,
            publishing: false,
            last_error: None,
        }
    }

    /// Start the default waveform
    pub fn start(&mut self) -> Result<(), PulseError> {
        let pattern = WaveformPattern::from_code(DEFAULT_PATTERN_CODE)
            .unwrap_or(WaveformPattern::FlatLow);
        self.playback.apply_pattern(pattern)
    }

    /// Whether the peer wants sled value notifications
    pub fn is_publishing(&self) -> bool {
        self.publishing
    }

    /// Pattern currently on the outputs
    pub fn active_pattern(&self) -> Option<WaveformPattern> {
        self.playback.active_pattern()
    }

    /// Error from the most recent pattern change, if it failed
    pub fn last_error(&self) -> Option<PulseError> {
        self.last_error
    }

    pub fn playback(&self) -> &PlaybackController<D> {
        &self.playback
    }

    #[cfg(test)]
    pub fn playback_mut(&mut self) -> &mut PlaybackController<D> {
        &mut self.playback
    }
}

impl<D: PulseOutput> SledEvents for SledApplication<D> {
    fn on_connected(&mut self) {
        log::info!("Peer connected");
    }

    fn on_notifications_enabled(&mut self) {
        log::info!("Sled value notifications on");
        self.publishing = true;
    }

    fn on_notifications_disabled(&mut self) {
        log::info!("Sled value notifications off");
        self.publishing = false;
    }

    fn on_pwm_value_written(&mut self, value: u32) {
        let Some(pattern) = WaveformPattern::from_code(value) else {
            log::warn!("Unknown pattern code {}", value);
            self.last_error = Some(PulseError::UnsupportedPattern);
            return;
        };

        self.last_error = self.playback.apply_pattern(pattern).err();
        if let Some(error) = self.last_error {
            log::warn!("Pattern {:?} not applied: {}", pattern, error);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ble::traits::mock::MockGattStack;
    use crate::ble::traits::ConnHandle;
    use crate::ble::{SledService, SledServiceConfig, StackEvent};
    use crate::pulse::traits::mock::MockPulseOutput;
    use crate::pulse::PulseConfig;

    fn app() -> SledApplication<MockPulseOutput> {
        SledApplication::new(PlaybackController::new(
            MockPulseOutput::new(),
            PulseConfig::default(),
        ))
    }

    #[test]
    fn test_start_plays_default_pattern() {
        let mut app = app();
        app.start().unwrap();

        assert_eq!(app.active_pattern(), Some(WaveformPattern::FlatLow));
        let playing = app.playback().driver().playing().unwrap();
        assert!(playing.iter().all(|&s| s == 2000));
    }

    #[test]
    fn test_pwm_code_selects_pattern() {
        let mut app = app();
        app.start().unwrap();

        app.on_pwm_value_written(6);

        assert_eq!(app.active_pattern(), Some(WaveformPattern::RollingHills));
        assert_eq!(app.last_error(), None);
        let playing = app.playback().driver().playing().unwrap();
        assert_eq!(playing[0], 100);
        assert_eq!(playing[49], 5000);
    }

    #[test]
    fn test_unknown_code_keeps_pattern() {
        let mut app = app();
        app.start().unwrap();
        app.playback_mut().driver_mut().clear_calls();

        app.on_pwm_value_written(100);

        assert_eq!(app.active_pattern(), Some(WaveformPattern::FlatLow));
        assert_eq!(app.last_error(), Some(PulseError::UnsupportedPattern));
        assert!(app.playback().driver().calls().is_empty());
    }

    #[test]
    fn test_reserved_code_keeps_pattern() {
        let mut app = app();
        app.start().unwrap();

        app.on_pwm_value_written(WaveformPattern::LateralVariation.code());

        assert_eq!(app.active_pattern(), Some(WaveformPattern::FlatLow));
        assert_eq!(app.last_error(), Some(PulseError::UnsupportedPattern));
    }

    #[test]
    fn test_subscription_toggles_publishing() {
        let mut app = app();
        assert!(!app.is_publishing());

        app.on_notifications_enabled();
        assert!(app.is_publishing());

        app.on_notifications_disabled();
        assert!(!app.is_publishing());
    }

    #[test]
    fn test_write_event_reaches_outputs() {
        let mut stack = MockGattStack::new();
        let mut app = app();
        app.start().unwrap();
        let mut service =
            SledService::init(&mut stack, app, &SledServiceConfig::default()).unwrap();
        let handle = service.pwm_value().handles().value_handle;

        service
            .handle_event(&StackEvent::Connected {
                conn: ConnHandle(1),
            })
            .unwrap();
        service
            .handle_event(&StackEvent::Write {
                conn: ConnHandle(1),
                handle,
                data: &2u32.to_le_bytes(),
            })
            .unwrap();

        let app = service.handler();
        assert_eq!(app.active_pattern(), Some(WaveformPattern::FlatHigh));
        let playing = app.playback().driver().playing().unwrap();
        assert!(playing.iter().all(|&s| s == 10000));
    }
}
