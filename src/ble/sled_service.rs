//! Sled Service
//!
//! GATT-facing state machine for the two sled characteristics:
//! - Sled value (8 bytes, read/write/notify)
//! - PWM value (4 bytes, read/write), selects the output waveform
//!
//! The service tracks the single peer connection and the client's
//! notification subscription, turns stack write events into
//! [`SledEvents`] callbacks and pushes local sled value updates.

use crate::ble::traits::{
    cccd_notifications_enabled, AttributeSecurity, CharacteristicHandles, CharacteristicParams,
    ConnHandle, GattStack, StackError, StackEvent, VendorUuid,
};
use crate::config::ble::{
    CCCD_LEN, PWM_VALUE_CHAR_UUID, PWM_VALUE_LEN, SERVICE_UUID, SLED_VALUE_CHAR_UUID,
    SLED_VALUE_LEN, UUID_BASE,
};

/// Errors returned by the sled service
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SledError {
    /// No peer is connected
    InvalidState,
    /// Write payload has the wrong size for the attribute
    LengthMismatch { expected: usize, actual: usize },
    /// Error reported by the BLE stack
    Stack(StackError),
}

impl From<StackError> for SledError {
    fn from(error: StackError) -> Self {
        Self::Stack(error)
    }
}

impl core::fmt::Display for SledError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::InvalidState => write!(f, "not connected"),
            Self::LengthMismatch { expected, actual } => {
                write!(f, "expected {} bytes, got {}", expected, actual)
            }
            Self::Stack(error) => write!(f, "stack: {}", error),
        }
    }
}

/// Application callbacks invoked by the sled service
///
/// All methods default to doing nothing.
pub trait SledEvents {
    /// A peer connected
    fn on_connected(&mut self) {}

    /// The peer subscribed to sled value notifications
    fn on_notifications_enabled(&mut self) {}

    /// The peer unsubscribed from sled value notifications
    fn on_notifications_disabled(&mut self) {}

    /// The peer wrote the PWM value
    fn on_pwm_value_written(&mut self, _value: u32) {}
}

/// Link state of the service
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Disconnected,
    Connected,
}

/// Options for [`SledService::init`]
#[derive(Debug, Clone, Copy, Default)]
pub struct SledServiceConfig {
    /// Sled value exposed before the first update
    pub initial_sled_value: u64,
    /// Permissions applied to both characteristic values
    pub security: AttributeSecurity,
}

/// Value and subscription state of one characteristic
#[derive(Debug, Clone, Copy)]
pub struct AttributeState<const N: usize> {
    handles: CharacteristicHandles,
    value: [u8; N],
    notifications_enabled: bool,
}

impl<const N: usize> AttributeState<N> {
    pub fn handles(&self) -> CharacteristicHandles {
        self.handles
    }

    pub fn value(&self) -> &[u8; N] {
        &self.value
    }

    pub fn notifications_enabled(&self) -> bool {
        self.notifications_enabled
    }

    fn is_cccd(&self, handle: u16) -> bool {
        self.handles.cccd_handle == Some(handle)
    }
}

/// Sled Service instance
pub struct SledService<H: SledEvents> {
    handler: H,
    sled_value: AttributeState<SLED_VALUE_LEN>,
    pwm_value: AttributeState<PWM_VALUE_LEN>,
    conn: Option<ConnHandle>,
}

impl<H: SledEvents> SledService<H> {
    /// Register the service and both characteristics with the stack
    ///
    /// Any stack error aborts initialisation and is returned unchanged.
    pub fn init<S: GattStack>(
        stack: &mut S,
        handler: H,
        config: &SledServiceConfig,
    ) -> Result<Self, SledError> {
        let uuid_type = stack.register_uuid_base(&UUID_BASE)?;
        let service_handle = stack.register_service(VendorUuid {
            uuid_type,
            short: SERVICE_UUID,
        })?;

        let sled_initial = config.initial_sled_value.to_le_bytes();
        let sled_value = add_characteristic(
            stack,
            service_handle,
            VendorUuid {
                uuid_type,
                short: SLED_VALUE_CHAR_UUID,
            },
            config.security,
            sled_initial,
        )?;

        let pwm_value = add_characteristic(
            stack,
            service_handle,
            VendorUuid {
                uuid_type,
                short: PWM_VALUE_CHAR_UUID,
            },
            config.security,
            [0u8; PWM_VALUE_LEN],
        )?;

        log::info!(
            "Sled service registered: service {:#06x}, sled value {:#06x}, pwm value {:#06x}",
            service_handle,
            sled_value.handles.value_handle,
            pwm_value.handles.value_handle
        );

        Ok(Self {
            handler,
            sled_value,
            pwm_value,
            conn: None,
        })
    }

    /// Process one stack event
    ///
    /// Only a malformed PWM value write produces an error; events for
    /// attributes this service does not own are ignored.
    pub fn handle_event(&mut self, event: &StackEvent<'_>) -> Result<(), SledError> {
        match *event {
            StackEvent::Connected { conn } => {
                log::info!("Sled service: connected ({})", conn.0);
                self.conn = Some(conn);
                self.handler.on_connected();
                Ok(())
            }
            StackEvent::Disconnected { conn, reason } => {
                log::info!("Sled service: disconnected ({}, reason {:#04x})", conn.0, reason);
                self.conn = None;
                Ok(())
            }
            StackEvent::Write { handle, data, .. } => self.on_write(handle, data),
            StackEvent::Other => Ok(()),
        }
    }

    fn on_write(&mut self, handle: u16, data: &[u8]) -> Result<(), SledError> {
        if handle == self.pwm_value.handles.value_handle {
            let value: [u8; PWM_VALUE_LEN] =
                data.try_into().map_err(|_| SledError::LengthMismatch {
                    expected: PWM_VALUE_LEN,
                    actual: data.len(),
                })?;

            self.pwm_value.value = value;
            let value = u32::from_le_bytes(value);
            log::debug!("PWM value written: {}", value);
            self.handler.on_pwm_value_written(value);
            return Ok(());
        }

        // CCCD writes of any other length are ignored
        let Ok(cccd) = <[u8; CCCD_LEN]>::try_from(data) else {
            return Ok(());
        };

        if self.sled_value.is_cccd(handle) {
            let enabled = cccd_notifications_enabled(&cccd);
            self.sled_value.notifications_enabled = enabled;
            log::debug!("Sled value notifications enabled: {}", enabled);
            if enabled {
                self.handler.on_notifications_enabled();
            } else {
                self.handler.on_notifications_disabled();
            }
        } else if self.pwm_value.is_cccd(handle) {
            self.pwm_value.notifications_enabled = cccd_notifications_enabled(&cccd);
        }

        Ok(())
    }

    /// Store a new sled value and notify the peer
    ///
    /// The attribute table is always updated first. Returns
    /// [`SledError::InvalidState`] when no peer is connected; when the peer
    /// has not subscribed the value is stored without a notification.
    pub async fn update_sled_value<S: GattStack>(
        &mut self,
        stack: &mut S,
        sled_value: u64,
    ) -> Result<(), SledError> {
        let bytes = sled_value.to_le_bytes();
        let handle = self.sled_value.handles.value_handle;

        stack.set_value(handle, &bytes)?;
        self.sled_value.value = bytes;

        let conn = self.conn.ok_or(SledError::InvalidState)?;
        if !self.sled_value.notifications_enabled {
            return Ok(());
        }

        stack.notify(conn, handle, &bytes).await?;
        Ok(())
    }

    /// Current link state
    pub fn state(&self) -> ConnectionState {
        match self.conn {
            Some(_) => ConnectionState::Connected,
            None => ConnectionState::Disconnected,
        }
    }

    /// Handle of the active link, if any
    pub fn conn_handle(&self) -> Option<ConnHandle> {
        self.conn
    }

    pub fn sled_value(&self) -> &AttributeState<SLED_VALUE_LEN> {
        &self.sled_value
    }

    pub fn pwm_value(&self) -> &AttributeState<PWM_VALUE_LEN> {
        &self.pwm_value
    }

    pub fn handler(&self) -> &H {
        &self.handler
    }
}

/// Add one notify-capable characteristic whose capacity is its value size
fn add_characteristic<S: GattStack, const N: usize>(
    stack: &mut S,
    service_handle: u16,
    uuid: VendorUuid,
    security: AttributeSecurity,
    initial_value: [u8; N],
) -> Result<AttributeState<N>, SledError> {
    let handles = stack.register_characteristic(
        service_handle,
        &CharacteristicParams {
            uuid,
            security,
            initial_value: &initial_value,
            max_len: N,
            notify: true,
        },
    )?;

    Ok(AttributeState {
        handles,
        value: initial_value,
        notifications_enabled: false,
    })
}
