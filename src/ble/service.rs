//! Sled GATT service definition for TrouBLE
//!
//! - Service UUID: 823C1400-0FCF-4F7F-A226-14480F5D6B1C
//! - Sled value: 823C1401-... (read, write, notify), 8 bytes
//! - PWM value: 823C1402-... (read, write, notify), 4 bytes
//!
//! TrouBLE builds the attribute table at compile time, so [`TroubleGatt`]
//! answers registration calls by checking the requested layout against the
//! generated table and handing back its handles.

use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use trouble_host::prelude::*;

use crate::ble::traits::{
    check_security, expand_uuid, AttributeSecurity, CharacteristicHandles, CharacteristicParams,
    ConnHandle, GattStack, SecurityMode, StackError, VendorUuid,
};
use crate::config::ble::{
    PWM_VALUE_CHAR_UUID, PWM_VALUE_LEN, SERVICE_UUID, SLED_VALUE_CHAR_UUID, SLED_VALUE_LEN,
    UUID_BASE,
};

/// Vendor UUID type handed out for the sled base
const SLED_UUID_TYPE: u8 = 2;

/// Permissions of the generated attribute table (no security attributes)
const TABLE_SECURITY: AttributeSecurity = AttributeSecurity {
    read: SecurityMode::Open,
    write: SecurityMode::Open,
};

/// Sled Service
#[gatt_service(uuid = "823c1400-0fcf-4f7f-a226-14480f5d6b1c")]
pub struct SledGattService {
    /// Sled value, little-endian u64
    #[characteristic(uuid = "823c1401-0fcf-4f7f-a226-14480f5d6b1c", read, write, notify, value = [0u8; 8])]
    pub sled_value: [u8; SLED_VALUE_LEN],

    /// PWM value, little-endian u32 pattern code
    #[characteristic(uuid = "823c1402-0fcf-4f7f-a226-14480f5d6b1c", read, write, notify, value = [0u8; 4])]
    pub pwm_value: [u8; PWM_VALUE_LEN],
}

/// BLE GATT Server with the Sled Service
#[gatt_server(mutex_type = CriticalSectionRawMutex)]
pub struct Server {
    pub sled: SledGattService,
}

impl From<trouble_host::Error> for StackError {
    fn from(error: trouble_host::Error) -> Self {
        match error {
            trouble_host::Error::NotFound => StackError::InvalidHandle,
            trouble_host::Error::OutOfMemory => StackError::NoResources,
            _ => StackError::Other,
        }
    }
}

/// [`GattStack`] view of the TrouBLE server, bound to the current link
pub struct TroubleGatt<'a, 'v, 'c, 's> {
    server: &'a Server<'v>,
    conn: Option<&'a GattConnection<'c, 's, DefaultPacketPool>>,
}

impl<'a, 'v, 'c, 's> TroubleGatt<'a, 'v, 'c, 's> {
    /// Stack with no link, for registration and offline updates
    pub fn new(server: &'a Server<'v>) -> Self {
        Self { server, conn: None }
    }

    /// Stack bound to an active link
    pub fn with_connection(
        server: &'a Server<'v>,
        conn: &'a GattConnection<'c, 's, DefaultPacketPool>,
    ) -> Self {
        Self {
            server,
            conn: Some(conn),
        }
    }
}

/// Connection handle of a TrouBLE link
pub fn conn_handle(conn: &GattConnection<'_, '_, DefaultPacketPool>) -> ConnHandle {
    ConnHandle(conn.raw().handle().raw())
}

impl GattStack for TroubleGatt<'_, '_, '_, '_> {
    fn register_uuid_base(&mut self, base: &[u8; 16]) -> Result<u8, StackError> {
        if *base != UUID_BASE {
            return Err(StackError::InvalidUuid);
        }
        Ok(SLED_UUID_TYPE)
    }

    fn register_service(&mut self, uuid: VendorUuid) -> Result<u16, StackError> {
        if uuid.uuid_type != SLED_UUID_TYPE || uuid.short != SERVICE_UUID {
            return Err(StackError::InvalidUuid);
        }
        // Characteristic declarations follow the service declaration
        Ok(self.server.sled.sled_value.handle.saturating_sub(2))
    }

    fn register_characteristic(
        &mut self,
        _service_handle: u16,
        params: &CharacteristicParams<'_>,
    ) -> Result<CharacteristicHandles, StackError> {
        if params.uuid.uuid_type != SLED_UUID_TYPE {
            return Err(StackError::InvalidUuid);
        }
        check_security(params.security, TABLE_SECURITY)?;

        let (handle, cccd_handle, capacity) = match params.uuid.short {
            SLED_VALUE_CHAR_UUID => (
                self.server.sled.sled_value.handle,
                self.server.sled.sled_value.cccd_handle,
                SLED_VALUE_LEN,
            ),
            PWM_VALUE_CHAR_UUID => (
                self.server.sled.pwm_value.handle,
                self.server.sled.pwm_value.cccd_handle,
                PWM_VALUE_LEN,
            ),
            _ => return Err(StackError::InvalidUuid),
        };

        if params.max_len != capacity || params.initial_value.len() > capacity {
            return Err(StackError::InvalidLength);
        }
        if params.notify != cccd_handle.is_some() {
            return Err(StackError::InvalidParam);
        }

        log::debug!(
            "Characteristic {:02x?} at {:#06x}",
            expand_uuid(&UUID_BASE, params.uuid.short),
            handle
        );

        self.set_value(handle, params.initial_value)?;
        Ok(CharacteristicHandles {
            value_handle: handle,
            cccd_handle,
        })
    }

    fn set_value(&mut self, handle: u16, value: &[u8]) -> Result<(), StackError> {
        if handle == self.server.sled.sled_value.handle {
            let mut stored = [0u8; SLED_VALUE_LEN];
            copy_value(&mut stored, value)?;
            self.server.set(&self.server.sled.sled_value, &stored)?;
        } else if handle == self.server.sled.pwm_value.handle {
            let mut stored = [0u8; PWM_VALUE_LEN];
            copy_value(&mut stored, value)?;
            self.server.set(&self.server.sled.pwm_value, &stored)?;
        } else {
            return Err(StackError::InvalidHandle);
        }
        Ok(())
    }

    async fn notify(
        &mut self,
        conn: ConnHandle,
        handle: u16,
        value: &[u8],
    ) -> Result<(), StackError> {
        let link = self.conn.ok_or(StackError::InvalidState)?;
        if conn_handle(link) != conn {
            return Err(StackError::InvalidState);
        }

        if handle == self.server.sled.sled_value.handle {
            let payload: [u8; SLED_VALUE_LEN] =
                value.try_into().map_err(|_| StackError::InvalidLength)?;
            self.server.sled.sled_value.notify(link, &payload).await?;
        } else if handle == self.server.sled.pwm_value.handle {
            let payload: [u8; PWM_VALUE_LEN] =
                value.try_into().map_err(|_| StackError::InvalidLength)?;
            self.server.sled.pwm_value.notify(link, &payload).await?;
        } else {
            return Err(StackError::InvalidHandle);
        }
        Ok(())
    }
}

/// Copy a (possibly short) initial value into fixed attribute storage
fn copy_value(stored: &mut [u8], value: &[u8]) -> Result<(), StackError> {
    if value.len() > stored.len() {
        return Err(StackError::InvalidLength);
    }
    stored[..value.len()].copy_from_slice(value);
    Ok(())
}
