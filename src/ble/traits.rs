//! GATT stack trait for abstraction and testability
//!
//! This trait defines the calls the sled service makes into the BLE stack,
//! allowing the real stack to be swapped with a mock for testing. Events
//! flowing the other way are modelled by [`StackEvent`].

use core::future::Future;

/// Errors reported by the BLE stack, passed through unchanged
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StackError {
    /// A parameter was rejected
    InvalidParam,
    /// UUID not known to or not accepted by the stack
    InvalidUuid,
    /// Attribute handle does not exist
    InvalidHandle,
    /// Value length exceeds the attribute capacity
    InvalidLength,
    /// Attribute table or vendor UUID table is full
    NoResources,
    /// Stack refused the operation in its current state
    InvalidState,
    /// Link is busy, retry later
    Busy,
    /// Any other stack failure
    Other,
}

impl core::fmt::Display for StackError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::InvalidParam => write!(f, "invalid parameter"),
            Self::InvalidUuid => write!(f, "invalid UUID"),
            Self::InvalidHandle => write!(f, "invalid attribute handle"),
            Self::InvalidLength => write!(f, "invalid value length"),
            Self::NoResources => write!(f, "no resources"),
            Self::InvalidState => write!(f, "stack in invalid state"),
            Self::Busy => write!(f, "stack busy"),
            Self::Other => write!(f, "stack error"),
        }
    }
}

/// Opaque identifier of the active link
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConnHandle(pub u16);

/// 16-bit UUID aliased into a registered vendor base UUID
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VendorUuid {
    /// Index returned by [`GattStack::register_uuid_base`]
    pub uuid_type: u8,
    /// 16-bit alias
    pub short: u16,
}

/// Expand a 16-bit alias into its full little-endian 128-bit UUID
///
/// The alias occupies bytes 12 and 13 of the base.
pub fn expand_uuid(base: &[u8; 16], short: u16) -> [u8; 16] {
    let mut uuid = *base;
    uuid[12..14].copy_from_slice(&short.to_le_bytes());
    uuid
}

/// Link security required to access an attribute
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SecurityMode {
    /// No access
    NoAccess,
    /// Open link
    #[default]
    Open,
    /// Encrypted, unauthenticated
    EncryptedNoMitm,
    /// Encrypted and authenticated
    EncryptedMitm,
}

/// Read and write permissions of a characteristic value
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct AttributeSecurity {
    pub read: SecurityMode,
    pub write: SecurityMode,
}

/// Check requested permissions against the ones the stack enforces
///
/// A stack that cannot apply the requested security must refuse the
/// characteristic rather than expose it with weaker permissions.
pub fn check_security(
    requested: AttributeSecurity,
    enforced: AttributeSecurity,
) -> Result<(), StackError> {
    if requested != enforced {
        return Err(StackError::InvalidParam);
    }
    Ok(())
}

/// Everything the stack needs to add one characteristic
#[derive(Debug, Clone, Copy)]
pub struct CharacteristicParams<'a> {
    pub uuid: VendorUuid,
    pub security: AttributeSecurity,
    /// Initial value; its length is the initial attribute length
    pub initial_value: &'a [u8],
    /// Attribute capacity in bytes
    pub max_len: usize,
    /// Adds a client characteristic configuration descriptor
    pub notify: bool,
}

/// Handles assigned to a registered characteristic
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CharacteristicHandles {
    pub value_handle: u16,
    /// Present when the characteristic is notify-capable
    pub cccd_handle: Option<u16>,
}

/// Event delivered by the BLE stack
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StackEvent<'a> {
    /// Peer connected
    Connected { conn: ConnHandle },
    /// Peer disconnected
    Disconnected { conn: ConnHandle, reason: u8 },
    /// Peer wrote an attribute
    Write {
        conn: ConnHandle,
        handle: u16,
        data: &'a [u8],
    },
    /// Anything the sled service does not handle
    Other,
}

/// Whether a CCCD value has the notification bit set
pub fn cccd_notifications_enabled(data: &[u8; 2]) -> bool {
    u16::from_le_bytes(*data) & 0x0001 != 0
}

/// Abstract GATT server interface for testability
pub trait GattStack {
    /// Register a vendor-specific base UUID, returning its type index
    fn register_uuid_base(&mut self, base: &[u8; 16]) -> Result<u8, StackError>;

    /// Add a primary service, returning its handle
    fn register_service(&mut self, uuid: VendorUuid) -> Result<u16, StackError>;

    /// Add a characteristic to `service_handle`
    fn register_characteristic(
        &mut self,
        service_handle: u16,
        params: &CharacteristicParams<'_>,
    ) -> Result<CharacteristicHandles, StackError>;

    /// Store an attribute value in the attribute table
    fn set_value(&mut self, handle: u16, value: &[u8]) -> Result<(), StackError>;

    /// Send a notification carrying `value` on `conn`
    fn notify(
        &mut self,
        conn: ConnHandle,
        handle: u16,
        value: &[u8],
    ) -> impl Future<Output = Result<(), StackError>>;
}

#[cfg(test)]
pub mod mock {
    //! Mock GATT stack for testing

    use super::*;
    use heapless::Vec;

    /// Notification recorded by the mock
    #[derive(Debug, Clone, PartialEq, Eq)]
    pub struct SentNotification {
        pub conn: ConnHandle,
        pub handle: u16,
        pub value: Vec<u8, 16>,
    }

    /// Mock GATT stack for unit testing
    pub struct MockGattStack {
        /// Next handle to hand out
        next_handle: u16,
        /// Registered vendor bases
        bases: Vec<[u8; 16], 4>,
        /// Registered characteristics (uuid, params copy)
        characteristics: Vec<(VendorUuid, AttributeSecurity, usize, usize, bool), 4>,
        /// Current attribute values by handle
        values: Vec<(u16, Vec<u8, 16>), 8>,
        /// Notifications sent
        notifications: Vec<SentNotification, 8>,
        /// Permissions the attribute table can enforce, any when `None`
        enforced_security: Option<AttributeSecurity>,
        /// Error to return on next register_characteristic
        next_register_error: Option<StackError>,
        /// Error to return on next set_value
        next_set_error: Option<StackError>,
        /// Error to return on next notify
        next_notify_error: Option<StackError>,
    }

    impl MockGattStack {
        /// Create a new mock stack
        pub fn new() -> Self {
            Self {
                next_handle: 0x000C,
                bases: Vec::new(),
                characteristics: Vec::new(),
                values: Vec::new(),
                notifications: Vec::new(),
                enforced_security: None,
                next_register_error: None,
                next_set_error: None,
                next_notify_error: None,
            }
        }

        fn allocate(&mut self) -> u16 {
            let handle = self.next_handle;
            self.next_handle += 1;
            handle
        }

        /// Only accept characteristics registered with `security`
        pub fn set_enforced_security(&mut self, security: AttributeSecurity) {
            self.enforced_security = Some(security);
        }

        /// Set an error to be returned by the next register_characteristic() call
        pub fn set_next_register_error(&mut self, error: StackError) {
            self.next_register_error = Some(error);
        }

        /// Set an error to be returned by the next set_value() call
        pub fn set_next_set_error(&mut self, error: StackError) {
            self.next_set_error = Some(error);
        }

        /// Set an error to be returned by the next notify() call
        pub fn set_next_notify_error(&mut self, error: StackError) {
            self.next_notify_error = Some(error);
        }

        /// Value stored for `handle`
        pub fn value(&self, handle: u16) -> Option<&[u8]> {
            self.values
                .iter()
                .find(|(h, _)| *h == handle)
                .map(|(_, v)| v.as_slice())
        }

        /// All notifications sent so far
        pub fn notifications(&self) -> &[SentNotification] {
            &self.notifications
        }

        /// Registered characteristics as (uuid, security, init len, max len, notify)
        pub fn characteristics(&self) -> &[(VendorUuid, AttributeSecurity, usize, usize, bool)] {
            &self.characteristics
        }

        fn store(&mut self, handle: u16, value: &[u8]) -> Result<(), StackError> {
            let mut stored = Vec::new();
            stored
                .extend_from_slice(value)
                .map_err(|_| StackError::InvalidLength)?;

            if let Some(entry) = self.values.iter_mut().find(|(h, _)| *h == handle) {
                entry.1 = stored;
            } else {
                self.values
                    .push((handle, stored))
                    .map_err(|_| StackError::NoResources)?;
            }
            Ok(())
        }
    }

    impl Default for MockGattStack {
        fn default() -> Self {
            Self::new()
        }
    }

    impl GattStack for MockGattStack {
        fn register_uuid_base(&mut self, base: &[u8; 16]) -> Result<u8, StackError> {
            self.bases.push(*base).map_err(|_| StackError::NoResources)?;
            // Type 0 and 1 are reserved for Bluetooth SIG UUIDs
            Ok(self.bases.len() as u8 + 1)
        }

        fn register_service(&mut self, uuid: VendorUuid) -> Result<u16, StackError> {
            if uuid.uuid_type < 2 || usize::from(uuid.uuid_type - 1) > self.bases.len() {
                return Err(StackError::InvalidUuid);
            }
            Ok(self.allocate())
        }

        fn register_characteristic(
            &mut self,
            _service_handle: u16,
            params: &CharacteristicParams<'_>,
        ) -> Result<CharacteristicHandles, StackError> {
            if let Some(error) = self.next_register_error.take() {
                return Err(error);
            }
            if let Some(enforced) = self.enforced_security {
                check_security(params.security, enforced)?;
            }
            if params.initial_value.len() > params.max_len {
                return Err(StackError::InvalidLength);
            }

            // Declaration handle, then value, then CCCD
            let _declaration = self.allocate();
            let value_handle = self.allocate();
            let cccd_handle = params.notify.then(|| self.allocate());

            self.store(value_handle, params.initial_value)?;
            self.characteristics
                .push((
                    params.uuid,
                    params.security,
                    params.initial_value.len(),
                    params.max_len,
                    params.notify,
                ))
                .map_err(|_| StackError::NoResources)?;

            Ok(CharacteristicHandles {
                value_handle,
                cccd_handle,
            })
        }

        fn set_value(&mut self, handle: u16, value: &[u8]) -> Result<(), StackError> {
            if let Some(error) = self.next_set_error.take() {
                return Err(error);
            }
            if self.value(handle).is_none() {
                return Err(StackError::InvalidHandle);
            }
            self.store(handle, value)
        }

        async fn notify(
            &mut self,
            conn: ConnHandle,
            handle: u16,
            value: &[u8],
        ) -> Result<(), StackError> {
            if let Some(error) = self.next_notify_error.take() {
                return Err(error);
            }

            let mut sent = Vec::new();
            sent.extend_from_slice(value)
                .map_err(|_| StackError::InvalidLength)?;
            self.notifications
                .push(SentNotification {
                    conn,
                    handle,
                    value: sent,
                })
                .map_err(|_| StackError::NoResources)?;
            Ok(())
        }
    }
}
