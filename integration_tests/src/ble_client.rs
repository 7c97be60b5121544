//! BLE client for talking to a sled device through the Sled Service.

#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use anyhow::{anyhow, Result};
use btleplug::api::{
    Central, Characteristic, Manager as _, Peripheral as _, ScanFilter, WriteType,
};
use btleplug::platform::{Adapter, Manager, Peripheral};
use futures::StreamExt;
use tokio::sync::Mutex;
use tokio::time::timeout;
use uuid::Uuid;

/// Sled Service UUIDs
pub const SLED_SERVICE_UUID: Uuid = Uuid::from_u128(0x823c1400_0fcf_4f7f_a226_14480f5d6b1c);
pub const SLED_VALUE_UUID: Uuid = Uuid::from_u128(0x823c1401_0fcf_4f7f_a226_14480f5d6b1c);
pub const PWM_VALUE_UUID: Uuid = Uuid::from_u128(0x823c1402_0fcf_4f7f_a226_14480f5d6b1c);

/// Scan filter for finding sled devices
///
/// The advertisement carries only flags and the device name, so nothing is
/// filtered here and devices are matched by name.
pub fn scan_filter() -> ScanFilter {
    ScanFilter::default()
}

/// BLE client for one sled device.
pub struct SledClient {
    peripheral: Peripheral,
    sled_char: Characteristic,
    pwm_char: Characteristic,
    /// Sled value notifications received so far
    notifications: Arc<Mutex<Vec<u64>>>,
}

impl SledClient {
    /// Scan for a device whose name starts with `name` and connect.
    pub async fn connect_by_name(name: &str, scan_timeout: Duration) -> Result<Self> {
        let manager = Manager::new().await?;
        let adapters = manager.adapters().await?;
        let adapter = adapters
            .into_iter()
            .next()
            .ok_or_else(|| anyhow!("No Bluetooth adapters found"))?;

        adapter.start_scan(scan_filter()).await?;

        let peripheral = Self::find_device_by_name(&adapter, name, scan_timeout).await?;

        adapter.stop_scan().await?;

        peripheral.connect().await?;
        peripheral.discover_services().await?;

        if !peripheral
            .services()
            .iter()
            .any(|s| s.uuid == SLED_SERVICE_UUID)
        {
            return Err(anyhow!("Sled service not found"));
        }

        let characteristics = peripheral.characteristics();

        let sled_char = characteristics
            .iter()
            .find(|c| c.uuid == SLED_VALUE_UUID)
            .cloned()
            .ok_or_else(|| anyhow!("Sled value characteristic not found"))?;

        let pwm_char = characteristics
            .iter()
            .find(|c| c.uuid == PWM_VALUE_UUID)
            .cloned()
            .ok_or_else(|| anyhow!("PWM value characteristic not found"))?;

        let notifications = Arc::new(Mutex::new(Vec::new()));

        // Collect sled value notifications in the background
        let notifications_clone = notifications.clone();
        let peripheral_clone = peripheral.clone();
        tokio::spawn(async move {
            let mut stream = match peripheral_clone.notifications().await {
                Ok(s) => s,
                Err(_) => return,
            };

            while let Some(data) = stream.next().await {
                if data.uuid != SLED_VALUE_UUID {
                    continue;
                }
                if let Ok(bytes) = <[u8; 8]>::try_from(data.value.as_slice()) {
                    notifications_clone
                        .lock()
                        .await
                        .push(u64::from_le_bytes(bytes));
                }
            }
        });

        Ok(Self {
            peripheral,
            sled_char,
            pwm_char,
            notifications,
        })
    }

    /// Find a device by name prefix within the scan timeout.
    async fn find_device_by_name(
        adapter: &Adapter,
        name: &str,
        scan_timeout: Duration,
    ) -> Result<Peripheral> {
        let start = std::time::Instant::now();

        while start.elapsed() < scan_timeout {
            let peripherals = adapter.peripherals().await?;

            for peripheral in peripherals {
                if let Some(props) = peripheral.properties().await? {
                    if let Some(local_name) = props.local_name {
                        if local_name.starts_with(name) {
                            return Ok(peripheral);
                        }
                    }
                }
            }

            tokio::time::sleep(Duration::from_millis(100)).await;
        }

        Err(anyhow!("Device '{}' not found within timeout", name))
    }

    /// Read the sled value attribute.
    pub async fn read_sled_value(&self) -> Result<u64> {
        let data = self.peripheral.read(&self.sled_char).await?;
        let bytes: [u8; 8] = data
            .as_slice()
            .try_into()
            .map_err(|_| anyhow!("Sled value is {} bytes, expected 8", data.len()))?;
        Ok(u64::from_le_bytes(bytes))
    }

    /// Read the PWM value attribute.
    pub async fn read_pwm_value(&self) -> Result<u32> {
        let data = self.peripheral.read(&self.pwm_char).await?;
        let bytes: [u8; 4] = data
            .as_slice()
            .try_into()
            .map_err(|_| anyhow!("PWM value is {} bytes, expected 4", data.len()))?;
        Ok(u32::from_le_bytes(bytes))
    }

    /// Select a waveform by writing its pattern code.
    pub async fn write_pattern(&self, code: u32) -> Result<()> {
        self.write_pwm_raw(&code.to_le_bytes()).await
    }

    /// Write arbitrary bytes to the PWM value attribute.
    pub async fn write_pwm_raw(&self, data: &[u8]) -> Result<()> {
        self.peripheral
            .write(&self.pwm_char, data, WriteType::WithResponse)
            .await?;
        Ok(())
    }

    /// Enable sled value notifications.
    pub async fn subscribe(&self) -> Result<()> {
        self.peripheral.subscribe(&self.sled_char).await?;
        Ok(())
    }

    /// Disable sled value notifications.
    pub async fn unsubscribe(&self) -> Result<()> {
        self.peripheral.unsubscribe(&self.sled_char).await?;
        Ok(())
    }

    /// Wait until at least `count` notifications have arrived.
    pub async fn wait_for_notifications(
        &self,
        count: usize,
        wait_timeout: Duration,
    ) -> Result<Vec<u64>> {
        let result = timeout(wait_timeout, async {
            loop {
                {
                    let received = self.notifications.lock().await;
                    if received.len() >= count {
                        return received.clone();
                    }
                }
                tokio::time::sleep(Duration::from_millis(50)).await;
            }
        })
        .await;

        result.map_err(|_| anyhow!("Timeout waiting for {} sled value notifications", count))
    }

    /// Number of notifications received so far.
    pub async fn notification_count(&self) -> usize {
        self.notifications.lock().await.len()
    }

    /// Forget all received notifications.
    pub async fn clear_notifications(&self) {
        self.notifications.lock().await.clear();
    }

    /// Disconnect from the device.
    pub async fn disconnect(&self) -> Result<()> {
        self.peripheral.disconnect().await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scan_filter_matches_name_only_advertising() {
        assert!(scan_filter().services.is_empty());
    }
}
