//! BLE task for the sled service
//!
//! Implements the BLE host task that advertises the device, feeds GATT
//! events into the sled service and publishes the sled value while the
//! peer is subscribed.

use embassy_futures::select::{select, Either};
use embassy_time::{Duration, Instant, Ticker};
use trouble_host::att::AttErrorCode;
use trouble_host::prelude::*;

use crate::app::SledApplication;
use crate::ble::service::{conn_handle, Server, TroubleGatt};
use crate::ble::{SledError, SledService, SledServiceConfig, StackEvent};
use crate::config::app::SLED_VALUE_INTERVAL_MS;
use crate::config::ble::{CONNECTIONS_MAX, DEVICE_NAME_PREFIX, L2CAP_CHANNELS_MAX};
use crate::tasks::pulse::EspPulseOutput;

/// Sled service as run on the device
pub type DeviceSledService = SledService<SledApplication<EspPulseOutput>>;

/// Format device ID bytes as uppercase hex after the name prefix
fn format_device_name<'a>(buf: &'a mut [u8; 20], device_id: &[u8; 3]) -> &'a str {
    const HEX_CHARS: &[u8; 16] = b"0123456789ABCDEF";
    let prefix = DEVICE_NAME_PREFIX.as_bytes();

    buf[..prefix.len()].copy_from_slice(prefix);

    let mut pos = prefix.len();
    for &byte in device_id {
        buf[pos] = HEX_CHARS[(byte >> 4) as usize];
        buf[pos + 1] = HEX_CHARS[(byte & 0x0F) as usize];
        pos += 2;
    }

    // All bytes are ASCII
    core::str::from_utf8(&buf[..pos]).unwrap_or(DEVICE_NAME_PREFIX)
}

/// Main BLE task that manages the Bluetooth stack and the sled service
///
/// This task:
/// 1. Builds the GATT server and registers the sled service
/// 2. Advertises as "Sled-XXXXXX" (unique per device)
/// 3. Routes connection and write events to the service
/// 4. Notifies the sled value every `SLED_VALUE_INTERVAL_MS` while subscribed
pub async fn ble_task<C: Controller>(
    controller: C,
    device_id: [u8; 3],
    app: SledApplication<EspPulseOutput>,
) {
    let mut device_name_buf = [0u8; 20];
    let device_name = format_device_name(&mut device_name_buf, &device_id);

    log::info!("BLE: Starting as '{}'", device_name);

    let mut resources: HostResources<DefaultPacketPool, CONNECTIONS_MAX, L2CAP_CHANNELS_MAX> =
        HostResources::new();

    // Random static address derived from the device ID
    let stack = trouble_host::new(controller, &mut resources).set_random_address(Address::random([
        device_id[0],
        device_id[1],
        device_id[2],
        0x5E,
        0x1D,
        0xC4,
    ]));

    let Host {
        mut peripheral,
        mut runner,
        ..
    } = stack.build();

    let gap = GapConfig::Peripheral(PeripheralConfig {
        name: device_name,
        appearance: &appearance::UNKNOWN,
    });
    let server: Server = match Server::new_with_config(gap) {
        Ok(s) => s,
        Err(e) => {
            log::error!("BLE: GATT server setup failed: {:?}", e);
            return;
        }
    };

    let mut service = match SledService::init(
        &mut TroubleGatt::new(&server),
        app,
        &SledServiceConfig::default(),
    ) {
        Ok(s) => s,
        Err(e) => {
            log::error!("BLE: sled service init failed: {}", e);
            return;
        }
    };

    let runner_task = runner.run();

    let peripheral_task = async {
        let mut adv_data = [0u8; 31];
        let len = match AdStructure::encode_slice(
            &[
                AdStructure::Flags(LE_GENERAL_DISCOVERABLE | BR_EDR_NOT_SUPPORTED),
                AdStructure::CompleteLocalName(device_name.as_bytes()),
            ],
            &mut adv_data,
        ) {
            Ok(l) => l,
            Err(_) => return,
        };

        loop {
            log::debug!("BLE: Advertising...");
            let advertiser = match peripheral
                .advertise(
                    &Default::default(),
                    Advertisement::ConnectableScannableUndirected {
                        adv_data: &adv_data[..len],
                        scan_data: &[],
                    },
                )
                .await
            {
                Ok(a) => a,
                Err(_) => continue,
            };

            let acceptor = match advertiser.accept().await {
                Ok(a) => a,
                Err(_) => continue,
            };

            let conn = match acceptor.with_attribute_server(&*server) {
                Ok(c) => c,
                Err(_) => continue,
            };

            serve_connection(&server, &conn, &mut service).await;
        }
    };

    select(runner_task, peripheral_task).await;
}

/// Feed a link event to the service, logging anything it refuses
fn route_event(service: &mut DeviceSledService, event: &StackEvent<'_>) {
    if let Err(e) = service.handle_event(event) {
        log::warn!("BLE: {:?} not handled: {}", event, e);
    }
}

/// Handle one connection until the peer disconnects
async fn serve_connection(
    server: &Server<'_>,
    conn: &GattConnection<'_, '_, DefaultPacketPool>,
    service: &mut DeviceSledService,
) {
    let handle = conn_handle(conn);
    route_event(service, &StackEvent::Connected { conn: handle });

    let mut ticker = Ticker::every(Duration::from_millis(SLED_VALUE_INTERVAL_MS));

    loop {
        match select(conn.next(), ticker.next()).await {
            Either::First(GattConnectionEvent::Disconnected { reason }) => {
                route_event(
                    service,
                    &StackEvent::Disconnected {
                        conn: handle,
                        reason: reason.into_inner(),
                    },
                );
                break;
            }
            Either::First(GattConnectionEvent::Gatt { event }) => match event {
                GattEvent::Write(write_event) => {
                    let result = service.handle_event(&StackEvent::Write {
                        conn: handle,
                        handle: write_event.handle(),
                        data: write_event.data(),
                    });
                    match result {
                        Err(SledError::LengthMismatch { expected, actual }) => {
                            log::warn!("BLE: rejected {} byte write, expected {}", actual, expected);
                            let _ = write_event.reject(AttErrorCode::INVALID_ATTRIBUTE_VALUE_LENGTH);
                        }
                        _ => {
                            let _ = write_event.accept();
                        }
                    }
                }
                GattEvent::Read(read_event) => {
                    let _ = read_event.accept();
                }
                GattEvent::Other(other_event) => {
                    let _ = other_event.accept();
                }
            },
            Either::First(_) => route_event(service, &StackEvent::Other),
            Either::Second(()) => {
                if !service.handler().is_publishing() {
                    continue;
                }
                let uptime_ms = Instant::now().as_millis();
                let mut stack = TroubleGatt::with_connection(server, conn);
                if let Err(e) = service.update_sled_value(&mut stack, uptime_ms).await {
                    log::warn!("BLE: sled value notify failed: {}", e);
                }
            }
        }
    }
}
