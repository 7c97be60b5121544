#![no_std]
#![no_main]

extern crate alloc;

// Required for ESP-IDF bootloader compatibility
// Use explicit parameters to ensure correct efuse block revision values
esp_bootloader_esp_idf::esp_app_desc!(
    env!("CARGO_PKG_VERSION"),  // version
    env!("CARGO_PKG_NAME"),     // project_name
    "00:00:00",                 // build_time
    "2025-01-01",               // build_date
    "0.0.0",                    // idf_ver (not using IDF)
    0x10000,                    // mmu_page_size (64KB)
    0,                          // min_efuse_blk_rev_full (accept all)
    u16::MAX                    // max_efuse_blk_rev_full (accept all)
);

use embassy_executor::Spawner;
use esp_backtrace as _;
use esp_hal::gpio::interconnect::PeripheralOutput;
use esp_hal::ledc::channel::{self, ChannelIFace};
use esp_hal::ledc::timer::{self, TimerIFace};
use esp_hal::ledc::{LSGlobalClkSource, Ledc, LowSpeed};
use esp_hal::time::Rate;
use esp_hal::timer::timg::TimerGroup;
use static_cell::StaticCell;

use sled_firmware::app::SledApplication;
use sled_firmware::pulse::{DutyOutputs, PlaybackController, PulseConfig};
use sled_firmware::tasks::{self, EspPulseOutput, LedcPulseChannel};

/// Static executor for embassy
static EXECUTOR: StaticCell<esp_rtos::embassy::Executor> = StaticCell::new();

/// Static cell for esp-radio controller (needed for 'static lifetime)
static RADIO_CONTROLLER: StaticCell<esp_radio::Controller<'static>> = StaticCell::new();

/// LEDC peripheral and its timer must outlive the pulse channels
static LEDC: StaticCell<Ledc<'static>> = StaticCell::new();
static PULSE_TIMER: StaticCell<timer::Timer<'static, LowSpeed>> = StaticCell::new();

/// Type alias for the BLE controller
type BleController = trouble_host::prelude::ExternalController<
    esp_radio::ble::controller::BleConnector<'static>,
    10,
>;

#[esp_hal::main]
fn main() -> ! {
    esp_println::logger::init_logger(log::LevelFilter::Info);

    // Initialise heap allocator for BLE support (64KB - BLE requires significant heap)
    esp_alloc::heap_allocator!(size: 64 * 1024);

    let peripherals = esp_hal::init(esp_hal::Config::default());

    // Initialise the RTOS scheduler with timer - MUST be done before any async operations
    let timg0 = TimerGroup::new(peripherals.TIMG0);
    esp_rtos::start(timg0.timer0);

    let pulse_config = PulseConfig::default();

    // One LEDC period per pulse period (50 Hz at the default timing)
    let mut ledc = Ledc::new(peripherals.LEDC);
    ledc.set_global_slow_clock(LSGlobalClkSource::APBClk);
    let ledc = LEDC.init(ledc);

    let mut pulse_timer = ledc.timer::<LowSpeed>(timer::Number::Timer0);
    pulse_timer
        .configure(timer::config::Config {
            duty: timer::config::Duty::Duty14Bit,
            clock_source: timer::LSClockSource::APBClk,
            frequency: Rate::from_hz((1_000_000 / pulse_config.period_us()) as u32),
        })
        .expect("Failed to configure pulse timer");
    let pulse_timer: &'static timer::Timer<'static, LowSpeed> = PULSE_TIMER.init(pulse_timer);

    // GPIO order follows config::pulse_pins; inversion is applied per sample
    let outputs = DutyOutputs::new(
        [
            pulse_channel(ledc, pulse_timer, channel::Number::Channel0, peripherals.GPIO4),
            pulse_channel(ledc, pulse_timer, channel::Number::Channel1, peripherals.GPIO5),
            pulse_channel(ledc, pulse_timer, channel::Number::Channel2, peripherals.GPIO6),
            pulse_channel(ledc, pulse_timer, channel::Number::Channel3, peripherals.GPIO7),
        ],
        &pulse_config.channels,
        pulse_config.top_value,
    );

    // Read unique device ID from eFuse MAC address (last 3 bytes)
    let mac = esp_hal::efuse::Efuse::read_base_mac_address();
    let device_id: [u8; 3] = [mac[3], mac[4], mac[5]];

    // Initialise esp-radio for BLE support (must be after esp_rtos::start)
    let radio_controller = RADIO_CONTROLLER.init(
        esp_radio::init().expect("Failed to initialize esp-radio")
    );

    // Create BLE connector (ownership is passed to ExternalController)
    let ble_connector = esp_radio::ble::controller::BleConnector::new(
        radio_controller,
        peripherals.BT,
        esp_radio::ble::Config::default(),
    ).expect("Failed to initialize BLE connector");

    // Wrap in ExternalController for trouble-host compatibility
    let controller: BleController = trouble_host::prelude::ExternalController::new(ble_connector);

    // Create and run the embassy executor
    let executor = EXECUTOR.init(esp_rtos::embassy::Executor::new());
    executor.run(|spawner| {
        spawner.must_spawn(async_main(spawner, outputs, pulse_config, controller, device_id));
    })
}

/// Configure one LEDC channel on the shared pulse timer
fn pulse_channel(
    ledc: &'static Ledc<'static>,
    pulse_timer: &'static timer::Timer<'static, LowSpeed>,
    number: channel::Number,
    pin: impl PeripheralOutput<'static>,
) -> LedcPulseChannel {
    let mut channel = ledc.channel::<LowSpeed>(number, pin);
    channel
        .configure(channel::config::Config {
            timer: pulse_timer,
            duty_pct: 0,
            pin_config: channel::config::PinConfig::PushPull,
        })
        .expect("Failed to configure pulse channel");
    LedcPulseChannel::new(channel)
}

#[embassy_executor::task]
async fn async_main(
    spawner: Spawner,
    outputs: DutyOutputs<LedcPulseChannel>,
    pulse_config: PulseConfig,
    ble_controller: BleController,
    device_id: [u8; 3],
) {
    let playback = PlaybackController::new(EspPulseOutput::new(), pulse_config);
    let mut app = SledApplication::new(playback);
    if let Err(e) = app.start() {
        log::error!("Default pattern failed: {}", e);
    }

    // Spawn tasks
    spawner.spawn(pulse_task(outputs)).unwrap();
    spawner.spawn(ble_host_task(ble_controller, device_id, app)).unwrap();
}

/// Task that steps the active sample sequence on the pulse outputs
#[embassy_executor::task]
async fn pulse_task(outputs: DutyOutputs<LedcPulseChannel>) {
    tasks::pulse_task(outputs).await;
}

/// Task that manages BLE connectivity
///
/// This task handles BLE advertising, connections, and the sled service.
#[embassy_executor::task]
async fn ble_host_task(
    controller: BleController,
    device_id: [u8; 3],
    app: SledApplication<EspPulseOutput>,
) {
    tasks::ble_task(controller, device_id, app).await;
}
