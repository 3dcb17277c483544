#![no_std]
#![no_main]
#![deny(
    clippy::mem_forget,
    reason = "mem::forget is generally not safe to do with esp_hal types, especially those \
    holding buffers for the duration of a data transfer."
)]
#![deny(clippy::large_stack_frames)]

use embassy_executor::Spawner;
use embassy_net::StackResources;
use embassy_time::{Instant, Timer};
use esp_hal::clock::CpuClock;
use esp_hal::gpio::{Level, Output, OutputConfig};
use esp_hal::i2c::master::I2c;
use esp_hal::timer::timg::TimerGroup;
use esp_hal::uart::Uart;
use log::{error, info, warn};
use rtt_target::rprintln;
use static_cell::StaticCell;

use guardpost_core::config::{Config, TuningConfig};
use guardpost_core::node::SensorNode;
use guardpost_firmware::hardware::{Accelerometer, Buzzer, GpsPort, StatusLed, scan_i2c_bus};
use guardpost_firmware::net::{self, HttpServer};
use guardpost_firmware::wifi_secrets;

#[panic_handler]
fn panic(info: &core::panic::PanicInfo) -> ! {
    rtt_target::rprintln!("PANIC: {}", info);
    loop {}
}

extern crate alloc;

// This creates a default app-descriptor required by the esp-idf bootloader.
// For more information see: <https://docs.espressif.com/projects/esp-idf/en/stable/esp32/api-reference/system/app_image_format.html#application-description>
esp_bootloader_esp_idf::esp_app_desc!();

/// How long boot waits for DHCP before carrying on without a lease.
const DHCP_WAIT_MS: u64 = 15_000;

static RADIO: StaticCell<esp_radio::Controller<'static>> = StaticCell::new();
static STACK_RESOURCES: StaticCell<StackResources<4>> = StaticCell::new();
static HTTP_RX_BUF: StaticCell<[u8; 1024]> = StaticCell::new();
static HTTP_TX_BUF: StaticCell<[u8; guardpost_core::http::RESPONSE_CAPACITY]> = StaticCell::new();

#[allow(
    clippy::large_stack_frames,
    reason = "it's not unusual to allocate larger buffers etc. in main"
)]
#[esp_rtos::main]
async fn main(spawner: Spawner) -> ! {
    rtt_target::rtt_init_print!();

    let config = esp_hal::Config::default().with_cpu_clock(CpuClock::max());
    let peripherals = esp_hal::init(config);

    esp_alloc::heap_allocator!(#[esp_hal::ram(reclaimed)] size: 73744);

    let timg0 = TimerGroup::new(peripherals.TIMG0);
    esp_rtos::start(timg0.timer0);

    rprintln!("guardpost booting");

    let config = Config {
        internet: wifi_secrets::internet_config(),
        tuning: TuningConfig::default(),
    };

    // --- Indicators --------------------------------------------------------

    let mut led = StatusLed::new(
        Output::new(peripherals.GPIO4, Level::Low, OutputConfig::default()),
        Output::new(peripherals.GPIO5, Level::Low, OutputConfig::default()),
        Output::new(peripherals.GPIO6, Level::Low, OutputConfig::default()),
    );
    let mut buzzer = Buzzer::new(Output::new(
        peripherals.GPIO7,
        Level::Low,
        OutputConfig::default(),
    ));

    // --- Accelerometer -----------------------------------------------------

    let mut i2c = I2c::new(peripherals.I2C0, esp_hal::i2c::master::Config::default())
        .expect("I2C peripheral init failed")
        .with_sda(peripherals.GPIO8)
        .with_scl(peripherals.GPIO9)
        .into_async();

    scan_i2c_bus(&mut i2c).await;

    let mut accel = match Accelerometer::init(i2c).await {
        Ok(accel) => accel,
        Err(e) => {
            // Without motion sensing the node has no purpose; park with the
            // fault color rather than serving bogus data.
            error!("accelerometer init failed: {e}");
            led.show(guardpost_core::alert::LedColor::Red);
            loop {
                Timer::after_secs(1).await;
            }
        }
    };
    info!("accelerometer online");

    // --- GPS ---------------------------------------------------------------

    let uart = Uart::new(
        peripherals.UART1,
        esp_hal::uart::Config::default().with_baudrate(9600),
    )
    .expect("UART peripheral init failed")
    .with_rx(peripherals.GPIO18)
    .with_tx(peripherals.GPIO17);
    let mut gps = GpsPort::new(uart);

    match gps.detect_baud().await {
        Ok(baud) => info!("GPS port ready at {baud} baud"),
        Err(e) => warn!("GPS baud probing failed: {e}"),
    }

    // --- Network -----------------------------------------------------------

    let radio_init = RADIO.init(esp_radio::init().expect("radio controller init failed"));
    let (controller, interfaces) =
        esp_radio::wifi::new(radio_init, peripherals.WIFI, Default::default())
            .expect("WiFi interface init failed");

    let mut rng = esp_hal::rng::Rng::new(peripherals.RNG);
    let seed = (rng.random() as u64) << 32 | rng.random() as u64;
    let (stack, runner) = embassy_net::new(
        interfaces.sta,
        embassy_net::Config::dhcpv4(Default::default()),
        STACK_RESOURCES.init(StackResources::new()),
        seed,
    );
    spawner.spawn(net::net_task(runner)).expect("net task");
    spawner
        .spawn(net::connection_task(controller, config.internet))
        .expect("connection task");

    let mut waited = 0u64;
    while !stack.is_config_up() && waited < DHCP_WAIT_MS {
        Timer::after_millis(500).await;
        waited += 500;
    }
    match stack.config_v4() {
        Some(cfg) => info!("serving on http://{}/", cfg.address.address()),
        None => warn!("no DHCP lease yet; HTTP comes up when the link does"),
    }

    // --- Main loop ---------------------------------------------------------

    let mut server = HttpServer::new(
        config.tuning.http_port,
        stack,
        HTTP_RX_BUF.init([0; 1024]),
        HTTP_TX_BUF.init([0; guardpost_core::http::RESPONSE_CAPACITY]),
    );
    let tick_delay_ms = config.tuning.tick_delay_ms;
    let mut node = SensorNode::new(config.tuning);

    led.show(node.startup_color());
    info!("entering sensor loop");

    let mut uart_buf = [0u8; 256];
    loop {
        let now_ms = Instant::now().as_millis();

        // Drain every byte the receiver pushed since the last pass.
        loop {
            let n = gps.read_available(&mut uart_buf);
            if n == 0 {
                break;
            }
            node.feed_gps_slice(&uart_buf[..n]);
        }

        let sample = match accel.read().await {
            Ok(sample) => sample,
            Err(e) => {
                warn!("accelerometer read failed: {e}");
                Timer::after_millis(tick_delay_ms).await;
                continue;
            }
        };

        let effects = node.tick(sample, now_ms);

        if let Some(color) = effects.led {
            led.show(color);
        }
        if let Some(shake) = effects.shake {
            warn!(
                "shake detected: delta {:.2} g (magnitude {:.2} g) at {} ms",
                shake.delta, shake.magnitude, shake.at_ms
            );
            let fix = node.fix();
            if fix.valid {
                info!(
                    "location: https://maps.google.com/?q={:.6},{:.6}",
                    fix.latitude, fix.longitude
                );
            } else {
                info!("no GPS fix to attach to this event");
            }
        }
        if let Some(pattern) = effects.buzzer {
            // Blocks the loop for the pattern duration; GPS bytes beyond the
            // UART FIFO are lost during playback.
            buzzer.play(pattern).await;
        }
        if effects.fix_report_due {
            log_fix_summary(&node);
        }

        server.serve_pending(&node, sample, now_ms).await;

        Timer::after_millis(tick_delay_ms).await;
    }
}

fn log_fix_summary(node: &SensorNode) {
    let fix = node.fix();
    let health = node.link_health();

    if fix.valid {
        info!(
            "fix: {:.6},{:.6} sats={:?} alt={:?} m speed={:?} km/h",
            fix.latitude, fix.longitude, fix.satellites, fix.altitude_m, fix.speed_kmph
        );
    } else {
        info!(
            "waiting for GPS fix ({} sentences decoded)",
            health.passed_checksum
        );
    }

    if health.chars_processed < 10 {
        warn!("GPS has sent almost no data; check wiring");
    }
}
