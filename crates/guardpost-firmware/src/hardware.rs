//! Board bring-up and peripheral drivers: accelerometer, GPS UART, status
//! LED, and buzzer.
//!
//! Everything here is owned by the main loop; no peripheral is shared across
//! tasks.

use embassy_time::Timer;
use esp_hal::Async;
use esp_hal::Blocking;
use esp_hal::gpio::Output;
use esp_hal::i2c::master::I2c;
use esp_hal::uart::Uart;
use log::{info, warn};
use mpu6050_dmp::accel::AccelFullScale;
use mpu6050_dmp::address::Address;
use mpu6050_dmp::sensor_async::Mpu6050;
use thiserror_no_std::Error;

use guardpost_core::alert::{BuzzerPattern, LedColor};
use guardpost_core::motion::AccelSample;

/// Candidate GPS module baud rates, most likely first.
const GPS_BAUD_CANDIDATES: [u32; 3] = [9600, 38400, 115_200];

/// How long to listen on each candidate rate during probing.
const GPS_PROBE_WINDOW_MS: u64 = 1200;

#[derive(Error, Debug)]
pub enum HardwareError {
    #[error("accelerometer did not respond on the I2C bus")]
    AccelUnresponsive,
    #[error("accelerometer register access failed")]
    AccelBus,
    #[error("accelerometer self-test returned all zeroes")]
    AccelSelfTest,
    #[error("UART reconfiguration failed")]
    UartConfig,
}

/// Probe every 7-bit address and log responders. Purely diagnostic; runs
/// once at boot so a miswired module shows up in the RTT log.
pub async fn scan_i2c_bus(i2c: &mut I2c<'static, Async>) -> usize {
    let mut found = 0;
    for address in 0x08..0x78u8 {
        if embedded_hal_async::i2c::I2c::write(i2c, address, &[]).await.is_ok() {
            info!("I2C device at 0x{address:02x}");
            found += 1;
        }
    }
    if found == 0 {
        warn!("I2C scan found no devices; check sensor wiring");
    }
    found
}

/// The MPU-series accelerometer behind the async I2C bus.
pub struct Accelerometer {
    sensor: Mpu6050<I2c<'static, Async>>,
}

impl Accelerometer {
    /// Wake the sensor, force the ±2g range the shake thresholds assume, and
    /// self-test with one throwaway read. An all-zero vector means the bus
    /// answers but the die is not producing data; that is a fatal fault.
    pub async fn init(i2c: I2c<'static, Async>) -> Result<Self, HardwareError> {
        let mut sensor = Mpu6050::new(i2c, Address::default())
            .await
            .map_err(|_| HardwareError::AccelUnresponsive)?;
        sensor
            .set_accel_full_scale(AccelFullScale::G2)
            .await
            .map_err(|_| HardwareError::AccelBus)?;

        let mut this = Self { sensor };
        let sample = this.read().await?;
        if sample.x == 0.0 && sample.y == 0.0 && sample.z == 0.0 {
            return Err(HardwareError::AccelSelfTest);
        }
        if sample.magnitude() > 10.0 {
            warn!(
                "implausible startup reading ({:.1} g); sensor may need a power cycle",
                sample.magnitude()
            );
        }
        Ok(this)
    }

    /// One acceleration sample in g.
    pub async fn read(&mut self) -> Result<AccelSample, HardwareError> {
        let raw = self
            .sensor
            .accel()
            .await
            .map_err(|_| HardwareError::AccelBus)?;
        let scaled = raw.scaled(AccelFullScale::G2);
        Ok(AccelSample::new(scaled.x(), scaled.y(), scaled.z()))
    }
}

/// Three discrete GPIO channels driving a common-cathode RGB LED.
pub struct StatusLed {
    red: Output<'static>,
    green: Output<'static>,
    blue: Output<'static>,
}

impl StatusLed {
    pub fn new(red: Output<'static>, green: Output<'static>, blue: Output<'static>) -> Self {
        Self { red, green, blue }
    }

    /// Latch a color. Channels are on/off only; the 8-bit levels from
    /// [`LedColor::rgb`] collapse to a threshold here.
    pub fn show(&mut self, color: LedColor) {
        let (r, g, b) = color.rgb();
        self.red.set_level((r > 0).into());
        self.green.set_level((g > 0).into());
        self.blue.set_level((b > 0).into());
    }

    pub fn off(&mut self) {
        self.red.set_low();
        self.green.set_low();
        self.blue.set_low();
    }
}

/// Passive piezo buzzer on a plain GPIO, driven with a bit-banged square
/// wave. Playback blocks the caller for the pattern's full duration.
pub struct Buzzer {
    pin: Output<'static>,
}

impl Buzzer {
    pub fn new(pin: Output<'static>) -> Self {
        Self { pin }
    }

    /// Blocks for exactly [`BuzzerPattern::total_ms`], including the gap
    /// after the final beep, so alert timing matches the simulator.
    pub async fn play(&mut self, pattern: BuzzerPattern) {
        let half_period_us = 500_000 / pattern.freq_hz.max(1) as u64;
        for _ in 0..pattern.beeps {
            let cycles = (pattern.on_ms as u64 * 1000) / (half_period_us * 2);
            for _ in 0..cycles {
                self.pin.set_high();
                Timer::after_micros(half_period_us).await;
                self.pin.set_low();
                Timer::after_micros(half_period_us).await;
            }
            Timer::after_millis(pattern.off_ms as u64).await;
        }
    }
}

/// GPS receiver on a blocking UART. Reads only; the module streams NMEA
/// unprompted.
pub struct GpsPort {
    uart: Uart<'static, Blocking>,
}

impl GpsPort {
    pub fn new(uart: Uart<'static, Blocking>) -> Self {
        Self { uart }
    }

    /// Pull whatever the RX FIFO holds without blocking. Returns the number
    /// of bytes written into `buf`.
    pub fn read_available(&mut self, buf: &mut [u8]) -> usize {
        self.uart.read_buffered(buf).unwrap_or(0)
    }

    /// Cycle through candidate baud rates until one produces NMEA framing
    /// (a `$` within the probe window). Falls back to the first candidate
    /// when nothing looks right, so a cold receiver still gets the common
    /// default.
    pub async fn detect_baud(&mut self) -> Result<u32, HardwareError> {
        for baud in GPS_BAUD_CANDIDATES {
            self.apply_baud(baud)?;

            let mut saw_framing = false;
            let mut waited = 0u64;
            let mut buf = [0u8; 64];
            while waited < GPS_PROBE_WINDOW_MS {
                let n = self.read_available(&mut buf);
                if buf[..n].contains(&b'$') {
                    saw_framing = true;
                    break;
                }
                Timer::after_millis(50).await;
                waited += 50;
            }

            if saw_framing {
                info!("GPS responding at {baud} baud");
                return Ok(baud);
            }
            info!("no NMEA framing at {baud} baud");
        }

        warn!(
            "GPS silent on all candidate rates, defaulting to {}",
            GPS_BAUD_CANDIDATES[0]
        );
        let fallback = GPS_BAUD_CANDIDATES[0];
        self.apply_baud(fallback)?;
        Ok(fallback)
    }

    fn apply_baud(&mut self, baud: u32) -> Result<(), HardwareError> {
        let config = esp_hal::uart::Config::default().with_baudrate(baud);
        self.uart
            .apply_config(&config)
            .map_err(|_| HardwareError::UartConfig)
    }
}
