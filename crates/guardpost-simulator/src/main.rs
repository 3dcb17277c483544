//! Desktop simulator for the guardpost sensor node.
//!
//! Runs the full guardpost-core loop against synthetic sensors so the alert
//! state machine and the HTTP endpoints can be exercised without hardware:
//!
//! - accelerometer: low-level noise around 1 g with a sharp shake injected
//!   every [`SHAKE_INJECT_INTERVAL`],
//! - GPS: a moving synthetic GGA stream that starts after
//!   [`FIX_ACQUISITION_DELAY`] to mimic a cold receiver,
//! - LED / buzzer: log lines (the buzzer also blocks the loop for its full
//!   pattern duration, matching the firmware's timing behavior),
//! - HTTP: a real TCP listener on [`HTTP_PORT`], one client per tick.
//!
//! Try `curl localhost:8080/status` while it runs.

use std::io::{Read, Write};
use std::net::{TcpListener, TcpStream};
use std::time::{Duration, Instant};

use log::{info, warn};

use guardpost_core::config::TuningConfig;
use guardpost_core::http;
use guardpost_core::motion::AccelSample;
use guardpost_core::node::SensorNode;
use guardpost_core::report::LinkStatus;

// ---------------------------------------------------------------------------
// Simulation constants
// ---------------------------------------------------------------------------

/// Port the simulated status endpoint listens on.
const HTTP_PORT: u16 = 8080;

/// Cold-start delay before the synthetic receiver produces its first fix.
const FIX_ACQUISITION_DELAY: Duration = Duration::from_secs(12);

/// Interval between synthetic GGA sentences once the fix is up.
const NMEA_INTERVAL: Duration = Duration::from_secs(1);

/// Interval between injected shakes.
const SHAKE_INJECT_INTERVAL: Duration = Duration::from_secs(20);

/// Starting position for the synthetic track (Munich).
const START_LAT: f64 = 48.1173;
const START_LON: f64 = 11.5167;

// ---------------------------------------------------------------------------
// Mock data generation
// ---------------------------------------------------------------------------

/// Generates synthetic acceleration: gravity plus gentle noise, with a
/// one-tick spike at every shake injection point.
struct MockMotionGenerator {
    last_shake: Instant,
}

impl MockMotionGenerator {
    fn new() -> Self {
        Self {
            last_shake: Instant::now(),
        }
    }

    fn next_sample(&mut self, elapsed_secs: f64) -> AccelSample {
        if self.last_shake.elapsed() >= SHAKE_INJECT_INTERVAL {
            self.last_shake = Instant::now();
            info!("injecting synthetic shake");
            return AccelSample::new(1.8, -1.1, 3.0);
        }

        // Hand tremor around the 1 g baseline, well under the threshold.
        let t = elapsed_secs;
        AccelSample::new(
            (0.02 * (t * 7.0).sin()) as f32,
            (0.02 * (t * 5.0).cos()) as f32,
            1.0 + (0.03 * (t * 3.0).sin()) as f32,
        )
    }
}

/// Emits a slowly drifting GGA sentence with a correct checksum.
struct MockGpsStream {
    emitted: u32,
}

impl MockGpsStream {
    fn new() -> Self {
        Self { emitted: 0 }
    }

    fn next_sentence(&mut self) -> String {
        // Drift north-east a few meters per sentence.
        let lat = START_LAT + f64::from(self.emitted) * 0.00002;
        let lon = START_LON + f64::from(self.emitted) * 0.00003;
        self.emitted += 1;

        let body = format!(
            "GPGGA,120000.00,{},N,{},E,1,08,1.0,512.0,M,46.0,M,,",
            degrees_minutes(lat, 2),
            degrees_minutes(lon, 3),
        );
        let checksum = body.bytes().fold(0u8, |sum, b| sum ^ b);
        format!("${body}*{checksum:02X}\r\n")
    }
}

/// Format a coordinate as NMEA degrees-plus-minutes (`ddmm.mmmm`).
fn degrees_minutes(value: f64, degree_digits: usize) -> String {
    let magnitude = value.abs();
    let degrees = magnitude.trunc() as u32;
    let minutes = (magnitude - f64::from(degrees)) * 60.0;
    format!("{degrees:0degree_digits$}{minutes:07.4}")
}

// ---------------------------------------------------------------------------
// HTTP serving
// ---------------------------------------------------------------------------

/// Accept and answer at most one waiting client.
fn serve_pending(listener: &TcpListener, node: &SensorNode, sample: AccelSample, now_ms: u64) {
    let stream = match listener.accept() {
        Ok((stream, _)) => stream,
        Err(e) if e.kind() == std::io::ErrorKind::WouldBlock => return,
        Err(e) => {
            warn!("accept failed: {e}");
            return;
        }
    };

    if let Err(e) = answer_client(stream, node, sample, now_ms) {
        warn!("client dropped: {e}");
    }
}

fn answer_client(
    mut stream: TcpStream,
    node: &SensorNode,
    sample: AccelSample,
    now_ms: u64,
) -> std::io::Result<()> {
    stream.set_read_timeout(Some(Duration::from_secs(2)))?;

    let mut request = [0u8; 512];
    let mut len = 0;
    loop {
        let n = stream.read(&mut request[len..])?;
        len += n;
        if n == 0 || len == request.len() || request[..len].windows(4).any(|w| w == b"\r\n\r\n") {
            break;
        }
    }

    // The simulated link is always "connected" with a plausible RSSI.
    let link = LinkStatus {
        connected: true,
        rssi_dbm: -50,
    };

    let mut response: heapless::Vec<u8, { http::RESPONSE_CAPACITY }> = heapless::Vec::new();
    http::respond(node, sample, link, now_ms, &request[..len], &mut response)
        .map_err(|e| std::io::Error::other(e.to_string()))?;

    info!(
        "HTTP {} -> {} bytes",
        http::extract_path(&request[..len]),
        response.len()
    );
    stream.write_all(&response)
}

// ---------------------------------------------------------------------------
// Entry point
// ---------------------------------------------------------------------------

fn main() {
    env_logger::init();
    info!("Starting guardpost simulator");

    let tuning = TuningConfig::default();
    let tick = Duration::from_millis(tuning.tick_delay_ms);
    let mut node = SensorNode::new(tuning);

    let listener = TcpListener::bind(("0.0.0.0", HTTP_PORT)).expect("bind HTTP listener");
    listener
        .set_nonblocking(true)
        .expect("nonblocking listener");
    info!("status endpoint on http://localhost:{HTTP_PORT}/status");

    let mut motion = MockMotionGenerator::new();
    let mut gps = MockGpsStream::new();

    let start = Instant::now();
    let mut last_nmea = Instant::now();
    let mut led = node.startup_color();
    info!("LED -> {led:?}");

    loop {
        let tick_start = Instant::now();
        let now_ms = start.elapsed().as_millis() as u64;

        // --- Synthetic GPS stream -----------------------------------------
        if start.elapsed() >= FIX_ACQUISITION_DELAY && last_nmea.elapsed() >= NMEA_INTERVAL {
            let sentence = gps.next_sentence();
            node.feed_gps_slice(sentence.as_bytes());
            last_nmea = Instant::now();
        }

        // --- Sensor tick --------------------------------------------------
        let sample = motion.next_sample(start.elapsed().as_secs_f64());
        let effects = node.tick(sample, now_ms);

        if let Some(color) = effects.led {
            if color != led {
                led = color;
                info!("LED -> {led:?}");
            }
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
            }
        }
        if let Some(pattern) = effects.buzzer {
            info!(
                "buzzer: {} x {} Hz ({} ms on / {} ms off)",
                pattern.beeps, pattern.freq_hz, pattern.on_ms, pattern.off_ms
            );
            // Block like the firmware does; alert timing depends on it.
            std::thread::sleep(Duration::from_millis(u64::from(pattern.total_ms())));
        }
        if effects.fix_report_due {
            let fix = node.fix();
            let health = node.link_health();
            if fix.valid {
                info!(
                    "fix: {:.6},{:.6} sats={:?} ({} sentences decoded)",
                    fix.latitude, fix.longitude, fix.satellites, health.passed_checksum
                );
            } else {
                info!("waiting for GPS fix");
            }
        }

        // --- HTTP ---------------------------------------------------------
        serve_pending(&listener, &node, sample, now_ms);

        // --- Tick pacing --------------------------------------------------
        let elapsed = tick_start.elapsed();
        if elapsed < tick {
            std::thread::sleep(tick - elapsed);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_client_connecting_between_ticks_is_served() {
        let listener = TcpListener::bind(("127.0.0.1", 0)).expect("bind listener");
        listener.set_nonblocking(true).expect("nonblocking listener");
        let addr = listener.local_addr().expect("listener address");

        let node = SensorNode::new(TuningConfig::default());
        let sample = AccelSample::new(0.0, 0.0, 1.0);

        // A tick with nothing waiting must not tear the listener down.
        serve_pending(&listener, &node, sample, 1000);

        // The client connects while the loop is between ticks...
        let mut client = TcpStream::connect(addr).expect("connect");
        client
            .write_all(b"GET /status HTTP/1.1\r\n\r\n")
            .expect("send request");
        std::thread::sleep(Duration::from_millis(50));

        // ...and the next tick must pick it up and answer.
        serve_pending(&listener, &node, sample, 1050);

        client
            .set_read_timeout(Some(Duration::from_secs(2)))
            .expect("read timeout");
        let mut response = String::new();
        client.read_to_string(&mut response).expect("read response");
        assert!(
            response.starts_with("HTTP/1.1 200 OK\r\n"),
            "a connection made between ticks must still be served: {response}"
        );
    }
}
