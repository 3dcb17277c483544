//! WiFi association and the one-client-per-tick HTTP server.
//!
//! The connection task owns the WiFi controller and keeps the link state in
//! a pair of atomics the main loop can sample without locking. The HTTP
//! server is not a task: the main loop calls [`HttpServer::serve_pending`]
//! once per tick, which either handles one waiting client to completion or
//! returns after a short poll window.

use core::sync::atomic::{AtomicBool, AtomicI8, Ordering};

use embassy_futures::select::{Either, select};
use embassy_net::Runner;
use embassy_net::tcp::{State, TcpSocket};
use embassy_time::{Duration, Timer};
use embedded_io_async::Write as _;
use esp_radio::wifi::{
    ClientConfiguration, Configuration, WifiController, WifiDevice, WifiEvent, WifiState,
};
use heapless::Vec;
use log::{info, warn};

use guardpost_core::config::InternetConfig;
use guardpost_core::http::{self, RESPONSE_CAPACITY};
use guardpost_core::motion::AccelSample;
use guardpost_core::node::SensorNode;
use guardpost_core::report::LinkStatus;

/// How long `serve_pending` waits for a client before yielding the tick.
const ACCEPT_POLL_MS: u64 = 2;

/// Per-connection socket inactivity timeout.
const SOCKET_TIMEOUT_SECS: u64 = 2;

/// Delay before re-association attempts after a drop or failure.
const RECONNECT_BACKOFF_SECS: u64 = 5;

/// Consecutive failed join attempts before the node gives up and runs
/// offline. A later link drop does not revive the task.
const MAX_JOIN_ATTEMPTS: u32 = 5;

/// Placeholder signal level reported while the radio has not produced a
/// real measurement yet.
const DEFAULT_RSSI_DBM: i8 = -50;

static LINK_UP: AtomicBool = AtomicBool::new(false);
static LINK_RSSI: AtomicI8 = AtomicI8::new(DEFAULT_RSSI_DBM);

/// Current link state for status payloads. Safe to call from the main loop
/// at any time.
pub fn link_status() -> LinkStatus {
    LinkStatus {
        connected: LINK_UP.load(Ordering::Relaxed),
        rssi_dbm: LINK_RSSI.load(Ordering::Relaxed),
    }
}

/// Keeps the station associated for the lifetime of the device and refreshes
/// the RSSI reading while the link holds.
#[embassy_executor::task]
pub async fn connection_task(
    mut controller: WifiController<'static>,
    credentials: InternetConfig<'static>,
) {
    if credentials.ssid.is_empty() {
        warn!("no WiFi credentials baked in; running offline");
        return;
    }

    let mut failed_joins = 0u32;
    loop {
        if esp_radio::wifi::wifi_state() == WifiState::StaConnected {
            failed_joins = 0;
            LINK_UP.store(true, Ordering::Relaxed);
            match select(
                controller.wait_for_event(WifiEvent::StaDisconnected),
                Timer::after_secs(RECONNECT_BACKOFF_SECS),
            )
            .await
            {
                Either::First(_) => {
                    LINK_UP.store(false, Ordering::Relaxed);
                    warn!("WiFi link dropped; reconnecting");
                    Timer::after_secs(RECONNECT_BACKOFF_SECS).await;
                }
                Either::Second(_) => {
                    if let Ok(rssi) = controller.rssi() {
                        LINK_RSSI.store(rssi, Ordering::Relaxed);
                    }
                    continue;
                }
            }
        }

        if !matches!(controller.is_started(), Ok(true)) {
            let config = Configuration::Client(ClientConfiguration {
                ssid: credentials.ssid.into(),
                password: credentials.password.into(),
                ..Default::default()
            });
            if let Err(e) = controller.set_configuration(&config) {
                warn!("WiFi configuration rejected: {e:?}");
                Timer::after_secs(RECONNECT_BACKOFF_SECS).await;
                continue;
            }
            if let Err(e) = controller.start_async().await {
                warn!("WiFi start failed: {e:?}");
                Timer::after_secs(RECONNECT_BACKOFF_SECS).await;
                continue;
            }
        }

        info!("joining '{}'", credentials.ssid);
        match controller.connect_async().await {
            Ok(()) => info!("WiFi associated"),
            Err(e) => {
                failed_joins += 1;
                if failed_joins >= MAX_JOIN_ATTEMPTS {
                    warn!("WiFi join failed {failed_joins} times; running offline");
                    return;
                }
                warn!("WiFi join failed: {e:?}");
                Timer::after_secs(RECONNECT_BACKOFF_SECS).await;
            }
        }
    }
}

/// Drives the network stack. Never returns.
#[embassy_executor::task]
pub async fn net_task(mut runner: Runner<'static, WifiDevice<'static>>) {
    runner.run().await
}

/// Serves the status endpoints, at most one client per tick, over a single
/// long-lived socket.
///
/// The socket is armed with `accept` once and stays in the LISTEN state
/// between ticks, so a connection arriving mid-tick queues in the stack
/// instead of being refused. Each call inspects the socket: a completed
/// handshake is served to completion, an in-flight one is left for a later
/// tick, and a torn-down socket is re-armed.
pub struct HttpServer {
    port: u16,
    stack: embassy_net::Stack<'static>,
    socket: TcpSocket<'static>,
}

impl HttpServer {
    pub fn new(
        port: u16,
        stack: embassy_net::Stack<'static>,
        rx_buf: &'static mut [u8],
        tx_buf: &'static mut [u8],
    ) -> Self {
        let mut socket = TcpSocket::new(stack, rx_buf, tx_buf);
        socket.set_timeout(Some(Duration::from_secs(SOCKET_TIMEOUT_SECS)));
        Self {
            port,
            stack,
            socket,
        }
    }

    /// Advance the server by one tick. A tick with no client costs at most
    /// [`ACCEPT_POLL_MS`]; a tick with an established client blocks until
    /// that client is answered or times out.
    pub async fn serve_pending(&mut self, node: &SensorNode, sample: AccelSample, now_ms: u64) {
        match self.socket.state() {
            State::Closed => {
                if !self.stack.is_link_up() {
                    return;
                }
                // Arm the listener. On timeout the accept future is dropped
                // but the socket stays listening, so connections made between
                // ticks are picked up by a later call.
                match select(
                    self.socket.accept(self.port),
                    Timer::after_millis(ACCEPT_POLL_MS),
                )
                .await
                {
                    Either::First(Ok(())) => self.handle_client(node, sample, now_ms).await,
                    Either::First(Err(e)) => {
                        warn!("accept failed: {e:?}");
                        self.socket.abort();
                    }
                    Either::Second(()) => {}
                }
            }
            State::Established => self.handle_client(node, sample, now_ms).await,
            // Listening, mid-handshake, or tearing down; look again next tick.
            _ => {}
        }
    }

    async fn handle_client(&mut self, node: &SensorNode, sample: AccelSample, now_ms: u64) {
        self.answer(node, sample, now_ms).await;

        // Push the FIN out, then abort so the socket returns to Closed and
        // the next tick can re-arm the listener without waiting out TIME_WAIT.
        self.socket.close();
        let _ = self.socket.flush().await;
        self.socket.abort();
        let _ = self.socket.flush().await;
    }

    async fn answer(&mut self, node: &SensorNode, sample: AccelSample, now_ms: u64) {
        let socket = &mut self.socket;
        let mut request = [0u8; 512];
        let mut len = 0;

        // Read until the header terminator, EOF, or a full buffer; the
        // request line is all that matters either way.
        loop {
            match socket.read(&mut request[len..]).await {
                Ok(0) => break,
                Ok(n) => {
                    len += n;
                    if len == request.len()
                        || request[..len].windows(4).any(|w| w == b"\r\n\r\n")
                    {
                        break;
                    }
                }
                Err(e) => {
                    warn!("client read failed: {e:?}");
                    return;
                }
            }
        }

        let mut response: Vec<u8, RESPONSE_CAPACITY> = Vec::new();
        if let Err(e) = http::respond(
            node,
            sample,
            link_status(),
            now_ms,
            &request[..len],
            &mut response,
        ) {
            warn!("response build failed: {e}");
            return;
        }

        if let Err(e) = socket.write_all(&response).await {
            warn!("client write failed: {e:?}");
        }
    }
}
