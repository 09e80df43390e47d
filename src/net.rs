//! Wi-Fi station, TCP/IP stack, and the HTTP transport used by the loop

use alloc::string::String;
use core::net::Ipv4Addr;

use embassy_executor::Spawner;
use embassy_net::{
    Config as NetConfig, DhcpConfig, IpAddress, Runner, Stack, StackResources,
    dns::DnsQueryType, tcp::TcpSocket,
};
use embassy_time::{Delay, Duration, with_timeout};
use embedded_io_async::{Error as _, ErrorKind, ErrorType, Read, Write};
use esp_hal::{peripherals::WIFI, rng::Rng};
use esp_radio::{
    Controller as RadioController,
    wifi::{
        self, AuthMethod, ClientConfig, ModeConfig, WifiController, WifiDevice, WifiError,
        WifiEvent,
    },
};
use log::{debug, info, warn};
use smart_monitor_core::{
    DeliveryError,
    config::WifiConfig,
    http::{self, Endpoint},
    retry::{self, RetryPolicy},
    traits::{Connector, Link, Reconnect, Transport},
};
use static_cell::StaticCell;

const DHCP_TIMEOUT: Duration = Duration::from_secs(10);
// Matches the ESP32 HTTPClient default.
const SOCKET_TIMEOUT: Duration = Duration::from_secs(5);
const SOCKET_BUFFER_LEN: usize = 1024;
const RECONNECT_PAUSE_MS: u32 = 5_000;

static RADIO: StaticCell<RadioController<'static>> = StaticCell::new();
static STACK_RESOURCES: StaticCell<StackResources<3>> = StaticCell::new();

#[derive(Debug)]
pub enum NetError {
    RadioInit,
    WifiInit,
    Spawn,
    Configure(WifiError),
    Start(WifiError),
    Associate(WifiError),
    DhcpTimeout,
}

/// Bring up the radio and the network stack and spawn the stack runner.
///
/// Association happens later through [`WifiConnector`].
pub fn start_network(
    spawner: &Spawner,
    wifi_peripheral: WIFI<'static>,
) -> Result<(WifiController<'static>, Stack<'static>), NetError> {
    let radio = esp_radio::init().map_err(|e| {
        warn!("Radio init failed: {:?}", e);
        NetError::RadioInit
    })?;
    let radio = RADIO.init(radio);

    let (controller, interfaces) =
        wifi::new(radio, wifi_peripheral, Default::default()).map_err(|e| {
            warn!("Wi-Fi driver init failed: {:?}", e);
            NetError::WifiInit
        })?;

    let rng = Rng::new();
    let seed = (rng.random() as u64) << 32 | rng.random() as u64;

    let (stack, runner) = embassy_net::new(
        interfaces.sta,
        NetConfig::dhcpv4(DhcpConfig::default()),
        STACK_RESOURCES.init(StackResources::new()),
        seed,
    );

    spawner.spawn(net_task(runner)).map_err(|_| NetError::Spawn)?;

    Ok((controller, stack))
}

#[embassy_executor::task]
async fn net_task(mut runner: Runner<'static, WifiDevice<'static>>) {
    runner.run().await;
}

/// One association attempt: configure, start, connect, wait for a lease.
///
/// Owns the controller so it can be handed to [`connection_task`] once the
/// first connection is up.
pub struct WifiConnector<'a> {
    controller: WifiController<'static>,
    stack: Stack<'static>,
    wifi: WifiConfig<'a>,
}

impl<'a> WifiConnector<'a> {
    pub fn new(
        controller: WifiController<'static>,
        stack: Stack<'static>,
        wifi: WifiConfig<'a>,
    ) -> Self {
        Self {
            controller,
            stack,
            wifi,
        }
    }

    fn client_config(&self) -> ModeConfig {
        let mut client = ClientConfig::default()
            .with_ssid(String::from(self.wifi.ssid))
            .with_password(String::from(self.wifi.password));
        if self.wifi.password.is_empty() {
            client = client.with_auth_method(AuthMethod::None);
        }
        ModeConfig::Client(client)
    }
}

impl Connector for WifiConnector<'_> {
    type Output = Ipv4Addr;
    type Error = NetError;

    async fn try_connect(&mut self) -> Result<Ipv4Addr, NetError> {
        if !matches!(self.controller.is_started(), Ok(true)) {
            let mode = self.client_config();
            self.controller
                .set_config(&mode)
                .map_err(NetError::Configure)?;
            info!("Starting Wi-Fi station");
            self.controller
                .start_async()
                .await
                .map_err(NetError::Start)?;
        }

        info!("Connecting to \"{}\"", self.wifi.ssid);
        self.controller
            .connect_async()
            .await
            .map_err(NetError::Associate)?;

        with_timeout(DHCP_TIMEOUT, self.stack.wait_config_up())
            .await
            .map_err(|_| NetError::DhcpTimeout)?;

        self.stack
            .config_v4()
            .map(|config| config.address.address())
            .ok_or(NetError::DhcpTimeout)
    }
}

impl Reconnect for WifiConnector<'_> {
    async fn wait_for_disconnect(&mut self) {
        if matches!(self.controller.is_connected(), Ok(true)) {
            self.controller
                .wait_for_event(WifiEvent::StaDisconnected)
                .await;
        }
    }
}

/// Keeps the station associated for the life of the firmware.
#[embassy_executor::task]
pub async fn connection_task(mut connector: WifiConnector<'static>, policy: RetryPolicy) {
    loop {
        let ip =
            retry::reconnect(&mut connector, &policy, &mut Delay, RECONNECT_PAUSE_MS).await;
        info!("Reconnected! IP: {}", ip);
    }
}

/// Link state as seen by the network stack.
#[derive(Clone, Copy)]
pub struct StackLink {
    stack: Stack<'static>,
}

impl StackLink {
    pub fn new(stack: Stack<'static>) -> Self {
        Self { stack }
    }
}

impl Link for StackLink {
    fn is_connected(&self) -> bool {
        self.stack.is_link_up() && self.stack.is_config_up()
    }
}

/// HTTP/1.1 over a fresh TCP connection per request.
pub struct HttpTransport {
    stack: Stack<'static>,
    rx_buffer: [u8; SOCKET_BUFFER_LEN],
    tx_buffer: [u8; SOCKET_BUFFER_LEN],
}

impl HttpTransport {
    pub fn new(stack: Stack<'static>) -> Self {
        Self {
            stack,
            rx_buffer: [0; SOCKET_BUFFER_LEN],
            tx_buffer: [0; SOCKET_BUFFER_LEN],
        }
    }

    async fn resolve(&self, host: &str) -> Result<IpAddress, DeliveryError> {
        if let Ok(ip) = host.parse::<Ipv4Addr>() {
            return Ok(IpAddress::Ipv4(ip));
        }

        let addresses = self
            .stack
            .dns_query(host, DnsQueryType::A)
            .await
            .map_err(|e| {
                warn!("DNS lookup for {} failed: {:?}", host, e);
                DeliveryError::DnsFailed
            })?;
        addresses.first().copied().ok_or(DeliveryError::DnsFailed)
    }
}

impl Transport for HttpTransport {
    async fn post(&mut self, endpoint: &Endpoint<'_>, body: &str) -> Result<u16, DeliveryError> {
        let address = self.resolve(endpoint.host).await?;

        let mut socket = TcpSocket::new(self.stack, &mut self.rx_buffer, &mut self.tx_buffer);
        socket.set_timeout(Some(SOCKET_TIMEOUT));

        let result = match socket.connect((address, endpoint.port)).await {
            Ok(()) => http::exchange(&mut TimedSocket(&mut socket), endpoint, body).await,
            Err(e) => {
                debug!("TCP connect to {}:{} failed: {:?}", address, endpoint.port, e);
                Err(DeliveryError::ConnectionRefused)
            }
        };

        socket.close();
        let _ = with_timeout(SOCKET_TIMEOUT, socket.flush()).await;
        socket.abort();

        result
    }
}

#[derive(Debug)]
enum SocketError {
    Tcp(embassy_net::tcp::Error),
    TimedOut,
}

impl embedded_io_async::Error for SocketError {
    fn kind(&self) -> ErrorKind {
        match self {
            SocketError::Tcp(e) => e.kind(),
            SocketError::TimedOut => ErrorKind::TimedOut,
        }
    }
}

/// A connected socket whose reads and flushes give up after [`SOCKET_TIMEOUT`].
struct TimedSocket<'s, 'd>(&'s mut TcpSocket<'d>);

impl ErrorType for TimedSocket<'_, '_> {
    type Error = SocketError;
}

impl Read for TimedSocket<'_, '_> {
    async fn read(&mut self, buf: &mut [u8]) -> Result<usize, SocketError> {
        match with_timeout(SOCKET_TIMEOUT, self.0.read(buf)).await {
            Ok(result) => result.map_err(SocketError::Tcp),
            Err(_) => Err(SocketError::TimedOut),
        }
    }
}

impl Write for TimedSocket<'_, '_> {
    async fn write(&mut self, buf: &[u8]) -> Result<usize, SocketError> {
        self.0.write(buf).await.map_err(SocketError::Tcp)
    }

    async fn flush(&mut self) -> Result<(), SocketError> {
        match with_timeout(SOCKET_TIMEOUT, self.0.flush()).await {
            Ok(result) => result.map_err(SocketError::Tcp),
            Err(_) => Err(SocketError::TimedOut),
        }
    }
}
