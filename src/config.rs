//! Feeder configuration: Wi-Fi, printer link, control socket, storage.
//!
//! Every string is a fixed-capacity `heapless::String` so the firmware can
//! hold a full config without heap-sized fields. Stored settings are layered
//! on top by [`crate::settings::load_settings`].
//!
//! ```rust
//! use top_ams::config::{Config, PrinterConfig, WebConfig};
//!
//! let config = Config::default()
//!     .with_printer(
//!         PrinterConfig::default()
//!             .with_host("192.168.1.50")
//!             .with_serial("01P00A000000000"),
//!     )
//!     .with_web(WebConfig::default().with_port(8080));
//! ```

use core::fmt::Write;

use heapless::String as HString;

/// Capacity of hosts, serials, credentials and names.
pub const MAX_SHORT_STRING: usize = 64;

/// Capacity of topics, URLs and paths.
pub const MAX_LONG_STRING: usize = 128;

/// Short config string.
pub type ShortString = HString<MAX_SHORT_STRING>;
/// Long config string.
pub type LongString = HString<MAX_LONG_STRING>;

// ============================================================================
// Bounded strings
// ============================================================================

/// Copy as much of `s` as fits in `N` bytes without splitting a character.
pub(crate) fn truncated<const N: usize>(s: &str) -> HString<N> {
    let mut hs = HString::new();
    let valid_end = s
        .char_indices()
        .map(|(i, c)| i + c.len_utf8())
        .take_while(|end| *end <= N)
        .last()
        .unwrap_or(0);
    let _ = hs.push_str(&s[..valid_end]);
    hs
}

/// Truncating conversion into a [`ShortString`].
pub fn short_string(s: &str) -> ShortString {
    truncated(s)
}

/// Truncating conversion into a [`LongString`].
pub fn long_string(s: &str) -> LongString {
    truncated(s)
}

// ============================================================================
// Main Config
// ============================================================================

/// Complete application configuration
#[derive(Clone, Debug, Default)]
pub struct Config {
    /// WiFi connection configuration
    pub wifi: WifiConfig,
    /// Printer MQTT connection
    pub printer: PrinterConfig,
    /// Control socket server configuration
    pub web: WebConfig,
    /// Filament registry storage
    pub registry: RegistryConfig,
    /// Device identification
    pub device: DeviceConfig,
}

impl Config {
    /// Set WiFi configuration
    pub fn with_wifi(mut self, wifi: WifiConfig) -> Self {
        self.wifi = wifi;
        self
    }

    /// Set printer configuration
    pub fn with_printer(mut self, printer: PrinterConfig) -> Self {
        self.printer = printer;
        self
    }

    /// Set web configuration
    pub fn with_web(mut self, web: WebConfig) -> Self {
        self.web = web;
        self
    }

    /// Set registry configuration
    pub fn with_registry(mut self, registry: RegistryConfig) -> Self {
        self.registry = registry;
        self
    }

    /// Set device configuration
    pub fn with_device(mut self, device: DeviceConfig) -> Self {
        self.device = device;
        self
    }
}

// ============================================================================
// Printer Config
// ============================================================================

/// Connection to the printer's local MQTT broker.
///
/// The printer runs a TLS broker on port 8883 with a self-signed
/// certificate. The user is always `bblp`; the password is the LAN access
/// code shown on the printer.
#[derive(Clone, Debug)]
pub struct PrinterConfig {
    /// Printer IP or hostname
    pub host: ShortString,
    /// Broker port
    pub port: u16,
    /// Printer serial number, used in topic names
    pub serial: ShortString,
    /// LAN access code (MQTT password)
    pub access_code: ShortString,
    /// MQTT username
    pub username: ShortString,
    /// Client ID presented to the broker
    pub client_id: ShortString,
    /// Keep-alive interval in seconds
    pub keep_alive_secs: u16,
    /// Delay before reconnecting after a drop, in milliseconds
    pub reconnect_ms: u32,
    /// Whether the printer link is enabled
    pub enabled: bool,
}

impl Default for PrinterConfig {
    fn default() -> Self {
        Self {
            host: ShortString::new(),
            port: 8883,
            serial: ShortString::new(),
            access_code: ShortString::new(),
            username: short_string("bblp"),
            client_id: short_string("top-ams"),
            keep_alive_secs: 120,
            reconnect_ms: 5000,
            enabled: true,
        }
    }
}

impl PrinterConfig {
    /// Set the printer host
    pub fn with_host(mut self, host: &str) -> Self {
        self.host = short_string(host);
        self
    }

    /// Set the broker port
    pub fn with_port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    /// Set the printer serial number
    pub fn with_serial(mut self, serial: &str) -> Self {
        self.serial = short_string(serial);
        self
    }

    /// Set the LAN access code
    pub fn with_access_code(mut self, code: &str) -> Self {
        self.access_code = short_string(code);
        self
    }

    /// Set the client ID
    pub fn with_client_id(mut self, id: &str) -> Self {
        self.client_id = short_string(id);
        self
    }

    /// Set the keep-alive interval
    pub fn with_keep_alive_secs(mut self, secs: u16) -> Self {
        self.keep_alive_secs = secs;
        self
    }

    /// Enable or disable the printer link
    pub fn with_enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }

    /// Host, serial and access code are all set
    pub fn is_configured(&self) -> bool {
        !self.host.is_empty() && !self.serial.is_empty() && !self.access_code.is_empty()
    }

    /// Topic the printer publishes status reports on
    pub fn report_topic(&self) -> LongString {
        self.topic("report")
    }

    /// Topic the printer accepts commands on
    pub fn request_topic(&self) -> LongString {
        self.topic("request")
    }

    /// TLS broker URL, e.g. `mqtts://192.168.1.50:8883`
    pub fn broker_url(&self) -> LongString {
        let mut url = LongString::new();
        let _ = write!(url, "mqtts://{}:{}", self.host, self.port);
        url
    }

    fn topic(&self, suffix: &str) -> LongString {
        let mut topic = LongString::new();
        let _ = write!(topic, "device/{}/{}", self.serial, suffix);
        topic
    }
}

// ============================================================================
// Web Config
// ============================================================================

/// Control socket server configuration
#[derive(Clone, Debug)]
pub struct WebConfig {
    /// Port to listen on
    pub port: u16,
    /// WebSocket endpoint path
    pub ws_path: ShortString,
    /// Largest accepted request frame in bytes
    pub max_frame_len: usize,
    /// Whether to enable CORS for all origins
    pub cors_permissive: bool,
    /// Whether the server is enabled
    pub enabled: bool,
}

impl Default for WebConfig {
    fn default() -> Self {
        Self {
            port: 80,
            ws_path: short_string("/ws"),
            max_frame_len: 4096,
            cors_permissive: true,
            enabled: true,
        }
    }
}

impl WebConfig {
    /// Set the port
    pub fn with_port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    /// Set the WebSocket path
    pub fn with_ws_path(mut self, path: &str) -> Self {
        self.ws_path = short_string(path);
        self
    }

    /// Set the maximum frame length
    pub fn with_max_frame_len(mut self, len: usize) -> Self {
        self.max_frame_len = len;
        self
    }

    /// Set CORS mode
    pub fn with_cors(mut self, permissive: bool) -> Self {
        self.cors_permissive = permissive;
        self
    }

    /// Enable or disable the server
    pub fn with_enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }
}

// ============================================================================
// Registry Config
// ============================================================================

/// Where the filament registry is persisted
#[derive(Clone, Debug)]
pub struct RegistryConfig {
    /// Key holding the registry snapshot
    pub storage_key: ShortString,
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            storage_key: short_string(crate::registry::DEFAULT_STORAGE_KEY),
        }
    }
}

impl RegistryConfig {
    /// Set the storage key
    pub fn with_storage_key(mut self, key: &str) -> Self {
        self.storage_key = short_string(key);
        self
    }
}

// ============================================================================
// WiFi Config
// ============================================================================

/// WiFi connection configuration
#[derive(Clone, Debug)]
pub struct WifiConfig {
    /// WiFi network SSID
    pub ssid: ShortString,
    /// WiFi password
    pub password: ShortString,
    /// Connection timeout in milliseconds
    pub connect_timeout_ms: u32,
    /// Whether WiFi is enabled
    pub enabled: bool,
    /// Maximum connection retry attempts (0 = unlimited)
    pub max_retries: u8,
}

impl Default for WifiConfig {
    fn default() -> Self {
        Self {
            ssid: ShortString::new(),
            password: ShortString::new(),
            connect_timeout_ms: 30_000,
            enabled: true,
            max_retries: 5,
        }
    }
}

impl WifiConfig {
    /// Set the SSID
    pub fn with_ssid(mut self, ssid: &str) -> Self {
        self.ssid = short_string(ssid);
        self
    }

    /// Set the password
    pub fn with_password(mut self, password: &str) -> Self {
        self.password = short_string(password);
        self
    }

    /// Set the connection timeout
    pub fn with_connect_timeout_ms(mut self, ms: u32) -> Self {
        self.connect_timeout_ms = ms;
        self
    }

    /// Enable or disable WiFi
    pub fn with_enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }

    /// Set the maximum retry count
    pub fn with_max_retries(mut self, retries: u8) -> Self {
        self.max_retries = retries;
        self
    }

    /// Check if WiFi credentials are configured
    pub fn is_configured(&self) -> bool {
        !self.ssid.is_empty()
    }
}

// ============================================================================
// Device Config
// ============================================================================

/// Device identification configuration
#[derive(Clone, Debug)]
pub struct DeviceConfig {
    /// Human-readable device name
    pub name: ShortString,
    /// Storage namespace for registry and settings
    pub nvs_namespace: ShortString,
}

impl Default for DeviceConfig {
    fn default() -> Self {
        Self {
            name: short_string("TopAMS"),
            nvs_namespace: short_string("storage"),
        }
    }
}

impl DeviceConfig {
    /// Set the device name
    pub fn with_name(mut self, name: &str) -> Self {
        self.name = short_string(name);
        self
    }

    /// Set the storage namespace
    pub fn with_nvs_namespace(mut self, namespace: &str) -> Self {
        self.nvs_namespace = short_string(namespace);
        self
    }

    /// Name as an mDNS host label: lower-case ASCII letters, digits and `-`.
    ///
    /// Other characters become `-`, leading and trailing dashes are dropped,
    /// and an empty result falls back to `topams`.
    pub fn hostname(&self) -> ShortString {
        let mut host = ShortString::new();
        for c in self.name.chars() {
            let c = if c.is_ascii_alphanumeric() {
                c.to_ascii_lowercase()
            } else {
                '-'
            };
            if c == '-' && (host.is_empty() || host.ends_with('-')) {
                continue;
            }
            let _ = host.push(c);
        }
        while host.ends_with('-') {
            host.pop();
        }
        if host.is_empty() {
            host = short_string("topams");
        }
        host
    }
}

// ============================================================================
// Tests
// ============================================================================
