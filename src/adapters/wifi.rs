//! WiFi adapter.
//!
//! Implements [`ConnectivityPort`], the hexagonal boundary for network
//! connectivity.
//!
//! ## Modes
//!
//! - **Station**: credentials were found in `wifi.conf`.  Each
//!   [`begin_connect`](ConnectivityPort::begin_connect) issues one
//!   non-blocking association request; the loop's task table provides the
//!   back-off between attempts.
//! - **Access point**: no credentials.  The device serves its setup network
//!   and never attempts a station connection.
//!
//! ## cfg gating
//!
//! - **`target_os = "espidf"`**: real ESP-IDF WiFi driver calls via `esp_idf_svc::wifi`.
//! - **all other targets**: simulation stubs for host-side tests.

use core::fmt;
use log::info;

use crate::app::ports::{ConnectivityError, ConnectivityPort, LinkStatus};

/// Name of the credentials file on the data partition.
pub const WIFI_CONF_FILE: &str = "wifi.conf";

/// SSID of the setup access point.
pub const SETUP_AP_SSID: &str = "powermeter-setup";

// ───────────────────────────────────────────────────────────────
// Credentials
// ───────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CredentialError {
    InvalidSsid,
    InvalidPassword,
    Malformed,
}

impl fmt::Display for CredentialError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidSsid => write!(f, "SSID invalid (must be 1-32 printable ASCII bytes)"),
            Self::InvalidPassword => write!(f, "password invalid (must be 8-64 bytes for WPA2, or empty for open)"),
            Self::Malformed => write!(f, "expected `ssid,password,`"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WifiCredentials {
    pub ssid: heapless::String<32>,
    pub password: heapless::String<64>,
}

fn is_printable_ascii(s: &str) -> bool {
    s.bytes().all(|b| (0x20..=0x7E).contains(&b))
}

fn validate_ssid(ssid: &str) -> Result<(), CredentialError> {
    if ssid.is_empty() || ssid.len() > 32 || !is_printable_ascii(ssid) {
        return Err(CredentialError::InvalidSsid);
    }
    Ok(())
}

fn validate_password(password: &str) -> Result<(), CredentialError> {
    if password.is_empty() {
        return Ok(());
    }
    if password.len() < 8 || password.len() > 64 {
        return Err(CredentialError::InvalidPassword);
    }
    Ok(())
}

impl WifiCredentials {
    pub fn new(ssid: &str, password: &str) -> Result<Self, CredentialError> {
        validate_ssid(ssid)?;
        validate_password(password)?;
        let mut creds = Self {
            ssid: heapless::String::new(),
            password: heapless::String::new(),
        };
        creds.ssid.push_str(ssid).map_err(|_| CredentialError::InvalidSsid)?;
        creds
            .password
            .push_str(password)
            .map_err(|_| CredentialError::InvalidPassword)?;
        Ok(creds)
    }

    /// Parse the `wifi.conf` contents: `<ssid>,<password>,` on one line.
    pub fn parse(conf: &str) -> Result<Self, CredentialError> {
        let mut fields = conf.trim_end_matches(['\r', '\n']).split(',');
        let ssid = fields.next().ok_or(CredentialError::Malformed)?;
        let password = fields.next().ok_or(CredentialError::Malformed)?;
        Self::new(ssid, password)
    }
}

// ───────────────────────────────────────────────────────────────
// WiFi adapter
// ───────────────────────────────────────────────────────────────

pub struct WifiAdapter {
    credentials: Option<WifiCredentials>,
    attempts: u32,
    #[cfg(target_os = "espidf")]
    wifi: esp_idf_svc::wifi::EspWifi<'static>,
    #[cfg(not(target_os = "espidf"))]
    sim_associated: bool,
}

impl WifiAdapter {
    /// Bring up the driver in station mode (with credentials) or as the
    /// setup access point (without).
    #[cfg(target_os = "espidf")]
    pub fn new(
        mut wifi: esp_idf_svc::wifi::EspWifi<'static>,
        credentials: Option<WifiCredentials>,
    ) -> Result<Self, esp_idf_svc::sys::EspError> {
        use esp_idf_svc::wifi::{AccessPointConfiguration, AuthMethod, ClientConfiguration, Configuration};

        let config = match &credentials {
            Some(creds) => Configuration::Client(ClientConfiguration {
                ssid: creds.ssid.clone(),
                password: creds.password.clone(),
                auth_method: if creds.password.is_empty() {
                    AuthMethod::None
                } else {
                    AuthMethod::WPA2Personal
                },
                ..Default::default()
            }),
            None => {
                let mut ssid = heapless::String::new();
                // SETUP_AP_SSID is shorter than 32 bytes.
                let _ = ssid.push_str(SETUP_AP_SSID);
                Configuration::AccessPoint(AccessPointConfiguration {
                    ssid,
                    auth_method: AuthMethod::None,
                    ..Default::default()
                })
            }
        };
        wifi.set_configuration(&config)?;
        wifi.start()?;
        match &credentials {
            Some(creds) => info!("WiFi: station mode, SSID='{}'", creds.ssid),
            None => info!("WiFi: AP mode active ('{}')", SETUP_AP_SSID),
        }
        Ok(Self {
            credentials,
            attempts: 0,
            wifi,
        })
    }

    #[cfg(not(target_os = "espidf"))]
    pub fn new(credentials: Option<WifiCredentials>) -> Self {
        match &credentials {
            Some(creds) => info!("WiFi(sim): station mode, SSID='{}'", creds.ssid),
            None => info!("WiFi(sim): AP mode active ('{}')", SETUP_AP_SSID),
        }
        Self {
            credentials,
            attempts: 0,
            sim_associated: false,
        }
    }

    pub fn is_access_point(&self) -> bool {
        self.credentials.is_none()
    }

    /// Number of station association requests issued since boot.
    pub fn attempts(&self) -> u32 {
        self.attempts
    }

    /// Simulate the access point dropping the association.
    #[cfg(not(target_os = "espidf"))]
    pub fn sim_drop_link(&mut self) {
        self.sim_associated = false;
    }

    // ── Platform-specific ─────────────────────────────────────

    #[cfg(target_os = "espidf")]
    fn platform_connect(&mut self) -> Result<(), ConnectivityError> {
        // EspWifi::connect only issues the request; association completes
        // in the driver task.
        self.wifi.connect().map_err(|e| {
            log::warn!("WiFi: connect request failed ({})", e);
            ConnectivityError::Driver
        })
    }

    #[cfg(not(target_os = "espidf"))]
    fn platform_connect(&mut self) -> Result<(), ConnectivityError> {
        self.sim_associated = true;
        Ok(())
    }

    #[cfg(target_os = "espidf")]
    fn platform_is_connected(&self) -> bool {
        self.wifi.is_connected().unwrap_or(false) && self.wifi.sta_netif().is_up().unwrap_or(false)
    }

    #[cfg(not(target_os = "espidf"))]
    fn platform_is_connected(&self) -> bool {
        self.sim_associated
    }
}

// ───────────────────────────────────────────────────────────────
// ConnectivityPort
// ───────────────────────────────────────────────────────────────

impl ConnectivityPort for WifiAdapter {
    fn status(&self) -> LinkStatus {
        if self.is_access_point() {
            LinkStatus::AccessPoint
        } else if self.platform_is_connected() {
            LinkStatus::Connected
        } else {
            LinkStatus::Disconnected
        }
    }

    fn begin_connect(&mut self) -> Result<(), ConnectivityError> {
        let Some(creds) = &self.credentials else {
            return Err(ConnectivityError::NoCredentials);
        };
        self.attempts = self.attempts.wrapping_add(1);
        info!("WiFi: connecting to '{}' (attempt {})", creds.ssid, self.attempts);
        self.platform_connect()
    }
}

// ───────────────────────────────────────────────────────────────
// Tests
// ───────────────────────────────────────────────────────────────
