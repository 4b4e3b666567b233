//! mDNS service advertisement adapter.
//!
//! Advertises `<hostname>.local` and an `_http._tcp` service on port 80 so
//! the web UI is reachable by name.  Uses the ESP-IDF mDNS component on
//! ESP-IDF and is a no-op on simulation targets.
//!
//! Started once the station link first comes up.

use log::info;

use crate::app::ports::ServicePort;
use crate::error::CommsError;

/// Default host name (`powermeter.local`).
pub const DEFAULT_HOSTNAME: &str = "powermeter";

const MDNS_SERVICE_TYPE: &str = "_http";
const MDNS_SERVICE_PORT: u16 = 80;

/// mDNS advertisement adapter.
pub struct MdnsAdapter {
    hostname: heapless::String<24>,
    active: bool,
}

impl MdnsAdapter {
    pub fn new(hostname: heapless::String<24>) -> Self {
        Self {
            hostname,
            active: false,
        }
    }

    /// Whether mDNS is currently advertising.
    pub fn is_active(&self) -> bool {
        self.active
    }

    /// Stop mDNS advertisement.
    pub fn stop(&mut self) {
        if !self.active {
            return;
        }
        self.platform_stop();
        self.active = false;
        info!("mDNS: stopped");
    }

    // ── Platform-specific ─────────────────────────────────────

    #[cfg(target_os = "espidf")]
    fn platform_start(&self) -> Result<(), CommsError> {
        use esp_idf_svc::sys::*;

        let mut hostname_buf = [0u8; 32];
        let hb = self.hostname.as_bytes();
        let hl = hb.len().min(31);
        hostname_buf[..hl].copy_from_slice(&hb[..hl]);

        // SAFETY: all strings passed below are NUL-terminated buffers that
        // outlive the calls; the component copies them.
        unsafe {
            let ret = mdns_init();
            if ret != ESP_OK as i32 {
                log::error!("mDNS: mdns_init failed ({})", ret);
                return Err(CommsError::MdnsFailed);
            }
            mdns_hostname_set(hostname_buf.as_ptr() as *const _);
            mdns_instance_name_set(b"Power Meter\0".as_ptr() as *const _);

            let ret = mdns_service_add(
                b"Power Meter Web\0".as_ptr() as *const _,
                b"_http\0".as_ptr() as *const _,
                b"_tcp\0".as_ptr() as *const _,
                MDNS_SERVICE_PORT,
                core::ptr::null_mut(),
                0,
            );
            if ret != ESP_OK as i32 {
                log::error!("mDNS: service add failed ({})", ret);
                return Err(CommsError::MdnsFailed);
            }

            let ver = concat!(env!("CARGO_PKG_VERSION"), "\0");
            mdns_service_txt_item_set(
                b"_http\0".as_ptr() as *const _,
                b"_tcp\0".as_ptr() as *const _,
                b"version\0".as_ptr() as *const _,
                ver.as_ptr() as *const _,
            );
        }
        Ok(())
    }

    #[cfg(not(target_os = "espidf"))]
    fn platform_start(&self) -> Result<(), CommsError> {
        if self.hostname.is_empty() {
            return Err(CommsError::MdnsFailed);
        }
        Ok(())
    }

    #[cfg(target_os = "espidf")]
    fn platform_stop(&self) {
        // SAFETY: only called after a successful mdns_init.
        unsafe {
            esp_idf_svc::sys::mdns_free();
        }
    }

    #[cfg(not(target_os = "espidf"))]
    fn platform_stop(&self) {
        info!("mDNS(sim): unregistered");
    }
}

impl ServicePort for MdnsAdapter {
    /// Register host name and service.  Idempotent.
    fn start(&mut self) -> Result<(), CommsError> {
        if self.active {
            return Ok(());
        }
        self.platform_start()?;
        self.active = true;
        info!(
            "mDNS: advertising {}.local → {}._tcp:{} v={}",
            self.hostname,
            MDNS_SERVICE_TYPE,
            MDNS_SERVICE_PORT,
            env!("CARGO_PKG_VERSION")
        );
        Ok(())
    }

    /// The IDF responder runs in its own task; nothing to pump here.
    fn maintain(&mut self) {}
}
