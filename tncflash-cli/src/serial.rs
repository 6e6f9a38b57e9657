//! Serial port selection.

use log::debug;

use crate::config::Config;

/// Pick the serial port to use.
///
/// Order: explicit flag or environment variable, the config file's
/// preferred port, then the first port the OS reports.
pub fn pick_port(flag: Option<&str>, config: &Config) -> Option<String> {
    if let Some(port) = flag {
        return Some(port.to_string());
    }
    if let Some(port) = &config.connection.port {
        debug!("using configured port {port}");
        return Some(port.clone());
    }
    match tncflash::available_ports() {
        Ok(ports) => ports.into_iter().next().map(|p| {
            debug!("auto-selected {}", p.name);
            p.name
        }),
        Err(_) => None,
    }
}
