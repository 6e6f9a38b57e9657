//! Native serial port implementation using the `serialport` crate.

use {
    crate::{
        error::{Error, Result},
        port::{Port, PortInfo, SerialConfig},
    },
    log::{debug, trace},
    serialport::ClearBuffer,
    std::{
        io::{Read, Write},
        time::Duration,
    },
};

/// Native serial port.
///
/// Wraps a `serialport` handle opened with the TNC's fixed 8N1 framing.
pub struct NativePort {
    port: Option<Box<dyn serialport::SerialPort>>,
    config: SerialConfig,
    timeout: Duration,
}

impl NativePort {
    /// Open a serial port with the given configuration.
    pub fn open(config: &SerialConfig) -> Result<Self> {
        let port = Self::open_raw(config)?;
        Ok(Self {
            port: Some(port),
            config: config.clone(),
            timeout: config.timeout,
        })
    }

    /// Open a serial port with default settings.
    pub fn open_simple(port_name: &str, baud_rate: u32) -> Result<Self> {
        Self::open(&SerialConfig::new(port_name, baud_rate))
    }

    fn open_raw(config: &SerialConfig) -> Result<Box<dyn serialport::SerialPort>> {
        let port = serialport::new(&config.port_name, config.baud_rate)
            .timeout(config.timeout)
            .data_bits(serialport::DataBits::Eight)
            .parity(serialport::Parity::None)
            .stop_bits(serialport::StopBits::One)
            .flow_control(serialport::FlowControl::None)
            .open()?;
        Ok(port)
    }

    fn inner(&mut self) -> std::io::Result<&mut Box<dyn serialport::SerialPort>> {
        self.port
            .as_mut()
            .ok_or_else(|| std::io::Error::new(std::io::ErrorKind::NotConnected, "port closed"))
    }
}

impl Port for NativePort {
    fn set_timeout(&mut self, timeout: Duration) -> Result<()> {
        if let Some(ref mut p) = self.port {
            p.set_timeout(timeout)?;
        }
        self.timeout = timeout;
        Ok(())
    }

    fn timeout(&self) -> Duration {
        self.timeout
    }

    fn baud_rate(&self) -> u32 {
        self.config.baud_rate
    }

    fn bytes_to_read(&mut self) -> Result<u32> {
        Ok(self.inner()?.bytes_to_read().map_err(Error::Serial)?)
    }

    fn discard_input(&mut self) -> Result<()> {
        trace!("discarding input buffer");
        if let Some(ref mut p) = self.port {
            p.clear(ClearBuffer::Input)?;
        }
        Ok(())
    }

    fn discard_output(&mut self) -> Result<()> {
        trace!("discarding output buffer");
        if let Some(ref mut p) = self.port {
            p.clear(ClearBuffer::Output)?;
        }
        Ok(())
    }

    fn reconnect(&mut self) -> Result<()> {
        debug!("reopening {}", self.config.port_name);
        // Drop the old handle first so the device node is free to reopen.
        self.port.take();
        let mut config = self.config.clone();
        config.timeout = self.timeout;
        self.port = Some(Self::open_raw(&config)?);
        Ok(())
    }

    fn name(&self) -> &str {
        &self.config.port_name
    }
}

impl Read for NativePort {
    fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        self.inner().and_then(|p| p.read(buf))
    }
}

impl Write for NativePort {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.inner().and_then(|p| p.write(buf))
    }

    fn flush(&mut self) -> std::io::Result<()> {
        self.inner().and_then(|p| p.flush())
    }
}

/// List all serial ports the OS reports.
pub fn available_ports() -> Result<Vec<PortInfo>> {
    let ports = serialport::available_ports().map_err(Error::Serial)?;

    Ok(ports
        .into_iter()
        .map(|p| {
            let (vid, pid, manufacturer, product) = match &p.port_type {
                serialport::SerialPortType::UsbPort(info) => (
                    Some(info.vid),
                    Some(info.pid),
                    info.manufacturer.clone(),
                    info.product.clone(),
                ),
                _ => (None, None, None, None),
            };

            PortInfo {
                name: p.port_name,
                vid,
                pid,
                manufacturer,
                product,
            }
        })
        .collect())
}
