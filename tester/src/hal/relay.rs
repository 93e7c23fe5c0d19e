use anyhow::{bail, Context};
use cathcore::bench_interface::RelayTransport;
use cathcore::{MeasureError, MeasureResult, RelaySelector};
use log::{debug, info};
use serialport::{SerialPort, SerialPortInfo, SerialPortType};
use std::io::Write;
use std::thread;
use std::time::Duration;

use crate::workflow::config::RelaySettings;

/// Relay matrix controller reached over a serial link.
pub struct SerialRelay<W = Box<dyn SerialPort>> {
    port: W,
    guard_delay: Duration,
}

impl SerialRelay {
    pub fn open(settings: &RelaySettings) -> anyhow::Result<Self> {
        let name = match &settings.port {
            Some(name) => name.clone(),
            None => find_port(&settings.match_description)?,
        };
        let port = serialport::new(&name, settings.baud_rate)
            .timeout(settings.timeout())
            .open()
            .with_context(|| format!("opening relay port {}", name))?;
        info!("relay controller connected on {}", name);
        Ok(Self::with_port(port, settings.guard_delay()))
    }
}

impl<W: Write> SerialRelay<W> {
    pub fn with_port(port: W, guard_delay: Duration) -> Self {
        Self { port, guard_delay }
    }

    pub fn port(&self) -> &W {
        &self.port
    }
}

impl<W: Write> RelayTransport for SerialRelay<W> {
    fn write_relay_selector(&mut self, selector: RelaySelector) -> MeasureResult<()> {
        if !self.guard_delay.is_zero() {
            thread::sleep(self.guard_delay);
        }
        self.port
            .write_all(&[selector.byte()])
            .and_then(|_| self.port.flush())
            .map_err(|err| {
                MeasureError::InstrumentUnavailable(format!(
                    "writing relay selector {}: {}",
                    selector, err
                ))
            })
    }
}

fn describes(info: &SerialPortInfo, needle: &str) -> bool {
    match &info.port_type {
        SerialPortType::UsbPort(usb) => [&usb.product, &usb.manufacturer]
            .iter()
            .any(|field| field.as_deref().map_or(false, |text| text.contains(needle))),
        _ => false,
    }
}

fn find_port(needle: &str) -> anyhow::Result<String> {
    let ports = serialport::available_ports().context("listing serial ports")?;
    for info in &ports {
        debug!("serial port {} ({:?})", info.port_name, info.port_type);
    }
    match ports.iter().find(|info| describes(info, needle)) {
        Some(info) => Ok(info.port_name.clone()),
        None => bail!("no serial port describes itself as '{}'", needle),
    }
}
