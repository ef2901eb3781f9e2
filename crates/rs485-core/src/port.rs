//! Serial transport seam and port enumeration.

use serialport::{SerialPort, SerialPortInfo};
use std::io::{self, Read, Write};
use std::time::Duration;

/// A byte stream with a host-driven direction line.
///
/// Implemented for real `serialport` handles; tests plug in doubles. Reads
/// must honour the most recent [`set_timeout`](HalfDuplexPort::set_timeout)
/// and fail with [`io::ErrorKind::TimedOut`] when it elapses.
pub trait HalfDuplexPort: Read + Write + Send {
    /// Drive the RTS line to `level`.
    fn set_rts(&mut self, level: bool) -> io::Result<()>;

    fn set_timeout(&mut self, timeout: Duration) -> io::Result<()>;
}

impl HalfDuplexPort for Box<dyn SerialPort> {
    fn set_rts(&mut self, level: bool) -> io::Result<()> {
        self.write_request_to_send(level).map_err(io::Error::from)
    }

    fn set_timeout(&mut self, timeout: Duration) -> io::Result<()> {
        SerialPort::set_timeout(&mut **self, timeout).map_err(io::Error::from)
    }
}

#[derive(Debug, Clone)]
pub struct PortInfo {
    pub port_name: String,
    pub port_type: String,
    pub vid: Option<u16>,
    pub pid: Option<u16>,
    pub serial_number: Option<String>,
    pub manufacturer: Option<String>,
    pub product: Option<String>,
}

impl PortInfo {
    /// Name as shown in a picker, with VID:PID for USB adapters.
    pub fn label(&self) -> String {
        match (self.vid, self.pid) {
            (Some(vid), Some(pid)) => format!("{} ({:04X}:{:04X})", self.port_name, vid, pid),
            _ => self.port_name.clone(),
        }
    }
}

impl From<SerialPortInfo> for PortInfo {
    fn from(info: SerialPortInfo) -> Self {
        let (port_type, vid, pid, serial_number, manufacturer, product) = match &info.port_type {
            serialport::SerialPortType::UsbPort(usb) => (
                "USB".to_string(),
                Some(usb.vid),
                Some(usb.pid),
                usb.serial_number.clone(),
                usb.manufacturer.clone(),
                usb.product.clone(),
            ),
            serialport::SerialPortType::PciPort => ("PCI".to_string(), None, None, None, None, None),
            serialport::SerialPortType::BluetoothPort => ("Bluetooth".to_string(), None, None, None, None, None),
            serialport::SerialPortType::Unknown => ("Unknown".to_string(), None, None, None, None, None),
        };
        Self {
            port_name: info.port_name,
            port_type,
            vid,
            pid,
            serial_number,
            manufacturer,
            product,
        }
    }
}

/// Available ports sorted by name. Enumeration errors give an empty list.
pub fn list_ports() -> Vec<PortInfo> {
    let ports = match serialport::available_ports() {
        Ok(ports) => ports,
        Err(e) => {
            log::warn!("port enumeration failed: {e}");
            Vec::new()
        }
    };
    sorted(ports.into_iter().map(PortInfo::from).collect())
}

fn sorted(mut ports: Vec<PortInfo>) -> Vec<PortInfo> {
    ports.sort_by(|a, b| a.port_name.cmp(&b.port_name));
    ports
}

#[cfg(test)]
mod tests {
    use super::*;

    fn plain(name: &str) -> PortInfo {
        PortInfo {
            port_name: name.to_string(),
            port_type: "Unknown".to_string(),
            vid: None,
            pid: None,
            serial_number: None,
            manufacturer: None,
            product: None,
        }
    }

    #[test]
    fn ports_sorted_by_name() {
        let ports = sorted(vec![plain("COM4"), plain("/dev/ttyUSB0"), plain("COM1")]);
        let names: Vec<_> = ports.iter().map(|p| p.port_name.as_str()).collect();
        assert_eq!(names, ["/dev/ttyUSB0", "COM1", "COM4"]);
    }

    #[test]
    fn usb_label_has_ids() {
        let mut p = plain("/dev/ttyUSB0");
        assert_eq!(p.label(), "/dev/ttyUSB0");
        p.vid = Some(0x0403);
        p.pid = Some(0x6001);
        assert_eq!(p.label(), "/dev/ttyUSB0 (0403:6001)");
    }

    #[test]
    fn list_ports_does_not_panic() {
        for port in list_ports() {
            println!("found port: {} [{}]", port.port_name, port.port_type);
        }
    }
}
