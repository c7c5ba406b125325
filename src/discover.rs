use anyhow::{Context, Result};
use serialport::{SerialPortInfo, SerialPortType};

/// Return the first attached port whose hardware identifier contains
/// `signature` (case-insensitive), or `None` when nothing matches. Order is
/// whatever the platform enumerates; with several matching devices the pick
/// is best-effort, not deterministic.
pub fn find_device(signature: &str) -> Result<Option<String>> {
    let ports = serialport::available_ports().context("enumerating serial ports")?;
    Ok(first_match(&ports, signature))
}

/// Print every attached port with its hardware identifier, one per line.
/// Handy for working out what signature to pass to `find`.
pub fn print_ports() -> Result<()> {
    let ports = serialport::available_ports().context("enumerating serial ports")?;
    if ports.is_empty() {
        eprintln!("[find] no serial ports attached");
        return Ok(());
    }
    for p in &ports {
        println!("{}\t{}", p.port_name, hardware_id(&p.port_type));
    }
    Ok(())
}

fn first_match(ports: &[SerialPortInfo], signature: &str) -> Option<String> {
    let sig = signature.to_ascii_uppercase();
    ports
        .iter()
        .find(|p| hardware_id(&p.port_type).to_ascii_uppercase().contains(&sig))
        .map(|p| p.port_name.clone())
}

/// Flatten the platform port metadata into one matchable string, in the
/// usual `USB VID:PID=vvvv:pppp SER=... MFG=... PROD=...` shape.
fn hardware_id(port_type: &SerialPortType) -> String {
    match port_type {
        SerialPortType::UsbPort(usb) => {
            let mut id = format!("USB VID:PID={:04X}:{:04X}", usb.vid, usb.pid);
            if let Some(ser) = &usb.serial_number {
                id.push_str(&format!(" SER={ser}"));
            }
            if let Some(mfg) = &usb.manufacturer {
                id.push_str(&format!(" MFG={mfg}"));
            }
            if let Some(prod) = &usb.product {
                id.push_str(&format!(" PROD={prod}"));
            }
            id
        }
        SerialPortType::PciPort => "PCI".to_string(),
        SerialPortType::BluetoothPort => "BLUETOOTH".to_string(),
        SerialPortType::Unknown => String::new(),
    }
}
