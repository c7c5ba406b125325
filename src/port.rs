use anyhow::Result;
use serialport::{DataBits, FlowControl, Parity, SerialPort, StopBits};
use std::time::Duration;

/// Open a port at 8N1 with no flow control. `ack_timeout` becomes the read
/// timeout, which is what bounds every acknowledgment wait.
pub fn open_port(dev: &str, baud: u32, ack_timeout: Duration) -> Result<Box<dyn SerialPort>> {
    serialport::new(dev, baud)
        .timeout(ack_timeout)
        .data_bits(DataBits::Eight)
        .parity(Parity::None)
        .stop_bits(StopBits::One)
        .flow_control(FlowControl::None)
        .open()
        .map_err(|e| anyhow::anyhow!("open {}: {}", dev, e))
}
