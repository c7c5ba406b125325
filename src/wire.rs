use std::fs::File;
use std::io::{self, Read, Write};
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use serialport::{ClearBuffer, SerialPort};
use thiserror::Error;

/// One-byte packet tags. Fixed values, shared with the device firmware.
pub const TAG_SEND_FILE: u8 = 0b0000_1111;
pub const TAG_SET_VOLUME: u8 = 0b0011_0011;
pub const TAG_REPLAY_LAST: u8 = 0b1000_1011;
pub const TAG_ACK: u8 = 0b1111_1111;

/// File payload is streamed in chunks of this many bytes; each chunk is one
/// ack-gated step. The last chunk may be shorter.
pub const CHUNK_SIZE: usize = 512;

/// Delay after the send-file tag is acked, before the length bytes. The
/// device uses this window to init its SD card and create the file.
pub const PREP_DELAY: Duration = Duration::from_secs(1);

#[derive(Debug, Error)]
pub enum WireError {
    #[error("device answered 0x{0:02X} instead of ACK")]
    BadAck(u8),
    #[error("no acknowledgment within the read timeout")]
    AckTimeout,
    #[error("serial link: {0}")]
    Link(#[source] io::Error),
    #[error("source file: {0}")]
    File(#[source] io::Error),
    #[error("file too large for a 4-byte length ({0} bytes)")]
    TooLarge(u64),
}

/// Byte transport the protocol runs over. Real hardware is a serial port;
/// tests substitute a scripted device.
pub trait Link: Read + Write + Send {
    /// Drop any bytes sitting in the receive buffer. Called before every
    /// write so a stale byte can never be mistaken for the next ack.
    fn discard_input(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl Link for Box<dyn SerialPort> {
    fn discard_input(&mut self) -> io::Result<()> {
        self.clear(ClearBuffer::Input).map_err(io::Error::from)
    }
}

/// How a send-file transfer ended when no error occurred.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transfer {
    Complete,
    /// Stopped between chunks because cancellation was requested.
    Stopped,
}

/// One ack-gated step: write `bytes`, flush, read exactly one byte and
/// require it to be the ACK tag.
fn ack_step(link: &mut dyn Link, bytes: &[u8]) -> Result<(), WireError> {
    link.discard_input().map_err(WireError::Link)?;
    link.write_all(bytes).map_err(WireError::Link)?;
    link.flush().map_err(WireError::Link)?;

    let mut buf = [0u8; 1];
    if let Err(e) = link.read_exact(&mut buf) {
        return Err(match e.kind() {
            io::ErrorKind::TimedOut | io::ErrorKind::WouldBlock => WireError::AckTimeout,
            _ => WireError::Link(e),
        });
    }
    if buf[0] != TAG_ACK {
        return Err(WireError::BadAck(buf[0]));
    }
    Ok(())
}

/// Encode a file length as the four big-endian bytes the device expects.
fn length_bytes(len: u64) -> Result<[u8; 4], WireError> {
    u32::try_from(len)
        .map(u32::to_be_bytes)
        .map_err(|_| WireError::TooLarge(len))
}

/// Volume command: tag step, then the raw level byte. Two ack-gated steps.
pub fn set_volume(link: &mut dyn Link, level: u8) -> Result<(), WireError> {
    ack_step(link, &[TAG_SET_VOLUME])?;
    ack_step(link, &[level])
}

/// Replay command: a single tag step. The device already holds the last
/// transferred file.
pub fn replay_last(link: &mut dyn Link) -> Result<(), WireError> {
    ack_step(link, &[TAG_REPLAY_LAST])
}

/// Stream `path` to the device.
///
/// Sequence: tag step, prep delay, four 1-byte length steps (MSB first),
/// then one step per chunk until EOF. The length is deliberately sent one
/// byte per ack round to stay wire-compatible with the deployed firmware.
/// `cancel` is observed between chunks only; a set flag ends the transfer
/// early with `Transfer::Stopped`.
pub fn send_file(
    link: &mut dyn Link,
    path: &Path,
    cancel: &AtomicBool,
    prep_delay: Duration,
) -> Result<Transfer, WireError> {
    // A path that vanished since the caller validated it fails here, before
    // anything touches the wire.
    let mut file = File::open(path).map_err(WireError::File)?;
    let len = file.metadata().map_err(WireError::File)?.len();
    let len_bytes = length_bytes(len)?;

    ack_step(link, &[TAG_SEND_FILE])?;
    std::thread::sleep(prep_delay);

    for b in len_bytes {
        ack_step(link, &[b])?;
    }

    let mut chunk = [0u8; CHUNK_SIZE];
    loop {
        if cancel.load(Ordering::Relaxed) {
            return Ok(Transfer::Stopped);
        }
        let n = read_chunk(&mut file, &mut chunk).map_err(WireError::File)?;
        if n == 0 {
            return Ok(Transfer::Complete);
        }
        ack_step(link, &chunk[..n])?;
    }
}

/// Fill `buf` as far as EOF allows. A bare `read` may return short on a
/// pipe-backed file, so keep reading until the buffer is full or EOF.
fn read_chunk(file: &mut File, buf: &mut [u8]) -> io::Result<usize> {
    let mut filled = 0;
    while filled < buf.len() {
        match file.read(&mut buf[filled..]) {
            Ok(0) => break,
            Ok(n) => filled += n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        }
    }
    Ok(filled)
}
