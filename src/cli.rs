use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser, Debug, Clone)]
#[command(name = "relay-ctl", about = "Audio relay control over a serial link")]
pub struct Cli {
    #[command(subcommand)]
    pub cmd: Cmd,
}

#[derive(Subcommand, Debug, Clone)]
pub enum Cmd {
    /// List attached serial ports with their hardware ids
    List,
    /// Print the port whose hardware id contains a signature
    Find(FindOpts),
    /// Stream an audio file to the device
    Send(SendOpts),
    /// Set the amplifier output volume
    Volume(VolumeOpts),
    /// Replay the last transferred file
    Replay(ReplayOpts),
}

#[derive(Args, Debug, Clone)]
pub struct SerialOpts {
    /// Serial device path; takes precedence over --signature
    #[arg(long)]
    pub dev: Option<String>,
    /// Hardware-id substring to locate the device by (e.g. "VID:PID=0D28:0204")
    #[arg(long)]
    pub signature: Option<String>,
    /// Baud rate
    #[arg(long, default_value_t = 115_200)]
    pub baud: u32,
    /// Acknowledgment read timeout in milliseconds
    #[arg(long, default_value_t = 2_000)]
    pub ack_timeout_ms: u64,
}

#[derive(Args, Debug, Clone)]
pub struct FindOpts {
    /// Hardware-id substring (case-insensitive)
    pub signature: String,
}

#[derive(Args, Debug, Clone)]
pub struct SendOpts {
    #[command(flatten)]
    pub ser: SerialOpts,
    /// File to stream to the device
    pub path: PathBuf,
}

#[derive(Args, Debug, Clone)]
pub struct VolumeOpts {
    #[command(flatten)]
    pub ser: SerialOpts,
    /// Output level
    #[arg(value_parser = clap::value_parser!(u8).range(0..=100))]
    pub level: u8,
}

#[derive(Args, Debug, Clone)]
pub struct ReplayOpts {
    #[command(flatten)]
    pub ser: SerialOpts,
}
