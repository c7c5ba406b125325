use anyhow::{Context, Result, bail};
use std::time::Duration;

use crate::cli::{FindOpts, ReplayOpts, SendOpts, SerialOpts, VolumeOpts};
use crate::discover;
use crate::relay::{Outcome, Relay};

pub fn find(opts: FindOpts) -> Result<()> {
    match discover::find_device(&opts.signature)? {
        Some(port) => {
            println!("{port}");
            Ok(())
        }
        None => bail!("no device matching \"{}\"", opts.signature),
    }
}

pub fn send(opts: SendOpts) -> Result<()> {
    let relay = connect(&opts.ser)?;
    eprintln!("[relay] sending {}", opts.path.display());
    relay.send_file(opts.path)?;
    finish(&relay)
}

pub fn volume(opts: VolumeOpts) -> Result<()> {
    let relay = connect(&opts.ser)?;
    relay.set_volume(opts.level)?;
    finish(&relay)
}

pub fn replay(opts: ReplayOpts) -> Result<()> {
    let relay = connect(&opts.ser)?;
    relay.replay_last()?;
    finish(&relay)
}

fn connect(ser: &SerialOpts) -> Result<Relay> {
    let dev = match (&ser.dev, &ser.signature) {
        (Some(dev), _) => dev.clone(),
        (None, Some(sig)) => discover::find_device(sig)?
            .with_context(|| format!("no device matching \"{sig}\""))?,
        (None, None) => bail!("pass --dev or --signature"),
    };
    eprintln!("[relay] {} @ {} baud", dev, ser.baud);
    Relay::open(&dev, ser.baud, Duration::from_millis(ser.ack_timeout_ms))
}

/// Block until the operation reaches a terminal state and map it onto the
/// process exit status.
fn finish(relay: &Relay) -> Result<()> {
    match relay.wait() {
        None | Some(Outcome::Done) => Ok(()),
        Some(Outcome::Cancelled) => bail!("transfer cancelled"),
        Some(Outcome::Failed(e)) => Err(e).context("operation failed"),
    }
}
