use std::io;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Condvar, Mutex};
use std::thread;
use std::time::Duration;

use anyhow::Result;
use thiserror::Error;

use crate::port::open_port;
use crate::wire::{self, Link, PREP_DELAY, Transfer, WireError};

/// One submitted operation. Consumed by exactly one worker run.
#[derive(Debug, Clone)]
pub enum Command {
    SendFile(PathBuf),
    SetVolume(u8),
    ReplayLast,
}

/// Terminal status of a background operation.
#[derive(Debug)]
pub enum Outcome {
    Done,
    /// Stopped between chunks on request. Not a success, not a failure.
    Cancelled,
    Failed(WireError),
}

#[derive(Debug, Error)]
pub enum RelayError {
    #[error("an operation is already in flight")]
    Busy,
    #[error("volume {0} outside 0..=100")]
    Volume(u8),
    #[error("spawning relay worker: {0}")]
    Spawn(#[from] io::Error),
}

enum State {
    Idle,
    Running,
    Finished(Outcome),
}

struct Shared {
    /// The serial link. Held by the worker for the whole of one operation;
    /// uncontended otherwise since dispatch admits a single worker.
    link: Mutex<Box<dyn Link>>,
    state: Mutex<State>,
    done: Condvar,
    cancel: AtomicBool,
    last_file: Mutex<Option<PathBuf>>,
    prep_delay: Duration,
}

/// Owns one serial connection to the relay device and runs at most one
/// command at a time on a background worker. Dispatch rejects with
/// [`RelayError::Busy`] while a command is in flight; nothing is queued.
pub struct Relay {
    shared: Arc<Shared>,
}

impl Relay {
    pub fn new(link: Box<dyn Link>) -> Self {
        Self::with_prep_delay(link, PREP_DELAY)
    }

    /// Same as [`Relay::new`] with an explicit device preparation delay.
    pub fn with_prep_delay(link: Box<dyn Link>, prep_delay: Duration) -> Self {
        Relay {
            shared: Arc::new(Shared {
                link: Mutex::new(link),
                state: Mutex::new(State::Idle),
                done: Condvar::new(),
                cancel: AtomicBool::new(false),
                last_file: Mutex::new(None),
                prep_delay,
            }),
        }
    }

    /// Open `dev` at `baud` (8N1, no flow control) and bind a relay to it.
    /// `ack_timeout` bounds every acknowledgment read.
    pub fn open(dev: &str, baud: u32, ack_timeout: Duration) -> Result<Self> {
        let port = open_port(dev, baud, ack_timeout)?;
        Ok(Self::new(Box::new(port)))
    }

    /// Stream a file to the device on a background worker.
    pub fn send_file(&self, path: PathBuf) -> Result<(), RelayError> {
        self.start(Command::SendFile(path))
    }

    /// Set the amplifier output level (0..=100) on a background worker.
    pub fn set_volume(&self, level: u8) -> Result<(), RelayError> {
        if level > 100 {
            return Err(RelayError::Volume(level));
        }
        self.start(Command::SetVolume(level))
    }

    /// Ask the device to replay the last transferred file.
    pub fn replay_last(&self) -> Result<(), RelayError> {
        self.start(Command::ReplayLast)
    }

    /// True iff a background operation currently owns the serial link.
    pub fn is_busy(&self) -> bool {
        matches!(*self.shared.state.lock().unwrap(), State::Running)
    }

    /// Block until the current operation reaches a terminal state and return
    /// it; `None` when nothing was in flight. Claiming the outcome returns
    /// the relay to idle.
    pub fn wait(&self) -> Option<Outcome> {
        let mut st = self.shared.state.lock().unwrap();
        while matches!(*st, State::Running) {
            st = self.shared.done.wait(st).unwrap();
        }
        match std::mem::replace(&mut *st, State::Idle) {
            State::Finished(outcome) => Some(outcome),
            _ => None,
        }
    }

    /// Request cooperative termination of the current transfer and wait for
    /// it. The flag is observed between chunks only, so latency is bounded
    /// by one ack round-trip, not by chunk size.
    pub fn cancel(&self) -> Option<Outcome> {
        self.shared.cancel.store(true, Ordering::Relaxed);
        self.wait()
    }

    /// Path of the most recently completed transfer, if any.
    pub fn last_file(&self) -> Option<PathBuf> {
        self.shared.last_file.lock().unwrap().clone()
    }

    fn start(&self, cmd: Command) -> Result<(), RelayError> {
        {
            // Check-and-set under one lock so two dispatches can never both
            // see idle.
            let mut st = self.shared.state.lock().unwrap();
            if matches!(*st, State::Running) {
                return Err(RelayError::Busy);
            }
            // An unclaimed outcome from the previous command is discarded.
            self.shared.cancel.store(false, Ordering::Relaxed);
            *st = State::Running;
        }

        let shared = Arc::clone(&self.shared);
        let spawned = thread::Builder::new()
            .name("relay".into())
            .spawn(move || {
                let outcome = shared.execute(cmd);
                let mut st = shared.state.lock().unwrap();
                *st = State::Finished(outcome);
                shared.done.notify_all();
            });

        if let Err(e) = spawned {
            *self.shared.state.lock().unwrap() = State::Idle;
            return Err(RelayError::Spawn(e));
        }
        Ok(())
    }
}

impl Shared {
    fn execute(&self, cmd: Command) -> Outcome {
        let mut link = self.link.lock().unwrap();
        match cmd {
            Command::SendFile(path) => {
                match wire::send_file(&mut **link, &path, &self.cancel, self.prep_delay) {
                    Ok(Transfer::Complete) => {
                        *self.last_file.lock().unwrap() = Some(path);
                        Outcome::Done
                    }
                    Ok(Transfer::Stopped) => Outcome::Cancelled,
                    Err(e) => Outcome::Failed(e),
                }
            }
            Command::SetVolume(level) => finish(wire::set_volume(&mut **link, level)),
            Command::ReplayLast => finish(wire::replay_last(&mut **link)),
        }
    }
}

fn finish(res: Result<(), WireError>) -> Outcome {
    match res {
        Ok(()) => Outcome::Done,
        Err(e) => Outcome::Failed(e),
    }
}
