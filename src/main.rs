use anyhow::Result;
use clap::Parser;

mod cli;
mod discover;
mod port;
mod relay;
mod run;
mod wire;

fn main() -> Result<()> {
    let args = cli::Cli::parse();
    match args.cmd {
        cli::Cmd::List => discover::print_ports(),
        cli::Cmd::Find(opts) => run::find(opts),
        cli::Cmd::Send(opts) => run::send(opts),
        cli::Cmd::Volume(opts) => run::volume(opts),
        cli::Cmd::Replay(opts) => run::replay(opts),
    }
}
