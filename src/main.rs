//! midicat binary. Also spawned by itself as the child behind subprocess
//! driver out ports.

use clap::Parser;
use midicat::Cli;
use std::process::ExitCode;
use tracing::Level;

fn main() -> ExitCode {
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(e) if !e.use_stderr() => e.exit(),
        Err(e) => {
            eprintln!("{}", Cli::usage());
            eprintln!("ERROR: {}", e);
            return ExitCode::FAILURE;
        }
    };

    // stdout carries MIDI bytes, so logs go to stderr.
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_max_level(if cli.verbose {
            Level::DEBUG
        } else {
            Level::INFO
        })
        .with_target(cli.verbose)
        .init();

    match midicat::run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("{}", Cli::usage());
            eprintln!("ERROR: {}", e);
            ExitCode::FAILURE
        }
    }
}
