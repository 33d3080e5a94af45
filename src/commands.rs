//! Subcommand implementations.
//!
//! Each command is a function over plain readers, writers and a driver, so
//! everything here runs the same against stdio or in-memory buffers.

use crate::cli::{Cli, Command, ListArgs, StreamArgs};
use crate::error::{Error, Result};
use midicat_io::{
    ByteFramer, Direction, FramerStats, MidiDriver, PortListing, PortSelector, PortWriter,
    PumpConfig, PumpStats, ShutdownCoordinator, StreamPump,
};
use std::io::{self, Read, Write};
use std::sync::Arc;
use tracing::{debug, info};

pub fn run(cli: Cli) -> Result<()> {
    let verbose = cli.verbose;
    match cli.command.ok_or(Error::MissingCommand)? {
        Command::In(args) => {
            let driver = args.driver_config().build()?;
            let coordinator = ShutdownCoordinator::new();
            coordinator.install_ctrlc()?;
            let stats = run_in(
                driver.as_ref(),
                &args.port.selector(),
                args.pump_config("midicat-in-pump"),
                &coordinator,
                io::stdout(),
            )?;
            debug!("in: {} messages written to stdout", stats.delivered);
        }
        Command::Out(args) => {
            let stats = out_from_args(&args, verbose)?;
            debug!("out: {} chunks read from stdin", stats.chunks);
        }
        Command::Ins(args) => list_from_args(&args, Direction::Input)?,
        Command::Outs(args) => list_from_args(&args, Direction::Output)?,
        Command::Log => {
            log(io::stdin().lock(), io::stdout())?;
        }
    }
    Ok(())
}

fn out_from_args(args: &StreamArgs, verbose: bool) -> Result<FramerStats> {
    let driver = args.driver_config().build()?;
    run_out(
        driver.as_ref(),
        &args.port.selector(),
        args.pump_config("midicat-out-pump"),
        io::stdin().lock(),
        verbose,
    )
}

fn list_from_args(args: &ListArgs, direction: Direction) -> Result<()> {
    let driver = args.driver_config().build()?;
    list_ports(driver.as_ref(), direction, args.json, &mut io::stdout().lock())
}

/// Pass MIDI from `reader` to `writer` unchanged, logging each message.
pub fn log<R: Read, W: Write>(reader: R, mut writer: W) -> Result<FramerStats> {
    let stats = ByteFramer::new(reader).verbose(true).run(
        |bytes| {
            writer.write_all(bytes)?;
            writer.flush()
        },
        |msg| info!("{:?}", msg),
    )?;
    Ok(stats)
}

/// Print the ports of one direction, either as `[n] name` lines under a
/// heading or as a single JSON object mapping number to name.
pub fn list_ports<W: Write>(
    driver: &dyn MidiDriver,
    direction: Direction,
    json: bool,
    out: &mut W,
) -> Result<()> {
    let ports = match direction {
        Direction::Input => driver.inputs()?,
        Direction::Output => driver.outputs()?,
    };

    if json {
        serde_json::to_writer(&mut *out, &PortListing::from(ports.as_slice()))?;
        writeln!(out)?;
        return Ok(());
    }

    match direction {
        Direction::Input => writeln!(out, "MIDI inputs")?,
        Direction::Output => writeln!(out, "MIDI outputs")?,
    }
    for port in &ports {
        writeln!(out, "{}", port)?;
    }
    Ok(())
}

/// Copy everything received on an in port to `sink` until interrupted.
pub fn run_in<W>(
    driver: &dyn MidiDriver,
    selector: &PortSelector,
    config: PumpConfig,
    coordinator: &ShutdownCoordinator,
    sink: W,
) -> Result<PumpStats>
where
    W: Write + Send + 'static,
{
    let mut input = driver.open_input(selector)?;
    let mut pump = StreamPump::spawn(sink, config)?;
    let stats = coordinator.run_input_session(input.as_mut(), &mut pump)?;
    Ok(stats)
}

/// Send everything read from `reader` to an out port, then close it.
pub fn run_out<R: Read>(
    driver: &dyn MidiDriver,
    selector: &PortSelector,
    config: PumpConfig,
    reader: R,
    verbose: bool,
) -> Result<FramerStats> {
    let port = driver.open_output(selector)?;
    info!("Writing to MIDI out port [{}] {}", port.number(), port.name());

    let mut pump = StreamPump::spawn(PortWriter(Arc::clone(&port)), config)?;
    let sender = pump.sender();
    let framed = ByteFramer::new(reader).verbose(verbose).run(
        |bytes| {
            sender
                .send(bytes.to_vec())
                .map_err(|e| io::Error::other(e.to_string()))
        },
        |msg| debug!("{:?}", msg),
    );

    let pumped = pump.finish();
    debug!(
        "out pump finished: {} delivered, {} failed",
        pumped.delivered, pumped.failed
    );
    let closed = port.close().and_then(|_| driver.close());

    let stats = framed?;
    closed?;
    Ok(stats)
}
