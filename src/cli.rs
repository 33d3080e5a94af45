//! Command-line model.

use clap::{Args, CommandFactory, Parser, Subcommand, ValueEnum};
use midicat_io::{DriverConfig, DriverKind, PortSelector, PumpConfig};

#[derive(Parser, Debug)]
#[command(
    name = "midicat",
    version,
    about = "midicat transfers MIDI data between midi ports and stdin/stdout"
)]
pub struct Cli {
    /// Debug logging on stderr.
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Option<Command>,
}

impl Cli {
    /// Full help text, printed along with top-level errors.
    pub fn usage() -> String {
        Self::command().render_help().to_string()
    }
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// read midi from an in port and print it to stdout
    In(StreamArgs),
    /// read midi from stdin and print it to an out port
    Out(StreamArgs),
    /// show the available midi in ports
    Ins(ListArgs),
    /// show the available midi out ports
    Outs(ListArgs),
    /// pass the midi from stdin to stdout while logging it to stderr
    Log,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, ValueEnum)]
pub enum DriverArg {
    /// open ports in this process
    #[default]
    Native,
    /// open out ports through a child midicat process
    Subprocess,
}

impl From<DriverArg> for DriverKind {
    fn from(arg: DriverArg) -> Self {
        match arg {
            DriverArg::Native => DriverKind::Native,
            DriverArg::Subprocess => DriverKind::Subprocess,
        }
    }
}

#[derive(Args, Debug, Clone, Default)]
pub struct PortArgs {
    /// index of the midi port. If both are given they must name the same port. If neither is given, the first port is used.
    #[arg(short, long)]
    pub index: Option<usize>,

    /// name of the midi port. If both are given they must name the same port. If neither is given, the first port is used.
    #[arg(long)]
    pub name: Option<String>,
}

impl PortArgs {
    pub fn selector(&self) -> PortSelector {
        PortSelector::new(self.index, self.name.clone())
    }
}

#[derive(Args, Debug, Clone)]
pub struct StreamArgs {
    #[command(flatten)]
    pub port: PortArgs,

    /// messages buffered between the port and the stream
    #[arg(long, default_value_t = midicat_io::pump::DEFAULT_CAPACITY)]
    pub buffer: usize,

    #[arg(long, value_enum, default_value_t)]
    pub driver: DriverArg,
}

impl StreamArgs {
    pub fn pump_config(&self, thread_name: &str) -> PumpConfig {
        PumpConfig::default()
            .capacity(self.buffer)
            .thread_name(thread_name)
    }

    pub fn driver_config(&self) -> DriverConfig {
        DriverConfig::default().kind(self.driver.into())
    }
}

#[derive(Args, Debug, Clone)]
pub struct ListArgs {
    /// return the list in JSON format
    #[arg(long)]
    pub json: bool,

    #[arg(long, value_enum, default_value_t)]
    pub driver: DriverArg,
}

impl ListArgs {
    pub fn driver_config(&self) -> DriverConfig {
        DriverConfig::default().kind(self.driver.into())
    }
}
