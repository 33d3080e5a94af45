//! Driver whose output ports are child `midicat out` processes.
//!
//! Port enumeration asks a child for the structured listing (`outs --json`),
//! so the parent process never links against a MIDI backend itself.

use super::{MidiDriver, MidiIn, MidiOut};
use crate::error::{Error, Result};
use crate::port::{ChildCommand, PortRegistry, VirtualPort};
use crate::selector::{Direction, PortInfo, PortListing, PortSelector};
use std::process::Stdio;
use std::sync::Arc;
use tracing::debug;

pub struct SubprocessDriver {
    command: ChildCommand,
    registry: PortRegistry,
}

impl SubprocessDriver {
    pub fn new(command: ChildCommand) -> Self {
        Self {
            command,
            registry: PortRegistry::new(),
        }
    }

    pub fn registry(&self) -> &PortRegistry {
        &self.registry
    }

    /// An unopened port, for callers that drive the lifecycle themselves.
    pub fn port(&self, info: PortInfo) -> VirtualPort {
        VirtualPort::new(info, self.command.clone(), self.registry.clone())
    }

    fn list(&self, listing: &str) -> Result<Vec<PortInfo>> {
        let output = self
            .command
            .command()
            .arg(listing)
            .arg("--json")
            .stdin(Stdio::null())
            .stderr(Stdio::inherit())
            .output()
            .map_err(|e| {
                Error::MidiDevice(format!(
                    "can't run {} {}: {}",
                    self.command.program().display(),
                    listing,
                    e
                ))
            })?;

        if !output.status.success() {
            return Err(Error::MidiDevice(format!(
                "{} {} --json failed with {}",
                self.command.program().display(),
                listing,
                output.status
            )));
        }

        let ports: PortListing = serde_json::from_slice(&output.stdout)?;
        debug!("Child reported {} {} ports", ports.len(), listing);
        Ok(ports.into_ports())
    }
}

impl MidiDriver for SubprocessDriver {
    fn inputs(&self) -> Result<Vec<PortInfo>> {
        self.list("ins")
    }

    fn outputs(&self) -> Result<Vec<PortInfo>> {
        self.list("outs")
    }

    fn open_input(&self, _selector: &PortSelector) -> Result<Box<dyn MidiIn>> {
        Err(Error::Unsupported(
            "the subprocess driver only provides out ports".to_string(),
        ))
    }

    fn open_output(&self, selector: &PortSelector) -> Result<Arc<dyn MidiOut>> {
        let ports = self.outputs()?;
        let info = selector.resolve(&ports, Direction::Output)?.clone();
        let port = self.port(info);
        port.open()?;
        Ok(Arc::new(port))
    }

    fn close(&self) -> Result<()> {
        self.registry.close_all()
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;

    fn listing_child(json: &str) -> ChildCommand {
        ChildCommand::new("sh")
            .arg("-c")
            .arg(format!("printf '%s\\n' '{}'", json))
    }

    #[test]
    fn test_outputs_from_child_listing() {
        let driver = SubprocessDriver::new(listing_child(r#"{"0":"Synth A","1":"Synth B"}"#));
        let ports = driver.outputs().unwrap();
        assert_eq!(
            ports,
            vec![PortInfo::new(0, "Synth A"), PortInfo::new(1, "Synth B")]
        );
    }

    #[test]
    fn test_bad_listing() {
        let driver = SubprocessDriver::new(listing_child("not json"));
        assert!(matches!(driver.outputs(), Err(Error::Listing(_))));
    }

    #[test]
    fn test_failing_child_listing() {
        let driver = SubprocessDriver::new(ChildCommand::new("false"));
        assert!(matches!(driver.inputs(), Err(Error::MidiDevice(_))));
    }

    #[test]
    fn test_virtual_inputs_unsupported() {
        let driver = SubprocessDriver::new(listing_child("{}"));
        assert!(matches!(
            driver.open_input(&PortSelector::first()),
            Err(Error::Unsupported(_))
        ));
    }

    #[test]
    fn test_open_output_without_ports() {
        let driver = SubprocessDriver::new(listing_child("{}"));
        assert!(matches!(
            driver.open_output(&PortSelector::first()),
            Err(Error::NoPorts(Direction::Output))
        ));
        assert!(driver.registry().is_empty());
    }
}
