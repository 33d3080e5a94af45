//! Native ports via midir.
//!
//! Connections live on dedicated threads (platform thread-safety), driven by
//! commands over a channel.

use super::{MidiDriver, MidiIn, MidiOut};
use crate::error::{Error, Result};
use crate::pump::PumpSender;
use crate::selector::{Direction, PortInfo, PortSelector};
use crossbeam_channel::{bounded, Receiver, Sender};
use midir::{Ignore, MidiInput, MidiInputConnection, MidiOutput, MidiOutputConnection};
use parking_lot::Mutex;
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use tracing::{debug, trace, warn};

const OUTPUT_QUEUE: usize = 1024;

pub struct NativeDriver {
    client_name: String,
}

impl NativeDriver {
    pub fn new(client_name: impl Into<String>) -> Self {
        Self {
            client_name: client_name.into(),
        }
    }

    fn list_inputs(client_name: &str) -> Result<Vec<PortInfo>> {
        let midi_input = MidiInput::new(&format!("{}-device-list", client_name))?;
        Ok(midi_input
            .ports()
            .iter()
            .enumerate()
            .map(|(index, port)| {
                let name = midi_input
                    .port_name(port)
                    .unwrap_or_else(|_| format!("Unknown Device {}", index));
                PortInfo::new(index, name)
            })
            .collect())
    }

    fn list_outputs(client_name: &str) -> Result<Vec<PortInfo>> {
        let midi_output = MidiOutput::new(&format!("{}-device-list", client_name))?;
        Ok(midi_output
            .ports()
            .iter()
            .enumerate()
            .map(|(index, port)| {
                let name = midi_output
                    .port_name(port)
                    .unwrap_or_else(|_| format!("Unknown Device {}", index));
                PortInfo::new(index, name)
            })
            .collect())
    }
}

impl MidiDriver for NativeDriver {
    fn inputs(&self) -> Result<Vec<PortInfo>> {
        Self::list_inputs(&self.client_name)
    }

    fn outputs(&self) -> Result<Vec<PortInfo>> {
        Self::list_outputs(&self.client_name)
    }

    fn open_input(&self, selector: &PortSelector) -> Result<Box<dyn MidiIn>> {
        let ports = self.inputs()?;
        let info = selector.resolve(&ports, Direction::Input)?.clone();
        debug!("Resolved MIDI in port {} from {}", info, selector);
        Ok(Box::new(NativeInput::new(info, self.client_name.clone())))
    }

    fn open_output(&self, selector: &PortSelector) -> Result<Arc<dyn MidiOut>> {
        let ports = self.outputs()?;
        let info = selector.resolve(&ports, Direction::Output)?.clone();
        debug!("Resolved MIDI out port {} from {}", info, selector);
        let port = NativeOutput::new(info, self.client_name.clone());
        port.open()?;
        Ok(Arc::new(port))
    }

    fn close(&self) -> Result<()> {
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Output
// ---------------------------------------------------------------------------

enum OutputCommand {
    Send(Vec<u8>),
    Shutdown,
}

struct OutputThread {
    commands: Sender<OutputCommand>,
    thread: JoinHandle<()>,
}

pub struct NativeOutput {
    info: PortInfo,
    client_name: String,
    running: Mutex<Option<OutputThread>>,
}

impl NativeOutput {
    pub fn new(info: PortInfo, client_name: String) -> Self {
        Self {
            info,
            client_name,
            running: Mutex::new(None),
        }
    }

    fn connect(client_name: &str, info: &PortInfo) -> Result<MidiOutputConnection> {
        let midi_output = MidiOutput::new(client_name)?;
        let ports = midi_output.ports();
        let port = ports.get(info.number).ok_or_else(|| {
            Error::MidiDevice(format!("MIDI output device {} not found", info.number))
        })?;
        Ok(midi_output.connect(port, &format!("{}-out", client_name))?)
    }

    fn output_thread(
        mut connection: MidiOutputConnection,
        commands: Receiver<OutputCommand>,
        info: PortInfo,
    ) {
        loop {
            match commands.recv() {
                Ok(OutputCommand::Send(bytes)) => {
                    if let Err(e) = connection.send(&bytes) {
                        warn!("could not write {:02X?} to port {:?}: {}", bytes, info.name, e);
                    }
                }
                Ok(OutputCommand::Shutdown) | Err(_) => break,
            }
        }
        connection.close();
        debug!("Closed MIDI out port {}", info);
    }
}

impl MidiOut for NativeOutput {
    fn open(&self) -> Result<()> {
        let mut running = self.running.lock();
        if running.is_some() {
            return Err(Error::AlreadyRunning {
                number: self.info.number,
                name: self.info.name.clone(),
            });
        }

        let (ready_sender, ready_receiver) = bounded(1);
        let (commands, command_receiver) = bounded(OUTPUT_QUEUE);
        let client_name = self.client_name.clone();
        let info = self.info.clone();

        let thread = thread::Builder::new()
            .name("midi-output-thread".to_string())
            .spawn(move || match Self::connect(&client_name, &info) {
                Ok(connection) => {
                    let _ = ready_sender.send(Ok(()));
                    Self::output_thread(connection, command_receiver, info);
                }
                Err(e) => {
                    let _ = ready_sender.send(Err(e));
                }
            })?;

        match ready_receiver.recv() {
            Ok(Ok(())) => {
                debug!("Opened MIDI out port {}", self.info);
                *running = Some(OutputThread { commands, thread });
                Ok(())
            }
            Ok(Err(e)) => {
                let _ = thread.join();
                Err(e)
            }
            Err(_) => Err(Error::MidiDevice(
                "MIDI output thread exited before connecting".to_string(),
            )),
        }
    }

    fn close(&self) -> Result<()> {
        let Some(running) = self.running.lock().take() else {
            return Ok(());
        };
        let _ = running.commands.send(OutputCommand::Shutdown);
        if running.thread.join().is_err() {
            warn!("MIDI output thread panicked");
        }
        Ok(())
    }

    fn is_open(&self) -> bool {
        self.running.lock().is_some()
    }

    fn write(&self, bytes: &[u8]) -> Result<usize> {
        let running = self.running.lock();
        let Some(running) = running.as_ref() else {
            return Err(Error::PortClosed);
        };
        running
            .commands
            .send(OutputCommand::Send(bytes.to_vec()))
            .map_err(|_| Error::MidiPort("MIDI output thread not running".to_string()))?;
        Ok(bytes.len())
    }

    fn number(&self) -> usize {
        self.info.number
    }

    fn name(&self) -> &str {
        &self.info.name
    }
}

impl Drop for NativeOutput {
    fn drop(&mut self) {
        let _ = self.close();
    }
}

// ---------------------------------------------------------------------------
// Input
// ---------------------------------------------------------------------------

struct InputThread {
    stop: Sender<()>,
    thread: JoinHandle<()>,
}

pub struct NativeInput {
    info: PortInfo,
    client_name: String,
    listening: Option<InputThread>,
}

impl NativeInput {
    pub fn new(info: PortInfo, client_name: String) -> Self {
        Self {
            info,
            client_name,
            listening: None,
        }
    }

    fn connect(
        client_name: &str,
        info: &PortInfo,
        sink: PumpSender,
    ) -> Result<MidiInputConnection<()>> {
        let mut midi_input = MidiInput::new(client_name)?;
        // Clock, active sensing and sysex are passed through like everything else.
        midi_input.ignore(Ignore::None);

        let ports = midi_input.ports();
        let port = ports.get(info.number).ok_or_else(|| {
            Error::MidiDevice(format!("MIDI input device {} not found", info.number))
        })?;

        let connection = midi_input.connect(
            port,
            &format!("{}-in", client_name),
            move |timestamp, message, _| {
                trace!(timestamp, "received {:02X?}", message);
                // Blocks while the pump is full; fails only once it stopped.
                if sink.send(message.to_vec()).is_err() {
                    debug!("Stream pump stopped, dropping {:02X?}", message);
                }
            },
            (),
        )?;
        Ok(connection)
    }
}

impl MidiIn for NativeInput {
    fn number(&self) -> usize {
        self.info.number
    }

    fn name(&self) -> &str {
        &self.info.name
    }

    fn listen(&mut self, sink: PumpSender) -> Result<()> {
        if self.listening.is_some() {
            return Err(Error::AlreadyRunning {
                number: self.info.number,
                name: self.info.name.clone(),
            });
        }

        let (ready_sender, ready_receiver) = bounded(1);
        let (stop, stop_receiver) = bounded::<()>(1);
        let client_name = self.client_name.clone();
        let info = self.info.clone();

        let thread = thread::Builder::new()
            .name("midi-input-thread".to_string())
            .spawn(move || match Self::connect(&client_name, &info, sink) {
                Ok(connection) => {
                    let _ = ready_sender.send(Ok(()));
                    let _ = stop_receiver.recv();
                    connection.close();
                    debug!("Stopped listening on MIDI in port {}", info);
                }
                Err(e) => {
                    let _ = ready_sender.send(Err(e));
                }
            })?;

        match ready_receiver.recv() {
            Ok(Ok(())) => {
                debug!("Listening on MIDI in port {}", self.info);
                self.listening = Some(InputThread { stop, thread });
                Ok(())
            }
            Ok(Err(e)) => {
                let _ = thread.join();
                Err(e)
            }
            Err(_) => Err(Error::MidiDevice(
                "MIDI input thread exited before connecting".to_string(),
            )),
        }
    }

    fn stop_listening(&mut self) -> Result<()> {
        let Some(listening) = self.listening.take() else {
            return Ok(());
        };
        let _ = listening.stop.send(());
        if listening.thread.join().is_err() {
            warn!("MIDI input thread panicked");
        }
        Ok(())
    }
}

impl Drop for NativeInput {
    fn drop(&mut self) {
        let _ = self.stop_listening();
    }
}
