//! Out port backed by a child `midicat out` process.
//!
//! - Open: spawn the child in its own process group, stdin piped
//! - Write: bytes go into the pipe, the child writes them to the hardware
//! - Close: drop the pipe (EOF for the child), then kill it
//!
//! The child is isolated from the parent's process group so that an
//! interrupt aimed at the parent leaves it running until the parent has
//! written its final bytes (e.g. note offs) and closes the port itself.

use super::registry::PortRegistry;
use crate::driver::MidiOut;
use crate::error::{Error, Result};
use crate::selector::PortInfo;
use parking_lot::{Mutex, RwLock};
use std::ffi::OsString;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::process::{Child, ChildStdin, Command, Stdio};
use std::sync::Arc;
use tracing::{debug, warn};

/// How to start a child process: the program plus arguments placed before
/// the subcommand.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChildCommand {
    program: PathBuf,
    leading_args: Vec<OsString>,
}

impl ChildCommand {
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
            leading_args: Vec::new(),
        }
    }

    /// The running executable, so the child speaks the same protocol.
    pub fn current_exe() -> Result<Self> {
        Ok(Self::new(std::env::current_exe()?))
    }

    pub fn arg(mut self, arg: impl Into<OsString>) -> Self {
        self.leading_args.push(arg.into());
        self
    }

    pub fn program(&self) -> &Path {
        &self.program
    }

    pub(crate) fn command(&self) -> Command {
        let mut command = Command::new(&self.program);
        command.args(&self.leading_args);
        command
    }
}

#[cfg(unix)]
fn isolate_process_group(command: &mut Command) {
    use std::os::unix::process::CommandExt;
    command.process_group(0);
}

#[cfg(windows)]
fn isolate_process_group(command: &mut Command) {
    use std::os::windows::process::CommandExt;
    const CREATE_NEW_PROCESS_GROUP: u32 = 0x0000_0200;
    command.creation_flags(CREATE_NEW_PROCESS_GROUP);
}

#[cfg(not(any(unix, windows)))]
fn isolate_process_group(_command: &mut Command) {}

/// The pipe exists exactly when the process does. Writers hold their own
/// handle to it, so closing never waits for a write in flight.
enum PortState {
    Closed,
    Open { child: Child, pipe: Arc<ChildStdin> },
}

pub(super) struct PortInner {
    info: PortInfo,
    command: ChildCommand,
    registry: PortRegistry,
    state: RwLock<PortState>,
    /// Serializes writes so messages from concurrent writers don't interleave.
    write_lock: Mutex<()>,
}

impl Drop for PortInner {
    fn drop(&mut self) {
        let state = std::mem::replace(self.state.get_mut(), PortState::Closed);
        if let PortState::Open { mut child, pipe } = state {
            drop(pipe);
            let _ = child.kill();
            let _ = child.wait();
        }
    }
}

/// Cheap to clone; clones share the same child process.
#[derive(Clone)]
pub struct VirtualPort {
    inner: Arc<PortInner>,
}

impl VirtualPort {
    pub fn new(info: PortInfo, command: ChildCommand, registry: PortRegistry) -> Self {
        Self {
            inner: Arc::new(PortInner {
                info,
                command,
                registry,
                state: RwLock::new(PortState::Closed),
                write_lock: Mutex::new(()),
            }),
        }
    }

    pub(super) fn from_inner(inner: Arc<PortInner>) -> Self {
        Self { inner }
    }

    pub fn info(&self) -> &PortInfo {
        &self.inner.info
    }

    /// Process id of the child while the port is open.
    pub fn pid(&self) -> Option<u32> {
        match &*self.inner.state.read() {
            PortState::Open { child, .. } => Some(child.id()),
            PortState::Closed => None,
        }
    }

    fn spawn_child(&self) -> io::Result<(Child, ChildStdin)> {
        let info = &self.inner.info;
        let mut command = self.inner.command.command();
        command
            .arg("out")
            .arg(format!("--index={}", info.number))
            .arg(format!("--name={}", info.name))
            .stdin(Stdio::piped());
        isolate_process_group(&mut command);

        let mut child = command.spawn()?;
        match child.stdin.take() {
            Some(pipe) => Ok((child, pipe)),
            None => {
                let _ = child.kill();
                let _ = child.wait();
                Err(io::Error::other("child stdin is not piped"))
            }
        }
    }
}

impl MidiOut for VirtualPort {
    fn open(&self) -> Result<()> {
        let mut state = self.inner.state.write();
        if let PortState::Open { .. } = *state {
            return Err(Error::AlreadyRunning {
                number: self.inner.info.number,
                name: self.inner.info.name.clone(),
            });
        }

        let (child, pipe) = self.spawn_child().map_err(|source| Error::Spawn {
            number: self.inner.info.number,
            name: self.inner.info.name.clone(),
            source,
        })?;

        debug!(
            "Opened MIDI out port {} as process {}",
            self.inner.info,
            child.id()
        );
        *state = PortState::Open {
            child,
            pipe: Arc::new(pipe),
        };

        // Registered while the state lock is still held: port lock, then registry lock.
        self.inner.registry.register(&self.inner);
        Ok(())
    }

    fn close(&self) -> Result<()> {
        if !self.is_open() {
            return Ok(());
        }

        let mut state = self.inner.state.write();
        let PortState::Open { mut child, pipe } = std::mem::replace(&mut *state, PortState::Closed)
        else {
            return Ok(());
        };

        drop(pipe);
        let pid = child.id();
        let killed = child.kill();
        if killed.is_ok() {
            let _ = child.wait();
        }
        drop(state);

        killed.map_err(|source| {
            warn!("could not terminate process {}: {}", pid, source);
            Error::Terminate {
                number: self.inner.info.number,
                name: self.inner.info.name.clone(),
                source,
            }
        })?;

        debug!("Closed MIDI out port {} (process {})", self.inner.info, pid);
        Ok(())
    }

    fn is_open(&self) -> bool {
        matches!(*self.inner.state.read(), PortState::Open { .. })
    }

    fn write(&self, bytes: &[u8]) -> Result<usize> {
        let _writing = self.inner.write_lock.lock();
        let handle = match &*self.inner.state.read() {
            PortState::Open { pipe, .. } => Arc::clone(pipe),
            PortState::Closed => return Err(Error::PortClosed),
        };

        // Blocks while the child isn't reading. A concurrent close kills the
        // child, which breaks the pipe and ends the write.
        let mut pipe = &*handle;
        if let Err(e) = pipe.write_all(bytes).and_then(|_| pipe.flush()) {
            warn!(
                "could not write {:02X?} to port {:?}: {}",
                bytes, self.inner.info.name, e
            );
            return Err(e.into());
        }
        Ok(bytes.len())
    }

    fn number(&self) -> usize {
        self.inner.info.number
    }

    fn name(&self) -> &str {
        &self.inner.info.name
    }
}

impl std::fmt::Debug for VirtualPort {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VirtualPort")
            .field("info", &self.inner.info)
            .field("pid", &self.pid())
            .finish()
    }
}
