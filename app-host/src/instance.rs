use std::fmt;
use std::thread;
use std::thread::JoinHandle;

use crossbeam_channel::{Receiver, Sender};
use failure::Fail;
use log::{debug, info, warn};
use uuid::Uuid;

use drum_trigger_core::command::Command;
use drum_trigger_core::midi::Buffer;
use drum_trigger_core::scheduler::Scheduler;

use crate::output::Protocol as OutputProtocol;

#[derive(Debug, Fail)]
pub enum InstanceError {
  #[fail(display = "Failed to create the thread for instance {}: {}", name, cause)]
  Start { name: String, cause: String },

  #[fail(display = "Failed to join the thread for instance {}", name)]
  Stop { name: String },

  #[fail(display = "Instance {} is not receiving messages", name)]
  Send { name: String },

  #[fail(display = "Unknown instance: {}", name)]
  Unknown { name: String },
}

#[derive(Debug, PartialEq, Eq, Hash, Clone, Copy)]
pub struct InstanceId(Uuid);

impl InstanceId {
  pub fn new() -> InstanceId {
    InstanceId(Uuid::new_v4())
  }
}

impl fmt::Display for InstanceId {
  fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
    write!(f, "{}", self.0)
  }
}

pub enum Protocol {
  Stop,

  Command(Command),
}

struct InstanceThread {
  name: String,
  scheduler: Scheduler,
  buffer: Buffer,
  output_tx: Sender<OutputProtocol>,
}

impl InstanceThread {
  const BUFFER_CAPACITY: usize = 256;

  fn new(name: String, scheduler: Scheduler, output_tx: Sender<OutputProtocol>) -> InstanceThread {
    InstanceThread {
      name,
      scheduler,
      buffer: Buffer::with_capacity(Self::BUFFER_CAPACITY),
      output_tx,
    }
  }

  pub fn handle_messages(&mut self, protocol_rx: Receiver<Protocol>) {
    for msg in protocol_rx.iter() {
      match msg {
        Protocol::Stop => {
          self.buffer.reset();
          self.scheduler.flush(&mut self.buffer);
          self.send_output();
          break;
        }

        Protocol::Command(command) => {
          let selector = command.selector();
          self.buffer.reset();
          if let Err(err) = self.scheduler.handle(command, &mut self.buffer) {
            warn!("[{}] {} rejected: {}", self.name, selector, err);
          }
          self.send_output();
        }
      }
    }
    debug!("[{}] Stopped", self.name);
  }

  fn send_output(&mut self) {
    if self.buffer.is_empty() {
      return;
    }

    let events = self.buffer.iter().cloned().collect();
    let output = OutputProtocol::Events {
      instance: self.name.clone(),
      events,
    };
    if self.output_tx.send(output).is_err() {
      warn!(
        "[{}] Output closed, dropping {} events",
        self.name,
        self.buffer.len()
      );
    }
  }
}

/// A scheduler owned by its own thread, fed through a channel
pub struct Instance {
  id: InstanceId,
  name: String,
  handler: JoinHandle<()>,
  protocol_tx: Sender<Protocol>,
}

impl Instance {
  pub fn new(
    name: &str,
    scheduler: Scheduler,
    channel_capacity: usize,
    output_tx: Sender<OutputProtocol>,
  ) -> Result<Instance, InstanceError> {
    let id = InstanceId::new();
    info!("Starting instance {} ({}) ...", name, id);

    let (protocol_tx, protocol_rx) = crossbeam_channel::bounded::<Protocol>(channel_capacity);
    let thread_name = name.to_string();

    thread::Builder::new()
      .name(format!("instance-{}", name))
      .spawn(move || InstanceThread::new(thread_name, scheduler, output_tx).handle_messages(protocol_rx))
      .map_err(|err| InstanceError::Start {
        name: name.to_string(),
        cause: err.to_string(),
      })
      .map(|handler| Instance {
        id,
        name: name.to_string(),
        handler,
        protocol_tx,
      })
  }

  pub fn id(&self) -> InstanceId {
    self.id
  }

  pub fn name(&self) -> &str {
    self.name.as_str()
  }

  pub fn send(&self, command: Command) -> Result<(), InstanceError> {
    self
      .protocol_tx
      .send(Protocol::Command(command))
      .map_err(|_| InstanceError::Send {
        name: self.name.clone(),
      })
  }

  /// Releases the active notes and joins the thread
  pub fn stop(self) -> Result<(), InstanceError> {
    info!("Stopping instance {} ...", self.name);

    let name = self.name;
    let handler = self.handler;
    self
      .protocol_tx
      .send(Protocol::Stop)
      .map_err(|_| InstanceError::Stop { name: name.clone() })
      .and_then(|()| handler.join().map_err(|_| InstanceError::Stop { name }))
  }
}

#[cfg(test)]
mod test {

  use super::{Instance, InstanceId};
  use crate::output::Protocol as OutputProtocol;
  use drum_trigger_core::command::{tokenize, Command};
  use drum_trigger_core::midi::Message;
  use drum_trigger_core::scheduler::Scheduler;

  fn command(line: &str) -> Command {
    Command::parse(&tokenize(line).unwrap()).unwrap()
  }

  #[test]
  pub fn ids_are_unique() {
    assert_ne!(InstanceId::new(), InstanceId::new());
  }

  #[test]
  /// Commands are applied in order and the notes left sounding are released on stop
  pub fn emits_events_and_flushes_on_stop() {
    let (output_tx, output_rx) = crossbeam_channel::unbounded();
    let instance = Instance::new("main", Scheduler::new(), 16, output_tx).unwrap();
    assert_eq!(instance.name(), "main");

    instance
      .send(command("add_clip 1 clip 0 0 4 0 4 0 0 4 36 1 2 100"))
      .unwrap();
    instance.send(command("number 0.5")).unwrap();
    instance.send(command("number 1.5")).unwrap();
    instance.stop().unwrap();

    let mut lines = Vec::new();
    for output in output_rx.try_iter() {
      match output {
        OutputProtocol::Events { instance, events } => {
          for event in events {
            lines.push((instance.clone(), event.message));
          }
        }
        OutputProtocol::Stop => {}
      }
    }

    assert_eq!(
      lines,
      vec![
        ("main".to_string(), Message::note_on(36, 100)),
        ("main".to_string(), Message::note_off(36)),
      ]
    );
  }
}
