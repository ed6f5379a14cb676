use log::{debug, trace, warn};

use drum_trigger_core::command::Command;

use crate::input::{Message, Target};
use crate::instance::{Instance, InstanceError, InstanceId};

/// Owns the running instances and routes the host messages to them.
///
/// Transport messages reach every instance whatever the addressing,
/// the rest go to the addressed instance or to all of them.
#[derive(Default)]
pub struct SchedulingContext {
  instances: Vec<Instance>,
}

impl SchedulingContext {
  pub fn new() -> SchedulingContext {
    SchedulingContext::default()
  }

  pub fn subscribe(&mut self, instance: Instance) -> InstanceId {
    let id = instance.id();
    debug!("Subscribing instance {} ({})", instance.name(), id);
    self.instances.push(instance);
    id
  }

  pub fn len(&self) -> usize {
    self.instances.len()
  }

  pub fn is_empty(&self) -> bool {
    self.instances.is_empty()
  }

  pub fn contains(&self, name: &str) -> bool {
    self.find(name).is_some()
  }

  pub fn find(&self, name: &str) -> Option<InstanceId> {
    self
      .instances
      .iter()
      .find(|instance| instance.name() == name)
      .map(Instance::id)
  }

  pub fn send(&self, id: InstanceId, command: Command) -> Result<(), InstanceError> {
    match self.instances.iter().find(|instance| instance.id() == id) {
      Some(instance) => instance.send(command),
      None => Err(InstanceError::Unknown {
        name: id.to_string(),
      }),
    }
  }

  /// Sends the command to every instance, the first failure is returned after trying them all
  pub fn broadcast(&self, command: Command) -> Result<(), InstanceError> {
    trace!("Broadcasting {}", command.selector());
    let mut result = Ok(());
    for instance in self.instances.iter() {
      if let Err(err) = instance.send(command.clone()) {
        if result.is_ok() {
          result = Err(err);
        }
      }
    }
    result
  }

  pub fn dispatch(&self, message: Message) -> Result<(), InstanceError> {
    let Message { target, command } = message;
    if command.is_transport() {
      return self.broadcast(command);
    }

    match target {
      Target::All => self.broadcast(command),
      Target::Instance(name) => match self.find(name.as_str()) {
        Some(id) => self.send(id, command),
        None => Err(InstanceError::Unknown { name }),
      },
    }
  }

  /// Stops every instance, in subscription order
  pub fn stop(self) -> Result<(), InstanceError> {
    let mut result = Ok(());
    for instance in self.instances.into_iter() {
      if let Err(err) = instance.stop() {
        warn!("{}", err);
        if result.is_ok() {
          result = Err(err);
        }
      }
    }
    result
  }
}
