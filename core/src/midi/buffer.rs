use crate::midi::io::MidiOutput;
use crate::midi::messages::Message;
use crate::time::BeatsTime;

#[derive(Debug, PartialEq, Clone, Copy)]
pub struct Event {
  pub position: BeatsTime,
  pub message: Message,
}

#[derive(Debug, Default)]
pub struct Buffer {
  events: Vec<Event>,
}

impl Buffer {
  pub fn new() -> Buffer {
    Buffer { events: Vec::new() }
  }

  pub fn with_capacity(capacity: usize) -> Buffer {
    Buffer {
      events: Vec::with_capacity(capacity),
    }
  }

  pub fn reset(&mut self) -> &mut Self {
    self.events.clear();
    self
  }

  pub fn len(&self) -> usize {
    self.events.len()
  }

  pub fn is_empty(&self) -> bool {
    self.events.is_empty()
  }

  pub fn iter(&self) -> impl Iterator<Item = &Event> {
    self.events.iter()
  }
}

impl MidiOutput for Buffer {
  fn push(&mut self, position: BeatsTime, message: Message) {
    self.events.push(Event { position, message });
  }
}
