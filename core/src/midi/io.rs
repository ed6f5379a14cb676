use crate::midi::buffer::Event;
use crate::midi::messages::Message;
use crate::time::BeatsTime;

/// Where the scheduler sends the messages it emits
pub trait MidiOutput {
  fn push(&mut self, position: BeatsTime, message: Message);
}

impl MidiOutput for Vec<Event> {
  fn push(&mut self, position: BeatsTime, message: Message) {
    Vec::push(self, Event { position, message });
  }
}
