use std::fmt;

use super::types::{Key, Velocity};

#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum Message {
  /// A note passed through to the host. Velocity 0 means note off.
  Note { key: Key, velocity: Velocity },

  /// A drum trigger fired alongside a note on
  Trigger { key: Key, velocity: Velocity },
}

impl Message {
  pub fn note_on(key: Key, velocity: Velocity) -> Message {
    Message::Note { key, velocity }
  }

  pub fn note_off(key: Key) -> Message {
    Message::Note { key, velocity: 0 }
  }

  pub fn is_note_on(&self) -> bool {
    match self {
      Message::Note { velocity, .. } => *velocity > 0,
      _ => false,
    }
  }

  pub fn is_note_off(&self) -> bool {
    match self {
      Message::Note { velocity, .. } => *velocity == 0,
      _ => false,
    }
  }

  pub fn key(&self) -> Key {
    match self {
      Message::Note { key, .. } | Message::Trigger { key, .. } => *key,
    }
  }
}

impl fmt::Display for Message {
  fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
    match self {
      Message::Note { key, velocity } => write!(f, "note {} {}", key, velocity),
      Message::Trigger { key, velocity } => write!(f, "trig {} {}", key, velocity),
    }
  }
}

#[cfg(test)]
mod test {

  use super::Message;

  #[test]
  pub fn note_on_off() {
    assert!(Message::note_on(36, 100).is_note_on());
    assert!(Message::note_off(36).is_note_off());
    assert!(!Message::Trigger { key: 36, velocity: 0 }.is_note_off());
  }

  #[test]
  pub fn display() {
    assert_eq!(Message::note_on(36, 100).to_string(), "note 36 100");
    assert_eq!(Message::note_off(36).to_string(), "note 36 0");
    assert_eq!(Message::Trigger { key: 38, velocity: 70 }.to_string(), "trig 38 70");
  }
}
