use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

use crate::midi::types::{Key, Velocity};
use crate::time::BeatsTime;

static NEXT_NOTE_ID: AtomicU64 = AtomicU64::new(1);

/// Process wide unique and monotonically increasing note identifier
#[derive(Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Clone, Copy)]
pub struct NoteId(u64);

impl NoteId {
  pub fn next() -> NoteId {
    NoteId(NEXT_NOTE_ID.fetch_add(1, Ordering::Relaxed))
  }

  pub fn units(&self) -> u64 {
    self.0
  }
}

/// Identity of a note instance in the track timeline.
///
/// Loop repetitions of a clip note share its id, so the repetition index
/// tells them apart. Rebuilding the timeline from the same clips yields the same keys.
#[derive(Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Clone, Copy)]
pub struct NoteKey {
  pub id: NoteId,
  pub repetition: u32,
}

#[derive(Debug, PartialEq, Clone, Copy)]
pub struct Note {
  id: NoteId,
  repetition: u32,
  key: Key,
  start: BeatsTime,
  duration: BeatsTime,
  velocity: Velocity,
  mute: bool,
}

impl Note {
  pub fn new(key: Key, start: BeatsTime, duration: BeatsTime, velocity: Velocity) -> Note {
    Note {
      id: NoteId::next(),
      repetition: 0,
      key,
      start,
      duration,
      velocity,
      mute: false,
    }
  }

  pub fn muted(self, mute: bool) -> Note {
    Note { mute, ..self }
  }

  /// Copy of this note placed at an absolute position of the track
  pub fn placed_at(&self, start: BeatsTime, repetition: u32) -> Note {
    Note {
      start,
      repetition,
      ..*self
    }
  }

  pub fn id(&self) -> NoteId {
    self.id
  }

  pub fn repetition(&self) -> u32 {
    self.repetition
  }

  pub fn note_key(&self) -> NoteKey {
    NoteKey {
      id: self.id,
      repetition: self.repetition,
    }
  }

  pub fn key(&self) -> Key {
    self.key
  }

  pub fn start(&self) -> BeatsTime {
    self.start
  }

  pub fn duration(&self) -> BeatsTime {
    self.duration
  }

  pub fn end(&self) -> BeatsTime {
    self.start + self.duration
  }

  pub fn velocity(&self) -> Velocity {
    self.velocity
  }

  pub fn is_muted(&self) -> bool {
    self.mute
  }
}

impl fmt::Display for Note {
  fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
    write!(
      f,
      "Note:({},{},{},{},{})",
      self.key, self.start, self.duration, self.velocity, self.mute
    )
  }
}
