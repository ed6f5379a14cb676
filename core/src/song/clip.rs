use std::fmt;

use failure::Fail;

use crate::song::note::Note;
use crate::time::BeatsTime;

pub type ClipId = i64;

/// Upper bound on the loop copies of a clip note
pub const MAX_LOOP_REPETITIONS: u32 = 4096;

#[derive(Debug, Fail, PartialEq)]
pub enum ClipError {
  #[fail(display = "Clip {} has a non finite {}", id, field)]
  NotFinite { id: ClipId, field: &'static str },

  #[fail(display = "Clip {} ends at {} before it starts at {}", id, end, start)]
  EndBeforeStart { id: ClipId, start: f64, end: f64 },

  #[fail(display = "Clip {} has an empty or negative loop [{}, {})", id, start, end)]
  EmptyLoop { id: ClipId, start: f64, end: f64 },

  #[fail(display = "Clip {} has a note with a non positive duration {}", id, duration)]
  NoteDuration { id: ClipId, duration: f64 },

  #[fail(display = "Clip {} has a note with a non finite start", id)]
  NoteStart { id: ClipId },

  #[fail(display = "Clip {} loops too many times: {}", id, count)]
  TooManyRepetitions { id: ClipId, count: f64 },
}

/// A placed, windowed and optionally looping pattern of notes.
///
/// Clip times (`start_time`, `end_time`) are absolute track positions while
/// markers, loop bounds and note starts are relative to the clip content.
#[derive(Debug, Clone)]
pub struct Clip {
  id: ClipId,
  name: String,
  muted: bool,
  start_time: BeatsTime,
  end_time: BeatsTime,
  start_marker: BeatsTime,
  end_marker: BeatsTime,
  looping: bool,
  loop_start: BeatsTime,
  loop_end: BeatsTime,
  notes: Vec<Note>,
}

impl Clip {
  pub fn builder<T>(id: ClipId, name: T) -> ClipBuilder
  where
    T: Into<String>,
  {
    ClipBuilder::new(id, name)
  }

  pub fn id(&self) -> ClipId {
    self.id
  }

  pub fn name(&self) -> &str {
    self.name.as_str()
  }

  pub fn is_muted(&self) -> bool {
    self.muted
  }

  pub fn start_time(&self) -> BeatsTime {
    self.start_time
  }

  pub fn end_time(&self) -> BeatsTime {
    self.end_time
  }

  pub fn start_marker(&self) -> BeatsTime {
    self.start_marker
  }

  pub fn end_marker(&self) -> BeatsTime {
    self.end_marker
  }

  pub fn is_looping(&self) -> bool {
    self.looping
  }

  pub fn loop_start(&self) -> BeatsTime {
    self.loop_start
  }

  pub fn loop_end(&self) -> BeatsTime {
    self.loop_end
  }

  pub fn notes(&self) -> &[Note] {
    self.notes.as_slice()
  }

  /// Length of the clip once placed on the track
  pub fn duration(&self) -> BeatsTime {
    self.end_time - self.start_time
  }

  pub fn loop_duration(&self) -> BeatsTime {
    self.loop_end - self.loop_start
  }

  /// Clip time played from the start marker until the loop end is reached for the first time
  pub fn time_before_loop(&self) -> BeatsTime {
    self.loop_end - self.start_marker
  }

  /// How many times the loop body fits after the first pass, possibly fractional or negative
  pub fn loop_count(&self) -> f64 {
    f64::from(self.duration() - self.time_before_loop()) / f64::from(self.loop_duration())
  }

  /// Number of loop copies emitted for a note inside the loop region
  pub fn loop_repetitions(&self) -> u32 {
    if !self.looping {
      return 0;
    }
    let count = self.loop_count().ceil();
    if count > 0.0 {
      count.min(f64::from(u32::max_value())) as u32
    } else {
      0
    }
  }

  pub fn in_loop_region(&self, time: BeatsTime) -> bool {
    self.loop_start <= time && time < self.loop_end
  }

  /// Appends to `track_notes` every note of this clip that should sound,
  /// translated into absolute track time and unrolled over the loop repetitions.
  pub fn add_to_track_notes(&self, track_notes: &mut Vec<Note>) {
    if self.muted {
      return;
    }

    let duration = self.duration();
    let time_before_loop = self.time_before_loop();

    for note in self.notes.iter().filter(|note| !note.is_muted()) {
      let note_start = note.start();
      if note_start.is_negative() || note_start >= duration {
        continue;
      }

      let adjusted_start = note_start - self.start_marker;
      if adjusted_start.is_negative() {
        continue;
      }

      // notes after the loop end only exist inside the loop body
      if self.looping && adjusted_start >= time_before_loop {
        continue;
      }

      let start = self.start_time + adjusted_start;
      track_notes.push(note.placed_at(start, 0));

      if self.looping && self.in_loop_region(note_start) {
        let loop_duration = self.loop_duration();
        for repetition in 1..=self.loop_repetitions() {
          let repeated_start = start + loop_duration * f64::from(repetition);
          if repeated_start >= self.end_time {
            break;
          }
          track_notes.push(note.placed_at(repeated_start, repetition));
        }
      }
    }
  }
}

impl fmt::Display for Clip {
  fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
    write!(
      f,
      "Clip:({},{},{},{},{},{},{},{},{},{},{})",
      self.id,
      self.name,
      self.muted,
      self.start_time,
      self.end_time,
      self.start_marker,
      self.end_marker,
      self.looping,
      self.loop_start,
      self.loop_end,
      self.notes.len()
    )
  }
}

#[derive(Debug, Clone)]
pub struct ClipBuilder {
  id: ClipId,
  name: String,
  muted: bool,
  start_time: BeatsTime,
  end_time: BeatsTime,
  start_marker: BeatsTime,
  end_marker: BeatsTime,
  looping: bool,
  loop_start: BeatsTime,
  loop_end: BeatsTime,
  notes: Vec<Note>,
}

impl ClipBuilder {
  pub fn new<T>(id: ClipId, name: T) -> ClipBuilder
  where
    T: Into<String>,
  {
    ClipBuilder {
      id,
      name: name.into(),
      muted: false,
      start_time: BeatsTime::zero(),
      end_time: BeatsTime::zero(),
      start_marker: BeatsTime::zero(),
      end_marker: BeatsTime::zero(),
      looping: false,
      loop_start: BeatsTime::zero(),
      loop_end: BeatsTime::zero(),
      notes: Vec::new(),
    }
  }

  pub fn muted(self, muted: bool) -> ClipBuilder {
    ClipBuilder { muted, ..self }
  }

  pub fn placement(self, start_time: BeatsTime, end_time: BeatsTime) -> ClipBuilder {
    ClipBuilder {
      start_time,
      end_time,
      ..self
    }
  }

  pub fn markers(self, start_marker: BeatsTime, end_marker: BeatsTime) -> ClipBuilder {
    ClipBuilder {
      start_marker,
      end_marker,
      ..self
    }
  }

  pub fn looping(self, looping: bool) -> ClipBuilder {
    ClipBuilder { looping, ..self }
  }

  pub fn loop_region(self, loop_start: BeatsTime, loop_end: BeatsTime) -> ClipBuilder {
    ClipBuilder {
      loop_start,
      loop_end,
      ..self
    }
  }

  pub fn note(mut self, note: Note) -> ClipBuilder {
    self.notes.push(note);
    self
  }

  pub fn notes<I>(mut self, notes: I) -> ClipBuilder
  where
    I: IntoIterator<Item = Note>,
  {
    self.notes.extend(notes);
    self
  }

  pub fn build(self) -> Result<Clip, ClipError> {
    let id = self.id;

    let times = [
      ("start_time", self.start_time),
      ("end_time", self.end_time),
      ("start_marker", self.start_marker),
      ("end_marker", self.end_marker),
      ("loop_start", self.loop_start),
      ("loop_end", self.loop_end),
    ];
    if let Some(&(field, _)) = times.iter().find(|(_, time)| !time.is_finite()) {
      return Err(ClipError::NotFinite { id, field });
    }

    if self.end_time < self.start_time {
      return Err(ClipError::EndBeforeStart {
        id,
        start: self.start_time.into(),
        end: self.end_time.into(),
      });
    }

    if self.looping && self.loop_end <= self.loop_start {
      return Err(ClipError::EmptyLoop {
        id,
        start: self.loop_start.into(),
        end: self.loop_end.into(),
      });
    }

    for note in self.notes.iter() {
      if !note.start().is_finite() {
        return Err(ClipError::NoteStart { id });
      }
      let duration = note.duration();
      if !duration.is_finite() || duration <= BeatsTime::zero() {
        return Err(ClipError::NoteDuration {
          id,
          duration: duration.into(),
        });
      }
    }

    let clip = Clip {
      id: self.id,
      name: self.name,
      muted: self.muted,
      start_time: self.start_time,
      end_time: self.end_time,
      start_marker: self.start_marker,
      end_marker: self.end_marker,
      looping: self.looping,
      loop_start: self.loop_start,
      loop_end: self.loop_end,
      notes: self.notes,
    };

    let count = clip.loop_count().ceil();
    if clip.looping && count > f64::from(MAX_LOOP_REPETITIONS) {
      return Err(ClipError::TooManyRepetitions { id, count });
    }

    Ok(clip)
  }
}
