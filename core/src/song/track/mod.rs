use std::collections::HashMap;

use log::debug;

use crate::midi::types::Key;
use crate::song::clip::Clip;
use crate::song::note::{Note, NoteKey};

/// A change in the set of sounding notes
#[derive(Debug, PartialEq, Clone, Copy)]
pub enum Transition<'a> {
  Off(&'a Note),
  On(&'a Note),
}

/// Clips in arrival order, the absolute timeline materialized from them
/// and the notes of that timeline that are currently sounding.
#[derive(Debug, Default)]
pub struct Track {
  clips: Vec<Clip>,
  notes: Vec<Note>,
  active: HashMap<NoteKey, Key>,
}

impl Track {
  pub fn new() -> Track {
    Track::default()
  }

  pub fn clips(&self) -> &[Clip] {
    self.clips.as_slice()
  }

  /// Absolute notes sorted by start time
  pub fn notes(&self) -> &[Note] {
    self.notes.as_slice()
  }

  pub fn num_active(&self) -> usize {
    self.active.len()
  }

  pub fn is_active(&self, note: &Note) -> bool {
    self.active.contains_key(&note.note_key())
  }

  /// Appends a clip and rebuilds the timeline.
  /// The notes of the previous clips keep their identity, so the active set stays valid.
  pub fn add_clip(&mut self, clip: Clip) {
    if self.clips.iter().any(|prev| prev.id() == clip.id()) {
      debug!("Clip {} added more than once", clip.id());
    }
    self.clips.push(clip);
    self.rebuild_notes();
  }

  /// Removes every clip and returns the keys of the notes that were active
  pub fn clear_clips(&mut self) -> Vec<Key> {
    self.clips.clear();
    self.notes.clear();
    self.release_all()
  }

  /// Empties the active set and returns the keys of the notes that were in it
  pub fn release_all(&mut self) -> Vec<Key> {
    let mut released: Vec<(NoteKey, Key)> = self.active.drain().collect();
    released.sort();
    released.into_iter().map(|(_, key)| key).collect()
  }

  /// Rebuilds the absolute timeline from scratch, clips in arrival order.
  /// The sort is stable so notes starting together keep their clip order.
  pub fn rebuild_notes(&mut self) {
    let mut notes = Vec::with_capacity(self.notes.len());
    for clip in self.clips.iter() {
      clip.add_to_track_notes(&mut notes);
    }
    notes.sort_by(|a, b| a.start().total_cmp(&b.start()));
    debug!(
      "Track rebuilt with {} notes from {} clips",
      notes.len(),
      self.clips.len()
    );
    self.notes = notes;
  }

  /// Reconciles the active set with `should_play`, reporting every change to `transition`.
  ///
  /// All the notes stopping are reported before any note starting.
  pub fn reconcile<P, T>(&mut self, should_play: P, mut transition: T)
  where
    P: Fn(&Note) -> bool,
    T: FnMut(Transition),
  {
    let notes = &self.notes;
    let active = &mut self.active;

    for note in notes.iter() {
      let note_key = note.note_key();
      if active.contains_key(&note_key) && !should_play(note) {
        active.remove(&note_key);
        transition(Transition::Off(note));
      }
    }

    for note in notes.iter() {
      let note_key = note.note_key();
      if !active.contains_key(&note_key) && should_play(note) {
        active.insert(note_key, note.key());
        transition(Transition::On(note));
      }
    }
  }
}
