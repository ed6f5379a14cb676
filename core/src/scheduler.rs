use failure::Fail;
use log::{debug, info, trace};

use crate::command::{Command, MAX_POSITION_OFFSET};
use crate::config::Config;
use crate::drum_trigger::{DrumTriggerError, DrumTriggerSetup, DrumTriggerTable};
use crate::midi::types::Key;
use crate::midi::{Message, MidiOutput};
use crate::song::{Clip, Note, Track, Transition};
use crate::time::{BeatsTime, Tempo};

#[derive(Debug, Fail, PartialEq)]
pub enum SchedulerError {
  #[fail(display = "Invalid tempo: {}", tempo)]
  InvalidTempo { tempo: f64 },

  #[fail(display = "Invalid position: {}", position)]
  InvalidPosition { position: f64 },

  #[fail(display = "Position offset out of range: {}", offset)]
  PositionOffset { offset: f64 },

  #[fail(display = "Drum trigger setup failed: {}", cause)]
  DrumTrigger {
    #[cause]
    cause: DrumTriggerError,
  },
}

impl From<DrumTriggerError> for SchedulerError {
  fn from(cause: DrumTriggerError) -> Self {
    SchedulerError::DrumTrigger { cause }
  }
}

/// Transport snapshot as seen by one scheduler
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LiveSet {
  tempo: Tempo,
  beats: BeatsTime,
  last_beats: BeatsTime,
  is_playing: bool,
}

impl Default for LiveSet {
  fn default() -> Self {
    LiveSet {
      tempo: Tempo::default(),
      beats: BeatsTime::new(-1.0),
      last_beats: BeatsTime::new(-1.0),
      is_playing: false,
    }
  }
}

impl LiveSet {
  pub fn tempo(&self) -> Tempo {
    self.tempo
  }

  pub fn beats(&self) -> BeatsTime {
    self.beats
  }

  pub fn last_beats(&self) -> BeatsTime {
    self.last_beats
  }

  pub fn is_playing(&self) -> bool {
    self.is_playing
  }

  /// Whether the last position update moved backwards (loop back, rewind or scrubbing)
  pub fn jumped_back(&self) -> bool {
    self.beats < self.last_beats
  }

  fn set_beats(&mut self, beats: BeatsTime) {
    self.last_beats = self.beats;
    self.beats = beats;
  }
}

/// Turns the clips of a track into note and trigger messages as the transport position advances.
///
/// Every position update re-evaluates the whole timeline against the new position,
/// so arbitrary jumps of the transport never produce duplicated or missing transitions.
pub struct Scheduler {
  track: Track,
  drum_triggers: DrumTriggerTable,
  default_drum_triggers: Vec<DrumTriggerSetup>,
  live_set: LiveSet,
  position_offset: BeatsTime,
  muted: bool,
}

impl Default for Scheduler {
  fn default() -> Self {
    Scheduler {
      track: Track::new(),
      drum_triggers: DrumTriggerTable::new(),
      default_drum_triggers: crate::drum_trigger::default_drum_triggers(),
      live_set: LiveSet::default(),
      position_offset: BeatsTime::zero(),
      muted: false,
    }
  }
}

impl Scheduler {
  pub fn new() -> Scheduler {
    Scheduler::default()
  }

  pub fn from_config(config: &Config) -> Result<Scheduler, SchedulerError> {
    let mut scheduler = Scheduler::new();
    scheduler.default_drum_triggers = config.drum_trigger_setups()?;
    scheduler.set_tempo(Tempo::new(config.scheduler.tempo))?;
    scheduler.set_position_offset(config.scheduler.position_offset)?;
    if config.scheduler.setup_drum_triggers {
      scheduler.setup_drum_triggers()?;
    }
    Ok(scheduler)
  }

  pub fn track(&self) -> &Track {
    &self.track
  }

  pub fn drum_triggers(&self) -> &DrumTriggerTable {
    &self.drum_triggers
  }

  pub fn live_set(&self) -> &LiveSet {
    &self.live_set
  }

  pub fn is_muted(&self) -> bool {
    self.muted
  }

  pub fn position_offset(&self) -> BeatsTime {
    self.position_offset
  }

  /// Applies one host command, sending any emitted message to `output`.
  /// A failing command leaves the scheduler untouched.
  pub fn handle<O>(&mut self, command: Command, output: &mut O) -> Result<(), SchedulerError>
  where
    O: MidiOutput + ?Sized,
  {
    trace!("Handling {}", command.selector());
    match command {
      Command::AddClip(clip) => self.add_clip(clip),
      Command::ClearClips => self.clear_clips(output),
      Command::Position(position) => self.set_position(position, output)?,
      Command::Playing(playing) => self.set_playing(playing, output),
      Command::Tempo(tempo) => self.set_tempo(tempo)?,
      Command::Flush => self.flush(output),
      Command::SetTimeOffset { key, millis } => self.drum_triggers.set_time_offset(key, millis)?,
      Command::ClearTimeOffsets => self.drum_triggers.clear_time_offsets(),
      Command::SetupDrumTrigger(setup) => {
        self
          .drum_triggers
          .setup_drum_trigger(setup.trigger, setup.delay_ms)?;
      }
      Command::SetupDrumTriggers => self.setup_drum_triggers()?,
      Command::ClearDrumTriggers => self.drum_triggers.clear_drum_triggers(),
      Command::Mute(muted) => self.set_muted(muted),
      Command::Offset(offset) => self.set_position_offset(offset)?,
      Command::PrintClips => self.print_clips(),
      Command::PrintDrumTriggers => self.print_drum_triggers(),
    }
    Ok(())
  }

  /// Adds a clip. Notes already sounding keep playing.
  pub fn add_clip(&mut self, clip: Clip) {
    debug!("Adding {}", clip);
    self.track.add_clip(clip);
  }

  pub fn clear_clips<O>(&mut self, output: &mut O)
  where
    O: MidiOutput + ?Sized,
  {
    debug!("Clearing {} clips", self.track.clips().len());
    let released = self.track.clear_clips();
    self.send_note_offs(released, output);
  }

  /// Transport tick. The position offset is subtracted from the host position.
  pub fn set_position<O>(&mut self, position: f64, output: &mut O) -> Result<(), SchedulerError>
  where
    O: MidiOutput + ?Sized,
  {
    if !position.is_finite() {
      return Err(SchedulerError::InvalidPosition { position });
    }

    self
      .live_set
      .set_beats(BeatsTime::new(position) - self.position_offset);

    if self.live_set.jumped_back() {
      debug!(
        "Transport jumped back from {} to {}",
        self.live_set.last_beats(),
        self.live_set.beats()
      );
    }

    if !self.muted {
      self.process(output);
    }
    Ok(())
  }

  /// Stopping the transport releases every active note
  pub fn set_playing<O>(&mut self, playing: bool, output: &mut O)
  where
    O: MidiOutput + ?Sized,
  {
    if playing != self.live_set.is_playing {
      debug!("Transport {}", if playing { "started" } else { "stopped" });
    }
    self.live_set.is_playing = playing;
    if !playing {
      self.flush(output);
    }
  }

  pub fn set_tempo(&mut self, tempo: Tempo) -> Result<(), SchedulerError> {
    if !tempo.is_valid() {
      return Err(SchedulerError::InvalidTempo {
        tempo: tempo.get_value(),
      });
    }
    self.live_set.tempo = tempo;
    Ok(())
  }

  pub fn set_position_offset(&mut self, offset: f64) -> Result<(), SchedulerError> {
    if !offset.is_finite() || offset.abs() > MAX_POSITION_OFFSET {
      return Err(SchedulerError::PositionOffset { offset });
    }
    self.position_offset = BeatsTime::new(offset);
    Ok(())
  }

  /// While muted, position updates are not evaluated. Active notes are kept.
  pub fn set_muted(&mut self, muted: bool) {
    self.muted = muted;
  }

  /// Sends a note off for every active note and empties the active set
  pub fn flush<O>(&mut self, output: &mut O)
  where
    O: MidiOutput + ?Sized,
  {
    let released = self.track.release_all();
    if !released.is_empty() {
      debug!("Flushing {} notes", released.len());
    }
    self.send_note_offs(released, output);
  }

  /// Replaces the drum triggers with the default table
  pub fn setup_drum_triggers(&mut self) -> Result<(), SchedulerError> {
    self
      .drum_triggers
      .setup_drum_triggers(&self.default_drum_triggers)?;
    Ok(())
  }

  fn print_clips(&self) {
    info!("Clips:({})", self.track.clips().len());
    for clip in self.track.clips() {
      info!("  {}", clip);
    }
  }

  fn print_drum_triggers(&self) {
    info!("DrumTriggers:({})", self.drum_triggers.len());
    for trigger in self.drum_triggers.iter() {
      info!(
        "  {} {} ms",
        trigger,
        self.drum_triggers.time_offset(trigger.key_in())
      );
    }
  }

  fn process<O>(&mut self, output: &mut O)
  where
    O: MidiOutput + ?Sized,
  {
    let beats = self.live_set.beats;
    let tempo = self.live_set.tempo;
    let drum_triggers = &self.drum_triggers;

    let should_play = |note: &Note| {
      let start = note.start() + drum_triggers.offset_beats(note.key(), tempo);
      start <= beats && beats < start + note.duration()
    };

    self.track.reconcile(should_play, |transition| match transition {
      Transition::Off(note) => output.push(beats, Message::note_off(note.key())),
      Transition::On(note) => {
        output.push(beats, Message::note_on(note.key(), note.velocity()));
        if let Some(trigger) = drum_triggers.trigger_for(note.key(), note.velocity()) {
          output.push(beats, trigger);
        }
      }
    });
  }

  fn send_note_offs<O>(&self, keys: Vec<Key>, output: &mut O)
  where
    O: MidiOutput + ?Sized,
  {
    let beats = self.live_set.beats;
    for key in keys {
      output.push(beats, Message::note_off(key));
    }
  }
}

#[cfg(test)]
mod test {

  use super::{Scheduler, SchedulerError};
  use crate::command::{tokenize, Command};
  use crate::config::Config;
  use crate::midi::buffer::Event;
  use crate::midi::Message;
  use crate::song::{Clip, Note};
  use crate::time::{BeatsTime, Tempo};

  fn beats(value: f64) -> BeatsTime {
    BeatsTime::new(value)
  }

  fn one_note_clip(key: u8, start: f64, duration: f64) -> Clip {
    Clip::builder(1, "clip")
      .placement(beats(0.0), beats(4.0))
      .markers(beats(0.0), beats(4.0))
      .note(Note::new(key, beats(start), beats(duration), 100))
      .build()
      .unwrap()
  }

  fn send(scheduler: &mut Scheduler, line: &str, output: &mut Vec<Event>) {
    let command = Command::parse(&tokenize(line).unwrap()).unwrap();
    scheduler.handle(command, output).unwrap();
  }

  fn tick(scheduler: &mut Scheduler, position: f64) -> Vec<Message> {
    let mut output: Vec<Event> = Vec::new();
    scheduler.set_position(position, &mut output).unwrap();
    output.into_iter().map(|event| event.message).collect()
  }

  #[test]
  /// A single note plays between its start and its end only
  pub fn note_on_and_off() {
    let mut scheduler = Scheduler::new();
    let mut output: Vec<Event> = Vec::new();
    scheduler.add_clip(one_note_clip(36, 1.0, 0.5));
    scheduler.set_playing(true, &mut output);
    assert!(output.is_empty());

    assert!(tick(&mut scheduler, 0.0).is_empty());
    assert_eq!(tick(&mut scheduler, 1.0), vec![Message::note_on(36, 100)]);
    assert!(tick(&mut scheduler, 1.25).is_empty());
    assert_eq!(tick(&mut scheduler, 1.5), vec![Message::note_off(36)]);
    assert!(tick(&mut scheduler, 2.0).is_empty());
  }

  #[test]
  /// Emitted events carry the position they were emitted at
  pub fn events_are_positioned() {
    let mut scheduler = Scheduler::new();
    let mut output: Vec<Event> = Vec::new();
    scheduler.add_clip(one_note_clip(36, 1.0, 0.5));
    scheduler.set_position(1.0, &mut output).unwrap();
    scheduler.set_position(1.5, &mut output).unwrap();
    let positions: Vec<BeatsTime> = output.iter().map(|event| event.position).collect();
    assert_eq!(positions, vec![beats(1.0), beats(1.5)]);
  }

  #[test]
  /// Repeating the same position emits nothing new
  pub fn ticks_are_idempotent() {
    let mut scheduler = Scheduler::new();
    scheduler.add_clip(one_note_clip(36, 1.0, 0.5));

    assert_eq!(tick(&mut scheduler, 1.1).len(), 1);
    assert!(tick(&mut scheduler, 1.1).is_empty());
    assert_eq!(scheduler.track().num_active(), 1);
  }

  #[test]
  /// Jumping around the transport never duplicates nor loses transitions
  pub fn transport_jumps_are_symmetric() {
    let mut scheduler = Scheduler::new();
    let clip = Clip::builder(1, "loop")
      .placement(beats(0.0), beats(16.0))
      .markers(beats(0.0), beats(4.0))
      .looping(true)
      .loop_region(beats(0.0), beats(4.0))
      .note(Note::new(36, beats(0.0), beats(1.0), 100))
      .note(Note::new(38, beats(2.0), beats(1.0), 100))
      .build()
      .unwrap();
    scheduler.add_clip(clip);

    let positions = [0.0, 0.5, 2.5, 0.25, 6.5, 6.5, 13.0, 4.0, 1.0, 8.5, 15.9, 3.0];
    let mut messages = Vec::new();
    for position in positions.iter() {
      messages.extend(tick(&mut scheduler, *position));
    }
    let mut flushed: Vec<Event> = Vec::new();
    scheduler.flush(&mut flushed);
    messages.extend(flushed.into_iter().map(|event| event.message));

    let ons = messages.iter().filter(|m| m.is_note_on()).count();
    let offs = messages.iter().filter(|m| m.is_note_off()).count();
    assert!(ons > 0);
    assert_eq!(ons, offs);
    assert_eq!(scheduler.track().num_active(), 0);
  }

  #[test]
  /// A -500 ms offset at 120 bpm plays the note one beat earlier
  pub fn time_offset_shifts_activation() {
    let mut scheduler = Scheduler::new();
    let mut output: Vec<Event> = Vec::new();
    scheduler.add_clip(one_note_clip(36, 2.0, 0.5));
    send(&mut scheduler, "tempo 120", &mut output);
    send(&mut scheduler, "set_time_offset 36 -500", &mut output);

    assert!(tick(&mut scheduler, 0.9).is_empty());
    assert_eq!(tick(&mut scheduler, 1.0), vec![Message::note_on(36, 100)]);
    assert_eq!(tick(&mut scheduler, 1.5), vec![Message::note_off(36)]);
    assert!(tick(&mut scheduler, 2.0).is_empty());
  }

  #[test]
  /// A mapped key sends a trigger along the note on, never along the note off
  pub fn drum_trigger_on_note_on() {
    let mut scheduler = Scheduler::new();
    let mut output: Vec<Event> = Vec::new();
    send(&mut scheduler, "setup_drum_trigger 36 36 35 80 -40 TopDrum", &mut output);
    scheduler.add_clip(one_note_clip(36, 1.0, 0.5));

    // -40 ms at 120 bpm is 0.08 beats earlier
    assert!(tick(&mut scheduler, 0.9).is_empty());
    assert_eq!(
      tick(&mut scheduler, 0.95),
      vec![
        Message::note_on(36, 100),
        Message::Trigger {
          key: 36,
          // 35 + (80 - 35) * 100 / 127
          velocity: 70
        }
      ]
    );
    assert_eq!(tick(&mut scheduler, 1.45), vec![Message::note_off(36)]);
  }

  #[test]
  /// Unmapped keys pass through without trigger
  pub fn unmapped_key_has_no_trigger() {
    let mut scheduler = Scheduler::new();
    let mut output: Vec<Event> = Vec::new();
    send(&mut scheduler, "setup_drum_triggers", &mut output);
    scheduler.add_clip(one_note_clip(60, 1.0, 0.5));
    assert_eq!(tick(&mut scheduler, 1.0), vec![Message::note_on(60, 100)]);
  }

  #[test]
  /// Stopping the transport and flushing release the active notes
  pub fn stop_flushes() {
    let mut scheduler = Scheduler::new();
    let mut output: Vec<Event> = Vec::new();
    scheduler.add_clip(one_note_clip(36, 1.0, 2.0));
    scheduler.set_playing(true, &mut output);
    assert_eq!(tick(&mut scheduler, 1.5).len(), 1);

    let mut output: Vec<Event> = Vec::new();
    send(&mut scheduler, "playing 0", &mut output);
    let messages: Vec<Message> = output.iter().map(|event| event.message).collect();
    assert_eq!(messages, vec![Message::note_off(36)]);
    assert_eq!(scheduler.track().num_active(), 0);

    let mut output: Vec<Event> = Vec::new();
    send(&mut scheduler, "flush", &mut output);
    assert!(output.is_empty());
  }

  #[test]
  /// A muted scheduler ignores ticks but keeps its active notes
  pub fn mute_suppresses_evaluation() {
    let mut scheduler = Scheduler::new();
    let mut output: Vec<Event> = Vec::new();
    scheduler.add_clip(one_note_clip(36, 1.0, 0.5));
    assert_eq!(tick(&mut scheduler, 1.0).len(), 1);

    send(&mut scheduler, "mute 1", &mut output);
    assert!(output.is_empty());
    assert!(tick(&mut scheduler, 3.0).is_empty());
    assert_eq!(scheduler.track().num_active(), 1);
    assert_eq!(scheduler.live_set().beats(), beats(3.0));

    send(&mut scheduler, "mute 0", &mut output);
    assert_eq!(tick(&mut scheduler, 3.0), vec![Message::note_off(36)]);
  }

  #[test]
  /// The position offset is subtracted from the host position
  pub fn position_offset() {
    let mut scheduler = Scheduler::new();
    let mut output: Vec<Event> = Vec::new();
    send(&mut scheduler, "offset 0.5", &mut output);
    scheduler.add_clip(one_note_clip(36, 1.0, 0.5));

    assert!(tick(&mut scheduler, 1.0).is_empty());
    assert_eq!(tick(&mut scheduler, 1.5), vec![Message::note_on(36, 100)]);
    assert_eq!(scheduler.live_set().beats(), beats(1.0));
  }

  #[test]
  /// Clearing the clips releases the sounding notes
  pub fn clear_clips_releases_notes() {
    let mut scheduler = Scheduler::new();
    scheduler.add_clip(one_note_clip(36, 1.0, 0.5));
    assert_eq!(tick(&mut scheduler, 1.0).len(), 1);

    let mut output: Vec<Event> = Vec::new();
    send(&mut scheduler, "clear_clips", &mut output);
    let messages: Vec<Message> = output.iter().map(|event| event.message).collect();
    assert_eq!(messages, vec![Message::note_off(36)]);
    assert!(tick(&mut scheduler, 1.2).is_empty());
  }

  #[test]
  /// Adding a clip keeps the notes already sounding
  pub fn add_clip_keeps_active_notes() {
    let mut scheduler = Scheduler::new();
    scheduler.add_clip(one_note_clip(36, 1.0, 0.5));
    assert_eq!(tick(&mut scheduler, 1.0).len(), 1);

    let mut output: Vec<Event> = Vec::new();
    send(&mut scheduler, "add_clip 2 other 0 4 8 0 4 0 0 4 38 0 1 90", &mut output);
    assert!(output.is_empty());
    assert!(tick(&mut scheduler, 1.2).is_empty());
    assert_eq!(tick(&mut scheduler, 4.0), vec![Message::note_off(36), Message::note_on(38, 90)]);
  }

  #[test]
  pub fn rejects_invalid_values() {
    let mut scheduler = Scheduler::new();
    let mut output: Vec<Event> = Vec::new();
    assert_eq!(
      scheduler.set_tempo(Tempo::new(-1.0)),
      Err(SchedulerError::InvalidTempo { tempo: -1.0 })
    );
    assert_eq!(scheduler.live_set().tempo(), Tempo::new(120.0));
    assert!(scheduler.set_position(std::f64::NAN, &mut output).is_err());
    assert!(scheduler.set_position_offset(1.5).is_err());
    assert_eq!(scheduler.position_offset(), BeatsTime::zero());
  }

  #[test]
  pub fn from_config() {
    let config = Config::from_str(
      r#"
      [scheduler]
      tempo = 60.0
      setup_drum_triggers = true

      [[drum_triggers]]
      name = "Only"
      pitch_in = 36
      pitch_out = 48
      velocity_min = 0
      velocity_max = 127
      delay_ms = -1000.0
    "#,
    )
    .unwrap();

    let mut scheduler = Scheduler::from_config(&config).unwrap();
    assert_eq!(scheduler.live_set().tempo(), Tempo::new(60.0));
    assert_eq!(scheduler.drum_triggers().len(), 1);

    scheduler.add_clip(one_note_clip(36, 2.0, 0.5));
    assert_eq!(
      tick(&mut scheduler, 1.0),
      vec![
        Message::note_on(36, 100),
        Message::Trigger {
          key: 48,
          velocity: 100
        }
      ]
    );
  }
}
