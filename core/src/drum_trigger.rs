use std::collections::BTreeMap;
use std::fmt;

use failure::Fail;
use log::debug;

use crate::midi::types::{Key, Velocity, MAX_U7, NUM_KEYS};
use crate::midi::Message;
use crate::time::{BeatsTime, Tempo};

#[derive(Debug, Fail, PartialEq)]
pub enum DrumTriggerError {
  #[fail(display = "Key out of range: {}", key)]
  KeyOutOfRange { key: Key },

  #[fail(display = "Velocity out of range: {}", velocity)]
  VelocityOutOfRange { velocity: Velocity },

  #[fail(display = "Invalid time offset for key {}: {} ms", key, millis)]
  InvalidTimeOffset { key: Key, millis: f64 },
}

/// Maps a note into a trigger for a mechanical instrument
#[derive(Debug, PartialEq, Clone)]
pub struct DrumTrigger {
  name: String,
  key_in: Key,
  key_out: Key,
  velocity_min: Velocity,
  velocity_max: Velocity,
}

impl DrumTrigger {
  pub fn new<T>(
    name: T,
    key_in: Key,
    key_out: Key,
    velocity_min: Velocity,
    velocity_max: Velocity,
  ) -> Result<DrumTrigger, DrumTriggerError>
  where
    T: Into<String>,
  {
    for key in [key_in, key_out].iter() {
      check_key(*key)?;
    }
    for velocity in [velocity_min, velocity_max].iter() {
      if i64::from(*velocity) > MAX_U7 {
        return Err(DrumTriggerError::VelocityOutOfRange {
          velocity: *velocity,
        });
      }
    }

    Ok(DrumTrigger {
      name: name.into(),
      key_in,
      key_out,
      velocity_min,
      velocity_max,
    })
  }

  pub fn name(&self) -> &str {
    self.name.as_str()
  }

  pub fn key_in(&self) -> Key {
    self.key_in
  }

  pub fn key_out(&self) -> Key {
    self.key_out
  }

  pub fn velocity_min(&self) -> Velocity {
    self.velocity_min
  }

  pub fn velocity_max(&self) -> Velocity {
    self.velocity_max
  }

  /// Rescales a note velocity linearly into [velocity_min, velocity_max].
  /// An inverted range rescales downwards.
  pub fn rescale(&self, velocity: Velocity) -> Velocity {
    let min = i64::from(self.velocity_min);
    let max = i64::from(self.velocity_max);
    let velocity = i64::from(velocity).min(MAX_U7);
    (min + (max - min) * velocity / MAX_U7) as Velocity
  }

  pub fn trigger(&self, velocity: Velocity) -> Message {
    Message::Trigger {
      key: self.key_out,
      velocity: self.rescale(velocity),
    }
  }
}

impl fmt::Display for DrumTrigger {
  fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
    write!(
      f,
      "DrumTrigger:({},{},{},{},{})",
      self.name, self.key_in, self.key_out, self.velocity_min, self.velocity_max
    )
  }
}

/// A trigger together with the latency compensation of its key
#[derive(Debug, PartialEq, Clone)]
pub struct DrumTriggerSetup {
  pub trigger: DrumTrigger,
  pub delay_ms: f64,
}

impl DrumTriggerSetup {
  pub fn new(trigger: DrumTrigger, delay_ms: f64) -> DrumTriggerSetup {
    DrumTriggerSetup { trigger, delay_ms }
  }
}

const DEFAULT_DRUM_TRIGGERS: [(&str, Key, Key, Velocity, Velocity, f64); 6] = [
  ("TopDrum", 36, 36, 35, 80, -40.0),
  ("MiddleDrum", 38, 38, 35, 80, -40.0),
  ("Snare", 40, 40, 30, 90, -30.0),
  ("BottomDrum", 41, 41, 35, 80, -40.0),
  ("Cymbal", 49, 49, 40, 100, -25.0),
  ("Bell", 56, 56, 20, 70, -20.0),
];

/// The built-in table loaded by `setup_drum_triggers` when none is configured
pub fn default_drum_triggers() -> Vec<DrumTriggerSetup> {
  DEFAULT_DRUM_TRIGGERS
    .iter()
    .map(
      |(name, key_in, key_out, velocity_min, velocity_max, delay_ms)| DrumTriggerSetup {
        trigger: DrumTrigger {
          name: (*name).to_string(),
          key_in: *key_in,
          key_out: *key_out,
          velocity_min: *velocity_min,
          velocity_max: *velocity_max,
        },
        delay_ms: *delay_ms,
      },
    )
    .collect()
}

/// Drum triggers keyed by incoming key, plus a latency compensation offset per key
pub struct DrumTriggerTable {
  triggers: BTreeMap<Key, DrumTrigger>,
  time_offsets: [f64; NUM_KEYS],
}

impl Default for DrumTriggerTable {
  fn default() -> Self {
    DrumTriggerTable {
      triggers: BTreeMap::new(),
      time_offsets: [0.0; NUM_KEYS],
    }
  }
}

impl DrumTriggerTable {
  pub fn new() -> DrumTriggerTable {
    DrumTriggerTable::default()
  }

  pub fn len(&self) -> usize {
    self.triggers.len()
  }

  pub fn is_empty(&self) -> bool {
    self.triggers.is_empty()
  }

  pub fn get(&self, key: Key) -> Option<&DrumTrigger> {
    self.triggers.get(&key)
  }

  pub fn iter(&self) -> impl Iterator<Item = &DrumTrigger> {
    self.triggers.values()
  }

  /// Inserts or replaces the trigger for its incoming key and sets the key time offset.
  /// Returns the trigger previously set for that key.
  pub fn setup_drum_trigger(
    &mut self,
    trigger: DrumTrigger,
    delay_ms: f64,
  ) -> Result<Option<DrumTrigger>, DrumTriggerError> {
    self.set_time_offset(trigger.key_in, delay_ms)?;
    debug!("Setup {} with {} ms", trigger, delay_ms);
    Ok(self.triggers.insert(trigger.key_in, trigger))
  }

  /// Replaces all the triggers, setting the time offsets of their keys
  pub fn setup_drum_triggers<'a, I>(&mut self, setups: I) -> Result<(), DrumTriggerError>
  where
    I: IntoIterator<Item = &'a DrumTriggerSetup>,
  {
    let setups: Vec<&DrumTriggerSetup> = setups.into_iter().collect();
    for setup in setups.iter() {
      check_time_offset(setup.trigger.key_in, setup.delay_ms)?;
    }

    self.triggers.clear();
    for setup in setups {
      self.setup_drum_trigger(setup.trigger.clone(), setup.delay_ms)?;
    }
    Ok(())
  }

  /// Removes all the triggers. Time offsets are kept.
  pub fn clear_drum_triggers(&mut self) {
    self.triggers.clear();
  }

  pub fn set_time_offset(&mut self, key: Key, millis: f64) -> Result<(), DrumTriggerError> {
    check_time_offset(key, millis)?;
    self.time_offsets[key as usize] = millis;
    Ok(())
  }

  pub fn clear_time_offsets(&mut self) {
    self.time_offsets = [0.0; NUM_KEYS];
  }

  pub fn time_offset(&self, key: Key) -> f64 {
    self.time_offsets.get(key as usize).cloned().unwrap_or(0.0)
  }

  /// Time offset of a key converted into beats at the given tempo
  pub fn offset_beats(&self, key: Key, tempo: Tempo) -> BeatsTime {
    tempo.beats_from_millis(self.time_offset(key))
  }

  /// The trigger message to send along a note on, if the key is mapped
  pub fn trigger_for(&self, key: Key, velocity: Velocity) -> Option<Message> {
    self.get(key).map(|trigger| trigger.trigger(velocity))
  }
}

fn check_key(key: Key) -> Result<(), DrumTriggerError> {
  if (key as usize) < NUM_KEYS {
    Ok(())
  } else {
    Err(DrumTriggerError::KeyOutOfRange { key })
  }
}

fn check_time_offset(key: Key, millis: f64) -> Result<(), DrumTriggerError> {
  check_key(key)?;
  if millis.is_finite() {
    Ok(())
  } else {
    Err(DrumTriggerError::InvalidTimeOffset { key, millis })
  }
}
