use crate::time::BeatsTime;

pub const DEFAULT_TEMPO: f64 = 120.0;

const MILLIS_PER_MINUTE: f64 = 60_000.0;

/// Tempo in beats per minute
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Tempo(f64);

impl Tempo {
  pub fn new(bpm: f64) -> Tempo {
    Tempo(bpm)
  }

  pub fn get_value(&self) -> f64 {
    self.0
  }

  pub fn is_valid(&self) -> bool {
    self.0.is_finite() && self.0 > 0.0
  }

  /// Converts a duration in milliseconds into beats at this tempo.
  /// Negative durations stay negative.
  pub fn beats_from_millis(&self, millis: f64) -> BeatsTime {
    BeatsTime::new(millis * self.0 / MILLIS_PER_MINUTE)
  }
}

impl Default for Tempo {
  fn default() -> Tempo {
    Tempo(DEFAULT_TEMPO)
  }
}

impl From<Tempo> for f64 {
  fn from(item: Tempo) -> Self {
    item.0
  }
}
