use std::{
  cmp::Ordering,
  fmt,
  ops::{Add, AddAssign, Mul, Sub, SubAssign},
};

/// A position or a duration measured in (fractional) beats
#[derive(Debug, PartialEq, PartialOrd, Copy, Clone, Default)]
pub struct BeatsTime(f64);

impl BeatsTime {
  pub fn new(beats: f64) -> BeatsTime {
    BeatsTime(beats)
  }

  pub fn zero() -> BeatsTime {
    BeatsTime(0.0)
  }

  pub fn units(&self) -> f64 {
    self.0
  }

  pub fn is_finite(&self) -> bool {
    self.0.is_finite()
  }

  pub fn is_negative(&self) -> bool {
    self.0 < 0.0
  }

  /// Total order over beats, NaN sorting last.
  pub fn total_cmp(&self, other: &BeatsTime) -> Ordering {
    self.0.partial_cmp(&other.0).unwrap_or_else(|| {
      match (self.0.is_nan(), other.0.is_nan()) {
        (true, false) => Ordering::Greater,
        (false, true) => Ordering::Less,
        _ => Ordering::Equal,
      }
    })
  }
}

impl fmt::Display for BeatsTime {
  fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
    write!(f, "{}", self.0)
  }
}

impl Add for BeatsTime {
  type Output = BeatsTime;
  fn add(self, rhs: BeatsTime) -> Self {
    BeatsTime::new(self.0 + rhs.0)
  }
}

impl AddAssign for BeatsTime {
  fn add_assign(&mut self, rhs: BeatsTime) {
    *self = *self + rhs;
  }
}

impl Sub for BeatsTime {
  type Output = BeatsTime;
  fn sub(self, rhs: BeatsTime) -> Self {
    BeatsTime::new(self.0 - rhs.0)
  }
}

impl SubAssign for BeatsTime {
  fn sub_assign(&mut self, rhs: BeatsTime) {
    *self = *self - rhs;
  }
}

impl Mul<f64> for BeatsTime {
  type Output = BeatsTime;
  fn mul(self, rhs: f64) -> Self {
    BeatsTime::new(self.0 * rhs)
  }
}

impl From<BeatsTime> for f64 {
  fn from(item: BeatsTime) -> Self {
    item.0
  }
}

impl From<f64> for BeatsTime {
  fn from(item: f64) -> Self {
    BeatsTime(item)
  }
}
