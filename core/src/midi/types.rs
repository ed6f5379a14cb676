/// A 7 bits MIDI data value (pitch or velocity)
pub type U7 = u8;

pub type Key = U7;
pub type Velocity = U7;

pub const MAX_U7: i64 = 127;

/// Number of addressable keys, used to size per-pitch tables
pub const NUM_KEYS: usize = 128;

pub fn u7_from_i64(value: i64) -> Option<U7> {
  if value >= 0 && value <= MAX_U7 {
    Some(value as U7)
  } else {
    None
  }
}

#[cfg(test)]
mod test {

  use super::u7_from_i64;

  #[test]
  pub fn u7_range() {
    assert_eq!(u7_from_i64(0), Some(0));
    assert_eq!(u7_from_i64(127), Some(127));
    assert_eq!(u7_from_i64(128), None);
    assert_eq!(u7_from_i64(-1), None);
  }
}
