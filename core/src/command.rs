//! Host control messages: a selector followed by a list of atoms.

use std::fmt;

use failure::Fail;

use crate::drum_trigger::{DrumTrigger, DrumTriggerError, DrumTriggerSetup};
use crate::midi::types::{u7_from_i64, Key, U7};
use crate::song::{Clip, ClipError, ClipId, Note};
use crate::time::{BeatsTime, Tempo};

const CLIP_HEADER_ATOMS: usize = 10;
const CLIP_NOTE_ATOMS: usize = 4;

pub const MAX_POSITION_OFFSET: f64 = 1.0;

#[derive(Debug, Fail, PartialEq)]
pub enum CommandError {
  #[fail(display = "Empty message")]
  Empty,

  #[fail(display = "Unterminated quote in: {}", line)]
  UnterminatedQuote { line: String },

  #[fail(display = "Unknown message: {}", selector)]
  UnknownSelector { selector: String },

  #[fail(
    display = "Message {} expects {} arguments but got {}",
    selector, expected, found
  )]
  Arity {
    selector: String,
    expected: String,
    found: usize,
  },

  #[fail(display = "Message {}: argument {} should be {}", selector, index, expected)]
  AtomType {
    selector: String,
    index: usize,
    expected: &'static str,
  },

  #[fail(display = "Message {}: {} out of range: {}", selector, field, value)]
  OutOfRange {
    selector: String,
    field: &'static str,
    value: String,
  },

  #[fail(display = "Invalid clip: {}", cause)]
  Clip {
    #[cause]
    cause: ClipError,
  },

  #[fail(display = "Invalid drum trigger: {}", cause)]
  DrumTrigger {
    #[cause]
    cause: DrumTriggerError,
  },
}

/// Numeric atoms keep the token they were read from
#[derive(Debug, PartialEq, Clone)]
pub enum Atom {
  Int(i64, String),
  Float(f64, String),
  Symbol(String),
}

impl Atom {
  /// Numbers become Int or Float atoms, anything else is a Symbol
  pub fn parse(token: &str) -> Atom {
    let numeric = token
      .chars()
      .next()
      .map_or(false, |c| c.is_ascii_digit() || c == '-' || c == '+' || c == '.');

    if numeric {
      if let Ok(value) = token.parse::<i64>() {
        return Atom::Int(value, token.to_string());
      }
      if let Ok(value) = token.parse::<f64>() {
        return Atom::Float(value, token.to_string());
      }
    }
    Atom::Symbol(token.to_string())
  }

  pub fn as_f64(&self) -> Option<f64> {
    match self {
      Atom::Int(value, _) => Some(*value as f64),
      Atom::Float(value, _) => Some(*value),
      Atom::Symbol(_) => None,
    }
  }

  /// Floats with no fractional part are accepted as integers
  pub fn as_i64(&self) -> Option<i64> {
    match self {
      Atom::Int(value, _) => Some(*value),
      Atom::Float(value, _) if value.fract() == 0.0 && value.is_finite() => Some(*value as i64),
      _ => None,
    }
  }

  pub fn as_bool(&self) -> Option<bool> {
    self.as_f64().map(|value| value != 0.0)
  }
}

impl Atom {
  /// The text of the token, as written
  pub fn text(&self) -> &str {
    match self {
      Atom::Int(_, text) | Atom::Float(_, text) | Atom::Symbol(text) => text.as_str(),
    }
  }
}

impl fmt::Display for Atom {
  fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
    write!(f, "{}", self.text())
  }
}

/// Splits a line into atoms. Double quotes group a symbol containing spaces.
pub fn tokenize(line: &str) -> Result<Vec<Atom>, CommandError> {
  let mut atoms = Vec::new();
  let mut chars = line.chars().peekable();

  while let Some(&c) = chars.peek() {
    if c.is_whitespace() {
      chars.next();
    } else if c == '"' {
      chars.next();
      let mut symbol = String::new();
      let mut closed = false;
      for c in chars.by_ref() {
        if c == '"' {
          closed = true;
          break;
        }
        symbol.push(c);
      }
      if !closed {
        return Err(CommandError::UnterminatedQuote {
          line: line.to_string(),
        });
      }
      atoms.push(Atom::Symbol(symbol));
    } else {
      let mut token = String::new();
      while let Some(&c) = chars.peek() {
        if c.is_whitespace() {
          break;
        }
        token.push(c);
        chars.next();
      }
      atoms.push(Atom::parse(token.as_str()));
    }
  }

  Ok(atoms)
}

#[derive(Debug, Clone)]
pub enum Command {
  AddClip(Clip),
  ClearClips,
  Position(f64),
  Playing(bool),
  Tempo(Tempo),
  Flush,
  SetTimeOffset { key: Key, millis: f64 },
  ClearTimeOffsets,
  SetupDrumTrigger(DrumTriggerSetup),
  SetupDrumTriggers,
  ClearDrumTriggers,
  Mute(bool),
  Offset(f64),
  PrintClips,
  PrintDrumTriggers,
}

impl Command {
  /// Parses a whole message, the first atom being the selector
  pub fn parse(atoms: &[Atom]) -> Result<Command, CommandError> {
    match atoms.split_first() {
      Some((Atom::Symbol(selector), args)) => Command::from_atoms(selector.as_str(), args),
      Some((atom, _)) => Err(CommandError::UnknownSelector {
        selector: atom.to_string(),
      }),
      None => Err(CommandError::Empty),
    }
  }

  pub fn from_atoms(selector: &str, atoms: &[Atom]) -> Result<Command, CommandError> {
    let args = Args { selector, atoms };
    match selector {
      "add_clip" => args.clip().map(Command::AddClip),
      "clear_clips" => args.none(Command::ClearClips),
      "number" => {
        args.exactly(1)?;
        let position = args.f64(0)?;
        args.check(position.is_finite(), "position", position)?;
        Ok(Command::Position(position))
      }
      "playing" => {
        args.exactly(1)?;
        args.bool(0).map(Command::Playing)
      }
      "tempo" => {
        args.exactly(1)?;
        let tempo = Tempo::new(args.f64(0)?);
        args.check(tempo.is_valid(), "tempo", tempo.get_value())?;
        Ok(Command::Tempo(tempo))
      }
      "flush" => args.none(Command::Flush),
      "set_time_offset" => {
        args.exactly(2)?;
        let key = args.u7(0, "pitch")?;
        let millis = args.f64(1)?;
        args.check(millis.is_finite(), "time offset", millis)?;
        Ok(Command::SetTimeOffset { key, millis })
      }
      "clear_time_offsets" => args.none(Command::ClearTimeOffsets),
      "setup_drum_trigger" => args.drum_trigger().map(Command::SetupDrumTrigger),
      "setup_drum_triggers" => args.none(Command::SetupDrumTriggers),
      "clear_drum_triggers" => args.none(Command::ClearDrumTriggers),
      "mute" => {
        args.exactly(1)?;
        args.bool(0).map(Command::Mute)
      }
      "offset" => {
        args.exactly(1)?;
        let offset = args.f64(0)?;
        args.check(offset.abs() <= MAX_POSITION_OFFSET, "offset", offset)?;
        Ok(Command::Offset(offset))
      }
      "print_clips" => args.none(Command::PrintClips),
      "print_drum_triggers" => args.none(Command::PrintDrumTriggers),
      _ => Err(CommandError::UnknownSelector {
        selector: selector.to_string(),
      }),
    }
  }

  pub fn selector(&self) -> &'static str {
    match self {
      Command::AddClip(_) => "add_clip",
      Command::ClearClips => "clear_clips",
      Command::Position(_) => "number",
      Command::Playing(_) => "playing",
      Command::Tempo(_) => "tempo",
      Command::Flush => "flush",
      Command::SetTimeOffset { .. } => "set_time_offset",
      Command::ClearTimeOffsets => "clear_time_offsets",
      Command::SetupDrumTrigger(_) => "setup_drum_trigger",
      Command::SetupDrumTriggers => "setup_drum_triggers",
      Command::ClearDrumTriggers => "clear_drum_triggers",
      Command::Mute(_) => "mute",
      Command::Offset(_) => "offset",
      Command::PrintClips => "print_clips",
      Command::PrintDrumTriggers => "print_drum_triggers",
    }
  }

  /// Transport messages are shared by every scheduler listening to the same host transport
  pub fn is_transport(&self) -> bool {
    match self {
      Command::Position(_) | Command::Playing(_) | Command::Tempo(_) => true,
      _ => false,
    }
  }
}

struct Args<'a> {
  selector: &'a str,
  atoms: &'a [Atom],
}

impl<'a> Args<'a> {
  fn none(&self, command: Command) -> Result<Command, CommandError> {
    self.exactly(0).map(|_| command)
  }

  fn exactly(&self, count: usize) -> Result<(), CommandError> {
    if self.atoms.len() == count {
      Ok(())
    } else {
      Err(self.arity(count.to_string()))
    }
  }

  fn arity(&self, expected: String) -> CommandError {
    CommandError::Arity {
      selector: self.selector.to_string(),
      expected,
      found: self.atoms.len(),
    }
  }

  fn atom_type(&self, index: usize, expected: &'static str) -> CommandError {
    CommandError::AtomType {
      selector: self.selector.to_string(),
      index,
      expected,
    }
  }

  fn check<T>(&self, valid: bool, field: &'static str, value: T) -> Result<(), CommandError>
  where
    T: fmt::Display,
  {
    if valid {
      Ok(())
    } else {
      Err(CommandError::OutOfRange {
        selector: self.selector.to_string(),
        field,
        value: value.to_string(),
      })
    }
  }

  fn f64(&self, index: usize) -> Result<f64, CommandError> {
    self.atoms[index]
      .as_f64()
      .ok_or_else(|| self.atom_type(index, "a number"))
  }

  fn i64(&self, index: usize) -> Result<i64, CommandError> {
    self.atoms[index]
      .as_i64()
      .ok_or_else(|| self.atom_type(index, "an integer"))
  }

  fn bool(&self, index: usize) -> Result<bool, CommandError> {
    self.atoms[index]
      .as_bool()
      .ok_or_else(|| self.atom_type(index, "0 or 1"))
  }

  fn u7(&self, index: usize, field: &'static str) -> Result<U7, CommandError> {
    let value = self.i64(index)?;
    u7_from_i64(value).ok_or_else(|| CommandError::OutOfRange {
      selector: self.selector.to_string(),
      field,
      value: value.to_string(),
    })
  }

  fn symbol(&self, index: usize) -> String {
    self.atoms[index].text().to_string()
  }

  fn beats(&self, index: usize) -> Result<BeatsTime, CommandError> {
    self.f64(index).map(BeatsTime::new)
  }

  /// id name muted start_time end_time start_marker end_marker looping loop_start loop_end
  /// followed by [pitch start duration velocity]*
  fn clip(&self) -> Result<Clip, CommandError> {
    let num_atoms = self.atoms.len();
    if num_atoms < CLIP_HEADER_ATOMS || (num_atoms - CLIP_HEADER_ATOMS) % CLIP_NOTE_ATOMS != 0 {
      return Err(self.arity(format!(
        "{} + {} per note",
        CLIP_HEADER_ATOMS, CLIP_NOTE_ATOMS
      )));
    }

    let id: ClipId = self.i64(0)?;
    let mut builder = Clip::builder(id, self.symbol(1))
      .muted(self.bool(2)?)
      .placement(self.beats(3)?, self.beats(4)?)
      .markers(self.beats(5)?, self.beats(6)?)
      .looping(self.bool(7)?)
      .loop_region(self.beats(8)?, self.beats(9)?);

    for index in (CLIP_HEADER_ATOMS..num_atoms).step_by(CLIP_NOTE_ATOMS) {
      let key = self.u7(index, "pitch")?;
      let start = self.beats(index + 1)?;
      let duration = self.beats(index + 2)?;
      let velocity = self.u7(index + 3, "velocity")?;
      builder = builder.note(Note::new(key, start, duration, velocity));
    }

    builder
      .build()
      .map_err(|cause| CommandError::Clip { cause })
  }

  /// pitch_in pitch_out velocity_min velocity_max delay_ms name
  fn drum_trigger(&self) -> Result<DrumTriggerSetup, CommandError> {
    self.exactly(6)?;
    let key_in = self.u7(0, "pitch_in")?;
    let key_out = self.u7(1, "pitch_out")?;
    let velocity_min = self.u7(2, "velocity_min")?;
    let velocity_max = self.u7(3, "velocity_max")?;
    let delay_ms = self.f64(4)?;
    self.check(delay_ms.is_finite(), "delay", delay_ms)?;
    let name = self.symbol(5);

    DrumTrigger::new(name, key_in, key_out, velocity_min, velocity_max)
      .map(|trigger| DrumTriggerSetup::new(trigger, delay_ms))
      .map_err(|cause| CommandError::DrumTrigger { cause })
  }
}
