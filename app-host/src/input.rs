use drum_trigger_core::command::{tokenize, Atom, Command, CommandError};

#[derive(Debug, Clone, PartialEq)]
pub enum Target {
  All,
  Instance(String),
}

#[derive(Debug, Clone)]
pub struct Message {
  pub target: Target,
  pub command: Command,
}

/// Parses one input line, `[instance] selector atoms...`.
///
/// The first token addresses an instance only when `is_instance` accepts it.
/// Blank lines and comments give `None`.
pub fn parse_line<F>(line: &str, is_instance: F) -> Result<Option<Message>, CommandError>
where
  F: Fn(&str) -> bool,
{
  let line = line.trim();
  if line.is_empty() || line.starts_with('#') {
    return Ok(None);
  }

  let atoms = tokenize(line)?;
  let message = match atoms.split_first() {
    Some((Atom::Symbol(name), rest)) if is_instance(name.as_str()) => Message {
      target: Target::Instance(name.clone()),
      command: Command::parse(rest)?,
    },
    _ => Message {
      target: Target::All,
      command: Command::parse(&atoms)?,
    },
  };
  Ok(Some(message))
}
