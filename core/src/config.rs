use failure::Error;

use serde_derive::Deserialize;

use std::fs::File;
use std::io::Read;

use crate::drum_trigger::{self, DrumTriggerError, DrumTriggerSetup};
use crate::midi::types::{Key, Velocity};
use crate::time::tempo::DEFAULT_TEMPO;

#[derive(Deserialize, Debug, Clone)]
#[serde(default)]
pub struct Scheduler {
  pub tempo: f64,
  pub position_offset: f64,
  pub setup_drum_triggers: bool,
}

impl Default for Scheduler {
  fn default() -> Scheduler {
    Scheduler {
      tempo: DEFAULT_TEMPO,
      position_offset: 0.0,
      setup_drum_triggers: false,
    }
  }
}

#[derive(Deserialize, Debug, Clone)]
pub struct DrumTrigger {
  pub name: String,
  pub pitch_in: Key,
  pub pitch_out: Key,
  pub velocity_min: Velocity,
  pub velocity_max: Velocity,
  #[serde(default)]
  pub delay_ms: f64,
}

impl DrumTrigger {
  pub fn to_setup(&self) -> Result<DrumTriggerSetup, DrumTriggerError> {
    drum_trigger::DrumTrigger::new(
      self.name.as_str(),
      self.pitch_in,
      self.pitch_out,
      self.velocity_min,
      self.velocity_max,
    )
    .map(|trigger| DrumTriggerSetup::new(trigger, self.delay_ms))
  }
}

#[derive(Deserialize, Debug, Clone)]
#[serde(default)]
pub struct Config {
  pub scheduler: Scheduler,
  pub drum_triggers: Option<Vec<DrumTrigger>>,
}

impl Default for Config {
  fn default() -> Config {
    Config {
      scheduler: Scheduler::default(),
      drum_triggers: None,
    }
  }
}

impl Config {
  pub fn from_file<'a, T>(path: T) -> Result<Config, Error>
  where
    T: Into<&'a str>,
  {
    let mut content = String::new();
    let path_str = path.into();
    let mut file = File::open(path_str)?;
    file.read_to_string(&mut content)?;
    let config: Config = toml::from_str(&content)?;
    Ok(config)
  }

  pub fn from_str<'a, T>(content: T) -> Result<Config, Error>
  where
    T: Into<&'a str>,
  {
    let config: Config = toml::from_str(content.into())?;
    Ok(config)
  }

  /// The table loaded by `setup_drum_triggers`: the configured one or the built-in defaults
  pub fn drum_trigger_setups(&self) -> Result<Vec<DrumTriggerSetup>, DrumTriggerError> {
    match &self.drum_triggers {
      Some(triggers) => triggers.iter().map(DrumTrigger::to_setup).collect(),
      None => Ok(drum_trigger::default_drum_triggers()),
    }
  }
}
