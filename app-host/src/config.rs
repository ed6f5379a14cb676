use failure::Error;

use serde_derive::Deserialize;

use std::fs::File;
use std::io::Read;

use drum_trigger_core::config::{
  Config as CoreConfig, DrumTrigger as DrumTriggerConfig, Scheduler as SchedulerConfig,
};

pub const DEFAULT_INSTANCE: &str = "main";

#[derive(Deserialize, Debug, Clone)]
#[serde(default)]
pub struct Config {
  pub instances: Vec<String>,
  pub channel_capacity: usize,
  pub output: Output,
  pub scheduler: SchedulerConfig,
  pub drum_triggers: Option<Vec<DrumTriggerConfig>>,
}

impl Default for Config {
  fn default() -> Config {
    Config {
      instances: vec![DEFAULT_INSTANCE.to_string()],
      channel_capacity: 1024,
      output: Output::default(),
      scheduler: SchedulerConfig::default(),
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

  #[allow(dead_code)]
  pub fn from_str<'a, T>(content: T) -> Result<Config, Error>
  where
    T: Into<&'a str>,
  {
    let config: Config = toml::from_str(content.into())?;
    Ok(config)
  }

  /// The part of the configuration every scheduler instance is created from
  pub fn core(&self) -> CoreConfig {
    CoreConfig {
      scheduler: self.scheduler.clone(),
      drum_triggers: self.drum_triggers.clone(),
    }
  }
}

#[derive(Deserialize, Debug, Clone)]
#[serde(default)]
pub struct Output {
  pub print_position: bool,
}

impl Default for Output {
  fn default() -> Output {
    Output {
      print_position: false,
    }
  }
}

#[cfg(test)]
mod test {

  use super::Config;

  #[test]
  pub fn defaults() {
    let config = Config::from_str("").unwrap();
    assert_eq!(config.instances, vec!["main".to_string()]);
    assert_eq!(config.channel_capacity, 1024);
    assert!(!config.output.print_position);
    assert_eq!(config.core().scheduler.tempo, 120.0);
  }

  #[test]
  pub fn host_and_core_sections() {
    let content = r#"
      instances = ["left", "right"]
      channel_capacity = 16

      [output]
      print_position = true

      [scheduler]
      tempo = 100.0
      setup_drum_triggers = true

      [[drum_triggers]]
      name = "Snare"
      pitch_in = 40
      pitch_out = 62
      velocity_min = 30
      velocity_max = 90
      delay_ms = -30.0
    "#;
    let config = Config::from_str(content).unwrap();
    assert_eq!(config.instances, vec!["left".to_string(), "right".to_string()]);
    assert_eq!(config.channel_capacity, 16);
    assert!(config.output.print_position);

    let core = config.core();
    assert_eq!(core.scheduler.tempo, 100.0);
    assert!(core.scheduler.setup_drum_triggers);
    let setups = core.drum_trigger_setups().unwrap();
    assert_eq!(setups.len(), 1);
    assert_eq!(setups[0].trigger.key_out(), 62);
  }
}
