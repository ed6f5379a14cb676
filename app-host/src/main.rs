use std::io::{self, BufRead};
use std::path::Path;

use log::{debug, error, info, warn, LevelFilter};

use failure::{Error, Fail};

use log4rs::append::console::{ConsoleAppender, Target as ConsoleTarget};
use log4rs::config::{Appender, Config as LogConfig, Root};
use log4rs::encode::pattern::PatternEncoder;

use drum_trigger_core::scheduler::Scheduler;

mod config;
use crate::config::Config;

mod context;
use crate::context::SchedulingContext;

mod input;

mod instance;
use crate::instance::Instance;

mod output;
use crate::output::Output;

const DRUM_TRIGGER_CONFIG: &str = "DRUM_TRIGGER_CONFIG";
const DEFAULT_DRUM_TRIGGER_CONFIG: &str = "drum-trigger.toml";

const DRUM_TRIGGER_LOG_CONFIG: &str = "DRUM_TRIGGER_LOG_CONFIG";
const DEFAULT_DRUM_TRIGGER_LOG_CONFIG: &str = "log4rs.yaml";

const FALLBACK_LOG_PATTERN: &str = "{d(%H:%M:%S%.3f)} {l:<5} [{T}] {t} - {m}{n}";

#[derive(Debug, Fail)]
enum HostError {
  #[fail(display = "Failed to init logging: {}", cause)]
  LoggingInit { cause: String },

  #[fail(display = "Failed to read the input: {}", cause)]
  Input { cause: String },
}

fn main() -> Result<(), Error> {
  init_logging()?;

  let config = init_config()?;

  let output = init_output(&config)?;

  let context = init_context(&config, &output)?;

  let stdin = io::stdin();
  let result = run(&context, stdin.lock());

  context.stop()?;

  output.stop()?;

  result
}

fn init_logging() -> Result<(), Error> {
  let log_config_path = std::env::var(DRUM_TRIGGER_LOG_CONFIG)
    .unwrap_or_else(|_| DEFAULT_DRUM_TRIGGER_LOG_CONFIG.to_string());

  if Path::new(log_config_path.as_str()).exists() {
    log4rs::init_file(log_config_path.as_str(), Default::default()).map_err(|err| {
      HostError::LoggingInit {
        cause: err.to_string(),
      }
    })?;
  } else {
    let stderr = ConsoleAppender::builder()
      .target(ConsoleTarget::Stderr)
      .encoder(Box::new(PatternEncoder::new(FALLBACK_LOG_PATTERN)))
      .build();

    let log_config = LogConfig::builder()
      .appender(Appender::builder().build("stderr", Box::new(stderr)))
      .build(Root::builder().appender("stderr").build(LevelFilter::Info))
      .map_err(|err| HostError::LoggingInit {
        cause: err.to_string(),
      })?;

    log4rs::init_config(log_config).map_err(|err| HostError::LoggingInit {
      cause: err.to_string(),
    })?;

    debug!("No logging configuration at {}", log_config_path);
  }

  Ok(())
}

fn init_config() -> Result<Config, Error> {
  let config_path = std::env::var(DRUM_TRIGGER_CONFIG)
    .unwrap_or_else(|_| DEFAULT_DRUM_TRIGGER_CONFIG.to_string());

  let config = if Path::new(config_path.as_str()).exists() {
    info!("Loading configuration from {} ...", config_path);
    Config::from_file(config_path.as_str())?
  } else {
    info!("No configuration at {}, using defaults", config_path);
    Config::default()
  };
  debug!("{:#?}", config);

  Ok(config)
}

fn init_output(config: &Config) -> Result<Output, Error> {
  let (output_tx, output_rx) = Output::new_channel(config.channel_capacity);
  let output = Output::new(&config.output, output_tx, output_rx)?;
  Ok(output)
}

fn init_context(config: &Config, output: &Output) -> Result<SchedulingContext, Error> {
  info!("Initialising {} instances ...", config.instances.len());

  let core_config = config.core();
  let mut context = SchedulingContext::new();
  for name in config.instances.iter() {
    let scheduler = Scheduler::from_config(&core_config)?;
    let instance = Instance::new(name, scheduler, config.channel_capacity, output.sender())?;
    context.subscribe(instance);
  }

  if context.is_empty() {
    warn!("No instances configured, every message will be dropped");
  } else {
    debug!("{} instances running", context.len());
  }

  Ok(context)
}

/// Routes the input lines until the end of the input.
///
/// Lines that are not valid UTF-8 are logged and skipped.
fn run<R: BufRead>(context: &SchedulingContext, mut reader: R) -> Result<(), Error> {
  info!("Reading messages ...");

  let mut buffer = Vec::new();
  loop {
    buffer.clear();
    match reader.read_until(b'\n', &mut buffer) {
      Ok(0) => break,
      Ok(_) => {}
      Err(ref err) if err.kind() == io::ErrorKind::Interrupted => continue,
      Err(err) => {
        return Err(
          HostError::Input {
            cause: err.to_string(),
          }
          .into(),
        )
      }
    }

    let line = match std::str::from_utf8(buffer.as_slice()) {
      Ok(line) => line,
      Err(err) => {
        warn!("Rejected '{}': {}", String::from_utf8_lossy(buffer.as_slice()).trim_end(), err);
        continue;
      }
    };

    match input::parse_line(line, |name| context.contains(name)) {
      Ok(Some(message)) => {
        if let Err(err) = context.dispatch(message) {
          error!("{}", err);
        }
      }
      Ok(None) => {}
      Err(err) => warn!("Rejected '{}': {}", line.trim_end(), err),
    }
  }

  info!("End of input");
  Ok(())
}
