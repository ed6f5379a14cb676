use std::io::{self, Write};
use std::thread;
use std::thread::JoinHandle;

use failure::Fail;
use log::{error, info, trace};

use crossbeam_channel::{Receiver, Sender};

use drum_trigger_core::midi::buffer::Event;

use crate::config::Output as OutputConfig;

#[derive(Debug, Fail)]
pub enum OutputError {
  #[fail(display = "Failed to create the output thread: {}", cause)]
  Start { cause: String },

  #[fail(display = "Failed to join the output thread")]
  Stop,
}

pub enum Protocol {
  Stop,

  Events { instance: String, events: Vec<Event> },
}

/// One line per event: the instance name, optionally the beat position, then the message
pub fn format_event(instance: &str, event: &Event, print_position: bool) -> String {
  if print_position {
    format!("{} {} {}", instance, event.position, event.message)
  } else {
    format!("{} {}", instance, event.message)
  }
}

pub struct OutputThread<W: Write> {
  writer: W,
  print_position: bool,
}

impl<W: Write> OutputThread<W> {
  pub fn new(config: &OutputConfig, writer: W) -> OutputThread<W> {
    OutputThread {
      writer,
      print_position: config.print_position,
    }
  }

  pub fn handle_messages(&mut self, protocol_rx: Receiver<Protocol>) {
    info!("Handling output messages ...");

    for message in protocol_rx.iter() {
      match message {
        Protocol::Stop => {
          info!("Output thread stopped ...");
          break;
        }

        Protocol::Events { instance, events } => {
          if let Err(err) = self.write_events(&instance, &events) {
            error!("Failed to write {} events from {}: {}", events.len(), instance, err);
          }
        }
      }
    }
  }

  fn write_events(&mut self, instance: &str, events: &[Event]) -> io::Result<()> {
    for event in events.iter() {
      let line = format_event(instance, event, self.print_position);
      trace!("{}", line);
      writeln!(self.writer, "{}", line)?;
    }
    self.writer.flush()
  }

  #[cfg(test)]
  fn into_writer(self) -> W {
    self.writer
  }
}

pub struct Output {
  handler: JoinHandle<()>,
  protocol_tx: Sender<Protocol>,
}

impl Output {
  pub fn new_channel(capacity: usize) -> (Sender<Protocol>, Receiver<Protocol>) {
    crossbeam_channel::bounded::<Protocol>(capacity)
  }

  pub fn new(
    config: &OutputConfig,
    protocol_tx: Sender<Protocol>,
    protocol_rx: Receiver<Protocol>,
  ) -> Result<Output, OutputError> {
    info!("Spawning output thread ...");

    let cloned_config = config.clone();

    thread::Builder::new()
      .name("output".into())
      .spawn(move || OutputThread::new(&cloned_config, io::stdout()).handle_messages(protocol_rx))
      .map_err(|err| OutputError::Start {
        cause: err.to_string(),
      })
      .map(|handler| Output {
        handler,
        protocol_tx,
      })
  }

  /// Where the instances send the events they emit
  pub fn sender(&self) -> Sender<Protocol> {
    self.protocol_tx.clone()
  }

  pub fn stop(self) -> Result<(), OutputError> {
    info!("Stopping output thread ...");

    self
      .protocol_tx
      .send(Protocol::Stop)
      .map_err(|_| OutputError::Stop)
      .and_then(|()| self.handler.join().map_err(|_| OutputError::Stop))
  }
}

#[cfg(test)]
mod test {

  use super::{format_event, Output, OutputThread, Protocol};
  use crate::config::Output as OutputConfig;
  use drum_trigger_core::midi::buffer::Event;
  use drum_trigger_core::midi::Message;
  use drum_trigger_core::time::BeatsTime;

  fn event(position: f64, message: Message) -> Event {
    Event {
      position: BeatsTime::new(position),
      message,
    }
  }

  #[test]
  pub fn format_events() {
    let note_on = event(1.5, Message::note_on(36, 100));
    assert_eq!(format_event("main", &note_on, false), "main note 36 100");
    assert_eq!(format_event("main", &note_on, true), "main 1.5 note 36 100");

    let trigger = event(1.5, Message::Trigger { key: 36, velocity: 70 });
    assert_eq!(format_event("left", &trigger, false), "left trig 36 70");
  }

  #[test]
  pub fn writes_events_until_stopped() {
    let (protocol_tx, protocol_rx) = Output::new_channel(8);
    protocol_tx
      .send(Protocol::Events {
        instance: "main".to_string(),
        events: vec![
          event(1.0, Message::note_on(36, 100)),
          event(1.0, Message::Trigger { key: 36, velocity: 70 }),
        ],
      })
      .unwrap();
    protocol_tx.send(Protocol::Stop).unwrap();
    protocol_tx
      .send(Protocol::Events {
        instance: "main".to_string(),
        events: vec![event(1.5, Message::note_off(36))],
      })
      .unwrap();

    let config = OutputConfig::default();
    let mut thread = OutputThread::new(&config, Vec::new());
    thread.handle_messages(protocol_rx);

    let written = String::from_utf8(thread.into_writer()).unwrap();
    assert_eq!(written, "main note 36 100\nmain trig 36 70\n");
  }
}
