pub mod buffer;
pub mod io;
pub mod messages;
pub mod types;

pub use buffer::Buffer;
pub use io::MidiOutput;
pub use messages::Message;
