pub mod command;
pub mod config;
pub mod drum_trigger;
pub mod midi;
pub mod scheduler;
pub mod song;
pub mod time;
