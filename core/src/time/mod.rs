pub mod beats;
pub mod tempo;

pub use self::beats::BeatsTime;
pub use self::tempo::Tempo;
