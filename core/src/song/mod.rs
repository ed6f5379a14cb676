pub mod clip;
pub mod note;
pub mod track;

pub use self::clip::{Clip, ClipBuilder, ClipError, ClipId};
pub use self::note::{Note, NoteId, NoteKey};
pub use self::track::{Track, Transition};
