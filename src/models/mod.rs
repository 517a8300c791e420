pub mod event;
pub mod occurrence;
pub mod seed;

pub use event::{is_hex_color, Event, NewEvent};
pub use occurrence::{Occurrence, OccurrenceRef};
pub use seed::{seed_events, PALETTE};
