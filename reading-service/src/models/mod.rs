//! Domain models for the reading service.

pub mod landmark;
pub mod reading;

pub use landmark::{Landmark, HAND_LANDMARK_COUNT};
pub use reading::{InputSummary, ReadingCollection, ReadingRecord, ANONYMOUS_USER};
