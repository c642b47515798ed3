use serde::{Deserialize, Serialize};
use std::fmt;

/// Keypoints in the standard hand pose model (wrist plus four per finger).
pub const HAND_LANDMARK_COUNT: usize = 21;

/// A hand keypoint in normalized image coordinates; `z` is depth relative to the wrist.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Landmark {
    pub x: f32,
    pub y: f32,
    pub z: f32,
}

impl fmt::Display for Landmark {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({:.4}, {:.4}, {:.4})", self.x, self.y, self.z)
    }
}
