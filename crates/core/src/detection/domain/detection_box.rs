use serde::{Deserialize, Serialize};

/// Axis-aligned box reported by the detector, in detector-input pixels.
///
/// `valid` is `false` when the detector considers the part cut off by the
/// frame edge; older backends omit it.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct DetectionBox {
    pub x: f64,
    pub y: f64,
    pub w: f64,
    pub h: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub valid: Option<bool>,
}

impl DetectionBox {
    pub fn new(x: f64, y: f64, w: f64, h: f64) -> Self {
        Self {
            x,
            y,
            w,
            h,
            valid: None,
        }
    }

    pub fn with_valid(self, valid: bool) -> Self {
        Self {
            valid: Some(valid),
            ..self
        }
    }
}
