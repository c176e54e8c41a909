//! Range sensor interfaces for Prometheus robot

use crate::common::normalize_degrees;
use crate::common::units::{Degrees, Mm};
use serde::{Deserialize, Serialize};

/// A generic range sensing interface
pub trait RangeDevice {
    /// Get the device name
    fn name(&self) -> &str;

    /// Closest reading whose bearing lies in the arc swept counter-clockwise from
    /// `start` to `end` (robot frame, 0 is straight ahead)
    fn closest_in_arc(&self, start: Degrees, end: Degrees) -> Option<RangeReading>;
}

/// One range return, measured from the robot's body
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RangeReading {
    pub bearing: Degrees,
    pub range: Mm,
}

/// All range returns collected during one cycle
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RangeScan {
    pub readings: Vec<RangeReading>,
}

impl RangeScan {
    pub fn new(readings: Vec<RangeReading>) -> Self {
        RangeScan { readings }
    }
}

impl RangeDevice for RangeScan {
    fn name(&self) -> &str {
        "sonar"
    }

    fn closest_in_arc(&self, start: Degrees, end: Degrees) -> Option<RangeReading> {
        self.readings
            .iter()
            .filter(|r| r.range.is_finite() && in_arc(r.bearing, start, end))
            .min_by(|a, b| a.range.total_cmp(&b.range))
            .copied()
    }
}

/// Whether `bearing` lies in the counter-clockwise arc from `start` to `end`
pub fn in_arc(bearing: Degrees, start: Degrees, end: Degrees) -> bool {
    let span = (normalize_degrees(end - start) + 360.0) % 360.0;
    let offset = (normalize_degrees(bearing - start) + 360.0) % 360.0;
    if span == 0.0 {
        return offset == 0.0;
    }
    offset <= span
}
