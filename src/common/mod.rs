//! Common types shared between the arbiter, the actions and the transports

use serde::{Deserialize, Serialize};

/// Units used across the crate
pub mod units {
    /// Translational speed in mm/s
    pub type MmPerSec = f64;

    /// Translational acceleration in mm/s^2
    pub type MmPerSec2 = f64;

    /// Angle in degrees, counter-clockwise positive
    pub type Degrees = f64;

    /// Distance in mm
    pub type Mm = f64;
}

use self::units::{Degrees, MmPerSec, MmPerSec2};

/// Acceleration used when no action asked for a specific limit
pub const DEFAULT_TRANSLATION_ACCEL: MmPerSec2 = 300.0;

/// The fully resolved command sent to the motors once per cycle
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Command {
    pub translation: MmPerSec,
    pub heading_delta: Degrees,
    pub translation_accel: MmPerSec2,
}

impl Command {
    /// A command that stops the robot
    pub fn stop() -> Self {
        Command {
            translation: 0.0,
            heading_delta: 0.0,
            translation_accel: DEFAULT_TRANSLATION_ACCEL,
        }
    }

    /// Read a single field
    pub fn get(&self, field: Field) -> f64 {
        match field {
            Field::Translation => self.translation,
            Field::HeadingDelta => self.heading_delta,
            Field::TranslationAccel => self.translation_accel,
        }
    }

    /// Overwrite a single field
    pub fn set(&mut self, field: Field, value: f64) {
        match field {
            Field::Translation => self.translation = value,
            Field::HeadingDelta => self.heading_delta = value,
            Field::TranslationAccel => self.translation_accel = value,
        }
    }
}

impl Default for Command {
    fn default() -> Self {
        Command::stop()
    }
}

/// The independently arbitrated fields of a command
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Field {
    Translation,
    HeadingDelta,
    TranslationAccel,
}

impl Field {
    pub const ALL: [Field; 3] = [
        Field::Translation,
        Field::HeadingDelta,
        Field::TranslationAccel,
    ];

    fn bit(self) -> u8 {
        match self {
            Field::Translation => 0b001,
            Field::HeadingDelta => 0b010,
            Field::TranslationAccel => 0b100,
        }
    }
}

/// A small bitset over [`Field`]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FieldSet(u8);

impl FieldSet {
    pub fn empty() -> Self {
        FieldSet(0)
    }

    pub fn contains(&self, field: Field) -> bool {
        self.0 & field.bit() != 0
    }

    pub fn insert(&mut self, field: Field) {
        self.0 |= field.bit();
    }

    pub fn is_empty(&self) -> bool {
        self.0 == 0
    }
}

/// Normalize an angle to (-180, 180]
pub fn normalize_degrees(angle: Degrees) -> Degrees {
    let mut a = angle % 360.0;
    if a > 180.0 {
        a -= 360.0;
    } else if a <= -180.0 {
        a += 360.0;
    }
    a
}
