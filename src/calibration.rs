//! Pole calibration.
//!
//! Raw predictor poles carry a systematic bias that depends on the system
//! class. A [`CalibrationTable`] holds one set of additive offsets per class and
//! turns raw poles into [`ResolvedPoles`] exactly once.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::predictor::{Pole, PolePair, SystemType};

/// Additive offsets applied to `(s1.real, s1.imag, s2.real, s2.imag)`.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct PoleOffsets {
    pub real1: f64,
    pub imag1: f64,
    pub real2: f64,
    pub imag2: f64,
}

impl PoleOffsets {
    pub const UNDERDAMPED: PoleOffsets = PoleOffsets {
        real1: 127.0,
        imag1: -335.25,
        real2: 127.0,
        imag2: 335.25,
    };

    pub const OVERDAMPED: PoleOffsets = PoleOffsets {
        real1: -425.8,
        imag1: 0.0,
        real2: 455.0,
        imag2: 0.0,
    };

    fn apply(&self, poles: PolePair) -> PolePair {
        PolePair::new(
            Pole::new(poles.first.real + self.real1, poles.first.imag + self.imag1),
            Pole::new(poles.second.real + self.real2, poles.second.imag + self.imag2),
        )
    }
}

#[derive(Debug, Error, PartialEq)]
#[error("expected four comma-separated offsets 'real1,imag1,real2,imag2', got '{0}'")]
pub struct ParseOffsetsError(pub String);

impl FromStr for PoleOffsets {
    type Err = ParseOffsetsError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let parsed: Vec<f64> = s
            .split(',')
            .map(|part| part.trim().parse::<f64>())
            .collect::<Result<_, _>>()
            .map_err(|_| ParseOffsetsError(s.to_string()))?;

        match parsed.as_slice() {
            [real1, imag1, real2, imag2] if parsed.iter().all(|v| v.is_finite()) => {
                Ok(PoleOffsets {
                    real1: *real1,
                    imag1: *imag1,
                    real2: *real2,
                    imag2: *imag2,
                })
            }
            _ => Err(ParseOffsetsError(s.to_string())),
        }
    }
}

impl fmt::Display for PoleOffsets {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{},{},{},{}", self.real1, self.imag1, self.real2, self.imag2)
    }
}

/// Final pole pair of an analysis.
///
/// Only obtainable from [`CalibrationTable::resolve`] or
/// [`ResolvedPoles::fallback`], so calibrated poles cannot be calibrated twice.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ResolvedPoles {
    pair: PolePair,
    calibrated: bool,
}

impl ResolvedPoles {
    /// Default poles used when the predictor gave none. Never calibrated.
    pub fn fallback() -> Self {
        Self {
            pair: PolePair::FALLBACK,
            calibrated: false,
        }
    }

    pub fn pair(&self) -> &PolePair {
        &self.pair
    }

    /// True when these poles came from the predictor and went through calibration.
    pub fn is_calibrated(&self) -> bool {
        self.calibrated
    }
}

/// Per-class calibration offsets.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CalibrationTable {
    pub underdamped: PoleOffsets,
    pub overdamped: PoleOffsets,
}

impl Default for CalibrationTable {
    fn default() -> Self {
        Self {
            underdamped: PoleOffsets::UNDERDAMPED,
            overdamped: PoleOffsets::OVERDAMPED,
        }
    }
}

impl CalibrationTable {
    /// Offsets for `system_type`, or `None` when that class is left as predicted.
    pub fn offsets_for(&self, system_type: SystemType) -> Option<PoleOffsets> {
        match system_type {
            SystemType::Underdamped => Some(self.underdamped),
            SystemType::Overdamped => Some(self.overdamped),
            SystemType::CriticallyDamped | SystemType::Unknown => None,
        }
    }

    /// Calibrates raw predictor poles for `system_type`.
    pub fn resolve(&self, system_type: SystemType, raw: PolePair) -> ResolvedPoles {
        let pair = match self.offsets_for(system_type) {
            Some(offsets) => offsets.apply(raw),
            None => raw,
        };
        ResolvedPoles {
            pair,
            calibrated: true,
        }
    }
}
