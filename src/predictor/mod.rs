//! Predictor interface
//!
//! The predictor is an external, stateless service that classifies a feature
//! vector and estimates a raw pole pair. Both calls may fail; callers fall back
//! to [`SystemType::default`] and [`PolePair::FALLBACK`].

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::features::FeatureVector;
pub use crate::models::result::SystemType;

pub mod http;

pub use http::HttpPredictorClient;

/// A single pole `real + imag·i` in rad/s.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Pole {
    pub real: f64,
    pub imag: f64,
}

impl Pole {
    pub const fn new(real: f64, imag: f64) -> Self {
        Self { real, imag }
    }

    pub fn is_complex(&self) -> bool {
        self.imag != 0.0
    }
}

/// Ordered pole pair `(s1, s2)` as returned by the predictor.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PolePair {
    pub first: Pole,
    pub second: Pole,
}

impl PolePair {
    /// Poles used when the predictor cannot be reached: `−0.5 ± 0.866i`.
    pub const FALLBACK: PolePair = PolePair {
        first: Pole::new(-0.5, 0.866),
        second: Pole::new(-0.5, -0.866),
    };

    pub fn new(first: Pole, second: Pole) -> Self {
        Self { first, second }
    }

    pub fn as_array(&self) -> [Pole; 2] {
        [self.first, self.second]
    }
}

/// Outcome of a successful classification call.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Classification {
    /// Raw class code as sent by the predictor
    pub code: i32,
    pub system_type: SystemType,
    pub confidence: Option<f64>,
}

impl Classification {
    pub fn from_code(code: i32, confidence: Option<f64>) -> Self {
        Self {
            code,
            system_type: SystemType::from_code(code),
            confidence,
        }
    }
}

/// Errors raised by predictor clients. All of them are recoverable by falling back.
#[derive(Debug, Error)]
pub enum PredictorError {
    #[error("predictor request timed out")]
    Timeout,
    #[error("predictor transport error: {0}")]
    Transport(String),
    #[error("predictor returned status {status}{}", body_suffix(.body))]
    Status { status: u16, body: Option<String> },
    #[error("predictor response could not be decoded: {0}")]
    Decode(String),
    #[error("invalid predictor configuration: {0}")]
    Configuration(String),
}

fn body_suffix(body: &Option<String>) -> String {
    body.as_deref()
        .map(|body| format!(": {body}"))
        .unwrap_or_default()
}

/// Classification and pole estimation service.
#[async_trait]
pub trait Predictor: Send + Sync {
    async fn classify(&self, features: &FeatureVector) -> Result<Classification, PredictorError>;

    async fn poles(&self, features: &FeatureVector) -> Result<PolePair, PredictorError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn class_codes_map_to_system_types() {
        assert_eq!(SystemType::from_code(0), SystemType::Underdamped);
        assert_eq!(SystemType::from_code(1), SystemType::Overdamped);
        assert_eq!(SystemType::from_code(7), SystemType::Unknown);
        assert_eq!(SystemType::from_code(-1), SystemType::Unknown);
    }

    #[test]
    fn fallback_poles_are_conjugate() {
        let [s1, s2] = PolePair::FALLBACK.as_array();
        assert_eq!(s1.real, s2.real);
        assert_eq!(s1.imag, -s2.imag);
        assert!(s1.is_complex());
    }

    #[test]
    fn status_error_includes_body() {
        let err = PredictorError::Status {
            status: 500,
            body: Some("boom".to_string()),
        };
        assert_eq!(err.to_string(), "predictor returned status 500: boom");
    }
}
