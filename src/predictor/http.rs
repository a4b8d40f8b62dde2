//! HTTP predictor client.
//!
//! Talks to the model service over JSON: `POST {base}/predecir_tipo` and
//! `POST {base}/predecir_polos`, both with body `{"datos": [30 floats]}`.

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::debug;
use url::Url;

use super::{Classification, Pole, PolePair, Predictor, PredictorError};
use crate::features::FeatureVector;

const CLASSIFY_PATH: &str = "predecir_tipo";
const POLES_PATH: &str = "predecir_polos";
const BODY_SNIPPET_CHARS: usize = 200;

#[derive(Serialize)]
struct PredictRequest<'a> {
    datos: &'a FeatureVector,
}

#[derive(Deserialize)]
struct ClassifyResponse {
    tipo_sistema: i32,
    #[serde(default, alias = "confianza")]
    confidence: Option<f64>,
}

#[derive(Deserialize)]
struct PolesResponse {
    polo_s1_real: f64,
    polo_s1_imag: f64,
    polo_s2_real: f64,
    polo_s2_imag: f64,
}

/// Predictor backed by the model HTTP service.
#[derive(Debug, Clone)]
pub struct HttpPredictorClient {
    client: reqwest::Client,
    base_url: Url,
}

impl HttpPredictorClient {
    /// Creates a client whose every request is bounded by `timeout`.
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, PredictorError> {
        let mut base_url = Url::parse(base_url)
            .map_err(|e| PredictorError::Configuration(format!("{base_url}: {e}")))?;
        // Url::join replaces the last segment unless the base ends with '/'.
        if !base_url.path().ends_with('/') {
            let path = format!("{}/", base_url.path());
            base_url.set_path(&path);
        }

        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| PredictorError::Configuration(e.to_string()))?;

        Ok(Self { client, base_url })
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    async fn post<T: for<'de> Deserialize<'de>>(
        &self,
        path: &str,
        features: &FeatureVector,
    ) -> Result<T, PredictorError> {
        let url = self
            .base_url
            .join(path)
            .map_err(|e| PredictorError::Configuration(e.to_string()))?;

        let response = self
            .client
            .post(url)
            .json(&PredictRequest { datos: features })
            .send()
            .await
            .map_err(map_transport_error)?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.ok().map(|body| snippet(&body));
            return Err(PredictorError::Status {
                status: status.as_u16(),
                body,
            });
        }

        response.json::<T>().await.map_err(|e| {
            if e.is_timeout() {
                PredictorError::Timeout
            } else {
                PredictorError::Decode(e.to_string())
            }
        })
    }
}

#[async_trait]
impl Predictor for HttpPredictorClient {
    async fn classify(&self, features: &FeatureVector) -> Result<Classification, PredictorError> {
        let response: ClassifyResponse = self.post(CLASSIFY_PATH, features).await?;
        debug!(code = response.tipo_sistema, "Predictor classified series");
        Ok(Classification::from_code(
            response.tipo_sistema,
            response.confidence,
        ))
    }

    async fn poles(&self, features: &FeatureVector) -> Result<PolePair, PredictorError> {
        let response: PolesResponse = self.post(POLES_PATH, features).await?;
        Ok(PolePair::new(
            Pole::new(response.polo_s1_real, response.polo_s1_imag),
            Pole::new(response.polo_s2_real, response.polo_s2_imag),
        ))
    }
}

fn map_transport_error(err: reqwest::Error) -> PredictorError {
    if err.is_timeout() {
        PredictorError::Timeout
    } else {
        PredictorError::Transport(err.to_string())
    }
}

fn snippet(body: &str) -> String {
    if body.chars().count() > BODY_SNIPPET_CHARS {
        let truncated: String = body.chars().take(BODY_SNIPPET_CHARS).collect();
        format!("{truncated}...")
    } else {
        body.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn base_url_gains_trailing_slash() {
        let client = HttpPredictorClient::new("http://localhost:5001/ml", Duration::from_secs(1))
            .unwrap();
        assert_eq!(client.base_url().as_str(), "http://localhost:5001/ml/");
        assert_eq!(
            client.base_url().join(CLASSIFY_PATH).unwrap().as_str(),
            "http://localhost:5001/ml/predecir_tipo"
        );
    }

    #[test]
    fn invalid_base_url_is_rejected() {
        assert!(matches!(
            HttpPredictorClient::new("not a url", Duration::from_secs(1)),
            Err(PredictorError::Configuration(_))
        ));
    }

    #[test]
    fn long_bodies_are_truncated() {
        let body = "x".repeat(500);
        assert_eq!(snippet(&body).chars().count(), BODY_SNIPPET_CHARS + 3);
    }
}
