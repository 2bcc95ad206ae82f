use std::time::Duration;

use reqwest::{multipart, Client, Url};
use serde_json::Value;
use thiserror::Error;
use tracing::debug;

use super::response::{extract_class, extract_verdict, Verdict};
use crate::provider::FallbackReason;

/// Headroom between the per-request deadline and the client-wide one, so the
/// request deadline is the one that fires.
const CLIENT_TIMEOUT_HEADROOM: Duration = Duration::from_secs(2);

#[derive(Debug, Error)]
pub enum MlError {
  #[error("model request timed out")]
  Timeout,

  #[error("model request failed: {0}")]
  Network(#[source] reqwest::Error),

  #[error("model returned status {status}: {body}")]
  Status { status: u16, body: String },

  #[error("model response is not JSON: {0}")]
  Decode(String),

  #[error("model response has no usable field")]
  Unrecognized,
}

impl MlError {
  pub fn reason(&self) -> FallbackReason {
    match self {
      MlError::Timeout => FallbackReason::Timeout,
      MlError::Network(_) => FallbackReason::Network,
      MlError::Status { status, .. } => FallbackReason::Status(*status),
      MlError::Decode(_) => FallbackReason::Decode,
      MlError::Unrecognized => FallbackReason::Unrecognized,
    }
  }

  fn from_send(err: reqwest::Error) -> Self {
    if err.is_timeout() {
      MlError::Timeout
    } else {
      MlError::Network(err)
    }
  }

  fn from_body(err: reqwest::Error) -> Self {
    if err.is_timeout() {
      MlError::Timeout
    } else {
      MlError::Decode(err.to_string())
    }
  }
}

fn build_client(timeout: Duration) -> Result<Client, reqwest::Error> {
  Client::builder()
    .timeout(timeout + CLIENT_TIMEOUT_HEADROOM)
    .build()
}

async fn read_json(response: reqwest::Response) -> Result<Value, MlError> {
  let status = response.status();
  if !status.is_success() {
    let body = response.text().await.unwrap_or_default();
    return Err(MlError::Status {
      status: status.as_u16(),
      body,
    });
  }
  response.json::<Value>().await.map_err(MlError::from_body)
}

/// Text urgency model: `POST {"text": ...}`.
#[derive(Debug, Clone)]
pub struct UrgencyModelClient {
  client: Client,
  url: Url,
  timeout: Duration,
}

impl UrgencyModelClient {
  pub fn new(url: Url, timeout: Duration) -> Result<Self, reqwest::Error> {
    Ok(Self {
      client: build_client(timeout)?,
      url,
      timeout,
    })
  }

  pub async fn predict(&self, text: &str) -> Result<Verdict, MlError> {
    let response = self
      .client
      .post(self.url.clone())
      .timeout(self.timeout)
      .json(&serde_json::json!({ "text": text }))
      .send()
      .await
      .map_err(MlError::from_send)?;

    let body = read_json(response).await?;
    let verdict = extract_verdict(&body).ok_or(MlError::Unrecognized)?;
    debug!(
      urgency = verdict.urgency,
      score = verdict.score,
      field = ?verdict.field,
      "model verdict"
    );
    Ok(verdict)
  }
}

/// Image classifier: multipart form with an `image_url` field.
#[derive(Debug, Clone)]
pub struct ImageClassifierClient {
  client: Client,
  url: Url,
  timeout: Duration,
}

impl ImageClassifierClient {
  pub fn new(url: Url, timeout: Duration) -> Result<Self, reqwest::Error> {
    Ok(Self {
      client: build_client(timeout)?,
      url,
      timeout,
    })
  }

  /// Returns the predicted class, or `None` when the classifier answered
  /// without one.
  pub async fn classify(&self, image_url: &str) -> Result<Option<String>, MlError> {
    let form = multipart::Form::new().text("image_url", image_url.to_string());
    let response = self
      .client
      .post(self.url.clone())
      .timeout(self.timeout)
      .multipart(form)
      .send()
      .await
      .map_err(MlError::from_send)?;

    let body = read_json(response).await?;
    Ok(extract_class(&body))
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::ml::ModelField;
  use wiremock::matchers::{body_json, body_string_contains, method, path};
  use wiremock::{Mock, MockServer, ResponseTemplate};

  fn url(server: &MockServer, route: &str) -> Url {
    Url::parse(&format!("{}{}", server.uri(), route)).unwrap()
  }

  #[tokio::test]
  async fn predict_sends_text_and_reads_score() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
      .and(path("/predict"))
      .and(body_json(serde_json::json!({"text": "water main burst"})))
      .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({"score": 0.91})))
      .expect(1)
      .mount(&server)
      .await;

    let client = UrgencyModelClient::new(url(&server, "/predict"), Duration::from_secs(5)).unwrap();
    let verdict = client.predict("water main burst").await.unwrap();

    assert_eq!(verdict.field, ModelField::Score);
    assert_eq!(verdict.urgency, 3);
    assert_eq!(verdict.score, 0.91);
  }

  #[tokio::test]
  async fn predict_reports_status_errors() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
      .respond_with(ResponseTemplate::new(503).set_body_string("overloaded"))
      .mount(&server)
      .await;

    let client = UrgencyModelClient::new(url(&server, "/predict"), Duration::from_secs(5)).unwrap();
    let err = client.predict("anything").await.unwrap_err();

    assert_eq!(err.reason(), FallbackReason::Status(503));
    assert!(err.to_string().contains("overloaded"));
  }

  #[tokio::test]
  async fn predict_times_out() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
      .respond_with(
        ResponseTemplate::new(200)
          .set_body_json(serde_json::json!({"score": 0.9}))
          .set_delay(Duration::from_millis(1500)),
      )
      .mount(&server)
      .await;

    let client =
      UrgencyModelClient::new(url(&server, "/predict"), Duration::from_millis(200)).unwrap();
    let err = client.predict("slow").await.unwrap_err();
    assert_eq!(err.reason(), FallbackReason::Timeout);
  }

  #[tokio::test]
  async fn predict_rejects_non_json_and_unrecognized_bodies() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
      .and(path("/html"))
      .respond_with(ResponseTemplate::new(200).set_body_string("<html>"))
      .mount(&server)
      .await;
    Mock::given(method("POST"))
      .and(path("/empty"))
      .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({"ok": true})))
      .mount(&server)
      .await;

    let html = UrgencyModelClient::new(url(&server, "/html"), Duration::from_secs(5)).unwrap();
    assert_eq!(html.predict("x").await.unwrap_err().reason(), FallbackReason::Decode);

    let empty = UrgencyModelClient::new(url(&server, "/empty"), Duration::from_secs(5)).unwrap();
    assert_eq!(
      empty.predict("x").await.unwrap_err().reason(),
      FallbackReason::Unrecognized
    );
  }

  #[tokio::test]
  async fn classify_posts_multipart_image_url() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
      .and(path("/classify"))
      .and(body_string_contains("name=\"image_url\""))
      .and(body_string_contains("https://cdn.example/pothole.jpg"))
      .respond_with(
        ResponseTemplate::new(200).set_body_json(serde_json::json!({"classification": "pothole"})),
      )
      .expect(1)
      .mount(&server)
      .await;

    let client =
      ImageClassifierClient::new(url(&server, "/classify"), Duration::from_secs(5)).unwrap();
    let class = client.classify("https://cdn.example/pothole.jpg").await.unwrap();
    assert_eq!(class.as_deref(), Some("pothole"));
  }

  #[tokio::test]
  async fn unreachable_endpoint_is_network_error() {
    let client = UrgencyModelClient::new(
      Url::parse("http://127.0.0.1:9/predict").unwrap(),
      Duration::from_secs(2),
    )
    .unwrap();
    let err = client.predict("x").await.unwrap_err();
    assert_eq!(err.reason(), FallbackReason::Network);
  }
}
