//! HTTP client for the exam upload endpoint.

use color_eyre::{eyre::eyre, Result};
use serde::Serialize;
use serde_json::Value;
use url::Url;

/// Path the exam server accepts submissions on.
const UPLOAD_PATH: &str = "/upload_mcq";

/// Client for posting submissions to the exam server.
#[derive(Clone)]
pub struct UploadClient {
  http: reqwest::Client,
  endpoint: Url,
}

impl UploadClient {
  pub fn new(base_url: &str) -> Result<Self> {
    let base: Url = base_url
      .parse()
      .map_err(|e| eyre!("Invalid server URL {}: {}", base_url, e))?;

    let endpoint = base
      .join(UPLOAD_PATH)
      .map_err(|e| eyre!("Failed to build upload endpoint: {}", e))?;

    Ok(Self {
      http: reqwest::Client::new(),
      endpoint,
    })
  }

  /// POST a submission as JSON.
  ///
  /// The server acknowledges with an arbitrary JSON document. Delivery is
  /// confirmed by a parseable JSON body; the HTTP status code is not
  /// inspected.
  pub async fn upload<T: Serialize>(&self, payload: &T) -> Result<Value> {
    let response = self
      .http
      .post(self.endpoint.clone())
      .json(payload)
      .send()
      .await
      .map_err(|e| eyre!("Failed to reach upload endpoint: {}", e))?;

    response
      .json::<Value>()
      .await
      .map_err(|e| eyre!("Failed to parse upload response: {}", e))
  }
}
