//! HTTP fetcher for origin assets.

use color_eyre::{eyre::eyre, Result};
use url::Url;

use super::traits::FetchedAsset;

/// Client for fetching static assets from the exam server.
#[derive(Clone)]
pub struct AssetClient {
  http: reqwest::Client,
  base: Url,
}

impl AssetClient {
  pub fn new(base_url: &str) -> Result<Self> {
    let base: Url = base_url
      .parse()
      .map_err(|e| eyre!("Invalid server URL {}: {}", base_url, e))?;

    Ok(Self {
      http: reqwest::Client::new(),
      base,
    })
  }

  /// Fetch one asset by path.
  ///
  /// Errors only on transport failure; a non-success HTTP response is
  /// returned as-is with its status so callers decide what counts as a
  /// failure.
  pub async fn get(&self, path: &str) -> Result<FetchedAsset> {
    let url = self
      .base
      .join(path)
      .map_err(|e| eyre!("Invalid asset path {}: {}", path, e))?;

    let response = self
      .http
      .get(url)
      .send()
      .await
      .map_err(|e| eyre!("Failed to fetch {}: {}", path, e))?;

    let status = response.status().as_u16();
    let content_type = response
      .headers()
      .get(reqwest::header::CONTENT_TYPE)
      .and_then(|v| v.to_str().ok())
      .map(String::from);

    let body = response
      .bytes()
      .await
      .map_err(|e| eyre!("Failed to read body of {}: {}", path, e))?
      .to_vec();

    Ok(FetchedAsset {
      status,
      content_type,
      body,
    })
  }
}
