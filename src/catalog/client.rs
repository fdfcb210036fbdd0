use std::time::Duration;

use async_trait::async_trait;
use reqwest::Response;
use tracing::debug;
use url::Url;

use crate::catalog::api_types::{ApiErrorBody, CharacterDto, PageResponse};
use crate::catalog::error::ApiError;
use crate::config::ApiConfig;

/// Remote source of catalog pages.
///
/// Implementations perform no retries; every failure is returned as a typed
/// [`ApiError`] for the caller to interpret.
#[async_trait]
pub trait CatalogApi: Send + Sync {
  /// Fetch one page (1-based), optionally filtered by name.
  async fn fetch_page(&self, page: u32, name: Option<&str>) -> Result<PageResponse, ApiError>;

  /// Fetch a single character by id.
  async fn fetch_by_id(&self, id: i64) -> Result<CharacterDto, ApiError>;
}

/// Catalog API client over HTTP
#[derive(Clone)]
pub struct CatalogClient {
  http: reqwest::Client,
  base_url: Url,
}

impl CatalogClient {
  pub fn new(config: &ApiConfig) -> Result<Self, ApiError> {
    // Url::join drops the last segment unless the base ends with '/'
    let mut base = config.base_url.trim().to_string();
    if !base.ends_with('/') {
      base.push('/');
    }
    let base_url = Url::parse(&base).map_err(|e| ApiError::Unknown {
      message: format!("Invalid API base URL {}: {}", base, e),
    })?;

    let http = reqwest::Client::builder()
      .timeout(Duration::from_secs(config.timeout_secs))
      .build()?;

    Ok(Self { http, base_url })
  }

  fn endpoint(&self, path: &str) -> Result<Url, ApiError> {
    self.base_url.join(path).map_err(|e| ApiError::Unknown {
      message: format!("Invalid endpoint {}: {}", path, e),
    })
  }

  /// Turn a non-success response into an error, reading the API's `error` field if present.
  async fn check(response: Response) -> Result<Response, ApiError> {
    let status = response.status();
    if status.is_success() {
      return Ok(response);
    }

    let fallback = status
      .canonical_reason()
      .unwrap_or("Request failed")
      .to_string();
    let message = match response.text().await {
      Ok(body) if !body.trim().is_empty() => serde_json::from_str::<ApiErrorBody>(&body)
        .ok()
        .map(|b| b.error)
        .filter(|e| !e.is_empty())
        .unwrap_or(fallback),
      _ => fallback,
    };

    Err(ApiError::from_status(status, message))
  }
}

#[async_trait]
impl CatalogApi for CatalogClient {
  async fn fetch_page(&self, page: u32, name: Option<&str>) -> Result<PageResponse, ApiError> {
    let mut url = self.endpoint("character")?;
    {
      let mut query = url.query_pairs_mut();
      query.append_pair("page", &page.to_string());
      if let Some(name) = name {
        query.append_pair("name", name);
      }
    }

    debug!(%url, page, "fetching catalog page");
    let response = Self::check(self.http.get(url).send().await?).await?;
    Ok(response.json::<PageResponse>().await?)
  }

  async fn fetch_by_id(&self, id: i64) -> Result<CharacterDto, ApiError> {
    let url = self.endpoint(&format!("character/{}", id))?;

    debug!(%url, id, "fetching character");
    let response = Self::check(self.http.get(url).send().await?).await?;
    Ok(response.json::<CharacterDto>().await?)
  }
}
