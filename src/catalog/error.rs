use reqwest::StatusCode;
use thiserror::Error;

/// Failure at the remote catalog boundary.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ApiError {
  #[error("not found: {message}")]
  NotFound { message: String },

  #[error("request timed out: {message}")]
  Timeout { message: String },

  #[error("client error {code}: {message}")]
  Client { code: u16, message: String },

  #[error("server error {code}: {message}")]
  Server { code: u16, message: String },

  #[error("network error: {message}")]
  Network { message: String },

  #[error("unexpected error: {message}")]
  Unknown { message: String },
}

impl ApiError {
  /// Map a non-success HTTP status to an error kind.
  pub fn from_status(status: StatusCode, message: String) -> Self {
    let code = status.as_u16();
    match code {
      404 => ApiError::NotFound { message },
      408 => ApiError::Timeout { message },
      400..=499 => ApiError::Client { code, message },
      500..=599 => ApiError::Server { code, message },
      _ => ApiError::Network { message },
    }
  }

  pub fn is_not_found(&self) -> bool {
    matches!(self, ApiError::NotFound { .. })
  }
}

impl From<reqwest::Error> for ApiError {
  fn from(e: reqwest::Error) -> Self {
    let message = e.to_string();
    if e.is_timeout() {
      ApiError::Timeout {
        message: "Request timed out. Please try again.".to_string(),
      }
    } else if e.is_decode() {
      ApiError::Unknown { message }
    } else if let Some(status) = e.status() {
      ApiError::from_status(status, message)
    } else if e.is_connect() || e.is_request() || e.is_body() {
      ApiError::Network { message }
    } else {
      ApiError::Unknown { message }
    }
  }
}
