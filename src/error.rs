use thiserror::Error;


/// Errors raised while reading datasets and configurations.

#[derive(Error, Debug)]
pub enum Error {
  #[error("IO error: {0}")]
  Io(#[from] std::io::Error),
  #[error("JSON error: {0}")]
  Json(#[from] serde_json::Error),
  #[error("Malformed data: {0}")]
  Format(String),
  #[error("Invalid configuration: {0}")]
  Config(String),
}

pub type Result<T> = std::result::Result<T, Error>;
