use thiserror::Error;

use crate::radio::Characteristic;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RadioError {
    #[error("advertising start failed: {0}")]
    StartFailed(String),
    #[error("advertisement payload rejected: {0}")]
    PayloadRejected(String),
    #[error("write to {0:?} characteristic failed: {1}")]
    WriteFailed(Characteristic, String),
    #[error("notify on {0:?} characteristic failed: {1}")]
    NotifyFailed(Characteristic, String),
}

#[derive(Error, Debug)]
pub enum NetworkError {
    #[error("request timed out")]
    Timeout,
    #[error("invalid url: {0}")]
    InvalidUrl(String),
    #[error("request failed: {0}")]
    Request(String),
}

impl From<reqwest::Error> for NetworkError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            NetworkError::Timeout
        } else {
            NetworkError::Request(err.to_string())
        }
    }
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("reading {path}: {source}")]
    Read {
        path: String,
        source: std::io::Error,
    },
    #[error("parsing config: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("invalid backend url {0:?}")]
    BackendUrl(String),
    #[error("no beacon id configured and no hardware address available")]
    NoIdentity,
}
