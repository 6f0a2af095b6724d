use serde_derive::{Deserialize, Serialize};

/// Liveness record written to the status characteristic every publish tick.
#[derive(Debug, Serialize)]
pub struct StatusPayload<'a> {
    pub id: &'a str,
    /// Milliseconds since boot.
    pub timestamp: u64,
    pub status: &'static str,
}

/// Value the status characteristic holds before the first publish tick.
#[derive(Debug, Serialize)]
pub struct BootStatus<'a> {
    pub id: &'a str,
    #[serde(rename = "type")]
    pub kind: &'static str,
    pub version: &'a str,
}

/// Backend's view of who this beacon should be.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct RemoteConfigResponse {
    pub beacon_id: String,
    pub status: String,
    #[serde(rename = "mensagem")]
    pub message: String,
    pub device_name: String,
}

#[derive(Debug, Serialize)]
pub struct RegisterRequest<'a> {
    pub beacon_id: &'a str,
    pub status: &'a str,
    #[serde(rename = "mensagem")]
    pub message: &'a str,
    #[serde(rename = "versao")]
    pub version: &'a str,
    pub device_name: &'a str,
}
