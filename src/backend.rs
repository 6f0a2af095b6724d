use reqwest::Url;

use crate::error::{ConfigError, NetworkError};

pub const JSON: &str = "application/json";

/// Endpoint addresses of the single backend the beacon reports to.
#[derive(Debug, Clone)]
pub struct BackendApi {
    base: Url,
}

impl BackendApi {
    pub fn new(base_url: &str) -> Result<Self, ConfigError> {
        let mut base =
            Url::parse(base_url).map_err(|_| ConfigError::BackendUrl(base_url.to_string()))?;
        if base.cannot_be_a_base() || !matches!(base.scheme(), "http" | "https") {
            return Err(ConfigError::BackendUrl(base_url.to_string()));
        }
        // Keep a configured path prefix when joining endpoint names.
        if !base.path().ends_with('/') {
            let path = format!("{}/", base.path());
            base.set_path(&path);
        }
        Ok(BackendApi { base })
    }

    pub fn heartbeat_url(&self, beacon_id: &str) -> Result<Url, NetworkError> {
        self.endpoint("heartbeat", Some(("beacon_id", beacon_id)))
    }

    pub fn config_url(&self, beacon_id: &str) -> Result<Url, NetworkError> {
        self.endpoint("config", Some(("id", beacon_id)))
    }

    pub fn register_url(&self) -> Result<Url, NetworkError> {
        self.endpoint("register", None)
    }

    fn endpoint(&self, name: &str, query: Option<(&str, &str)>) -> Result<Url, NetworkError> {
        let mut url = self
            .base
            .join(name)
            .map_err(|err| NetworkError::InvalidUrl(err.to_string()))?;
        if let Some((key, value)) = query {
            url.query_pairs_mut().append_pair(key, value);
        }
        Ok(url)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_endpoints_escape_id() {
        let api = BackendApi::new("http://192.168.0.10:8080").unwrap();
        assert_eq!(
            api.heartbeat_url("BEACON 1").unwrap().as_str(),
            "http://192.168.0.10:8080/heartbeat?beacon_id=BEACON+1"
        );
        assert_eq!(
            api.config_url("sala&id=2").unwrap().as_str(),
            "http://192.168.0.10:8080/config?id=sala%26id%3D2"
        );
        assert_eq!(
            api.register_url().unwrap().as_str(),
            "http://192.168.0.10:8080/register"
        );
    }

    #[test]
    fn test_path_prefix_is_kept() {
        let api = BackendApi::new("https://example.com/api/v1").unwrap();
        assert_eq!(
            api.register_url().unwrap().as_str(),
            "https://example.com/api/v1/register"
        );
    }

    #[test]
    fn test_rejects_non_http_base() {
        assert!(BackendApi::new("not a url").is_err());
        assert!(BackendApi::new("mailto:ops@example.com").is_err());
        assert!(BackendApi::new("ftp://example.com").is_err());
    }
}
