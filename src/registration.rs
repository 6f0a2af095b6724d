use std::sync::Arc;
use std::time::Duration;

use log::{error, info, warn};

use crate::backend::{BackendApi, JSON};
use crate::identity::BeaconIdentity;
use crate::messages::RegisterRequest;
use crate::network::Network;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RegistrationOutcome {
    Registered(u16),
    Refused(u16),
    Failed,
}

/// First-contact announcement, sent once after the network comes up.
pub struct Registration {
    network: Arc<dyn Network>,
    backend: BackendApi,
    identity: BeaconIdentity,
    version: String,
}

impl Registration {
    pub fn new(
        network: Arc<dyn Network>,
        backend: BackendApi,
        identity: BeaconIdentity,
        version: String,
    ) -> Self {
        Registration {
            network,
            backend,
            identity,
            version,
        }
    }

    /// Sleeps between association checks so the periodic activities keep
    /// running, then makes a single attempt.
    pub async fn run(self, poll: Duration) -> RegistrationOutcome {
        if !self.network.is_associated() {
            info!("Waiting for network association before registering");
        }
        while !self.network.is_associated() {
            tokio::time::sleep(poll).await;
        }
        let outcome = self.register().await;
        info!("Registration task finished");
        outcome
    }

    async fn register(&self) -> RegistrationOutcome {
        let request = RegisterRequest {
            beacon_id: &self.identity.id,
            status: &self.identity.status,
            message: &self.identity.message,
            version: &self.version,
            device_name: &self.identity.display_name,
        };
        let body = match serde_json::to_string(&request) {
            Ok(body) => body,
            Err(err) => {
                error!("Could not encode registration: {}", err);
                return RegistrationOutcome::Failed;
            }
        };
        let url = match self.backend.register_url() {
            Ok(url) => url,
            Err(err) => {
                error!("Registration url: {}", err);
                return RegistrationOutcome::Failed;
            }
        };
        match self.network.post(&url, body, JSON).await {
            Ok(status) if (200..300).contains(&status) => {
                info!("Registered {:?} with backend (HTTP {})", self.identity.id, status);
                RegistrationOutcome::Registered(status)
            }
            Ok(status) => {
                warn!("Registration refused with HTTP {}", status);
                RegistrationOutcome::Refused(status)
            }
            Err(err) => {
                warn!("Registration failed: {}", err);
                RegistrationOutcome::Failed
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::NetworkError;
    use crate::identity::identity;
    use crate::testing::{FakeNetwork, settle};

    fn registration(network: &Arc<FakeNetwork>) -> Registration {
        Registration::new(
            network.clone(),
            BackendApi::new("http://backend.local").unwrap(),
            identity("B1", "Beacon Sala"),
            "1.0".to_string(),
        )
    }

    #[tokio::test]
    async fn test_posts_initial_identity_once() {
        let network = Arc::new(FakeNetwork::default());
        network.respond("/register", 201, "");

        let outcome = registration(&network).run(Duration::from_millis(500)).await;
        assert_eq!(outcome, RegistrationOutcome::Registered(201));
        assert_eq!(network.request_count(), 1);

        let request = network.last_request().unwrap();
        assert_eq!(request.method, "POST");
        assert_eq!(request.url, "http://backend.local/register");
        let body: serde_json::Value = serde_json::from_str(&request.body.unwrap()).unwrap();
        assert_eq!(body["beacon_id"], "B1");
        assert_eq!(body["device_name"], "Beacon Sala");
        assert_eq!(body["versao"], "1.0");
        assert_eq!(body["status"], "ativo");
        assert_eq!(body["mensagem"], "");
    }

    #[tokio::test]
    async fn test_failure_is_not_retried() {
        let network = Arc::new(FakeNetwork::default());
        network.fail("/register", NetworkError::Request("connection refused".to_string()));
        let outcome = registration(&network).run(Duration::from_millis(500)).await;
        assert_eq!(outcome, RegistrationOutcome::Failed);
        assert_eq!(network.request_count(), 1);

        let network = Arc::new(FakeNetwork::default());
        network.respond("/register", 500, "");
        let outcome = registration(&network).run(Duration::from_millis(500)).await;
        assert_eq!(outcome, RegistrationOutcome::Refused(500));
        assert_eq!(network.request_count(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_waits_for_association_without_blocking() {
        let network = Arc::new(FakeNetwork::default());
        network.set_associated(false);
        let poll = Duration::from_millis(500);
        let task = tokio::spawn(registration(&network).run(poll));

        tokio::time::sleep(poll * 10).await;
        assert_eq!(network.request_count(), 0);
        assert!(!task.is_finished());

        network.set_associated(true);
        tokio::time::sleep(poll).await;
        settle().await;
        assert_eq!(task.await.unwrap(), RegistrationOutcome::Registered(200));
        assert_eq!(network.request_count(), 1);
    }
}
