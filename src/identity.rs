use std::sync::Arc;

use tokio::sync::watch;

/// Self-descriptive record the beacon advertises and reports.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BeaconIdentity {
    pub id: String,
    pub display_name: String,
    pub status: String,
    pub message: String,
}

/// Canonical identity, published as a whole record.
///
/// Readers take a snapshot of the full record; a commit replaces it in one
/// step, so no reader can see fields from two different commits.
#[derive(Debug, Clone)]
pub struct IdentityStore {
    tx: Arc<watch::Sender<BeaconIdentity>>,
}

impl IdentityStore {
    pub fn new(initial: BeaconIdentity) -> Self {
        let (tx, _) = watch::channel(initial);
        IdentityStore { tx: Arc::new(tx) }
    }

    pub fn snapshot(&self) -> BeaconIdentity {
        self.tx.borrow().clone()
    }

    /// Replaces the record, returning false when it was already identical.
    pub fn commit(&self, identity: BeaconIdentity) -> bool {
        self.tx.send_if_modified(|current| {
            if *current == identity {
                return false;
            }
            *current = identity;
            true
        })
    }
}

#[cfg(test)]
pub(crate) fn identity(id: &str, name: &str) -> BeaconIdentity {
    BeaconIdentity {
        id: id.to_string(),
        display_name: name.to_string(),
        status: "ativo".to_string(),
        message: String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_commit_replaces_whole_record() {
        let store = IdentityStore::new(identity("B1", "Beacon Sala"));
        let next = BeaconIdentity {
            id: "B2".to_string(),
            display_name: "Beacon Cozinha".to_string(),
            status: "ativo".to_string(),
            message: "ok".to_string(),
        };
        assert!(store.commit(next.clone()));
        assert_eq!(store.snapshot(), next);
        assert!(!store.commit(next));
    }

    #[test]
    fn test_concurrent_readers_never_tear() {
        let store = IdentityStore::new(identity("A", "A"));
        let writer = {
            let store = store.clone();
            std::thread::spawn(move || {
                for i in 0..2000 {
                    let tag = if i % 2 == 0 { "B" } else { "A" };
                    store.commit(identity(tag, tag));
                }
            })
        };
        let readers = (0..4)
            .map(|_| {
                let store = store.clone();
                std::thread::spawn(move || {
                    for _ in 0..2000 {
                        let seen = store.snapshot();
                        assert_eq!(seen.id, seen.display_name);
                    }
                })
            })
            .collect::<Vec<_>>();
        writer.join().unwrap();
        for reader in readers {
            reader.join().unwrap();
        }
    }
}
