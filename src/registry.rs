//! Client registry
//!
//! The shared set of active clients, bounded by a maximum count.

use parking_lot::Mutex;
use tracing::debug;

use crate::client::Client;
use crate::error::AppError;
use crate::types::ClientId;

/// Registry of active clients
///
/// Entries keep insertion order, which is also broadcast order. Every
/// operation takes the same lock, so the capacity check and the insert
/// in `add` cannot be split by another caller.
#[derive(Debug)]
pub struct Registry {
    clients: Mutex<Vec<Client>>,
    max_clients: usize,
}

impl Registry {
    /// Create an empty registry holding at most `max_clients` entries
    pub fn new(max_clients: usize) -> Self {
        Self {
            clients: Mutex::new(Vec::with_capacity(max_clients)),
            max_clients,
        }
    }

    /// Register a client
    ///
    /// Fails with `CapacityExceeded` when full and `AlreadyRegistered`
    /// when the id is present.
    pub fn add(&self, client: Client) -> Result<(), AppError> {
        let mut clients = self.clients.lock();

        if clients.len() >= self.max_clients {
            return Err(AppError::CapacityExceeded {
                max: self.max_clients,
            });
        }
        if clients.iter().any(|c| c.id == client.id) {
            return Err(AppError::AlreadyRegistered(client.id));
        }

        debug!("Registering client {} ({})", client.id, client.name);
        clients.push(client);
        debug!("Total clients: {}", clients.len());
        Ok(())
    }

    /// Unregister a client
    ///
    /// Returns false when no entry has this id.
    pub fn remove(&self, id: ClientId) -> bool {
        let mut clients = self.clients.lock();

        let Some(index) = clients.iter().position(|c| c.id == id) else {
            return false;
        };
        clients.remove(index);
        debug!("Removed client {}, total clients: {}", id, clients.len());
        true
    }

    /// Copy of the current membership in insertion order
    pub fn snapshot(&self) -> Vec<Client> {
        self.clients.lock().clone()
    }

    /// Check whether a client is registered
    pub fn contains(&self, id: ClientId) -> bool {
        self.clients.lock().iter().any(|c| c.id == id)
    }

    /// Number of registered clients
    pub fn len(&self) -> usize {
        self.clients.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Check whether another client would be rejected
    pub fn is_full(&self) -> bool {
        self.len() >= self.max_clients
    }

    pub fn max_clients(&self) -> usize {
        self.max_clients
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use tokio::sync::mpsc;

    use super::*;
    use crate::types::DisplayName;

    fn client(id: u64, name: &str) -> Client {
        let (tx, _rx) = mpsc::channel(1);
        Client::new(
            ClientId(id),
            DisplayName::parse(name.as_bytes()).unwrap(),
            "127.0.0.1:4000".parse().unwrap(),
            tx,
        )
    }

    fn ids(registry: &Registry) -> Vec<u64> {
        registry.snapshot().iter().map(|c| c.id.0).collect()
    }

    #[test]
    fn test_registry_add_until_full() {
        let registry = Registry::new(4);

        for id in 1..=4 {
            registry.add(client(id, "user")).unwrap();
        }
        assert!(registry.is_full());

        let err = registry.add(client(5, "late")).unwrap_err();
        assert!(matches!(err, AppError::CapacityExceeded { max: 4 }));
        assert_eq!(registry.len(), 4);
    }

    #[test]
    fn test_registry_snapshot_exact_membership() {
        let registry = Registry::new(4);
        registry.add(client(3, "C")).unwrap();
        registry.add(client(1, "A")).unwrap();
        registry.add(client(2, "B")).unwrap();

        // Insertion order, each exactly once
        assert_eq!(ids(&registry), vec![3, 1, 2]);
    }

    #[test]
    fn test_registry_duplicate_id() {
        let registry = Registry::new(4);
        registry.add(client(1, "A")).unwrap();

        let err = registry.add(client(1, "A again")).unwrap_err();
        assert!(matches!(err, AppError::AlreadyRegistered(ClientId(1))));
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_registry_remove_missing() {
        let registry = Registry::new(4);
        registry.add(client(1, "A")).unwrap();
        registry.add(client(2, "B")).unwrap();

        assert!(!registry.remove(ClientId(9)));
        assert_eq!(ids(&registry), vec![1, 2]);
    }

    #[test]
    fn test_registry_remove_once() {
        let registry = Registry::new(4);
        registry.add(client(1, "A")).unwrap();
        registry.add(client(2, "B")).unwrap();

        assert!(registry.remove(ClientId(1)));
        assert!(!registry.remove(ClientId(1)));
        assert!(!registry.contains(ClientId(1)));
        assert_eq!(ids(&registry), vec![2]);

        // Freed slot can be reused by a new id
        registry.add(client(3, "C")).unwrap();
        assert_eq!(ids(&registry), vec![2, 3]);
    }

    #[test]
    fn test_registry_concurrent_add_remove() {
        let registry = Arc::new(Registry::new(4));

        let handles: Vec<_> = (0..8u64)
            .map(|worker| {
                let registry = Arc::clone(&registry);
                std::thread::spawn(move || {
                    for round in 0..200u64 {
                        let id = worker * 1000 + round;
                        if registry.add(client(id, "w")).is_ok() {
                            assert!(registry.len() <= 4);
                            assert!(registry.remove(ClientId(id)));
                        }
                        assert!(registry.len() <= 4);
                    }
                })
            })
            .collect();

        for handle in handles {
            handle.join().unwrap();
        }
        assert!(registry.is_empty());
    }

    #[test]
    fn test_registry_concurrent_last_slot() {
        let registry = Arc::new(Registry::new(4));
        for id in 1..=3 {
            registry.add(client(id, "early")).unwrap();
        }

        let handles: Vec<_> = (10..18u64)
            .map(|id| {
                let registry = Arc::clone(&registry);
                std::thread::spawn(move || registry.add(client(id, "racer")).is_ok())
            })
            .collect();

        let winners = handles
            .into_iter()
            .map(|h| h.join().unwrap())
            .filter(|won| *won)
            .count();
        assert_eq!(winners, 1);
        assert_eq!(registry.len(), 4);
    }
}
