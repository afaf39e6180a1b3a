//! Clients: pages a service worker may control.

use hashbrown::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use url::Url;

use crate::worker::ServiceWorkerId;

/// A client (controlled page).
#[derive(Debug, Clone)]
pub struct Client {
    /// Client ID.
    pub id: String,

    /// Client URL.
    pub url: Url,

    /// Worker currently controlling this client.
    pub controller: Option<ServiceWorkerId>,
}

impl Client {
    /// Create an uncontrolled window client.
    pub fn window(url: Url) -> Self {
        Self {
            id: next_client_id(),
            url,
            controller: None,
        }
    }

    /// Whether a worker controls this client.
    pub fn is_controlled(&self) -> bool {
        self.controller.is_some()
    }
}

/// Clients known to the host.
#[derive(Debug, Default)]
pub struct Clients {
    clients: HashMap<String, Client>,
}

impl Clients {
    /// Create new clients manager.
    pub fn new() -> Self {
        Self::default()
    }

    /// Get a client by ID.
    pub fn get(&self, id: &str) -> Option<&Client> {
        self.clients.get(id)
    }

    /// Clients controlled by `worker`.
    pub fn controlled_by(&self, worker: ServiceWorkerId) -> Vec<&Client> {
        self.clients
            .values()
            .filter(|c| c.controller == Some(worker))
            .collect()
    }

    /// Make `worker` the controller of every client `in_scope` accepts.
    ///
    /// Returns the ids of clients whose controller changed.
    pub fn claim<F>(&mut self, worker: ServiceWorkerId, in_scope: F) -> Vec<String>
    where
        F: Fn(&Url) -> bool,
    {
        self.clients
            .values_mut()
            .filter(|c| c.controller != Some(worker) && in_scope(&c.url))
            .map(|c| {
                c.controller = Some(worker);
                c.id.clone()
            })
            .collect()
    }

    /// Hand every client of `from` over to `to`. Returns the ids moved.
    pub fn transfer(&mut self, from: ServiceWorkerId, to: ServiceWorkerId) -> Vec<String> {
        self.reassign(from, Some(to))
    }

    /// Clear the controller of every client of `worker`. Returns the ids released.
    pub fn release(&mut self, worker: ServiceWorkerId) -> Vec<String> {
        self.reassign(worker, None)
    }

    fn reassign(&mut self, from: ServiceWorkerId, to: Option<ServiceWorkerId>) -> Vec<String> {
        self.clients
            .values_mut()
            .filter(|c| c.controller == Some(from))
            .map(|c| {
                c.controller = to;
                c.id.clone()
            })
            .collect()
    }

    /// Add a client.
    pub fn add(&mut self, client: Client) {
        self.clients.insert(client.id.clone(), client);
    }

    /// Remove a client.
    pub fn remove(&mut self, id: &str) -> Option<Client> {
        self.clients.remove(id)
    }

    pub fn len(&self) -> usize {
        self.clients.len()
    }

    pub fn is_empty(&self) -> bool {
        self.clients.is_empty()
    }
}

fn next_client_id() -> String {
    static COUNTER: AtomicU64 = AtomicU64::new(1);
    format!("client-{}", COUNTER.fetch_add(1, Ordering::Relaxed))
}
