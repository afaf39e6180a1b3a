//! Service worker container: registration, lifecycle and fetch routing.

use hashbrown::HashMap;
use relay_net::{Fetch, NetError, Request, Response};
use std::sync::Arc;
use tokio::sync::{mpsc, RwLock};
use tracing::{debug, info, warn};
use url::Url;

use crate::client::{Client, Clients};
use crate::event::{ExtendableEvent, FetchEvent, LifecycleEventKind, ServiceWorkerHandler};
use crate::registration::{
    longest_matching_scope, resolve_scope, RegistrationOptions, ServiceWorkerRegistration,
};
use crate::scope::{GlobalScope, WorkerGlobalScope};
use crate::worker::{ServiceWorker, ServiceWorkerId, ServiceWorkerState};
use crate::ServiceWorkerError;

/// Service worker events.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ServiceWorkerEvent {
    /// State changed.
    StateChange {
        registration_scope: String,
        worker_id: ServiceWorkerId,
        new_state: ServiceWorkerState,
    },
    /// Update found.
    UpdateFound { registration_scope: String },
    /// Controller changed.
    ControllerChange {
        client_id: String,
        worker_id: ServiceWorkerId,
    },
}

/// A worker script paired with its global scope.
#[derive(Clone)]
struct RunningWorker {
    handler: Arc<dyn ServiceWorkerHandler>,
    global: Arc<WorkerGlobalScope>,
}

/// State shared between the container and the worker scopes it hands out.
pub(crate) struct HostState {
    pub(crate) registrations: RwLock<HashMap<String, ServiceWorkerRegistration>>,
    pub(crate) clients: RwLock<Clients>,
    pub(crate) event_tx: mpsc::UnboundedSender<ServiceWorkerEvent>,
    workers: RwLock<HashMap<ServiceWorkerId, RunningWorker>>,
    fetcher: Arc<dyn Fetch>,
}

impl HostState {
    fn emit(&self, event: ServiceWorkerEvent) {
        let _ = self.event_tx.send(event);
    }

    fn emit_state(&self, scope: &str, worker_id: ServiceWorkerId, new_state: ServiceWorkerState) {
        self.emit(ServiceWorkerEvent::StateChange {
            registration_scope: scope.to_string(),
            worker_id,
            new_state,
        });
    }
}

/// Service worker container (the host side of `navigator.serviceWorker`).
pub struct ServiceWorkerContainer {
    host: Arc<HostState>,
}

impl ServiceWorkerContainer {
    /// Create a new container that sends uncontrolled and forwarded requests to `fetcher`.
    pub fn new(fetcher: Arc<dyn Fetch>) -> (Self, mpsc::UnboundedReceiver<ServiceWorkerEvent>) {
        let (event_tx, event_rx) = mpsc::unbounded_channel();

        let host = Arc::new(HostState {
            registrations: RwLock::new(HashMap::new()),
            clients: RwLock::new(Clients::new()),
            event_tx,
            workers: RwLock::new(HashMap::new()),
            fetcher,
        });

        (Self { host }, event_rx)
    }

    /// Register a worker script and run it through install and, when
    /// allowed, activation. Returns the registration scope.
    pub async fn register(
        &self,
        script_url: &str,
        options: RegistrationOptions,
        handler: Arc<dyn ServiceWorkerHandler>,
    ) -> Result<String, ServiceWorkerError> {
        let script_url = Url::parse(script_url)
            .map_err(|e| ServiceWorkerError::RegistrationFailed(e.to_string()))?;
        let scope = resolve_scope(&script_url, options.scope.as_deref())?;
        let scope_str = scope.to_string();

        let worker = ServiceWorker::new(script_url);
        let worker_id = worker.id;
        let global = Arc::new(WorkerGlobalScope::new(
            worker_id,
            scope.clone(),
            Arc::clone(&self.host.fetcher),
            Arc::downgrade(&self.host),
        ));

        let displaced = {
            let mut registrations = self.host.registrations.write().await;
            registrations
                .entry(scope_str.clone())
                .or_insert_with(|| ServiceWorkerRegistration::new(scope))
                .begin_install(worker)
        };
        if let Some(old) = displaced {
            self.retire(&scope_str, old.id).await;
        }

        self.host.workers.write().await.insert(
            worker_id,
            RunningWorker {
                handler,
                global: Arc::clone(&global),
            },
        );

        info!(scope = %scope_str, worker = worker_id.raw(), "Installing service worker");
        self.host.emit(ServiceWorkerEvent::UpdateFound {
            registration_scope: scope_str.clone(),
        });
        self.host
            .emit_state(&scope_str, worker_id, ServiceWorkerState::Installing);

        if let Err(e) = self.install(&scope_str, worker_id).await {
            warn!(scope = %scope_str, error = %e, "Install failed");
            let failed = {
                let mut registrations = self.host.registrations.write().await;
                let failed = registrations
                    .get_mut(&scope_str)
                    .and_then(|r| r.install_failed(worker_id));
                // No registration outlives its last worker.
                if registrations.get(&scope_str).is_some_and(|r| r.is_empty()) {
                    registrations.remove(&scope_str);
                    debug!(scope = %scope_str, "Empty registration removed");
                }
                failed
            };
            if failed.is_some() {
                self.retire(&scope_str, worker_id).await;
            }
            return Err(e);
        }

        let displaced = {
            let mut registrations = self.host.registrations.write().await;
            registrations
                .get_mut(&scope_str)
                .ok_or_else(|| ServiceWorkerError::NotFound(scope_str.clone()))?
                .install_complete(worker_id)
        };
        if let Some(old) = displaced {
            self.retire(&scope_str, old.id).await;
        }
        self.host
            .emit_state(&scope_str, worker_id, ServiceWorkerState::Installed);

        if global.skip_waiting_requested() || !self.active_has_clients(&scope_str).await {
            self.activate(&scope_str).await?;
        } else {
            debug!(scope = %scope_str, worker = worker_id.raw(), "Worker waiting");
        }

        Ok(scope_str)
    }

    async fn install(
        &self,
        scope: &str,
        worker_id: ServiceWorkerId,
    ) -> Result<(), ServiceWorkerError> {
        let running = self.running(worker_id).await?;

        let mut event = ExtendableEvent::new(
            LifecycleEventKind::Install,
            running.global.clone() as Arc<dyn GlobalScope>,
        );
        running
            .handler
            .on_install(&mut event)
            .map_err(|e| ServiceWorkerError::InstallFailed(e.to_string()))?;

        for result in event.settle().await {
            result.map_err(|e| ServiceWorkerError::InstallFailed(e.to_string()))?;
        }

        debug!(scope = %scope, worker = worker_id.raw(), "Install event settled");
        Ok(())
    }

    /// Activate the waiting worker of `scope`.
    ///
    /// Activation completes only after every extension registered by the
    /// activate handler has settled. Extension failures are logged and do
    /// not prevent activation.
    pub async fn activate(&self, scope: &str) -> Result<(), ServiceWorkerError> {
        let (worker_id, previous) = {
            let mut registrations = self.host.registrations.write().await;
            registrations
                .get_mut(scope)
                .ok_or_else(|| ServiceWorkerError::NotFound(scope.to_string()))?
                .begin_activate()?
        };
        self.host
            .emit_state(scope, worker_id, ServiceWorkerState::Activating);

        if let Some(previous) = previous {
            // Pages of the replaced worker now belong to the new one.
            let moved = self
                .host
                .clients
                .write()
                .await
                .transfer(previous.id, worker_id);
            for client_id in moved {
                self.host
                    .emit(ServiceWorkerEvent::ControllerChange { client_id, worker_id });
            }
            self.retire(scope, previous.id).await;
        }

        let running = self.running(worker_id).await?;
        let mut event = ExtendableEvent::new(
            LifecycleEventKind::Activate,
            running.global.clone() as Arc<dyn GlobalScope>,
        );
        if let Err(e) = running.handler.on_activate(&mut event) {
            warn!(scope = %scope, error = %e, "Activate handler failed");
        }
        for result in event.settle().await {
            if let Err(e) = result {
                warn!(scope = %scope, error = %e, "Activate extension rejected");
            }
        }

        let activated = self
            .host
            .registrations
            .write()
            .await
            .get_mut(scope)
            .is_some_and(|r| r.activate_complete(worker_id));
        if activated {
            info!(scope = %scope, worker = worker_id.raw(), "Service worker activated");
            self.host
                .emit_state(scope, worker_id, ServiceWorkerState::Activated);
        }

        Ok(())
    }

    /// Drop a redundant worker's script and announce it.
    async fn retire(&self, scope: &str, worker_id: ServiceWorkerId) {
        self.host.workers.write().await.remove(&worker_id);
        self.host
            .emit_state(scope, worker_id, ServiceWorkerState::Redundant);
    }

    async fn running(&self, worker_id: ServiceWorkerId) -> Result<RunningWorker, ServiceWorkerError> {
        self.host
            .workers
            .read()
            .await
            .get(&worker_id)
            .cloned()
            .ok_or_else(|| ServiceWorkerError::NotFound(format!("worker {}", worker_id.raw())))
    }

    async fn active_has_clients(&self, scope: &str) -> bool {
        let active = self
            .host
            .registrations
            .read()
            .await
            .get(scope)
            .and_then(|r| r.get_active())
            .map(|w| w.id);

        match active {
            Some(id) => !self.host.clients.read().await.controlled_by(id).is_empty(),
            None => false,
        }
    }

    /// Active worker whose scope is the longest prefix of `url`.
    async fn active_worker_for(&self, url: &Url) -> Option<ServiceWorkerId> {
        let registrations = self.host.registrations.read().await;
        let scope = longest_matching_scope(registrations.keys().map(String::as_str), url)?;
        registrations
            .get(scope)
            .and_then(|r| r.get_active())
            .filter(|w| w.can_control())
            .map(|w| w.id)
    }

    /// Open a window client. It is controlled from the start when an active
    /// worker's scope covers its URL.
    pub async fn add_client(&self, url: &str) -> Result<Client, ServiceWorkerError> {
        let url = Url::parse(url).map_err(|e| ServiceWorkerError::InvalidUrl(e.to_string()))?;
        let mut client = Client::window(url);
        client.controller = self.active_worker_for(&client.url).await;

        self.host.clients.write().await.add(client.clone());
        Ok(client)
    }

    /// Close a client.
    pub async fn remove_client(&self, id: &str) -> Option<Client> {
        self.host.clients.write().await.remove(id)
    }

    /// Current controller of a client.
    pub async fn controller_of(&self, client_id: &str) -> Option<ServiceWorkerId> {
        self.host
            .clients
            .read()
            .await
            .get(client_id)
            .and_then(|c| c.controller)
    }

    /// Route a request from a page.
    ///
    /// Navigations go to the active worker whose scope covers the URL;
    /// subresource requests go to the client's controller. Requests nobody
    /// intercepts, or whose handler never responds, go to the network.
    pub async fn handle_fetch(
        &self,
        client_id: Option<&str>,
        request: Request,
        is_navigation: bool,
    ) -> Result<Response, NetError> {
        let controller = if is_navigation {
            self.active_worker_for(&request.url).await
        } else {
            match client_id {
                Some(id) => self.controller_of(id).await,
                None => None,
            }
        };

        let running = match controller {
            Some(id) => self.running(id).await.ok(),
            None => None,
        };
        let Some(running) = running else {
            debug!(url = %request.url, "Uncontrolled request");
            return self.host.fetcher.fetch(request).await;
        };

        let mut event = FetchEvent::new(
            request,
            client_id.map(str::to_string),
            is_navigation,
            running.global.clone() as Arc<dyn GlobalScope>,
        );
        let handled = running.handler.on_fetch(&mut event);
        let (request, response) = event.into_parts();

        match (response, handled) {
            (Some(response), _) => response.await,
            (None, Err(e)) => {
                warn!(url = %request.url, error = %e, "Fetch handler failed");
                self.host.fetcher.fetch(request).await
            }
            (None, Ok(())) => self.host.fetcher.fetch(request).await,
        }
    }

    /// Get the registration scope for a URL.
    pub async fn get_registration(&self, url: &str) -> Option<String> {
        let url = Url::parse(url).ok()?;
        let registrations = self.host.registrations.read().await;
        let scope = longest_matching_scope(registrations.keys().map(String::as_str), &url);
        scope.map(str::to_string)
    }

    /// Get all registrations.
    pub async fn get_registrations(&self) -> Vec<String> {
        self.host
            .registrations
            .read()
            .await
            .keys()
            .cloned()
            .collect()
    }

    /// State of the worker in each slot of a registration.
    pub async fn registration_state(
        &self,
        scope: &str,
    ) -> Option<[Option<(ServiceWorkerId, ServiceWorkerState)>; 3]> {
        let registrations = self.host.registrations.read().await;
        let registration = registrations.get(scope)?;
        let slot = |w: &Option<ServiceWorker>| w.as_ref().map(|w| (w.id, w.state));
        Some([
            slot(&registration.installing),
            slot(&registration.waiting),
            slot(&registration.active),
        ])
    }

    /// Number of worker scripts the host keeps loaded.
    pub async fn running_workers(&self) -> usize {
        self.host.workers.read().await.len()
    }

    /// Unregister a service worker.
    pub async fn unregister(&self, scope: &str) -> Result<bool, ServiceWorkerError> {
        let removed = self.host.registrations.write().await.remove(scope);
        let Some(mut registration) = removed else {
            return Ok(false);
        };

        for worker_id in registration.unregister() {
            self.host.clients.write().await.release(worker_id);
            self.retire(scope, worker_id).await;
        }
        info!(scope = %scope, "Service worker unregistered");
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::passthrough::PassthroughWorker;
    use relay_net::{LoaderConfig, ResourceLoader};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    /// Counts lifecycle calls and delegates to the passthrough worker.
    #[derive(Default)]
    struct Counting {
        installs: AtomicUsize,
        activates: AtomicUsize,
        fetches: AtomicUsize,
    }

    impl ServiceWorkerHandler for Counting {
        fn on_install(&self, event: &mut ExtendableEvent) -> Result<(), ServiceWorkerError> {
            self.installs.fetch_add(1, Ordering::SeqCst);
            PassthroughWorker.on_install(event)
        }

        fn on_activate(&self, event: &mut ExtendableEvent) -> Result<(), ServiceWorkerError> {
            self.activates.fetch_add(1, Ordering::SeqCst);
            PassthroughWorker.on_activate(event)
        }

        fn on_fetch(&self, event: &mut FetchEvent) -> Result<(), ServiceWorkerError> {
            self.fetches.fetch_add(1, Ordering::SeqCst);
            PassthroughWorker.on_fetch(event)
        }
    }

    /// Does nothing; stays waiting while an older worker has clients.
    struct Idle;

    impl ServiceWorkerHandler for Idle {}

    struct FailingInstall;

    impl ServiceWorkerHandler for FailingInstall {
        fn on_install(&self, event: &mut ExtendableEvent) -> Result<(), ServiceWorkerError> {
            event.wait_until(async { Err(ServiceWorkerError::StateError("no".into())) });
            Ok(())
        }
    }

    fn loader() -> Arc<dyn Fetch> {
        Arc::new(ResourceLoader::new(LoaderConfig::default()).unwrap())
    }

    fn drain(rx: &mut mpsc::UnboundedReceiver<ServiceWorkerEvent>) -> Vec<ServiceWorkerEvent> {
        let mut events = Vec::new();
        while let Ok(event) = rx.try_recv() {
            events.push(event);
        }
        events
    }

    async fn mock_server() -> MockServer {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/app/data.json"))
            .respond_with(
                ResponseTemplate::new(200)
                    .insert_header("x-origin", "upstream")
                    .set_body_raw(b"{\"ok\":true}".to_vec(), "application/json"),
            )
            .mount(&server)
            .await;
        Mock::given(path("/app/missing"))
            .respond_with(ResponseTemplate::new(404).set_body_string("gone"))
            .mount(&server)
            .await;
        server
    }

    #[tokio::test]
    async fn test_register_activates_and_claims() {
        let server = mock_server().await;
        let (container, mut rx) = ServiceWorkerContainer::new(loader());

        // Page opened before the worker exists.
        let client = container
            .add_client(&format!("{}/app/index.html", server.uri()))
            .await
            .unwrap();
        assert!(client.controller.is_none());

        let handler = Arc::new(Counting::default());
        let scope = container
            .register(
                &format!("{}/app/sw.js", server.uri()),
                RegistrationOptions::default(),
                handler.clone(),
            )
            .await
            .unwrap();
        assert_eq!(scope, format!("{}/app/", server.uri()));

        let [installing, waiting, active] = container.registration_state(&scope).await.unwrap();
        assert!(installing.is_none());
        assert!(waiting.is_none());
        let (active_id, state) = active.unwrap();
        assert_eq!(state, ServiceWorkerState::Activated);

        assert_eq!(handler.installs.load(Ordering::SeqCst), 1);
        assert_eq!(handler.activates.load(Ordering::SeqCst), 1);
        assert_eq!(container.controller_of(&client.id).await, Some(active_id));

        let events = drain(&mut rx);
        assert!(events.contains(&ServiceWorkerEvent::ControllerChange {
            client_id: client.id.clone(),
            worker_id: active_id,
        }));
        // Claim settles before activation is reported.
        let claim_at = events
            .iter()
            .position(|e| matches!(e, ServiceWorkerEvent::ControllerChange { .. }))
            .unwrap();
        let activated_at = events
            .iter()
            .position(|e| {
                matches!(
                    e,
                    ServiceWorkerEvent::StateChange {
                        new_state: ServiceWorkerState::Activated,
                        ..
                    }
                )
            })
            .unwrap();
        assert!(claim_at < activated_at);
    }

    #[tokio::test]
    async fn test_forwarded_response_matches_direct_fetch() {
        let server = mock_server().await;
        let fetcher = loader();
        let (container, _rx) = ServiceWorkerContainer::new(Arc::clone(&fetcher));
        let handler = Arc::new(Counting::default());
        container
            .register(
                &format!("{}/app/sw.js", server.uri()),
                RegistrationOptions::default(),
                handler.clone(),
            )
            .await
            .unwrap();
        let client = container
            .add_client(&format!("{}/app/", server.uri()))
            .await
            .unwrap();
        assert!(client.is_controlled());

        for path in ["/app/data.json", "/app/missing"] {
            let url = format!("{}{}", server.uri(), path);
            let direct = fetcher
                .fetch(Request::parse_get(&url).unwrap())
                .await
                .unwrap();
            let via_worker = container
                .handle_fetch(Some(&client.id), Request::parse_get(&url).unwrap(), false)
                .await
                .unwrap();

            assert_eq!(via_worker.status, direct.status);
            assert_eq!(via_worker.content_type, direct.content_type);
            assert_eq!(via_worker.content_length, direct.content_length);

            // Everything but the date the server stamped on each response.
            let mut worker_headers = via_worker.headers.clone();
            let mut direct_headers = direct.headers.clone();
            worker_headers.remove(http::header::DATE);
            direct_headers.remove(http::header::DATE);
            assert_eq!(worker_headers, direct_headers);
            assert_eq!(via_worker.bytes(), direct.bytes());
        }
        assert_eq!(handler.fetches.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_repeated_fetches_all_reach_network() {
        let server = MockServer::start().await;
        Mock::given(path("/app/counter"))
            .respond_with(ResponseTemplate::new(200).set_body_string("hit"))
            .expect(3)
            .mount(&server)
            .await;

        let (container, _rx) = ServiceWorkerContainer::new(loader());
        container
            .register(
                &format!("{}/app/sw.js", server.uri()),
                RegistrationOptions::default(),
                Arc::new(PassthroughWorker),
            )
            .await
            .unwrap();
        let client = container
            .add_client(&format!("{}/app/", server.uri()))
            .await
            .unwrap();

        let url = format!("{}/app/counter", server.uri());
        for _ in 0..3 {
            let response = container
                .handle_fetch(Some(&client.id), Request::parse_get(&url).unwrap(), false)
                .await
                .unwrap();
            assert_eq!(response.text().unwrap(), "hit");
        }
        server.verify().await;
    }

    #[tokio::test]
    async fn test_network_failure_is_transparent() {
        let port = {
            let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
            listener.local_addr().unwrap().port()
        };
        let origin = format!("http://127.0.0.1:{port}");
        let fetcher = loader();
        let (container, _rx) = ServiceWorkerContainer::new(Arc::clone(&fetcher));
        container
            .register(
                &format!("{origin}/sw.js"),
                RegistrationOptions::default(),
                Arc::new(PassthroughWorker),
            )
            .await
            .unwrap();
        let client = container.add_client(&format!("{origin}/")).await.unwrap();
        assert!(client.is_controlled());

        let url = format!("{origin}/page");
        let direct = fetcher
            .fetch(Request::parse_get(&url).unwrap())
            .await
            .unwrap_err();
        let via_worker = container
            .handle_fetch(Some(&client.id), Request::parse_get(&url).unwrap(), false)
            .await
            .unwrap_err();
        assert_eq!(via_worker.category(), direct.category());
        assert_eq!(via_worker.category(), "connect");
    }

    #[tokio::test]
    async fn test_navigation_routed_by_scope() {
        let server = mock_server().await;
        let (container, _rx) = ServiceWorkerContainer::new(loader());
        let handler = Arc::new(Counting::default());
        container
            .register(
                &format!("{}/app/sw.js", server.uri()),
                RegistrationOptions::default(),
                handler.clone(),
            )
            .await
            .unwrap();

        let inside = Request::parse_get(&format!("{}/app/data.json", server.uri())).unwrap();
        container.handle_fetch(None, inside, true).await.unwrap();
        assert_eq!(handler.fetches.load(Ordering::SeqCst), 1);

        // Outside the scope the worker never sees the request.
        let outside = Request::parse_get(&format!("{}/elsewhere", server.uri())).unwrap();
        let response = container.handle_fetch(None, outside, true).await.unwrap();
        assert_eq!(response.status.as_u16(), 404);
        assert_eq!(handler.fetches.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_update_cycles_do_not_accumulate() {
        let server = mock_server().await;
        let (container, mut rx) = ServiceWorkerContainer::new(loader());
        let client = container
            .add_client(&format!("{}/app/", server.uri()))
            .await
            .unwrap();
        let script = format!("{}/app/sw.js", server.uri());

        let mut previous: Option<ServiceWorkerId> = None;
        for _ in 0..3 {
            let handler = Arc::new(Counting::default());
            let scope = container
                .register(&script, RegistrationOptions::default(), handler.clone())
                .await
                .unwrap();

            assert_eq!(handler.installs.load(Ordering::SeqCst), 1);
            assert_eq!(handler.activates.load(Ordering::SeqCst), 1);
            assert_eq!(container.running_workers().await, 1);
            assert_eq!(container.get_registrations().await.len(), 1);

            let [_, waiting, active] = container.registration_state(&scope).await.unwrap();
            assert!(waiting.is_none());
            let (active_id, _) = active.unwrap();
            assert_eq!(container.controller_of(&client.id).await, Some(active_id));

            let events = drain(&mut rx);
            if let Some(old) = previous {
                assert_ne!(old, active_id);
                assert!(events.contains(&ServiceWorkerEvent::StateChange {
                    registration_scope: scope.clone(),
                    worker_id: old,
                    new_state: ServiceWorkerState::Redundant,
                }));
            }
            previous = Some(active_id);
        }
    }

    #[tokio::test]
    async fn test_worker_without_skip_waiting_waits_for_clients() {
        let server = mock_server().await;
        let (container, _rx) = ServiceWorkerContainer::new(loader());
        let script = format!("{}/app/sw.js", server.uri());
        let scope = container
            .register(&script, RegistrationOptions::default(), Arc::new(PassthroughWorker))
            .await
            .unwrap();
        let client = container
            .add_client(&format!("{}/app/", server.uri()))
            .await
            .unwrap();
        let first = container.controller_of(&client.id).await.unwrap();

        container
            .register(&script, RegistrationOptions::default(), Arc::new(Idle))
            .await
            .unwrap();
        let [_, waiting, active] = container.registration_state(&scope).await.unwrap();
        let (waiting_id, waiting_state) = waiting.unwrap();
        assert_eq!(waiting_state, ServiceWorkerState::Installed);
        assert_eq!(active.unwrap().0, first);

        container.activate(&scope).await.unwrap();
        assert_eq!(container.controller_of(&client.id).await, Some(waiting_id));
        assert_eq!(container.running_workers().await, 1);
    }

    #[tokio::test]
    async fn test_failed_install_becomes_redundant() {
        let (container, _rx) = ServiceWorkerContainer::new(loader());
        let err = container
            .register(
                "https://example.com/sw.js",
                RegistrationOptions::default(),
                Arc::new(FailingInstall),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceWorkerError::InstallFailed(_)));
        assert_eq!(container.running_workers().await, 0);

        assert!(container
            .registration_state("https://example.com/")
            .await
            .is_none());
        assert!(container.get_registrations().await.is_empty());
    }

    #[tokio::test]
    async fn test_failed_child_install_keeps_parent_scope() {
        let (container, _rx) = ServiceWorkerContainer::new(loader());
        container
            .register(
                "https://example.com/sw.js",
                RegistrationOptions::default(),
                Arc::new(PassthroughWorker),
            )
            .await
            .unwrap();

        let err = container
            .register(
                "https://example.com/app/sw.js",
                RegistrationOptions::default(),
                Arc::new(FailingInstall),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceWorkerError::InstallFailed(_)));

        let client = container
            .add_client("https://example.com/app/page")
            .await
            .unwrap();
        assert!(client.is_controlled());
        assert_eq!(
            container
                .get_registration("https://example.com/app/page")
                .await
                .as_deref(),
            Some("https://example.com/")
        );
        assert_eq!(
            container.get_registrations().await,
            vec!["https://example.com/".to_string()]
        );
    }

    #[tokio::test]
    async fn test_add_client_rejects_invalid_url() {
        let (container, _rx) = ServiceWorkerContainer::new(loader());
        let err = container.add_client("not a url").await.unwrap_err();
        assert!(matches!(err, ServiceWorkerError::InvalidUrl(_)));
    }

    #[tokio::test]
    async fn test_cross_origin_scope_rejected() {
        let (container, _rx) = ServiceWorkerContainer::new(loader());
        let err = container
            .register(
                "https://example.com/sw.js",
                RegistrationOptions::with_scope("https://evil.com/"),
                Arc::new(PassthroughWorker),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceWorkerError::SecurityError(_)));
        assert!(container.get_registrations().await.is_empty());
    }

    #[tokio::test]
    async fn test_get_registration_and_unregister() {
        let (container, _rx) = ServiceWorkerContainer::new(loader());
        container
            .register(
                "https://example.com/sw.js",
                RegistrationOptions::default(),
                Arc::new(PassthroughWorker),
            )
            .await
            .unwrap();
        let client = container.add_client("https://example.com/page").await.unwrap();
        assert!(client.is_controlled());

        let scope = container
            .get_registration("https://example.com/page")
            .await
            .unwrap();
        assert_eq!(scope, "https://example.com/");
        assert!(container.get_registration("https://other.com/").await.is_none());

        assert!(container.unregister(&scope).await.unwrap());
        assert!(!container.unregister(&scope).await.unwrap());
        assert!(container.get_registrations().await.is_empty());
        assert_eq!(container.running_workers().await, 0);
        assert!(container.controller_of(&client.id).await.is_none());
    }
}
