//! The app registry and orchestrator
//!
//! The registry owns every discovered app, wrapped for sharing, and is an
//! app itself: starting it brings up the management console. The name to
//! app table is frozen at construction, so lookups take no lock.

use std::collections::BTreeMap;
use std::net::{Ipv4Addr, SocketAddr};
use std::str::FromStr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};

use async_trait::async_trait;
use parking_lot::Mutex;
use thiserror::Error;
use tokio::task::JoinHandle;

use bam_core::config::BamConfig;
use bam_core::{App, AppError, AppInfo, AppKind};

use crate::apps::ShareableApp;
use crate::console;
use crate::discovery;
use crate::server::HttpServer;
use crate::tunnel::TunnelProvider;

/// Reserved name of the registry (and its console)
pub const REGISTRY_NAME: &str = "bam";

/// Console actions that can be dispatched by app name
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    Start,
    Stop,
    Share,
    Unshare,
}

impl Action {
    pub fn as_str(&self) -> &'static str {
        match self {
            Action::Start => "start",
            Action::Stop => "stop",
            Action::Share => "share",
            Action::Unshare => "unshare",
        }
    }

    fn verb(&self) -> &'static str {
        match self {
            Action::Start => "Starting",
            Action::Stop => "Stopping",
            Action::Share => "Sharing",
            Action::Unshare => "Unsharing",
        }
    }
}

impl FromStr for Action {
    type Err = ActionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "start" => Ok(Action::Start),
            "stop" => Ok(Action::Stop),
            "share" => Ok(Action::Share),
            "unshare" => Ok(Action::Unshare),
            other => Err(ActionError::UnknownAction(other.to_string())),
        }
    }
}

/// Why a dispatched action failed
#[derive(Error, Debug)]
pub enum ActionError {
    #[error("Application not found: {0}")]
    NotFound(String),

    #[error("Unknown action: {0}")]
    UnknownAction(String),

    #[error(transparent)]
    App(#[from] AppError),
}

struct Entry {
    app: Arc<ShareableApp>,
    /// Serializes actions on this app
    guard: tokio::sync::Mutex<()>,
}

/// Collects apps before the registry is frozen
pub struct RegistryBuilder {
    tld: String,
    auto_start: bool,
    console_port: u16,
    tunnels: Arc<dyn TunnelProvider>,
    apps: BTreeMap<String, Entry>,
}

impl RegistryBuilder {
    pub fn new(config: &BamConfig, tunnels: Arc<dyn TunnelProvider>) -> Self {
        Self {
            tld: config.tld.to_lowercase(),
            auto_start: config.auto_start,
            console_port: config.console_port,
            tunnels,
            apps: BTreeMap::new(),
        }
    }

    /// Register an app unless its name is taken; the first one wins
    pub fn register(&mut self, app: Box<dyn App>) -> bool {
        let name = app.name().to_string();
        if name == REGISTRY_NAME || self.apps.contains_key(&name) {
            tracing::warn!("Ignoring {} app {}: name already registered", app.kind(), name);
            return false;
        }

        let entry = Entry {
            app: Arc::new(ShareableApp::new(app, self.tunnels.clone())),
            guard: tokio::sync::Mutex::new(()),
        };
        self.apps.insert(name, entry);
        true
    }

    pub fn build(self) -> Arc<Registry> {
        Arc::new_cyclic(|me| Registry {
            me: me.clone(),
            tld: self.tld,
            auto_start: self.auto_start,
            console_port: self.console_port,
            apps: self.apps,
            console: Mutex::new(None),
            closing: AtomicBool::new(false),
        })
    }
}

/// Owns all apps and runs the management console
pub struct Registry {
    me: Weak<Registry>,
    tld: String,
    auto_start: bool,
    console_port: u16,
    apps: BTreeMap<String, Entry>,
    console: Mutex<Option<HttpServer>>,
    /// Set while the registry stops, so pending bulk starts back off
    closing: AtomicBool,
}

impl Registry {
    /// Discover apps per `config` and register them in discovery order
    pub fn new(config: &BamConfig, tunnels: Arc<dyn TunnelProvider>) -> Arc<Self> {
        Self::with_apps(config, discovery::discover(config), tunnels)
    }

    /// Register the given apps instead of scanning
    pub fn with_apps(
        config: &BamConfig,
        apps: Vec<Box<dyn App>>,
        tunnels: Arc<dyn TunnelProvider>,
    ) -> Arc<Self> {
        let mut builder = RegistryBuilder::new(config, tunnels);
        for app in apps {
            builder.register(app);
        }

        let registry = builder.build();
        tracing::info!("Registered {} apps", registry.apps.len());
        registry
    }

    /// Local top-level domain, lowercased
    pub fn tld(&self) -> &str {
        &self.tld
    }

    /// A managed app by name
    ///
    /// Repeated lookups return the same instance.
    pub fn get(&self, name: &str) -> Option<Arc<ShareableApp>> {
        self.apps.get(name).map(|e| e.app.clone())
    }

    /// Any addressable app by name, the registry itself included
    pub fn lookup(&self, name: &str) -> Option<&dyn App> {
        if name == REGISTRY_NAME {
            return Some(self as &dyn App);
        }
        self.apps.get(name).map(|e| e.app.as_ref() as &dyn App)
    }

    /// Managed apps, sorted by name
    pub fn apps(&self) -> impl Iterator<Item = &Arc<ShareableApp>> {
        self.apps.values().map(|e| &e.app)
    }

    /// Snapshot of every app, console first
    pub fn infos(&self) -> Vec<AppInfo> {
        std::iter::once(self.info())
            .chain(self.apps().map(|app| app.info()))
            .collect()
    }

    /// Run `action` on the app called `name`
    ///
    /// Actions on one app are serialized; actions on different apps run
    /// concurrently.
    pub async fn dispatch(&self, name: &str, action: Action) -> Result<(), ActionError> {
        let entry = self
            .apps
            .get(name)
            .ok_or_else(|| ActionError::NotFound(name.to_string()))?;

        let _guard = entry.guard.lock().await;
        Self::run(name, entry, action).await.map_err(ActionError::App)
    }

    /// Run `action` with the entry's guard already held
    async fn run(name: &str, entry: &Entry, action: Action) -> Result<(), AppError> {
        tracing::info!("{} app {}", action.verb(), name);

        let result = match action {
            Action::Start => entry.app.start().await,
            Action::Stop => entry.app.stop().await,
            Action::Share => entry.app.share().await,
            Action::Unshare => entry.app.unshare().await,
        };

        if let Err(e) = &result {
            tracing::warn!("Failed to {} {}: {}", action.as_str(), name, e);
        }
        result
    }

    /// Start every app on its own task
    ///
    /// Failures are logged by each task; the handles are only useful to
    /// callers that want to wait.
    pub fn start_apps(self: &Arc<Self>) -> Vec<JoinHandle<()>> {
        self.apps
            .keys()
            .map(|name| {
                let registry = self.clone();
                let name = name.clone();
                tokio::spawn(async move {
                    let Some(entry) = registry.apps.get(&name) else {
                        return;
                    };
                    let _guard = entry.guard.lock().await;
                    if !registry.closing.load(Ordering::SeqCst) {
                        let _ = Self::run(&name, entry, Action::Start).await;
                    }
                })
            })
            .collect()
    }

    /// Stop every running app concurrently and wait for all of them
    ///
    /// Each stop waits for in-flight actions on its app, so a start already
    /// underway finishes first and is then stopped.
    pub async fn stop_apps(&self) {
        let stops = self.apps.iter().map(|(name, entry)| async move {
            let _guard = entry.guard.lock().await;
            if entry.app.running() {
                let _ = Self::run(name, entry, Action::Stop).await;
            }
        });

        futures::future::join_all(stops).await;
    }

    fn handle(&self) -> Result<Arc<Self>, AppError> {
        self.me.upgrade().ok_or_else(|| {
            AppError::Io(std::io::Error::new(
                std::io::ErrorKind::Other,
                "registry is shutting down",
            ))
        })
    }
}

#[async_trait]
impl App for Registry {
    fn name(&self) -> &str {
        REGISTRY_NAME
    }

    fn port(&self) -> u16 {
        match self.console.lock().as_ref() {
            Some(server) if server.is_serving() => server.port(),
            _ => 0,
        }
    }

    fn kind(&self) -> AppKind {
        AppKind::Console
    }

    async fn start(&self) -> Result<(), AppError> {
        if self.running() {
            return Err(AppError::AlreadyStarted);
        }

        let registry = self.handle()?;
        self.closing.store(false, Ordering::SeqCst);
        let addr = SocketAddr::from((Ipv4Addr::LOCALHOST, self.console_port));
        let server = HttpServer::bind(addr, console::router(registry.clone()), "Console").await?;

        tracing::info!(
            "Console listening on http://{}.{} (port {})",
            REGISTRY_NAME,
            self.tld,
            server.port()
        );
        *self.console.lock() = Some(server);

        if self.auto_start {
            registry.start_apps();
        }
        Ok(())
    }

    async fn stop(&self) -> Result<(), AppError> {
        if !self.running() {
            return Err(AppError::NotStarted);
        }

        self.closing.store(true, Ordering::SeqCst);
        self.stop_apps().await;

        let server = self.console.lock().take();
        if let Some(server) = server {
            server.shutdown().await;
        }
        tracing::info!("Console stopped");
        Ok(())
    }

    fn running(&self) -> bool {
        self.console
            .lock()
            .as_ref()
            .map(|s| s.is_serving())
            .unwrap_or(false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::apps::AliasApp;
    use crate::tunnel::LocalTunnel;

    fn tunnels() -> Arc<dyn TunnelProvider> {
        Arc::new(LocalTunnel::new("http://127.0.0.1:9"))
    }

    fn registry(apps: Vec<Box<dyn App>>) -> Arc<Registry> {
        Registry::with_apps(&BamConfig::default(), apps, tunnels())
    }

    #[test]
    fn test_action_from_str() {
        assert_eq!("start".parse::<Action>().unwrap(), Action::Start);
        assert_eq!("unshare".parse::<Action>().unwrap(), Action::Unshare);
        assert!(matches!(
            "restart".parse::<Action>(),
            Err(ActionError::UnknownAction(a)) if a == "restart"
        ));
    }

    #[tokio::test]
    async fn test_first_registration_wins() {
        let registry = registry(vec![
            Box::new(AliasApp::new("godoc", 6060)),
            Box::new(AliasApp::new("godoc", 7070)),
            Box::new(AliasApp::new(REGISTRY_NAME, 8080)),
        ]);

        assert_eq!(registry.apps().count(), 1);
        assert_eq!(registry.get("godoc").unwrap().port(), 6060);
        assert!(registry.get(REGISTRY_NAME).is_none());
    }

    #[tokio::test]
    async fn test_get_is_stable() {
        let registry = registry(vec![Box::new(AliasApp::new("godoc", 6060))]);
        let a = registry.get("godoc").unwrap();
        let b = registry.get("godoc").unwrap();
        assert!(Arc::ptr_eq(&a, &b));
        assert!(registry.get("missing").is_none());
    }

    #[tokio::test]
    async fn test_registry_is_an_app() {
        let registry = registry(vec![Box::new(AliasApp::new("godoc", 6060))]);

        let me = registry.lookup(REGISTRY_NAME).unwrap();
        assert_eq!(me.kind(), AppKind::Console);
        assert!(!me.running());

        let infos = registry.infos();
        assert_eq!(infos[0].name, REGISTRY_NAME);
        assert_eq!(infos[1].name, "godoc");

        registry.start().await.unwrap();
        assert!(registry.running());
        assert_ne!(registry.port(), 0);
        assert!(matches!(registry.start().await, Err(AppError::AlreadyStarted)));

        registry.stop().await.unwrap();
        assert!(!registry.running());
        assert_eq!(registry.port(), 0);
        assert!(matches!(registry.stop().await, Err(AppError::NotStarted)));
    }

    #[tokio::test]
    async fn test_dispatch() {
        let registry = registry(vec![Box::new(AliasApp::new("godoc", 6060))]);

        registry.dispatch("godoc", Action::Stop).await.unwrap();
        assert!(!registry.get("godoc").unwrap().running());

        assert!(matches!(
            registry.dispatch("godoc", Action::Share).await,
            Err(ActionError::App(AppError::NotStarted))
        ));
        assert!(matches!(
            registry.dispatch("nope", Action::Start).await,
            Err(ActionError::NotFound(n)) if n == "nope"
        ));
    }

    #[tokio::test]
    async fn test_stop_apps_stops_running() {
        let registry = registry(vec![
            Box::new(AliasApp::new("a", 1001)),
            Box::new(AliasApp::new("b", 1002)),
        ]);

        registry.stop_apps().await;
        assert!(registry.apps().all(|app| !app.running()));

        for handle in registry.start_apps() {
            handle.await.unwrap();
        }
        assert!(registry.apps().all(|app| app.running()));
    }
}
