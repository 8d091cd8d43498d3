//! Console integration tests
//!
//! Drives the management console of a running registry over HTTP.

use std::sync::Arc;

use reqwest::redirect::Policy;
use reqwest::StatusCode;

use bam_core::config::BamConfig;
use bam_core::{App, AppInfo, AppKind};
use bam_server::tunnel::{LocalTunnel, TunnelProvider};
use bam_server::{AliasApp, Registry, WebServerApp};

struct Console {
    registry: Arc<Registry>,
    client: reqwest::Client,
    _site: tempfile::TempDir,
}

impl Console {
    async fn start() -> Self {
        let site = tempfile::tempdir().unwrap();
        std::fs::write(site.path().join("index.html"), "<h1>static</h1>").unwrap();

        let apps: Vec<Box<dyn App>> = vec![
            Box::new(AliasApp::new("godoc", 6060)),
            Box::new(WebServerApp::new("static", site.path())),
        ];
        // Nothing listens on the discard port, so sharing fails fast
        let tunnels: Arc<dyn TunnelProvider> = Arc::new(LocalTunnel::new("http://127.0.0.1:9"));
        let registry = Registry::with_apps(&BamConfig::default(), apps, tunnels);
        registry.start().await.unwrap();

        let client = reqwest::Client::builder()
            .redirect(Policy::none())
            .build()
            .unwrap();

        Self {
            registry,
            client,
            _site: site,
        }
    }

    async fn get(&self, path: &str) -> reqwest::Response {
        self.client
            .get(format!("http://127.0.0.1:{}{}", self.registry.port(), path))
            .send()
            .await
            .unwrap()
    }

    async fn stop(self) {
        self.registry.stop().await.unwrap();
    }
}

#[tokio::test]
async fn test_index_lists_every_app() {
    let console = Console::start().await;

    let res = console.get("/").await;
    assert_eq!(res.status(), StatusCode::OK);
    let body = res.text().await.unwrap();
    assert!(body.contains("http://bam.app"));
    assert!(body.contains("http://godoc.app"));
    assert!(body.contains("http://static.app"));
    assert!(body.contains("/apps/static/start"));

    console.stop().await;
}

#[tokio::test]
async fn test_api_apps() {
    let console = Console::start().await;

    let apps: Vec<AppInfo> = console.get("/api/apps").await.json().await.unwrap();
    let names: Vec<&str> = apps.iter().map(|a| a.name.as_str()).collect();
    assert_eq!(names, vec!["bam", "godoc", "static"]);
    assert_eq!(apps[0].kind, AppKind::Console);
    assert!(apps[0].running);
    assert_eq!(apps[1].port, 6060);
    assert!(!apps[2].running);

    console.stop().await;
}

#[tokio::test]
async fn test_start_stop_actions() {
    let console = Console::start().await;

    let res = console.get("/apps/static/start").await;
    assert_eq!(res.status(), StatusCode::FOUND);
    assert_eq!(res.headers()["location"], "/");

    let app = console.registry.get("static").unwrap();
    assert!(app.running());
    let port = app.port();
    let page = reqwest::get(format!("http://127.0.0.1:{}/", port))
        .await
        .unwrap()
        .text()
        .await
        .unwrap();
    assert!(page.contains("static"));

    let res = console.get("/apps/static/start").await;
    assert_eq!(res.status(), StatusCode::CONFLICT);
    assert!(res.text().await.unwrap().contains("Already started"));

    let res = console.get("/apps/static/stop").await;
    assert_eq!(res.status(), StatusCode::FOUND);
    assert!(!app.running());

    let res = console.get("/apps/static/stop").await;
    assert_eq!(res.status(), StatusCode::CONFLICT);
    assert!(res.text().await.unwrap().contains("Not started"));

    console.stop().await;
}

#[tokio::test]
async fn test_unknown_app_and_action() {
    let console = Console::start().await;

    let res = console.get("/apps/nope/start").await;
    assert_eq!(res.status(), StatusCode::NOT_FOUND);
    assert!(res.text().await.unwrap().contains("Application not found: nope"));

    let res = console.get("/apps/godoc/restart").await;
    assert_eq!(res.status(), StatusCode::NOT_FOUND);
    assert!(res.text().await.unwrap().contains("Unknown action: restart"));

    let res = console.get("/apps/nope").await;
    assert_eq!(res.status(), StatusCode::NOT_FOUND);

    console.stop().await;
}

#[tokio::test]
async fn test_share_failures_render_errors() {
    let console = Console::start().await;

    // Stopped app
    let res = console.get("/apps/static/share").await;
    assert_eq!(res.status(), StatusCode::CONFLICT);
    assert!(res.text().await.unwrap().contains("Not started"));

    // Tunnel server unreachable
    let res = console.get("/apps/godoc/share").await;
    assert_eq!(res.status(), StatusCode::INTERNAL_SERVER_ERROR);
    assert!(res.text().await.unwrap().contains("Tunnel error"));
    assert!(!console.registry.get("godoc").unwrap().shared());

    console.stop().await;
}

#[tokio::test]
async fn test_not_found_page() {
    let console = Console::start().await;

    let res = console.get("/not-found?app=ghost").await;
    assert_eq!(res.status(), StatusCode::NOT_FOUND);
    assert!(res
        .text()
        .await
        .unwrap()
        .contains("Application doesn&#39;t exist: ghost"));

    let res = console.get("/not-found?app=static").await;
    assert_eq!(res.status(), StatusCode::SERVICE_UNAVAILABLE);
    assert!(res.text().await.unwrap().contains("/apps/static/start"));

    let res = console.get("/not-found").await;
    assert_eq!(res.status(), StatusCode::NOT_FOUND);

    console.stop().await;
}

#[tokio::test]
async fn test_detail_and_assets() {
    let console = Console::start().await;

    let res = console.get("/apps/godoc").await;
    assert_eq!(res.status(), StatusCode::OK);
    let body = res.text().await.unwrap();
    assert!(body.contains("alias"));
    assert!(body.contains("6060"));

    let res = console.get("/assets/bam.css").await;
    assert_eq!(res.status(), StatusCode::OK);
    assert!(res.headers()["content-type"]
        .to_str()
        .unwrap()
        .starts_with("text/css"));

    let res = console.get("/assets/missing.png").await;
    assert_eq!(res.status(), StatusCode::NOT_FOUND);

    console.stop().await;
}

#[tokio::test]
async fn test_stop_registry_stops_apps() {
    let console = Console::start().await;
    console.get("/apps/static/start").await;
    let app = console.registry.get("static").unwrap();
    let port = app.port();
    assert!(app.running());

    let registry = console.registry.clone();
    console.stop().await;

    assert!(!registry.running());
    assert!(!app.running());
    assert!(!registry.get("godoc").unwrap().running());
    assert!(tokio::net::TcpStream::connect(("127.0.0.1", port)).await.is_err());
}
