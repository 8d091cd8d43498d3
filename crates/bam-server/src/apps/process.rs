//! Procfile-backed app

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;

use bam_core::procfile::{self, ENV_FILE};
use bam_core::types::app_name_from_dir;
use bam_core::{App, AppError, AppKind, DiscoveryError};

use super::group::{Launch, ProcessGroup};
use crate::ports;

/// Default time a process app gets to exit after SIGTERM
pub const DEFAULT_GRACE_PERIOD: Duration = Duration::from_secs(3);

/// Supervises the processes declared in one directory's Procfile
///
/// Each start allocates a fresh port and exports it as `PORT` to every
/// process of the group.
pub struct ProcessApp {
    name: String,
    dir: PathBuf,
    env: Vec<(String, String)>,
    processes: BTreeMap<String, String>,
    grace_period: Duration,
    group: Mutex<Option<ProcessGroup>>,
}

impl ProcessApp {
    /// Create an app from already parsed parts
    pub fn new(
        name: impl Into<String>,
        dir: impl Into<PathBuf>,
        env: Vec<(String, String)>,
        processes: BTreeMap<String, String>,
    ) -> Self {
        Self {
            name: name.into(),
            dir: dir.into(),
            env,
            processes,
            grace_period: DEFAULT_GRACE_PERIOD,
            group: Mutex::new(None),
        }
    }

    /// Load an app from a Procfile path and its optional sibling `.env`
    pub fn from_procfile(procfile: &Path) -> Result<Self, DiscoveryError> {
        let processes = procfile::load_procfile(procfile)?;

        let dir = procfile.parent().unwrap_or_else(|| Path::new("."));
        let name = app_name_from_dir(dir).ok_or_else(|| DiscoveryError::Io {
            path: dir.to_path_buf(),
            source: std::io::Error::new(
                std::io::ErrorKind::InvalidInput,
                "directory has no usable name",
            ),
        })?;
        let env = procfile::load_env(&dir.join(ENV_FILE))?;

        Ok(Self::new(name, dir, env, processes))
    }

    /// Override the SIGTERM grace period
    pub fn with_grace_period(mut self, grace_period: Duration) -> Self {
        self.grace_period = grace_period;
        self
    }

    /// Directory the processes run in
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Declared processes, `label -> command`
    pub fn processes(&self) -> &BTreeMap<String, String> {
        &self.processes
    }
}

#[async_trait]
impl App for ProcessApp {
    fn name(&self) -> &str {
        &self.name
    }

    fn port(&self) -> u16 {
        self.group
            .lock()
            .as_mut()
            .map(|g| if g.is_alive() { g.port() } else { 0 })
            .unwrap_or(0)
    }

    fn kind(&self) -> AppKind {
        AppKind::Process
    }

    async fn start(&self) -> Result<(), AppError> {
        if self.running() {
            return Err(AppError::AlreadyStarted);
        }

        // A group whose members all exited on their own is dropped here
        let stale = self.group.lock().take();
        drop(stale);

        let port = ports::free_port().map_err(AppError::PortAllocation)?;
        let launch = Launch {
            app: &self.name,
            dir: &self.dir,
            env: &self.env,
            port,
        };
        let group = ProcessGroup::spawn(&launch, &self.processes).await?;

        tracing::info!("App {} started on port {}", self.name, port);
        *self.group.lock() = Some(group);
        Ok(())
    }

    async fn stop(&self) -> Result<(), AppError> {
        if !self.running() {
            return Err(AppError::NotStarted);
        }

        let Some(group) = self.group.lock().take() else {
            return Err(AppError::NotStarted);
        };

        let result = group.stop(self.grace_period).await;
        tracing::info!("App {} stopped", self.name);
        result
    }

    fn running(&self) -> bool {
        self.group
            .lock()
            .as_mut()
            .map(|g| g.is_alive())
            .unwrap_or(false)
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;

    fn sleeper(dir: &Path) -> ProcessApp {
        let mut processes = BTreeMap::new();
        processes.insert("web".to_string(), "sleep 30".to_string());
        ProcessApp::new("sleeper", dir, Vec::new(), processes)
    }

    #[tokio::test]
    async fn test_start_stop_cycle() {
        let dir = tempfile::tempdir().unwrap();
        let app = sleeper(dir.path());

        assert!(!app.running());
        assert_eq!(app.port(), 0);

        app.start().await.unwrap();
        assert!(app.running());
        let port = app.port();
        assert_ne!(port, 0);

        assert!(matches!(app.start().await, Err(AppError::AlreadyStarted)));
        assert_eq!(app.port(), port);

        app.stop().await.unwrap();
        assert!(!app.running());
        assert_eq!(app.port(), 0);
        assert!(matches!(app.stop().await, Err(AppError::NotStarted)));
    }

    #[tokio::test]
    async fn test_port_is_exported() {
        let dir = tempfile::tempdir().unwrap();
        let mut processes = BTreeMap::new();
        processes.insert(
            "web".to_string(),
            "echo \"$PORT $OWNER\" > port.txt; sleep 30".to_string(),
        );
        let env = vec![("OWNER".to_string(), "master".to_string())];
        let app = ProcessApp::new("echo", dir.path(), env, processes);

        app.start().await.unwrap();
        let port = app.port();

        let path = dir.path().join("port.txt");
        let mut content = String::new();
        for _ in 0..100 {
            content = std::fs::read_to_string(&path).unwrap_or_default();
            if content.ends_with('\n') {
                break;
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
        assert_eq!(content.trim(), format!("{} master", port));

        app.stop().await.unwrap();
    }

    #[tokio::test]
    async fn test_restart_after_self_exit() {
        let dir = tempfile::tempdir().unwrap();
        let mut processes = BTreeMap::new();
        processes.insert("web".to_string(), "true".to_string());
        let app = ProcessApp::new("short", dir.path(), Vec::new(), processes);

        app.start().await.unwrap();
        for _ in 0..50 {
            if !app.running() {
                break;
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
        assert!(!app.running());
        assert_eq!(app.port(), 0);

        // Stopped state again, so start is allowed
        app.start().await.unwrap();
    }

    #[tokio::test]
    async fn test_from_procfile() {
        let dir = tempfile::tempdir().unwrap();
        let app_dir = dir.path().join("Ping");
        std::fs::create_dir(&app_dir).unwrap();
        std::fs::write(app_dir.join("Procfile"), "web: ./ping -p $PORT\n").unwrap();
        std::fs::write(app_dir.join(".env"), "OWNER=master\n").unwrap();

        let app = ProcessApp::from_procfile(&app_dir.join("Procfile")).unwrap();
        assert_eq!(app.name(), "ping");
        assert_eq!(app.dir(), app_dir.as_path());
        assert_eq!(app.processes()["web"], "./ping -p $PORT");
        assert_eq!(app.env, vec![("OWNER".to_string(), "master".to_string())]);
    }
}
