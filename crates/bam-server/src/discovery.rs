//! Discovery of apps from configuration and the apps directory
//!
//! Candidates are produced in registration order: aliases first, then
//! directories holding a `Procfile`, then directories holding an
//! `index.html`. A directory with both yields two candidates and the
//! registry keeps the first.

use std::path::{Path, PathBuf};

use bam_core::config::BamConfig;
use bam_core::procfile::PROCFILE;
use bam_core::types::app_name_from_dir;
use bam_core::App;

use crate::apps::{AliasApp, ProcessApp, WebServerApp, INDEX_FILE};

/// Scan configuration and `apps_dir` for apps
///
/// Never fails as a whole: an unreadable apps directory yields only the
/// aliases, and an app that fails to load is logged and skipped.
pub fn discover(config: &BamConfig) -> Vec<Box<dyn App>> {
    let mut apps = alias_apps(config);

    let dirs = app_dirs(&config.apps_dir);
    apps.extend(process_apps(&dirs, config));
    apps.extend(web_server_apps(&dirs));

    tracing::debug!(
        "Discovered {} app candidates in {}",
        apps.len(),
        config.apps_dir.display()
    );
    apps
}

fn alias_apps(config: &BamConfig) -> Vec<Box<dyn App>> {
    config
        .aliases
        .iter()
        .map(|(name, port)| Box::new(AliasApp::new(name.to_lowercase(), *port)) as Box<dyn App>)
        .collect()
}

fn process_apps(dirs: &[PathBuf], config: &BamConfig) -> Vec<Box<dyn App>> {
    let mut apps: Vec<Box<dyn App>> = Vec::new();

    for procfile in dirs.iter().map(|d| d.join(PROCFILE)).filter(|p| p.is_file()) {
        match ProcessApp::from_procfile(&procfile) {
            Ok(app) => apps.push(Box::new(app.with_grace_period(config.grace_period))),
            Err(e) => tracing::warn!("Unable to load application {}: {}", procfile.display(), e),
        }
    }

    apps
}

fn web_server_apps(dirs: &[PathBuf]) -> Vec<Box<dyn App>> {
    dirs.iter()
        .filter(|d| d.join(INDEX_FILE).is_file())
        .filter_map(|d| WebServerApp::from_dir(d))
        .map(|app| Box::new(app) as Box<dyn App>)
        .collect()
}

/// Visible subdirectories of `apps_dir`, sorted
fn app_dirs(apps_dir: &Path) -> Vec<PathBuf> {
    let entries = match std::fs::read_dir(apps_dir) {
        Ok(entries) => entries,
        Err(e) => {
            tracing::warn!("Unable to read apps directory {}: {}", apps_dir.display(), e);
            return Vec::new();
        }
    };

    let mut dirs: Vec<PathBuf> = entries
        .filter_map(|entry| entry.ok())
        .map(|entry| entry.path())
        .filter(|path| path.is_dir() && app_name_from_dir(path).is_some())
        .collect();
    dirs.sort();
    dirs
}
