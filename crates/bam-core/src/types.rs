//! Core domain types

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;

/// Which variant backs an app
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AppKind {
    /// The management console itself
    Console,
    /// Procfile-backed processes supervised by bam
    Process,
    /// Externally owned service on a fixed port
    Alias,
    /// Static directory served by bam
    WebServer,
}

impl fmt::Display for AppKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AppKind::Console => write!(f, "console"),
            AppKind::Process => write!(f, "process"),
            AppKind::Alias => write!(f, "alias"),
            AppKind::WebServer => write!(f, "web server"),
        }
    }
}

/// Snapshot of an app for listings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppInfo {
    pub name: String,
    pub kind: AppKind,
    /// 0 when not running (except aliases)
    pub port: u16,
    pub running: bool,
    /// Public URL while shared
    pub shared_url: Option<String>,
}

/// Derive an app name from its directory
///
/// Names are lowercased basenames, since hostnames are case-insensitive.
/// Hidden directories yield no name.
pub fn app_name_from_dir(dir: &Path) -> Option<String> {
    let base = dir.file_name()?.to_str()?;
    if base.is_empty() || base.starts_with('.') {
        return None;
    }
    Some(base.to_lowercase())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_app_name_from_dir() {
        assert_eq!(
            app_name_from_dir(Path::new("/home/me/.bam/apps/PyServer")),
            Some("pyserver".to_string())
        );
        assert_eq!(app_name_from_dir(Path::new("apps/ping")), Some("ping".to_string()));
        assert_eq!(app_name_from_dir(Path::new("apps/.git")), None);
        assert_eq!(app_name_from_dir(Path::new("/")), None);
    }

    #[test]
    fn test_app_kind_display() {
        assert_eq!(format!("{}", AppKind::WebServer), "web server");
        assert_eq!(format!("{}", AppKind::Alias), "alias");
    }

    #[test]
    fn test_app_info_json() {
        let info = AppInfo {
            name: "ping".into(),
            kind: AppKind::Process,
            port: 0,
            running: false,
            shared_url: None,
        };
        let json = serde_json::to_string(&info).unwrap();
        assert!(json.contains(r#""kind":"process""#));
    }
}
