//! Procfile and `.env` parsing
//!
//! A Procfile maps process labels to shell command templates:
//!
//! ```text
//! web: ./ping -p $PORT
//! worker: bundle exec sidekiq
//! ```
//!
//! A `.env` file holds `KEY=VALUE` pairs passed to every process of the app.

use std::collections::BTreeMap;
use std::io;
use std::path::Path;

use crate::error::DiscoveryError;

/// Procfile file name
pub const PROCFILE: &str = "Procfile";

/// Environment file name
pub const ENV_FILE: &str = ".env";

/// Parse Procfile content into `label -> command`
///
/// Blank lines and `#` comments are ignored. A later entry with the same
/// label replaces the earlier one.
pub fn parse_procfile(content: &str) -> Result<BTreeMap<String, String>, DiscoveryError> {
    let mut processes = BTreeMap::new();

    for (idx, raw) in content.lines().enumerate() {
        let line = raw.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }

        let invalid = || DiscoveryError::InvalidProcfileLine {
            line: idx + 1,
            content: raw.to_string(),
        };

        let (label, command) = line.split_once(':').ok_or_else(invalid)?;
        let label = label.trim();
        let command = command.trim();

        let valid_label = !label.is_empty()
            && label
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-');
        if !valid_label || command.is_empty() {
            return Err(invalid());
        }

        processes.insert(label.to_string(), command.to_string());
    }

    if processes.is_empty() {
        return Err(DiscoveryError::EmptyProcfile);
    }

    Ok(processes)
}

/// Parse `.env` content into ordered `(key, value)` pairs
///
/// Follows dotenv conventions: `export` prefixes, single and double quotes,
/// and `$VAR` references to keys defined earlier or in our own environment.
pub fn parse_env(content: &str) -> Result<Vec<(String, String)>, DiscoveryError> {
    dotenvy::from_read_iter(content.as_bytes())
        .map(|item| item.map_err(|e| env_error(content, e)))
        .collect()
}

fn env_error(content: &str, error: dotenvy::Error) -> DiscoveryError {
    match error {
        dotenvy::Error::LineParse(bad, _) => {
            let first = bad.lines().next().unwrap_or_default().trim();
            let line = content
                .lines()
                .position(|l| l.trim() == first)
                .map_or(0, |idx| idx + 1);
            DiscoveryError::InvalidEnvLine { line, content: bad }
        }
        other => DiscoveryError::InvalidEnvLine {
            line: 0,
            content: other.to_string(),
        },
    }
}

/// Read and parse a Procfile
pub fn load_procfile(path: &Path) -> Result<BTreeMap<String, String>, DiscoveryError> {
    let content = std::fs::read_to_string(path).map_err(|source| DiscoveryError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    parse_procfile(&content)
}

/// Read and parse a `.env` file; a missing file yields no variables
pub fn load_env(path: &Path) -> Result<Vec<(String, String)>, DiscoveryError> {
    match std::fs::read_to_string(path) {
        Ok(content) => parse_env(&content),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(Vec::new()),
        Err(source) => Err(DiscoveryError::Io {
            path: path.to_path_buf(),
            source,
        }),
    }
}
