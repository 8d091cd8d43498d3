//! Host header to backend resolution

use hyper::Uri;
use percent_encoding::{utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};

use bam_core::App;

use crate::console::NOT_FOUND_PATH;
use crate::registry::Registry;

/// Characters escaped in a query value; RFC 3986 unreserved ones pass through
const QUERY_VALUE: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'_')
    .remove(b'.')
    .remove(b'~');

/// Where a request is forwarded
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Route {
    /// A running app on `127.0.0.1:<port>`
    Backend(u16),
    /// The console's not-found page for the attempted app name
    Fallback { console_port: u16, app: String },
}

impl Route {
    /// Target URI for a request with the given path and query
    pub fn uri(&self, path_and_query: &str) -> Result<Uri, axum::http::uri::InvalidUri> {
        match self {
            Route::Backend(port) => format!("http://127.0.0.1:{}{}", port, path_and_query).parse(),
            Route::Fallback { console_port, app } => format!(
                "http://127.0.0.1:{}{}?app={}",
                console_port,
                NOT_FOUND_PATH,
                utf8_percent_encode(app, QUERY_VALUE)
            )
            .parse(),
        }
    }
}

/// Decide the route for a request from its `Host` header
///
/// Reads registry state only; safe to call from any number of requests.
pub fn resolve(host: Option<&str>, registry: &Registry) -> Route {
    let key = host.and_then(|h| routing_key(h, registry.tld()));

    if let Some(app) = key.as_deref().and_then(|k| registry.lookup(k)) {
        if app.running() && app.port() != 0 {
            return Route::Backend(app.port());
        }
    }

    let console_port = registry.port();
    Route::Fallback {
        console_port,
        app: key.unwrap_or_default(),
    }
}

/// Extract the app name a `Host` header addresses
///
/// `foo.myapp.<tld>` and `foo.myapp.10.0.0.5.xip.io` both yield `myapp`.
/// Hosts outside the TLD (and not xip.io) yield `None`.
pub fn routing_key(host: &str, tld: &str) -> Option<String> {
    let host = strip_port(host)?.trim_end_matches('.').to_lowercase();

    let name = match strip_xip(&host) {
        Some(name) => name,
        None => {
            let suffix = format!(".{}", tld.trim_matches('.').to_lowercase());
            host.strip_suffix(suffix.as_str())?
        }
    };

    let label = name.rsplit('.').next()?;
    if label.is_empty() {
        return None;
    }
    Some(label.to_string())
}

fn strip_port(host: &str) -> Option<&str> {
    // Bracketed IPv6 literals never name an app
    if host.starts_with('[') {
        return None;
    }
    let host = match host.rsplit_once(':') {
        Some((name, port)) if port.chars().all(|c| c.is_ascii_digit()) => name,
        Some(_) => return None,
        None => host,
    };
    (!host.is_empty()).then_some(host)
}

/// `<name>.<a>.<b>.<c>.<d>.xip.io` -> `<name>`
fn strip_xip(host: &str) -> Option<&str> {
    let rest = host.strip_suffix(".xip.io")?;

    let mut cut = rest.len();
    for _ in 0..4 {
        let start = rest[..cut].rfind('.').map(|i| i + 1).unwrap_or(0);
        let octet = &rest[start..cut];
        if octet.is_empty() || !octet.chars().all(|c| c.is_ascii_digit()) {
            return None;
        }
        cut = start.saturating_sub(1);
        if start == 0 {
            cut = 0;
            break;
        }
    }

    Some(&rest[..cut])
}
