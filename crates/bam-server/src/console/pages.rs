//! HTML rendering for the console

use std::fmt::Write;

use axum::http::StatusCode;

use bam_core::{AppInfo, AppKind};

/// Escape text for HTML element and attribute content
fn escape(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            c => out.push(c),
        }
    }
    out
}

fn app_url(name: &str, tld: &str) -> String {
    format!("http://{}.{}", escape(name), escape(tld))
}

fn layout(title: &str, body: &str) -> String {
    format!(
        r#"<!doctype html>
<html lang="en">
  <head>
    <meta charset="utf-8" />
    <title>{title}</title>
    <link rel="stylesheet" type="text/css" href="/assets/bam.css" />
  </head>
  <body>
    <div id="container">
      <h1><a href="/">BAM!</a></h1>
{body}
    </div>
    <script src="/assets/bam.js"></script>
  </body>
</html>
"#,
        title = escape(title),
        body = body,
    )
}

fn action_links(info: &AppInfo) -> String {
    if info.kind == AppKind::Console {
        return String::new();
    }

    let name = escape(&info.name);
    let mut links = String::new();
    if info.running {
        let _ = write!(links, r#"<a class="stop" href="/apps/{name}/stop">stop</a>"#);
        if info.shared_url.is_some() {
            let _ = write!(
                links,
                r#" <a class="unshare" href="/apps/{name}/unshare">unshare</a>"#
            );
        } else {
            let _ = write!(links, r#" <a class="share" href="/apps/{name}/share">share</a>"#);
        }
    } else {
        let _ = write!(links, r#"<a class="start" href="/apps/{name}/start">start</a>"#);
    }
    links
}

/// App listing
pub fn index(apps: &[AppInfo], tld: &str) -> String {
    let mut body = String::from(
        "      <input id=\"search-box\" type=\"search\" placeholder=\"Search\" oninput=\"search()\" />\n      <ul class=\"list\">\n",
    );

    for info in apps {
        let state = if info.running { "green" } else { "red" };
        let _ = writeln!(
            body,
            r#"        <li class="{state}" data-app="{name}"><a class="title" href="{url}">{name}</a> <a class="detail" href="/apps/{name}">{kind}</a> <span class="actions">{actions}</span></li>"#,
            name = escape(&info.name),
            url = app_url(&info.name, tld),
            kind = info.kind,
            actions = action_links(info),
        );
    }
    body.push_str("      </ul>");

    layout("BAM!", &body)
}

/// Single app details
pub fn detail(info: &AppInfo, tld: &str) -> String {
    let port = if info.running || info.kind == AppKind::Alias {
        info.port.to_string()
    } else {
        "-".to_string()
    };
    let shared = match &info.shared_url {
        Some(url) => format!(r#"<a href="{url}">{url}</a>"#, url = escape(url)),
        None => "no".to_string(),
    };

    let body = format!(
        r#"      <h2><a href="{url}">{name}</a></h2>
      <dl class="detail">
        <dt>Kind</dt><dd>{kind}</dd>
        <dt>Port</dt><dd>{port}</dd>
        <dt>Running</dt><dd>{running}</dd>
        <dt>Shared</dt><dd>{shared}</dd>
      </dl>
      <p class="actions">{actions}</p>"#,
        url = app_url(&info.name, tld),
        name = escape(&info.name),
        kind = info.kind,
        running = if info.running { "yes" } else { "no" },
        actions = action_links(info),
    );

    layout(&info.name, &body)
}

/// Error box with the underlying message
pub fn error(status: StatusCode, message: &str) -> String {
    let title = format!("Error {}", status.as_u16());
    let body = format!(
        "      <div class=\"error-box\">\n        <h3>{}</h3>\n        {}\n      </div>",
        escape(&title),
        escape(message)
    );
    layout(&title, &body)
}

/// Proxy fallback for an app that exists but is stopped
pub fn not_running(name: &str) -> String {
    let body = format!(
        "      <div class=\"error-box\">\n        <h3>Application not running: {name}</h3>\n        <a class=\"start\" href=\"/apps/{name}/start\">start</a>\n      </div>",
        name = escape(name)
    );
    layout("Application not running", &body)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::REGISTRY_NAME;

    fn info(name: &str, running: bool) -> AppInfo {
        AppInfo {
            name: name.to_string(),
            kind: AppKind::Process,
            port: if running { 4000 } else { 0 },
            running,
            shared_url: None,
        }
    }

    #[test]
    fn test_escape() {
        assert_eq!(
            escape(r#"<a href="x">&'</a>"#),
            "&lt;a href=&quot;x&quot;&gt;&amp;&#39;&lt;/a&gt;"
        );
        assert_eq!(escape("plain"), "plain");
    }

    #[test]
    fn test_index_links() {
        let html = index(&[info("ping", false), info("web", true)], "app");
        assert!(html.contains(r#"href="http://ping.app""#));
        assert!(html.contains(r#"href="/apps/ping/start""#));
        assert!(html.contains(r#"href="/apps/web/stop""#));
        assert!(html.contains(r#"href="/apps/web/share""#));
        assert!(!html.contains("/apps/ping/stop"));
    }

    #[test]
    fn test_console_row_has_no_actions() {
        let console = AppInfo {
            name: REGISTRY_NAME.to_string(),
            kind: AppKind::Console,
            port: 4242,
            running: true,
            shared_url: None,
        };
        let html = index(&[console], "app");
        assert!(html.contains("http://bam.app"));
        assert!(!html.contains("/apps/bam/stop"));
    }

    #[test]
    fn test_error_page_escapes_message() {
        let html = error(StatusCode::CONFLICT, "<script>");
        assert!(html.contains("Error 409"));
        assert!(html.contains("&lt;script&gt;"));
        assert!(!html.contains("<script>"));
    }

    #[test]
    fn test_not_running_escapes_name() {
        let html = not_running(r#"x"><b>"#);
        assert!(html.contains("Application not running: x&quot;&gt;&lt;b&gt;"));
        assert!(html.contains(r#"href="/apps/x&quot;&gt;&lt;b&gt;/start""#));
        assert!(!html.contains("<b>"));
    }

    #[test]
    fn test_detail_shows_share() {
        let mut app = info("ping", true);
        app.shared_url = Some("https://quiet-fox.localtunnel.me".into());
        let html = detail(&app, "app");
        assert!(html.contains("https://quiet-fox.localtunnel.me"));
        assert!(html.contains("/apps/ping/unshare"));
        assert!(html.contains("<dd>4000</dd>"));
    }
}
