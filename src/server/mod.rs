//! Dev server adapter: static file serving plus push notifications to
//! connected browsers

pub mod http;

use regex::Regex;
use serde::Serialize;
use std::path::Path;
use std::sync::OnceLock;
use tokio::sync::broadcast;
use tracing::debug;

use crate::core::fileset::url_path;

pub use http::{DevServer, ServeMode, ServerError};

/// A change pushed to connected clients
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Reload {
    /// Reload the whole page
    Full,

    /// Swap the listed files in place (stylesheets); anything else the
    /// client cannot swap triggers a full reload
    Stream { paths: Vec<String> },

    /// Replace the `<body>` of the page served at `path`
    Html { path: String, body: String },
}

impl Reload {
    /// Stream reload for project-relative paths
    pub fn stream<P: AsRef<Path>>(paths: &[P]) -> Self {
        Reload::Stream {
            paths: paths.iter().map(|p| url_path(p.as_ref())).collect(),
        }
    }
}

fn body_pattern() -> &'static Regex {
    static BODY: OnceLock<Regex> = OnceLock::new();
    BODY.get_or_init(|| Regex::new(r"(?is)<body[^>]*>(.*)</body>").expect("literal pattern"))
}

impl Reload {
    /// Body swap for a rendered page, or a full reload when the document
    /// has no `<body>`
    pub fn html(url: impl Into<String>, document: &str) -> Self {
        match body_pattern().captures(document).and_then(|c| c.get(1)) {
            Some(body) => Reload::Html {
                path: url.into(),
                body: body.as_str().to_string(),
            },
            None => Reload::Full,
        }
    }
}

/// Port through which tasks tell the dev server about changes
pub trait ReloadNotifier: Send + Sync {
    fn notify(&self, reload: Reload);
}

/// Used when no server is running
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopNotifier;

impl ReloadNotifier for NoopNotifier {
    fn notify(&self, _reload: Reload) {}
}

/// Capacity of the per-client backlog; slow clients skip ahead
const RELOAD_BACKLOG: usize = 64;

/// Broadcasts reloads to every subscribed client
#[derive(Debug, Clone)]
pub struct LiveReload {
    tx: broadcast::Sender<Reload>,
}

impl LiveReload {
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(RELOAD_BACKLOG);
        Self { tx }
    }

    /// Register a client
    pub fn subscribe(&self) -> broadcast::Receiver<Reload> {
        self.tx.subscribe()
    }

    pub fn client_count(&self) -> usize {
        self.tx.receiver_count()
    }
}

impl Default for LiveReload {
    fn default() -> Self {
        Self::new()
    }
}

impl ReloadNotifier for LiveReload {
    fn notify(&self, reload: Reload) {
        match self.tx.send(reload) {
            Ok(clients) => debug!("Reload sent to {} client(s)", clients),
            Err(_) => debug!("Reload dropped, no clients connected"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reload_wire_format() {
        let json = serde_json::to_string(&Reload::stream(&["assets/css/main.css"])).unwrap();
        assert_eq!(json, r#"{"type":"stream","paths":["/assets/css/main.css"]}"#);

        let json = serde_json::to_string(&Reload::Full).unwrap();
        assert_eq!(json, r#"{"type":"full"}"#);
    }

    #[test]
    fn test_html_reload_extracts_body() {
        let doc = "<html><head></head><BODY class=\"home\">\n<h1>Hi</h1>\n</BODY></html>";
        assert_eq!(
            Reload::html("/index.html", doc),
            Reload::Html {
                path: "/index.html".to_string(),
                body: "\n<h1>Hi</h1>\n".to_string(),
            }
        );
        assert_eq!(Reload::html("/frag.html", "<p>no body</p>"), Reload::Full);
    }

    #[tokio::test]
    async fn test_live_reload_reaches_every_client() {
        let live = LiveReload::new();
        let mut first = live.subscribe();
        let mut second = live.subscribe();
        assert_eq!(live.client_count(), 2);

        live.notify(Reload::Full);

        assert_eq!(first.recv().await.unwrap(), Reload::Full);
        assert_eq!(second.recv().await.unwrap(), Reload::Full);
    }

    #[test]
    fn test_notify_without_clients_is_silent() {
        LiveReload::new().notify(Reload::Full);
        NoopNotifier.notify(Reload::Full);
    }
}
