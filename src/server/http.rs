//! HTTP side of the dev server: static files, the reload client and the
//! Server-Sent Events stream it listens on.

use super::{LiveReload, Reload};
use crate::core::config::Config;
use axum::{
    body::{self, Body},
    extract::{Request, State},
    http::{header, HeaderValue},
    middleware::{self, Next},
    response::{
        sse::{Event, KeepAlive},
        IntoResponse, Response, Sse,
    },
    routing::get,
    Router,
};
use std::convert::Infallible;
use std::net::{Ipv4Addr, SocketAddr};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::net::TcpListener;
use tokio_stream::wrappers::{errors::BroadcastStreamRecvError, BroadcastStream};
use tokio_stream::{Stream, StreamExt};
use tower_http::services::ServeDir;
use tracing::{debug, info, warn};

/// SSE endpoint the reload client subscribes to
pub const EVENTS_PATH: &str = "/__siteflow/events";

/// Reload client script
pub const CLIENT_PATH: &str = "/__siteflow/reload.js";

const RELOAD_CLIENT: &str = include_str!("../../assets/reload-client.js");

#[derive(Debug, Error)]
pub enum ServerError {
    #[error("Failed to bind to {addr}: {source}")]
    Bind {
        addr: SocketAddr,
        #[source]
        source: std::io::Error,
    },

    #[error("Server error: {0}")]
    Serve(#[source] std::io::Error),
}

/// Which tree is served
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServeMode {
    /// Temp directory first, project root as fallback
    Dev,

    /// Output directory only
    Static,
}

pub struct DevServer {
    mode: ServeMode,
    config: Arc<Config>,
    live: LiveReload,
}

impl DevServer {
    pub fn new(mode: ServeMode, config: Arc<Config>, live: LiveReload) -> Self {
        Self { mode, config, live }
    }

    /// Loopback address on the configured port
    pub fn addr(&self) -> SocketAddr {
        SocketAddr::from((Ipv4Addr::LOCALHOST, self.config.port))
    }

    /// Build the router for the current mode
    pub fn router(&self) -> Router {
        let app = Router::new()
            .route(EVENTS_PATH, get(handle_events))
            .route(CLIENT_PATH, get(handle_client));

        let app = match self.mode {
            ServeMode::Dev => {
                let cwd = &self.config.cwd;
                let files = ServeDir::new(&self.config.temp).fallback(ServeDir::new(cwd));
                app.nest_service("/node_modules", ServeDir::new(cwd.join("node_modules")))
                    .fallback_service(files)
            }
            ServeMode::Static => app.fallback_service(ServeDir::new(&self.config.output)),
        };

        app.layer(middleware::from_fn(inject_client))
            .with_state(self.live.clone())
    }

    /// Bind the configured port and serve until the process ends
    pub async fn start(self) -> Result<(), ServerError> {
        let addr = self.addr();
        let listener = TcpListener::bind(addr)
            .await
            .map_err(|source| ServerError::Bind { addr, source })?;

        self.serve(listener).await
    }

    /// Serve on an already bound listener
    pub async fn serve(self, listener: TcpListener) -> Result<(), ServerError> {
        if let Ok(addr) = listener.local_addr() {
            let root = match self.mode {
                ServeMode::Dev => &self.config.temp,
                ServeMode::Static => &self.config.output,
            };
            info!("Serving {} at http://{}", root.display(), addr);
        }

        axum::serve(listener, self.router())
            .await
            .map_err(ServerError::Serve)
    }
}

async fn handle_events(
    State(live): State<LiveReload>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    debug!("Reload client connected");

    let stream = BroadcastStream::new(live.subscribe()).filter_map(|item| {
        let reload = match item {
            Ok(reload) => reload,
            // Missed updates cannot be replayed
            Err(BroadcastStreamRecvError::Lagged(skipped)) => {
                debug!("Client lagged by {} reload(s)", skipped);
                Reload::Full
            }
        };
        match Event::default().json_data(&reload) {
            Ok(event) => Some(Ok(event)),
            Err(e) => {
                warn!("Failed to encode reload: {}", e);
                None
            }
        }
    });

    Sse::new(stream).keep_alive(KeepAlive::new().interval(Duration::from_secs(15)))
}

async fn handle_client() -> impl IntoResponse {
    (
        [
            (header::CONTENT_TYPE, "application/javascript"),
            (header::CACHE_CONTROL, "no-cache"),
        ],
        RELOAD_CLIENT,
    )
}

/// Add the client script to every HTML response
async fn inject_client(request: Request, next: Next) -> Response {
    let response = next.run(request).await;

    let is_html = response
        .headers()
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|v| v.starts_with("text/html"));
    if !is_html || !response.status().is_success() {
        return response;
    }

    let (mut parts, body) = response.into_parts();
    let bytes = match body::to_bytes(body, usize::MAX).await {
        Ok(bytes) => bytes,
        Err(e) => {
            warn!("Failed to buffer HTML response: {}", e);
            return Response::from_parts(parts, Body::empty());
        }
    };

    let html = inject_client_tag(&String::from_utf8_lossy(&bytes));
    parts.headers.remove(header::CONTENT_LENGTH);
    parts
        .headers
        .insert(header::CACHE_CONTROL, HeaderValue::from_static("no-cache"));
    Response::from_parts(parts, Body::from(html))
}

/// Insert the client `<script>` before the last `</body>`, or append it
fn inject_client_tag(html: &str) -> String {
    let tag = format!(r#"<script src="{}"></script>"#, CLIENT_PATH);

    match html.rfind("</body>") {
        Some(pos) => {
            let mut out = String::with_capacity(html.len() + tag.len() + 1);
            out.push_str(&html[..pos]);
            out.push_str(&tag);
            out.push('\n');
            out.push_str(&html[pos..]);
            out
        }
        None => format!("{}\n{}", html, tag),
    }
}
