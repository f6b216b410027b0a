// src/web.rs
use crate::client::{ClientScript, EVENTS_PATH, FLAG_PATH, WATERMARK_PATH};
use crate::error::ServeError;
use crate::inject::inject_before_body_close;
use crate::signal::ReloadSignal;
use anyhow::Result;
use axum::{
    extract::{Request, State},
    http::{header, HeaderValue, Method},
    middleware::{self, Next},
    response::{
        sse::{Event as SseEvent, KeepAlive, Sse},
        IntoResponse, Json, Response,
    },
    routing::get,
    Router,
};
use futures_util::stream::{self, Stream};
use percent_encoding::percent_decode_str;
use serde::Serialize;
use std::convert::Infallible;
use std::path::{Component, Path, PathBuf};
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::sync::{broadcast::error::RecvError, watch::Receiver as WatchReceiver};
use tower::ServiceExt;
use tower_http::{services::ServeDir, set_header::SetResponseHeaderLayer};
use tracing::{debug, info, warn};

/// Shared application state for the web server.
#[derive(Debug, Clone)]
pub struct AppState {
    /// Directory served and watched.
    root: PathBuf,
    /// Reload state written by the change detector.
    signal: Arc<ReloadSignal>,
    /// Client block injected into every HTML page.
    script: ClientScript,
    /// Handler for everything that is not an injected page.
    static_files: ServeDir,
}

impl AppState {
    pub fn new(root: impl Into<PathBuf>, signal: Arc<ReloadSignal>, script: ClientScript) -> Self {
        let root = root.into();
        Self {
            static_files: ServeDir::new(&root),
            root,
            signal,
            script,
        }
    }
}

#[derive(Serialize)]
struct ReloadCheck {
    reload: bool,
}

#[derive(Serialize)]
struct Watermark {
    modified: u64,
}

/// Reports a pending reload at most once: a `true` answer clears the flag.
async fn reload_check(State(state): State<Arc<AppState>>) -> Json<ReloadCheck> {
    let reload = state.signal.take();
    if reload {
        debug!("Reporting pending reload to a client");
    }
    Json(ReloadCheck { reload })
}

/// Reports the current modification watermark; the client does the comparison.
async fn reload_watermark(State(state): State<Arc<AppState>>) -> Json<Watermark> {
    Json(Watermark {
        modified: state.signal.watermark(),
    })
}

/// Streams a `reload` event for every change the detector publishes.
async fn reload_events(
    State(state): State<Arc<AppState>>,
) -> Sse<impl Stream<Item = Result<SseEvent, Infallible>>> {
    info!("Reload event stream opened.");
    let rx = state.signal.subscribe();
    let events = stream::unfold(rx, |mut rx| async move {
        match rx.recv().await {
            Ok(event) => {
                let sse = SseEvent::default()
                    .event("reload")
                    .json_data(&event)
                    .unwrap_or_else(|_| SseEvent::default().event("reload").data("{}"));
                Some((Ok::<_, Infallible>(sse), rx))
            }
            Err(RecvError::Lagged(missed)) => {
                warn!("Reload stream lagged behind, missed {} events.", missed);
                let sse = SseEvent::default().event("reload").data("{}");
                Some((Ok(sse), rx))
            }
            Err(RecvError::Closed) => {
                info!("Reload signal closed, ending event stream.");
                None
            }
        }
    });
    Sse::new(events).keep_alive(KeepAlive::default())
}

/// Serves HTML pages with the reload client injected and delegates
/// everything else, including unreadable pages, to the static handler.
async fn serve_page(State(state): State<Arc<AppState>>, req: Request) -> Response {
    if matches!(*req.method(), Method::GET | Method::HEAD) {
        if let Some(file) = html_target(&state.root, req.uri().path()) {
            match tokio::fs::read(&file).await {
                Ok(content) => return html_response(&content, &state.script),
                Err(e) => debug!(
                    "Not injecting into {}: {}. Falling back to static handler.",
                    file.display(),
                    e
                ),
            }
        }
    }

    match state.static_files.clone().oneshot(req).await {
        Ok(response) => response.into_response(),
        Err(never) => match never {},
    }
}

/// Maps a request path to the HTML file that should receive the client.
///
/// Returns `None` for non-HTML paths and for anything that would escape `root`.
/// Paths ending in `/` map to that directory's `index.html`.
pub fn html_target(root: &Path, uri_path: &str) -> Option<PathBuf> {
    let decoded = percent_decode_str(uri_path).decode_utf8().ok()?;
    let is_directory = decoded.ends_with('/') || decoded.is_empty();
    let is_html = Path::new(&*decoded)
        .extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| ext.eq_ignore_ascii_case("html"));
    if !is_directory && !is_html {
        return None;
    }

    let mut file = root.to_path_buf();
    for segment in decoded.split('/') {
        if segment.is_empty() || segment == "." {
            continue;
        }
        let safe = Path::new(segment)
            .components()
            .all(|c| matches!(c, Component::Normal(_)));
        if !safe {
            return None;
        }
        file.push(segment);
    }
    if is_directory {
        file.push("index.html");
    }
    Some(file)
}

fn html_response(content: &[u8], script: &ClientScript) -> Response {
    let body = inject_before_body_close(content, script.as_bytes()).into_owned();
    let headers = [
        (
            header::CONTENT_TYPE,
            HeaderValue::from_static("text/html; charset=utf-8"),
        ),
        (header::CONTENT_LENGTH, HeaderValue::from(body.len())),
    ];
    (headers, body).into_response()
}

fn is_reload_endpoint(path: &str) -> bool {
    path == FLAG_PATH || path == WATERMARK_PATH || path == EVENTS_PATH
}

/// Logs each request with its status, keeping the polling endpoints quiet.
async fn log_request(req: Request, next: Next) -> Response {
    let method = req.method().clone();
    let path = req.uri().path().to_owned();
    let response = next.run(req).await;

    if is_reload_endpoint(&path) {
        return response;
    }
    let status = response.status();
    if status.is_client_error() || status.is_server_error() {
        warn!("{} {} {}", method, path, status.as_u16());
    } else {
        info!("{} {} {}", method, path, status.as_u16());
    }
    response
}

/// Builds the router: polling endpoints, the event stream, and the page
/// fallback, with caching disabled and CORS opened on every response.
pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route(FLAG_PATH, get(reload_check))
        .route(WATERMARK_PATH, get(reload_watermark))
        .route(EVENTS_PATH, get(reload_events))
        .fallback(serve_page)
        .layer(middleware::from_fn(log_request))
        .layer(SetResponseHeaderLayer::overriding(
            header::CACHE_CONTROL,
            HeaderValue::from_static("no-store, no-cache, must-revalidate"),
        ))
        .layer(SetResponseHeaderLayer::overriding(
            header::EXPIRES,
            HeaderValue::from_static("0"),
        ))
        .layer(SetResponseHeaderLayer::overriding(
            header::ACCESS_CONTROL_ALLOW_ORIGIN,
            HeaderValue::from_static("*"),
        ))
        .with_state(state)
}

/// Binds the listening socket, telling a port conflict apart from other failures.
///
/// # Errors
/// Returns [`ServeError::PortInUse`] when the address is taken and
/// [`ServeError::Bind`] for anything else.
pub async fn bind(addr: &str, port: u16) -> Result<TcpListener, ServeError> {
    TcpListener::bind(addr).await.map_err(|source| {
        if source.kind() == std::io::ErrorKind::AddrInUse {
            ServeError::PortInUse { port }
        } else {
            ServeError::Bind {
                addr: addr.to_string(),
                source,
            }
        }
    })
}

/// Runs the web server on `listener` until the shutdown signal fires.
///
/// # Arguments
/// - `listener`: Socket bound with [`bind`].
/// - `state`: Shared state handed to every handler.
/// - `shutdown_signal`: Watch channel for graceful shutdown notification.
///
/// # Returns
/// Returns `Ok(())` when the server shuts down cleanly.
pub async fn start_server(
    listener: TcpListener,
    state: Arc<AppState>,
    shutdown_signal: WatchReceiver<bool>,
) -> Result<()> {
    let app = router(state);
    info!("Web server starting on http://{}", listener.local_addr()?);

    let mut shutdown = shutdown_signal.clone();
    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            shutdown.changed().await.ok();
            info!("Web server shutting down gracefully.");
        })
        .await?;

    info!("Web server stopped.");
    Ok(())
}
