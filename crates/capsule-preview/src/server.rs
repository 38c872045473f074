//! Development server implementation.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        State,
    },
    http::{header, StatusCode},
    response::{Html, IntoResponse, Response},
    routing::get,
    Json, Router,
};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast::error::RecvError;
use tower_http::cors::CorsLayer;
use tower_http::services::ServeDir;

use crate::host::Ticket;
use crate::hub::{preview_client_script, PreviewHub, PreviewMessage, PreviewSnapshot};
use crate::panel::{PageContext, Templates};
use crate::pipeline::Pipeline;
use crate::watcher::{FileWatcher, WatchEvent};
use crate::worker::{PreviewHandle, PreviewWorker, WorkerError};

const SCRIPT_PATH: &str = "/__preview.js";
const WS_PATH: &str = "/__ws";

/// Configuration for the development server.
#[derive(Debug, Clone)]
pub struct DevServerConfig {
    /// Component source file to preview
    pub source_path: PathBuf,

    /// Static files served under `/assets`
    pub assets_dir: Option<PathBuf>,

    /// Port to listen on
    pub port: u16,

    /// Host to bind to
    pub host: String,

    /// Open browser on start
    pub open: bool,

    /// Tailwind play CDN injected into the preview frame
    pub tailwind_cdn: Option<String>,

    /// Persist source posted to `/api/source` into `source_path`
    pub write_back: bool,

    /// Previewed at startup when `source_path` is missing or empty
    pub initial_source: Option<String>,

    /// Page title
    pub title: String,
}

impl Default for DevServerConfig {
    fn default() -> Self {
        Self {
            source_path: PathBuf::from("page.tsx"),
            assets_dir: None,
            port: 7878,
            host: "127.0.0.1".to_string(),
            open: true,
            tailwind_cdn: Some("https://cdn.tailwindcss.com".to_string()),
            write_back: false,
            initial_source: None,
            title: "Capsule Preview".to_string(),
        }
    }
}

/// Errors that can occur with the server.
#[derive(Debug, thiserror::Error)]
pub enum ServerError {
    #[error("Failed to bind to {0}: {1}")]
    BindError(SocketAddr, String),

    #[error("Invalid address: {0}")]
    AddressError(String),

    #[error("File watch error: {0}")]
    WatchError(String),

    #[error(transparent)]
    WorkerError(#[from] WorkerError),
}

/// Shared server state.
struct ServerState {
    config: DevServerConfig,
    hub: PreviewHub,
    preview: PreviewHandle,
    templates: Templates,
}

/// Submit the source file, falling back to the configured initial source.
async fn submit_initial(config: &DevServerConfig, preview: &PreviewHandle) -> Option<Ticket> {
    let submitted = match tokio::fs::read_to_string(&config.source_path).await {
        Ok(source) => preview.submit(&source),
        Err(e) => {
            tracing::warn!("Could not read {}: {}", config.source_path.display(), e);
            None
        }
    };
    if submitted.is_some() {
        return submitted;
    }

    let initial = config.initial_source.as_deref()?;
    tracing::info!("Previewing the default component");
    preview.submit(initial)
}

/// Development server.
pub struct DevServer {
    config: DevServerConfig,
}

impl DevServer {
    /// Create a new development server.
    pub fn new(config: DevServerConfig) -> Self {
        Self { config }
    }

    /// Start the development server with a pipeline built by `factory`.
    pub async fn start<P, F>(self, factory: F) -> Result<(), ServerError>
    where
        P: Pipeline + 'static,
        F: FnOnce() -> Result<P, String> + Send + 'static,
    {
        let addr: SocketAddr = format!("{}:{}", self.config.host, self.config.port)
            .parse()
            .map_err(|e| ServerError::AddressError(format!("{}: {}", self.config.host, e)))?;

        let hub = PreviewHub::new();
        let worker = PreviewWorker::spawn(factory, hub.clone())?;
        let preview = worker.handle();

        submit_initial(&self.config, &preview).await;

        // Set up file watcher
        let (watcher, mut rx) =
            FileWatcher::new(&self.config.source_path, self.config.assets_dir.as_deref())
                .map_err(|e| ServerError::WatchError(e.to_string()))?;

        let state = Arc::new(ServerState {
            config: self.config.clone(),
            hub,
            preview,
            templates: Templates::new(),
        });

        // Spawn file watch handler
        let state_clone = Arc::clone(&state);
        tokio::spawn(async move {
            while let Some(event) = rx.recv().await {
                handle_watch_event(&state_clone, event).await;
            }
            // Keep watcher alive
            drop(watcher);
        });

        let mut app = Router::new()
            .route("/", get(index_handler))
            .route(WS_PATH, get(ws_handler))
            .route(SCRIPT_PATH, get(script_handler))
            .route("/api/preview", get(preview_handler))
            .route("/api/source", get(source_handler).post(submit_handler));

        if let Some(assets) = &self.config.assets_dir {
            app = app.nest_service("/assets", ServeDir::new(assets));
        }

        let app = app.layer(CorsLayer::permissive()).with_state(state);

        tracing::info!("Starting preview server at http://{}", addr);

        let listener = tokio::net::TcpListener::bind(addr)
            .await
            .map_err(|e| ServerError::BindError(addr, e.to_string()))?;

        // Open browser if configured
        if self.config.open {
            let url = format!("http://{}", addr);
            if let Err(e) = open::that(&url) {
                tracing::warn!("Could not open browser: {}", e);
            }
        }

        axum::serve(listener, app)
            .await
            .map_err(|e| ServerError::BindError(addr, e.to_string()))?;

        drop(worker);
        Ok(())
    }
}

/// Handle file watch events.
async fn handle_watch_event(state: &ServerState, event: WatchEvent) {
    match event {
        WatchEvent::SourceChanged(path) => match tokio::fs::read_to_string(&path).await {
            Ok(source) => {
                if let Some(ticket) = state.preview.submit(&source) {
                    tracing::info!("Source changed, rendering generation {}", ticket);
                }
            }
            Err(e) => tracing::warn!("Failed to read {}: {}", path.display(), e),
        },

        WatchEvent::AssetChanged(path) => {
            tracing::info!("Asset changed: {}", path.display());
            state.hub.send(PreviewMessage::Reload);
        }

        WatchEvent::Deleted(path) => {
            tracing::warn!("Source removed: {}", path.display());
        }
    }
}

/// Handler for the shell page.
async fn index_handler(State(state): State<Arc<ServerState>>) -> Response {
    let page = PageContext {
        title: state.config.title.clone(),
        tailwind_cdn: state.config.tailwind_cdn.clone(),
        script_path: SCRIPT_PATH.to_string(),
        snapshot: state.hub.latest(),
    };

    match state.templates.render_page(&page) {
        Ok(html) => Html(html).into_response(),
        Err(e) => {
            tracing::error!("Failed to render page: {}", e);
            (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()).into_response()
        }
    }
}

/// Handler for the preview client script.
async fn script_handler() -> impl IntoResponse {
    (
        [(header::CONTENT_TYPE, "application/javascript")],
        preview_client_script(WS_PATH),
    )
}

/// Current snapshot as JSON.
async fn preview_handler(State(state): State<Arc<ServerState>>) -> Json<PreviewSnapshot> {
    Json(state.hub.latest())
}

#[derive(Debug, Serialize, Deserialize)]
struct SourceBody {
    source: String,
}

#[derive(Debug, Serialize, Deserialize)]
struct SubmitResponse {
    /// `None` when the source was empty or unchanged
    ticket: Option<Ticket>,
}

async fn source_handler(State(state): State<Arc<ServerState>>) -> Json<SourceBody> {
    Json(SourceBody {
        source: state.hub.latest().source,
    })
}

/// Accept new source from the code view or an external generator.
async fn submit_handler(
    State(state): State<Arc<ServerState>>,
    Json(body): Json<SourceBody>,
) -> Response {
    let ticket = state.preview.submit(&body.source);

    if ticket.is_some() && state.config.write_back {
        if let Err(e) = tokio::fs::write(&state.config.source_path, &body.source).await {
            tracing::error!(
                "Failed to write {}: {}",
                state.config.source_path.display(),
                e
            );
            return (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()).into_response();
        }
    }

    (StatusCode::ACCEPTED, Json(SubmitResponse { ticket })).into_response()
}

/// Handler for the preview WebSocket endpoint.
async fn ws_handler(
    ws: WebSocketUpgrade,
    State(state): State<Arc<ServerState>>,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_ws(socket, state))
}

/// Handle a WebSocket connection.
async fn handle_ws(mut socket: WebSocket, state: Arc<ServerState>) {
    let mut rx = state.hub.subscribe();

    if !send_message(&mut socket, &PreviewMessage::Connected).await {
        return;
    }

    let current = PreviewMessage::UpdatePreview {
        snapshot: state.hub.latest(),
    };
    if !send_message(&mut socket, &current).await {
        return;
    }

    loop {
        let msg = match rx.recv().await {
            Ok(msg) => msg,
            // Skipped updates are superseded by the current snapshot anyway
            Err(RecvError::Lagged(skipped)) => {
                tracing::debug!("Client lagged by {} messages", skipped);
                PreviewMessage::UpdatePreview {
                    snapshot: state.hub.latest(),
                }
            }
            Err(RecvError::Closed) => break,
        };

        if !send_message(&mut socket, &msg).await {
            break;
        }
    }
}

async fn send_message(socket: &mut WebSocket, msg: &PreviewMessage) -> bool {
    let json = match serde_json::to_string(msg) {
        Ok(json) => json,
        Err(e) => {
            tracing::error!("Failed to serialize preview message: {}", e);
            return true;
        }
    };
    socket.send(Message::Text(json.into())).await.is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::PipelineError;
    use crate::hub::PreviewStatus;
    use capsule_transform::SourceUnit;
    use std::time::Duration;
    use tempfile::tempdir;

    struct EchoPipeline;

    impl Pipeline for EchoPipeline {
        type Value = String;

        fn load(&mut self, source: &SourceUnit) -> Result<String, PipelineError> {
            Ok(source.as_str().to_string())
        }

        fn mount(&mut self, value: &String) -> Result<String, String> {
            Ok(format!("<pre>{value}</pre>"))
        }
    }

    fn state(config: DevServerConfig) -> (PreviewWorker, Arc<ServerState>) {
        let hub = PreviewHub::new();
        let worker = PreviewWorker::spawn(|| Ok(EchoPipeline), hub.clone()).unwrap();
        let state = Arc::new(ServerState {
            config,
            hub,
            preview: worker.handle(),
            templates: Templates::new(),
        });
        (worker, state)
    }

    async fn body_text(response: Response) -> String {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        String::from_utf8(bytes.to_vec()).unwrap()
    }

    async fn wait_ready(hub: &PreviewHub) -> PreviewSnapshot {
        let mut watch = hub.watch();
        tokio::time::timeout(Duration::from_secs(5), async {
            loop {
                if watch.borrow_and_update().status == PreviewStatus::Ready {
                    return watch.borrow().clone();
                }
                watch.changed().await.unwrap();
            }
        })
        .await
        .expect("timeout waiting for ready snapshot")
    }

    #[test]
    fn creates_server_with_default_config() {
        let server = DevServer::new(DevServerConfig::default());
        assert_eq!(server.config.port, 7878);
        assert!(!server.config.write_back);
    }

    #[tokio::test]
    async fn missing_source_file_previews_initial_source() {
        let temp = tempdir().unwrap();
        let (_worker, state) = state(DevServerConfig {
            source_path: temp.path().join("missing.tsx"),
            initial_source: Some("export default () => null;".to_string()),
            ..DevServerConfig::default()
        });

        let ticket = submit_initial(&state.config, &state.preview).await;

        assert_eq!(ticket, Some(Ticket(1)));
        let snapshot = wait_ready(&state.hub).await;
        assert_eq!(snapshot.source, "export default () => null;");
        assert!(snapshot.html.contains("<pre>export default () => null;</pre>"));
    }

    #[tokio::test]
    async fn source_file_wins_over_initial_source() {
        let temp = tempdir().unwrap();
        let path = temp.path().join("page.tsx");
        std::fs::write(&path, "from disk").unwrap();
        let (_worker, state) = state(DevServerConfig {
            source_path: path,
            initial_source: Some("fallback".to_string()),
            ..DevServerConfig::default()
        });

        submit_initial(&state.config, &state.preview).await;

        assert_eq!(wait_ready(&state.hub).await.source, "from disk");
    }

    #[tokio::test]
    async fn missing_source_without_initial_stays_empty() {
        let temp = tempdir().unwrap();
        let (_worker, state) = state(DevServerConfig {
            source_path: temp.path().join("missing.tsx"),
            ..DevServerConfig::default()
        });

        assert_eq!(submit_initial(&state.config, &state.preview).await, None);
        assert_eq!(state.hub.latest().status, PreviewStatus::Empty);
    }

    #[tokio::test]
    async fn index_renders_shell_page() {
        let (_worker, state) = state(DevServerConfig::default());

        let html = body_text(index_handler(State(state)).await).await;

        assert!(html.contains("<title>Capsule Preview</title>"));
        assert!(html.contains(r#"sandbox="allow-scripts""#));
        assert!(html.contains("Waiting for source..."));
    }

    #[tokio::test]
    async fn script_points_at_websocket() {
        let response = script_handler().await.into_response();

        assert_eq!(
            response.headers()[header::CONTENT_TYPE],
            "application/javascript"
        );
        assert!(body_text(response).await.contains("'/__ws'"));
    }

    #[tokio::test]
    async fn submitted_source_reaches_preview() {
        let (_worker, state) = state(DevServerConfig::default());

        let response =
            submit_handler(State(Arc::clone(&state)), Json(SourceBody { source: "hi".into() }))
                .await;
        assert_eq!(response.status(), StatusCode::ACCEPTED);
        assert_eq!(body_text(response).await, r#"{"ticket":1}"#);

        wait_ready(&state.hub).await;
        let Json(snapshot) = preview_handler(State(Arc::clone(&state))).await;
        assert_eq!(snapshot.html, "<pre>hi</pre>");

        let Json(body) = source_handler(State(state)).await;
        assert_eq!(body.source, "hi");
    }

    #[tokio::test]
    async fn write_back_persists_source() {
        let temp = tempdir().unwrap();
        let path = temp.path().join("page.tsx");
        let (_worker, state) = state(DevServerConfig {
            source_path: path.clone(),
            write_back: true,
            ..DevServerConfig::default()
        });

        submit_handler(State(state), Json(SourceBody { source: "export default 1".into() })).await;

        assert_eq!(std::fs::read_to_string(&path).unwrap(), "export default 1");
    }

    #[tokio::test]
    async fn unchanged_source_is_not_rerendered() {
        let (_worker, state) = state(DevServerConfig::default());

        submit_handler(State(Arc::clone(&state)), Json(SourceBody { source: "a".into() })).await;
        let response =
            submit_handler(State(state), Json(SourceBody { source: "a".into() })).await;

        assert_eq!(body_text(response).await, r#"{"ticket":null}"#);
    }
}
