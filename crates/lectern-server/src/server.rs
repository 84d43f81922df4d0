//! Development and preview servers.

use std::collections::BTreeSet;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        State,
    },
    http::StatusCode,
    response::{Html, IntoResponse, Response},
    routing::{get, MethodRouter},
    Router,
};
use tokio::sync::{broadcast, RwLock};
use tower_http::services::{ServeDir, ServeFile};

use lectern_static::{inject_head, BuildConfig, BuildError, BuildResult, StaticBuilder};

use crate::watcher::{FileWatcher, WatchEvent};
use crate::websocket::{reload_client_script, ReloadHub, ReloadMessage, RELOAD_PATH};

/// Configuration for the development server.
#[derive(Debug, Clone)]
pub struct DevServerConfig {
    /// Build to run and serve; the port comes from here too
    pub build: BuildConfig,

    /// Host to bind to
    pub host: String,

    /// Open browser on start
    pub open: bool,
}

impl DevServerConfig {
    pub fn new(build: BuildConfig) -> Self {
        Self {
            build,
            host: "127.0.0.1".to_string(),
            open: true,
        }
    }

    /// Directories whose changes trigger a rebuild.
    pub fn watch_paths(&self) -> Vec<PathBuf> {
        let build = &self.build;
        let mut paths = BTreeSet::new();
        paths.insert(build.root.join(&build.include_dir));
        paths.insert(build.path(&build.content_dir));
        if let Some(parent) = build.template.parent() {
            paths.insert(build.path(parent));
        }
        for rule in &build.copies {
            paths.insert(build.path(&rule.from));
        }
        paths.into_iter().collect()
    }

    fn addr(&self) -> Result<SocketAddr, ServerError> {
        let addr = format!("{}:{}", self.host, self.build.port);
        addr.parse().map_err(|_| ServerError::InvalidAddress(addr))
    }
}

/// Errors that can occur with the server.
#[derive(Debug, thiserror::Error)]
pub enum ServerError {
    #[error("Invalid address: {0}")]
    InvalidAddress(String),

    #[error("Failed to bind to {0}: {1}")]
    BindError(SocketAddr, String),

    #[error("File watch error: {0}")]
    WatchError(String),

    #[error(transparent)]
    BuildError(#[from] BuildError),

    #[error("Build task failed: {0}")]
    TaskError(String),
}

/// Shared server state.
struct ServerState {
    output_dir: PathBuf,
    hub: ReloadHub,
    /// Error of the latest rebuild, if it failed
    last_error: RwLock<Option<String>>,
}

impl ServerState {
    fn new(output_dir: PathBuf, hub: ReloadHub) -> Self {
        Self {
            output_dir,
            hub,
            last_error: RwLock::new(None),
        }
    }
}

/// Development server.
pub struct DevServer {
    config: DevServerConfig,
}

impl DevServer {
    pub fn new(config: DevServerConfig) -> Self {
        Self { config }
    }

    /// Build, then serve the output and rebuild on change until the process ends.
    pub async fn start(self) -> Result<(), ServerError> {
        let addr = self.config.addr()?;
        let build = Arc::new(self.config.build.clone());

        let result = run_build(Arc::clone(&build)).await?;
        tracing::info!(
            "Initial build: {} pages, {} modules in {}ms",
            result.pages,
            result.modules,
            result.duration_ms
        );

        let state = Arc::new(ServerState::new(result.output_dir, ReloadHub::new()));

        let (watcher, mut rx) = FileWatcher::new(&self.config.watch_paths())
            .map_err(|e| ServerError::WatchError(e.to_string()))?;

        let watch_state = Arc::clone(&state);
        tokio::spawn(async move {
            while let Some(event) = rx.recv().await {
                if event.path().starts_with(&watch_state.output_dir) {
                    continue;
                }
                log_change(&event);
                while let Ok(more) = rx.try_recv() {
                    log_change(&more);
                }
                rebuild(&watch_state, Arc::clone(&build)).await;
            }
            // Keep watcher alive
            drop(watcher);
        });

        let app = dev_app(state);

        tracing::info!("Starting dev server at http://{}", addr);
        if self.config.open {
            open_browser(&format!("http://{}", addr));
        }

        serve(addr, app).await
    }
}

/// Serve a finished build directory under `public_path`.
pub async fn serve_preview(
    dir: PathBuf,
    public_path: &str,
    addr: SocketAddr,
    open: bool,
) -> Result<(), ServerError> {
    let app = preview_router(&dir, public_path);

    tracing::info!(
        "Serving {} at http://{}{}",
        dir.display(),
        addr,
        public_path
    );
    if open {
        open_browser(&format!("http://{}{}", addr, public_path));
    }

    serve(addr, app).await
}

async fn serve(addr: SocketAddr, app: Router) -> Result<(), ServerError> {
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .map_err(|e| ServerError::BindError(addr, e.to_string()))?;

    axum::serve(listener, app)
        .await
        .map_err(|e| ServerError::BindError(addr, e.to_string()))
}

fn open_browser(url: &str) {
    if let Err(e) = open::that(url) {
        tracing::warn!("Failed to open browser: {}", e);
    }
}

fn log_change(event: &WatchEvent) {
    match event {
        WatchEvent::Content(path) => tracing::info!("Page modified: {}", path.display()),
        WatchEvent::Source(path) => tracing::info!("Module modified: {}", path.display()),
        WatchEvent::Created(path) => tracing::info!("Created: {}", path.display()),
        WatchEvent::Deleted(path) => tracing::info!("Deleted: {}", path.display()),
        WatchEvent::Modified(path) => tracing::debug!("Modified: {}", path.display()),
    }
}

/// Run a build on the blocking pool.
async fn run_build(config: Arc<BuildConfig>) -> Result<BuildResult, ServerError> {
    let result = tokio::task::spawn_blocking(move || StaticBuilder::new(&config).build())
        .await
        .map_err(|e| ServerError::TaskError(e.to_string()))??;
    Ok(result)
}

/// Rebuild wholesale and tell browsers the outcome.
async fn rebuild(state: &ServerState, config: Arc<BuildConfig>) {
    match run_build(config).await {
        Ok(result) => {
            tracing::info!("Rebuilt in {}ms", result.duration_ms);
            *state.last_error.write().await = None;
            state.hub.send(ReloadMessage::Reload);
        }
        Err(e) => {
            let message = e.to_string();
            tracing::error!("Rebuild failed: {}", message);
            *state.last_error.write().await = Some(message.clone());
            state.hub.send(ReloadMessage::BuildFailed { message });
        }
    }
}

/// Router for a development output directory: files as is, the entry
/// document with the reload client for everything else.
pub fn dev_router(output_dir: PathBuf, hub: ReloadHub) -> Router {
    dev_app(Arc::new(ServerState::new(output_dir, hub)))
}

fn dev_app(state: Arc<ServerState>) -> Router {
    let index: MethodRouter = get(spa_index).with_state(Arc::clone(&state));
    let files = ServeDir::new(&state.output_dir).fallback(index);

    Router::new()
        .route("/", get(spa_index))
        .route("/index.html", get(spa_index))
        .route(RELOAD_PATH, get(ws_handler))
        .fallback_service(files)
        .with_state(state)
}

/// Router for a production output directory mounted under `public_path`.
pub fn preview_router(dir: &Path, public_path: &str) -> Router {
    let files = ServeDir::new(dir).fallback(ServeFile::new(dir.join("index.html")));
    let base = public_path.trim_end_matches('/');
    if base.is_empty() {
        Router::new().fallback_service(files)
    } else {
        Router::new().nest_service(base, files)
    }
}

/// The entry document with the reload client injected.
async fn spa_index(State(state): State<Arc<ServerState>>) -> Response {
    let path = state.output_dir.join("index.html");
    match tokio::fs::read_to_string(&path).await {
        Ok(html) => Html(inject_head(&html, &[reload_client_script()])).into_response(),
        Err(e) => (
            StatusCode::SERVICE_UNAVAILABLE,
            format!("No build output at {}: {}", path.display(), e),
        )
            .into_response(),
    }
}

/// Handler for the reload WebSocket endpoint.
async fn ws_handler(
    ws: WebSocketUpgrade,
    State(state): State<Arc<ServerState>>,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_ws(socket, state))
}

/// Handle a WebSocket connection.
async fn handle_ws(mut socket: WebSocket, state: Arc<ServerState>) {
    let mut rx = state.hub.subscribe();

    let mut greeting = vec![ReloadMessage::Connected];
    if let Some(message) = state.last_error.read().await.clone() {
        greeting.push(ReloadMessage::BuildFailed { message });
    }
    for msg in &greeting {
        if !send(&mut socket, msg).await {
            return;
        }
    }

    loop {
        tokio::select! {
            result = rx.recv() => match result {
                Ok(msg) => {
                    if !send(&mut socket, &msg).await {
                        break;
                    }
                }
                Err(broadcast::error::RecvError::Closed) => break,
                Err(broadcast::error::RecvError::Lagged(_)) => {}
            },
            // Client messages are ignored; a closed socket ends the loop
            result = socket.recv() => match result {
                Some(Ok(_)) => {}
                _ => break,
            },
        }
    }
}

async fn send(socket: &mut WebSocket, msg: &ReloadMessage) -> bool {
    let Ok(json) = serde_json::to_string(msg) else {
        return false;
    };
    socket.send(Message::Text(json.into())).await.is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::{to_bytes, Body};
    use axum::http::Request;
    use lectern_static::Mode;
    use pretty_assertions::assert_eq;
    use std::fs;
    use tempfile::{tempdir, TempDir};
    use tower::ServiceExt;

    const INDEX: &str = "<html><head><title>Docs</title></head><body><div id=\"app\"></div></body></html>";

    fn output() -> TempDir {
        let temp = tempdir().unwrap();
        fs::write(temp.path().join("index.html"), INDEX).unwrap();
        fs::write(temp.path().join("main.bundle-abc.js"), "console.log(1);\n").unwrap();
        fs::create_dir_all(temp.path().join("css")).unwrap();
        fs::write(temp.path().join("css/main.css"), "body {}").unwrap();
        temp
    }

    async fn fetch(app: Router, uri: &str) -> (StatusCode, String) {
        let response = app
            .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
            .await
            .unwrap();
        let status = response.status();
        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, String::from_utf8(body.to_vec()).unwrap())
    }

    #[tokio::test]
    async fn serves_output_files_as_is() {
        let out = output();
        let app = dev_router(out.path().to_path_buf(), ReloadHub::new());

        let (status, body) = fetch(app.clone(), "/main.bundle-abc.js").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, "console.log(1);\n");

        let (status, body) = fetch(app, "/css/main.css").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, "body {}");
    }

    #[tokio::test]
    async fn unmatched_paths_fall_back_to_index() {
        let out = output();
        let app = dev_router(out.path().to_path_buf(), ReloadHub::new());

        for uri in ["/", "/index.html", "/mvc/getting-started", "/missing.js"] {
            let (status, body) = fetch(app.clone(), uri).await;
            assert_eq!(status, StatusCode::OK, "{}", uri);
            assert!(body.contains("<div id=\"app\"></div>"), "{}", uri);
            assert!(body.contains(RELOAD_PATH), "{}", uri);
        }
    }

    #[tokio::test]
    async fn reports_missing_output() {
        let temp = tempdir().unwrap();
        let app = dev_router(temp.path().join("dist"), ReloadHub::new());

        let (status, _) = fetch(app, "/").await;
        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    }

    #[tokio::test]
    async fn preview_mounts_under_public_path() {
        let out = output();
        let app = preview_router(out.path(), "/crizmas-mvc-docs/");

        let (status, body) = fetch(app.clone(), "/crizmas-mvc-docs/main.bundle-abc.js").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, "console.log(1);\n");

        let (status, body) = fetch(app.clone(), "/crizmas-mvc-docs/mvc/api").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, INDEX);

        let (status, body) = fetch(app.clone(), "/crizmas-mvc-docs/").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, INDEX);

        let (status, _) = fetch(app, "/elsewhere").await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn preview_at_root() {
        let out = output();
        let app = preview_router(out.path(), "/");

        let (status, body) = fetch(app, "/guide").await;
        assert_eq!(status, StatusCode::OK);
        assert!(!body.contains(RELOAD_PATH));
    }

    #[tokio::test]
    async fn failed_rebuild_is_broadcast() {
        let temp = tempdir().unwrap();
        let state = ServerState::new(temp.path().join("dist"), ReloadHub::new());
        let mut rx = state.hub.subscribe();

        // No content directory, so the build fails.
        let config = Arc::new(BuildConfig::new(temp.path(), Mode::Development));
        rebuild(&state, config).await;

        match rx.recv().await.unwrap() {
            ReloadMessage::BuildFailed { message } => assert!(message.contains("docs")),
            other => panic!("Expected BuildFailed, got {:?}", other),
        }
        assert!(state.last_error.read().await.is_some());
    }

    #[test]
    fn watches_sources_content_and_assets() {
        let config = DevServerConfig::new(BuildConfig::new("/site", Mode::Development));
        assert_eq!(
            config.watch_paths(),
            vec![
                PathBuf::from("/site/docs"),
                PathBuf::from("/site/src"),
                PathBuf::from("/site/src/css"),
            ]
        );
        assert_eq!(config.addr().unwrap().port(), 5555);
    }
}
