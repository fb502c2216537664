//! # Dashboard server
//!
//! A loopback-only axum server: embedded single-page UI, read-only typed
//! JSON endpoints over the API facade, and a server-sent-event stream of
//! entity/approval changes. One process writes; any number of dashboard
//! clients read.

use std::net::SocketAddr;
use std::sync::Arc;

use axum::routing::get;
use axum::Router;
use tokio::net::TcpListener;
use tower_http::cors::CorsLayer;
use tracing::{info, warn};

use zeusapp::api::ZeusApi;
use zeusapp::error::Result;

mod assets;
mod routes;
mod sse;

#[derive(Debug, Clone, Copy)]
pub struct ServeOptions {
    pub port: u16,
    pub open_browser: bool,
    pub dev: bool,
}

#[derive(Clone)]
pub struct AppState {
    pub api: Arc<ZeusApi>,
}

pub fn router(state: AppState, dev: bool) -> Router {
    let mut app = Router::new()
        .route("/api/status", get(routes::status))
        .route("/api/vision", get(routes::vision))
        .route("/api/objectives", get(routes::objectives))
        .route("/api/usecases", get(routes::usecases))
        .route("/api/activities", get(routes::activities))
        .route("/api/actors", get(routes::actors))
        .route("/api/subsystems", get(routes::subsystems))
        .route("/api/unified-graph", get(routes::unified_graph))
        .route("/api/uml/usecase", get(routes::uml_usecase))
        .route("/api/uml/activity", get(routes::uml_activity))
        .route("/api/events", get(sse::events))
        .route("/app.js", get(assets::app_js))
        .route("/app.css", get(assets::app_css))
        .fallback(get(assets::index));
    if dev {
        // Local tooling only; never on by default.
        app = app.layer(CorsLayer::permissive());
    }
    app.with_state(state)
}

pub async fn serve(api: ZeusApi, opts: ServeOptions) -> Result<()> {
    let state = AppState { api: Arc::new(api) };
    let app = router(state, opts.dev);

    let addr = SocketAddr::from(([127, 0, 0, 1], opts.port));
    let listener = TcpListener::bind(addr).await?;
    let url = format!("http://{}", listener.local_addr()?);
    info!(%url, dev = opts.dev, "dashboard listening");
    println!("Dashboard: {url}");

    if opts.open_browser {
        if let Err(err) = open::that(&url) {
            warn!(%err, "could not launch a browser");
        }
    }

    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
        })
        .await
        .map_err(zeusapp::error::ZeusError::Io)?;
    Ok(())
}
