//! Embedded UI assets, compiled into the binary with `include_str!`.
//!
//! Every unknown path serves the index document (SPA fallback). The
//! `?e2e` query flag flips a documented window hook so end-to-end suites
//! can inspect UI state.

use axum::extract::RawQuery;
use axum::http::header::CONTENT_TYPE;
use axum::response::{Html, IntoResponse};

const INDEX_HTML: &str = include_str!("../../assets/index.html");
const APP_JS: &str = include_str!("../../assets/app.js");
const APP_CSS: &str = include_str!("../../assets/app.css");

const E2E_HOOK: &str = "<script>window.__ZEUS_E2E__ = true;</script></body>";

pub async fn index(RawQuery(query): RawQuery) -> Html<String> {
    let mut page = INDEX_HTML.to_string();
    let e2e = query
        .as_deref()
        .map(|q| q.split('&').any(|p| p == "e2e" || p.starts_with("e2e=")))
        .unwrap_or(false);
    if e2e {
        page = page.replace("</body>", E2E_HOOK);
    }
    Html(page)
}

pub async fn app_js() -> impl IntoResponse {
    ([(CONTENT_TYPE, "application/javascript")], APP_JS)
}

pub async fn app_css() -> impl IntoResponse {
    ([(CONTENT_TYPE, "text/css")], APP_CSS)
}
