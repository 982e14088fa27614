//! Dashboard HTML page handler.
//!
//! Serves a self-contained page with inline CSS/JS. All data is loaded from
//! the JSON API by the page itself.

use axum::http::header;
use axum::response::IntoResponse;

const DASHBOARD_HTML: &str = include_str!("dashboard.html");

pub async fn dashboard() -> impl IntoResponse {
    (
        [
            (header::CONTENT_TYPE, "text/html; charset=utf-8"),
            (header::CACHE_CONTROL, "no-cache"),
        ],
        DASHBOARD_HTML,
    )
}
