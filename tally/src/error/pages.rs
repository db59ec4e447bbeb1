//! The edge layer that turns failed responses into user-safe error pages.
//!
//! Handler errors attach their text to the response as an extension (see
//! [`ErrorDetail`]); this layer is the only place that text is read. It logs
//! the failure centrally and renders the generic error page, including the
//! detail only when debug mode is enabled.

use axum::extract::{Request, State};
use axum::middleware::Next;
use axum::response::{Html, IntoResponse, Response};

use crate::AppState;
use crate::error::ErrorDetail;
use crate::html;

pub(crate) async fn error_pages(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Response {
    let method = request.method().clone();
    let path = request.uri().path().to_owned();

    let mut response = next.run(request).await;

    let Some(detail) = response.extensions_mut().remove::<ErrorDetail>() else {
        return response;
    };

    let status = response.status();
    tracing::error!(%method, path, %status, error = %detail.0, "request failed");

    let shown_detail = state.config.debug.then(|| &*detail.0);
    (status, Html(html::error_page(status, shown_detail))).into_response()
}
