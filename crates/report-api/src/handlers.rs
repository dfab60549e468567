//! API Handlers
use axum::{
    body::Body,
    extract::{Path, Query, State},
    http::{header, HeaderMap, Method, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use report_out::{Body as RenderedBody, RenderedResponse};
use serde_json::{json, Value};
use tracing::error;

use crate::orchestrator::{RequestMethod, ViewRequest};
use crate::urls::INDEX_PATH;
use crate::AppState;

/// Header carrying the caller's identity.
pub const USER_HEADER: &str = "x-report-user";

fn user_from(headers: &HeaderMap) -> Option<String> {
    headers
        .get(USER_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(ToString::to_string)
}

fn request_method(method: &Method) -> RequestMethod {
    if method == Method::POST {
        RequestMethod::Post
    } else {
        RequestMethod::Get
    }
}

pub async fn list_reports(State(state): State<AppState>, headers: HeaderMap) -> Response {
    into_response(state.service.index(user_from(&headers)))
}

pub async fn reports_alias() -> Response {
    into_response(RenderedResponse::redirect(INDEX_PATH))
}

pub async fn view_report(
    State(state): State<AppState>,
    method: Method,
    headers: HeaderMap,
    Path(report_name): Path<String>,
    Query(params): Query<Vec<(String, String)>>,
) -> Response {
    let request = ViewRequest {
        report_name,
        organization: None,
        params,
        method: request_method(&method),
        user: user_from(&headers),
    };
    into_response(state.service.view(request).await)
}

pub async fn view_organization_report(
    State(state): State<AppState>,
    method: Method,
    headers: HeaderMap,
    Path((report_name, organization)): Path<(String, String)>,
    Query(params): Query<Vec<(String, String)>>,
) -> Response {
    let request = ViewRequest {
        report_name,
        organization: Some(organization),
        params,
        method: request_method(&method),
        user: user_from(&headers),
    };
    into_response(state.service.view(request).await)
}

pub async fn metrics(State(state): State<AppState>) -> Response {
    match state.service.metrics().encode() {
        Ok(text) => (
            StatusCode::OK,
            [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
            text,
        )
            .into_response(),
        Err(err) => {
            error!(error = %err, "failed to encode metrics");
            (StatusCode::INTERNAL_SERVER_ERROR, err.to_string()).into_response()
        }
    }
}

pub async fn health(State(state): State<AppState>) -> (StatusCode, Json<Value>) {
    let service = &state.service;
    (
        StatusCode::OK,
        Json(json!({
            "status": "ok",
            "version": report_core::REPORT_ENGINE_VERSION,
            "reports": service.registry().len(),
            "cached_artifacts": service.cache().stored(),
            "generations_in_flight": service.cache().inflight(),
        })),
    )
}

/// Map the transport-neutral response onto axum's.
pub fn into_response(rendered: RenderedResponse) -> Response {
    let status =
        StatusCode::from_u16(rendered.status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    let mut builder = Response::builder().status(status);
    for (name, value) in &rendered.headers {
        builder = builder.header(name.as_str(), value.as_str());
    }
    let body = match rendered.body {
        RenderedBody::Empty => Body::empty(),
        RenderedBody::Text(text) => Body::from(text),
        RenderedBody::Bytes(bytes) => Body::from(bytes),
    };
    builder.body(body).unwrap_or_else(|err| {
        error!(error = %err, "invalid response headers");
        StatusCode::INTERNAL_SERVER_ERROR.into_response()
    })
}
