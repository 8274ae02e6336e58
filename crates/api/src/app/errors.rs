//! Protocol results to HTTP responses.
//!
//! Handlers get a `Shaped<T>` from the workflow and hand it here; this is the
//! only place status codes and headers are written.

use axum::http::{HeaderMap, HeaderName, HeaderValue, StatusCode, header};
use axum::response::{IntoResponse, Response};
use serde::Serialize;
use serde_json::json;

use licensehub_licensing::{Headers, Problem, Shaped};

pub const PROBLEM_CONTENT_TYPE: &str = "application/problem+json";

pub fn shaped_response<T: Serialize>(shaped: Shaped<T>) -> Response {
    match shaped.body {
        Some(body) if shaped.problem.status.is_success() => {
            let mut response = (status_code(&shaped.problem), axum::Json(body)).into_response();
            apply_headers(response.headers_mut(), &shaped.problem.headers);
            response
        }
        _ => problem_response(&shaped.problem),
    }
}

/// JSON problem body `{ "status": <code>, "detail": <text> }`.
pub fn problem_response(problem: &Problem) -> Response {
    let status = status_code(problem);
    let mut response = (
        status,
        axum::Json(json!({
            "status": status.as_u16(),
            "detail": problem.detail.clone().unwrap_or_default(),
        })),
    )
        .into_response();
    response.headers_mut().insert(
        header::CONTENT_TYPE,
        HeaderValue::from_static(PROBLEM_CONTENT_TYPE),
    );
    apply_headers(response.headers_mut(), &problem.headers);
    response
}

fn status_code(problem: &Problem) -> StatusCode {
    StatusCode::from_u16(problem.status.code()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR)
}

/// The first value of a name replaces whatever the body set; later values
/// are appended.
fn apply_headers(target: &mut HeaderMap, headers: &Headers) {
    let mut seen: Vec<HeaderName> = Vec::new();
    for (name, value) in headers.iter() {
        let (Ok(name), Ok(value)) = (
            HeaderName::from_bytes(name.as_bytes()),
            HeaderValue::from_str(value),
        ) else {
            tracing::warn!(header = %name, "dropping unrepresentable response header");
            continue;
        };
        if seen.contains(&name) {
            target.append(name, value);
        } else {
            target.insert(name.clone(), value);
            seen.push(name);
        }
    }
}
